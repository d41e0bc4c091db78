//! Recording in-memory driver for exercising the client without a server.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use neo4rs::{BoltInteger, BoltMap, BoltNode, BoltRelation, BoltString, BoltType};

use graphlink_client::normalize::to_bolt;
use graphlink_client::{
    DriverSession, DriverTransaction, GraphDriver, GraphError, RawRecord, RawResult, ServerInfo,
};
use graphlink_core::{Statement, TransactionConfig, Value};

/// Everything the fake driver was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SessionOpened(String),
    SessionClosed(String),
    Ran(String),
    Began(TransactionConfig),
    TxRan(String),
    Committed,
    RolledBack,
    DriverClosed,
}

type Responder = Arc<dyn Fn(&Statement) -> Result<RawResult, GraphError> + Send + Sync>;

struct FakeState {
    events: Mutex<Vec<Event>>,
    responder: Responder,
    reachable: bool,
    fail_close: bool,
}

impl FakeState {
    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

/// Fake driver answering every statement through a caller-supplied
/// responder. Clones share the same event log.
#[derive(Clone)]
pub struct FakeDriver {
    state: Arc<FakeState>,
}

impl FakeDriver {
    pub fn new(
        responder: impl Fn(&Statement) -> Result<RawResult, GraphError> + Send + Sync + 'static,
    ) -> Self {
        Self::build(Arc::new(responder), true, false)
    }

    /// A driver that answers every statement with no rows.
    pub fn empty() -> Self {
        Self::new(|_| Ok(RawResult::default()))
    }

    /// A driver whose server never answers the connectivity probe.
    pub fn unreachable() -> Self {
        Self::build(Arc::new(|_| Ok(RawResult::default())), false, false)
    }

    /// Same responder, but every session close fails.
    pub fn with_failing_close(self) -> Self {
        Self::build(self.state.responder.clone(), self.state.reachable, true)
    }

    fn build(responder: Responder, reachable: bool, fail_close: bool) -> Self {
        Self {
            state: Arc::new(FakeState {
                events: Mutex::new(Vec::new()),
                responder,
                reachable,
                fail_close,
            }),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    pub fn sessions_opened(&self) -> usize {
        self.count(|e| matches!(e, Event::SessionOpened(_)))
    }

    pub fn sessions_closed(&self) -> usize {
        self.count(|e| matches!(e, Event::SessionClosed(_)))
    }
}

#[async_trait]
impl GraphDriver for FakeDriver {
    type Session = FakeSession;

    async fn server_info(&self) -> Result<ServerInfo, GraphError> {
        if !self.state.reachable {
            return Err(GraphError::Connection("connection refused".to_string()));
        }
        Ok(ServerInfo {
            name: "Neo4j Kernel".to_string(),
            versions: vec!["5.20.0".to_string()],
            edition: "community".to_string(),
        })
    }

    async fn session(&self, database: &str) -> Result<FakeSession, GraphError> {
        self.state.record(Event::SessionOpened(database.to_string()));
        Ok(FakeSession {
            state: self.state.clone(),
            database: database.to_string(),
        })
    }

    async fn close(self) -> Result<(), GraphError> {
        self.state.record(Event::DriverClosed);
        Ok(())
    }
}

pub struct FakeSession {
    state: Arc<FakeState>,
    database: String,
}

#[async_trait]
impl DriverSession for FakeSession {
    type Transaction = FakeTransaction;

    async fn run(&mut self, statement: &Statement) -> Result<RawResult, GraphError> {
        self.state.record(Event::Ran(statement.text.clone()));
        (self.state.responder)(statement)
    }

    async fn begin_write(
        &mut self,
        config: &TransactionConfig,
    ) -> Result<FakeTransaction, GraphError> {
        self.state.record(Event::Began(config.clone()));
        Ok(FakeTransaction {
            state: self.state.clone(),
        })
    }

    async fn close(self) -> Result<(), GraphError> {
        self.state.record(Event::SessionClosed(self.database.clone()));
        if self.state.fail_close {
            return Err(GraphError::Release {
                resource: "session",
                reason: "socket already closed".to_string(),
            });
        }
        Ok(())
    }
}

pub struct FakeTransaction {
    state: Arc<FakeState>,
}

#[async_trait]
impl DriverTransaction for FakeTransaction {
    async fn run(&mut self, statement: &Statement) -> Result<RawResult, GraphError> {
        self.state.record(Event::TxRan(statement.text.clone()));
        (self.state.responder)(statement)
    }

    async fn commit(self) -> Result<(), GraphError> {
        self.state.record(Event::Committed);
        Ok(())
    }

    async fn rollback(self) -> Result<(), GraphError> {
        self.state.record(Event::RolledBack);
        Ok(())
    }
}

// ── Raw Value Builders ───────────────────────────────────────────

pub fn rows(records: Vec<RawRecord>) -> Result<RawResult, GraphError> {
    Ok(RawResult {
        records,
        ..Default::default()
    })
}

pub fn record(columns: Vec<(&str, BoltType)>) -> RawRecord {
    columns
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

pub fn int(i: i64) -> BoltType {
    BoltType::Integer(BoltInteger::new(i))
}

/// Encode a normalized property map the way the server would store it.
pub fn bolt_props(value: Option<&Value>) -> BoltMap {
    match value.map(to_bolt) {
        Some(BoltType::Map(m)) => m,
        _ => BoltMap::new(),
    }
}

pub fn node(id: i64, labels: &[&str], properties: BoltMap) -> BoltType {
    let labels: Vec<BoltType> = labels.iter().map(|l| BoltType::from(*l)).collect();
    BoltType::Node(BoltNode::new(BoltInteger::new(id), labels.into(), properties))
}

pub fn relation(id: i64, start: i64, end: i64, typ: &str, properties: BoltMap) -> BoltType {
    BoltType::Relation(BoltRelation {
        id: BoltInteger::new(id),
        start_node_id: BoltInteger::new(start),
        end_node_id: BoltInteger::new(end),
        typ: BoltString::from(typ),
        properties,
    })
}

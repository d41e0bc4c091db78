//! The seam between [`GraphQueryClient`](crate::GraphQueryClient) and a
//! graph database driver.
//!
//! A driver hands out sessions, a session runs statements or begins a write
//! transaction. Sessions and transactions are consumed when they are closed,
//! committed, or rolled back, so none of them can be released twice.

use std::time::Duration;

use async_trait::async_trait;
use neo4rs::BoltType;
use serde::Serialize;

use graphlink_core::{Statement, TransactionConfig};

use crate::client::GraphError;

/// One row as the driver produced it: column name → driver-native value.
pub type RawRecord = Vec<(String, BoltType)>;

/// Un-normalized rows plus timing, as returned by a driver.
#[derive(Debug, Default)]
pub struct RawResult {
    pub records: Vec<RawRecord>,
    /// Time until the first row could be pulled.
    pub available_after: Duration,
    /// Time spent pulling every row after that.
    pub consumed_after: Duration,
}

/// What the server reported about itself during a connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub versions: Vec<String>,
    pub edition: String,
}

/// A connection handle to a graph database server.
#[async_trait]
pub trait GraphDriver: Send + Sync {
    type Session: DriverSession;

    /// Round-trip to the server. Fails if no live server answers.
    async fn server_info(&self) -> Result<ServerInfo, GraphError>;

    /// Open a session against `database`.
    async fn session(&self, database: &str) -> Result<Self::Session, GraphError>;

    /// Release the connection handle.
    async fn close(self) -> Result<(), GraphError>;
}

/// A short-lived scope against one database.
#[async_trait]
pub trait DriverSession: Send {
    type Transaction: DriverTransaction;

    /// Run a single auto-committed statement and pull all of its rows.
    async fn run(&mut self, statement: &Statement) -> Result<RawResult, GraphError>;

    /// Begin a write transaction with `config`. Backends that cannot send
    /// transaction options to the server (neo4rs 0.8 among them) only log it.
    async fn begin_write(
        &mut self,
        config: &TransactionConfig,
    ) -> Result<Self::Transaction, GraphError>;

    async fn close(self) -> Result<(), GraphError>;
}

/// An open write transaction.
#[async_trait]
pub trait DriverTransaction: Send {
    async fn run(&mut self, statement: &Statement) -> Result<RawResult, GraphError>;

    async fn commit(self) -> Result<(), GraphError>;

    async fn rollback(self) -> Result<(), GraphError>;
}

/// Transaction type of a driver's sessions.
pub type TransactionOf<D> = <<D as GraphDriver>::Session as DriverSession>::Transaction;

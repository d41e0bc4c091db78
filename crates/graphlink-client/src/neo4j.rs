//! Neo4j backend for the driver seam, built on `neo4rs`.
//!
//! `neo4rs` pools Bolt connections behind a cheaply cloneable `Graph`, so a
//! session here is a scope bound to one database rather than a dedicated
//! connection; each statement borrows a pooled connection for its duration.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use neo4rs::{query, BoltType, ConfigBuilder, Graph, Query, Row, Txn};

use graphlink_core::{ClientConfig, Statement, TransactionConfig};

use crate::client::GraphError;
use crate::driver::{DriverSession, DriverTransaction, GraphDriver, RawRecord, RawResult, ServerInfo};
use crate::normalize::to_bolt;

/// Thread-safe Neo4j driver handle with connection pooling.
pub struct Neo4jDriver {
    graph: Graph,
}

impl Neo4jDriver {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &ClientConfig) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.endpoint)
            .user(&config.username)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.endpoint, database = %config.database, "Connected to Neo4j");
        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphDriver for Neo4jDriver {
    type Session = Neo4jSession;

    async fn server_info(&self) -> Result<ServerInfo, GraphError> {
        let q = query(
            "CALL dbms.components() YIELD name, versions, edition
             RETURN name, versions, edition",
        );
        let mut stream = self.graph.execute(q).await?;

        match stream.next().await? {
            Some(row) => Ok(ServerInfo {
                name: component_field(&row, "name")?,
                versions: component_field(&row, "versions")?,
                edition: component_field(&row, "edition")?,
            }),
            None => Err(GraphError::Connection(
                "Server reported no components".to_string(),
            )),
        }
    }

    async fn session(&self, database: &str) -> Result<Neo4jSession, GraphError> {
        tracing::trace!(database, "Opening session");
        Ok(Neo4jSession {
            graph: self.graph.clone(),
            database: database.to_string(),
        })
    }

    async fn close(self) -> Result<(), GraphError> {
        // Dropping the last Graph clone shuts the pool down.
        drop(self.graph);
        tracing::info!("Neo4j driver closed");
        Ok(())
    }
}

/// Session scoped to one database.
pub struct Neo4jSession {
    graph: Graph,
    database: String,
}

#[async_trait]
impl DriverSession for Neo4jSession {
    type Transaction = Neo4jTransaction;

    async fn run(&mut self, statement: &Statement) -> Result<RawResult, GraphError> {
        let started = Instant::now();
        let mut stream = self
            .graph
            .execute_on(self.database.as_str(), to_query(statement))
            .await?;
        let available_after = started.elapsed();

        let mut records = Vec::new();
        while let Some(row) = stream.next().await? {
            records.push(raw_record(&row)?);
        }

        Ok(RawResult {
            records,
            available_after,
            consumed_after: started.elapsed().saturating_sub(available_after),
        })
    }

    async fn begin_write(
        &mut self,
        config: &TransactionConfig,
    ) -> Result<Neo4jTransaction, GraphError> {
        // neo4rs 0.8 cannot send a timeout or metadata with BEGIN, so the
        // config only reaches the log.
        tracing::debug!(
            database = %self.database,
            timeout_ms = config.timeout.map(|t| t.as_millis() as u64),
            metadata_keys = config.metadata.len(),
            "Beginning write transaction"
        );
        let txn = self.graph.start_txn_on(self.database.as_str()).await?;
        Ok(Neo4jTransaction { txn })
    }

    async fn close(self) -> Result<(), GraphError> {
        tracing::trace!(database = %self.database, "Session closed");
        Ok(())
    }
}

/// An open neo4rs transaction.
pub struct Neo4jTransaction {
    txn: Txn,
}

#[async_trait]
impl DriverTransaction for Neo4jTransaction {
    async fn run(&mut self, statement: &Statement) -> Result<RawResult, GraphError> {
        let started = Instant::now();
        let mut stream = self.txn.execute(to_query(statement)).await?;
        let available_after = started.elapsed();

        let mut records = Vec::new();
        while let Some(row) = stream.next(self.txn.handle()).await? {
            records.push(raw_record(&row)?);
        }

        Ok(RawResult {
            records,
            available_after,
            consumed_after: started.elapsed().saturating_sub(available_after),
        })
    }

    async fn commit(self) -> Result<(), GraphError> {
        self.txn.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), GraphError> {
        self.txn.rollback().await?;
        Ok(())
    }
}

/// Build a neo4rs query, encoding every parameter.
fn to_query(statement: &Statement) -> Query {
    statement
        .params
        .iter()
        .fold(query(&statement.text), |q, (key, value)| q.param(key, to_bolt(value)))
}

fn component_field<T: serde::de::DeserializeOwned>(row: &Row, key: &str) -> Result<T, GraphError> {
    row.get::<T>(key).map_err(|e| {
        GraphError::UnexpectedShape(format!("dbms.components() column {key}: {e}"))
    })
}

/// Read every column of a row as a driver value.
fn raw_record(row: &Row) -> Result<RawRecord, GraphError> {
    let columns: HashMap<String, BoltType> = row
        .to()
        .map_err(|e| GraphError::UnexpectedShape(format!("Failed to read row: {e}")))?;
    Ok(columns.into_iter().collect())
}

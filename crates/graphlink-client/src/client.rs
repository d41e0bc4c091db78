//! The graph query client: session lifecycle, query execution, and write
//! transactions.

use futures::future::BoxFuture;

use graphlink_core::{ClientConfig, Params, QueryResult, QuerySummary, Statement, TransactionConfig};

use crate::driver::{DriverSession, DriverTransaction, GraphDriver, RawResult, ServerInfo, TransactionOf};
use crate::neo4j::Neo4jDriver;
use crate::normalize::normalize_record;

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("Failed to release {resource}: {reason}")]
    Release {
        resource: &'static str,
        reason: String,
    },

    #[error("Relationship endpoints not found: start {start_id}, end {end_id}")]
    EndpointNotFound { start_id: String, end_id: String },

    #[error("Unexpected result shape: {0}")]
    UnexpectedShape(String),
}

/// Client for a graph database.
///
/// Owns exactly one driver handle for its whole life. Every query opens its
/// own session and closes it before returning, whatever the outcome. Calls
/// take `&self` and may run concurrently; the driver multiplexes them.
pub struct GraphQueryClient<D: GraphDriver = Neo4jDriver> {
    driver: D,
    config: ClientConfig,
}

impl GraphQueryClient<Neo4jDriver> {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: ClientConfig) -> Result<Self, GraphError> {
        let driver = Neo4jDriver::connect(&config).await?;
        Ok(Self { driver, config })
    }
}

impl<D: GraphDriver> GraphQueryClient<D> {
    /// Wrap an already-constructed driver.
    pub fn with_driver(driver: D, config: ClientConfig) -> Self {
        Self { driver, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Check that a live server answers. Never fails: any error is logged
    /// and reported as `false`.
    pub async fn verify_connectivity(&self) -> bool {
        match self.driver.server_info().await {
            Ok(info) => {
                tracing::debug!(server = %info.name, edition = %info.edition, "Connectivity verified");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, endpoint = %self.config.endpoint, "Failed to connect to Neo4j");
                false
            }
        }
    }

    /// Ask the server to describe itself.
    pub async fn server_info(&self) -> Result<ServerInfo, GraphError> {
        self.driver.server_info().await
    }

    /// Release the driver handle. Consumes the client.
    pub async fn close(self) -> Result<(), GraphError> {
        tracing::debug!(endpoint = %self.config.endpoint, "Closing graph client");
        self.driver.close().await
    }

    /// Run one Cypher statement in a session scoped to this call and
    /// normalize every record.
    pub async fn run_query(
        &self,
        text: &str,
        params: Params,
        database: Option<&str>,
    ) -> Result<QueryResult, GraphError> {
        let statement = Statement::new(text).with_params(params);
        let database = self.database(database);

        let mut session = self.driver.session(database).await?;
        let outcome = session.run(&statement).await;
        let raw = finish_session(session, outcome).await?;

        tracing::debug!(database, rows = raw.records.len(), "Query complete");
        Ok(into_query_result(statement, raw))
    }

    /// Run `work` inside one write transaction.
    ///
    /// The transaction commits if `work` succeeds and rolls back if it
    /// fails. The session is closed afterwards in both cases, and errors
    /// from `work` reach the caller unchanged.
    ///
    /// ```rust,no_run
    /// # use graphlink_client::{GraphQueryClient, GraphError};
    /// # use graphlink_core::Params;
    /// # async fn example(client: &GraphQueryClient) -> Result<(), GraphError> {
    /// let created = client
    ///     .run_transaction(
    ///         |tx| {
    ///             Box::pin(async move {
    ///                 tx.run("CREATE (n:Tag {name: 'a'})", Params::new()).await?;
    ///                 tx.run("CREATE (n:Tag {name: 'b'})", Params::new()).await?;
    ///                 Ok(2)
    ///             })
    ///         },
    ///         None,
    ///         None,
    ///     )
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_transaction<F, T>(
        &self,
        work: F,
        config: Option<TransactionConfig>,
        database: Option<&str>,
    ) -> Result<T, GraphError>
    where
        F: for<'t> FnOnce(&'t mut Transaction<TransactionOf<D>>) -> BoxFuture<'t, Result<T, GraphError>>
            + Send,
        T: Send,
    {
        let database = self.database(database);
        let config = config.unwrap_or_default();

        let mut session = self.driver.session(database).await?;
        let outcome = execute_write(&mut session, work, &config).await;
        finish_session(session, outcome).await
    }

    /// Resolve a per-call database name against the configured default.
    pub(crate) fn database<'a>(&'a self, database: Option<&'a str>) -> &'a str {
        database.unwrap_or(&self.config.database)
    }
}

/// Handle passed to transaction work. Queries run through it are part of
/// the enclosing transaction and come back normalized.
pub struct Transaction<X> {
    inner: X,
    statements: usize,
}

impl<X: DriverTransaction> Transaction<X> {
    fn new(inner: X) -> Self {
        Self {
            inner,
            statements: 0,
        }
    }

    pub async fn run(&mut self, text: &str, params: Params) -> Result<QueryResult, GraphError> {
        let statement = Statement::new(text).with_params(params);
        let raw = self.inner.run(&statement).await?;
        self.statements += 1;
        Ok(into_query_result(statement, raw))
    }

    /// Number of statements that completed in this transaction so far.
    pub fn statements(&self) -> usize {
        self.statements
    }
}

async fn execute_write<S, F, T>(
    session: &mut S,
    work: F,
    config: &TransactionConfig,
) -> Result<T, GraphError>
where
    S: DriverSession,
    F: for<'t> FnOnce(&'t mut Transaction<S::Transaction>) -> BoxFuture<'t, Result<T, GraphError>>,
{
    let mut tx = Transaction::new(session.begin_write(config).await?);

    match work(&mut tx).await {
        Ok(value) => {
            let statements = tx.statements;
            tx.inner.commit().await?;
            tracing::debug!(statements, "Transaction committed");
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.inner.rollback().await {
                tracing::error!(error = %rollback_err, "Failed to roll back transaction");
            }
            Err(e)
        }
    }
}

/// Close `session` and combine the close result with the call's outcome.
///
/// A close failure after a successful call is returned. After a failed call
/// the original error wins and the close failure is logged.
async fn finish_session<S: DriverSession, T>(
    session: S,
    outcome: Result<T, GraphError>,
) -> Result<T, GraphError> {
    let closed = session.close().await;
    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            tracing::error!(error = %close_err, original = %e, "Failed to close session after error");
            Err(e)
        }
    }
}

fn into_query_result(statement: Statement, raw: RawResult) -> QueryResult {
    QueryResult {
        records: raw.records.into_iter().map(normalize_record).collect(),
        summary: QuerySummary {
            query_text: statement.text,
            parameters: statement.params,
            server_time_ms: raw.available_after.as_millis() as u64,
            client_time_ms: raw.consumed_after.as_millis() as u64,
        },
    }
}

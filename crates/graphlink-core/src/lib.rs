//! graphlink-core: Shared value model, configuration, and error handling for graphlink.
//!
//! This crate holds everything that does not touch the database driver:
//! - Normalized values (`Value`, `NormalizedNode`, `NormalizedRelationship`)
//! - Query results and the `Statement` handed to a driver
//! - Client and transaction configuration
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{ClientConfig, TransactionConfig};
pub use error::CoreError;
pub use types::{
    is_plain_identifier, NormalizedNode, NormalizedRelationship, Params, QueryResult,
    QuerySummary, Record, Statement, Value,
};

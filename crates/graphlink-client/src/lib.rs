//! graphlink client — parameterized Cypher over a Neo4j driver, with every
//! result value normalized before it reaches the caller.
//!
//! [`GraphQueryClient`] owns one driver handle. Each call opens its own
//! session and closes it before returning. Query results never contain
//! driver types: records come back as [`graphlink_core::Value`]s. The
//! [`driver`] traits are the seam for plugging in another backend.

pub mod client;
pub mod driver;
pub mod mutations;
pub mod neo4j;
pub mod normalize;
pub mod queries;

pub use client::{GraphError, GraphQueryClient, Transaction};
pub use driver::{DriverSession, DriverTransaction, GraphDriver, RawRecord, RawResult, ServerInfo};
pub use mutations::CreatedRelationship;
pub use neo4j::Neo4jDriver;
pub use normalize::Normalize;

//! Write operations: node and relationship creation.
//!
//! Labels and relationship types cannot be query parameters in Cypher, so
//! they are spliced into the query text as given. Callers must only pass
//! trusted identifiers; anything that is not a plain identifier is logged.

use serde::Serialize;

use graphlink_core::{is_plain_identifier, NormalizedNode, NormalizedRelationship, Params, Value};

use crate::client::{GraphError, GraphQueryClient};
use crate::driver::GraphDriver;

/// The endpoints and edge produced by [`GraphQueryClient::create_relationship`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedRelationship {
    pub start: NormalizedNode,
    pub relationship: NormalizedRelationship,
    pub end: NormalizedNode,
}

impl<D: GraphDriver> GraphQueryClient<D> {
    /// Create a node with the given labels and properties.
    pub async fn create_node<S: AsRef<str>>(
        &self,
        labels: &[S],
        properties: Params,
        database: Option<&str>,
    ) -> Result<NormalizedNode, GraphError> {
        let cypher = format!(
            "CREATE (n{} $properties)
             RETURN n",
            label_clause(labels)
        );
        let params = Params::from([("properties".to_string(), Value::Map(properties))]);

        let result = self.run_query(&cypher, params, database).await?;
        let node = result
            .records
            .into_iter()
            .next()
            .and_then(|mut record| record.remove("n"))
            .and_then(Value::into_node)
            .ok_or_else(|| GraphError::UnexpectedShape("CREATE returned no node".to_string()))?;

        tracing::debug!(id = %node.id, labels = ?node.labels, "Created node");
        Ok(node)
    }

    /// Create a directed relationship `(start)-[:rel_type]->(end)` between
    /// two existing nodes, identified by the ids of their normalized form.
    ///
    /// Fails with [`GraphError::EndpointNotFound`] if either node is missing.
    pub async fn create_relationship(
        &self,
        start_id: &str,
        end_id: &str,
        rel_type: &str,
        properties: Option<Params>,
        database: Option<&str>,
    ) -> Result<CreatedRelationship, GraphError> {
        warn_if_not_plain("relationship type", rel_type);
        let cypher = format!(
            "MATCH (a), (b)
             WHERE id(a) = toInteger($startNodeId) AND id(b) = toInteger($endNodeId)
             CREATE (a)-[r:{rel_type} $properties]->(b)
             RETURN a, r, b"
        );
        let params = Params::from([
            ("startNodeId".to_string(), Value::from(start_id)),
            ("endNodeId".to_string(), Value::from(end_id)),
            (
                "properties".to_string(),
                Value::Map(properties.unwrap_or_default()),
            ),
        ]);

        let result = self.run_query(&cypher, params, database).await?;
        let Some(mut record) = result.records.into_iter().next() else {
            return Err(GraphError::EndpointNotFound {
                start_id: start_id.to_string(),
                end_id: end_id.to_string(),
            });
        };

        let start = record.remove("a").and_then(Value::into_node);
        let relationship = record.remove("r").and_then(Value::into_relationship);
        let end = record.remove("b").and_then(Value::into_node);

        match (start, relationship, end) {
            (Some(start), Some(relationship), Some(end)) => {
                tracing::debug!(id = %relationship.id, rel_type, "Created relationship");
                Ok(CreatedRelationship {
                    start,
                    relationship,
                    end,
                })
            }
            _ => Err(GraphError::UnexpectedShape(
                "CREATE did not return (a, r, b)".to_string(),
            )),
        }
    }
}

/// `:A:B` for labels `[A, B]`, or the empty string for no labels.
pub(crate) fn label_clause<S: AsRef<str>>(labels: &[S]) -> String {
    labels
        .iter()
        .map(|label| {
            let label = label.as_ref();
            warn_if_not_plain("label", label);
            format!(":{label}")
        })
        .collect()
}

fn warn_if_not_plain(kind: &'static str, name: &str) {
    if !is_plain_identifier(name) {
        tracing::warn!(kind, name, "Identifier is interpolated into query text unescaped");
    }
}

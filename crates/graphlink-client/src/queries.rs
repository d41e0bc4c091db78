//! Read operations for the graph.

use graphlink_core::{NormalizedNode, Params, Value};

use crate::client::{GraphError, GraphQueryClient};
use crate::driver::GraphDriver;
use crate::mutations::label_clause;

impl<D: GraphDriver> GraphQueryClient<D> {
    /// Find all nodes carrying every label in `labels` whose properties equal
    /// every entry of `properties`. No filter matches all nodes with the labels.
    pub async fn find_nodes<S: AsRef<str>>(
        &self,
        labels: &[S],
        properties: Option<Params>,
        database: Option<&str>,
    ) -> Result<Vec<NormalizedNode>, GraphError> {
        let cypher = format!(
            "MATCH (n{})
             WHERE ALL(key IN keys($properties) WHERE n[key] = $properties[key])
             RETURN n",
            label_clause(labels)
        );
        let params = Params::from([(
            "properties".to_string(),
            Value::Map(properties.unwrap_or_default()),
        )]);

        let result = self.run_query(&cypher, params, database).await?;
        let mut nodes = Vec::with_capacity(result.records.len());
        for mut record in result.records {
            let value = record.remove("n").unwrap_or(Value::Null);
            match value {
                Value::Node(node) => nodes.push(node),
                other => {
                    return Err(GraphError::UnexpectedShape(format!(
                        "Expected a node in column n, got {}",
                        other.kind()
                    )))
                }
            }
        }
        Ok(nodes)
    }
}

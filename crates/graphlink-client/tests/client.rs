//! Client behavior against a recording fake driver. No server needed.

mod common;

use std::time::Duration;

use common::{bolt_props, int, node, record, relation, rows, Event, FakeDriver};
use graphlink_client::{GraphError, GraphQueryClient};
use graphlink_core::{ClientConfig, Params, TransactionConfig, Value};
use neo4rs::BoltMap;

fn client(driver: &FakeDriver) -> GraphQueryClient<FakeDriver> {
    let config = ClientConfig::new("bolt://fake:7687", "neo4j", "secret");
    GraphQueryClient::with_driver(driver.clone(), config)
}

fn props(entries: &[(&str, Value)]) -> Params {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// ── Session Lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn test_run_query_closes_session_once_on_success() {
    let driver = FakeDriver::new(|_| rows(vec![record(vec![("x", int(1))])]));
    let client = client(&driver);

    let result = client.run_query("RETURN 1 AS x", Params::new(), None).await.unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(
        driver.events(),
        vec![
            Event::SessionOpened("neo4j".to_string()),
            Event::Ran("RETURN 1 AS x".to_string()),
            Event::SessionClosed("neo4j".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_run_query_closes_session_when_query_fails() {
    let driver = FakeDriver::new(|_| Err(GraphError::Execution("syntax error".to_string())));
    let client = client(&driver);

    let err = client.run_query("RETRUN 1", Params::new(), None).await.unwrap_err();

    assert!(matches!(err, GraphError::Execution(ref m) if m == "syntax error"));
    assert_eq!(driver.sessions_opened(), 1);
    assert_eq!(driver.sessions_closed(), 1);
}

#[tokio::test]
async fn test_close_failure_surfaces_after_success() {
    let driver = FakeDriver::empty().with_failing_close();
    let client = client(&driver);

    let err = client.run_query("RETURN 1", Params::new(), None).await.unwrap_err();

    assert!(matches!(err, GraphError::Release { resource: "session", .. }));
    assert_eq!(driver.sessions_closed(), 1);
}

#[tokio::test]
async fn test_original_error_wins_over_close_failure() {
    let driver = FakeDriver::new(|_| Err(GraphError::Execution("constraint violated".to_string())))
        .with_failing_close();
    let client = client(&driver);

    let err = client.run_query("CREATE (n)", Params::new(), None).await.unwrap_err();

    assert!(matches!(err, GraphError::Execution(ref m) if m == "constraint violated"));
    assert_eq!(driver.sessions_closed(), 1);
}

#[tokio::test]
async fn test_concurrent_queries_use_separate_sessions() {
    let driver = FakeDriver::new(|_| rows(vec![record(vec![("x", int(1))])]));
    let client = client(&driver);

    let (a, b, c) = tokio::join!(
        client.run_query("RETURN 1 AS x", Params::new(), None),
        client.run_query("RETURN 1 AS x", Params::new(), None),
        client.run_query("RETURN 1 AS x", Params::new(), None),
    );

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(driver.sessions_opened(), 3);
    assert_eq!(driver.sessions_closed(), 3);
}

#[tokio::test]
async fn test_per_call_database_overrides_default() {
    let driver = FakeDriver::empty();
    let client = client(&driver);

    client.run_query("RETURN 1", Params::new(), Some("analytics")).await.unwrap();
    client.run_query("RETURN 1", Params::new(), None).await.unwrap();

    let events = driver.events();
    assert_eq!(events[0], Event::SessionOpened("analytics".to_string()));
    assert_eq!(events[2], Event::SessionClosed("analytics".to_string()));
    assert_eq!(events[3], Event::SessionOpened("neo4j".to_string()));
}

// ── Results ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_run_query_normalizes_records_and_keeps_summary() {
    let driver = FakeDriver::new(|_| {
        let mut person = BoltMap::new();
        person.put("name".into(), "Alice".into());
        rows(vec![record(vec![
            ("p", node(7, &["Person"], person)),
            ("n", int(42)),
        ])])
    });
    let client = client(&driver);

    let params = props(&[("name", Value::from("Alice"))]);
    let result = client
        .run_query("MATCH (p:Person {name: $name}) RETURN p, 42 AS n", params.clone(), None)
        .await
        .unwrap();

    let row = &result.records[0];
    let p = row["p"].as_node().unwrap();
    assert_eq!(p.id, "7");
    assert!(p.has_label("Person"));
    assert_eq!(p.property("name"), Some(&Value::from("Alice")));
    assert_eq!(row["n"], Value::Integer(42));

    assert_eq!(result.summary.query_text, "MATCH (p:Person {name: $name}) RETURN p, 42 AS n");
    assert_eq!(result.summary.parameters, params);
}

#[tokio::test]
async fn test_verify_connectivity() {
    assert!(client(&FakeDriver::empty()).verify_connectivity().await);
    assert!(!client(&FakeDriver::unreachable()).verify_connectivity().await);
}

#[tokio::test]
async fn test_close_releases_driver() {
    let driver = FakeDriver::empty();
    let client = client(&driver);

    client.close().await.unwrap();

    assert_eq!(driver.events(), vec![Event::DriverClosed]);
}

// ── Transactions ─────────────────────────────────────────────────

#[tokio::test]
async fn test_run_transaction_commits_on_success() {
    let driver = FakeDriver::new(|_| rows(vec![record(vec![("c", int(1))])]));
    let client = client(&driver);

    let (row_count, statements) = client
        .run_transaction(
            |tx| {
                Box::pin(async move {
                    assert_eq!(tx.statements(), 0);
                    let a = tx.run("CREATE (n:Tag) RETURN 1 AS c", Params::new()).await?;
                    let b = tx.run("CREATE (n:Tag) RETURN 1 AS c", Params::new()).await?;
                    Ok((a.len() + b.len(), tx.statements()))
                })
            },
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!(row_count, 2);
    assert_eq!(statements, 2);
    assert_eq!(
        driver.events(),
        vec![
            Event::SessionOpened("neo4j".to_string()),
            Event::Began(TransactionConfig::default()),
            Event::TxRan("CREATE (n:Tag) RETURN 1 AS c".to_string()),
            Event::TxRan("CREATE (n:Tag) RETURN 1 AS c".to_string()),
            Event::Committed,
            Event::SessionClosed("neo4j".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_run_transaction_rolls_back_and_returns_work_error() {
    let driver = FakeDriver::empty();
    let client = client(&driver);

    let err = client
        .run_transaction(
            |tx| {
                Box::pin(async move {
                    tx.run("CREATE (n:Tag)", Params::new()).await?;
                    Err::<(), _>(GraphError::Execution("abort".to_string()))
                })
            },
            None,
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GraphError::Execution(ref m) if m == "abort"));
    assert_eq!(driver.count(|e| *e == Event::RolledBack), 1);
    assert_eq!(driver.count(|e| *e == Event::Committed), 0);
    assert_eq!(driver.sessions_closed(), 1);
}

#[tokio::test]
async fn test_run_transaction_rolls_back_when_statement_fails() {
    let driver = FakeDriver::new(|_| Err(GraphError::Execution("deadlock".to_string())));
    let client = client(&driver);

    let err = client
        .run_transaction(
            |tx| Box::pin(async move { tx.run("CREATE (n)", Params::new()).await.map(|_| ()) }),
            None,
            Some("scratch"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GraphError::Execution(ref m) if m == "deadlock"));
    assert_eq!(driver.count(|e| *e == Event::RolledBack), 1);
    assert_eq!(
        driver.events().last(),
        Some(&Event::SessionClosed("scratch".to_string()))
    );
}

#[tokio::test]
async fn test_run_transaction_passes_config_to_driver() {
    let driver = FakeDriver::empty();
    let client = client(&driver);
    let config = TransactionConfig::default()
        .with_timeout(Duration::from_secs(5))
        .with_metadata("app", "ingest");

    client
        .run_transaction(|_tx| Box::pin(async { Ok(()) }), Some(config.clone()), None)
        .await
        .unwrap();

    assert!(driver.events().contains(&Event::Began(config)));
}

// ── Convenience Operations ───────────────────────────────────────

#[tokio::test]
async fn test_create_node_returns_normalized_node() {
    let driver = FakeDriver::new(|stmt| {
        assert!(stmt.text.contains("CREATE (n:Person $properties)"));
        let properties = bolt_props(stmt.params.get("properties"));
        rows(vec![record(vec![("n", node(1, &["Person"], properties))])])
    });
    let client = client(&driver);

    let created = client
        .create_node(
            &["Person"],
            props(&[("name", Value::from("Alice")), ("age", Value::from(30))]),
            None,
        )
        .await
        .unwrap();

    assert_eq!(created.id, "1");
    assert!(created.has_label("Person"));
    assert_eq!(created.property("name"), Some(&Value::from("Alice")));
    assert_eq!(created.property("age"), Some(&Value::Integer(30)));
}

#[tokio::test]
async fn test_create_node_without_row_is_unexpected_shape() {
    let client = client(&FakeDriver::empty());

    let err = client.create_node(&["Person"], Params::new(), None).await.unwrap_err();

    assert!(matches!(err, GraphError::UnexpectedShape(_)));
}

#[tokio::test]
async fn test_create_relationship_returns_triple() {
    let driver = FakeDriver::new(|stmt| {
        assert_eq!(stmt.params.get("startNodeId"), Some(&Value::from("1")));
        assert_eq!(stmt.params.get("endNodeId"), Some(&Value::from("2")));
        assert!(stmt.text.contains("[r:KNOWS $properties]"));
        let properties = bolt_props(stmt.params.get("properties"));
        rows(vec![record(vec![
            ("a", node(1, &["Person"], BoltMap::new())),
            ("r", relation(10, 1, 2, "KNOWS", properties)),
            ("b", node(2, &["Person"], BoltMap::new())),
        ])])
    });
    let client = client(&driver);

    let created = client
        .create_relationship("1", "2", "KNOWS", Some(props(&[("since", Value::from(2020))])), None)
        .await
        .unwrap();

    assert_eq!(created.start.id, "1");
    assert_eq!(created.end.id, "2");
    assert_eq!(created.relationship.rel_type, "KNOWS");
    assert_eq!(created.relationship.start_node_id, "1");
    assert_eq!(created.relationship.end_node_id, "2");
    assert_eq!(created.relationship.property("since"), Some(&Value::Integer(2020)));
}

#[tokio::test]
async fn test_create_relationship_missing_endpoint() {
    let client = client(&FakeDriver::empty());

    let err = client
        .create_relationship("1", "999", "KNOWS", None, None)
        .await
        .unwrap_err();

    match err {
        GraphError::EndpointNotFound { start_id, end_id } => {
            assert_eq!(start_id, "1");
            assert_eq!(end_id, "999");
        }
        other => panic!("expected EndpointNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_find_nodes_sends_filter_and_returns_nodes() {
    let driver = FakeDriver::new(|stmt| {
        assert!(stmt.text.contains("MATCH (n:Person)"));
        let filter = stmt.params.get("properties").and_then(Value::as_map).unwrap();
        assert_eq!(filter.get("name"), Some(&Value::from("Alice")));

        let mut alice = BoltMap::new();
        alice.put("name".into(), "Alice".into());
        rows(vec![
            record(vec![("n", node(1, &["Person"], alice.clone()))]),
            record(vec![("n", node(4, &["Person", "Admin"], alice))]),
        ])
    });
    let client = client(&driver);

    let found = client
        .find_nodes(&["Person"], Some(props(&[("name", Value::from("Alice"))])), None)
        .await
        .unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].id, "1");
    assert!(found[1].has_label("Admin"));
}

#[tokio::test]
async fn test_find_nodes_without_filter_sends_empty_map() {
    let driver = FakeDriver::new(|stmt| {
        assert_eq!(stmt.params.get("properties"), Some(&Value::Map(Params::new())));
        rows(vec![])
    });
    let client = client(&driver);

    let found = client.find_nodes(&["Nobody"], None, None).await.unwrap();

    assert!(found.is_empty());
}

#[tokio::test]
async fn test_find_nodes_rejects_non_node_column() {
    let driver = FakeDriver::new(|_| rows(vec![record(vec![("n", int(3))])]));
    let client = client(&driver);

    let err = client.find_nodes(&["Person"], None, None).await.unwrap_err();

    assert!(matches!(err, GraphError::UnexpectedShape(_)));
}

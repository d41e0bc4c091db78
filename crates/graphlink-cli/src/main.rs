//! CLI entry point for graphlink.
//!
//! Every subcommand writes JSON to stdout; logs go to stderr.

use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use graphlink_client::GraphQueryClient;
use graphlink_core::{ClientConfig, Params, TransactionConfig, Value};

#[derive(Parser)]
#[command(name = "graphlink")]
#[command(about = "Run Cypher against Neo4j and print normalized results as JSON")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: graphlink).
    #[arg(short, long, default_value = "graphlink", global = true)]
    config: String,

    /// Database to run against instead of the configured one.
    #[arg(long, global = true)]
    database: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the server answers and print what it reports about itself.
    Ping,
    /// Run a single Cypher statement.
    Query {
        /// Cypher text.
        cypher: String,
        /// Parameters as a JSON object.
        #[arg(long)]
        params: Option<String>,
    },
    /// Run a JSON array of `{"text", "params"}` statements from stdin in one
    /// write transaction.
    Tx {
        /// Transaction timeout handed to the driver.
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Transaction metadata as a JSON object.
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Create a node.
    CreateNode {
        /// Label to attach (repeatable).
        #[arg(long = "label")]
        labels: Vec<String>,
        /// Properties as a JSON object.
        #[arg(long)]
        props: Option<String>,
    },
    /// Create a relationship between two existing nodes.
    CreateRel {
        /// Start node ID.
        #[arg(long)]
        start: String,
        /// End node ID.
        #[arg(long)]
        end: String,
        /// Relationship type.
        #[arg(long = "type")]
        rel_type: String,
        /// Properties as a JSON object.
        #[arg(long)]
        props: Option<String>,
    },
    /// Find nodes by labels and exact property values.
    FindNodes {
        /// Required label (repeatable).
        #[arg(long = "label")]
        labels: Vec<String>,
        /// Property filter as a JSON object.
        #[arg(long)]
        props: Option<String>,
    },
    /// Walk through the client: people, a relationship, queries, a transaction.
    Demo {
        /// Delete every node in the database first.
        #[arg(long)]
        reset: bool,
    },
}

/// One statement of a `tx` batch.
#[derive(Deserialize)]
struct TxStatement {
    text: String,
    #[serde(default)]
    params: serde_json::Map<String, serde_json::Value>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let config = ClientConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;
    tracing::debug!(?config, "Loaded configuration");

    let client = GraphQueryClient::connect(config).await?;

    let outcome = run(&client, cli.command, cli.database.as_deref()).await;
    let closed = client.close().await;
    outcome?;
    closed?;
    Ok(())
}

async fn run(client: &GraphQueryClient, command: Command, database: Option<&str>) -> anyhow::Result<()> {
    match command {
        Command::Ping => {
            if !client.verify_connectivity().await {
                anyhow::bail!("Neo4j at {} is not reachable", client.config().endpoint);
            }
            let info = client.server_info().await?;
            println!("{}", serde_json::to_string(&info)?);
        }
        Command::Query { cypher, params } => {
            let params = parse_params(params.as_deref())?;
            let result = client.run_query(&cypher, params, database).await?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Tx {
            timeout_secs,
            metadata,
        } => {
            let input = std::io::read_to_string(std::io::stdin())?;
            let statements: Vec<TxStatement> =
                serde_json::from_str(&input).context("Expected a JSON array of statements")?;
            let config = TransactionConfig {
                timeout: timeout_secs.map(Duration::from_secs),
                metadata: parse_params(metadata.as_deref())?,
            };

            let results = client
                .run_transaction(
                    move |tx| {
                        Box::pin(async move {
                            let mut results = Vec::with_capacity(statements.len());
                            for statement in statements {
                                let params = into_params(statement.params);
                                results.push(tx.run(&statement.text, params).await?);
                            }
                            Ok(results)
                        })
                    },
                    Some(config),
                    database,
                )
                .await?;
            println!("{}", serde_json::to_string(&results)?);
        }
        Command::CreateNode { labels, props } => {
            let node = client
                .create_node(&labels, parse_params(props.as_deref())?, database)
                .await?;
            println!("{}", serde_json::to_string(&node)?);
        }
        Command::CreateRel {
            start,
            end,
            rel_type,
            props,
        } => {
            let properties = props.as_deref().map(|p| parse_params(Some(p))).transpose()?;
            let created = client
                .create_relationship(&start, &end, &rel_type, properties, database)
                .await?;
            println!("{}", serde_json::to_string(&created)?);
        }
        Command::FindNodes { labels, props } => {
            let filter = props.as_deref().map(|p| parse_params(Some(p))).transpose()?;
            let nodes = client.find_nodes(&labels, filter, database).await?;
            println!("{}", serde_json::to_string(&nodes)?);
        }
        Command::Demo { reset } => demo(client, reset, database).await?,
    }

    Ok(())
}

async fn demo(client: &GraphQueryClient, reset: bool, database: Option<&str>) -> anyhow::Result<()> {
    if !client.verify_connectivity().await {
        anyhow::bail!("Could not connect to Neo4j. Make sure the database is running.");
    }

    if reset {
        tracing::warn!("Deleting every node before the demo");
        client
            .run_query("MATCH (n) DETACH DELETE n", Params::new(), database)
            .await?;
    }

    let alice = client
        .create_node(&["Person"], person("Alice", 30), database)
        .await?;
    let bob = client
        .create_node(&["Person"], person("Bob", 32), database)
        .await?;
    tracing::info!(alice = %alice.id, bob = %bob.id, "Created people");

    let since = Params::from([("since".to_string(), Value::from(2020))]);
    let knows = client
        .create_relationship(&alice.id, &bob.id, "KNOWS", Some(since), database)
        .await?;

    let friends = client
        .run_query(
            "MATCH (p:Person)-[r:KNOWS]->(friend:Person)
             WHERE p.name = $name
             RETURN p.name AS person, r.since AS since, friend.name AS friend",
            Params::from([("name".to_string(), Value::from("Alice"))]),
            database,
        )
        .await?;

    let people = client.find_nodes(&["Person"], None, database).await?;

    let tagged = client
        .run_transaction(
            |tx| {
                Box::pin(async move {
                    let mut tagged = 0;
                    for name in ["Alice", "Bob"] {
                        let params = Params::from([("name".to_string(), Value::from(name))]);
                        let result = tx
                            .run(
                                "MATCH (p:Person {name: $name}) SET p:DemoUser RETURN p",
                                params,
                            )
                            .await?;
                        tagged += result.len();
                    }
                    Ok(tagged)
                })
            },
            None,
            database,
        )
        .await?;

    let report = serde_json::json!({
        "created": [alice, bob],
        "relationship": knows,
        "friendsOfAlice": friends.records,
        "people": people.len(),
        "taggedInTransaction": tagged,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn person(name: &str, age: i64) -> Params {
    Params::from([
        ("name".to_string(), Value::from(name)),
        ("age".to_string(), Value::from(age)),
    ])
}

/// Parse an optional JSON object into query parameters.
fn parse_params(raw: Option<&str>) -> anyhow::Result<Params> {
    let Some(raw) = raw else {
        return Ok(Params::new());
    };
    let object: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(raw).context("Parameters must be a JSON object")?;
    Ok(into_params(object))
}

fn into_params(object: serde_json::Map<String, serde_json::Value>) -> Params {
    object.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
}

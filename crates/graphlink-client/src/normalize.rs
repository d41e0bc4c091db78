//! Conversion between `neo4rs::BoltType` and normalized [`Value`]s.
//!
//! [`normalize`] is a single recursive dispatch over the driver's closed set
//! of value tags. It is total: every tag maps to a [`Value`] kind, and
//! temporal values that `chrono` cannot represent fall back to the driver's
//! debug text instead of failing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Display};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use neo4rs::{
    BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNode, BoltNull, BoltPath,
    BoltRelation, BoltString, BoltType, BoltUnboundedRelation, DeError,
};
use serde::de::IntoDeserializer;
use serde::Deserialize;

use graphlink_core::{NormalizedNode, NormalizedRelationship, Record, Value};

use crate::driver::RawRecord;

/// Conversion into a normalized [`Value`].
///
/// Implemented for driver values and for `Value` itself, where it is the
/// identity: normalizing twice gives the same result as normalizing once.
pub trait Normalize {
    fn normalize(self) -> Value;
}

impl Normalize for BoltType {
    fn normalize(self) -> Value {
        normalize(self)
    }
}

impl Normalize for Value {
    fn normalize(self) -> Value {
        self
    }
}

/// Normalize one driver value, recursing into collections and graph records.
pub fn normalize(value: BoltType) -> Value {
    match value {
        BoltType::Null(_) => Value::Null,
        BoltType::Boolean(b) => Value::Boolean(b.value),
        BoltType::Integer(i) => Value::Integer(i.value),
        BoltType::Float(f) => Value::Float(f.value),
        BoltType::String(s) => Value::String(s.value),
        BoltType::Bytes(b) => Value::List(
            b.value
                .iter()
                .map(|byte| Value::Integer(i64::from(*byte)))
                .collect(),
        ),
        BoltType::List(xs) => Value::List(xs.value.into_iter().map(normalize).collect()),
        BoltType::Map(m) => Value::Map(normalize_map(m)),
        BoltType::Node(n) => Value::Node(normalize_node(n)),
        BoltType::Relation(r) => Value::Relationship(normalize_relation(r)),
        // Outside a path there are no endpoints to bind to.
        BoltType::UnboundedRelation(r) => Value::Map(BTreeMap::from([
            ("id".to_string(), Value::String(r.id.value.to_string())),
            ("type".to_string(), Value::String(r.typ.value)),
            ("properties".to_string(), Value::Map(normalize_map(r.properties))),
        ])),
        BoltType::Path(p) => normalize_path(&p),
        BoltType::Point2D(p) => Value::Map(BTreeMap::from([
            ("srid".to_string(), Value::Integer(p.sr_id.value)),
            ("x".to_string(), Value::Float(p.x.value)),
            ("y".to_string(), Value::Float(p.y.value)),
        ])),
        BoltType::Point3D(p) => Value::Map(BTreeMap::from([
            ("srid".to_string(), Value::Integer(p.sr_id.value)),
            ("x".to_string(), Value::Float(p.x.value)),
            ("y".to_string(), Value::Float(p.y.value)),
            ("z".to_string(), Value::Float(p.z.value)),
        ])),
        BoltType::Date(d) => {
            let converted: Result<NaiveDate, neo4rs::Error> = d.clone().try_into();
            temporal("Date", &d, converted.map(|date| date.to_string()))
        }
        BoltType::Time(t) => {
            let (time, offset): (NaiveTime, FixedOffset) = t.into();
            Value::String(format!("{time}{offset}"))
        }
        BoltType::LocalTime(t) => {
            let time: NaiveTime = t.into();
            Value::String(time.to_string())
        }
        BoltType::LocalDateTime(dt) => {
            let converted: Result<NaiveDateTime, neo4rs::Error> = dt.clone().try_into();
            temporal(
                "LocalDateTime",
                &dt,
                converted.map(|ndt| ndt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            )
        }
        BoltType::DateTime(dt) => {
            let converted: Result<DateTime<FixedOffset>, neo4rs::Error> = dt.clone().try_into();
            temporal("DateTime", &dt, converted.map(|cdt| cdt.to_rfc3339()))
        }
        BoltType::DateTimeZoneId(dt) => {
            let converted: Result<DateTime<FixedOffset>, neo4rs::Error> = (&dt).try_into();
            temporal("DateTimeZoneId", &dt, converted.map(|cdt| cdt.to_rfc3339()))
        }
        // neo4rs only exposes a duration as saturated total seconds plus
        // nanoseconds, months and days folded in at their average lengths.
        BoltType::Duration(d) => {
            let raw = BoltType::Duration(d);
            let converted: Result<(i64, i64), DeError> =
                Deserialize::deserialize((&raw).into_deserializer());
            temporal(
                "Duration",
                &raw,
                converted.map(|(seconds, nanos)| iso_duration(seconds, nanos)),
            )
        }
    }
}

/// Normalize a driver row into a record keyed by column name.
pub fn normalize_record(raw: RawRecord) -> Record {
    raw.into_iter().map(|(k, v)| (k, normalize(v))).collect()
}

pub fn normalize_node(node: BoltNode) -> NormalizedNode {
    let labels: BTreeSet<String> = node
        .labels
        .value
        .into_iter()
        .filter_map(|label| match label {
            BoltType::String(s) => Some(s.value),
            _ => None,
        })
        .collect();

    NormalizedNode {
        id: node.id.value.to_string(),
        labels,
        properties: normalize_map(node.properties),
    }
}

pub fn normalize_relation(rel: BoltRelation) -> NormalizedRelationship {
    NormalizedRelationship {
        id: rel.id.value.to_string(),
        rel_type: rel.typ.value,
        properties: normalize_map(rel.properties),
        start_node_id: rel.start_node_id.value.to_string(),
        end_node_id: rel.end_node_id.value.to_string(),
    }
}

fn normalize_map(map: BoltMap) -> BTreeMap<String, Value> {
    map.value
        .into_iter()
        .map(|(k, v)| (k.value, normalize(v)))
        .collect()
}

fn bind_relation(rel: BoltUnboundedRelation, start: &str, end: &str) -> NormalizedRelationship {
    NormalizedRelationship {
        id: rel.id.value.to_string(),
        rel_type: rel.typ.value,
        properties: normalize_map(rel.properties),
        start_node_id: start.to_string(),
        end_node_id: end.to_string(),
    }
}

/// Normalize a path into `{start, end, segments, length}`.
///
/// Path indices come in pairs `(rel, node)`: `rel` is a 1-based index into
/// the relationship list, negative when the relationship points backwards
/// along the walk, and `node` indexes the node reached by the step.
fn normalize_path(path: &BoltPath) -> Value {
    let nodes: Vec<NormalizedNode> = path.nodes().into_iter().map(normalize_node).collect();
    let rels = path.rels();
    let indices: Vec<i64> = path.indices().into_iter().map(|i| i.value).collect();

    let Some(first) = nodes.first() else {
        return Value::Map(BTreeMap::from([
            ("segments".to_string(), Value::List(Vec::new())),
            ("length".to_string(), Value::Integer(0)),
        ]));
    };

    let mut segments = Vec::with_capacity(indices.len() / 2);
    let mut current = first.clone();

    for step in indices.chunks(2) {
        let [rel_index, node_index] = step else {
            tracing::warn!(indices = indices.len(), "Odd number of path indices, truncating");
            break;
        };
        let rel = usize::try_from(rel_index.unsigned_abs())
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| rels.get(i));
        let next = usize::try_from(*node_index).ok().and_then(|i| nodes.get(i));

        let (Some(rel), Some(next)) = (rel, next) else {
            tracing::warn!(rel_index, node_index, "Path index out of range, truncating");
            break;
        };

        let relationship = if *rel_index > 0 {
            bind_relation(rel.clone(), &current.id, &next.id)
        } else {
            bind_relation(rel.clone(), &next.id, &current.id)
        };

        segments.push(Value::Map(BTreeMap::from([
            ("start".to_string(), Value::Node(current.clone())),
            ("relationship".to_string(), Value::Relationship(relationship)),
            ("end".to_string(), Value::Node(next.clone())),
        ])));
        current = next.clone();
    }

    Value::Map(BTreeMap::from([
        ("start".to_string(), Value::Node(first.clone())),
        ("end".to_string(), Value::Node(current)),
        ("length".to_string(), Value::Integer(segments.len() as i64)),
        ("segments".to_string(), Value::List(segments)),
    ]))
}

fn temporal<T: Debug, E: Display>(
    kind: &'static str,
    raw: &T,
    converted: Result<String, E>,
) -> Value {
    match converted {
        Ok(text) => Value::String(text),
        Err(e) => {
            tracing::warn!(kind, error = %e, "Temporal value not representable, keeping driver text");
            Value::String(format!("{raw:?}"))
        }
    }
}

/// Signed ISO-8601 duration text, e.g. `PT90S`, `PT1.5S` or `-PT5S`.
fn iso_duration(seconds: i64, nanos: i64) -> String {
    let total = i128::from(seconds) * 1_000_000_000 + i128::from(nanos);
    let sign = if total < 0 { "-" } else { "" };
    let total = total.unsigned_abs();
    let (secs, frac) = (total / 1_000_000_000, total % 1_000_000_000);
    if frac == 0 {
        return format!("{sign}PT{secs}S");
    }
    let frac = format!("{frac:09}");
    format!("{sign}PT{secs}.{}S", frac.trim_end_matches('0'))
}

// ── Parameter Encoding ───────────────────────────────────────────

/// Encode a normalized value as a query parameter.
///
/// Nodes and relationships have no parameter form, so they are sent as maps
/// of their fields.
pub fn to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Boolean(b) => BoltType::Boolean(BoltBoolean { value: *b }),
        Value::Integer(i) => BoltType::Integer(BoltInteger::new(*i)),
        Value::Float(f) => BoltType::Float(BoltFloat::new(*f)),
        Value::String(s) => BoltType::String(BoltString::from(s.as_str())),
        Value::List(xs) => BoltType::List(bolt_list(xs.iter().map(to_bolt))),
        Value::Map(m) => BoltType::Map(bolt_map(m)),
        Value::Node(n) => {
            let labels = bolt_list(n.labels.iter().map(|l| BoltType::from(l.as_str())));
            let entries: BoltMap = [
                (BoltString::from("id"), BoltType::from(n.id.as_str())),
                (BoltString::from("labels"), BoltType::List(labels)),
                (BoltString::from("properties"), BoltType::Map(bolt_map(&n.properties))),
            ]
            .into_iter()
            .collect();
            BoltType::Map(entries)
        }
        Value::Relationship(r) => {
            let entries: BoltMap = [
                (BoltString::from("id"), BoltType::from(r.id.as_str())),
                (BoltString::from("type"), BoltType::from(r.rel_type.as_str())),
                (BoltString::from("properties"), BoltType::Map(bolt_map(&r.properties))),
                (BoltString::from("startNodeId"), BoltType::from(r.start_node_id.as_str())),
                (BoltString::from("endNodeId"), BoltType::from(r.end_node_id.as_str())),
            ]
            .into_iter()
            .collect();
            BoltType::Map(entries)
        }
    }
}

fn bolt_list(items: impl Iterator<Item = BoltType>) -> BoltList {
    items.collect::<Vec<_>>().into()
}

fn bolt_map(map: &BTreeMap<String, Value>) -> BoltMap {
    map.iter()
        .map(|(k, v)| (BoltString::from(k.as_str()), to_bolt(v)))
        .collect()
}

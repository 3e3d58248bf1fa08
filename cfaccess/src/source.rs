//! Source objects: the annotated resources that describe desired
//! applications.
//!
//! Objects are read from a JSON document in the shape `kubectl get -o json`
//! produces, either a `List` with `items` or a single object.

use std::{collections::BTreeMap, fmt::Display, io::Read as _};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceObject {
    pub namespace: String,
    pub name: String,
    pub annotations: BTreeMap<String, String>,
    /// Set when the object is being deleted.
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl SourceObject {
    pub fn new(namespace: &str, name: &str) -> SourceObject {
        SourceObject {
            namespace: namespace.to_string(),
            name: name.to_string(),
            annotations: BTreeMap::new(),
            deletion_timestamp: None,
        }
    }

    pub fn with_annotation(mut self, key: &str, value: &str) -> SourceObject {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }
}

impl Display for SourceObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    name: String,
    namespace: Option<String>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
    deletion_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Item {
    metadata: ObjectMeta,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Document {
    List { items: Vec<Item> },
    Single(Item),
}

impl From<Item> for SourceObject {
    fn from(item: Item) -> Self {
        let metadata = item.metadata;
        SourceObject {
            namespace: metadata
                .namespace
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            name: metadata.name,
            annotations: metadata.annotations,
            deletion_timestamp: metadata.deletion_timestamp,
        }
    }
}

pub fn parse_objects(json: &str) -> Result<Vec<SourceObject>> {
    let document: Document = serde_json::from_str(json).context("parsing source objects")?;
    Ok(match document {
        Document::List { items } => items.into_iter().map(SourceObject::from).collect(),
        Document::Single(item) => vec![item.into()],
    })
}

/// Read the objects from `path`, or from stdin if `path` is `-`.
pub fn read_objects(path: &str) -> Result<Vec<SourceObject>> {
    let json = if path == "-" {
        let mut s = String::new();
        std::io::stdin()
            .read_to_string(&mut s)
            .context("reading source objects from stdin")?;
        s
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading source objects from {}", path))?
    };
    parse_objects(&json)
}

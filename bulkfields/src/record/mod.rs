// Record, import item and export entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Store-assigned record identifier. Ordering is the tie-break order for
/// lookups that match more than one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(RecordId)
    }
}

/// A loaded record with its sparse field mapping
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub record_type: String,
    pub title: String,
    pub permalink: String,
    pub created_at: DateTime<Utc>,
    pub fields: BTreeMap<String, String>,
}

impl Record {
    /// Stored value for `key`; never-written keys read as empty.
    pub fn field(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }
}

/// One entry of an import document.
///
/// `meta` is the canonical name of the field mapping; `fields` is accepted
/// too. Numbers and booleans are stringified and `null` reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImportItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(alias = "fields", default, deserialize_with = "string_map")]
    pub meta: BTreeMap<String, String>,
}

impl ImportItem {
    pub fn new(title: &str, permalink: &str, meta: &[(&str, &str)]) -> Self {
        ImportItem {
            title: title.to_string(),
            permalink: permalink.to_string(),
            meta: meta
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Value carried for `key`, empty when the item omits it.
    pub fn field(&self, key: &str) -> &str {
        self.meta.get(key).map(String::as_str).unwrap_or("")
    }
}

fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    map.into_iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    return Err(D::Error::custom(format!(
                        "field '{key}' must be a string, got {other}"
                    )))
                }
            };
            Ok((key, text))
        })
        .collect()
}

/// One entry of an export document. `meta` keeps the schema's key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportEntry {
    #[serde(rename = "ID")]
    pub id: RecordId,
    pub title: String,
    pub permalink: String,
    #[serde(serialize_with = "ordered_map")]
    pub meta: Vec<(String, String)>,
}

fn ordered_map<S>(entries: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(entries.iter().map(|(k, v)| (k, v)))
}

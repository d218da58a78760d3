use crate::error::{BulkFieldsError, Result};
use crate::record::{ImportItem, RecordId};
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rule used to find the existing record an import item belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    ByTitle,
    ByPermalink,
    ByFieldValue(String),
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStrategy::ByTitle => write!(f, "title"),
            MatchStrategy::ByPermalink => write!(f, "permalink"),
            MatchStrategy::ByFieldValue(key) => write!(f, "field:{key}"),
        }
    }
}

/// Parses `title`, `permalink` or `field:<key>`.
impl FromStr for MatchStrategy {
    type Err = BulkFieldsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "title" => Ok(MatchStrategy::ByTitle),
            "permalink" => Ok(MatchStrategy::ByPermalink),
            other => match other.strip_prefix("field:") {
                Some(key) if !key.trim().is_empty() => {
                    Ok(MatchStrategy::ByFieldValue(key.trim().to_string()))
                }
                Some(_) => Err(BulkFieldsError::InvalidStrategy(
                    "field strategy needs a key, e.g. field:sku".into(),
                )),
                None => Err(BulkFieldsError::InvalidStrategy(format!(
                    "unknown strategy '{other}' (expected title, permalink or field:<key>)"
                ))),
            },
        }
    }
}

/// Resolves import items to record ids of one record type.
pub struct ImportMatcher<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    record_type: &'a str,
}

impl<'a, S: RecordStore + ?Sized> ImportMatcher<'a, S> {
    pub fn new(store: &'a S, record_type: &'a str) -> Self {
        ImportMatcher { store, record_type }
    }

    /// Find the record `item` refers to. When several records qualify the
    /// lowest id wins. Lookup failures are reported as no match.
    pub fn resolve(&self, item: &ImportItem, strategy: &MatchStrategy) -> Option<RecordId> {
        let found = match strategy {
            MatchStrategy::ByTitle => self.by_title(item),
            MatchStrategy::ByPermalink => self.by_permalink(item),
            MatchStrategy::ByFieldValue(key) => self.by_field_value(item, key),
        };

        match found {
            Ok(id) => id,
            Err(e) => {
                log::warn!("Lookup by {strategy} failed for '{}': {e}", item.title);
                None
            }
        }
    }

    fn by_title(&self, item: &ImportItem) -> Result<Option<RecordId>> {
        let record = self.store.find_by_title(self.record_type, &item.title)?;
        Ok(record.map(|r| r.id))
    }

    // URL lookup is not scoped by record type.
    fn by_permalink(&self, item: &ImportItem) -> Result<Option<RecordId>> {
        self.store.resolve_url_to_id(&item.permalink)
    }

    fn by_field_value(&self, item: &ImportItem, key: &str) -> Result<Option<RecordId>> {
        let record = self
            .store
            .find_one_by_field(self.record_type, key, item.field(key))?;
        Ok(record.map(|r| r.id))
    }
}

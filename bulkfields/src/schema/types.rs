use crate::error::BulkFieldsError;
use crate::sanitize::sanitize_text;
use serde::{Deserialize, Serialize};

pub const DEFAULT_RECORD_TYPE: &str = "post";
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Settings blob exactly as persisted in settings.yaml, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSettings {
    #[serde(default)]
    pub record_type: Option<String>,
    #[serde(default)]
    pub page_size: Option<i64>,
    #[serde(default)]
    pub fields: Vec<FieldDefault>,
}

/// One configured field: the key and the value shown when nothing is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefault {
    pub key: String,
    #[serde(default)]
    pub default: String,
}

/// Ordered set of editable field keys with their defaults.
///
/// Keys are sanitized, blank keys are dropped and a repeated key keeps the
/// position of its first occurrence with the default of its last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSchema {
    entries: Vec<FieldDefault>,
}

impl FieldSchema {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut schema = FieldSchema::default();
        for (key, default) in entries {
            schema.push(key.as_ref(), default.as_ref());
        }
        schema
    }

    fn push(&mut self, key: &str, default: &str) {
        let key = sanitize_text(key);
        if key.trim().is_empty() {
            return;
        }
        let default = sanitize_text(default);
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(existing) => existing.default = default,
            None => self.entries.push(FieldDefault { key, default }),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDefault> {
        self.entries.iter()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn default_for(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.default.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Normalized configuration for every bulk edit, import and export operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSettings", into = "RawSettings")]
pub struct Settings {
    pub record_type: String,
    pub page_size: u32,
    pub fields: FieldSchema,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            record_type: DEFAULT_RECORD_TYPE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            fields: FieldSchema::default(),
        }
    }
}

impl Settings {
    pub fn new(record_type: &str, page_size: u32, fields: FieldSchema) -> Self {
        Settings {
            record_type: record_type.to_string(),
            page_size,
            fields,
        }
    }
}

impl TryFrom<RawSettings> for Settings {
    type Error = BulkFieldsError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        let record_type = raw
            .record_type
            .map(|t| sanitize_text(&t))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_RECORD_TYPE.to_string());

        let page_size = match raw.page_size {
            None => DEFAULT_PAGE_SIZE,
            Some(n) if n > 0 => u32::try_from(n).map_err(|_| {
                BulkFieldsError::Settings(format!("page_size {n} is too large"))
            })?,
            Some(n) => {
                return Err(BulkFieldsError::Settings(format!(
                    "page_size must be a positive integer, got {n}"
                )))
            }
        };

        let fields = FieldSchema::new(raw.fields.iter().map(|f| (&f.key, &f.default)));

        Ok(Settings {
            record_type,
            page_size,
            fields,
        })
    }
}

impl From<Settings> for RawSettings {
    fn from(settings: Settings) -> Self {
        RawSettings {
            record_type: Some(settings.record_type),
            page_size: Some(i64::from(settings.page_size)),
            fields: settings.fields.entries,
        }
    }
}

// Import pipeline: parse the whole document, resolve each item to a record,
// merge the fields of resolved items

mod matcher;
mod merger;

pub use matcher::{ImportMatcher, MatchStrategy};
pub use merger::ImportMerger;

use crate::error::{BulkFieldsError, Result};
use crate::record::{ImportItem, RecordId};
use crate::schema::Settings;
use crate::store::RecordStore;
use serde::Serialize;

/// What happened to one import item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Merged { id: RecordId, fields: usize },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub index: usize,
    pub title: String,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

/// Per-item results of an import. Skipped items are not errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub strategy: String,
    pub items: Vec<ItemReport>,
}

impl ImportReport {
    pub fn merged(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.outcome, ItemOutcome::Merged { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.items.len() - self.merged()
    }
}

/// Parse an import document: a JSON array of item objects. Any structural
/// problem rejects the whole document.
pub fn parse_document(text: &str) -> Result<Vec<ImportItem>> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| BulkFieldsError::MalformedImport(format!("invalid JSON: {e}")))?;

    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        other => {
            return Err(BulkFieldsError::MalformedImport(format!(
                "expected an array of items, got {}",
                json_kind(&other)
            )))
        }
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            if !entry.is_object() {
                return Err(BulkFieldsError::MalformedImport(format!(
                    "item {index} is {}, expected an object",
                    json_kind(&entry)
                )));
            }
            serde_json::from_value(entry)
                .map_err(|e| BulkFieldsError::MalformedImport(format!("item {index}: {e}")))
        })
        .collect()
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Resolve and merge every item in order. Unmatched items are skipped; a
/// write failure aborts with earlier merges left in place.
pub fn import_items<S: RecordStore + ?Sized>(
    store: &S,
    settings: &Settings,
    items: &[ImportItem],
    strategy: &MatchStrategy,
) -> Result<ImportReport> {
    let matcher = ImportMatcher::new(store, &settings.record_type);
    let merger = ImportMerger::new(store);
    let mut report = ImportReport {
        strategy: strategy.to_string(),
        items: Vec::with_capacity(items.len()),
    };

    for (index, item) in items.iter().enumerate() {
        let outcome = match matcher.resolve(item, strategy) {
            Some(id) => ItemOutcome::Merged {
                id,
                fields: merger.merge(id, item)?,
            },
            None => {
                log::debug!("Import item {index} ('{}') matched no record", item.title);
                ItemOutcome::Skipped
            }
        };
        report.items.push(ItemReport {
            index,
            title: item.title.clone(),
            outcome,
        });
    }

    log::info!(
        "Imported {} item(s) by {strategy}: {} merged, {} skipped",
        report.items.len(),
        report.merged(),
        report.skipped()
    );
    Ok(report)
}

/// Parse `text` as an import document and apply it.
pub fn import_str<S: RecordStore + ?Sized>(
    store: &S,
    settings: &Settings,
    text: &str,
    strategy: &MatchStrategy,
) -> Result<ImportReport> {
    let items = parse_document(text)?;
    import_items(store, settings, &items, strategy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;
    use crate::system_db::SystemDb;
    use pretty_assertions::assert_eq;

    fn settings() -> Settings {
        Settings::new("post", 10, FieldSchema::new([("color", "red"), ("size", "M")]))
    }

    fn shirt_store() -> (SystemDb, RecordId) {
        let db = SystemDb::open_in_memory().unwrap();
        let id = db.insert_record("post", "Shirt", None, "").unwrap();
        db.set_field(id, "color", "red").unwrap();
        db.set_field(id, "size", "M").unwrap();
        (db, id)
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let err = parse_document(r#"{"title":"Shirt"}"#).unwrap_err();
        assert!(matches!(err, BulkFieldsError::MalformedImport(_)));
    }

    #[test]
    fn test_parse_rejects_non_object_item() {
        let err = parse_document(r#"[{"title":"Shirt"}, "oops"]"#).unwrap_err();
        match err {
            BulkFieldsError::MalformedImport(msg) => assert!(msg.contains("item 1")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(matches!(
            parse_document("[{"),
            Err(BulkFieldsError::MalformedImport(_))
        ));
    }

    #[test]
    fn test_parse_empty_array() {
        assert!(parse_document("[]").unwrap().is_empty());
    }

    #[test]
    fn test_title_match_merges_subset() {
        let (db, id) = shirt_store();
        let report = import_str(
            &db,
            &settings(),
            r#"[{"title":"Shirt","permalink":"","meta":{"color":"blue"}}]"#,
            &MatchStrategy::ByTitle,
        )
        .unwrap();

        assert_eq!(report.merged(), 1);
        assert_eq!(
            report.items[0].outcome,
            ItemOutcome::Merged { id, fields: 1 }
        );
        let record = db.get_record(id).unwrap().unwrap();
        assert_eq!(record.field("color"), "blue");
        assert_eq!(record.field("size"), "M");
    }

    #[test]
    fn test_unmatched_items_change_nothing() {
        let (db, _) = shirt_store();
        let before = db.query_all("post").unwrap();

        let text = r#"[{"title":"Ghost","permalink":"/post/ghost/","meta":{"color":"none","sku":"G"}}]"#;
        for strategy in [
            MatchStrategy::ByTitle,
            MatchStrategy::ByPermalink,
            MatchStrategy::ByFieldValue("sku".into()),
        ] {
            let report = import_str(&db, &settings(), text, &strategy).unwrap();
            assert_eq!(report.merged(), 0);
            assert_eq!(report.skipped(), 1);
        }

        assert_eq!(db.query_all("post").unwrap(), before);
    }

    #[test]
    fn test_malformed_document_writes_nothing() {
        let (db, id) = shirt_store();
        let text = r#"[{"title":"Shirt","meta":{"color":"blue"}}, 42]"#;
        assert!(import_str(&db, &settings(), text, &MatchStrategy::ByTitle).is_err());
        assert_eq!(db.get_field(id, "color").unwrap(), "red");
    }

    #[test]
    fn test_report_serializes_outcomes() {
        let (db, _) = shirt_store();
        let report = import_str(
            &db,
            &settings(),
            r#"[{"title":"Shirt","meta":{}},{"title":"Nope","meta":{}}]"#,
            &MatchStrategy::ByTitle,
        )
        .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["strategy"], "title");
        assert_eq!(json["items"][0]["outcome"], "merged");
        assert_eq!(json["items"][0]["id"], 1);
        assert_eq!(json["items"][1]["outcome"], "skipped");
    }

    /// A store whose every read fails, as with a locked or corrupt database.
    struct UnavailableStore;

    impl RecordStore for UnavailableStore {
        fn query(
            &self,
            _record_type: &str,
            _page_size: u32,
            _page: u64,
            _search: Option<&str>,
        ) -> Result<crate::store::QueryPage> {
            Err(BulkFieldsError::Other("database is locked".into()))
        }

        fn query_all(&self, _record_type: &str) -> Result<Vec<crate::record::Record>> {
            Err(BulkFieldsError::Other("database is locked".into()))
        }

        fn get_field(&self, _id: RecordId, _key: &str) -> Result<String> {
            Err(BulkFieldsError::Other("database is locked".into()))
        }

        fn set_field(&self, id: RecordId, _key: &str, _value: &str) -> Result<()> {
            panic!("unexpected write to record {id}")
        }

        fn resolve_url_to_id(&self, _url: &str) -> Result<Option<RecordId>> {
            Err(BulkFieldsError::Other("database is locked".into()))
        }

        fn find_by_title(
            &self,
            _record_type: &str,
            _title: &str,
        ) -> Result<Option<crate::record::Record>> {
            Err(BulkFieldsError::Other("database is locked".into()))
        }

        fn find_one_by_field(
            &self,
            _record_type: &str,
            _key: &str,
            _value: &str,
        ) -> Result<Option<crate::record::Record>> {
            Err(BulkFieldsError::Other("database is locked".into()))
        }
    }

    #[test]
    fn test_lookup_errors_are_no_match() {
        let item = ImportItem::new("Shirt", "/post/shirt/", &[("sku", "S-1")]);
        let strategies = [
            MatchStrategy::ByTitle,
            MatchStrategy::ByPermalink,
            MatchStrategy::ByFieldValue("sku".into()),
        ];

        let matcher = ImportMatcher::new(&UnavailableStore, "post");
        for strategy in &strategies {
            assert_eq!(matcher.resolve(&item, strategy), None);
        }

        for strategy in &strategies {
            let report =
                import_items(&UnavailableStore, &settings(), &[item.clone()], strategy).unwrap();
            assert_eq!(report.skipped(), 1);
            assert_eq!(report.items[0].outcome, ItemOutcome::Skipped);
        }
    }
}

use crate::error::{BulkFieldsError, Result};
use crate::permalink;
use crate::record::{Record, RecordId};
use crate::store::{QueryPage, RecordStore};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;

const RECORD_COLUMNS: &str = "id, record_type, title, permalink, created_at";

/// SQLite-backed record store: records plus their sparse field values.
pub struct SystemDb {
    conn: Connection,
}

impl SystemDb {
    /// Open or create the record database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = SystemDb { conn };
        db.initialize_tables()?;
        Ok(db)
    }

    /// Open an in-memory record database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = SystemDb { conn };
        db.initialize_tables()?;
        Ok(db)
    }

    fn initialize_tables(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                record_type TEXT NOT NULL,
                title TEXT NOT NULL,
                permalink TEXT NOT NULL,
                permalink_key TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL DEFAULT '',
                search_text TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_type_title ON records(record_type, title);

            CREATE TABLE IF NOT EXISTS record_fields (
                record_id INTEGER NOT NULL REFERENCES records(id) ON DELETE CASCADE,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (record_id, key)
            );

            CREATE INDEX IF NOT EXISTS idx_record_fields_key_value ON record_fields(key, value);
            ",
        )?;
        Ok(())
    }

    // ── Records ──────────────────────────────────────────────────────

    /// Insert a record. Without an explicit permalink one is built from the
    /// title, suffixed until it is unique; an explicit permalink that is
    /// already taken is an error.
    pub fn insert_record(
        &self,
        record_type: &str,
        title: &str,
        permalink: Option<&str>,
        content: &str,
    ) -> Result<RecordId> {
        let permalink = match permalink {
            Some(p) => {
                if self.resolve_key(&permalink::normalize(p))?.is_some() {
                    return Err(BulkFieldsError::PermalinkConflict(p.to_string()));
                }
                p.to_string()
            }
            None => self.free_permalink(record_type, title)?,
        };

        self.conn.execute(
            "INSERT INTO records
                 (record_type, title, permalink, permalink_key, content, search_text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record_type,
                title,
                permalink,
                permalink::normalize(&permalink),
                content,
                search_text(title, content),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(RecordId(self.conn.last_insert_rowid()))
    }

    fn free_permalink(&self, record_type: &str, title: &str) -> Result<String> {
        let mut attempt = 1;
        loop {
            let candidate = permalink::build(record_type, title, attempt);
            if self.resolve_key(&permalink::normalize(&candidate))?.is_none() {
                return Ok(candidate);
            }
            attempt += 1;
        }
    }

    /// Get a record by id.
    pub fn get_record(&self, id: RecordId) -> Result<Option<Record>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id.0], read_record_row)
            .optional()?;
        row.map(|r| self.hydrate(r)).transpose()
    }

    fn resolve_key(&self, key: &str) -> Result<Option<RecordId>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM records WHERE permalink_key = ?1",
                params![key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(id.map(RecordId))
    }

    fn record_exists(&self, id: RecordId) -> Result<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM records WHERE id = ?1", params![id.0], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn load_fields(&self, id: RecordId) -> Result<BTreeMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT key, value FROM record_fields WHERE record_id = ?1")?;
        let rows = stmt.query_map(params![id.0], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut fields = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            fields.insert(key, value);
        }
        Ok(fields)
    }

    fn hydrate(&self, row: RecordRow) -> Result<Record> {
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| BulkFieldsError::Other(format!("Bad timestamp on record {}: {e}", row.id)))?
            .with_timezone(&Utc);
        let id = RecordId(row.id);
        Ok(Record {
            id,
            record_type: row.record_type,
            title: row.title,
            permalink: row.permalink,
            created_at,
            fields: self.load_fields(id)?,
        })
    }

    fn select_records(&self, sql: &str, values: &[Value]) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), read_record_row)?;

        let mut raw = Vec::new();
        for row in rows {
            raw.push(row?);
        }
        raw.into_iter().map(|r| self.hydrate(r)).collect()
    }
}

impl RecordStore for SystemDb {
    fn query(
        &self,
        record_type: &str,
        page_size: u32,
        page: u64,
        search: Option<&str>,
    ) -> Result<QueryPage> {
        let (filter, mut values) = search_filter(record_type, search);

        let total_found: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM records WHERE {filter}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let offset = (page.max(1) - 1)
            .saturating_mul(u64::from(page_size))
            .min(i64::MAX as u64) as i64;
        values.push(Value::Integer(i64::from(page_size)));
        values.push(Value::Integer(offset));
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE {filter} ORDER BY id LIMIT ?{} OFFSET ?{}",
            values.len() - 1,
            values.len()
        );
        let records = self.select_records(&sql, &values)?;

        Ok(QueryPage {
            records,
            total_found: total_found as u64,
        })
    }

    fn query_all(&self, record_type: &str) -> Result<Vec<Record>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE record_type = ?1 ORDER BY id");
        self.select_records(&sql, &[Value::Text(record_type.to_string())])
    }

    fn get_field(&self, id: RecordId, key: &str) -> Result<String> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM record_fields WHERE record_id = ?1 AND key = ?2",
                params![id.0, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value.unwrap_or_default())
    }

    fn set_field(&self, id: RecordId, key: &str, value: &str) -> Result<()> {
        if !self.record_exists(id)? {
            return Err(BulkFieldsError::NotFound(format!("record {id}")));
        }
        self.conn.execute(
            "INSERT INTO record_fields (record_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(record_id, key) DO UPDATE SET value = excluded.value",
            params![id.0, key, value],
        )?;
        Ok(())
    }

    fn resolve_url_to_id(&self, url: &str) -> Result<Option<RecordId>> {
        let key = permalink::normalize(url);
        if key.is_empty() {
            return Ok(None);
        }
        self.resolve_key(&key)
    }

    fn find_by_title(&self, record_type: &str, title: &str) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE record_type = ?1 AND title = ?2 ORDER BY id LIMIT 1"
        );
        let found = self.select_records(
            &sql,
            &[
                Value::Text(record_type.to_string()),
                Value::Text(title.to_string()),
            ],
        )?;
        Ok(found.into_iter().next())
    }

    fn find_one_by_field(
        &self,
        record_type: &str,
        key: &str,
        value: &str,
    ) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT {cols} FROM records r
             JOIN record_fields f ON f.record_id = r.id
             WHERE r.record_type = ?1 AND f.key = ?2 AND f.value = ?3
             ORDER BY r.id LIMIT 1",
            cols = "r.id, r.record_type, r.title, r.permalink, r.created_at"
        );
        let found = self.select_records(
            &sql,
            &[
                Value::Text(record_type.to_string()),
                Value::Text(key.to_string()),
                Value::Text(value.to_string()),
            ],
        )?;
        Ok(found.into_iter().next())
    }
}

/// Raw `records` row before its fields are loaded
struct RecordRow {
    id: i64,
    record_type: String,
    title: String,
    permalink: String,
    created_at: String,
}

fn read_record_row(row: &Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        record_type: row.get(1)?,
        title: row.get(2)?,
        permalink: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Lowercased title and content, searched instead of the raw columns since
/// SQLite's LIKE only folds ASCII letters. Search terms never contain the
/// newline separator, so a term matches here iff it matches one of the two.
fn search_text(title: &str, content: &str) -> String {
    format!("{}\n{}", title.to_lowercase(), content.to_lowercase())
}

/// Build the WHERE clause for a paged query. Every whitespace-separated
/// search term must appear (case-insensitively) in the title or the content.
fn search_filter(record_type: &str, search: Option<&str>) -> (String, Vec<Value>) {
    let mut clause = String::from("record_type = ?1");
    let mut values = vec![Value::Text(record_type.to_string())];

    for term in search.unwrap_or("").split_whitespace() {
        values.push(Value::Text(format!("%{}%", escape_like(&term.to_lowercase()))));
        let n = values.len();
        clause.push_str(&format!(" AND search_text LIKE ?{n} ESCAPE '\\'"));
    }

    (clause, values)
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SystemDb {
        let db = SystemDb::open_in_memory().unwrap();
        db.insert_record("post", "Red Shirt", None, "cotton tee").unwrap();
        db.insert_record("post", "Blue Jeans", None, "denim").unwrap();
        db.insert_record("post", "Green Hat", None, "wool 100%").unwrap();
        db.insert_record("page", "About", None, "").unwrap();
        db
    }

    #[test]
    fn test_insert_and_get_record() {
        let db = SystemDb::open_in_memory().unwrap();
        let id = db.insert_record("post", "Hello World", None, "Body").unwrap();

        let record = db.get_record(id).unwrap().unwrap();
        assert_eq!(record.title, "Hello World");
        assert_eq!(record.permalink, "/post/hello-world/");
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_generated_permalinks_are_suffixed() {
        let db = SystemDb::open_in_memory().unwrap();
        let a = db.insert_record("post", "Shirt", None, "").unwrap();
        let b = db.insert_record("post", "Shirt", None, "").unwrap();

        assert_eq!(db.get_record(a).unwrap().unwrap().permalink, "/post/shirt/");
        assert_eq!(db.get_record(b).unwrap().unwrap().permalink, "/post/shirt-2/");
    }

    #[test]
    fn test_explicit_permalink_conflict() {
        let db = SystemDb::open_in_memory().unwrap();
        db.insert_record("post", "Shirt", Some("/shop/shirt/"), "").unwrap();
        let err = db
            .insert_record("post", "Other", Some("https://example.com/shop/shirt"), "")
            .unwrap_err();
        assert!(matches!(err, BulkFieldsError::PermalinkConflict(_)));
    }

    #[test]
    fn test_query_pages_in_id_order() {
        let db = seeded();
        let first = db.query("post", 2, 1, None).unwrap();
        assert_eq!(first.total_found, 3);
        assert_eq!(
            first.records.iter().map(|r| r.title.as_str()).collect::<Vec<_>>(),
            vec!["Red Shirt", "Blue Jeans"]
        );

        let second = db.query("post", 2, 2, None).unwrap();
        assert_eq!(second.records.len(), 1);
        assert_eq!(second.records[0].title, "Green Hat");

        let beyond = db.query("post", 2, 9, None).unwrap();
        assert!(beyond.records.is_empty());
        assert_eq!(beyond.total_found, 3);
    }

    #[test]
    fn test_query_search_title_and_content() {
        let db = seeded();
        let by_title = db.query("post", 10, 1, Some("shirt")).unwrap();
        assert_eq!(by_title.total_found, 1);
        assert_eq!(by_title.records[0].title, "Red Shirt");

        let by_content = db.query("post", 10, 1, Some("DENIM")).unwrap();
        assert_eq!(by_content.records[0].title, "Blue Jeans");

        let all_terms = db.query("post", 10, 1, Some("red tee")).unwrap();
        assert_eq!(all_terms.total_found, 1);

        let none = db.query("post", 10, 1, Some("red denim")).unwrap();
        assert_eq!(none.total_found, 0);
    }

    #[test]
    fn test_query_search_folds_non_ascii_case() {
        let db = SystemDb::open_in_memory().unwrap();
        db.insert_record("post", "Äpfel und Birnen", None, "frisch vom MARKT").unwrap();
        db.insert_record("post", "Ölkanne", None, "").unwrap();

        assert_eq!(db.query("post", 10, 1, Some("ÄPFEL")).unwrap().total_found, 1);
        assert_eq!(db.query("post", 10, 1, Some("äpfel markt")).unwrap().total_found, 1);
        assert_eq!(db.query("post", 10, 1, Some("ölKANNE")).unwrap().total_found, 1);
        assert_eq!(db.query("post", 10, 1, Some("birnen ölkanne")).unwrap().total_found, 0);
    }

    #[test]
    fn test_query_search_escapes_wildcards() {
        let db = seeded();
        assert_eq!(db.query("post", 10, 1, Some("100%")).unwrap().total_found, 1);
        assert_eq!(db.query("post", 10, 1, Some("%")).unwrap().total_found, 1);
        assert_eq!(db.query("post", 10, 1, Some("_")).unwrap().total_found, 0);
    }

    #[test]
    fn test_blank_search_is_no_filter() {
        let db = seeded();
        assert_eq!(db.query("post", 10, 1, Some("   ")).unwrap().total_found, 3);
    }

    #[test]
    fn test_set_and_get_field() {
        let db = seeded();
        let id = RecordId(1);
        assert_eq!(db.get_field(id, "color").unwrap(), "");

        db.set_field(id, "color", "red").unwrap();
        db.set_field(id, "color", "blue").unwrap();
        assert_eq!(db.get_field(id, "color").unwrap(), "blue");

        let record = db.get_record(id).unwrap().unwrap();
        assert_eq!(record.fields.len(), 1);
    }

    #[test]
    fn test_set_field_unknown_record() {
        let db = seeded();
        let err = db.set_field(RecordId(99), "color", "red").unwrap_err();
        assert!(matches!(err, BulkFieldsError::NotFound(_)));
    }

    #[test]
    fn test_resolve_url_to_id() {
        let db = seeded();
        assert_eq!(
            db.resolve_url_to_id("https://shop.example/post/blue-jeans/?x=1").unwrap(),
            Some(RecordId(2))
        );
        assert_eq!(db.resolve_url_to_id("/post/nothing/").unwrap(), None);
        assert_eq!(db.resolve_url_to_id("").unwrap(), None);
    }

    #[test]
    fn test_find_by_title_lowest_id_wins() {
        let db = seeded();
        let dup = db.insert_record("post", "Red Shirt", None, "").unwrap();
        assert!(dup > RecordId(1));

        let found = db.find_by_title("post", "Red Shirt").unwrap().unwrap();
        assert_eq!(found.id, RecordId(1));
        assert!(db.find_by_title("page", "Red Shirt").unwrap().is_none());
        assert!(db.find_by_title("post", "red shirt").unwrap().is_none());
    }

    #[test]
    fn test_find_one_by_field() {
        let db = seeded();
        db.set_field(RecordId(3), "sku", "A1").unwrap();
        db.set_field(RecordId(2), "sku", "A1").unwrap();
        db.set_field(RecordId(4), "sku", "A1").unwrap();

        let found = db.find_one_by_field("post", "sku", "A1").unwrap().unwrap();
        assert_eq!(found.id, RecordId(2));
        assert_eq!(found.field("sku"), "A1");

        assert!(db.find_one_by_field("post", "sku", "B2").unwrap().is_none());
    }

    #[test]
    fn test_query_all_scoped_by_type() {
        let db = seeded();
        assert_eq!(db.query_all("post").unwrap().len(), 3);
        assert_eq!(db.query_all("page").unwrap().len(), 1);
    }
}

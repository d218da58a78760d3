use crate::edit::{BulkEditSession, Edits, KeyPolicy, Page};
use crate::error::{BulkFieldsError, Result};
use crate::export;
use crate::import::{self, ImportReport, MatchStrategy};
use crate::record::{ExportEntry, Record, RecordId};
use crate::schema::{load_settings, save_settings, Settings};
use crate::system_db::SystemDb;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.yaml";
pub const DATABASE_FILE: &str = "_records.db";

/// One page of a record query plus the number of records matching overall.
#[derive(Debug, Clone)]
pub struct QueryPage {
    pub records: Vec<Record>,
    pub total_found: u64,
}

/// Persistence seam used by the edit session, the import pipeline and the
/// exporter. Lookups returning a single record resolve ties to the lowest id.
pub trait RecordStore {
    /// Records of `record_type` on the 1-based `page`, `page_size` per page,
    /// optionally narrowed by a free-text search.
    fn query(
        &self,
        record_type: &str,
        page_size: u32,
        page: u64,
        search: Option<&str>,
    ) -> Result<QueryPage>;

    /// Every record of `record_type` in natural (ascending id) order.
    fn query_all(&self, record_type: &str) -> Result<Vec<Record>>;

    /// Stored value of a field, empty when it was never written.
    fn get_field(&self, id: RecordId, key: &str) -> Result<String>;

    fn set_field(&self, id: RecordId, key: &str, value: &str) -> Result<()>;

    fn resolve_url_to_id(&self, url: &str) -> Result<Option<RecordId>>;

    fn find_by_title(&self, record_type: &str, title: &str) -> Result<Option<Record>>;

    fn find_one_by_field(
        &self,
        record_type: &str,
        key: &str,
        value: &str,
    ) -> Result<Option<Record>>;
}

/// The main entry point: a data directory holding settings.yaml and the
/// record database. Settings are re-read at the start of every operation.
pub struct Store {
    root: PathBuf,
    db: SystemDb,
}

impl Store {
    /// Open a store at the given data directory, creating the record
    /// database if needed.
    pub fn open(path: &str) -> Result<Self> {
        let root = PathBuf::from(path);
        if !root.is_dir() {
            return Err(BulkFieldsError::Other(format!(
                "Data directory does not exist: {}",
                root.display()
            )));
        }

        let db = SystemDb::open(&root.join(DATABASE_FILE))?;
        log::debug!("Opened store at {}", root.display());
        Ok(Store { root, db })
    }

    /// The record database
    pub fn db(&self) -> &SystemDb {
        &self.db
    }

    /// Load the current settings blob.
    pub fn settings(&self) -> Result<Settings> {
        load_settings(&self.root.join(SETTINGS_FILE))
    }

    /// Replace the settings blob. Only the settings surface calls this; the
    /// edit, import and export operations never write settings.
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        save_settings(&self.root.join(SETTINGS_FILE), settings)
    }

    /// Add a record of the configured type.
    pub fn add_record(
        &self,
        title: &str,
        permalink: Option<&str>,
        content: &str,
    ) -> Result<RecordId> {
        let settings = self.settings()?;
        self.db
            .insert_record(&settings.record_type, title, permalink, content)
    }

    pub fn load_page(&self, page: i64, search: Option<&str>) -> Result<Page> {
        let settings = self.settings()?;
        BulkEditSession::new(&self.db, &settings).load_page(page, search)
    }

    pub fn apply_edits(&self, edits: &Edits, policy: KeyPolicy) -> Result<()> {
        let settings = self.settings()?;
        BulkEditSession::new(&self.db, &settings)
            .with_key_policy(policy)
            .apply_edits(edits)
    }

    pub fn export(&self) -> Result<Vec<ExportEntry>> {
        let settings = self.settings()?;
        export::export(&self.db, &settings)
    }

    /// Import a document from a file. A missing or unreadable file aborts
    /// before anything is written.
    pub fn import_file(&self, path: &Path, strategy: &MatchStrategy) -> Result<ImportReport> {
        let settings = self.settings()?;
        let text = std::fs::read_to_string(path).map_err(|e| {
            BulkFieldsError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read import file '{}': {e}", path.display()),
            ))
        })?;
        import::import_str(&self.db, &settings, &text, strategy)
    }
}

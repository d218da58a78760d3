pub mod schema;
pub mod sanitize;
pub mod permalink;
pub mod record;
pub mod system_db;
pub mod store;
pub mod edit;
pub mod import;
pub mod export;
pub mod gate;
pub mod error;

pub use error::{BulkFieldsError, Result};
pub use schema::{FieldSchema, Settings};
pub use store::{RecordStore, Store};
pub use record::{ExportEntry, ImportItem, Record, RecordId};
pub use edit::{BulkEditSession, Edits, KeyPolicy, Page};
pub use import::{ImportReport, MatchStrategy};

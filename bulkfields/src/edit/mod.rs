// Bulk edit session: paged view model over the configured fields, and
// persistence of submitted field values

use crate::error::Result;
use crate::record::{Record, RecordId};
use crate::sanitize::sanitize_text;
use crate::schema::Settings;
use crate::store::RecordStore;
use serde::Serialize;
use std::collections::BTreeMap;

/// Submitted field values: record id → field key → value.
pub type Edits = BTreeMap<RecordId, BTreeMap<String, String>>;

/// Which submitted keys `apply_edits` writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Write every submitted key, configured or not.
    #[default]
    Unrestricted,
    /// Skip keys that are not in the configured field schema.
    SchemaOnly,
}

/// One editable field of one record as shown on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewRow {
    pub key: String,
    pub value: String,
}

/// A record on the page with one row per configured field, in schema order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewRecord {
    pub id: RecordId,
    pub title: String,
    pub permalink: String,
    pub fields: Vec<ViewRow>,
}

/// Navigation targets derived from the current page and the page count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub current: u64,
    pub total_pages: u64,
    pub prev_page: u64,
    pub next_page: u64,
    pub first_prev_disabled: bool,
    pub next_last_disabled: bool,
}

impl Pagination {
    pub fn new(current: u64, total_pages: u64) -> Self {
        let total_pages = total_pages.max(1);
        Pagination {
            current,
            total_pages,
            prev_page: current.saturating_sub(1).max(1),
            next_page: current.saturating_add(1).min(total_pages),
            first_prev_disabled: current <= 1,
            next_last_disabled: current >= total_pages,
        }
    }
}

/// The editable view of one page of records
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub rows: Vec<ViewRecord>,
    pub total_found: u64,
    pub total_pages: u64,
    pub pagination: Pagination,
    pub search: Option<String>,
    /// A save control is offered only when there is something to edit.
    pub can_save: bool,
}

impl Page {
    /// Query parameters that bring the operator back to this page after a save.
    pub fn return_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("paged", self.pagination.current.to_string())];
        if let Some(search) = &self.search {
            query.push(("s", search.clone()));
        }
        query
    }
}

/// `ceil(total_found / page_size)`, never less than one page.
pub fn total_pages(total_found: u64, page_size: u32) -> u64 {
    let page_size = u64::from(page_size.max(1));
    total_found.div_ceil(page_size).max(1)
}

/// Value shown for a field: the stored value, or the configured default when
/// nothing (or an empty string) is stored.
pub fn display_value<'a>(record: &'a Record, key: &str, default: &'a str) -> &'a str {
    match record.field(key) {
        "" => default,
        stored => stored,
    }
}

pub struct BulkEditSession<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    settings: &'a Settings,
    policy: KeyPolicy,
}

impl<'a, S: RecordStore + ?Sized> BulkEditSession<'a, S> {
    pub fn new(store: &'a S, settings: &'a Settings) -> Self {
        BulkEditSession {
            store,
            settings,
            policy: KeyPolicy::default(),
        }
    }

    pub fn with_key_policy(mut self, policy: KeyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Load one page of records of the configured type. Page numbers below 1
    /// are treated as 1; a blank search term means no filter.
    pub fn load_page(&self, page: i64, search: Option<&str>) -> Result<Page> {
        let page = page.max(1) as u64;
        let search = search.map(sanitize_text).filter(|s| !s.is_empty());

        let result = self.store.query(
            &self.settings.record_type,
            self.settings.page_size,
            page,
            search.as_deref(),
        )?;

        let rows: Vec<ViewRecord> = result
            .records
            .iter()
            .map(|record| ViewRecord {
                id: record.id,
                title: record.title.clone(),
                permalink: record.permalink.clone(),
                fields: self
                    .settings
                    .fields
                    .iter()
                    .map(|f| ViewRow {
                        key: f.key.clone(),
                        value: display_value(record, &f.key, &f.default).to_string(),
                    })
                    .collect(),
            })
            .collect();

        let total_pages = total_pages(result.total_found, self.settings.page_size);
        let can_save = !rows.is_empty() && !self.settings.fields.is_empty();

        Ok(Page {
            rows,
            total_found: result.total_found,
            total_pages,
            pagination: Pagination::new(page, total_pages),
            search,
            can_save,
        })
    }

    /// Write every submitted value, sanitized, in ascending record id order.
    ///
    /// Writes are not transactional: an error aborts the loop and leaves
    /// the values written before it in place.
    pub fn apply_edits(&self, edits: &Edits) -> Result<()> {
        let mut written = 0usize;
        let mut skipped = 0usize;

        for (id, fields) in edits {
            for (key, value) in fields {
                if self.policy == KeyPolicy::SchemaOnly && !self.settings.fields.contains(key) {
                    log::debug!("Skipping unconfigured field '{key}' on record {id}");
                    skipped += 1;
                    continue;
                }
                self.store.set_field(*id, key, &sanitize_text(value))?;
                written += 1;
            }
        }

        log::info!(
            "Saved {written} field value(s) across {} record(s), {skipped} skipped",
            edits.len()
        );
        Ok(())
    }
}

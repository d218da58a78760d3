use crate::error::Result;
use crate::record::{ImportItem, RecordId};
use crate::store::RecordStore;

/// Writes the fields an import item carries onto a record. Keys the item
/// does not mention are left as they are.
pub struct ImportMerger<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> ImportMerger<'a, S> {
    pub fn new(store: &'a S) -> Self {
        ImportMerger { store }
    }

    /// Returns the number of fields written.
    pub fn merge(&self, id: RecordId, item: &ImportItem) -> Result<usize> {
        for (key, value) in &item.meta {
            self.store.set_field(id, key, value)?;
        }
        Ok(item.meta.len())
    }
}

// Export: every record of the configured type with the raw stored values of
// the configured fields

use crate::error::Result;
use crate::record::ExportEntry;
use crate::schema::Settings;
use crate::store::RecordStore;
use std::io::Write;

/// Flatten all records of the configured type into export entries, in the
/// store's natural order. Values are exported as stored: unset fields are
/// empty, defaults are not substituted.
pub fn export<S: RecordStore + ?Sized>(store: &S, settings: &Settings) -> Result<Vec<ExportEntry>> {
    let records = store.query_all(&settings.record_type)?;
    let entries: Vec<ExportEntry> = records
        .into_iter()
        .map(|record| {
            let meta = settings
                .fields
                .keys()
                .map(|key| (key.to_string(), record.field(key).to_string()))
                .collect();
            ExportEntry {
                id: record.id,
                title: record.title,
                permalink: record.permalink,
                meta,
            }
        })
        .collect();

    log::info!(
        "Exported {} {} record(s) with {} field(s)",
        entries.len(),
        settings.record_type,
        settings.fields.len()
    );
    Ok(entries)
}

/// Write export entries as a pretty-printed JSON document. The writer is
/// flushed before returning so buffered write failures surface here.
pub fn write_document<W: Write>(entries: &[ExportEntry], mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, entries)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

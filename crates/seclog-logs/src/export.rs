use std::io::Write;
use std::path::Path;

use seclog_types::EventRecord;
use tracing::{info, warn};

use crate::ExportError;

/// Write records to `path` as UTF-8 CSV, header first, in input order.
///
/// Empty input is rejected with [`ExportError::NoData`] before the file is
/// created. A failure mid-write leaves whatever was already written.
pub fn export_csv(records: &[EventRecord], path: &Path) -> Result<usize, ExportError> {
    if records.is_empty() {
        warn!(path = %path.display(), "nothing to export");
        return Err(ExportError::NoData);
    }

    let to_write_error = |source: csv::Error| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };
    let writer = csv::Writer::from_path(path).map_err(to_write_error)?;
    let written = write_records(records, writer).map_err(to_write_error)?;

    info!(path = %path.display(), records = written, "exported logs");
    Ok(written)
}

/// Serialize records as CSV into any writer; the header comes from the field names
pub fn write_records<W: Write>(
    records: &[EventRecord],
    mut writer: csv::Writer<W>,
) -> Result<usize, csv::Error> {
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(records.len())
}

//! CSV sink for published annotations.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::cluster::{AnnotationPublisher, Fields};
use crate::error::PublishError;

/// Fixed column layout. Per-horizon forecast fields are not exported; the
/// primary `forecast` column carries the first configured horizon.
pub const ANNOTATION_COLUMNS: [&str; 5] =
    ["timestamp", "equipment", "renewable", "forecast", "consumption"];

/// Writes one CSV row per metadata patch.
///
/// The header is `resource` followed by [`ANNOTATION_COLUMNS`]. Fields absent
/// from a patch are written as empty cells. Rows are flushed as they are
/// written so a partial run still leaves a readable file.
pub struct CsvPublisher<W: Write> {
    wtr: csv::Writer<W>,
}

impl CsvPublisher<BufWriter<File>> {
    /// Creates (or truncates) the file at `path` and writes the header.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if file creation or the header write fails.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Self::from_writer(BufWriter::new(file))
    }
}

impl<W: Write> CsvPublisher<W> {
    /// Wraps any writer and writes the header.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if writing the header fails.
    pub fn from_writer(writer: W) -> io::Result<Self> {
        let mut wtr = csv::WriterBuilder::new().from_writer(writer);
        wtr.write_record(std::iter::once("resource").chain(ANNOTATION_COLUMNS))?;
        wtr.flush()?;
        Ok(Self { wtr })
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns a `PublishError::Sink` if the final flush fails.
    pub fn into_inner(self) -> Result<W, PublishError> {
        self.wtr
            .into_inner()
            .map_err(|e| PublishError::Sink(e.error().to_string()))
    }
}

impl<W: Write> AnnotationPublisher for CsvPublisher<W> {
    fn patch_resource_metadata(&mut self, id: &str, fields: &Fields) -> Result<(), PublishError> {
        let cells = ANNOTATION_COLUMNS
            .iter()
            .map(|column| fields.get(*column).map_or("", String::as_str));
        self.wtr
            .write_record(std::iter::once(id).chain(cells))
            .map_err(|e| PublishError::Sink(e.to_string()))?;
        self.wtr
            .flush()
            .map_err(|e| PublishError::Sink(e.to_string()))
    }
}

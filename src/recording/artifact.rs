// src/recording/artifact.rs
//! Columnar match artifacts
//!
//! One Parquet file per match. Rows are buffered and written as record
//! batches; the file is written under a `.partial` name and renamed into
//! place when finished, so readers never observe a file without a footer.

use crate::recording::compressor::CompressionLevel;
use crate::recording::schema::{self, match_event_schema, EventRow, SCHEMA_NAME};
use crate::recording::event::MatchEvent;
use crate::utils::errors::{Result, TelemetryError};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ARTIFACT_EXTENSION: &str = "parquet";
const PARTIAL_SUFFIX: &str = "partial";

/// Bumped when the column contract changes (columns are only ever appended)
pub const FORMAT_VERSION: &str = "1";

/// Artifact writer configuration
#[derive(Debug, Clone, Copy)]
pub struct ArtifactOptions {
    /// Rows buffered before a batch is written
    pub batch_size: usize,

    pub compression: CompressionLevel,
}

impl Default for ArtifactOptions {
    fn default() -> Self {
        Self {
            batch_size: 1024,
            compression: CompressionLevel::Balanced,
        }
    }
}

/// Summary of a finished artifact
#[derive(Debug, Clone)]
pub struct ArtifactSummary {
    pub path: PathBuf,
    pub rows_written: u64,
    pub size_bytes: u64,
}

/// Buffered writer for one artifact
pub struct ArtifactWriter {
    path: PathBuf,
    partial_path: PathBuf,
    writer: ArrowWriter<File>,
    buffer: Vec<EventRow>,
    batch_size: usize,
    rows_written: u64,
    rows_dropped: u64,
    batches_written: u64,
}

impl ArtifactWriter {
    /// Create the artifact's partial file and write the schema header
    pub fn create(path: &Path, options: ArtifactOptions) -> Result<Self> {
        let partial_path = partial_path_for(path);
        let props = writer_properties(options)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TelemetryError::ArtifactIo(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = File::create(&partial_path).map_err(|e| {
            TelemetryError::ArtifactIo(format!(
                "Failed to create {}: {}",
                partial_path.display(),
                e
            ))
        })?;

        let writer = match ArrowWriter::try_new(file, match_event_schema(), Some(props)) {
            Ok(writer) => writer,
            Err(e) => {
                remove_partial(&partial_path);
                return Err(e.into());
            }
        };

        debug!("Created artifact {}", partial_path.display());
        Ok(Self::from_parts(path, partial_path, writer, options))
    }

    /// Writer over an already opened sink
    #[cfg(test)]
    pub(crate) fn with_file(path: &Path, file: File, options: ArtifactOptions) -> Result<Self> {
        let props = writer_properties(options)?;
        let writer = ArrowWriter::try_new(file, match_event_schema(), Some(props))?;
        Ok(Self::from_parts(path, partial_path_for(path), writer, options))
    }

    fn from_parts(
        path: &Path,
        partial_path: PathBuf,
        writer: ArrowWriter<File>,
        options: ArtifactOptions,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            partial_path,
            writer,
            buffer: Vec::with_capacity(options.batch_size.max(1)),
            batch_size: options.batch_size.max(1),
            rows_written: 0,
            rows_dropped: 0,
            batches_written: 0,
        }
    }

    /// Final path of the artifact once finished
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Buffer a row, writing a batch when the buffer is full
    pub fn append(&mut self, row: EventRow) -> Result<()> {
        self.buffer.push(row);
        if self.buffer.len() >= self.batch_size {
            self.flush_batch()?;
        }
        Ok(())
    }

    /// Write buffered rows as one record batch.
    ///
    /// On failure the buffered rows are discarded and counted as dropped.
    pub fn flush_batch(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let rows = std::mem::take(&mut self.buffer);
        if let Err(e) = self.write_rows(&rows) {
            self.rows_dropped += rows.len() as u64;
            return Err(e);
        }

        self.rows_written += rows.len() as u64;
        self.batches_written += 1;
        debug!("Flushed batch of {} rows to {}", rows.len(), self.partial_path.display());

        Ok(())
    }

    /// Each batch is closed as its own row group so it leaves memory
    fn write_rows(&mut self, rows: &[EventRow]) -> Result<()> {
        let batch = schema::rows_to_batch(rows)?;
        self.writer.write(&batch)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn rows_dropped(&self) -> u64 {
        self.rows_dropped
    }

    pub fn batches_written(&self) -> u64 {
        self.batches_written
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Abandon the artifact and remove its partial file
    pub fn discard(self) {
        let partial_path = self.partial_path.clone();
        drop(self);
        remove_partial(&partial_path);
    }

    /// Flush remaining rows, write the footer and move the file into place
    pub fn finish(mut self) -> Result<ArtifactSummary> {
        if let Err(e) = self.flush_batch() {
            warn!("Dropping final batch for {}: {}", self.path.display(), e);
        }

        let rows_written = self.rows_written;
        self.writer.close()?;

        fs::rename(&self.partial_path, &self.path).map_err(|e| {
            TelemetryError::ArtifactIo(format!(
                "Failed to move {} into place: {}",
                self.partial_path.display(),
                e
            ))
        })?;

        let size_bytes = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);

        Ok(ArtifactSummary {
            path: self.path,
            rows_written,
            size_bytes,
        })
    }
}

fn writer_properties(options: ArtifactOptions) -> Result<WriterProperties> {
    Ok(WriterProperties::builder()
        .set_compression(options.compression.codec()?)
        .set_max_row_group_size(options.batch_size.max(1))
        .set_key_value_metadata(Some(vec![
            KeyValue::new("ctw.schema".to_string(), SCHEMA_NAME.to_string()),
            KeyValue::new("ctw.format_version".to_string(), FORMAT_VERSION.to_string()),
        ]))
        .build())
}

fn remove_partial(partial_path: &Path) {
    if let Err(e) = fs::remove_file(partial_path) {
        warn!("Failed to remove {}: {}", partial_path.display(), e);
    }
}

fn partial_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Decoded artifact contents
#[derive(Debug, Clone, Default)]
pub struct ArtifactContents {
    pub events: Vec<MatchEvent>,

    /// Raw rows, in file order, including rows that failed to decode
    pub rows: Vec<EventRow>,

    /// Rows whose kind ordinal is unknown to this build
    pub unknown_kind_rows: usize,
}

/// Read and decode a finished artifact
pub fn read_artifact(path: &Path) -> Result<ArtifactContents> {
    let file = File::open(path).map_err(|e| {
        TelemetryError::ArtifactIo(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut contents = ArtifactContents::default();
    for batch in reader {
        let batch = batch?;
        contents.rows.extend(schema::batch_to_rows(&batch)?);
    }

    for row in &contents.rows {
        match schema::decode(row.clone()) {
            Ok(event) => contents.events.push(event),
            Err(TelemetryError::UnknownEventKind(ordinal)) => {
                debug!("Skipping row with unknown event kind {}", ordinal);
                contents.unknown_kind_rows += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(contents)
}

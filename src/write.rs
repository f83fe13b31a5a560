// src/write.rs

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::{
    fs::{self, File, OpenOptions},
    io::BufWriter,
    iter,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::table::Table;

/// Overwrite `path` with `table`, header first.
/// Written to a temp file beside the target, then renamed over it.
pub fn write_table<P: AsRef<Path>>(path: P, table: &Table) -> Result<()> {
    let path = path.as_ref();
    let dir = ensure_parent(path)?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {:?}", dir))?;
    {
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(tmp.as_file_mut()));
        if !table.columns().is_empty() {
            wtr.write_record(table.columns())?;
        }
        for record in table.records(table.columns()) {
            wtr.write_record(record)?;
        }
        wtr.flush()
            .with_context(|| format!("flushing CSV for {:?}", path))?;
    }

    tmp.persist(path)
        .with_context(|| format!("renaming temp file over {:?}", path))?;
    debug!(path = %path.display(), rows = table.len(), "wrote table");
    Ok(())
}

/// Create the parent directory of `path` and return it (`.` for bare names).
pub fn ensure_parent(path: &Path) -> Result<&Path> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;
    Ok(dir)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub rows: u64,
    pub batches: usize,
}

/// Groups rows into fixed-size batches and writes each one to `path`:
/// the first batch truncates the file and writes the header, the rest append.
///
/// The header is the union of every page's columns in order of first
/// appearance. If a column turns up after the header has been written,
/// `finish` rewrites the file once with the wider header and pads the
/// earlier rows with empty cells.
pub struct BatchedCsvWriter {
    path: PathBuf,
    batch_size: usize,
    columns: Vec<String>,
    /// Columns in the header on disk, once the first batch is out.
    written_columns: Option<usize>,
    pending: Vec<StringRecord>,
    batches: usize,
    rows: u64,
}

impl BatchedCsvWriter {
    pub fn new(path: impl Into<PathBuf>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        BatchedCsvWriter {
            path: path.into(),
            batch_size,
            columns: Vec::new(),
            written_columns: None,
            pending: Vec::with_capacity(batch_size.min(16_384)),
            batches: 0,
            rows: 0,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Queue every row of `page`, adding any columns not seen before.
    pub fn push_page(&mut self, page: &Table) -> Result<()> {
        if page.is_empty() {
            return Ok(());
        }
        for col in page.columns() {
            if !self.columns.contains(col) {
                if self.written_columns.is_some() {
                    debug!(path = %self.path.display(), column = %col, "widening header");
                }
                self.columns.push(col.clone());
            }
        }

        let columns = self.columns.clone();
        for record in page.records(&columns) {
            self.push_record(StringRecord::from(record))?;
        }
        Ok(())
    }

    pub fn push_record(&mut self, record: StringRecord) -> Result<()> {
        self.pending.push(record);
        if self.pending.len() >= self.batch_size {
            self.flush_batch()?;
        }
        Ok(())
    }

    /// Write whatever is pending as one batch. No-op when nothing is pending.
    pub fn flush_batch(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let first = self.written_columns.is_none();
        if first {
            ensure_parent(&self.path)?;
        }
        let opened = if first {
            File::create(&self.path)
        } else {
            OpenOptions::new().append(true).open(&self.path)
        };
        let file = opened.with_context(|| format!("opening {:?}", self.path))?;

        let width = self.columns.len();
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(BufWriter::new(file));
        if first && width > 0 {
            wtr.write_record(&self.columns)?;
        }
        for rec in &self.pending {
            wtr.write_record(padded(rec, width))?;
        }
        wtr.flush()
            .with_context(|| format!("flushing batch to {:?}", self.path))?;

        if first {
            self.written_columns = Some(width);
        }
        self.rows += self.pending.len() as u64;
        self.batches += 1;
        debug!(
            path = %self.path.display(),
            batch = self.batches,
            rows = self.pending.len(),
            "wrote batch"
        );
        self.pending.clear();
        Ok(())
    }

    /// Flush the remainder, widen the header if needed, and report what went to disk.
    pub fn finish(mut self) -> Result<BatchSummary> {
        self.flush_batch()?;
        if let Some(written) = self.written_columns {
            if written < self.columns.len() {
                self.rewrite_with_header(written)?;
            }
        }
        Ok(BatchSummary {
            rows: self.rows,
            batches: self.batches,
        })
    }

    /// Copy the file through a temp file under the full header, padding short rows.
    fn rewrite_with_header(&self, written: usize) -> Result<()> {
        let dir = ensure_parent(&self.path)?;
        let width = self.columns.len();
        info!(
            path = %self.path.display(),
            from = written,
            to = width,
            "rewriting with widened header"
        );

        let mut rdr = ReaderBuilder::new()
            .has_headers(written > 0)
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("reopening {:?}", self.path))?;
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temp file in {:?}", dir))?;
        {
            let mut wtr = WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_writer(BufWriter::new(tmp.as_file_mut()));
            wtr.write_record(&self.columns)?;
            for (idx, rec) in rdr.records().enumerate() {
                let rec =
                    rec.with_context(|| format!("reading {:?} at record {}", self.path, idx))?;
                wtr.write_record(padded(&rec, width))?;
            }
            wtr.flush()
                .with_context(|| format!("flushing rewrite of {:?}", self.path))?;
        }
        tmp.persist(&self.path)
            .with_context(|| format!("renaming rewrite over {:?}", self.path))?;
        Ok(())
    }
}

/// `rec` followed by empty cells up to `width`.
fn padded(rec: &StringRecord, width: usize) -> impl Iterator<Item = &str> {
    let missing = width.saturating_sub(rec.len());
    rec.iter().chain(iter::repeat("").take(missing))
}

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use seedsmith_core::{Model, SchemaGraph};

use crate::errors::Result;
use crate::store::ValueStore;
use crate::value::Row;

/// One CSV file written for a model.
#[derive(Debug, Clone, Serialize)]
pub struct CsvFile {
    pub model: String,
    pub path: PathBuf,
    pub rows: u64,
    pub bytes: u64,
}

/// Write every model in `store` to `dir`, one file per model.
///
/// Files are numbered in load order (`00_Team.csv`, `01_Player.csv`, ...) so
/// parents come before the rows referencing them.
pub fn write_store_csv(dir: &Path, graph: &SchemaGraph, store: &ValueStore) -> Result<Vec<CsvFile>> {
    std::fs::create_dir_all(dir)?;

    let mut models: Vec<&str> = Vec::new();
    for batch in store.rows_in_dependency_order(graph) {
        if !models.contains(&batch.model) {
            models.push(batch.model);
        }
    }

    let mut files = Vec::with_capacity(models.len());
    for (idx, name) in models.into_iter().enumerate() {
        let model = graph.require_model(name)?;
        let rows = store.rows_of(name);
        let path = dir.join(format!("{idx:02}_{name}.csv"));
        let bytes = write_model_csv(&path, model, rows)?;
        files.push(CsvFile {
            model: name.to_string(),
            path,
            rows: rows.len() as u64,
            bytes,
        });
    }
    Ok(files)
}

/// Write rows of one model with columns in schema order; returns bytes written.
pub fn write_model_csv(path: &Path, model: &Model, rows: &[Row]) -> Result<u64> {
    let writer = BufWriter::new(File::create(path)?);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(CountingWriter::new(writer));

    let columns: Vec<&str> = model.scalars().map(|field| field.name.as_str()).collect();
    writer.write_record(&columns)?;

    for row in rows {
        let record: Vec<String> = columns
            .iter()
            .map(|column| row.get(column).map(|value| value.to_text()).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }

    writer.flush()?;
    let counting = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(counting.bytes_written())
}

struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

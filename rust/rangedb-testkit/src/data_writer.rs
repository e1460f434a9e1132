//! Data-file builders returning the location of every appended record.

use rangedb_format::MemoryPointer;
use serde_json::Value;

fn span(start: usize, end: usize) -> MemoryPointer {
    MemoryPointer::new(start as u64, (end - start) as u32)
}

/// Builds a JSON Lines file.
#[derive(Debug, Default)]
pub struct JsonlWriter {
    buf: Vec<u8>,
}

impl JsonlWriter {
    pub fn new() -> JsonlWriter {
        JsonlWriter::default()
    }

    /// Appends a record and returns its span, newline excluded.
    pub fn append(&mut self, record: &Value) -> MemoryPointer {
        self.append_raw(&record.to_string())
    }

    /// Appends a line as is.
    pub fn append_raw(&mut self, line: &str) -> MemoryPointer {
        let start = self.buf.len();
        self.buf.extend_from_slice(line.as_bytes());
        let end = self.buf.len();
        self.buf.push(b'\n');
        span(start, end)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Builds a CSV file with a header line.
#[derive(Debug)]
pub struct CsvWriter {
    buf: Vec<u8>,
    columns: usize,
}

impl CsvWriter {
    pub fn new(header: &[&str]) -> CsvWriter {
        let mut buf = header.join(",").into_bytes();
        buf.push(b'\n');
        CsvWriter {
            buf,
            columns: header.len(),
        }
    }

    /// Appends a row and returns its span, newline excluded. Fields are written verbatim.
    pub fn append(&mut self, row: &[&str]) -> anyhow::Result<MemoryPointer> {
        anyhow::ensure!(
            row.len() == self.columns,
            "row has {} fields, header has {}",
            row.len(),
            self.columns
        );
        let start = self.buf.len();
        self.buf.extend_from_slice(row.join(",").as_bytes());
        let end = self.buf.len();
        self.buf.push(b'\n');
        Ok(span(start, end))
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

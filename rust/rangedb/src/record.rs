//! Record parsing and projection.

use std::{io::Cursor, sync::Arc};

use arrow_array::RecordBatch;
use arrow_csv::{ReaderBuilder, reader::Format};
use arrow_json::ArrayWriter;
use arrow_schema::{ArrowError, DataType, Field, Schema, SchemaRef};
use rangedb_common::{Result, error::Error};
use rangedb_format::MemoryPointer;
use serde_json::{Map, Value};

/// Parses the first JSON value of a record span.
///
/// Returns `None` when the span ends inside the value (the record was cut by a read
/// boundary). Trailing bytes after the first value are ignored.
pub fn parse_jsonl(pointer: MemoryPointer, bytes: &[u8]) -> Result<Option<Value>> {
    let mut values = serde_json::Deserializer::from_slice(bytes).into_iter::<Value>();
    match values.next() {
        Some(Ok(value)) => Ok(Some(value)),
        Some(Err(e)) if e.is_eof() => {
            log::debug!("record at {pointer} is truncated, skipping");
            Ok(None)
        }
        Some(Err(e)) => Err(Error::parse(format!("JSON record at {pointer}"), e)),
        None => Ok(None),
    }
}

/// Data rows sampled from the start of the file to infer CSV column types.
const CSV_SCHEMA_SAMPLE_ROWS: usize = 100;

/// The header line of a CSV data file and the column types inferred for it.
#[derive(Debug, Clone)]
pub struct CsvHeader {
    line: String,
    schema: SchemaRef,
    /// Same columns, all `Utf8`, for rows that do not fit `schema`.
    text_schema: SchemaRef,
}

impl CsvHeader {
    /// Extracts the header from the first bytes of the data file, inferring column types
    /// from the complete rows that follow it in `prefix`.
    ///
    /// Returns `None` if `prefix` does not contain a complete line.
    pub fn from_prefix(prefix: &[u8]) -> Result<Option<CsvHeader>> {
        let Some(end) = prefix.iter().position(|&b| b == b'\n') else {
            return Ok(None);
        };
        let line = std::str::from_utf8(&prefix[..end])
            .map_err(|e| Error::parse("CSV header", e))?
            .trim_end_matches('\r')
            .to_string();
        let sample_end = prefix.iter().rposition(|&b| b == b'\n').unwrap_or(end);
        let (sampled, _) = Format::default()
            .with_header(true)
            .infer_schema(Cursor::new(&prefix[..=sample_end]), Some(CSV_SCHEMA_SAMPLE_ROWS))
            .map_err(|e| Error::parse("CSV header", e))?;
        // Columns with no sampled values come back as `Null`, which would drop every value.
        let schema = Schema::new(
            sampled
                .fields()
                .iter()
                .map(|f| match f.data_type() {
                    DataType::Null => Field::new(f.name(), DataType::Utf8, true),
                    data_type => Field::new(f.name(), data_type.clone(), true),
                })
                .collect::<Vec<_>>(),
        );
        let text_schema = Schema::new(
            schema
                .fields()
                .iter()
                .map(|f| Field::new(f.name(), DataType::Utf8, true))
                .collect::<Vec<_>>(),
        );
        Ok(Some(CsvHeader {
            line,
            schema: Arc::new(schema),
            text_schema: Arc::new(text_schema),
        }))
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    /// Parses one data row into a JSON object keyed by the header's column names.
    ///
    /// Values take the file's inferred column types; a row that does not fit them is
    /// read as text. Empty fields are omitted. Returns `None` for a row cut short by the
    /// end of the read (too few fields or an open quote).
    pub fn parse_row(&self, pointer: MemoryPointer, row: &[u8]) -> Result<Option<Value>> {
        let row = trim_line(row);
        if row.is_empty() {
            return Ok(None);
        }
        if !is_complete_row(row, self.schema.fields().len()) {
            log::debug!("CSV record at {pointer} is truncated, skipping");
            return Ok(None);
        }
        match read_row(&self.schema, row) {
            Ok(value) => Ok(value),
            Err(e) => {
                log::debug!("CSV record at {pointer} does not fit the column types ({e}), reading as text");
                read_row(&self.text_schema, row)
                    .map_err(|e| Error::parse(format!("CSV record at {pointer}"), e))
            }
        }
    }
}

fn read_row(schema: &SchemaRef, row: &[u8]) -> std::result::Result<Option<Value>, ArrowError> {
    let mut text = Vec::with_capacity(row.len() + 1);
    text.extend_from_slice(row);
    text.push(b'\n');
    let mut reader = ReaderBuilder::new(schema.clone()).build(Cursor::new(text))?;
    let Some(batch) = reader.next() else {
        return Ok(None);
    };
    Ok(batch_to_json(&batch?)?.into_iter().next())
}

/// Whether `row` closes all its quotes and has at least `columns` fields.
fn is_complete_row(row: &[u8], columns: usize) -> bool {
    let mut quoted = false;
    let mut fields = 1;
    for &b in row {
        match b {
            b'"' => quoted = !quoted,
            b',' if !quoted => fields += 1,
            _ => {}
        }
    }
    !quoted && fields >= columns
}

fn trim_line(row: &[u8]) -> &[u8] {
    let mut end = row.len();
    while end > 0 && matches!(row[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &row[..end]
}

fn batch_to_json(batch: &RecordBatch) -> std::result::Result<Vec<Value>, ArrowError> {
    let mut writer = ArrayWriter::new(Vec::new());
    writer.write_batches(&[batch])?;
    writer.finish()?;
    let buf = writer.into_inner();
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&buf).map_err(|e| ArrowError::JsonError(e.to_string()))
}

/// Keeps only the values at the given dotted paths, preserving their nesting. Paths
/// that do not resolve are left out.
pub fn project(record: &Value, paths: &[String]) -> Value {
    let mut result = Map::new();
    for path in paths {
        let Some(value) = path
            .split('.')
            .try_fold(record, |value, part| value.get(part))
        else {
            continue;
        };
        let mut parts = path.split('.').peekable();
        let mut target = &mut result;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                target.insert(part.to_string(), value.clone());
                break;
            }
            let entry = target
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(next) = entry else {
                break;
            };
            target = next;
        }
    }
    Value::Object(result)
}

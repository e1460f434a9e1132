//! Paired data and index files built from a list of records.

use std::{collections::BTreeMap, sync::Arc};

use anyhow::Context;
use rangedb_format::{
    FieldType, FileFormat, FileMeta, MemoryPointer,
    value::{encode_bool, encode_f64},
};
use rangedb_io::MemoryResolver;
use serde_json::Value;

use crate::{CsvWriter, EntrySpec, IndexWriter, JsonlWriter};

/// A data file, its index, and the location of every record in insertion order.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub data: Vec<u8>,
    pub index: Vec<u8>,
    pub records: Vec<MemoryPointer>,
}

impl Dataset {
    /// In-memory resolvers over the data and index files, in that order.
    pub fn resolvers(&self) -> (Arc<MemoryResolver>, Arc<MemoryResolver>) {
        (
            Arc::new(MemoryResolver::with_name(self.data.clone(), "data")),
            Arc::new(MemoryResolver::with_name(self.index.clone(), "index")),
        )
    }

    /// Text of the `i`-th record.
    pub fn record_text(&self, i: usize) -> &str {
        let pointer = self.records[i];
        std::str::from_utf8(&self.data[pointer.offset as usize..pointer.end() as usize])
            .unwrap_or_default()
    }
}

enum Writer {
    Jsonl(JsonlWriter),
    Csv(CsvWriter, Vec<String>),
}

struct Record {
    value: Value,
    pointer: MemoryPointer,
    text: String,
}

/// Builds a [`Dataset`].
///
/// Value fields get one tree per JSON type observed for them (numbers as `Float64`).
/// Text fields get one n-gram tree per gram size.
pub struct DatasetBuilder {
    writer: Writer,
    records: Vec<Record>,
    value_fields: Vec<String>,
    text_fields: Vec<(String, usize, usize)>,
    max_keys_per_node: usize,
    external_keys_from: Option<usize>,
}

impl DatasetBuilder {
    pub fn jsonl() -> DatasetBuilder {
        DatasetBuilder::with_writer(Writer::Jsonl(JsonlWriter::new()))
    }

    pub fn csv(header: &[&str]) -> DatasetBuilder {
        DatasetBuilder::with_writer(Writer::Csv(
            CsvWriter::new(header),
            header.iter().map(|h| h.to_string()).collect(),
        ))
    }

    fn with_writer(writer: Writer) -> DatasetBuilder {
        DatasetBuilder {
            writer,
            records: Vec::new(),
            value_fields: Vec::new(),
            text_fields: Vec::new(),
            max_keys_per_node: 64,
            external_keys_from: None,
        }
    }

    /// Indexes the (possibly dotted) field by value.
    pub fn index_field(mut self, path: &str) -> DatasetBuilder {
        self.value_fields.push(path.to_string());
        self
    }

    /// Indexes the n-grams of the field for search.
    pub fn index_text(mut self, path: &str, min_gram: usize, max_gram: usize) -> DatasetBuilder {
        self.text_fields.push((path.to_string(), min_gram, max_gram));
        self
    }

    pub fn with_max_keys_per_node(mut self, max_keys_per_node: usize) -> DatasetBuilder {
        self.max_keys_per_node = max_keys_per_node;
        self
    }

    /// Stores string keys of at least `len` bytes out of line, pointing at their bytes
    /// inside the record.
    pub fn with_external_keys_from(mut self, len: usize) -> DatasetBuilder {
        self.external_keys_from = Some(len);
        self
    }

    /// Appends a JSON record.
    pub fn add_record(&mut self, value: Value) -> anyhow::Result<MemoryPointer> {
        let Writer::Jsonl(writer) = &mut self.writer else {
            anyhow::bail!("add_record requires a JSON Lines dataset");
        };
        let text = value.to_string();
        let pointer = writer.append_raw(&text);
        self.records.push(Record {
            value,
            pointer,
            text,
        });
        Ok(pointer)
    }

    /// Appends a CSV row. Fields that parse as numbers are indexed as numbers.
    pub fn add_row(&mut self, row: &[&str]) -> anyhow::Result<MemoryPointer> {
        let Writer::Csv(writer, header) = &mut self.writer else {
            anyhow::bail!("add_row requires a CSV dataset");
        };
        let pointer = writer.append(row)?;
        let value = header
            .iter()
            .zip(row)
            .map(|(name, field)| {
                let value = match field.parse::<f64>() {
                    Ok(number) => serde_json::Number::from_f64(number)
                        .map(Value::Number)
                        .unwrap_or_else(|| Value::String(field.to_string())),
                    Err(_) => Value::String(field.to_string()),
                };
                (name.clone(), value)
            })
            .collect();
        self.records.push(Record {
            value: Value::Object(value),
            pointer,
            text: row.join(","),
        });
        Ok(pointer)
    }

    fn is_jsonl(&self) -> bool {
        matches!(self.writer, Writer::Jsonl(_))
    }

    pub fn build(self) -> anyhow::Result<Dataset> {
        let mut trees: BTreeMap<(String, FieldType), Vec<EntrySpec>> = BTreeMap::new();
        for path in &self.value_fields {
            for record in &self.records {
                let Some(value) = lookup(&record.value, path) else {
                    continue;
                };
                let (field_type, key) = match value {
                    Value::Number(n) => {
                        let n = n.as_f64().context("number out of range")?;
                        (FieldType::Float64, encode_f64(n).to_vec())
                    }
                    Value::String(s) => (FieldType::String, s.as_bytes().to_vec()),
                    Value::Bool(b) => (FieldType::Boolean, encode_bool(*b).to_vec()),
                    Value::Null => (FieldType::Null, Vec::new()),
                    Value::Array(_) | Value::Object(_) => continue,
                };
                let entry = match (value, self.external_keys_from) {
                    (Value::String(s), Some(min)) if s.len() >= min => {
                        match locate(record, s, self.is_jsonl()) {
                            Some(location) => EntrySpec::external(key, location, record.pointer),
                            None => EntrySpec::inline(key, record.pointer),
                        }
                    }
                    _ => EntrySpec::inline(key, record.pointer),
                };
                trees.entry((path.clone(), field_type)).or_default().push(entry);
            }
        }
        for (path, min_gram, max_gram) in &self.text_fields {
            for n in *min_gram..=*max_gram {
                let field_type = FieldType::ngram(n).context("unsupported gram size")?;
                let tree = trees.entry((path.clone(), field_type)).or_default();
                for record in &self.records {
                    let Some(Value::String(text)) = lookup(&record.value, path) else {
                        continue;
                    };
                    for gram in ngrams(text, *min_gram, n) {
                        tree.push(EntrySpec::inline(gram, record.pointer));
                    }
                }
            }
        }

        let (format, data) = match self.writer {
            Writer::Jsonl(writer) => (FileFormat::Jsonl, writer.into_bytes()),
            Writer::Csv(writer, _) => (FileFormat::Csv, writer.into_bytes()),
        };
        let mut index = IndexWriter::new(FileMeta {
            version: 1,
            format,
            read_offset: data.len() as u64,
            entries: self.records.len() as u64,
        })
        .with_max_keys_per_node(self.max_keys_per_node);
        for ((name, field_type), entries) in trees {
            index.add_tree(&name, field_type, entries);
        }
        Ok(Dataset {
            index: index.build()?,
            data,
            records: self.records.iter().map(|r| r.pointer).collect(),
        })
    }
}

/// Resolves a dotted path inside a JSON value.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |value, part| value.get(part))
}

/// Location of the first verbatim occurrence of `s` in the record text. JSON strings
/// that need escaping cannot be located.
fn locate(record: &Record, s: &str, quoted: bool) -> Option<MemoryPointer> {
    let (needle, skip) = if quoted {
        (serde_json::to_string(s).ok()?, 1)
    } else {
        (s.to_string(), 0)
    };
    if needle.len() != s.len() + 2 * skip {
        return None;
    }
    let pos = record.text.find(&needle)? + skip;
    Some(MemoryPointer::new(
        record.pointer.offset + pos as u64,
        s.len() as u32,
    ))
}

/// The `n`-grams of `text` for runs of at least `min_gram` ASCII alphanumerics, lower-cased.
pub fn ngrams(text: &str, min_gram: usize, n: usize) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|run| !run.is_empty() && run.len() >= min_gram)
        .flat_map(|run| {
            let run = run.to_ascii_lowercase();
            (0..(run.len() + 1).saturating_sub(n))
                .map(|i| run[i..i + n].to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

use std::sync::Arc;

use rangedb_format::{FieldType, FileFormat, MemoryPointer, value::encode_f64};
use rangedb_index::{IndexFile, IndexFileOptions, IndexHeader};
use rangedb_io::MemoryResolver;
use rangedb_testkit::{DatasetBuilder, EntrySpec, IndexWriter, jsonl_file_meta};
use serde_json::json;

fn open(index: Vec<u8>) -> IndexFile {
    IndexFile::open(
        Arc::new(MemoryResolver::new(index)),
        Arc::new(MemoryResolver::new(Vec::new())),
        IndexFileOptions::default(),
    )
}

#[tokio::test]
async fn test_headers_and_file_meta() {
    let mut builder = DatasetBuilder::jsonl()
        .index_field("age")
        .index_field("name")
        .index_text("name", 1, 2);
    builder
        .add_record(json!({"name": "Ann", "age": 31}))
        .expect("add_record");
    builder
        .add_record(json!({"name": "Bob", "age": null}))
        .expect("add_record");
    let dataset = builder.build().expect("build");
    let (data, index) = dataset.resolvers();
    let file = IndexFile::open(index, data, IndexFileOptions::default());

    let meta = file.file_meta().await.expect("file_meta");
    assert_eq!(meta.format, FileFormat::Jsonl);
    assert_eq!(meta.entries, 2);
    assert_eq!(meta.read_offset, dataset.data.len() as u64);

    let headers = file.headers().await.expect("headers");
    assert_eq!(
        headers,
        vec![
            IndexHeader {
                field_name: "age".to_string(),
                field_types: vec![FieldType::Float64, FieldType::Null],
            },
            IndexHeader {
                field_name: "name".to_string(),
                field_types: vec![FieldType::String, FieldType::Bigram, FieldType::Unigram],
            },
        ]
    );
    assert_eq!(
        headers[1].value_types().collect::<Vec<_>>(),
        vec![FieldType::String]
    );

    let header = file
        .directory()
        .header("name")
        .await
        .expect("header")
        .expect("name");
    assert!(header.has_type(FieldType::Unigram));
    assert!(!header.has_type(FieldType::Trigram));
    assert!(file.tree("name", FieldType::Trigram).await.expect("lookup").is_none());
    assert!(file.tree("missing", FieldType::String).await.expect("lookup").is_none());
}

#[tokio::test]
async fn test_later_page_wins() {
    let mut writer = IndexWriter::new(jsonl_file_meta(0, 2));
    writer.add_tree(
        "n",
        FieldType::Float64,
        vec![EntrySpec::inline(encode_f64(1.0), MemoryPointer::new(0, 1))],
    );
    writer.add_tree(
        "n",
        FieldType::Float64,
        vec![EntrySpec::inline(encode_f64(2.0), MemoryPointer::new(1, 1))],
    );
    let file = open(writer.build().expect("build"));

    assert_eq!(file.directory().pages().await.expect("pages").len(), 2);
    let tree = file
        .tree("n", FieldType::Float64)
        .await
        .expect("lookup")
        .expect("tree");
    let (key, _) = tree.first().await.expect("first").expect("entry");
    assert_eq!(key.value, encode_f64(2.0));
}

#[tokio::test]
async fn test_chain_cycle_is_rejected() {
    let mut writer = IndexWriter::new(jsonl_file_meta(0, 0));
    writer.add_tree("a", FieldType::String, Vec::new());
    writer.add_tree("b", FieldType::String, Vec::new());
    let mut index = writer.build().expect("build");
    // Point the last slot back at the first field slot.
    index[512 + 12..512 + 20].copy_from_slice(&256u64.to_le_bytes());

    let err = open(index).headers().await.unwrap_err();
    assert!(err.to_string().contains("revisits offset 256"), "{err}");
}

#[tokio::test]
async fn test_corrupt_metadata() {
    let mut writer = IndexWriter::new(jsonl_file_meta(0, 0));
    writer.add_tree("a", FieldType::String, Vec::new());
    let mut index = writer.build().expect("build");
    // Unknown field type tag.
    index[256 + 28..256 + 30].copy_from_slice(&99u16.to_le_bytes());

    let err = open(index).headers().await.unwrap_err();
    assert!(!err.is_integrity());
    assert!(err.to_string().starts_with("malformed meta page"), "{err}");
}

#[tokio::test]
async fn test_many_fields() {
    let mut writer = IndexWriter::new(jsonl_file_meta(0, 0));
    for i in (0..40).rev() {
        writer.add_tree(&format!("f{i:02}"), FieldType::String, Vec::new());
    }
    let file = open(writer.build().expect("build"));
    let headers = file.headers().await.expect("headers");
    assert_eq!(headers.len(), 40);
    assert_eq!(headers[0].field_name, "f00");
    assert_eq!(headers[39].field_name, "f39");
    for i in 0..40 {
        let page = file
            .directory()
            .lookup(&format!("f{i:02}"), FieldType::String)
            .await
            .expect("lookup")
            .expect("page");
        assert_eq!(page.meta.field_name, format!("f{i:02}"));
        assert!(page.root.is_null());
    }
}

use std::sync::Arc;

use ahash::AHashMap;
use rangedb_format::FieldType;
use rangedb_index::{IndexFile, IndexFileOptions};
use rangedb_testkit::{CountingResolver, Dataset, DatasetBuilder};
use rangedb_text_index::{Bm25Scorer, NgramTokenizer, TermFrequencies};
use serde_json::json;

fn dataset() -> Dataset {
    let mut builder = DatasetBuilder::jsonl()
        .index_text("title", 1, 3)
        .with_max_keys_per_node(4);
    for title in [
        "Wake me up",
        "Wake up wake up",
        "Make up your mind",
        "Sleep tight",
        "Hello world",
        "Rise and shine",
        "Quiet morning",
        "Coffee first",
        "Blue sky",
    ] {
        builder
            .add_record(json!({ "title": title }))
            .expect("add_record");
    }
    builder.build().expect("build")
}

async fn trees(file: &IndexFile) -> AHashMap<FieldType, rangedb_index::BPTree> {
    let mut trees = AHashMap::new();
    for field_type in [FieldType::Unigram, FieldType::Bigram, FieldType::Trigram] {
        if let Some(tree) = file.tree("title", field_type).await.expect("lookup") {
            trees.insert(field_type, tree);
        }
    }
    trees
}

#[tokio::test]
async fn test_term_frequencies() {
    let dataset = dataset();
    let (data, index) = dataset.resolvers();
    let file = IndexFile::open(index, data, IndexFileOptions::default());
    let tree = file
        .tree("title", FieldType::Trigram)
        .await
        .expect("lookup")
        .expect("tree");

    let wak = TermFrequencies::accumulate(&tree, b"wak").await.expect("accumulate");
    assert_eq!(wak.document_count(), 2);
    assert_eq!(wak.get(&dataset.records[0]), 1);
    assert_eq!(wak.get(&dataset.records[1]), 2);
    assert_eq!(wak.get(&dataset.records[3]), 0);

    let missing = TermFrequencies::accumulate(&tree, b"zzz").await.expect("accumulate");
    assert!(missing.is_empty());
}

#[tokio::test]
async fn test_ranking() {
    let dataset = dataset();
    let (data, index) = dataset.resolvers();
    let file = IndexFile::open(index, data, IndexFileOptions::default());
    let trees = trees(&file).await;

    let tokenizer = NgramTokenizer::new(3, 3).expect("tokenizer");
    let tokens = tokenizer.tokenize("wake");
    let table = Bm25Scorer::default()
        .score(&tokens, &trees, dataset.records.len() as u64)
        .await
        .expect("score");

    // "wake" and "wake up wake up" share both trigrams, "make up" only "ake".
    let top = table.top();
    assert_eq!(top.len(), 3);
    assert_eq!(top[0].0, dataset.records[1]);
    assert_eq!(top[1].0, dataset.records[0]);
    assert_eq!(top[2].0, dataset.records[2]);
    assert!(top[0].1 > top[1].1 && top[1].1 > top[2].1);
}

#[tokio::test]
async fn test_repeated_grams_count_per_occurrence() {
    let dataset = dataset();
    let (data, index) = dataset.resolvers();
    let file = IndexFile::open(index, data, IndexFileOptions::default());
    let trees = trees(&file).await;
    let total = dataset.records.len() as u64;
    let tokenizer = NgramTokenizer::new(3, 3).expect("tokenizer");

    // "sky" and "min"/"ind" each occur in a single title, so every token weighs the same.
    let once = Bm25Scorer::default()
        .score(&tokenizer.tokenize("sky mind"), &trees, total)
        .await
        .expect("score");
    let top = once.top();
    assert_eq!(top[0].0, dataset.records[2]);
    assert_eq!(top[1].0, dataset.records[8]);

    let repeated = Bm25Scorer::default()
        .score(&tokenizer.tokenize("sky sky sky mind"), &trees, total)
        .await
        .expect("score");
    let top = repeated.top();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].0, dataset.records[8]);
    assert_eq!(top[1].0, dataset.records[2]);
    let sky = once.get(&dataset.records[8]).expect("sky");
    assert!((top[0].1 - 3.0 * sky).abs() < 1e-9);
    assert!((top[1].1 - 2.0 * sky).abs() < 1e-9);
}

#[tokio::test]
async fn test_repeated_grams_are_read_once() {
    let dataset = dataset();
    let (data, index) = dataset.resolvers();
    let index = Arc::new(CountingResolver::new(index));
    let file = IndexFile::open(index.clone(), data, IndexFileOptions::default());
    let trees = trees(&file).await;
    let total = dataset.records.len() as u64;
    let tokenizer = NgramTokenizer::new(3, 3).expect("tokenizer");
    let scorer = Bm25Scorer::default();
    scorer
        .score(&tokenizer.tokenize("sky"), &trees, total)
        .await
        .expect("score");

    let before = index.ranges();
    scorer
        .score(&tokenizer.tokenize("sky"), &trees, total)
        .await
        .expect("score");
    let single = index.ranges() - before;

    let before = index.ranges();
    scorer
        .score(&tokenizer.tokenize("sky sky sky"), &trees, total)
        .await
        .expect("score");
    assert_eq!(index.ranges() - before, single);
}

#[tokio::test]
async fn test_tokens_without_tree_are_skipped() {
    let dataset = dataset();
    let (data, index) = dataset.resolvers();
    let file = IndexFile::open(index, data, IndexFileOptions::default());
    let mut trees = trees(&file).await;
    trees.remove(&FieldType::Unigram);

    let tokenizer = NgramTokenizer::new(1, 2).expect("tokenizer");
    let table = Bm25Scorer::default()
        .score(
            &tokenizer.tokenize("tight"),
            &trees,
            dataset.records.len() as u64,
        )
        .await
        .expect("score");
    let top = table.top();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].0, dataset.records[3]);
}

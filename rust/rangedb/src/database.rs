use std::sync::Arc;

use ahash::AHashMap;
use futures::{
    StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use rangedb_common::{Result, error::Error};
use rangedb_format::{FileFormat, FileMeta, MemoryPointer, ReferencedValue};
use rangedb_index::{IndexFile, IndexFileOptions, IndexHeader, TreeCursor};
use rangedb_io::{CachePolicy, CachingResolver, RangeResolver};
use rangedb_text_index::{Bm25Scorer, shuffle_tokens};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::{
    DatabaseOptions,
    plan::{Plan, ScanPlan, SearchPlan},
    query::{Direction, Query},
    record::{CsvHeader, parse_jsonl, project},
};

/// Bytes read per attempt when looking for the end of the CSV header line.
const CSV_HEADER_READ: u64 = 4096;

/// Longest CSV header line accepted.
const CSV_HEADER_MAX: u64 = 1 << 20;

/// A record produced by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow {
    pub record: Value,
    /// BM25 score of a search result, `None` for scans.
    pub score: Option<f64>,
}

/// A queryable dataset: an append-only data file of JSON Lines or CSV records and the
/// index file describing it, both accessed through range resolvers.
///
/// Opening performs no I/O. The field directory, tree roots, and the CSV header are
/// loaded on first use and memoized for the lifetime of the handle; concurrent queries
/// share them.
pub struct Database {
    index: IndexFile,
    options: DatabaseOptions,
    csv_header: OnceCell<CsvHeader>,
}

impl Database {
    pub fn open(
        data: Arc<dyn RangeResolver>,
        index: Arc<dyn RangeResolver>,
        options: DatabaseOptions,
    ) -> Database {
        let index: Arc<dyn RangeResolver> = if options.cache_index {
            Arc::new(CachingResolver::new(
                index,
                CachePolicy::EvictOnIntegrity,
                "index",
            ))
        } else {
            index
        };
        let data: Arc<dyn RangeResolver> = if options.cache_data {
            Arc::new(CachingResolver::new(data, CachePolicy::Immutable, "data"))
        } else {
            data
        };
        let index = IndexFile::open(
            index,
            data,
            IndexFileOptions {
                skip_list_max_level: options.skip_list_max_level,
            },
        );
        Database {
            index,
            options,
            csv_header: OnceCell::new(),
        }
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    fn batch_size(&self) -> usize {
        self.options.fetch_batch_size.max(1)
    }

    pub fn index(&self) -> &IndexFile {
        &self.index
    }

    /// Every indexed field with the types it is indexed under.
    pub async fn fields(&self) -> Result<Vec<IndexHeader>> {
        self.index.headers().await
    }

    pub async fn file_meta(&self) -> Result<FileMeta> {
        self.index.file_meta().await
    }

    /// Runs a query.
    ///
    /// The query is validated before any tree is read. Scans stream their records in key
    /// order (or reverse key order), fetching them from the data file in batches as the
    /// stream is polled. Searches rank all matching documents first and then stream
    /// them by descending score. Every call starts a fresh execution.
    ///
    /// # Errors
    ///
    /// Returns a query validation error for an invalid query, or the error of loading the
    /// field directory. Errors during execution are yielded by the stream.
    pub async fn query(&self, query: &Query) -> Result<BoxStream<'_, Result<QueryRow>>> {
        let headers = self.fields().await?;
        let plan = Plan::build(query, &headers)?;
        log::debug!("query plan: {plan:?}");
        match plan {
            Plan::Empty => Ok(stream::empty().boxed()),
            Plan::Scan(scan) => self.scan(scan, query.select.clone(), query.limit).await,
            Plan::Search(search) => self.search(search, query.select.clone(), query.limit).await,
        }
    }

    async fn scan(
        &self,
        plan: ScanPlan,
        select: Option<Vec<String>>,
        limit: Option<usize>,
    ) -> Result<BoxStream<'_, Result<QueryRow>>> {
        let tree = self
            .index
            .tree(&plan.field_name, plan.field_type)
            .await?
            .ok_or_else(|| {
                Error::query_validation(format!(
                    "field '{}' is not indexed as {}",
                    plan.field_name, plan.field_type
                ))
            })?;
        let cursor = match (plan.direction, &plan.lower, &plan.upper) {
            (Direction::Ascending, Some(lower), _) if lower.inclusive => {
                tree.iter(&ReferencedValue::lower_sentinel(lower.key.clone()))
                    .await?
            }
            (Direction::Ascending, Some(lower), _) => {
                tree.iter_after(&ReferencedValue::upper_sentinel(lower.key.clone()))
                    .await?
            }
            (Direction::Ascending, None, _) => tree.iter_first().await?,
            (Direction::Descending, _, Some(upper)) if upper.inclusive => {
                tree.iter_after(&ReferencedValue::upper_sentinel(upper.key.clone()))
                    .await?
            }
            (Direction::Descending, _, Some(upper)) => {
                tree.iter(&ReferencedValue::lower_sentinel(upper.key.clone()))
                    .await?
            }
            (Direction::Descending, _, None) => tree.iter_last().await?,
        };

        let state = ScanState {
            cursor,
            plan,
            select,
            remaining: limit,
            done: false,
        };
        let rows = stream::try_unfold(state, move |mut state| async move {
            if state.done || state.remaining == Some(0) {
                return Ok(None);
            }
            let want = state
                .remaining
                .map_or(self.batch_size(), |r| r.min(self.batch_size()));
            let mut hits = Vec::with_capacity(want);
            while hits.len() < want {
                let entry = match state.plan.direction {
                    Direction::Ascending => state.cursor.next().await?,
                    Direction::Descending => state.cursor.prev().await?,
                };
                match entry {
                    Some((key, pointer)) if state.admits(&key.value) => hits.push((pointer, None)),
                    _ => {
                        state.done = true;
                        break;
                    }
                }
            }
            if hits.is_empty() {
                return Ok(None);
            }
            let mut rows = self.fetch_records(hits, state.select.as_deref()).await?;
            if let Some(remaining) = state.remaining.as_mut() {
                rows.truncate(*remaining);
                *remaining -= rows.len();
            }
            Ok::<_, Error>(Some((rows, state)))
        });
        Ok(rows
            .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<_, Error>)))
            .try_flatten()
            .boxed())
    }

    async fn search(
        &self,
        plan: SearchPlan,
        select: Option<Vec<String>>,
        limit: Option<usize>,
    ) -> Result<BoxStream<'_, Result<QueryRow>>> {
        let mut trees = AHashMap::new();
        for &field_type in &plan.field_types {
            if let Some(tree) = self.index.tree(&plan.field_name, field_type).await? {
                trees.insert(field_type, tree);
            }
        }
        let mut tokens = plan.tokenizer.tokenize(&plan.phrase);
        if self.options.search.shuffle_tokens {
            shuffle_tokens(&mut tokens, &mut fastrand::Rng::new());
        }
        let total_entries = self.file_meta().await?.entries;
        let table = Bm25Scorer::new(self.options.search.k1)
            .score(&tokens, &trees, total_entries)
            .await?;
        let ranked = match limit {
            Some(k) => table.top_k(k),
            None => table.top(),
        };
        log::debug!(
            "search for '{}' on '{}': {} token(s), {} document(s)",
            plan.phrase,
            plan.field_name,
            tokens.len(),
            ranked.len()
        );

        let batches: Vec<Vec<(MemoryPointer, Option<f64>)>> = ranked
            .chunks(self.batch_size())
            .map(|chunk| chunk.iter().map(|&(p, score)| (p, Some(score))).collect())
            .collect();
        let rows = stream::iter(batches).then(move |hits| {
            let select = select.clone();
            async move { self.fetch_records(hits, select.as_deref()).await }
        });
        Ok(rows
            .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<_, Error>)))
            .try_flatten()
            .boxed())
    }

    /// Reads the records at `hits` with one resolver call and parses them. Records cut
    /// short by the end of the read are skipped.
    async fn fetch_records(
        &self,
        hits: Vec<(MemoryPointer, Option<f64>)>,
        select: Option<&[String]>,
    ) -> Result<Vec<QueryRow>> {
        let pointers: Vec<MemoryPointer> = hits.iter().map(|&(p, _)| p).collect();
        let data = self.index.data_file().read_pointers(&pointers).await?;
        let header = match self.file_meta().await?.format {
            FileFormat::Csv => Some(self.csv_header().await?),
            FileFormat::Jsonl => None,
        };
        let mut rows = Vec::with_capacity(hits.len());
        for ((pointer, score), bytes) in hits.into_iter().zip(data) {
            let record = match header {
                Some(header) => header.parse_row(pointer, &bytes)?,
                None => parse_jsonl(pointer, &bytes)?,
            };
            let Some(record) = record else {
                continue;
            };
            let record = match select {
                Some(paths) => project(&record, paths),
                None => record,
            };
            rows.push(QueryRow { record, score });
        }
        Ok(rows)
    }

    async fn csv_header(&self) -> Result<&CsvHeader> {
        self.csv_header
            .get_or_try_init(|| async {
                let data = self.index.data_file();
                let mut len = CSV_HEADER_READ;
                loop {
                    let prefix = data.read(0, len).await?;
                    if let Some(header) = CsvHeader::from_prefix(&prefix)? {
                        log::debug!("CSV header: {}", header.line());
                        return Ok(header);
                    }
                    if (prefix.len() as u64) < len || len >= CSV_HEADER_MAX {
                        return Err(Error::io(
                            data.name(),
                            std::io::Error::new(
                                std::io::ErrorKind::UnexpectedEof,
                                "no complete CSV header line",
                            ),
                        ));
                    }
                    len *= 2;
                }
            })
            .await
    }
}

struct ScanState {
    cursor: TreeCursor,
    plan: ScanPlan,
    select: Option<Vec<String>>,
    remaining: Option<usize>,
    done: bool,
}

impl ScanState {
    /// Whether `key` is inside the scanned range. Scans stop at the first key outside.
    fn admits(&self, key: &[u8]) -> bool {
        self.plan
            .lower
            .as_ref()
            .is_none_or(|bound| bound.admits_from_below(key))
            && self
                .plan
                .upper
                .as_ref()
                .is_none_or(|bound| bound.admits_from_above(key))
    }
}

use rangedb_collections::skip_list::DEFAULT_MAX_LEVEL;
use rangedb_text_index::DEFAULT_K1;

/// Number of records fetched with one resolver call while streaming results.
pub const DEFAULT_FETCH_BATCH_SIZE: usize = 32;

/// Ranking options of search queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    /// BM25 term-frequency saturation.
    pub k1: f64,
    /// Visit the n-gram trees in random order.
    pub shuffle_tokens: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            k1: DEFAULT_K1,
            shuffle_tokens: true,
        }
    }
}

impl SearchOptions {
    pub fn with_k1(mut self, k1: f64) -> Self {
        self.k1 = k1;
        self
    }

    pub fn with_shuffle_tokens(mut self, shuffle_tokens: bool) -> Self {
        self.shuffle_tokens = shuffle_tokens;
        self
    }
}

/// Options of a [`Database`](crate::Database).
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseOptions {
    /// Memoize index-file ranges. Cached ranges are dropped when the index file is
    /// observed to change.
    pub cache_index: bool,
    /// Memoize data-file ranges. The indexed part of the data file never changes, so
    /// cached ranges are kept for the lifetime of the handle.
    pub cache_data: bool,
    /// Maximum level of the skip list indexing the meta pages.
    pub skip_list_max_level: usize,
    /// Records fetched per resolver call while streaming results.
    pub fetch_batch_size: usize,
    pub search: SearchOptions,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        DatabaseOptions {
            cache_index: true,
            cache_data: true,
            skip_list_max_level: DEFAULT_MAX_LEVEL,
            fetch_batch_size: DEFAULT_FETCH_BATCH_SIZE,
            search: SearchOptions::default(),
        }
    }
}

impl DatabaseOptions {
    pub fn with_cache_index(mut self, cache_index: bool) -> Self {
        self.cache_index = cache_index;
        self
    }

    pub fn with_cache_data(mut self, cache_data: bool) -> Self {
        self.cache_data = cache_data;
        self
    }

    pub fn with_skip_list_max_level(mut self, skip_list_max_level: usize) -> Self {
        self.skip_list_max_level = skip_list_max_level;
        self
    }

    pub fn with_fetch_batch_size(mut self, fetch_batch_size: usize) -> Self {
        self.fetch_batch_size = fetch_batch_size.max(1);
        self
    }

    pub fn with_search(mut self, search: SearchOptions) -> Self {
        self.search = search;
        self
    }
}

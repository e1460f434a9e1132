//! # rangedb: queries over remote append-only files
//!
//! rangedb answers filtered, ordered and ranked queries against a large JSON Lines or
//! CSV file stored remotely, fetching only the byte ranges it needs. The data file is
//! paired with a binary index file holding one B+Tree per indexed `(field, type)` and,
//! for text search, one tree per n-gram size.
//!
//! ## Reading path
//!
//! * A [`RangeResolver`](io::RangeResolver) fetches batches of byte ranges, checking the
//!   observed file length against the expected one. [`http`] provides a resolver over
//!   HTTP `Range` requests, decoding `multipart/byteranges` responses incrementally.
//! * The index file starts with a chain of linked meta pages locating each field's tree
//!   ([`index::MetaDirectory`]).
//! * Trees are read node by node through [`index::BPTree`] and its bidirectional
//!   [`index::TreeCursor`].
//! * [`Database::query`] plans a [`Query`], scans the narrowest key range of a single
//!   field's tree or ranks documents with BM25 over the n-gram trees ([`text_index`]),
//!   and streams the matching records.
//!
//! ## Example
//!
//! ```no_run
//! # async fn example(
//! #     data: std::sync::Arc<dyn rangedb::io::RangeResolver>,
//! #     index: std::sync::Arc<dyn rangedb::io::RangeResolver>,
//! # ) -> rangedb::common::Result<()> {
//! use futures::TryStreamExt;
//! use rangedb::{Database, DatabaseOptions, Query};
//!
//! let db = Database::open(data, index, DatabaseOptions::default());
//! let query = Query::from_json(r#"{"where": [{"key": "age", "operation": ">", "value": 30}]}"#)
//!     .expect("valid query");
//! let rows: Vec<_> = db.query(&query).await?.try_collect().await?;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod options;
pub mod plan;
pub mod query;
pub mod record;

pub use database::{Database, QueryRow};
pub use options::{DatabaseOptions, SearchOptions};
pub use query::{Direction, Operation, OrderBy, Query, SearchConfig, SearchSpec, WhereNode};

pub use rangedb_common as common;
pub use rangedb_format as format;
pub use rangedb_http as http;
pub use rangedb_index as index;
pub use rangedb_io as io;
pub use rangedb_text_index as text_index;

pub mod support {
    pub use rangedb_collections as collections;
}

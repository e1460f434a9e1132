//! Core definitions relied upon by all rangedb-* crates: the error taxonomy,
//! the shared `Result` alias and a few verification macros.

pub mod error;
pub mod result;

pub use result::Result;

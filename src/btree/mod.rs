//! The B-tree index: node layout, record codec, comparator dispatch, the
//! core search/insert/erase algorithms and the cursor system.
//!
//! Module organization mirrors the layering:
//!
//! - `node`: packed leaf/internal node layout inside a page
//! - `record`: inline-vs-blob record discrimination in leaf slots
//! - `compare`: per-database comparator capability
//! - `tree`: recursive descent, splits, erase with empty-page collapse
//! - `cursor`: coupled/uncoupled/nil iteration

pub(crate) mod compare;
pub(crate) mod cursor;
pub(crate) mod node;
pub(crate) mod record;
pub(crate) mod tree;

//! # leafdb: an embeddable, ordered key/value storage engine
//!
//! A single-file B-tree database: point lookup, insert, erase and
//! bidirectional cursor iteration over byte keys and records, durable on
//! disk or entirely in memory.
//!
//! ## Quick start
//!
//! ```
//! use leafdb::{Db, InsertFlags};
//!
//! # fn main() -> eyre::Result<()> {
//! let db = Db::builder().in_memory().create()?;
//!
//! db.insert(b"alpha", b"1", InsertFlags::empty())?;
//! db.insert(b"bravo", b"2", InsertFlags::empty())?;
//!
//! assert_eq!(db.find(b"alpha")?, b"1");
//!
//! let mut cursor = db.cursor()?;
//! let (key, record) = cursor.first()?;
//! assert_eq!((key.as_slice(), record.as_slice()), (&b"alpha"[..], &b"1"[..]));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │      Public API (Db / Cursor)        │
//! ├──────────────────────────────────────┤
//! │  B-tree core │ Cursors │ Txn scaffold│
//! ├──────────────────────────────────────┤
//! │  Node layout / record codec / blobs  │
//! ├──────────────────────────────────────┤
//! │     Page cache (pin / evict)         │
//! ├──────────────────────────────────────┤
//! │  Device (mmap / file / in-memory)    │
//! └──────────────────────────────────────┘
//! ```
//!
//! Pages are fixed-size blocks identified by their byte offset in the
//! device. Page 0 holds the header (magic, version, geometry, root
//! pointer, freelist head, key count); every other page is a B-tree
//! node, a blob chunk or a freelist link. Records up to eight bytes live
//! inline in their leaf slot; larger ones go to the blob store.
//!
//! Cursors stay *coupled* to a (page, slot) pair for O(1) iteration,
//! automatically *uncouple* (keeping a copy of their key) when their page
//! is mutated or evicted, and re-couple by searching on demand.
//!
//! ## Concurrency model
//!
//! One database handle is single-threaded by contract: every call runs to
//! completion under the handle's internal lock. Distinct databases are
//! independent. There is no WAL and no crash recovery: `flush` writes
//! and syncs, and the engine trusts that a completed flush reached disk.
//!
//! ## Errors
//!
//! Operations return `eyre::Result`; every failure carries a [`DbError`]
//! status recoverable with [`DbError::of`] and mirrored in
//! [`Db::last_error`].

mod btree;
mod config;
mod db;
mod device;
mod error;
mod memory;
mod storage;
mod txn;

pub use btree::compare::{CompareFn, PrefixCompareFn, PrefixOutcome};
pub use btree::cursor::Cursor;
pub use db::{Db, DbBuilder, InsertFlags, OpenFlags};
pub use error::DbError;
pub use memory::MemTracker;

/// The library version triple (major, minor, revision).
pub fn version() -> (u32, u32, u32) {
    (
        config::VERSION_MAJOR as u32,
        config::VERSION_MINOR as u32,
        config::VERSION_REVISION as u32,
    )
}

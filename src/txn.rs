//! Transaction scaffold.
//!
//! Transactions are lightweight scopes, non-nested and single-threaded.
//! Any top-level mutating call that finds no active transaction opens a
//! local one around itself ([`crate::db::DbInner::run_mut`]). Commit hands
//! every dirty page to the cache's writeback path (no WAL, undefined
//! order) and rewrites the header; abort returns pages allocated during
//! the transaction to the freelist. In-place mutations are not rolled
//! back; aborts are best-effort by design.

use eyre::{ensure, Result};
use smallvec::SmallVec;

use crate::db::DbInner;
use crate::error::DbError;

/// State carried by an active transaction.
#[derive(Debug, Default)]
pub(crate) struct TxnState {
    /// Pages allocated while the transaction was active, newest last.
    allocated: SmallVec<[u64; 8]>,
}

impl TxnState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_alloc(&mut self, offset: u64) {
        self.allocated.push(offset);
    }
}

impl DbInner {
    pub(crate) fn txn_begin(&mut self) -> Result<()> {
        ensure!(self.txn.is_none(), DbError::InvParameter);
        self.txn = Some(TxnState::new());
        Ok(())
    }

    pub(crate) fn txn_commit(&mut self) -> Result<()> {
        ensure!(self.txn.is_some(), DbError::InvParameter);
        let result = self.flush_dirty_pages();
        self.txn = None;
        result
    }

    pub(crate) fn txn_abort(&mut self) -> Result<()> {
        let txn = match self.txn.take() {
            Some(txn) => txn,
            None => eyre::bail!(DbError::InvParameter),
        };
        // newest first, so a chain of allocations unwinds cleanly
        for &offset in txn.allocated.iter().rev() {
            let _ = self.free_page(offset);
        }
        Ok(())
    }
}

//! B-tree core: search, insert with splits, erase with empty-page
//! collapse.
//!
//! Insert uses a recursive descent. Each level reports its outcome upward
//! as a value instead of an out-parameter scratchpad:
//!
//! - [`InsertOutcome::Done`]: the subtree absorbed the key.
//! - [`InsertOutcome::Split`]: the child split; the parent must adopt the
//!   pivot key and the new sibling's offset, possibly splitting itself.
//!
//! A split at the top allocates a new root whose `ptr_left` is the old
//! root; the old root page is retagged and kept.
//!
//! Erase removes the slot in the leaf and frees any blob it referenced.
//! Underflow handling is the empty-page form: a node that reaches count
//! zero is unlinked from the sibling chain, detached from its parent and
//! returned to the freelist; an internal root left holding only `ptr_left`
//! is replaced by that child. Sparse internal nodes are otherwise left
//! alone; the search invariant does not require minimum occupancy.
//!
//! Any fetch may evict an unpinned page, so multi-page operations pin the
//! pages they hold across their inner fetches.

use std::cmp::Ordering;

use eyre::{bail, ensure, eyre, Result, WrapErr};
use tracing::{debug, trace};

use crate::btree::node::{NodeView, NodeViewMut, SearchResult};
use crate::btree::record::{self, RecordEncoding, INLINE_MAX};
use crate::db::DbInner;
use crate::error::DbError;
use crate::storage::PageType;

/// What a level of the recursive insert reports to its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InsertOutcome {
    Done,
    Split { pivot: Vec<u8>, new_off: u64 },
}

/// One step of a descent.
enum Step {
    Leaf(SearchResult),
    Child(u64),
}

impl DbInner {
    fn descend_step(&mut self, off: u64, key: &[u8]) -> Result<Step> {
        self.fetch_page(off)?;
        let page = self.cache.peek(off).expect("page just fetched");
        let node = NodeView::new(page.data(), self.cfg.key_size)?;
        if node.is_leaf() {
            Ok(Step::Leaf(node.search(key, &self.comparator)))
        } else {
            let child = node.child_for(key, &self.comparator);
            ensure!(
                child != 0,
                eyre!(DbError::Io).wrap_err("internal node has no child for key")
            );
            Ok(Step::Child(child))
        }
    }

    /// Root-to-leaf descent; returns the leaf offset and the search result
    /// inside it (exact slot or insertion point).
    pub(crate) fn tree_locate(&mut self, key: &[u8]) -> Result<(u64, SearchResult)> {
        let mut off = self.root_offset;
        loop {
            match self.descend_step(off, key)? {
                Step::Leaf(sr) => return Ok((off, sr)),
                Step::Child(child) => off = child,
            }
        }
    }

    pub(crate) fn tree_find(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        ensure!(key.len() <= self.cfg.key_size, DbError::InvKeySize);
        let (leaf, sr) = self.tree_locate(key)?;
        match sr {
            SearchResult::Found(index) => self.read_record_at(leaf, index),
            SearchResult::NotFound(_) => bail!(DbError::KeyNotFound),
        }
    }

    /// Decodes the record of leaf slot `index`. The page stays pinned
    /// across the blob read so re-entering the storage layer cannot evict
    /// it.
    pub(crate) fn read_record_at(&mut self, off: u64, index: usize) -> Result<Vec<u8>> {
        self.with_pin(off, |db| {
            let (flags, rid) = {
                let page = db.cache.peek(off).expect("pinned page");
                let node = NodeView::new(page.data(), db.cfg.key_size)?;
                let slot = node.slot(index);
                (slot.flags, slot.rid)
            };
            match record::decode(flags, rid) {
                RecordEncoding::Blob(blob) => db.blob_read(blob),
                encoding => Ok(record::inline_bytes(&rid, encoding).to_vec()),
            }
        })
    }

    pub(crate) fn tree_insert(&mut self, key: &[u8], rec: &[u8], overwrite: bool) -> Result<()> {
        ensure!(key.len() <= self.cfg.key_size, DbError::InvKeySize);
        let root = self.root_offset;
        match self.insert_recursive(root, key, rec, overwrite)? {
            InsertOutcome::Done => Ok(()),
            InsertOutcome::Split { pivot, new_off } => self.split_root(root, pivot, new_off),
        }
    }

    fn insert_recursive(
        &mut self,
        off: u64,
        key: &[u8],
        rec: &[u8],
        overwrite: bool,
    ) -> Result<InsertOutcome> {
        match self.descend_step(off, key)? {
            Step::Leaf(sr) => self.insert_in_leaf(off, sr, key, rec, overwrite),
            Step::Child(child) => match self.insert_recursive(child, key, rec, overwrite)? {
                InsertOutcome::Done => Ok(InsertOutcome::Done),
                InsertOutcome::Split { pivot, new_off } => {
                    self.insert_in_internal(off, pivot, new_off)
                }
            },
        }
    }

    fn insert_in_leaf(
        &mut self,
        off: u64,
        sr: SearchResult,
        key: &[u8],
        rec: &[u8],
        overwrite: bool,
    ) -> Result<InsertOutcome> {
        match sr {
            SearchResult::Found(index) => {
                if !overwrite {
                    return Err(eyre!(DbError::DuplicateKey))
                        .wrap_err("key already exists and OVERWRITE is not set");
                }
                self.overwrite_record_at(off, index, rec)?;
                Ok(InsertOutcome::Done)
            }
            SearchResult::NotFound(index) => {
                let count = self.node_count(off)?;
                if count < self.cfg.max_keys {
                    self.leaf_insert_nosplit(off, index, key, rec)?;
                    Ok(InsertOutcome::Done)
                } else {
                    self.split_leaf(off, key, rec)
                }
            }
        }
    }

    fn node_count(&mut self, off: u64) -> Result<usize> {
        self.fetch_page(off)?;
        let page = self.cache.peek(off).expect("page just fetched");
        Ok(NodeView::new(page.data(), self.cfg.key_size)?.count())
    }

    fn leaf_search(&mut self, off: u64, key: &[u8]) -> Result<SearchResult> {
        self.fetch_page(off)?;
        let page = self.cache.peek(off).expect("page just fetched");
        let node = NodeView::new(page.data(), self.cfg.key_size)?;
        Ok(node.search(key, &self.comparator))
    }

    /// Inserts into a leaf that has room. Shifting slots invalidates every
    /// coupled cursor index on the page, so they are uncoupled first.
    fn leaf_insert_nosplit(
        &mut self,
        off: u64,
        index: usize,
        key: &[u8],
        rec: &[u8],
    ) -> Result<()> {
        self.uncouple_page_cursors(off, None)?;
        self.with_pin(off, |db| {
            let (rid, flags) = if rec.len() <= INLINE_MAX {
                record::encode_inline(rec)
            } else {
                (db.blob_allocate(rec)?.to_le_bytes(), 0)
            };
            let page = db.cache.peek_mut(off).expect("pinned page");
            let mut node = NodeViewMut::new(page.data_mut(), db.cfg.key_size)?;
            node.insert_slot(index, key, rid, flags);
            Ok(())
        })?;
        self.key_count += 1;
        self.header_dirty = true;
        Ok(())
    }

    /// Replaces the record of an existing leaf slot in place. No slot
    /// shifts happen, so coupled cursors stay valid.
    pub(crate) fn overwrite_record_at(&mut self, off: u64, index: usize, rec: &[u8]) -> Result<()> {
        self.with_pin(off, |db| {
            let (old_flags, old_rid) = {
                let page = db.cache.peek(off).expect("pinned page");
                let node = NodeView::new(page.data(), db.cfg.key_size)?;
                let slot = node.slot(index);
                (slot.flags, slot.rid)
            };
            let old = record::decode(old_flags, old_rid);

            let (rid, flags) = if rec.len() <= INLINE_MAX {
                if let RecordEncoding::Blob(blob) = old {
                    db.blob_free(blob)?;
                }
                record::encode_inline(rec)
            } else if let RecordEncoding::Blob(blob) = old {
                (db.blob_overwrite(blob, rec)?.to_le_bytes(), 0)
            } else {
                (db.blob_allocate(rec)?.to_le_bytes(), 0)
            };

            let page = db.cache.peek_mut(off).expect("pinned page");
            let mut node = NodeViewMut::new(page.data_mut(), db.cfg.key_size)?;
            node.set_record(index, rid, flags);
            Ok(())
        })
    }

    fn split_leaf(&mut self, off: u64, key: &[u8], rec: &[u8]) -> Result<InsertOutcome> {
        trace!(offset = off, "splitting leaf");
        self.uncouple_page_cursors(off, None)?;
        let new_off = self.alloc_page(PageType::Leaf, true)?;
        self.pin_page(new_off);
        let result = self.split_leaf_stages(off, new_off, key, rec);
        self.unpin_page(new_off);
        result
    }

    fn split_leaf_stages(
        &mut self,
        off: u64,
        new_off: u64,
        key: &[u8],
        rec: &[u8],
    ) -> Result<InsertOutcome> {
        self.fetch_page(off)?;
        let (pivot_key, upper, count, old_right) = {
            let page = self.cache.peek(off).expect("page just fetched");
            let node = NodeView::new(page.data(), self.cfg.key_size)?;
            let count = node.count();
            let pivot = count / 2;
            (
                node.key_at(pivot).to_vec(),
                node.slot_bytes(pivot, count).to_vec(),
                count,
                node.right(),
            )
        };
        let pivot = count / 2;

        // the new sibling takes slots [pivot..count)
        {
            let page = self.cache.peek_mut(new_off).expect("pinned page");
            let mut node = NodeViewMut::new(page.data_mut(), self.cfg.key_size)?;
            node.adopt_slots(0, &upper, count - pivot);
            node.set_left(off);
            node.set_right(old_right);
        }
        {
            let page = self.cache.peek_mut(off).expect("page just fetched");
            let mut node = NodeViewMut::new(page.data_mut(), self.cfg.key_size)?;
            node.set_count(pivot);
            node.set_right(new_off);
        }
        if old_right != 0 {
            self.fetch_page(old_right)?;
            let page = self.cache.peek_mut(old_right).expect("page just fetched");
            let mut node = NodeViewMut::new(page.data_mut(), self.cfg.key_size)?;
            node.set_left(new_off);
        }

        // the inserting key goes to whichever side the pivot assigns; a
        // key equal to the pivot belongs right, like any other tie
        let target = if self.comparator.compare(&pivot_key, key) != Ordering::Greater {
            new_off
        } else {
            off
        };
        let index = match self.leaf_search(target, key)? {
            SearchResult::Found(_) => bail!(DbError::DuplicateKey),
            SearchResult::NotFound(index) => index,
        };
        self.leaf_insert_nosplit(target, index, key, rec)?;

        Ok(InsertOutcome::Split {
            pivot: pivot_key,
            new_off,
        })
    }

    /// Adopts a pivot bubbled up from a split child. Pivots never collide,
    /// so an exact hit just rewrites the child offset.
    fn insert_in_internal(
        &mut self,
        off: u64,
        pivot: Vec<u8>,
        child: u64,
    ) -> Result<InsertOutcome> {
        self.fetch_page(off)?;
        let (sr, count) = {
            let page = self.cache.peek(off).expect("page just fetched");
            let node = NodeView::new(page.data(), self.cfg.key_size)?;
            (node.search(&pivot, &self.comparator), node.count())
        };
        match sr {
            SearchResult::Found(index) => {
                let page = self.cache.peek_mut(off).expect("page just fetched");
                let mut node = NodeViewMut::new(page.data_mut(), self.cfg.key_size)?;
                node.set_record(index, child.to_le_bytes(), 0);
                Ok(InsertOutcome::Done)
            }
            SearchResult::NotFound(index) => {
                if count < self.cfg.max_keys {
                    let page = self.cache.peek_mut(off).expect("page just fetched");
                    let mut node = NodeViewMut::new(page.data_mut(), self.cfg.key_size)?;
                    node.insert_slot(index, &pivot, child.to_le_bytes(), 0);
                    Ok(InsertOutcome::Done)
                } else {
                    self.split_internal(off, pivot, child)
                }
            }
        }
    }

    fn split_internal(&mut self, off: u64, key: Vec<u8>, child: u64) -> Result<InsertOutcome> {
        trace!(offset = off, "splitting internal node");
        let new_off = self.alloc_page(PageType::Index, false)?;
        self.pin_page(new_off);
        let result = self.split_internal_stages(off, new_off, key, child);
        self.unpin_page(new_off);
        result
    }

    fn split_internal_stages(
        &mut self,
        off: u64,
        new_off: u64,
        key: Vec<u8>,
        child: u64,
    ) -> Result<InsertOutcome> {
        self.fetch_page(off)?;
        let (pivot_key, pivot_rid, upper, count, old_right) = {
            let page = self.cache.peek(off).expect("page just fetched");
            let node = NodeView::new(page.data(), self.cfg.key_size)?;
            let count = node.count();
            let pivot = count / 2;
            (
                node.key_at(pivot).to_vec(),
                node.rid_at(pivot),
                node.slot_bytes(pivot + 1, count).to_vec(),
                count,
                node.right(),
            )
        };
        let pivot = count / 2;

        // the pivot key moves up; its subtree becomes the new node's
        // ptr_left and slots [pivot+1..count) follow it
        {
            let page = self.cache.peek_mut(new_off).expect("pinned page");
            let mut node = NodeViewMut::new(page.data_mut(), self.cfg.key_size)?;
            node.adopt_slots(0, &upper, count - pivot - 1);
            node.set_ptr_left(pivot_rid);
            node.set_left(off);
            node.set_right(old_right);
        }
        {
            let page = self.cache.peek_mut(off).expect("page just fetched");
            let mut node = NodeViewMut::new(page.data_mut(), self.cfg.key_size)?;
            node.set_count(pivot);
            node.set_right(new_off);
        }
        if old_right != 0 {
            self.fetch_page(old_right)?;
            let page = self.cache.peek_mut(old_right).expect("page just fetched");
            let mut node = NodeViewMut::new(page.data_mut(), self.cfg.key_size)?;
            node.set_left(new_off);
        }

        let target = if self.comparator.compare(&pivot_key, &key) != Ordering::Greater {
            new_off
        } else {
            off
        };
        self.fetch_page(target)?;
        let index = {
            let page = self.cache.peek(target).expect("page just fetched");
            let node = NodeView::new(page.data(), self.cfg.key_size)?;
            match node.search(&key, &self.comparator) {
                SearchResult::Found(_) => bail!(DbError::DuplicateKey),
                SearchResult::NotFound(index) => index,
            }
        };
        {
            let page = self.cache.peek_mut(target).expect("page just fetched");
            let mut node = NodeViewMut::new(page.data_mut(), self.cfg.key_size)?;
            node.insert_slot(index, &key, child.to_le_bytes(), 0);
        }

        Ok(InsertOutcome::Split {
            pivot: pivot_key,
            new_off,
        })
    }

    /// The recursion returned `Split` at the top: grow the tree by one
    /// level. The old root is retagged and kept in place.
    fn split_root(&mut self, old_root: u64, pivot: Vec<u8>, new_off: u64) -> Result<()> {
        let old_is_leaf = {
            self.fetch_page(old_root)?;
            let page = self.cache.peek(old_root).expect("page just fetched");
            NodeView::new(page.data(), self.cfg.key_size)?.is_leaf()
        };

        let new_root = self.alloc_page(PageType::Root, false)?;
        {
            let page = self.cache.peek_mut(new_root).expect("fresh page is cached");
            let mut node = NodeViewMut::new(page.data_mut(), self.cfg.key_size)?;
            node.set_ptr_left(old_root);
            node.insert_slot(0, &pivot, new_off.to_le_bytes(), 0);
        }
        {
            self.fetch_page(old_root)?;
            let page = self.cache.peek_mut(old_root).expect("page just fetched");
            page.set_page_type(if old_is_leaf {
                PageType::Leaf
            } else {
                PageType::Index
            })?;
            if !old_is_leaf {
                // internal sibling links are never traversed above the
                // leaf chain; zero them rather than leave stale offsets
                let mut node = NodeViewMut::new(page.data_mut(), self.cfg.key_size)?;
                node.set_left(0);
                node.set_right(0);
            }
        }

        self.root_offset = new_root;
        self.header_dirty = true;
        debug!(new_root, "root split, tree grew one level");
        Ok(())
    }

    pub(crate) fn tree_erase(&mut self, key: &[u8]) -> Result<()> {
        ensure!(key.len() <= self.cfg.key_size, DbError::InvKeySize);

        let mut stack: Vec<u64> = Vec::new();
        let mut off = self.root_offset;
        let (leaf, index) = loop {
            match self.descend_step(off, key)? {
                Step::Leaf(SearchResult::Found(index)) => break (off, index),
                Step::Leaf(SearchResult::NotFound(_)) => bail!(DbError::KeyNotFound),
                Step::Child(child) => {
                    stack.push(off);
                    off = child;
                }
            }
        };

        self.uncouple_page_cursors(leaf, None)?;

        // release the blob before its referencing slot disappears
        let (flags, rid) = {
            let page = self.cache.peek(leaf).expect("leaf is cached");
            let node = NodeView::new(page.data(), self.cfg.key_size)?;
            let slot = node.slot(index);
            (slot.flags, slot.rid)
        };
        if let RecordEncoding::Blob(blob) = record::decode(flags, rid) {
            self.blob_free(blob)?;
        }

        let remaining = {
            self.fetch_page(leaf)?;
            let page = self.cache.peek_mut(leaf).expect("page just fetched");
            let mut node = NodeViewMut::new(page.data_mut(), self.cfg.key_size)?;
            node.remove_slot(index);
            node.as_view().count()
        };
        self.key_count = self.key_count.saturating_sub(1);
        self.header_dirty = true;

        if remaining == 0 && leaf != self.root_offset {
            self.collapse_empty(stack, leaf)?;
        }
        Ok(())
    }

    /// Detaches an emptied node from its siblings and its parent and frees
    /// it, walking upward while parents empty out in turn. An internal
    /// root left holding only `ptr_left` is replaced by that child; if the
    /// entire tree drains, the root page is reinitialized as an empty
    /// leaf.
    fn collapse_empty(&mut self, mut stack: Vec<u64>, mut empty: u64) -> Result<()> {
        loop {
            let (left, right) = {
                self.fetch_page(empty)?;
                let page = self.cache.peek(empty).expect("page just fetched");
                let node = NodeView::new(page.data(), self.cfg.key_size)?;
                (node.left(), node.right())
            };
            if left != 0 {
                self.fetch_page(left)?;
                let page = self.cache.peek_mut(left).expect("page just fetched");
                NodeViewMut::new(page.data_mut(), self.cfg.key_size)?.set_right(right);
            }
            if right != 0 {
                self.fetch_page(right)?;
                let page = self.cache.peek_mut(right).expect("page just fetched");
                NodeViewMut::new(page.data_mut(), self.cfg.key_size)?.set_left(left);
            }

            let Some(parent) = stack.pop() else {
                // the root itself drained: reset it to an empty leaf
                self.fetch_page(empty)?;
                let page = self.cache.peek_mut(empty).expect("page just fetched");
                NodeViewMut::init(page.data_mut(), self.cfg.key_size, PageType::Root, true)?;
                debug!("tree drained to an empty root leaf");
                return Ok(());
            };

            self.fetch_page(parent)?;
            let (via_ptr_left, slot_idx, pcount) = {
                let page = self.cache.peek(parent).expect("page just fetched");
                let node = NodeView::new(page.data(), self.cfg.key_size)?;
                if node.ptr_left() == empty {
                    (true, 0, node.count())
                } else {
                    let idx = (0..node.count())
                        .find(|&j| node.rid_at(j) == empty)
                        .ok_or_else(|| {
                            eyre!(DbError::Io).wrap_err("emptied child missing from its parent")
                        })?;
                    (false, idx, node.count())
                }
            };

            if via_ptr_left {
                if pcount == 0 {
                    // the parent's only child drained; the parent drains too
                    self.free_page(empty)?;
                    let page = self.cache.peek_mut(parent).expect("parent is cached");
                    NodeViewMut::new(page.data_mut(), self.cfg.key_size)?.set_ptr_left(0);
                    empty = parent;
                    continue;
                }
                let first = {
                    let page = self.cache.peek(parent).expect("parent is cached");
                    NodeView::new(page.data(), self.cfg.key_size)?.rid_at(0)
                };
                {
                    let page = self.cache.peek_mut(parent).expect("parent is cached");
                    let mut node = NodeViewMut::new(page.data_mut(), self.cfg.key_size)?;
                    node.set_ptr_left(first);
                    node.remove_slot(0);
                }
                self.free_page(empty)?;
            } else {
                {
                    let page = self.cache.peek_mut(parent).expect("parent is cached");
                    NodeViewMut::new(page.data_mut(), self.cfg.key_size)?.remove_slot(slot_idx);
                }
                self.free_page(empty)?;
            }

            // a root holding only ptr_left shrinks the tree by one level
            let (pcount, ptr_left) = {
                self.fetch_page(parent)?;
                let page = self.cache.peek(parent).expect("parent is cached");
                let node = NodeView::new(page.data(), self.cfg.key_size)?;
                (node.count(), node.ptr_left())
            };
            if parent == self.root_offset && pcount == 0 && ptr_left != 0 {
                self.free_page(parent)?;
                self.root_offset = ptr_left;
                self.header_dirty = true;
                self.fetch_page(ptr_left)?;
                let page = self.cache.peek_mut(ptr_left).expect("page just fetched");
                page.set_page_type(PageType::Root)?;
                debug!(new_root = ptr_left, "tree height reduced");
            }
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Db, DbError, InsertFlags};
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn small_db() -> Db {
        Db::builder()
            .in_memory()
            .page_size(1024)
            .key_size(8)
            .create()
            .unwrap()
    }

    #[test]
    fn record_size_matrix_round_trips() {
        let db = Db::builder().in_memory().page_size(1024).create().unwrap();

        // exercises empty, tiny, small and blob encodings
        for size in [0usize, 1, 7, 8, 9, 1024] {
            let key = format!("size-{:04}", size);
            let record: Vec<u8> = (0..size).map(|b| (b % 251) as u8).collect();
            db.insert(key.as_bytes(), &record, InsertFlags::empty())
                .unwrap();
            assert_eq!(db.find(key.as_bytes()).unwrap(), record, "size {}", size);
        }
    }

    #[test]
    fn duplicate_key_rejected_unless_overwrite() {
        let db = small_db();
        db.insert(b"k", b"v1", InsertFlags::empty()).unwrap();

        let err = db.insert(b"k", b"v2", InsertFlags::empty()).unwrap_err();
        assert_eq!(DbError::of(&err), DbError::DuplicateKey);
        assert_eq!(db.find(b"k").unwrap(), b"v1");
        assert_eq!(db.key_count(), 1);

        db.insert(b"k", b"v2", InsertFlags::OVERWRITE).unwrap();
        assert_eq!(db.find(b"k").unwrap(), b"v2");
        assert_eq!(db.key_count(), 1);
    }

    #[test]
    fn overwrite_walks_every_encoding() {
        let db = small_db();
        db.insert(b"k", b"abc", InsertFlags::empty()).unwrap(); // tiny

        let blob: Vec<u8> = (0..200u8).collect(); // blob
        db.insert(b"k", &blob, InsertFlags::OVERWRITE).unwrap();
        assert_eq!(db.find(b"k").unwrap(), blob);

        db.insert(b"k", b"12345678", InsertFlags::OVERWRITE).unwrap(); // small
        assert_eq!(db.find(b"k").unwrap(), b"12345678");

        db.insert(b"k", b"", InsertFlags::OVERWRITE).unwrap(); // empty
        assert_eq!(db.find(b"k").unwrap(), b"");
        assert_eq!(db.key_count(), 1);
    }

    #[test]
    fn ascending_inserts_split_and_stay_ordered() {
        let db = small_db();
        for i in 0..200u32 {
            db.insert(&i.to_be_bytes(), &i.to_le_bytes(), InsertFlags::empty())
                .unwrap();
        }
        assert_eq!(db.key_count(), 200);
        for i in 0..200u32 {
            assert_eq!(db.find(&i.to_be_bytes()).unwrap(), i.to_le_bytes());
        }
    }

    #[test]
    fn descending_inserts_split_and_stay_ordered() {
        let db = small_db();
        for i in (0..200u32).rev() {
            db.insert(&i.to_be_bytes(), &i.to_le_bytes(), InsertFlags::empty())
                .unwrap();
        }
        for i in 0..200u32 {
            assert_eq!(db.find(&i.to_be_bytes()).unwrap(), i.to_le_bytes());
        }
    }

    #[test]
    fn random_inserts_scan_in_comparator_order() {
        let db = small_db();
        let mut keys: Vec<u32> = (0..2000).collect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x1eafdb);
        keys.shuffle(&mut rng);

        for &i in &keys {
            db.insert(&i.to_be_bytes(), &i.to_le_bytes(), InsertFlags::empty())
                .unwrap();
        }
        assert_eq!(db.key_count(), 2000);

        let mut cursor = db.cursor().unwrap();
        let mut seen = 0u32;
        let (key, _) = cursor.first().unwrap();
        assert_eq!(key, 0u32.to_be_bytes());
        seen += 1;
        while let Ok((key, record)) = cursor.next() {
            assert_eq!(key, seen.to_be_bytes(), "scan out of order");
            assert_eq!(record, seen.to_le_bytes());
            seen += 1;
        }
        assert_eq!(seen, 2000);
    }

    #[test]
    fn erase_is_exact_then_key_not_found() {
        let db = small_db();
        db.insert(b"k", b"v", InsertFlags::empty()).unwrap();

        db.erase(b"k").unwrap();
        assert_eq!(db.key_count(), 0);

        let err = db.erase(b"k").unwrap_err();
        assert_eq!(DbError::of(&err), DbError::KeyNotFound);
        let err = db.find(b"k").unwrap_err();
        assert_eq!(DbError::of(&err), DbError::KeyNotFound);
    }

    #[test]
    fn erase_frees_blob_storage_for_reuse() {
        let db = small_db();
        // small enough for a single-page chunk, large enough for a blob
        let blob = vec![0x5Au8; 500];
        db.insert(b"big", &blob, InsertFlags::empty()).unwrap();
        db.erase(b"big").unwrap();

        let size_after_erase = db.file_size();
        db.insert(b"big2", &blob, InsertFlags::empty()).unwrap();
        // the freed chunk page is reused, so the device must not grow
        assert_eq!(db.file_size(), size_after_erase);
    }

    #[test]
    fn fill_deep_then_erase_to_empty_reclaims_pages() {
        let db = small_db();
        // ~48 slots per 1KiB leaf: 4000 keys forces several levels
        for i in 0..4000u32 {
            db.insert(&i.to_be_bytes(), b"x", InsertFlags::empty()).unwrap();
        }
        for i in 0..4000u32 {
            db.erase(&i.to_be_bytes()).unwrap();
        }
        assert_eq!(db.key_count(), 0);

        let mut cursor = db.cursor().unwrap();
        let err = cursor.first().unwrap_err();
        assert_eq!(DbError::of(&err), DbError::KeyNotFound);
        drop(cursor);

        // every freed page is reused: refilling must not grow the device
        let size_empty = db.file_size();
        for i in 0..4000u32 {
            db.insert(&i.to_be_bytes(), b"x", InsertFlags::empty()).unwrap();
        }
        assert_eq!(db.file_size(), size_empty);
    }

    #[test]
    fn interleaved_erase_keeps_remaining_keys_reachable() {
        let db = small_db();
        for i in 0..1000u32 {
            db.insert(&i.to_be_bytes(), &i.to_le_bytes(), InsertFlags::empty())
                .unwrap();
        }
        for i in (0..1000u32).step_by(2) {
            db.erase(&i.to_be_bytes()).unwrap();
        }
        for i in 0..1000u32 {
            let result = db.find(&i.to_be_bytes());
            if i % 2 == 0 {
                assert_eq!(DbError::of(&result.unwrap_err()), DbError::KeyNotFound);
            } else {
                assert_eq!(result.unwrap(), i.to_le_bytes());
            }
        }
        assert_eq!(db.key_count(), 500);
    }
}

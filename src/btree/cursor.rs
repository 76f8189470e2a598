//! Cursors: coupled / uncoupled / nil iteration over the tree.
//!
//! A cursor is in one of three states:
//!
//! - **Nil**: points at nothing.
//! - **Coupled**: bound to a live (page, slot) pair and enrolled on that
//!   page's cursor list. O(1) step to the neighboring slot. Coupled
//!   cursors always sit on leaves.
//! - **Uncoupled**: the cursor owns a heap copy of its last-known key and
//!   is bound to no page. It re-couples by searching for that key on
//!   demand, landing on the exact slot or the next greater one.
//!
//! Coupled and uncoupled are mutually exclusive. Whenever a page is about
//! to shift slots (insert, erase, split) or be evicted, every cursor on
//! its list except the actively mutating one is uncoupled; destroying a
//! page therefore never leaves a cursor pointing into it.
//!
//! Cursor state lives in the database's cursor registry, keyed by id; the
//! public [`Cursor`] is a handle carrying the id plus a database handle.
//! Page cursor lists hold ids, not references, so the page/cursor graph
//! has no ownership cycle.

use eyre::{bail, ensure, eyre, Result};

use crate::btree::node::{NodeView, SearchResult};
use crate::db::{Db, DbInner, InsertFlags};
use crate::error::DbError;

/// Registry state of one cursor.
#[derive(Debug, Clone, Default)]
pub(crate) enum CursorPos {
    #[default]
    Nil,
    Coupled {
        page: u64,
        index: usize,
    },
    Uncoupled {
        key: Vec<u8>,
    },
}

impl DbInner {
    pub(crate) fn cursor_register(&mut self) -> u64 {
        let id = self.next_cursor_id;
        self.next_cursor_id += 1;
        self.cursors.insert(id, CursorPos::Nil);
        id
    }

    pub(crate) fn cursor_remove(&mut self, id: u64) {
        self.cursor_set_nil(id);
        self.cursors.remove(&id);
    }

    /// Releases whatever the cursor holds: its page-list entry when
    /// coupled, its key copy when uncoupled.
    pub(crate) fn cursor_set_nil(&mut self, id: u64) {
        match self.cursors.get(&id) {
            Some(CursorPos::Coupled { page, .. }) => {
                let page = *page;
                if let Some(p) = self.cache.peek_mut(page) {
                    p.cursors.retain(|c| *c != id);
                }
            }
            Some(CursorPos::Uncoupled { key }) => {
                self.mem.release(key.len());
            }
            _ => {}
        }
        self.cursors.insert(id, CursorPos::Nil);
    }

    /// Couples the cursor to a cached leaf page slot.
    fn cursor_couple_at(&mut self, id: u64, page: u64, index: usize) {
        self.cursor_set_nil(id);
        let cached = self.cache.peek_mut(page);
        debug_assert!(cached.is_some(), "coupling to an uncached page");
        if let Some(p) = cached {
            p.cursors.push(id);
        }
        self.cursors.insert(id, CursorPos::Coupled { page, index });
    }

    /// Copies the key out of one coupled cursor's slot and detaches it
    /// from its page.
    fn cursor_uncouple(&mut self, id: u64) -> Result<()> {
        let CursorPos::Coupled { page, index } = self.cursors.get(&id).cloned().unwrap_or_default()
        else {
            return Ok(());
        };
        let key = {
            let cached = self.cache.peek(page);
            debug_assert!(cached.is_some(), "coupled cursor on an uncached page");
            let page = cached.ok_or_else(|| eyre!(DbError::Io))?;
            let node = NodeView::new(page.data(), self.cfg.key_size)?;
            debug_assert!(node.is_leaf(), "coupled cursor on an internal node");
            node.key_at(index).to_vec()
        };
        self.mem.charge(key.len())?;
        if let Some(p) = self.cache.peek_mut(page) {
            p.cursors.retain(|c| *c != id);
        }
        self.cursors.insert(id, CursorPos::Uncoupled { key });
        Ok(())
    }

    /// Uncouples every cursor on a page, except the actively mutating one.
    /// Called before slot shifts, splits and eviction.
    pub(crate) fn uncouple_page_cursors(&mut self, off: u64, except: Option<u64>) -> Result<()> {
        let ids: Vec<u64> = match self.cache.peek(off) {
            Some(page) if !page.cursors.is_empty() => page.cursors.to_vec(),
            _ => return Ok(()),
        };
        for id in ids {
            if except == Some(id) {
                continue;
            }
            self.cursor_uncouple(id)?;
        }
        Ok(())
    }

    /// Re-couples an uncoupled cursor by searching for its remembered key.
    /// Lands on the exact slot or the next greater one, crossing into the
    /// right sibling when the key sorts past the leaf's end.
    pub(crate) fn cursor_couple(&mut self, id: u64) -> Result<()> {
        let key = match self.cursors.get(&id) {
            Some(CursorPos::Uncoupled { key }) => key.clone(),
            Some(CursorPos::Coupled { .. }) => return Ok(()),
            _ => bail!(DbError::CursorIsNil),
        };
        let (leaf, sr) = self.tree_locate(&key)?;
        let index = match sr {
            SearchResult::Found(index) => index,
            SearchResult::NotFound(index) => index,
        };
        let count = {
            let page = self.cache.peek(leaf).expect("leaf just located");
            NodeView::new(page.data(), self.cfg.key_size)?.count()
        };
        if index < count {
            self.cursor_couple_at(id, leaf, index);
            return Ok(());
        }
        let right = {
            let page = self.cache.peek(leaf).expect("leaf just located");
            NodeView::new(page.data(), self.cfg.key_size)?.right()
        };
        ensure!(
            right != 0,
            eyre!(DbError::KeyNotFound).wrap_err("remembered key sorts past the last slot")
        );
        self.fetch_page(right)?;
        self.cursor_couple_at(id, right, 0);
        Ok(())
    }

    pub(crate) fn cursor_first(&mut self, id: u64) -> Result<()> {
        self.cursor_set_nil(id);
        let mut off = self.root_offset;
        loop {
            self.fetch_page(off)?;
            let (is_leaf, count, down) = {
                let page = self.cache.peek(off).expect("page just fetched");
                let node = NodeView::new(page.data(), self.cfg.key_size)?;
                (node.is_leaf(), node.count(), node.ptr_left())
            };
            if is_leaf {
                ensure!(count > 0, DbError::KeyNotFound);
                self.cursor_couple_at(id, off, 0);
                return Ok(());
            }
            ensure!(down != 0, eyre!(DbError::Io).wrap_err("internal node without ptr_left"));
            off = down;
        }
    }

    pub(crate) fn cursor_last(&mut self, id: u64) -> Result<()> {
        self.cursor_set_nil(id);
        let mut off = self.root_offset;
        loop {
            self.fetch_page(off)?;
            let (is_leaf, count, down) = {
                let page = self.cache.peek(off).expect("page just fetched");
                let node = NodeView::new(page.data(), self.cfg.key_size)?;
                let down = if node.is_leaf() {
                    0
                } else if node.count() > 0 {
                    node.rid_at(node.count() - 1)
                } else {
                    node.ptr_left()
                };
                (node.is_leaf(), node.count(), down)
            };
            if is_leaf {
                ensure!(count > 0, DbError::KeyNotFound);
                self.cursor_couple_at(id, off, count - 1);
                return Ok(());
            }
            ensure!(down != 0, eyre!(DbError::Io).wrap_err("internal node without children"));
            off = down;
        }
    }

    pub(crate) fn cursor_next(&mut self, id: u64) -> Result<()> {
        match self.cursors.get(&id) {
            // a NIL cursor reinterprets next as first
            Some(CursorPos::Nil) => return self.cursor_first(id),
            Some(CursorPos::Uncoupled { .. }) => self.cursor_couple(id)?,
            Some(CursorPos::Coupled { .. }) => {}
            None => bail!(DbError::CursorIsNil),
        }
        let CursorPos::Coupled { page, index } = self.cursors.get(&id).cloned().unwrap_or_default()
        else {
            bail!(DbError::CursorIsNil);
        };
        let (count, right) = {
            let cached = self.cache.peek(page).ok_or_else(|| eyre!(DbError::Io))?;
            let node = NodeView::new(cached.data(), self.cfg.key_size)?;
            (node.count(), node.right())
        };
        if index + 1 < count {
            self.cursors
                .insert(id, CursorPos::Coupled { page, index: index + 1 });
            return Ok(());
        }
        ensure!(right != 0, DbError::KeyNotFound);
        self.fetch_page(right)?;
        let rcount = {
            let cached = self.cache.peek(right).expect("page just fetched");
            NodeView::new(cached.data(), self.cfg.key_size)?.count()
        };
        ensure!(rcount > 0, DbError::KeyNotFound);
        self.cursor_couple_at(id, right, 0);
        Ok(())
    }

    pub(crate) fn cursor_previous(&mut self, id: u64) -> Result<()> {
        match self.cursors.get(&id) {
            // a NIL cursor reinterprets previous as last
            Some(CursorPos::Nil) => return self.cursor_last(id),
            Some(CursorPos::Uncoupled { .. }) => self.cursor_couple(id)?,
            Some(CursorPos::Coupled { .. }) => {}
            None => bail!(DbError::CursorIsNil),
        }
        let CursorPos::Coupled { page, index } = self.cursors.get(&id).cloned().unwrap_or_default()
        else {
            bail!(DbError::CursorIsNil);
        };
        if index > 0 {
            self.cursors
                .insert(id, CursorPos::Coupled { page, index: index - 1 });
            return Ok(());
        }
        let left = {
            let cached = self.cache.peek(page).ok_or_else(|| eyre!(DbError::Io))?;
            NodeView::new(cached.data(), self.cfg.key_size)?.left()
        };
        ensure!(left != 0, DbError::KeyNotFound);
        self.fetch_page(left)?;
        let lcount = {
            let cached = self.cache.peek(left).expect("page just fetched");
            NodeView::new(cached.data(), self.cfg.key_size)?.count()
        };
        ensure!(lcount > 0, DbError::KeyNotFound);
        self.cursor_couple_at(id, left, lcount - 1);
        Ok(())
    }

    /// Find with cursor coupling as a side effect; failure leaves the
    /// cursor NIL.
    pub(crate) fn cursor_find(&mut self, id: u64, key: &[u8]) -> Result<()> {
        ensure!(key.len() <= self.cfg.key_size, DbError::InvKeySize);
        self.cursor_set_nil(id);
        let (leaf, sr) = self.tree_locate(key)?;
        match sr {
            SearchResult::Found(index) => {
                self.cursor_couple_at(id, leaf, index);
                Ok(())
            }
            SearchResult::NotFound(_) => bail!(DbError::KeyNotFound),
        }
    }

    /// Reads the key and record under the cursor, coupling first if
    /// needed. The page stays pinned across the record decode.
    pub(crate) fn cursor_read(&mut self, id: u64) -> Result<(Vec<u8>, Vec<u8>)> {
        match self.cursors.get(&id) {
            Some(CursorPos::Nil) | None => bail!(DbError::CursorIsNil),
            Some(CursorPos::Uncoupled { .. }) => self.cursor_couple(id)?,
            Some(CursorPos::Coupled { .. }) => {}
        }
        let CursorPos::Coupled { page, index } = self.cursors.get(&id).cloned().unwrap_or_default()
        else {
            bail!(DbError::CursorIsNil);
        };
        self.with_pin(page, |db| {
            let key = {
                let cached = db.cache.peek(page).expect("pinned page");
                let node = NodeView::new(cached.data(), db.cfg.key_size)?;
                ensure!(index < node.count(), eyre!(DbError::Io).wrap_err("stale cursor slot"));
                node.key_at(index).to_vec()
            };
            let record = db.read_record_at(page, index)?;
            Ok((key, record))
        })
    }

    pub(crate) fn cursor_insert(
        &mut self,
        id: u64,
        key: &[u8],
        rec: &[u8],
        overwrite: bool,
    ) -> Result<()> {
        self.cursor_set_nil(id);
        self.tree_insert(key, rec, overwrite)?;
        // couple to the slot the key landed in
        let (leaf, sr) = self.tree_locate(key)?;
        if let SearchResult::Found(index) = sr {
            self.cursor_couple_at(id, leaf, index);
        }
        Ok(())
    }

    /// Erases the key under the cursor. The cursor uncouples first (its
    /// own key survives as the copy) and ends NIL.
    pub(crate) fn cursor_erase(&mut self, id: u64) -> Result<()> {
        match self.cursors.get(&id) {
            Some(CursorPos::Nil) | None => bail!(DbError::CursorIsNil),
            Some(CursorPos::Coupled { .. }) => self.cursor_uncouple(id)?,
            Some(CursorPos::Uncoupled { .. }) => {}
        }
        let key = match self.cursors.get(&id) {
            Some(CursorPos::Uncoupled { key }) => key.clone(),
            _ => bail!(DbError::CursorIsNil),
        };
        self.tree_erase(&key)?;
        self.cursor_set_nil(id);
        Ok(())
    }

    /// Replaces the record under the cursor in place.
    pub(crate) fn cursor_overwrite(&mut self, id: u64, rec: &[u8]) -> Result<()> {
        match self.cursors.get(&id) {
            Some(CursorPos::Nil) | None => bail!(DbError::CursorIsNil),
            Some(CursorPos::Uncoupled { .. }) => self.cursor_couple(id)?,
            Some(CursorPos::Coupled { .. }) => {}
        }
        let CursorPos::Coupled { page, index } = self.cursors.get(&id).cloned().unwrap_or_default()
        else {
            bail!(DbError::CursorIsNil);
        };
        self.overwrite_record_at(page, index, rec)
    }

    pub(crate) fn cursor_clone(&mut self, id: u64) -> Result<u64> {
        let new_id = self.cursor_register();
        match self.cursors.get(&id).cloned() {
            Some(CursorPos::Coupled { page, index }) => {
                if let Some(p) = self.cache.peek_mut(page) {
                    p.cursors.push(new_id);
                }
                self.cursors
                    .insert(new_id, CursorPos::Coupled { page, index });
            }
            Some(CursorPos::Uncoupled { key }) => {
                self.mem.charge(key.len())?;
                self.cursors.insert(new_id, CursorPos::Uncoupled { key });
            }
            _ => {}
        }
        Ok(new_id)
    }
}

/// A bidirectional iterator over the database.
///
/// Movement returns the key/record pair the cursor lands on. A fresh
/// cursor is NIL; `next` on a NIL cursor behaves as `first` and
/// `previous` as `last`. Walking off either end fails with
/// [`DbError::KeyNotFound`] and leaves the position unchanged.
pub struct Cursor {
    db: Db,
    id: u64,
}

impl Cursor {
    pub(crate) fn new(db: Db, id: u64) -> Self {
        Self { db, id }
    }

    pub fn first(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let id = self.id;
        self.db
            .with_inner(|db| db.run(|db| {
                db.cursor_first(id)?;
                db.cursor_read(id)
            }))
    }

    pub fn last(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let id = self.id;
        self.db
            .with_inner(|db| db.run(|db| {
                db.cursor_last(id)?;
                db.cursor_read(id)
            }))
    }

    pub fn next(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let id = self.id;
        self.db
            .with_inner(|db| db.run(|db| {
                db.cursor_next(id)?;
                db.cursor_read(id)
            }))
    }

    pub fn previous(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let id = self.id;
        self.db
            .with_inner(|db| db.run(|db| {
                db.cursor_previous(id)?;
                db.cursor_read(id)
            }))
    }

    /// Positions the cursor on `key` and returns its record. On failure
    /// the cursor is NIL.
    pub fn find(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        let id = self.id;
        self.db.with_inner(|db| {
            db.run(|db| {
                db.cursor_find(id, key)?;
                Ok(db.cursor_read(id)?.1)
            })
        })
    }

    /// Re-reads the pair under the cursor, re-coupling if necessary.
    pub fn current(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let id = self.id;
        self.db.with_inner(|db| db.run(|db| db.cursor_read(id)))
    }

    /// Inserts and leaves the cursor coupled to the new key.
    pub fn insert(&mut self, key: &[u8], record: &[u8], flags: InsertFlags) -> Result<()> {
        let id = self.id;
        let overwrite = flags.contains(InsertFlags::OVERWRITE);
        self.db
            .with_inner(|db| db.run_mut(|db| db.cursor_insert(id, key, record, overwrite)))
    }

    /// Erases the key under the cursor; the cursor ends NIL.
    pub fn erase(&mut self) -> Result<()> {
        let id = self.id;
        self.db.with_inner(|db| db.run_mut(|db| db.cursor_erase(id)))
    }

    /// Replaces the record under the cursor without moving it.
    pub fn overwrite(&mut self, record: &[u8]) -> Result<()> {
        let id = self.id;
        self.db
            .with_inner(|db| db.run_mut(|db| db.cursor_overwrite(id, record)))
    }

    /// Returns the cursor to NIL, releasing any held key copy.
    pub fn reset(&mut self) {
        let id = self.id;
        self.db.with_inner(|db| db.cursor_set_nil(id));
    }

    pub fn is_nil(&self) -> bool {
        let id = self.id;
        self.db
            .with_inner(|db| matches!(db.cursors.get(&id), Some(CursorPos::Nil) | None))
    }

    /// Duplicates the cursor, position included.
    pub fn try_clone(&self) -> Result<Cursor> {
        let id = self.id;
        let new_id = self
            .db
            .with_inner(|db| db.run(|db| db.cursor_clone(id)))?;
        Ok(Cursor::new(self.db.clone(), new_id))
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        let id = self.id;
        self.db.with_inner(|db| db.cursor_remove(id));
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Db, DbError, InsertFlags};

    fn small_db() -> Db {
        Db::builder()
            .in_memory()
            .page_size(1024)
            .key_size(8)
            .create()
            .unwrap()
    }

    fn fill(db: &Db, n: u32) {
        for i in 0..n {
            db.insert(&i.to_be_bytes(), &i.to_le_bytes(), InsertFlags::empty())
                .unwrap();
        }
    }

    #[test]
    fn empty_tree_moves_fail_with_key_not_found() {
        let db = small_db();
        let mut cursor = db.cursor().unwrap();

        let err = cursor.first().unwrap_err();
        assert_eq!(DbError::of(&err), DbError::KeyNotFound);

        // next on a NIL cursor behaves as first
        let err = cursor.next().unwrap_err();
        assert_eq!(DbError::of(&err), DbError::KeyNotFound);
        assert!(cursor.is_nil());
    }

    #[test]
    fn nil_next_lands_on_smallest_key() {
        let db = small_db();
        fill(&db, 10);

        let mut cursor = db.cursor().unwrap();
        let (key, record) = cursor.next().unwrap();
        assert_eq!(key, 0u32.to_be_bytes());
        assert_eq!(record, 0u32.to_le_bytes());

        let mut back = db.cursor().unwrap();
        let (key, _) = back.previous().unwrap();
        assert_eq!(key, 9u32.to_be_bytes());
    }

    #[test]
    fn forward_scan_visits_every_key_once_in_order() {
        let db = small_db();
        fill(&db, 200); // several leaves

        let mut cursor = db.cursor().unwrap();
        let mut expected = 0u32;
        let (key, _) = cursor.first().unwrap();
        assert_eq!(key, expected.to_be_bytes());
        expected += 1;
        loop {
            match cursor.next() {
                Ok((key, record)) => {
                    assert_eq!(key, expected.to_be_bytes());
                    assert_eq!(record, expected.to_le_bytes());
                    expected += 1;
                }
                Err(err) => {
                    assert_eq!(DbError::of(&err), DbError::KeyNotFound);
                    break;
                }
            }
        }
        assert_eq!(expected, 200);
    }

    #[test]
    fn backward_scan_mirrors_forward_scan() {
        let db = small_db();
        fill(&db, 200);

        let mut cursor = db.cursor().unwrap();
        let mut expected = 199u32;
        let (key, _) = cursor.last().unwrap();
        assert_eq!(key, expected.to_be_bytes());
        loop {
            match cursor.previous() {
                Ok((key, _)) => {
                    expected -= 1;
                    assert_eq!(key, expected.to_be_bytes());
                }
                Err(err) => {
                    assert_eq!(DbError::of(&err), DbError::KeyNotFound);
                    break;
                }
            }
        }
        assert_eq!(expected, 0);
    }

    #[test]
    fn find_couples_and_failure_leaves_nil() {
        let db = small_db();
        fill(&db, 20);

        let mut cursor = db.cursor().unwrap();
        assert_eq!(cursor.find(&7u32.to_be_bytes()).unwrap(), 7u32.to_le_bytes());
        assert!(!cursor.is_nil());

        let err = cursor.find(b"nothere").unwrap_err();
        assert_eq!(DbError::of(&err), DbError::KeyNotFound);
        assert!(cursor.is_nil());
    }

    #[test]
    fn current_on_nil_cursor_is_cursor_is_nil() {
        let db = small_db();
        fill(&db, 5);
        let mut cursor = db.cursor().unwrap();

        let err = cursor.current().unwrap_err();
        assert_eq!(DbError::of(&err), DbError::CursorIsNil);
        let err = cursor.overwrite(b"x").unwrap_err();
        assert_eq!(DbError::of(&err), DbError::CursorIsNil);
        let err = cursor.erase().unwrap_err();
        assert_eq!(DbError::of(&err), DbError::CursorIsNil);
    }

    #[test]
    fn cursor_survives_a_split_of_its_page() {
        let db = small_db();
        // fill one leaf nearly full of widely spaced keys
        for i in 0..48u32 {
            let key = (i * 10).to_be_bytes();
            db.insert(&key, &i.to_le_bytes(), InsertFlags::empty()).unwrap();
        }

        let watched = (10u32 * 10).to_be_bytes();
        let mut cursor = db.cursor().unwrap();
        cursor.find(&watched).unwrap();

        // force the leaf to split around the watched slot
        for i in 0..60u32 {
            let key = (i * 10 + 5).to_be_bytes();
            db.insert(&key, b"wedge", InsertFlags::empty()).unwrap();
        }

        // the cursor re-couples to the same key, wherever it moved
        let (key, record) = cursor.current().unwrap();
        assert_eq!(key, watched);
        assert_eq!(record, 10u32.to_le_bytes());
    }

    #[test]
    fn cursor_on_sibling_key_survives_erase_on_its_page() {
        let db = small_db();
        fill(&db, 10);

        let mut cursor = db.cursor().unwrap();
        cursor.find(&5u32.to_be_bytes()).unwrap();

        // erasing a neighbor shifts slots; the cursor must follow its key
        db.erase(&2u32.to_be_bytes()).unwrap();

        let (key, record) = cursor.current().unwrap();
        assert_eq!(key, 5u32.to_be_bytes());
        assert_eq!(record, 5u32.to_le_bytes());

        // and iteration continues from the watched key
        let (key, _) = cursor.next().unwrap();
        assert_eq!(key, 6u32.to_be_bytes());
    }

    #[test]
    fn erase_under_cursor_leaves_it_nil() {
        let db = small_db();
        fill(&db, 5);

        let mut cursor = db.cursor().unwrap();
        cursor.find(&3u32.to_be_bytes()).unwrap();
        cursor.erase().unwrap();
        assert!(cursor.is_nil());

        let err = db.find(&3u32.to_be_bytes()).unwrap_err();
        assert_eq!(DbError::of(&err), DbError::KeyNotFound);

        let err = cursor.erase().unwrap_err();
        assert_eq!(DbError::of(&err), DbError::CursorIsNil);
    }

    #[test]
    fn cursor_insert_couples_to_the_new_key() {
        let db = small_db();
        let mut cursor = db.cursor().unwrap();

        cursor.insert(b"k", b"v", InsertFlags::empty()).unwrap();
        let (key, record) = cursor.current().unwrap();
        assert_eq!(key, b"k");
        assert_eq!(record, b"v");
    }

    #[test]
    fn overwrite_under_cursor_transitions_encodings() {
        let db = small_db();
        let mut cursor = db.cursor().unwrap();
        cursor.insert(b"k", b"abc", InsertFlags::empty()).unwrap(); // tiny

        let blob = vec![0xB0u8; 300];
        cursor.overwrite(&blob).unwrap(); // tiny -> blob
        assert_eq!(cursor.current().unwrap().1, blob);

        cursor.overwrite(b"").unwrap(); // blob -> empty, frees the blob
        assert_eq!(cursor.current().unwrap().1, b"");

        cursor.overwrite(b"12345678").unwrap(); // empty -> small
        assert_eq!(db.find(b"k").unwrap(), b"12345678");
    }

    #[test]
    fn clone_duplicates_position_and_moves_independently() {
        let db = small_db();
        fill(&db, 10);

        let mut cursor = db.cursor().unwrap();
        cursor.find(&4u32.to_be_bytes()).unwrap();

        let mut twin = cursor.try_clone().unwrap();
        assert_eq!(twin.current().unwrap().0, 4u32.to_be_bytes());

        let (key, _) = twin.next().unwrap();
        assert_eq!(key, 5u32.to_be_bytes());
        // the original did not move
        assert_eq!(cursor.current().unwrap().0, 4u32.to_be_bytes());
    }

    #[test]
    fn reset_returns_cursor_to_nil() {
        let db = small_db();
        fill(&db, 3);

        let mut cursor = db.cursor().unwrap();
        cursor.first().unwrap();
        assert!(!cursor.is_nil());
        cursor.reset();
        assert!(cursor.is_nil());
    }

    #[test]
    fn many_cursors_survive_eviction_pressure() {
        let db = Db::builder()
            .in_memory()
            .page_size(1024)
            .key_size(8)
            .cache_pages(4)
            .create()
            .unwrap();
        fill(&db, 2000);

        // park a cursor on every 100th key
        let mut parked = Vec::new();
        for i in (0..2000u32).step_by(100) {
            let mut cursor = db.cursor().unwrap();
            cursor.find(&i.to_be_bytes()).unwrap();
            parked.push((i, cursor));
        }

        // churn the cache so parked pages get evicted and re-read
        for i in 0..2000u32 {
            db.find(&i.to_be_bytes()).unwrap();
        }

        for (i, cursor) in &mut parked {
            let (key, record) = cursor.current().unwrap();
            assert_eq!(key, i.to_be_bytes());
            assert_eq!(record, i.to_le_bytes());
        }
    }
}

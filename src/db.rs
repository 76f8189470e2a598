//! Database handle, configuration and the inner engine state.
//!
//! [`Db`] is the public handle: a cheap clone around the single-threaded
//! engine guarded by a mutex. Correctness is only guaranteed when calls on
//! one database are serialized, which the lock enforces mechanically;
//! there is no finer-grained locking because there is no concurrent
//! access by design.
//!
//! [`DbInner`] owns everything: device, page cache, freelist, comparator,
//! cursor registry, transaction state and the header fields (root offset,
//! key count). The B-tree, blob store, cursor and transaction operations
//! are implemented as `DbInner` methods in their own modules; this module
//! provides the substrate they share (page fetch/alloc/free with
//! eviction, pin scopes, header persistence) plus the builder and the
//! public API surface.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bitflags::bitflags;
use eyre::{bail, ensure, eyre, Result, WrapErr};
use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::btree::compare::{Comparator, CompareFn, PrefixCompareFn};
use crate::btree::cursor::{Cursor, CursorPos};
use crate::btree::node::node_capacity;
use crate::config::{
    DEFAULT_CACHE_PAGES, DEFAULT_KEY_SIZE, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, MIN_KEY_SIZE,
    MIN_NODE_CAPACITY, MIN_PAGE_SIZE,
};
use crate::device::{create_file_device, open_file_device, Device, MemDevice};
use crate::error::DbError;
use crate::memory::MemTracker;
use crate::storage::header::{DbHeader, DB_HEADER_SIZE};
use crate::storage::page::{Page, PageType};
use crate::storage::{freelist, Freelist, PageCache, PAGE_TAG_SIZE};
use crate::txn::TxnState;

bitflags! {
    /// Open/create flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OpenFlags: u32 {
        /// Keep the database entirely in memory; nothing touches disk.
        const IN_MEMORY = 0x01;
        /// Reject every mutating operation.
        const READ_ONLY = 0x02;
        /// Never evict: a full cache fails with `LimitsReached` instead.
        const CACHE_STRICT = 0x04;
        /// Use plain file I/O instead of a memory mapping.
        const DISABLE_MMAP = 0x08;
    }
}

bitflags! {
    /// Insert flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InsertFlags: u32 {
        /// Replace the record if the key already exists.
        const OVERWRITE = 0x01;
    }
}

/// Validated geometry and mode of one database.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub page_size: usize,
    pub key_size: usize,
    pub max_keys: usize,
    pub cache_pages: usize,
    pub flags: OpenFlags,
}

/// Builder for creating or opening a database, following the usual
/// builder idiom:
///
/// ```no_run
/// # use leafdb::Db;
/// # fn main() -> eyre::Result<()> {
/// let db = Db::builder()
///     .path("data.ldb")
///     .page_size(4096)
///     .key_size(16)
///     .create()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DbBuilder {
    path: Option<PathBuf>,
    flags: OpenFlags,
    page_size: u32,
    key_size: u16,
    max_keys: Option<usize>,
    cache_pages: usize,
    memory_limit: usize,
}

impl Default for DbBuilder {
    fn default() -> Self {
        Self {
            path: None,
            flags: OpenFlags::empty(),
            page_size: DEFAULT_PAGE_SIZE,
            key_size: DEFAULT_KEY_SIZE,
            max_keys: None,
            cache_pages: DEFAULT_CACHE_PAGES,
            memory_limit: 0,
        }
    }
}

impl DbBuilder {
    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn in_memory(mut self) -> Self {
        self.flags |= OpenFlags::IN_MEMORY;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.flags |= OpenFlags::READ_ONLY;
        self
    }

    pub fn cache_strict(mut self) -> Self {
        self.flags |= OpenFlags::CACHE_STRICT;
        self
    }

    pub fn disable_mmap(mut self) -> Self {
        self.flags |= OpenFlags::DISABLE_MMAP;
        self
    }

    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn page_size(mut self, bytes: u32) -> Self {
        self.page_size = bytes;
        self
    }

    pub fn key_size(mut self, bytes: u16) -> Self {
        self.key_size = bytes;
        self
    }

    /// Caps the slots per node below the page capacity.
    pub fn max_keys(mut self, count: usize) -> Self {
        self.max_keys = Some(count);
        self
    }

    pub fn cache_pages(mut self, pages: usize) -> Self {
        self.cache_pages = pages;
        self
    }

    /// Hard cap on tracked memory (cache buffers, cursor keys), in bytes.
    pub fn memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = bytes;
        self
    }

    fn validated_config(&self) -> Result<Config> {
        ensure!(
            self.page_size.is_power_of_two()
                && (MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size),
            DbError::InvPageSize
        );
        ensure!(
            self.key_size >= MIN_KEY_SIZE && u32::from(self.key_size) < self.page_size,
            DbError::InvKeySize
        );
        let capacity = node_capacity(self.page_size as usize, self.key_size as usize);
        ensure!(capacity >= MIN_NODE_CAPACITY, DbError::InvKeySize);

        let max_keys = match self.max_keys {
            Some(requested) => {
                ensure!(
                    (MIN_NODE_CAPACITY..=capacity).contains(&requested),
                    DbError::InvParameter
                );
                requested
            }
            None => capacity,
        };
        ensure!(self.cache_pages > 0, DbError::InvParameter);
        ensure!(
            !(self.flags.contains(OpenFlags::IN_MEMORY)
                && self.flags.contains(OpenFlags::CACHE_STRICT)),
            DbError::InvParameter
        );

        Ok(Config {
            page_size: self.page_size as usize,
            key_size: self.key_size as usize,
            max_keys,
            cache_pages: self.cache_pages,
            flags: self.flags,
        })
    }

    /// Creates a new database, truncating any existing file.
    pub fn create(self) -> Result<Db> {
        let cfg = self.validated_config()?;
        ensure!(!cfg.flags.contains(OpenFlags::READ_ONLY), DbError::InvParameter);

        let device: Box<dyn Device> = if cfg.flags.contains(OpenFlags::IN_MEMORY) {
            ensure!(self.path.is_none(), DbError::InvParameter);
            Box::new(MemDevice::new())
        } else {
            let path = self.path.as_deref().ok_or_else(|| eyre!(DbError::InvParameter))?;
            create_file_device(path, cfg.flags.contains(OpenFlags::DISABLE_MMAP))?
        };

        let mut inner = DbInner::new(cfg, device, self.memory_limit);
        inner.format()?;
        debug!(
            page_size = inner.cfg.page_size,
            key_size = inner.cfg.key_size,
            max_keys = inner.cfg.max_keys,
            "database created"
        );
        Ok(Db {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Opens an existing database file. Geometry comes from the file
    /// header; builder geometry settings are ignored.
    pub fn open(self) -> Result<Db> {
        ensure!(!self.flags.contains(OpenFlags::IN_MEMORY), DbError::InvParameter);
        ensure!(self.cache_pages > 0, DbError::InvParameter);
        let path = self.path.as_deref().ok_or_else(|| eyre!(DbError::InvParameter))?;

        let mut device = open_file_device(
            path,
            self.flags.contains(OpenFlags::READ_ONLY),
            self.flags.contains(OpenFlags::DISABLE_MMAP),
        )?;

        let mut buf = [0u8; DB_HEADER_SIZE];
        device
            .read_at(0, &mut buf)
            .wrap_err("database file too short for its header")?;
        let header = DbHeader::from_bytes(&buf)?;

        let page_size = header.page_size() as usize;
        let key_size = header.key_size() as usize;
        let capacity = node_capacity(page_size, key_size);
        let max_keys = match self.max_keys {
            Some(requested) => {
                ensure!(
                    (MIN_NODE_CAPACITY..=capacity).contains(&requested),
                    DbError::InvParameter
                );
                requested
            }
            None => capacity,
        };

        let root = header.root_offset();
        ensure!(
            root != 0 && root % page_size as u64 == 0 && root < device.len(),
            eyre!(DbError::Io).wrap_err("header root pointer is corrupt")
        );

        let cfg = Config {
            page_size,
            key_size,
            max_keys,
            cache_pages: self.cache_pages,
            flags: self.flags,
        };
        let mut inner = DbInner::new(cfg, device, self.memory_limit);
        inner.root_offset = root;
        inner.key_count = header.key_count();
        inner.freelist = Freelist::new(header.freelist_head());
        debug!(
            page_size,
            key_size,
            key_count = inner.key_count,
            "database opened"
        );
        Ok(Db {
            inner: Arc::new(Mutex::new(inner)),
        })
    }
}

/// Handle to an open database.
///
/// Cloning is cheap and every clone refers to the same engine; calls are
/// serialized internally. Dropping the last handle flushes and closes the
/// database best-effort; use [`Db::close`] to observe errors.
#[derive(Clone)]
pub struct Db {
    pub(crate) inner: Arc<Mutex<DbInner>>,
}

impl Db {
    pub fn builder() -> DbBuilder {
        DbBuilder::default()
    }

    /// Creates a file-backed database with default geometry.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Db> {
        Self::builder().path(path).create()
    }

    /// Opens an existing file-backed database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Db> {
        Self::builder().path(path).open()
    }

    pub(crate) fn with_inner<T>(&self, f: impl FnOnce(&mut DbInner) -> T) -> T {
        let mut inner = self.inner.lock();
        f(&mut inner)
    }

    /// Point lookup. Fails with [`DbError::KeyNotFound`] for absent keys.
    pub fn find(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.with_inner(|db| db.run(|db| db.tree_find(key)))
    }

    /// Inserts a key/record pair. An existing key fails with
    /// [`DbError::DuplicateKey`] unless [`InsertFlags::OVERWRITE`] is set,
    /// in which case the record is genuinely replaced.
    pub fn insert(&self, key: &[u8], record: &[u8], flags: InsertFlags) -> Result<()> {
        let overwrite = flags.contains(InsertFlags::OVERWRITE);
        self.with_inner(|db| db.run_mut(|db| db.tree_insert(key, record, overwrite)))
    }

    /// Removes a key. Fails with [`DbError::KeyNotFound`] if absent.
    pub fn erase(&self, key: &[u8]) -> Result<()> {
        self.with_inner(|db| db.run_mut(|db| db.tree_erase(key)))
    }

    /// Writes every dirty page and the header, then syncs the device.
    pub fn flush(&self) -> Result<()> {
        self.with_inner(|db| db.run(|db| db.flush_all(true)))
    }

    /// Begins an explicit transaction. Transactions are non-nested.
    pub fn begin(&self) -> Result<()> {
        self.with_inner(|db| db.run(|db| db.txn_begin()))
    }

    /// Commits the active transaction, handing dirty pages to writeback.
    pub fn commit(&self) -> Result<()> {
        self.with_inner(|db| db.run(|db| db.txn_commit()))
    }

    /// Aborts the active transaction, discarding its page allocations.
    pub fn abort(&self) -> Result<()> {
        self.with_inner(|db| db.run(|db| db.txn_abort()))
    }

    /// Creates a new NIL cursor.
    pub fn cursor(&self) -> Result<Cursor> {
        let id = self.with_inner(|db| db.run(|db| Ok(db.cursor_register())))?;
        Ok(Cursor::new(self.clone(), id))
    }

    /// Installs the full-key comparator. Must happen before the first
    /// insert; keys already stored under another order are not resorted.
    pub fn set_compare_fn(&self, f: CompareFn) -> Result<()> {
        self.with_inner(|db| {
            db.run(|db| {
                db.comparator.set_full(f);
                Ok(())
            })
        })
    }

    /// Installs the prefix comparator consulted before the full one.
    pub fn set_prefix_compare_fn(&self, f: PrefixCompareFn) -> Result<()> {
        self.with_inner(|db| {
            db.run(|db| {
                db.comparator.set_prefix(f);
                Ok(())
            })
        })
    }

    /// Status of the most recent failed operation, if any. The slot is
    /// cleared by the next successful operation.
    pub fn last_error(&self) -> Option<DbError> {
        self.with_inner(|db| db.last_error)
    }

    /// Number of keys in the tree.
    pub fn key_count(&self) -> u64 {
        self.with_inner(|db| db.key_count)
    }

    /// Current size of the backing device in bytes.
    pub fn file_size(&self) -> u64 {
        self.with_inner(|db| db.device.len())
    }

    /// Bytes of tracked memory still charged; non-zero after close means
    /// a leak.
    pub fn leaked_bytes(&self) -> usize {
        self.with_inner(|db| db.mem.report_leaks())
    }

    /// Flushes and shuts the database down. Idempotent; operations after
    /// close fail with [`DbError::NotInitialized`].
    pub fn close(&self) -> Result<()> {
        self.with_inner(|db| db.close_inner())
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db").finish_non_exhaustive()
    }
}

/// The engine proper; always accessed under the handle's lock.
pub(crate) struct DbInner {
    pub(crate) cfg: Config,
    pub(crate) device: Box<dyn Device>,
    pub(crate) cache: PageCache,
    pub(crate) freelist: Freelist,
    pub(crate) comparator: Comparator,
    pub(crate) cursors: HashMap<u64, CursorPos>,
    pub(crate) next_cursor_id: u64,
    pub(crate) root_offset: u64,
    pub(crate) key_count: u64,
    pub(crate) header_dirty: bool,
    pub(crate) txn: Option<TxnState>,
    pub(crate) mem: MemTracker,
    pub(crate) last_error: Option<DbError>,
    open: bool,
}

impl DbInner {
    fn new(cfg: Config, device: Box<dyn Device>, memory_limit: usize) -> Self {
        let cache = PageCache::new(cfg.cache_pages);
        let mem = if memory_limit == 0 {
            MemTracker::new()
        } else {
            MemTracker::with_limit(memory_limit)
        };
        Self {
            cfg,
            device,
            cache,
            freelist: Freelist::default(),
            comparator: Comparator::default(),
            cursors: HashMap::new(),
            next_cursor_id: 1,
            root_offset: 0,
            key_count: 0,
            header_dirty: false,
            txn: None,
            mem,
            last_error: None,
            open: true,
        }
    }

    pub(crate) fn page_size(&self) -> usize {
        self.cfg.page_size
    }

    fn is_read_only(&self) -> bool {
        self.cfg.flags.contains(OpenFlags::READ_ONLY)
    }

    /// Lays out a fresh database: header page plus an empty root leaf.
    fn format(&mut self) -> Result<()> {
        let page_size = self.cfg.page_size;
        let page0 = vec![0u8; page_size];
        self.device.write_at(0, &page0)?;

        let root = self.alloc_page(PageType::Root, true)?;
        self.root_offset = root;
        self.header_dirty = true;
        self.flush_all(false)?;
        Ok(())
    }

    /// Wraps a read-path operation: open check and last-error recording.
    pub(crate) fn run<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if !self.open {
            self.last_error = Some(DbError::NotInitialized);
            bail!(DbError::NotInitialized);
        }
        self.last_error = None;
        match f(self) {
            Ok(value) => Ok(value),
            Err(report) => {
                self.last_error = Some(DbError::of(&report));
                Err(report)
            }
        }
    }

    /// Wraps a mutating operation: open and writability checks, implicit
    /// local transaction when none is active, last-error recording.
    pub(crate) fn run_mut<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if !self.open {
            self.last_error = Some(DbError::NotInitialized);
            bail!(DbError::NotInitialized);
        }
        if self.is_read_only() {
            self.last_error = Some(DbError::InvParameter);
            return Err(eyre!(DbError::InvParameter))
                .wrap_err("database is opened read-only");
        }
        self.last_error = None;

        let implicit = self.txn.is_none();
        if implicit {
            self.txn_begin()?;
        }
        match f(self) {
            Ok(value) => {
                if implicit {
                    if let Err(report) = self.txn_commit() {
                        self.last_error = Some(DbError::of(&report));
                        return Err(report);
                    }
                }
                Ok(value)
            }
            Err(report) => {
                if implicit {
                    let _ = self.txn_abort();
                }
                self.last_error = Some(DbError::of(&report));
                Err(report)
            }
        }
    }

    /// Ensures the node page at `off` is cached, loading and evicting as
    /// needed. Never returns two live pages for one offset.
    pub(crate) fn fetch_page(&mut self, off: u64) -> Result<()> {
        let page_size = self.cfg.page_size;
        ensure!(
            off != 0 && off % page_size as u64 == 0,
            eyre!(DbError::Io).wrap_err(format!("unaligned page offset {}", off))
        );
        if self.cache.get_mut(off).is_some() {
            return Ok(());
        }

        self.make_room()?;

        let mut payload = vec![0u8; page_size].into_boxed_slice();
        self.device.read_at(off, &mut payload)?;
        let page = Page::from_payload(off, payload);
        ensure!(
            page.page_type().is_node(),
            eyre!(DbError::Io).wrap_err(format!(
                "page at {} is {:?}, expected a node",
                off,
                page.page_type()
            ))
        );
        self.mem.charge(page_size)?;
        self.cache.insert(page);
        Ok(())
    }

    /// Makes room for one more page. In strict mode a full cache is an
    /// error; otherwise victims are evicted, and if every page is pinned
    /// the cache temporarily overflows its budget.
    fn make_room(&mut self) -> Result<()> {
        if !self.cache.is_full() {
            return Ok(());
        }
        if self.cfg.flags.contains(OpenFlags::CACHE_STRICT) {
            return Err(eyre!(DbError::LimitsReached))
                .wrap_err_with(|| format!("strict cache full ({} pages)", self.cache.capacity()));
        }
        while self.cache.is_full() {
            match self.cache.pick_victim() {
                Some(victim) => self.evict(victim)?,
                None => break,
            }
        }
        Ok(())
    }

    /// Writes back (if dirty) and drops one page, uncoupling its cursors.
    fn evict(&mut self, off: u64) -> Result<()> {
        trace!(offset = off, "evicting page");
        self.uncouple_page_cursors(off, None)?;
        if let Some(page) = self.cache.peek(off) {
            if page.is_dirty() {
                self.device.write_at(off, page.data())?;
            }
        }
        if self.cache.remove(off).is_some() {
            self.mem.release(self.cfg.page_size);
        }
        Ok(())
    }

    /// Allocates a node page: freelist head if available, otherwise the
    /// device growth frontier. The page lands in the cache dirty.
    pub(crate) fn alloc_page(&mut self, page_type: PageType, leaf: bool) -> Result<u64> {
        self.make_room()?;
        self.mem.charge(self.cfg.page_size)?;
        let off = match self.take_free_offset() {
            Ok(off) => off,
            Err(report) => {
                self.mem.release(self.cfg.page_size);
                return Err(report);
            }
        };

        let mut page = Page::new(off, self.cfg.page_size);
        crate::btree::node::NodeViewMut::init(page.data_mut(), self.cfg.key_size, page_type, leaf)?;
        self.cache.insert(page);

        if let Some(txn) = &mut self.txn {
            txn.record_alloc(off);
        }
        Ok(off)
    }

    fn take_free_offset(&mut self) -> Result<u64> {
        if !self.freelist.is_empty() {
            let off = self.freelist.head();
            let mut buf = [0u8; PAGE_TAG_SIZE + 8];
            self.device.read_at(off, &mut buf)?;
            let next = freelist::read_link(&buf)?;
            self.freelist.set_head(next);
            self.header_dirty = true;
            return Ok(off);
        }
        let off = self.device.len();
        self.device.set_len(off + self.cfg.page_size as u64)?;
        Ok(off)
    }

    /// Reserves `pages` contiguous pages for a blob chunk. Single pages
    /// may reuse the freelist; spans always come from the frontier.
    pub(crate) fn alloc_chunk(&mut self, pages: usize) -> Result<u64> {
        if pages == 1 && !self.freelist.is_empty() {
            return self.take_free_offset();
        }
        let off = self.device.len();
        self.device
            .set_len(off + (pages * self.cfg.page_size) as u64)?;
        Ok(off)
    }

    /// Returns a node page to the freelist, dropping its cache entry.
    /// Any cursor still on the page keeps its key as an uncoupled copy.
    pub(crate) fn free_page(&mut self, off: u64) -> Result<()> {
        self.uncouple_page_cursors(off, None)?;
        if self.cache.remove(off).is_some() {
            self.mem.release(self.cfg.page_size);
        }
        self.free_page_raw(off)
    }

    /// Chains a device page onto the freelist. The page must not be
    /// cached (blob pages never are; node pages are removed first).
    pub(crate) fn free_page_raw(&mut self, off: u64) -> Result<()> {
        debug_assert!(off != 0 && off % self.cfg.page_size as u64 == 0);
        let mut buf = [0u8; PAGE_TAG_SIZE + 8];
        buf[..PAGE_TAG_SIZE]
            .copy_from_slice(zerocopy::IntoBytes::as_bytes(&crate::storage::page::PageTag::new(
                PageType::Free,
            )));
        freelist::write_link(&mut buf, self.freelist.head())?;
        self.device.write_at(off, &buf)?;
        self.freelist.set_head(off);
        self.header_dirty = true;
        Ok(())
    }

    pub(crate) fn pin_page(&mut self, off: u64) {
        if let Some(page) = self.cache.peek_mut(off) {
            page.pin();
        }
    }

    pub(crate) fn unpin_page(&mut self, off: u64) {
        if let Some(page) = self.cache.peek_mut(off) {
            page.unpin();
        }
    }

    /// Runs `f` with the page at `off` fetched and pinned; the pin is
    /// dropped on every exit path.
    pub(crate) fn with_pin<T>(
        &mut self,
        off: u64,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.fetch_page(off)?;
        self.pin_page(off);
        let result = f(self);
        self.unpin_page(off);
        result
    }

    fn write_header(&mut self) -> Result<()> {
        let mut header = DbHeader::new(self.cfg.page_size as u32, self.cfg.key_size as u16);
        header.set_root_offset(self.root_offset);
        header.set_freelist_head(self.freelist.head());
        header.set_key_count(self.key_count);

        let mut buf = [0u8; DB_HEADER_SIZE];
        header.write_to(&mut buf)?;
        self.device.write_at(0, &buf)?;
        self.header_dirty = false;
        Ok(())
    }

    /// Writes every dirty page and, if needed, the header. No sync.
    pub(crate) fn flush_dirty_pages(&mut self) -> Result<()> {
        for off in self.cache.dirty_offsets() {
            let page = self.cache.peek(off).expect("dirty page is cached");
            self.device.write_at(off, page.data())?;
            self.cache
                .peek_mut(off)
                .expect("dirty page is cached")
                .clear_dirty();
        }
        if self.header_dirty {
            self.write_header()?;
        }
        Ok(())
    }

    pub(crate) fn flush_all(&mut self, sync: bool) -> Result<()> {
        self.flush_dirty_pages()?;
        if sync {
            self.device.sync()?;
            debug!("database flushed");
        }
        Ok(())
    }

    pub(crate) fn close_inner(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        // cursors outlive close as NIL handles
        let ids: Vec<u64> = self.cursors.keys().copied().collect();
        for id in ids {
            self.cursor_set_nil(id);
        }
        if !self.is_read_only() {
            self.flush_all(true)?;
        }
        let pages = self.cache.clear();
        self.mem.release(pages.len() * self.cfg.page_size);
        self.open = false;

        let leaked = self.mem.report_leaks();
        if leaked > 0 {
            warn!(bytes = leaked, "tracked memory still charged at close");
        }
        debug!("database closed");
        Ok(())
    }
}

impl Drop for DbInner {
    fn drop(&mut self) {
        if self.open {
            let _ = self.close_inner();
        }
    }
}

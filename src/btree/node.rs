//! Packed node layout inside a page.
//!
//! Leaf and internal nodes share one layout. After the page tag comes the
//! node header, then a contiguous array of fixed-width slots:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  ------------------------------------------------
//! 0       4     PageTag (Root / Index / Leaf)
//! 4       2     count: used slots
//! 6       2     flags: bit 0 = leaf
//! 8       8     left: left sibling offset (0 = none)
//! 16      8     right: right sibling offset (0 = none)
//! 24      8     ptr_left: child for keys below slot 0 (internal only)
//! 32      ...   slot array
//! ```
//!
//! A slot is `12 + key_size` bytes: an 8-byte rid, the stored key length,
//! a flags byte (record encoding, see `record`), one reserved byte, then
//! the key padded to `key_size`. In an internal node the rid is the child
//! page offset for keys `>=` the slot key; in a leaf it is the record (see
//! `record` for the inline/blob discrimination).
//!
//! The slot array is kept sorted under the database comparator; lookups
//! binary-search it. Equal keys in internal nodes descend into the right
//! subtree, so leaf-level uniqueness is the only duplicate gate.

use eyre::{ensure, Result};
use zerocopy::little_endian::{U16, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::btree::compare::Comparator;
use crate::storage::page::{PageTag, PageType};
use crate::storage::{view, view_mut, PAGE_TAG_SIZE};

pub(crate) const NODE_HEADER_SIZE: usize = 28;
pub(crate) const NODE_SLOTS_OFFSET: usize = PAGE_TAG_SIZE + NODE_HEADER_SIZE;
pub(crate) const SLOT_HEAD_SIZE: usize = 12;

const NODE_FLAG_LEAF: u16 = 0x1;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct NodeHeader {
    count: U16,
    flags: U16,
    left: U64,
    right: U64,
    ptr_left: U64,
}

const _: () = assert!(std::mem::size_of::<NodeHeader>() == NODE_HEADER_SIZE);

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub(crate) struct SlotHead {
    pub rid: [u8; 8],
    key_len: U16,
    pub flags: u8,
    reserved: u8,
}

const _: () = assert!(std::mem::size_of::<SlotHead>() == SLOT_HEAD_SIZE);

impl SlotHead {
    pub fn rid_u64(&self) -> u64 {
        u64::from_le_bytes(self.rid)
    }

    pub fn key_len(&self) -> usize {
        self.key_len.get() as usize
    }
}

pub(crate) fn slot_width(key_size: usize) -> usize {
    SLOT_HEAD_SIZE + key_size
}

/// How many slots a node of this geometry can hold.
pub(crate) fn node_capacity(page_size: usize, key_size: usize) -> usize {
    (page_size - NODE_SLOTS_OFFSET) / slot_width(key_size)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchResult {
    /// Exact match at this slot.
    Found(usize),
    /// No match; this is the insertion point.
    NotFound(usize),
}

pub(crate) struct NodeView<'a> {
    data: &'a [u8],
    key_size: usize,
}

pub(crate) struct NodeViewMut<'a> {
    data: &'a mut [u8],
    key_size: usize,
}

impl<'a> NodeView<'a> {
    pub fn new(data: &'a [u8], key_size: usize) -> Result<Self> {
        let tag = view::<PageTag>(data, "PageTag")?;
        ensure!(
            tag.page_type().is_node(),
            "expected a node page, got {:?}",
            tag.page_type()
        );
        let header = view::<NodeHeader>(&data[PAGE_TAG_SIZE..], "NodeHeader")?;
        let used = NODE_SLOTS_OFFSET + header.count.get() as usize * slot_width(key_size);
        ensure!(
            used <= data.len(),
            "node slot array exceeds page: {} > {}",
            used,
            data.len()
        );
        Ok(Self { data, key_size })
    }

    fn header(&self) -> &NodeHeader {
        // length validated in the constructor
        view::<NodeHeader>(&self.data[PAGE_TAG_SIZE..], "NodeHeader").expect("validated node")
    }

    pub fn count(&self) -> usize {
        self.header().count.get() as usize
    }

    pub fn is_leaf(&self) -> bool {
        self.header().flags.get() & NODE_FLAG_LEAF != 0
    }

    pub fn left(&self) -> u64 {
        self.header().left.get()
    }

    pub fn right(&self) -> u64 {
        self.header().right.get()
    }

    pub fn ptr_left(&self) -> u64 {
        self.header().ptr_left.get()
    }

    fn slot_offset(&self, index: usize) -> usize {
        NODE_SLOTS_OFFSET + index * slot_width(self.key_size)
    }

    pub fn slot(&self, index: usize) -> &SlotHead {
        debug_assert!(index < self.count(), "slot index out of bounds");
        let offset = self.slot_offset(index);
        view::<SlotHead>(&self.data[offset..], "SlotHead").expect("validated node")
    }

    pub fn key_at(&self, index: usize) -> &'a [u8] {
        let offset = self.slot_offset(index);
        let len = {
            let slot = view::<SlotHead>(&self.data[offset..], "SlotHead").expect("validated node");
            slot.key_len().min(self.key_size)
        };
        let key_start = offset + SLOT_HEAD_SIZE;
        &self.data[key_start..key_start + len]
    }

    pub fn rid_at(&self, index: usize) -> u64 {
        self.slot(index).rid_u64()
    }

    /// Raw bytes of the slot range `[from..to)`, for splits.
    pub fn slot_bytes(&self, from: usize, to: usize) -> &'a [u8] {
        debug_assert!(from <= to && to <= self.count());
        &self.data[self.slot_offset(from)..self.slot_offset(to)]
    }

    /// Binary search under the database comparator.
    pub fn search(&self, key: &[u8], cmp: &Comparator) -> SearchResult {
        let mut lo = 0usize;
        let mut hi = self.count();
        while lo < hi {
            let mid = (lo + hi) / 2;
            match cmp.compare(self.key_at(mid), key) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Equal => return SearchResult::Found(mid),
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        SearchResult::NotFound(lo)
    }

    /// Child to descend into for `key`. Equal keys go right so that only
    /// the leaf level decides duplicates.
    pub fn child_for(&self, key: &[u8], cmp: &Comparator) -> u64 {
        debug_assert!(!self.is_leaf(), "child_for on a leaf");
        match self.search(key, cmp) {
            SearchResult::Found(i) => self.rid_at(i),
            SearchResult::NotFound(0) => self.ptr_left(),
            SearchResult::NotFound(i) => self.rid_at(i - 1),
        }
    }
}

impl<'a> NodeViewMut<'a> {
    pub fn new(data: &'a mut [u8], key_size: usize) -> Result<Self> {
        NodeView::new(data, key_size)?;
        Ok(Self { data, key_size })
    }

    /// Initializes a fresh node in `data`, overwriting tag and header.
    pub fn init(
        data: &'a mut [u8],
        key_size: usize,
        page_type: PageType,
        leaf: bool,
    ) -> Result<Self> {
        ensure!(page_type.is_node(), "init with non-node type {:?}", page_type);
        let tag = view_mut::<PageTag>(data, "PageTag")?;
        *tag = PageTag::new(page_type);
        let header = view_mut::<NodeHeader>(&mut data[PAGE_TAG_SIZE..], "NodeHeader")?;
        *header = NodeHeader {
            count: U16::new(0),
            flags: U16::new(if leaf { NODE_FLAG_LEAF } else { 0 }),
            left: U64::new(0),
            right: U64::new(0),
            ptr_left: U64::new(0),
        };
        Ok(Self { data, key_size })
    }

    pub fn as_view(&self) -> NodeView<'_> {
        NodeView {
            data: self.data,
            key_size: self.key_size,
        }
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        view_mut::<NodeHeader>(&mut self.data[PAGE_TAG_SIZE..], "NodeHeader")
            .expect("validated node")
    }

    pub fn set_count(&mut self, count: usize) {
        self.header_mut().count = U16::new(count as u16);
    }

    pub fn set_left(&mut self, offset: u64) {
        self.header_mut().left = U64::new(offset);
    }

    pub fn set_right(&mut self, offset: u64) {
        self.header_mut().right = U64::new(offset);
    }

    pub fn set_ptr_left(&mut self, offset: u64) {
        self.header_mut().ptr_left = U64::new(offset);
    }

    fn slot_offset(&self, index: usize) -> usize {
        NODE_SLOTS_OFFSET + index * slot_width(self.key_size)
    }

    /// Writes slot `index` in place (no shift).
    pub fn write_slot(&mut self, index: usize, key: &[u8], rid: [u8; 8], flags: u8) {
        debug_assert!(key.len() <= self.key_size, "key exceeds slot width");
        let offset = self.slot_offset(index);
        let head = SlotHead {
            rid,
            key_len: U16::new(key.len() as u16),
            flags,
            reserved: 0,
        };
        self.data[offset..offset + SLOT_HEAD_SIZE].copy_from_slice(head.as_bytes());
        let key_start = offset + SLOT_HEAD_SIZE;
        self.data[key_start..key_start + key.len()].copy_from_slice(key);
        // pad so stale bytes never leak into a reloaded key
        self.data[key_start + key.len()..key_start + self.key_size].fill(0);
    }

    /// Inserts a slot at `index`, shifting higher slots one width right.
    pub fn insert_slot(&mut self, index: usize, key: &[u8], rid: [u8; 8], flags: u8) {
        let count = self.as_view().count();
        debug_assert!(index <= count);
        let width = slot_width(self.key_size);
        let start = self.slot_offset(index);
        let end = self.slot_offset(count);
        self.data.copy_within(start..end, start + width);
        self.write_slot(index, key, rid, flags);
        self.set_count(count + 1);
    }

    /// Removes the slot at `index`, shifting higher slots one width left.
    pub fn remove_slot(&mut self, index: usize) {
        let count = self.as_view().count();
        debug_assert!(index < count);
        let width = slot_width(self.key_size);
        let start = self.slot_offset(index);
        let end = self.slot_offset(count);
        self.data.copy_within(start + width..end, start);
        self.set_count(count - 1);
    }

    /// Rewrites the record portion of a leaf slot.
    pub fn set_record(&mut self, index: usize, rid: [u8; 8], flags: u8) {
        debug_assert!(index < self.as_view().count());
        let offset = self.slot_offset(index);
        let head = view_mut::<SlotHead>(&mut self.data[offset..], "SlotHead")
            .expect("validated node");
        head.rid = rid;
        head.flags = flags;
    }

    /// Copies raw slot bytes to position `index` and sets the count. Used
    /// when a split moves the upper half of a node to its new sibling.
    pub fn adopt_slots(&mut self, index: usize, bytes: &[u8], new_count: usize) {
        let start = self.slot_offset(index);
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.set_count(new_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::compare::Comparator;

    const KEY_SIZE: usize = 8;

    fn leaf_page() -> Vec<u8> {
        let mut data = vec![0u8; 1024];
        NodeViewMut::init(&mut data, KEY_SIZE, PageType::Leaf, true).unwrap();
        data
    }

    fn rid(v: u64) -> [u8; 8] {
        v.to_le_bytes()
    }

    #[test]
    fn geometry() {
        assert_eq!(slot_width(8), 20);
        assert_eq!(node_capacity(1024, 8), (1024 - 32) / 20);
    }

    #[test]
    fn init_produces_empty_leaf() {
        let data = leaf_page();
        let node = NodeView::new(&data, KEY_SIZE).unwrap();
        assert_eq!(node.count(), 0);
        assert!(node.is_leaf());
        assert_eq!(node.left(), 0);
        assert_eq!(node.right(), 0);
    }

    #[test]
    fn insert_keeps_slots_sorted_when_inserted_in_order() {
        let mut data = leaf_page();
        let cmp = Comparator::default();
        {
            let mut node = NodeViewMut::new(&mut data, KEY_SIZE).unwrap();
            for (i, key) in [b"bb", b"dd"].iter().enumerate() {
                node.insert_slot(i, *key, rid(i as u64), 0);
            }
            // middle insertion shifts "dd" right
            node.insert_slot(1, b"cc", rid(7), 0);
        }

        let node = NodeView::new(&data, KEY_SIZE).unwrap();
        assert_eq!(node.count(), 3);
        assert_eq!(node.key_at(0), b"bb");
        assert_eq!(node.key_at(1), b"cc");
        assert_eq!(node.key_at(2), b"dd");
        assert_eq!(node.rid_at(1), 7);

        assert_eq!(node.search(b"cc", &cmp), SearchResult::Found(1));
        assert_eq!(node.search(b"ca", &cmp), SearchResult::NotFound(1));
        assert_eq!(node.search(b"zz", &cmp), SearchResult::NotFound(3));
    }

    #[test]
    fn remove_slot_shifts_left() {
        let mut data = leaf_page();
        {
            let mut node = NodeViewMut::new(&mut data, KEY_SIZE).unwrap();
            node.insert_slot(0, b"aa", rid(1), 0);
            node.insert_slot(1, b"bb", rid(2), 0);
            node.insert_slot(2, b"cc", rid(3), 0);
            node.remove_slot(1);
        }

        let node = NodeView::new(&data, KEY_SIZE).unwrap();
        assert_eq!(node.count(), 2);
        assert_eq!(node.key_at(0), b"aa");
        assert_eq!(node.key_at(1), b"cc");
        assert_eq!(node.rid_at(1), 3);
    }

    #[test]
    fn child_for_directs_ties_right() {
        let mut data = vec![0u8; 1024];
        {
            let mut node = NodeViewMut::init(&mut data, KEY_SIZE, PageType::Index, false).unwrap();
            node.set_ptr_left(100);
            node.insert_slot(0, b"gg", rid(200), 0);
            node.insert_slot(1, b"pp", rid(300), 0);
        }

        let cmp = Comparator::default();
        let node = NodeView::new(&data, KEY_SIZE).unwrap();
        assert_eq!(node.child_for(b"aa", &cmp), 100);
        assert_eq!(node.child_for(b"gg", &cmp), 200); // tie goes right
        assert_eq!(node.child_for(b"hh", &cmp), 200);
        assert_eq!(node.child_for(b"pp", &cmp), 300);
        assert_eq!(node.child_for(b"zz", &cmp), 300);
    }

    #[test]
    fn adopt_slots_moves_upper_half() {
        let mut src = leaf_page();
        {
            let mut node = NodeViewMut::new(&mut src, KEY_SIZE).unwrap();
            for (i, key) in [&b"aa"[..], b"bb", b"cc", b"dd"].iter().enumerate() {
                node.insert_slot(i, key, rid(i as u64), 0);
            }
        }

        let mut dst = leaf_page();
        {
            let view = NodeView::new(&src, KEY_SIZE).unwrap();
            let bytes = view.slot_bytes(2, 4).to_vec();
            let mut node = NodeViewMut::new(&mut dst, KEY_SIZE).unwrap();
            node.adopt_slots(0, &bytes, 2);
        }

        let node = NodeView::new(&dst, KEY_SIZE).unwrap();
        assert_eq!(node.count(), 2);
        assert_eq!(node.key_at(0), b"cc");
        assert_eq!(node.key_at(1), b"dd");
        assert_eq!(node.rid_at(1), 3);
    }

    #[test]
    fn stale_key_bytes_are_padded_away() {
        let mut data = leaf_page();
        {
            let mut node = NodeViewMut::new(&mut data, KEY_SIZE).unwrap();
            node.insert_slot(0, b"longkey!", rid(1), 0);
            node.remove_slot(0);
            node.insert_slot(0, b"ab", rid(2), 0);
        }

        let node = NodeView::new(&data, KEY_SIZE).unwrap();
        assert_eq!(node.key_at(0), b"ab");
    }
}

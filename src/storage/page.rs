//! Page objects and the on-disk page tag.
//!
//! Every page except page 0 begins with a four-byte tag: one type byte and
//! three reserved bytes. The rest of the payload belongs to the page's
//! owner (node layout, blob chunk, freelist link).
//!
//! A [`Page`] is the cached, in-memory form: the payload buffer plus the
//! bookkeeping the cache and the cursor system need. The page's identity is
//! its byte offset in the device (its *self-offset*); nothing else refers
//! to a page by address. Cursors coupled to a page are listed on the page
//! so that a mutation or eviction can find and uncouple them.

use eyre::Result;
use smallvec::SmallVec;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{view, view_mut};

pub(crate) const PAGE_TAG_SIZE: usize = 4;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageType {
    Unknown = 0x00,
    Root = 0x01,
    Index = 0x02,
    Leaf = 0x03,
    Blob = 0x04,
    Free = 0x05,
}

impl PageType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x01 => PageType::Root,
            0x02 => PageType::Index,
            0x03 => PageType::Leaf,
            0x04 => PageType::Blob,
            0x05 => PageType::Free,
            _ => PageType::Unknown,
        }
    }

    /// B-tree node pages are the only pages the cache holds.
    pub fn is_node(self) -> bool {
        matches!(self, PageType::Root | PageType::Index | PageType::Leaf)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub(crate) struct PageTag {
    page_type: u8,
    reserved: [u8; 3],
}

const _: () = assert!(std::mem::size_of::<PageTag>() == PAGE_TAG_SIZE);

impl PageTag {
    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type: page_type as u8,
            reserved: [0; 3],
        }
    }

    pub fn page_type(&self) -> PageType {
        PageType::from_byte(self.page_type)
    }
}

/// A page held by the cache.
pub(crate) struct Page {
    offset: u64,
    dirty: bool,
    pins: u32,
    visited: bool,
    /// Ids of cursors currently coupled to this page.
    pub(crate) cursors: SmallVec<[u64; 4]>,
    payload: Box<[u8]>,
}

impl Page {
    /// Fresh zeroed page at `offset`.
    pub fn new(offset: u64, page_size: usize) -> Self {
        Self {
            offset,
            dirty: false,
            pins: 0,
            visited: false,
            cursors: SmallVec::new(),
            payload: vec![0u8; page_size].into_boxed_slice(),
        }
    }

    /// Page loaded from an existing device image.
    pub fn from_payload(offset: u64, payload: Box<[u8]>) -> Self {
        Self {
            offset,
            dirty: false,
            pins: 0,
            visited: false,
            cursors: SmallVec::new(),
            payload,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn data(&self) -> &[u8] {
        &self.payload
    }

    /// Mutable payload access; the page is marked dirty because every
    /// caller is about to change it.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.payload
    }

    pub fn page_type(&self) -> PageType {
        match view::<PageTag>(&self.payload, "PageTag") {
            Ok(tag) => tag.page_type(),
            Err(_) => PageType::Unknown,
        }
    }

    pub fn set_page_type(&mut self, t: PageType) -> Result<()> {
        let tag = view_mut::<PageTag>(self.data_mut(), "PageTag")?;
        *tag = PageTag::new(t);
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn pin(&mut self) {
        self.pins += 1;
    }

    pub fn unpin(&mut self) {
        debug_assert!(self.pins > 0, "unpin of unpinned page");
        self.pins = self.pins.saturating_sub(1);
    }

    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    pub fn mark_visited(&mut self) {
        self.visited = true;
    }

    /// Clears and returns the visited bit (second-chance eviction).
    pub fn take_visited(&mut self) -> bool {
        std::mem::replace(&mut self.visited, false)
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("offset", &self.offset)
            .field("type", &self.page_type())
            .field("dirty", &self.dirty)
            .field("pins", &self.pins)
            .field("cursors", &self.cursors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_type_round_trips_through_byte() {
        for t in [
            PageType::Root,
            PageType::Index,
            PageType::Leaf,
            PageType::Blob,
            PageType::Free,
        ] {
            assert_eq!(PageType::from_byte(t as u8), t);
        }
        assert_eq!(PageType::from_byte(0xAB), PageType::Unknown);
    }

    #[test]
    fn only_node_types_are_cacheable() {
        assert!(PageType::Root.is_node());
        assert!(PageType::Index.is_node());
        assert!(PageType::Leaf.is_node());
        assert!(!PageType::Blob.is_node());
        assert!(!PageType::Free.is_node());
    }

    #[test]
    fn tag_is_written_into_payload() {
        let mut page = Page::new(1024, 1024);
        page.set_page_type(PageType::Leaf).unwrap();

        assert_eq!(page.page_type(), PageType::Leaf);
        assert_eq!(page.data()[0], PageType::Leaf as u8);
        assert!(page.is_dirty());
    }

    #[test]
    fn pin_protects_and_balances() {
        let mut page = Page::new(0, 64);
        assert!(!page.is_pinned());
        page.pin();
        page.pin();
        page.unpin();
        assert!(page.is_pinned());
        page.unpin();
        assert!(!page.is_pinned());
    }

    #[test]
    fn visited_bit_is_take_once() {
        let mut page = Page::new(0, 64);
        page.mark_visited();
        assert!(page.take_visited());
        assert!(!page.take_visited());
    }
}

//! Free-page chain.
//!
//! Freed pages are retagged `Free` and linked into a single chain whose
//! head lives in the database header. The link is stored immediately after
//! the page tag:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----------------------------------
//! 0       4     PageTag (type = Free)
//! 4       8     next: offset of the next free page
//! ```
//!
//! Allocation pops the head; an empty chain means the caller carves a new
//! page from the device growth frontier. The chain is walked lazily, one
//! pop at a time, so open never has to scan it.

use eyre::Result;
use zerocopy::little_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::{view, view_mut, PAGE_TAG_SIZE};

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub(crate) struct FreePageLink {
    next: U64,
}

impl FreePageLink {
    pub fn new(next: u64) -> Self {
        Self {
            next: U64::new(next),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.get()
    }
}

/// Reads the next-free link out of a free page's payload.
pub(crate) fn read_link(payload: &[u8]) -> Result<u64> {
    let link = view::<FreePageLink>(&payload[PAGE_TAG_SIZE..], "FreePageLink")?;
    Ok(link.next())
}

/// Writes the next-free link into a free page's payload.
pub(crate) fn write_link(payload: &mut [u8], next: u64) -> Result<()> {
    let link = view_mut::<FreePageLink>(&mut payload[PAGE_TAG_SIZE..], "FreePageLink")?;
    *link = FreePageLink::new(next);
    Ok(())
}

/// Runtime state of the chain; the head is persisted in the header.
#[derive(Debug, Default)]
pub(crate) struct Freelist {
    head: u64,
}

impl Freelist {
    pub fn new(head: u64) -> Self {
        Self { head }
    }

    pub fn head(&self) -> u64 {
        self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head == 0
    }

    pub fn set_head(&mut self, head: u64) {
        self.head = head;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::{PageTag, PageType};
    use zerocopy::IntoBytes;

    #[test]
    fn link_round_trips_through_payload() {
        let mut payload = vec![0u8; 256];
        payload[..PAGE_TAG_SIZE].copy_from_slice(PageTag::new(PageType::Free).as_bytes());

        write_link(&mut payload, 0xDEAD_BEEF).unwrap();
        assert_eq!(read_link(&payload).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn freelist_head_tracking() {
        let mut list = Freelist::new(0);
        assert!(list.is_empty());

        list.set_head(4096);
        assert_eq!(list.head(), 4096);
        assert!(!list.is_empty());

        list.set_head(0);
        assert!(list.is_empty());
    }
}

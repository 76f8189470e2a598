//! Paged storage substrate.
//!
//! Everything between the raw [`crate::device`] byte range and the B-tree
//! lives here:
//!
//! - `header`: the page-0 database header (magic, version, geometry, root
//!   pointer, freelist head, key count)
//! - `page`: the in-memory page object (self-offset, type tag, dirty flag,
//!   pin count, coupled-cursor list, payload buffer)
//! - `cache`: bounded offset → page map with second-chance eviction
//! - `freelist`: single-linked chain of reusable pages
//! - `blob`: out-of-node storage for records larger than a rid
//!
//! Pages are identified by their byte offset in the device; page 0 is the
//! header and never enters the cache. Every other page starts with a
//! one-byte type tag plus three reserved bytes.

pub(crate) mod blob;
pub(crate) mod cache;
pub(crate) mod freelist;
pub(crate) mod header;
pub(crate) mod page;

use eyre::{ensure, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub(crate) use cache::PageCache;
pub(crate) use freelist::Freelist;
pub(crate) use page::{PageType, PAGE_TAG_SIZE};

/// Borrows a zerocopy struct from the front of a byte slice.
#[inline]
pub(crate) fn view<'a, T: FromBytes + KnownLayout + Immutable>(bytes: &'a [u8], what: &str) -> Result<&'a T> {
    let size = std::mem::size_of::<T>();
    ensure!(
        bytes.len() >= size,
        "buffer too small for {}: {} < {}",
        what,
        bytes.len(),
        size
    );
    T::ref_from_bytes(&bytes[..size]).map_err(|e| eyre::eyre!("failed to parse {}: {:?}", what, e))
}

/// Mutable variant of [`view`].
#[inline]
pub(crate) fn view_mut<'a, T: FromBytes + KnownLayout + Immutable + IntoBytes>(
    bytes: &'a mut [u8],
    what: &str,
) -> Result<&'a mut T> {
    let size = std::mem::size_of::<T>();
    ensure!(
        bytes.len() >= size,
        "buffer too small for {}: {} < {}",
        what,
        bytes.len(),
        size
    );
    T::mut_from_bytes(&mut bytes[..size])
        .map_err(|e| eyre::eyre!("failed to parse {}: {:?}", what, e))
}

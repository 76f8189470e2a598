//! Blob store: records too large for a rid.
//!
//! A blob is a header-prefixed byte range in the device, outside any node
//! page and bypassing the page cache. A chunk occupies whole pages:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  --------------------------------------
//! 0       4     PageTag (type = Blob)
//! 4       40    BlobHeader { self, allocated, real, flags, next }
//! 44      ...   payload (allocated bytes of capacity)
//! ```
//!
//! Single-page chunks reuse freelist pages; larger chunks are carved
//! contiguously from the device growth frontier. `allocated` is the
//! payload capacity, `real` the live length, so an overwrite that fits the
//! slack stays in place; otherwise the blob relocates and the caller must
//! update its reference. Freeing sets a tombstone and chains the chunk's
//! pages back onto the freelist. The `next` field is reserved for
//! duplicate-key chains and always zero.

use eyre::{ensure, eyre, Result, WrapErr};
use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::page::{PageTag, PageType};
use super::{view, PAGE_TAG_SIZE};
use crate::db::DbInner;
use crate::error::DbError;

pub(crate) const BLOB_HEADER_SIZE: usize = 40;

const BLOB_FLAG_TOMBSTONE: u32 = 0x1;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub(crate) struct BlobHeader {
    self_off: U64,
    allocated: U64,
    real: U64,
    flags: U32,
    reserved: U32,
    next: U64,
}

const _: () = assert!(std::mem::size_of::<BlobHeader>() == BLOB_HEADER_SIZE);

impl BlobHeader {
    fn new(self_off: u64, allocated: u64, real: u64) -> Self {
        Self {
            self_off: U64::new(self_off),
            allocated: U64::new(allocated),
            real: U64::new(real),
            flags: U32::new(0),
            reserved: U32::new(0),
            next: U64::new(0),
        }
    }

    fn is_tombstone(&self) -> bool {
        self.flags.get() & BLOB_FLAG_TOMBSTONE != 0
    }
}

/// Pages needed for a chunk carrying `len` payload bytes.
pub(crate) fn chunk_pages(page_size: usize, len: usize) -> usize {
    (PAGE_TAG_SIZE + BLOB_HEADER_SIZE + len).div_ceil(page_size)
}

impl DbInner {
    /// Stores `data` as a new blob and returns its offset (the rid).
    pub(crate) fn blob_allocate(&mut self, data: &[u8]) -> Result<u64> {
        let page_size = self.page_size();
        let pages = chunk_pages(page_size, data.len());
        let chunk_off = self.alloc_chunk(pages)?;
        let rid = chunk_off + PAGE_TAG_SIZE as u64;
        let allocated = (pages * page_size - PAGE_TAG_SIZE - BLOB_HEADER_SIZE) as u64;

        let header = BlobHeader::new(rid, allocated, data.len() as u64);
        let mut buf = Vec::with_capacity(PAGE_TAG_SIZE + BLOB_HEADER_SIZE + data.len());
        buf.extend_from_slice(PageTag::new(PageType::Blob).as_bytes());
        buf.extend_from_slice(header.as_bytes());
        buf.extend_from_slice(data);

        self.device
            .write_at(chunk_off, &buf)
            .wrap_err("failed to write blob")?;
        Ok(rid)
    }

    fn blob_header(&mut self, rid: u64) -> Result<BlobHeader> {
        let mut buf = [0u8; BLOB_HEADER_SIZE];
        self.device.read_at(rid, &mut buf)?;
        let header = *view::<BlobHeader>(&buf, "BlobHeader")?;
        ensure!(
            header.self_off.get() == rid,
            eyre!(DbError::Io).wrap_err(format!("offset {} is not a blob", rid))
        );
        Ok(header)
    }

    pub(crate) fn blob_read(&mut self, rid: u64) -> Result<Vec<u8>> {
        let header = self.blob_header(rid)?;
        ensure!(
            !header.is_tombstone(),
            eyre!(DbError::Io).wrap_err(format!("blob at {} was freed", rid))
        );
        let mut data = vec![0u8; header.real.get() as usize];
        self.device
            .read_at(rid + BLOB_HEADER_SIZE as u64, &mut data)?;
        Ok(data)
    }

    /// Replaces the blob's contents. Grows in place when the slack permits;
    /// otherwise relocates and returns the new offset; the caller must
    /// update every reference it holds.
    pub(crate) fn blob_overwrite(&mut self, rid: u64, data: &[u8]) -> Result<u64> {
        let header = self.blob_header(rid)?;
        ensure!(
            !header.is_tombstone(),
            eyre!(DbError::Io).wrap_err(format!("blob at {} was freed", rid))
        );

        if data.len() as u64 <= header.allocated.get() {
            let updated = BlobHeader::new(rid, header.allocated.get(), data.len() as u64);
            self.device.write_at(rid, updated.as_bytes())?;
            self.device.write_at(rid + BLOB_HEADER_SIZE as u64, data)?;
            return Ok(rid);
        }

        let new_rid = self.blob_allocate(data)?;
        self.blob_free(rid)?;
        Ok(new_rid)
    }

    /// Tombstones the blob and returns its pages to the freelist.
    pub(crate) fn blob_free(&mut self, rid: u64) -> Result<()> {
        let mut header = self.blob_header(rid)?;
        if header.is_tombstone() {
            return Ok(());
        }
        header.flags = U32::new(header.flags.get() | BLOB_FLAG_TOMBSTONE);
        self.device.write_at(rid, header.as_bytes())?;

        let page_size = self.page_size();
        let total = PAGE_TAG_SIZE + BLOB_HEADER_SIZE + header.allocated.get() as usize;
        let pages = total / page_size;
        let chunk_off = rid - PAGE_TAG_SIZE as u64;
        for i in 0..pages {
            self.free_page_raw(chunk_off + (i * page_size) as u64)?;
        }
        Ok(())
    }
}

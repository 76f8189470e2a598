//! The page-0 database header.
//!
//! Fixed little-endian layout, 40 bytes at the start of the file:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  --------------------------------------------
//! 0       4     magic ("LFDB")
//! 4       4     version (major, minor, revision, reserved)
//! 8       4     page_size
//! 12      2     key_size
//! 14      2     flags
//! 16      8     root_offset
//! 24      8     freelist_head
//! 32      8     key_count
//! ```
//!
//! Exactly one header exists per database; it is written at create time,
//! validated at open time, and rewritten whenever the root pointer, the
//! freelist head or the key count changes.

use eyre::{ensure, eyre, Result};
use zerocopy::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{
    MAGIC, MAX_PAGE_SIZE, MIN_PAGE_SIZE, VERSION_MAJOR, VERSION_MINOR, VERSION_REVISION,
};
use crate::error::DbError;

pub(crate) const DB_HEADER_SIZE: usize = 40;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub(crate) struct DbHeader {
    magic: [u8; 4],
    version: [u8; 4],
    page_size: U32,
    key_size: U16,
    flags: U16,
    root_offset: U64,
    freelist_head: U64,
    key_count: U64,
}

const _: () = assert!(std::mem::size_of::<DbHeader>() == DB_HEADER_SIZE);

impl DbHeader {
    pub fn new(page_size: u32, key_size: u16) -> Self {
        Self {
            magic: MAGIC,
            version: [VERSION_MAJOR, VERSION_MINOR, VERSION_REVISION, 0],
            page_size: U32::new(page_size),
            key_size: U16::new(key_size),
            flags: U16::new(0),
            root_offset: U64::new(0),
            freelist_head: U64::new(0),
            key_count: U64::new(0),
        }
    }

    /// Parses and validates a header image read from page 0.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ensure!(bytes.len() >= DB_HEADER_SIZE, DbError::ShortRead);

        let header = Self::read_from_bytes(&bytes[..DB_HEADER_SIZE])
            .map_err(|e| eyre!(DbError::InvFileVersion).wrap_err(format!("{:?}", e)))?;

        ensure!(header.magic == MAGIC, DbError::InvFileVersion);
        ensure!(header.version[0] == VERSION_MAJOR, DbError::InvFileVersion);

        let page_size = header.page_size.get();
        ensure!(
            page_size.is_power_of_two()
                && (MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size),
            DbError::InvPageSize
        );
        ensure!(
            header.key_size.get() != 0 && u32::from(header.key_size.get()) < page_size,
            DbError::InvKeySize
        );

        Ok(header)
    }

    pub fn write_to(&self, bytes: &mut [u8]) -> Result<()> {
        ensure!(
            bytes.len() >= DB_HEADER_SIZE,
            "buffer too small for DbHeader: {} < {}",
            bytes.len(),
            DB_HEADER_SIZE
        );
        bytes[..DB_HEADER_SIZE].copy_from_slice(self.as_bytes());
        Ok(())
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.get()
    }

    pub fn key_size(&self) -> u16 {
        self.key_size.get()
    }

    pub fn root_offset(&self) -> u64 {
        self.root_offset.get()
    }

    pub fn set_root_offset(&mut self, offset: u64) {
        self.root_offset = U64::new(offset);
    }

    pub fn freelist_head(&self) -> u64 {
        self.freelist_head.get()
    }

    pub fn set_freelist_head(&mut self, offset: u64) {
        self.freelist_head = U64::new(offset);
    }

    pub fn key_count(&self) -> u64 {
        self.key_count.get()
    }

    pub fn set_key_count(&mut self, count: u64) {
        self.key_count = U64::new(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_exactly_40_bytes() {
        assert_eq!(std::mem::size_of::<DbHeader>(), DB_HEADER_SIZE);
    }

    #[test]
    fn round_trip_through_bytes() {
        let mut header = DbHeader::new(4096, 16);
        header.set_root_offset(4096);
        header.set_freelist_head(8192);
        header.set_key_count(42);

        let mut buf = [0u8; 64];
        header.write_to(&mut buf).unwrap();

        let parsed = DbHeader::from_bytes(&buf).unwrap();
        assert_eq!(parsed.page_size(), 4096);
        assert_eq!(parsed.key_size(), 16);
        assert_eq!(parsed.root_offset(), 4096);
        assert_eq!(parsed.freelist_head(), 8192);
        assert_eq!(parsed.key_count(), 42);
    }

    #[test]
    fn bad_magic_is_inv_file_version() {
        let mut buf = [0u8; DB_HEADER_SIZE];
        let header = DbHeader::new(4096, 16);
        header.write_to(&mut buf).unwrap();
        buf[0] = b'X';

        let err = DbHeader::from_bytes(&buf).unwrap_err();
        assert_eq!(DbError::of(&err), DbError::InvFileVersion);
    }

    #[test]
    fn wrong_major_version_is_rejected() {
        let mut buf = [0u8; DB_HEADER_SIZE];
        let header = DbHeader::new(4096, 16);
        header.write_to(&mut buf).unwrap();
        buf[4] = VERSION_MAJOR + 1;

        let err = DbHeader::from_bytes(&buf).unwrap_err();
        assert_eq!(DbError::of(&err), DbError::InvFileVersion);
    }

    #[test]
    fn unrecognized_page_size_is_inv_pagesize() {
        for bad in [0u32, 512, 3000, 131072] {
            let mut buf = [0u8; DB_HEADER_SIZE];
            let mut header = DbHeader::new(4096, 16);
            header.page_size = U32::new(bad);
            header.write_to(&mut buf).unwrap();

            let err = DbHeader::from_bytes(&buf).unwrap_err();
            assert_eq!(DbError::of(&err), DbError::InvPageSize, "size {}", bad);
        }
    }

    #[test]
    fn short_buffer_is_short_read() {
        let err = DbHeader::from_bytes(&[0u8; 10]).unwrap_err();
        assert_eq!(DbError::of(&err), DbError::ShortRead);
    }
}

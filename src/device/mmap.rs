//! Memory-mapped device.
//!
//! The whole file is mapped read-write; reads and writes are memcpys
//! against the mapping and growth remaps. Growing requires `&mut self`, so
//! the borrow checker guarantees no slice into the old mapping survives a
//! remap.

use std::fs::{File, OpenOptions};
use std::path::Path;

use eyre::{eyre, Result, WrapErr};
use memmap2::MmapMut;

use super::Device;
use crate::error::{io_status, DbError};

#[derive(Debug)]
pub(crate) struct MmapDevice {
    file: File,
    // None only while the file is empty; mapping a zero-length file is
    // rejected by the OS.
    mmap: Option<MmapMut>,
    len: u64,
}

impl MmapDevice {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| eyre!(io_status(&e)).wrap_err(e))
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        let len = file
            .metadata()
            .map_err(|e| eyre!(io_status(&e)).wrap_err(e))
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?
            .len();

        let mmap = if len == 0 { None } else { Some(map(&file)?) };

        Ok(Self { file, mmap, len })
    }

    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| eyre!(io_status(&e)).wrap_err(e))
            .wrap_err_with(|| format!("failed to create database file '{}'", path.display()))?;

        Ok(Self {
            file,
            mmap: None,
            len: 0,
        })
    }

    fn grow_to(&mut self, len: u64) -> Result<()> {
        if let Some(mmap) = &self.mmap {
            mmap.flush_async()
                .map_err(|e| eyre!(io_status(&e)).wrap_err(e))
                .wrap_err("failed to flush mapping before grow")?;
        }
        self.file
            .set_len(len)
            .map_err(|e| eyre!(io_status(&e)).wrap_err(e))
            .wrap_err_with(|| format!("failed to extend file to {} bytes", len))?;
        self.mmap = Some(map(&self.file)?);
        self.len = len;
        Ok(())
    }
}

fn map(file: &File) -> Result<MmapMut> {
    // SAFETY: the file is opened with exclusive read-write intent and is
    // only ever modified through this mapping for the lifetime of the
    // device. The mapping is replaced under `&mut self`, so no stale slice
    // can outlive a remap.
    unsafe {
        MmapMut::map_mut(file)
            .map_err(|e| eyre!(io_status(&e)).wrap_err(e))
            .wrap_err("failed to memory-map database file")
    }
}

impl Device for MmapDevice {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = offset + buf.len() as u64;
        if end > self.len {
            return Err(eyre!(DbError::ShortRead)).wrap_err_with(|| {
                format!(
                    "read of {} bytes at offset {} past device end {}",
                    buf.len(),
                    offset,
                    self.len
                )
            });
        }
        let mmap = self.mmap.as_ref().expect("non-empty device has a mapping");
        buf.copy_from_slice(&mmap[offset as usize..end as usize]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset + data.len() as u64;
        if end > self.len {
            self.grow_to(end)?;
        }
        let mmap = self.mmap.as_mut().expect("non-empty device has a mapping");
        mmap[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        if len > self.len {
            self.grow_to(len)?;
        } else if len < self.len {
            self.mmap = None;
            self.file
                .set_len(len)
                .map_err(|e| eyre!(io_status(&e)).wrap_err(e))?;
            if len > 0 {
                self.mmap = Some(map(&self.file)?);
            }
            self.len = len;
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        if let Some(mmap) = &self.mmap {
            mmap.flush()
                .map_err(|e| eyre!(io_status(&e)).wrap_err(e))
                .wrap_err("failed to sync mapping to disk")?;
        }
        self.file
            .sync_all()
            .map_err(|e| eyre!(io_status(&e)).wrap_err(e))
            .wrap_err("failed to sync database file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_grow_write_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dev.db");

        let mut dev = MmapDevice::create(&path).unwrap();
        assert_eq!(dev.len(), 0);

        dev.write_at(4096, b"across the boundary").unwrap();
        assert_eq!(dev.len(), 4096 + 19);

        let mut buf = [0u8; 19];
        dev.read_at(4096, &mut buf).unwrap();
        assert_eq!(&buf, b"across the boundary");
    }

    #[test]
    fn reopen_sees_synced_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dev.db");

        {
            let mut dev = MmapDevice::create(&path).unwrap();
            dev.set_len(8192).unwrap();
            dev.write_at(100, b"durable").unwrap();
            dev.sync().unwrap();
        }

        let mut dev = MmapDevice::open(&path).unwrap();
        assert_eq!(dev.len(), 8192);
        let mut buf = [0u8; 7];
        dev.read_at(100, &mut buf).unwrap();
        assert_eq!(&buf, b"durable");
    }

    #[test]
    fn open_missing_file_is_file_not_found() {
        let dir = tempdir().unwrap();
        let err = MmapDevice::open(&dir.path().join("gone.db")).unwrap_err();
        assert_eq!(DbError::of(&err), DbError::FileNotFound);
    }

    #[test]
    fn read_past_end_is_short_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dev.db");
        let mut dev = MmapDevice::create(&path).unwrap();
        dev.set_len(16).unwrap();

        let mut buf = [0u8; 32];
        let err = dev.read_at(0, &mut buf).unwrap_err();
        assert_eq!(DbError::of(&err), DbError::ShortRead);
    }
}

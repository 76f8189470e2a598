//! Plain-file device using seek + read/write.
//!
//! Selected when mmap is disabled or the database is opened read-only. The
//! file length is cached so `len()` does not hit the filesystem.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use eyre::{ensure, eyre, Result, WrapErr};

use super::Device;
use crate::error::{io_status, DbError};

#[derive(Debug)]
pub(crate) struct FileDevice {
    file: File,
    len: u64,
    read_only: bool,
}

impl FileDevice {
    pub fn open(path: &Path, read_only: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)
            .map_err(|e| eyre!(io_status(&e)).wrap_err(e))
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;

        let len = file
            .metadata()
            .map_err(|e| eyre!(io_status(&e)).wrap_err(e))
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?
            .len();

        Ok(Self {
            file,
            len,
            read_only,
        })
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
            len: 0,
            read_only: false,
        })
    }
}

impl Device for FileDevice {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if offset + buf.len() as u64 > self.len {
            return Err(eyre!(DbError::ShortRead)).wrap_err_with(|| {
                format!(
                    "read of {} bytes at offset {} past file end {}",
                    buf.len(),
                    offset,
                    self.len
                )
            });
        }
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| eyre!(io_status(&e)).wrap_err(e))?;
        self.file
            .read_exact(buf)
            .map_err(|e| eyre!(io_status(&e)).wrap_err(e))
            .wrap_err_with(|| format!("short read at offset {}", offset))
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        ensure!(!self.read_only, DbError::InvParameter);
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| eyre!(io_status(&e)).wrap_err(e))?;
        self.file
            .write_all(data)
            .map_err(|e| eyre!(io_status(&e)).wrap_err(e))
            .wrap_err_with(|| {
                format!("failed to write {} bytes at offset {}", data.len(), offset)
            })?;
        self.len = self.len.max(offset + data.len() as u64);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        ensure!(!self.read_only, DbError::InvParameter);
        self.file
            .set_len(len)
            .map_err(|e| eyre!(io_status(&e)).wrap_err(e))
            .wrap_err_with(|| format!("failed to set file length to {}", len))?;
        self.len = len;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        if self.read_only {
            return Ok(());
        }
        self.file
            .sync_all()
            .map_err(|e| eyre!(io_status(&e)).wrap_err(e))
            .wrap_err("failed to sync database file")
    }
}

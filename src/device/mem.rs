//! In-memory device: a plain byte vector.

use eyre::{eyre, Result, WrapErr};

use super::Device;
use crate::error::DbError;

#[derive(Debug, Default)]
pub(crate) struct MemDevice {
    bytes: Vec<u8>,
}

impl MemDevice {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Device for MemDevice {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + buf.len();
        if end > self.bytes.len() {
            return Err(eyre!(DbError::ShortRead)).wrap_err_with(|| {
                format!(
                    "read of {} bytes at offset {} past device end {}",
                    buf.len(),
                    offset,
                    self.bytes.len()
                )
            });
        }
        buf.copy_from_slice(&self.bytes[start..end]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + data.len();
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.bytes.resize(len as usize, 0);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

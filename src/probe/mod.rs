mod handle;
mod scanner;
pub mod sockets;

pub use handle::ProcessHandle;
pub use scanner::HeapScan;

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("cannot open memory of process {pid}: {source}")]
    ProcessUnavailable { pid: u32, source: std::io::Error },

    #[error("incomplete read of {wanted} bytes at {addr:#x}: {source}")]
    PartialRead {
        addr: u64,
        wanted: usize,
        source: std::io::Error,
    },

    #[error("no process owns the queried socket inode")]
    OwnerNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Random access into some address space, one independent read per call.
///
/// Implemented by [`ProcessHandle`] for live processes; tests substitute an
/// in-memory backing.
pub trait MemoryRead {
    /// Reads exactly `len` bytes starting at `addr`.
    ///
    /// A short read is an error, never a truncated buffer.
    fn read_mem(&self, addr: u64, len: usize) -> Result<Vec<u8>, ProbeError>;

    /// Reads a little-endian u64 at `addr`.
    fn read_u64_le(&self, addr: u64) -> Result<u64, ProbeError> {
        let mut cursor = Cursor::new(self.read_mem(addr, 8)?);
        Ok(cursor.read_u64::<LittleEndian>()?)
    }

    /// Reads a little-endian u32 at `addr`.
    fn read_u32_le(&self, addr: u64) -> Result<u32, ProbeError> {
        let mut cursor = Cursor::new(self.read_mem(addr, 4)?);
        Ok(cursor.read_u32::<LittleEndian>()?)
    }

    /// Reads a little-endian i32 at `addr`.
    fn read_i32_le(&self, addr: u64) -> Result<i32, ProbeError> {
        let mut cursor = Cursor::new(self.read_mem(addr, 4)?);
        Ok(cursor.read_i32::<LittleEndian>()?)
    }
}

use log::warn;
use std::fmt;
use std::fs::File;
use std::os::unix::fs::FileExt;

use super::{MemoryRead, ProbeError};
use crate::utils;

/// A process we can introspect: pid plus the heap segment found at open time.
///
/// Immutable after construction. Reads open /proc/<pid>/mem fresh each call
/// and drop the descriptor before returning, so no handle outlives a read.
pub struct ProcessHandle {
    pid: u32,
    heap_start: u64,
    heap_end: u64,
}

impl ProcessHandle {
    /// Opens a handle, locating the heap from /proc/<pid>/maps.
    ///
    /// An unreadable maps file or a process without a heap segment leaves
    /// both bounds at zero; point reads by address still work.
    pub fn open(pid: u32) -> Self {
        let (heap_start, heap_end) = match utils::read_mappings(pid) {
            Ok(mappings) => utils::heap_bounds(&mappings).unwrap_or((0, 0)),
            Err(err) => {
                warn!("cannot read memory map of pid {}: {}", pid, err);
                (0, 0)
            }
        };
        Self {
            pid,
            heap_start,
            heap_end,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_heap(pid: u32, heap_start: u64, heap_end: u64) -> Self {
        Self {
            pid,
            heap_start,
            heap_end,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn heap_start(&self) -> u64 {
        self.heap_start
    }

    pub fn heap_end(&self) -> u64 {
        self.heap_end
    }

    /// True when a heap segment was found at open time.
    pub fn has_heap(&self) -> bool {
        self.heap_start != 0 || self.heap_end != 0
    }

    /// True when `addr` falls inside the heap segment, bounds inclusive.
    pub fn is_heap(&self, addr: u64) -> bool {
        self.has_heap() && self.heap_start <= addr && addr <= self.heap_end
    }
}

impl MemoryRead for ProcessHandle {
    fn read_mem(&self, addr: u64, len: usize) -> Result<Vec<u8>, ProbeError> {
        let mem = File::open(format!("/proc/{}/mem", self.pid))
            .map_err(|source| ProbeError::ProcessUnavailable {
                pid: self.pid,
                source,
            })?;

        let mut buf = vec![0u8; len];
        mem.read_exact_at(&mut buf, addr)
            .map_err(|source| ProbeError::PartialRead {
                addr,
                wanted: len,
                source,
            })?;
        Ok(buf)
    }
}

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pid: {} heap: {:#x}-{:#x}",
            self.pid, self.heap_start, self.heap_end
        )
    }
}

mod process;
mod types;

pub use process::{heap_bounds, pid_by_name, pids, pids_by_name, process_name, read_mappings};
pub use types::MemoryMapping;

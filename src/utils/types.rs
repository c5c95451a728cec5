/// One parsed line of a process's memory-region listing.
#[derive(Debug, Clone)]
pub struct MemoryMapping {
    pub start: u64,
    pub end: u64,
    #[allow(dead_code)]
    pub perms: String,
    #[allow(dead_code)]
    pub offset: u64,
    #[allow(dead_code)]
    pub device: String,
    #[allow(dead_code)]
    pub inode: u64,
    pub pathname: String,
}

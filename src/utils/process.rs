use anyhow::{anyhow, Result};
use std::fs;

use super::types::MemoryMapping;

/// Every process id currently visible under /proc, in directory scan order.
///
/// Non-numeric entries are skipped.
pub fn pids() -> std::io::Result<Vec<u32>> {
    let mut pids = Vec::new();
    for entry in fs::read_dir("/proc")? {
        let entry = entry?;
        if let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() {
            pids.push(pid);
        }
    }
    Ok(pids)
}

/// Short process name from /proc/<pid>/comm, if readable.
pub fn process_name(pid: u32) -> Option<String> {
    fs::read_to_string(format!("/proc/{}/comm", pid))
        .ok()
        .map(|name| name.trim_end().to_string())
}

/// All pids whose command line contains the given substring.
pub fn pids_by_name(needle: &str) -> std::io::Result<Vec<u32>> {
    let mut found = Vec::new();
    for pid in pids()? {
        if let Ok(cmdline) = fs::read_to_string(format!("/proc/{}/cmdline", pid)) {
            if cmdline.contains(needle) {
                found.push(pid);
            }
        }
    }
    Ok(found)
}

pub fn pid_by_name(needle: &str) -> Result<u32> {
    pids_by_name(needle)?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Process {} not found", needle))
}

/// Parses /proc/<pid>/maps for the given process.
pub fn read_mappings(pid: u32) -> std::io::Result<Vec<MemoryMapping>> {
    let content = fs::read_to_string(format!("/proc/{}/maps", pid))?;
    Ok(parse_mappings(&content))
}

/// Parses a line-oriented memory-region listing, skipping malformed lines.
///
/// Line format: `<start>-<end> <perms> <offset> <dev> <inode> [pathname]`,
/// with the pathname absent for anonymous mappings.
pub fn parse_mappings(content: &str) -> Vec<MemoryMapping> {
    content.lines().filter_map(parse_mapping_line).collect()
}

fn parse_mapping_line(line: &str) -> Option<MemoryMapping> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return None;
    }

    let (start, end) = parts[0].split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    let offset = u64::from_str_radix(parts[2], 16).ok()?;
    let inode = parts[4].parse::<u64>().ok()?;
    let pathname = if parts.len() > 5 {
        parts[5..].join(" ")
    } else {
        String::new()
    };

    Some(MemoryMapping {
        start,
        end,
        perms: parts[1].to_string(),
        offset,
        device: parts[3].to_string(),
        inode,
        pathname,
    })
}

/// Bounds of the heap segment, taken from the first `[heap]` line.
///
/// `None` when the listing carries no heap segment at all.
pub fn heap_bounds(mappings: &[MemoryMapping]) -> Option<(u64, u64)> {
    mappings
        .iter()
        .find(|m| m.pathname.contains("[heap]"))
        .map(|m| (m.start, m.end))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MAPS: &str = "\
00400000-00452000 r-xp 00000000 08:02 173521 /usr/bin/dbus-daemon
00651000-00652000 rw-p 00051000 08:02 173521 /usr/bin/dbus-daemon
00e03000-00e24000 rw-p 00000000 00:00 0 [heap]
00e24000-011f7000 rw-p 00000000 00:00 0
7f3b8c000000-7f3b8c021000 rw-p 00000000 00:00 0
ffffffffff600000-ffffffffff601000 r-xp 00000000 00:00 0 [vsyscall]
";

    #[test]
    fn parses_every_well_formed_line() {
        let mappings = parse_mappings(SAMPLE_MAPS);
        assert_eq!(mappings.len(), 6);

        let first = &mappings[0];
        assert_eq!(first.start, 0x400000);
        assert_eq!(first.end, 0x452000);
        assert_eq!(first.perms, "r-xp");
        assert_eq!(first.offset, 0);
        assert_eq!(first.device, "08:02");
        assert_eq!(first.inode, 173521);
        assert_eq!(first.pathname, "/usr/bin/dbus-daemon");
    }

    #[test]
    fn anonymous_mapping_has_empty_pathname() {
        let mappings = parse_mappings(SAMPLE_MAPS);
        assert_eq!(mappings[3].pathname, "");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let mappings = parse_mappings("garbage\n123 rw-p\nzz-zz r--p 0 00:00 0\n");
        assert!(mappings.is_empty());
    }

    #[test]
    fn heap_bounds_come_from_the_heap_line() {
        let mappings = parse_mappings(SAMPLE_MAPS);
        assert_eq!(heap_bounds(&mappings), Some((0xe03000, 0xe24000)));
    }

    #[test]
    fn first_heap_line_wins() {
        let listing = "\
00001000-00002000 rw-p 00000000 00:00 0 [heap]
00003000-00004000 rw-p 00000000 00:00 0 [heap]
";
        let mappings = parse_mappings(listing);
        assert_eq!(heap_bounds(&mappings), Some((0x1000, 0x2000)));
    }

    #[test]
    fn no_heap_segment_yields_none() {
        let mappings = parse_mappings("00400000-00452000 r-xp 00000000 08:02 1 /bin/true\n");
        assert_eq!(heap_bounds(&mappings), None);
    }

    #[test]
    fn own_pid_is_enumerated() {
        let pids = pids().unwrap();
        assert!(pids.contains(&std::process::id()));
    }

    #[test]
    fn own_process_has_a_name() {
        let name = process_name(std::process::id()).unwrap();
        assert!(!name.is_empty());
    }

    #[test]
    fn own_cmdline_is_searchable() {
        let found = pids_by_name("procprobe").unwrap();
        assert!(found.contains(&std::process::id()));
    }
}

use log::warn;
use regex::Regex;
use std::fs;
use std::sync::OnceLock;

use super::ProbeError;
use crate::utils;

fn socket_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^socket:\[(\d+)\]$").expect("socket link pattern"))
}

/// Kernel inode numbers of every socket the process holds open.
///
/// A fresh snapshot of /proc/<pid>/fd on each call, in directory scan order.
/// A link that disappears mid-walk (fd closed under us) is skipped; an
/// unlistable fd directory yields an empty set.
pub fn socket_inodes(pid: u32) -> Vec<u32> {
    let fd_dir = format!("/proc/{}/fd", pid);
    let entries = match fs::read_dir(&fd_dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("cannot walk fds of pid {}: {}", pid, err);
            return Vec::new();
        }
    };

    let mut inodes = Vec::new();
    for entry in entries.flatten() {
        let target = match fs::read_link(entry.path()) {
            Ok(target) => target,
            Err(err) => {
                warn!("cannot read link {}: {}", entry.path().display(), err);
                continue;
            }
        };
        if let Some(inode) = parse_socket_link(&target.to_string_lossy()) {
            inodes.push(inode);
        }
    }
    inodes
}

fn parse_socket_link(target: &str) -> Option<u32> {
    let captures = socket_link_pattern().captures(target)?;
    captures[1].parse().ok()
}

/// First process (in /proc scan order) holding any of the wanted inodes.
///
/// Processes whose fd tables cannot be read simply contribute no inodes;
/// only a failure to enumerate /proc itself aborts the resolution.
pub fn owner_of_inodes(wanted: &[u32]) -> Result<u32, ProbeError> {
    let pids = utils::pids()?;
    first_owner(
        pids.into_iter().map(|pid| (pid, socket_inodes(pid))),
        wanted,
    )
    .ok_or(ProbeError::OwnerNotFound)
}

/// Single-inode convenience over [`owner_of_inodes`].
pub fn owner_of_inode(inode: u32) -> Result<u32, ProbeError> {
    owner_of_inodes(&[inode])
}

fn first_owner<I>(table: I, wanted: &[u32]) -> Option<u32>
where
    I: IntoIterator<Item = (u32, Vec<u32>)>,
{
    table
        .into_iter()
        .find(|(_, held)| held.iter().any(|inode| wanted.contains(inode)))
        .map(|(pid, _)| pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsRawFd;

    #[test]
    fn socket_links_parse_to_their_inode() {
        assert_eq!(parse_socket_link("socket:[12345]"), Some(12345));
        assert_eq!(parse_socket_link("socket:[1]"), Some(1));
    }

    #[test]
    fn non_socket_links_are_ignored() {
        assert_eq!(parse_socket_link("pipe:[999]"), None);
        assert_eq!(parse_socket_link("/dev/null"), None);
        assert_eq!(parse_socket_link("anon_inode:[eventpoll]"), None);
        assert_eq!(parse_socket_link("socket:[abc]"), None);
        assert_eq!(parse_socket_link("socket:[123] "), None);
    }

    #[test]
    fn first_owner_takes_the_first_intersection_in_scan_order() {
        let table = vec![
            (10, vec![5]),
            (20, vec![7, 9]),
            (30, vec![9]),
        ];
        assert_eq!(first_owner(table, &[9, 42]), Some(20));
    }

    #[test]
    fn disjoint_sets_have_no_owner() {
        let table = vec![(10, vec![5]), (20, vec![7])];
        assert_eq!(first_owner(table, &[9]), None);
    }

    #[test]
    fn empty_query_has_no_owner() {
        let table = vec![(10, vec![5])];
        assert_eq!(first_owner(table, &[]), None);
    }

    #[test]
    fn sees_our_own_udp_socket() {
        let sock = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let stat = nix::sys::stat::fstat(sock.as_raw_fd()).unwrap();

        let inodes = socket_inodes(std::process::id());
        assert!(inodes.contains(&(stat.st_ino as u32)));
    }

    #[test]
    fn resolves_our_own_socket_back_to_us() {
        let sock = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let stat = nix::sys::stat::fstat(sock.as_raw_fd()).unwrap();

        let pid = owner_of_inode(stat.st_ino as u32).unwrap();
        assert_eq!(pid, std::process::id());
    }

    #[test]
    fn unknown_inode_reports_owner_not_found() {
        let err = owner_of_inodes(&[u32::MAX]).unwrap_err();
        assert!(matches!(err, ProbeError::OwnerNotFound));
    }

    #[test]
    fn bogus_pid_yields_no_inodes() {
        assert!(socket_inodes(0).is_empty());
    }
}

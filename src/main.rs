mod probe;
mod utils;

use anyhow::{anyhow, Result};
use clap::Parser;
use indicatif::ProgressBar;
use log::warn;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::fmt::Write as _;
use std::time::Duration;

use probe::{sockets, HeapScan, MemoryRead, ProcessHandle};
use utils::{pid_by_name, pids_by_name, process_name};

#[derive(Parser, Debug)]
#[command(name = "procprobe")]
#[command(about = "Heap scanner, memory dumper and socket-owner resolver for live Linux processes")]
#[command(version)]
struct Args {
    /// Target process id
    #[arg(short, long)]
    pid: Option<u32>,

    /// Pick the target by command-line substring (first match); alone, list all matches
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Scan the target's heap for this keyword
    #[arg(short, long)]
    keyword: Option<String>,

    /// Address to dump, hex (0x...) or decimal
    #[arg(short, long, value_parser = parse_address)]
    address: Option<u64>,

    /// Number of bytes to dump
    #[arg(short, long)]
    bytes: Option<usize>,

    /// Display dumped bytes as hex + ASCII instead of text
    #[arg(short = 'x', long)]
    hex: bool,

    /// Resolve which process owns this socket inode
    #[arg(long)]
    inode: Option<u32>,

    /// List the target's open socket inodes
    #[arg(long)]
    sockets: bool,

    /// List the target's memory regions
    #[arg(long)]
    regions: bool,

    /// Stop the target while scanning, resume it afterwards
    #[arg(long)]
    stop: bool,
}

fn parse_address(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| format!("invalid address: {}", s))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if let Some(inode) = args.inode {
        return resolve_inode(inode);
    }

    let wants_target =
        args.keyword.is_some() || args.address.is_some() || args.sockets || args.regions;
    if wants_target {
        let pid = target_pid(&args)?;

        if let Some(keyword) = &args.keyword {
            return scan(pid, keyword, args.stop);
        }
        if let Some(address) = args.address {
            let bytes = args.bytes.ok_or_else(|| anyhow!("--address needs --bytes"))?;
            return dump(pid, address, bytes, args.hex);
        }
        if args.sockets {
            return list_sockets(pid);
        }
        return list_regions(pid);
    }

    if let Some(name) = &args.name {
        return locate(name);
    }

    println!("try --help");
    Ok(())
}

fn target_pid(args: &Args) -> Result<u32> {
    if let Some(pid) = args.pid {
        return Ok(pid);
    }
    let name = args
        .name
        .as_deref()
        .ok_or_else(|| anyhow!("need --pid or --name"))?;
    pid_by_name(name)
}

fn scan(pid: u32, keyword: &str, stop: bool) -> Result<()> {
    let handle = ProcessHandle::open(pid);
    println!("{}", handle);

    if !handle.has_heap() {
        println!("not found.");
        return Ok(());
    }

    if stop {
        freeze(pid)?;
    }
    let result = run_scan(&handle, keyword);
    if stop {
        if let Err(err) = thaw(pid) {
            warn!("cannot resume pid {}: {}", pid, err);
        }
    }
    result
}

fn run_scan(handle: &ProcessHandle, keyword: &str) -> Result<()> {
    let bar = ProgressBar::new_spinner();
    bar.set_message(format!(
        "scanning heap {:#x}-{:#x}",
        handle.heap_start(),
        handle.heap_end()
    ));
    bar.enable_steady_tick(Duration::from_millis(120));

    let mut scan = HeapScan::new(handle, keyword.as_bytes());
    let mut hits = 0usize;
    for addr in &mut scan {
        bar.println(format!("found at {:#x}", addr));
        hits += 1;
    }
    bar.finish_and_clear();
    log::debug!("scan stopped at {:#x}", scan.position());

    if hits == 0 {
        println!("not found.");
    } else {
        println!("{} match(es) in heap of pid {}", hits, handle.pid());
    }
    Ok(())
}

fn freeze(pid: u32) -> Result<()> {
    kill(Pid::from_raw(pid as i32), Signal::SIGSTOP)?;
    println!("[+] Process {} stopped", pid);
    Ok(())
}

fn thaw(pid: u32) -> Result<()> {
    kill(Pid::from_raw(pid as i32), Signal::SIGCONT)?;
    println!("[+] Process {} continued", pid);
    Ok(())
}

fn dump(pid: u32, address: u64, bytes: usize, hex: bool) -> Result<()> {
    let handle = ProcessHandle::open(pid);
    if handle.has_heap() && !handle.is_heap(address) {
        warn!("address {:#x} is outside the heap of pid {}", address, pid);
    }

    let data = handle
        .read_mem(address, bytes)
        .map_err(|err| anyhow!("error reading mem: {}", err))?;

    if hex {
        print!("{}", hexdump(&data, address));
    } else {
        println!("{}", String::from_utf8_lossy(&data));
    }
    Ok(())
}

fn hexdump(data: &[u8], base: u64) -> String {
    let mut out = String::new();
    for (i, row) in data.chunks(16).enumerate() {
        let addr = base + (i * 16) as u64;
        let hex: Vec<String> = row.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = row
            .iter()
            .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '.' })
            .collect();
        let _ = writeln!(out, "{:#018x}  {:<47}  |{}|", addr, hex.join(" "), ascii);
    }
    out
}

fn resolve_inode(inode: u32) -> Result<()> {
    let pid = sockets::owner_of_inode(inode)?;
    let name = process_name(pid).unwrap_or_else(|| "??".to_string());
    println!("socket inode {} belongs to pid {} ({})", inode, pid, name);
    Ok(())
}

fn list_sockets(pid: u32) -> Result<()> {
    let inodes = sockets::socket_inodes(pid);
    if inodes.is_empty() {
        println!("no sockets open in pid {}", pid);
        return Ok(());
    }

    println!("pid {} holds {} socket(s):", pid, inodes.len());
    for inode in inodes {
        println!("  {}", inode);
    }
    Ok(())
}

fn list_regions(pid: u32) -> Result<()> {
    let maps = proc_maps::get_process_maps(pid as proc_maps::Pid)?;

    println!(
        "{:<18} {:<18} {:<10} {:<6} {}",
        "Start", "End", "Size", "Perms", "Path"
    );
    println!("{:-<80}", "");

    for map in maps {
        let perms = format!(
            "{}{}{}",
            if map.is_read() { "r" } else { "-" },
            if map.is_write() { "w" } else { "-" },
            if map.is_exec() { "x" } else { "-" },
        );
        let path = map
            .filename()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!(
            "{:<18x} {:<18x} {:<10} {:<6} {}",
            map.start(),
            map.start() + map.size(),
            format!("{}KB", map.size() / 1024),
            perms,
            path
        );
    }
    Ok(())
}

fn locate(name: &str) -> Result<()> {
    let pids = pids_by_name(name)?;
    if pids.is_empty() {
        println!("no process matches {}", name);
        return Ok(());
    }

    for pid in pids {
        println!(
            "{} {}",
            pid,
            process_name(pid).unwrap_or_else(|| "??".to_string())
        );
    }
    Ok(())
}

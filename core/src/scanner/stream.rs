//! Incremental reading of a child process's output.
//!
//! Standard output and standard error are pumped by two tasks into a single
//! channel, so lines arrive in the order each stream produced them. Lines are
//! cut as soon as a delimiter is seen; masscan redraws its status line with
//! `\r`, nmap only uses `\n`.

use std::collections::HashSet;
use std::io;
use std::sync::LazyLock;

use gummy_common::model::Protocol;
use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::mpsc;

const CHUNK_SIZE: usize = 1024;

pub const MASSCAN_DELIMITERS: &[u8] = b"\r\n";
pub const NMAP_DELIMITERS: &[u8] = b"\n";

/// Splits a byte stream into lines on any of the given delimiters.
#[derive(Debug)]
pub struct LineSplitter {
    delimiters: &'static [u8],
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new(delimiters: &'static [u8]) -> Self {
        Self {
            delimiters,
            pending: Vec::new(),
        }
    }

    /// Feeds a chunk and returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if self.delimiters.contains(&byte) {
                lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                self.pending.clear();
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// The unterminated tail, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

/// Lines of a child's stdout and stderr in arrival order.
pub struct MergedOutput {
    rx: mpsc::UnboundedReceiver<io::Result<String>>,
}

impl MergedOutput {
    /// Takes the piped streams of `child`.
    pub fn attach(child: &mut Child, delimiters: &'static [u8]) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, delimiters, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, delimiters, tx.clone()));
        }
        Self { rx }
    }

    /// `None` once both streams are closed.
    pub async fn next_line(&mut self) -> Option<io::Result<String>> {
        self.rx.recv().await
    }
}

async fn pump<R>(mut reader: R, delimiters: &'static [u8], tx: mpsc::UnboundedSender<io::Result<String>>)
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::new(delimiters);
    let mut buf = [0u8; CHUNK_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in splitter.push(&buf[..n]) {
                    if tx.send(Ok(line)).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }

    if let Some(line) = splitter.finish() {
        let _ = tx.send(Ok(line));
    }
}

/// A masscan status line.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub rate: f64,
    pub percent: f64,
    pub remaining: String,
    /// Masscan does not count UDP sockets here.
    pub found: u64,
}

/// One open socket reported while scanning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Discovery {
    pub addr: String,
    pub portid: String,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Progress(Progress),
    Discovery(Discovery),
    RawLine(String),
}

static PROGRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"rate:\s*(?P<rate>[\d.]+)[-,\w]+\s+(?P<percent>[\d.]*)%\s*done,\s*(?P<remaining>[\d:]*)\s*remaining,\s*found=(?P<found>\d*)",
    )
    .expect("valid progress pattern")
});

static DISCOVERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Discovered open port (?P<port>\d+)/(?P<protocol>\w+) on (?P<addr>[0-9A-Fa-f.:]+)")
        .expect("valid discovery pattern")
});

/// Classifies one masscan output line.
pub fn classify_masscan(line: &str) -> StreamEvent {
    if let Some(caps) = DISCOVERY.captures(line) {
        if let Ok(protocol) = caps["protocol"].parse::<Protocol>() {
            return StreamEvent::Discovery(Discovery {
                addr: caps["addr"].to_string(),
                portid: caps["port"].to_string(),
                protocol,
            });
        }
    }

    if let Some(caps) = PROGRESS.captures(line) {
        return StreamEvent::Progress(Progress {
            rate: caps["rate"].parse().unwrap_or_default(),
            percent: caps["percent"].parse().unwrap_or_default(),
            remaining: caps["remaining"].to_string(),
            found: caps["found"].parse().unwrap_or_default(),
        });
    }

    StreamEvent::RawLine(line.to_string())
}

/// Decides which progress samples are worth logging: a change of the found
/// count, or at least five more percent done.
#[derive(Debug, Default)]
pub struct ProgressThrottle {
    last: Option<(f64, u64)>,
}

impl ProgressThrottle {
    const STEP: f64 = 5.0;

    pub fn admit(&mut self, progress: &Progress) -> bool {
        let admit = match self.last {
            None => true,
            Some((percent, found)) => progress.found != found || progress.percent >= percent + Self::STEP,
        };
        if admit {
            self.last = Some((progress.percent, progress.found));
        }
        admit
    }
}

/// Per-run bookkeeping of discovered sockets.
#[derive(Debug, Default)]
pub struct DiscoveryLedger {
    seen: HashSet<Discovery>,
    udp: u64,
}

impl DiscoveryLedger {
    /// Returns `false` for a socket already reported in this run.
    pub fn record(&mut self, discovery: &Discovery) -> bool {
        if !self.seen.insert(discovery.clone()) {
            return false;
        }
        if discovery.protocol == Protocol::Udp {
            self.udp += 1;
        }
        true
    }

    /// UDP sockets missing from masscan's own `found=` counter.
    pub fn udp_count(&self) -> u64 {
        self.udp
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

static NMAP_BOILERPLATE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^WARNING: Running Nmap setuid, as you are doing, is a major security risk\.$",
        r"^WARNING: Running Nmap setgid, as you are doing, is a major security risk\.$",
        r"^Starting Nmap .*$",
        r"^$",
        r"^Host is up\.$",
        r"^Nmap scan report for [\d.]*$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid boilerplate pattern"))
    .collect()
});

/// Lines nmap prints on every run that carry no findings.
pub fn is_nmap_boilerplate(line: &str) -> bool {
    NMAP_BOILERPLATE.iter().any(|re| re.is_match(line.trim_end()))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

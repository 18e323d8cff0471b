//! # Port Prioritizer
//!
//! Ranks every TCP and UDP port by how likely it is to be open, combining
//! three rating catalogs:
//!
//! * `ManPortRating.csv`: manual overrides, used verbatim when present.
//! * `NmapPortRating.csv`: the scanner's own popularity list, scaled by its maximum.
//! * `StatPortRating.csv`: observed usage counts, scaled by their sum and then
//!   by the resulting maximum.
//!
//! All catalogs are keyed by `"<port>/<protocol>"`. Stages ask for slices of the
//! ranking (for example ranks 1 to 1000) and receive them as compact argument
//! strings such as `22,80,443,8000-8100`.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use gummy_common::config::RatingsConfig;
use gummy_common::model::Protocol;
use thiserror::Error;
use tracing::{debug, warn};

pub const MAX_PORT: u16 = 65535;

pub const MANUAL_CATALOG: &str = "ManPortRating.csv";
pub const NATIVE_CATALOG: &str = "NmapPortRating.csv";
pub const EMPIRICAL_CATALOG: &str = "StatPortRating.csv";

#[derive(Debug, Error, PartialEq)]
pub enum PrioritizerError {
    #[error("the ranking holds {len} ports, ranks {start}-{end} cannot be selected")]
    RankOutOfRange { start: usize, end: usize, len: usize },
    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),
    #[error("invalid port list: {0}")]
    InvalidPortList(String),
}

/// Relative weight of the two statistical catalogs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub native: f64,
    pub empirical: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            native: 0.3,
            empirical: 0.7,
        }
    }
}

impl From<&RatingsConfig> for Weights {
    fn from(config: &RatingsConfig) -> Self {
        Self {
            native: config.native_weight,
            empirical: config.empirical_weight,
        }
    }
}

type RatingKey = (u16, Protocol);

/// Raw values of the three catalogs, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RatingSources {
    manual: HashMap<RatingKey, f64>,
    native: HashMap<RatingKey, f64>,
    empirical: HashMap<RatingKey, f64>,
}

impl RatingSources {
    /// Reads the catalogs from `data_dir`. A catalog that cannot be read is
    /// reported and treated as empty.
    pub fn load(data_dir: &Path) -> Self {
        let mut sources = Self::default();

        match read_rate_catalog(&data_dir.join(MANUAL_CATALOG)) {
            Ok(values) => sources.manual = values,
            Err(e) => warn!("Failed to read manual port rating list: {e}"),
        }
        match read_rate_catalog(&data_dir.join(NATIVE_CATALOG)) {
            Ok(values) => sources.native = values,
            Err(e) => warn!("Failed to read nmap port rating list: {e}"),
        }
        match read_count_catalog(&data_dir.join(EMPIRICAL_CATALOG)) {
            Ok(values) => sources.empirical = values,
            Err(e) => warn!("Failed to read statistical port rating list: {e}"),
        }

        debug!(
            manual = sources.manual.len(),
            native = sources.native.len(),
            empirical = sources.empirical.len(),
            "Port rating catalogs loaded"
        );
        sources
    }

    pub fn with_manual(mut self, port: u16, protocol: Protocol, rate: f64) -> Self {
        self.manual.insert((port, protocol), rate);
        self
    }

    pub fn with_native(mut self, port: u16, protocol: Protocol, rate: f64) -> Self {
        self.native.insert((port, protocol), rate);
        self
    }

    pub fn with_empirical(mut self, port: u16, protocol: Protocol, count: f64) -> Self {
        self.empirical.insert((port, protocol), count);
        self
    }
}

fn parse_key(raw: &str) -> Option<RatingKey> {
    let (port, protocol) = raw.trim().split_once('/')?;
    let port = port.parse::<u16>().ok().filter(|p| *p > 0)?;
    Some((port, protocol.parse().ok()?))
}

/// `Port,Rate` catalog.
fn read_rate_catalog(path: &Path) -> Result<HashMap<RatingKey, f64>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut values = HashMap::new();

    for record in reader.records() {
        let record = record?;
        let (Some(key), Some(rate)) = (record.get(0), record.get(1)) else {
            continue;
        };
        match (parse_key(key), rate.trim().parse::<f64>()) {
            (Some(key), Ok(rate)) => {
                values.insert(key, rate);
            }
            _ => debug!("Skipping rating row {key},{rate} in {}", path.display()),
        }
    }
    Ok(values)
}

/// `Port,<count>,<count>,...` catalog; a port's value is the sum of its counts.
fn read_count_catalog(path: &Path) -> Result<HashMap<RatingKey, f64>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut values = HashMap::new();

    for record in reader.records() {
        let record = record?;
        let Some(key) = record.get(0).and_then(parse_key) else {
            continue;
        };
        let total: f64 = record
            .iter()
            .skip(1)
            .filter_map(|count| count.trim().parse::<f64>().ok())
            .sum();
        values.insert(key, total);
    }
    Ok(values)
}

fn scale_by_max(values: &mut HashMap<RatingKey, f64>) {
    let max = values.values().copied().fold(0.0_f64, f64::max);
    if max > 0.0 {
        values.values_mut().for_each(|v| *v /= max);
    }
}

fn scale_by_sum(values: &mut HashMap<RatingKey, f64>) {
    let sum: f64 = values.values().sum();
    if sum > 0.0 {
        values.values_mut().for_each(|v| *v /= sum);
    }
}

#[derive(Debug, Clone)]
pub struct PortPrioritizer {
    ratings: HashMap<RatingKey, f64>,
    tcp: Vec<u16>,
    udp: Vec<u16>,
}

impl PortPrioritizer {
    pub fn load(data_dir: &Path, weights: Weights) -> Self {
        Self::new(RatingSources::load(data_dir), weights)
    }

    pub fn new(sources: RatingSources, weights: Weights) -> Self {
        let RatingSources {
            manual,
            mut native,
            mut empirical,
        } = sources;

        scale_by_max(&mut native);
        scale_by_sum(&mut empirical);
        scale_by_max(&mut empirical);

        let mut ratings = HashMap::new();
        for key in manual.keys().chain(native.keys()).chain(empirical.keys()) {
            let rating = match manual.get(key) {
                Some(rate) => *rate,
                None => {
                    let native_rate = native.get(key).copied().unwrap_or(0.0);
                    let empirical_rate = empirical.get(key).copied().unwrap_or(0.0);
                    native_rate * weights.native + empirical_rate * weights.empirical
                }
            };
            ratings.insert(*key, rating);
        }

        let tcp = rank(&ratings, Protocol::Tcp);
        let udp = rank(&ratings, Protocol::Udp);
        Self { ratings, tcp, udp }
    }

    /// Every port of `protocol`, highest rating first.
    pub fn ranked(&self, protocol: Protocol) -> &[u16] {
        match protocol {
            Protocol::Tcp => &self.tcp,
            Protocol::Udp => &self.udp,
        }
    }

    /// Final weight of a port; unrated ports weigh 0.
    pub fn rating(&self, port: u16, protocol: Protocol) -> f64 {
        self.ratings.get(&(port, protocol)).copied().unwrap_or(0.0)
    }

    /// Selects ranks `start..=end` (1-based) and renders them as a compact
    /// argument string.
    pub fn select(&self, start: usize, end: usize, protocol: Protocol) -> Result<String, PrioritizerError> {
        let ranked = self.ranked(protocol);
        if start == 0 || start > end || end > ranked.len() {
            return Err(PrioritizerError::RankOutOfRange {
                start,
                end,
                len: ranked.len(),
            });
        }
        Ok(collapse(&ranked[start - 1..end]))
    }

    /// Like [`select`](Self::select) with a textual protocol.
    pub fn select_named(&self, start: usize, end: usize, protocol: &str) -> Result<String, PrioritizerError> {
        let protocol = protocol
            .parse::<Protocol>()
            .map_err(|_| PrioritizerError::UnknownProtocol(protocol.to_string()))?;
        self.select(start, end, protocol)
    }
}

fn rank(ratings: &HashMap<RatingKey, f64>, protocol: Protocol) -> Vec<u16> {
    let mut ports: Vec<(u16, f64)> = (1..=MAX_PORT)
        .map(|port| (port, ratings.get(&(port, protocol)).copied().unwrap_or(0.0)))
        .collect();

    ports.sort_by(|(pa, ra), (pb, rb)| {
        rb.partial_cmp(ra)
            .unwrap_or(Ordering::Equal)
            .then_with(|| pa.cmp(pb))
    });
    ports.into_iter().map(|(port, _)| port).collect()
}

/// Sorts `ports` and folds consecutive numbers into `start-end` runs.
pub fn collapse(ports: &[u16]) -> String {
    let sorted: BTreeSet<u16> = ports.iter().copied().collect();
    let mut runs: Vec<(u16, u16)> = Vec::new();

    for port in sorted {
        match runs.last_mut() {
            Some((_, end)) if u32::from(*end) + 1 == u32::from(port) => *end = port,
            _ => runs.push((port, port)),
        }
    }

    runs.iter()
        .map(|(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses a compact argument string back into a sorted port set.
pub fn expand(compact: &str) -> Result<Vec<u16>, PrioritizerError> {
    let invalid = || PrioritizerError::InvalidPortList(compact.to_string());
    let parse = |s: &str| s.trim().parse::<u16>().ok().filter(|p| *p > 0).ok_or_else(invalid);

    let mut ports = BTreeSet::new();
    for part in compact.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if start > end {
                    return Err(invalid());
                }
                ports.extend(start..=end);
            }
            None => {
                ports.insert(parse(part)?);
            }
        }
    }
    Ok(ports.into_iter().collect())
}

/// Port slices swept by the staged workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    /// Ranks 1-1000.
    pub tcp_sweep: String,
    /// Ranks 1001-65535.
    pub tcp_remainder: String,
    /// Ranks 1-1000.
    pub udp_sweep: String,
    /// Ranks 1001-4000.
    pub udp_remainder: String,
}

impl StagePlan {
    pub const SWEEP_RANKS: usize = 1000;
    pub const UDP_REMAINDER_END: usize = 4000;

    pub fn from_prioritizer(prioritizer: &PortPrioritizer) -> Result<Self, PrioritizerError> {
        let sweep = Self::SWEEP_RANKS;
        Ok(Self {
            tcp_sweep: prioritizer.select(1, sweep, Protocol::Tcp)?,
            tcp_remainder: prioritizer.select(sweep + 1, usize::from(MAX_PORT), Protocol::Tcp)?,
            udp_sweep: prioritizer.select(1, sweep, Protocol::Udp)?,
            udp_remainder: prioritizer.select(sweep + 1, Self::UDP_REMAINDER_END, Protocol::Udp)?,
        })
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

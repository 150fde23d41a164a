//! Synthetic test dataset generation lens
//!
//! Generates a realistic sample dataset of IPv4 addresses drawn from
//! known provider address ranges: public infrastructure, cloud
//! providers, CDNs, ISPs, and a synthesized long tail of smaller
//! networks. The output feeds the resolution pipeline during testing.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use ipnet::Ipv4Net;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::info;

// =============================================================================
// Source ranges
// =============================================================================

/// Address ranges of major providers and organizations, keyed by source
/// category, with the per-category weight used for sampling.
const KNOWN_SOURCES: &[(&str, u32, &[&str])] = &[
    // Google (AS15169)
    (
        "google",
        150,
        &[
            "8.8.8.0/24",
            "8.8.4.0/24",
            "8.34.208.0/20",
            "8.35.192.0/20",
            "74.125.128.0/17",
            "108.177.0.0/17",
            "172.217.0.0/16",
            "216.58.192.0/19",
            "64.233.160.0/19",
            "66.249.64.0/19",
        ],
    ),
    // Amazon AWS (AS16509, AS14618)
    (
        "amazon",
        300,
        &[
            "3.0.0.0/15",
            "13.32.0.0/15",
            "13.224.0.0/14",
            "15.177.0.0/18",
            "18.130.0.0/16",
            "18.144.0.0/15",
            "34.192.0.0/12",
            "35.72.0.0/13",
            "52.0.0.0/11",
            "54.64.0.0/11",
            "99.77.128.0/18",
            "205.251.192.0/19",
        ],
    ),
    // Cloudflare (AS13335)
    (
        "cloudflare",
        100,
        &[
            "1.1.1.0/24",
            "1.0.0.0/24",
            "104.16.0.0/13",
            "104.24.0.0/14",
            "108.162.192.0/18",
            "131.0.72.0/22",
            "141.101.64.0/18",
            "162.158.0.0/15",
            "172.64.0.0/13",
            "173.245.48.0/20",
            "188.114.96.0/20",
            "190.93.240.0/20",
            "197.234.240.0/22",
            "198.41.128.0/17",
        ],
    ),
    // Microsoft (AS8075)
    (
        "microsoft",
        200,
        &[
            "13.64.0.0/11",
            "13.104.0.0/14",
            "20.0.0.0/11",
            "23.96.0.0/13",
            "40.64.0.0/10",
            "52.224.0.0/11",
            "65.52.0.0/14",
            "70.37.0.0/17",
            "104.40.0.0/13",
            "137.116.0.0/14",
            "157.54.0.0/15",
            "168.61.0.0/16",
            "191.232.0.0/13",
            "199.30.16.0/20",
        ],
    ),
    // Facebook/Meta (AS32934)
    (
        "facebook",
        50,
        &[
            "31.13.24.0/21",
            "31.13.64.0/18",
            "66.220.144.0/20",
            "69.63.176.0/20",
            "69.171.224.0/19",
            "74.119.76.0/22",
            "103.4.96.0/22",
            "129.134.0.0/17",
            "157.240.0.0/17",
            "173.252.64.0/18",
            "179.60.192.0/22",
            "185.60.216.0/22",
        ],
    ),
    // Akamai (AS16625, AS20940)
    (
        "akamai",
        80,
        &[
            "2.16.0.0/13",
            "23.32.0.0/11",
            "23.192.0.0/11",
            "72.246.0.0/15",
            "96.16.0.0/15",
            "104.64.0.0/10",
            "184.24.0.0/13",
            "184.50.0.0/15",
        ],
    ),
    // Digital Ocean (AS14061)
    (
        "digitalocean",
        150,
        &[
            "104.131.0.0/16",
            "138.197.0.0/16",
            "139.59.0.0/16",
            "142.93.0.0/16",
            "157.230.0.0/16",
            "159.65.0.0/16",
            "161.35.0.0/16",
            "164.90.0.0/16",
            "165.227.0.0/16",
            "167.71.0.0/16",
            "167.172.0.0/16",
            "178.62.0.0/16",
            "188.166.0.0/16",
            "206.189.0.0/16",
        ],
    ),
    // Linode (AS63949)
    (
        "linode",
        100,
        &[
            "45.33.0.0/16",
            "45.56.0.0/16",
            "45.79.0.0/16",
            "66.175.208.0/20",
            "69.164.192.0/20",
            "72.14.176.0/20",
            "74.207.224.0/19",
            "96.126.96.0/19",
            "173.230.128.0/19",
            "173.255.192.0/18",
            "192.46.208.0/20",
            "198.58.96.0/19",
        ],
    ),
    // Comcast (AS7922)
    (
        "comcast",
        200,
        &[
            "68.80.0.0/13",
            "69.240.0.0/13",
            "71.192.0.0/11",
            "73.0.0.0/11",
            "75.64.0.0/13",
            "96.112.0.0/12",
            "98.192.0.0/10",
            "174.48.0.0/12",
            "184.56.0.0/13",
        ],
    ),
    // Verizon (AS701)
    (
        "verizon",
        150,
        &[
            "72.229.0.0/16",
            "108.25.0.0/16",
            "173.79.0.0/16",
            "174.192.0.0/10",
            "206.124.64.0/18",
            "98.80.0.0/12",
        ],
    ),
    // Universities and research networks
    (
        "education",
        50,
        &[
            "18.0.0.0/8",
            "36.0.0.0/8",
            "128.32.0.0/16",
            "129.25.0.0/16",
            "140.247.0.0/16",
            "171.64.0.0/14",
        ],
    ),
];

/// Weight of the synthesized smaller-ISP category.
const RANDOM_ISP_WEIGHT: u32 = 460;

/// Number of synthesized /16 networks in the smaller-ISP category.
const RANDOM_ISP_NETWORKS: usize = 50;

/// First octets the synthesized /16 networks are drawn from.
pub const RANDOM_ISP_FIRST_OCTETS: &[u8] = &[203, 202, 201, 200, 199, 198, 210, 211, 212, 213];

const SERVICE_TYPES: &[&str] = &[
    "web_server",
    "dns_server",
    "mail_server",
    "cdn",
    "cloud_instance",
    "load_balancer",
    "database",
    "api_endpoint",
    "monitoring",
    "unknown",
];

const PRIORITIES: &[&str] = &["high", "medium", "low"];

// an address pool rejects too many draws before we give up on it
const MAX_ATTEMPT_FACTOR: usize = 50;

// =============================================================================
// Types
// =============================================================================

/// Arguments for dataset generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleArgs {
    /// Number of addresses to generate
    pub size: usize,

    /// RNG seed; fixed seed gives a reproducible dataset
    pub seed: Option<u64>,
}

impl Default for SampleArgs {
    fn default() -> Self {
        Self {
            size: 2000,
            seed: None,
        }
    }
}

impl SampleArgs {
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// A generated dataset: sorted unique addresses with their source
/// category attribution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleDataset {
    sources: BTreeMap<Ipv4Addr, String>,
}

impl SampleDataset {
    /// Addresses in ascending order.
    pub fn ips(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.sources.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn source_of(&self, ip: Ipv4Addr) -> Option<&str> {
        self.sources.get(&ip).map(|s| s.as_str())
    }

    /// Address counts per source category.
    pub fn source_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for source in self.sources.values() {
            *counts.entry(source.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// One row of the metadata CSV variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRecord {
    pub ip: String,
    pub source_category: String,
    pub service_type: String,
    pub priority: String,
    pub first_seen: String,
    pub notes: String,
}

// =============================================================================
// Lens
// =============================================================================

/// Dataset generation lens.
#[derive(Debug, Default)]
pub struct SampleLens {}

impl SampleLens {
    pub fn new() -> Self {
        Self {}
    }

    /// Generate a dataset of `args.size` unique addresses.
    ///
    /// Per-category counts follow the weighted distribution scaled to the
    /// requested size (largest remainder); exhausted categories are
    /// topped up from the synthesized smaller-ISP pool so the output
    /// count matches the request.
    pub fn generate(&self, args: &SampleArgs) -> SampleDataset {
        let mut rng = match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut pools: Vec<(String, Vec<Ipv4Net>)> = KNOWN_SOURCES
            .iter()
            .map(|(name, _, ranges)| {
                let nets = ranges.iter().filter_map(|r| r.parse().ok()).collect();
                (name.to_string(), nets)
            })
            .collect();
        pools.push(("random_isps".to_string(), random_isp_networks(&mut rng)));

        let weights: Vec<u32> = KNOWN_SOURCES
            .iter()
            .map(|(_, weight, _)| *weight)
            .chain(std::iter::once(RANDOM_ISP_WEIGHT))
            .collect();
        let targets = scale_weights(&weights, args.size);

        let mut dataset = SampleDataset::default();

        for ((source, nets), target) in pools.iter().zip(targets.iter()) {
            sample_into(
                &mut dataset,
                &mut rng,
                source,
                nets,
                *target,
                args.size,
            );
        }

        // rounding losses and saturated pools are made up from the
        // synthesized networks, which have plenty of room
        if dataset.len() < args.size {
            if let Some((source, nets)) = pools.last() {
                let missing = args.size - dataset.len();
                sample_into(&mut dataset, &mut rng, source, nets, missing, args.size);
            }
        }

        info!("generated {} unique sample addresses", dataset.len());
        dataset
    }

    /// Write the plain-text address list with a commented header.
    pub fn write_plain(&self, dataset: &SampleDataset, path: impl AsRef<Path>) -> Result<()> {
        let mut out = std::fs::File::create(path.as_ref())?;

        writeln!(out, "# Sample IP dataset for ASN analysis")?;
        writeln!(out, "# Generated {} unique IP addresses", dataset.len())?;
        writeln!(out, "# Distribution by source:")?;
        for (source, count) in dataset.source_counts() {
            writeln!(out, "# {}: {} IPs", source, count)?;
        }
        writeln!(out, "#")?;
        writeln!(out, "# One IP per line below:")?;
        writeln!(out)?;

        for ip in dataset.ips() {
            writeln!(out, "{}", ip)?;
        }
        Ok(())
    }

    /// Write the CSV variant with synthetic service metadata; returns the
    /// number of rows written.
    pub fn write_csv(
        &self,
        dataset: &SampleDataset,
        path: impl AsRef<Path>,
        seed: Option<u64>,
    ) -> Result<usize> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        let today = Utc::now().date_naive();

        let mut rows = 0;
        for (index, ip) in dataset.ips().enumerate() {
            let days_ago = rng.gen_range(0..=365);
            let first_seen = today - ChronoDuration::days(days_ago);
            writer.serialize(SampleRecord {
                ip: ip.to_string(),
                source_category: dataset
                    .source_of(ip)
                    .unwrap_or("unknown")
                    .to_string(),
                service_type: SERVICE_TYPES[rng.gen_range(0..SERVICE_TYPES.len())].to_string(),
                priority: PRIORITIES[rng.gen_range(0..PRIORITIES.len())].to_string(),
                first_seen: first_seen.format("%Y-%m-%d").to_string(),
                notes: format!("sample entry {}", index + 1),
            })?;
            rows += 1;
        }

        writer.flush()?;
        Ok(rows)
    }
}

/// Synthesize the smaller-ISP /16 networks.
fn random_isp_networks(rng: &mut StdRng) -> Vec<Ipv4Net> {
    let mut nets = vec![];
    while nets.len() < RANDOM_ISP_NETWORKS {
        let first = RANDOM_ISP_FIRST_OCTETS[rng.gen_range(0..RANDOM_ISP_FIRST_OCTETS.len())];
        let second = rng.gen_range(1..=254u8);
        if let Ok(net) = format!("{}.{}.0.0/16", first, second).parse() {
            nets.push(net);
        }
    }
    nets
}

/// Scale weights to absolute per-category counts summing to `size`
/// (largest remainder method).
fn scale_weights(weights: &[u32], size: usize) -> Vec<usize> {
    let total: u64 = weights.iter().map(|&w| w as u64).sum();
    if total == 0 {
        return vec![0; weights.len()];
    }

    let mut counts: Vec<usize> = weights
        .iter()
        .map(|&w| ((w as u64 * size as u64) / total) as usize)
        .collect();
    let assigned: usize = counts.iter().sum();

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse((weights[i] as u64 * size as u64) % total));
    for &i in order.iter().take(size.saturating_sub(assigned)) {
        counts[i] += 1;
    }
    counts
}

/// Draw `target` fresh addresses for one source into the dataset,
/// skipping network/broadcast addresses and duplicates.
fn sample_into(
    dataset: &mut SampleDataset,
    rng: &mut StdRng,
    source: &str,
    nets: &[Ipv4Net],
    target: usize,
    size_cap: usize,
) {
    if nets.is_empty() || target == 0 {
        return;
    }

    let mut added = 0;
    let mut attempts = 0;
    let max_attempts = target * MAX_ATTEMPT_FACTOR;

    while added < target && dataset.len() < size_cap && attempts < max_attempts {
        attempts += 1;
        let net = nets[rng.gen_range(0..nets.len())];
        let lo = u32::from(net.network());
        let hi = u32::from(net.broadcast());
        if hi - lo <= 2 {
            continue;
        }

        let ip = Ipv4Addr::from(rng.gen_range(lo + 1..hi));
        if dataset.sources.contains_key(&ip) {
            continue;
        }
        dataset.sources.insert(ip, source.to_string());
        added += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_nets(source: &str) -> Vec<Ipv4Net> {
        KNOWN_SOURCES
            .iter()
            .find(|(name, _, _)| *name == source)
            .map(|(_, _, ranges)| ranges.iter().filter_map(|r| r.parse().ok()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_generate_count_matches_size() {
        let lens = SampleLens::new();
        let dataset = lens.generate(&SampleArgs::default().with_size(500).with_seed(Some(7)));
        assert_eq!(dataset.len(), 500);
    }

    #[test]
    fn test_generate_addresses_within_declared_ranges() {
        let lens = SampleLens::new();
        let dataset = lens.generate(&SampleArgs::default().with_size(300).with_seed(Some(11)));

        for ip in dataset.ips() {
            let source = dataset.source_of(ip).unwrap();
            if source == "random_isps" {
                assert!(RANDOM_ISP_FIRST_OCTETS.contains(&ip.octets()[0]));
            } else {
                let nets = lookup_nets(source);
                assert!(
                    nets.iter().any(|net| net.contains(&ip)),
                    "{} not in any {} range",
                    ip,
                    source
                );
            }
        }
    }

    #[test]
    fn test_generate_sorted_and_unique() {
        let lens = SampleLens::new();
        let dataset = lens.generate(&SampleArgs::default().with_size(200).with_seed(Some(3)));
        let ips: Vec<Ipv4Addr> = dataset.ips().collect();
        for pair in ips.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_generate_deterministic() {
        let lens = SampleLens::new();
        let args = SampleArgs::default().with_size(150).with_seed(Some(42));
        let first: Vec<Ipv4Addr> = lens.generate(&args).ips().collect();
        let second: Vec<Ipv4Addr> = lens.generate(&args).ips().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_scale_weights() {
        let counts = scale_weights(&[150, 300, 50], 500);
        assert_eq!(counts.iter().sum::<usize>(), 500);
        assert_eq!(counts, vec![150, 300, 50]);

        let counts = scale_weights(&[1, 1, 1], 100);
        assert_eq!(counts.iter().sum::<usize>(), 100);
    }

    #[test]
    fn test_write_plain_roundtrip() {
        let lens = SampleLens::new();
        let dataset = lens.generate(&SampleArgs::default().with_size(100).with_seed(Some(9)));

        let file = tempfile::NamedTempFile::new().unwrap();
        lens.write_plain(&dataset, file.path()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.starts_with("# Sample IP dataset"));
        assert!(content.contains("# Generated 100 unique IP addresses"));

        // the analyzer's reader skips the commented header
        let parsed = crate::lens::resolve::read_ip_list(file.path()).unwrap();
        assert_eq!(parsed, dataset.ips().collect::<Vec<Ipv4Addr>>());
    }

    #[test]
    fn test_write_csv() {
        let lens = SampleLens::new();
        let dataset = lens.generate(&SampleArgs::default().with_size(50).with_seed(Some(5)));

        let file = tempfile::NamedTempFile::new().unwrap();
        let rows = lens.write_csv(&dataset, file.path(), Some(5)).unwrap();
        assert_eq!(rows, 50);

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(
            content.lines().next().unwrap(),
            "ip,source_category,service_type,priority,first_seen,notes"
        );
        assert_eq!(content.lines().count(), 51);
    }
}

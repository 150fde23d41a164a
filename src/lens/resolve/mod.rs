//! Batch IP-to-ASN resolution lens
//!
//! This module resolves lists of IPv4 addresses to their origin ASN
//! records through one of three interchangeable lookup strategies:
//! Team Cymru's DNS TXT service, ip-api.com's batch endpoint, or
//! ipinfo.io's per-address endpoint.
//!
//! Resolution is best-effort: a failed lookup logs a warning and records
//! an unknown placeholder instead of aborting the run.

use anyhow::Result;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::datasets::cymru::{CymruClient, CymruOrigin};
use crate::datasets::ipapi::{self, IpApiEntry, IPAPI_MAX_BATCH};
use crate::datasets::ipinfo::{self, IpInfoEntry};

// =============================================================================
// Types
// =============================================================================

/// Origin ASN record for a single resolved IP address.
///
/// `asn == None` is the unknown placeholder: the address could not be
/// resolved, and it is excluded from ASN grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpAsnRecord {
    pub ip: Ipv4Addr,
    pub asn: Option<u32>,
    pub prefix: Option<Ipv4Net>,
    pub country: Option<String>,
    pub org: Option<String>,
}

impl IpAsnRecord {
    /// The unknown placeholder recorded for failed lookups.
    pub fn unknown(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            asn: None,
            prefix: None,
            country: None,
            org: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.asn.is_some()
    }

    /// ASN column value as rendered in reports ("15169" or "Unknown").
    pub fn asn_display(&self) -> String {
        match self.asn {
            Some(asn) => asn.to_string(),
            None => "Unknown".to_string(),
        }
    }
}

/// Which external lookup service to resolve against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResolveStrategy {
    /// Team Cymru DNS TXT lookups, one query per address
    #[default]
    Cymru,
    /// ip-api.com batch endpoint, 100 addresses per request
    Ipapi,
    /// ipinfo.io per-address endpoint
    Ipinfo,
}

impl fmt::Display for ResolveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveStrategy::Cymru => write!(f, "cymru"),
            ResolveStrategy::Ipapi => write!(f, "ipapi"),
            ResolveStrategy::Ipinfo => write!(f, "ipinfo"),
        }
    }
}

/// Progress notification emitted while a resolution run advances.
#[derive(Debug, Clone, Copy)]
pub struct ResolveProgress {
    pub done: usize,
    pub total: usize,
}

/// Callback invoked after each address (or batch) completes.
pub type ResolveProgressCallback = Arc<dyn Fn(ResolveProgress) + Send + Sync>;

// =============================================================================
// Args
// =============================================================================

/// Arguments for a resolution run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveArgs {
    /// Lookup strategy
    pub strategy: ResolveStrategy,

    /// Sleep between consecutive batches in milliseconds
    pub batch_sleep_ms: u64,

    /// API token for ipinfo.io (typically from IPINFO_TOKEN)
    pub ipinfo_token: Option<String>,
}

impl Default for ResolveArgs {
    fn default() -> Self {
        Self {
            strategy: ResolveStrategy::default(),
            batch_sleep_ms: 1000,
            ipinfo_token: None,
        }
    }
}

impl ResolveArgs {
    pub fn with_strategy(mut self, strategy: ResolveStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_batch_sleep_ms(mut self, batch_sleep_ms: u64) -> Self {
        self.batch_sleep_ms = batch_sleep_ms;
        self
    }

    pub fn with_ipinfo_token(mut self, token: Option<String>) -> Self {
        self.ipinfo_token = token;
        self
    }
}

// =============================================================================
// Lens
// =============================================================================

/// IP-to-ASN batch resolution lens.
#[derive(Debug, Default)]
pub struct ResolveLens {}

impl ResolveLens {
    pub fn new() -> Self {
        Self {}
    }

    /// Resolve a list of addresses to origin ASN records.
    ///
    /// Duplicate input addresses collapse; every unique address appears
    /// exactly once in the returned map, unresolved ones as unknown
    /// placeholders.
    pub fn resolve(
        &self,
        args: &ResolveArgs,
        ips: &[Ipv4Addr],
        progress: Option<ResolveProgressCallback>,
    ) -> Result<BTreeMap<Ipv4Addr, IpAsnRecord>> {
        let mut records: BTreeMap<Ipv4Addr, IpAsnRecord> = ips
            .iter()
            .map(|ip| (*ip, IpAsnRecord::unknown(*ip)))
            .collect();
        let unique: Vec<Ipv4Addr> = records.keys().copied().collect();

        info!(
            "resolving {} unique addresses via {}",
            unique.len(),
            args.strategy
        );

        match args.strategy {
            ResolveStrategy::Cymru => self.resolve_cymru(&unique, &mut records, &progress)?,
            ResolveStrategy::Ipapi => self.resolve_ipapi(args, &unique, &mut records, &progress),
            ResolveStrategy::Ipinfo => self.resolve_ipinfo(args, &unique, &mut records, &progress),
        }

        Ok(records)
    }

    fn resolve_cymru(
        &self,
        ips: &[Ipv4Addr],
        records: &mut BTreeMap<Ipv4Addr, IpAsnRecord>,
        progress: &Option<ResolveProgressCallback>,
    ) -> Result<()> {
        let client = CymruClient::new()?;
        let total = ips.len();

        for (done, ip) in ips.iter().enumerate() {
            match client.lookup_origin(*ip) {
                Ok(Some(origin)) => {
                    records.insert(*ip, record_from_origin(*ip, &origin));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("cymru lookup failed for {}: {}", ip, e);
                }
            }
            notify(progress, done + 1, total);
        }

        // the origin zone carries no organization name; fill it in with
        // one AS description lookup per distinct ASN
        let mut names: HashMap<u32, Option<String>> = HashMap::new();
        for record in records.values_mut() {
            let Some(asn) = record.asn else { continue };
            let name = names.entry(asn).or_insert_with(|| {
                match client.lookup_as_name(asn) {
                    Ok(name) => name,
                    Err(e) => {
                        warn!("cymru AS name lookup failed for AS{}: {}", asn, e);
                        None
                    }
                }
            });
            record.org = name.clone();
        }

        Ok(())
    }

    fn resolve_ipapi(
        &self,
        args: &ResolveArgs,
        ips: &[Ipv4Addr],
        records: &mut BTreeMap<Ipv4Addr, IpAsnRecord>,
        progress: &Option<ResolveProgressCallback>,
    ) {
        let total = ips.len();
        let mut done = 0;

        for (index, batch) in ips.chunks(IPAPI_MAX_BATCH).enumerate() {
            if index > 0 {
                thread::sleep(Duration::from_millis(args.batch_sleep_ms));
            }

            match ipapi::lookup_batch(batch) {
                Ok(entries) => {
                    // the response preserves request order; a short reply
                    // leaves the unmatched tail as unknown placeholders
                    for (ip, entry) in batch.iter().zip(entries.iter()) {
                        records.insert(*ip, record_from_ipapi(*ip, entry));
                    }
                }
                Err(e) => {
                    warn!("ip-api batch query failed: {}", e);
                }
            }

            done += batch.len();
            notify(progress, done, total);
        }
    }

    fn resolve_ipinfo(
        &self,
        args: &ResolveArgs,
        ips: &[Ipv4Addr],
        records: &mut BTreeMap<Ipv4Addr, IpAsnRecord>,
        progress: &Option<ResolveProgressCallback>,
    ) {
        let total = ips.len();
        let token = args.ipinfo_token.as_deref();

        for (done, ip) in ips.iter().enumerate() {
            match ipinfo::lookup(*ip, token) {
                Ok(entry) => {
                    records.insert(*ip, record_from_ipinfo(*ip, &entry));
                }
                Err(e) => {
                    warn!("ipinfo lookup failed for {}: {}", ip, e);
                }
            }
            notify(progress, done + 1, total);
        }
    }
}

fn notify(progress: &Option<ResolveProgressCallback>, done: usize, total: usize) {
    if let Some(callback) = progress {
        callback(ResolveProgress { done, total });
    }
}

fn record_from_origin(ip: Ipv4Addr, origin: &CymruOrigin) -> IpAsnRecord {
    IpAsnRecord {
        ip,
        asn: Some(origin.asn),
        prefix: origin.prefix,
        country: origin.country.clone(),
        org: None,
    }
}

fn record_from_ipapi(ip: Ipv4Addr, entry: &IpApiEntry) -> IpAsnRecord {
    if !entry.is_success() {
        return IpAsnRecord::unknown(ip);
    }
    let (asn, org) = match entry.as_field.as_deref().and_then(ipapi::parse_as_field) {
        Some((asn, org)) => (Some(asn), org),
        None => (None, None),
    };
    IpAsnRecord {
        ip,
        asn,
        prefix: None,
        country: entry.country_code.clone(),
        org,
    }
}

fn record_from_ipinfo(ip: Ipv4Addr, entry: &IpInfoEntry) -> IpAsnRecord {
    let (asn, org) = match entry.org.as_deref().and_then(ipapi::parse_as_field) {
        Some((asn, org)) => (Some(asn), org),
        None => (None, None),
    };
    IpAsnRecord {
        ip,
        asn,
        prefix: None,
        country: entry.country.clone(),
        org,
    }
}

/// Read a newline-delimited IPv4 address list.
///
/// Blank lines and `#` comments are skipped (the bundled dataset
/// generator writes a commented header); unparsable lines log a warning
/// and are skipped.
pub fn read_ip_list(path: impl AsRef<Path>) -> Result<Vec<Ipv4Addr>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let mut ips = vec![];
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<Ipv4Addr>() {
            Ok(ip) => ips.push(ip),
            Err(_) => {
                warn!("skipping unparsable address on line {}: {}", number + 1, line);
            }
        }
    }
    Ok(ips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unknown_placeholder() {
        let record = IpAsnRecord::unknown("192.0.2.1".parse().unwrap());
        assert!(!record.is_resolved());
        assert_eq!(record.asn_display(), "Unknown");
    }

    #[test]
    fn test_record_from_origin() {
        let origin = CymruOrigin {
            asn: 13335,
            prefix: Some("1.1.1.0/24".parse().unwrap()),
            country: Some("US".to_string()),
        };
        let record = record_from_origin("1.1.1.1".parse().unwrap(), &origin);
        assert_eq!(record.asn, Some(13335));
        assert_eq!(record.asn_display(), "13335");
        assert_eq!(record.country.as_deref(), Some("US"));
    }

    #[test]
    fn test_record_from_ipapi() {
        let entry: IpApiEntry = serde_json::from_str(
            r#"{"status":"success","countryCode":"US","as":"AS15169 Google LLC","query":"8.8.8.8"}"#,
        )
        .unwrap();
        let record = record_from_ipapi("8.8.8.8".parse().unwrap(), &entry);
        assert_eq!(record.asn, Some(15169));
        assert_eq!(record.org.as_deref(), Some("Google LLC"));

        let failed: IpApiEntry =
            serde_json::from_str(r#"{"status":"fail","query":"10.0.0.1"}"#).unwrap();
        let record = record_from_ipapi("10.0.0.1".parse().unwrap(), &failed);
        assert!(!record.is_resolved());
    }

    #[test]
    fn test_record_from_ipinfo() {
        let entry: IpInfoEntry = serde_json::from_str(
            r#"{"ip":"1.1.1.1","country":"AU","org":"AS13335 Cloudflare, Inc."}"#,
        )
        .unwrap();
        let record = record_from_ipinfo("1.1.1.1".parse().unwrap(), &entry);
        assert_eq!(record.asn, Some(13335));
        assert_eq!(record.org.as_deref(), Some("Cloudflare, Inc."));
        assert_eq!(record.country.as_deref(), Some("AU"));
    }

    #[test]
    fn test_read_ip_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# generated header").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "8.8.8.8").unwrap();
        writeln!(file, "  1.1.1.1  ").unwrap();
        writeln!(file, "not-an-ip").unwrap();
        writeln!(file, "9.9.9.9").unwrap();

        let ips = read_ip_list(file.path()).unwrap();
        assert_eq!(
            ips,
            vec![
                "8.8.8.8".parse::<Ipv4Addr>().unwrap(),
                "1.1.1.1".parse().unwrap(),
                "9.9.9.9".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn test_resolve_deduplicates_input() {
        // keys collapse before any lookups run; verified without network
        // by building the placeholder map the same way resolve() does
        let ips: Vec<Ipv4Addr> = vec![
            "8.8.8.8".parse().unwrap(),
            "8.8.8.8".parse().unwrap(),
            "1.1.1.1".parse().unwrap(),
        ];
        let records: BTreeMap<Ipv4Addr, IpAsnRecord> = ips
            .iter()
            .map(|ip| (*ip, IpAsnRecord::unknown(*ip)))
            .collect();
        assert_eq!(records.len(), 2);
    }
}

//! ASN grouping, holder enrichment, and CSV reporting lens
//!
//! Takes the resolved records from [`crate::lens::resolve`], groups them
//! by origin ASN, enriches each ASN with holder metadata (local cache
//! first, RIPEstat on miss), and writes the analysis CSV plus a top-N
//! summary.

use anyhow::Result;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tabled::Tabled;
use tracing::{info, warn};

use crate::datasets::ripestat;
use crate::holders::{AsnHolder, HolderStore};
use crate::lens::resolve::IpAsnRecord;

// =============================================================================
// Types
// =============================================================================

/// Holder metadata attached to one ASN group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsnDetails {
    pub asn: u32,
    pub holder: String,
    pub announced: bool,
}

impl AsnDetails {
    fn unknown(asn: u32) -> Self {
        Self {
            asn,
            holder: "Unknown".to_string(),
            announced: false,
        }
    }
}

/// One row of the analysis CSV.
///
/// Column names and order match the report format:
/// `ip,asn,asn_holder,country,org,ip_count_in_asn`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRow {
    pub ip: String,
    pub asn: String,
    pub asn_holder: String,
    pub country: String,
    pub org: String,
    pub ip_count_in_asn: usize,
}

/// One entry of the top-N summary table.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct SummaryEntry {
    pub asn: u32,
    pub holder: String,
    pub ip_count: usize,
}

// =============================================================================
// Lens
// =============================================================================

/// Analysis lens: grouping, enrichment, reporting.
#[derive(Debug, Default)]
pub struct AnalyzeLens {}

impl AnalyzeLens {
    pub fn new() -> Self {
        Self {}
    }

    /// Group resolved records by origin ASN.
    ///
    /// Unknown placeholders carry no ASN and are excluded.
    pub fn group_by_asn(
        &self,
        records: &BTreeMap<Ipv4Addr, IpAsnRecord>,
    ) -> BTreeMap<u32, Vec<Ipv4Addr>> {
        let mut groups: BTreeMap<u32, Vec<Ipv4Addr>> = BTreeMap::new();
        for record in records.values() {
            if let Some(asn) = record.asn {
                groups.entry(asn).or_default().push(record.ip);
            }
        }
        groups
    }

    /// Fetch holder metadata for every grouped ASN.
    ///
    /// The local cache is consulted first; misses go to RIPEstat with a
    /// sleep between remote calls. A failed fetch degrades to an
    /// "Unknown" holder and is not cached.
    pub fn fetch_details(
        &self,
        groups: &BTreeMap<u32, Vec<Ipv4Addr>>,
        store: &HolderStore,
        sleep_ms: u64,
    ) -> BTreeMap<u32, AsnDetails> {
        let mut details = BTreeMap::new();
        let mut remote_calls: usize = 0;

        for &asn in groups.keys() {
            match store.get_holder(asn) {
                Ok(Some(cached)) => {
                    details.insert(
                        asn,
                        AsnDetails {
                            asn,
                            holder: cached.holder,
                            announced: cached.announced,
                        },
                    );
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("holder cache read failed for AS{}: {}", asn, e);
                }
            }

            if remote_calls > 0 {
                thread::sleep(Duration::from_millis(sleep_ms / 2));
            }
            remote_calls += 1;

            match ripestat::fetch_as_overview(asn) {
                Ok(overview) => {
                    let holder = AsnHolder {
                        asn,
                        holder: overview.holder.clone(),
                        country: None,
                        announced: overview.announced,
                    };
                    if let Err(e) = store.put_holder(&holder) {
                        warn!("holder cache write failed for AS{}: {}", asn, e);
                    }
                    details.insert(
                        asn,
                        AsnDetails {
                            asn,
                            holder: overview.holder,
                            announced: overview.announced,
                        },
                    );
                }
                Err(e) => {
                    warn!("as-overview fetch failed for AS{}: {}", asn, e);
                    details.insert(asn, AsnDetails::unknown(asn));
                }
            }
        }

        details
    }

    /// Write the analysis CSV and return the number of rows written.
    pub fn write_report(
        &self,
        path: impl AsRef<Path>,
        records: &BTreeMap<Ipv4Addr, IpAsnRecord>,
        groups: &BTreeMap<u32, Vec<Ipv4Addr>>,
        details: &BTreeMap<u32, AsnDetails>,
    ) -> Result<usize> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        let mut rows = 0;

        for record in records.values() {
            let holder = record
                .asn
                .and_then(|asn| details.get(&asn))
                .map(|d| d.holder.clone())
                .unwrap_or_else(|| "Unknown".to_string());
            let ip_count_in_asn = record
                .asn
                .and_then(|asn| groups.get(&asn))
                .map(|ips| ips.len())
                .unwrap_or(0);

            writer.serialize(ReportRow {
                ip: record.ip.to_string(),
                asn: record.asn_display(),
                asn_holder: holder,
                country: record.country.clone().unwrap_or_default(),
                org: record.org.clone().unwrap_or_default(),
                ip_count_in_asn,
            })?;
            rows += 1;
        }

        writer.flush()?;
        info!("wrote {} rows to {}", rows, path.as_ref().display());
        Ok(rows)
    }

    /// Build the top-N summary, descending by address count with the ASN
    /// as tiebreak.
    pub fn summarize(
        &self,
        groups: &BTreeMap<u32, Vec<Ipv4Addr>>,
        details: &BTreeMap<u32, AsnDetails>,
        top_n: usize,
    ) -> Vec<SummaryEntry> {
        groups
            .iter()
            .map(|(&asn, ips)| SummaryEntry {
                asn,
                holder: details
                    .get(&asn)
                    .map(|d| d.holder.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                ip_count: ips.len(),
            })
            .sorted_by(|a, b| b.ip_count.cmp(&a.ip_count).then(a.asn.cmp(&b.asn)))
            .take(top_n)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ip: &str, asn: Option<u32>, country: Option<&str>) -> IpAsnRecord {
        IpAsnRecord {
            ip: ip.parse().unwrap(),
            asn,
            prefix: None,
            country: country.map(|c| c.to_string()),
            org: None,
        }
    }

    fn sample_records() -> BTreeMap<Ipv4Addr, IpAsnRecord> {
        [
            record("8.8.8.8", Some(15169), Some("US")),
            record("8.8.4.4", Some(15169), Some("US")),
            record("1.1.1.1", Some(13335), Some("AU")),
            record("192.0.2.1", None, None),
        ]
        .into_iter()
        .map(|r| (r.ip, r))
        .collect()
    }

    #[test]
    fn test_group_by_asn_excludes_unknown() {
        let lens = AnalyzeLens::new();
        let groups = lens.group_by_asn(&sample_records());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups.get(&15169).unwrap().len(), 2);
        assert_eq!(groups.get(&13335).unwrap().len(), 1);
    }

    #[test]
    fn test_write_report() {
        let lens = AnalyzeLens::new();
        let records = sample_records();
        let groups = lens.group_by_asn(&records);
        let details: BTreeMap<u32, AsnDetails> = [
            (
                15169,
                AsnDetails {
                    asn: 15169,
                    holder: "GOOGLE".to_string(),
                    announced: true,
                },
            ),
            (
                13335,
                AsnDetails {
                    asn: 13335,
                    holder: "CLOUDFLARENET".to_string(),
                    announced: true,
                },
            ),
        ]
        .into_iter()
        .collect();

        let file = tempfile::NamedTempFile::new().unwrap();
        let rows = lens
            .write_report(file.path(), &records, &groups, &details)
            .unwrap();
        assert_eq!(rows, 4);

        let content = std::fs::read_to_string(file.path()).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ip,asn,asn_holder,country,org,ip_count_in_asn"
        );
        assert_eq!(content.lines().count(), 5);

        // unresolved addresses keep the original Unknown placeholder shape
        let unknown_row = content
            .lines()
            .find(|l| l.starts_with("192.0.2.1"))
            .unwrap();
        assert_eq!(unknown_row, "192.0.2.1,Unknown,Unknown,,,0");

        // ip_count_in_asn equals the group size for known ASNs
        let google_row = content.lines().find(|l| l.starts_with("8.8.8.8")).unwrap();
        assert!(google_row.ends_with(",2"));
    }

    #[test]
    fn test_summarize_ordering() {
        let lens = AnalyzeLens::new();
        let records = sample_records();
        let groups = lens.group_by_asn(&records);
        let details = BTreeMap::new();

        let summary = lens.summarize(&groups, &details, 10);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].asn, 15169);
        assert_eq!(summary[0].ip_count, 2);
        assert_eq!(summary[0].holder, "Unknown");

        let top_one = lens.summarize(&groups, &details, 1);
        assert_eq!(top_one.len(), 1);
    }
}

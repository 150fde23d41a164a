//! ip-api.com batch geolocation lookups.
//!
//! Data source:
//! https://ip-api.com/docs/api:batch
//!
//! The batch endpoint accepts up to 100 addresses per POST. The free tier
//! is rate limited, so callers are expected to sleep between batches.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

const IPAPI_BATCH_URL: &str = "http://ip-api.com/batch?fields=status,message,countryCode,as,query";

/// Maximum number of addresses ip-api.com accepts in one batch request.
pub const IPAPI_MAX_BATCH: usize = 100;

/// One entry of a batch lookup response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpApiEntry {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "countryCode", default)]
    pub country_code: Option<String>,
    /// Combined ASN and organization, e.g. "AS15169 Google LLC"
    #[serde(rename = "as", default)]
    pub as_field: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
}

impl IpApiEntry {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Query the batch endpoint for up to [`IPAPI_MAX_BATCH`] addresses.
///
/// The response preserves request order; entries for failed lookups carry
/// `status != "success"`.
pub fn lookup_batch(ips: &[Ipv4Addr]) -> Result<Vec<IpApiEntry>> {
    let payload: Vec<String> = ips.iter().map(|ip| ip.to_string()).collect();
    let entries = ureq::post(IPAPI_BATCH_URL)
        .send_json(&payload)?
        .body_mut()
        .read_json::<Vec<IpApiEntry>>()?;
    Ok(entries)
}

/// Split an "AS15169 Google LLC" style field into ASN and organization.
pub fn parse_as_field(field: &str) -> Option<(u32, Option<String>)> {
    let mut parts = field.splitn(2, ' ');
    let asn = parts
        .next()?
        .strip_prefix("AS")?
        .parse::<u32>()
        .ok()?;
    let org = parts
        .next()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());
    Some((asn, org))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_as_field() {
        let (asn, org) = parse_as_field("AS15169 Google LLC").unwrap();
        assert_eq!(asn, 15169);
        assert_eq!(org.as_deref(), Some("Google LLC"));
    }

    #[test]
    fn test_parse_as_field_no_org() {
        let (asn, org) = parse_as_field("AS13335").unwrap();
        assert_eq!(asn, 13335);
        assert!(org.is_none());
    }

    #[test]
    fn test_parse_as_field_invalid() {
        assert!(parse_as_field("").is_none());
        assert!(parse_as_field("15169 Google LLC").is_none());
        assert!(parse_as_field("ASfoo Google LLC").is_none());
    }

    #[test]
    fn test_entry_status() {
        let entry: IpApiEntry = serde_json::from_str(
            r#"{"status":"fail","message":"private range","query":"10.0.0.1"}"#,
        )
        .unwrap();
        assert!(!entry.is_success());
        assert!(entry.as_field.is_none());

        let entry: IpApiEntry = serde_json::from_str(
            r#"{"status":"success","countryCode":"US","as":"AS15169 Google LLC","query":"8.8.8.8"}"#,
        )
        .unwrap();
        assert!(entry.is_success());
        assert_eq!(entry.country_code.as_deref(), Some("US"));
    }
}

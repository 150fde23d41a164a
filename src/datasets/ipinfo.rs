//! ipinfo.io per-address lookups.
//!
//! Note: set IPINFO_TOKEN in the environment to raise the rate limit;
//! anonymous access works for small runs.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

const IPINFO_API: &str = "https://ipinfo.io";

/// Response of a per-address lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpInfoEntry {
    pub ip: String,
    #[serde(default)]
    pub country: Option<String>,
    /// Combined ASN and organization, e.g. "AS13335 Cloudflare, Inc."
    #[serde(default)]
    pub org: Option<String>,
}

/// Look up a single address.
pub fn lookup(ip: Ipv4Addr, token: Option<&str>) -> Result<IpInfoEntry> {
    let url = match token {
        Some(token) => format!("{}/{}/json?token={}", IPINFO_API, ip, token),
        None => format!("{}/{}/json", IPINFO_API, ip),
    };
    let entry = ureq::get(url.as_str())
        .call()?
        .body_mut()
        .read_json::<IpInfoEntry>()?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_deserialization() {
        let entry: IpInfoEntry = serde_json::from_str(
            r#"{"ip":"1.1.1.1","hostname":"one.one.one.one","country":"AU","org":"AS13335 Cloudflare, Inc."}"#,
        )
        .unwrap();
        assert_eq!(entry.ip, "1.1.1.1");
        assert_eq!(entry.country.as_deref(), Some("AU"));
        assert_eq!(entry.org.as_deref(), Some("AS13335 Cloudflare, Inc."));
    }

    #[test]
    fn test_entry_bogon_shape() {
        // bogon responses omit country and org entirely
        let entry: IpInfoEntry =
            serde_json::from_str(r#"{"ip":"10.0.0.1","bogon":true}"#).unwrap();
        assert!(entry.country.is_none());
        assert!(entry.org.is_none());
    }
}

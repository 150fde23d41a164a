//! Team Cymru IP-to-ASN lookup over DNS TXT records.
//!
//! Data source:
//! https://www.team-cymru.com/ip-asn-mapping
//!
//! Origin lookups query `<reversed-ip>.origin.asn.cymru.com` and receive a
//! pipe-separated TXT payload such as
//! `"13335 | 1.1.1.0/24 | US | apnic | 2011-08-11"`. AS description
//! lookups query `AS<asn>.asn.cymru.com` with the description in the last
//! field, e.g. `"13335 | US | arin | 2010-07-14 | CLOUDFLARENET, US"`.

use anyhow::Result;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::Resolver;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

const ORIGIN_SUFFIX: &str = "origin.asn.cymru.com.";
const ASN_SUFFIX: &str = "asn.cymru.com.";

/// Origin ASN record for a single IP address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CymruOrigin {
    pub asn: u32,
    pub prefix: Option<Ipv4Net>,
    pub country: Option<String>,
}

pub struct CymruClient {
    resolver: Resolver,
}

impl CymruClient {
    pub fn new() -> Result<CymruClient> {
        let resolver = Resolver::new(ResolverConfig::default(), ResolverOpts::default())?;
        Ok(CymruClient { resolver })
    }

    /// Look up the origin ASN record for an IPv4 address.
    ///
    /// Returns `Ok(None)` when the service has no record for the address
    /// (unannounced space) or the answer cannot be parsed.
    pub fn lookup_origin(&self, ip: Ipv4Addr) -> Result<Option<CymruOrigin>> {
        let octets = ip.octets();
        let query = format!(
            "{}.{}.{}.{}.{}",
            octets[3], octets[2], octets[1], octets[0], ORIGIN_SUFFIX
        );

        match self.txt_strings(query.as_str())? {
            Some(records) => Ok(records
                .iter()
                .find_map(|txt| parse_origin_txt(txt.as_str()))),
            None => Ok(None),
        }
    }

    /// Look up the registered AS description for an ASN.
    pub fn lookup_as_name(&self, asn: u32) -> Result<Option<String>> {
        let query = format!("AS{}.{}", asn, ASN_SUFFIX);

        match self.txt_strings(query.as_str())? {
            Some(records) => Ok(records
                .iter()
                .find_map(|txt| parse_as_name_txt(txt.as_str()))),
            None => Ok(None),
        }
    }

    fn txt_strings(&self, query: &str) -> Result<Option<Vec<String>>> {
        let lookup = match self.resolver.txt_lookup(query) {
            Ok(lookup) => lookup,
            Err(e) => {
                return match e.kind() {
                    ResolveErrorKind::NoRecordsFound { .. } => Ok(None),
                    _ => Err(e.into()),
                }
            }
        };

        let records: Vec<String> = lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|segment| String::from_utf8_lossy(segment).to_string())
                    .collect::<String>()
            })
            .collect();
        Ok(Some(records))
    }
}

/// Parse an origin TXT payload into a [`CymruOrigin`].
///
/// Multi-origin answers ("64512 64513 | ...") resolve to the first ASN.
pub fn parse_origin_txt(txt: &str) -> Option<CymruOrigin> {
    let fields: Vec<&str> = txt.split('|').map(|f| f.trim()).collect();
    if fields.len() < 3 {
        return None;
    }

    let asn = fields[0].split_whitespace().next()?.parse::<u32>().ok()?;
    let prefix = fields[1].parse::<Ipv4Net>().ok();
    let country = match fields[2] {
        "" => None,
        cc => Some(cc.to_string()),
    };

    Some(CymruOrigin {
        asn,
        prefix,
        country,
    })
}

/// Parse an AS description TXT payload; the description is the last field.
pub fn parse_as_name_txt(txt: &str) -> Option<String> {
    let name = txt.rsplit('|').next()?.trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

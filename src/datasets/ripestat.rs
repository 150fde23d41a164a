//! RIPEstat data API access.
//!
//! Data source:
//! https://stat.ripe.net/docs/02.data-api/
//!
//! Two endpoints are used: `as-overview` for holder metadata and
//! `asn-neighbours` for AS-level BGP adjacency.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::holders::{AsnNeighbor, NeighborKind};

const RIPESTAT_BASE: &str = "https://stat.ripe.net/data";
const SOURCEAPP: &str = "asnscope";

/// Holder metadata reported by the `as-overview` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsOverview {
    pub holder: String,
    pub announced: bool,
    #[serde(default)]
    pub block: Option<AsBlock>,
}

/// The registry block an ASN belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsBlock {
    pub resource: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AsOverviewResponse {
    data: AsOverview,
}

#[derive(Debug, Deserialize)]
struct NeighboursResponse {
    data: NeighboursData,
}

#[derive(Debug, Deserialize)]
struct NeighboursData {
    neighbours: Vec<NeighbourEntry>,
}

#[derive(Debug, Deserialize)]
struct NeighbourEntry {
    asn: u32,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    power: u32,
}

/// Fetch holder metadata for an ASN.
pub fn fetch_as_overview(asn: u32) -> Result<AsOverview> {
    let url = format!(
        "{}/as-overview/data.json?resource=AS{}&sourceapp={}",
        RIPESTAT_BASE, asn, SOURCEAPP
    );
    let resp = ureq::get(url.as_str())
        .call()?
        .body_mut()
        .read_json::<AsOverviewResponse>()?;
    Ok(resp.data)
}

/// Fetch the BGP neighbour list for an ASN.
///
/// Relation types the API does not document map to
/// [`NeighborKind::Uncertain`].
pub fn fetch_neighbors(asn: u32) -> Result<Vec<AsnNeighbor>> {
    let url = format!(
        "{}/asn-neighbours/data.json?resource=AS{}&sourceapp={}",
        RIPESTAT_BASE, asn, SOURCEAPP
    );
    let resp = ureq::get(url.as_str())
        .call()?
        .body_mut()
        .read_json::<NeighboursResponse>()?;

    let neighbors = resp
        .data
        .neighbours
        .into_iter()
        .map(|entry| AsnNeighbor {
            asn: entry.asn,
            kind: NeighborKind::from_str(entry.kind.as_str()).unwrap_or(NeighborKind::Uncertain),
            power: entry.power,
        })
        .collect();
    Ok(neighbors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overview_deserialization() {
        let resp: AsOverviewResponse = serde_json::from_str(
            r#"{"data":{"holder":"CLOUDFLARENET","announced":true,
                "block":{"resource":"12288-13311","desc":"Assigned by ARIN","name":"IANA 16-bit Autonomous System (AS) Numbers Registry"},
                "resource":"13335","type":"as"},"status":"ok"}"#,
        )
        .unwrap();
        assert_eq!(resp.data.holder, "CLOUDFLARENET");
        assert!(resp.data.announced);
        assert!(resp.data.block.is_some());
    }

    #[test]
    fn test_neighbours_deserialization() {
        let resp: NeighboursResponse = serde_json::from_str(
            r#"{"data":{"neighbours":[
                {"asn":1299,"type":"left","power":12},
                {"asn":174,"type":"right","power":3},
                {"asn":6939,"type":"sideways"}
            ]}}"#,
        )
        .unwrap();
        let neighbors: Vec<AsnNeighbor> = resp
            .data
            .neighbours
            .into_iter()
            .map(|entry| AsnNeighbor {
                asn: entry.asn,
                kind: NeighborKind::from_str(entry.kind.as_str())
                    .unwrap_or(NeighborKind::Uncertain),
                power: entry.power,
            })
            .collect();
        assert_eq!(neighbors.len(), 3);
        assert_eq!(neighbors[0].kind, NeighborKind::Left);
        // unrecognized relation types degrade to uncertain
        assert_eq!(neighbors[2].kind, NeighborKind::Uncertain);
        assert_eq!(neighbors[2].power, 0);
    }
}

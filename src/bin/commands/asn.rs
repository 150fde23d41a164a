use clap::Args;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use asnscope::{AnalyzeLens, AsnscopeConfig, OutputFormat};

/// Arguments for the Asn command
#[derive(Args)]
pub struct AsnCmdArgs {
    /// ASNs to look up, e.g. "13335"
    pub asns: Vec<u32>,

    /// Also list BGP neighbours for each ASN
    #[clap(short, long)]
    pub neighbors: bool,

    /// Output format: table, markdown, json, json-pretty, json-line, psv
    #[clap(long, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Tabled)]
struct HolderTableItem {
    asn: u32,
    holder: String,
    announced: bool,
}

#[derive(Tabled)]
struct NeighborTableItem {
    asn: u32,
    neighbor: u32,
    rel: String,
    power: u32,
}

pub fn run(config: &AsnscopeConfig, args: AsnCmdArgs) {
    let AsnCmdArgs {
        asns,
        neighbors,
        format,
    } = args;

    if asns.is_empty() {
        eprintln!("no ASNs given");
        return;
    }

    let store = match super::open_store(config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("unable to open cache database: {e}");
            return;
        }
    };

    // reuse the analysis enrichment path with empty groups
    let lens = AnalyzeLens::new();
    let groups: BTreeMap<u32, Vec<Ipv4Addr>> =
        asns.iter().map(|&asn| (asn, vec![])).collect();
    let details = lens.fetch_details(&groups, &store, config.batch_sleep_ms);

    if format.is_json() {
        let values: Vec<_> = details.values().collect();
        match format {
            OutputFormat::JsonPretty => match serde_json::to_string_pretty(&values) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("unable to serialize details: {e}"),
            },
            OutputFormat::JsonLine => {
                for detail in details.values() {
                    println!("{}", serde_json::json!(detail));
                }
            }
            _ => println!("{}", serde_json::json!(values)),
        }
    } else {
        let items: Vec<HolderTableItem> = details
            .values()
            .map(|d| HolderTableItem {
                asn: d.asn,
                holder: d.holder.clone(),
                announced: d.announced,
            })
            .collect();
        match format {
            OutputFormat::Psv => {
                println!("asn|holder|announced");
                for item in items {
                    println!("{}|{}|{}", item.asn, item.holder, item.announced);
                }
            }
            OutputFormat::Table => {
                println!("{}", Table::new(items).with(Style::rounded()));
            }
            _ => {
                println!("{}", Table::new(items).with(Style::markdown()));
            }
        }
    }

    if !neighbors {
        return;
    }

    let mut by_asn: BTreeMap<u32, Vec<asnscope::AsnNeighbor>> = BTreeMap::new();
    for &asn in &asns {
        let cached = match store.get_neighbors(asn) {
            Ok(cached) => cached,
            Err(e) => {
                eprintln!("unable to read neighbours for AS{asn}: {e}");
                continue;
            }
        };
        let list = match cached {
            Some(list) => list,
            None => match asnscope::datasets::ripestat::fetch_neighbors(asn) {
                Ok(list) => {
                    if let Err(e) = store.put_neighbors(asn, &list) {
                        eprintln!("unable to cache neighbours for AS{asn}: {e}");
                    }
                    list
                }
                Err(e) => {
                    eprintln!("unable to fetch neighbours for AS{asn}: {e}");
                    continue;
                }
            },
        };
        by_asn.insert(asn, list);
    }

    if by_asn.values().all(|list| list.is_empty()) {
        println!("no neighbour data available");
        return;
    }

    if format.is_json() {
        println!("{}", serde_json::json!(by_asn));
        return;
    }

    let items: Vec<NeighborTableItem> = by_asn
        .iter()
        .flat_map(|(&asn, list)| {
            list.iter().map(move |neighbor| NeighborTableItem {
                asn,
                neighbor: neighbor.asn,
                rel: neighbor.kind.to_string(),
                power: neighbor.power,
            })
        })
        .collect();
    match format {
        OutputFormat::Table => println!("{}", Table::new(items).with(Style::rounded())),
        _ => println!("{}", Table::new(items).with(Style::markdown())),
    }
}

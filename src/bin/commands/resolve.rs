use clap::Args;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use asnscope::{
    read_ip_list, AsnscopeConfig, IpAsnRecord, OutputFormat, ResolveArgs, ResolveLens,
    ResolveStrategy,
};

/// Arguments for the Resolve command
#[derive(Args)]
pub struct ResolveCmdArgs {
    /// IP addresses to resolve
    pub ips: Vec<Ipv4Addr>,

    /// Read addresses from a file (one per line, `#` comments allowed)
    #[clap(short, long)]
    pub file: Option<PathBuf>,

    /// Lookup strategy
    #[clap(short, long, default_value = "cymru")]
    pub method: ResolveStrategy,

    /// Output format: table, markdown, json, json-pretty, json-line, psv
    #[clap(long, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Tabled)]
struct RecordTableItem {
    ip: String,
    asn: String,
    prefix: String,
    country: String,
    org: String,
}

impl From<&IpAsnRecord> for RecordTableItem {
    fn from(record: &IpAsnRecord) -> Self {
        Self {
            ip: record.ip.to_string(),
            asn: record.asn_display(),
            prefix: record
                .prefix
                .map(|p| p.to_string())
                .unwrap_or_default(),
            country: record.country.clone().unwrap_or_default(),
            org: record.org.clone().unwrap_or_default(),
        }
    }
}

pub fn run(config: &AsnscopeConfig, args: ResolveCmdArgs) {
    let ResolveCmdArgs {
        mut ips,
        file,
        method,
        format,
    } = args;

    if let Some(path) = file {
        match read_ip_list(&path) {
            Ok(from_file) => ips.extend(from_file),
            Err(e) => {
                eprintln!("unable to read {}: {}", path.display(), e);
                return;
            }
        }
    }
    if ips.is_empty() {
        eprintln!("no addresses given: pass them as arguments or via --file");
        return;
    }

    let lens = ResolveLens::new();
    let resolve_args = ResolveArgs::default()
        .with_strategy(method)
        .with_batch_sleep_ms(config.batch_sleep_ms)
        .with_ipinfo_token(std::env::var("IPINFO_TOKEN").ok());

    let show_progress = format.is_table() && ips.len() > 20;
    let (pb, callback) = super::resolve_progress(ips.len());
    let progress = match show_progress {
        true => Some(callback),
        false => {
            pb.finish_and_clear();
            None
        }
    };

    let records = match lens.resolve(&resolve_args, &ips, progress) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("resolution failed: {e}");
            return;
        }
    };
    if show_progress {
        pb.finish_and_clear();
    }

    match format {
        OutputFormat::Table | OutputFormat::Markdown => {
            let items: Vec<RecordTableItem> = records.values().map(Into::into).collect();
            match format {
                OutputFormat::Table => {
                    println!("{}", Table::new(items).with(Style::rounded()));
                }
                _ => {
                    println!("{}", Table::new(items).with(Style::markdown()));
                }
            }
        }
        OutputFormat::Json => {
            let values: Vec<&IpAsnRecord> = records.values().collect();
            println!("{}", serde_json::json!(values));
        }
        OutputFormat::JsonPretty => {
            let values: Vec<&IpAsnRecord> = records.values().collect();
            match serde_json::to_string_pretty(&values) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("unable to serialize records: {e}"),
            }
        }
        OutputFormat::JsonLine => {
            for record in records.values() {
                println!("{}", serde_json::json!(record));
            }
        }
        OutputFormat::Psv => {
            println!("ip|asn|prefix|country|org");
            for record in records.values() {
                let item = RecordTableItem::from(record);
                println!(
                    "{}|{}|{}|{}|{}",
                    item.ip, item.asn, item.prefix, item.country, item.org
                );
            }
        }
    }
}

use clap::Args;
use std::path::PathBuf;
use tabled::settings::Style;
use tabled::Table;

use asnscope::lens::utils::{truncate_name, DEFAULT_NAME_MAX_LEN};
use asnscope::{
    read_ip_list, AnalyzeLens, AsnscopeConfig, GraphArgs, GraphLens, ResolveArgs, ResolveLens,
    ResolveStrategy, SummaryEntry,
};

/// Arguments for the Analyze command
#[derive(Args)]
pub struct AnalyzeCmdArgs {
    /// Input file with one IPv4 address per line
    #[clap(name = "FILE")]
    pub file: PathBuf,

    /// Lookup strategy
    #[clap(short, long, default_value = "cymru")]
    pub method: ResolveStrategy,

    /// CSV report output path
    #[clap(short, long, default_value = "ip_asn_analysis.csv")]
    pub output: PathBuf,

    /// Number of ASNs in the printed summary
    #[clap(long, default_value = "10")]
    pub top: usize,

    /// Render the ASN adjacency graph to this SVG path
    #[clap(short, long)]
    pub graph: Option<PathBuf>,

    /// Also export the adjacency graph as Graphviz DOT
    #[clap(long)]
    pub dot: Option<PathBuf>,

    /// Keep only the strongest N neighbours per ASN in the graph
    #[clap(long)]
    pub max_neighbors: Option<usize>,

    /// Seed for the graph layout (fixed seed gives a reproducible image)
    #[clap(long)]
    pub seed: Option<u64>,

    /// Output to pretty table, default markdown table
    #[clap(short, long)]
    pub pretty: bool,
}

pub fn run(config: &AsnscopeConfig, args: AnalyzeCmdArgs) {
    let AnalyzeCmdArgs {
        file,
        method,
        output,
        top,
        graph,
        dot,
        max_neighbors,
        seed,
        pretty,
    } = args;

    let ips = match read_ip_list(&file) {
        Ok(ips) => ips,
        Err(e) => {
            eprintln!("unable to read {}: {}", file.display(), e);
            return;
        }
    };
    if ips.is_empty() {
        eprintln!("no addresses found in {}", file.display());
        return;
    }
    println!("starting analysis of {} addresses...", ips.len());

    let store = match super::open_store(config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("unable to open cache database: {e}");
            return;
        }
    };

    // resolve
    let resolve_lens = ResolveLens::new();
    let resolve_args = ResolveArgs::default()
        .with_strategy(method)
        .with_batch_sleep_ms(config.batch_sleep_ms)
        .with_ipinfo_token(std::env::var("IPINFO_TOKEN").ok());
    let (pb, callback) = super::resolve_progress(ips.len());
    let records = match resolve_lens.resolve(&resolve_args, &ips, Some(callback)) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("resolution failed: {e}");
            return;
        }
    };
    pb.finish_and_clear();

    // group and enrich
    let analyze_lens = AnalyzeLens::new();
    let groups = analyze_lens.group_by_asn(&records);
    println!("found {} unique ASNs", groups.len());

    let details = analyze_lens.fetch_details(&groups, &store, config.batch_sleep_ms);

    // report
    match analyze_lens.write_report(&output, &records, &groups, &details) {
        Ok(rows) => println!("wrote {} rows to {}", rows, output.display()),
        Err(e) => {
            eprintln!("unable to write {}: {}", output.display(), e);
            return;
        }
    }

    // summary
    let summary: Vec<SummaryEntry> = analyze_lens
        .summarize(&groups, &details, top)
        .into_iter()
        .map(|entry| SummaryEntry {
            holder: truncate_name(entry.holder.as_str(), DEFAULT_NAME_MAX_LEN),
            ..entry
        })
        .collect();
    match pretty {
        true => println!("{}", Table::new(summary).with(Style::rounded())),
        false => println!("{}", Table::new(summary).with(Style::markdown())),
    }

    // optional adjacency graph
    if graph.is_none() && dot.is_none() {
        return;
    }

    let seed_asns: Vec<u32> = groups.keys().copied().collect();
    println!("building BGP adjacency graph for {} ASNs...", seed_asns.len());

    let graph_lens = GraphLens::new();
    let graph_args = GraphArgs::default()
        .with_max_neighbors(max_neighbors)
        .with_layout_seed(seed);
    let asn_graph = graph_lens.build(&seed_asns, &store, &graph_args, config.batch_sleep_ms);

    if let Some(path) = graph {
        let positions = graph_lens.layout(&asn_graph, &graph_args);
        match graph_lens.render_svg(&asn_graph, &positions, &path) {
            Ok(()) => println!(
                "rendered {} nodes and {} edges to {}",
                asn_graph.node_count(),
                asn_graph.edge_count(),
                path.display()
            ),
            Err(e) => eprintln!("unable to render {}: {}", path.display(), e),
        }
    }

    if let Some(path) = dot {
        if let Err(e) = std::fs::write(&path, graph_lens.to_dot(&asn_graph)) {
            eprintln!("unable to write {}: {}", path.display(), e);
        }
    }
}

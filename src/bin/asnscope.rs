use clap::{Parser, Subcommand};
use tracing::Level;

use asnscope::AsnscopeConfig;

mod commands;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.asnscope/asnscope.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve IP addresses to their origin ASNs.
    Resolve(commands::resolve::ResolveCmdArgs),

    /// Full analysis: resolve, group by ASN, enrich, write the CSV report.
    Analyze(commands::analyze::AnalyzeCmdArgs),

    /// ASN holder and BGP neighbour lookup utility.
    Asn(commands::asn::AsnCmdArgs),

    /// Generate a synthetic IP address dataset for testing.
    Sample(commands::sample::SampleCmdArgs),
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt().with_max_level(Level::INFO).init();
    }

    let config = match AsnscopeConfig::new(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    match cli.command {
        Commands::Resolve(args) => commands::resolve::run(&config, args),
        Commands::Analyze(args) => commands::analyze::run(&config, args),
        Commands::Asn(args) => commands::asn::run(&config, args),
        Commands::Sample(args) => commands::sample::run(args),
    }
}

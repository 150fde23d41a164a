use clap::Args;
use std::path::PathBuf;

use asnscope::{SampleArgs, SampleLens};

/// Arguments for the Sample command
#[derive(Args)]
pub struct SampleCmdArgs {
    /// Number of addresses to generate
    #[clap(short, long, default_value = "2000")]
    pub size: usize,

    /// Output path for the plain-text address list
    #[clap(short, long, default_value = "sample_ip_list.txt")]
    pub output: PathBuf,

    /// Also write a CSV variant with synthetic service metadata
    #[clap(long)]
    pub metadata_csv: Option<PathBuf>,

    /// RNG seed; fixed seed gives a reproducible dataset
    #[clap(long)]
    pub seed: Option<u64>,
}

pub fn run(args: SampleCmdArgs) {
    let SampleCmdArgs {
        size,
        output,
        metadata_csv,
        seed,
    } = args;

    let lens = SampleLens::new();
    let sample_args = SampleArgs::default().with_size(size).with_seed(seed);

    println!("generating {} sample IP addresses...", size);
    let dataset = lens.generate(&sample_args);

    if let Err(e) = lens.write_plain(&dataset, &output) {
        eprintln!("unable to write {}: {}", output.display(), e);
        return;
    }
    println!(
        "generated {} unique IP addresses, saved to {}",
        dataset.len(),
        output.display()
    );

    println!("distribution by source:");
    for (source, count) in dataset.source_counts() {
        println!("  {}: {} IPs", source, count);
    }

    if let Some(path) = metadata_csv {
        match lens.write_csv(&dataset, &path, seed) {
            Ok(rows) => println!("wrote {} metadata rows to {}", rows, path.display()),
            Err(e) => eprintln!("unable to write {}: {}", path.display(), e),
        }
    }
}

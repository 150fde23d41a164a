#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Asnscope - an IP-to-ASN mapping and BGP adjacency toolkit
//!
//! Asnscope resolves lists of IPv4 addresses to their origin Autonomous
//! System Numbers, aggregates the results by network operator, enriches
//! them with holder metadata from RIPEstat, and can render an ASN-to-ASN
//! BGP adjacency graph. It can be used as both a command-line application
//! and a library.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - **[`datasets`]**: typed clients for the external lookup services
//!   - `cymru`: Team Cymru DNS TXT origin lookups
//!   - `ipapi`: ip-api.com batch geolocation lookups
//!   - `ipinfo`: ipinfo.io per-address lookups
//!   - `ripestat`: RIPEstat AS overview and neighbour data
//!
//! - **[`lens`]**: high-level business logic
//!   - `resolve`: batch IP-to-ASN resolution with pluggable strategies
//!   - `analyze`: ASN grouping, holder enrichment, and CSV reporting
//!   - `graph`: ASN adjacency graph construction and rendering
//!   - `sample`: synthetic test dataset generation
//!
//! - **[`holders`]**: SQLite-backed cache of per-ASN holder and
//!   neighbour metadata
//!
//! - **[`config`]**: configuration management
//!
//! # Quick Start Examples
//!
//! ## Resolving addresses (strategy: Team Cymru DNS)
//!
//! ```rust,ignore
//! use asnscope::lens::resolve::{ResolveArgs, ResolveLens, ResolveStrategy};
//!
//! let lens = ResolveLens::new();
//! let args = ResolveArgs::default().with_strategy(ResolveStrategy::Cymru);
//! let records = lens.resolve(&args, &ips, None)?;
//! for (ip, record) in &records {
//!     println!("{} -> {}", ip, record.asn_display());
//! }
//! ```
//!
//! ## Writing the analysis report
//!
//! ```rust,ignore
//! use asnscope::lens::analyze::AnalyzeLens;
//! use asnscope::{AsnscopeConfig, HolderStore};
//!
//! let config = AsnscopeConfig::new(&None)?;
//! let store = HolderStore::new(
//!     &Some(config.sqlite_path()),
//!     config.holder_cache_ttl_secs,
//!     config.neighbor_cache_ttl_secs,
//! )?;
//!
//! let lens = AnalyzeLens::new();
//! let groups = lens.group_by_asn(&records);
//! let details = lens.fetch_details(&groups, &store, config.batch_sleep_ms);
//! let rows = lens.write_report("ip_asn_analysis.csv", &records, &groups, &details)?;
//! println!("wrote {} rows", rows);
//! ```
//!
//! ## Rendering an adjacency graph
//!
//! ```rust,ignore
//! use asnscope::lens::graph::{GraphArgs, GraphLens};
//!
//! let lens = GraphLens::new();
//! let graph = lens.build(&asns, &store, &GraphArgs::default(), 500);
//! let positions = lens.layout(&graph, &GraphArgs::default());
//! lens.render_svg(&graph, &positions, "bgp_graph.svg")?;
//! ```

pub mod config;
pub mod database;
pub mod datasets;
pub mod holders;
pub mod lens;

pub use config::AsnscopeConfig;
pub use database::AsnscopeDatabase;
pub use holders::{AsnHolder, AsnNeighbor, HolderStore, NeighborKind};

pub use lens::analyze::{AnalyzeLens, AsnDetails, ReportRow, SummaryEntry};
pub use lens::graph::{AsnGraph, GraphArgs, GraphLens};
pub use lens::resolve::{
    read_ip_list, IpAsnRecord, ResolveArgs, ResolveLens, ResolveProgress,
    ResolveProgressCallback, ResolveStrategy,
};
pub use lens::sample::{SampleArgs, SampleDataset, SampleLens};
pub use lens::utils::OutputFormat;

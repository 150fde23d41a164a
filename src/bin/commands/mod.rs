pub mod analyze;
pub mod asn;
pub mod resolve;
pub mod sample;

use std::sync::Arc;

use asnscope::{AsnscopeConfig, HolderStore, ResolveProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};

/// Open the shared holder/neighbour cache under the configured data dir.
pub(crate) fn open_store(config: &AsnscopeConfig) -> anyhow::Result<HolderStore> {
    HolderStore::new(
        &Some(config.sqlite_path()),
        config.holder_cache_ttl_secs,
        config.neighbor_cache_ttl_secs,
    )
}

/// Progress bar wired to the resolve lens callback.
pub(crate) fn resolve_progress(total: usize) -> (ProgressBar, ResolveProgressCallback) {
    let sty = ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {eta}",
    )
    .unwrap()
    .progress_chars("##-");
    let pb = ProgressBar::new(total as u64);
    pb.set_style(sty);

    let callback_pb = pb.clone();
    let callback: ResolveProgressCallback =
        Arc::new(move |progress| callback_pb.set_position(progress.done as u64));
    (pb, callback)
}

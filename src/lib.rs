//! Triascan — multi-model medical image diagnosis core.
//!
//! An image comes in, one or more independently-trained classifiers run
//! on it, their outputs are merged into a single authoritative diagnosis
//! record, and longitudinal statistics (severity mix, weekly/monthly
//! trends, per-subject summaries) are derived from the accumulated
//! records on demand. Authentication, HTTP routing, and cloud blob
//! internals are external collaborators, not part of this crate.

pub mod artifacts;
pub mod config;
pub mod db;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod severity;
pub mod statistics;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries embedding this crate. Honors RUST_LOG,
/// falling back to the crate default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Triascan core v{}", config::APP_VERSION);
}

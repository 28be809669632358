//! Logging and metrics initialization for the `helpdesk` binary.

use std::sync::{Once, OnceLock};

use metrics::describe_counter;
use metrics::describe_histogram;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::storage::{STORE_REQUESTS_TOTAL, STORE_REQUEST_DURATION};

static LOGGING: Once = Once::new();
static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`
/// filter. Later calls are no-ops.
pub fn init_logging(format: LogFormat) {
    LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(filter);
        match format {
            LogFormat::Json => registry.with(fmt::layer().json()).init(),
            LogFormat::Text => registry.with(fmt::layer().with_target(false)).init(),
        }
    });
}

/// Installs the Prometheus recorder once and returns its render handle.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    if let Some(handle) = PROMETHEUS.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install prometheus recorder: {e}"))?;
    describe_counter!(STORE_REQUESTS_TOTAL, "Store calls by operation and outcome");
    describe_histogram!(STORE_REQUEST_DURATION, "Store call duration in seconds");
    tracing::info!("prometheus metrics recorder installed");
    Ok(PROMETHEUS.get_or_init(|| handle).clone())
}

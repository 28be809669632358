//! HTTP handlers and the shared state they extract.

pub mod health;
pub mod tables;
pub mod whoami;

pub use health::{health_handler, liveness_handler, metrics_handler, readiness_handler};
pub use tables::{insert_row, read_rows, update_row};
pub use whoami::whoami_handler;

use std::sync::Arc;
use std::time::Instant;

use helpdesk_core::{IdentityProvider, TableStore};
use metrics_exporter_prometheus::PrometheusHandle;

use super::{NetworkConfig, ShutdownController};

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Every field is an `Arc` or `Copy`, so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Backend every table route reads from and writes to.
    pub store: Arc<dyn TableStore>,
    /// Resolves bearer credentials for the protected routes.
    pub identity: Arc<dyn IdentityProvider>,
    /// Health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Renders `/metrics`; `None` when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("health", &self.shutdown.health_state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Instant;

    use helpdesk_core::{Record, TableStore};

    use super::AppState;
    use crate::auth::OpenIdentityProvider;
    use crate::network::{NetworkConfig, ShutdownController};
    use crate::storage::MemoryStore;

    /// Memory store holding two tickets, one user, and an empty agents table.
    pub(crate) fn seeded_store() -> MemoryStore {
        MemoryStore::new()
            .with_rows(
                "tickets",
                "ticket_id",
                vec![
                    Record::new()
                        .with("ticket_id", 1)
                        .with("user_id", 1)
                        .with("status", "Open")
                        .with("description", "Printer jammed"),
                    Record::new()
                        .with("ticket_id", 2)
                        .with("user_id", 1)
                        .with("status", "Closed")
                        .with("description", "VPN drops"),
                ],
            )
            .and_then(|s| {
                s.with_rows(
                    "users",
                    "user_id",
                    vec![Record::new().with("user_id", 1).with("name", "Ada")],
                )
            })
            .and_then(|s| s.with_rows("agents", "agent_id", Vec::new()))
            .unwrap()
    }

    pub(crate) fn app_state(store: Arc<dyn TableStore>) -> AppState {
        AppState {
            store,
            identity: Arc::new(OpenIdentityProvider),
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(NetworkConfig::default()),
            metrics: None,
            start_time: Instant::now(),
        }
    }
}

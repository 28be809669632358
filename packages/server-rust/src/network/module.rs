//! Network module with deferred startup lifecycle.
//!
//! `new()` assembles shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until the shutdown future resolves.
//! Binding before serving lets callers learn an OS-assigned port first.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use helpdesk_core::{IdentityProvider, TableStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::handlers::{
    health_handler, insert_row, liveness_handler, metrics_handler, read_rows, readiness_handler,
    update_row, whoami_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::auth::require_identity;

/// How long `serve` waits for in-flight table requests after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Assembles the full route table.
///
/// Public:
/// - `GET /health`, `/health/live`, `/health/ready`
/// - `GET /metrics`
///
/// Behind [`require_identity`]:
/// - `GET /api/whoami`
/// - `POST /api/tables/{table}/read`
/// - `POST /api/tables/{table}` (insert)
/// - `PATCH /api/tables/{table}` (update by key)
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/whoami", get(whoami_handler))
        .route("/api/tables/{table}/read", post(read_rows))
        .route("/api/tables/{table}", post(insert_row).patch(update_row))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .merge(protected)
        .layer(build_http_layers(&state.config))
        .with_state(state)
}

/// Owns the listener and shared state of the HTTP server.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    store: Arc<dyn TableStore>,
    identity: Arc<dyn IdentityProvider>,
    metrics: Option<PrometheusHandle>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        store: Arc<dyn TableStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            config,
            listener: None,
            store,
            identity,
            metrics: None,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Exposes `/metrics` through `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    fn app_state(&self) -> AppState {
        AppState {
            store: Arc::clone(&self.store),
            identity: Arc::clone(&self.identity),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            metrics: self.metrics.clone(),
            start_time: Instant::now(),
        }
    }

    /// Binds the TCP listener and returns the bound port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(host = %self.config.host, port, "TCP listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until `shutdown` resolves or the
    /// [`ShutdownController`] is triggered, then drains in-flight table
    /// requests for up to 30 seconds.
    ///
    /// # Errors
    ///
    /// Returns an error on a fatal I/O error or bad TLS material.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .expect("start() must be called before serve()");
        let router = build_router(self.app_state());
        let controller = Arc::clone(&self.shutdown);

        controller.set_ready();

        let stop = {
            let controller = Arc::clone(&controller);
            async move {
                tokio::select! {
                    () = shutdown => {}
                    () = controller.wait_for_shutdown() => {}
                }
            }
        };

        if let Some(tls) = &self.config.tls {
            serve_tls(listener, router, tls, stop).await?;
        } else {
            info!("serving plain HTTP");
            axum::serve(listener, router)
                .with_graceful_shutdown(stop)
                .await?;
        }

        drain(&controller).await;
        Ok(())
    }
}

async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: &TlsConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS certificates: {e}"))?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        shutdown.await;
        shutdown_handle.graceful_shutdown(None);
    });

    info!(%addr, "serving TLS");
    axum_server::from_tcp_rustls(std_listener, rustls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

async fn drain(controller: &ShutdownController) {
    controller.trigger_shutdown();
    if controller.wait_for_drain(DRAIN_TIMEOUT).await {
        info!("all in-flight requests drained");
    } else {
        warn!(
            in_flight = controller.in_flight_count(),
            "drain timeout expired with requests remaining"
        );
    }
}

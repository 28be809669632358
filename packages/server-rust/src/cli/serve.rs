//! `helpdesk serve`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use helpdesk_core::TableStore;
use tracing::info;

use crate::auth::{identity_provider, AuthConfig};
use crate::config::ServerConfig;
use crate::network::{NetworkConfig, NetworkModule, TlsConfig, DEFAULT_LOGIN_PATH};
use crate::observability::init_metrics;
use crate::storage::{MemoryStore, MeteredStore};

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "HELPDESK_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on; 0 picks a free port.
    #[arg(long, env = "HELPDESK_PORT", default_value_t = 8080)]
    pub port: u16,

    /// JSON seed file for the in-memory store.
    #[arg(long, env = "HELPDESK_SEED")]
    pub seed: Option<PathBuf>,

    /// HS256 secret for bearer tokens. Without it every caller is anonymous.
    #[arg(long, env = "HELPDESK_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Redirect target for unauthenticated browser requests.
    #[arg(long, env = "HELPDESK_LOGIN_PATH", default_value = DEFAULT_LOGIN_PATH)]
    pub login_path: String,

    /// Allowed CORS origin; repeat for several. Defaults to any origin.
    #[arg(long = "cors-origin")]
    pub cors_origin: Vec<String>,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// TLS certificate (PEM); requires `--tls-key`.
    #[arg(long, requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// TLS private key (PEM).
    #[arg(long, requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    /// `PostgreSQL` URL; replaces the in-memory store.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Maximum pooled database connections.
    #[arg(long, default_value_t = 5)]
    pub max_connections: u32,
}

impl ServeArgs {
    #[must_use]
    pub fn config(&self) -> ServerConfig {
        let defaults = NetworkConfig::default();
        let tls = match (&self.tls_cert, &self.tls_key) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: cert.clone(),
                key_path: key.clone(),
            }),
            _ => None,
        };
        ServerConfig {
            network: NetworkConfig {
                host: self.host.clone(),
                port: self.port,
                tls,
                cors_origins: if self.cors_origin.is_empty() {
                    defaults.cors_origins
                } else {
                    self.cors_origin.clone()
                },
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                login_path: self.login_path.clone(),
            },
            auth: AuthConfig {
                jwt_secret: self.jwt_secret.clone(),
                leeway_secs: 0,
            },
            seed: self.seed.clone(),
            database_url: self.database_url.clone(),
            max_connections: self.max_connections,
        }
    }
}

async fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn TableStore>> {
    if let Some(url) = &config.database_url {
        return open_database(url, config.max_connections).await;
    }
    let store = match &config.seed {
        Some(path) => MemoryStore::load_seed(path)?,
        None => {
            info!("no seed file given; starting with an empty in-memory store");
            MemoryStore::new()
        }
    };
    Ok(Arc::new(store))
}

#[cfg(feature = "postgres")]
async fn open_database(url: &str, max_connections: u32) -> anyhow::Result<Arc<dyn TableStore>> {
    let store = crate::storage::PostgresStore::connect(url, max_connections).await?;
    info!("connected to PostgreSQL");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
#[allow(clippy::unused_async)]
async fn open_database(_url: &str, _max_connections: u32) -> anyhow::Result<Arc<dyn TableStore>> {
    anyhow::bail!("--database-url needs a build with the `postgres` feature")
}

/// Runs the server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the store cannot be opened, the port cannot be
/// bound, or the server fails.
pub async fn execute(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.config();
    let store: Arc<dyn TableStore> = Arc::new(MeteredStore::new(open_store(&config).await?));
    let identity = identity_provider(&config.auth);
    let metrics = init_metrics()?;

    let mut module = NetworkModule::new(config.network, store, identity).with_metrics(metrics);
    let port = module.start().await.context("failed to bind listener")?;
    info!(port, "helpdesk server listening");

    module
        .serve(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await
}

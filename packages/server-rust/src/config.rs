//! Server-wide configuration assembled from command-line arguments.

use std::path::PathBuf;

use crate::auth::AuthConfig;
use crate::network::NetworkConfig;

/// Everything `helpdesk serve` needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub auth: AuthConfig,
    /// JSON seed for the in-memory store.
    pub seed: Option<PathBuf>,
    /// `PostgreSQL` URL; when set the server uses the database instead of memory.
    pub database_url: Option<String>,
    /// Maximum pooled database connections.
    pub max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            auth: AuthConfig::default(),
            seed: None,
            database_url: None,
            max_connections: 5,
        }
    }
}

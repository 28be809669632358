//! Helpdesk Server — table API over axum, storage backends, identity
//! checks, an HTTP client store, and the `helpdesk` command line.

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod network;
pub mod observability;
pub mod storage;

pub use auth::{AuthConfig, JwtIdentityProvider, OpenIdentityProvider};
pub use client::HttpTableStore;
pub use config::ServerConfig;
pub use network::{build_router, NetworkConfig, NetworkModule};
pub use storage::{MemoryStore, MeteredStore};

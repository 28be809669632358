//! Caller identity: JWT verification, token issuance, and the axum
//! middleware that guards the table API.
//!
//! With a shared secret configured, callers must present an
//! `Authorization: Bearer <jwt>` header signed with HS256. Without one
//! the server runs open and every caller is the anonymous principal.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use axum::extract::{Request, State};
use axum::http::header::{ACCEPT, AUTHORIZATION};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use helpdesk_core::{IdentityProvider, Principal};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::network::error::ApiError;
use crate::network::AppState;

/// Principal id given to every caller when authentication is disabled.
pub const ANONYMOUS: &str = "anonymous";

/// Authentication settings.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// HS256 signing secret. `None` disables authentication.
    pub jwt_secret: Option<String>,
    /// Allowed clock skew when checking `exp`, in seconds.
    pub leeway_secs: u64,
}

/// JWT claims issued and accepted by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: u64,
}

/// Verifies HS256 bearer tokens.
pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    #[must_use]
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256];
        validation.leeway = leeway_secs;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl std::fmt::Debug for JwtIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentityProvider").finish_non_exhaustive()
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn identify(&self, bearer: Option<&str>) -> Option<Principal> {
        let token = bearer?;
        match decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => Some(Principal {
                id: data.claims.sub,
                roles: data.claims.roles,
            }),
            Err(err) => {
                debug!(error = %err, "rejected bearer token");
                None
            }
        }
    }
}

/// Accepts every caller as [`ANONYMOUS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenIdentityProvider;

impl IdentityProvider for OpenIdentityProvider {
    fn identify(&self, _bearer: Option<&str>) -> Option<Principal> {
        Some(Principal {
            id: ANONYMOUS.to_string(),
            roles: Vec::new(),
        })
    }
}

/// Picks the identity provider for `config`.
#[must_use]
pub fn identity_provider(config: &AuthConfig) -> Arc<dyn IdentityProvider> {
    match config.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
        Some(secret) => Arc::new(JwtIdentityProvider::new(secret, config.leeway_secs)),
        None => {
            warn!("no JWT secret configured; authentication is disabled");
            Arc::new(OpenIdentityProvider)
        }
    }
}

/// Signs a token for `sub` that expires after `ttl`.
///
/// # Errors
///
/// Returns an error if the system clock is before the Unix epoch, the
/// expiry does not fit in a timestamp, or signing fails.
pub fn issue_token(
    secret: &str,
    sub: &str,
    roles: Vec<String>,
    ttl: Duration,
) -> anyhow::Result<String> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?;
    let exp = now
        .checked_add(ttl)
        .with_context(|| format!("token lifetime of {}s is too long", ttl.as_secs()))?;
    let claims = Claims {
        sub: sub.to_string(),
        roles,
        exp: exp.as_secs(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// Resolves the caller and stores the [`Principal`] as a request extension.
///
/// Unauthenticated browser requests are redirected (303) to the login
/// path; everything else gets a 401 JSON error.
pub async fn require_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = state.identity.identify(bearer_token(request.headers()));
    match principal {
        Some(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        None if wants_html(request.headers()) => {
            debug!(path = %request.uri().path(), "redirecting unauthenticated caller");
            Redirect::to(&state.config.login_path).into_response()
        }
        None => ApiError::Unauthenticated.into_response(),
    }
}

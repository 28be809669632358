use axum::{Extension, Json};
use helpdesk_core::Principal;

/// Echoes the principal resolved by the identity middleware.
pub async fn whoami_handler(Extension(principal): Extension<Principal>) -> Json<Principal> {
    Json(principal)
}

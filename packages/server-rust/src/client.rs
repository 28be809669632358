//! [`TableStore`] over the server's HTTP table API.
//!
//! Lets the core components (and the CLI) run against a remote server
//! exactly as they would against a local store.

use std::time::Duration;

use async_trait::async_trait;
use helpdesk_core::{ReadRequest, Record, StoreError, TableStore, Value};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::network::error::{self, ErrorResponse};
use crate::network::handlers::tables::{InsertRowBody, RowResponse, RowsResponse, UpdateRowBody};

/// HTTP client for `/api/tables/...`.
#[derive(Debug, Clone)]
pub struct HttpTableStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTableStore {
    /// Creates a client for the server at `base_url`, e.g. `http://127.0.0.1:8080`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to create HTTP client: {e}"))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/api/tables/{table}", self.base_url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    response
        .json()
        .await
        .map_err(|e| StoreError::Unavailable(format!("malformed response: {e}")))
}

/// Rebuilds the store error the server reported.
async fn into_store_error(
    response: Response,
    table: &str,
    key: Option<(&str, &Value)>,
) -> StoreError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(body) => (body.error.code, body.error.message),
        Err(_) => (String::new(), format!("HTTP {status}: {text}")),
    };
    debug!(table, %status, %code, "table API error");

    match (code.as_str(), status) {
        (error::NOT_FOUND, _) => StoreError::NotFound {
            table: table.to_string(),
        },
        (error::ROW_NOT_FOUND, _) => match key {
            Some((column, value)) => StoreError::RowNotFound {
                table: table.to_string(),
                column: column.to_string(),
                value: value.to_string(),
            },
            None => StoreError::rejected(message),
        },
        (error::INVALID_IDENTIFIER, _) | (_, StatusCode::BAD_REQUEST) => {
            StoreError::InvalidIdentifier(message)
        }
        (error::REJECTED, _) | (_, StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY) => {
            StoreError::rejected(message)
        }
        _ => StoreError::Unavailable(message),
    }
}

#[async_trait]
impl TableStore for HttpTableStore {
    async fn read(&self, table: &str, request: &ReadRequest) -> Result<Vec<Record>, StoreError> {
        let url = format!("{}/read", self.table_url(table));
        let response = self.send(self.client.post(url).json(request)).await?;
        if !response.status().is_success() {
            return Err(into_store_error(response, table, None).await);
        }
        let body: RowsResponse = parse(response).await?;
        Ok(body.rows)
    }

    async fn insert(&self, table: &str, fields: Record) -> Result<(), StoreError> {
        let body = InsertRowBody { fields };
        let response = self
            .send(self.client.post(self.table_url(table)).json(&body))
            .await?;
        if !response.status().is_success() {
            return Err(into_store_error(response, table, None).await);
        }
        Ok(())
    }

    async fn update_by_key(
        &self,
        table: &str,
        key_column: &str,
        key_value: &Value,
        fields: Record,
    ) -> Result<Record, StoreError> {
        let body = UpdateRowBody {
            key_column: key_column.to_string(),
            key_value: key_value.clone(),
            fields,
        };
        let response = self
            .send(self.client.patch(self.table_url(table)).json(&body))
            .await?;
        if !response.status().is_success() {
            return Err(into_store_error(response, table, Some((key_column, key_value))).await);
        }
        let body: RowResponse = parse(response).await?;
        Ok(body.row)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use helpdesk_core::Predicate;

    use super::*;
    use crate::auth::OpenIdentityProvider;
    use crate::network::handlers::test_support::seeded_store;
    use crate::network::{NetworkConfig, NetworkModule};

    /// Serves the seeded store on an ephemeral port and returns its base URL.
    async fn spawn_server() -> String {
        let mut module = NetworkModule::new(
            NetworkConfig {
                host: "127.0.0.1".to_string(),
                ..NetworkConfig::default()
            },
            Arc::new(seeded_store()),
            Arc::new(OpenIdentityProvider),
        );
        let port = module.start().await.unwrap();
        tokio::spawn(module.serve(std::future::pending::<()>()));
        format!("http://127.0.0.1:{port}")
    }

    #[tokio::test]
    async fn reads_and_updates_through_http() {
        let store = HttpTableStore::new(spawn_server().await, None).unwrap();

        let rows = store
            .read(
                "tickets",
                &ReadRequest::matching(Predicate::contains("status", "closed")),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        let row = store
            .update_by_key(
                "tickets",
                "ticket_id",
                &Value::Int(2),
                Record::new().with("status", "Open"),
            )
            .await
            .unwrap();
        assert_eq!(row.get("status"), Some(&Value::from("Open")));
    }

    #[tokio::test]
    async fn server_errors_map_back_to_store_errors() {
        let store = HttpTableStore::new(spawn_server().await, None).unwrap();

        assert_eq!(
            store.read("emails", &ReadRequest::all()).await,
            Err(StoreError::NotFound {
                table: "emails".into()
            })
        );
        assert!(matches!(
            store
                .update_by_key("tickets", "ticket_id", &Value::Int(99), Record::new())
                .await,
            Err(StoreError::RowNotFound { .. })
        ));
        assert!(matches!(
            store
                .insert("tickets", Record::new().with("ticket_id", 1))
                .await,
            Err(StoreError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let store = HttpTableStore::new("http://127.0.0.1:9", None).unwrap();
        assert!(matches!(
            store.read("tickets", &ReadRequest::all()).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}

use async_trait::async_trait;

use crate::error::StoreError;
use crate::filter::ReadRequest;
use crate::types::{Principal, Record, Value};

/// Generic tabular data store, addressed by table name.
///
/// The core never assumes a schema: every call names the table and
/// returns open-ended [`Record`]s. Implementations: in-memory, `PostgreSQL`,
/// and an HTTP client for a remote store.
///
/// Handed to each component at construction as `Arc<dyn TableStore>`.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Reads rows of `table` in store order, filtered and limited per `request`.
    async fn read(&self, table: &str, request: &ReadRequest) -> Result<Vec<Record>, StoreError>;

    /// Inserts one row. Columns the caller leaves out get store defaults.
    async fn insert(&self, table: &str, fields: Record) -> Result<(), StoreError>;

    /// Replaces the mutable fields of the row whose `key_column` equals
    /// `key_value` and returns the stored row as the store now sees it.
    async fn update_by_key(
        &self,
        table: &str,
        key_column: &str,
        key_value: &Value,
        fields: Record,
    ) -> Result<Record, StoreError>;
}

/// Authenticated identity check.
///
/// `None` means the caller is not authenticated and must be sent to the
/// login surface.
pub trait IdentityProvider: Send + Sync {
    /// Resolves a bearer credential (if any) to a principal.
    fn identify(&self, bearer: Option<&str>) -> Option<Principal>;
}

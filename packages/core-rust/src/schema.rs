//! Column inference for tables with no declared schema.
//!
//! A table's column list is derived from one sampled row: the keys of
//! that row, in the row's own order. The order is load-bearing, it is
//! the header order for the life of the view.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::filter::ReadRequest;
use crate::traits::TableStore;
use crate::types::Record;

/// Header shown in place of columns when a table has no rows to infer from.
pub const NO_DATA_HEADER: &str = "No Data";

/// Inferred identity and column list of one backend table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table identifier as the store knows it.
    pub name: String,
    /// Column names in sampled-row order.
    pub columns: Vec<String>,
    /// Column used as the update key, `None` when no columns are known.
    pub key_column: Option<String>,
}

impl TableDescriptor {
    /// Builds a descriptor from an explicit column list.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        let name = name.into();
        let key_column = infer_key_column(&name, &columns);
        Self {
            name,
            columns,
            key_column,
        }
    }

    /// Infers columns from the first row of an already-fetched result,
    /// without another store call.
    #[must_use]
    pub fn from_first_row(name: impl Into<String>, rows: &[Record]) -> Self {
        let columns = rows
            .first()
            .map(|row| row.columns().map(str::to_string).collect())
            .unwrap_or_default();
        Self::new(name, columns)
    }

    /// Overrides the inferred key column.
    #[must_use]
    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = Some(column.into());
        self
    }

    /// Whether no columns could be inferred.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column headers, or the single "no data" placeholder.
    #[must_use]
    pub fn headers(&self) -> Vec<String> {
        if self.columns.is_empty() {
            placeholder_headers()
        } else {
            self.columns.clone()
        }
    }
}

/// Header row shown for a table with no inferable columns.
#[must_use]
pub fn placeholder_headers() -> Vec<String> {
    vec![NO_DATA_HEADER.to_string()]
}

/// Samples at most one row of `table` and derives its descriptor.
///
/// An empty table yields an empty column list.
///
/// # Errors
///
/// Returns the store's error unchanged; no columns are inferred.
pub async fn infer_descriptor(
    store: &dyn TableStore,
    table: &str,
) -> Result<TableDescriptor, StoreError> {
    let sample = store.read(table, &ReadRequest::sample()).await?;
    let descriptor = TableDescriptor::from_first_row(table, &sample);
    debug!(
        table,
        columns = descriptor.columns.len(),
        "inferred table columns from sample row"
    );
    Ok(descriptor)
}

/// Picks the update key for a table.
///
/// `<table without trailing s>_id` (`tickets` -> `ticket_id`), then `id`,
/// then the first column.
#[must_use]
pub fn infer_key_column(table: &str, columns: &[String]) -> Option<String> {
    let lowered = table.to_lowercase();
    let singular = lowered.strip_suffix('s').unwrap_or(&lowered);
    let conventional = format!("{singular}_id");
    let found = [conventional.as_str(), "id"]
        .into_iter()
        .find_map(|candidate| columns.iter().find(|c| c.as_str() == candidate))
        .or_else(|| columns.first())
        .cloned();
    found
}

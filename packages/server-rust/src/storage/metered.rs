//! Store wrapper that counts and times every call.
//!
//! Emits `helpdesk_store_requests_total{op, outcome}` and
//! `helpdesk_store_request_duration_seconds{op}` through the `metrics`
//! facade, plus a debug event per call.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use helpdesk_core::{ReadRequest, Record, StoreError, TableStore, Value};
use metrics::{counter, histogram};
use tracing::{debug, warn};

/// Counter of store calls, labelled by `op` and `outcome`.
pub const STORE_REQUESTS_TOTAL: &str = "helpdesk_store_requests_total";

/// Histogram of store call durations, labelled by `op`.
pub const STORE_REQUEST_DURATION: &str = "helpdesk_store_request_duration_seconds";

/// Wraps any [`TableStore`] with request metrics.
#[derive(Clone)]
pub struct MeteredStore {
    inner: Arc<dyn TableStore>,
}

impl MeteredStore {
    #[must_use]
    pub fn new(inner: Arc<dyn TableStore>) -> Self {
        Self { inner }
    }
}

impl std::fmt::Debug for MeteredStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeteredStore").finish_non_exhaustive()
    }
}

fn outcome_label(err: &StoreError) -> &'static str {
    match err {
        StoreError::NotFound { .. } | StoreError::RowNotFound { .. } => "not_found",
        StoreError::InvalidIdentifier(_) => "invalid",
        StoreError::Rejected { .. } => "rejected",
        StoreError::Unavailable(_) => "unavailable",
    }
}

fn record<T>(op: &'static str, table: &str, start: Instant, result: &Result<T, StoreError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(err) => {
            warn!(op, table, error = %err, "store call failed");
            outcome_label(err)
        }
    };
    let elapsed = start.elapsed().as_secs_f64();
    counter!(STORE_REQUESTS_TOTAL, "op" => op, "outcome" => outcome).increment(1);
    histogram!(STORE_REQUEST_DURATION, "op" => op).record(elapsed);
    debug!(op, table, outcome, elapsed_secs = elapsed, "store call complete");
}

#[async_trait]
impl TableStore for MeteredStore {
    async fn read(&self, table: &str, request: &ReadRequest) -> Result<Vec<Record>, StoreError> {
        let start = Instant::now();
        let result = self.inner.read(table, request).await;
        record("read", table, start, &result);
        result
    }

    async fn insert(&self, table: &str, fields: Record) -> Result<(), StoreError> {
        let start = Instant::now();
        let result = self.inner.insert(table, fields).await;
        record("insert", table, start, &result);
        result
    }

    async fn update_by_key(
        &self,
        table: &str,
        key_column: &str,
        key_value: &Value,
        fields: Record,
    ) -> Result<Record, StoreError> {
        let start = Instant::now();
        let result = self
            .inner
            .update_by_key(table, key_column, key_value, fields)
            .await;
        record("update", table, start, &result);
        result
    }
}

//! In-memory store with call accounting and injectable failures, for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::filter::ReadRequest;
use crate::traits::TableStore;
use crate::types::{Record, Value};

/// Arguments of one `update_by_key` call.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UpdateCall {
    pub table: String,
    pub key_column: String,
    pub key_value: Value,
    pub fields: Record,
}

#[derive(Default)]
pub(crate) struct ScriptedStore {
    tables: Mutex<HashMap<String, Vec<Record>>>,
    read_failures: Mutex<Vec<StoreError>>,
    read_answers: Mutex<Vec<Vec<Record>>>,
    update_failures: Mutex<Vec<StoreError>>,
    pub reads: AtomicUsize,
    pub inserts: AtomicUsize,
    pub updates: Mutex<Vec<UpdateCall>>,
    pub requests: Mutex<Vec<ReadRequest>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, table: &str, rows: Vec<Record>) -> Self {
        self.tables
            .lock()
            .unwrap()
            .insert(table.to_string(), rows);
        self
    }

    pub fn fail_next_read(&self, err: StoreError) {
        self.read_failures.lock().unwrap().push(err);
    }

    /// Makes the next read return `rows` regardless of the table contents.
    pub fn answer_next_read(&self, rows: Vec<Record>) {
        self.read_answers.lock().unwrap().push(rows);
    }

    pub fn fail_next_update(&self, err: StoreError) {
        self.update_failures.lock().unwrap().push(err);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> Vec<UpdateCall> {
        self.updates.lock().unwrap().clone()
    }

    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

/// Ticket rows used throughout the tests.
pub(crate) fn ticket_rows() -> Vec<Record> {
    vec![
        Record::new().with("ticket_id", 1).with("status", "Open"),
        Record::new().with("ticket_id", 2).with("status", "Closed"),
    ]
}

#[async_trait]
impl TableStore for ScriptedStore {
    async fn read(&self, table: &str, request: &ReadRequest) -> Result<Vec<Record>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(err) = self.read_failures.lock().unwrap().pop() {
            return Err(err);
        }
        if let Some(rows) = self.read_answers.lock().unwrap().pop() {
            return Ok(rows);
        }
        let tables = self.tables.lock().unwrap();
        let rows = tables.get(table).ok_or_else(|| StoreError::NotFound {
            table: table.to_string(),
        })?;
        Ok(request.apply(rows))
    }

    async fn insert(&self, table: &str, fields: Record) -> Result<(), StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(fields);
        Ok(())
    }

    async fn update_by_key(
        &self,
        table: &str,
        key_column: &str,
        key_value: &Value,
        fields: Record,
    ) -> Result<Record, StoreError> {
        self.updates.lock().unwrap().push(UpdateCall {
            table: table.to_string(),
            key_column: key_column.to_string(),
            key_value: key_value.clone(),
            fields: fields.clone(),
        });
        if let Some(err) = self.update_failures.lock().unwrap().pop() {
            return Err(err);
        }
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .get_mut(table)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| row.get(key_column).is_some_and(|v| v.same_key(key_value)))
            })
            .ok_or_else(|| StoreError::RowNotFound {
                table: table.to_string(),
                column: key_column.to_string(),
                value: key_value.to_string(),
            })?;
        for (column, value) in fields.iter() {
            row.set(column, value.clone());
        }
        Ok(row.clone())
    }
}

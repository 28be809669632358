//! In-memory [`TableStore`] backed by [`DashMap`].
//!
//! Each table owns its rows in insertion order, a key column, and a
//! serial counter used to fill in the key on insert. Good enough for
//! development, demos, and tests; nothing is persisted.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use helpdesk_core::filter::validate_identifier;
use helpdesk_core::{ReadRequest, Record, StoreError, TableStore, Value};
use serde::Deserialize;
use tracing::{debug, info};

/// Rows and key bookkeeping for one table.
#[derive(Debug, Clone)]
struct TableData {
    key_column: String,
    rows: Vec<Record>,
    /// `None` once the serial has passed `i64::MAX`.
    next_serial: Option<i64>,
}

impl TableData {
    fn new(key_column: String, rows: Vec<Record>) -> Self {
        let next_serial = rows
            .iter()
            .filter_map(|row| match row.get(&key_column) {
                Some(Value::Int(n)) => Some(*n),
                _ => None,
            })
            .max()
            .map_or(Some(1), |max| max.checked_add(1));
        Self {
            key_column,
            rows,
            next_serial,
        }
    }

    /// Columns of the table, known once it holds at least one row.
    fn columns(&self) -> Option<Vec<String>> {
        self.rows
            .first()
            .map(|row| row.columns().map(str::to_string).collect())
    }

    fn check_columns<'a>(
        &self,
        table: &str,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), StoreError> {
        let Some(known) = self.columns() else {
            return Ok(());
        };
        for name in names {
            validate_identifier(name)?;
            if !known.iter().any(|c| c == name) {
                return Err(StoreError::rejected(format!(
                    "column \"{name}\" of relation \"{table}\" does not exist"
                )));
            }
        }
        Ok(())
    }

    fn has_key(&self, key: &Value) -> bool {
        self.rows
            .iter()
            .any(|row| row.get(&self.key_column).is_some_and(|v| v.same_key(key)))
    }
}

/// Seed document accepted by [`MemoryStore::load_seed`].
#[derive(Debug, Deserialize)]
struct SeedFile {
    tables: BTreeMap<String, SeedTable>,
}

#[derive(Debug, Deserialize)]
struct SeedTable {
    key: String,
    #[serde(default)]
    rows: Vec<Record>,
}

/// Concurrent in-memory table store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<String, TableData>,
}

impl MemoryStore {
    /// Creates an empty store with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or empties) `table` with `key_column` as its update key.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidIdentifier`] if either name is not a plain identifier.
    pub fn create_table(&self, table: &str, key_column: &str) -> Result<(), StoreError> {
        self.replace_table(table, key_column, Vec::new())
    }

    /// Replaces the contents of `table` with `rows`.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidIdentifier`] if either name is not a plain identifier.
    pub fn replace_table(
        &self,
        table: &str,
        key_column: &str,
        rows: Vec<Record>,
    ) -> Result<(), StoreError> {
        validate_identifier(table)?;
        validate_identifier(key_column)?;
        self.tables
            .insert(table.to_string(), TableData::new(key_column.to_string(), rows));
        Ok(())
    }

    /// Builder form of [`replace_table`](Self::replace_table) for fixtures.
    ///
    /// # Errors
    ///
    /// Same as [`replace_table`](Self::replace_table).
    pub fn with_rows(
        self,
        table: &str,
        key_column: &str,
        rows: Vec<Record>,
    ) -> Result<Self, StoreError> {
        self.replace_table(table, key_column, rows)?;
        Ok(self)
    }

    /// Loads tables from a JSON seed file:
    /// `{ "tables": { "<name>": { "key": "<column>", "rows": [ {...} ] } } }`.
    ///
    /// Column order inside each row object is preserved.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or names an
    /// invalid identifier.
    pub fn load_seed(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        let seed: SeedFile = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse seed file {}", path.display()))?;

        let store = Self::new();
        for (name, table) in seed.tables {
            let count = table.rows.len();
            store
                .replace_table(&name, &table.key, table.rows)
                .with_context(|| format!("invalid seed table {name}"))?;
            info!(table = %name, rows = count, "seeded table");
        }
        Ok(store)
    }

    /// Names of all tables, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn not_found(table: &str) -> StoreError {
        StoreError::NotFound {
            table: table.to_string(),
        }
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn read(&self, table: &str, request: &ReadRequest) -> Result<Vec<Record>, StoreError> {
        validate_identifier(table)?;
        let data = self.tables.get(table).ok_or_else(|| Self::not_found(table))?;
        if let Some(filter) = &request.filter {
            filter.validate()?;
            data.check_columns(table, filter.terms().iter().map(|t| t.column.as_str()))?;
        }
        let rows = request.apply(&data.rows);
        debug!(table, returned = rows.len(), "memory read");
        Ok(rows)
    }

    async fn insert(&self, table: &str, fields: Record) -> Result<(), StoreError> {
        validate_identifier(table)?;
        let mut data = self
            .tables
            .get_mut(table)
            .ok_or_else(|| Self::not_found(table))?;
        data.check_columns(table, fields.columns())?;
        for column in fields.columns() {
            validate_identifier(column)?;
        }

        let key_column = data.key_column.clone();
        let key = match fields.get(&key_column) {
            Some(value) if !value.is_null() => value.clone(),
            _ => Value::Int(data.next_serial.ok_or_else(|| {
                StoreError::rejected(format!(
                    "nextval: reached maximum value of sequence \"{table}_{key_column}_seq\""
                ))
            })?),
        };
        if data.has_key(&key) {
            return Err(StoreError::rejected(format!(
                "duplicate key value violates unique constraint \"{table}_pkey\""
            )));
        }
        if let Value::Int(n) = &key {
            data.next_serial = data
                .next_serial
                .and_then(|next| n.checked_add(1).map(|after| next.max(after)));
        }

        let columns = data.columns().unwrap_or_else(|| {
            std::iter::once(key_column.clone())
                .chain(
                    fields
                        .columns()
                        .filter(|c| *c != key_column)
                        .map(str::to_string),
                )
                .collect()
        });
        let row: Record = columns
            .into_iter()
            .map(|column| {
                let value = if column == key_column {
                    key.clone()
                } else {
                    fields.get(&column).cloned().unwrap_or(Value::Null)
                };
                (column, value)
            })
            .collect();

        debug!(table, key = %key, "memory insert");
        data.rows.push(row);
        Ok(())
    }

    async fn update_by_key(
        &self,
        table: &str,
        key_column: &str,
        key_value: &Value,
        fields: Record,
    ) -> Result<Record, StoreError> {
        validate_identifier(table)?;
        validate_identifier(key_column)?;
        let mut data = self
            .tables
            .get_mut(table)
            .ok_or_else(|| Self::not_found(table))?;
        data.check_columns(table, fields.columns())?;

        let row = data
            .rows
            .iter_mut()
            .find(|row| row.get(key_column).is_some_and(|v| v.same_key(key_value)))
            .ok_or_else(|| StoreError::RowNotFound {
                table: table.to_string(),
                column: key_column.to_string(),
                value: key_value.to_string(),
            })?;

        for (column, value) in fields.iter() {
            if column != key_column {
                row.set(column, value.clone());
            }
        }
        debug!(table, key = %key_value, "memory update");
        Ok(row.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_core::Predicate;
    use proptest::prelude::*;
    use std::io::Write;

    fn tickets() -> MemoryStore {
        MemoryStore::new()
            .with_rows(
                "tickets",
                "ticket_id",
                vec![
                    Record::new()
                        .with("ticket_id", 1)
                        .with("status", "Open")
                        .with("description", "Printer jammed"),
                    Record::new()
                        .with("ticket_id", 2)
                        .with("status", "Closed")
                        .with("description", Value::Null),
                ],
            )
            .unwrap()
    }

    #[tokio::test]
    async fn read_filters_and_limits_in_insertion_order() {
        let store = tickets();

        let all = store.read("tickets", &ReadRequest::all()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].get("ticket_id"), Some(&Value::Int(1)));

        let sample = store.read("tickets", &ReadRequest::sample()).await.unwrap();
        assert_eq!(sample.len(), 1);

        let hits = store
            .read(
                "tickets",
                &ReadRequest::matching(Predicate::contains("description", "PRINTER")),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn unknown_table_and_bad_identifiers() {
        let store = tickets();
        assert_eq!(
            store.read("nope", &ReadRequest::all()).await,
            Err(StoreError::NotFound {
                table: "nope".into()
            })
        );
        assert!(matches!(
            store.read("tickets; drop", &ReadRequest::all()).await,
            Err(StoreError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            store
                .read(
                    "tickets",
                    &ReadRequest::matching(Predicate::contains("missing", "x"))
                )
                .await,
            Err(StoreError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn largest_key_exhausts_the_serial_without_overflow() {
        let store = tickets();
        store
            .insert("tickets", Record::new().with("ticket_id", i64::MAX))
            .await
            .unwrap();

        let err = store
            .insert("tickets", Record::new().with("status", "Open"))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "nextval: reached maximum value of sequence \"tickets_ticket_id_seq\""
        );

        store
            .insert("tickets", Record::new().with("ticket_id", 3))
            .await
            .unwrap();
        let all = store.read("tickets", &ReadRequest::all()).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn insert_assigns_serial_key_and_fills_missing_columns() {
        let store = tickets();
        store
            .insert("tickets", Record::new().with("status", "Open"))
            .await
            .unwrap();

        let rows = store.read("tickets", &ReadRequest::all()).await.unwrap();
        let added = &rows[2];
        assert_eq!(added.get("ticket_id"), Some(&Value::Int(3)));
        assert_eq!(added.get("description"), Some(&Value::Null));
        assert_eq!(
            added.columns().collect::<Vec<_>>(),
            vec!["ticket_id", "status", "description"]
        );
    }

    #[tokio::test]
    async fn insert_rejects_duplicates_and_unknown_columns() {
        let store = tickets();
        let dup = store
            .insert("tickets", Record::new().with("ticket_id", 2))
            .await
            .unwrap_err();
        assert!(dup.to_string().contains("duplicate key"));

        let unknown = store
            .insert("tickets", Record::new().with("colour", "red"))
            .await
            .unwrap_err();
        assert_eq!(
            unknown.to_string(),
            "column \"colour\" of relation \"tickets\" does not exist"
        );
    }

    #[tokio::test]
    async fn insert_into_empty_table_puts_key_first() {
        let store = MemoryStore::new();
        store.create_table("agents", "agent_id").unwrap();
        store
            .insert("agents", Record::new().with("name", "Grace"))
            .await
            .unwrap();
        let rows = store.read("agents", &ReadRequest::all()).await.unwrap();
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["agent_id", "name"]);
        assert_eq!(rows[0].get("agent_id"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn update_by_key_returns_canonical_row() {
        let store = tickets();
        let row = store
            .update_by_key(
                "tickets",
                "ticket_id",
                &Value::from("2"),
                Record::new().with("status", "Open").with("ticket_id", 99),
            )
            .await
            .unwrap();
        assert_eq!(row.get("status"), Some(&Value::from("Open")));
        assert_eq!(row.get("ticket_id"), Some(&Value::Int(2)));

        let missing = store
            .update_by_key("tickets", "ticket_id", &Value::Int(7), Record::new())
            .await
            .unwrap_err();
        assert!(matches!(missing, StoreError::RowNotFound { .. }));
    }

    #[tokio::test]
    async fn load_seed_preserves_column_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"tables":{{"users":{{"key":"user_id","rows":[{{"user_id":1,"name":"Ada","email_address":"ada@example.com"}}]}},"agents":{{"key":"agent_id"}}}}}}"#
        )
        .unwrap();

        let store = MemoryStore::load_seed(file.path()).unwrap();
        assert_eq!(store.table_names(), vec!["agents", "users"]);

        let rows = store.read("users", &ReadRequest::all()).await.unwrap();
        assert_eq!(
            rows[0].columns().collect::<Vec<_>>(),
            vec!["user_id", "name", "email_address"]
        );
        assert!(store
            .read("agents", &ReadRequest::all())
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn load_seed_reports_bad_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = MemoryStore::load_seed(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse seed file"));
    }

    proptest! {
        #[test]
        fn filtered_reads_only_return_matching_rows(
            descriptions in proptest::collection::vec(proptest::option::of("[a-zA-Z %_]{0,12}"), 0..12),
            needle in "[a-zA-Z%_]{1,3}",
        ) {
            let rows: Vec<Record> = descriptions
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    Record::new()
                        .with("ticket_id", i64::try_from(i).unwrap())
                        .with("description", d.clone())
                })
                .collect();
            let store = MemoryStore::new().with_rows("tickets", "ticket_id", rows).unwrap();
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let hits = runtime
                .block_on(store.read(
                    "tickets",
                    &ReadRequest::matching(Predicate::contains("description", needle.clone())),
                ))
                .unwrap();

            let expected = descriptions
                .iter()
                .flatten()
                .filter(|d| d.to_lowercase().contains(&needle.to_lowercase()))
                .count();
            prop_assert_eq!(hits.len(), expected);
        }
    }
}

//! `PostgreSQL` [`TableStore`] backed by an `sqlx` connection pool.
//!
//! Table and column names come from callers at runtime, so every name is
//! checked with [`validate_identifier`] and then double-quoted before it
//! is spliced into SQL. Values always travel as bind parameters.
//!
//! Rows are fetched as `row_to_json(t)::text` so the column order follows
//! the table definition and the text parses straight into a [`Record`].

use anyhow::Context;
use async_trait::async_trait;
use helpdesk_core::filter::validate_identifier;
use helpdesk_core::{ReadRequest, Record, StoreError, TableStore, Value};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

/// Undefined table.
const UNDEFINED_TABLE: &str = "42P01";

/// Table store over a `PostgreSQL` database.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reached.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("failed to connect to PostgreSQL")?;
        Ok(Self::new(pool))
    }
}

fn quote(identifier: &str) -> Result<String, StoreError> {
    validate_identifier(identifier)?;
    Ok(format!("\"{identifier}\""))
}

/// `%needle%` with LIKE metacharacters escaped, for `ESCAPE '\'`.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Builds the SELECT for `request` and the bind values it needs, in order.
fn select_sql(table: &str, request: &ReadRequest) -> Result<(String, Vec<String>), StoreError> {
    let mut sql = format!("SELECT row_to_json(t)::text FROM {} AS t", quote(table)?);
    let mut binds = Vec::new();

    if let Some(filter) = &request.filter {
        let mut clauses = Vec::with_capacity(filter.terms().len());
        for term in filter.terms() {
            binds.push(like_pattern(&term.needle));
            clauses.push(format!(
                "t.{}::text ILIKE ${} ESCAPE '\\'",
                quote(&term.column)?,
                binds.len()
            ));
        }
        if clauses.is_empty() {
            sql.push_str(" WHERE FALSE");
        } else {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" OR "));
        }
    }
    if let Some(limit) = request.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    Ok((sql, binds))
}

fn quoted_columns(fields: &Record) -> Result<Vec<String>, StoreError> {
    fields.columns().map(quote).collect()
}

fn parse_row(text: &str) -> Result<Record, StoreError> {
    serde_json::from_str(text)
        .map_err(|e| StoreError::Unavailable(format!("malformed row from database: {e}")))
}

fn payload(fields: &Record) -> Result<String, StoreError> {
    serde_json::to_string(fields).map_err(|e| StoreError::rejected(e.to_string()))
}

fn map_sqlx_error(table: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db) => {
            if db.code().as_deref() == Some(UNDEFINED_TABLE) {
                StoreError::NotFound {
                    table: table.to_string(),
                }
            } else {
                StoreError::rejected(db.message())
            }
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl TableStore for PostgresStore {
    async fn read(&self, table: &str, request: &ReadRequest) -> Result<Vec<Record>, StoreError> {
        let (sql, binds) = select_sql(table, request)?;
        debug!(table, %sql, "postgres read");

        let mut query = sqlx::query_scalar::<_, String>(&sql);
        for bind in binds {
            query = query.bind(bind);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(table, e))?;
        rows.iter().map(String::as_str).map(parse_row).collect()
    }

    async fn insert(&self, table: &str, fields: Record) -> Result<(), StoreError> {
        let target = quote(table)?;
        let columns = quoted_columns(&fields)?;

        let result = if columns.is_empty() {
            let sql = format!("INSERT INTO {target} DEFAULT VALUES");
            sqlx::query(&sql).execute(&self.pool).await
        } else {
            let list = columns.join(", ");
            let sql = format!(
                "INSERT INTO {target} ({list}) \
                 SELECT {list} FROM json_populate_record(NULL::{target}, $1::json)"
            );
            sqlx::query(&sql)
                .bind(payload(&fields)?)
                .execute(&self.pool)
                .await
        };
        result.map_err(|e| map_sqlx_error(table, e))?;
        debug!(table, "postgres insert");
        Ok(())
    }

    async fn update_by_key(
        &self,
        table: &str,
        key_column: &str,
        key_value: &Value,
        fields: Record,
    ) -> Result<Record, StoreError> {
        let target = quote(table)?;
        let key = quote(key_column)?;
        let not_found = || StoreError::RowNotFound {
            table: table.to_string(),
            column: key_column.to_string(),
            value: key_value.to_string(),
        };
        let Some(key_text) = key_value.search_text() else {
            return Err(not_found());
        };

        let fields = fields.without(key_column);
        let assignments: Vec<String> = quoted_columns(&fields)?
            .into_iter()
            .map(|column| format!("{column} = r.{column}"))
            .collect();

        let row = if assignments.is_empty() {
            let sql = format!("SELECT row_to_json(t)::text FROM {target} AS t WHERE t.{key}::text = $1");
            sqlx::query_scalar::<_, String>(&sql)
                .bind(key_text)
                .fetch_optional(&self.pool)
                .await
        } else {
            let sql = format!(
                "UPDATE {target} AS t SET {} \
                 FROM json_populate_record(NULL::{target}, $1::json) AS r \
                 WHERE t.{key}::text = $2 \
                 RETURNING row_to_json(t)::text",
                assignments.join(", ")
            );
            sqlx::query_scalar::<_, String>(&sql)
                .bind(payload(&fields)?)
                .bind(key_text)
                .fetch_optional(&self.pool)
                .await
        }
        .map_err(|e| map_sqlx_error(table, e))?;

        let row = row.ok_or_else(not_found)?;
        debug!(table, key = %key_value, "postgres update");
        parse_row(&row)
    }
}

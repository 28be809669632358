//! Search engine: turns a free-text query and a column selector into a
//! store read, and owns the result set that a table view displays.
//!
//! Reads are issued with a [`RequestToken`]. Only the completion of the
//! most recently issued request is applied; an older response that
//! arrives late is reported as [`Completion::Stale`] and dropped, so a
//! slow "all columns" search can never overwrite a newer result.
//!
//! Failures are fail-safe: the previous result set stays in place and the
//! message is kept in [`SearchState::last_error`].

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::filter::{contains_ignore_case, ContainsTerm, Predicate, ReadRequest};
use crate::traits::TableStore;
use crate::types::{Record, Value};

/// Which columns a query is matched against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnSelector {
    /// Every known column, OR-ed together.
    #[default]
    All,
    /// A single named column.
    Column(String),
}

impl ColumnSelector {
    /// Label of the "all columns" choice in a column picker.
    pub const ALL_LABEL: &'static str = "All";

    /// Parses a picker label; `"All"` is the sentinel.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        if label == Self::ALL_LABEL {
            Self::All
        } else {
            Self::Column(label.to_string())
        }
    }
}

impl fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(Self::ALL_LABEL),
            Self::Column(column) => f.write_str(column),
        }
    }
}

/// User-facing search state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchState {
    /// Raw query text. Empty means "no filtering".
    pub query: String,
    /// Target column or all columns.
    pub selector: ColumnSelector,
    /// True while the latest issued read is unresolved.
    pub loading: bool,
    /// Message of the last failed fetch or search.
    pub last_error: Option<String>,
}

/// Ordered rows currently displayed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    rows: Vec<Record>,
}

impl ResultSet {
    #[must_use]
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    /// Swaps in a complete new row sequence in one step.
    pub fn replace_all(&mut self, rows: Vec<Record>) {
        self.rows = rows;
    }

    /// Index of the first row whose `key_column` equals `key_value`.
    #[must_use]
    pub fn position_by_key(&self, key_column: &str, key_value: &Value) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.get(key_column).is_some_and(|v| v.same_key(key_value)))
    }

    /// Replaces the row matching the key at its current index.
    ///
    /// Order is preserved. Returns the index, or `None` (and changes
    /// nothing) when no row has that key.
    pub fn replace_by_key(
        &mut self,
        key_column: &str,
        key_value: &Value,
        record: Record,
    ) -> Option<usize> {
        let index = self.position_by_key(key_column, key_value)?;
        self.rows[index] = record;
        Some(index)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Record> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.rows.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Record] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Builds the read for a query.
///
/// - empty query: every row, whatever the selector
/// - all columns: OR of one term per known column, or every row when no
///   columns are known (never an empty predicate)
/// - one column: a single term
#[must_use]
pub fn build_request(query: &str, selector: &ColumnSelector, columns: &[String]) -> ReadRequest {
    if query.is_empty() {
        return ReadRequest::all();
    }
    match selector {
        ColumnSelector::All if columns.is_empty() => ReadRequest::all(),
        ColumnSelector::All => ReadRequest::matching(Predicate::Any(
            columns
                .iter()
                .map(|column| ContainsTerm::new(column.clone(), query))
                .collect(),
        )),
        ColumnSelector::Column(column) => {
            ReadRequest::matching(Predicate::contains(column.clone(), query))
        }
    }
}

/// In-memory filter for callers that already hold every row.
///
/// A whitespace-only query keeps every row. Otherwise a row is kept when
/// any of `columns` contains `query`, ignoring case. Never calls a store.
#[must_use]
pub fn local_filter<'a>(rows: &'a [Record], columns: &[String], query: &str) -> Vec<&'a Record> {
    if query.trim().is_empty() {
        return rows.iter().collect();
    }
    rows.iter()
        .filter(|row| {
            columns.iter().any(|column| {
                row.get(column)
                    .and_then(Value::search_text)
                    .is_some_and(|text| contains_ignore_case(&text, query))
            })
        })
        .collect()
}

/// Identifies one issued read. Later reads get larger tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

/// A read that has been issued but not yet completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRead {
    pub token: RequestToken,
    pub request: ReadRequest,
}

/// Outcome of handing a response to [`SearchEngine::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The response replaced the result set.
    Applied,
    /// A newer read was issued since; the response was dropped.
    Stale,
}

/// Owns the result set of one table and the search state that produced it.
pub struct SearchEngine {
    store: Arc<dyn TableStore>,
    table: String,
    results: ResultSet,
    state: SearchState,
    issued: u64,
}

impl SearchEngine {
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            results: ResultSet::default(),
            state: SearchState::default(),
            issued: 0,
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    /// Mutable access for in-place reconciliation after a row save.
    pub fn results_mut(&mut self) -> &mut ResultSet {
        &mut self.results
    }

    #[must_use]
    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Updates the query text without running a search.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.state.query = query.into();
    }

    /// Updates the target column without running a search.
    pub fn set_selector(&mut self, selector: ColumnSelector) {
        self.state.selector = selector;
    }

    fn issue(&mut self, request: ReadRequest) -> PendingRead {
        self.issued += 1;
        self.state.loading = true;
        self.state.last_error = None;
        PendingRead {
            token: RequestToken(self.issued),
            request,
        }
    }

    /// Issues an unfiltered read of the whole table.
    pub fn begin_fetch_all(&mut self) -> PendingRead {
        self.issue(ReadRequest::all())
    }

    /// Records `query` and `selector` as the current search and issues its read.
    ///
    /// `columns` are the known columns used for the all-columns case.
    pub fn begin_search(
        &mut self,
        query: impl Into<String>,
        selector: ColumnSelector,
        columns: &[String],
    ) -> PendingRead {
        let query = query.into();
        let request = build_request(&query, &selector, columns);
        debug!(table = %self.table, %selector, ?request, "planned search");
        self.state.query = query;
        self.state.selector = selector;
        self.issue(request)
    }

    /// Hands the response of an issued read back to the engine.
    ///
    /// Only the latest issued token is applied. A successful response
    /// replaces the result set in one step; a failure leaves it untouched.
    ///
    /// # Errors
    ///
    /// Returns the store error of the latest read. Stale failures are
    /// dropped like stale successes.
    pub fn complete(
        &mut self,
        token: RequestToken,
        outcome: Result<Vec<Record>, StoreError>,
    ) -> Result<Completion, StoreError> {
        if token.0 != self.issued {
            debug!(
                table = %self.table,
                token = token.0,
                latest = self.issued,
                "dropping stale read response"
            );
            return Ok(Completion::Stale);
        }
        self.state.loading = false;
        match outcome {
            Ok(rows) => {
                self.results.replace_all(rows);
                self.state.last_error = None;
                Ok(Completion::Applied)
            }
            Err(err) => {
                warn!(table = %self.table, error = %err, "read failed; keeping previous results");
                self.state.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn run(&mut self, pending: PendingRead) -> Result<Completion, StoreError> {
        let outcome = self.store.read(&self.table, &pending.request).await;
        self.complete(pending.token, outcome)
    }

    /// Replaces the result set with every row of the table.
    ///
    /// # Errors
    ///
    /// Returns the store error; previous results are kept.
    pub async fn fetch_all(&mut self) -> Result<Completion, StoreError> {
        let pending = self.begin_fetch_all();
        self.run(pending).await
    }

    /// Runs a search and replaces the result set with its rows.
    ///
    /// # Errors
    ///
    /// Returns the store error; previous results are kept.
    pub async fn search(
        &mut self,
        query: impl Into<String>,
        selector: ColumnSelector,
        columns: &[String],
    ) -> Result<Completion, StoreError> {
        let pending = self.begin_search(query, selector, columns);
        self.run(pending).await
    }
}

impl fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchEngine")
            .field("table", &self.table)
            .field("rows", &self.results.len())
            .field("state", &self.state)
            .field("issued", &self.issued)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ticket_rows, ScriptedStore};
    use proptest::prelude::*;

    fn columns() -> Vec<String> {
        vec!["ticket_id".to_string(), "status".to_string()]
    }

    fn engine(store: &Arc<ScriptedStore>) -> SearchEngine {
        SearchEngine::new(Arc::clone(store) as Arc<dyn TableStore>, "tickets")
    }

    #[tokio::test]
    async fn fetch_all_loads_every_row() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut engine = engine(&store);

        assert_eq!(engine.fetch_all().await, Ok(Completion::Applied));
        assert_eq!(engine.results().as_slice(), ticket_rows().as_slice());
        assert!(!engine.state().loading);
    }

    #[tokio::test]
    async fn single_column_search_is_case_insensitive() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut engine = engine(&store);

        engine
            .search("open", ColumnSelector::parse("status"), &columns())
            .await
            .unwrap();

        assert_eq!(engine.results().as_slice(), &ticket_rows()[..1]);
        assert_eq!(engine.state().query, "open");
    }

    #[tokio::test]
    async fn all_columns_search_ors_every_column() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut engine = engine(&store);

        engine
            .search("2", ColumnSelector::All, &columns())
            .await
            .unwrap();

        assert_eq!(engine.results().as_slice(), &ticket_rows()[1..]);
        let sent = store.requests.lock().unwrap().last().cloned().unwrap();
        assert_eq!(sent.filter.unwrap().terms().len(), 2);
    }

    #[tokio::test]
    async fn all_columns_without_known_columns_fetches_everything() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut engine = engine(&store);

        engine.search("zzz", ColumnSelector::All, &[]).await.unwrap();

        assert_eq!(engine.results().len(), 2);
        assert_eq!(
            store.requests.lock().unwrap().last().cloned(),
            Some(ReadRequest::all())
        );
    }

    #[tokio::test]
    async fn failure_keeps_previous_results() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut engine = engine(&store);
        engine.fetch_all().await.unwrap();

        store.fail_next_read(StoreError::rejected("column \"nope\" does not exist"));
        let err = engine
            .search("x", ColumnSelector::parse("nope"), &columns())
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::rejected("column \"nope\" does not exist"));
        assert_eq!(engine.results().len(), 2);
        assert_eq!(
            engine.state().last_error.as_deref(),
            Some("column \"nope\" does not exist")
        );
        assert!(!engine.state().loading);
    }

    #[tokio::test]
    async fn late_response_of_older_request_is_dropped() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut engine = engine(&store);

        let slow = engine.begin_search("o", ColumnSelector::All, &columns());
        let fast = engine.begin_search("closed", ColumnSelector::parse("status"), &columns());
        assert!(engine.state().loading);

        let fast_rows = store.read("tickets", &fast.request).await;
        assert_eq!(engine.complete(fast.token, fast_rows), Ok(Completion::Applied));
        assert!(!engine.state().loading);

        let slow_rows = store.read("tickets", &slow.request).await;
        assert_eq!(engine.complete(slow.token, slow_rows), Ok(Completion::Stale));

        assert_eq!(engine.results().as_slice(), &ticket_rows()[1..]);
        assert_eq!(engine.state().query, "closed");
    }

    #[tokio::test]
    async fn stale_failure_is_dropped_too() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut engine = engine(&store);

        let old = engine.begin_fetch_all();
        let new = engine.begin_fetch_all();
        engine
            .complete(new.token, Ok(ticket_rows()))
            .unwrap();
        let outcome = engine.complete(old.token, Err(StoreError::Unavailable("timeout".into())));

        assert_eq!(outcome, Ok(Completion::Stale));
        assert_eq!(engine.state().last_error, None);
    }

    #[test]
    fn replace_by_key_keeps_order() {
        let mut results = ResultSet::new(ticket_rows());
        let updated = Record::new().with("ticket_id", 1).with("status", "Closed");

        let index = results.replace_by_key("ticket_id", &Value::from("1"), updated.clone());

        assert_eq!(index, Some(0));
        assert_eq!(results.get(0), Some(&updated));
        assert_eq!(results.get(1), Some(&ticket_rows()[1]));
        assert_eq!(
            results.replace_by_key("ticket_id", &Value::Int(9), updated),
            None
        );
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn local_filter_scans_only_listed_columns() {
        let rows = vec![
            Record::new().with("ticket_id", 1).with("status", "Open").with("note", "urgent"),
            Record::new().with("ticket_id", 2).with("status", "Closed").with("note", Value::Null),
        ];
        let status_only = vec!["status".to_string()];

        assert_eq!(local_filter(&rows, &status_only, "OPEN"), vec![&rows[0]]);
        assert!(local_filter(&rows, &status_only, "urgent").is_empty());
        assert_eq!(local_filter(&rows, &status_only, "   ").len(), 2);
    }

    #[test]
    fn selector_parse_and_display() {
        assert_eq!(ColumnSelector::parse("All"), ColumnSelector::All);
        assert_eq!(
            ColumnSelector::parse("status"),
            ColumnSelector::Column("status".into())
        );
        assert_eq!(ColumnSelector::All.to_string(), "All");
    }

    proptest! {
        #[test]
        fn empty_query_always_reads_everything(
            column in "[a-z_]{1,10}",
            all in any::<bool>(),
        ) {
            let selector = if all { ColumnSelector::All } else { ColumnSelector::Column(column.clone()) };
            prop_assert_eq!(build_request("", &selector, &[column]), ReadRequest::all());
        }
    }
}

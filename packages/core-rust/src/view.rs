//! Table view: wires schema inference, search and row editing together
//! for one table, the way a table page drives them.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::editor::{EditSession, EditState, RowEditor};
use crate::error::{EditError, ViewError};
use crate::schema::{infer_descriptor, TableDescriptor};
use crate::search::{local_filter, ColumnSelector, Completion, SearchEngine, SearchState};
use crate::traits::TableStore;
use crate::types::{Record, Value};

/// Everything a page needs to show, search and edit one table.
pub struct TableView {
    store: Arc<dyn TableStore>,
    table: String,
    descriptor: Option<TableDescriptor>,
    key_override: Option<String>,
    search: SearchEngine,
    editor: RowEditor,
    page_error: Option<String>,
}

impl TableView {
    /// Creates an unmounted view. Nothing is read until [`mount`](Self::mount).
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>, table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            search: SearchEngine::new(Arc::clone(&store), table.clone()),
            editor: RowEditor::new(Arc::clone(&store), table.clone(), String::new()),
            store,
            table,
            descriptor: None,
            key_override: None,
            page_error: None,
        }
    }

    /// Uses `column` as the update key instead of the inferred one.
    #[must_use]
    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.editor.set_key_column(column.clone());
        self.key_override = Some(column);
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Loads the view.
    ///
    /// `known_columns` skips the sampling read when the caller already
    /// knows the columns. Otherwise one row is sampled. After that every
    /// row is fetched; if sampling found no columns but the fetch returned
    /// rows, the columns are taken from the first fetched row.
    ///
    /// # Errors
    ///
    /// [`ViewError::SchemaInference`] when sampling fails (also kept as the
    /// page error, nothing is fetched), or [`ViewError::Search`] when the
    /// full fetch fails.
    pub async fn mount(&mut self, known_columns: Option<Vec<String>>) -> Result<(), ViewError> {
        self.page_error = None;
        match known_columns {
            Some(columns) if !columns.is_empty() => {
                self.install(TableDescriptor::new(self.table.clone(), columns));
            }
            _ => self.infer_columns().await?,
        }

        self.search.fetch_all().await.map_err(ViewError::Search)?;

        if self.columns().is_empty() && !self.search.results().is_empty() {
            let descriptor =
                TableDescriptor::from_first_row(self.table.clone(), self.search.results().as_slice());
            self.install(descriptor);
        }
        info!(
            table = %self.table,
            columns = self.columns().len(),
            rows = self.search.results().len(),
            "table view mounted"
        );
        Ok(())
    }

    async fn infer_columns(&mut self) -> Result<(), ViewError> {
        match infer_descriptor(self.store.as_ref(), &self.table).await {
            Ok(descriptor) => {
                self.install(descriptor);
                Ok(())
            }
            Err(err) => {
                warn!(table = %self.table, error = %err, "column inference failed");
                let err = ViewError::SchemaInference(err);
                self.page_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Re-samples the table if no columns are known yet. Columns, once
    /// known, are kept for the life of the view.
    ///
    /// # Errors
    ///
    /// [`ViewError::SchemaInference`] when sampling fails.
    pub async fn ensure_columns(&mut self) -> Result<(), ViewError> {
        if self.columns().is_empty() {
            let selector = self.search.state().selector.clone();
            self.infer_columns().await?;
            self.search.set_selector(selector);
        }
        Ok(())
    }

    fn install(&mut self, mut descriptor: TableDescriptor) {
        if let Some(column) = &self.key_override {
            descriptor = descriptor.with_key_column(column.clone());
        }
        if let Some(key) = &descriptor.key_column {
            self.editor.set_key_column(key.clone());
        }
        self.search.set_selector(
            descriptor
                .columns
                .first()
                .map_or(ColumnSelector::All, |c| ColumnSelector::Column(c.clone())),
        );
        self.descriptor = Some(descriptor);
    }

    #[must_use]
    pub fn descriptor(&self) -> Option<&TableDescriptor> {
        self.descriptor.as_ref()
    }

    /// Known columns in header order; empty before inference.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        self.descriptor
            .as_ref()
            .map(|d| d.columns.as_slice())
            .unwrap_or_default()
    }

    /// Header labels: the columns, or the "no data" placeholder.
    #[must_use]
    pub fn headers(&self) -> Vec<String> {
        self.descriptor.as_ref().map_or_else(
            || TableDescriptor::new(self.table.clone(), Vec::new()).headers(),
            TableDescriptor::headers,
        )
    }

    /// Column choices for a picker: "All" followed by every column.
    #[must_use]
    pub fn selector_choices(&self) -> Vec<String> {
        std::iter::once(ColumnSelector::ALL_LABEL.to_string())
            .chain(self.columns().iter().cloned())
            .collect()
    }

    #[must_use]
    pub fn rows(&self) -> &[Record] {
        self.search.results().as_slice()
    }

    /// Display text of one cell; empty when the row lacks the column.
    #[must_use]
    pub fn cell_text(row: &Record, column: &str) -> String {
        row.get(column).map(Value::to_string).unwrap_or_default()
    }

    #[must_use]
    pub fn search_state(&self) -> &SearchState {
        self.search.state()
    }

    /// Schema-inference failure shown in place of the table.
    #[must_use]
    pub fn page_error(&self) -> Option<&str> {
        self.page_error.as_deref()
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.search.set_query(query);
    }

    pub fn set_selector(&mut self, selector: ColumnSelector) {
        self.search.set_selector(selector);
    }

    /// Runs the current query against the current selector.
    ///
    /// # Errors
    ///
    /// [`ViewError::SchemaInference`] when columns are still unknown and
    /// sampling fails, or [`ViewError::Search`]; the previous rows stay
    /// visible.
    pub async fn run_search(&mut self) -> Result<Completion, ViewError> {
        self.ensure_columns().await?;
        let state = self.search.state().clone();
        let columns = self.columns().to_vec();
        self.search
            .search(state.query, state.selector, &columns)
            .await
            .map_err(ViewError::Search)
    }

    /// Clears the query and fetches every row again.
    ///
    /// # Errors
    ///
    /// [`ViewError::Search`]; the previous rows stay visible.
    pub async fn reset(&mut self) -> Result<Completion, ViewError> {
        self.search.set_query(String::new());
        self.search.fetch_all().await.map_err(ViewError::Search)
    }

    /// Filters the loaded rows in memory over every known column.
    #[must_use]
    pub fn filter_locally(&self, query: &str) -> Vec<&Record> {
        local_filter(self.rows(), self.columns(), query)
    }

    /// Opens an edit session on the row at `index`.
    ///
    /// # Errors
    ///
    /// [`ViewError::NoKeyColumn`] before a key column is known, or
    /// [`ViewError::NoSuchRow`] when `index` is out of range.
    pub fn open_edit(&mut self, index: usize) -> Result<(), ViewError> {
        let has_key = self.key_override.is_some()
            || self.descriptor.as_ref().is_some_and(|d| d.key_column.is_some());
        if !has_key {
            return Err(ViewError::NoKeyColumn {
                table: self.table.clone(),
            });
        }
        let row = self
            .search
            .results()
            .get(index)
            .ok_or(ViewError::NoSuchRow(index))?;
        self.editor.open(row);
        Ok(())
    }

    /// Changes one field of the open draft.
    ///
    /// # Errors
    ///
    /// See [`RowEditor::set_field`].
    pub fn set_field(&mut self, column: &str, value: impl Into<Value>) -> Result<(), EditError> {
        self.editor.set_field(column, value)
    }

    /// Saves the open draft and patches the displayed rows.
    ///
    /// # Errors
    ///
    /// See [`RowEditor::save`].
    pub async fn save(&mut self) -> Result<Record, ViewError> {
        Ok(self.editor.save(self.search.results_mut()).await?)
    }

    pub fn cancel_edit(&mut self) {
        self.editor.cancel();
    }

    #[must_use]
    pub fn edit_state(&self) -> EditState {
        self.editor.state()
    }

    #[must_use]
    pub fn edit_session(&self) -> Option<&EditSession> {
        self.editor.session()
    }
}

impl fmt::Debug for TableView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableView")
            .field("table", &self.table)
            .field("descriptor", &self.descriptor)
            .field("search", &self.search)
            .field("editor", &self.editor)
            .field("page_error", &self.page_error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::schema::NO_DATA_HEADER;
    use crate::testing::{ticket_rows, ScriptedStore};

    fn view_over(store: &Arc<ScriptedStore>, table: &str) -> TableView {
        TableView::new(Arc::clone(store) as Arc<dyn TableStore>, table)
    }

    #[tokio::test]
    async fn mount_samples_then_fetches() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut view = view_over(&store, "tickets");

        view.mount(None).await.unwrap();

        assert_eq!(store.read_count(), 2);
        assert_eq!(view.headers(), vec!["ticket_id", "status"]);
        assert_eq!(view.rows().len(), 2);
        assert_eq!(
            view.search_state().selector,
            ColumnSelector::Column("ticket_id".into())
        );
        assert_eq!(view.selector_choices(), vec!["All", "ticket_id", "status"]);
    }

    #[tokio::test]
    async fn known_columns_skip_the_sample_read() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut view = view_over(&store, "tickets");

        view.mount(Some(vec!["status".into(), "ticket_id".into()]))
            .await
            .unwrap();

        assert_eq!(store.read_count(), 1);
        assert_eq!(view.headers(), vec!["status", "ticket_id"]);
    }

    #[tokio::test]
    async fn empty_table_shows_placeholder_and_all_selector() {
        let store = Arc::new(ScriptedStore::new().with_table("agents", Vec::new()));
        let mut view = view_over(&store, "agents");

        view.mount(None).await.unwrap();

        assert_eq!(view.headers(), vec![NO_DATA_HEADER]);
        assert_eq!(view.search_state().selector, ColumnSelector::All);

        view.set_query("anything");
        view.set_selector(ColumnSelector::All);
        assert_eq!(view.run_search().await, Ok(Completion::Applied));
        assert!(view.rows().is_empty());
    }

    #[tokio::test]
    async fn sampling_failure_becomes_page_error() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        store.fail_next_read(StoreError::Unavailable("connection refused".into()));
        let mut view = view_over(&store, "tickets");

        let err = view.mount(None).await.unwrap_err();

        assert!(matches!(err, ViewError::SchemaInference(_)));
        assert_eq!(
            view.page_error(),
            Some("error loading table data: store unavailable: connection refused")
        );
        assert!(view.rows().is_empty());
        assert_eq!(store.read_count(), 1);
    }

    #[tokio::test]
    async fn search_and_reset() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut view = view_over(&store, "tickets");
        view.mount(None).await.unwrap();

        view.set_query("open");
        view.set_selector(ColumnSelector::parse("status"));
        view.run_search().await.unwrap();
        assert_eq!(view.rows(), &ticket_rows()[..1]);

        view.reset().await.unwrap();
        assert_eq!(view.rows().len(), 2);
        assert_eq!(view.search_state().query, "");
    }

    #[tokio::test]
    async fn edit_round_trip_matches_store() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut view = view_over(&store, "tickets");
        view.mount(None).await.unwrap();

        view.open_edit(1).unwrap();
        view.set_field("status", "Open").unwrap();
        let saved = view.save().await.unwrap();

        assert_eq!(view.edit_state(), EditState::Closed);
        assert_eq!(view.rows()[1], saved);
        assert_eq!(store.rows("tickets")[1], saved);
    }

    #[tokio::test]
    async fn key_override_is_used_for_saves() {
        let store = Arc::new(ScriptedStore::new().with_table(
            "reports",
            vec![Record::new().with("title", "weekly").with("code", "R1")],
        ));
        let mut view = view_over(&store, "reports").with_key_column("code");
        view.mount(None).await.unwrap();

        view.open_edit(0).unwrap();
        assert!(view.set_field("code", "R2").is_err());
        view.set_field("title", "monthly").unwrap();
        view.save().await.unwrap();

        let call = &store.update_calls()[0];
        assert_eq!(call.key_column, "code");
        assert_eq!(call.key_value, Value::from("R1"));
    }

    #[tokio::test]
    async fn empty_sample_takes_columns_from_fetched_rows() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        store.answer_next_read(Vec::new());
        let mut view = view_over(&store, "tickets");

        view.mount(None).await.unwrap();

        assert_eq!(store.read_count(), 2);
        assert_eq!(view.headers(), vec!["ticket_id", "status"]);
        assert_eq!(
            view.descriptor().and_then(|d| d.key_column.as_deref()),
            Some("ticket_id")
        );
        view.open_edit(0).unwrap();
    }

    #[tokio::test]
    async fn ensure_columns_resamples_only_while_empty() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", Vec::new()));
        let mut view = view_over(&store, "tickets");
        view.mount(None).await.unwrap();
        assert_eq!(view.headers(), vec![NO_DATA_HEADER]);
        assert_eq!(store.read_count(), 2);

        store.answer_next_read(ticket_rows());
        view.ensure_columns().await.unwrap();
        assert_eq!(view.columns(), ["ticket_id", "status"]);
        assert_eq!(store.read_count(), 3);

        view.ensure_columns().await.unwrap();
        assert_eq!(store.read_count(), 3);
    }

    #[tokio::test]
    async fn editing_before_mount_is_refused() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut view = view_over(&store, "tickets");

        let err = view.open_edit(0).unwrap_err();
        assert_eq!(err.to_string(), "table tickets has no key column to update by");
        assert_eq!(view.edit_state(), EditState::Closed);
        assert!(store.update_calls().is_empty());
    }

    #[tokio::test]
    async fn key_override_replaces_inferred_key_in_descriptor() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut view = view_over(&store, "tickets").with_key_column("status");
        view.mount(None).await.unwrap();
        assert_eq!(
            view.descriptor().and_then(|d| d.key_column.as_deref()),
            Some("status")
        );
    }

    #[tokio::test]
    async fn open_edit_out_of_range() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut view = view_over(&store, "tickets");
        view.mount(None).await.unwrap();
        assert_eq!(view.open_edit(7), Err(ViewError::NoSuchRow(7)));
    }

    #[tokio::test]
    async fn local_filter_uses_known_columns() {
        let store = Arc::new(ScriptedStore::new().with_table("tickets", ticket_rows()));
        let mut view = view_over(&store, "tickets");
        view.mount(None).await.unwrap();
        let reads = store.read_count();

        let hits = view.filter_locally("CLOSED");

        assert_eq!(hits, vec![&ticket_rows()[1]]);
        assert_eq!(store.read_count(), reads);
    }

    #[test]
    fn cell_text_renders_values() {
        let row = Record::new().with("a", Value::Null).with("b", 3);
        assert_eq!(TableView::cell_text(&row, "a"), "null");
        assert_eq!(TableView::cell_text(&row, "b"), "3");
        assert_eq!(TableView::cell_text(&row, "c"), "");
    }
}

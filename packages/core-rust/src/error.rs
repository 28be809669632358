//! Error types for store access, row editing, and table views.

/// Failure reported by a [`TableStore`](crate::TableStore) backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The named table does not exist.
    #[error("relation \"{table}\" does not exist")]
    NotFound { table: String },
    /// No row matched an update-by-key predicate.
    #[error("no row in \"{table}\" with {column} = {value}")]
    RowNotFound {
        table: String,
        column: String,
        value: String,
    },
    /// A table or column name is not a plain identifier.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    /// The store refused the request. The message is shown to the user verbatim.
    #[error("{message}")]
    Rejected { message: String },
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Shorthand for [`StoreError::Rejected`].
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Failure of a row edit, raised locally or by the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("no row is being edited")]
    NoSession,
    #[error("{column} cannot be changed")]
    ImmutableField { column: String },
    #[error("missing {column}; cannot update this row")]
    MissingPrimaryKey { column: String },
    #[error("a save is already in progress")]
    SaveInProgress,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure surfaced by a [`TableView`](crate::TableView).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    /// Sampling the table to infer its columns failed.
    #[error("error loading table data: {0}")]
    SchemaInference(#[source] StoreError),
    /// A fetch or search failed; previous results are still shown.
    #[error("{0}")]
    Search(#[source] StoreError),
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error("no row at position {0}")]
    NoSuchRow(usize),
    /// Rows cannot be edited before a key column is known.
    #[error("table {table} has no key column to update by")]
    NoKeyColumn { table: String },
}

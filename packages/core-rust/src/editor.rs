//! Row editor: the edit lifecycle of a single row.
//!
//! ```text
//! Closed --open--> Open --save--> Saving --ok--> Closed
//!                    ^                |
//!                    +-----error------+
//! ```
//!
//! `cancel` returns to `Closed` from any state. The key column is part of
//! the draft but can never be changed, and it is sent to the store only as
//! the match predicate, never among the updated fields.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{EditError, StoreError};
use crate::search::ResultSet;
use crate::traits::TableStore;
use crate::types::{Record, Value};

/// Where the editor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    /// No row is being edited.
    Closed,
    /// A draft is open for changes.
    Open,
    /// The draft has been sent to the store and the reply is pending.
    Saving,
}

/// The transient state of one row's edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    id: u64,
    key_column: String,
    key_value: Value,
    draft: Record,
    saving: bool,
    error: Option<String>,
}

impl EditSession {
    #[must_use]
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Key of the row being edited, captured when the session opened.
    #[must_use]
    pub fn key_value(&self) -> &Value {
        &self.key_value
    }

    #[must_use]
    pub fn draft(&self) -> &Record {
        &self.draft
    }

    /// Message of the last failed save or validation.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.saving
    }
}

/// An update that has been handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSave {
    session: u64,
    /// Column matched by the update.
    pub key_column: String,
    /// Key the update is matched on.
    pub key_value: Value,
    /// Every draft field except the key column.
    pub fields: Record,
}

/// Edits rows of one table, one session at a time.
pub struct RowEditor {
    store: Arc<dyn TableStore>,
    table: String,
    key_column: String,
    session: Option<EditSession>,
    opened: u64,
}

impl RowEditor {
    #[must_use]
    pub fn new(
        store: Arc<dyn TableStore>,
        table: impl Into<String>,
        key_column: impl Into<String>,
    ) -> Self {
        Self {
            store,
            table: table.into(),
            key_column: key_column.into(),
            session: None,
            opened: 0,
        }
    }

    #[must_use]
    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Changes the key column used by sessions opened from now on.
    pub fn set_key_column(&mut self, column: impl Into<String>) {
        self.key_column = column.into();
    }

    #[must_use]
    pub fn state(&self) -> EditState {
        match &self.session {
            None => EditState::Closed,
            Some(session) if session.saving => EditState::Saving,
            Some(_) => EditState::Open,
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    /// Opens a session on `record`, replacing any open one.
    ///
    /// The draft starts as a copy of every field of the record.
    pub fn open(&mut self, record: &Record) {
        self.opened += 1;
        let key_value = record.get(&self.key_column).cloned().unwrap_or(Value::Null);
        debug!(table = %self.table, key = %key_value, "opened edit session");
        self.session = Some(EditSession {
            id: self.opened,
            key_column: self.key_column.clone(),
            key_value,
            draft: record.clone(),
            saving: false,
            error: None,
        });
    }

    /// Changes one draft field.
    ///
    /// # Errors
    ///
    /// - [`EditError::ImmutableField`] for the key column; the draft is not touched
    /// - [`EditError::NoSession`] when no row is open
    /// - [`EditError::SaveInProgress`] while the draft is being saved
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) -> Result<(), EditError> {
        let session = self.session.as_mut().ok_or(EditError::NoSession)?;
        if name == session.key_column {
            return Err(EditError::ImmutableField {
                column: name.to_string(),
            });
        }
        if session.saving {
            return Err(EditError::SaveInProgress);
        }
        session.draft.set(name, value);
        Ok(())
    }

    /// Validates the draft and moves the session to `Saving`.
    ///
    /// # Errors
    ///
    /// - [`EditError::NoSession`] when no row is open
    /// - [`EditError::SaveInProgress`] when a save is already pending
    /// - [`EditError::MissingPrimaryKey`] when the draft's key is null;
    ///   the message is also kept on the session
    pub fn begin_save(&mut self) -> Result<PendingSave, EditError> {
        let session = self.session.as_mut().ok_or(EditError::NoSession)?;
        if session.saving {
            return Err(EditError::SaveInProgress);
        }
        let key_value = session
            .draft
            .get(&session.key_column)
            .cloned()
            .unwrap_or(Value::Null);
        if key_value.is_null() {
            let err = EditError::MissingPrimaryKey {
                column: session.key_column.clone(),
            };
            session.error = Some(err.to_string());
            return Err(err);
        }
        session.saving = true;
        session.error = None;
        Ok(PendingSave {
            session: session.id,
            key_column: session.key_column.clone(),
            key_value,
            fields: session.draft.without(&session.key_column),
        })
    }

    /// Applies the store's reply to a save.
    ///
    /// On success the returned row replaces the matching entry of
    /// `results` in place and the session closes. On failure the session
    /// goes back to `Open` with the draft unchanged and the message kept.
    ///
    /// A reply for a session that was cancelled or replaced meanwhile still
    /// reconciles `results` (the store has committed it) but leaves the
    /// current session alone.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::Store`] with the store's failure.
    pub fn finish_save(
        &mut self,
        pending: PendingSave,
        outcome: Result<Record, StoreError>,
        results: &mut ResultSet,
    ) -> Result<Record, EditError> {
        let current = self
            .session
            .as_mut()
            .filter(|session| session.id == pending.session);
        match outcome {
            Ok(row) => {
                let index = results.replace_by_key(&pending.key_column, &pending.key_value, row.clone());
                if index.is_none() {
                    debug!(table = %self.table, key = %pending.key_value, "saved row is not in the result set");
                }
                if current.is_some() {
                    self.session = None;
                }
                info!(table = %self.table, key = %pending.key_value, "row saved");
                Ok(row)
            }
            Err(err) => {
                warn!(table = %self.table, key = %pending.key_value, error = %err, "row save failed");
                if let Some(session) = current {
                    session.saving = false;
                    session.error = Some(err.to_string());
                }
                Err(EditError::Store(err))
            }
        }
    }

    /// Saves the open draft as a whole-record replace keyed on the key column.
    ///
    /// # Errors
    ///
    /// Any error of [`begin_save`](Self::begin_save) (no store call is made)
    /// or of the store update.
    pub async fn save(&mut self, results: &mut ResultSet) -> Result<Record, EditError> {
        let pending = self.begin_save()?;
        let outcome = self
            .store
            .update_by_key(
                &self.table,
                &pending.key_column,
                &pending.key_value,
                pending.fields.clone(),
            )
            .await;
        self.finish_save(pending, outcome, results)
    }

    /// Discards the session, its draft and any error. No store call.
    pub fn cancel(&mut self) {
        if self.session.take().is_some() {
            debug!(table = %self.table, "edit session cancelled");
        }
    }
}

impl fmt::Debug for RowEditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowEditor")
            .field("table", &self.table)
            .field("key_column", &self.key_column)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

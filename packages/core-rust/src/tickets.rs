//! Ticket creation: reference lookups for the user/agent pickers and
//! validation of the new-ticket form before it is inserted.

use std::fmt;
use std::str::FromStr;

use futures_util::future::join;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StoreError;
use crate::filter::ReadRequest;
use crate::traits::TableStore;
use crate::types::{Record, Value};

pub const TICKETS_TABLE: &str = "tickets";
pub const USERS_TABLE: &str = "users";
pub const AGENTS_TABLE: &str = "agents";

/// Ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TicketFormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Low, Self::Medium, Self::High]
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TicketFormError::UnknownPriority(s.to_string()))
    }
}

/// Ticket status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Closed,
}

impl Status {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Closed => "Closed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = TicketFormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['_', '-'], " ");
        [Self::Open, Self::InProgress, Self::Closed]
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| TicketFormError::UnknownStatus(s.to_string()))
    }
}

/// Why a ticket form was refused before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TicketFormError {
    #[error("User is required.")]
    MissingUser,
    #[error("Selected user_id is invalid.")]
    InvalidUser,
    #[error("Selected agent_id is invalid.")]
    InvalidAgent,
    #[error("unknown priority {0:?}")]
    UnknownPriority(String),
    #[error("unknown status {0:?}")]
    UnknownStatus(String),
}

/// One entry of a user or agent picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceOption {
    pub id: Value,
    pub label: String,
}

impl ReferenceOption {
    fn from_row(row: &Record, id_column: &str) -> Option<Self> {
        let id = row.get(id_column).filter(|v| !v.is_null())?.clone();
        let label = match row.get("name").and_then(Value::search_text) {
            Some(name) => format!("{id} – {name}"),
            None => id.to_string(),
        };
        Some(Self { id, label })
    }
}

/// Picker contents for the ticket form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct References {
    pub users: Vec<ReferenceOption>,
    pub agents: Vec<ReferenceOption>,
}

/// Loads users and agents concurrently.
///
/// # Errors
///
/// The users failure if both fail, otherwise whichever failed.
pub async fn load_references(store: &dyn TableStore) -> Result<References, StoreError> {
    let all = ReadRequest::all();
    let (users, agents) = join(store.read(USERS_TABLE, &all), store.read(AGENTS_TABLE, &all)).await;
    let (users, agents) = (users?, agents?);
    Ok(References {
        users: users
            .iter()
            .filter_map(|row| ReferenceOption::from_row(row, "user_id"))
            .collect(),
        agents: agents
            .iter()
            .filter_map(|row| ReferenceOption::from_row(row, "agent_id"))
            .collect(),
    })
}

/// Raw form input, as typed or picked by the user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TicketForm {
    /// Required.
    pub user_id: String,
    /// Empty means unassigned.
    pub agent_id: String,
    pub priority: Priority,
    pub status: Status,
    pub description: String,
}

/// A validated ticket, ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub user_id: i64,
    pub agent_id: Option<i64>,
    pub priority: Priority,
    pub status: Status,
    pub description: Option<String>,
}

impl TicketForm {
    /// Checks the form and converts it to a [`NewTicket`].
    ///
    /// # Errors
    ///
    /// [`TicketFormError`] naming the first invalid field.
    pub fn validate(&self) -> Result<NewTicket, TicketFormError> {
        let user = self.user_id.trim();
        if user.is_empty() {
            return Err(TicketFormError::MissingUser);
        }
        let user_id = user.parse().map_err(|_| TicketFormError::InvalidUser)?;

        let agent = self.agent_id.trim();
        let agent_id = if agent.is_empty() || agent == "none" {
            None
        } else {
            Some(agent.parse().map_err(|_| TicketFormError::InvalidAgent)?)
        };

        let description = self.description.trim();
        Ok(NewTicket {
            user_id,
            agent_id,
            priority: self.priority,
            status: self.status,
            description: (!description.is_empty()).then(|| description.to_string()),
        })
    }
}

impl NewTicket {
    /// Insert payload. `ticket_id` and `date_created` are left to the store.
    #[must_use]
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("user_id", self.user_id)
            .with("agent_id", self.agent_id)
            .with("priority", self.priority.as_str())
            .with("status", self.status.as_str())
            .with("description", self.description.clone())
    }
}

/// Validates `form` and inserts the ticket.
///
/// # Errors
///
/// Form errors are reported before any store call, as
/// [`CreateTicketError::Form`]; store failures as [`CreateTicketError::Store`].
pub async fn create_ticket(
    store: &dyn TableStore,
    form: &TicketForm,
) -> Result<NewTicket, CreateTicketError> {
    let ticket = form.validate()?;
    store.insert(TICKETS_TABLE, ticket.to_record()).await?;
    info!(user_id = ticket.user_id, "ticket created");
    Ok(ticket)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreateTicketError {
    #[error(transparent)]
    Form(#[from] TicketFormError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

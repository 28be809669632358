//! Helpdesk Core — generic table browsing, search, row editing, and ticket
//! creation over an abstract table store.

pub mod editor;
pub mod error;
pub mod filter;
pub mod schema;
pub mod search;
pub mod tickets;
pub mod traits;
pub mod types;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use editor::{EditSession, EditState, PendingSave, RowEditor};
pub use error::{EditError, StoreError, ViewError};
pub use filter::{ContainsTerm, Predicate, ReadRequest};
pub use schema::{TableDescriptor, NO_DATA_HEADER};
pub use search::{ColumnSelector, Completion, RequestToken, ResultSet, SearchEngine, SearchState};
pub use tickets::{CreateTicketError, NewTicket, Priority, Status, TicketForm, TicketFormError};
pub use traits::{IdentityProvider, TableStore};
pub use types::{Principal, Record, Value};
pub use view::TableView;

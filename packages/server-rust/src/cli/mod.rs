//! `helpdesk` command line.
//!
//! - `helpdesk serve` - run the table API server
//! - `helpdesk browse` - print a table, optionally searched
//! - `helpdesk edit` - change one row by key
//! - `helpdesk create-ticket` - validate and insert a ticket
//! - `helpdesk issue-token` - sign a bearer token for a server secret
//!
//! Client commands talk to a running server (`HELPDESK_SERVER`) with an
//! optional bearer token (`HELPDESK_TOKEN`).

pub mod browse;
pub mod edit;
pub mod serve;
pub mod ticket;
pub mod token;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use helpdesk_core::{TableStore, Value};

use crate::client::HttpTableStore;
use crate::observability::LogFormat;

/// Helpdesk table browser and ticket desk.
#[derive(Debug, Parser)]
#[command(name = "helpdesk", version, about, long_about = None)]
pub struct Cli {
    /// Log output format.
    #[arg(long, global = true, env = "HELPDESK_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the table API server.
    Serve(serve::ServeArgs),
    /// Print the rows of a table.
    Browse(browse::BrowseArgs),
    /// Edit one row, addressed by its key.
    Edit(edit::EditArgs),
    /// Create a support ticket.
    CreateTicket(ticket::CreateTicketArgs),
    /// Sign a bearer token.
    IssueToken(token::IssueTokenArgs),
}

/// Connection settings shared by client commands.
#[derive(Debug, Clone, Args)]
pub struct RemoteArgs {
    /// Base URL of a running `helpdesk serve`.
    #[arg(long, env = "HELPDESK_SERVER", default_value = "http://127.0.0.1:8080")]
    pub server: String,

    /// Bearer token sent with every request.
    #[arg(long, env = "HELPDESK_TOKEN")]
    pub token: Option<String>,
}

impl RemoteArgs {
    /// Builds the HTTP-backed store.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn store(&self) -> anyhow::Result<Arc<dyn TableStore>> {
        Ok(Arc::new(HttpTableStore::new(
            self.server.clone(),
            self.token.clone(),
        )?))
    }
}

/// Reads a command-line value as JSON when it parses (`5`, `null`,
/// `true`), otherwise as plain text.
#[must_use]
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::from(raw))
}

/// Splits `column=value`.
///
/// # Errors
///
/// Returns an error when there is no `=` or the column is empty.
pub fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    match raw.split_once('=') {
        Some((column, value)) if !column.trim().is_empty() => {
            Ok((column.trim().to_string(), parse_value(value)))
        }
        _ => Err(format!("expected column=value, got {raw:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_flags() {
        let cli = Cli::parse_from([
            "helpdesk",
            "--log-format",
            "json",
            "serve",
            "--port",
            "9000",
            "--jwt-secret",
            "s",
            "--cors-origin",
            "http://localhost:3000",
        ]);
        assert_eq!(cli.log_format, LogFormat::Json);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, 9000);
        assert_eq!(args.jwt_secret.as_deref(), Some("s"));
        assert_eq!(args.cors_origin, vec!["http://localhost:3000"]);
    }

    #[test]
    fn parses_edit_assignments() {
        let cli = Cli::parse_from([
            "helpdesk",
            "edit",
            "tickets",
            "--key",
            "4",
            "--set",
            "status=In Progress",
            "--set",
            "agent_id=7",
        ]);
        let Command::Edit(args) = cli.command else {
            panic!("expected edit");
        };
        assert_eq!(args.key, "4");
        assert_eq!(
            args.set,
            vec![
                ("status".to_string(), Value::from("In Progress")),
                ("agent_id".to_string(), Value::Int(7)),
            ]
        );
    }

    #[test]
    fn assignment_parsing() {
        assert_eq!(parse_value("null"), Value::Null);
        assert_eq!(parse_value("printer"), Value::from("printer"));
        assert_eq!(parse_value("\"7\""), Value::from("7"));
        assert!(parse_assignment("status").is_err());
        assert!(parse_assignment("=x").is_err());
    }
}

//! `helpdesk create-ticket`.

use clap::Args;
use helpdesk_core::tickets::{create_ticket, load_references, References};
use helpdesk_core::{Priority, Status, TicketForm};

use super::RemoteArgs;

#[derive(Debug, Args)]
pub struct CreateTicketArgs {
    /// Requesting user's id.
    #[arg(long, default_value = "")]
    pub user: String,

    /// Assigned agent's id; leave out for unassigned.
    #[arg(long, default_value = "")]
    pub agent: String,

    /// Low, Medium or High.
    #[arg(long, default_value_t = Priority::Medium)]
    pub priority: Priority,

    /// Open, "In Progress" or Closed.
    #[arg(long, default_value_t = Status::Open)]
    pub status: Status,

    #[arg(long, default_value = "")]
    pub description: String,

    /// List the users and agents that can be picked, then exit.
    #[arg(long)]
    pub list_references: bool,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl CreateTicketArgs {
    #[must_use]
    pub fn form(&self) -> TicketForm {
        TicketForm {
            user_id: self.user.clone(),
            agent_id: self.agent.clone(),
            priority: self.priority,
            status: self.status,
            description: self.description.clone(),
        }
    }
}

fn print_references(references: &References) {
    println!("Users:");
    for option in &references.users {
        println!("  {}", option.label);
    }
    println!("Agents:");
    for option in &references.agents {
        println!("  {}", option.label);
    }
}

/// Validates the form and inserts the ticket.
///
/// # Errors
///
/// Returns the form's validation message or the store's failure.
pub async fn execute(args: CreateTicketArgs) -> anyhow::Result<()> {
    let store = args.remote.store()?;
    if args.list_references {
        print_references(&load_references(store.as_ref()).await?);
        return Ok(());
    }

    let ticket = create_ticket(store.as_ref(), &args.form()).await?;
    println!(
        "Ticket created for user {} ({}, {}).",
        ticket.user_id, ticket.priority, ticket.status
    );
    Ok(())
}

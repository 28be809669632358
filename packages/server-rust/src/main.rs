//! `helpdesk` binary entry point.

use clap::Parser;

use helpdesk_server::cli::{self, Cli, Command};
use helpdesk_server::observability::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match cli.command {
        Command::Serve(args) => cli::serve::execute(args).await,
        Command::Browse(args) => cli::browse::execute(args).await,
        Command::Edit(args) => cli::edit::execute(args).await,
        Command::CreateTicket(args) => cli::ticket::execute(args).await,
        Command::IssueToken(args) => cli::token::execute(args),
    }
}

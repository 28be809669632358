//! `helpdesk issue-token`.

use std::time::Duration;

use clap::Args;

use crate::auth::issue_token;

#[derive(Debug, Args)]
pub struct IssueTokenArgs {
    /// Secret the server was started with.
    #[arg(long, env = "HELPDESK_JWT_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Subject (principal id).
    #[arg(long)]
    pub sub: String,

    /// Role to grant; repeat for several.
    #[arg(long = "role")]
    pub roles: Vec<String>,

    /// Lifetime in seconds.
    #[arg(long, default_value_t = 3600)]
    pub ttl_secs: u64,
}

/// Prints a signed token.
///
/// # Errors
///
/// Returns an error if signing fails.
pub fn execute(args: IssueTokenArgs) -> anyhow::Result<()> {
    let token = issue_token(
        &args.secret,
        &args.sub,
        args.roles,
        Duration::from_secs(args.ttl_secs),
    )?;
    println!("{token}");
    Ok(())
}

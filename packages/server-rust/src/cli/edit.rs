//! `helpdesk edit <table> --key <value> --set column=value ...`.

use anyhow::Context;
use clap::Args;
use helpdesk_core::{Record, TableView, Value};

use super::{parse_assignment, parse_value, RemoteArgs};

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Table holding the row.
    pub table: String,

    /// Key value of the row to edit.
    #[arg(long)]
    pub key: String,

    /// Key column, when it cannot be inferred from the table name.
    #[arg(long)]
    pub key_column: Option<String>,

    /// `column=value` to change; repeat for several. Values that parse as
    /// JSON (`7`, `null`, `true`) keep that type.
    #[arg(long, value_parser = parse_assignment, required = true)]
    pub set: Vec<(String, Value)>,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

/// Opens the row in `view` whose key equals `key`, applies `changes`, and
/// saves. Returns the row as stored.
///
/// # Errors
///
/// Returns an error if the row is missing, a change touches the key
/// column, or the save fails.
pub async fn apply(
    view: &mut TableView,
    key: &Value,
    changes: Vec<(String, Value)>,
) -> anyhow::Result<Record> {
    let key_column = view
        .descriptor()
        .and_then(|d| d.key_column.clone())
        .with_context(|| format!("table {} has no columns to key on", view.table()))?;
    let index = view
        .rows()
        .iter()
        .position(|row| row.get(&key_column).is_some_and(|v| v.same_key(key)))
        .with_context(|| format!("no row with {key_column} = {key}"))?;

    view.open_edit(index)?;
    for (column, value) in changes {
        if let Err(err) = view.set_field(&column, value) {
            view.cancel_edit();
            return Err(err.into());
        }
    }
    Ok(view.save().await?)
}

/// Runs the edit against the server and prints the saved row as JSON.
///
/// # Errors
///
/// See [`apply`].
pub async fn execute(args: EditArgs) -> anyhow::Result<()> {
    let mut view = TableView::new(args.remote.store()?, args.table);
    if let Some(column) = args.key_column {
        view = view.with_key_column(column);
    }
    view.mount(None).await?;

    let row = apply(&mut view, &parse_value(&args.key), args.set).await?;
    println!("{}", serde_json::to_string_pretty(&row)?);
    Ok(())
}

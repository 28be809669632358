//! `helpdesk browse <table>`.

use std::io::Write;

use clap::Args;
use helpdesk_core::search::ColumnSelector;
use helpdesk_core::TableView;

use super::RemoteArgs;

#[derive(Debug, Args)]
pub struct BrowseArgs {
    /// Table to show.
    pub table: String,

    /// Search text; rows are filtered on the server.
    #[arg(long, short = 'q')]
    pub query: Option<String>,

    /// Column to search, or "All". Defaults to the first column.
    #[arg(long, short = 'c')]
    pub column: Option<String>,

    /// Filter the loaded rows locally across every column instead.
    #[arg(long, conflicts_with_all = ["query", "column"])]
    pub filter: Option<String>,

    /// Print rows as JSON instead of a tab-separated table.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

/// Writes `view`'s header and `rows` as tab-separated text.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn render<'a>(
    out: &mut impl Write,
    view: &TableView,
    rows: impl IntoIterator<Item = &'a helpdesk_core::Record>,
) -> std::io::Result<()> {
    writeln!(out, "{}", view.headers().join("\t"))?;
    for row in rows {
        let cells: Vec<String> = view
            .columns()
            .iter()
            .map(|column| TableView::cell_text(row, column))
            .collect();
        writeln!(out, "{}", cells.join("\t"))?;
    }
    Ok(())
}

/// Mounts the table, runs the optional search, and prints the rows.
///
/// # Errors
///
/// Returns an error if the table cannot be loaded or searched.
pub async fn execute(args: BrowseArgs) -> anyhow::Result<()> {
    let mut view = TableView::new(args.remote.store()?, args.table);
    view.mount(None).await?;

    if let Some(column) = &args.column {
        view.set_selector(ColumnSelector::parse(column));
    }
    if let Some(query) = &args.query {
        view.set_query(query.clone());
        view.run_search().await?;
    }

    let rows = match &args.filter {
        Some(query) => view.filter_locally(query),
        None => view.rows().iter().collect(),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &rows)?;
        writeln!(out)?;
    } else {
        render(&mut out, &view, rows)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::network::handlers::test_support::seeded_store;

    #[tokio::test]
    async fn renders_header_and_cells() {
        let mut view = TableView::new(Arc::new(seeded_store()), "tickets");
        view.mount(None).await.unwrap();

        let mut out = Vec::new();
        render(&mut out, &view, view.rows()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "ticket_id\tuser_id\tstatus\tdescription");
        assert_eq!(lines[1], "1\t1\tOpen\tPrinter jammed");
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn empty_table_renders_placeholder_header() {
        let mut view = TableView::new(Arc::new(seeded_store()), "agents");
        view.mount(None).await.unwrap();

        let mut out = Vec::new();
        render(&mut out, &view, view.rows()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No Data\n");
    }
}

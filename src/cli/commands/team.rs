//! Team command: in-progress work grouped by owner.

use std::io;
use tracing::debug;

use crate::cli::TeamArgs;
use crate::error::Result;
use crate::model::IssueFilter;
use crate::query::{AppContext, QueryExecutor, select_transport};
use crate::team::{AggregationResult, OutputMode, TeamFilter, aggregate, print};

/// Fetch and aggregate without printing.
///
/// # Errors
///
/// Returns an error if no transport can be selected or the fetch fails.
pub fn collect(args: &TeamArgs, ctx: &AppContext) -> Result<AggregationResult> {
    let transport = select_transport(ctx)?;
    let issues = transport.fetch_issues(&IssueFilter::in_progress())?;
    debug!(
        transport = transport.kind().as_str(),
        fetched = issues.len(),
        "Fetched in-progress issues"
    );
    drop(transport);

    let filter = TeamFilter::new(args.filter_team.clone(), args.github_username.clone());
    Ok(aggregate(issues, &filter))
}

/// Execute the team command.
///
/// # Errors
///
/// Returns an error if the fetch or the write to stdout fails.
pub fn execute(args: &TeamArgs, ctx: &AppContext, json: bool) -> Result<()> {
    let result = collect(args, ctx)?;
    print(&result, OutputMode::from_json_flag(json), &mut io::stdout().lock())
}

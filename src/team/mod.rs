//! Team work distribution.
//!
//! Groups in-progress issues by owner and renders them. The input comes
//! from whichever query transport was selected; nothing here knows which.

mod aggregate;
mod present;

pub use aggregate::{AggregationResult, TeamFilter, TeamMember, TeamMemberIssue, aggregate};
pub use present::{OutputMode, TITLE_WIDTH, print, render_json, render_text, truncate_title};

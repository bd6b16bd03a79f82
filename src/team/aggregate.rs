//! Per-owner grouping of in-progress issues.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{Issue, IssueStatus};

/// Secondary filters applied after fetching.
///
/// Both are exact, case-sensitive matches. `None` and `Some("")` both mean
/// "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamFilter {
    pub team: Option<String>,
    pub github_username: Option<String>,
}

impl TeamFilter {
    #[must_use]
    pub fn new(team: Option<String>, github_username: Option<String>) -> Self {
        Self {
            team: team.filter(|t| !t.is_empty()),
            github_username: github_username.filter(|u| !u.is_empty()),
        }
    }

    fn matches(&self, issue: &Issue) -> bool {
        let team_ok = self
            .team
            .as_deref()
            .is_none_or(|t| t.is_empty() || issue.team == t);
        let user_ok = self
            .github_username
            .as_deref()
            .is_none_or(|u| u.is_empty() || issue.github_username == u);
        team_ok && user_ok
    }
}

/// The slice of an issue the team view shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamMemberIssue {
    pub id: String,
    pub title: String,
    pub status: IssueStatus,
    pub priority: i32,
    pub github_username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub team: String,
}

impl From<Issue> for TeamMemberIssue {
    fn from(issue: Issue) -> Self {
        Self {
            id: issue.id,
            title: issue.title,
            status: issue.status,
            priority: issue.priority,
            github_username: issue.github_username,
            team: issue.team,
        }
    }
}

/// One owner and their in-progress issues, most urgent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamMember {
    pub github_username: String,
    pub in_progress_count: usize,
    pub issues: Vec<TeamMemberIssue>,
}

/// Members ordered by workload, heaviest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationResult {
    pub members: Vec<TeamMember>,
    pub total_issues: usize,
}

impl AggregationResult {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Group `issues` by owner.
///
/// Unowned issues are dropped, then the filter applies. Within a member,
/// issues are stable-sorted by ascending priority so equal priorities keep
/// fetch order. Members are sorted by descending count; equal counts are
/// ordered by owner name because the buckets come out of a `BTreeMap` and
/// the sort is stable.
#[must_use]
pub fn aggregate(issues: Vec<Issue>, filter: &TeamFilter) -> AggregationResult {
    let mut buckets: BTreeMap<String, Vec<TeamMemberIssue>> = BTreeMap::new();

    for issue in issues {
        if !issue.is_owned() || !filter.matches(&issue) {
            continue;
        }
        buckets
            .entry(issue.github_username.clone())
            .or_default()
            .push(issue.into());
    }

    let mut members: Vec<TeamMember> = buckets
        .into_iter()
        .map(|(github_username, mut issues)| {
            issues.sort_by_key(|i| i.priority);
            TeamMember {
                github_username,
                in_progress_count: issues.len(),
                issues,
            }
        })
        .collect();
    members.sort_by(|a, b| b.in_progress_count.cmp(&a.in_progress_count));

    let total_issues = members.iter().map(|m| m.in_progress_count).sum();
    AggregationResult {
        members,
        total_issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::tests::issue;

    fn on_team(mut issue: Issue, team: &str) -> Issue {
        issue.team = team.to_string();
        issue
    }

    fn ids(member: &TeamMember) -> Vec<&str> {
        member.issues.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_alice_scenario() {
        let issues = vec![
            issue("BD-1", "alice", 2, IssueStatus::InProgress),
            issue("BD-2", "alice", 0, IssueStatus::InProgress),
            issue("BD-3", "", 1, IssueStatus::InProgress),
        ];

        let result = aggregate(issues, &TeamFilter::default());

        assert_eq!(result.total_issues, 2);
        assert_eq!(result.members.len(), 1);
        let alice = &result.members[0];
        assert_eq!(alice.github_username, "alice");
        assert_eq!(alice.in_progress_count, 2);
        assert_eq!(ids(alice), ["BD-2", "BD-1"]);
    }

    #[test]
    fn test_empty_input() {
        let result = aggregate(Vec::new(), &TeamFilter::default());
        assert!(result.is_empty());
        assert_eq!(result.total_issues, 0);
    }

    #[test]
    fn test_all_unowned_is_empty() {
        let issues = vec![
            issue("BD-1", "", 1, IssueStatus::InProgress),
            issue("BD-2", "", 2, IssueStatus::InProgress),
        ];
        assert!(aggregate(issues, &TeamFilter::default()).is_empty());
    }

    #[test]
    fn test_team_filter_is_exact() {
        let issues = vec![
            on_team(issue("BD-1", "alice", 1, IssueStatus::InProgress), "backend"),
            on_team(issue("BD-2", "bob", 1, IssueStatus::InProgress), "Backend"),
            on_team(issue("BD-3", "carol", 1, IssueStatus::InProgress), "frontend"),
        ];

        let filter = TeamFilter::new(Some("backend".into()), None);
        let result = aggregate(issues, &filter);

        assert_eq!(result.members.len(), 1);
        assert_eq!(result.members[0].github_username, "alice");
        assert!(
            result
                .members
                .iter()
                .flat_map(|m| &m.issues)
                .all(|i| i.team == "backend")
        );
    }

    #[test]
    fn test_username_filter() {
        let issues = vec![
            issue("BD-1", "alice", 1, IssueStatus::InProgress),
            issue("BD-2", "Alice", 1, IssueStatus::InProgress),
            issue("BD-3", "bob", 1, IssueStatus::InProgress),
        ];

        let filter = TeamFilter::new(None, Some("alice".into()));
        let result = aggregate(issues, &filter);

        assert_eq!(result.members.len(), 1);
        assert_eq!(ids(&result.members[0]), ["BD-1"]);
        assert_eq!(result.total_issues, 1);
    }

    #[test]
    fn test_empty_filter_string_means_no_filter() {
        let issues = vec![
            on_team(issue("BD-1", "alice", 1, IssueStatus::InProgress), "backend"),
            issue("BD-2", "bob", 1, IssueStatus::InProgress),
        ];

        let built = TeamFilter::new(Some(String::new()), Some(String::new()));
        assert_eq!(built, TeamFilter::default());

        let literal = TeamFilter {
            team: Some(String::new()),
            github_username: Some(String::new()),
        };
        assert_eq!(aggregate(issues, &literal).total_issues, 2);
    }

    #[test]
    fn test_members_ordered_by_count_then_name() {
        let issues = vec![
            issue("BD-1", "zed", 1, IssueStatus::InProgress),
            issue("BD-2", "bob", 1, IssueStatus::InProgress),
            issue("BD-3", "carol", 1, IssueStatus::InProgress),
            issue("BD-4", "carol", 2, IssueStatus::InProgress),
            issue("BD-5", "carol", 3, IssueStatus::InProgress),
            issue("BD-6", "amy", 0, IssueStatus::InProgress),
        ];

        let result = aggregate(issues, &TeamFilter::default());
        let names: Vec<&str> = result
            .members
            .iter()
            .map(|m| m.github_username.as_str())
            .collect();

        assert_eq!(names, ["carol", "amy", "bob", "zed"]);
        for pair in result.members.windows(2) {
            assert!(pair[0].in_progress_count >= pair[1].in_progress_count);
        }
    }

    #[test]
    fn test_equal_priority_keeps_fetch_order() {
        let issues = vec![
            issue("BD-9", "alice", 1, IssueStatus::InProgress),
            issue("BD-3", "alice", 1, IssueStatus::InProgress),
            issue("BD-5", "alice", 0, IssueStatus::InProgress),
            issue("BD-1", "alice", 1, IssueStatus::InProgress),
        ];

        let result = aggregate(issues, &TeamFilter::default());
        assert_eq!(ids(&result.members[0]), ["BD-5", "BD-9", "BD-3", "BD-1"]);
    }

    #[test]
    fn test_total_matches_member_counts() {
        let issues: Vec<Issue> = (0..25)
            .map(|n| {
                let owner = ["", "alice", "bob", "carol"][n % 4];
                issue(&format!("BD-{n}"), owner, (n % 5) as i32, IssueStatus::InProgress)
            })
            .collect();

        let result = aggregate(issues, &TeamFilter::default());
        let sum: usize = result.members.iter().map(|m| m.in_progress_count).sum();
        assert_eq!(result.total_issues, sum);
        assert!(result.members.iter().all(|m| m.in_progress_count == m.issues.len()));
        assert!(
            result
                .members
                .iter()
                .all(|m| m.issues.windows(2).all(|w| w[0].priority <= w[1].priority))
        );
    }
}

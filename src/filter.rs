use std::fmt;

use crate::types::{Candidate, QuerySpec};

/// Why a candidate was left out of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Archived,
    Reassigned,
    OutOfScope,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::Archived => "repository is archived",
            SkipReason::Reassigned => "assigned to someone else",
            SkipReason::OutOfScope => "outside the requested orgs/repos",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    Accept,
    Skip(SkipReason),
}

/// Decides, candidate by candidate, whether a pull request belongs to the
/// viewer's report.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceFilter<'a> {
    viewer: &'a str,
    spec: &'a QuerySpec,
}

impl<'a> RelevanceFilter<'a> {
    pub fn new(viewer: &'a str, spec: &'a QuerySpec) -> Self {
        Self { viewer, spec }
    }

    pub fn check(&self, candidate: &Candidate) -> Relevance {
        if candidate.repository.is_archived {
            return Relevance::Skip(SkipReason::Archived);
        }

        if !is_assigned_to(candidate, self.viewer) {
            return Relevance::Skip(SkipReason::Reassigned);
        }

        if !self.spec.in_scope(&candidate.repository.repo) {
            return Relevance::Skip(SkipReason::OutOfScope);
        }

        Relevance::Accept
    }
}

/// An unassigned pull request counts as the viewer's.
fn is_assigned_to(candidate: &Candidate, login: &str) -> bool {
    candidate.assignees.is_empty()
        || candidate
            .assignees
            .iter()
            .any(|assignee| assignee.eq_ignore_ascii_case(login))
}

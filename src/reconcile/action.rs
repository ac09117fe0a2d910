//! Row classification

use crate::store::DiffRow;
use std::fmt;

/// What a compare row asks the reconciler to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Listed, no detail row yet
    Create,
    /// Listed and newer than the detail row
    Update,
    /// Detail row for an asset no longer listed
    Delete,
    /// Nothing to decide; skipped
    Unknown,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "CREATE",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
            Action::Unknown => "UNKNOWN",
        }
    }

    /// Whether the current detail row must go
    pub fn deletes(&self) -> bool {
        matches!(self, Action::Update | Action::Delete)
    }

    /// Whether a fresh detail row must be loaded
    pub fn loads(&self) -> bool {
        matches!(self, Action::Create | Action::Update)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

/// Classify one compare row. Checked in order: missing detail side,
/// missing list side, newer list side.
pub fn classify(row: &DiffRow) -> Action {
    if is_blank(&row.self_link) {
        return Action::Create;
    }
    if is_blank(&row.name) {
        return Action::Delete;
    }
    match (row.update_time, row.updated_timestamp) {
        (Some(listed), Some(stored)) if listed > stored => Action::Update,
        _ => Action::Unknown,
    }
}

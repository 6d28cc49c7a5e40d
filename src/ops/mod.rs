pub mod formula;
pub mod grouping;
pub mod hierarchy;
pub mod reorder;
pub mod task_ops;

use std::fmt;

/// Kind of entity an operation referred to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Space,
    Project,
    Phase,
    Task,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Space => "space",
            EntityKind::Project => "project",
            EntityKind::Phase => "phase",
            EntityKind::Task => "task",
        };
        f.write_str(s)
    }
}

/// Error type for workspace operations. Either variant means the
/// operation was rejected and nothing was changed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
}

impl OpError {
    pub fn not_found(kind: EntityKind, id: &str) -> Self {
        OpError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Reject blank names. Returns the trimmed name.
pub fn require_name<'a>(name: &'a str, what: &str) -> Result<&'a str, OpError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(OpError::Validation(format!("{} name cannot be empty", what)));
    }
    Ok(trimmed)
}

/// Next id for a prefix, one above the highest `PREFIX-NNN` among `existing`.
pub fn next_id<'a>(prefix: &str, existing: impl IntoIterator<Item = &'a str>) -> String {
    let prefix_dash = format!("{}-", prefix);
    let max = existing
        .into_iter()
        .filter_map(|id| id.strip_prefix(&prefix_dash))
        .filter_map(|rest| rest.split('.').next()?.parse::<usize>().ok())
        .max()
        .unwrap_or(0);
    format!("{}-{:03}", prefix, max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_id_starts_at_one() {
        assert_eq!(next_id("T", []), "T-001");
    }

    #[test]
    fn next_id_skips_past_highest_and_ignores_other_prefixes() {
        let ids = ["T-002", "T-010.3", "PH-099", "T-x"];
        assert_eq!(next_id("T", ids), "T-011");
        assert_eq!(next_id("PH", ids), "PH-100");
    }

    #[test]
    fn require_name_rejects_blank() {
        assert!(matches!(require_name("  ", "space"), Err(OpError::Validation(_))));
        assert_eq!(require_name(" Design ", "phase").unwrap(), "Design");
    }
}

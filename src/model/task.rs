use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Task workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Ready,
    Done,
    InReview,
    Completed,
    New,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 7] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Ready,
        TaskStatus::Done,
        TaskStatus::InReview,
        TaskStatus::Completed,
        TaskStatus::New,
    ];

    /// The stored (lowercase, kebab-case) form
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Ready => "ready",
            TaskStatus::Done => "done",
            TaskStatus::InReview => "in-review",
            TaskStatus::Completed => "completed",
            TaskStatus::New => "new",
        }
    }

    /// Parse a status from its stored form or from a status group key.
    /// Matching is case-insensitive, so `"IN-PROGRESS"` resolves too.
    pub fn parse(s: &str) -> Option<TaskStatus> {
        let s = s.trim();
        TaskStatus::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display fields cached on a task for its assignee
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssigneeDisplay {
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub initials: String,
    #[serde(default)]
    pub color: String,
}

/// A denormalized reference: the id of the referenced entity plus a copy of
/// its display fields taken when the reference was made. The copy is stale
/// until refreshed explicitly; nothing follows the id automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRef<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_id: Option<String>,
    #[serde(flatten)]
    pub cached: T,
}

pub type AssigneeRef = SnapshotRef<AssigneeDisplay>;

impl AssigneeRef {
    pub fn name(&self) -> &str {
        &self.cached.name
    }
}

/// A task (or subtask) in a project's ordered task list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceTask {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub assignee: Option<AssigneeRef>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub status: TaskStatus,
    #[serde(default)]
    pub budget: f64,
    /// Spent amount as displayed, e.g. `"$1,200"` or `"-"`
    #[serde(default)]
    pub sprint: String,
    #[serde(default)]
    pub budget_remaining: f64,
    /// Completion percentage, when tracked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Phase name (a label, not a phase id)
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub subtasks: Vec<WorkspaceTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl WorkspaceTask {
    /// Create a new task with empty numeric fields and no assignee
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: TaskStatus) -> Self {
        WorkspaceTask {
            id: id.into(),
            name: name.into(),
            assignee: None,
            due_date: None,
            start_date: None,
            end_date: None,
            status,
            budget: 0.0,
            sprint: "-".to_string(),
            budget_remaining: 0.0,
            progress: None,
            phase: String::new(),
            subtasks: Vec::new(),
            parent_id: None,
        }
    }

    /// Number of tasks in this subtree, including this one
    pub fn subtree_len(&self) -> usize {
        1 + self.subtasks.iter().map(|s| s.subtree_len()).sum::<usize>()
    }
}

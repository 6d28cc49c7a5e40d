use indexmap::IndexMap;

use crate::model::config::GroupBy;
use crate::model::task::WorkspaceTask;

pub const ALL_TASKS: &str = "All Tasks";
pub const NO_SPRINT: &str = "No Sprint";
pub const UNASSIGNED: &str = "Unassigned";
pub const NO_PHASE: &str = "No Phase";

/// The group a task falls into for the given dimension
pub fn group_key(task: &WorkspaceTask, by: GroupBy) -> String {
    match by {
        GroupBy::None => ALL_TASKS.to_string(),
        GroupBy::Status => task.status.as_str().to_uppercase(),
        GroupBy::Sprint => non_empty_or(&task.sprint, NO_SPRINT),
        GroupBy::Assignee => match &task.assignee {
            Some(a) => a.name().to_string(),
            None => UNASSIGNED.to_string(),
        },
        GroupBy::Phase => non_empty_or(&task.phase, NO_PHASE),
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Partition `tasks` into named groups.
///
/// Groups appear in the order their key is first seen, and each group keeps
/// the relative order of its tasks from the input. Every task lands in
/// exactly one group. With `GroupBy::None` the single "All Tasks" group is
/// present even when `tasks` is empty.
pub fn group_tasks(tasks: &[WorkspaceTask], by: GroupBy) -> IndexMap<String, Vec<&WorkspaceTask>> {
    let mut groups: IndexMap<String, Vec<&WorkspaceTask>> = IndexMap::new();
    if by == GroupBy::None {
        groups.insert(ALL_TASKS.to_string(), tasks.iter().collect());
        return groups;
    }
    for task in tasks {
        groups.entry(group_key(task, by)).or_default().push(task);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{AssigneeDisplay, SnapshotRef, TaskStatus};

    fn task(id: &str, status: TaskStatus, phase: &str, sprint: &str, who: Option<&str>) -> WorkspaceTask {
        let mut t = WorkspaceTask::new(id, format!("Task {}", id), status);
        t.phase = phase.to_string();
        t.sprint = sprint.to_string();
        t.assignee = who.map(|name| SnapshotRef {
            referenced_id: None,
            cached: AssigneeDisplay {
                name: name.to_string(),
                ..Default::default()
            },
        });
        t
    }

    fn sample() -> Vec<WorkspaceTask> {
        vec![
            task("T-1", TaskStatus::Todo, "Design", "$100", Some("Ada")),
            task("T-2", TaskStatus::InProgress, "", "", None),
            task("T-3", TaskStatus::Todo, "Build", "$100", Some("Bo")),
            task("T-4", TaskStatus::Done, "Design", "-", Some("Ada")),
        ]
    }

    fn ids(group: &[&WorkspaceTask]) -> Vec<String> {
        group.iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn none_is_a_single_group() {
        let tasks = sample();
        let groups = group_tasks(&tasks, GroupBy::None);
        assert_eq!(groups.len(), 1);
        assert_eq!(ids(&groups["All Tasks"]), ["T-1", "T-2", "T-3", "T-4"]);

        let empty = group_tasks(&[], GroupBy::None);
        assert!(empty["All Tasks"].is_empty());
        assert!(group_tasks(&[], GroupBy::Status).is_empty());
    }

    #[test]
    fn status_keys_are_uppercase_in_first_seen_order() {
        let tasks = sample();
        let groups = group_tasks(&tasks, GroupBy::Status);
        let keys: Vec<&str> = groups.keys().map(String::as_str).collect();
        assert_eq!(keys, ["TODO", "IN-PROGRESS", "DONE"]);
        assert_eq!(ids(&groups["TODO"]), ["T-1", "T-3"]);
    }

    #[test]
    fn fallback_labels_for_missing_values() {
        let tasks = sample();
        assert_eq!(ids(&group_tasks(&tasks, GroupBy::Sprint)["No Sprint"]), ["T-2"]);
        assert_eq!(ids(&group_tasks(&tasks, GroupBy::Sprint)["-"]), ["T-4"]);
        assert_eq!(ids(&group_tasks(&tasks, GroupBy::Assignee)["Unassigned"]), ["T-2"]);
        assert_eq!(ids(&group_tasks(&tasks, GroupBy::Assignee)["Ada"]), ["T-1", "T-4"]);
        assert_eq!(ids(&group_tasks(&tasks, GroupBy::Phase)["No Phase"]), ["T-2"]);
    }

    #[test]
    fn every_task_lands_in_exactly_one_group() {
        let tasks = sample();
        for by in [
            GroupBy::None,
            GroupBy::Status,
            GroupBy::Sprint,
            GroupBy::Assignee,
            GroupBy::Phase,
        ] {
            let groups = group_tasks(&tasks, by);
            let mut seen: Vec<String> = groups.values().flat_map(|g| ids(g)).collect();
            seen.sort();
            assert_eq!(seen, ["T-1", "T-2", "T-3", "T-4"], "dimension {}", by);
        }
    }

    #[test]
    fn grouping_does_not_touch_input() {
        let tasks = sample();
        let before = tasks.clone();
        let _ = group_tasks(&tasks, GroupBy::Phase);
        assert_eq!(tasks, before);
    }
}

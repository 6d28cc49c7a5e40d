use serde::Serialize;

use crate::model::config::GroupBy;
use crate::model::task::{TaskStatus, WorkspaceTask};
use crate::ops::grouping::{NO_PHASE, group_key};
use crate::ops::{EntityKind, OpError};

/// 1-based position of a task in its list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderUpdate {
    pub id: String,
    pub order: usize,
}

/// Result of a drop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// Dropped onto itself; nothing happened
    Unchanged,
    Moved {
        /// Whether the denormalized group field was rewritten
        field_changed: bool,
        /// New order of every task in the affected list
        order: Vec<OrderUpdate>,
    },
}

/// Field write implied by dropping into a group
enum FieldSync {
    Nothing,
    Phase(String),
    Status(TaskStatus),
}

fn field_sync(by: GroupBy, group_key: &str) -> Result<FieldSync, OpError> {
    match by {
        GroupBy::Phase if group_key == NO_PHASE => Ok(FieldSync::Phase(String::new())),
        GroupBy::Phase => Ok(FieldSync::Phase(group_key.to_string())),
        GroupBy::Status => TaskStatus::parse(group_key)
            .map(FieldSync::Status)
            .ok_or_else(|| OpError::Validation(format!("not a status group: {}", group_key))),
        GroupBy::None | GroupBy::Sprint | GroupBy::Assignee => Ok(FieldSync::Nothing),
    }
}

/// Move `dragged_id` to sit immediately before `target_id`, the way a card
/// dropped onto another card lands in a board column.
///
/// When grouping by phase or status, the dragged task takes on the target
/// group's value. Other dimensions only change position. Subtasks can be
/// reordered among siblings of the same parent; moving a task between
/// different lists is rejected. On any error the list is left untouched.
pub fn reorder(
    tasks: &mut Vec<WorkspaceTask>,
    dragged_id: &str,
    target_id: &str,
    target_group_key: &str,
    by: GroupBy,
) -> Result<ReorderOutcome, OpError> {
    if dragged_id == target_id {
        return Ok(ReorderOutcome::Unchanged);
    }

    let sync = field_sync(by, target_group_key)?;
    let list = sibling_list_mut(tasks, dragged_id, target_id)?;

    let from = position_of(list, dragged_id)
        .ok_or_else(|| OpError::not_found(EntityKind::Task, dragged_id))?;
    let mut dragged = list.remove(from);

    let field_changed = group_key(&dragged, by) != target_group_key && apply_sync(&mut dragged, sync);

    // Removal may have shifted the target
    let to = match position_of(list, target_id) {
        Some(idx) => idx,
        None => {
            list.insert(from, dragged);
            return Err(OpError::not_found(EntityKind::Task, target_id));
        }
    };
    list.insert(to, dragged);

    Ok(ReorderOutcome::Moved {
        field_changed,
        order: order_indices(list),
    })
}

fn apply_sync(task: &mut WorkspaceTask, sync: FieldSync) -> bool {
    match sync {
        FieldSync::Nothing => false,
        FieldSync::Phase(phase) => {
            if task.phase == phase {
                return false;
            }
            task.phase = phase;
            true
        }
        FieldSync::Status(status) => {
            if task.status == status {
                return false;
            }
            task.status = status;
            true
        }
    }
}

/// Contiguous 1..=N order indices for a list
pub fn order_indices(tasks: &[WorkspaceTask]) -> Vec<OrderUpdate> {
    tasks
        .iter()
        .enumerate()
        .map(|(i, t)| OrderUpdate {
            id: t.id.clone(),
            order: i + 1,
        })
        .collect()
}

/// Check that `updates` describes `tasks` exactly, in order, numbered 1..=N
pub fn is_contiguous_order(tasks: &[WorkspaceTask], updates: &[OrderUpdate]) -> bool {
    tasks.len() == updates.len()
        && tasks
            .iter()
            .zip(updates)
            .enumerate()
            .all(|(i, (t, u))| t.id == u.id && u.order == i + 1)
}

/// The list (top-level or a subtask list) that holds the task with `id`
pub fn list_containing<'a>(tasks: &'a [WorkspaceTask], id: &str) -> Option<&'a [WorkspaceTask]> {
    if tasks.iter().any(|t| t.id == id) {
        return Some(tasks);
    }
    tasks.iter().find_map(|t| list_containing(&t.subtasks, id))
}

fn position_of(tasks: &[WorkspaceTask], id: &str) -> Option<usize> {
    tasks.iter().position(|t| t.id == id)
}

/// Index path from the top-level list down to the task with `id`
fn path_to(tasks: &[WorkspaceTask], id: &str) -> Option<Vec<usize>> {
    for (i, task) in tasks.iter().enumerate() {
        if task.id == id {
            return Some(vec![i]);
        }
        if let Some(mut rest) = path_to(&task.subtasks, id) {
            rest.insert(0, i);
            return Some(rest);
        }
    }
    None
}

/// The list that holds both tasks as direct children
fn sibling_list_mut<'a>(
    tasks: &'a mut Vec<WorkspaceTask>,
    dragged_id: &str,
    target_id: &str,
) -> Result<&'a mut Vec<WorkspaceTask>, OpError> {
    let dragged_path =
        path_to(tasks, dragged_id).ok_or_else(|| OpError::not_found(EntityKind::Task, dragged_id))?;
    let target_path =
        path_to(tasks, target_id).ok_or_else(|| OpError::not_found(EntityKind::Task, target_id))?;

    let parent = &dragged_path[..dragged_path.len() - 1];
    if parent != &target_path[..target_path.len() - 1] {
        return Err(OpError::Validation(format!(
            "cannot move {} next to {}: tasks belong to different parents",
            dragged_id, target_id
        )));
    }

    let mut list = tasks;
    for &idx in parent {
        list = &mut list[idx].subtasks;
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::grouping::group_tasks;

    fn board() -> Vec<WorkspaceTask> {
        let mut tasks = Vec::new();
        for (id, status, phase) in [
            ("T-1", TaskStatus::Todo, "Planning"),
            ("T-2", TaskStatus::Todo, "Design"),
            ("T-3", TaskStatus::InProgress, "Design"),
            ("T-4", TaskStatus::Done, ""),
        ] {
            let mut t = WorkspaceTask::new(id, id, status);
            t.phase = phase.to_string();
            tasks.push(t);
        }
        let mut s1 = WorkspaceTask::new("T-3.1", "sub one", TaskStatus::Todo);
        s1.parent_id = Some("T-3".into());
        let mut s2 = WorkspaceTask::new("T-3.2", "sub two", TaskStatus::Todo);
        s2.parent_id = Some("T-3".into());
        tasks[2].subtasks = vec![s1, s2];
        tasks
    }

    fn ids(tasks: &[WorkspaceTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn self_drop_is_a_no_op() {
        let mut tasks = board();
        let before = tasks.clone();
        let outcome = reorder(&mut tasks, "T-2", "T-2", "TODO", GroupBy::Status).unwrap();
        assert_eq!(outcome, ReorderOutcome::Unchanged);
        assert_eq!(tasks, before);
    }

    #[test]
    fn inserts_before_target_when_moving_down() {
        let mut tasks = board();
        reorder(&mut tasks, "T-1", "T-4", "All Tasks", GroupBy::None).unwrap();
        assert_eq!(ids(&tasks), ["T-2", "T-3", "T-1", "T-4"]);
    }

    #[test]
    fn inserts_before_target_when_moving_up() {
        let mut tasks = board();
        reorder(&mut tasks, "T-4", "T-2", "All Tasks", GroupBy::None).unwrap();
        assert_eq!(ids(&tasks), ["T-1", "T-4", "T-2", "T-3"]);
    }

    #[test]
    fn count_is_preserved() {
        let mut tasks = board();
        let before: usize = tasks.iter().map(|t| t.subtree_len()).sum();
        reorder(&mut tasks, "T-3", "T-1", "Planning", GroupBy::Phase).unwrap();
        reorder(&mut tasks, "T-1", "T-4", "DONE", GroupBy::Status).unwrap();
        let after: usize = tasks.iter().map(|t| t.subtree_len()).sum();
        assert_eq!(before, after);
    }

    #[test]
    fn phase_follows_the_drop_group() {
        let mut tasks = board();
        let outcome = reorder(&mut tasks, "T-1", "T-3", "Design", GroupBy::Phase).unwrap();
        let moved = tasks.iter().find(|t| t.id == "T-1").unwrap();
        assert_eq!(moved.phase, "Design");
        assert!(matches!(outcome, ReorderOutcome::Moved { field_changed: true, .. }));

        let groups = group_tasks(&tasks, GroupBy::Phase);
        let design: Vec<&str> = groups["Design"].iter().map(|t| t.id.as_str()).collect();
        assert_eq!(design, ["T-2", "T-1", "T-3"]);
    }

    #[test]
    fn dropping_into_no_phase_clears_the_phase() {
        let mut tasks = board();
        reorder(&mut tasks, "T-2", "T-4", "No Phase", GroupBy::Phase).unwrap();
        let moved = tasks.iter().find(|t| t.id == "T-2").unwrap();
        assert_eq!(moved.phase, "");
    }

    #[test]
    fn status_follows_the_drop_group() {
        let mut tasks = board();
        reorder(&mut tasks, "T-1", "T-3", "IN-PROGRESS", GroupBy::Status).unwrap();
        let moved = tasks.iter().find(|t| t.id == "T-1").unwrap();
        assert_eq!(moved.status, TaskStatus::InProgress);
    }

    #[test]
    fn same_group_drop_only_reorders() {
        let mut tasks = board();
        let outcome = reorder(&mut tasks, "T-3", "T-2", "Design", GroupBy::Phase).unwrap();
        assert_eq!(ids(&tasks), ["T-1", "T-3", "T-2", "T-4"]);
        assert!(matches!(outcome, ReorderOutcome::Moved { field_changed: false, .. }));
    }

    #[test]
    fn sprint_and_assignee_dimensions_never_write_fields() {
        let mut tasks = board();
        let before = tasks[0].clone();
        reorder(&mut tasks, "T-1", "T-4", "$999", GroupBy::Sprint).unwrap();
        reorder(&mut tasks, "T-1", "T-2", "Someone", GroupBy::Assignee).unwrap();
        let moved = tasks.iter().find(|t| t.id == "T-1").unwrap();
        assert_eq!(moved, &before);
    }

    #[test]
    fn unknown_ids_leave_state_unchanged() {
        let mut tasks = board();
        let before = tasks.clone();
        let err = reorder(&mut tasks, "T-9", "T-1", "TODO", GroupBy::Status).unwrap_err();
        assert_eq!(err, OpError::not_found(EntityKind::Task, "T-9"));
        let err = reorder(&mut tasks, "T-1", "T-9", "TODO", GroupBy::Status).unwrap_err();
        assert_eq!(err, OpError::not_found(EntityKind::Task, "T-9"));
        assert_eq!(tasks, before);
    }

    #[test]
    fn bad_status_key_is_rejected_before_mutation() {
        let mut tasks = board();
        let before = tasks.clone();
        let err = reorder(&mut tasks, "T-1", "T-3", "BLOCKED", GroupBy::Status).unwrap_err();
        assert!(matches!(err, OpError::Validation(_)));
        assert_eq!(tasks, before);
    }

    #[test]
    fn order_indices_are_contiguous() {
        let mut tasks = board();
        let outcome = reorder(&mut tasks, "T-4", "T-1", "TODO", GroupBy::Status).unwrap();
        let ReorderOutcome::Moved { order, .. } = outcome else {
            panic!("expected a move");
        };
        let numbers: Vec<usize> = order.iter().map(|u| u.order).collect();
        assert_eq!(numbers, [1, 2, 3, 4]);
        assert_eq!(order[0].id, "T-4");
        assert!(is_contiguous_order(&tasks, &order));
    }

    #[test]
    fn subtasks_reorder_within_their_parent() {
        let mut tasks = board();
        let outcome = reorder(&mut tasks, "T-3.2", "T-3.1", "All Tasks", GroupBy::None).unwrap();
        assert_eq!(ids(&tasks[2].subtasks), ["T-3.2", "T-3.1"]);
        assert_eq!(ids(&tasks), ["T-1", "T-2", "T-3", "T-4"]);
        let ReorderOutcome::Moved { order, .. } = outcome else {
            panic!("expected a move");
        };
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn cross_parent_moves_are_rejected() {
        let mut tasks = board();
        let before = tasks.clone();
        let err = reorder(&mut tasks, "T-3.1", "T-1", "TODO", GroupBy::Status).unwrap_err();
        assert!(matches!(err, OpError::Validation(_)));
        assert_eq!(tasks, before);
    }
}

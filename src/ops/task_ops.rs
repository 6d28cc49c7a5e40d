use chrono::NaiveDate;

use crate::model::config::GroupBy;
use crate::model::project::User;
use crate::model::store::EntityStore;
use crate::model::task::{AssigneeDisplay, AssigneeRef, SnapshotRef, TaskStatus, WorkspaceTask};
use crate::ops::grouping::{NO_PHASE, group_key};
use crate::ops::{EntityKind, OpError, next_id, require_name};

/// Where a new task goes within its group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// Before the first task of the group
    Top,
    /// After the last task of the group
    Bottom,
}

/// The group a new task is added to
#[derive(Debug, Clone, Copy)]
pub struct TargetGroup<'a> {
    pub by: GroupBy,
    pub key: &'a str,
}

// ---------------------------------------------------------------------------
// Create / delete
// ---------------------------------------------------------------------------

/// Add a task to a project. When a group is given, the task takes on the
/// group's phase or status and is placed at the head or tail of that group
/// in the flat list. Returns the new id.
pub fn add_task(
    store: &mut EntityStore,
    project_id: &str,
    name: &str,
    group: Option<TargetGroup<'_>>,
    position: InsertPosition,
) -> Result<String, OpError> {
    let name = require_name(name, "task")?;
    if !store.has_project(project_id) {
        return Err(OpError::not_found(EntityKind::Project, project_id));
    }

    let mut task = WorkspaceTask::new(next_task_id(store), name, TaskStatus::Todo);
    if let Some(g) = group {
        match g.by {
            GroupBy::Status => {
                task.status = TaskStatus::parse(g.key)
                    .ok_or_else(|| OpError::Validation(format!("not a status group: {}", g.key)))?;
            }
            GroupBy::Phase if g.key != NO_PHASE => task.phase = g.key.to_string(),
            _ => {}
        }
    }

    let id = task.id.clone();
    let tasks = store.project_tasks_mut(project_id);
    let members: Vec<usize> = match group {
        Some(g) => tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| group_key(t, g.by).eq_ignore_ascii_case(g.key))
            .map(|(i, _)| i)
            .collect(),
        None => Vec::new(),
    };
    let idx = match (position, members.first(), members.last()) {
        (InsertPosition::Top, Some(&first), _) => first,
        (InsertPosition::Bottom, _, Some(&last)) => last + 1,
        (InsertPosition::Top, None, _) => 0,
        (InsertPosition::Bottom, _, None) => tasks.len(),
    };
    tasks.insert(idx, task);
    Ok(id)
}

/// Append a subtask to `parent_id`. Returns the new id (`<parent>.<n>`).
pub fn add_subtask(
    store: &mut EntityStore,
    project_id: &str,
    parent_id: &str,
    name: &str,
) -> Result<String, OpError> {
    let name = require_name(name, "task")?;
    let parent = task_mut(store, project_id, parent_id)?;

    let n = parent
        .subtasks
        .iter()
        .filter_map(|s| s.id.strip_prefix(parent_id)?.strip_prefix('.')?.parse::<usize>().ok())
        .max()
        .unwrap_or(0)
        + 1;
    let sub_id = format!("{}.{}", parent_id, n);
    let mut sub = WorkspaceTask::new(sub_id.clone(), name, TaskStatus::Todo);
    sub.parent_id = Some(parent_id.to_string());
    parent.subtasks.push(sub);
    Ok(sub_id)
}

/// Remove a task (and its subtasks) from a project, returning it
pub fn delete_task(
    store: &mut EntityStore,
    project_id: &str,
    task_id: &str,
) -> Result<WorkspaceTask, OpError> {
    let tasks = store
        .tasks
        .get_mut(project_id)
        .ok_or_else(|| OpError::not_found(EntityKind::Task, task_id))?;
    remove_from_list(tasks, task_id).ok_or_else(|| OpError::not_found(EntityKind::Task, task_id))
}

fn remove_from_list(tasks: &mut Vec<WorkspaceTask>, task_id: &str) -> Option<WorkspaceTask> {
    if let Some(idx) = tasks.iter().position(|t| t.id == task_id) {
        return Some(tasks.remove(idx));
    }
    tasks
        .iter_mut()
        .find_map(|t| remove_from_list(&mut t.subtasks, task_id))
}

// ---------------------------------------------------------------------------
// Field edits
// ---------------------------------------------------------------------------

pub fn set_status(
    store: &mut EntityStore,
    project_id: &str,
    task_id: &str,
    status: TaskStatus,
) -> Result<(), OpError> {
    let task = task_mut(store, project_id, task_id)?;
    task.status = status;
    Ok(())
}

/// Field changes for a task; `None` leaves a field as it is
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub name: Option<String>,
    pub budget: Option<f64>,
    pub sprint: Option<String>,
    pub phase: Option<String>,
    pub progress: Option<f64>,
    pub due_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// `Some(None)` clears the assignee
    pub assignee: Option<Option<User>>,
}

pub fn edit_task(
    store: &mut EntityStore,
    project_id: &str,
    task_id: &str,
    edit: TaskEdit,
) -> Result<(), OpError> {
    let name = match &edit.name {
        Some(n) => Some(require_name(n, "task")?.to_string()),
        None => None,
    };
    require_finite(edit.budget, "budget")?;
    require_finite(edit.progress, "progress")?;
    let task = task_mut(store, project_id, task_id)?;
    if let Some(name) = name {
        task.name = name;
    }
    if let Some(budget) = edit.budget {
        task.budget = budget;
    }
    if let Some(sprint) = edit.sprint {
        task.sprint = sprint;
    }
    if let Some(phase) = edit.phase {
        task.phase = phase;
    }
    if let Some(progress) = edit.progress {
        task.progress = Some(progress);
    }
    if let Some(d) = edit.due_date {
        task.due_date = Some(d);
    }
    if let Some(d) = edit.start_date {
        task.start_date = Some(d);
    }
    if let Some(d) = edit.end_date {
        task.end_date = Some(d);
    }
    if let Some(assignee) = edit.assignee {
        task.assignee = assignee.as_ref().map(assignee_from_user);
    }
    Ok(())
}

/// NaN and infinities have no JSON form and would corrupt the task snapshot
fn require_finite(value: Option<f64>, field: &str) -> Result<(), OpError> {
    match value {
        Some(v) if !v.is_finite() => Err(OpError::Validation(format!(
            "{} must be a finite number, got {}",
            field, v
        ))),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Assignee snapshots
// ---------------------------------------------------------------------------

/// Snapshot a user's display fields for embedding in a task
pub fn assignee_from_user(user: &User) -> AssigneeRef {
    SnapshotRef {
        referenced_id: Some(user.id.clone()),
        cached: AssigneeDisplay {
            name: user.name.clone(),
            avatar: user.avatar.clone(),
            initials: user.initials.clone(),
            color: user.color.clone(),
        },
    }
}

/// Re-copy display fields from `users` into every assignee snapshot that
/// references one of them. Snapshots without an id, or whose user is gone,
/// keep their cached fields. Returns how many snapshots changed.
pub fn refresh_assignees(tasks: &mut [WorkspaceTask], users: &[User]) -> usize {
    let mut changed = 0;
    for task in tasks.iter_mut() {
        if let Some(assignee) = &mut task.assignee
            && let Some(id) = assignee.referenced_id.as_deref()
            && let Some(user) = users.iter().find(|u| u.id == id)
        {
            let fresh = assignee_from_user(user);
            if *assignee != fresh {
                *assignee = fresh;
                changed += 1;
            }
        }
        changed += refresh_assignees(&mut task.subtasks, users);
    }
    changed
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

fn task_mut<'a>(
    store: &'a mut EntityStore,
    project_id: &str,
    task_id: &str,
) -> Result<&'a mut WorkspaceTask, OpError> {
    store
        .tasks
        .get_mut(project_id)
        .and_then(|tasks| find_task_mut(tasks, task_id))
        .ok_or_else(|| OpError::not_found(EntityKind::Task, task_id))
}

/// Find a task by id at any depth
pub fn find_task<'a>(tasks: &'a [WorkspaceTask], task_id: &str) -> Option<&'a WorkspaceTask> {
    for task in tasks {
        if task.id == task_id {
            return Some(task);
        }
        if let Some(t) = find_task(&task.subtasks, task_id) {
            return Some(t);
        }
    }
    None
}

pub fn find_task_mut<'a>(tasks: &'a mut [WorkspaceTask], task_id: &str) -> Option<&'a mut WorkspaceTask> {
    for task in tasks.iter_mut() {
        if task.id == task_id {
            return Some(task);
        }
        if let Some(t) = find_task_mut(&mut task.subtasks, task_id) {
            return Some(t);
        }
    }
    None
}

/// Call `f` on every task at every depth
pub fn for_each_task(tasks: &[WorkspaceTask], f: &mut dyn FnMut(&WorkspaceTask)) {
    for task in tasks {
        f(task);
        for_each_task(&task.subtasks, f);
    }
}

/// Next top-level task id, unique across all projects
fn next_task_id(store: &EntityStore) -> String {
    let mut ids = Vec::new();
    for tasks in store.tasks.values() {
        for_each_task(tasks, &mut |t| ids.push(t.id.clone()));
    }
    next_id("T", ids.iter().map(String::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::{Project, ProjectStatus};
    use chrono::Utc;

    fn store() -> EntityStore {
        let mut store = EntityStore::default();
        store.projects.push(Project {
            id: "P-001".into(),
            name: "Website".into(),
            description: String::new(),
            status: ProjectStatus::Active,
            owner_id: None,
            start_date: None,
            end_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        let tasks = store.project_tasks_mut("P-001");
        for (id, status, phase) in [
            ("T-001", TaskStatus::Todo, "Design"),
            ("T-002", TaskStatus::Done, "Build"),
            ("T-003", TaskStatus::Todo, "Design"),
        ] {
            let mut t = WorkspaceTask::new(id, id, status);
            t.phase = phase.into();
            tasks.push(t);
        }
        store
    }

    fn ids(store: &EntityStore) -> Vec<&str> {
        store.project_tasks("P-001").iter().map(|t| t.id.as_str()).collect()
    }

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.into(),
            name: name.into(),
            avatar: String::new(),
            initials: name.chars().take(1).collect(),
            color: "#FB4196".into(),
        }
    }

    #[test]
    fn add_without_group_goes_to_list_ends() {
        let mut store = store();
        let id = add_task(&mut store, "P-001", "Bottom", None, InsertPosition::Bottom).unwrap();
        assert_eq!(id, "T-004");
        let id = add_task(&mut store, "P-001", "Top", None, InsertPosition::Top).unwrap();
        assert_eq!(id, "T-005");
        assert_eq!(ids(&store), ["T-005", "T-001", "T-002", "T-003", "T-004"]);
    }

    #[test]
    fn add_into_group_head_and_tail() {
        let mut store = store();
        let design = TargetGroup {
            by: GroupBy::Phase,
            key: "Design",
        };
        let top = add_task(&mut store, "P-001", "Head", Some(design), InsertPosition::Top).unwrap();
        let bottom = add_task(&mut store, "P-001", "Tail", Some(design), InsertPosition::Bottom).unwrap();
        assert_eq!(ids(&store), ["T-004", "T-001", "T-002", "T-003", "T-005"]);
        let tasks = store.project_tasks("P-001");
        assert_eq!(find_task(tasks, &top).unwrap().phase, "Design");
        assert_eq!(find_task(tasks, &bottom).unwrap().phase, "Design");
    }

    #[test]
    fn add_into_status_group_sets_status() {
        let mut store = store();
        let done = TargetGroup {
            by: GroupBy::Status,
            key: "DONE",
        };
        let id = add_task(&mut store, "P-001", "Late", Some(done), InsertPosition::Bottom).unwrap();
        assert_eq!(ids(&store), ["T-001", "T-002", "T-004", "T-003"]);
        let task = find_task(store.project_tasks("P-001"), &id).unwrap();
        assert_eq!(task.status, TaskStatus::Done);
    }

    #[test]
    fn add_validates_before_touching_the_list() {
        let mut store = store();
        let before = store.clone();
        assert!(add_task(&mut store, "P-001", "", None, InsertPosition::Top).is_err());
        assert!(add_task(&mut store, "P-404", "x", None, InsertPosition::Top).is_err());
        let bad = TargetGroup {
            by: GroupBy::Status,
            key: "LATER",
        };
        assert!(add_task(&mut store, "P-001", "x", Some(bad), InsertPosition::Top).is_err());
        assert_eq!(store, before);
    }

    #[test]
    fn subtasks_number_under_parent() {
        let mut store = store();
        assert_eq!(add_subtask(&mut store, "P-001", "T-001", "one").unwrap(), "T-001.1");
        assert_eq!(add_subtask(&mut store, "P-001", "T-001", "two").unwrap(), "T-001.2");
        assert_eq!(add_subtask(&mut store, "P-001", "T-001.1", "deep").unwrap(), "T-001.1.1");
        let parent = find_task(store.project_tasks("P-001"), "T-001").unwrap();
        assert_eq!(parent.subtasks.len(), 2);
        assert_eq!(parent.subtasks[1].parent_id.as_deref(), Some("T-001"));
        assert!(add_subtask(&mut store, "P-001", "T-404", "x").is_err());
    }

    #[test]
    fn new_task_ids_skip_subtask_numbers() {
        let mut store = store();
        add_subtask(&mut store, "P-001", "T-003", "sub").unwrap();
        let id = add_task(&mut store, "P-001", "next", None, InsertPosition::Bottom).unwrap();
        assert_eq!(id, "T-004");
    }

    #[test]
    fn delete_removes_nested_tasks() {
        let mut store = store();
        add_subtask(&mut store, "P-001", "T-002", "sub").unwrap();
        let removed = delete_task(&mut store, "P-001", "T-002.1").unwrap();
        assert_eq!(removed.name, "sub");
        let removed = delete_task(&mut store, "P-001", "T-002").unwrap();
        assert_eq!(removed.id, "T-002");
        assert_eq!(ids(&store), ["T-001", "T-003"]);
        assert!(delete_task(&mut store, "P-001", "T-002").is_err());
    }

    #[test]
    fn edit_applies_only_given_fields() {
        let mut store = store();
        let edit = TaskEdit {
            budget: Some(1500.0),
            sprint: Some("$250".into()),
            assignee: Some(Some(user("u1", "Ada"))),
            ..Default::default()
        };
        edit_task(&mut store, "P-001", "T-001", edit).unwrap();
        let task = find_task(store.project_tasks("P-001"), "T-001").unwrap();
        assert_eq!(task.budget, 1500.0);
        assert_eq!(task.sprint, "$250");
        assert_eq!(task.phase, "Design");
        assert_eq!(task.assignee.as_ref().unwrap().name(), "Ada");

        let clear = TaskEdit {
            assignee: Some(None),
            ..Default::default()
        };
        edit_task(&mut store, "P-001", "T-001", clear).unwrap();
        assert!(find_task(store.project_tasks("P-001"), "T-001").unwrap().assignee.is_none());
    }

    #[test]
    fn edit_rejects_blank_name() {
        let mut store = store();
        let edit = TaskEdit {
            name: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(
            edit_task(&mut store, "P-001", "T-001", edit),
            Err(OpError::Validation(_))
        ));
    }

    #[test]
    fn edit_rejects_non_finite_numbers() {
        let mut store = store();
        let before = store.clone();
        for (budget, progress) in [
            (Some(f64::NAN), None),
            (Some(f64::INFINITY), None),
            (None, Some(f64::NEG_INFINITY)),
        ] {
            let edit = TaskEdit {
                name: Some("Renamed".into()),
                budget,
                progress,
                ..Default::default()
            };
            assert!(matches!(
                edit_task(&mut store, "P-001", "T-001", edit),
                Err(OpError::Validation(_))
            ));
        }
        assert_eq!(store, before);
    }

    #[test]
    fn set_status_on_missing_task() {
        let mut store = store();
        set_status(&mut store, "P-001", "T-001", TaskStatus::InReview).unwrap();
        assert_eq!(store.project_tasks("P-001")[0].status, TaskStatus::InReview);
        assert_eq!(
            set_status(&mut store, "P-001", "T-404", TaskStatus::Done),
            Err(OpError::not_found(EntityKind::Task, "T-404"))
        );
    }

    #[test]
    fn refresh_assignees_updates_stale_snapshots() {
        let mut store = store();
        let edit = TaskEdit {
            assignee: Some(Some(user("u1", "Ada"))),
            ..Default::default()
        };
        edit_task(&mut store, "P-001", "T-001", edit).unwrap();

        let tasks = store.project_tasks_mut("P-001");
        assert_eq!(refresh_assignees(tasks, &[user("u1", "Ada")]), 0);
        assert_eq!(refresh_assignees(tasks, &[user("u1", "Ada King")]), 1);
        assert_eq!(tasks[0].assignee.as_ref().unwrap().name(), "Ada King");

        // Gone from the directory: the stale copy stays
        assert_eq!(refresh_assignees(tasks, &[]), 0);
        assert_eq!(tasks[0].assignee.as_ref().unwrap().name(), "Ada King");
    }
}

use crate::model::phase::Phase;
use crate::model::space::Space;
use crate::model::store::EntityStore;
use crate::model::task::WorkspaceTask;
use crate::ops::{EntityKind, OpError, next_id, require_name};

// ---------------------------------------------------------------------------
// Space membership
// ---------------------------------------------------------------------------

/// Put a project in `space_id`, taking it out of whichever space held it.
/// Calling it again with the same arguments changes nothing.
pub fn assign_project_to_space(
    store: &mut EntityStore,
    project_id: &str,
    space_id: &str,
) -> Result<(), OpError> {
    if !store.has_project(project_id) {
        return Err(OpError::not_found(EntityKind::Project, project_id));
    }
    if store.space(space_id).is_none() {
        return Err(OpError::not_found(EntityKind::Space, space_id));
    }

    for space in &mut store.spaces {
        if space.id != space_id {
            space.project_ids.shift_remove(project_id);
        }
    }
    if let Some(target) = store.space_mut(space_id) {
        target.project_ids.insert(project_id.to_string());
    }
    Ok(())
}

/// Drop a project card onto a space
pub fn move_project(
    store: &mut EntityStore,
    project_id: &str,
    target_space_id: &str,
) -> Result<(), OpError> {
    assign_project_to_space(store, project_id, target_space_id)
}

/// Remove a project from every space. Returns whether it was in one.
pub fn detach_project(store: &mut EntityStore, project_id: &str) -> Result<bool, OpError> {
    if !store.has_project(project_id) {
        return Err(OpError::not_found(EntityKind::Project, project_id));
    }
    let mut removed = false;
    for space in &mut store.spaces {
        removed |= space.project_ids.shift_remove(project_id);
    }
    Ok(removed)
}

/// The space that holds a project, if any
pub fn space_of<'a>(store: &'a EntityStore, project_id: &str) -> Option<&'a Space> {
    store.spaces.iter().find(|s| s.contains_project(project_id))
}

pub fn create_space(store: &mut EntityStore, name: &str, icon: &str) -> Result<String, OpError> {
    let name = require_name(name, "space")?;
    let id = next_id("S", store.spaces.iter().map(|s| s.id.as_str()));
    store.spaces.push(Space::new(id.clone(), name, icon));
    Ok(id)
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Next phase id across space and project phases
pub fn next_phase_id(store: &EntityStore) -> String {
    let space_phase_ids = store.spaces.iter().flat_map(|s| s.phases.iter());
    let project_phase_ids = store.phases.values().flatten();
    next_id(
        "PH",
        space_phase_ids
            .chain(project_phase_ids)
            .map(|p| p.id.as_str()),
    )
}

/// Append a phase to a project's own phase list
pub fn create_project_phase(
    store: &mut EntityStore,
    project_id: &str,
    name: &str,
    color: &str,
) -> Result<String, OpError> {
    let name = require_name(name, "phase")?;
    if !store.has_project(project_id) {
        return Err(OpError::not_found(EntityKind::Project, project_id));
    }
    let id = next_phase_id(store);
    store
        .phases
        .entry(project_id.to_string())
        .or_default()
        .push(Phase::new(id.clone(), name, color));
    Ok(id)
}

/// Append a phase shared by all projects in a space
pub fn create_space_phase(
    store: &mut EntityStore,
    space_id: &str,
    name: &str,
    color: &str,
) -> Result<String, OpError> {
    let name = require_name(name, "phase")?;
    let id = next_phase_id(store);
    let space = store
        .space_mut(space_id)
        .ok_or_else(|| OpError::not_found(EntityKind::Space, space_id))?;
    space.phases.push(Phase::new(id.clone(), name, color));
    Ok(id)
}

/// Phases that apply to a project: its own list when it has one, otherwise
/// the phases of its space.
pub fn resolve_phases<'a>(store: &'a EntityStore, project_id: &str) -> &'a [Phase] {
    let own = store.project_phases(project_id);
    if !own.is_empty() {
        return own;
    }
    space_of(store, project_id)
        .map(|s| s.phases.as_slice())
        .unwrap_or(&[])
}

/// Number of tasks (at any depth) labelled with `phase_name`
pub fn phase_task_count(tasks: &[WorkspaceTask], phase_name: &str) -> usize {
    tasks
        .iter()
        .map(|t| usize::from(t.phase == phase_name) + phase_task_count(&t.subtasks, phase_name))
        .sum()
}

/// Rewrite the cached `task_count` of each phase from the tasks
pub fn refresh_phase_counts(phases: &mut [Phase], tasks: &[WorkspaceTask]) {
    for phase in phases {
        phase.task_count = phase_task_count(tasks, &phase.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::project::{Project, ProjectStatus};
    use crate::model::task::TaskStatus;
    use chrono::Utc;

    fn project(id: &str) -> Project {
        Project {
            id: id.to_string(),
            name: format!("Project {}", id),
            description: String::new(),
            status: ProjectStatus::Active,
            owner_id: None,
            start_date: None,
            end_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn store() -> EntityStore {
        let mut store = EntityStore {
            projects: vec![project("P-001"), project("P-002")],
            ..Default::default()
        };
        create_space(&mut store, "Engineering", "gear").unwrap();
        create_space(&mut store, "Marketing", "megaphone").unwrap();
        store
    }

    fn members(store: &EntityStore, space_id: &str) -> Vec<String> {
        store.space(space_id).unwrap().project_ids.iter().cloned().collect()
    }

    #[test]
    fn create_space_assigns_sequential_ids() {
        let store = store();
        let ids: Vec<&str> = store.spaces.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["S-001", "S-002"]);
    }

    #[test]
    fn create_space_rejects_blank_name() {
        let mut store = store();
        assert!(create_space(&mut store, " ", "x").is_err());
        assert_eq!(store.spaces.len(), 2);
    }

    #[test]
    fn membership_is_exclusive() {
        let mut store = store();
        assign_project_to_space(&mut store, "P-001", "S-001").unwrap();
        assign_project_to_space(&mut store, "P-001", "S-002").unwrap();
        assert!(members(&store, "S-001").is_empty());
        assert_eq!(members(&store, "S-002"), ["P-001"]);
        assert_eq!(space_of(&store, "P-001").unwrap().id, "S-002");
    }

    #[test]
    fn assign_is_idempotent() {
        let mut store = store();
        assign_project_to_space(&mut store, "P-001", "S-001").unwrap();
        assign_project_to_space(&mut store, "P-002", "S-001").unwrap();
        let before = store.clone();
        assign_project_to_space(&mut store, "P-001", "S-001").unwrap();
        assert_eq!(store, before);
        assert_eq!(members(&store, "S-001"), ["P-001", "P-002"]);
    }

    #[test]
    fn move_project_follows_assign_contract() {
        let mut store = store();
        move_project(&mut store, "P-002", "S-001").unwrap();
        move_project(&mut store, "P-002", "S-002").unwrap();
        assert!(members(&store, "S-001").is_empty());
        assert_eq!(members(&store, "S-002"), ["P-002"]);
    }

    #[test]
    fn unknown_ids_leave_membership_alone() {
        let mut store = store();
        assign_project_to_space(&mut store, "P-001", "S-001").unwrap();
        let before = store.clone();
        assert_eq!(
            assign_project_to_space(&mut store, "P-001", "S-404"),
            Err(OpError::not_found(EntityKind::Space, "S-404"))
        );
        assert_eq!(
            move_project(&mut store, "P-404", "S-002"),
            Err(OpError::not_found(EntityKind::Project, "P-404"))
        );
        assert_eq!(store, before);
    }

    #[test]
    fn detach_removes_from_all_spaces() {
        let mut store = store();
        assign_project_to_space(&mut store, "P-001", "S-002").unwrap();
        assert!(detach_project(&mut store, "P-001").unwrap());
        assert!(!detach_project(&mut store, "P-001").unwrap());
        assert!(space_of(&store, "P-001").is_none());
    }

    #[test]
    fn phase_ids_are_unique_across_scopes() {
        let mut store = store();
        let a = create_project_phase(&mut store, "P-001", "Design", "#44DDFF").unwrap();
        let b = create_space_phase(&mut store, "S-001", "Design", "#4488FF").unwrap();
        let c = create_project_phase(&mut store, "P-002", "Build", "").unwrap();
        assert_eq!([a.as_str(), b.as_str(), c.as_str()], ["PH-001", "PH-002", "PH-003"]);
        assert_eq!(store.project_phases("P-001")[0].task_count, 0);
        assert_eq!(store.space("S-001").unwrap().phases[0].name, "Design");
    }

    #[test]
    fn phase_creation_validates() {
        let mut store = store();
        assert!(matches!(
            create_project_phase(&mut store, "P-001", "", "x"),
            Err(OpError::Validation(_))
        ));
        assert!(matches!(
            create_project_phase(&mut store, "P-404", "Design", "x"),
            Err(OpError::NotFound { .. })
        ));
        assert!(matches!(
            create_space_phase(&mut store, "S-404", "Design", "x"),
            Err(OpError::NotFound { .. })
        ));
        assert!(store.phases.is_empty());
    }

    #[test]
    fn resolve_prefers_project_phases_over_space_phases() {
        let mut store = store();
        assign_project_to_space(&mut store, "P-001", "S-001").unwrap();
        create_space_phase(&mut store, "S-001", "Shared", "").unwrap();
        assert_eq!(resolve_phases(&store, "P-001")[0].name, "Shared");
        assert!(resolve_phases(&store, "P-002").is_empty());

        create_project_phase(&mut store, "P-001", "Own", "").unwrap();
        assert_eq!(resolve_phases(&store, "P-001")[0].name, "Own");
    }

    #[test]
    fn phase_counts_come_from_tasks() {
        let mut a = WorkspaceTask::new("T-1", "a", TaskStatus::Todo);
        a.phase = "Design".into();
        let mut sub = WorkspaceTask::new("T-1.1", "b", TaskStatus::Todo);
        sub.phase = "Design".into();
        a.subtasks.push(sub);
        let mut b = WorkspaceTask::new("T-2", "c", TaskStatus::Todo);
        b.phase = "Build".into();
        let tasks = vec![a, b];

        let mut phases = vec![Phase::new("PH-1", "Design", ""), Phase::new("PH-2", "Ship", "")];
        refresh_phase_counts(&mut phases, &tasks);
        assert_eq!(phases[0].task_count, 2);
        assert_eq!(phases[1].task_count, 0);
    }
}

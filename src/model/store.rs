use indexmap::IndexMap;

use super::phase::Phase;
use super::project::Project;
use super::space::Space;
use super::task::WorkspaceTask;

/// Project id → ordered phase list
pub type PhaseMap = IndexMap<String, Vec<Phase>>;
/// Project id → ordered task list
pub type TaskMap = IndexMap<String, Vec<WorkspaceTask>>;

/// The canonical in-memory collections of a workspace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityStore {
    pub spaces: Vec<Space>,
    pub projects: Vec<Project>,
    pub phases: PhaseMap,
    pub tasks: TaskMap,
}

impl EntityStore {
    pub fn project(&self, project_id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == project_id)
    }

    pub fn has_project(&self, project_id: &str) -> bool {
        self.project(project_id).is_some()
    }

    pub fn space(&self, space_id: &str) -> Option<&Space> {
        self.spaces.iter().find(|s| s.id == space_id)
    }

    pub fn space_mut(&mut self, space_id: &str) -> Option<&mut Space> {
        self.spaces.iter_mut().find(|s| s.id == space_id)
    }

    /// Tasks of a project, or an empty slice if it has none yet
    pub fn project_tasks(&self, project_id: &str) -> &[WorkspaceTask] {
        self.tasks.get(project_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mutable task list of a project, created empty on first access
    pub fn project_tasks_mut(&mut self, project_id: &str) -> &mut Vec<WorkspaceTask> {
        self.tasks.entry(project_id.to_string()).or_default()
    }

    pub fn project_phases(&self, project_id: &str) -> &[Phase] {
        self.phases.get(project_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

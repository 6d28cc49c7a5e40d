//! The workspace service: the entity store, its persistence, and the seed
//! source it is filled from.
//!
//! Every change goes through [`Workspace::mutate`]: the operation runs on a
//! copy of the store, the copy replaces the store only if the operation
//! succeeds, and then the touched collections are written out.

use indexmap::IndexMap;

use crate::io::kv::{KeyValueStore, PersistenceError};
use crate::io::recovery;
use crate::io::seed::{DEFAULT_PHASES, SeedError, SeedSource};
use crate::io::snapshot::Synchronizer;
use crate::model::config::GroupBy;
use crate::model::formula::FormulaConfig;
use crate::model::phase::Phase;
use crate::model::prefs::UiPrefs;
use crate::model::project::{Project, ProjectDraft, User};
use crate::model::space::Space;
use crate::model::store::EntityStore;
use crate::model::task::{TaskStatus, WorkspaceTask};
use crate::ops::formula::apply_formula;
use crate::ops::grouping::group_tasks;
use crate::ops::hierarchy::{self, phase_task_count, refresh_phase_counts};
use crate::ops::reorder::{self, ReorderOutcome};
use crate::ops::task_ops::{self, InsertPosition, TargetGroup, TaskEdit};
use crate::ops::{EntityKind, OpError, next_id, require_name};

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Op(#[from] OpError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Seed(#[from] SeedError),
}

/// A persisted collection of the entity store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Spaces,
    Projects,
    Phases,
    Tasks,
}

/// What boot had to fill in from the seed source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootReport {
    pub seeded: Vec<Collection>,
}

/// What a refresh filled in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Whether memory was replaced by newer stored snapshots
    pub reloaded: bool,
    pub projects_added: usize,
    /// Projects whose empty task list was filled
    pub filled: Vec<String>,
}

pub struct Workspace<S: KeyValueStore> {
    store: EntityStore,
    sync: Synchronizer<S>,
    seed: Box<dyn SeedSource>,
    formula: FormulaConfig,
}

impl<S: KeyValueStore> Workspace<S> {
    /// Load every snapshot from `kv`. Collections with no (or an unreadable)
    /// snapshot are filled from `seed` and written back right away.
    pub fn boot(
        kv: S,
        seed: Box<dyn SeedSource>,
        formula: FormulaConfig,
    ) -> Result<(Self, BootReport), WorkspaceError> {
        let sync = Synchronizer::new(kv);
        let store = sync.load_snapshot();
        let mut ws = Workspace {
            store,
            sync,
            seed,
            formula,
        };
        let report = ws.seed_empty_collections();
        ws.persist(&report.seeded)?;
        Ok((ws, report))
    }

    fn seed_empty_collections(&mut self) -> BootReport {
        let mut seeded = Vec::new();

        if self.store.projects.is_empty()
            && let Some(projects) = self.seed_call("get_projects", |s| s.get_projects())
            && !projects.is_empty()
        {
            self.store.projects = projects;
            seeded.push(Collection::Projects);
        }

        if self.store.spaces.is_empty() {
            let mut spaces = self
                .seed_call("get_spaces", |s| s.get_spaces())
                .unwrap_or_default();
            if spaces.is_empty() && !self.store.projects.is_empty() {
                let mut general = Space::new("S-001", "General", "folder");
                general
                    .project_ids
                    .extend(self.store.projects.iter().map(|p| p.id.clone()));
                spaces.push(general);
            }
            if !spaces.is_empty() {
                self.store.spaces = spaces;
                seeded.push(Collection::Spaces);
            }
        }

        if self.store.tasks.is_empty() {
            for project_id in self.project_ids() {
                let Some(mut tasks) = self.seed_call("get_tasks_by_project", |s| {
                    s.get_tasks_by_project(&project_id)
                }) else {
                    continue;
                };
                apply_formula(&mut tasks, &self.formula);
                self.store.tasks.insert(project_id, tasks);
            }
            if !self.store.tasks.is_empty() {
                seeded.push(Collection::Tasks);
            }
        }

        if self.store.phases.is_empty() && !self.store.projects.is_empty() {
            for project_id in self.project_ids() {
                for (name, color) in DEFAULT_PHASES {
                    let phase = Phase::new(hierarchy::next_phase_id(&self.store), name, color);
                    self.store.phases.entry(project_id.clone()).or_default().push(phase);
                }
            }
            recount_phases(&mut self.store);
            seeded.push(Collection::Phases);
        }

        BootReport { seeded }
    }

    /// Run a seed source call, logging a failure instead of returning it
    fn seed_call<T>(
        &self,
        operation: &str,
        call: impl FnOnce(&dyn SeedSource) -> Result<T, SeedError>,
    ) -> Option<T> {
        match call(self.seed.as_ref()) {
            Ok(value) => Some(value),
            Err(e) => {
                eprintln!("warning: seed {} failed: {}", operation, e);
                if let Some(dir) = self.sync.store().log_dir() {
                    recovery::log_seed_failure(dir, operation, &e.to_string());
                }
                None
            }
        }
    }

    fn project_ids(&self) -> Vec<String> {
        self.store.projects.iter().map(|p| p.id.clone()).collect()
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Apply `f` to a working copy of the store. On success the copy becomes
    /// the store and the `touched` collections are written; on error nothing
    /// changes. A copy equal to the store writes nothing. A failed write
    /// keeps the in-memory change and returns the write error.
    pub fn mutate<T>(
        &mut self,
        touched: &[Collection],
        f: impl FnOnce(&mut EntityStore) -> Result<T, OpError>,
    ) -> Result<T, WorkspaceError> {
        let mut working = self.store.clone();
        let value = f(&mut working)?;
        if working == self.store {
            return Ok(value);
        }
        self.store = working;
        self.persist(touched)?;
        Ok(value)
    }

    fn persist(&mut self, touched: &[Collection]) -> Result<(), PersistenceError> {
        let mut touched = touched.to_vec();
        if touched.contains(&Collection::Tasks) && recount_phases(&mut self.store) {
            touched.push(Collection::Phases);
            touched.push(Collection::Spaces);
        }
        for collection in [
            Collection::Projects,
            Collection::Spaces,
            Collection::Phases,
            Collection::Tasks,
        ] {
            if !touched.contains(&collection) {
                continue;
            }
            match collection {
                Collection::Projects => self.sync.save_projects(&self.store.projects)?,
                Collection::Spaces => self.sync.save_spaces(&self.store.spaces)?,
                Collection::Phases => self.sync.save_phases(&self.store.phases)?,
                Collection::Tasks => self.sync.save_tasks(&self.store.tasks)?,
            };
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn synchronizer(&self) -> &Synchronizer<S> {
        &self.sync
    }

    pub fn formula(&self) -> &FormulaConfig {
        &self.formula
    }

    pub fn set_formula(&mut self, formula: FormulaConfig) {
        self.formula = formula;
    }

    pub fn users(&self) -> Vec<User> {
        self.seed_call("get_users", |s| s.get_users())
            .unwrap_or_default()
    }

    fn require_project(&self, project_id: &str) -> Result<&Project, OpError> {
        self.store
            .project(project_id)
            .ok_or_else(|| OpError::not_found(EntityKind::Project, project_id))
    }

    pub fn tasks(&self, project_id: &str) -> Result<&[WorkspaceTask], OpError> {
        self.require_project(project_id)?;
        Ok(self.store.project_tasks(project_id))
    }

    /// Group a project's top-level tasks for display
    pub fn group(
        &self,
        project_id: &str,
        by: GroupBy,
    ) -> Result<IndexMap<String, Vec<&WorkspaceTask>>, OpError> {
        Ok(group_tasks(self.tasks(project_id)?, by))
    }

    /// Phases in effect for a project
    pub fn phases_for(&self, project_id: &str) -> Result<&[Phase], OpError> {
        self.require_project(project_id)?;
        Ok(hierarchy::resolve_phases(&self.store, project_id))
    }

    // -----------------------------------------------------------------------
    // Spaces and projects
    // -----------------------------------------------------------------------

    pub fn create_space(&mut self, name: &str, icon: &str) -> Result<String, WorkspaceError> {
        self.mutate(&[Collection::Spaces], |s| hierarchy::create_space(s, name, icon))
    }

    pub fn assign_project_to_space(&mut self, project_id: &str, space_id: &str) -> Result<(), WorkspaceError> {
        self.mutate(&[Collection::Spaces], |s| {
            hierarchy::assign_project_to_space(s, project_id, space_id)
        })
    }

    pub fn move_project(&mut self, project_id: &str, space_id: &str) -> Result<(), WorkspaceError> {
        self.mutate(&[Collection::Spaces], |s| hierarchy::move_project(s, project_id, space_id))
    }

    pub fn detach_project(&mut self, project_id: &str) -> Result<bool, WorkspaceError> {
        self.mutate(&[Collection::Spaces], |s| hierarchy::detach_project(s, project_id))
    }

    /// Create a project through the seed source and add it to the store,
    /// optionally inside a space.
    pub fn create_project(
        &mut self,
        draft: ProjectDraft,
        space_id: Option<&str>,
    ) -> Result<Project, WorkspaceError> {
        if let Some(space_id) = space_id
            && self.store.space(space_id).is_none()
        {
            return Err(OpError::not_found(EntityKind::Space, space_id).into());
        }
        require_name(&draft.name, "project")?;
        let mut project = self.seed.create_project(draft).inspect_err(|e| {
            if let Some(dir) = self.sync.store().log_dir() {
                recovery::log_seed_failure(dir, "create_project", &e.to_string());
            }
        })?;
        // The seed numbers projects by what it knows; the store may hold more
        if self.store.has_project(&project.id) {
            project.id = next_id("P", self.store.projects.iter().map(|p| p.id.as_str()));
        }

        let created = project.clone();
        let mut touched = vec![Collection::Projects];
        if space_id.is_some() {
            touched.push(Collection::Spaces);
        }
        self.mutate(&touched, |s| {
            s.projects.push(project);
            match space_id {
                Some(space_id) => hierarchy::assign_project_to_space(s, &created.id, space_id),
                None => Ok(()),
            }
        })?;
        Ok(created)
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    pub fn create_project_phase(&mut self, project_id: &str, name: &str, color: &str) -> Result<String, WorkspaceError> {
        self.mutate(&[Collection::Phases], |s| {
            let id = hierarchy::create_project_phase(s, project_id, name, color)?;
            recount_phases(s);
            Ok(id)
        })
    }

    pub fn create_space_phase(&mut self, space_id: &str, name: &str, color: &str) -> Result<String, WorkspaceError> {
        self.mutate(&[Collection::Spaces], |s| {
            let id = hierarchy::create_space_phase(s, space_id, name, color)?;
            recount_phases(s);
            Ok(id)
        })
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    pub fn add_task(
        &mut self,
        project_id: &str,
        name: &str,
        group: Option<TargetGroup<'_>>,
        position: InsertPosition,
    ) -> Result<String, WorkspaceError> {
        let formula = self.formula.clone();
        self.mutate(&[Collection::Tasks], |s| {
            let id = task_ops::add_task(s, project_id, name, group, position)?;
            apply_formula(s.project_tasks_mut(project_id), &formula);
            Ok(id)
        })
    }

    pub fn add_subtask(&mut self, project_id: &str, parent_id: &str, name: &str) -> Result<String, WorkspaceError> {
        let formula = self.formula.clone();
        self.mutate(&[Collection::Tasks], |s| {
            let id = task_ops::add_subtask(s, project_id, parent_id, name)?;
            apply_formula(s.project_tasks_mut(project_id), &formula);
            Ok(id)
        })
    }

    pub fn set_status(&mut self, project_id: &str, task_id: &str, status: TaskStatus) -> Result<(), WorkspaceError> {
        self.mutate(&[Collection::Tasks], |s| task_ops::set_status(s, project_id, task_id, status))
    }

    /// Edit task fields, recomputing the derived column afterwards
    pub fn edit_task(&mut self, project_id: &str, task_id: &str, edit: TaskEdit) -> Result<(), WorkspaceError> {
        let formula = self.formula.clone();
        self.mutate(&[Collection::Tasks], |s| {
            task_ops::edit_task(s, project_id, task_id, edit)?;
            apply_formula(s.project_tasks_mut(project_id), &formula);
            Ok(())
        })
    }

    /// Delete a task and its subtasks. The deleted JSON goes to the recovery
    /// log.
    pub fn delete_task(&mut self, project_id: &str, task_id: &str) -> Result<WorkspaceTask, WorkspaceError> {
        let removed = self.mutate(&[Collection::Tasks], |s| task_ops::delete_task(s, project_id, task_id))?;
        if let Some(dir) = self.sync.store().log_dir() {
            let body = serde_json::to_string_pretty(&removed).unwrap_or_default();
            recovery::log_task_deletion(dir, project_id, task_id, &body);
        }
        Ok(removed)
    }

    /// Drop `dragged_id` onto `target_id` inside the group `target_group_key`.
    /// A move submits the new order of the affected list to storage.
    pub fn reorder(
        &mut self,
        project_id: &str,
        dragged_id: &str,
        target_id: &str,
        target_group_key: &str,
        by: GroupBy,
    ) -> Result<ReorderOutcome, WorkspaceError> {
        self.require_project(project_id)?;
        let mut working = self.store.clone();
        let outcome = reorder::reorder(
            working.project_tasks_mut(project_id),
            dragged_id,
            target_id,
            target_group_key,
            by,
        )?;
        if let ReorderOutcome::Moved { order, .. } = &outcome {
            self.store = working;
            self.sync.submit_order(project_id, order, &self.store.tasks)?;
            if recount_phases(&mut self.store) {
                self.persist(&[Collection::Phases, Collection::Spaces])?;
            }
        }
        Ok(outcome)
    }

    /// Recompute `budgetRemaining` with the active formula, for one project
    /// or all of them. Returns how many tasks were visited.
    pub fn apply_formula(&mut self, project_id: Option<&str>) -> Result<usize, WorkspaceError> {
        if let Some(id) = project_id {
            self.require_project(id)?;
        }
        let formula = self.formula.clone();
        self.mutate(&[Collection::Tasks], |s| {
            let mut visited = 0;
            for (id, tasks) in s.tasks.iter_mut() {
                if project_id.is_none_or(|p| p == id.as_str()) {
                    visited += apply_formula(tasks, &formula);
                }
            }
            Ok(visited)
        })
    }

    /// Re-copy assignee display fields from the seed source's users, on top
    /// of whatever storage currently holds
    pub fn refresh_assignees(&mut self) -> Result<usize, WorkspaceError> {
        self.sync.reconcile(&mut self.store);
        let users = self.users();
        self.mutate(&[Collection::Tasks], |s| {
            Ok(s.tasks
                .values_mut()
                .map(|tasks| task_ops::refresh_assignees(tasks, &users))
                .sum())
        })
    }

    // -----------------------------------------------------------------------
    // Refresh
    // -----------------------------------------------------------------------

    /// Pull from storage and the seed source without overwriting anything
    /// that already has data. Non-empty snapshots replace memory first, then
    /// only projects that still have no tasks are filled from the seed.
    pub fn refresh(&mut self) -> Result<RefreshReport, WorkspaceError> {
        let mut report = RefreshReport {
            reloaded: self.sync.reconcile(&mut self.store),
            ..Default::default()
        };

        let mut touched = Vec::new();
        if self.store.projects.is_empty()
            && let Some(projects) = self.seed_call("get_projects", |s| s.get_projects())
            && !projects.is_empty()
        {
            report.projects_added = projects.len();
            self.store.projects = projects;
            touched.push(Collection::Projects);
        }

        for project_id in self.project_ids() {
            if !self.store.project_tasks(&project_id).is_empty() {
                continue;
            }
            let Some(mut tasks) = self.seed_call("get_tasks_by_project", |s| {
                s.get_tasks_by_project(&project_id)
            }) else {
                continue;
            };
            if tasks.is_empty() {
                continue;
            }
            apply_formula(&mut tasks, &self.formula);
            self.store.tasks.insert(project_id.clone(), tasks);
            report.filled.push(project_id);
        }
        if !report.filled.is_empty() {
            touched.push(Collection::Tasks);
        }

        self.persist(&touched)?;
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Preferences
    // -----------------------------------------------------------------------

    pub fn prefs(&self) -> UiPrefs {
        self.sync.load_prefs()
    }

    pub fn set_prefs(&mut self, prefs: &UiPrefs) -> Result<(), WorkspaceError> {
        Ok(self.sync.save_prefs(prefs)?)
    }
}

/// Rewrite every cached phase count: project phases from the project's
/// tasks, space phases from the tasks of all projects in the space. Returns
/// whether any count changed.
fn recount_phases(store: &mut EntityStore) -> bool {
    let before: Vec<usize> = all_counts(store);

    let EntityStore {
        spaces,
        phases,
        tasks,
        ..
    } = store;
    for (project_id, project_phases) in phases.iter_mut() {
        let project_tasks = tasks.get(project_id).map(Vec::as_slice).unwrap_or(&[]);
        refresh_phase_counts(project_phases, project_tasks);
    }
    for space in spaces.iter_mut() {
        for phase in &mut space.phases {
            phase.task_count = space
                .project_ids
                .iter()
                .filter_map(|id| tasks.get(id))
                .map(|t| phase_task_count(t, &phase.name))
                .sum();
        }
    }

    before != all_counts(store)
}

fn all_counts(store: &EntityStore) -> Vec<usize> {
    let space_counts = store.spaces.iter().flat_map(|s| s.phases.iter());
    let project_counts = store.phases.values().flatten();
    space_counts.chain(project_counts).map(|p| p.task_count).collect()
}

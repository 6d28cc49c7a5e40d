use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::io::kv::{KeyValueStore, PersistenceError};
use crate::io::recovery;
use crate::model::prefs::UiPrefs;
use crate::model::project::Project;
use crate::model::space::Space;
use crate::model::store::{EntityStore, PhaseMap, TaskMap};
use crate::ops::reorder::{OrderUpdate, is_contiguous_order, list_containing};

pub const SPACES_KEY: &str = "taskflow_spaces";
pub const PROJECT_PHASES_KEY: &str = "taskflow_project_phases";
pub const PROJECT_TASKS_KEY: &str = "taskflow_project_tasks";
pub const SIDEBAR_COLLAPSED_KEY: &str = "taskflow_sidebar_collapsed";
pub const VISIBLE_VIEWS_KEY: &str = "taskflow_visible_views";
pub const PROJECTS_KEY: &str = "taskflow_projects";

/// What a save did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    /// The collection was empty; the stored snapshot was left alone
    SkippedEmpty,
}

/// Mirrors the entity store into a key-value store, one snapshot per
/// collection. Saves replace the whole snapshot. Saving an empty
/// collection does nothing, so an uninitialized memory state can never wipe
/// what is on disk.
pub struct Synchronizer<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> Synchronizer<S> {
    pub fn new(store: S) -> Self {
        Synchronizer { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    // -----------------------------------------------------------------------
    // Raw access
    // -----------------------------------------------------------------------

    /// Read and decode a snapshot. Absent, unreadable and malformed
    /// snapshots all come back as `None`; the latter two are logged.
    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                eprintln!("warning: {}", e);
                if let Some(dir) = self.store.log_dir() {
                    recovery::log_discarded_snapshot(dir, key, &e.to_string(), "");
                }
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(source) => {
                let e = PersistenceError::Malformed {
                    key: key.to_string(),
                    source,
                };
                eprintln!("warning: {} (ignored)", e);
                if let Some(dir) = self.store.log_dir() {
                    recovery::log_discarded_snapshot(dir, key, &e.to_string(), &raw);
                }
                None
            }
        }
    }

    fn write<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(value).map_err(|source| PersistenceError::Serialize {
            key: key.to_string(),
            source,
        })?;
        if let Err(e) = self.store.set(key, &json) {
            if let Some(dir) = self.store.log_dir() {
                recovery::log_failed_write(dir, key, &e.to_string(), &json);
            }
            return Err(e);
        }
        Ok(())
    }

    fn write_non_empty<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
        is_empty: bool,
    ) -> Result<SaveOutcome, PersistenceError> {
        if is_empty {
            return Ok(SaveOutcome::SkippedEmpty);
        }
        self.write(key, value)?;
        Ok(SaveOutcome::Written)
    }

    // -----------------------------------------------------------------------
    // Collections
    // -----------------------------------------------------------------------

    pub fn load_spaces(&self) -> Vec<Space> {
        self.read(SPACES_KEY).unwrap_or_default()
    }

    pub fn save_spaces(&mut self, spaces: &[Space]) -> Result<SaveOutcome, PersistenceError> {
        self.write_non_empty(SPACES_KEY, spaces, spaces.is_empty())
    }

    pub fn load_projects(&self) -> Vec<Project> {
        self.read(PROJECTS_KEY).unwrap_or_default()
    }

    pub fn save_projects(&mut self, projects: &[Project]) -> Result<SaveOutcome, PersistenceError> {
        self.write_non_empty(PROJECTS_KEY, projects, projects.is_empty())
    }

    pub fn load_phases(&self) -> PhaseMap {
        self.read(PROJECT_PHASES_KEY).unwrap_or_default()
    }

    pub fn save_phases(&mut self, phases: &PhaseMap) -> Result<SaveOutcome, PersistenceError> {
        self.write_non_empty(PROJECT_PHASES_KEY, phases, phases.is_empty())
    }

    pub fn load_tasks(&self) -> TaskMap {
        self.read(PROJECT_TASKS_KEY).unwrap_or_default()
    }

    pub fn save_tasks(&mut self, tasks: &TaskMap) -> Result<SaveOutcome, PersistenceError> {
        self.write_non_empty(PROJECT_TASKS_KEY, tasks, tasks.is_empty())
    }

    pub fn load_prefs(&self) -> UiPrefs {
        let defaults = UiPrefs::default();
        UiPrefs {
            sidebar_collapsed: self
                .read(SIDEBAR_COLLAPSED_KEY)
                .unwrap_or(defaults.sidebar_collapsed),
            visible_views: self.read(VISIBLE_VIEWS_KEY).unwrap_or(defaults.visible_views),
        }
    }

    pub fn save_prefs(&mut self, prefs: &UiPrefs) -> Result<(), PersistenceError> {
        self.write(SIDEBAR_COLLAPSED_KEY, &prefs.sidebar_collapsed)?;
        self.write(VISIBLE_VIEWS_KEY, &prefs.visible_views)
    }

    // -----------------------------------------------------------------------
    // Whole store
    // -----------------------------------------------------------------------

    /// Everything persisted, with unreadable snapshots as empty collections
    pub fn load_snapshot(&self) -> EntityStore {
        EntityStore {
            spaces: self.load_spaces(),
            projects: self.load_projects(),
            phases: self.load_phases(),
            tasks: self.load_tasks(),
        }
    }

    /// Write every non-empty collection
    pub fn save_snapshot(&mut self, store: &EntityStore) -> Result<(), PersistenceError> {
        self.save_projects(&store.projects)?;
        self.save_spaces(&store.spaces)?;
        self.save_phases(&store.phases)?;
        self.save_tasks(&store.tasks)?;
        Ok(())
    }

    /// Bring memory up to date with storage. Every non-empty snapshot
    /// replaces its in-memory collection, since another process may have
    /// written it since memory was loaded. Empty or unreadable snapshots
    /// leave memory alone. Returns whether memory changed.
    pub fn reconcile(&self, memory: &mut EntityStore) -> bool {
        let stored = self.load_snapshot();
        let mut changed = false;
        changed |= adopt(&mut memory.spaces, stored.spaces, Vec::is_empty);
        changed |= adopt(&mut memory.projects, stored.projects, Vec::is_empty);
        changed |= adopt(&mut memory.phases, stored.phases, IndexMap::is_empty);
        changed |= adopt(&mut memory.tasks, stored.tasks, IndexMap::is_empty);
        changed
    }

    /// Persist a batch of order indices for one of a project's lists.
    ///
    /// The batch must number one of the project's lists 1..=N, in list
    /// order, without gaps. The task snapshot is then written whole, so the
    /// most recent batch is what ends up stored.
    pub fn submit_order(
        &mut self,
        project_id: &str,
        updates: &[OrderUpdate],
        tasks: &TaskMap,
    ) -> Result<SaveOutcome, PersistenceError> {
        let project_tasks = tasks.get(project_id).map(Vec::as_slice).unwrap_or(&[]);
        let list = updates
            .first()
            .and_then(|u| list_containing(project_tasks, &u.id))
            .unwrap_or(&[]);
        if !is_contiguous_order(list, updates) {
            return Err(PersistenceError::InvalidOrder {
                project: project_id.to_string(),
            });
        }
        self.save_tasks(tasks)
    }
}

fn adopt<T: PartialEq>(memory: &mut T, stored: T, is_empty: impl Fn(&T) -> bool) -> bool {
    if is_empty(&stored) || *memory == stored {
        return false;
    }
    *memory = stored;
    true
}

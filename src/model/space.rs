use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::phase::Phase;

/// A top-level container owning projects and space-scoped phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    /// Member project ids. A project id is in at most one space.
    #[serde(default)]
    pub project_ids: IndexSet<String>,
    #[serde(default)]
    pub phases: Vec<Phase>,
}

impl Space {
    pub fn new(id: impl Into<String>, name: impl Into<String>, icon: impl Into<String>) -> Self {
        Space {
            id: id.into(),
            name: name.into(),
            icon: icon.into(),
            project_ids: IndexSet::new(),
            phases: Vec::new(),
        }
    }

    pub fn contains_project(&self, project_id: &str) -> bool {
        self.project_ids.contains(project_id)
    }
}

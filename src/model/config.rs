use std::fmt;

use serde::{Deserialize, Serialize};

use super::formula::FormulaConfig;

/// Configuration from taskflow.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub workspace: WorkspaceInfo,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub formula: FormulaConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub name: String,
}

impl Default for WorkspaceInfo {
    fn default() -> Self {
        WorkspaceInfo {
            name: "workspace".to_string(),
        }
    }
}

/// Attribute used to partition a task list into groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    None,
    #[default]
    Status,
    Sprint,
    Assignee,
    Phase,
}

impl GroupBy {
    pub fn parse(s: &str) -> Option<GroupBy> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Some(GroupBy::None),
            "status" => Some(GroupBy::Status),
            "sprint" => Some(GroupBy::Sprint),
            "assignee" => Some(GroupBy::Assignee),
            "phase" => Some(GroupBy::Phase),
            _ => None,
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GroupBy::None => "none",
            GroupBy::Status => "status",
            GroupBy::Sprint => "sprint",
            GroupBy::Assignee => "assignee",
            GroupBy::Phase => "phase",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default)]
    pub group_by: GroupBy,
}

/// Where boot-time seed data comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedKind {
    #[default]
    Sample,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub source: SeedKind,
    /// Seed file, relative to the taskflow/ directory
    #[serde(default)]
    pub file: Option<String>,
    /// Default: see src/cli/handlers/init.rs template
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        SeedConfig {
            source: SeedKind::Sample,
            file: None,
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

/// Default: see src/cli/handlers/init.rs template
fn default_refresh_interval() -> u64 {
    30
}

use serde::{Deserialize, Serialize};

/// A named label used to bucket tasks.
///
/// `task_count` is a cached display value. The authoritative count comes from
/// the tasks whose `phase` field equals `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub task_count: usize,
}

impl Phase {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Phase {
            id: id.into(),
            name: name.into(),
            color: color.into(),
            task_count: 0,
        }
    }
}

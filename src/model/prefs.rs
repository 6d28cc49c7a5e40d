/// View ids shown when nothing has been persisted yet
pub const DEFAULT_VIEWS: [&str; 3] = ["list", "board", "timeline"];

/// Presentation preferences persisted next to the workspace snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiPrefs {
    pub sidebar_collapsed: bool,
    pub visible_views: Vec<String>,
}

impl Default for UiPrefs {
    fn default() -> Self {
        UiPrefs {
            sidebar_collapsed: false,
            visible_views: DEFAULT_VIEWS.iter().map(|v| v.to_string()).collect(),
        }
    }
}

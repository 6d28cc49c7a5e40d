use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tf", about = concat!("taskflow v", env!("CARGO_PKG_VERSION"), " - spaces, projects, phases and tasks"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different workspace directory
    #[arg(short = 'C', long = "workspace-dir", global = true)]
    pub workspace_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a taskflow/ workspace in the current directory
    Init(InitArgs),
    /// Space management
    Space(SpaceCmd),
    /// Project management
    Project(ProjectCmd),
    /// Phase management
    Phase(PhaseCmd),
    /// Task management
    Task(TaskCmd),
    /// List a project's tasks in groups
    List(ListArgs),
    /// Drop a task onto another task (reorder, and regroup by phase or status)
    Mv(MvArgs),
    /// Show or change the budgetRemaining formula
    Formula(FormulaCmd),
    /// Fill empty projects from the seed source
    Refresh(RefreshArgs),
    /// Show or change view preferences
    Prefs(PrefsArgs),
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Workspace name (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Seed from a JSON file instead of the built-in sample data
    #[arg(long)]
    pub seed_file: Option<String>,
}

// ---------------------------------------------------------------------------
// Spaces
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct SpaceCmd {
    #[command(subcommand)]
    pub action: SpaceAction,
}

#[derive(Subcommand)]
pub enum SpaceAction {
    /// Create a space
    New(SpaceNewArgs),
    /// List spaces and their projects
    List,
    /// Put a project in a space (removing it from any other)
    Assign(SpaceAssignArgs),
    /// Drag a project onto a space
    Mv(SpaceAssignArgs),
    /// Take a project out of its space
    Detach(ProjectIdArg),
}

#[derive(Args)]
pub struct SpaceNewArgs {
    /// Space name
    pub name: String,
    /// Icon name
    #[arg(long, default_value = "folder")]
    pub icon: String,
}

#[derive(Args)]
pub struct SpaceAssignArgs {
    /// Project ID
    pub project: String,
    /// Space ID
    pub space: String,
}

#[derive(Args)]
pub struct ProjectIdArg {
    /// Project ID
    pub project: String,
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ProjectCmd {
    #[command(subcommand)]
    pub action: ProjectAction,
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a project
    New(ProjectNewArgs),
    /// List projects
    List,
}

#[derive(Args)]
pub struct ProjectNewArgs {
    /// Project name
    pub name: String,
    #[arg(long, default_value = "")]
    pub description: String,
    /// planning, active, on-hold, completed or archived
    #[arg(long)]
    pub status: Option<String>,
    /// Owner user ID
    #[arg(long)]
    pub owner: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub start: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub end: Option<String>,
    /// Space to put the project in
    #[arg(long)]
    pub space: Option<String>,
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct PhaseCmd {
    #[command(subcommand)]
    pub action: PhaseAction,
}

#[derive(Subcommand)]
pub enum PhaseAction {
    /// Create a phase for a project, or for a space with --space
    New(PhaseNewArgs),
    /// List the phases in effect for a project
    List(ProjectIdArg),
}

#[derive(Args)]
pub struct PhaseNewArgs {
    /// Project ID (or space ID with --space)
    pub owner: String,
    /// Phase name
    pub name: String,
    /// Hex color
    #[arg(long, default_value = "#6366F1")]
    pub color: String,
    /// Create a space-level phase
    #[arg(long)]
    pub space: bool,
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TaskCmd {
    #[command(subcommand)]
    pub action: TaskAction,
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task, optionally into a group
    Add(TaskAddArgs),
    /// Add a subtask
    Sub(TaskSubArgs),
    /// Change task status
    Status(TaskStatusArgs),
    /// Change task fields
    Set(TaskSetArgs),
    /// Delete a task and its subtasks
    Rm(TaskRefArgs),
    /// Show task details
    Show(TaskRefArgs),
}

#[derive(Args)]
pub struct TaskAddArgs {
    /// Project ID
    pub project: String,
    /// Task name
    pub name: String,
    /// Group to add into, e.g. "IN-PROGRESS" or "Design"
    #[arg(long)]
    pub group: Option<String>,
    /// Grouping dimension for --group (default: from taskflow.toml)
    #[arg(long)]
    pub by: Option<String>,
    /// Insert at the top of the group instead of the bottom
    #[arg(long)]
    pub top: bool,
}

#[derive(Args)]
pub struct TaskSubArgs {
    /// Project ID
    pub project: String,
    /// Parent task ID
    pub parent: String,
    /// Subtask name
    pub name: String,
}

#[derive(Args)]
pub struct TaskStatusArgs {
    /// Project ID
    pub project: String,
    /// Task ID
    pub id: String,
    /// todo, in-progress, ready, done, in-review, completed or new
    pub status: String,
}

#[derive(Args)]
pub struct TaskRefArgs {
    /// Project ID
    pub project: String,
    /// Task ID
    pub id: String,
}

#[derive(Args)]
pub struct TaskSetArgs {
    /// Project ID
    pub project: String,
    /// Task ID
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub budget: Option<f64>,
    /// Spent amount, e.g. "$1,200"
    #[arg(long)]
    pub spent: Option<String>,
    #[arg(long)]
    pub phase: Option<String>,
    #[arg(long)]
    pub progress: Option<f64>,
    /// Assignee user ID ("none" to clear)
    #[arg(long)]
    pub assignee: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub due: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub start: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub end: Option<String>,
}

// ---------------------------------------------------------------------------
// List / move
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Project ID
    pub project: String,
    /// none, status, sprint, assignee or phase (default: from taskflow.toml)
    #[arg(long)]
    pub by: Option<String>,
    /// Make --by the default grouping in taskflow.toml
    #[arg(long, requires = "by")]
    pub save: bool,
}

#[derive(Args)]
pub struct MvArgs {
    /// Project ID
    pub project: String,
    /// Task being dragged
    pub dragged: String,
    /// Task it is dropped onto
    pub target: String,
    /// Grouping dimension in effect (default: from taskflow.toml)
    #[arg(long)]
    pub by: Option<String>,
    /// Group the target is shown in (default: the target's own group)
    #[arg(long)]
    pub group: Option<String>,
}

// ---------------------------------------------------------------------------
// Formula
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct FormulaCmd {
    #[command(subcommand)]
    pub action: Option<FormulaAction>,
}

#[derive(Subcommand)]
pub enum FormulaAction {
    /// Show the active formula (default)
    Show,
    /// Use `<left> <operator> <right>` over budget, spent, budgetRemaining, progress
    Basic(FormulaBasicArgs),
    /// Use an arithmetic expression with field("Name") references
    Advanced(FormulaAdvancedArgs),
    /// Recompute budgetRemaining with the active formula
    Apply(FormulaApplyArgs),
}

#[derive(Args)]
pub struct FormulaBasicArgs {
    pub left: String,
    /// One of + - * /
    #[arg(allow_hyphen_values = true)]
    pub operator: String,
    pub right: String,
}

#[derive(Args)]
pub struct FormulaAdvancedArgs {
    /// e.g. 'field("Budget") - field("Spent")'
    pub expression: String,
}

#[derive(Args)]
pub struct FormulaApplyArgs {
    /// Only this project (default: all)
    pub project: Option<String>,
}

// ---------------------------------------------------------------------------
// Refresh / prefs
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RefreshArgs {
    /// Repeat every S seconds (default interval: from taskflow.toml)
    #[arg(long)]
    pub interval: Option<u64>,
    /// Number of refresh rounds when repeating
    #[arg(long, default_value = "1")]
    pub rounds: u32,
    /// Also re-copy assignee names and avatars from the seed users
    #[arg(long)]
    pub assignees: bool,
}

#[derive(Args)]
pub struct PrefsArgs {
    #[arg(long)]
    pub sidebar_collapsed: Option<bool>,
    /// Comma-separated view ids, e.g. list,board
    #[arg(long, value_delimiter = ',')]
    pub views: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
    /// Show entries after this timestamp (ISO-8601)
    #[arg(long)]
    pub since: Option<String>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries
    Prune(RecoveryPruneArgs),
    /// Print the absolute path to the recovery log
    Path,
}

#[derive(Args)]
pub struct RecoveryPruneArgs {
    /// Remove entries older than this timestamp (default: 30 days ago)
    #[arg(long)]
    pub before: Option<String>,
    /// Remove all entries
    #[arg(long)]
    pub all: bool,
}

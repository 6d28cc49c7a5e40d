//! Seed sources: where a workspace gets its projects, tasks and users when
//! nothing has been persisted yet.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::io::recovery::atomic_write;
use crate::model::project::{Project, ProjectDraft, ProjectStatus, User};
use crate::model::space::Space;
use crate::model::task::{TaskStatus, WorkspaceTask};
use crate::ops::next_id;
use crate::ops::task_ops::assignee_from_user;

/// Phases given to a project that has none: (name, color)
pub const DEFAULT_PHASES: [(&str, &str); 4] = [
    ("Planning", "#6366F1"),
    ("Design", "#FB4196"),
    ("Development", "#44DDFF"),
    ("Testing", "#F59E0B"),
];

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("could not read seed file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write seed file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid seed file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("project rejected: {0}")]
    Rejected(String),
}

/// The read API a workspace is seeded from
pub trait SeedSource {
    fn get_projects(&self) -> Result<Vec<Project>, SeedError>;
    fn create_project(&mut self, draft: ProjectDraft) -> Result<Project, SeedError>;
    fn get_tasks_by_project(&self, project_id: &str) -> Result<Vec<WorkspaceTask>, SeedError>;
    fn get_users(&self) -> Result<Vec<User>, SeedError>;

    /// Spaces to start with. Empty means the workspace builds its own.
    fn get_spaces(&self) -> Result<Vec<Space>, SeedError> {
        Ok(Vec::new())
    }
}

/// Seed data as stored in a JSON seed file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub users: Vec<User>,
    pub projects: Vec<Project>,
    pub spaces: Vec<Space>,
    /// Project id → tasks
    pub tasks: IndexMap<String, Vec<WorkspaceTask>>,
}

impl SeedData {
    fn create(&mut self, draft: ProjectDraft) -> Result<Project, SeedError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(SeedError::Rejected("project name is empty".into()));
        }
        if let (Some(start), Some(end)) = (draft.start_date, draft.end_date)
            && end < start
        {
            return Err(SeedError::Rejected(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
        let now = Utc::now();
        let project = Project {
            id: next_id("P", self.projects.iter().map(|p| p.id.as_str())),
            name: name.to_string(),
            description: draft.description,
            status: draft.status,
            owner_id: draft.owner_id,
            start_date: draft.start_date,
            end_date: draft.end_date,
            created_at: now,
            updated_at: now,
        };
        self.projects.push(project.clone());
        Ok(project)
    }

    fn tasks_of(&self, project_id: &str) -> Vec<WorkspaceTask> {
        self.tasks.get(project_id).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Built-in sample data
// ---------------------------------------------------------------------------

/// A fixed demo workspace: four users, three projects, two spaces
#[derive(Debug, Clone)]
pub struct SampleSeed {
    data: SeedData,
}

impl Default for SampleSeed {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSeed {
    pub fn new() -> Self {
        let users = sample_users();
        let projects = sample_projects();
        let tasks = sample_tasks(&users);

        let mut product = Space::new("S-001", "Product", "rocket");
        product.project_ids.extend(["P-001".to_string(), "P-002".to_string()]);
        let mut engineering = Space::new("S-002", "Engineering", "gear");
        engineering.project_ids.insert("P-003".to_string());

        SampleSeed {
            data: SeedData {
                users,
                projects,
                spaces: vec![product, engineering],
                tasks,
            },
        }
    }
}

impl SeedSource for SampleSeed {
    fn get_projects(&self) -> Result<Vec<Project>, SeedError> {
        Ok(self.data.projects.clone())
    }

    fn create_project(&mut self, draft: ProjectDraft) -> Result<Project, SeedError> {
        self.data.create(draft)
    }

    fn get_tasks_by_project(&self, project_id: &str) -> Result<Vec<WorkspaceTask>, SeedError> {
        Ok(self.data.tasks_of(project_id))
    }

    fn get_users(&self) -> Result<Vec<User>, SeedError> {
        Ok(self.data.users.clone())
    }

    fn get_spaces(&self) -> Result<Vec<Space>, SeedError> {
        Ok(self.data.spaces.clone())
    }
}

fn user(id: &str, name: &str, color: &str) -> User {
    let initials: String = name
        .split_whitespace()
        .filter_map(|w| w.chars().next())
        .collect();
    User {
        id: id.to_string(),
        name: name.to_string(),
        avatar: format!("/avatars/{}.png", id.to_lowercase()),
        initials,
        color: color.to_string(),
    }
}

fn sample_users() -> Vec<User> {
    vec![
        user("U-001", "Alice Chen", "#FB4196"),
        user("U-002", "Bruno Diaz", "#44DDFF"),
        user("U-003", "Chioma Obi", "#6366F1"),
        user("U-004", "Dev Patel", "#F59E0B"),
    ]
}

fn date(s: &str) -> Option<NaiveDate> {
    s.parse().ok()
}

fn sample_projects() -> Vec<Project> {
    let created = Utc::now();
    let project = |id: &str, name: &str, description: &str, status, owner: &str, start, end| Project {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        status,
        owner_id: Some(owner.to_string()),
        start_date: date(start),
        end_date: date(end),
        created_at: created,
        updated_at: created,
    };
    vec![
        project(
            "P-001",
            "Website Redesign",
            "New marketing site and brand refresh",
            ProjectStatus::Active,
            "U-001",
            "2026-01-05",
            "2026-04-30",
        ),
        project(
            "P-002",
            "Mobile App",
            "First release of the companion app",
            ProjectStatus::Planning,
            "U-002",
            "2026-03-01",
            "2026-08-31",
        ),
        project(
            "P-003",
            "Data Platform",
            "Warehouse migration and reporting",
            ProjectStatus::OnHold,
            "U-003",
            "2026-02-01",
            "2026-06-30",
        ),
    ]
}

struct SampleTask {
    id: &'static str,
    name: &'static str,
    status: TaskStatus,
    assignee: Option<usize>,
    budget: f64,
    sprint: &'static str,
    phase: &'static str,
    start: &'static str,
    end: &'static str,
}

impl SampleTask {
    fn build(&self, users: &[User]) -> WorkspaceTask {
        let mut task = WorkspaceTask::new(self.id, self.name, self.status);
        task.assignee = self.assignee.and_then(|i| users.get(i)).map(assignee_from_user);
        task.budget = self.budget;
        task.sprint = self.sprint.to_string();
        task.phase = self.phase.to_string();
        task.start_date = date(self.start);
        task.end_date = date(self.end);
        task.due_date = task.end_date;
        task
    }
}

#[rustfmt::skip]
const WEBSITE_TASKS: [SampleTask; 4] = [
    SampleTask { id: "T-001", name: "Wireframes", status: TaskStatus::InProgress, assignee: Some(0), budget: 1000.0, sprint: "$400", phase: "Design", start: "2026-01-05", end: "2026-01-23" },
    SampleTask { id: "T-002", name: "Brand guidelines", status: TaskStatus::Todo, assignee: Some(1), budget: 500.0, sprint: "$200", phase: "Design", start: "2026-01-12", end: "2026-01-30" },
    SampleTask { id: "T-003", name: "Landing page build", status: TaskStatus::Ready, assignee: Some(2), budget: 2500.0, sprint: "$1,200", phase: "Development", start: "2026-02-02", end: "2026-03-13" },
    SampleTask { id: "T-004", name: "Launch QA pass", status: TaskStatus::New, assignee: None, budget: 800.0, sprint: "-", phase: "Testing", start: "2026-03-16", end: "2026-04-03" },
];

#[rustfmt::skip]
const MOBILE_TASKS: [SampleTask; 3] = [
    SampleTask { id: "T-005", name: "User research", status: TaskStatus::Done, assignee: Some(3), budget: 1200.0, sprint: "$1,150", phase: "Planning", start: "2026-03-02", end: "2026-03-20" },
    SampleTask { id: "T-006", name: "Navigation prototype", status: TaskStatus::InReview, assignee: Some(0), budget: 900.0, sprint: "$300", phase: "Design", start: "2026-03-23", end: "2026-04-10" },
    SampleTask { id: "T-007", name: "Offline sync", status: TaskStatus::Todo, assignee: Some(1), budget: 3000.0, sprint: "-", phase: "Development", start: "2026-04-13", end: "2026-06-05" },
];

#[rustfmt::skip]
const DATA_TASKS: [SampleTask; 2] = [
    SampleTask { id: "T-008", name: "Schema inventory", status: TaskStatus::Completed, assignee: Some(2), budget: 600.0, sprint: "$600", phase: "Planning", start: "2026-02-02", end: "2026-02-13" },
    SampleTask { id: "T-009", name: "Nightly export job", status: TaskStatus::InProgress, assignee: Some(3), budget: 1500.0, sprint: "$700", phase: "Development", start: "2026-02-16", end: "2026-03-27" },
];

fn sample_tasks(users: &[User]) -> IndexMap<String, Vec<WorkspaceTask>> {
    let build = |list: &[SampleTask]| list.iter().map(|t| t.build(users)).collect::<Vec<_>>();

    let mut website = build(&WEBSITE_TASKS);
    if let Some(wireframes) = website.first_mut() {
        for (n, name) in ["Desktop layout", "Mobile layout"].into_iter().enumerate() {
            let mut sub = WorkspaceTask::new(format!("T-001.{}", n + 1), name, TaskStatus::Todo);
            sub.parent_id = Some(wireframes.id.clone());
            sub.phase = wireframes.phase.clone();
            sub.budget = 300.0;
            wireframes.subtasks.push(sub);
        }
    }

    let mut tasks = IndexMap::new();
    tasks.insert("P-001".to_string(), website);
    tasks.insert("P-002".to_string(), build(&MOBILE_TASKS));
    tasks.insert("P-003".to_string(), build(&DATA_TASKS));
    tasks
}

// ---------------------------------------------------------------------------
// JSON seed file
// ---------------------------------------------------------------------------

/// Seed data read from a JSON file. Created projects are written back to it.
#[derive(Debug, Clone)]
pub struct FileSeed {
    path: PathBuf,
    data: SeedData,
}

impl FileSeed {
    pub fn open(path: &Path) -> Result<Self, SeedError> {
        let content = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let data = serde_json::from_str(&content).map_err(|source| SeedError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(FileSeed {
            path: path.to_path_buf(),
            data,
        })
    }

    fn save(&self) -> Result<(), SeedError> {
        let write_err = |source| SeedError::Write {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(&self.data)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        atomic_write(&self.path, json.as_bytes()).map_err(write_err)
    }
}

impl SeedSource for FileSeed {
    fn get_projects(&self) -> Result<Vec<Project>, SeedError> {
        Ok(self.data.projects.clone())
    }

    fn create_project(&mut self, draft: ProjectDraft) -> Result<Project, SeedError> {
        let project = self.data.create(draft)?;
        self.save()?;
        Ok(project)
    }

    fn get_tasks_by_project(&self, project_id: &str) -> Result<Vec<WorkspaceTask>, SeedError> {
        Ok(self.data.tasks_of(project_id))
    }

    fn get_users(&self) -> Result<Vec<User>, SeedError> {
        Ok(self.data.users.clone())
    }

    fn get_spaces(&self) -> Result<Vec<Space>, SeedError> {
        Ok(self.data.spaces.clone())
    }
}

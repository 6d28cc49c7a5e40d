use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;

use crate::model::config::GroupBy;
use crate::model::phase::Phase;
use crate::model::project::{Project, ProjectStatus};
use crate::model::space::Space;
use crate::model::task::{TaskStatus, WorkspaceTask};
use crate::ops::formula::parse_spent;
use crate::ops::reorder::OrderUpdate;
use crate::util::unicode::pad_to_width;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct GroupJson<'a> {
    pub group: &'a str,
    pub count: usize,
    pub tasks: Vec<&'a WorkspaceTask>,
}

#[derive(Serialize)]
pub struct TaskListJson<'a> {
    pub project: &'a str,
    pub group_by: GroupBy,
    pub groups: Vec<GroupJson<'a>>,
}

#[derive(Serialize)]
pub struct SpaceJson<'a> {
    #[serde(flatten)]
    pub space: &'a Space,
    /// Project names, in membership order
    pub project_names: Vec<&'a str>,
}

#[derive(Serialize)]
pub struct ProjectJson<'a> {
    #[serde(flatten)]
    pub project: &'a Project,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_id: Option<&'a str>,
    pub task_count: usize,
}

#[derive(Serialize)]
pub struct MoveJson {
    pub moved: bool,
    pub field_changed: bool,
    pub order: Vec<OrderUpdate>,
}

#[derive(Serialize)]
pub struct CreatedJson<'a> {
    pub id: &'a str,
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

const NAME_CELLS: usize = 28;
const STATUS_CELLS: usize = 12;
const ASSIGNEE_CELLS: usize = 14;

/// `$1,200`, `$333.33`, `-$50`
pub fn format_money(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    let digits = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    match cents % 100 {
        0 => format!("{}${}", sign, grouped),
        frac => format!("{}${}.{:02}", sign, grouped, frac),
    }
}

/// One task as a table row: id, name, status, assignee, remaining budget.
/// Subtasks are indented under the name column.
pub fn format_task_line(task: &WorkspaceTask, indent: usize) -> String {
    let name = format!("{}{}", "  ".repeat(indent), task.name);
    let assignee = task.assignee.as_ref().map_or("-", |a| a.name());
    format!(
        "{:<9}{} {} {} {}",
        task.id,
        pad_to_width(&name, NAME_CELLS),
        pad_to_width(task.status.as_str(), STATUS_CELLS),
        pad_to_width(assignee, ASSIGNEE_CELLS),
        format_money(task.budget_remaining),
    )
}

/// A task and its subtasks, one row each
pub fn format_task_tree(task: &WorkspaceTask, indent: usize) -> Vec<String> {
    let mut lines = vec![format_task_line(task, indent)];
    for sub in &task.subtasks {
        lines.extend(format_task_tree(sub, indent + 1));
    }
    lines
}

/// Grouped listing: a header per group, then its task rows
pub fn format_groups(groups: &IndexMap<String, Vec<&WorkspaceTask>>) -> Vec<String> {
    let mut lines = Vec::new();
    for (key, tasks) in groups {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(format!("== {} ({}) ==", key, tasks.len()));
        for task in tasks {
            lines.extend(format_task_tree(task, 0));
        }
    }
    lines
}

fn push_date(lines: &mut Vec<String>, label: &str, date: Option<NaiveDate>) {
    if let Some(d) = date {
        lines.push(format!("{}: {}", label, d));
    }
}

/// Detailed task view
pub fn format_task_detail(task: &WorkspaceTask) -> Vec<String> {
    let mut lines = vec![format!("{} {}", task.id, task.name)];
    lines.push(format!("status: {}", task.status));
    if let Some(assignee) = &task.assignee {
        match &assignee.referenced_id {
            Some(id) => lines.push(format!("assignee: {} ({})", assignee.name(), id)),
            None => lines.push(format!("assignee: {}", assignee.name())),
        }
    }
    if !task.phase.is_empty() {
        lines.push(format!("phase: {}", task.phase));
    }
    lines.push(format!("budget: {}", format_money(task.budget)));
    lines.push(format!("spent: {}", format_money(parse_spent(&task.sprint))));
    lines.push(format!("remaining: {}", format_money(task.budget_remaining)));
    if let Some(progress) = task.progress {
        lines.push(format!("progress: {}%", progress));
    }
    push_date(&mut lines, "start", task.start_date);
    push_date(&mut lines, "end", task.end_date);
    push_date(&mut lines, "due", task.due_date);
    if let Some(parent) = &task.parent_id {
        lines.push(format!("parent: {}", parent));
    }

    if !task.subtasks.is_empty() {
        lines.push(String::new());
        lines.push("subtasks:".to_string());
        for sub in &task.subtasks {
            lines.extend(format_task_tree(sub, 1));
        }
    }
    lines
}

pub fn format_space_header(space: &Space) -> String {
    let n = space.project_ids.len();
    format!(
        "{} {} [{}] {} project{}",
        space.id,
        space.name,
        space.icon,
        n,
        if n == 1 { "" } else { "s" }
    )
}

pub fn format_project_line(project: &Project, space_name: Option<&str>) -> String {
    format!(
        "{:<7}{} {} {}",
        project.id,
        pad_to_width(&project.name, 24),
        pad_to_width(&project.status.to_string(), 10),
        space_name.unwrap_or("-"),
    )
}

pub fn format_phase_line(phase: &Phase) -> String {
    format!(
        "{:<8}{} {:>3}  {}",
        phase.id,
        pad_to_width(&phase.name, 16),
        phase.task_count,
        phase.color,
    )
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

pub fn parse_task_status(s: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse(s).ok_or_else(|| {
        format!(
            "unknown status '{}' (expected: todo, in-progress, ready, done, in-review, completed, new)",
            s
        )
    })
}

pub fn parse_project_status(s: &str) -> Result<ProjectStatus, String> {
    ProjectStatus::parse(s).ok_or_else(|| {
        format!(
            "unknown project status '{}' (expected: planning, active, on-hold, completed, archived)",
            s
        )
    })
}

pub fn parse_group_by(s: &str) -> Result<GroupBy, String> {
    GroupBy::parse(s).ok_or_else(|| {
        format!(
            "unknown grouping '{}' (expected: none, status, sprint, assignee, phase)",
            s
        )
    })
}

pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}' (expected YYYY-MM-DD)", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::{AssigneeDisplay, SnapshotRef};
    use crate::ops::grouping::group_tasks;
    use insta::assert_snapshot;

    fn task(id: &str, name: &str, status: TaskStatus, remaining: f64) -> WorkspaceTask {
        let mut t = WorkspaceTask::new(id, name, status);
        t.budget_remaining = remaining;
        t
    }

    fn sample() -> Vec<WorkspaceTask> {
        let mut wireframes = task("T-001", "Wireframes", TaskStatus::InProgress, 600.0);
        wireframes.assignee = Some(SnapshotRef {
            referenced_id: Some("U-001".into()),
            cached: AssigneeDisplay {
                name: "Alice Chen".into(),
                ..Default::default()
            },
        });
        wireframes.phase = "Design".into();
        let mut sub = task("T-001.1", "Mobile layout", TaskStatus::Todo, 0.0);
        sub.parent_id = Some("T-001".into());
        wireframes.subtasks.push(sub);

        let mut build = task("T-003", "Landing page build", TaskStatus::Ready, 1300.0);
        build.phase = "Development".into();
        vec![wireframes, build]
    }

    #[test]
    fn money_formatting() {
        assert_eq!(format_money(1200.0), "$1,200");
        assert_eq!(format_money(1234567.0), "$1,234,567");
        assert_eq!(format_money(333.333), "$333.33");
        assert_eq!(format_money(-50.0), "-$50");
        assert_eq!(format_money(0.0), "$0");
        assert_eq!(format_money(-0.0), "$0");
    }

    #[test]
    fn grouped_listing() {
        let tasks = sample();
        let groups = group_tasks(&tasks, GroupBy::Phase);
        let output = format_groups(&groups).join("\n");
        assert_snapshot!(output, @r"
        == Design (1) ==
        T-001    Wireframes                   in-progress  Alice Chen     $600
        T-001.1    Mobile layout              todo         -              $0

        == Development (1) ==
        T-003    Landing page build           ready        -              $1,300
        ");
    }

    #[test]
    fn empty_listing_still_has_all_tasks_group() {
        let groups = group_tasks(&[], GroupBy::None);
        assert_eq!(format_groups(&groups), ["== All Tasks (0) =="]);
    }

    #[test]
    fn long_names_are_truncated() {
        let t = task(
            "T-042",
            "Migrate every legacy report to the new warehouse",
            TaskStatus::New,
            0.0,
        );
        let line = format_task_line(&t, 0);
        assert!(line.contains("Migrate every legacy report\u{2026}"));
    }

    #[test]
    fn task_detail() {
        let mut tasks = sample();
        let t = &mut tasks[0];
        t.budget = 1000.0;
        t.sprint = "$400".into();
        t.progress = Some(40.0);
        t.start_date = NaiveDate::from_ymd_opt(2026, 1, 5);
        let output = format_task_detail(t).join("\n");
        assert_snapshot!(output, @r"
        T-001 Wireframes
        status: in-progress
        assignee: Alice Chen (U-001)
        phase: Design
        budget: $1,000
        spent: $400
        remaining: $600
        progress: 40%
        start: 2026-01-05

        subtasks:
        T-001.1    Mobile layout              todo         -              $0
        ");
    }

    #[test]
    fn space_and_phase_lines() {
        let mut space = Space::new("S-001", "Product", "rocket");
        space.project_ids.insert("P-001".into());
        assert_eq!(format_space_header(&space), "S-001 Product [rocket] 1 project");

        let mut phase = Phase::new("PH-001", "Design", "#FB4196");
        phase.task_count = 4;
        assert_eq!(format_phase_line(&phase), "PH-001  Design             4  #FB4196");
    }

    #[test]
    fn argument_parsing() {
        assert_eq!(parse_task_status("IN-REVIEW"), Ok(TaskStatus::InReview));
        assert!(parse_task_status("blocked").unwrap_err().contains("in-progress"));
        assert_eq!(parse_project_status("on-hold"), Ok(ProjectStatus::OnHold));
        assert_eq!(parse_group_by("Phase"), Ok(GroupBy::Phase));
        assert!(parse_group_by("owner").is_err());
        assert_eq!(parse_date("2026-02-10"), Ok(NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()));
        assert!(parse_date("10/02/2026").is_err());
    }
}

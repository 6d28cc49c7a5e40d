mod init;
pub use init::cmd_init;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::kv::FileStore;
use crate::io::recovery;
use crate::io::workspace_io::{self, WorkspacePaths};
use crate::model::config::{GroupBy, WorkspaceConfig};
use crate::model::formula::{Column, FormulaConfig, Operator};
use crate::model::project::ProjectDraft;
use crate::ops::formula::validate_expression;
use crate::ops::grouping::group_key;
use crate::ops::hierarchy::space_of;
use crate::ops::reorder::ReorderOutcome;
use crate::ops::task_ops::{self, InsertPosition, TargetGroup, TaskEdit};
use crate::ops::{EntityKind, OpError};
use crate::workspace::Workspace;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// A located workspace and its parsed config
struct Context {
    paths: WorkspacePaths,
    config: WorkspaceConfig,
    doc: toml_edit::DocumentMut,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let start = resolve_start(cli.workspace_dir.as_deref())?;

    match cli.command {
        // Init runs before workspace discovery
        Commands::Init(args) => cmd_init(args, &start),
        cmd => {
            let ctx = load_context(&start)?;
            match cmd {
                Commands::Init(_) => unreachable!("handled above"),
                Commands::Space(args) => cmd_space(args.action, &ctx, json),
                Commands::Project(args) => cmd_project(args.action, &ctx, json),
                Commands::Phase(args) => cmd_phase(args.action, &ctx, json),
                Commands::Task(args) => cmd_task(args.action, &ctx, json),
                Commands::List(args) => cmd_list(args, &ctx, json),
                Commands::Mv(args) => cmd_mv(args, &ctx, json),
                Commands::Formula(args) => cmd_formula(args.action, ctx, json),
                Commands::Refresh(args) => cmd_refresh(args, &ctx, json),
                Commands::Prefs(args) => cmd_prefs(args, &ctx, json),
                Commands::Recovery(args) => cmd_recovery(args, &ctx, json),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_start(dir: Option<&str>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match dir {
        Some(dir) => Ok(std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?),
        None => Ok(std::env::current_dir()?),
    }
}

fn load_context(start: &Path) -> Result<Context, Box<dyn std::error::Error>> {
    let paths = workspace_io::discover_workspace(start)?;
    let (config, doc) = config_io::read_config(&paths.dir)?;
    Ok(Context { paths, config, doc })
}

fn open_workspace(ctx: &Context) -> Result<Workspace<FileStore>, Box<dyn std::error::Error>> {
    let seed = ctx.paths.open_seed(&ctx.config.seed)?;
    let (ws, report) = Workspace::boot(ctx.paths.open_store(), seed, ctx.config.formula.clone())?;
    if !report.seeded.is_empty() {
        eprintln!("note: filled {:?} from the seed source", report.seeded);
    }
    Ok(ws)
}

fn group_by_arg(by: Option<&str>, ctx: &Context) -> Result<GroupBy, String> {
    match by {
        Some(s) => parse_group_by(s),
        None => Ok(ctx.config.view.group_by),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_created(id: &str, json: bool) -> CmdResult {
    if json {
        print_json(&CreatedJson { id })
    } else {
        println!("{}", id);
        Ok(())
    }
}

fn parse_opt_date(s: Option<&str>) -> Result<Option<chrono::NaiveDate>, String> {
    s.map(parse_date).transpose()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    parse_date(s)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid timestamp '{}' (expected ISO-8601)", s))
}

// ---------------------------------------------------------------------------
// Spaces
// ---------------------------------------------------------------------------

fn cmd_space(action: SpaceAction, ctx: &Context, json: bool) -> CmdResult {
    let mut ws = open_workspace(ctx)?;
    match action {
        SpaceAction::New(args) => {
            let id = ws.create_space(&args.name, &args.icon)?;
            print_created(&id, json)
        }
        SpaceAction::List => cmd_space_list(&ws, json),
        SpaceAction::Assign(args) => {
            ws.assign_project_to_space(&args.project, &args.space)?;
            println!("{} -> {}", args.project, args.space);
            Ok(())
        }
        SpaceAction::Mv(args) => {
            ws.move_project(&args.project, &args.space)?;
            println!("{} -> {}", args.project, args.space);
            Ok(())
        }
        SpaceAction::Detach(args) => {
            if ws.detach_project(&args.project)? {
                println!("{} detached", args.project);
            } else {
                println!("{} was not in a space", args.project);
            }
            Ok(())
        }
    }
}

fn cmd_space_list(ws: &Workspace<FileStore>, json: bool) -> CmdResult {
    let store = ws.store();
    let project_name = |id: &str| store.project(id).map_or("(missing)", |p| p.name.as_str());

    if json {
        let spaces: Vec<SpaceJson> = store
            .spaces
            .iter()
            .map(|space| SpaceJson {
                space,
                project_names: space.project_ids.iter().map(|id| project_name(id)).collect(),
            })
            .collect();
        return print_json(&spaces);
    }

    for (i, space) in store.spaces.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", format_space_header(space));
        for id in &space.project_ids {
            println!("  {:<7}{}", id, project_name(id));
        }
        if !space.phases.is_empty() {
            let names: Vec<&str> = space.phases.iter().map(|p| p.name.as_str()).collect();
            println!("  phases: {}", names.join(", "));
        }
    }

    let loose: Vec<_> = store
        .projects
        .iter()
        .filter(|p| space_of(store, &p.id).is_none())
        .collect();
    if !loose.is_empty() {
        println!();
        println!("-- Not in a space --");
        for p in loose {
            println!("  {:<7}{}", p.id, p.name);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

fn cmd_project(action: ProjectAction, ctx: &Context, json: bool) -> CmdResult {
    let mut ws = open_workspace(ctx)?;
    match action {
        ProjectAction::New(args) => {
            let draft = ProjectDraft {
                name: args.name,
                description: args.description,
                status: args.status.as_deref().map(parse_project_status).transpose()?.unwrap_or_default(),
                owner_id: args.owner,
                start_date: parse_opt_date(args.start.as_deref())?,
                end_date: parse_opt_date(args.end.as_deref())?,
            };
            let project = ws.create_project(draft, args.space.as_deref())?;
            print_created(&project.id, json)
        }
        ProjectAction::List => {
            let store = ws.store();
            if json {
                let projects: Vec<ProjectJson> = store
                    .projects
                    .iter()
                    .map(|project| ProjectJson {
                        project,
                        space_id: space_of(store, &project.id).map(|s| s.id.as_str()),
                        task_count: store
                            .project_tasks(&project.id)
                            .iter()
                            .map(|t| t.subtree_len())
                            .sum(),
                    })
                    .collect();
                return print_json(&projects);
            }
            for project in &store.projects {
                let space = space_of(store, &project.id).map(|s| s.name.as_str());
                println!("{}", format_project_line(project, space));
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

fn cmd_phase(action: PhaseAction, ctx: &Context, json: bool) -> CmdResult {
    let mut ws = open_workspace(ctx)?;
    match action {
        PhaseAction::New(args) => {
            let id = if args.space {
                ws.create_space_phase(&args.owner, &args.name, &args.color)?
            } else {
                ws.create_project_phase(&args.owner, &args.name, &args.color)?
            };
            print_created(&id, json)
        }
        PhaseAction::List(args) => {
            let phases = ws.phases_for(&args.project)?;
            if json {
                return print_json(phases);
            }
            if ws.store().project_phases(&args.project).is_empty()
                && let Some(space) = space_of(ws.store(), &args.project)
            {
                println!("(phases of space {})", space.id);
            }
            for phase in phases {
                println!("{}", format_phase_line(phase));
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

fn cmd_task(action: TaskAction, ctx: &Context, json: bool) -> CmdResult {
    let mut ws = open_workspace(ctx)?;
    match action {
        TaskAction::Add(args) => {
            let by = group_by_arg(args.by.as_deref(), ctx)?;
            let group = args.group.as_deref().map(|key| TargetGroup { by, key });
            let position = if args.top {
                InsertPosition::Top
            } else {
                InsertPosition::Bottom
            };
            let id = ws.add_task(&args.project, &args.name, group, position)?;
            print_created(&id, json)
        }
        TaskAction::Sub(args) => {
            let id = ws.add_subtask(&args.project, &args.parent, &args.name)?;
            print_created(&id, json)
        }
        TaskAction::Status(args) => {
            let status = parse_task_status(&args.status)?;
            ws.set_status(&args.project, &args.id, status)?;
            println!("{} {}", args.id, status);
            Ok(())
        }
        TaskAction::Set(args) => cmd_task_set(&mut ws, args),
        TaskAction::Rm(args) => {
            let removed = ws.delete_task(&args.project, &args.id)?;
            let n = removed.subtree_len();
            println!(
                "deleted {} ({} task{})",
                removed.id,
                n,
                if n == 1 { "" } else { "s" }
            );
            Ok(())
        }
        TaskAction::Show(args) => {
            let task = task_ops::find_task(ws.tasks(&args.project)?, &args.id)
                .ok_or_else(|| OpError::not_found(EntityKind::Task, &args.id))?;
            if json {
                return print_json(task);
            }
            for line in format_task_detail(task) {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

fn cmd_task_set(ws: &mut Workspace<FileStore>, args: TaskSetArgs) -> CmdResult {
    let assignee = match args.assignee.as_deref() {
        None => None,
        Some("none") => Some(None),
        Some(user_id) => {
            let user = ws
                .users()
                .into_iter()
                .find(|u| u.id == user_id)
                .ok_or_else(|| format!("unknown user: {}", user_id))?;
            Some(Some(user))
        }
    };
    let edit = TaskEdit {
        name: args.name,
        budget: args.budget,
        sprint: args.spent,
        phase: args.phase,
        progress: args.progress,
        due_date: parse_opt_date(args.due.as_deref())?,
        start_date: parse_opt_date(args.start.as_deref())?,
        end_date: parse_opt_date(args.end.as_deref())?,
        assignee,
    };
    ws.edit_task(&args.project, &args.id, edit)?;
    println!("{}", args.id);
    Ok(())
}

// ---------------------------------------------------------------------------
// List / move
// ---------------------------------------------------------------------------

fn cmd_list(args: ListArgs, ctx: &Context, json: bool) -> CmdResult {
    let ws = open_workspace(ctx)?;
    let by = group_by_arg(args.by.as_deref(), ctx)?;
    let groups = ws.group(&args.project, by)?;
    if args.save {
        let mut doc = ctx.doc.clone();
        config_io::set_group_by(&mut doc, by);
        config_io::write_config(&ctx.paths.dir, &doc)?;
    }

    if json {
        return print_json(&TaskListJson {
            project: &args.project,
            group_by: by,
            groups: groups
                .iter()
                .map(|(key, tasks)| GroupJson {
                    group: key,
                    count: tasks.len(),
                    tasks: tasks.clone(),
                })
                .collect(),
        });
    }
    for line in format_groups(&groups) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_mv(args: MvArgs, ctx: &Context, json: bool) -> CmdResult {
    let mut ws = open_workspace(ctx)?;
    let by = group_by_arg(args.by.as_deref(), ctx)?;
    let key = match args.group {
        Some(key) => key,
        None => {
            let target = task_ops::find_task(ws.tasks(&args.project)?, &args.target)
                .ok_or_else(|| OpError::not_found(EntityKind::Task, &args.target))?;
            group_key(target, by)
        }
    };

    let outcome = ws.reorder(&args.project, &args.dragged, &args.target, &key, by)?;
    let (moved, field_changed, order) = match outcome {
        ReorderOutcome::Unchanged => (false, false, Vec::new()),
        ReorderOutcome::Moved {
            field_changed,
            order,
        } => (true, field_changed, order),
    };

    if json {
        return print_json(&MoveJson {
            moved,
            field_changed,
            order,
        });
    }
    if !moved {
        println!("no change");
        return Ok(());
    }
    println!("{} -> before {}", args.dragged, args.target);
    if field_changed {
        println!("  {}: {}", by, key);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Formula
// ---------------------------------------------------------------------------

fn cmd_formula(action: Option<FormulaAction>, mut ctx: Context, json: bool) -> CmdResult {
    let formula = match action.unwrap_or(FormulaAction::Show) {
        FormulaAction::Show => {
            if json {
                return print_json(&ctx.config.formula);
            }
            println!("{}", ctx.config.formula);
            return Ok(());
        }
        FormulaAction::Apply(args) => {
            let mut ws = open_workspace(&ctx)?;
            let n = ws.apply_formula(args.project.as_deref())?;
            println!("recomputed {} task{}", n, if n == 1 { "" } else { "s" });
            return Ok(());
        }
        FormulaAction::Basic(args) => {
            let column = |name: &str| {
                Column::from_name(name).ok_or_else(|| {
                    format!(
                        "unknown column '{}' (expected: budget, spent, budgetRemaining, progress)",
                        name
                    )
                })
            };
            FormulaConfig::Basic {
                left: column(&args.left)?,
                operator: Operator::from_symbol(&args.operator)
                    .ok_or_else(|| format!("unknown operator '{}' (expected: + - * /)", args.operator))?,
                right: column(&args.right)?,
            }
        }
        FormulaAction::Advanced(args) => {
            validate_expression(&args.expression)
                .map_err(|e| format!("invalid formula: {}", e))?;
            FormulaConfig::Advanced {
                expression: args.expression,
            }
        }
    };

    config_io::set_formula(&mut ctx.doc, &formula);
    config_io::write_config(&ctx.paths.dir, &ctx.doc)?;
    ctx.config.formula = formula;

    let mut ws = open_workspace(&ctx)?;
    let n = ws.apply_formula(None)?;
    println!("{} (recomputed {} tasks)", ctx.config.formula, n);
    Ok(())
}

// ---------------------------------------------------------------------------
// Refresh / prefs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RefreshJson {
    round: u32,
    reloaded: bool,
    projects_added: usize,
    filled: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignees_refreshed: Option<usize>,
}

fn cmd_refresh(args: RefreshArgs, ctx: &Context, json: bool) -> CmdResult {
    let mut ws = open_workspace(ctx)?;
    let interval = Duration::from_secs(args.interval.unwrap_or(ctx.config.seed.refresh_interval_secs));
    let rounds = args.rounds.max(1);

    for round in 1..=rounds {
        if round > 1 {
            std::thread::sleep(interval);
        }
        let report = ws.refresh()?;
        let assignees_refreshed = if args.assignees {
            Some(ws.refresh_assignees()?)
        } else {
            None
        };

        if json {
            println!(
                "{}",
                serde_json::to_string(&RefreshJson {
                    round,
                    reloaded: report.reloaded,
                    projects_added: report.projects_added,
                    filled: report.filled,
                    assignees_refreshed,
                })?
            );
            continue;
        }
        if report.reloaded {
            println!("reloaded from stored snapshots");
        }
        if report.projects_added > 0 {
            println!("added {} projects", report.projects_added);
        }
        for project_id in &report.filled {
            println!(
                "filled {} ({} tasks)",
                project_id,
                ws.store().project_tasks(project_id).len()
            );
        }
        if let Some(n) = assignees_refreshed {
            println!("refreshed {} assignees", n);
        }
        if !report.reloaded && report.projects_added == 0 && report.filled.is_empty() {
            println!("nothing to fill");
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PrefsJson<'a> {
    sidebar_collapsed: bool,
    visible_views: &'a [String],
}

fn cmd_prefs(args: PrefsArgs, ctx: &Context, json: bool) -> CmdResult {
    let mut ws = open_workspace(ctx)?;
    let mut prefs = ws.prefs();
    let changed = args.sidebar_collapsed.is_some() || args.views.is_some();
    if let Some(collapsed) = args.sidebar_collapsed {
        prefs.sidebar_collapsed = collapsed;
    }
    if let Some(views) = args.views {
        prefs.visible_views = views
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
    }
    if changed {
        ws.set_prefs(&prefs)?;
    }

    if json {
        return print_json(&PrefsJson {
            sidebar_collapsed: prefs.sidebar_collapsed,
            visible_views: &prefs.visible_views,
        });
    }
    println!("sidebar_collapsed: {}", prefs.sidebar_collapsed);
    println!("visible_views: {}", prefs.visible_views.join(", "));
    Ok(())
}

// ---------------------------------------------------------------------------
// Recovery log
// ---------------------------------------------------------------------------

fn cmd_recovery(args: RecoveryCmd, ctx: &Context, json: bool) -> CmdResult {
    let dir = &ctx.paths.dir;
    match args.action {
        Some(RecoveryAction::Prune(prune)) => {
            let before = prune.before.as_deref().map(parse_timestamp).transpose()?;
            let n = recovery::prune_recovery(dir, before, prune.all)?;
            println!("Pruned {} entr{}", n, if n == 1 { "y" } else { "ies" });
            Ok(())
        }
        Some(RecoveryAction::Path) => {
            println!("{}", recovery::recovery_log_path(dir).display());
            Ok(())
        }
        None => {
            let since = args.since.as_deref().map(parse_timestamp).transpose()?;
            let entries = recovery::read_recovery_entries(dir, Some(args.limit.unwrap_or(10)), since);
            if json {
                let values: Vec<serde_json::Value> = entries.iter().map(|e| e.to_json()).collect();
                return print_json(&values);
            }
            if entries.is_empty() {
                println!("No recovery entries.");
            }
            for entry in &entries {
                print!("{}", entry.to_display_markdown());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_accept_dates_and_rfc3339() {
        let midnight = parse_timestamp("2026-02-10").unwrap();
        assert_eq!(midnight.to_rfc3339(), "2026-02-10T00:00:00+00:00");
        let exact = parse_timestamp("2026-02-10T14:32:05Z").unwrap();
        assert!(exact > midnight);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn optional_dates() {
        assert_eq!(parse_opt_date(None), Ok(None));
        assert!(parse_opt_date(Some("2026-13-01")).is_err());
    }
}

use std::fs;
use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::workspace_io;
use crate::model::config::WorkspaceConfig;
use crate::workspace::{Collection, Workspace};

const TASKFLOW_TOML_TEMPLATE: &str = r##"[workspace]
name = {name}

[view]
# How `tf list` buckets tasks: none, status, sprint, assignee or phase
group_by = "status"

# --- Computed column ---
# budgetRemaining is recomputed with this formula on every task edit and by
# `tf formula apply`. Columns: budget, spent, budgetRemaining, progress.
[formula]
mode = "basic"
left = "budget"
operator = "-"
right = "spent"
#
# mode = "advanced"
# expression = 'field("Budget") - field("Spent")'

# --- Seed data ---
# Empty collections are filled from here on first run and by `tf refresh`.
[seed]
source = {source}
{file}refresh_interval_secs = 30
"##;

/// Where an imported seed file is copied to, inside taskflow/
const SEED_FILE_NAME: &str = "seed.json";

/// Infer a workspace name from a directory name: replace hyphens with spaces, title-case.
fn infer_name(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    upper + chars.as_str()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_taskflow_toml(name: &str, seed_file: Option<&str>) -> String {
    let quoted = |s: &str| toml::Value::String(s.to_string()).to_string();
    let (source, file) = match seed_file {
        Some(f) => ("file", format!("file = {}\n", quoted(f))),
        None => ("sample", String::new()),
    };
    TASKFLOW_TOML_TEMPLATE
        .replace("{name}", &quoted(name))
        .replace("{source}", &quoted(source))
        .replace("{file}", &file)
}

pub fn cmd_init(args: InitArgs, root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = root.parent()
        && let Ok(outer) = workspace_io::discover_workspace(parent)
    {
        eprintln!("Note: parent workspace found at {}/", outer.dir.display());
        eprintln!("Creating new workspace in ./taskflow/");
    }

    let name = args.name.unwrap_or_else(|| {
        root.file_name()
            .and_then(|n| n.to_str())
            .map(infer_name)
            .unwrap_or_else(|| "Untitled".to_string())
    });

    // Read the seed file before creating anything, so a bad path leaves no
    // half-made workspace behind
    let seed_content = match &args.seed_file {
        Some(path) => Some(
            fs::read_to_string(path).map_err(|e| format!("cannot read seed file '{}': {}", path, e))?,
        ),
        None => None,
    };

    let toml_content = render_taskflow_toml(&name, seed_content.as_ref().map(|_| SEED_FILE_NAME));
    let paths = workspace_io::create_workspace(root, &toml_content)?;
    if let Some(content) = seed_content {
        fs::write(paths.dir.join(SEED_FILE_NAME), content)?;
    }

    let config: WorkspaceConfig = toml::from_str(&toml_content)?;
    let seed = paths.open_seed(&config.seed)?;
    let (_, report) = Workspace::boot(paths.open_store(), seed, config.formula)?;

    println!("Initialized taskflow workspace: {}", name);
    if !report.seeded.is_empty() {
        let seeded: Vec<&str> = report
            .seeded
            .iter()
            .map(|c| match c {
                Collection::Spaces => "spaces",
                Collection::Projects => "projects",
                Collection::Phases => "phases",
                Collection::Tasks => "tasks",
            })
            .collect();
        println!("  seeded: {}", seeded.join(", "));
    }
    Ok(())
}

use std::fs;
use std::path::Path;

use crate::io::workspace_io::{CONFIG_FILE, WorkspaceIoError};
use crate::model::config::{GroupBy, WorkspaceConfig};
use crate::model::formula::FormulaConfig;

/// Read taskflow.toml, returning both the parsed config and the raw
/// toml_edit document for formatting-preserving edits.
pub fn read_config(dir: &Path) -> Result<(WorkspaceConfig, toml_edit::DocumentMut), WorkspaceIoError> {
    let config_path = dir.join(CONFIG_FILE);
    let config_text = fs::read_to_string(&config_path).map_err(|e| WorkspaceIoError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;
    let config: WorkspaceConfig = toml::from_str(&config_text)?;
    let doc: toml_edit::DocumentMut = config_text.parse()?;
    Ok((config, doc))
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config(dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), WorkspaceIoError> {
    let config_path = dir.join(CONFIG_FILE);
    fs::write(&config_path, doc.to_string()).map_err(|e| WorkspaceIoError::WriteError {
        path: config_path,
        source: e,
    })?;
    Ok(())
}

/// The named top-level table, replacing any non-table value under that key
fn table_mut<'a>(doc: &'a mut toml_edit::DocumentMut, name: &str) -> Option<&'a mut toml_edit::Table> {
    let item = doc.entry(name).or_insert(toml_edit::table());
    if !item.is_table() {
        *item = toml_edit::table();
    }
    item.as_table_mut()
}

pub fn set_group_by(doc: &mut toml_edit::DocumentMut, by: GroupBy) {
    if let Some(view) = table_mut(doc, "view") {
        view["group_by"] = toml_edit::value(by.to_string());
    }
}

/// Replace the active formula. Keys belonging to the other mode are removed;
/// comments elsewhere in the table survive.
pub fn set_formula(doc: &mut toml_edit::DocumentMut, formula: &FormulaConfig) {
    let Some(table) = table_mut(doc, "formula") else {
        return;
    };
    match formula {
        FormulaConfig::Basic {
            left,
            operator,
            right,
        } => {
            table.remove("expression");
            table["mode"] = toml_edit::value("basic");
            table["left"] = toml_edit::value(left.as_str());
            table["operator"] = toml_edit::value(operator.symbol().to_string());
            table["right"] = toml_edit::value(right.as_str());
        }
        FormulaConfig::Advanced { expression } => {
            for key in ["left", "operator", "right"] {
                table.remove(key);
            }
            table["mode"] = toml_edit::value("advanced");
            table["expression"] = toml_edit::value(expression.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::formula::{Column, Operator};
    use tempfile::TempDir;

    fn sample_config() -> &'static str {
        r#"[workspace]
name = "demo"

# how `tf list` buckets tasks
[view]
group_by = "status"

[formula]
mode = "basic"
left = "budget"
operator = "-"
right = "spent"
"#
    }

    #[test]
    fn test_round_trip_config() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join(CONFIG_FILE);
        let original = sample_config();
        fs::write(&config_path, original).unwrap();

        let (config, doc) = read_config(tmp.path()).unwrap();
        assert_eq!(config.workspace.name, "demo");
        write_config(tmp.path(), &doc).unwrap();

        let written = fs::read_to_string(&config_path).unwrap();
        assert_eq!(written, original);
    }

    #[test]
    fn test_set_group_by_keeps_comments() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        set_group_by(&mut doc, GroupBy::Phase);
        let result = doc.to_string();
        assert!(result.contains("group_by = \"phase\""));
        assert!(result.contains("# how `tf list` buckets tasks"));
    }

    #[test]
    fn test_set_group_by_creates_table() {
        let mut doc = toml_edit::DocumentMut::new();
        set_group_by(&mut doc, GroupBy::None);
        let config: WorkspaceConfig = toml::from_str(&doc.to_string()).unwrap();
        assert_eq!(config.view.group_by, GroupBy::None);
    }

    #[test]
    fn test_switch_formula_modes() {
        let mut doc: toml_edit::DocumentMut = sample_config().parse().unwrap();
        let advanced = FormulaConfig::Advanced {
            expression: r#"field("Budget") * 2"#.into(),
        };
        set_formula(&mut doc, &advanced);
        let config: WorkspaceConfig = toml::from_str(&doc.to_string()).unwrap();
        assert_eq!(config.formula, advanced);
        assert!(!doc.to_string().contains("left ="));

        let basic = FormulaConfig::Basic {
            left: Column::Progress,
            operator: Operator::Mul,
            right: Column::Budget,
        };
        set_formula(&mut doc, &basic);
        let config: WorkspaceConfig = toml::from_str(&doc.to_string()).unwrap();
        assert_eq!(config.formula, basic);
        assert!(!doc.to_string().contains("expression"));
    }

    #[test]
    fn test_bad_toml_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[view\n").unwrap();
        assert!(matches!(
            read_config(tmp.path()),
            Err(WorkspaceIoError::ConfigParseError(_))
        ));
    }
}

//! Computed `budgetRemaining` column.
//!
//! Basic formulas combine two columns with one operator. Advanced formulas
//! are arithmetic over `field("Column")` references: every reference is
//! replaced by the task's value, the remaining text must be plain
//! arithmetic, and it is evaluated by the parser in [`expr`]. Any failure
//! yields 0 so the column is always a finite number.

pub mod expr;

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::model::formula::{Column, FormulaConfig, Operator};
use crate::model::task::WorkspaceTask;

/// Error type for formula evaluation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("formula contains characters other than arithmetic: {0:?}")]
    Unsanitary(String),
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("malformed number: {0}")]
    BadNumber(String),
    #[error("unexpected token at position {0}")]
    UnexpectedToken(usize),
    #[error("unexpected end of formula")]
    UnexpectedEnd,
    #[error("unbalanced parentheses")]
    UnbalancedParens,
    #[error("formula nests deeper than {0} levels")]
    TooDeep(usize),
}

static FIELD_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)field\(\s*["']([^"']*)["']\s*\)"#).expect("valid field() pattern")
});

static ARITHMETIC_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+\-*/().\s]*$").expect("valid arithmetic pattern"));

/// Amount spent, parsed from the `sprint` display string.
///
/// `$` and `,` are stripped and the leading integer is taken, so
/// `"$1,250.75"` is 1250. Empty, `"-"` and anything without leading digits
/// count as 0.
pub fn parse_spent(sprint: &str) -> f64 {
    let cleaned: String = sprint
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    let cleaned = cleaned.trim_start();
    let (sign, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, cleaned.strip_prefix('+').unwrap_or(cleaned)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    match digits[..end].parse::<i64>() {
        Ok(n) => sign * n as f64,
        Err(_) => 0.0,
    }
}

/// Value of a column for a task
pub fn column_value(task: &WorkspaceTask, column: Column) -> f64 {
    match column {
        Column::Budget => task.budget,
        Column::Spent => parse_spent(&task.sprint),
        Column::BudgetRemaining => task.budget_remaining,
        Column::Progress => task.progress.unwrap_or(0.0),
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// `left <op> right`; dividing by zero gives 0
pub fn evaluate_basic(task: &WorkspaceTask, left: Column, operator: Operator, right: Column) -> f64 {
    let l = column_value(task, left);
    let r = column_value(task, right);
    let value = match operator {
        Operator::Add => l + r,
        Operator::Sub => l - r,
        Operator::Mul => l * r,
        Operator::Div if r == 0.0 => 0.0,
        Operator::Div => l / r,
    };
    finite_or_zero(value)
}

/// Replace every `field("Name")` with the task's value for that column.
/// Names that match no column become `0`.
pub fn substitute_fields(task: &WorkspaceTask, expression: &str) -> String {
    FIELD_REF
        .replace_all(expression, |caps: &Captures| {
            let value = Column::from_name(&caps[1])
                .map(|c| column_value(task, c))
                .unwrap_or(0.0);
            // Parenthesized so a negative value reads as a signed operand
            if value < 0.0 {
                format!("({})", value)
            } else {
                format!("{}", value)
            }
        })
        .into_owned()
}

/// Substitute, sanitize and evaluate an advanced formula
pub fn try_evaluate_advanced(task: &WorkspaceTask, expression: &str) -> Result<f64, FormulaError> {
    let substituted = substitute_fields(task, expression);
    if !ARITHMETIC_ONLY.is_match(&substituted) {
        return Err(FormulaError::Unsanitary(substituted));
    }
    expr::evaluate(&substituted)
}

pub fn evaluate_advanced(task: &WorkspaceTask, expression: &str) -> f64 {
    try_evaluate_advanced(task, expression)
        .map(finite_or_zero)
        .unwrap_or(0.0)
}

/// Evaluate the configured formula for one task
pub fn compute(task: &WorkspaceTask, config: &FormulaConfig) -> f64 {
    match config {
        FormulaConfig::Basic {
            left,
            operator,
            right,
        } => evaluate_basic(task, *left, *operator, *right),
        FormulaConfig::Advanced { expression } => evaluate_advanced(task, expression),
    }
}

/// Recompute `budget_remaining` for every task and subtask. Returns the
/// number of tasks visited.
pub fn apply_formula(tasks: &mut [WorkspaceTask], config: &FormulaConfig) -> usize {
    let mut visited = 0;
    for task in tasks.iter_mut() {
        task.budget_remaining = compute(task, config);
        visited += 1 + apply_formula(&mut task.subtasks, config);
    }
    visited
}

/// Check an advanced formula against a blank task, surfacing the error that
/// evaluation would otherwise turn into 0.
pub fn validate_expression(expression: &str) -> Result<(), FormulaError> {
    let blank = WorkspaceTask::new("", "", crate::model::task::TaskStatus::New);
    try_evaluate_advanced(&blank, expression).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::TaskStatus;

    fn task(budget: f64, sprint: &str) -> WorkspaceTask {
        let mut t = WorkspaceTask::new("T-001", "Costed", TaskStatus::Todo);
        t.budget = budget;
        t.sprint = sprint.to_string();
        t
    }

    fn basic(left: Column, operator: Operator, right: Column) -> FormulaConfig {
        FormulaConfig::Basic {
            left,
            operator,
            right,
        }
    }

    fn advanced(expression: &str) -> FormulaConfig {
        FormulaConfig::Advanced {
            expression: expression.to_string(),
        }
    }

    #[test]
    fn spent_parsing() {
        assert_eq!(parse_spent("$400"), 400.0);
        assert_eq!(parse_spent("$1,250"), 1250.0);
        assert_eq!(parse_spent("$1,250.75"), 1250.0);
        assert_eq!(parse_spent("-"), 0.0);
        assert_eq!(parse_spent(""), 0.0);
        assert_eq!(parse_spent("n/a"), 0.0);
        assert_eq!(parse_spent("-$30"), -30.0);
    }

    #[test]
    fn basic_budget_minus_spent() {
        let t = task(1000.0, "$400");
        assert_eq!(compute(&t, &basic(Column::Budget, Operator::Sub, Column::Spent)), 600.0);
    }

    #[test]
    fn basic_divide_by_zero_is_zero() {
        let t = task(1000.0, "-");
        let value = compute(&t, &basic(Column::Budget, Operator::Div, Column::Spent));
        assert_eq!(value, 0.0);
        let value = compute(&t, &basic(Column::Budget, Operator::Div, Column::Progress));
        assert_eq!(value, 0.0);
    }

    #[test]
    fn basic_uses_progress_when_present() {
        let mut t = task(200.0, "-");
        t.progress = Some(50.0);
        assert_eq!(compute(&t, &basic(Column::Budget, Operator::Mul, Column::Progress)), 10000.0);
    }

    #[test]
    fn advanced_budget_minus_spent() {
        let t = task(500.0, "$200");
        assert_eq!(compute(&t, &advanced(r#"field("Budget") - field("Spent")"#)), 300.0);
    }

    #[test]
    fn advanced_names_are_case_insensitive() {
        let mut t = task(500.0, "$200");
        t.budget_remaining = 40.0;
        let value = compute(&t, &advanced(r#"FIELD("budgetremaining") + field('BUDGET')"#));
        assert_eq!(value, 540.0);
    }

    #[test]
    fn advanced_unknown_field_is_zero() {
        let t = task(500.0, "$200");
        assert_eq!(compute(&t, &advanced(r#"field("Budget") + field("Hours")"#)), 500.0);
    }

    #[test]
    fn advanced_negative_values_substitute_cleanly() {
        let t = task(100.0, "-$50");
        assert_eq!(compute(&t, &advanced(r#"field("Budget")-field("Spent")"#)), 150.0);
    }

    #[test]
    fn advanced_rejects_non_arithmetic() {
        let t = task(500.0, "$200");
        assert_eq!(compute(&t, &advanced(r#"SUM(field("Budget"))"#)), 0.0);
        assert!(matches!(
            try_evaluate_advanced(&t, "process.exit()"),
            Err(FormulaError::Unsanitary(_))
        ));
    }

    #[test]
    fn advanced_errors_and_infinities_are_zero() {
        let t = task(500.0, "-");
        assert_eq!(compute(&t, &advanced(r#"field("Budget") / field("Spent")"#)), 0.0);
        assert_eq!(compute(&t, &advanced("(1 + ")), 0.0);
        assert_eq!(compute(&t, &advanced("")), 0.0);
    }

    #[test]
    fn runaway_nesting_is_zero_and_invalid() {
        let t = task(500.0, "-");
        let parens = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        assert_eq!(compute(&t, &advanced(&parens)), 0.0);
        assert!(matches!(validate_expression(&parens), Err(FormulaError::TooDeep(_))));

        let signs = format!("{}{}", "-".repeat(200_000), r#"field("Budget")"#);
        assert_eq!(compute(&t, &advanced(&signs)), 0.0);
    }

    #[test]
    fn apply_formula_reaches_subtasks_and_is_idempotent() {
        let mut parent = task(1000.0, "$400");
        let mut child = task(50.0, "$5");
        child.subtasks.push(task(10.0, "$1"));
        parent.subtasks.push(child);
        let mut tasks = vec![parent, task(0.0, "-")];

        let config = basic(Column::Budget, Operator::Sub, Column::Spent);
        assert_eq!(apply_formula(&mut tasks, &config), 4);
        assert_eq!(tasks[0].budget_remaining, 600.0);
        assert_eq!(tasks[0].subtasks[0].budget_remaining, 45.0);
        assert_eq!(tasks[0].subtasks[0].subtasks[0].budget_remaining, 9.0);
        assert_eq!(tasks[1].budget_remaining, 0.0);

        let once = tasks.clone();
        apply_formula(&mut tasks, &config);
        assert_eq!(tasks, once);
    }

    #[test]
    fn validate_expression_surfaces_errors() {
        assert!(validate_expression(r#"field("Budget") * 0.9"#).is_ok());
        assert!(validate_expression("IF(1, 2, 3)").is_err());
    }
}

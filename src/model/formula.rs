use std::fmt;

use serde::{Deserialize, Serialize};

/// A numeric task column a formula can read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    Budget,
    /// Derived from the task's `sprint` string
    Spent,
    BudgetRemaining,
    Progress,
}

impl Column {
    pub const ALL: [Column; 4] = [
        Column::Budget,
        Column::Spent,
        Column::BudgetRemaining,
        Column::Progress,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Column::Budget => "budget",
            Column::Spent => "spent",
            Column::BudgetRemaining => "budgetRemaining",
            Column::Progress => "progress",
        }
    }

    /// Case-insensitive lookup, e.g. `"Budget"` or `"budgetremaining"`
    pub fn from_name(name: &str) -> Option<Column> {
        let name = name.trim();
        Column::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl Operator {
    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }

    pub fn from_symbol(s: &str) -> Option<Operator> {
        match s.trim() {
            "+" => Some(Operator::Add),
            "-" => Some(Operator::Sub),
            "*" | "x" => Some(Operator::Mul),
            "/" => Some(Operator::Div),
            _ => None,
        }
    }
}

/// How the derived `budgetRemaining` column is computed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FormulaConfig {
    /// `left <operator> right`
    Basic {
        left: Column,
        operator: Operator,
        right: Column,
    },
    /// Arithmetic over `field("Column")` references
    Advanced { expression: String },
}

impl Default for FormulaConfig {
    fn default() -> Self {
        FormulaConfig::Basic {
            left: Column::Budget,
            operator: Operator::Sub,
            right: Column::Spent,
        }
    }
}

impl fmt::Display for FormulaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaConfig::Basic {
                left,
                operator,
                right,
            } => write!(f, "{} {} {}", left, operator.symbol(), right),
            FormulaConfig::Advanced { expression } => f.write_str(expression),
        }
    }
}

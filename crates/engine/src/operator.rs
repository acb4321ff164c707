//! Operator catalog shared by the predicate compiler and the rule matcher.
//!
//! One closed enum, two dispatch tables: `predicate::compile_clause` turns an
//! operator into a SQL fragment, `matcher::matches` into an in-memory test.

use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;

/// Filter/rule operator.
///
/// Serialized as its snake_case name. Unrecognized names deserialize to
/// `Unknown` (keeping the original text) instead of failing, so a malformed
/// saved document still loads and the operator fails closed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperatorKind {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    DateAfter,
    DateBefore,
    DateBetween,
    Unknown(String),
}

static TEXT_OPERATORS: [OperatorKind; 8] = [
    OperatorKind::Equals,
    OperatorKind::NotEquals,
    OperatorKind::Contains,
    OperatorKind::NotContains,
    OperatorKind::In,
    OperatorKind::NotIn,
    OperatorKind::IsNull,
    OperatorKind::IsNotNull,
];

static NUMBER_OPERATORS: [OperatorKind; 9] = [
    OperatorKind::Equals,
    OperatorKind::NotEquals,
    OperatorKind::Gt,
    OperatorKind::Gte,
    OperatorKind::Lt,
    OperatorKind::Lte,
    OperatorKind::Between,
    OperatorKind::IsNull,
    OperatorKind::IsNotNull,
];

static DATE_OPERATORS: [OperatorKind; 6] = [
    OperatorKind::Equals,
    OperatorKind::DateAfter,
    OperatorKind::DateBefore,
    OperatorKind::DateBetween,
    OperatorKind::IsNull,
    OperatorKind::IsNotNull,
];

/// Operators offered for a column type, in presentation order.
pub fn operators_for(column_type: ColumnType) -> &'static [OperatorKind] {
    match column_type {
        ColumnType::Text => &TEXT_OPERATORS,
        ColumnType::Number => &NUMBER_OPERATORS,
        ColumnType::Date => &DATE_OPERATORS,
    }
}

impl OperatorKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "equals" => Self::Equals,
            "not_equals" => Self::NotEquals,
            "contains" => Self::Contains,
            "not_contains" => Self::NotContains,
            "in" => Self::In,
            "not_in" => Self::NotIn,
            "is_null" => Self::IsNull,
            "is_not_null" => Self::IsNotNull,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "between" => Self::Between,
            "date_after" => Self::DateAfter,
            "date_before" => Self::DateBefore,
            "date_between" => Self::DateBetween,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::IsNull => "is_null",
            Self::IsNotNull => "is_not_null",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Between => "between",
            Self::DateAfter => "date_after",
            Self::DateBefore => "date_before",
            Self::DateBetween => "date_between",
            Self::Unknown(s) => s,
        }
    }

    /// Human-readable label for pickers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Equals => "= Equals",
            Self::NotEquals => "≠ Not equal",
            Self::Contains => "Contains",
            Self::NotContains => "Does not contain",
            Self::In => "In list",
            Self::NotIn => "Not in list",
            Self::IsNull => "Is empty",
            Self::IsNotNull => "Is not empty",
            Self::Gt => "> Greater",
            Self::Gte => "≥ Greater or equal",
            Self::Lt => "< Less",
            Self::Lte => "≤ Less or equal",
            Self::Between => "Between",
            Self::DateAfter => "On or after",
            Self::DateBefore => "On or before",
            Self::DateBetween => "Between dates",
            Self::Unknown(_) => "Unknown",
        }
    }

    pub fn applies_to(&self, column_type: ColumnType) -> bool {
        operators_for(column_type).contains(self)
    }

    /// Takes a second bound (`value2`).
    pub fn is_range(&self) -> bool {
        matches!(self, Self::Between | Self::DateBetween)
    }

    /// Takes a value at all.
    pub fn needs_value(&self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl From<String> for OperatorKind {
    fn from(s: String) -> Self {
        OperatorKind::parse(&s)
    }
}

impl From<OperatorKind> for String {
    fn from(op: OperatorKind) -> Self {
        op.as_str().to_string()
    }
}

impl std::fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

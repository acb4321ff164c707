//! Condition predicate compiler: filter conditions -> parameterized SQL.
//!
//! Condition values only ever travel as bound parameters. Column names are
//! resolved against the schema and emitted as quoted identifiers.

use serde::Serialize;

use crate::document::FilterCondition;
use crate::error::EngineError;
use crate::matcher;
use crate::operator::OperatorKind;
use crate::schema::{quote_ident, ColumnDef, ColumnType, Schema};

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    Null,
    Real(f64),
    Text(String),
}

impl SqlParam {
    /// Numeric parameter; unparseable input binds NULL so every comparison
    /// against it is false.
    fn number(s: &str) -> Self {
        let n = matcher::parse_number(s);
        if n.is_nan() {
            SqlParam::Null
        } else {
            SqlParam::Real(n)
        }
    }

    fn text(s: &str) -> Self {
        SqlParam::Text(s.to_string())
    }
}

/// Conjunction of compiled conditions. `sql` is empty when there is nothing
/// to filter on (matches every row).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicate {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Predicate {
    pub fn is_match_all(&self) -> bool {
        self.sql.is_empty()
    }

    /// ` WHERE <sql>` or the empty string.
    pub fn where_clause(&self) -> String {
        if self.is_match_all() {
            String::new()
        } else {
            format!(" WHERE {}", self.sql)
        }
    }
}

/// Compile conditions into one AND-ed predicate.
///
/// Fails only when a condition names a column outside the schema; malformed
/// operators and values, and operators foreign to the column's type, compile
/// to clauses that match nothing.
pub fn compile_conditions(schema: &Schema, conditions: &[FilterCondition]) -> Result<Predicate, EngineError> {
    let mut clauses = Vec::with_capacity(conditions.len());
    let mut params = Vec::new();

    for cond in conditions {
        let column = schema.require(&cond.column)?;
        let (clause, mut bound) = compile_clause(column, cond);
        clauses.push(clause);
        params.append(&mut bound);
    }

    let predicate = Predicate {
        sql: clauses.join(" AND "),
        params,
    };
    log::debug!("compiled predicate: {:?} {:?}", predicate.sql, predicate.params);
    Ok(predicate)
}

/// Compile one condition against its schema column.
///
/// Storage keeps empty values as NULL, which SQL comparisons never match.
/// When the in-memory semantics say an empty value satisfies the condition
/// (`not_equals 'x'`, `not_in`, `not_contains`, ...) the clause is widened
/// with `IS NULL` so both paths select the same rows.
pub fn compile_clause(column: &ColumnDef, cond: &FilterCondition) -> (String, Vec<SqlParam>) {
    let col = quote_ident(&column.name);
    let col = col.as_str();
    let value = cond.value.as_str();
    let value2 = cond.value2.as_deref();

    if !matches!(cond.operator, OperatorKind::Unknown(_)) && !cond.operator.applies_to(column.column_type) {
        log::warn!(
            "operator {} does not apply to {} column {col}; condition matches nothing",
            cond.operator,
            column.column_type
        );
        return ("0".to_string(), Vec::new());
    }

    let numeric = column.column_type == ColumnType::Number;
    let (clause, params) = match &cond.operator {
        OperatorKind::Equals if numeric => (format!("{col} = ?"), vec![SqlParam::number(value)]),
        OperatorKind::NotEquals if numeric => (format!("{col} IS NOT ?"), vec![SqlParam::number(value)]),
        OperatorKind::Equals => (format!("{col} = ?"), vec![SqlParam::text(value)]),
        OperatorKind::NotEquals => (format!("{col} != ?"), vec![SqlParam::text(value)]),
        OperatorKind::Contains => (
            format!("{col} LIKE ? ESCAPE '\\'"),
            vec![SqlParam::Text(like_pattern(value))],
        ),
        OperatorKind::NotContains => (
            format!("{col} NOT LIKE ? ESCAPE '\\'"),
            vec![SqlParam::Text(like_pattern(value))],
        ),
        OperatorKind::Gt => (format!("CAST({col} AS REAL) > ?"), vec![SqlParam::number(value)]),
        OperatorKind::Gte => (format!("CAST({col} AS REAL) >= ?"), vec![SqlParam::number(value)]),
        OperatorKind::Lt => (format!("CAST({col} AS REAL) < ?"), vec![SqlParam::number(value)]),
        OperatorKind::Lte => (format!("CAST({col} AS REAL) <= ?"), vec![SqlParam::number(value)]),
        OperatorKind::Between => (
            format!("CAST({col} AS REAL) BETWEEN ? AND ?"),
            vec![
                SqlParam::number(value),
                value2.map(SqlParam::number).unwrap_or(SqlParam::Null),
            ],
        ),
        OperatorKind::In | OperatorKind::NotIn => {
            let tokens: Vec<SqlParam> = matcher::list_tokens(value).map(SqlParam::text).collect();
            let placeholders = vec!["?"; tokens.len()].join(", ");
            let keyword = if cond.operator == OperatorKind::In { "IN" } else { "NOT IN" };
            (format!("{col} {keyword} ({placeholders})"), tokens)
        }
        OperatorKind::IsNull => (format!("({col} IS NULL OR {col} = '')"), Vec::new()),
        OperatorKind::IsNotNull => (format!("({col} IS NOT NULL AND {col} != '')"), Vec::new()),
        OperatorKind::DateAfter => (format!("{col} >= ?"), vec![SqlParam::text(value)]),
        OperatorKind::DateBefore => (format!("{col} <= ?"), vec![SqlParam::text(value)]),
        OperatorKind::DateBetween => (
            format!("{col} BETWEEN ? AND ?"),
            vec![
                SqlParam::text(value),
                value2.map(SqlParam::text).unwrap_or(SqlParam::Null),
            ],
        ),
        OperatorKind::Unknown(name) => {
            log::warn!("unknown operator {name:?} on column {col}; condition matches nothing");
            return ("0".to_string(), Vec::new());
        }
    };

    let widen = cond.operator != OperatorKind::IsNull
        && matcher::matches_typed(column.column_type, &cond.operator, None, value, value2);
    if widen {
        (format!("({col} IS NULL OR {clause})"), params)
    } else {
        (clause, params)
    }
}

/// `%value%` with LIKE metacharacters escaped, so the value is a literal
/// substring.
fn like_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

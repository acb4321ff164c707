// Argument parsing helpers: --where conditions and --select lists

use rowscope_engine::{FilterCondition, OperatorKind};

use crate::CliError;

const CONDITION_SYNTAX: &str = "syntax: 'column:operator[:value[:value2]]', e.g. 'amount:between:10:20'";

/// Parse `column:operator[:value[:value2]]`.
///
/// Only range operators split the remainder into two bounds, so single
/// values may contain `:` (times, URLs).
pub fn parse_condition(expr: &str) -> Result<FilterCondition, CliError> {
    let mut parts = expr.splitn(3, ':');
    let column = parts.next().unwrap_or_default().trim();
    let Some(op_text) = parts.next().map(str::trim) else {
        return Err(CliError::args(format!("no operator in --where {expr:?}")).with_hint(CONDITION_SYNTAX));
    };
    if column.is_empty() {
        return Err(CliError::args(format!("no column in --where {expr:?}")).with_hint(CONDITION_SYNTAX));
    }

    let operator = OperatorKind::parse(op_text);
    if let OperatorKind::Unknown(name) = &operator {
        return Err(CliError::args(format!("unknown operator {name:?} in --where {expr:?}"))
            .with_hint("run `rowscope columns` to see the operators each column accepts"));
    }

    let rest = parts.next();
    if operator.needs_value() && rest.is_none() {
        return Err(CliError::args(format!("{operator} needs a value in --where {expr:?}"))
            .with_hint(CONDITION_SYNTAX));
    }
    let rest = rest.unwrap_or_default();

    if operator.is_range() {
        let Some((low, high)) = rest.split_once(':') else {
            return Err(CliError::args(format!("{operator} needs two values in --where {expr:?}"))
                .with_hint(CONDITION_SYNTAX));
        };
        return Ok(FilterCondition::range(column, operator, low.trim(), high.trim()));
    }

    Ok(FilterCondition::new(column, operator, rest.trim()))
}

pub fn parse_conditions(exprs: &[String]) -> Result<Vec<FilterCondition>, CliError> {
    exprs.iter().map(|e| parse_condition(e)).collect()
}

/// `--select a,b --select c` -> `[a, b, c]`
pub fn parse_select_args(select_args: &[String]) -> Vec<String> {
    select_args
        .iter()
        .flat_map(|arg| arg.split(','))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes::EXIT_USAGE;

    #[test]
    fn parses_simple_condition() {
        let c = parse_condition("payer:equals:ACME").unwrap();
        assert_eq!(c, FilterCondition::new("payer", OperatorKind::Equals, "ACME"));
    }

    #[test]
    fn keeps_colons_in_single_values() {
        let c = parse_condition("note:contains:10:30").unwrap();
        assert_eq!(c.value, "10:30");
        assert_eq!(c.value2, None);
    }

    #[test]
    fn range_takes_two_bounds() {
        let c = parse_condition("amount:between: 10 :20").unwrap();
        assert_eq!(c, FilterCondition::range("amount", OperatorKind::Between, "10", "20"));
        let err = parse_condition("due:date_between:2024-01-01").unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
    }

    #[test]
    fn null_checks_need_no_value() {
        let c = parse_condition("payer:is_null").unwrap();
        assert_eq!(c.operator, OperatorKind::IsNull);
        assert_eq!(c.value, "");
    }

    #[test]
    fn equals_accepts_an_empty_value() {
        let c = parse_condition("payer:equals:").unwrap();
        assert_eq!(c.value, "");
    }

    #[test]
    fn rejects_malformed_conditions() {
        for bad in ["payer", ":equals:x", "payer:like:x", "payer:equals"] {
            let err = parse_condition(bad).unwrap_err();
            assert_eq!(err.code, EXIT_USAGE, "{bad}");
            assert!(err.hint.is_some(), "{bad}");
        }
    }

    #[test]
    fn select_args_split_on_commas() {
        let args = vec!["a, b".to_string(), "c".to_string(), ",".to_string()];
        assert_eq!(parse_select_args(&args), vec!["a", "b", "c"]);
    }
}

// Formula evaluator - walks the parsed AST against a sheet grid.
// Formula cells referenced by other formulas are evaluated on demand;
// a reference back into a cell already being evaluated is a cycle.

use std::cmp::Ordering;

use rowscope_engine::value::format_number;
use rowscope_engine::{FormulaEngine, FormulaError, Sheet, SheetCell, SheetValue};

use crate::parser::{parse, Expr, Op};

type EvalResult = Result<SheetValue, FormulaError>;

const DEFAULT_MAX_DEPTH: usize = 64;

/// Default [`FormulaEngine`]: a small spreadsheet expression language.
#[derive(Debug, Clone)]
pub struct Evaluator {
    max_depth: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH }
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum chain of formula cells evaluated through references.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }
}

impl FormulaEngine for Evaluator {
    fn evaluate(&self, sheet: &Sheet, row: usize, col: usize) -> EvalResult {
        let mut ctx = Context {
            sheet,
            stack: Vec::new(),
            max_depth: self.max_depth,
        };
        ctx.cell(row, col)
    }
}

struct Context<'a> {
    sheet: &'a Sheet,
    /// Formula cells currently being evaluated.
    stack: Vec<(usize, usize)>,
    max_depth: usize,
}

impl<'a> Context<'a> {
    fn cell(&mut self, row: usize, col: usize) -> EvalResult {
        let sheet = self.sheet;
        match sheet.get(row, col) {
            SheetCell::Empty => Ok(SheetValue::Empty),
            SheetCell::Number(n) => Ok(SheetValue::Number(*n)),
            SheetCell::Text(s) => Ok(SheetValue::Text(s.clone())),
            SheetCell::Formula(text) => {
                if self.stack.contains(&(row, col)) || self.stack.len() >= self.max_depth {
                    return Err(FormulaError::Cycle);
                }
                let expr = parse(text).map_err(FormulaError::Parse)?;
                self.stack.push((row, col));
                let result = self.eval(&expr);
                self.stack.pop();
                result
            }
        }
    }

    fn eval(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Number(n) => Ok(SheetValue::Number(*n)),
            Expr::Text(s) => Ok(SheetValue::Text(s.clone())),
            Expr::Boolean(b) => Ok(SheetValue::Bool(*b)),
            Expr::Empty => Ok(SheetValue::Empty),
            Expr::CellRef { row, col } => self.cell(*row, *col),
            // Ranges only make sense as function arguments
            Expr::Range { .. } => Err(FormulaError::Value),
            Expr::Name(name) => Err(FormulaError::Name(name.clone())),
            Expr::Function { name, args } => self.call(name, args),
            Expr::BinaryOp { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary_op(*op, &left, &right)
            }
        }
    }

    /// Argument values with ranges expanded cell by cell.
    fn values(&mut self, args: &[Expr]) -> Result<Vec<SheetValue>, FormulaError> {
        let mut out = Vec::new();
        for arg in args {
            match arg {
                Expr::Range { start_col, start_row, end_col, end_row } => {
                    for row in *start_row..=*end_row {
                        for col in *start_col..=*end_col {
                            out.push(self.cell(row, col)?);
                        }
                    }
                }
                other => out.push(self.eval(other)?),
            }
        }
        Ok(out)
    }

    /// Numbers for aggregate functions. Text and blanks inside ranges are
    /// skipped; a direct text argument must parse as a number.
    fn numbers(&mut self, args: &[Expr]) -> Result<Vec<f64>, FormulaError> {
        let mut out = Vec::new();
        for arg in args {
            if let Expr::Range { .. } = arg {
                for value in self.values(std::slice::from_ref(arg))? {
                    if let SheetValue::Number(n) = value {
                        out.push(n);
                    }
                }
                continue;
            }
            match self.eval(arg)? {
                SheetValue::Empty => {}
                value => out.push(to_number(&value)?),
            }
        }
        Ok(out)
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> EvalResult {
        let name = canonical_name(name);
        match name {
            "SUM" => Ok(SheetValue::Number(self.numbers(args)?.iter().sum())),
            "AVERAGE" => {
                let values = self.numbers(args)?;
                if values.is_empty() {
                    return Err(FormulaError::DivByZero);
                }
                Ok(SheetValue::Number(values.iter().sum::<f64>() / values.len() as f64))
            }
            "MIN" => {
                let values = self.numbers(args)?;
                Ok(SheetValue::Number(values.iter().copied().reduce(f64::min).unwrap_or(0.0)))
            }
            "MAX" => {
                let values = self.numbers(args)?;
                Ok(SheetValue::Number(values.iter().copied().reduce(f64::max).unwrap_or(0.0)))
            }
            "COUNT" => {
                let mut count = 0usize;
                for arg in args {
                    match arg {
                        Expr::Range { .. } => {
                            count += self
                                .values(std::slice::from_ref(arg))?
                                .iter()
                                .filter(|v| matches!(v, SheetValue::Number(_)))
                                .count();
                        }
                        other => {
                            if let Ok(SheetValue::Number(_)) = self.eval(other) {
                                count += 1;
                            }
                        }
                    }
                }
                Ok(SheetValue::Number(count as f64))
            }
            "ABS" => {
                arity(args, 1, 1)?;
                Ok(SheetValue::Number(self.number_arg(&args[0])?.abs()))
            }
            "ROUND" => {
                arity(args, 1, 2)?;
                let value = self.number_arg(&args[0])?;
                let digits = match args.get(1) {
                    Some(arg) => self.number_arg(arg)? as i32,
                    None => 0,
                };
                let factor = 10f64.powi(digits);
                Ok(SheetValue::Number((value * factor).round() / factor))
            }
            "IF" => {
                arity(args, 2, 3)?;
                let condition = to_bool(&self.eval(&args[0])?)?;
                match (condition, args.get(2)) {
                    (true, _) => self.eval(&args[1]),
                    (false, Some(otherwise)) => self.eval(otherwise),
                    (false, None) => Ok(SheetValue::Bool(false)),
                }
            }
            "IFERROR" => {
                arity(args, 2, 2)?;
                match self.eval(&args[0]) {
                    Ok(value) => Ok(value),
                    Err(_) => self.eval(&args[1]),
                }
            }
            "AND" | "OR" => {
                arity(args, 1, usize::MAX)?;
                let mut flags = Vec::new();
                for value in self.values(args)? {
                    match value {
                        SheetValue::Empty => {}
                        other => flags.push(to_bool(&other)?),
                    }
                }
                let result = if name == "AND" {
                    flags.iter().all(|b| *b)
                } else {
                    flags.iter().any(|b| *b)
                };
                Ok(SheetValue::Bool(result))
            }
            "NOT" => {
                arity(args, 1, 1)?;
                Ok(SheetValue::Bool(!to_bool(&self.eval(&args[0])?)?))
            }
            "CONCAT" | "CONCATENATE" => {
                let text: String = self.values(args)?.iter().map(to_text).collect();
                Ok(SheetValue::Text(text))
            }
            "LEN" => {
                arity(args, 1, 1)?;
                let text = to_text(&self.eval(&args[0])?);
                Ok(SheetValue::Number(text.chars().count() as f64))
            }
            "UPPER" | "LOWER" | "TRIM" => {
                arity(args, 1, 1)?;
                let text = to_text(&self.eval(&args[0])?);
                let out = match name {
                    "UPPER" => text.to_uppercase(),
                    "LOWER" => text.to_lowercase(),
                    _ => text.split_whitespace().collect::<Vec<_>>().join(" "),
                };
                Ok(SheetValue::Text(out))
            }
            "ISBLANK" => {
                arity(args, 1, 1)?;
                Ok(SheetValue::Bool(matches!(self.eval(&args[0])?, SheetValue::Empty)))
            }
            other => Err(FormulaError::Name(other.to_string())),
        }
    }

    fn number_arg(&mut self, arg: &Expr) -> Result<f64, FormulaError> {
        to_number(&self.eval(arg)?)
    }
}

/// Portuguese function names map onto their English equivalents.
fn canonical_name(name: &str) -> &str {
    match name {
        "SOMA" => "SUM",
        "MÉDIA" | "MEDIA" => "AVERAGE",
        "MÍNIMO" | "MINIMO" => "MIN",
        "MÁXIMO" | "MAXIMO" => "MAX",
        "CONTAR" => "COUNT",
        "ARRED" => "ROUND",
        "SE" => "IF",
        "SE.ERRO" => "IFERROR",
        "E" => "AND",
        "OU" => "OR",
        "NÃO" | "NAO" => "NOT",
        "CONCATENAR" => "CONCATENATE",
        "NÚM.CARAT" => "LEN",
        "MAIÚSCULAS" => "UPPER",
        "MINÚSCULAS" => "LOWER",
        "COMPACTAR" => "TRIM",
        "É.CÉL.VAZIA" => "ISBLANK",
        other => other,
    }
}

fn arity(args: &[Expr], min: usize, max: usize) -> Result<(), FormulaError> {
    if args.len() < min || args.len() > max {
        return Err(FormulaError::Value);
    }
    Ok(())
}

fn binary_op(op: Op, left: &SheetValue, right: &SheetValue) -> EvalResult {
    match op {
        Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Pow => {
            let a = to_number(left)?;
            let b = to_number(right)?;
            let result = match op {
                Op::Add => a + b,
                Op::Sub => a - b,
                Op::Mul => a * b,
                Op::Div => {
                    if b == 0.0 {
                        return Err(FormulaError::DivByZero);
                    }
                    a / b
                }
                _ => a.powf(b),
            };
            if !result.is_finite() {
                return Err(FormulaError::Num);
            }
            Ok(SheetValue::Number(result))
        }
        Op::Concat => Ok(SheetValue::Text(format!("{}{}", to_text(left), to_text(right)))),
        Op::Lt | Op::Gt | Op::Eq | Op::LtEq | Op::GtEq | Op::NotEq => {
            let ordering = compare(left, right);
            let result = match op {
                Op::Lt => ordering == Ordering::Less,
                Op::Gt => ordering == Ordering::Greater,
                Op::Eq => ordering == Ordering::Equal,
                Op::LtEq => ordering != Ordering::Greater,
                Op::GtEq => ordering != Ordering::Less,
                _ => ordering != Ordering::Equal,
            };
            Ok(SheetValue::Bool(result))
        }
    }
}

/// Numbers compare numerically (blank as 0), text case-insensitively
/// (blank as ""); mixed kinds try numbers first, then fall back to text.
fn compare(left: &SheetValue, right: &SheetValue) -> Ordering {
    use SheetValue::*;
    match (left, right) {
        (Number(_) | Empty, Number(_)) | (Number(_), Empty) | (Bool(_), Bool(_)) => {
            let a = to_number(left).unwrap_or(0.0);
            let b = to_number(right).unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        _ => match (to_number(left), to_number(right)) {
            (Ok(a), Ok(b)) if !matches!((left, right), (Text(_), Text(_))) => {
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            _ => to_text(left).to_lowercase().cmp(&to_text(right).to_lowercase()),
        },
    }
}

fn to_number(value: &SheetValue) -> Result<f64, FormulaError> {
    match value {
        SheetValue::Empty => Ok(0.0),
        SheetValue::Number(n) => Ok(*n),
        SheetValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        SheetValue::Text(s) if s.trim().is_empty() => Ok(0.0),
        SheetValue::Text(s) => s.trim().parse::<f64>().map_err(|_| FormulaError::Value),
    }
}

fn to_text(value: &SheetValue) -> String {
    match value {
        SheetValue::Number(n) => format_number(*n),
        other => other.to_string(),
    }
}

fn to_bool(value: &SheetValue) -> Result<bool, FormulaError> {
    match value {
        SheetValue::Empty => Ok(false),
        SheetValue::Bool(b) => Ok(*b),
        SheetValue::Number(n) => Ok(*n != 0.0),
        SheetValue::Text(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
        SheetValue::Text(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
        SheetValue::Text(_) => Err(FormulaError::Value),
    }
}

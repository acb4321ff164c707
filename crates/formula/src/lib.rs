//! `rowscope-formula`: spreadsheet expressions for formula columns.
//!
//! Implements [`rowscope_engine::FormulaEngine`] over a [`rowscope_engine::Sheet`]:
//! numbers, strings, booleans, A1 references and ranges, arithmetic,
//! comparison and `&`, plus a small function library (aggregates, logic,
//! text). Portuguese function names and `;` argument separators are accepted.

pub mod eval;
pub mod parser;

pub use eval::Evaluator;
pub use parser::{parse, Expr, Op};

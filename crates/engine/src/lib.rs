//! `rowscope-engine`: pure core for filtered record views.
//!
//! Turns declarative filter conditions into parameterized SQL, evaluates
//! color rules against rows, plans paginated and export queries, and shifts
//! formula references before handing them to a formula collaborator.
//! No IO: storage, persistence and formula evaluation live elsewhere.

pub mod document;
pub mod error;
pub mod formula;
pub mod layout;
pub mod matcher;
pub mod operator;
pub mod predicate;
pub mod query;
pub mod refs;
pub mod schema;
pub mod style;
pub mod value;

pub use document::{ColorRule, FilterCondition, FormulaColumn, SavedFilter, TargetType};
pub use error::EngineError;
pub use formula::{
    preview_formula, project_formulas, FormulaEngine, FormulaError, Sheet, SheetCell, SheetValue,
};
pub use layout::{display_columns, DisplayColumn};
pub use operator::OperatorKind;
pub use predicate::{compile_conditions, Predicate, SqlParam};
pub use query::{plan_export, plan_page, ExportPlan, PagePlan, PageRequest, Sort, SortDirection};
pub use refs::shift_row_refs;
pub use schema::{ColumnDef, ColumnType, Schema};
pub use style::{condition_columns, evaluate_style, Style, StyleEvaluator, StyleResult};
pub use value::{CellValue, Row};

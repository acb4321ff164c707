//! Query orchestration contract.
//!
//! Plans the SQL for one page of results (plus its independent total count)
//! and for the unpaginated export. Both go through `compile_conditions`, so
//! what a page shows and what an export writes can never drift apart.
//! Execution belongs to the record store.

use serde::{Deserialize, Serialize};

use crate::document::FilterCondition;
use crate::error::EngineError;
use crate::predicate::{compile_conditions, SqlParam};
use crate::schema::{quote_ident, Schema};

/// Table holding the loaded records.
pub const RECORDS_TABLE: &str = "records";

/// Insertion-order key, used as the default order and the sort tiebreak.
pub const ROW_ID: &str = "id";

pub const DEFAULT_PAGE_SIZE: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), direction: SortDirection::Asc }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), direction: SortDirection::Desc }
    }
}

/// One page request. `page` is 1-based; empty `columns` selects all.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub columns: Vec<String>,
    /// Read alongside `columns` (color rule inputs) without being shown.
    pub extra_columns: Vec<String>,
    pub conditions: Vec<FilterCondition>,
    pub page: u64,
    pub page_size: u64,
    pub sort: Option<Sort>,
}

impl PageRequest {
    pub fn new(columns: Vec<String>, conditions: Vec<FilterCondition>) -> Self {
        Self {
            columns,
            extra_columns: Vec::new(),
            conditions,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: None,
        }
    }

    pub fn page(mut self, page: u64, page_size: u64) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn fetching(mut self, extra: Vec<String>) -> Self {
        self.extra_columns = extra;
        self
    }

    pub fn sorted(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Rows skipped before this page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

/// SQL for one page: `count_sql` takes `params`; `rows_sql` takes `params`
/// followed by `limit` and `offset`.
///
/// `rows_sql` reads `fetched`: the displayed `columns` first, then any extra
/// columns not already selected.
#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    pub columns: Vec<String>,
    pub fetched: Vec<String>,
    pub count_sql: String,
    pub rows_sql: String,
    pub params: Vec<SqlParam>,
    pub limit: u64,
    pub offset: u64,
}

/// SQL for the unpaginated export path.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub columns: Vec<String>,
    pub sql: String,
    pub params: Vec<SqlParam>,
}

pub fn plan_page(schema: &Schema, request: &PageRequest) -> Result<PagePlan, EngineError> {
    if request.page == 0 {
        return Err(EngineError::InvalidPage(request.page));
    }
    if request.page_size == 0 {
        return Err(EngineError::InvalidPageSize(request.page_size));
    }

    let columns = schema.resolve_selection(&request.columns)?;
    let mut fetched = columns.clone();
    for name in &request.extra_columns {
        let column = schema.require(name)?;
        if !fetched.contains(&column.name) {
            fetched.push(column.name.clone());
        }
    }
    let predicate = compile_conditions(schema, &request.conditions)?;
    let where_clause = predicate.where_clause();

    let order_by = match &request.sort {
        Some(sort) => {
            let column = schema.require(&sort.column)?;
            format!(
                "ORDER BY {} {}, {ROW_ID} ASC",
                quote_ident(&column.name),
                sort.direction.sql()
            )
        }
        None => format!("ORDER BY {ROW_ID} ASC"),
    };

    Ok(PagePlan {
        count_sql: format!("SELECT COUNT(*) FROM {RECORDS_TABLE}{where_clause}"),
        rows_sql: format!(
            "SELECT {} FROM {RECORDS_TABLE}{where_clause} {order_by} LIMIT ? OFFSET ?",
            projection(&fetched)
        ),
        columns,
        fetched,
        params: predicate.params,
        limit: request.page_size,
        offset: request.offset(),
    })
}

/// Every matching row in insertion order.
pub fn plan_export(
    schema: &Schema,
    columns: &[String],
    conditions: &[FilterCondition],
) -> Result<ExportPlan, EngineError> {
    let columns = schema.resolve_selection(columns)?;
    let predicate = compile_conditions(schema, conditions)?;
    Ok(ExportPlan {
        sql: format!(
            "SELECT {} FROM {RECORDS_TABLE}{} ORDER BY {ROW_ID} ASC",
            projection(&columns),
            predicate.where_clause()
        ),
        columns,
        params: predicate.params,
    })
}

fn projection(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

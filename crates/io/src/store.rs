//! SQLite record store.
//!
//! One `records` table shaped by the column schema. Loads replace the whole
//! table atomically; reads execute the plans produced by the engine so the
//! paginated page and the unpaginated export share one predicate.

use std::path::Path;

use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::Serialize;

use rowscope_engine::query::{RECORDS_TABLE, ROW_ID};
use rowscope_engine::schema::quote_ident;
use rowscope_engine::{
    plan_export, plan_page, CellValue, ColumnType, EngineError, FilterCondition, PageRequest,
    Row, Schema, SqlParam,
};

pub const DEFAULT_DISTINCT_LIMIT: u64 = 200;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("no CSV header matches a configured column")]
    NoMatchingColumns,

    #[error("CSV needs a header row and at least one data row")]
    TooFewRecords,

    #[error("invalid filter id: {0:?}")]
    InvalidFilterId(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Result of a replace-all load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub imported: usize,
    pub skipped: usize,
    pub unmapped_headers: Vec<String>,
}

/// One page of rows plus the total number of matching rows. Rows may also
/// carry the request's extra (non-displayed) columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPage {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStats {
    pub total: u64,
    pub min_date: Option<String>,
    pub max_date: Option<String>,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) a store on disk.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA cache_size = -64000;",
        )?;
        log::debug!("opened record store at {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn table_exists(&self) -> Result<bool, StoreError> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [RECORDS_TABLE],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Create the records table and its indexes if missing.
    pub fn ensure_table(&self, schema: &Schema) -> Result<(), StoreError> {
        let mut ddl = format!(
            "CREATE TABLE IF NOT EXISTS {RECORDS_TABLE} (\n    {ROW_ID} INTEGER PRIMARY KEY AUTOINCREMENT"
        );
        for col in schema.columns() {
            ddl.push_str(&format!(
                ",\n    {} {}",
                quote_ident(&col.name),
                col.column_type.sql_type()
            ));
        }
        ddl.push_str("\n);\n");
        for col in schema.columns().iter().filter(|c| c.indexed) {
            ddl.push_str(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON {RECORDS_TABLE}({});\n",
                quote_ident(&format!("idx_{}", col.name)),
                quote_ident(&col.name)
            ));
        }
        self.conn.execute_batch(&ddl)?;
        Ok(())
    }

    /// Replace every stored record with `rows`, in one transaction.
    ///
    /// Headers map to columns by label, then by name. Rows with no value in
    /// any mapped column are skipped.
    pub fn replace_all(
        &mut self,
        schema: &Schema,
        headers: &[String],
        rows: &[Vec<String>],
    ) -> Result<LoadSummary, StoreError> {
        let mut mapping: Vec<(usize, &str, ColumnType)> = Vec::new();
        let mut unmapped_headers = Vec::new();
        for (idx, header) in headers.iter().enumerate() {
            match schema.resolve_header(header) {
                Some(col) if !mapping.iter().any(|(_, name, _)| *name == col.name) => {
                    mapping.push((idx, col.name.as_str(), col.column_type));
                }
                _ => unmapped_headers.push(header.clone()),
            }
        }
        if mapping.is_empty() {
            return Err(StoreError::NoMatchingColumns);
        }
        if !unmapped_headers.is_empty() {
            log::warn!("ignoring unmapped CSV headers: {}", unmapped_headers.join(", "));
        }

        self.ensure_table(schema)?;

        let insert_sql = format!(
            "INSERT INTO {RECORDS_TABLE} ({}) VALUES ({})",
            mapping
                .iter()
                .map(|(_, name, _)| quote_ident(name))
                .collect::<Vec<_>>()
                .join(", "),
            vec!["?"; mapping.len()].join(", ")
        );

        let mut summary = LoadSummary {
            unmapped_headers,
            ..LoadSummary::default()
        };

        let tx = self.conn.transaction()?;
        tx.execute(&format!("DELETE FROM {RECORDS_TABLE}"), [])?;
        // sqlite_sequence only exists once an AUTOINCREMENT row was written.
        let _ = tx.execute(
            "DELETE FROM sqlite_sequence WHERE name = ?1",
            [RECORDS_TABLE],
        );
        {
            let mut stmt = tx.prepare(&insert_sql)?;
            for (line, fields) in rows.iter().enumerate() {
                let values: Vec<Value> = mapping
                    .iter()
                    .map(|(idx, _, ty)| field_value(fields.get(*idx).map(String::as_str), *ty))
                    .collect();
                if values.iter().all(|v| matches!(v, Value::Null)) {
                    log::warn!("skipping empty data row {}", line + 2);
                    summary.skipped += 1;
                    continue;
                }
                stmt.execute(params_from_iter(values))?;
                summary.imported += 1;
            }
        }
        tx.commit()?;

        log::info!(
            "loaded {} records ({} skipped, {} unmapped headers)",
            summary.imported,
            summary.skipped,
            summary.unmapped_headers.len()
        );
        Ok(summary)
    }

    /// Execute one page plan: the page rows and the independent total.
    pub fn query_page(&self, schema: &Schema, request: &PageRequest) -> Result<QueryPage, StoreError> {
        let plan = plan_page(schema, request)?;
        if !self.table_exists()? {
            return Ok(QueryPage {
                columns: plan.columns,
                rows: Vec::new(),
                total: 0,
            });
        }

        let params: Vec<Value> = plan.params.iter().map(sql_value).collect();
        log::debug!("count: {} {:?}", plan.count_sql, params);
        let total: i64 = self
            .conn
            .query_row(&plan.count_sql, params_from_iter(params.iter()), |row| row.get(0))?;

        let mut row_params = params;
        row_params.push(Value::Integer(clamp_i64(plan.limit)));
        row_params.push(Value::Integer(clamp_i64(plan.offset)));
        log::debug!("page: {} {:?}", plan.rows_sql, row_params);
        let rows = self.select(&plan.rows_sql, &plan.fetched, row_params)?;

        Ok(QueryPage {
            columns: plan.columns,
            rows,
            total: total.max(0) as u64,
        })
    }

    /// Every matching row in insertion order, no pagination.
    pub fn query_all(
        &self,
        schema: &Schema,
        columns: &[String],
        conditions: &[FilterCondition],
    ) -> Result<Vec<Row>, StoreError> {
        let plan = plan_export(schema, columns, conditions)?;
        if !self.table_exists()? {
            return Ok(Vec::new());
        }
        let params: Vec<Value> = plan.params.iter().map(sql_value).collect();
        log::debug!("export: {} {:?}", plan.sql, params);
        self.select(&plan.sql, &plan.columns, params)
    }

    /// Sorted non-empty values of one column.
    pub fn distinct_values(
        &self,
        schema: &Schema,
        column: &str,
        limit: u64,
    ) -> Result<Vec<String>, StoreError> {
        let col = quote_ident(&schema.require(column)?.name);
        if !self.table_exists()? {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT DISTINCT {col} FROM {RECORDS_TABLE} \
             WHERE {col} IS NOT NULL AND {col} != '' ORDER BY {col} LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let values = stmt
            .query_map([clamp_i64(limit)], |row| Ok(cell_value(row.get_ref(0)?).as_text()))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    /// Row count plus the date range of `date_column` when given.
    pub fn stats(&self, schema: &Schema, date_column: Option<&str>) -> Result<TableStats, StoreError> {
        let date_col = date_column
            .map(|name| schema.require(name).map(|c| quote_ident(&c.name)))
            .transpose()?;
        if !self.table_exists()? {
            return Ok(TableStats::default());
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {RECORDS_TABLE}"),
            [],
            |row| row.get(0),
        )?;
        let mut stats = TableStats {
            total: total.max(0) as u64,
            ..TableStats::default()
        };
        if let Some(col) = date_col {
            let sql = format!(
                "SELECT MIN({col}), MAX({col}) FROM {RECORDS_TABLE} WHERE {col} IS NOT NULL AND {col} != ''"
            );
            let (min, max) = self.conn.query_row(&sql, [], |row| {
                Ok((
                    cell_value(row.get_ref(0)?),
                    cell_value(row.get_ref(1)?),
                ))
            })?;
            stats.min_date = (!min.is_null()).then(|| min.as_text());
            stats.max_date = (!max.is_null()).then(|| max.as_text());
        }
        Ok(stats)
    }

    fn select(&self, sql: &str, columns: &[String], params: Vec<Value>) -> Result<Vec<Row>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                let mut out = Row::with_capacity(columns.len());
                for (idx, name) in columns.iter().enumerate() {
                    out.insert(name.clone(), cell_value(row.get_ref(idx)?));
                }
                Ok(out)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Storage value for one CSV field.
fn field_value(field: Option<&str>, column_type: ColumnType) -> Value {
    let Some(raw) = field.map(str::trim).filter(|s| !s.is_empty()) else {
        return Value::Null;
    };
    match column_type {
        ColumnType::Number => parse_decimal(raw).map(Value::Real).unwrap_or(Value::Null),
        ColumnType::Text | ColumnType::Date => Value::Text(raw.to_string()),
    }
}

/// `1234,5` and `1234.5` both parse; anything else is not a number.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim()
        .replacen(',', ".", 1)
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

pub fn sql_value(param: &SqlParam) -> Value {
    match param {
        SqlParam::Null => Value::Null,
        SqlParam::Real(n) => Value::Real(*n),
        SqlParam::Text(s) => Value::Text(s.clone()),
    }
}

fn cell_value(value: ValueRef<'_>) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(n) => CellValue::Integer(n),
        ValueRef::Real(n) => CellValue::Real(n),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            CellValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

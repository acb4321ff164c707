use thiserror::Error;

/// Caller/collaborator contract violations.
///
/// User-supplied filter values never produce these: malformed operators and
/// non-numeric values degrade to non-matching predicates instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A condition, selection, sort or rule names a column the schema lacks.
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    /// Column name is not a plain identifier.
    #[error("invalid column name: {0:?}")]
    InvalidColumnName(String),
    /// The same column name appears twice in a schema.
    #[error("duplicate column: {0}")]
    DuplicateColumn(String),
    /// Two columns share a label (compared case-insensitively).
    #[error("duplicate column label: {0}")]
    DuplicateLabel(String),
    /// Pages are 1-based.
    #[error("page must be >= 1 (got {0})")]
    InvalidPage(u64),
    #[error("page size must be >= 1 (got {0})")]
    InvalidPageSize(u64),
    /// A cell-targeted color rule has no target column.
    #[error("color rule '{0}' targets a cell but has no target column")]
    MissingTargetColumn(String),
}

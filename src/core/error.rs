use thiserror::Error;

/// Per-row conversion failures.
///
/// These never indicate a setup defect: the same method can succeed on the
/// next call with different data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("NULL in column '{column}' cannot be assigned to non-nullable type {target}")]
    NullIntoNonNullable { column: String, target: &'static str },

    #[error("Incompatible numeric type: value {value} in column '{column}' does not fit into {target}")]
    IncompatibleNumeric {
        column: String,
        target: &'static str,
        value: String,
    },

    #[error("Incompatible type: column '{column}' holds {found}, expected {target}")]
    IncompatibleType {
        column: String,
        target: &'static str,
        found: &'static str,
    },

    #[error("Column '{0}' not found in result set")]
    ColumnNotFound(String),

    #[error("Unknown variant '{variant}' for enum {target}")]
    UnknownVariant { target: &'static str, variant: String },

    #[error("No extraction available for type {0}")]
    UnsupportedTarget(&'static str),

    #[error("Cannot decode column '{column}' as {target}: {reason}")]
    Decode {
        column: String,
        target: &'static str,
        reason: String,
    },

    #[error("Failed to construct {type_name} (constructor parameter {position}): {source}")]
    Constructor {
        type_name: &'static str,
        position: usize,
        #[source]
        source: Box<MappingError>,
    },
}

impl MappingError {
    /// Short hint telling which of the common construction failures happened.
    pub fn diagnostic(&self) -> &'static str {
        match self {
            Self::NullIntoNonNullable { .. } => "a NULL value was passed to a non-nullable parameter",
            Self::IncompatibleNumeric { .. } => "the numeric value does not fit the parameter type",
            Self::Constructor { source, .. } => source.diagnostic(),
            _ => "the column value cannot be converted to the parameter type",
        }
    }
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Incorrect result size: expected {expected}, actual {actual}")]
    Cardinality { expected: usize, actual: usize },

    #[error("Data error: {0}")]
    Data(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl QueryError {
    /// Setup defects: callers should abort rather than retry.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Errors caused by the data a call produced or received.
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            Self::Mapping(_) | Self::Cardinality { .. } | Self::Data(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

impl<T> From<std::sync::PoisonError<T>> for QueryError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

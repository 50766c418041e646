use crate::core::{MappingError, QueryError, Result, Value};
use std::fmt;

/// Rows returned by one query, with the column names reported by the backend.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row::new(&self.columns, values))
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row::new(&self.columns, values))
    }

    /// The only row of the result; zero or several rows is a cardinality error.
    pub fn single_row(&self) -> Result<Row<'_>> {
        match self.rows.as_slice() {
            [values] => Ok(Row::new(&self.columns, values)),
            rows => Err(QueryError::Cardinality {
                expected: 1,
                actual: rows.len(),
            }),
        }
    }
}

/// Column reference used by column mappers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Named(String),
    /// Zero-based position.
    Index(usize),
}

impl Column {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn first() -> Self {
        Self::Index(0)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{}", name),
            Self::Index(index) => write!(f, "#{}", index + 1),
        }
    }
}

/// Borrowed view over one row of a [`ResultSet`].
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn new(columns: &'a [String], values: &'a [Value]) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &'a [String] {
        self.columns
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    /// Column names are matched case-insensitively, as SQL identifiers are.
    pub fn get(&self, column: &Column) -> std::result::Result<&'a Value, MappingError> {
        match column {
            Column::Named(name) => self.by_name(name),
            Column::Index(index) => self.by_index(*index),
        }
    }

    pub fn by_name(&self, name: &str) -> std::result::Result<&'a Value, MappingError> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
            .ok_or_else(|| MappingError::ColumnNotFound(name.to_string()))
    }

    pub fn by_index(&self, index: usize) -> std::result::Result<&'a Value, MappingError> {
        self.values
            .get(index)
            .ok_or_else(|| MappingError::ColumnNotFound(Column::Index(index).to_string()))
    }
}

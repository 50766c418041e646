mod constructor;
mod resolver;

use crate::column::ColumnMapper;
use crate::core::{AnyValue, QueryError, Result};
use crate::result::Row;
use std::fmt;
use std::sync::Arc;

pub use constructor::{
    Composite, CompositeDescriptor, Constructor, ConstructorArgs, ConstructorParam, ConstructorRowMapper,
};
pub use resolver::{CachedMapper, RowMapperResolver};

/// Turns one row into a value of the element type of a method's result.
pub trait RowMapper: Send + Sync {
    fn map_row(&self, row: &Row<'_>, row_num: usize) -> Result<AnyValue>;
}

/// Row mapper delegating to a single column mapper, usually built for the first column.
pub struct SingleColumnRowMapper {
    column: Box<dyn ColumnMapper>,
}

impl SingleColumnRowMapper {
    pub fn new(column: Box<dyn ColumnMapper>) -> Self {
        Self { column }
    }
}

impl RowMapper for SingleColumnRowMapper {
    fn map_row(&self, row: &Row<'_>, _row_num: usize) -> Result<AnyValue> {
        Ok(self.column.get(row)?)
    }
}

/// An explicit row mapper declared on a method, instantiated on each invocation.
#[derive(Clone, Copy)]
pub struct RowMapperType {
    name: &'static str,
    instantiate: fn() -> std::result::Result<Arc<dyn RowMapper>, String>,
}

impl RowMapperType {
    pub fn of<M: RowMapper + Default + 'static>() -> Self {
        Self {
            name: std::any::type_name::<M>(),
            instantiate: instantiate_default::<M>,
        }
    }

    /// Mapper type with a fallible constructor.
    pub fn from_fn(
        name: &'static str,
        instantiate: fn() -> std::result::Result<Arc<dyn RowMapper>, String>,
    ) -> Self {
        Self { name, instantiate }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn instantiate(&self) -> Result<Arc<dyn RowMapper>> {
        (self.instantiate)().map_err(|reason| {
            QueryError::Configuration(format!(
                "Was not able to create a new instance of {}. It requires a zero-argument constructor: {}",
                self.name, reason
            ))
        })
    }
}

impl fmt::Debug for RowMapperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RowMapperType").field(&self.name).finish()
    }
}

fn instantiate_default<M: RowMapper + Default + 'static>() -> std::result::Result<Arc<dyn RowMapper>, String> {
    Ok(Arc::new(M::default()))
}

mod extract;

use crate::core::{Annotations, AnyValue, MappingError, TypeRef};
use crate::mapper::{RowMapper, SingleColumnRowMapper};
use crate::result::{Column, Row};
use std::sync::Arc;

pub use extract::{GenericColumnMapper, boolean_from, extract_value};

/// Extracts one column of a row as the type it was built for.
pub trait ColumnMapper: Send + Sync {
    fn column(&self) -> &Column;

    fn get(&self, row: &Row<'_>) -> Result<AnyValue, MappingError>;
}

/// Decides which declared types it handles and builds column mappers for them.
pub trait ColumnMapperFactory: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower values are consulted first.
    fn priority(&self) -> i32;

    fn accept(&self, ty: &TypeRef, annotations: &Annotations) -> bool;

    fn build(&self, column: Column, ty: &TypeRef) -> Box<dyn ColumnMapper>;

    /// Row mapper reading the first column of each row as `ty`.
    fn single_column_mapper(&self, ty: &TypeRef) -> Arc<dyn RowMapper> {
        Arc::new(SingleColumnRowMapper::new(self.build(Column::first(), ty)))
    }
}

/// Factories ordered by ascending priority; equal priorities keep registration order.
pub struct ColumnMapperChain {
    factories: Vec<Box<dyn ColumnMapperFactory>>,
}

impl ColumnMapperChain {
    pub fn new(mut factories: Vec<Box<dyn ColumnMapperFactory>>) -> Self {
        factories.sort_by_key(|factory| factory.priority());
        Self { factories }
    }

    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// First factory accepting the type, if any.
    pub fn find(&self, ty: &TypeRef, annotations: &Annotations) -> Option<&dyn ColumnMapperFactory> {
        self.factories
            .iter()
            .find(|factory| factory.accept(ty, annotations))
            .map(|boxed| &**boxed)
    }

    pub fn single_column_mapper(&self, ty: &TypeRef, annotations: &Annotations) -> Option<Arc<dyn RowMapper>> {
        self.find(ty, annotations)
            .map(|factory| factory.single_column_mapper(ty))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|factory| factory.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

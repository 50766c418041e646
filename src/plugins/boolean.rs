use super::BOOLEAN_PRIORITY;
use crate::column::{ColumnMapper, ColumnMapperFactory, boolean_from};
use crate::core::{Annotations, AnyValue, MappingError, TypeRef};
use crate::result::{Column, Row};

/// Reads booleans stored as numbers or text: `1` and `"true"` (any case) are true.
pub struct BooleanColumnMapperFactory;

impl ColumnMapperFactory for BooleanColumnMapperFactory {
    fn name(&self) -> &'static str {
        "BOOLEAN"
    }

    fn priority(&self) -> i32 {
        BOOLEAN_PRIORITY
    }

    fn accept(&self, ty: &TypeRef, _annotations: &Annotations) -> bool {
        ty.is::<bool>()
    }

    fn build(&self, column: Column, ty: &TypeRef) -> Box<dyn ColumnMapper> {
        Box::new(BooleanColumnMapper { column, ty: *ty })
    }
}

struct BooleanColumnMapper {
    column: Column,
    ty: TypeRef,
}

impl ColumnMapper for BooleanColumnMapper {
    fn column(&self) -> &Column {
        &self.column
    }

    fn get(&self, row: &Row<'_>) -> Result<AnyValue, MappingError> {
        let value = row.get(&self.column)?;
        let extracted = if value.is_null() {
            None
        } else {
            Some(Box::new(boolean_from(value, &self.ty, &self.column)?) as AnyValue)
        };
        self.ty.wrap(extracted, &self.column.to_string())
    }
}

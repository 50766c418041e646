use super::UUID_PRIORITY;
use crate::column::{ColumnMapper, ColumnMapperFactory};
use crate::connection::BindParams;
use crate::core::{Annotations, AnyValue, MappingError, Result, TypeRef, Value};
use crate::parameter::{ParameterConverter, downcast_arg};
use crate::result::{Column, Row};
use std::any::Any;
use uuid::Uuid;

/// Reads UUIDs stored as text or as 16-byte blobs.
pub struct UuidColumnMapperFactory;

impl ColumnMapperFactory for UuidColumnMapperFactory {
    fn name(&self) -> &'static str {
        "UUID"
    }

    fn priority(&self) -> i32 {
        UUID_PRIORITY
    }

    fn accept(&self, ty: &TypeRef, _annotations: &Annotations) -> bool {
        ty.is::<Uuid>()
    }

    fn build(&self, column: Column, ty: &TypeRef) -> Box<dyn ColumnMapper> {
        Box::new(UuidColumnMapper { column, ty: *ty })
    }
}

struct UuidColumnMapper {
    column: Column,
    ty: TypeRef,
}

impl ColumnMapper for UuidColumnMapper {
    fn column(&self) -> &Column {
        &self.column
    }

    fn get(&self, row: &Row<'_>) -> std::result::Result<AnyValue, MappingError> {
        let decode = |reason: String| MappingError::Decode {
            column: self.column.to_string(),
            target: self.ty.name(),
            reason,
        };
        let parsed = match row.get(&self.column)? {
            Value::Null => None,
            Value::Text(text) => Some(Uuid::parse_str(text.trim()).map_err(|e| decode(e.to_string()))?),
            Value::Blob(bytes) => Some(Uuid::from_slice(bytes).map_err(|e| decode(e.to_string()))?),
            other => {
                return Err(MappingError::IncompatibleType {
                    column: self.column.to_string(),
                    target: self.ty.name(),
                    found: other.type_name(),
                });
            }
        };
        self.ty.wrap(
            parsed.map(|id| Box::new(id) as AnyValue),
            &self.column.to_string(),
        )
    }
}

/// Binds UUIDs in their hyphenated lowercase text form.
pub struct UuidParameterConverter;

impl ParameterConverter for UuidParameterConverter {
    fn name(&self) -> &'static str {
        "UUID"
    }

    fn priority(&self) -> i32 {
        UUID_PRIORITY
    }

    fn accept(&self, ty: &TypeRef, _annotations: &Annotations) -> bool {
        ty.is::<Uuid>()
    }

    fn bind(&self, name: &str, value: Option<&dyn Any>, _ty: &TypeRef, params: &mut BindParams) -> Result<()> {
        let bound = match value {
            Some(value) => Value::Text(downcast_arg::<Uuid>(name, value)?.hyphenated().to_string()),
            None => Value::Null,
        };
        params.insert(name, bound);
        Ok(())
    }
}

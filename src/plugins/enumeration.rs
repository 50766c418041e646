use super::ENUM_PRIORITY;
use crate::column::{ColumnMapper, ColumnMapperFactory};
use crate::connection::BindParams;
use crate::core::{Annotations, AnyValue, MappingError, QueryError, Result, TypeRef, Value};
use crate::parameter::ParameterConverter;
use crate::result::{Column, Row};
use std::any::Any;

/// Reads enums from their variant name. Surrounding whitespace is ignored.
pub struct EnumColumnMapperFactory;

impl ColumnMapperFactory for EnumColumnMapperFactory {
    fn name(&self) -> &'static str {
        "ENUM"
    }

    fn priority(&self) -> i32 {
        ENUM_PRIORITY
    }

    fn accept(&self, ty: &TypeRef, _annotations: &Annotations) -> bool {
        ty.enum_codec().is_some()
    }

    fn build(&self, column: Column, ty: &TypeRef) -> Box<dyn ColumnMapper> {
        Box::new(EnumColumnMapper { column, ty: *ty })
    }
}

struct EnumColumnMapper {
    column: Column,
    ty: TypeRef,
}

impl ColumnMapper for EnumColumnMapper {
    fn column(&self) -> &Column {
        &self.column
    }

    fn get(&self, row: &Row<'_>) -> std::result::Result<AnyValue, MappingError> {
        let value = row.get(&self.column)?;
        let codec = self
            .ty
            .enum_codec()
            .ok_or(MappingError::UnsupportedTarget(self.ty.name()))?;
        let extracted = match value {
            Value::Null => None,
            Value::Text(text) => {
                let name = text.trim();
                let variant = codec.from_name(name).ok_or_else(|| MappingError::UnknownVariant {
                    target: self.ty.name(),
                    variant: name.to_string(),
                })?;
                Some(variant)
            }
            other => {
                return Err(MappingError::IncompatibleType {
                    column: self.column.to_string(),
                    target: self.ty.name(),
                    found: other.type_name(),
                });
            }
        };
        self.ty.wrap(extracted, &self.column.to_string())
    }
}

/// Binds enums as their variant name.
pub struct EnumParameterConverter;

impl ParameterConverter for EnumParameterConverter {
    fn name(&self) -> &'static str {
        "ENUM"
    }

    fn priority(&self) -> i32 {
        ENUM_PRIORITY
    }

    fn accept(&self, ty: &TypeRef, _annotations: &Annotations) -> bool {
        ty.enum_codec().is_some()
    }

    fn bind(&self, name: &str, value: Option<&dyn Any>, ty: &TypeRef, params: &mut BindParams) -> Result<()> {
        let bound = match (value, ty.enum_codec()) {
            (None, _) => Value::Null,
            (Some(value), Some(codec)) => {
                let variant = codec.variant_name(value).ok_or_else(|| {
                    QueryError::Configuration(format!("Argument '{}' is not a {}", name, ty))
                })?;
                Value::Text(variant.to_string())
            }
            (Some(_), None) => {
                return Err(QueryError::Configuration(format!(
                    "Type {} of argument '{}' is not an enum",
                    ty, name
                )));
            }
        };
        params.insert(name, bound);
        Ok(())
    }
}

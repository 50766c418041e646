use super::JSON_PRIORITY;
use crate::column::{ColumnMapper, ColumnMapperFactory};
use crate::connection::BindParams;
use crate::core::{AS_JSON, Annotations, AnyValue, MappingError, QueryError, Result, TypeRef, Value};
use crate::parameter::{ParameterConverter, downcast_arg};
use crate::result::{Column, Row};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::marker::PhantomData;

/// Reads columns holding JSON documents into `T`.
///
/// Only claims `T` where the `as_json` marker is present, on the constructor
/// parameter or, for single-column results, on the method.
pub struct JsonColumnMapperFactory<T> {
    priority: i32,
    _target: PhantomData<fn() -> T>,
}

impl<T> JsonColumnMapperFactory<T> {
    pub fn new() -> Self {
        Self::with_priority(JSON_PRIORITY)
    }

    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority,
            _target: PhantomData,
        }
    }
}

impl<T> Default for JsonColumnMapperFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned + Any + Send> ColumnMapperFactory for JsonColumnMapperFactory<T> {
    fn name(&self) -> &'static str {
        "JSON"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn accept(&self, ty: &TypeRef, annotations: &Annotations) -> bool {
        ty.is::<T>() && annotations.has(AS_JSON)
    }

    fn build(&self, column: Column, ty: &TypeRef) -> Box<dyn ColumnMapper> {
        Box::new(JsonColumnMapper::<T> {
            column,
            ty: *ty,
            _target: PhantomData,
        })
    }
}

struct JsonColumnMapper<T> {
    column: Column,
    ty: TypeRef,
    _target: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned + Any + Send> ColumnMapper for JsonColumnMapper<T> {
    fn column(&self) -> &Column {
        &self.column
    }

    fn get(&self, row: &Row<'_>) -> std::result::Result<AnyValue, MappingError> {
        let decode = |e: serde_json::Error| MappingError::Decode {
            column: self.column.to_string(),
            target: self.ty.name(),
            reason: e.to_string(),
        };
        let decoded: Option<T> = match row.get(&self.column)? {
            Value::Null => None,
            Value::Text(text) => Some(serde_json::from_str(text).map_err(decode)?),
            Value::Blob(bytes) => Some(serde_json::from_slice(bytes).map_err(decode)?),
            other => {
                return Err(MappingError::IncompatibleType {
                    column: self.column.to_string(),
                    target: self.ty.name(),
                    found: other.type_name(),
                });
            }
        };
        self.ty.wrap(
            decoded.map(|value| Box::new(value) as AnyValue),
            &self.column.to_string(),
        )
    }
}

/// Binds `T` as its JSON text when the argument carries the `as_json` marker.
pub struct JsonParameterConverter<T> {
    priority: i32,
    _source: PhantomData<fn(T)>,
}

impl<T> JsonParameterConverter<T> {
    pub fn new() -> Self {
        Self::with_priority(JSON_PRIORITY)
    }

    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority,
            _source: PhantomData,
        }
    }
}

impl<T> Default for JsonParameterConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + Any> ParameterConverter for JsonParameterConverter<T> {
    fn name(&self) -> &'static str {
        "JSON"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn accept(&self, ty: &TypeRef, annotations: &Annotations) -> bool {
        ty.is::<T>() && annotations.has(AS_JSON)
    }

    fn bind(&self, name: &str, value: Option<&dyn Any>, _ty: &TypeRef, params: &mut BindParams) -> Result<()> {
        let bound = match value {
            Some(value) => {
                let payload = downcast_arg::<T>(name, value)?;
                let text = serde_json::to_string(payload).map_err(|e| {
                    QueryError::Data(format!("Argument '{}' cannot be encoded as JSON: {}", name, e))
                })?;
                Value::Text(text)
            }
            None => Value::Null,
        };
        params.insert(name, bound);
        Ok(())
    }
}

use super::DEFAULT_PRIORITY;
use crate::column::{ColumnMapper, ColumnMapperFactory, GenericColumnMapper};
use crate::connection::BindParams;
use crate::core::{Annotations, QueryError, Result, TypeRef, Value};
use crate::parameter::{ParameterConverter, downcast_arg};
use crate::result::Column;
use std::any::Any;

/// Catch-all factory backed by generic extraction. Always installed last.
pub struct DefaultColumnMapperFactory;

impl ColumnMapperFactory for DefaultColumnMapperFactory {
    fn name(&self) -> &'static str {
        "DEFAULT"
    }

    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    fn accept(&self, _ty: &TypeRef, _annotations: &Annotations) -> bool {
        true
    }

    fn build(&self, column: Column, ty: &TypeRef) -> Box<dyn ColumnMapper> {
        Box::new(GenericColumnMapper::new(column, *ty))
    }
}

/// Binds numbers, text, booleans, bytes and JSON documents as they are.
pub struct DefaultParameterConverter;

impl DefaultParameterConverter {
    fn to_value(name: &str, value: &dyn Any, ty: &TypeRef) -> Result<Value> {
        macro_rules! widen {
            ($($t:ty),+) => {
                $(
                    if let Some(v) = value.downcast_ref::<$t>() {
                        return Ok(Value::Integer(i64::from(*v)));
                    }
                )+
            };
        }
        widen!(i64, i32, i16, i8, u32, u16, u8);

        if let Some(v) = value.downcast_ref::<u64>() {
            return i64::try_from(*v).map(Value::Integer).map_err(|_| {
                QueryError::Data(format!("Argument '{}' ({}) does not fit a 64-bit signed integer", name, v))
            });
        }
        if let Some(v) = value.downcast_ref::<f64>() {
            return Ok(Value::Float(*v));
        }
        if let Some(v) = value.downcast_ref::<f32>() {
            return Ok(Value::Float(f64::from(*v)));
        }
        if let Some(v) = value.downcast_ref::<bool>() {
            return Ok(Value::Boolean(*v));
        }
        if let Some(v) = value.downcast_ref::<String>() {
            return Ok(Value::Text(v.clone()));
        }
        if let Some(v) = value.downcast_ref::<Vec<u8>>() {
            return Ok(Value::Blob(v.clone()));
        }
        if let Some(v) = value.downcast_ref::<Value>() {
            return Ok(v.clone());
        }
        if ty.is::<serde_json::Value>() {
            let doc = downcast_arg::<serde_json::Value>(name, value)?;
            return Ok(Value::Text(doc.to_string()));
        }
        Err(QueryError::Configuration(format!(
            "Argument '{}' is not a {}",
            name, ty
        )))
    }

    fn handles(ty: &TypeRef) -> bool {
        ty.is::<i64>()
            || ty.is::<i32>()
            || ty.is::<i16>()
            || ty.is::<i8>()
            || ty.is::<u64>()
            || ty.is::<u32>()
            || ty.is::<u16>()
            || ty.is::<u8>()
            || ty.is::<f64>()
            || ty.is::<f32>()
            || ty.is::<bool>()
            || ty.is::<String>()
            || ty.is::<Vec<u8>>()
            || ty.is::<Value>()
            || ty.is::<serde_json::Value>()
    }
}

impl ParameterConverter for DefaultParameterConverter {
    fn name(&self) -> &'static str {
        "DEFAULT"
    }

    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    fn accept(&self, ty: &TypeRef, _annotations: &Annotations) -> bool {
        Self::handles(ty)
    }

    fn bind(&self, name: &str, value: Option<&dyn Any>, ty: &TypeRef, params: &mut BindParams) -> Result<()> {
        let bound = match value {
            Some(value) => Self::to_value(name, value, ty)?,
            None => Value::Null,
        };
        params.insert(name, bound);
        Ok(())
    }
}

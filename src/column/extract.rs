use super::ColumnMapper;
use crate::core::{AnyValue, MappingError, TypeRef, Value};
use crate::result::{Column, Row};
use std::any::Any;

/// Generic single-column extraction used when no specialised plugin claims a type.
///
/// Returns `Ok(None)` for SQL NULL; the caller decides whether the declared
/// type may hold it.
pub fn extract_value(value: &Value, ty: &TypeRef, column: &Column) -> Result<Option<AnyValue>, MappingError> {
    if value.is_null() {
        return Ok(None);
    }

    macro_rules! integral {
        ($($t:ty),+) => {
            $(
                if ty.is::<$t>() {
                    return integral::<$t>(value, ty, column).map(Some);
                }
            )+
        };
    }
    integral!(i64, i32, i16, i8, u64, u32, u16, u8);

    let extracted: AnyValue = if ty.is::<f64>() {
        Box::new(float(value, ty, column)?)
    } else if ty.is::<f32>() {
        let wide = float(value, ty, column)?;
        let narrow = wide as f32;
        if wide.is_finite() && !narrow.is_finite() {
            return Err(MappingError::IncompatibleNumeric {
                column: column.to_string(),
                target: ty.name(),
                value: value.to_string(),
            });
        }
        Box::new(narrow)
    } else if ty.is::<bool>() {
        Box::new(match value {
            Value::Boolean(b) => *b,
            Value::Integer(0) => false,
            Value::Integer(1) => true,
            other => return Err(incompatible(other, ty, column)),
        })
    } else if ty.is::<String>() {
        Box::new(match value {
            Value::Text(s) => s.clone(),
            Value::Blob(bytes) => String::from_utf8(bytes.clone()).map_err(|e| MappingError::Decode {
                column: column.to_string(),
                target: ty.name(),
                reason: e.to_string(),
            })?,
            other => other.to_string(),
        })
    } else if ty.is::<Vec<u8>>() {
        Box::new(match value {
            Value::Blob(bytes) => bytes.clone(),
            Value::Text(s) => s.as_bytes().to_vec(),
            other => return Err(incompatible(other, ty, column)),
        })
    } else if ty.is::<Value>() {
        Box::new(value.clone())
    } else if ty.is::<serde_json::Value>() {
        Box::new(json(value, ty, column)?)
    } else if let Some(codec) = ty.enum_codec() {
        let name = value.as_str().ok_or_else(|| incompatible(value, ty, column))?.trim();
        codec.from_name(name).ok_or_else(|| MappingError::UnknownVariant {
            target: ty.name(),
            variant: name.to_string(),
        })?
    } else {
        return Err(MappingError::UnsupportedTarget(ty.name()));
    };
    Ok(Some(extracted))
}

/// Lenient boolean reading: numbers are true when equal to 1, text when it reads "true".
pub fn boolean_from(value: &Value, ty: &TypeRef, column: &Column) -> Result<bool, MappingError> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Integer(i) => Ok(*i == 1),
        Value::Float(f) => Ok(*f == 1.0),
        Value::Text(s) => Ok(s.eq_ignore_ascii_case("true")),
        other => Err(incompatible(other, ty, column)),
    }
}

fn integral<T>(value: &Value, ty: &TypeRef, column: &Column) -> Result<AnyValue, MappingError>
where
    T: TryFrom<i64> + Any + Send,
{
    let wide = value.as_i64().ok_or_else(|| {
        if value.is_numeric() {
            MappingError::IncompatibleNumeric {
                column: column.to_string(),
                target: ty.name(),
                value: value.to_string(),
            }
        } else {
            incompatible(value, ty, column)
        }
    })?;
    T::try_from(wide)
        .map(|narrow| Box::new(narrow) as AnyValue)
        .map_err(|_| MappingError::IncompatibleNumeric {
            column: column.to_string(),
            target: ty.name(),
            value: wide.to_string(),
        })
}

fn float(value: &Value, ty: &TypeRef, column: &Column) -> Result<f64, MappingError> {
    value.as_f64().ok_or_else(|| incompatible(value, ty, column))
}

fn json(value: &Value, ty: &TypeRef, column: &Column) -> Result<serde_json::Value, MappingError> {
    match value {
        Value::Text(s) => serde_json::from_str(s).map_err(|e| MappingError::Decode {
            column: column.to_string(),
            target: ty.name(),
            reason: e.to_string(),
        }),
        Value::Integer(i) => Ok(serde_json::Value::from(*i)),
        Value::Float(f) => Ok(serde_json::Value::from(*f)),
        Value::Boolean(b) => Ok(serde_json::Value::Bool(*b)),
        other => Err(incompatible(other, ty, column)),
    }
}

fn incompatible(value: &Value, ty: &TypeRef, column: &Column) -> MappingError {
    MappingError::IncompatibleType {
        column: column.to_string(),
        target: ty.name(),
        found: value.type_name(),
    }
}

/// Column mapper backed by [`extract_value`].
pub struct GenericColumnMapper {
    column: Column,
    ty: TypeRef,
}

impl GenericColumnMapper {
    pub fn new(column: Column, ty: TypeRef) -> Self {
        Self { column, ty }
    }
}

impl ColumnMapper for GenericColumnMapper {
    fn column(&self) -> &Column {
        &self.column
    }

    fn get(&self, row: &Row<'_>) -> Result<AnyValue, MappingError> {
        let value = row.get(&self.column)?;
        let extracted = extract_value(value, &self.ty, &self.column)?;
        self.ty.wrap(extracted, &self.column.to_string())
    }
}

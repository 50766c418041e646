use super::TEMPORAL_PRIORITY;
use crate::column::{ColumnMapper, ColumnMapperFactory};
use crate::connection::BindParams;
use crate::core::{Annotations, AnyValue, DATE_FORMAT, MappingError, Result, TypeRef, Value};
use crate::parameter::{ParameterConverter, downcast_arg};
use crate::result::{Column, Row};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use std::any::Any;

const TIMESTAMP_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

fn is_temporal(ty: &TypeRef) -> bool {
    ty.is::<DateTime<Utc>>() || ty.is::<NaiveDateTime>() || ty.is::<NaiveDate>()
}

/// Reads `DateTime<Utc>`, `NaiveDateTime` and `NaiveDate`.
///
/// Text columns may hold RFC 3339 or `YYYY-MM-DD[ HH:MM:SS[.fff]]`; integer
/// columns are read as Unix seconds. Naive timestamps are taken as UTC.
pub struct TemporalColumnMapperFactory;

impl ColumnMapperFactory for TemporalColumnMapperFactory {
    fn name(&self) -> &'static str {
        "TEMPORAL"
    }

    fn priority(&self) -> i32 {
        TEMPORAL_PRIORITY
    }

    fn accept(&self, ty: &TypeRef, _annotations: &Annotations) -> bool {
        is_temporal(ty)
    }

    fn build(&self, column: Column, ty: &TypeRef) -> Box<dyn ColumnMapper> {
        Box::new(TemporalColumnMapper { column, ty: *ty })
    }
}

struct TemporalColumnMapper {
    column: Column,
    ty: TypeRef,
}

impl TemporalColumnMapper {
    fn timestamp(&self, value: &Value) -> std::result::Result<NaiveDateTime, MappingError> {
        match value {
            Value::Timestamp(ts) => Ok(*ts),
            Value::Date(date) => Ok(date.and_time(chrono::NaiveTime::MIN)),
            Value::Text(text) => parse_timestamp(text).ok_or_else(|| MappingError::Decode {
                column: self.column.to_string(),
                target: self.ty.name(),
                reason: format!("'{}' is not a recognised timestamp", text),
            }),
            Value::Integer(secs) => DateTime::from_timestamp(*secs, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| MappingError::IncompatibleNumeric {
                    column: self.column.to_string(),
                    target: self.ty.name(),
                    value: secs.to_string(),
                }),
            other => Err(MappingError::IncompatibleType {
                column: self.column.to_string(),
                target: self.ty.name(),
                found: other.type_name(),
            }),
        }
    }
}

impl ColumnMapper for TemporalColumnMapper {
    fn column(&self) -> &Column {
        &self.column
    }

    fn get(&self, row: &Row<'_>) -> std::result::Result<AnyValue, MappingError> {
        let value = row.get(&self.column)?;
        let extracted: Option<AnyValue> = if value.is_null() {
            None
        } else {
            let ts = self.timestamp(value)?;
            let converted: AnyValue = if self.ty.is::<NaiveDate>() {
                Box::new(ts.date())
            } else if self.ty.is::<NaiveDateTime>() {
                Box::new(ts)
            } else {
                Box::new(ts.and_utc())
            };
            Some(converted)
        };
        self.ty.wrap(extracted, &self.column.to_string())
    }
}

pub(crate) fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    TIMESTAMP_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(|date| date.and_time(chrono::NaiveTime::MIN))
        })
}

/// Binds temporal values truncated to whole seconds; zoned values are converted to UTC first.
pub struct TemporalParameterConverter;

impl ParameterConverter for TemporalParameterConverter {
    fn name(&self) -> &'static str {
        "TEMPORAL"
    }

    fn priority(&self) -> i32 {
        TEMPORAL_PRIORITY
    }

    fn accept(&self, ty: &TypeRef, _annotations: &Annotations) -> bool {
        is_temporal(ty)
    }

    fn bind(&self, name: &str, value: Option<&dyn Any>, ty: &TypeRef, params: &mut BindParams) -> Result<()> {
        let bound = match value {
            None => Value::Null,
            Some(value) if ty.is::<NaiveDate>() => Value::Date(*downcast_arg::<NaiveDate>(name, value)?),
            Some(value) if ty.is::<NaiveDateTime>() => {
                Value::Timestamp(downcast_arg::<NaiveDateTime>(name, value)?.trunc_subsecs(0))
            }
            Some(value) => {
                let zoned = downcast_arg::<DateTime<Utc>>(name, value)?;
                Value::Timestamp(zoned.naive_utc().trunc_subsecs(0))
            }
        };
        params.insert(name, bound);
        Ok(())
    }
}

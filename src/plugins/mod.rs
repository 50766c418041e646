pub mod boolean;
pub mod default;
pub mod enumeration;
pub mod identifier;
pub mod json;
pub mod temporal;

use crate::column::ColumnMapperFactory;
use crate::parameter::Converter;

pub use boolean::BooleanColumnMapperFactory;
pub use default::{DefaultColumnMapperFactory, DefaultParameterConverter};
pub use enumeration::{EnumColumnMapperFactory, EnumParameterConverter};
pub use identifier::{UuidColumnMapperFactory, UuidParameterConverter};
pub use json::{JsonColumnMapperFactory, JsonParameterConverter};
pub use temporal::{TemporalColumnMapperFactory, TemporalParameterConverter};

// Built-in priorities. Lower runs first; user plugins usually sit well below these.
pub const DEFAULT_PRIORITY: i32 = i32::MAX;
pub const ENUM_PRIORITY: i32 = i32::MAX - 1;
pub const BOOLEAN_PRIORITY: i32 = i32::MAX - 2;
pub const TEMPORAL_PRIORITY: i32 = i32::MAX - 3;
pub const UUID_PRIORITY: i32 = i32::MAX - 4;
pub const JSON_PRIORITY: i32 = 0;

/// Built-in column mapper factories, without the catch-all default.
pub fn default_column_factories() -> Vec<Box<dyn ColumnMapperFactory>> {
    vec![
        Box::new(EnumColumnMapperFactory),
        Box::new(BooleanColumnMapperFactory),
        Box::new(TemporalColumnMapperFactory),
        Box::new(UuidColumnMapperFactory),
    ]
}

pub fn default_parameter_converters() -> Vec<Converter> {
    vec![
        Converter::simple(DefaultParameterConverter),
        Converter::simple(EnumParameterConverter),
        Converter::simple(TemporalParameterConverter),
        Converter::simple(UuidParameterConverter),
    ]
}

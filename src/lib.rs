// ============================================================================
// querybind Library
// ============================================================================

extern crate self as querybind;

pub mod core;
pub mod result;
pub mod connection;
pub mod column;
pub mod parameter;
pub mod mapper;
pub mod query;
pub mod dispatch;
pub mod plugins;
pub mod facade;

// Re-export main types for convenience
pub use crate::core::{
    AS_JSON, Annotations, AnyValue, DATE_FORMAT, EnumCodec, MappingError, QueryError, Result, SqlEnum,
    SqlType, TIMESTAMP_FORMAT, TypeKey, TypeKind, TypeRef, Value,
};
pub use result::{Column, ResultSet, Row};

// Re-export execution primitive
pub use connection::{
    BindParams, ConnectionHandle, Executor, GeneratedKeys, ROWID_KEY, SQLITE_BACKEND, SqliteExecutor,
};

// Re-export plugin seams
pub use column::{ColumnMapper, ColumnMapperChain, ColumnMapperFactory, GenericColumnMapper, extract_value};
pub use parameter::{
    AdvancedParameterConverter, ConversionContext, Converter, ParameterConverter, ParameterConverterChain,
    downcast_arg,
};
pub use mapper::{
    CachedMapper, Composite, CompositeDescriptor, Constructor, ConstructorArgs, ConstructorParam,
    ConstructorRowMapper, RowMapper, RowMapperResolver, RowMapperType, SingleColumnRowMapper,
};

// Re-export declaration and dispatch API
pub use query::{BindEntry, BindSpec, QueryMetadata, QueryMethod, QueryMode, RepositoryContract, ReturnShape};
pub use dispatch::{Action, GeneratedKey, Outcome};
pub use facade::{Dispatcher, DispatcherBuilder, DispatcherConfig, Repository};

// Derive macros share their names with the traits they implement
pub use querybind_derive::{FromRow, SqlEnum};

/// Builds the positional argument slice of an invocation.
///
/// ```ignore
/// let conf = repo.call("find_by_key", querybind::args!["KEY".to_string()])?;
/// ```
#[macro_export]
macro_rules! args {
    () => {
        &[] as &[&dyn ::std::any::Any]
    };
    ($($arg:expr),+ $(,)?) => {
        &[$(&$arg as &dyn ::std::any::Any),+]
    };
}

pub mod error;
pub mod types;
pub mod value;

pub use error::{MappingError, QueryError, Result};
pub use types::{AS_JSON, Annotations, AnyValue, EnumCodec, SqlEnum, SqlType, TypeKey, TypeKind, TypeRef};
pub use value::{DATE_FORMAT, TIMESTAMP_FORMAT, Value};

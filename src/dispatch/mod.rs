mod action;
mod keys;

use crate::connection::Executor;
use crate::core::{AnyValue, QueryError, Result};
use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

pub use action::{Action, action_from_text, into_optional, resolve_action};
pub use keys::{GeneratedKey, extract_generated_key};

/// Result of one method invocation, before it is converted to the caller's type.
pub enum Outcome {
    Text(String),
    Affected(u64),
    Single(AnyValue),
    List(Vec<AnyValue>),
    Optional(Option<AnyValue>),
    GeneratedKey(GeneratedKey<AnyValue>),
    Executor(Arc<dyn Executor>),
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Affected(_) => "affected rows",
            Self::Single(_) => "single",
            Self::List(_) => "list",
            Self::Optional(_) => "optional",
            Self::GeneratedKey(_) => "generated key",
            Self::Executor(_) => "executor",
        }
    }

    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn into_affected(self) -> Result<u64> {
        match self {
            Self::Affected(count) => Ok(count),
            other => Err(other.mismatch("affected rows")),
        }
    }

    pub fn into_single<T: Any>(self) -> Result<T> {
        match self {
            Self::Single(value) => downcast(value),
            other => Err(other.mismatch("single")),
        }
    }

    pub fn into_list<T: Any>(self) -> Result<Vec<T>> {
        match self {
            Self::List(values) => values.into_iter().map(downcast).collect(),
            other => Err(other.mismatch("list")),
        }
    }

    pub fn into_optional<T: Any>(self) -> Result<Option<T>> {
        match self {
            Self::Optional(value) => value.map(downcast).transpose(),
            other => Err(other.mismatch("optional")),
        }
    }

    pub fn into_generated_key<K: Any>(self) -> Result<GeneratedKey<K>> {
        match self {
            Self::GeneratedKey(key) => Ok(GeneratedKey::new(key.affected_rows, downcast(key.key)?)),
            other => Err(other.mismatch("generated key")),
        }
    }

    pub fn into_executor(self) -> Result<Arc<dyn Executor>> {
        match self {
            Self::Executor(executor) => Ok(executor),
            other => Err(other.mismatch("executor")),
        }
    }

    fn mismatch(&self, requested: &str) -> QueryError {
        QueryError::Configuration(format!(
            "Method produced {} but {} was requested",
            self.kind(),
            requested
        ))
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Affected(count) => f.debug_tuple("Affected").field(count).finish(),
            Self::List(values) => write!(f, "List({} values)", values.len()),
            other => write!(f, "{}", other.kind()),
        }
    }
}

fn downcast<T: Any>(value: AnyValue) -> Result<T> {
    value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
        QueryError::Configuration(format!(
            "Result value is not a {}",
            type_name::<T>()
        ))
    })
}

pub mod sqlite;

use crate::core::{Result, Value};
use crate::result::ResultSet;

pub use sqlite::{ROWID_KEY, SQLITE_BACKEND, SqliteExecutor};

/// Named bind values handed to the execution primitive.
///
/// Names are stored without the placeholder prefix (`:key` binds `key`).
/// Inserting an existing name replaces its value and keeps its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindParams {
    values: Vec<(String, Value)>,
}

impl BindParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.values.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Outcome of a mutation executed with generated-key retrieval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedKeys {
    pub affected_rows: u64,
    /// Key columns of the first affected row, in the order the backend reported them.
    pub keys: Vec<(String, Value)>,
}

impl GeneratedKeys {
    pub fn new(affected_rows: u64, keys: Vec<(String, Value)>) -> Self {
        Self { affected_rows, keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.keys
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }
}

/// Synchronous execution primitive the dispatcher runs every statement through.
///
/// Implementations substitute named placeholders themselves. Timeouts,
/// cancellation and retries, if any, live here and not in the dispatcher.
pub trait Executor: Send + Sync {
    /// Identifier matched against query variant overrides.
    fn backend(&self) -> &str;

    fn query(&self, sql: &str, params: &BindParams) -> Result<ResultSet>;

    /// Runs a mutation and returns the affected-row count.
    fn update(&self, sql: &str, params: &BindParams) -> Result<u64>;

    fn update_with_keys(&self, sql: &str, params: &BindParams) -> Result<GeneratedKeys>;

    /// Live connection scoped to the returned handle; dropping it releases the connection.
    fn connection(&self) -> Result<Box<dyn ConnectionHandle + '_>>;
}

/// Exclusive access to one database connection.
pub trait ConnectionHandle {
    fn backend(&self) -> &str;

    fn query(&mut self, sql: &str, params: &BindParams) -> Result<ResultSet>;

    fn execute(&mut self, sql: &str, params: &BindParams) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_params_replace_in_place() {
        let mut params = BindParams::new().with("key", "A").with("value", 1_i64);
        params.insert("key", Value::Text("B".into()));

        let names: Vec<&str> = params.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["key", "value"]);
        assert_eq!(params.get("key"), Some(&Value::Text("B".into())));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn test_generated_keys_lookup() {
        let keys = GeneratedKeys::new(
            1,
            vec![
                ("ID".into(), Value::Integer(10)),
                ("CODE".into(), Value::Text("x".into())),
            ],
        );
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.get("id"), Some(&Value::Integer(10)));
        assert_eq!(keys.get("other"), None);
    }
}

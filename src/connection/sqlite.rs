use super::{BindParams, ConnectionHandle, Executor, GeneratedKeys};
use crate::core::{DATE_FORMAT, QueryError, Result, TIMESTAMP_FORMAT, Value};
use crate::result::ResultSet;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, Statement};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::trace;

pub const SQLITE_BACKEND: &str = "sqlite";

/// Key name reported when the statement has no `RETURNING` clause.
pub const ROWID_KEY: &str = "rowid";

/// [`Executor`] over a single SQLite connection.
///
/// Statements are serialized through a mutex; the scoped connection handed to
/// advanced parameter converters holds that mutex until it is dropped.
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
    backend: String,
}

impl SqliteExecutor {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            backend: SQLITE_BACKEND.to_string(),
        }
    }

    /// Reports a different backend identifier, e.g. to exercise query overrides.
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        Ok(self.conn.lock()?)
    }
}

impl Executor for SqliteExecutor {
    fn backend(&self) -> &str {
        &self.backend
    }

    fn query(&self, sql: &str, params: &BindParams) -> Result<ResultSet> {
        let conn = self.lock()?;
        run_query(&conn, sql, params)
    }

    fn update(&self, sql: &str, params: &BindParams) -> Result<u64> {
        let conn = self.lock()?;
        run_update(&conn, sql, params)
    }

    fn update_with_keys(&self, sql: &str, params: &BindParams) -> Result<GeneratedKeys> {
        let conn = self.lock()?;
        let mut stmt = prepare_bound(&conn, sql, params)?;

        if stmt.column_count() > 0 {
            // INSERT ... RETURNING: the returned columns are the keys
            let columns = column_names(&stmt);
            let mut rows = stmt.raw_query();
            let mut affected = 0_u64;
            let mut keys = Vec::new();
            while let Some(row) = rows.next()? {
                if affected == 0 {
                    for (idx, name) in columns.iter().enumerate() {
                        keys.push((name.clone(), read_value(row.get_ref(idx)?)?));
                    }
                }
                affected += 1;
            }
            return Ok(GeneratedKeys::new(affected, keys));
        }

        // only a statement that inserted rows moves the last rowid
        let before = conn.last_insert_rowid();
        let affected = stmt.raw_execute()? as u64;
        let after = conn.last_insert_rowid();
        let keys = if affected > 0 && after != before {
            vec![(ROWID_KEY.to_string(), Value::Integer(after))]
        } else {
            Vec::new()
        };
        Ok(GeneratedKeys::new(affected, keys))
    }

    fn connection(&self) -> Result<Box<dyn ConnectionHandle + '_>> {
        trace!(backend = %self.backend, "acquiring scoped sqlite connection");
        Ok(Box::new(SqliteConnection {
            conn: self.lock()?,
            backend: &self.backend,
        }))
    }
}

struct SqliteConnection<'a> {
    conn: MutexGuard<'a, Connection>,
    backend: &'a str,
}

impl ConnectionHandle for SqliteConnection<'_> {
    fn backend(&self) -> &str {
        self.backend
    }

    fn query(&mut self, sql: &str, params: &BindParams) -> Result<ResultSet> {
        run_query(&self.conn, sql, params)
    }

    fn execute(&mut self, sql: &str, params: &BindParams) -> Result<u64> {
        run_update(&self.conn, sql, params)
    }
}

impl Drop for SqliteConnection<'_> {
    fn drop(&mut self) {
        trace!(backend = %self.backend, "releasing scoped sqlite connection");
    }
}

fn prepare_bound<'c>(conn: &'c Connection, sql: &str, params: &BindParams) -> Result<Statement<'c>> {
    let mut stmt = conn.prepare(sql)?;
    for index in 1..=stmt.parameter_count() {
        let name = stmt
            .parameter_name(index)
            .map(|name| name.trim_start_matches([':', '@', '$']).to_string())
            .ok_or_else(|| {
                QueryError::Configuration(format!(
                    "Placeholder #{} in '{}' is positional; only named placeholders are supported",
                    index, sql
                ))
            })?;
        let value = params.get(&name).ok_or_else(|| {
            QueryError::Configuration(format!("No value bound for placeholder :{} in '{}'", name, sql))
        })?;
        stmt.raw_bind_parameter(index, value)?;
    }
    Ok(stmt)
}

fn column_names(stmt: &Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

fn run_query(conn: &Connection, sql: &str, params: &BindParams) -> Result<ResultSet> {
    let mut stmt = prepare_bound(conn, sql, params)?;
    let columns = column_names(&stmt);
    let mut rows = stmt.raw_query();
    let mut collected = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(read_value(row.get_ref(idx)?)?);
        }
        collected.push(values);
    }
    Ok(ResultSet::new(columns, collected))
}

fn run_update(conn: &Connection, sql: &str, params: &BindParams) -> Result<u64> {
    let mut stmt = prepare_bound(conn, sql, params)?;
    if stmt.column_count() > 0 {
        let mut rows = stmt.raw_query();
        let mut affected = 0_u64;
        while rows.next()?.is_some() {
            affected += 1;
        }
        return Ok(affected);
    }
    Ok(stmt.raw_execute()? as u64)
}

fn read_value(value: ValueRef<'_>) -> Result<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(
            std::str::from_utf8(bytes)
                .map_err(|e| QueryError::Execution(format!("Invalid UTF-8 in text column: {}", e)))?
                .to_string(),
        ),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    })
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Blob(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
            Value::Timestamp(ts) => ToSqlOutput::Owned(SqlValue::Text(ts.format(TIMESTAMP_FORMAT).to_string())),
            Value::Date(d) => ToSqlOutput::Owned(SqlValue::Text(d.format(DATE_FORMAT).to_string())),
        })
    }
}

impl From<rusqlite::Error> for QueryError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Execution(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> SqliteExecutor {
        let executor = SqliteExecutor::open_in_memory().unwrap();
        executor
            .update(
                "CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, flag BOOLEAN)",
                &BindParams::new(),
            )
            .unwrap();
        executor
    }

    #[test]
    fn test_named_binding_and_query() {
        let executor = executor();
        let params = BindParams::new().with("name", "alpha").with("flag", true);
        let affected = executor
            .update("INSERT INTO items(name, flag) VALUES(:name, :flag)", &params)
            .unwrap();
        assert_eq!(affected, 1);

        let result = executor
            .query("SELECT name, flag FROM items WHERE name = :name", &params)
            .unwrap();
        assert_eq!(result.columns().to_vec(), vec!["name".to_string(), "flag".to_string()]);
        let row = result.single_row().unwrap();
        assert_eq!(row.by_name("NAME").unwrap(), &Value::Text("alpha".into()));
        assert_eq!(row.by_name("flag").unwrap(), &Value::Integer(1));
    }

    #[test]
    fn test_missing_bind_value_is_configuration_error() {
        let executor = executor();
        let err = executor
            .query("SELECT * FROM items WHERE name = :name", &BindParams::new())
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_rowid_and_returning_keys() {
        let executor = executor();
        let params = BindParams::new().with("name", "a");
        let keys = executor
            .update_with_keys("INSERT INTO items(name) VALUES(:name)", &params)
            .unwrap();
        assert_eq!(keys.affected_rows, 1);
        assert_eq!(keys.get(ROWID_KEY), Some(&Value::Integer(1)));

        let keys = executor
            .update_with_keys("INSERT INTO items(name) VALUES(:name) RETURNING id, name", &params)
            .unwrap();
        assert_eq!(keys.affected_rows, 1);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.get("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_scoped_connection_releases_lock() {
        let executor = executor();
        {
            let mut conn = executor.connection().unwrap();
            assert_eq!(conn.backend(), SQLITE_BACKEND);
            conn.execute("INSERT INTO items(name) VALUES(:name)", &BindParams::new().with("name", "x"))
                .unwrap();
        }
        // lock released: the executor is usable again
        let result = executor.query("SELECT COUNT(*) AS n FROM items", &BindParams::new()).unwrap();
        assert_eq!(result.single_row().unwrap().by_index(0).unwrap(), &Value::Integer(1));
    }
}

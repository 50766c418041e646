use crate::column::extract_value;
use crate::connection::GeneratedKeys;
use crate::core::{AnyValue, QueryError, Result, TypeRef};
use crate::result::Column;

/// Affected-row count of an insert together with the key it generated.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedKey<K> {
    pub affected_rows: u64,
    pub key: K,
}

impl<K> GeneratedKey<K> {
    pub fn new(affected_rows: u64, key: K) -> Self {
        Self { affected_rows, key }
    }

    pub fn map<U>(self, f: impl FnOnce(K) -> U) -> GeneratedKey<U> {
        GeneratedKey {
            affected_rows: self.affected_rows,
            key: f(self.key),
        }
    }
}

/// Picks the generated key out of `keys` and coerces it to `key_type`.
///
/// With several key columns, `key_name` must say which one to report.
pub fn extract_generated_key(
    keys: &GeneratedKeys,
    key_type: &TypeRef,
    key_name: Option<&str>,
    sql: &str,
) -> Result<GeneratedKey<AnyValue>> {
    let (name, value) = match keys.keys.as_slice() {
        [] => {
            return Err(QueryError::Data(format!(
                "No generated key was returned for query {}",
                sql
            )));
        }
        [only] => only,
        many => {
            let wanted = key_name.ok_or_else(|| {
                QueryError::Configuration(format!(
                    "Query {} returned {} generated keys; declare which one to report with a generated key name",
                    sql,
                    many.len()
                ))
            })?;
            many.iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                .ok_or_else(|| {
                    QueryError::Data(format!(
                        "The key with name {} was not returned for query {}",
                        wanted, sql
                    ))
                })?
        }
    };

    let column = Column::named(name.as_str());
    let key = extract_value(value, key_type, &column)?.ok_or_else(|| {
        QueryError::Data(format!(
            "The key with name {} has returned null for query {}: a non-null key is required",
            name, sql
        ))
    })?;
    let key = key_type.wrap(Some(key), name)?;
    Ok(GeneratedKey::new(keys.affected_rows, key))
}

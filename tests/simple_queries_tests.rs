use querybind::{
    Dispatcher, FromRow, QueryError, QueryMethod, QueryMode, Repository, RepositoryContract, Result, Row,
    RowMapper, RowMapperType, SqliteExecutor, args,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, FromRow)]
struct Conf {
    #[column("CONF_KEY")]
    key: String,
    #[column("CONF_VALUE")]
    value: String,
}

#[derive(Debug, PartialEq)]
struct Wrapper {
    value: String,
}

querybind::impl_sql_type!(Wrapper);

#[derive(Default)]
struct WrapperRowMapper;

impl RowMapper for WrapperRowMapper {
    fn map_row(&self, row: &Row<'_>, _row_num: usize) -> Result<querybind::AnyValue> {
        let value = row.by_index(0)?.to_string();
        Ok(Box::new(Wrapper { value }))
    }
}

fn contract() -> RepositoryContract {
    RepositoryContract::new("simple")
        .with(QueryMethod::new(
            "create_table",
            "CREATE TABLE LA_CONF (CONF_KEY VARCHAR(64) PRIMARY KEY NOT NULL, CONF_VALUE CLOB NOT NULL)",
        ))
        .and_then(|c| {
            c.with(
                QueryMethod::new("insert_value", "INSERT INTO LA_CONF(CONF_KEY, CONF_VALUE) VALUES(:key, :value)")
                    .bind::<String>("key")
                    .bind::<String>("value"),
            )
        })
        .and_then(|c| {
            c.with(
                QueryMethod::new("find_by_key", "SELECT * FROM LA_CONF WHERE CONF_KEY = :key")
                    .bind::<String>("key")
                    .returns_single::<Conf>(),
            )
        })
        .and_then(|c| c.with(QueryMethod::new("find_all", "SELECT * FROM LA_CONF").returns_list::<Conf>()))
        .and_then(|c| {
            c.with(QueryMethod::new("find_all_keys", "SELECT CONF_KEY FROM LA_CONF").returns_list::<String>())
        })
        .and_then(|c| {
            c.with(
                QueryMethod::new("find_value_for_key", "SELECT CONF_VALUE FROM LA_CONF WHERE CONF_KEY = :key")
                    .bind::<String>("key")
                    .returns_single::<String>(),
            )
        })
        .and_then(|c| {
            c.with(
                QueryMethod::new(
                    "find_optional_value_for_key",
                    "SELECT CONF_VALUE FROM LA_CONF WHERE CONF_KEY = :key",
                )
                .bind::<String>("key")
                .returns_optional::<String>(),
            )
        })
        .and_then(|c| {
            c.with(
                QueryMethod::new(
                    "find_optional_wrapped_value_for_key",
                    "SELECT CONF_VALUE FROM LA_CONF WHERE CONF_KEY = :key",
                )
                .bind::<String>("key")
                .returns_optional::<Wrapper>()
                .row_mapper(RowMapperType::of::<WrapperRowMapper>()),
            )
        })
        .and_then(|c| {
            c.with(
                QueryMethod::new("update", "UPDATE LA_CONF SET CONF_VALUE = :value WHERE CONF_KEY = :key")
                    .bind::<String>("key")
                    .bind::<String>("value"),
            )
        })
        .and_then(|c| c.with(QueryMethod::template("template", "MY_TEMPLATE")))
        .and_then(|c| c.with(QueryMethod::executor("executor")))
        .unwrap()
}

fn repository() -> Repository {
    let executor = SqliteExecutor::open_in_memory().unwrap();
    let dispatcher = Arc::new(Dispatcher::builder(executor).build().unwrap());
    let repo = dispatcher.register(contract()).unwrap();
    repo.call("create_table", args![]).unwrap();
    repo
}

fn key(value: &str) -> String {
    value.to_string()
}

#[test]
fn test_simple_queries() {
    let repo = repository();

    assert!(repo.call("find_all", args![]).unwrap().into_list::<Conf>().unwrap().is_empty());
    let inserted = repo
        .call("insert_value", args![key("MY_KEY"), key("MY_VALUE")])
        .unwrap()
        .into_affected()
        .unwrap();
    assert_eq!(inserted, 1);

    let conf = repo
        .call("find_by_key", args![key("MY_KEY")])
        .unwrap()
        .into_single::<Conf>()
        .unwrap();
    assert_eq!(conf.key, "MY_KEY");
    assert_eq!(conf.value, "MY_VALUE");
    assert_eq!(repo.call("find_all", args![]).unwrap().into_list::<Conf>().unwrap().len(), 1);

    let updated = repo
        .call("update", args![key("MY_KEY"), key("MY_VALUE_UPDATED")])
        .unwrap()
        .into_affected()
        .unwrap();
    assert_eq!(updated, 1);

    let conf = repo
        .call("find_by_key", args![key("MY_KEY")])
        .unwrap()
        .into_single::<Conf>()
        .unwrap();
    assert_eq!(conf.value, "MY_VALUE_UPDATED");

    let keys = repo.call("find_all_keys", args![]).unwrap().into_list::<String>().unwrap();
    assert!(keys.contains(&key("MY_KEY")));

    let value = repo
        .call("find_value_for_key", args![key("MY_KEY")])
        .unwrap()
        .into_single::<String>()
        .unwrap();
    assert_eq!(value, "MY_VALUE_UPDATED");

    assert_eq!(repo.call("template", args![]).unwrap().into_text().unwrap(), "MY_TEMPLATE");
}

#[test]
fn test_optional_results() {
    let repo = repository();
    repo.call("insert_value", args![key("MY_KEY"), key("MY_VALUE")]).unwrap();

    let found = repo
        .call("find_optional_value_for_key", args![key("MY_KEY")])
        .unwrap()
        .into_optional::<String>()
        .unwrap();
    assert_eq!(found.as_deref(), Some("MY_VALUE"));

    let missing = repo
        .call("find_optional_value_for_key", args![key("MY_KEY_NOT")])
        .unwrap()
        .into_optional::<String>()
        .unwrap();
    assert_eq!(missing, None);

    let wrapped = repo
        .call("find_optional_wrapped_value_for_key", args![key("MY_KEY")])
        .unwrap()
        .into_optional::<Wrapper>()
        .unwrap();
    assert_eq!(wrapped, Some(Wrapper { value: "MY_VALUE".into() }));

    let wrapped_missing = repo
        .call("find_optional_wrapped_value_for_key", args![key("MY_KEY_NOT")])
        .unwrap()
        .into_optional::<Wrapper>()
        .unwrap();
    assert_eq!(wrapped_missing, None);
}

#[test]
fn test_optional_with_several_rows_is_cardinality_error() {
    let repo = repository();
    repo.call("insert_value", args![key("A"), key("same")]).unwrap();
    repo.call("insert_value", args![key("B"), key("same")]).unwrap();

    let method = QueryMethod::new("by_value", "SELECT CONF_KEY FROM LA_CONF WHERE CONF_VALUE = :value")
        .bind::<String>("value")
        .returns_optional::<String>();
    let err = repo.dispatcher().invoke(&method, args![key("same")]).unwrap_err();
    assert!(matches!(err, QueryError::Cardinality { expected: 1, actual: 2 }));
}

#[test]
fn test_optional_aggregate_over_empty_table() {
    let repo = repository();
    let dispatcher = repo.dispatcher();

    let max_key = QueryMethod::new("max_key", "SELECT MAX(LENGTH(CONF_KEY)) FROM LA_CONF").returns_optional::<i64>();
    let absent = dispatcher.invoke(&max_key, args![]).unwrap().into_optional::<i64>().unwrap();
    assert_eq!(absent, None);

    let nullable = QueryMethod::new("max_key", "SELECT MAX(LENGTH(CONF_KEY)) FROM LA_CONF")
        .returns_optional::<Option<i64>>();
    let present_null = dispatcher
        .invoke(&nullable, args![])
        .unwrap()
        .into_optional::<Option<i64>>()
        .unwrap();
    assert_eq!(present_null, Some(None));

    repo.call("insert_value", args![key("ABC"), key("1")]).unwrap();
    let longest = dispatcher.invoke(&max_key, args![]).unwrap().into_optional::<i64>().unwrap();
    assert_eq!(longest, Some(3));

    // a single NULL row still fails for a single-row shape
    let single = QueryMethod::new("min_value", "SELECT MIN(CONF_VALUE) FROM LA_CONF WHERE CONF_KEY = 'NONE'")
        .returns_single::<String>();
    assert!(dispatcher.invoke(&single, args![]).unwrap_err().is_data());
}

#[test]
fn test_single_row_cardinality() {
    let repo = repository();
    let err = repo.call("find_by_key", args![key("NOPE")]).unwrap_err();
    assert!(matches!(err, QueryError::Cardinality { expected: 1, actual: 0 }));

    repo.call("insert_value", args![key("A"), key("1")]).unwrap();
    repo.call("insert_value", args![key("B"), key("2")]).unwrap();
    let all_values = QueryMethod::new("all_values", "SELECT CONF_VALUE FROM LA_CONF").returns_single::<String>();
    let err = repo.dispatcher().invoke(&all_values, args![]).unwrap_err();
    assert!(matches!(err, QueryError::Cardinality { expected: 1, actual: 2 }));
}

#[test]
fn test_executor_handle_is_shared() {
    let repo = repository();
    let executor = repo.call("executor", args![]).unwrap().into_executor().unwrap();
    assert!(Arc::ptr_eq(&executor, repo.dispatcher().executor()));
    assert_eq!(executor.backend(), "sqlite");
}

#[test]
fn test_backend_overrides() {
    let executor = SqliteExecutor::open_in_memory().unwrap().with_backend("hsqldb");
    let dispatcher = Arc::new(Dispatcher::builder(executor).build().unwrap());

    let method = QueryMethod::template("which", "default")
        .override_for("pgsql", "pgsql text")
        .override_for("hsqldb", "hsqldb text");
    assert_eq!(dispatcher.invoke(&method, args![]).unwrap().into_text().unwrap(), "hsqldb text");

    let other = QueryMethod::template("which", "default").override_for("HSQLDB", "upper");
    assert_eq!(dispatcher.invoke(&other, args![]).unwrap().into_text().unwrap(), "default");
}

#[test]
fn test_mode_overrides_text_heuristic() {
    let repo = repository();
    repo.call("insert_value", args![key("A"), key("1")]).unwrap();

    let with_cte = QueryMethod::new("with_cte", "WITH k AS (SELECT CONF_KEY FROM LA_CONF) SELECT * FROM k")
        .mode(QueryMode::Select)
        .returns_list::<String>();
    let keys = repo.dispatcher().invoke(&with_cte, args![]).unwrap().into_list::<String>().unwrap();
    assert_eq!(keys, vec![key("A")]);

    let returning = QueryMethod::new(
        "delete_returning",
        "DELETE FROM LA_CONF WHERE CONF_KEY = :key RETURNING CONF_VALUE",
    )
    .mode(QueryMode::ModifyingWithReturn)
    .bind::<String>("key")
    .returns_list::<String>();
    let deleted = repo
        .dispatcher()
        .invoke(&returning, args![key("A")])
        .unwrap()
        .into_list::<String>()
        .unwrap();
    assert_eq!(deleted, vec![key("1")]);
}

#[test]
fn test_control_arguments_are_not_bound() {
    let repo = repository();
    repo.call("insert_value", args![key("A"), key("1")]).unwrap();

    let method = QueryMethod::new("with_control", "SELECT CONF_VALUE FROM LA_CONF WHERE CONF_KEY = :key")
        .control_arg::<i32>()
        .bind::<String>("key")
        .returns_single::<String>();
    let value = repo
        .dispatcher()
        .invoke(&method, args![42_i32, key("A")])
        .unwrap()
        .into_single::<String>()
        .unwrap();
    assert_eq!(value, "1");
}

#[test]
fn test_argument_errors_are_configuration_errors() {
    let repo = repository();

    let err = repo.call("find_by_key", args![]).unwrap_err();
    assert!(err.is_configuration());

    let err = repo.call("find_by_key", args![7_i64]).unwrap_err();
    assert!(err.is_configuration());

    let err = repo.call("no_such_method", args![]).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_outcome_accessor_mismatch() {
    let repo = repository();
    let err = repo.call("template", args![]).unwrap().into_affected().unwrap_err();
    assert!(err.is_configuration());

    repo.call("insert_value", args![key("A"), key("1")]).unwrap();
    let err = repo
        .call("find_value_for_key", args![key("A")])
        .unwrap()
        .into_single::<i64>()
        .unwrap_err();
    assert!(err.is_configuration());
}

use super::config::DispatcherConfig;
use crate::column::{ColumnMapperChain, ColumnMapperFactory};
use crate::connection::{BindParams, Executor};
use crate::core::{QueryError, Result, TypeKind, TypeRef, Value};
use crate::dispatch::{Action, Outcome, extract_generated_key, into_optional, resolve_action};
use crate::mapper::RowMapperResolver;
use crate::parameter::{AdvancedParameterConverter, Converter, ParameterConverter, ParameterConverterChain};
use crate::plugins::{self, DefaultColumnMapperFactory};
use crate::query::{QueryMethod, QueryMode, RepositoryContract, ReturnShape};
use crate::result::ResultSet;
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Executes declared query methods against one executor.
///
/// A dispatcher owns its plugin chains and row mapper cache. It is `Send + Sync`
/// and meant to be shared (usually behind an `Arc`) by every repository built on it.
pub struct Dispatcher {
    executor: Arc<dyn Executor>,
    backend: String,
    config: DispatcherConfig,
    columns: ColumnMapperChain,
    converters: ParameterConverterChain,
    mappers: RowMapperResolver,
}

impl Dispatcher {
    pub fn builder(executor: impl Executor + 'static) -> DispatcherBuilder {
        DispatcherBuilder::new(Arc::new(executor))
    }

    pub fn builder_shared(executor: Arc<dyn Executor>) -> DispatcherBuilder {
        DispatcherBuilder::new(executor)
    }

    /// Backend identifier used to pick query overrides.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn column_factories(&self) -> &ColumnMapperChain {
        &self.columns
    }

    pub fn parameter_converters(&self) -> &ParameterConverterChain {
        &self.converters
    }

    pub fn row_mappers(&self) -> &RowMapperResolver {
        &self.mappers
    }

    /// Runs `method` with positional `args`, one per bind entry.
    pub fn invoke(&self, method: &QueryMethod, args: &[&dyn Any]) -> Result<Outcome> {
        let metadata = method.metadata();
        let text = metadata.resolve_text(&self.backend);

        if metadata.mode() == QueryMode::Template {
            return Ok(Outcome::Text(text.to_string()));
        }
        if *method.return_shape() == ReturnShape::Executor {
            return Ok(Outcome::Executor(Arc::clone(&self.executor)));
        }

        let action = resolve_action(metadata.mode(), method.return_shape(), text);
        let params = self
            .converters
            .build_params(method.binds(), args, self.executor.as_ref())?;
        debug!(
            method = method.name(),
            backend = %self.backend,
            ?action,
            params = params.len(),
            "dispatching query method"
        );

        match action {
            Action::Query => self.run_query(method, text, &params),
            Action::Update => Ok(Outcome::Affected(self.executor.update(text, &params)?)),
            Action::InsertWithKey => {
                let ReturnShape::GeneratedKey(key_type) = method.return_shape() else {
                    return Err(QueryError::Configuration(format!(
                        "Method {} requests generated keys without declaring a key type",
                        method.name()
                    )));
                };
                let keys = self.executor.update_with_keys(text, &params)?;
                let key = extract_generated_key(&keys, key_type, method.generated_key_name(), text)?;
                Ok(Outcome::GeneratedKey(key))
            }
        }
    }

    /// Looks `name` up in `contract` and invokes it.
    pub fn call(&self, contract: &RepositoryContract, name: &str, args: &[&dyn Any]) -> Result<Outcome> {
        self.invoke(contract.method(name)?, args)
    }

    /// Checks every method of `contract` for configuration defects without touching the store.
    pub fn validate(&self, contract: &RepositoryContract) -> Result<()> {
        for method in contract.methods() {
            self.validate_method(method).map_err(|err| match err {
                QueryError::Configuration(reason) => QueryError::Configuration(format!(
                    "{}::{}: {}",
                    contract.name(),
                    method.name(),
                    reason
                )),
                other => other,
            })?;
        }
        Ok(())
    }

    /// Binds `contract` to this dispatcher, validating it first when configured to.
    pub fn register(self: &Arc<Self>, contract: RepositoryContract) -> Result<Repository> {
        if self.config.validate_on_register {
            self.validate(&contract)?;
        }
        debug!("registered repository {} ({} methods)", contract.name(), contract.methods().len());
        Ok(Repository {
            dispatcher: Arc::clone(self),
            contract,
        })
    }

    fn validate_method(&self, method: &QueryMethod) -> Result<()> {
        let metadata = method.metadata();
        let shape = method.return_shape();

        match (metadata.mode(), shape) {
            (QueryMode::Template, ReturnShape::Text) => return Ok(()),
            (QueryMode::Template, other) => {
                return Err(QueryError::Configuration(format!(
                    "template methods return the query text, not {}",
                    other.describe()
                )));
            }
            (_, ReturnShape::Text) => {
                return Err(QueryError::Configuration(
                    "only template methods can return the query text".to_string(),
                ));
            }
            (_, ReturnShape::Executor) => return Ok(()),
            _ => {}
        }

        for entry in method.binds().entries() {
            let Some(name) = entry.bind_name() else {
                continue;
            };
            if self
                .converters
                .find(entry.declared_type(), entry.annotations())
                .is_none()
            {
                return Err(QueryError::Configuration(format!(
                    "no parameter converter accepts argument '{}' of type {}",
                    name,
                    entry.declared_type()
                )));
            }
        }

        if method.generated_key_name().is_some() && !matches!(shape, ReturnShape::GeneratedKey(_)) {
            return Err(QueryError::Configuration(
                "a generated key name is declared but the method does not return a generated key".to_string(),
            ));
        }

        let action = resolve_action(metadata.mode(), shape, metadata.resolve_text(&self.backend));
        if action == Action::Query {
            let element = shape.element().ok_or_else(|| self.not_a_row_shape(method))?;
            self.mappers.resolve(
                element,
                metadata.explicit_row_mapper(),
                method.annotations(),
                &self.columns,
            )?;
        }
        Ok(())
    }

    fn run_query(&self, method: &QueryMethod, text: &str, params: &BindParams) -> Result<Outcome> {
        let shape = method.return_shape();
        let element = shape.element().ok_or_else(|| self.not_a_row_shape(method))?;
        let mapper = self.mappers.resolve(
            element,
            method.metadata().explicit_row_mapper(),
            method.annotations(),
            &self.columns,
        )?;

        let result = self.executor.query(text, params)?;
        match shape {
            ReturnShape::Single(_) => {
                let row = result.single_row()?;
                Ok(Outcome::Single(mapper.map_row(&row, 0)?))
            }
            ReturnShape::Optional(_) if Self::reads_absent(method, element, &result) => {
                trace!(method = method.name(), "single NULL row read as an absent optional");
                Ok(Outcome::Optional(None))
            }
            _ => {
                let mut values = Vec::with_capacity(result.row_count());
                for (row_num, row) in result.iter().enumerate() {
                    values.push(mapper.map_row(&row, row_num)?);
                }
                if matches!(shape, ReturnShape::Optional(_)) {
                    Ok(Outcome::Optional(into_optional(values)?))
                } else {
                    Ok(Outcome::List(values))
                }
            }
        }
    }

    /// A lone NULL row read through a single non-nullable column is an absent optional.
    fn reads_absent(method: &QueryMethod, element: &TypeRef, result: &ResultSet) -> bool {
        if element.is_nullable()
            || matches!(element.kind(), TypeKind::Composite(_))
            || method.metadata().explicit_row_mapper().is_some()
            || result.row_count() != 1
        {
            return false;
        }
        result
            .row(0)
            .is_some_and(|row| matches!(row.by_index(0), Ok(Value::Null)))
    }

    fn not_a_row_shape(&self, method: &QueryMethod) -> QueryError {
        QueryError::Configuration(format!(
            "Method {} runs as a query but returns {}",
            method.name(),
            method.return_shape().describe()
        ))
    }
}

/// Assembles a [`Dispatcher`] from an executor, a configuration and extra plugins.
pub struct DispatcherBuilder {
    executor: Arc<dyn Executor>,
    config: DispatcherConfig,
    column_factories: Vec<Box<dyn ColumnMapperFactory>>,
    converters: Vec<Converter>,
}

impl DispatcherBuilder {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            config: DispatcherConfig::default(),
            column_factories: Vec::new(),
            converters: Vec::new(),
        }
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn column_factory(mut self, factory: impl ColumnMapperFactory + 'static) -> Self {
        self.column_factories.push(Box::new(factory));
        self
    }

    pub fn parameter_converter(mut self, converter: impl ParameterConverter + 'static) -> Self {
        self.converters.push(Converter::simple(converter));
        self
    }

    pub fn advanced_parameter_converter(mut self, converter: impl AdvancedParameterConverter + 'static) -> Self {
        self.converters.push(Converter::advanced(converter));
        self
    }

    /// Registered plugins come before the built-ins, so they win priority ties.
    pub fn build(self) -> Result<Dispatcher> {
        self.config.validate().map_err(QueryError::Configuration)?;

        let mut factories = self.column_factories;
        if self.config.default_column_factories {
            factories.extend(plugins::default_column_factories());
        }
        factories.push(Box::new(DefaultColumnMapperFactory));

        let mut converters = self.converters;
        if self.config.default_parameter_converters {
            converters.extend(plugins::default_parameter_converters());
        }

        let backend = self
            .config
            .backend
            .clone()
            .unwrap_or_else(|| self.executor.backend().to_string());
        let columns = ColumnMapperChain::new(factories);
        let converters = ParameterConverterChain::new(converters);
        info!(
            backend = %backend,
            column_factories = ?columns.names(),
            parameter_converters = ?converters.names(),
            "dispatcher built"
        );

        Ok(Dispatcher {
            executor: self.executor,
            backend,
            config: self.config,
            columns,
            converters,
            mappers: RowMapperResolver::new(),
        })
    }
}

/// A repository contract bound to a dispatcher.
#[derive(Clone)]
pub struct Repository {
    dispatcher: Arc<Dispatcher>,
    contract: RepositoryContract,
}

impl Repository {
    pub fn call(&self, name: &str, args: &[&dyn Any]) -> Result<Outcome> {
        self.dispatcher.call(&self.contract, name, args)
    }

    pub fn contract(&self) -> &RepositoryContract {
        &self.contract
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

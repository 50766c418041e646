use crate::connection::{BindParams, ConnectionHandle, Executor};
use crate::core::{Annotations, QueryError, Result, TypeRef, Value};
use crate::query::BindSpec;
use std::any::Any;
use tracing::trace;

/// Turns one declared argument into bind values.
pub trait ParameterConverter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower values are consulted first.
    fn priority(&self) -> i32;

    fn accept(&self, ty: &TypeRef, annotations: &Annotations) -> bool;

    /// `value` is `None` when a nullable argument is `None`.
    fn bind(&self, name: &str, value: Option<&dyn Any>, ty: &TypeRef, params: &mut BindParams) -> Result<()>;
}

/// A converter that may need a live connection to produce its bind value.
pub trait AdvancedParameterConverter: Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32;

    fn accept(&self, ty: &TypeRef, annotations: &Annotations) -> bool;

    fn bind(&self, ctx: &mut ConversionContext<'_>) -> Result<()>;
}

/// Everything an advanced converter sees while binding one argument.
pub struct ConversionContext<'a> {
    executor: &'a dyn Executor,
    name: &'a str,
    value: Option<&'a dyn Any>,
    ty: &'a TypeRef,
    annotations: &'a Annotations,
    params: &'a mut BindParams,
}

impl<'a> ConversionContext<'a> {
    pub fn new(
        executor: &'a dyn Executor,
        name: &'a str,
        value: Option<&'a dyn Any>,
        ty: &'a TypeRef,
        annotations: &'a Annotations,
        params: &'a mut BindParams,
    ) -> Self {
        Self {
            executor,
            name,
            value,
            ty,
            annotations,
            params,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// The execution handle the method runs on.
    pub fn executor(&self) -> &'a dyn Executor {
        self.executor
    }

    pub fn value(&self) -> Option<&'a dyn Any> {
        self.value
    }

    pub fn declared_type(&self) -> &TypeRef {
        self.ty
    }

    pub fn annotations(&self) -> &Annotations {
        self.annotations
    }

    pub fn params(&mut self) -> &mut BindParams {
        &mut *self.params
    }

    /// Binds `value` under the argument's own name.
    pub fn bind(&mut self, value: Value) {
        self.params.insert(self.name, value);
    }

    /// Runs `f` with a live connection.
    ///
    /// The connection is released when `f` returns, whether it succeeded or not.
    pub fn with_connection<R>(&self, f: impl FnOnce(&mut dyn ConnectionHandle) -> Result<R>) -> Result<R> {
        let mut conn = self.executor.connection()?;
        trace!(bind = self.name, backend = conn.backend(), "advanced converter acquired connection");
        f(&mut *conn)
    }
}

pub enum Converter {
    Simple(Box<dyn ParameterConverter>),
    Advanced(Box<dyn AdvancedParameterConverter>),
}

impl Converter {
    pub fn simple(converter: impl ParameterConverter + 'static) -> Self {
        Self::Simple(Box::new(converter))
    }

    pub fn advanced(converter: impl AdvancedParameterConverter + 'static) -> Self {
        Self::Advanced(Box::new(converter))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Simple(c) => c.name(),
            Self::Advanced(c) => c.name(),
        }
    }

    pub fn priority(&self) -> i32 {
        match self {
            Self::Simple(c) => c.priority(),
            Self::Advanced(c) => c.priority(),
        }
    }

    pub fn accept(&self, ty: &TypeRef, annotations: &Annotations) -> bool {
        match self {
            Self::Simple(c) => c.accept(ty, annotations),
            Self::Advanced(c) => c.accept(ty, annotations),
        }
    }
}

/// Simple and advanced converters ordered by ascending priority.
pub struct ParameterConverterChain {
    converters: Vec<Converter>,
}

impl ParameterConverterChain {
    pub fn new(mut converters: Vec<Converter>) -> Self {
        converters.sort_by_key(Converter::priority);
        Self { converters }
    }

    pub fn find(&self, ty: &TypeRef, annotations: &Annotations) -> Option<&Converter> {
        self.converters.iter().find(|c| c.accept(ty, annotations))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.converters.iter().map(Converter::name).collect()
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Binds every named entry of `spec` from the positional `args`.
    pub fn build_params(&self, spec: &BindSpec, args: &[&dyn Any], executor: &dyn Executor) -> Result<BindParams> {
        let mut params = BindParams::new();
        for entry in spec.entries() {
            let Some(name) = entry.bind_name() else {
                continue;
            };
            let ty = entry.declared_type();
            let arg = args.get(entry.position()).copied().ok_or_else(|| {
                QueryError::Configuration(format!(
                    "Missing argument at position {} for bind name '{}'",
                    entry.position(),
                    name
                ))
            })?;
            let value = ty.peel(arg).map_err(|expected| {
                QueryError::Configuration(format!(
                    "Argument '{}' at position {} is not of its declared type {}",
                    name,
                    entry.position(),
                    expected
                ))
            })?;
            if value.is_some_and(|v| (*v).type_id() != ty.id()) {
                return Err(QueryError::Configuration(format!(
                    "Argument '{}' at position {} is not of its declared type {}",
                    name,
                    entry.position(),
                    ty
                )));
            }
            let converter = self.find(ty, entry.annotations()).ok_or_else(|| {
                QueryError::Configuration(format!(
                    "Was not able to find a parameter converter able to process argument '{}' of type {}",
                    name, ty
                ))
            })?;

            trace!(bind = name, converter = converter.name(), "binding argument");
            match converter {
                Converter::Simple(c) => c.bind(name, value, ty, &mut params)?,
                Converter::Advanced(c) => {
                    let annotations = entry.annotations();
                    let mut ctx = ConversionContext::new(executor, name, value, ty, annotations, &mut params);
                    c.bind(&mut ctx)?;
                }
            }
        }
        Ok(params)
    }
}

/// Downcasts a non-null argument, reporting a mismatch as a configuration error.
pub fn downcast_arg<'a, T: Any>(name: &str, value: &'a dyn Any) -> Result<&'a T> {
    value.downcast_ref::<T>().ok_or_else(|| {
        QueryError::Configuration(format!(
            "Argument '{}' is not a {}",
            name,
            std::any::type_name::<T>()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SqlType;
    use crate::query::BindEntry;
    use crate::result::ResultSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Texts;

    impl ParameterConverter for Texts {
        fn name(&self) -> &'static str {
            "texts"
        }

        fn priority(&self) -> i32 {
            10
        }

        fn accept(&self, ty: &TypeRef, _annotations: &Annotations) -> bool {
            ty.is::<String>()
        }

        fn bind(&self, name: &str, value: Option<&dyn Any>, _ty: &TypeRef, params: &mut BindParams) -> Result<()> {
            let value = match value {
                Some(v) => Value::Text(downcast_arg::<String>(name, v)?.clone()),
                None => Value::Null,
            };
            params.insert(name, value);
            Ok(())
        }
    }

    struct NoExecutor {
        acquired: AtomicUsize,
    }

    impl Executor for NoExecutor {
        fn backend(&self) -> &str {
            "none"
        }

        fn query(&self, _sql: &str, _params: &BindParams) -> Result<ResultSet> {
            Ok(ResultSet::empty())
        }

        fn update(&self, _sql: &str, _params: &BindParams) -> Result<u64> {
            Ok(0)
        }

        fn update_with_keys(&self, _sql: &str, _params: &BindParams) -> Result<crate::connection::GeneratedKeys> {
            Ok(Default::default())
        }

        fn connection(&self) -> Result<Box<dyn ConnectionHandle + '_>> {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Err(QueryError::Execution("no connections".into()))
        }
    }

    fn executor() -> NoExecutor {
        NoExecutor {
            acquired: AtomicUsize::new(0),
        }
    }

    fn spec() -> BindSpec {
        let mut spec = BindSpec::default();
        spec.push(BindEntry::new(0, Some("key"), String::type_ref(), Annotations::none()));
        spec.push(BindEntry::new(1, None, i64::type_ref(), Annotations::none()));
        spec.push(BindEntry::new(2, Some("value"), <Option<String>>::type_ref(), Annotations::none()));
        spec
    }

    #[test]
    fn test_binds_named_entries_and_skips_control_args() {
        let chain = ParameterConverterChain::new(vec![Converter::simple(Texts)]);
        let key = "KEY".to_string();
        let value: Option<String> = None;
        let params = chain
            .build_params(&spec(), &[&key, &5_i64, &value], &executor())
            .unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("key"), Some(&Value::Text("KEY".into())));
        assert_eq!(params.get("value"), Some(&Value::Null));
    }

    #[test]
    fn test_configuration_errors() {
        let chain = ParameterConverterChain::new(vec![Converter::simple(Texts)]);
        let key = "KEY".to_string();

        let missing = chain.build_params(&spec(), &[&key], &executor()).unwrap_err();
        assert!(missing.is_configuration());

        let wrong_type = chain
            .build_params(&spec(), &[&1_i32, &5_i64, &None::<String>], &executor())
            .unwrap_err();
        assert!(wrong_type.is_configuration());

        let mut unsupported = BindSpec::default();
        unsupported.push(BindEntry::new(0, Some("n"), i64::type_ref(), Annotations::none()));
        let err = chain.build_params(&unsupported, &[&1_i64], &executor()).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("i64"));
    }

    struct NeedsConnection;

    impl AdvancedParameterConverter for NeedsConnection {
        fn name(&self) -> &'static str {
            "needs_connection"
        }

        fn priority(&self) -> i32 {
            0
        }

        fn accept(&self, ty: &TypeRef, _annotations: &Annotations) -> bool {
            ty.is::<String>()
        }

        fn bind(&self, ctx: &mut ConversionContext<'_>) -> Result<()> {
            let count = ctx.with_connection(|conn| conn.execute("SELECT 1", &BindParams::new()))?;
            ctx.bind(Value::Integer(count as i64));
            Ok(())
        }
    }

    #[test]
    fn test_advanced_converter_sees_connection_errors() {
        let chain = ParameterConverterChain::new(vec![
            Converter::simple(Texts),
            Converter::advanced(NeedsConnection),
        ]);
        assert_eq!(chain.names(), vec!["needs_connection", "texts"]);

        let executor = executor();
        let key = "KEY".to_string();
        let err = chain
            .build_params(&spec(), &[&key, &5_i64, &None::<String>], &executor)
            .unwrap_err();
        assert!(matches!(err, QueryError::Execution(_)));
        assert_eq!(executor.acquired.load(Ordering::SeqCst), 1);
    }
}

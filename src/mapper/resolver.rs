use super::{ConstructorRowMapper, RowMapper, RowMapperType, SingleColumnRowMapper};
use crate::column::{ColumnMapperChain, ColumnMapperFactory, GenericColumnMapper};
use crate::core::{Annotations, QueryError, Result, TypeKey, TypeRef};
use crate::plugins::DEFAULT_PRIORITY;
use crate::result::Column;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, trace, warn};

/// Per-element-type outcome of constructor mapping.
#[derive(Clone)]
pub enum CachedMapper {
    Found(Arc<dyn RowMapper>),
    /// The type does not qualify for constructor mapping; resolve it per column.
    NotApplicable,
}

/// Picks the row mapper for a method's element type.
///
/// Constructor mappers are cached per element type for the dispatcher's
/// lifetime. Concurrent first-time resolutions may both build a mapper; the
/// last write wins and either result is equivalent.
#[derive(Default)]
pub struct RowMapperResolver {
    cache: RwLock<HashMap<TypeKey, CachedMapper>>,
}

impl RowMapperResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &self,
        element: &TypeRef,
        explicit: Option<&RowMapperType>,
        annotations: &Annotations,
        chain: &ColumnMapperChain,
    ) -> Result<Arc<dyn RowMapper>> {
        if let Some(mapper_type) = explicit {
            trace!(mapper = mapper_type.name(), "using explicit row mapper");
            return mapper_type.instantiate();
        }

        match self.cached(element, chain)? {
            CachedMapper::Found(mapper) => Ok(mapper),
            CachedMapper::NotApplicable => Self::per_column(element, annotations, chain),
        }
    }

    /// Single-column mapper for a type without constructor mapping.
    ///
    /// A composite that breaks the constructor shape rules is a configuration
    /// error unless a factory other than the catch-all claims it.
    fn per_column(
        element: &TypeRef,
        annotations: &Annotations,
        chain: &ColumnMapperChain,
    ) -> Result<Arc<dyn RowMapper>> {
        let factory = chain.find(element, annotations);
        if let Some(reason) = element.composite_descriptor().and_then(|d| d.shape_violation()) {
            match factory {
                Some(claimant) if claimant.priority() != DEFAULT_PRIORITY => {
                    warn!(
                        element = %element,
                        factory = claimant.name(),
                        "composite type does not qualify for constructor mapping, reading it as one column"
                    );
                }
                _ => {
                    return Err(QueryError::Configuration(format!(
                        "Cannot map rows to {}: {}",
                        element, reason
                    )));
                }
            }
        }

        Ok(match factory {
            Some(factory) => factory.single_column_mapper(element),
            None => Arc::new(SingleColumnRowMapper::new(Box::new(GenericColumnMapper::new(
                Column::first(),
                *element,
            )))),
        })
    }

    /// Cached constructor-mapping outcome for `element`, computed on first use.
    pub fn cached(&self, element: &TypeRef, chain: &ColumnMapperChain) -> Result<CachedMapper> {
        let key = element.key();
        if let Some(hit) = self.cache.read()?.get(&key) {
            trace!(element = %element, "row mapper cache hit");
            return Ok(hit.clone());
        }

        let entry = Self::build_entry(element, chain)?;
        self.cache.write()?.insert(key, entry.clone());
        Ok(entry)
    }

    pub fn cached_types(&self) -> Result<usize> {
        Ok(self.cache.read()?.len())
    }

    fn build_entry(element: &TypeRef, chain: &ColumnMapperChain) -> Result<CachedMapper> {
        if element.is_nullable() {
            return Ok(CachedMapper::NotApplicable);
        }
        match element.composite_descriptor() {
            Some(descriptor) if descriptor.qualifies() => {
                debug!(element = %element, "building constructor row mapper");
                let mapper = ConstructorRowMapper::build(&descriptor, chain)?;
                Ok(CachedMapper::Found(Arc::new(mapper)))
            }
            _ => Ok(CachedMapper::NotApplicable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnMapper;
    use crate::core::{AnyValue, MappingError, SqlType, Value};
    use crate::mapper::{Composite, CompositeDescriptor, Constructor, ConstructorParam};
    use crate::result::Row;

    struct Pair {
        a: i64,
        b: i64,
    }

    impl Composite for Pair {
        fn descriptor() -> CompositeDescriptor {
            CompositeDescriptor::of::<Self>(vec![Constructor::new(
                vec![
                    ConstructorParam::new(Some("A"), i64::type_ref(), &[]),
                    ConstructorParam::new(Some("B"), i64::type_ref(), &[]),
                ],
                |mut args| -> std::result::Result<AnyValue, MappingError> {
                    Ok(Box::new(Pair {
                        a: args.take(0)?,
                        b: args.take(1)?,
                    }))
                },
            )])
        }
    }

    impl SqlType for Pair {
        fn type_ref() -> TypeRef {
            TypeRef::composite::<Self>()
        }
    }

    struct Generic;

    impl ColumnMapperFactory for Generic {
        fn name(&self) -> &'static str {
            "generic"
        }

        fn priority(&self) -> i32 {
            0
        }

        fn accept(&self, _ty: &TypeRef, _annotations: &Annotations) -> bool {
            true
        }

        fn build(&self, column: Column, ty: &TypeRef) -> Box<dyn ColumnMapper> {
            Box::new(GenericColumnMapper::new(column, *ty))
        }
    }

    #[test]
    fn test_constructor_mapper_is_cached() {
        let resolver = RowMapperResolver::new();
        let chain = ColumnMapperChain::new(vec![Box::new(Generic)]);

        let first = resolver
            .resolve(&Pair::type_ref(), None, &Annotations::none(), &chain)
            .unwrap();
        let second = resolver
            .resolve(&Pair::type_ref(), None, &Annotations::none(), &chain)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.cached_types().unwrap(), 1);

        let columns = vec!["A".to_string(), "B".to_string()];
        let values = vec![Value::Integer(1), Value::Integer(2)];
        let pair = first.map_row(&Row::new(&columns, &values), 0).unwrap();
        let pair = pair.downcast::<Pair>().unwrap();
        assert_eq!((pair.a, pair.b), (1, 2));
    }

    struct TwoWays;

    impl Composite for TwoWays {
        fn descriptor() -> CompositeDescriptor {
            let build = |_: crate::mapper::ConstructorArgs| -> std::result::Result<AnyValue, MappingError> {
                Ok(Box::new(TwoWays))
            };
            CompositeDescriptor::of::<Self>(vec![
                Constructor::new(vec![ConstructorParam::new(Some("A"), i64::type_ref(), &[])], build),
                Constructor::new(vec![ConstructorParam::new(Some("B"), i64::type_ref(), &[])], build),
            ])
        }
    }

    impl SqlType for TwoWays {
        fn type_ref() -> TypeRef {
            TypeRef::composite::<Self>()
        }
    }

    #[test]
    fn test_unqualified_composite_left_to_catch_all_is_configuration_error() {
        let resolver = RowMapperResolver::new();
        let chain = ColumnMapperChain::new(vec![Box::new(crate::plugins::DefaultColumnMapperFactory)]);
        let err = resolver
            .resolve(&TwoWays::type_ref(), None, &Annotations::none(), &chain)
            .err()
            .unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("exactly one constructor"));

        let err = resolver
            .resolve(&TwoWays::type_ref(), None, &Annotations::none(), &ColumnMapperChain::empty())
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unqualified_composite_claimed_by_plugin() {
        let resolver = RowMapperResolver::new();
        let chain = ColumnMapperChain::new(vec![
            Box::new(crate::plugins::DefaultColumnMapperFactory),
            Box::new(Generic),
        ]);
        assert!(resolver
            .resolve(&TwoWays::type_ref(), None, &Annotations::none(), &chain)
            .is_ok());
    }

    #[test]
    fn test_plain_types_are_not_applicable() {
        let resolver = RowMapperResolver::new();
        let chain = ColumnMapperChain::new(vec![Box::new(Generic)]);
        assert!(matches!(
            resolver.cached(&String::type_ref(), &chain).unwrap(),
            CachedMapper::NotApplicable
        ));

        let mapper = resolver
            .resolve(&String::type_ref(), None, &Annotations::none(), &chain)
            .unwrap();
        let columns = vec!["X".to_string()];
        let values = vec![Value::Text("v".into())];
        let mapped = mapper.map_row(&Row::new(&columns, &values), 0).unwrap();
        assert_eq!(*mapped.downcast::<String>().unwrap(), "v");
    }

    #[test]
    fn test_empty_chain_falls_back_to_generic_extraction() {
        let resolver = RowMapperResolver::new();
        let mapper = resolver
            .resolve(&i64::type_ref(), None, &Annotations::none(), &ColumnMapperChain::empty())
            .unwrap();
        let columns = vec!["N".to_string()];
        let values = vec![Value::Integer(4)];
        let mapped = mapper.map_row(&Row::new(&columns, &values), 0).unwrap();
        assert_eq!(*mapped.downcast::<i64>().unwrap(), 4);
    }
}

use super::RowMapper;
use crate::column::{ColumnMapper, ColumnMapperChain};
use crate::core::{Annotations, AnyValue, MappingError, QueryError, Result, TypeRef};
use crate::result::{Column, Row};
use std::any::{Any, type_name};
use std::fmt;

/// Types assembled from several columns through a declared constructor.
///
/// Usually derived with `#[derive(FromRow)]`.
pub trait Composite: Any + Send {
    fn descriptor() -> CompositeDescriptor;
}

/// Constructors a composite type exposes to row mapping.
#[derive(Clone, Debug)]
pub struct CompositeDescriptor {
    type_name: &'static str,
    constructors: Vec<Constructor>,
}

impl CompositeDescriptor {
    pub fn new(type_name: &'static str, constructors: Vec<Constructor>) -> Self {
        Self {
            type_name,
            constructors,
        }
    }

    pub fn of<C: Composite>(constructors: Vec<Constructor>) -> Self {
        Self::new(type_name::<C>(), constructors)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// Exactly one constructor, taking at least one parameter, every parameter naming a column.
    pub fn qualifies(&self) -> bool {
        self.shape_violation().is_none()
    }

    /// The first shape rule this descriptor breaks, if any.
    pub fn shape_violation(&self) -> Option<String> {
        let only = match self.constructors.as_slice() {
            [only] => only,
            many => {
                return Some(format!(
                    "Type {} must have exactly one constructor, found {}",
                    self.type_name,
                    many.len()
                ));
            }
        };
        if only.params.is_empty() {
            return Some(format!(
                "The constructor of {} must take at least one parameter",
                self.type_name
            ));
        }
        only.params
            .iter()
            .position(|p| p.column.is_none())
            .map(|position| {
                format!(
                    "Parameter at position {} of the {} constructor does not name a column",
                    position, self.type_name
                )
            })
    }
}

#[derive(Clone)]
pub struct Constructor {
    params: Vec<ConstructorParam>,
    build: fn(ConstructorArgs) -> std::result::Result<AnyValue, MappingError>,
}

impl Constructor {
    pub fn new(
        params: Vec<ConstructorParam>,
        build: fn(ConstructorArgs) -> std::result::Result<AnyValue, MappingError>,
    ) -> Self {
        Self { params, build }
    }

    pub fn params(&self) -> &[ConstructorParam] {
        &self.params
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct ConstructorParam {
    column: Option<&'static str>,
    ty: TypeRef,
    annotations: Annotations,
}

impl ConstructorParam {
    pub fn new(column: Option<&'static str>, ty: TypeRef, annotations: &[&'static str]) -> Self {
        Self {
            column,
            ty,
            annotations: Annotations::new(annotations),
        }
    }

    pub fn column(&self) -> Option<&'static str> {
        self.column
    }

    pub fn declared_type(&self) -> &TypeRef {
        &self.ty
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }
}

/// Values extracted for one constructor call, in parameter order.
pub struct ConstructorArgs {
    type_name: &'static str,
    values: Vec<Option<AnyValue>>,
}

impl ConstructorArgs {
    pub fn new(type_name: &'static str, values: Vec<AnyValue>) -> Self {
        Self {
            type_name,
            values: values.into_iter().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Moves the argument at `position` out as `T`. Each position can be taken once.
    pub fn take<T: Any>(&mut self, position: usize) -> std::result::Result<T, MappingError> {
        let type_name = self.type_name;
        let mismatch = |found| MappingError::Constructor {
            type_name,
            position,
            source: Box::new(MappingError::IncompatibleType {
                column: format!("#{}", position + 1),
                target: std::any::type_name::<T>(),
                found,
            }),
        };
        let value = self
            .values
            .get_mut(position)
            .and_then(Option::take)
            .ok_or_else(|| mismatch("no value"))?;
        value
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| mismatch("value of another type"))
    }
}

/// Builds composite values by calling their single constructor with one column per parameter.
pub struct ConstructorRowMapper {
    type_name: &'static str,
    columns: Vec<Box<dyn ColumnMapper>>,
    build: fn(ConstructorArgs) -> std::result::Result<AnyValue, MappingError>,
}

impl ConstructorRowMapper {
    pub fn build(descriptor: &CompositeDescriptor, chain: &ColumnMapperChain) -> Result<Self> {
        let type_name = descriptor.type_name();
        if let Some(reason) = descriptor.shape_violation() {
            return Err(QueryError::Configuration(reason));
        }
        let [constructor] = descriptor.constructors() else {
            return Err(QueryError::Configuration(format!(
                "Type {} must have exactly one constructor",
                type_name
            )));
        };

        let mut columns = Vec::with_capacity(constructor.params().len());
        for (position, param) in constructor.params().iter().enumerate() {
            let Some(column) = param.column() else {
                return Err(QueryError::Configuration(format!(
                    "Parameter at position {} of the {} constructor does not name a column",
                    position, type_name
                )));
            };
            let factory = chain
                .find(param.declared_type(), param.annotations())
                .ok_or_else(|| {
                    QueryError::Configuration(format!(
                        "Did not find any matching column mapper factory for type {} in the {} constructor at position {}",
                        param.declared_type(),
                        type_name,
                        position
                    ))
                })?;
            columns.push(factory.build(Column::named(column), param.declared_type()));
        }

        Ok(Self {
            type_name,
            columns,
            build: constructor.build,
        })
    }

    pub fn for_type<C: Composite>(chain: &ColumnMapperChain) -> Result<Self> {
        Self::build(&C::descriptor(), chain)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl RowMapper for ConstructorRowMapper {
    fn map_row(&self, row: &Row<'_>, _row_num: usize) -> Result<AnyValue> {
        let mut values = Vec::with_capacity(self.columns.len());
        for (position, column) in self.columns.iter().enumerate() {
            let value = column.get(row).map_err(|source| MappingError::Constructor {
                type_name: self.type_name,
                position,
                source: Box::new(source),
            })?;
            values.push(value);
        }
        Ok((self.build)(ConstructorArgs::new(self.type_name, values))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnMapperFactory, GenericColumnMapper};
    use crate::core::{SqlType, Value};

    #[derive(Debug, PartialEq)]
    struct Conf {
        key: String,
        value: Option<String>,
        count: i32,
    }

    impl Composite for Conf {
        fn descriptor() -> CompositeDescriptor {
            CompositeDescriptor::of::<Self>(vec![Constructor::new(
                vec![
                    ConstructorParam::new(Some("CONF_KEY"), String::type_ref(), &[]),
                    ConstructorParam::new(Some("CONF_VALUE"), <Option<String>>::type_ref(), &[]),
                    ConstructorParam::new(Some("CONF_COUNT"), i32::type_ref(), &[]),
                ],
                |mut args| {
                    Ok(Box::new(Conf {
                        key: args.take(0)?,
                        value: args.take(1)?,
                        count: args.take(2)?,
                    }) as AnyValue)
                },
            )])
        }
    }

    struct Generic;

    impl ColumnMapperFactory for Generic {
        fn name(&self) -> &'static str {
            "generic"
        }

        fn priority(&self) -> i32 {
            i32::MAX
        }

        fn accept(&self, _ty: &TypeRef, _annotations: &Annotations) -> bool {
            true
        }

        fn build(&self, column: Column, ty: &TypeRef) -> Box<dyn ColumnMapper> {
            Box::new(GenericColumnMapper::new(column, *ty))
        }
    }

    fn chain() -> ColumnMapperChain {
        ColumnMapperChain::new(vec![Box::new(Generic)])
    }

    fn columns() -> Vec<String> {
        vec!["CONF_KEY".into(), "CONF_VALUE".into(), "CONF_COUNT".into()]
    }

    #[test]
    fn test_maps_row_by_column_name() {
        assert!(Conf::descriptor().qualifies());
        let mapper = ConstructorRowMapper::for_type::<Conf>(&chain()).unwrap();
        let columns = columns();
        let values = vec![Value::Text("KEY".into()), Value::Null, Value::Integer(3)];
        let mapped = mapper.map_row(&Row::new(&columns, &values), 0).unwrap();
        assert_eq!(
            *mapped.downcast::<Conf>().unwrap(),
            Conf {
                key: "KEY".into(),
                value: None,
                count: 3
            }
        );
    }

    #[test]
    fn test_construction_failure_names_position() {
        let mapper = ConstructorRowMapper::for_type::<Conf>(&chain()).unwrap();
        let columns = columns();
        let values = vec![Value::Text("KEY".into()), Value::Null, Value::Null];
        let err = mapper.map_row(&Row::new(&columns, &values), 0).unwrap_err();
        match err {
            QueryError::Mapping(MappingError::Constructor { position, ref source, .. }) => {
                assert_eq!(position, 2);
                assert!(matches!(**source, MappingError::NullIntoNonNullable { .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let values = vec![Value::Text("KEY".into()), Value::Null, Value::Integer(i64::MAX)];
        let err = mapper.map_row(&Row::new(&columns, &values), 0).unwrap_err();
        assert!(err.to_string().contains("Incompatible numeric"));
    }

    #[test]
    fn test_descriptor_shape_rules() {
        let build = |_: ConstructorArgs| -> std::result::Result<AnyValue, MappingError> { Ok(Box::new(()) as AnyValue) };
        let unnamed = CompositeDescriptor::new(
            "Unnamed",
            vec![Constructor::new(
                vec![ConstructorParam::new(None, i32::type_ref(), &[])],
                build,
            )],
        );
        assert!(!unnamed.qualifies());
        assert!(unnamed.shape_violation().unwrap().contains("position 0"));
        assert!(ConstructorRowMapper::build(&unnamed, &chain())
            .err()
            .unwrap()
            .is_configuration());

        let empty = CompositeDescriptor::new("Empty", vec![Constructor::new(Vec::new(), build)]);
        assert!(!empty.qualifies());
        assert!(empty.shape_violation().unwrap().contains("at least one parameter"));

        let two = CompositeDescriptor::new(
            "Two",
            vec![
                Constructor::new(vec![ConstructorParam::new(Some("A"), i32::type_ref(), &[])], build),
                Constructor::new(vec![ConstructorParam::new(Some("B"), i32::type_ref(), &[])], build),
            ],
        );
        assert!(!two.qualifies());
        let err = ConstructorRowMapper::build(&two, &chain()).err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("exactly one constructor, found 2"));
    }

    #[test]
    fn test_missing_factory_is_configuration_error() {
        let err = ConstructorRowMapper::for_type::<Conf>(&ColumnMapperChain::empty())
            .err()
            .unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("at position 0"));
    }

    #[test]
    fn test_args_take_once() {
        let mut args = ConstructorArgs::new("T", vec![Box::new(1_i32)]);
        assert_eq!(args.len(), 1);
        assert!(args.take::<String>(0).is_err());
        let mut args = ConstructorArgs::new("T", vec![Box::new(1_i32)]);
        assert_eq!(args.take::<i32>(0).unwrap(), 1);
        assert!(args.take::<i32>(0).is_err());
    }
}

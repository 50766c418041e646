use super::{MappingError, Value};
use crate::mapper::{Composite, CompositeDescriptor};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

/// A type-erased value travelling between column mappers, constructors and callers.
pub type AnyValue = Box<dyn Any + Send>;

/// Marker asking JSON-aware plugins to treat a parameter or column as an encoded payload.
pub const AS_JSON: &str = "as_json";

/// Marker annotations attached to bind entries, constructor parameters and methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations(Vec<&'static str>);

impl Annotations {
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn new(markers: &[&'static str]) -> Self {
        Self(markers.to_vec())
    }

    pub fn with(mut self, marker: &'static str) -> Self {
        if !self.has(marker) {
            self.0.push(marker);
        }
        self
    }

    pub fn has(&self, marker: &str) -> bool {
        self.0.iter().any(|m| *m == marker)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().copied()
    }
}

impl From<&[&'static str]> for Annotations {
    fn from(markers: &[&'static str]) -> Self {
        Self::new(markers)
    }
}

/// Cache key of a declared type: nullable and non-nullable forms are distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    nullable: bool,
}

/// Enum support resolved at registration time.
#[derive(Clone, Copy)]
pub struct EnumCodec {
    variant_name: fn(&dyn Any) -> Option<&'static str>,
    from_name: fn(&str) -> Option<AnyValue>,
}

impl EnumCodec {
    /// Variant name of an enum value, `None` when `value` is not of the codec's type.
    pub fn variant_name(&self, value: &dyn Any) -> Option<&'static str> {
        (self.variant_name)(value)
    }

    pub fn from_name(&self, name: &str) -> Option<AnyValue> {
        (self.from_name)(name)
    }
}

#[derive(Clone, Copy)]
pub enum TypeKind {
    Plain,
    Enum(EnumCodec),
    Composite(fn() -> CompositeDescriptor),
}

#[derive(Clone, Copy)]
struct Nullability {
    none: fn() -> AnyValue,
    some: fn(AnyValue) -> Option<AnyValue>,
    peel: for<'a> fn(&'a dyn Any) -> Option<Option<&'a dyn Any>>,
}

/// Runtime descriptor of a declared Rust type.
///
/// `Option<T>` is described by `T`'s descriptor with nullability attached,
/// so plugins match on the inner type and never see the `Option` wrapper.
#[derive(Clone, Copy)]
pub struct TypeRef {
    id: TypeId,
    name: &'static str,
    kind: TypeKind,
    nullable: Option<Nullability>,
}

impl TypeRef {
    pub fn of<T: Any + Send>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: TypeKind::Plain,
            nullable: None,
        }
    }

    pub fn enumeration<E: SqlEnum>() -> Self {
        Self {
            kind: TypeKind::Enum(EnumCodec {
                variant_name: enum_variant_name::<E>,
                from_name: enum_from_name::<E>,
            }),
            ..Self::of::<E>()
        }
    }

    pub fn composite<C: Composite>() -> Self {
        Self {
            kind: TypeKind::Composite(C::descriptor),
            ..Self::of::<C>()
        }
    }

    /// Descriptor of `Option<T>`.
    pub fn nullable<T: SqlType>() -> Self {
        Self {
            nullable: Some(Nullability {
                none: none_of::<T>,
                some: some_of::<T>,
                peel: peel_option::<T>,
            }),
            ..T::type_ref()
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn key(&self) -> TypeKey {
        TypeKey {
            id: self.id,
            nullable: self.is_nullable(),
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable.is_some()
    }

    /// True when the (inner) type is `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    pub fn enum_codec(&self) -> Option<&EnumCodec> {
        match &self.kind {
            TypeKind::Enum(codec) => Some(codec),
            _ => None,
        }
    }

    pub fn composite_descriptor(&self) -> Option<CompositeDescriptor> {
        match self.kind {
            TypeKind::Composite(describe) => Some(describe()),
            _ => None,
        }
    }

    /// Strips the `Option` layer of an argument declared nullable.
    ///
    /// Returns `Ok(None)` for a `None` argument, `Err` with the expected type
    /// name when the argument is not an `Option` of the declared type.
    pub fn peel<'a>(&self, value: &'a dyn Any) -> std::result::Result<Option<&'a dyn Any>, &'static str> {
        match &self.nullable {
            Some(nullability) => (nullability.peel)(value).ok_or(self.name),
            None => Ok(Some(value)),
        }
    }

    /// Packs an extracted value into this type, wrapping it in `Some`/`None` when nullable.
    pub fn wrap(&self, value: Option<AnyValue>, column: &str) -> std::result::Result<AnyValue, MappingError> {
        match (&self.nullable, value) {
            (Some(nullability), None) => Ok((nullability.none)()),
            (Some(nullability), Some(inner)) => {
                (nullability.some)(inner).ok_or_else(|| MappingError::IncompatibleType {
                    column: column.to_string(),
                    target: self.name,
                    found: "value of another type",
                })
            }
            (None, Some(inner)) => Ok(inner),
            (None, None) => Err(MappingError::NullIntoNonNullable {
                column: column.to_string(),
                target: self.name,
            }),
        }
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            TypeKind::Plain => "plain",
            TypeKind::Enum(_) => "enum",
            TypeKind::Composite(_) => "composite",
        };
        if self.is_nullable() {
            write!(f, "Option<{}> ({})", self.name, kind)
        } else {
            write!(f, "{} ({})", self.name, kind)
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nullable() {
            write!(f, "Option<{}>", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

fn none_of<T: Any + Send>() -> AnyValue {
    Box::new(Option::<T>::None)
}

fn some_of<T: Any + Send>(value: AnyValue) -> Option<AnyValue> {
    value
        .downcast::<T>()
        .ok()
        .map(|inner| Box::new(Some(*inner)) as AnyValue)
}

fn peel_option<T: Any>(value: &dyn Any) -> Option<Option<&dyn Any>> {
    value
        .downcast_ref::<Option<T>>()
        .map(|opt| opt.as_ref().map(|inner| inner as &dyn Any))
}

fn enum_variant_name<E: SqlEnum>(value: &dyn Any) -> Option<&'static str> {
    value.downcast_ref::<E>().map(SqlEnum::variant_name)
}

fn enum_from_name<E: SqlEnum>(name: &str) -> Option<AnyValue> {
    E::from_variant_name(name).map(|variant| Box::new(variant) as AnyValue)
}

/// Maps a Rust type to the descriptor the chains resolve against.
pub trait SqlType: Any + Send {
    fn type_ref() -> TypeRef;
}

/// Fieldless enums stored by variant name.
pub trait SqlEnum: Any + Send + Sized {
    fn variant_name(&self) -> &'static str;

    fn from_variant_name(name: &str) -> Option<Self>;
}

/// Declares [`SqlType`] for types that are bound and read by plugins as opaque payloads.
#[macro_export]
macro_rules! impl_sql_type {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::SqlType for $ty {
                fn type_ref() -> $crate::TypeRef {
                    $crate::TypeRef::of::<$ty>()
                }
            }
        )+
    };
}

macro_rules! plain_sql_types {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl SqlType for $ty {
                fn type_ref() -> TypeRef {
                    TypeRef::of::<$ty>()
                }
            }
        )+
    };
}

plain_sql_types!(
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    bool,
    String,
    Vec<u8>,
    Value,
    NaiveDate,
    NaiveDateTime,
    DateTime<Utc>,
    Uuid,
    serde_json::Value,
);

impl<T: SqlType> SqlType for Option<T> {
    fn type_ref() -> TypeRef {
        TypeRef::nullable::<T>()
    }
}

impl<K: Any + Send, V: Any + Send, S: Any + Send> SqlType for HashMap<K, V, S> {
    fn type_ref() -> TypeRef {
        TypeRef::of::<Self>()
    }
}

impl<K: Any + Send, V: Any + Send> SqlType for BTreeMap<K, V> {
    fn type_ref() -> TypeRef {
        TypeRef::of::<Self>()
    }
}

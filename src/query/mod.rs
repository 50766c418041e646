mod variant;

use crate::core::{Annotations, QueryError, Result, SqlType, TypeRef};
use crate::mapper::RowMapperType;

pub use variant::resolve_query_text;

/// How a method's query text is to be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// Return the resolved text without executing it.
    Template,
    /// Decide between query and update from the return shape and the text.
    #[default]
    Execute,
    Select,
    Modifying,
    ModifyingWithReturn,
}

/// Query text and execution directives of a method.
#[derive(Debug, Clone)]
pub struct QueryMetadata {
    mode: QueryMode,
    default_text: String,
    overrides: Vec<(String, String)>,
    explicit_row_mapper: Option<RowMapperType>,
}

impl QueryMetadata {
    pub fn new(mode: QueryMode, default_text: impl Into<String>) -> Self {
        Self {
            mode,
            default_text: default_text.into(),
            overrides: Vec::new(),
            explicit_row_mapper: None,
        }
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    pub fn default_text(&self) -> &str {
        &self.default_text
    }

    pub fn overrides(&self) -> &[(String, String)] {
        &self.overrides
    }

    pub fn explicit_row_mapper(&self) -> Option<&RowMapperType> {
        self.explicit_row_mapper.as_ref()
    }

    /// Text to run against `backend`: its override if declared, the default otherwise.
    pub fn resolve_text(&self, backend: &str) -> &str {
        resolve_query_text(backend, &self.default_text, &self.overrides)
    }
}

/// One positional argument of a method.
#[derive(Debug, Clone)]
pub struct BindEntry {
    position: usize,
    bind_name: Option<String>,
    declared_type: TypeRef,
    annotations: Annotations,
}

impl BindEntry {
    pub fn new(position: usize, bind_name: Option<&str>, declared_type: TypeRef, annotations: Annotations) -> Self {
        Self {
            position,
            bind_name: bind_name.map(str::to_string),
            declared_type,
            annotations,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// `None` for control arguments that are not bound into the query.
    pub fn bind_name(&self) -> Option<&str> {
        self.bind_name.as_deref()
    }

    pub fn declared_type(&self) -> &TypeRef {
        &self.declared_type
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }
}

#[derive(Debug, Clone, Default)]
pub struct BindSpec {
    entries: Vec<BindEntry>,
}

impl BindSpec {
    pub fn push(&mut self, entry: BindEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[BindEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a method hands back to its caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReturnShape {
    AffectedRows,
    Single(TypeRef),
    List(TypeRef),
    Optional(TypeRef),
    /// Affected rows together with the generated key, coerced to the given type.
    GeneratedKey(TypeRef),
    /// The resolved query text.
    Text,
    /// The execution primitive itself.
    Executor,
}

impl ReturnShape {
    /// Element type of row-producing shapes.
    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            Self::Single(ty) | Self::List(ty) | Self::Optional(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::AffectedRows => "affected rows",
            Self::Single(_) => "a single value",
            Self::List(_) => "a list",
            Self::Optional(_) => "an optional value",
            Self::GeneratedKey(_) => "a generated key",
            Self::Text => "the query text",
            Self::Executor => "the executor",
        }
    }
}

/// Declaration of one repository method.
///
/// ```ignore
/// let find = QueryMethod::new("find_by_key", "SELECT * FROM conf WHERE conf_key = :key")
///     .bind::<String>("key")
///     .returns_optional::<Conf>();
/// ```
#[derive(Debug, Clone)]
pub struct QueryMethod {
    name: String,
    metadata: QueryMetadata,
    binds: BindSpec,
    returns: ReturnShape,
    annotations: Annotations,
    generated_key: Option<String>,
}

impl QueryMethod {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: QueryMetadata::new(QueryMode::Execute, text),
            binds: BindSpec::default(),
            returns: ReturnShape::AffectedRows,
            annotations: Annotations::none(),
            generated_key: None,
        }
    }

    /// Method returning its resolved text instead of executing it.
    pub fn template(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, text).mode(QueryMode::Template).returns(ReturnShape::Text)
    }

    /// Method handing back the underlying executor.
    pub fn executor(name: impl Into<String>) -> Self {
        Self::new(name, "").returns(ReturnShape::Executor)
    }

    pub fn mode(mut self, mode: QueryMode) -> Self {
        self.metadata.mode = mode;
        self
    }

    pub fn override_for(mut self, backend: impl Into<String>, text: impl Into<String>) -> Self {
        self.metadata.overrides.push((backend.into(), text.into()));
        self
    }

    pub fn row_mapper(mut self, mapper: RowMapperType) -> Self {
        self.metadata.explicit_row_mapper = Some(mapper);
        self
    }

    pub fn bind<T: SqlType>(self, name: &str) -> Self {
        self.bind_type(name, T::type_ref(), Annotations::none())
    }

    pub fn bind_annotated<T: SqlType>(self, name: &str, annotations: &[&'static str]) -> Self {
        self.bind_type(name, T::type_ref(), Annotations::new(annotations))
    }

    pub fn bind_type(mut self, name: &str, ty: TypeRef, annotations: Annotations) -> Self {
        let position = self.binds.len();
        self.binds
            .push(BindEntry::new(position, Some(name), ty, annotations));
        self
    }

    /// Argument taking a position without being bound into the query.
    pub fn control_arg<T: SqlType>(mut self) -> Self {
        let position = self.binds.len();
        self.binds
            .push(BindEntry::new(position, None, T::type_ref(), Annotations::none()));
        self
    }

    pub fn annotate(mut self, marker: &'static str) -> Self {
        self.annotations = self.annotations.with(marker);
        self
    }

    /// Names the key to report when the statement produces several.
    pub fn generated_key(mut self, name: impl Into<String>) -> Self {
        self.generated_key = Some(name.into());
        self
    }

    pub fn returns(mut self, shape: ReturnShape) -> Self {
        self.returns = shape;
        self
    }

    pub fn returns_single<E: SqlType>(self) -> Self {
        self.returns(ReturnShape::Single(E::type_ref()))
    }

    pub fn returns_list<E: SqlType>(self) -> Self {
        self.returns(ReturnShape::List(E::type_ref()))
    }

    pub fn returns_optional<E: SqlType>(self) -> Self {
        self.returns(ReturnShape::Optional(E::type_ref()))
    }

    pub fn returns_generated_key<K: SqlType>(self) -> Self {
        self.returns(ReturnShape::GeneratedKey(K::type_ref()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &QueryMetadata {
        &self.metadata
    }

    pub fn binds(&self) -> &BindSpec {
        &self.binds
    }

    pub fn return_shape(&self) -> &ReturnShape {
        &self.returns
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn generated_key_name(&self) -> Option<&str> {
        self.generated_key.as_deref()
    }
}

/// A named set of query methods, registered against a dispatcher as one repository.
#[derive(Debug, Clone)]
pub struct RepositoryContract {
    name: String,
    methods: Vec<QueryMethod>,
}

impl RepositoryContract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn register(&mut self, method: QueryMethod) -> Result<()> {
        if self.methods.iter().any(|m| m.name == method.name) {
            return Err(QueryError::Configuration(format!(
                "Method {} is declared twice in repository {}",
                method.name, self.name
            )));
        }
        self.methods.push(method);
        Ok(())
    }

    pub fn with(mut self, method: QueryMethod) -> Result<Self> {
        self.register(method)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method(&self, name: &str) -> Result<&QueryMethod> {
        self.methods.iter().find(|m| m.name == name).ok_or_else(|| {
            QueryError::Configuration(format!(
                "Repository {} has no method {}",
                self.name, name
            ))
        })
    }

    pub fn methods(&self) -> &[QueryMethod] {
        &self.methods
    }
}

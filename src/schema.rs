//! Tool schemas: the typed description of a tool's arguments and return value.
//!
//! Schemas are declared explicitly with [`ToolSchema::builder`]. Argument and
//! return types are [`TypeSpec`] values, either spelled out by hand or derived
//! from a Rust type through the [`Describe`] trait.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::{AgentError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    List,
    Tuple,
    Set,
    FrozenSet,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::List => "list",
            CollectionKind::Tuple => "tuple",
            CollectionKind::Set => "set",
            CollectionKind::FrozenSet => "frozenset",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Scalar(String),
    Literal(Vec<Value>),
    Collection {
        kind: CollectionKind,
        elements: Vec<TypeSpec>,
    },
    Mapping {
        key: Box<TypeSpec>,
        value: Box<TypeSpec>,
    },
}

/// Recursive description of an argument or return type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    kind: TypeKind,
    description: Option<String>,
}

impl TypeSpec {
    fn from_kind(kind: TypeKind) -> Self {
        Self {
            kind,
            description: None,
        }
    }

    pub fn scalar(name: impl Into<String>) -> Self {
        Self::from_kind(TypeKind::Scalar(name.into()))
    }

    /// The untyped scalar used when no return type is declared.
    pub fn any() -> Self {
        Self::scalar("Any")
    }

    /// A restricted choice. Duplicate values are dropped, first occurrence wins.
    pub fn literal<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut allowed: Vec<Value> = Vec::new();
        for value in values.into_iter().map(Into::into) {
            if !allowed.contains(&value) {
                allowed.push(value);
            }
        }
        Self::from_kind(TypeKind::Literal(allowed))
    }

    pub fn collection(kind: CollectionKind, elements: Vec<TypeSpec>) -> Self {
        Self::from_kind(TypeKind::Collection { kind, elements })
    }

    pub fn list(element: TypeSpec) -> Self {
        Self::collection(CollectionKind::List, vec![element])
    }

    pub fn set(element: TypeSpec) -> Self {
        Self::collection(CollectionKind::Set, vec![element])
    }

    pub fn tuple(elements: Vec<TypeSpec>) -> Self {
        Self::collection(CollectionKind::Tuple, elements)
    }

    pub fn mapping(key: TypeSpec, value: TypeSpec) -> Self {
        Self::from_kind(TypeKind::Mapping {
            key: Box::new(key),
            value: Box::new(value),
        })
    }

    /// Resolves a Rust type that implements [`Describe`].
    pub fn of<T: Describe + ?Sized>() -> Self {
        T::type_spec()
    }

    /// Resolves any Rust type by its declared name, e.g. `my_crate::Point` becomes `Point`.
    ///
    /// Generic arguments are kept verbatim, so `Wrapper<u8>` stays `Wrapper<u8>`.
    /// Tuples, slices, references and pointers keep their full type name.
    pub fn named<T: ?Sized>() -> Self {
        let full = std::any::type_name::<T>();
        if !full.starts_with(|c: char| c.is_alphabetic() || c == '_') {
            return Self::scalar(full);
        }
        let head = full.split('<').next().unwrap_or(full);
        let short = match head.rfind("::") {
            Some(idx) => &full[idx + 2..],
            None => full,
        };
        if short.is_empty() {
            Self::scalar(full)
        } else {
            Self::scalar(short)
        }
    }

    /// Attaches a free-text description to this type.
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn serialize_fields<M: SerializeMap>(&self, map: &mut M) -> std::result::Result<(), M::Error> {
        match &self.kind {
            TypeKind::Scalar(name) => map.serialize_entry("type", name)?,
            TypeKind::Literal(values) => {
                map.serialize_entry("type", "Literal")?;
                map.serialize_entry("values", values)?;
            }
            TypeKind::Collection { kind, elements } => {
                map.serialize_entry("type", kind.as_str())?;
                map.serialize_entry("elements", elements)?;
            }
            TypeKind::Mapping { key, value } => {
                map.serialize_entry("type", "dict")?;
                map.serialize_entry("key_type", key)?;
                map.serialize_entry("value_type", value)?;
            }
        }
        if let Some(description) = &self.description {
            map.serialize_entry("description", description)?;
        }
        Ok(())
    }
}

impl Serialize for TypeSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        self.serialize_fields(&mut map)?;
        map.end()
    }
}

/// Maps a Rust type onto the [`TypeSpec`] the model is shown.
pub trait Describe {
    fn type_spec() -> TypeSpec;
}

macro_rules! describe_scalar {
    ($name:literal => $($ty:ty),+) => {
        $(
            impl Describe for $ty {
                fn type_spec() -> TypeSpec {
                    TypeSpec::scalar($name)
                }
            }
        )+
    };
}

describe_scalar!("str" => String, str, char);
describe_scalar!("int" => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
describe_scalar!("float" => f32, f64);
describe_scalar!("bool" => bool);
describe_scalar!("Any" => Value);
describe_scalar!("None" => ());

impl<T: Describe + ?Sized> Describe for &T {
    fn type_spec() -> TypeSpec {
        T::type_spec()
    }
}

impl<T: Describe> Describe for Option<T> {
    fn type_spec() -> TypeSpec {
        T::type_spec()
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn type_spec() -> TypeSpec {
        TypeSpec::list(T::type_spec())
    }
}

impl<T: Describe> Describe for [T] {
    fn type_spec() -> TypeSpec {
        TypeSpec::list(T::type_spec())
    }
}

impl<T: Describe> Describe for HashSet<T> {
    fn type_spec() -> TypeSpec {
        TypeSpec::set(T::type_spec())
    }
}

impl<T: Describe> Describe for BTreeSet<T> {
    fn type_spec() -> TypeSpec {
        TypeSpec::set(T::type_spec())
    }
}

impl<K: Describe, V: Describe> Describe for HashMap<K, V> {
    fn type_spec() -> TypeSpec {
        TypeSpec::mapping(K::type_spec(), V::type_spec())
    }
}

impl<K: Describe, V: Describe> Describe for BTreeMap<K, V> {
    fn type_spec() -> TypeSpec {
        TypeSpec::mapping(K::type_spec(), V::type_spec())
    }
}

macro_rules! describe_tuple {
    ($($name:ident),+) => {
        impl<$($name: Describe),+> Describe for ($($name,)+) {
            fn type_spec() -> TypeSpec {
                TypeSpec::tuple(vec![$($name::type_spec()),+])
            }
        }
    };
}

describe_tuple!(A);
describe_tuple!(A, B);
describe_tuple!(A, B, C);
describe_tuple!(A, B, C, D);

/// A single named parameter of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    type_spec: TypeSpec,
    default: Option<Value>,
}

impl ArgumentSpec {
    pub fn required(type_spec: TypeSpec) -> Self {
        Self {
            type_spec,
            default: None,
        }
    }

    pub fn optional(type_spec: TypeSpec, default: impl Into<Value>) -> Self {
        Self {
            type_spec,
            default: Some(default.into()),
        }
    }

    pub fn type_spec(&self) -> &TypeSpec {
        &self.type_spec
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// An argument is required exactly when it carries no default.
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

impl Serialize for ArgumentSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        self.type_spec.serialize_fields(&mut map)?;
        map.serialize_entry("default", &self.default)?;
        map.serialize_entry("required", &self.is_required())?;
        map.end()
    }
}

/// Immutable description of one registered tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSchema {
    name: String,
    description: Option<String>,
    arguments: Vec<(String, ArgumentSpec)>,
    returns: TypeSpec,
}

impl ToolSchema {
    pub fn builder(name: impl Into<String>) -> ToolSchemaBuilder {
        ToolSchemaBuilder {
            name: name.into(),
            description: None,
            arguments: Vec::new(),
            returns: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Arguments in declaration order.
    pub fn arguments(&self) -> impl Iterator<Item = (&str, &ArgumentSpec)> + '_ {
        self.arguments
            .iter()
            .map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn argument(&self, name: &str) -> Option<&ArgumentSpec> {
        self.arguments
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, spec)| spec)
    }

    pub fn required_arguments(&self) -> impl Iterator<Item = &str> + '_ {
        self.arguments()
            .filter(|(_, spec)| spec.is_required())
            .map(|(name, _)| name)
    }

    pub fn return_type(&self) -> &TypeSpec {
        &self.returns
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

struct OrderedArguments<'a>(&'a [(String, ArgumentSpec)]);

impl Serialize for OrderedArguments<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, spec) in self.0 {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

impl Serialize for ToolSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("description", &self.description)?;
        map.serialize_entry("arguments", &OrderedArguments(&self.arguments))?;
        map.serialize_entry("return", &self.returns)?;
        map.end()
    }
}

pub struct ToolSchemaBuilder {
    name: String,
    description: Option<String>,
    arguments: Vec<(String, ArgumentSpec)>,
    returns: Option<TypeSpec>,
}

impl ToolSchemaBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn argument(mut self, name: impl Into<String>, spec: ArgumentSpec) -> Self {
        self.arguments.push((name.into(), spec));
        self
    }

    pub fn required(self, name: impl Into<String>, type_spec: TypeSpec) -> Self {
        self.argument(name, ArgumentSpec::required(type_spec))
    }

    pub fn optional(
        self,
        name: impl Into<String>,
        type_spec: TypeSpec,
        default: impl Into<Value>,
    ) -> Self {
        self.argument(name, ArgumentSpec::optional(type_spec, default))
    }

    /// Shorthand for a required argument typed from a Rust type.
    pub fn param<T: Describe + ?Sized>(self, name: impl Into<String>) -> Self {
        self.required(name, T::type_spec())
    }

    pub fn returns(mut self, type_spec: TypeSpec) -> Self {
        self.returns = Some(type_spec);
        self
    }

    pub fn build(self) -> Result<ToolSchema> {
        self.check()?;
        Ok(self.finish())
    }

    /// Builds without checks, for built-in schemas known to be well formed.
    pub(crate) fn finish(self) -> ToolSchema {
        ToolSchema {
            name: self.name,
            description: self.description.map(|d| d.trim().to_string()),
            arguments: self.arguments,
            returns: self.returns.unwrap_or_else(TypeSpec::any),
        }
    }

    fn check(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AgentError::InvalidSchema("tool name cannot be empty".into()));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(AgentError::InvalidSchema(format!(
                "tool name `{}` cannot contain whitespace",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for (argument, _) in &self.arguments {
            if argument.trim().is_empty() {
                return Err(AgentError::InvalidSchema(format!(
                    "tool `{}` declares an argument with an empty name",
                    self.name
                )));
            }
            if !seen.insert(argument.as_str()) {
                return Err(AgentError::InvalidSchema(format!(
                    "tool `{}` declares argument `{argument}` more than once",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn described_type_keeps_inner_type() {
        let spec = TypeSpec::of::<String>().describe("JSON string representing latitude and longitude");
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({
                "type": "str",
                "description": "JSON string representing latitude and longitude"
            })
        );
    }

    #[test]
    fn literal_lists_allowed_values_once() {
        let spec = TypeSpec::literal(["celsius", "fahrenheit", "celsius"]);
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({"type": "Literal", "values": ["celsius", "fahrenheit"]})
        );
    }

    #[test]
    fn nested_collections_resolve_recursively() {
        let spec = TypeSpec::of::<HashMap<String, Vec<(i32, f64)>>>();
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({
                "type": "dict",
                "key_type": {"type": "str"},
                "value_type": {
                    "type": "list",
                    "elements": [{
                        "type": "tuple",
                        "elements": [{"type": "int"}, {"type": "float"}]
                    }]
                }
            })
        );
    }

    #[test]
    fn unknown_types_fall_back_to_their_name() {
        struct Point;
        assert_eq!(TypeSpec::named::<Point>(), TypeSpec::scalar("Point"));
        assert_eq!(TypeSpec::named::<u8>(), TypeSpec::scalar("u8"));
    }

    #[test]
    fn compound_types_keep_their_full_name() {
        struct Point;
        let tuple = std::any::type_name::<(Point, u8)>();
        assert!(tuple.starts_with('('));
        assert_eq!(TypeSpec::named::<(Point, u8)>(), TypeSpec::scalar(tuple));
        assert_eq!(TypeSpec::named::<[u8]>(), TypeSpec::scalar("[u8]"));

        let slice = std::any::type_name::<[Point]>();
        assert_eq!(TypeSpec::named::<[Point]>(), TypeSpec::scalar(slice));
        assert!(slice.ends_with("Point]"));
        assert_eq!(
            TypeSpec::named::<&str>(),
            TypeSpec::scalar(std::any::type_name::<&str>())
        );
    }

    #[test]
    fn required_tracks_absence_of_default() {
        let schema = ToolSchema::builder("search")
            .description("Search the web.")
            .param::<str>("query")
            .optional("num_results", TypeSpec::of::<i64>(), 10)
            .returns(TypeSpec::of::<String>())
            .build()
            .unwrap();

        let required: Vec<&str> = schema.required_arguments().collect();
        assert_eq!(required, vec!["query"]);
        assert_eq!(
            schema.to_json(),
            json!({
                "name": "search",
                "description": "Search the web.",
                "arguments": {
                    "query": {"type": "str", "default": null, "required": true},
                    "num_results": {"type": "int", "default": 10, "required": false}
                },
                "return": {"type": "str"}
            })
        );
    }

    #[test]
    fn missing_return_type_is_untyped() {
        let schema = ToolSchema::builder("noop").build().unwrap();
        assert_eq!(schema.return_type(), &TypeSpec::any());
        assert_eq!(schema.description(), None);
    }

    #[test]
    fn serialization_keeps_declaration_order() {
        let schema = ToolSchema::builder("weather")
            .param::<f64>("latitude")
            .param::<f64>("longitude")
            .build()
            .unwrap();
        let rendered = serde_json::to_string(&schema).unwrap();
        let lat = rendered.find("latitude").unwrap();
        let lon = rendered.find("longitude").unwrap();
        assert!(lat < lon);
    }

    #[test]
    fn rejects_duplicate_arguments() {
        let err = ToolSchema::builder("dup")
            .param::<str>("x")
            .param::<i32>("x")
            .build()
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidSchema(_)));
    }

    #[test]
    fn rejects_blank_names() {
        assert!(ToolSchema::builder("  ").build().is_err());
        assert!(ToolSchema::builder("two words").build().is_err());
    }
}

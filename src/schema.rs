use crate::pointer;
use crate::value;
use regex::Regex;
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;
use std::sync::{Arc, OnceLock, Weak};

/// Subschemas are shared handles so the resolver can bind `$ref` targets as
/// weak references without making the owning tree cyclic.
pub type SchemaRef = Arc<Schema>;

/// One of the seven JSON Schema type names. `Integer` is a subtype of
/// `Number`: a JSON number with a zero fractional part matches both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Type {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    String,
    Integer,
}

impl FromStr for Type {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "null" => Ok(Self::Null),
            "boolean" => Ok(Self::Boolean),
            "object" => Ok(Self::Object),
            "array" => Ok(Self::Array),
            "number" => Ok(Self::Number),
            "string" => Ok(Self::String),
            "integer" => Ok(Self::Integer),
            _ => Err(()),
        }
    }
}

impl Type {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Number => "number",
            Self::String => "string",
            Self::Integer => "integer",
        }
    }

    pub fn matches(&self, instance: &Value) -> bool {
        match self {
            Self::Null => instance.is_null(),
            Self::Boolean => instance.is_boolean(),
            Self::Object => instance.is_object(),
            Self::Array => instance.is_array(),
            Self::Number => instance.is_number(),
            Self::String => instance.is_string(),
            Self::Integer => match instance {
                Value::Number(n) => value::is_integer_number(n),
                _ => false,
            },
        }
    }
}

/// An anchor registered under a base schema by `$anchor` or
/// `$dynamicAnchor`.
#[derive(Clone, Debug)]
pub(crate) struct Anchor {
    pub schema: Weak<Schema>,
    pub dynamic: bool,
}

/// Fields the resolver computes per node. Each is written exactly once
/// during resolution and only read afterwards, so a `Resolved` can be
/// shared across threads.
#[derive(Debug, Default)]
pub(crate) struct Computed {
    pub path: OnceLock<String>,
    pub uri: OnceLock<String>,
    pub base: OnceLock<Weak<Schema>>,
    pub resolved_ref: OnceLock<Weak<Schema>>,
    pub resolved_dynamic_ref: OnceLock<Weak<Schema>>,
    pub dynamic_ref_anchor: OnceLock<String>,
    pub anchors: OnceLock<HashMap<String, Anchor>>,
    pub pattern: OnceLock<Regex>,
    pub pattern_properties: OnceLock<Vec<(Regex, SchemaRef)>>,
    pub required: OnceLock<HashSet<String>>,
}

// Resolver caches are derived data, not part of a schema's identity, so
// they never participate in equality.
impl PartialEq for Computed {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// A JSON Schema (draft 2020-12) node.
///
/// The boolean schema `true` is the empty `Schema`; `false` is
/// `{"not": {}}`. `type_` and `types` are mutually exclusive, as are `defs`
/// and `definitions` (the deprecated synonym); the resolver rejects schemas
/// that set both.
#[derive(Debug, Default, PartialEq)]
pub struct Schema {
    // Identity and reference keywords.
    pub id: Option<String>,
    pub schema_: Option<String>,
    pub ref_: Option<String>,
    pub dynamic_ref: Option<String>,
    pub anchor: Option<String>,
    pub dynamic_anchor: Option<String>,
    pub defs: Option<BTreeMap<String, SchemaRef>>,
    pub definitions: Option<BTreeMap<String, SchemaRef>>,
    pub vocabulary: Option<BTreeMap<String, bool>>,
    pub comment: Option<String>,

    // Annotative keywords.
    pub title: Option<String>,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub deprecated: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub examples: Option<Vec<Value>>,

    // Validation keywords.
    pub type_: Option<Type>,
    pub types: Option<Vec<Type>>,
    pub const_: Option<Box<Value>>,
    pub enum_: Option<Vec<Value>>,
    pub multiple_of: Option<Number>,
    pub minimum: Option<Number>,
    pub maximum: Option<Number>,
    pub exclusive_minimum: Option<Number>,
    pub exclusive_maximum: Option<Number>,
    pub min_length: Option<i32>,
    pub max_length: Option<i32>,
    pub pattern: Option<String>,

    // Array keywords.
    pub prefix_items: Option<Vec<SchemaRef>>,
    pub items: Option<SchemaRef>,
    pub contains: Option<SchemaRef>,
    pub min_contains: Option<i32>,
    pub max_contains: Option<i32>,
    pub min_items: Option<i32>,
    pub max_items: Option<i32>,
    pub unique_items: bool,
    pub unevaluated_items: Option<SchemaRef>,

    // Object keywords.
    pub properties: Option<BTreeMap<String, SchemaRef>>,
    pub pattern_properties: Option<BTreeMap<String, SchemaRef>>,
    pub additional_properties: Option<SchemaRef>,
    pub property_names: Option<SchemaRef>,
    pub min_properties: Option<i32>,
    pub max_properties: Option<i32>,
    pub required: Option<Vec<String>>,
    pub dependent_required: Option<BTreeMap<String, Vec<String>>>,
    pub dependent_schemas: Option<BTreeMap<String, SchemaRef>>,
    pub unevaluated_properties: Option<SchemaRef>,

    // Composition keywords.
    pub all_of: Option<Vec<SchemaRef>>,
    pub any_of: Option<Vec<SchemaRef>>,
    pub one_of: Option<Vec<SchemaRef>>,
    pub not: Option<SchemaRef>,
    pub if_: Option<SchemaRef>,
    pub then: Option<SchemaRef>,
    pub else_: Option<SchemaRef>,

    // Recorded but never enforced.
    pub format: Option<String>,
    pub content_encoding: Option<String>,
    pub content_media_type: Option<String>,
    pub content_schema: Option<SchemaRef>,

    pub(crate) computed: Computed,
}

impl Schema {
    /// The node's position in its tree, as assigned by the resolver
    /// (`root`, then `root/<pointer tokens>`). `None` before resolution.
    pub fn path(&self) -> Option<&str> {
        self.computed.path.get().map(String::as_str)
    }

    /// The canonical absolute URI. Set only on root and `$id`-bearing
    /// nodes.
    pub fn uri(&self) -> Option<&str> {
        self.computed.uri.get().map(String::as_str)
    }

    /// The nearest enclosing schema that is the root or carries `$id`.
    pub fn base(&self) -> Option<SchemaRef> {
        self.computed.base.get().and_then(Weak::upgrade)
    }

    /// The schema `$ref` was bound to by the resolver.
    pub fn resolved_ref(&self) -> Option<SchemaRef> {
        self.computed.resolved_ref.get().and_then(Weak::upgrade)
    }

    /// The schema `$dynamicRef` was statically bound to. Unset when the
    /// reference targets a dynamic anchor; then
    /// [`dynamic_ref_anchor`][Self::dynamic_ref_anchor] holds the name to
    /// look up in the dynamic scope at validation time.
    pub fn resolved_dynamic_ref(&self) -> Option<SchemaRef> {
        self.computed
            .resolved_dynamic_ref
            .get()
            .and_then(Weak::upgrade)
    }

    pub fn dynamic_ref_anchor(&self) -> Option<&str> {
        self.computed.dynamic_ref_anchor.get().map(String::as_str)
    }

    pub(crate) fn anchors(&self) -> Option<&HashMap<String, Anchor>> {
        self.computed.anchors.get()
    }

    pub(crate) fn compiled_pattern(&self) -> Option<&Regex> {
        self.computed.pattern.get()
    }

    pub(crate) fn compiled_pattern_properties(&self) -> Option<&[(Regex, SchemaRef)]> {
        self.computed.pattern_properties.get().map(Vec::as_slice)
    }

    pub(crate) fn is_required(&self, name: &str) -> bool {
        match self.computed.required.get() {
            Some(set) => set.contains(name),
            None => self
                .required
                .as_ref()
                .map_or(false, |r| r.iter().any(|n| n == name)),
        }
    }

    /// Every direct subschema, paired with its JSON Pointer token(s)
    /// relative to this node.
    pub(crate) fn children(&self) -> Vec<(String, &SchemaRef)> {
        fn one<'a>(out: &mut Vec<(String, &'a SchemaRef)>, kw: &str, s: &'a Option<SchemaRef>) {
            if let Some(s) = s {
                out.push((kw.to_owned(), s));
            }
        }

        fn list<'a>(
            out: &mut Vec<(String, &'a SchemaRef)>,
            kw: &str,
            s: &'a Option<Vec<SchemaRef>>,
        ) {
            if let Some(items) = s {
                for (i, item) in items.iter().enumerate() {
                    out.push((format!("{}/{}", kw, i), item));
                }
            }
        }

        fn map<'a>(
            out: &mut Vec<(String, &'a SchemaRef)>,
            kw: &str,
            s: &'a Option<BTreeMap<String, SchemaRef>>,
        ) {
            if let Some(entries) = s {
                for (key, entry) in entries {
                    out.push((format!("{}/{}", kw, pointer::escape(key)), entry));
                }
            }
        }

        let mut out = Vec::new();
        map(&mut out, "$defs", &self.defs);
        map(&mut out, "definitions", &self.definitions);
        list(&mut out, "prefixItems", &self.prefix_items);
        one(&mut out, "items", &self.items);
        one(&mut out, "contains", &self.contains);
        one(&mut out, "unevaluatedItems", &self.unevaluated_items);
        map(&mut out, "properties", &self.properties);
        map(&mut out, "patternProperties", &self.pattern_properties);
        one(&mut out, "additionalProperties", &self.additional_properties);
        one(&mut out, "propertyNames", &self.property_names);
        map(&mut out, "dependentSchemas", &self.dependent_schemas);
        one(&mut out, "unevaluatedProperties", &self.unevaluated_properties);
        list(&mut out, "allOf", &self.all_of);
        list(&mut out, "anyOf", &self.any_of);
        list(&mut out, "oneOf", &self.one_of);
        one(&mut out, "not", &self.not);
        one(&mut out, "if", &self.if_);
        one(&mut out, "then", &self.then);
        one(&mut out, "else", &self.else_);
        one(&mut out, "contentSchema", &self.content_schema);
        out
    }
}

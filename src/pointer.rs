//! RFC 6901 JSON Pointer evaluation over a schema tree.
//!
//! Traversal is table-driven: each keyword is registered once with its
//! structural kind (single subschema, slice of subschemas, map of
//! subschemas, or a non-schema value) rather than re-derived per lookup.

use crate::schema::{Schema, SchemaRef};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PointerError {
    #[error("pointer {0:?} must be empty or begin with '/'")]
    Malformed(String),
    #[error("no schema member {0:?}")]
    MissingMember(String),
    #[error("array index \"-\" is unsupported")]
    UnsupportedIndex,
    #[error("array index {0:?} has a leading zero")]
    LeadingZero(String),
    #[error("array index {0:?} is not a decimal integer")]
    InvalidIndex(String),
    #[error("array index {0} is out of range")]
    OutOfRange(usize),
    #[error("segment {0:?} navigated to a non-schema value")]
    NotASchema(String),
    #[error("segment {0:?} navigated to nil")]
    Nil(String),
    #[error("pointer resolves to a null schema reference")]
    NullTarget,
}

enum Field {
    One(fn(&Schema) -> Option<&SchemaRef>),
    List(fn(&Schema) -> Option<&Vec<SchemaRef>>),
    Map(fn(&Schema) -> Option<&BTreeMap<String, SchemaRef>>),
    Strings(fn(&Schema) -> Option<&Vec<String>>),
    // Keyword exists but holds no subschema; navigating into it yields nil.
    Scalar,
}

// "type" is listed as Scalar: it stands for whichever of the two type
// fields is populated, and neither holds a subschema.
static FIELDS: &[(&str, Field)] = &[
    ("$id", Field::Scalar),
    ("$schema", Field::Scalar),
    ("$ref", Field::Scalar),
    ("$dynamicRef", Field::Scalar),
    ("$anchor", Field::Scalar),
    ("$dynamicAnchor", Field::Scalar),
    ("$defs", Field::Map(|s| s.defs.as_ref())),
    ("definitions", Field::Map(|s| s.definitions.as_ref())),
    ("$vocabulary", Field::Scalar),
    ("$comment", Field::Scalar),
    ("title", Field::Scalar),
    ("description", Field::Scalar),
    ("default", Field::Scalar),
    ("deprecated", Field::Scalar),
    ("readOnly", Field::Scalar),
    ("writeOnly", Field::Scalar),
    ("examples", Field::Scalar),
    ("type", Field::Scalar),
    ("const", Field::Scalar),
    ("enum", Field::Scalar),
    ("multipleOf", Field::Scalar),
    ("minimum", Field::Scalar),
    ("maximum", Field::Scalar),
    ("exclusiveMinimum", Field::Scalar),
    ("exclusiveMaximum", Field::Scalar),
    ("minLength", Field::Scalar),
    ("maxLength", Field::Scalar),
    ("pattern", Field::Scalar),
    ("prefixItems", Field::List(|s| s.prefix_items.as_ref())),
    ("items", Field::One(|s| s.items.as_ref())),
    ("contains", Field::One(|s| s.contains.as_ref())),
    ("minContains", Field::Scalar),
    ("maxContains", Field::Scalar),
    ("minItems", Field::Scalar),
    ("maxItems", Field::Scalar),
    ("uniqueItems", Field::Scalar),
    ("unevaluatedItems", Field::One(|s| s.unevaluated_items.as_ref())),
    ("properties", Field::Map(|s| s.properties.as_ref())),
    ("patternProperties", Field::Map(|s| s.pattern_properties.as_ref())),
    ("additionalProperties", Field::One(|s| s.additional_properties.as_ref())),
    ("propertyNames", Field::One(|s| s.property_names.as_ref())),
    ("minProperties", Field::Scalar),
    ("maxProperties", Field::Scalar),
    ("required", Field::Strings(|s| s.required.as_ref())),
    ("dependentRequired", Field::Scalar),
    ("dependentSchemas", Field::Map(|s| s.dependent_schemas.as_ref())),
    ("unevaluatedProperties", Field::One(|s| s.unevaluated_properties.as_ref())),
    ("allOf", Field::List(|s| s.all_of.as_ref())),
    ("anyOf", Field::List(|s| s.any_of.as_ref())),
    ("oneOf", Field::List(|s| s.one_of.as_ref())),
    ("not", Field::One(|s| s.not.as_ref())),
    ("if", Field::One(|s| s.if_.as_ref())),
    ("then", Field::One(|s| s.then.as_ref())),
    ("else", Field::One(|s| s.else_.as_ref())),
    ("format", Field::Scalar),
    ("contentEncoding", Field::Scalar),
    ("contentMediaType", Field::Scalar),
    ("contentSchema", Field::One(|s| s.content_schema.as_ref())),
];

enum Loc<'a> {
    Schema(&'a SchemaRef),
    List(&'a [SchemaRef]),
    Map(&'a BTreeMap<String, SchemaRef>),
    Strings(&'a [String]),
    Nil,
}

/// Resolves `pointer` against `root`, returning the pointed-to schema.
pub fn evaluate(root: &SchemaRef, pointer: &str) -> Result<SchemaRef, PointerError> {
    if pointer.is_empty() {
        return Ok(root.clone());
    }
    if !pointer.starts_with('/') {
        return Err(PointerError::Malformed(pointer.to_owned()));
    }

    let mut current = Loc::Schema(root);
    for raw in pointer[1..].split('/') {
        let token = unescape(raw);
        current = step(current, &token)?;
    }

    match current {
        Loc::Schema(s) => Ok(s.clone()),
        Loc::Nil => Err(PointerError::NullTarget),
        _ => Err(PointerError::NotASchema(pointer.to_owned())),
    }
}

fn step<'a>(loc: Loc<'a>, token: &str) -> Result<Loc<'a>, PointerError> {
    match loc {
        Loc::Schema(schema) => {
            for (name, field) in FIELDS {
                if *name != token {
                    continue;
                }
                return Ok(match field {
                    Field::One(get) => match get(schema) {
                        Some(child) => Loc::Schema(child),
                        None => Loc::Nil,
                    },
                    Field::List(get) => match get(schema) {
                        Some(items) => Loc::List(items),
                        None => Loc::Nil,
                    },
                    Field::Map(get) => match get(schema) {
                        Some(entries) => Loc::Map(entries),
                        None => Loc::Nil,
                    },
                    Field::Strings(get) => match get(schema) {
                        Some(items) => Loc::Strings(items),
                        None => Loc::Nil,
                    },
                    Field::Scalar => Loc::Nil,
                });
            }
            Err(PointerError::MissingMember(token.to_owned()))
        }
        Loc::List(items) => {
            let i = parse_index(token)?;
            items
                .get(i)
                .map(Loc::Schema)
                .ok_or(PointerError::OutOfRange(i))
        }
        Loc::Strings(items) => {
            let i = parse_index(token)?;
            if i < items.len() {
                Err(PointerError::NotASchema(token.to_owned()))
            } else {
                Err(PointerError::OutOfRange(i))
            }
        }
        Loc::Map(entries) => entries
            .get(token)
            .map(Loc::Schema)
            .ok_or_else(|| PointerError::MissingMember(token.to_owned())),
        Loc::Nil => Err(PointerError::Nil(token.to_owned())),
    }
}

fn parse_index(token: &str) -> Result<usize, PointerError> {
    if token == "-" {
        return Err(PointerError::UnsupportedIndex);
    }
    if token.len() > 1 && token.starts_with('0') {
        return Err(PointerError::LeadingZero(token.to_owned()));
    }
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PointerError::InvalidIndex(token.to_owned()));
    }
    token
        .parse()
        .map_err(|_| PointerError::InvalidIndex(token.to_owned()))
}

/// Replaces `~1` with `/`, then `~0` with `~`. The order matters: doing it
/// the other way round would turn `~01` into `/`.
pub(crate) fn unescape(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

pub(crate) fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn root() -> SchemaRef {
        let inner = Arc::new(Schema {
            type_: Some(crate::Type::String),
            ..Default::default()
        });
        let escaped = Arc::new(Schema::default());
        Arc::new(Schema {
            defs: Some(
                vec![("A".to_owned(), inner), ("/~".to_owned(), escaped)]
                    .into_iter()
                    .collect(),
            ),
            required: Some(vec!["x".to_owned()]),
            min_items: Some(1),
            ..Default::default()
        })
    }

    #[test]
    fn empty_pointer_is_root() {
        let r = root();
        assert!(Arc::ptr_eq(&r, &evaluate(&r, "").unwrap()));
    }

    #[test]
    fn member_lookup() {
        let r = root();
        let target = evaluate(&r, "/$defs/A").unwrap();
        assert_eq!(Some(crate::Type::String), target.type_);
    }

    #[test]
    fn unescaping_order() {
        let r = root();
        assert!(evaluate(&r, "/$defs/~1~0").is_ok());
    }

    #[test]
    fn malformed() {
        let r = root();
        assert_eq!(
            Err(PointerError::Malformed("$defs/A".to_owned())),
            evaluate(&r, "$defs/A")
        );
    }

    #[test]
    fn index_errors() {
        let r = root();
        assert_eq!(Err(PointerError::UnsupportedIndex), evaluate(&r, "/required/-"));
        assert_eq!(
            Err(PointerError::LeadingZero("01".to_owned())),
            evaluate(&r, "/required/01")
        );
        assert_eq!(
            Err(PointerError::NotASchema("0".to_owned())),
            evaluate(&r, "/required/0")
        );
    }

    #[test]
    fn scalar_keyword_navigates_to_nil() {
        let r = root();
        assert_eq!(
            Err(PointerError::Nil("x".to_owned())),
            evaluate(&r, "/minItems/x")
        );
    }

    #[test]
    fn missing_member() {
        let r = root();
        assert_eq!(
            Err(PointerError::MissingMember("B".to_owned())),
            evaluate(&r, "/$defs/B")
        );
        assert_eq!(
            Err(PointerError::MissingMember("bogus".to_owned())),
            evaluate(&r, "/bogus")
        );
    }

    #[test]
    fn absent_field_is_null_target() {
        let r = root();
        assert_eq!(Err(PointerError::NullTarget), evaluate(&r, "/items"));
    }
}

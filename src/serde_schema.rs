use crate::schema::{Schema, SchemaRef, Type};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::sync::Arc;
use thiserror::Error;

/// A JSON representation of JSON Schema (draft 2020-12) schemas, compatible
/// with `serde_json`.
///
/// To convert this into a [`Schema`][`crate::Schema`], see
/// [`Schema::from_serde_schema`][`crate::Schema::from_serde_schema`].
///
/// A schema document is either a boolean or an object of keywords; unknown
/// members are silently dropped on read.
///
/// ```
/// use jschema::{SerdeSchema, SerdeSchemaObject};
/// use serde_json::json;
///
/// assert_eq!(
///     SerdeSchema::Object(Box::new(SerdeSchemaObject {
///         type_: Some(jschema::SerdeType::Single("integer".to_owned())),
///         ..Default::default()
///     })),
///     serde_json::from_value::<SerdeSchema>(json!({ "type": "integer" })).unwrap()
/// )
/// ```
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum SerdeSchema {
    Bool(bool),
    Object(Box<SerdeSchemaObject>),
}

impl Default for SerdeSchema {
    fn default() -> Self {
        SerdeSchema::Object(Box::new(SerdeSchemaObject::default()))
    }
}

/// The `"type"` member accepts a single type name or an array of names.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum SerdeType {
    Single(String),
    List(Vec<String>),
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SerdeSchemaObject {
    #[serde(rename = "$id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub ref_: Option<String>,

    #[serde(rename = "$dynamicRef", skip_serializing_if = "Option::is_none")]
    pub dynamic_ref: Option<String>,

    #[serde(rename = "$anchor", skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,

    #[serde(rename = "$dynamicAnchor", skip_serializing_if = "Option::is_none")]
    pub dynamic_anchor: Option<String>,

    #[serde(rename = "$defs", skip_serializing_if = "Option::is_none")]
    pub defs: Option<BTreeMap<String, SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub definitions: Option<BTreeMap<String, SerdeSchema>>,

    // A BTreeMap, so vocabulary URIs serialize in sorted key order.
    #[serde(rename = "$vocabulary", skip_serializing_if = "Option::is_none")]
    pub vocabulary: Option<BTreeMap<String, bool>>,

    #[serde(rename = "$comment", skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(
        default,
        deserialize_with = "value_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_only: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<Value>>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<SerdeType>,

    // `Option<Value>` alone would fold `"const": null` into absence; the
    // shim keeps present-with-null distinct.
    #[serde(
        rename = "const",
        default,
        deserialize_with = "value_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub const_: Option<Value>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix_items: Option<Vec<SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains: Option<Box<SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_contains: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_contains: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unevaluated_items: Option<Box<SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_properties: Option<BTreeMap<String, SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_names: Option<Box<SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<Number>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependent_required: Option<BTreeMap<String, Vec<String>>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependent_schemas: Option<BTreeMap<String, SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unevaluated_properties: Option<Box<SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<SerdeSchema>>,

    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub if_: Option<Box<SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub then: Option<Box<SerdeSchema>>,

    #[serde(rename = "else", skip_serializing_if = "Option::is_none")]
    pub else_: Option<Box<SerdeSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_media_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_schema: Option<Box<SerdeSchema>>,
}

fn value_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FromSerdeSchemaError {
    #[error("keyword {0:?} is not an integer")]
    NotAnInteger(String),
    #[error("keyword {0:?} is out of range for a 32-bit signed integer")]
    IntegerOutOfRange(String),
    #[error("unknown type name {0:?}")]
    UnknownType(String),
    #[error("\"type\" array must not be empty")]
    EmptyTypeArray,
}

/// Decodes an integer-valued keyword. A fractional value that is
/// mathematically an integer (`1.0`) is accepted; `1.5` and anything
/// outside the `i32` range are rejected.
fn int_keyword(keyword: &str, n: &Number) -> Result<i32, FromSerdeSchemaError> {
    let as_i64 = if let Some(i) = n.as_i64() {
        i
    } else if let Some(u) = n.as_u64() {
        i64::try_from(u).map_err(|_| FromSerdeSchemaError::IntegerOutOfRange(keyword.to_owned()))?
    } else {
        let f = n
            .as_f64()
            .ok_or_else(|| FromSerdeSchemaError::NotAnInteger(keyword.to_owned()))?;
        if f.fract() != 0.0 {
            return Err(FromSerdeSchemaError::NotAnInteger(keyword.to_owned()));
        }
        if f < i64::MIN as f64 || f > i64::MAX as f64 {
            return Err(FromSerdeSchemaError::IntegerOutOfRange(keyword.to_owned()));
        }
        f as i64
    };

    i32::try_from(as_i64).map_err(|_| FromSerdeSchemaError::IntegerOutOfRange(keyword.to_owned()))
}

fn opt_int(keyword: &str, n: &Option<Number>) -> Result<Option<i32>, FromSerdeSchemaError> {
    n.as_ref().map(|n| int_keyword(keyword, n)).transpose()
}

fn subschema(s: SerdeSchema) -> Result<SchemaRef, FromSerdeSchemaError> {
    Schema::from_serde_schema(s).map(Arc::new)
}

fn opt_subschema(
    s: Option<Box<SerdeSchema>>,
) -> Result<Option<SchemaRef>, FromSerdeSchemaError> {
    s.map(|boxed| subschema(*boxed)).transpose()
}

fn opt_list(
    s: Option<Vec<SerdeSchema>>,
) -> Result<Option<Vec<SchemaRef>>, FromSerdeSchemaError> {
    s.map(|items| items.into_iter().map(subschema).collect())
        .transpose()
}

fn opt_map(
    s: Option<BTreeMap<String, SerdeSchema>>,
) -> Result<Option<BTreeMap<String, SchemaRef>>, FromSerdeSchemaError> {
    s.map(|entries| {
        entries
            .into_iter()
            .map(|(k, v)| subschema(v).map(|v| (k, v)))
            .collect()
    })
    .transpose()
}

fn parse_type(name: &str) -> Result<Type, FromSerdeSchemaError> {
    name.parse()
        .map_err(|_| FromSerdeSchemaError::UnknownType(name.to_owned()))
}

impl Schema {
    /// Converts the raw JSON form into a [`Schema`].
    ///
    /// The booleans canonicalize: `true` becomes the empty schema and
    /// `false` becomes `{"not": {}}`.
    pub fn from_serde_schema(s: SerdeSchema) -> Result<Self, FromSerdeSchemaError> {
        let o = match s {
            SerdeSchema::Bool(true) => return Ok(Schema::default()),
            SerdeSchema::Bool(false) => {
                return Ok(Schema {
                    not: Some(Arc::new(Schema::default())),
                    ..Default::default()
                })
            }
            SerdeSchema::Object(o) => *o,
        };

        let (type_, types) = match o.type_ {
            None => (None, None),
            Some(SerdeType::Single(name)) => (Some(parse_type(&name)?), None),
            Some(SerdeType::List(names)) => {
                if names.is_empty() {
                    return Err(FromSerdeSchemaError::EmptyTypeArray);
                }
                let parsed = names
                    .iter()
                    .map(|n| parse_type(n))
                    .collect::<Result<Vec<_>, _>>()?;
                (None, Some(parsed))
            }
        };

        Ok(Schema {
            id: o.id,
            schema_: o.schema,
            ref_: o.ref_,
            dynamic_ref: o.dynamic_ref,
            anchor: o.anchor,
            dynamic_anchor: o.dynamic_anchor,
            defs: opt_map(o.defs)?,
            definitions: opt_map(o.definitions)?,
            vocabulary: o.vocabulary,
            comment: o.comment,
            title: o.title,
            description: o.description,
            default: o.default,
            deprecated: o.deprecated.unwrap_or(false),
            read_only: o.read_only.unwrap_or(false),
            write_only: o.write_only.unwrap_or(false),
            examples: o.examples,
            type_,
            types,
            const_: o.const_.map(Box::new),
            enum_: o.enum_,
            multiple_of: o.multiple_of,
            minimum: o.minimum,
            maximum: o.maximum,
            exclusive_minimum: o.exclusive_minimum,
            exclusive_maximum: o.exclusive_maximum,
            min_length: opt_int("minLength", &o.min_length)?,
            max_length: opt_int("maxLength", &o.max_length)?,
            pattern: o.pattern,
            prefix_items: opt_list(o.prefix_items)?,
            items: opt_subschema(o.items)?,
            contains: opt_subschema(o.contains)?,
            min_contains: opt_int("minContains", &o.min_contains)?,
            max_contains: opt_int("maxContains", &o.max_contains)?,
            min_items: opt_int("minItems", &o.min_items)?,
            max_items: opt_int("maxItems", &o.max_items)?,
            unique_items: o.unique_items.unwrap_or(false),
            unevaluated_items: opt_subschema(o.unevaluated_items)?,
            properties: opt_map(o.properties)?,
            pattern_properties: opt_map(o.pattern_properties)?,
            additional_properties: opt_subschema(o.additional_properties)?,
            property_names: opt_subschema(o.property_names)?,
            min_properties: opt_int("minProperties", &o.min_properties)?,
            max_properties: opt_int("maxProperties", &o.max_properties)?,
            required: o.required,
            dependent_required: o.dependent_required,
            dependent_schemas: opt_map(o.dependent_schemas)?,
            unevaluated_properties: opt_subschema(o.unevaluated_properties)?,
            all_of: opt_list(o.all_of)?,
            any_of: opt_list(o.any_of)?,
            one_of: opt_list(o.one_of)?,
            not: opt_subschema(o.not)?,
            if_: opt_subschema(o.if_)?,
            then: opt_subschema(o.then)?,
            else_: opt_subschema(o.else_)?,
            format: o.format,
            content_encoding: o.content_encoding,
            content_media_type: o.content_media_type,
            content_schema: opt_subschema(o.content_schema)?,
            computed: Default::default(),
        })
    }

    /// Converts back to the raw JSON form. The output is always the object
    /// form; the `false` schema serializes as `{"not": {}}`.
    pub fn to_serde_schema(&self) -> SerdeSchema {
        fn of(s: &SchemaRef) -> SerdeSchema {
            s.to_serde_schema()
        }

        fn of_box(s: &Option<SchemaRef>) -> Option<Box<SerdeSchema>> {
            s.as_ref().map(|s| Box::new(of(s)))
        }

        fn of_list(s: &Option<Vec<SchemaRef>>) -> Option<Vec<SerdeSchema>> {
            s.as_ref().map(|items| items.iter().map(of).collect())
        }

        fn of_map(s: &Option<BTreeMap<String, SchemaRef>>) -> Option<BTreeMap<String, SerdeSchema>> {
            s.as_ref()
                .map(|entries| entries.iter().map(|(k, v)| (k.clone(), of(v))).collect())
        }

        fn flag(b: bool) -> Option<bool> {
            if b {
                Some(true)
            } else {
                None
            }
        }

        fn int(n: &Option<i32>) -> Option<Number> {
            n.map(Number::from)
        }

        let type_ = match (&self.type_, &self.types) {
            (Some(t), _) => Some(SerdeType::Single(t.as_str().to_owned())),
            (None, Some(ts)) => Some(SerdeType::List(
                ts.iter().map(|t| t.as_str().to_owned()).collect(),
            )),
            (None, None) => None,
        };

        SerdeSchema::Object(Box::new(SerdeSchemaObject {
            id: self.id.clone(),
            schema: self.schema_.clone(),
            ref_: self.ref_.clone(),
            dynamic_ref: self.dynamic_ref.clone(),
            anchor: self.anchor.clone(),
            dynamic_anchor: self.dynamic_anchor.clone(),
            defs: of_map(&self.defs),
            definitions: of_map(&self.definitions),
            vocabulary: self.vocabulary.clone(),
            comment: self.comment.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            default: self.default.clone(),
            deprecated: flag(self.deprecated),
            read_only: flag(self.read_only),
            write_only: flag(self.write_only),
            examples: self.examples.clone(),
            type_,
            const_: self.const_.as_deref().cloned(),
            enum_: self.enum_.clone(),
            multiple_of: self.multiple_of.clone(),
            minimum: self.minimum.clone(),
            maximum: self.maximum.clone(),
            exclusive_minimum: self.exclusive_minimum.clone(),
            exclusive_maximum: self.exclusive_maximum.clone(),
            min_length: int(&self.min_length),
            max_length: int(&self.max_length),
            pattern: self.pattern.clone(),
            prefix_items: of_list(&self.prefix_items),
            items: of_box(&self.items),
            contains: of_box(&self.contains),
            min_contains: int(&self.min_contains),
            max_contains: int(&self.max_contains),
            min_items: int(&self.min_items),
            max_items: int(&self.max_items),
            unique_items: flag(self.unique_items),
            unevaluated_items: of_box(&self.unevaluated_items),
            properties: of_map(&self.properties),
            pattern_properties: of_map(&self.pattern_properties),
            additional_properties: of_box(&self.additional_properties),
            property_names: of_box(&self.property_names),
            min_properties: int(&self.min_properties),
            max_properties: int(&self.max_properties),
            required: self.required.clone(),
            dependent_required: self.dependent_required.clone(),
            dependent_schemas: of_map(&self.dependent_schemas),
            unevaluated_properties: of_box(&self.unevaluated_properties),
            all_of: of_list(&self.all_of),
            any_of: of_list(&self.any_of),
            one_of: of_list(&self.one_of),
            not: of_box(&self.not),
            if_: of_box(&self.if_),
            then: of_box(&self.then),
            else_: of_box(&self.else_),
            format: self.format.clone(),
            content_encoding: self.content_encoding.clone(),
            content_media_type: self.content_media_type.clone(),
            content_schema: of_box(&self.content_schema),
        }))
    }
}

impl From<&Schema> for SerdeSchema {
    fn from(schema: &Schema) -> SerdeSchema {
        schema.to_serde_schema()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialize_partial() {
        // Fields are None by default. These shouldn't be serialized.
        assert_eq!(
            "{\"$ref\":\"foo\"}",
            serde_json::to_string(&SerdeSchema::Object(Box::new(SerdeSchemaObject {
                ref_: Some("foo".to_owned()),
                ..Default::default()
            })))
            .unwrap()
        );
    }

    #[test]
    fn parse_empty() {
        assert_eq!(
            SerdeSchema::default(),
            serde_json::from_value(json!({})).unwrap()
        );
    }

    #[test]
    fn parse_booleans() {
        assert_eq!(
            SerdeSchema::Bool(true),
            serde_json::from_value(json!(true)).unwrap()
        );
        assert_eq!(
            SerdeSchema::Bool(false),
            serde_json::from_value(json!(false)).unwrap()
        );
    }

    #[test]
    fn unknown_members_dropped() {
        assert_eq!(
            SerdeSchema::default(),
            serde_json::from_value(json!({ "x-vendor-extension": 12 })).unwrap()
        );
    }

    #[test]
    fn boolean_schemas_canonicalize() {
        let t = Schema::from_serde_schema(SerdeSchema::Bool(true)).unwrap();
        assert!(t.not.is_none());

        let f = Schema::from_serde_schema(SerdeSchema::Bool(false)).unwrap();
        assert!(f.not.is_some());
        assert_eq!(
            json!({ "not": {} }),
            serde_json::to_value(f.to_serde_schema()).unwrap()
        );
    }

    #[test]
    fn type_forms() {
        let single: SerdeSchema = serde_json::from_value(json!({ "type": "string" })).unwrap();
        let single = Schema::from_serde_schema(single).unwrap();
        assert_eq!(Some(Type::String), single.type_);
        assert_eq!(None, single.types);

        let multi: SerdeSchema =
            serde_json::from_value(json!({ "type": ["string", "null"] })).unwrap();
        let multi = Schema::from_serde_schema(multi).unwrap();
        assert_eq!(None, multi.type_);
        assert_eq!(Some(vec![Type::String, Type::Null]), multi.types);

        let unknown: SerdeSchema = serde_json::from_value(json!({ "type": "text" })).unwrap();
        assert_eq!(
            Err(FromSerdeSchemaError::UnknownType("text".to_owned())),
            Schema::from_serde_schema(unknown)
        );

        let empty: SerdeSchema = serde_json::from_value(json!({ "type": [] })).unwrap();
        assert_eq!(
            Err(FromSerdeSchemaError::EmptyTypeArray),
            Schema::from_serde_schema(empty)
        );
    }

    #[test]
    fn integer_keywords() {
        let ok: SerdeSchema = serde_json::from_value(json!({ "minLength": 1.0 })).unwrap();
        assert_eq!(Some(1), Schema::from_serde_schema(ok).unwrap().min_length);

        let frac: SerdeSchema = serde_json::from_value(json!({ "minLength": 1.5 })).unwrap();
        let err = Schema::from_serde_schema(frac).unwrap_err();
        assert_eq!(FromSerdeSchemaError::NotAnInteger("minLength".to_owned()), err);
        assert!(err.to_string().contains("not an integer"));

        let big: SerdeSchema = serde_json::from_value(json!({ "minLength": 4294967296u64 })).unwrap();
        assert_eq!(
            Err(FromSerdeSchemaError::IntegerOutOfRange("minLength".to_owned())),
            Schema::from_serde_schema(big)
        );
    }

    #[test]
    fn null_const_is_present() {
        let s: SerdeSchema = serde_json::from_value(json!({ "const": null })).unwrap();
        let schema = Schema::from_serde_schema(s).unwrap();
        assert_eq!(Some(Box::new(Value::Null)), schema.const_);
    }

    #[test]
    fn roundtrip() {
        for raw in [
            json!({}),
            json!({ "$ref": "other" }),
            json!({ "type": "integer", "minimum": 0 }),
            json!({ "type": ["string", "null"], "minLength": 1 }),
            json!({ "enum": ["a", "b"], "deprecated": true }),
            json!({ "const": null, "title": "t", "$comment": "c" }),
            json!({
                "$id": "https://example.com/s",
                "$defs": { "a": { "$anchor": "a", "pattern": "^x" } },
                "properties": { "p": { "default": 7 } },
                "required": ["p"],
                "prefixItems": [{ "type": "boolean" }],
                "items": { "$dynamicRef": "#a" },
                "allOf": [{ "readOnly": true }],
                "dependentRequired": { "p": ["q"] },
                "dependentSchemas": { "p": { "maxProperties": 3 } },
                "unevaluatedProperties": { "not": {} },
            }),
        ] {
            let serde_schema: SerdeSchema = serde_json::from_value(raw).unwrap();
            let schema = Schema::from_serde_schema(serde_schema.clone()).unwrap();
            assert_eq!(serde_schema, schema.to_serde_schema());
        }
    }
}

use crate::schema::{Schema, Type};
use serde_json::Number;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Produces a schema describing a Rust type's JSON shape. Containers
/// delegate to their element types, so `Vec<Option<u8>>` composes the way
/// its serialized form reads.
pub trait TypeSchema {
    fn type_schema() -> Schema;
}

impl Schema {
    /// Infers the schema for `T`, e.g. `Schema::for_type::<Vec<u8>>()`.
    pub fn for_type<T: TypeSchema>() -> Schema {
        T::type_schema()
    }
}

fn typed(type_: Type) -> Schema {
    Schema {
        type_: Some(type_),
        ..Default::default()
    }
}

impl TypeSchema for bool {
    fn type_schema() -> Schema {
        typed(Type::Boolean)
    }
}

macro_rules! integer_schema {
    ($($int:ty),*) => {
        $(
            impl TypeSchema for $int {
                fn type_schema() -> Schema {
                    Schema {
                        type_: Some(Type::Integer),
                        minimum: Some(Number::from(<$int>::MIN)),
                        maximum: Some(Number::from(<$int>::MAX)),
                        ..Default::default()
                    }
                }
            }
        )*
    };
}

integer_schema!(i8, i16, i32, i64, u8, u16, u32, u64);

impl TypeSchema for f32 {
    fn type_schema() -> Schema {
        typed(Type::Number)
    }
}

impl TypeSchema for f64 {
    fn type_schema() -> Schema {
        typed(Type::Number)
    }
}

impl TypeSchema for String {
    fn type_schema() -> Schema {
        typed(Type::String)
    }
}

impl TypeSchema for &str {
    fn type_schema() -> Schema {
        typed(Type::String)
    }
}

impl<T: TypeSchema> TypeSchema for Option<T> {
    fn type_schema() -> Schema {
        Schema {
            any_of: Some(vec![
                Arc::new(typed(Type::Null)),
                Arc::new(T::type_schema()),
            ]),
            ..Default::default()
        }
    }
}

impl<T: TypeSchema> TypeSchema for Vec<T> {
    fn type_schema() -> Schema {
        Schema {
            type_: Some(Type::Array),
            items: Some(Arc::new(T::type_schema())),
            ..Default::default()
        }
    }
}

impl<T: TypeSchema> TypeSchema for &[T] {
    fn type_schema() -> Schema {
        Vec::<T>::type_schema()
    }
}

impl<V: TypeSchema> TypeSchema for BTreeMap<String, V> {
    fn type_schema() -> Schema {
        Schema {
            type_: Some(Type::Object),
            additional_properties: Some(Arc::new(V::type_schema())),
            ..Default::default()
        }
    }
}

impl<V: TypeSchema> TypeSchema for HashMap<String, V> {
    fn type_schema() -> Schema {
        Schema {
            type_: Some(Type::Object),
            additional_properties: Some(Arc::new(V::type_schema())),
            ..Default::default()
        }
    }
}

/// Any JSON value at all.
impl TypeSchema for serde_json::Value {
    fn type_schema() -> Schema {
        Schema::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResolveOptions;
    use serde_json::json;

    #[test]
    fn integer_bounds() {
        let schema = Schema::for_type::<u8>();
        assert_eq!(Some(Type::Integer), schema.type_);
        assert_eq!(Some(Number::from(0)), schema.minimum);
        assert_eq!(Some(Number::from(255)), schema.maximum);
    }

    #[test]
    fn optional_string() {
        let schema = Schema::for_type::<Option<String>>();
        let branches = schema.any_of.as_ref().unwrap();
        assert_eq!(Some(Type::Null), branches[0].type_);
        assert_eq!(Some(Type::String), branches[1].type_);
    }

    #[test]
    fn inferred_schemas_validate() {
        let resolved = Schema::for_type::<Vec<u8>>()
            .resolve(ResolveOptions::new())
            .unwrap();
        assert!(resolved.validate(&json!([0, 255])).is_ok());
        assert!(resolved.validate(&json!([256])).is_err());
        assert!(resolved.validate(&json!(["x"])).is_err());
    }

    #[test]
    fn map_of_numbers() {
        let resolved = Schema::for_type::<BTreeMap<String, f64>>()
            .resolve(ResolveOptions::new())
            .unwrap();
        assert!(resolved.validate(&json!({ "a": 1.5 })).is_ok());
        assert!(resolved.validate(&json!({ "a": "x" })).is_err());
        assert!(resolved.validate(&json!(17)).is_err());
    }
}

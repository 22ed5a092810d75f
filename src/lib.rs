//! A JSON Schema (draft 2020-12) engine: parse a schema document, resolve
//! its references, then validate JSON instances against it.
//!
//! ```
//! use serde_json::json;
//!
//! let schema = jschema::Schema::from_serde_schema(
//!     serde_json::from_value(json!({
//!         "properties": { "name": { "type": "string" } },
//!         "required": ["name"],
//!     }))
//!     .unwrap(),
//! )
//! .unwrap();
//! let resolved = schema.resolve(jschema::ResolveOptions::new()).unwrap();
//!
//! assert!(resolved.validate(&json!({ "name": "x" })).is_ok());
//! assert!(resolved.validate(&json!({})).is_err());
//! ```

mod defaults;
mod infer;
pub mod pointer;
mod resolver;
mod schema;
mod serde_schema;
mod validate;
mod value;

pub use infer::*;
pub use resolver::*;
pub use schema::*;
pub use serde_schema::*;
pub use validate::*;

/// One-shot convenience check.
///
/// Panics when the schema document itself is malformed or unresolvable;
/// parse and resolve explicitly via [`Schema::from_serde_schema`] and
/// [`Schema::resolve`] to handle those errors.
pub fn is_valid(schema: &serde_json::Value, instance: &serde_json::Value) -> bool {
    let parsed: SerdeSchema =
        serde_json::from_value(schema.clone()).expect("invalid schema document");
    Schema::from_serde_schema(parsed)
        .expect("invalid schema document")
        .resolve(ResolveOptions::new())
        .expect("unresolvable schema")
        .validate(instance)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    #[test]
    fn is_valid_shorthand() {
        let schema = json!({ "type": "array", "maxItems": 2 });
        assert!(super::is_valid(&schema, &json!([1])));
        assert!(!super::is_valid(&schema, &json!([1, 2, 3])));
    }
}

use crate::resolver::{Resolved, DRAFT_2020_12_URI};
use crate::schema::{Schema, SchemaRef};
use crate::value;
use crate::value::Rational;
use serde_json::{Map, Value};
use std::collections::hash_map::RandomState;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Recursion bound used when [`ValidateOptions`] leaves the depth unset.
pub const DEFAULT_MAX_DEPTH: usize = 100;

#[derive(Default)]
pub struct ValidateOptions {
    max_depth: usize,
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound on nested schema evaluations, counting reference hops. Zero
    /// means [`DEFAULT_MAX_DEPTH`].
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidateError {
    #[error("max depth exceeded")]
    MaxDepthExceeded,
    #[error("unsupported dialect {0:?}")]
    UnsupportedDialect(String),
    #[error("\"$dynamicRef\" cannot be used while validating default values")]
    DynamicRefInDefault,
    #[error("instance{instance_path} violates {keyword:?}: {detail}")]
    Failed {
        keyword: &'static str,
        detail: String,
        instance_path: String,
    },
}

impl Resolved {
    /// Validates an instance against the resolved schema, stopping at the
    /// first failing keyword.
    pub fn validate(&self, instance: &Value) -> Result<(), ValidateError> {
        self.validate_with_options(instance, ValidateOptions::new())
    }

    pub fn validate_with_options(
        &self,
        instance: &Value,
        options: ValidateOptions,
    ) -> Result<(), ValidateError> {
        if let Some(dialect) = &self.schema().schema_ {
            if dialect != DRAFT_2020_12_URI {
                return Err(ValidateError::UnsupportedDialect(dialect.clone()));
            }
        }

        let mut vm = Vm {
            max_depth: if options.max_depth == 0 {
                DEFAULT_MAX_DEPTH
            } else {
                options.max_depth
            },
            deny_dynamic: false,
            scopes: vec![],
            instance_tokens: vec![],
        };
        let mut anns = Annotations::default();
        vm.validate(self.schema(), instance, &mut anns)
    }
}

/// Validation entry used for `default` values during resolution, before a
/// [`Resolved`] exists. The dynamic scope starts empty, so dynamic
/// references are refused rather than silently misresolved.
pub(crate) fn validate_detached(
    schema: &SchemaRef,
    instance: &Value,
) -> Result<(), ValidateError> {
    let mut vm = Vm {
        max_depth: DEFAULT_MAX_DEPTH,
        deny_dynamic: true,
        scopes: vec![],
        instance_tokens: vec![],
    };
    let mut anns = Annotations::default();
    vm.validate(schema, instance, &mut anns)
}

/// Side results one keyword produces for another to consume. Callers hand
/// each subvalidation a fresh record and decide whether to merge it.
#[derive(Default)]
struct Annotations {
    all_items: bool,
    end_index: usize,
    evaluated_indexes: HashSet<usize>,
    all_properties: bool,
    evaluated_properties: HashSet<String>,
}

impl Annotations {
    fn merge(&mut self, other: Annotations) {
        self.all_items |= other.all_items;
        self.end_index = self.end_index.max(other.end_index);
        self.evaluated_indexes.extend(other.evaluated_indexes);
        self.all_properties |= other.all_properties;
        self.evaluated_properties.extend(other.evaluated_properties);
    }
}

enum Token {
    Member(String),
    Index(usize),
}

struct Vm {
    max_depth: usize,
    deny_dynamic: bool,
    /// Dynamic scope: every schema currently being evaluated, outermost
    /// first. Consulted by `$dynamicRef`.
    scopes: Vec<SchemaRef>,
    instance_tokens: Vec<Token>,
}

impl Vm {
    fn validate(
        &mut self,
        schema: &SchemaRef,
        instance: &Value,
        anns: &mut Annotations,
    ) -> Result<(), ValidateError> {
        if self.scopes.len() >= self.max_depth {
            return Err(ValidateError::MaxDepthExceeded);
        }
        self.scopes.push(schema.clone());
        let result = self.run(schema, instance, anns);
        self.scopes.pop();
        result
    }

    fn run(
        &mut self,
        schema: &SchemaRef,
        instance: &Value,
        anns: &mut Annotations,
    ) -> Result<(), ValidateError> {
        if let Some(type_) = schema.type_ {
            if !type_.matches(instance) {
                return Err(self.fail(
                    "type",
                    format!("{} is not {}", value::type_name(instance), type_.as_str()),
                ));
            }
        }
        if let Some(types) = &schema.types {
            if !types.iter().any(|t| t.matches(instance)) {
                return Err(self.fail(
                    "type",
                    format!(
                        "{} matches none of the allowed types",
                        value::type_name(instance)
                    ),
                ));
            }
        }

        if let Some(candidates) = &schema.enum_ {
            if !candidates
                .iter()
                .any(|candidate| value::equal_values(candidate, instance))
            {
                return Err(self.fail("enum", "value matches no listed candidate"));
            }
        }
        if let Some(constant) = &schema.const_ {
            if !value::equal_values(constant, instance) {
                return Err(self.fail("const", "value differs from the constant"));
            }
        }

        self.check_numbers(schema, instance)?;
        self.check_strings(schema, instance)?;

        if let Some(target) = schema.resolved_ref() {
            let mut sub = Annotations::default();
            self.validate(&target, instance, &mut sub)?;
            anns.merge(sub);
        }

        if schema.dynamic_ref.is_some() {
            if self.deny_dynamic {
                return Err(ValidateError::DynamicRefInDefault);
            }
            let target = self
                .dynamic_target(schema)
                .ok_or_else(|| self.fail("$dynamicRef", "no dynamic anchor in scope"))?;
            let mut sub = Annotations::default();
            self.validate(&target, instance, &mut sub)?;
            anns.merge(sub);
        }

        if let Some(all_of) = &schema.all_of {
            for sub_schema in all_of {
                let mut sub = Annotations::default();
                self.validate(sub_schema, instance, &mut sub)?;
                anns.merge(sub);
            }
        }
        if let Some(any_of) = &schema.any_of {
            // Every branch runs so that each success contributes its
            // annotations.
            let mut matched = false;
            for sub_schema in any_of {
                let mut sub = Annotations::default();
                match self.validate(sub_schema, instance, &mut sub) {
                    Ok(()) => {
                        matched = true;
                        anns.merge(sub);
                    }
                    Err(ValidateError::Failed { .. }) => {}
                    Err(fatal) => return Err(fatal),
                }
            }
            if !matched {
                return Err(self.fail("anyOf", "no subschema matched"));
            }
        }
        if let Some(one_of) = &schema.one_of {
            let mut winner = None;
            let mut matches = 0;
            for sub_schema in one_of {
                let mut sub = Annotations::default();
                match self.validate(sub_schema, instance, &mut sub) {
                    Ok(()) => {
                        matches += 1;
                        winner = Some(sub);
                    }
                    Err(ValidateError::Failed { .. }) => {}
                    Err(fatal) => return Err(fatal),
                }
            }
            if matches != 1 {
                return Err(self.fail("oneOf", format!("{} subschemas matched", matches)));
            }
            if let Some(sub) = winner {
                anns.merge(sub);
            }
        }
        if let Some(not) = &schema.not {
            let mut sub = Annotations::default();
            match self.validate(not, instance, &mut sub) {
                Ok(()) => return Err(self.fail("not", "subschema matched")),
                Err(ValidateError::Failed { .. }) => {}
                Err(fatal) => return Err(fatal),
            }
        }
        if let Some(if_) = &schema.if_ {
            let mut if_anns = Annotations::default();
            let outcome = self.validate(if_, instance, &mut if_anns);
            anns.merge(if_anns);
            match outcome {
                Ok(()) => {
                    if let Some(then) = &schema.then {
                        let mut sub = Annotations::default();
                        self.validate(then, instance, &mut sub)?;
                        anns.merge(sub);
                    }
                }
                Err(ValidateError::Failed { .. }) => {
                    if let Some(else_) = &schema.else_ {
                        let mut sub = Annotations::default();
                        self.validate(else_, instance, &mut sub)?;
                        anns.merge(sub);
                    }
                }
                Err(fatal) => return Err(fatal),
            }
        }

        if let Value::Array(items) = instance {
            self.check_array(schema, items, anns)?;
        }
        if let Value::Object(members) = instance {
            self.check_object(schema, members, instance, anns)?;
        }

        Ok(())
    }

    fn check_numbers(&self, schema: &Schema, instance: &Value) -> Result<(), ValidateError> {
        let number = match instance {
            Value::Number(n) => n,
            _ => return Ok(()),
        };
        if schema.multiple_of.is_none()
            && schema.minimum.is_none()
            && schema.maximum.is_none()
            && schema.exclusive_minimum.is_none()
            && schema.exclusive_maximum.is_none()
        {
            return Ok(());
        }

        let observed = match Rational::from_number(number) {
            Some(observed) => observed,
            None => return Ok(()),
        };

        if let Some(quantum) = &schema.multiple_of {
            let exact = Rational::from_number(quantum)
                .map_or(false, |quantum| observed.is_multiple_of(&quantum));
            if !exact {
                return Err(self.fail(
                    "multipleOf",
                    format!("{} is not a multiple of {}", number, quantum),
                ));
            }
        }
        if let Some(bound) = &schema.minimum {
            if let Some(bound_value) = Rational::from_number(bound) {
                if observed < bound_value {
                    return Err(
                        self.fail("minimum", format!("{} is less than {}", number, bound))
                    );
                }
            }
        }
        if let Some(bound) = &schema.maximum {
            if let Some(bound_value) = Rational::from_number(bound) {
                if observed > bound_value {
                    return Err(
                        self.fail("maximum", format!("{} is greater than {}", number, bound))
                    );
                }
            }
        }
        if let Some(bound) = &schema.exclusive_minimum {
            if let Some(bound_value) = Rational::from_number(bound) {
                if observed <= bound_value {
                    return Err(self.fail(
                        "exclusiveMinimum",
                        format!("{} is not greater than {}", number, bound),
                    ));
                }
            }
        }
        if let Some(bound) = &schema.exclusive_maximum {
            if let Some(bound_value) = Rational::from_number(bound) {
                if observed >= bound_value {
                    return Err(self.fail(
                        "exclusiveMaximum",
                        format!("{} is not less than {}", number, bound),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_strings(&self, schema: &Schema, instance: &Value) -> Result<(), ValidateError> {
        let string = match instance {
            Value::String(s) => s,
            _ => return Ok(()),
        };

        if schema.min_length.is_some() || schema.max_length.is_some() {
            // Code points, not bytes.
            let length = string.chars().count() as i64;
            if let Some(min) = schema.min_length {
                if length < i64::from(min) {
                    return Err(self.fail(
                        "minLength",
                        format!("length {} is less than {}", length, min),
                    ));
                }
            }
            if let Some(max) = schema.max_length {
                if length > i64::from(max) {
                    return Err(self.fail(
                        "maxLength",
                        format!("length {} is greater than {}", length, max),
                    ));
                }
            }
        }

        if let Some(regex) = schema.compiled_pattern() {
            if !regex.is_match(string) {
                return Err(self.fail(
                    "pattern",
                    format!("{:?} does not match {:?}", string, regex.as_str()),
                ));
            }
        }
        Ok(())
    }

    fn check_array(
        &mut self,
        schema: &SchemaRef,
        items: &[Value],
        anns: &mut Annotations,
    ) -> Result<(), ValidateError> {
        let mut prefix_len = 0;
        if let Some(prefix_items) = &schema.prefix_items {
            prefix_len = prefix_items.len().min(items.len());
            for (i, sub_schema) in prefix_items.iter().take(items.len()).enumerate() {
                self.instance_tokens.push(Token::Index(i));
                let mut sub = Annotations::default();
                let result = self.validate(sub_schema, &items[i], &mut sub);
                self.instance_tokens.pop();
                result?;
            }
            anns.end_index = anns.end_index.max(prefix_len);
        }

        if let Some(sub_schema) = &schema.items {
            for (i, item) in items.iter().enumerate().skip(prefix_len) {
                self.instance_tokens.push(Token::Index(i));
                let mut sub = Annotations::default();
                let result = self.validate(sub_schema, item, &mut sub);
                self.instance_tokens.pop();
                result?;
            }
            anns.all_items = true;
        }

        if let Some(sub_schema) = &schema.contains {
            let mut count: i64 = 0;
            for (i, item) in items.iter().enumerate() {
                self.instance_tokens.push(Token::Index(i));
                let mut sub = Annotations::default();
                let result = self.validate(sub_schema, item, &mut sub);
                self.instance_tokens.pop();
                match result {
                    Ok(()) => {
                        count += 1;
                        anns.evaluated_indexes.insert(i);
                    }
                    Err(ValidateError::Failed { .. }) => {}
                    Err(fatal) => return Err(fatal),
                }
            }
            let min = i64::from(schema.min_contains.unwrap_or(1));
            if count < min {
                let keyword = if schema.min_contains.is_some() {
                    "minContains"
                } else {
                    "contains"
                };
                return Err(self.fail(
                    keyword,
                    format!("{} items matched, fewer than {}", count, min),
                ));
            }
            if let Some(max) = schema.max_contains {
                if count > i64::from(max) {
                    return Err(self.fail(
                        "maxContains",
                        format!("{} items matched, more than {}", count, max),
                    ));
                }
            }
        }

        if schema.unique_items {
            // Hash first, confirm with structural equality; the seed is
            // fresh per call.
            let state = RandomState::new();
            let mut buckets: HashMap<u64, Vec<usize>> = HashMap::new();
            for (i, item) in items.iter().enumerate() {
                let bucket = buckets.entry(value::hash_value(&state, item)).or_default();
                if let Some(&j) = bucket
                    .iter()
                    .find(|&&j| value::equal_values(&items[j], item))
                {
                    return Err(self.fail(
                        "uniqueItems",
                        format!("items {} and {} are equal", j, i),
                    ));
                }
                bucket.push(i);
            }
        }

        if let Some(min) = schema.min_items {
            if (items.len() as i64) < i64::from(min) {
                return Err(self.fail(
                    "minItems",
                    format!("{} items are fewer than {}", items.len(), min),
                ));
            }
        }
        if let Some(max) = schema.max_items {
            if (items.len() as i64) > i64::from(max) {
                return Err(self.fail(
                    "maxItems",
                    format!("{} items are more than {}", items.len(), max),
                ));
            }
        }

        if let Some(sub_schema) = &schema.unevaluated_items {
            if !anns.all_items {
                for i in anns.end_index..items.len() {
                    if anns.evaluated_indexes.contains(&i) {
                        continue;
                    }
                    self.instance_tokens.push(Token::Index(i));
                    let mut sub = Annotations::default();
                    let result = self.validate(sub_schema, &items[i], &mut sub);
                    self.instance_tokens.pop();
                    result?;
                }
            }
            anns.all_items = true;
        }
        Ok(())
    }

    fn check_object(
        &mut self,
        schema: &SchemaRef,
        members: &Map<String, Value>,
        instance: &Value,
        anns: &mut Annotations,
    ) -> Result<(), ValidateError> {
        // Keys evaluated by this schema's own properties keywords; the
        // accumulated annotations additionally cover sibling applicators.
        let mut eval_props: HashSet<&str> = HashSet::new();

        if let Some(properties) = &schema.properties {
            for (name, sub_schema) in properties {
                if let Some(member) = members.get(name) {
                    self.instance_tokens.push(Token::Member(name.clone()));
                    let mut sub = Annotations::default();
                    let result = self.validate(sub_schema, member, &mut sub);
                    self.instance_tokens.pop();
                    result?;
                    eval_props.insert(name.as_str());
                    anns.evaluated_properties.insert(name.clone());
                }
            }
        }

        if let Some(patterns) = schema.compiled_pattern_properties() {
            for (regex, sub_schema) in patterns {
                for (name, member) in members {
                    if !regex.is_match(name) {
                        continue;
                    }
                    self.instance_tokens.push(Token::Member(name.clone()));
                    let mut sub = Annotations::default();
                    let result = self.validate(sub_schema, member, &mut sub);
                    self.instance_tokens.pop();
                    result?;
                    eval_props.insert(name.as_str());
                    anns.evaluated_properties.insert(name.clone());
                }
            }
        }

        if let Some(sub_schema) = &schema.additional_properties {
            for (name, member) in members {
                if eval_props.contains(name.as_str()) {
                    continue;
                }
                self.instance_tokens.push(Token::Member(name.clone()));
                let mut sub = Annotations::default();
                let result = self.validate(sub_schema, member, &mut sub);
                self.instance_tokens.pop();
                result?;
                anns.evaluated_properties.insert(name.clone());
            }
            anns.all_properties = true;
        }

        if let Some(sub_schema) = &schema.property_names {
            for name in members.keys() {
                let key = Value::String(name.clone());
                self.instance_tokens.push(Token::Member(name.clone()));
                let mut sub = Annotations::default();
                let result = self.validate(sub_schema, &key, &mut sub);
                self.instance_tokens.pop();
                result?;
            }
        }

        if let Some(min) = schema.min_properties {
            if (members.len() as i64) < i64::from(min) {
                return Err(self.fail(
                    "minProperties",
                    format!("{} properties are fewer than {}", members.len(), min),
                ));
            }
        }
        if let Some(max) = schema.max_properties {
            if (members.len() as i64) > i64::from(max) {
                return Err(self.fail(
                    "maxProperties",
                    format!("{} properties are more than {}", members.len(), max),
                ));
            }
        }

        if let Some(required) = &schema.required {
            for name in required {
                if !members.contains_key(name) {
                    return Err(self.fail("required", format!("missing property {:?}", name)));
                }
            }
        }

        if let Some(dependencies) = &schema.dependent_required {
            for (trigger, needed) in dependencies {
                if !members.contains_key(trigger) {
                    continue;
                }
                for name in needed {
                    if !members.contains_key(name) {
                        return Err(self.fail(
                            "dependentRequired",
                            format!("{:?} requires missing property {:?}", trigger, name),
                        ));
                    }
                }
            }
        }

        if let Some(dependencies) = &schema.dependent_schemas {
            for (trigger, sub_schema) in dependencies {
                if !members.contains_key(trigger) {
                    continue;
                }
                let mut sub = Annotations::default();
                self.validate(sub_schema, instance, &mut sub)?;
                anns.merge(sub);
            }
        }

        if let Some(sub_schema) = &schema.unevaluated_properties {
            if !anns.all_properties {
                for (name, member) in members {
                    if anns.evaluated_properties.contains(name.as_str()) {
                        continue;
                    }
                    self.instance_tokens.push(Token::Member(name.clone()));
                    let mut sub = Annotations::default();
                    let result = self.validate(sub_schema, member, &mut sub);
                    self.instance_tokens.pop();
                    result?;
                }
            }
            anns.all_properties = true;
        }
        Ok(())
    }

    /// Walks the dynamic scope from the outermost frame inward, taking the
    /// first base whose anchor table has a dynamic entry for the name.
    fn dynamic_target(&self, schema: &SchemaRef) -> Option<SchemaRef> {
        if let Some(target) = schema.resolved_dynamic_ref() {
            return Some(target);
        }
        let name = schema.dynamic_ref_anchor()?;
        for frame in &self.scopes {
            let base = match frame.base() {
                Some(base) => base,
                None => continue,
            };
            if let Some(anchor) = base.anchors().and_then(|anchors| anchors.get(name)) {
                if anchor.dynamic {
                    if let Some(target) = anchor.schema.upgrade() {
                        return Some(target);
                    }
                }
            }
        }
        None
    }

    fn fail(&self, keyword: &'static str, detail: impl Into<String>) -> ValidateError {
        ValidateError::Failed {
            keyword,
            detail: detail.into(),
            instance_path: self.instance_path(),
        }
    }

    fn instance_path(&self) -> String {
        use std::fmt::Write;

        let mut path = String::new();
        for token in &self.instance_tokens {
            match token {
                Token::Member(name) => {
                    path.push('.');
                    path.push_str(name);
                }
                Token::Index(i) => {
                    let _ = write!(path, "[{}]", i);
                }
            }
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ResolveOptions, Schema};
    use serde_json::json;

    fn resolve(raw: serde_json::Value) -> Resolved {
        Schema::from_serde_schema(serde_json::from_value(raw).unwrap())
            .unwrap()
            .resolve(ResolveOptions::new())
            .unwrap()
    }

    fn failing_keyword(raw: serde_json::Value, instance: serde_json::Value) -> &'static str {
        match resolve(raw).validate(&instance).unwrap_err() {
            ValidateError::Failed { keyword, .. } => keyword,
            other => panic!("expected a keyword failure, got {:?}", other),
        }
    }

    #[test]
    fn integer_minimum() {
        let schema = json!({ "type": "integer", "minimum": 0 });
        assert_eq!("minimum", failing_keyword(schema.clone(), json!(-1)));
        assert_eq!("type", failing_keyword(schema.clone(), json!(1.5)));
        assert!(resolve(schema).validate(&json!(2)).is_ok());
    }

    #[test]
    fn required_and_min_length() {
        let schema = json!({
            "type": "object",
            "required": ["x"],
            "properties": { "x": { "type": "string", "minLength": 1 } },
        });
        assert_eq!("required", failing_keyword(schema.clone(), json!({})));
        assert_eq!("minLength", failing_keyword(schema.clone(), json!({ "x": "" })));
        assert!(resolve(schema).validate(&json!({ "x": "hi" })).is_ok());
    }

    #[test]
    fn type_array() {
        let schema = json!({ "type": ["string", "null"] });
        assert!(resolve(schema.clone()).validate(&json!(null)).is_ok());
        assert!(resolve(schema.clone()).validate(&json!("x")).is_ok());
        assert_eq!("type", failing_keyword(schema, json!(1)));
    }

    #[test]
    fn numeric_equivalence_in_const_and_enum() {
        assert!(resolve(json!({ "const": 5.0 })).validate(&json!(5)).is_ok());
        assert!(resolve(json!({ "const": 5 })).validate(&json!(5.0)).is_ok());
        assert!(resolve(json!({ "enum": [5.0] })).validate(&json!(5)).is_ok());
        assert_eq!("const", failing_keyword(json!({ "const": 5 }), json!(6)));
    }

    #[test]
    fn multiple_of_is_exact() {
        let schema = json!({ "multipleOf": 0.5 });
        assert!(resolve(schema.clone()).validate(&json!(1.5)).is_ok());
        assert_eq!("multipleOf", failing_keyword(schema, json!(1.6)));

        // Large integers stay exact; a plain f64 quotient would not.
        let schema = json!({ "multipleOf": 2 });
        assert!(resolve(schema)
            .validate(&json!(10000000000000000000u64))
            .is_ok());
    }

    #[test]
    fn exclusive_bounds() {
        let schema = json!({ "exclusiveMinimum": 0, "exclusiveMaximum": 1 });
        assert_eq!("exclusiveMinimum", failing_keyword(schema.clone(), json!(0)));
        assert_eq!("exclusiveMaximum", failing_keyword(schema.clone(), json!(1)));
        assert!(resolve(schema).validate(&json!(0.5)).is_ok());
    }

    #[test]
    fn unique_items() {
        let schema = json!({ "items": { "type": "integer" }, "uniqueItems": true });
        assert_eq!("uniqueItems", failing_keyword(schema.clone(), json!([1, 2, 2])));
        assert!(resolve(schema).validate(&json!([1, 2, 3])).is_ok());

        // 1 and 1.0 are the same number; 1 and "1" are not.
        let schema = json!({ "uniqueItems": true });
        assert_eq!("uniqueItems", failing_keyword(schema.clone(), json!([1, 1.0])));
        assert!(resolve(schema).validate(&json!([1, "1"])).is_ok());
    }

    #[test]
    fn one_of() {
        let schema = json!({ "oneOf": [{ "type": "string" }, { "type": "number" }] });
        assert_eq!("oneOf", failing_keyword(schema.clone(), json!(true)));
        assert!(resolve(schema.clone()).validate(&json!("a")).is_ok());
        assert!(resolve(schema).validate(&json!(3)).is_ok());
    }

    #[test]
    fn if_then_else() {
        let schema = json!({
            "if": { "type": "string" },
            "then": { "minLength": 2 },
            "else": { "minimum": 2 },
        });
        assert_eq!("minLength", failing_keyword(schema.clone(), json!("a")));
        assert!(resolve(schema.clone()).validate(&json!("ab")).is_ok());
        assert_eq!("minimum", failing_keyword(schema.clone(), json!(1)));
        assert!(resolve(schema).validate(&json!(3)).is_ok());
    }

    #[test]
    fn contains_bounds() {
        let schema = json!({ "contains": { "type": "integer" }, "minContains": 2 });
        assert_eq!("minContains", failing_keyword(schema.clone(), json!([1, "a"])));
        assert!(resolve(schema).validate(&json!([1, 2, "a"])).is_ok());

        let schema = json!({ "contains": { "type": "integer" }, "maxContains": 1 });
        assert_eq!("maxContains", failing_keyword(schema, json!([1, 2])));

        let schema = json!({ "contains": { "type": "integer" }, "minContains": 0 });
        assert!(resolve(schema).validate(&json!([])).is_ok());

        let schema = json!({ "contains": { "type": "integer" } });
        assert_eq!("contains", failing_keyword(schema, json!(["a"])));
    }

    #[test]
    fn property_names() {
        let schema = json!({ "propertyNames": { "pattern": "^a" } });
        assert!(resolve(schema.clone()).validate(&json!({ "ab": 1 })).is_ok());
        assert_eq!("pattern", failing_keyword(schema, json!({ "b": 1 })));
    }

    #[test]
    fn dependent_keywords() {
        let schema = json!({ "dependentRequired": { "a": ["b"] } });
        assert_eq!("dependentRequired", failing_keyword(schema.clone(), json!({ "a": 1 })));
        assert!(resolve(schema).validate(&json!({ "a": 1, "b": 2 })).is_ok());

        let schema = json!({ "dependentSchemas": { "a": { "minProperties": 2 } } });
        assert_eq!("minProperties", failing_keyword(schema.clone(), json!({ "a": 1 })));
        assert!(resolve(schema).validate(&json!({ "b": 1 })).is_ok());
    }

    #[test]
    fn unevaluated_properties() {
        let schema = json!({
            "allOf": [{ "properties": { "a": true } }],
            "unevaluatedProperties": false,
        });
        assert!(resolve(schema.clone()).validate(&json!({ "a": 1 })).is_ok());
        assert!(resolve(schema).validate(&json!({ "a": 1, "b": 2 })).is_err());
    }

    #[test]
    fn unevaluated_items() {
        let schema = json!({ "prefixItems": [true], "unevaluatedItems": false });
        assert!(resolve(schema.clone()).validate(&json!([1])).is_ok());
        assert!(resolve(schema).validate(&json!([1, 2])).is_err());
    }

    #[test]
    fn dynamic_ref_follows_outermost_anchor() {
        use crate::resolver::LoaderError;

        let wrapper = json!({
            "$dynamicAnchor": "node",
            "$ref": "tree",
            "maxItems": 1,
        });
        let loader = |uri: &str| -> Result<Schema, LoaderError> {
            match uri {
                "https://example.com/tree" => Ok(Schema::from_serde_schema(
                    serde_json::from_value(json!({
                        "$dynamicAnchor": "node",
                        "items": { "$dynamicRef": "#node" },
                    }))
                    .unwrap(),
                )
                .unwrap()),
                other => Err(format!("unexpected load of {:?}", other).into()),
            }
        };
        let resolved = Schema::from_serde_schema(serde_json::from_value(wrapper).unwrap())
            .unwrap()
            .resolve(
                ResolveOptions::new()
                    .with_base_uri("https://example.com/wrap")
                    .with_loader(loader),
            )
            .unwrap();

        // The wrapper's maxItems applies to nested arrays because its
        // dynamic anchor shadows the tree's own.
        assert!(resolved.validate(&json!([[[]]])).is_ok());
        match resolved.validate(&json!([[[], []]])) {
            Err(ValidateError::Failed { keyword: "maxItems", .. }) => {}
            other => panic!("expected a maxItems failure, got {:?}", other),
        }
    }

    #[test]
    fn instance_path_in_error() {
        let schema = json!({
            "properties": { "a": { "items": { "type": "integer" } } },
        });
        match resolve(schema).validate(&json!({ "a": [0, "x"] })).unwrap_err() {
            ValidateError::Failed { instance_path, .. } => assert_eq!(".a[1]", instance_path),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn unsupported_dialect() {
        let resolved = resolve(json!({ "$schema": "http://json-schema.org/draft-07/schema#" }));
        assert!(matches!(
            resolved.validate(&json!(null)),
            Err(ValidateError::UnsupportedDialect(_))
        ));
        let resolved = resolve(json!({ "$schema": "https://json-schema.org/draft/2020-12/schema" }));
        assert!(resolved.validate(&json!(null)).is_ok());
    }

    #[test]
    fn max_depth() {
        let resolved = resolve(json!({
            "$defs": { "loop": { "$ref": "#/$defs/loop" } },
            "$ref": "#/$defs/loop",
        }));
        assert_eq!(
            ValidateError::MaxDepthExceeded,
            resolved
                .validate_with_options(&json!(null), ValidateOptions::new().with_max_depth(3))
                .unwrap_err()
        );
        // The bound also applies under the default limit.
        assert_eq!(
            ValidateError::MaxDepthExceeded,
            resolved.validate(&json!(null)).unwrap_err()
        );
    }

    #[test]
    fn max_depth_propagates_through_any_of() {
        let resolved = resolve(json!({
            "$defs": { "loop": { "$ref": "#/$defs/loop" } },
            "anyOf": [{ "$ref": "#/$defs/loop" }, true],
        }));
        assert_eq!(
            ValidateError::MaxDepthExceeded,
            resolved.validate(&json!(null)).unwrap_err()
        );
    }
}

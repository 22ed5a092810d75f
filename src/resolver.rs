use crate::pointer::{self, PointerError};
use crate::schema::{Anchor, Schema, SchemaRef};
use crate::validate::{self, ValidateError};
use log::debug;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// The only dialect this engine understands.
pub const DRAFT_2020_12_URI: &str = "https://json-schema.org/draft/2020-12/schema";

pub type LoaderError = Box<dyn std::error::Error + Send + Sync>;

/// Fetches the schema for a non-fragment URI encountered during reference
/// binding. The resolver calls this at most once per URI per top-level
/// resolve; the result is itself resolved and cached.
pub trait Loader {
    fn load(&self, uri: &str) -> Result<Schema, LoaderError>;
}

impl<F> Loader for F
where
    F: Fn(&str) -> Result<Schema, LoaderError>,
{
    fn load(&self, uri: &str) -> Result<Schema, LoaderError> {
        self(uri)
    }
}

struct NoLoader;

impl Loader for NoLoader {
    fn load(&self, uri: &str) -> Result<Schema, LoaderError> {
        Err(format!("no loader configured, cannot fetch {:?}", uri).into())
    }
}

pub struct ResolveOptions {
    base_uri: String,
    loader: Box<dyn Loader>,
    validate_defaults: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            base_uri: String::new(),
            loader: Box::new(NoLoader),
            validate_defaults: false,
        }
    }
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The root schema's base URI. Empty (the default) acts as a
    /// placeholder empty URI.
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    pub fn with_loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Also validate every subschema's `default` value against that
    /// subschema. Dynamic references are not supported in this mode.
    pub fn with_validate_defaults(mut self, validate_defaults: bool) -> Self {
        self.validate_defaults = validate_defaults;
        self
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("schema at {0:?} is reachable by more than one path: a schema graph must be a tree")]
    NotATree(String),
    #[error("schema at {0:?} sets both a single type and a type array")]
    TypeAndTypes(String),
    #[error("schema at {0:?} sets both \"$defs\" and \"definitions\"")]
    DefsAndDefinitions(String),
    #[error("schema at {0:?} declares \"$vocabulary\" but is not the 2020-12 meta-schema")]
    UnsupportedVocabulary(String),
    #[error("schema at {path:?}: cannot compile pattern {pattern:?}")]
    InvalidPattern {
        path: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("schema at {path:?}: {uri:?} is not a valid \"$id\" URI")]
    InvalidUri { path: String, uri: String },
    #[error("schema at {path:?}: \"$id\" URI {uri:?} must be absolute")]
    NotAbsolute { path: String, uri: String },
    #[error("duplicate anchor {name:?} under base {base:?}")]
    DuplicateAnchor { name: String, base: String },
    #[error("schema at {path:?}: cannot resolve fragment of {uri:?}")]
    UnresolvedPointer {
        path: String,
        uri: String,
        #[source]
        source: PointerError,
    },
    #[error("no anchor {anchor:?} under {uri:?}")]
    MissingAnchor { anchor: String, uri: String },
    #[error("cannot load schema {uri:?}")]
    Loader {
        uri: String,
        #[source]
        source: LoaderError,
    },
    #[error("default value at {path:?} does not validate against its schema")]
    InvalidDefault {
        path: String,
        #[source]
        source: ValidateError,
    },
}

/// A schema whose structural checks have passed and whose references have
/// been bound. Immutable, reusable across many validations, and shareable
/// across threads; the URI index keeps every loaded tree alive so the weak
/// reference handles inside the trees stay valid.
#[derive(Debug)]
pub struct Resolved {
    root: SchemaRef,
    by_uri: HashMap<String, SchemaRef>,
}

impl Resolved {
    pub fn schema(&self) -> &SchemaRef {
        &self.root
    }

    pub fn schema_by_uri(&self, uri: &str) -> Option<&SchemaRef> {
        self.by_uri.get(uri)
    }
}

impl Schema {
    /// Checks the schema tree, computes canonical URIs and anchors, and
    /// binds every `$ref`/`$dynamicRef` to its target.
    pub fn resolve(self, options: ResolveOptions) -> Result<Resolved, ResolveError> {
        let root = Arc::new(self);
        let mut resolver = Resolver {
            loader: options.loader.as_ref(),
            by_uri: HashMap::new(),
            seen: HashSet::new(),
        };
        resolver.resolve_tree(&root, &options.base_uri)?;

        if options.validate_defaults {
            check_defaults(&root)?;
        }

        Ok(Resolved {
            root,
            by_uri: resolver.by_uri,
        })
    }
}

struct Resolver<'l> {
    loader: &'l dyn Loader,
    by_uri: HashMap<String, SchemaRef>,
    seen: HashSet<usize>,
}

enum RefTarget {
    Static(SchemaRef),
    Dynamic(String),
}

impl<'l> Resolver<'l> {
    fn resolve_tree(&mut self, root: &SchemaRef, base_uri: &str) -> Result<(), ResolveError> {
        self.check_tree(root, "root".to_owned())?;

        let root_uri = match &root.id {
            Some(id) => id_uri("root", base_uri, id)?,
            None => base_uri.to_owned(),
        };
        self.resolve_base(root, root_uri)?;
        // The original base URI indexes the root even when `$id` renamed it.
        self.by_uri.insert(base_uri.to_owned(), root.clone());

        self.bind_refs(root)
    }

    /// Preorder traversal assigning paths and running the per-node local
    /// checks. Visiting a node twice means the graph is not a tree.
    fn check_tree(&mut self, schema: &SchemaRef, path: String) -> Result<(), ResolveError> {
        if !self.seen.insert(Arc::as_ptr(schema) as usize)
            || schema.computed.path.set(path.clone()).is_err()
        {
            return Err(ResolveError::NotATree(path));
        }

        if schema.type_.is_some() && schema.types.is_some() {
            return Err(ResolveError::TypeAndTypes(path));
        }
        if schema.defs.is_some() && schema.definitions.is_some() {
            return Err(ResolveError::DefsAndDefinitions(path));
        }
        if schema.vocabulary.is_some() && schema.id.as_deref() != Some(DRAFT_2020_12_URI) {
            return Err(ResolveError::UnsupportedVocabulary(path));
        }

        if let Some(pattern) = &schema.pattern {
            let compiled = Regex::new(pattern).map_err(|source| ResolveError::InvalidPattern {
                path: path.clone(),
                pattern: pattern.clone(),
                source,
            })?;
            let _ = schema.computed.pattern.set(compiled);
        }
        if let Some(patterns) = &schema.pattern_properties {
            let mut compiled = Vec::with_capacity(patterns.len());
            for (pattern, sub) in patterns {
                let regex = Regex::new(pattern).map_err(|source| ResolveError::InvalidPattern {
                    path: path.clone(),
                    pattern: pattern.clone(),
                    source,
                })?;
                compiled.push((regex, sub.clone()));
            }
            let _ = schema.computed.pattern_properties.set(compiled);
        }
        if let Some(required) = &schema.required {
            let _ = schema
                .computed
                .required
                .set(required.iter().cloned().collect());
        }

        for (token, child) in schema.children() {
            self.check_tree(child, format!("{}/{}", path, token))?;
        }
        Ok(())
    }

    fn resolve_base(&mut self, base_node: &SchemaRef, uri: String) -> Result<(), ResolveError> {
        debug!("registering schema base {:?}", uri);
        self.by_uri.insert(uri.clone(), base_node.clone());
        let _ = base_node.computed.uri.set(uri.clone());

        let mut anchors = HashMap::new();
        self.scan_scope(base_node, base_node, &uri, &mut anchors)?;
        let _ = base_node.computed.anchors.set(anchors);
        Ok(())
    }

    /// Walks a base's scope: everything under it up to (but not into)
    /// nested `$id` nodes, which open scopes of their own.
    fn scan_scope(
        &mut self,
        node: &SchemaRef,
        base_node: &SchemaRef,
        base_uri: &str,
        anchors: &mut HashMap<String, Anchor>,
    ) -> Result<(), ResolveError> {
        let _ = node.computed.base.set(Arc::downgrade(base_node));

        if let Some(name) = &node.anchor {
            register_anchor(anchors, name, node, false, base_uri)?;
        }
        if let Some(name) = &node.dynamic_anchor {
            register_anchor(anchors, name, node, true, base_uri)?;
        }

        for (_, child) in node.children() {
            if let Some(id) = &child.id {
                let child_path = child.path().unwrap_or("");
                let child_uri = id_uri(child_path, base_uri, id)?;
                self.resolve_base(child, child_uri)?;
            } else {
                self.scan_scope(child, base_node, base_uri, anchors)?;
            }
        }
        Ok(())
    }

    fn bind_refs(&mut self, node: &SchemaRef) -> Result<(), ResolveError> {
        if let Some(reference) = &node.ref_ {
            match self.locate(node, reference, false)? {
                RefTarget::Static(target) => {
                    let _ = node.computed.resolved_ref.set(Arc::downgrade(&target));
                }
                // Unreachable for a non-dynamic keyword; a static ref to a
                // dynamic anchor binds statically.
                RefTarget::Dynamic(_) => {}
            }
        }
        if let Some(reference) = &node.dynamic_ref {
            match self.locate(node, reference, true)? {
                RefTarget::Static(target) => {
                    let _ = node
                        .computed
                        .resolved_dynamic_ref
                        .set(Arc::downgrade(&target));
                }
                RefTarget::Dynamic(anchor) => {
                    let _ = node.computed.dynamic_ref_anchor.set(anchor);
                }
            }
        }

        for (_, child) in node.children() {
            self.bind_refs(child)?;
        }
        Ok(())
    }

    fn locate(
        &mut self,
        node: &SchemaRef,
        reference: &str,
        dynamic_keyword: bool,
    ) -> Result<RefTarget, ResolveError> {
        let path = node.path().unwrap_or("").to_owned();
        let base_uri = node
            .base()
            .and_then(|b| b.uri().map(str::to_owned))
            .unwrap_or_default();

        let full = resolve_uri(&base_uri, reference);
        let (without_fragment, fragment) = match full.find('#') {
            Some(i) => (full[..i].to_owned(), full[i + 1..].to_owned()),
            None => (full.clone(), String::new()),
        };

        let target_root = match self.by_uri.get(&without_fragment) {
            Some(target) => target.clone(),
            None => {
                debug!("loading remote schema {:?}", without_fragment);
                let loaded =
                    self.loader
                        .load(&without_fragment)
                        .map_err(|source| ResolveError::Loader {
                            uri: without_fragment.clone(),
                            source,
                        })?;
                let loaded = Arc::new(loaded);
                // Cache before resolving so reference cycles terminate: a
                // later reference to the same URI gets this handle even
                // while its own resolution is still in progress.
                self.by_uri.insert(without_fragment.clone(), loaded.clone());
                self.resolve_tree(&loaded, &without_fragment)?;
                loaded
            }
        };

        if fragment.is_empty() {
            return Ok(RefTarget::Static(target_root));
        }
        if fragment.starts_with('/') {
            let target = pointer::evaluate(&target_root, &fragment).map_err(|source| {
                ResolveError::UnresolvedPointer {
                    path,
                    uri: full.clone(),
                    source,
                }
            })?;
            return Ok(RefTarget::Static(target));
        }

        let anchor = target_root
            .anchors()
            .and_then(|anchors| anchors.get(fragment.as_str()))
            .cloned()
            .ok_or_else(|| ResolveError::MissingAnchor {
                anchor: fragment.clone(),
                uri: without_fragment.clone(),
            })?;

        if anchor.dynamic && dynamic_keyword {
            return Ok(RefTarget::Dynamic(fragment));
        }
        anchor
            .schema
            .upgrade()
            .map(RefTarget::Static)
            .ok_or(ResolveError::MissingAnchor {
                anchor: fragment,
                uri: without_fragment,
            })
    }
}

fn register_anchor(
    anchors: &mut HashMap<String, Anchor>,
    name: &str,
    node: &SchemaRef,
    dynamic: bool,
    base_uri: &str,
) -> Result<(), ResolveError> {
    let anchor = Anchor {
        schema: Arc::downgrade(node),
        dynamic,
    };
    if anchors.insert(name.to_owned(), anchor).is_some() {
        return Err(ResolveError::DuplicateAnchor {
            name: name.to_owned(),
            base: base_uri.to_owned(),
        });
    }
    Ok(())
}

fn id_uri(path: &str, parent_base_uri: &str, id: &str) -> Result<String, ResolveError> {
    if id.contains('#') {
        return Err(ResolveError::InvalidUri {
            path: path.to_owned(),
            uri: id.to_owned(),
        });
    }
    let resolved = resolve_uri(parent_base_uri, id);
    if Url::parse(&resolved).is_err() {
        return Err(ResolveError::NotAbsolute {
            path: path.to_owned(),
            uri: resolved,
        });
    }
    Ok(resolved)
}

/// Resolves `reference` against `base`. URIs are kept as strings so the
/// placeholder empty base and purely relative index keys stay
/// representable; `url` does the joining math whenever the base is a real
/// absolute URI.
fn resolve_uri(base: &str, reference: &str) -> String {
    if let Ok(absolute) = Url::parse(reference) {
        return absolute.into();
    }
    if let Ok(base) = Url::parse(base) {
        if let Ok(joined) = base.join(reference) {
            return joined.into();
        }
    }
    reference.to_owned()
}

fn check_defaults(node: &SchemaRef) -> Result<(), ResolveError> {
    if let Some(default) = &node.default {
        debug!("validating default value at {:?}", node.path());
        validate::validate_detached(node, default).map_err(|source| {
            ResolveError::InvalidDefault {
                path: node.path().unwrap_or("").to_owned(),
                source,
            }
        })?;
    }
    for (_, child) in node.children() {
        check_defaults(child)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_of(raw: serde_json::Value) -> Schema {
        Schema::from_serde_schema(serde_json::from_value(raw).unwrap()).unwrap()
    }

    #[test]
    fn shared_node_is_not_a_tree() {
        let shared = Arc::new(Schema::default());
        let schema = Schema {
            items: Some(shared.clone()),
            not: Some(shared),
            ..Default::default()
        };

        let err = schema.resolve(ResolveOptions::new()).unwrap_err();
        assert!(matches!(err, ResolveError::NotATree(_)));
        assert!(err.to_string().contains("tree"));
    }

    #[test]
    fn defs_and_definitions_conflict() {
        let schema = Schema {
            defs: Some(Default::default()),
            definitions: Some(Default::default()),
            ..Default::default()
        };
        assert!(matches!(
            schema.resolve(ResolveOptions::new()),
            Err(ResolveError::DefsAndDefinitions(_))
        ));
    }

    #[test]
    fn vocabulary_requires_meta_schema() {
        let schema = schema_of(json!({
            "$id": "https://example.com/s",
            "$vocabulary": { "https://json-schema.org/draft/2020-12/vocab/core": true },
        }));
        assert!(matches!(
            schema.resolve(ResolveOptions::new()),
            Err(ResolveError::UnsupportedVocabulary(_))
        ));
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let schema = schema_of(json!({ "pattern": "(" }));
        assert!(matches!(
            schema.resolve(ResolveOptions::new()),
            Err(ResolveError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn relative_id_requires_absolute_result() {
        let schema = schema_of(json!({ "$id": "relative" }));
        assert!(matches!(
            schema.resolve(ResolveOptions::new()),
            Err(ResolveError::NotAbsolute { .. })
        ));
    }

    #[test]
    fn id_with_fragment_is_rejected() {
        let schema = schema_of(json!({ "$id": "https://example.com/s#frag" }));
        assert!(matches!(
            schema.resolve(ResolveOptions::new()),
            Err(ResolveError::InvalidUri { .. })
        ));
    }

    #[test]
    fn duplicate_anchor_in_scope() {
        let schema = schema_of(json!({
            "items": { "$anchor": "a" },
            "not": { "$dynamicAnchor": "a" },
        }));
        assert!(matches!(
            schema.resolve(ResolveOptions::new()),
            Err(ResolveError::DuplicateAnchor { .. })
        ));
    }

    #[test]
    fn pointer_fragment_binds() {
        let schema = schema_of(json!({
            "$defs": { "a": { "type": "integer" } },
            "$ref": "#/$defs/a",
        }));
        let resolved = schema.resolve(ResolveOptions::new()).unwrap();
        let target = resolved.schema().resolved_ref().unwrap();
        assert_eq!(Some(crate::Type::Integer), target.type_);
    }

    #[test]
    fn missing_anchor_reported() {
        let schema = schema_of(json!({ "$ref": "#nowhere" }));
        assert!(matches!(
            schema.resolve(ResolveOptions::new()),
            Err(ResolveError::MissingAnchor { .. })
        ));
    }

    #[test]
    fn nested_id_opens_scope() {
        let schema = schema_of(json!({
            "$id": "https://example.com/root",
            "$defs": {
                "sub": { "$id": "sub", "$anchor": "inner" },
            },
            "$ref": "sub#inner",
        }));
        let resolved = schema
            .resolve(ResolveOptions::new().with_base_uri("https://example.com/root"))
            .unwrap();

        let sub = resolved.schema_by_uri("https://example.com/sub").unwrap();
        assert_eq!(Some("https://example.com/sub"), sub.uri());
        assert!(Arc::ptr_eq(
            sub,
            &resolved.schema().resolved_ref().unwrap()
        ));
    }

    #[test]
    fn loader_failure_is_fatal() {
        let schema = schema_of(json!({ "$ref": "b" }));
        let err = schema.resolve(ResolveOptions::new()).unwrap_err();
        assert!(matches!(err, ResolveError::Loader { .. }));
    }

    #[test]
    fn ref_cycle_resolves() {
        let a = schema_of(json!({ "$ref": "b" }));
        let loader = |uri: &str| -> Result<Schema, LoaderError> {
            match uri {
                "b" => Ok(Schema {
                    ref_: Some("a".to_owned()),
                    ..Default::default()
                }),
                other => Err(format!("unexpected load of {:?}", other).into()),
            }
        };

        let resolved = a
            .resolve(ResolveOptions::new().with_base_uri("a").with_loader(loader))
            .unwrap();

        let b = resolved.schema().resolved_ref().unwrap();
        assert_eq!(Some("a"), b.ref_.as_deref());
        // And b's own reference chains back to the root.
        assert!(Arc::ptr_eq(resolved.schema(), &b.resolved_ref().unwrap()));
    }

    #[test]
    fn valid_defaults_accepted() {
        let schema = schema_of(json!({
            "properties": { "a": { "type": "integer", "default": 7 } },
        }));
        assert!(schema
            .resolve(ResolveOptions::new().with_validate_defaults(true))
            .is_ok());
    }

    #[test]
    fn dynamic_ref_in_default_rejected() {
        let schema = schema_of(json!({
            "$defs": { "n": { "$dynamicAnchor": "x" } },
            "properties": { "a": { "$dynamicRef": "#x", "default": 1 } },
        }));
        match schema.resolve(ResolveOptions::new().with_validate_defaults(true)) {
            Err(ResolveError::InvalidDefault { source, .. }) => {
                assert_eq!(ValidateError::DynamicRefInDefault, source);
            }
            Err(other) => panic!("expected a default failure, got {:?}", other),
            Ok(_) => panic!("expected a default failure"),
        }
    }

    #[test]
    fn invalid_default_rejected() {
        let schema = schema_of(json!({
            "properties": { "a": { "type": "integer", "default": "seven" } },
        }));
        assert!(matches!(
            schema.resolve(ResolveOptions::new().with_validate_defaults(true)),
            Err(ResolveError::InvalidDefault { .. })
        ));
    }
}

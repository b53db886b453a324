//! Typed access to a resolved command through an explicit field map.
//!
//! A [`FieldMap`] pairs each option key with a setter on the caller's
//! struct. There is no reflection: a field is populated only if it is listed,
//! and listing a key the command does not declare is caught by
//! [`FieldMap::verify`] before anything runs.
//!
//! ```
//! use cmdfig::{CommandTree, FieldMap, OptionSpec, ResolutionContext, ResolveInput};
//!
//! #[derive(Default)]
//! struct Serve {
//!     host: String,
//!     port: u16,
//! }
//!
//! let mut b = CommandTree::builder("app");
//! let serve = b.command(b.root(), "serve");
//! b.option(serve, OptionSpec::string("host", "localhost"))
//!     .option(serve, OptionSpec::int("port", 8080));
//! let tree = b.build().unwrap();
//!
//! let fields = FieldMap::<Serve>::new()
//!     .string("host", |s, v| s.host = v)
//!     .int("port", |s, v: u16| s.port = v);
//! fields.verify(&tree, serve).unwrap();
//!
//! let mut ctx = ResolutionContext::new(&tree, ResolveInput::default());
//! ctx.resolve_path(serve).unwrap();
//! let cfg = ctx.resolved(serve).unwrap().materialize(&fields).unwrap();
//! assert_eq!(cfg.host, "localhost");
//! assert_eq!(cfg.port, 8080);
//! ```

use std::fmt;

use crate::coerce;
use crate::error::CmdfigError;
use crate::resolve::ResolvedConfig;
use crate::tree::{CommandTree, NodeId};
use crate::types::{Map, Value, ValueKind};

type Setter<T> = Box<dyn Fn(&mut T, &Value) -> Result<(), String>>;

struct Field<T> {
    key: String,
    kind: ValueKind,
    set: Setter<T>,
}

/// Key-to-setter table for building `T` from a [`ResolvedConfig`].
pub struct FieldMap<T> {
    fields: Vec<Field<T>>,
}

impl<T> Default for FieldMap<T> {
    fn default() -> Self {
        Self { fields: Vec::new() }
    }
}

impl<T> fmt::Debug for FieldMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.fields.iter().map(|fd| (&fd.key, fd.kind)))
            .finish()
    }
}

impl<T: 'static> FieldMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        mut self,
        key: &str,
        kind: ValueKind,
        set: impl Fn(&mut T, &Value) -> Result<(), String> + 'static,
    ) -> Self {
        self.fields.push(Field {
            key: key.to_string(),
            kind,
            set: Box::new(set),
        });
        self
    }

    pub fn string(self, key: &str, set: impl Fn(&mut T, String) + 'static) -> Self {
        self.push(key, ValueKind::String, move |target, value| {
            let s = value.as_str().ok_or_else(|| mismatch(ValueKind::String, value))?;
            set(target, s.to_string());
            Ok(())
        })
    }

    pub fn bool(self, key: &str, set: impl Fn(&mut T, bool) + 'static) -> Self {
        self.push(key, ValueKind::Bool, move |target, value| {
            let b = value.as_bool().ok_or_else(|| mismatch(ValueKind::Bool, value))?;
            set(target, b);
            Ok(())
        })
    }

    /// An integer field of any width. Values that do not fit fail with a
    /// range error.
    pub fn int<N>(self, key: &str, set: impl Fn(&mut T, N) + 'static) -> Self
    where
        N: TryFrom<i64> + 'static,
    {
        self.push(key, ValueKind::Int, move |target, value| {
            let i = value.as_int().ok_or_else(|| mismatch(ValueKind::Int, value))?;
            let n = N::try_from(i).map_err(|_| format!("{i} is out of range"))?;
            set(target, n);
            Ok(())
        })
    }

    pub fn float(self, key: &str, set: impl Fn(&mut T, f64) + 'static) -> Self {
        self.push(key, ValueKind::Float, move |target, value| {
            let f = value.as_float().ok_or_else(|| mismatch(ValueKind::Float, value))?;
            set(target, f);
            Ok(())
        })
    }

    pub fn map(self, key: &str, set: impl Fn(&mut T, Map) + 'static) -> Self {
        self.push(key, ValueKind::Map, move |target, value| {
            let m = value.as_map().ok_or_else(|| mismatch(ValueKind::Map, value))?;
            set(target, m.clone());
            Ok(())
        })
    }
}

impl<T> FieldMap<T> {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }

    /// Check every listed key against the options visible on `node`.
    pub fn verify(&self, tree: &CommandTree, node: NodeId) -> Result<(), CmdfigError> {
        let command = tree.dotted(node);
        for field in &self.fields {
            let Some(option) = tree.option(node, &field.key) else {
                return Err(CmdfigError::UnknownField {
                    command,
                    field: field.key.clone(),
                });
            };
            let declared = option.spec.kind();
            if declared != field.kind && !widens(declared, field.kind) {
                return Err(CmdfigError::FieldError {
                    command,
                    field: field.key.clone(),
                    reason: format!("option is {declared}, field expects {}", field.kind),
                });
            }
        }
        Ok(())
    }

    /// Build a `T` from its default, populating every listed field.
    /// Fails on the first field that cannot be set.
    pub fn materialize(&self, resolved: &ResolvedConfig) -> Result<T, CmdfigError>
    where
        T: Default,
    {
        let mut target = T::default();
        for field in &self.fields {
            let fail = |reason: String| CmdfigError::FieldError {
                command: resolved.command().to_string(),
                field: field.key.clone(),
                reason,
            };
            let Some(value) = resolved.get(&field.key) else {
                return Err(CmdfigError::UnknownField {
                    command: resolved.command().to_string(),
                    field: field.key.clone(),
                });
            };
            let value = coerce::convert(field.kind, value).map_err(fail)?;
            (field.set)(&mut target, &value).map_err(fail)?;
        }
        Ok(target)
    }
}

fn widens(declared: ValueKind, field: ValueKind) -> bool {
    matches!(
        (declared, field),
        (ValueKind::Int, ValueKind::Float)
            | (ValueKind::Bool | ValueKind::Int | ValueKind::Float, ValueKind::String)
    )
}

fn mismatch(expected: ValueKind, value: &Value) -> String {
    format!("expected {expected}, found {}", value.kind())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::sample_tree;
    use crate::resolve::{FlagValues, ResolutionContext, ResolveInput};

    #[derive(Debug, Default, PartialEq)]
    struct Serve {
        host: String,
        port: u16,
        ratio: f64,
        verbose: bool,
    }

    fn serve_fields() -> FieldMap<Serve> {
        FieldMap::new()
            .string("host", |s: &mut Serve, v| s.host = v)
            .int("port", |s: &mut Serve, v: u16| s.port = v)
            .float("ratio", |s: &mut Serve, v| s.ratio = v)
            .bool("verbose", |s: &mut Serve, v| s.verbose = v)
    }

    fn resolve_serve(flags: &[(&str, &str)]) -> ResolvedConfig {
        let tree = sample_tree();
        let serve = tree.lookup(&["serve"]).unwrap();
        let mut values = FlagValues::new();
        for (k, v) in flags {
            values.set(serve, k, v);
        }
        let mut ctx = ResolutionContext::new(
            &tree,
            ResolveInput {
                flags: values,
                ..ResolveInput::default()
            },
        );
        ctx.resolve_path(serve).unwrap();
        ctx.resolved(serve).unwrap().clone()
    }

    #[test]
    fn populates_listed_fields() {
        let cfg = serve_fields()
            .materialize(&resolve_serve(&[("port", "9000"), ("verbose", "true")]))
            .unwrap();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.ratio, 0.5);
        assert!(cfg.verbose);
    }

    #[test]
    fn verify_accepts_declared_keys() {
        let tree = sample_tree();
        let serve = tree.lookup(&["serve"]).unwrap();
        serve_fields().verify(&tree, serve).unwrap();
    }

    #[test]
    fn verify_rejects_undeclared_key() {
        let tree = sample_tree();
        let serve = tree.lookup(&["serve"]).unwrap();
        let fields = serve_fields().string("url", |_, _| {});
        match fields.verify(&tree, serve).unwrap_err() {
            CmdfigError::UnknownField { command, field } => {
                assert_eq!(command, "app.serve");
                assert_eq!(field, "url");
            }
            other => panic!("expected UnknownField, got {other:?}"),
        }
    }

    #[test]
    fn verify_rejects_kind_mismatch() {
        let tree = sample_tree();
        let serve = tree.lookup(&["serve"]).unwrap();
        let fields = FieldMap::<Serve>::new().bool("host", |_, _| {});
        assert!(matches!(
            fields.verify(&tree, serve),
            Err(CmdfigError::FieldError { .. })
        ));
    }

    #[test]
    fn verify_allows_int_into_float_field() {
        let tree = sample_tree();
        let serve = tree.lookup(&["serve"]).unwrap();
        let fields = FieldMap::<Serve>::new().float("port", |s, v| s.ratio = v);
        fields.verify(&tree, serve).unwrap();
    }

    #[test]
    fn out_of_range_int_names_field() {
        let err = serve_fields()
            .materialize(&resolve_serve(&[("port", "70000")]))
            .unwrap_err();
        match err {
            CmdfigError::FieldError { field, reason, .. } => {
                assert_eq!(field, "port");
                assert!(reason.contains("out of range"));
            }
            other => panic!("expected FieldError, got {other:?}"),
        }
    }

    #[test]
    fn materializing_twice_gives_identical_structs() {
        let resolved = resolve_serve(&[("host", "0.0.0.0"), ("ratio", "0.25")]);
        let fields = serve_fields();
        let first = fields.materialize(&resolved).unwrap();
        let second = fields.materialize(&resolved).unwrap();
        assert_eq!(first.host, second.host);
        assert_eq!(first.port, second.port);
        assert_eq!(first.ratio, second.ratio);
        assert_eq!(first.verbose, second.verbose);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_section_materializes_like_no_file() {
        use crate::file::{ConfigDocument, ConfigFormat};
        use crate::fixtures::test::scenario_tree;
        use std::path::Path;

        #[derive(Debug, Default, PartialEq)]
        struct Sub {
            foo: String,
        }

        let tree = scenario_tree();
        let sub = tree.lookup(&["sub"]).unwrap();
        let fields = FieldMap::<Sub>::new().string("foo", |s, v| s.foo = v);

        let resolve = |document: Option<ConfigDocument>| {
            let mut ctx = ResolutionContext::new(
                &tree,
                ResolveInput {
                    document,
                    ..ResolveInput::default()
                },
            );
            ctx.resolve_path(sub).unwrap();
            ctx.resolved(sub).unwrap().clone()
        };

        let doc = ConfigDocument::parse(Path::new("t.yaml"), "sub: {}\n", ConfigFormat::Yaml).unwrap();
        let with_empty = resolve(Some(doc));
        let without = resolve(None);
        assert_eq!(with_empty.to_json(), without.to_json());

        let a = fields.materialize(&with_empty).unwrap();
        let b = fields.materialize(&without).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.foo, "d");
    }

    #[test]
    fn debug_lists_keys_and_kinds() {
        let out = format!("{:?}", serve_fields());
        assert!(out.contains("\"port\": Int"));
    }
}

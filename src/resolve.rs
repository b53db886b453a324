//! The resolution pass: fold flags, environment, config file and defaults
//! into one immutable snapshot per command.
//!
//! Operates on pre-loaded data ([`ResolveInput`]) with no I/O, so the whole
//! pipeline is testable with synthetic inputs. For each command, parents
//! first:
//!
//! 1. Derive the section path
//! 2. Register defaults for every visible option
//! 3. Bind explicitly passed flags
//! 4. Register the environment prefix and bind matching variables
//! 5. Build the file layer (inherited persistent values + own section) and
//!    inject it below environment and flags
//! 6. Select each value by precedence and freeze the snapshot
//!
//! Each command is resolved at most once; asking again returns the cached
//! snapshot. A child cannot be resolved before its parent.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;

use serde::Serialize;

use crate::env::{EnvBinding, EnvVars};
use crate::error::CmdfigError;
use crate::file::ConfigDocument;
use crate::layers::{LayeredStore, ResolvedValue};
use crate::materialize::FieldMap;
use crate::merge;
use crate::section::SectionPath;
use crate::tree::{CommandTree, NodeId};
use crate::types::{Map, Source, Value};

/// Flag values the user passed explicitly, per command.
///
/// Flags left at their defaults must not appear here; see
/// [`LayeredStore::bind_flag`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagValues {
    values: BTreeMap<NodeId, BTreeMap<String, String>>,
}

impl FlagValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, node: NodeId, key: &str, raw: &str) {
        self.values
            .entry(node)
            .or_default()
            .insert(key.to_string(), raw.to_string());
    }

    pub fn get(&self, node: NodeId, key: &str) -> Option<&str> {
        self.values.get(&node)?.get(key).map(String::as_str)
    }

    pub fn for_node(&self, node: NodeId) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .get(&node)
            .into_iter()
            .flatten()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(BTreeMap::is_empty)
    }
}

/// All pre-loaded data needed for a resolution pass. No I/O happens past this point.
#[derive(Debug, Clone, Default)]
pub struct ResolveInput {
    /// The loaded config file, `None` if no file applied.
    pub document: Option<ConfigDocument>,
    /// Environment snapshot (`EnvVars::from_process()` or synthetic data).
    pub env: EnvVars,
    /// Explicit flag values.
    pub flags: FlagValues,
}

/// The resolved options of one command. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
    command: String,
    values: BTreeMap<String, ResolvedValue>,
}

impl ResolvedConfig {
    /// Dotted section path of the command.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn entry(&self, key: &str) -> Option<&ResolvedValue> {
        self.values.get(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entry(key).map(|e| &e.value)
    }

    pub fn source(&self, key: &str) -> Option<Source> {
        self.entry(key).map(|e| e.source)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.as_bool()
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key)?.as_int()
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_float()
    }

    pub fn get_map(&self, key: &str) -> Option<&Map> {
        self.get(key)?.as_map()
    }

    /// Options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Stable JSON rendering: keys sorted, each value with its source.
    pub fn to_json(&self) -> String {
        // Maps with string keys and plain values always serialize.
        serde_json::to_string(&self.values).unwrap_or_default()
    }

    /// Build a typed struct through an explicit field map.
    pub fn materialize<T: Default>(&self, fields: &FieldMap<T>) -> Result<T, CmdfigError> {
        fields.materialize(self)
    }
}

/// Snapshots for every command resolved in a pass. Handed to command logic
/// read-only.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    resolved: BTreeMap<NodeId, ResolvedConfig>,
}

impl Resolution {
    pub fn get(&self, node: NodeId) -> Option<&ResolvedConfig> {
        self.resolved.get(&node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.resolved.contains_key(&node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ResolvedConfig)> {
        self.resolved.iter().map(|(id, r)| (*id, r))
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

/// State of one resolution pass. Owned by the bootstrap routine and passed
/// by reference; nothing else holds on to it.
#[derive(Debug)]
pub struct ResolutionContext<'t> {
    tree: &'t CommandTree,
    document: Option<ConfigDocument>,
    env: EnvVars,
    flags: FlagValues,
    layers: BTreeMap<NodeId, Map>,
    resolved: BTreeMap<NodeId, ResolvedConfig>,
}

impl<'t> ResolutionContext<'t> {
    pub fn new(tree: &'t CommandTree, input: ResolveInput) -> Self {
        Self {
            tree,
            document: input.document,
            env: input.env,
            flags: input.flags,
            layers: BTreeMap::new(),
            resolved: BTreeMap::new(),
        }
    }

    pub fn tree(&self) -> &'t CommandTree {
        self.tree
    }

    pub fn document(&self) -> Option<&ConfigDocument> {
        self.document.as_ref()
    }

    /// Path of the loaded config file, if any.
    pub fn config_file(&self) -> Option<&Path> {
        self.document.as_ref().map(ConfigDocument::path)
    }

    /// Resolve `node`. Its parent must already be resolved.
    pub fn resolve(&mut self, node: NodeId) -> Result<&ResolvedConfig, CmdfigError> {
        if let Some(parent) = self.tree.parent(node)
            && !self.resolved.contains_key(&parent)
        {
            return Err(CmdfigError::OutOfOrder {
                command: self.tree.dotted(node),
                parent: self.tree.dotted(parent),
            });
        }

        match self.resolved.entry(node) {
            Entry::Occupied(done) => {
                tracing::trace!(command = %done.get().command, "already resolved");
                Ok(done.into_mut())
            }
            Entry::Vacant(slot) => {
                let parent_layer = self.tree.parent(node).and_then(|p| self.layers.get(&p));
                let (layer, resolved) = resolve_node(
                    self.tree,
                    node,
                    self.document.as_ref(),
                    &self.env,
                    &self.flags,
                    parent_layer,
                )?;
                self.layers.insert(node, layer);
                Ok(slot.insert(resolved))
            }
        }
    }

    /// Resolve every command from the root down to `leaf`.
    pub fn resolve_path(&mut self, leaf: NodeId) -> Result<(), CmdfigError> {
        for id in self.tree.path_to(leaf) {
            self.resolve(id)?;
        }
        Ok(())
    }

    /// Resolve the whole tree, parents first.
    pub fn resolve_all(&mut self) -> Result<(), CmdfigError> {
        for id in self.tree.preorder() {
            self.resolve(id)?;
        }
        Ok(())
    }

    pub fn resolved(&self, node: NodeId) -> Option<&ResolvedConfig> {
        self.resolved.get(&node)
    }

    /// End the pass and hand the snapshots over read-only.
    pub fn finish(self) -> Resolution {
        Resolution {
            resolved: self.resolved,
        }
    }
}

/// One command's pass. Returns the file layer (for its children) and the
/// frozen snapshot.
fn resolve_node(
    tree: &CommandTree,
    node: NodeId,
    document: Option<&ConfigDocument>,
    env: &EnvVars,
    flags: &FlagValues,
    parent_layer: Option<&Map>,
) -> Result<(Map, ResolvedConfig), CmdfigError> {
    let path = SectionPath::of(tree, node);
    let command = path.dotted();
    tracing::trace!(command = %command, "resolving");

    let mut store = LayeredStore::new(&command, &tree.effective_options(node));

    for (key, raw) in flags.for_node(node) {
        store.bind_flag(key, raw)?;
    }

    let binding = EnvBinding::for_section(&path);
    tracing::trace!(command = %command, prefix = binding.prefix(), "environment prefix registered");
    store.bind_env(&binding, env)?;

    let layer = merge::file_layer(tree, node, &path, document, parent_layer);
    let injected = store.inject_file_layer(&layer)?;

    let resolved = ResolvedConfig {
        command,
        values: store.select(),
    };
    tracing::debug!(command = %resolved.command, injected, "resolved");
    tracing::trace!(command = %resolved.command, settings = %resolved.to_json(), "resolved settings");

    Ok((layer, resolved))
}

//! Config-file side of the merge: which file values a command sees.
//!
//! A command's file layer is built from two parts:
//!
//! 1. the file values its parent saw for the persistent options this command
//!    inherits, so a persistent option set in an ancestor's section carries
//!    down the tree;
//! 2. the command's own section, deep-merged on top.
//!
//! The layer is then injected into the command's
//! [`LayeredStore`](crate::layers::LayeredStore), below environment and flags.
//! Sibling sections never meet: each layer derives only from its own
//! ancestors.

use crate::file::ConfigDocument;
use crate::section::SectionPath;
use crate::tree::{CommandTree, NodeId};
use crate::types::{Map, Value};

/// Deep-merge `overlay` on top of `base`.
/// If both sides have a map for the same key, recurse.
/// Otherwise, `overlay`'s value wins.
pub fn deep_merge(mut base: Map, overlay: Map) -> Map {
    for (key, overlay_val) in overlay {
        match (base.remove(&key), overlay_val) {
            (Some(Value::Map(base_map)), Value::Map(overlay_map)) => {
                base.insert(key, Value::Map(deep_merge(base_map, overlay_map)));
            }
            (_, overlay_val) => {
                base.insert(key, overlay_val);
            }
        }
    }
    base
}

/// Build the file layer for `node`.
///
/// `parent_layer` is the layer built for the parent, `None` for the root.
/// With no document at all the layer is empty and the command resolves from
/// flags, environment and defaults alone.
pub fn file_layer(
    tree: &CommandTree,
    node: NodeId,
    path: &SectionPath,
    document: Option<&ConfigDocument>,
    parent_layer: Option<&Map>,
) -> Map {
    let Some(document) = document else {
        tracing::trace!(command = %path, "no config file loaded");
        return Map::new();
    };

    let inherited: Map = parent_layer
        .into_iter()
        .flatten()
        .filter(|(key, _)| {
            tree.option(node, key)
                .is_some_and(|o| o.is_inherited(node))
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let own = match document.subsection(path) {
        Some(section) if !section.is_empty() => section.clone(),
        _ => {
            tracing::trace!(command = %path, "no config found for section");
            Map::new()
        }
    };

    deep_merge(inherited, own)
}

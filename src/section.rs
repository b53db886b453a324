//! Section paths: where a command's options live in the config file and
//! which environment prefix they answer to.
//!
//! A section path is the chain of command names from the root to a node. It
//! has two renderings:
//!
//! | Command            | `dotted()`             | `env_prefix()`        |
//! |--------------------|------------------------|-----------------------|
//! | `app`              | `app`                  | `APP`                 |
//! | `app serve`        | `app.serve`            | `APP_SERVE`           |
//! | `app db zu-lu`     | `app.db.zu-lu`         | `APP_DB_ZU_LU`        |
//!
//! Paths are derived on demand by walking parent indices; the tree never
//! changes shape after assembly, so the result is stable for a run.

use std::fmt;

use crate::tree::{CommandTree, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionPath {
    segments: Vec<String>,
}

impl SectionPath {
    /// Derive the path of `node` by walking parent indices up to the root.
    pub fn of(tree: &CommandTree, node: NodeId) -> Self {
        let mut segments: Vec<String> = tree
            .ancestors(node)
            .map(|id| tree.node(id).name().to_string())
            .collect();
        segments.reverse();
        Self { segments }
    }

    /// Names from the root to the node, root first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Names below the root, i.e. the path of the node inside a document
    /// whose top level is the root's own section.
    pub fn relative_segments(&self) -> &[String] {
        &self.segments[1..]
    }

    pub fn depth(&self) -> usize {
        self.segments.len() - 1
    }

    /// File-addressing form: `root.sub.leaf`.
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }

    /// Environment form: `ROOT_SUB_LEAF`, with hyphens turned into underscores.
    pub fn env_prefix(&self) -> String {
        self.segments
            .iter()
            .map(|s| env_segment(s))
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl fmt::Display for SectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

/// Uppercase a name and turn `-` into `_`. Shared with option names so that
/// both halves of an environment variable follow the same rule.
pub(crate) fn env_segment(name: &str) -> String {
    name.to_uppercase().replace('-', "_")
}

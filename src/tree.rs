//! The command tree and its option registry.
//!
//! Commands live in an arena and refer to their parent by index, so walking
//! from a leaf to the root never touches a reference cycle. A tree is
//! assembled once through [`TreeBuilder`] and is immutable afterwards.
//!
//! [`TreeBuilder::build`] is where misconfiguration is caught: every check
//! that depends only on the shape of the tree runs there, so a bad tree never
//! reaches the resolution pass.
//!
//! - command names are non-empty and contain no `.` or whitespace
//! - no two commands share a dotted section path or an environment prefix
//! - no descendant reuses the root command's name
//! - option names are lowercase and unique per command
//! - no command re-declares a persistent option it inherits
//! - no option shares its name with a subcommand (both would own the same
//!   key in the config file)
//! - no two (command, option) pairs map to the same environment variable

use std::collections::HashMap;

use crate::error::CmdfigError;
use crate::section::{SectionPath, env_segment};
use crate::types::{Map, Value, ValueKind};

/// Option name reserved for the config file flag (`--config`, `<APP>_CONFIG`).
pub const CONFIG_OPTION: &str = "config";

/// Option name clap claims on every command (`--help`).
const HELP_OPTION: &str = "help";

const RESERVED_SHORTS: [char; 2] = ['c', 'h'];

/// Index of a command in its [`CommandTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A declared option. The kind is taken from the default value.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    name: String,
    default: Value,
    persistent: bool,
    short: Option<char>,
    help: Option<String>,
}

impl OptionSpec {
    pub fn new(name: &str, default: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            default: default.into(),
            persistent: false,
            short: None,
            help: None,
        }
    }

    pub fn string(name: &str, default: &str) -> Self {
        Self::new(name, default)
    }

    pub fn bool(name: &str, default: bool) -> Self {
        Self::new(name, default)
    }

    pub fn int(name: &str, default: i64) -> Self {
        Self::new(name, default)
    }

    pub fn float(name: &str, default: f64) -> Self {
        Self::new(name, default)
    }

    pub fn map(name: &str, default: Map) -> Self {
        Self::new(name, default)
    }

    /// Expose this option to every descendant command.
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn short(mut self, c: char) -> Self {
        self.short = Some(c);
        self
    }

    pub fn help(mut self, text: &str) -> Self {
        self.help = Some(text.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.default.kind()
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn short_flag(&self) -> Option<char> {
        self.short
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct CommandNode {
    name: String,
    about: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    options: Vec<OptionSpec>,
}

impl CommandNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn about(&self) -> Option<&str> {
        self.about.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Options declared on this command, persistent or not.
    pub fn local_options(&self) -> &[OptionSpec] {
        &self.options
    }
}

/// An option as seen from a particular command: either declared there or
/// inherited as a persistent option from an ancestor.
#[derive(Debug, Clone, Copy)]
pub struct EffectiveOption<'a> {
    pub spec: &'a OptionSpec,
    pub declared_at: NodeId,
}

impl EffectiveOption<'_> {
    pub fn is_inherited(&self, at: NodeId) -> bool {
        self.declared_at != at
    }
}

#[derive(Debug, Clone)]
pub struct CommandTree {
    nodes: Vec<CommandNode>,
}

impl CommandTree {
    pub fn builder(root_name: &str) -> TreeBuilder {
        TreeBuilder {
            nodes: vec![CommandNode {
                name: root_name.to_string(),
                about: None,
                parent: None,
                children: Vec::new(),
                options: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `id` was issued by a different tree and is out of range.
    pub fn node(&self, id: NodeId) -> &CommandNode {
        &self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// The direct child of `id` named `name`.
    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|c| self.node(*c).name == name)
    }

    /// Find a command by its names below the root (`&["db", "migrate"]`).
    pub fn lookup(&self, path: &[&str]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root(), |id, name| self.child(id, name))
    }

    /// `id` and then each of its ancestors, ending at the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), |n| self.parent(*n))
    }

    /// The chain of commands from the root down to `id`, inclusive.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain: Vec<NodeId> = self.ancestors(id).collect();
        chain.reverse();
        chain
    }

    /// Every command, parents before children, siblings in declaration order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    /// Options visible on `id`: persistent options of its ancestors (root
    /// first) followed by its own options.
    pub fn effective_options(&self, id: NodeId) -> Vec<EffectiveOption<'_>> {
        let mut out = Vec::new();
        for at in self.path_to(id) {
            for spec in &self.node(at).options {
                if at == id || spec.persistent {
                    out.push(EffectiveOption {
                        spec,
                        declared_at: at,
                    });
                }
            }
        }
        out
    }

    pub fn option(&self, id: NodeId, key: &str) -> Option<EffectiveOption<'_>> {
        self.effective_options(id)
            .into_iter()
            .find(|o| o.spec.name == key)
    }

    pub(crate) fn dotted(&self, id: NodeId) -> String {
        SectionPath::of(self, id).dotted()
    }
}

/// Assembles a [`CommandTree`]. Nodes are appended, so a parent always has a
/// smaller index than its children.
#[derive(Debug)]
pub struct TreeBuilder {
    nodes: Vec<CommandNode>,
}

impl TreeBuilder {
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Add a subcommand under `parent`.
    pub fn command(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(CommandNode {
            name: name.to_string(),
            about: None,
            parent: Some(parent),
            children: Vec::new(),
            options: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn about(&mut self, node: NodeId, text: &str) -> &mut Self {
        self.nodes[node.0].about = Some(text.to_string());
        self
    }

    pub fn option(&mut self, node: NodeId, spec: OptionSpec) -> &mut Self {
        self.nodes[node.0].options.push(spec);
        self
    }

    /// Validate and freeze the tree.
    pub fn build(self) -> Result<CommandTree, CmdfigError> {
        let tree = CommandTree { nodes: self.nodes };
        validate_names(&tree)?;
        validate_sections(&tree)?;
        validate_options(&tree)?;
        validate_env_vars(&tree)?;
        Ok(tree)
    }
}

fn validate_names(tree: &CommandTree) -> Result<(), CmdfigError> {
    let root_name = tree.node(tree.root()).name();
    for id in tree.preorder() {
        let name = tree.node(id).name();
        let reason = if name.is_empty() {
            Some("command names cannot be empty".to_string())
        } else if name.contains('.') {
            Some("'.' separates config sections".to_string())
        } else if name.chars().any(char::is_whitespace) {
            Some("command names cannot contain whitespace".to_string())
        } else if name.starts_with('-') {
            Some("command names cannot start with '-'".to_string())
        } else if id != tree.root() && name == root_name {
            Some(format!(
                "'{}' reuses the root command name",
                tree.dotted(id)
            ))
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(CmdfigError::InvalidCommandName {
                name: name.to_string(),
                reason,
            });
        }
    }
    Ok(())
}

fn validate_sections(tree: &CommandTree) -> Result<(), CmdfigError> {
    let mut dotted: HashMap<String, NodeId> = HashMap::new();
    let mut prefixes: HashMap<String, NodeId> = HashMap::new();

    for id in tree.preorder() {
        let path = SectionPath::of(tree, id);
        if let Some(first) = dotted.insert(path.dotted(), id) {
            return Err(CmdfigError::SectionCollision {
                first: tree.dotted(first),
                second: path.dotted(),
                rendering: "section path",
                value: path.dotted(),
            });
        }
        if let Some(first) = prefixes.insert(path.env_prefix(), id) {
            return Err(CmdfigError::SectionCollision {
                first: tree.dotted(first),
                second: path.dotted(),
                rendering: "environment prefix",
                value: path.env_prefix(),
            });
        }
    }
    Ok(())
}

fn validate_options(tree: &CommandTree) -> Result<(), CmdfigError> {
    let root_name = tree.node(tree.root()).name();
    for id in tree.preorder() {
        let node = tree.node(id);
        let command = tree.dotted(id);

        for (i, spec) in node.options.iter().enumerate() {
            let conflict = |reason: String| CmdfigError::OptionConflict {
                command: command.clone(),
                key: spec.name.clone(),
                reason,
            };

            check_option_name(&command, root_name, spec)?;

            if node.options[..i].iter().any(|o| o.name == spec.name) {
                return Err(conflict("another option of the same command".into()));
            }

            let inherited = tree
                .parent(id)
                .and_then(|p| tree.option(p, &spec.name))
                .filter(|o| o.spec.persistent);
            if let Some(inherited) = inherited {
                let mut reason = format!(
                    "the persistent option inherited from '{}'",
                    tree.dotted(inherited.declared_at)
                );
                if inherited.spec.kind() != spec.kind() {
                    reason.push_str(&format!(
                        " ({} there, {} here)",
                        inherited.spec.kind(),
                        spec.kind()
                    ));
                }
                return Err(conflict(reason));
            }
        }

        // Options visible here must not own a key that a subcommand's
        // section also owns.
        for option in tree.effective_options(id) {
            if tree.child(id, option.spec.name()).is_some() {
                return Err(CmdfigError::OptionConflict {
                    command: command.clone(),
                    key: option.spec.name.clone(),
                    reason: format!("the section of subcommand '{}'", option.spec.name),
                });
            }
        }

        let mut shorts: HashMap<char, &str> = HashMap::new();
        for option in tree.effective_options(id) {
            let Some(c) = option.spec.short else {
                continue;
            };
            let clash = if RESERVED_SHORTS.contains(&c) {
                Some(format!("the reserved short flag -{c}"))
            } else {
                shorts
                    .insert(c, option.spec.name())
                    .map(|other| format!("option '{other}' on short flag -{c}"))
            };
            if let Some(reason) = clash {
                return Err(CmdfigError::OptionConflict {
                    command: command.clone(),
                    key: option.spec.name.clone(),
                    reason,
                });
            }
        }
    }
    Ok(())
}

fn check_option_name(command: &str, root_name: &str, spec: &OptionSpec) -> Result<(), CmdfigError> {
    let invalid = |reason: &str| CmdfigError::InvalidOption {
        command: command.to_string(),
        key: spec.name.clone(),
        reason: reason.to_string(),
    };

    if spec.name == CONFIG_OPTION {
        return Err(invalid("'config' is reserved for the config file flag"));
    }
    if spec.name == HELP_OPTION {
        return Err(invalid("'help' is reserved for the help flag"));
    }
    if spec.name == root_name {
        // A top-level key named like the root marks a rooted document.
        return Err(invalid("option names cannot match the root command"));
    }
    let mut chars = spec.name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return Err(invalid("option names start with a lowercase letter or digit")),
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_') {
        return Err(invalid(
            "option names use lowercase letters, digits, '-' and '_'",
        ));
    }
    Ok(())
}

fn validate_env_vars(tree: &CommandTree) -> Result<(), CmdfigError> {
    let mut claimed: HashMap<String, (NodeId, &str)> = HashMap::new();

    for id in tree.preorder() {
        let prefix = SectionPath::of(tree, id).env_prefix();
        for option in tree.effective_options(id) {
            let var = format!("{prefix}_{}", env_segment(option.spec.name()));
            if let Some((first, first_key)) = claimed.insert(var.clone(), (id, option.spec.name()))
            {
                return Err(CmdfigError::EnvVarCollision {
                    var,
                    first: format!("{}:{first_key}", tree.dotted(first)),
                    second: format!("{}:{}", tree.dotted(id), option.spec.name()),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::sample_tree;

    #[test]
    fn lookup_walks_children() {
        let tree = sample_tree();
        let migrate = tree.lookup(&["db", "migrate"]).unwrap();
        assert_eq!(tree.node(migrate).name(), "migrate");
        assert!(tree.lookup(&["db", "missing"]).is_none());
        assert_eq!(tree.lookup(&[]), Some(tree.root()));
    }

    #[test]
    fn path_to_is_root_first() {
        let tree = sample_tree();
        let leaf = tree.lookup(&["db", "zu-lu"]).unwrap();
        let names: Vec<&str> = tree
            .path_to(leaf)
            .into_iter()
            .map(|id| tree.node(id).name())
            .collect();
        assert_eq!(names, ["app", "db", "zu-lu"]);
    }

    #[test]
    fn preorder_visits_parents_first() {
        let tree = sample_tree();
        let order = tree.preorder();
        assert_eq!(order.len(), tree.len());
        for (pos, id) in order.iter().enumerate() {
            if let Some(parent) = tree.parent(*id) {
                assert!(order[..pos].contains(&parent));
            }
        }
    }

    #[test]
    fn effective_options_include_inherited_persistent_only() {
        let tree = sample_tree();
        let migrate = tree.lookup(&["db", "migrate"]).unwrap();
        let names: Vec<&str> = tree
            .effective_options(migrate)
            .iter()
            .map(|o| o.spec.name())
            .collect();
        // root persistent, db persistent, then local
        assert_eq!(names, ["verbose", "log-level", "url", "dry-run", "labels"]);
        assert!(!names.contains(&"name")); // root local
        assert!(!names.contains(&"pool-size")); // db local
    }

    #[test]
    fn inherited_option_reports_origin() {
        let tree = sample_tree();
        let migrate = tree.lookup(&["db", "migrate"]).unwrap();
        let url = tree.option(migrate, "url").unwrap();
        assert_eq!(url.declared_at, tree.lookup(&["db"]).unwrap());
        assert!(url.is_inherited(migrate));
    }

    #[test]
    fn kind_comes_from_default() {
        assert_eq!(OptionSpec::int("port", 1).kind(), ValueKind::Int);
        assert_eq!(OptionSpec::map("labels", Map::new()).kind(), ValueKind::Map);
    }

    #[test]
    fn rejects_dotted_command_name() {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        b.command(root, "a.b");
        let err = b.build().unwrap_err();
        assert!(matches!(err, CmdfigError::InvalidCommandName { .. }));
    }

    #[test]
    fn rejects_duplicate_siblings() {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        b.command(root, "serve");
        b.command(root, "serve");
        let err = b.build().unwrap_err();
        match err {
            CmdfigError::SectionCollision { rendering, value, .. } => {
                assert_eq!(rendering, "section path");
                assert_eq!(value, "app.serve");
            }
            other => panic!("expected SectionCollision, got {other:?}"),
        }
    }

    #[test]
    fn rejects_env_prefix_collision_across_branches() {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        let ab = b.command(root, "a-b");
        b.command(ab, "c");
        let a = b.command(root, "a");
        b.command(a, "b-c");
        let err = b.build().unwrap_err();
        match err {
            CmdfigError::SectionCollision { rendering, value, .. } => {
                assert_eq!(rendering, "environment prefix");
                assert_eq!(value, "APP_A_B_C");
            }
            other => panic!("expected SectionCollision, got {other:?}"),
        }
    }

    #[test]
    fn rejects_descendant_named_like_root() {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        let db = b.command(root, "db");
        b.command(db, "app");
        assert!(matches!(
            b.build(),
            Err(CmdfigError::InvalidCommandName { .. })
        ));
    }

    #[test]
    fn same_name_at_different_branches_is_fine() {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        let one = b.command(root, "one");
        let two = b.command(root, "two");
        b.command(one, "list");
        b.command(two, "list");
        assert!(b.build().is_ok());
    }

    #[test]
    fn rejects_redeclared_persistent_option() {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        b.option(root, OptionSpec::bool("verbose", false).persistent());
        let sub = b.command(root, "sub");
        b.option(sub, OptionSpec::string("verbose", "yes"));
        let err = b.build().unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, CmdfigError::OptionConflict { .. }));
        assert!(msg.contains("app.sub"));
        assert!(msg.contains("a bool there, a string here"));
    }

    #[test]
    fn local_root_option_does_not_block_child() {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        b.option(root, OptionSpec::string("name", "x"));
        let sub = b.command(root, "sub");
        b.option(sub, OptionSpec::string("name", "y"));
        assert!(b.build().is_ok());
    }

    #[test]
    fn rejects_duplicate_option_on_one_command() {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        b.option(root, OptionSpec::string("name", "x"));
        b.option(root, OptionSpec::int("name", 1));
        assert!(matches!(b.build(), Err(CmdfigError::OptionConflict { .. })));
    }

    #[test]
    fn rejects_option_shadowing_subcommand() {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        b.option(root, OptionSpec::string("serve", "x"));
        b.command(root, "serve");
        let err = b.build().unwrap_err();
        assert!(err.to_string().contains("subcommand 'serve'"));
    }

    #[test]
    fn rejects_reserved_config_option() {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        b.option(root, OptionSpec::string("config", ""));
        assert!(matches!(b.build(), Err(CmdfigError::InvalidOption { .. })));
    }

    #[test]
    fn rejects_reserved_help_option() {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        let sub = b.command(root, "sub");
        b.option(sub, OptionSpec::bool("help", false));
        match b.build().unwrap_err() {
            CmdfigError::InvalidOption { command, key, .. } => {
                assert_eq!(command, "app.sub");
                assert_eq!(key, "help");
            }
            other => panic!("expected InvalidOption, got {other:?}"),
        }
    }

    #[test]
    fn rejects_option_named_like_root() {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        b.option(root, OptionSpec::map("app", Map::new()));
        let err = b.build().unwrap_err();
        assert!(matches!(err, CmdfigError::InvalidOption { ref key, .. } if key == "app"));
        assert!(err.to_string().contains("root command"));
    }

    #[test]
    fn rejects_uppercase_option() {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        b.option(root, OptionSpec::string("Name", ""));
        assert!(matches!(b.build(), Err(CmdfigError::InvalidOption { .. })));
    }

    #[test]
    fn rejects_env_var_collision_between_commands() {
        // app:sub-foo and app.sub:foo both want APP_SUB_FOO
        let mut b = CommandTree::builder("app");
        let root = b.root();
        b.option(root, OptionSpec::string("sub-foo", ""));
        let sub = b.command(root, "sub");
        b.option(sub, OptionSpec::string("foo", ""));
        let err = b.build().unwrap_err();
        match err {
            CmdfigError::EnvVarCollision { var, first, second } => {
                assert_eq!(var, "APP_SUB_FOO");
                assert_eq!(first, "app:sub-foo");
                assert_eq!(second, "app.sub:foo");
            }
            other => panic!("expected EnvVarCollision, got {other:?}"),
        }
    }

    #[test]
    fn rejects_reserved_and_duplicate_shorts() {
        let mut b = CommandTree::builder("app");
        let root = b.root();
        b.option(root, OptionSpec::bool("cache", false).short('c'));
        assert!(matches!(b.build(), Err(CmdfigError::OptionConflict { .. })));

        let mut b = CommandTree::builder("app");
        let root = b.root();
        b.option(root, OptionSpec::bool("toggle", false).short('t').persistent());
        let sub = b.command(root, "sub");
        b.option(sub, OptionSpec::bool("trace", false).short('t'));
        let err = b.build().unwrap_err();
        assert!(err.to_string().contains("-t"));
    }
}

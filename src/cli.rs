//! Clap adapter for cmdfig.
//!
//! Compiled only with the `clap` Cargo feature (on by default). The core
//! never sees clap types: [`command`] turns a [`CommandTree`] into a
//! `clap::Command`, and [`invocation`] reads the parsed matches back into
//! plain data ([`Invocation`]) that the builder consumes.
//!
//! Generated arguments:
//!
//! - a global `-c/--config <FILE>` on the root;
//! - one `--<option>` per scalar option, with the option's short flag and
//!   help, the default appended to the help text;
//! - persistent options as `global` args, so they are accepted after any
//!   descendant subcommand;
//! - bool options accept a bare `--flag` (true) or `--flag=<bool>`.
//!
//! Map options have no flag; they come from the config file only.
//!
//! Only values the user actually typed end up in [`Invocation::flags`]; a
//! flag left at its default never outranks the config file.

use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{Arg, ArgMatches, Command, value_parser};

use crate::error::CmdfigError;
use crate::resolve::FlagValues;
use crate::tree::{CONFIG_OPTION, CommandTree, NodeId, OptionSpec};
use crate::types::ValueKind;

/// What the command line asked for, with clap out of the picture.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Active commands, root first.
    pub path: Vec<NodeId>,
    /// Explicitly passed flag values, recorded for every command on the path
    /// that can see the option.
    pub flags: FlagValues,
    /// `--config`, if given.
    pub config: Option<PathBuf>,
}

impl Invocation {
    /// The command that was invoked.
    pub fn leaf(&self) -> Option<NodeId> {
        self.path.last().copied()
    }
}

/// Build the clap command tree for `tree`.
pub fn command(tree: &CommandTree) -> Command {
    let root = build_command(tree, tree.root());
    root.arg(
        Arg::new(CONFIG_OPTION)
            .short('c')
            .long(CONFIG_OPTION)
            .value_name("FILE")
            .value_parser(value_parser!(PathBuf))
            .global(true)
            .help("Config file (overrides discovery)"),
    )
}

fn build_command(tree: &CommandTree, id: NodeId) -> Command {
    let node = tree.node(id);
    let mut cmd = Command::new(node.name().to_string());
    if let Some(about) = node.about() {
        cmd = cmd.about(about.to_string());
    }
    for spec in node.local_options() {
        if let Some(arg) = option_arg(spec) {
            cmd = cmd.arg(arg);
        }
    }
    for &child in tree.children(id) {
        cmd = cmd.subcommand(build_command(tree, child));
    }
    cmd
}

fn option_arg(spec: &OptionSpec) -> Option<Arg> {
    let kind = spec.kind();
    if kind == ValueKind::Map {
        return None;
    }

    let default = spec.default_value().to_string();
    let help = match spec.help_text() {
        Some(text) => format!("{text} [default: {default}]"),
        None => format!("[default: {default}]"),
    };

    let mut arg = Arg::new(spec.name().to_string())
        .long(spec.name().to_string())
        .help(help)
        .global(spec.is_persistent());
    if let Some(c) = spec.short_flag() {
        arg = arg.short(c);
    }
    arg = match kind {
        ValueKind::Bool => arg
            .value_name("BOOL")
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true"),
        ValueKind::Int => arg.value_name("INT"),
        ValueKind::Float => arg.value_name("FLOAT"),
        _ => arg.value_name("VALUE"),
    };
    Some(arg)
}

/// Read the parsed command line back into an [`Invocation`].
///
/// `matches` must come from [`command`] built for the same tree.
pub fn invocation(tree: &CommandTree, matches: &ArgMatches) -> Result<Invocation, CmdfigError> {
    let mut node = tree.root();
    let mut current = matches;
    let mut path = vec![node];
    let mut flags = FlagValues::new();

    loop {
        for option in tree.effective_options(node) {
            if option.spec.kind() == ValueKind::Map {
                continue;
            }
            let name = option.spec.name();
            if current.value_source(name) != Some(ValueSource::CommandLine) {
                continue;
            }
            if let Some(raw) = current.get_one::<String>(name) {
                tracing::trace!(command = %tree.dotted(node), key = name, raw = %raw, "explicit flag");
                flags.set(node, name, raw);
            }
        }

        let Some((name, sub)) = current.subcommand() else {
            break;
        };
        node = tree
            .child(node, name)
            .ok_or_else(|| CmdfigError::UnknownCommand {
                name: name.to_string(),
                parent: tree.dotted(node),
            })?;
        path.push(node);
        current = sub;
    }

    Ok(Invocation {
        path,
        flags,
        config: matches.get_one::<PathBuf>(CONFIG_OPTION).cloned(),
    })
}

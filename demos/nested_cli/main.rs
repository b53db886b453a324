//! # nested_cli demo
//!
//! A nested command tree where every command reads its own section of one
//! config file and its own environment prefix. Exists to exercise cmdfig by
//! hand; the commands do nothing but report what they resolved.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example nested_cli -- grp2cmd2 sub221
//! ```
//!
//! ## Things to try
//!
//! | Layer               | How to exercise it                                                        |
//! |---------------------|---------------------------------------------------------------------------|
//! | Defaults            | `cargo run --example nested_cli -- grp2cmd2`                              |
//! | Config file         | Put `cobravsviper.conf.yaml` in `$HOME` or `$HOME/.config/cobravsviper`   |
//! | Explicit file       | `cargo run --example nested_cli -- -c ./demo.yaml grp2cmd2`               |
//! | File from env       | `COBRAVSVIPER_CONFIG=./demo.yaml cargo run --example nested_cli -- version` |
//! | Env var             | `COBRAVSVIPER_GRP2CMD2_SUB221_SUB221FLAG1=env cargo run --example nested_cli -- grp2cmd2 sub221` |
//! | Hyphenated section  | `COBRAVSVIPER_GRP2CMD2_ZU_LU_SUB221_ZU_LU_SUB221FLAG1=env ... grp2cmd2 zu-lu-sub221` |
//! | Flag                | `cargo run --example nested_cli -- grp2cmd2 --grp2cmd2flag1 flag`         |
//! | Persistent flag     | `cargo run --example nested_cli -- grp2cmd2 sub221 --rootpersistentflag1 flag` |
//! | JSON logs           | `cargo run --example nested_cli -- --log-format json version`             |
//!
//! A config file mirrors the tree:
//!
//! ```yaml
//! log-level: debug
//! rootflag1: value from file
//! grp2cmd2:
//!   grp2cmd2persistentflag1: value from file
//!   sub221:
//!     sub221flag1: value from file
//! ```

mod tree;

use std::process::exit;

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cmdfig::{Cmdfig, CommandTree, FieldMap, NodeId, Resolution, ResolvedConfig, cli};

#[derive(Debug, Default)]
struct Logging {
    debug: bool,
    level: String,
    format: String,
}

fn logging_fields() -> FieldMap<Logging> {
    FieldMap::new()
        .bool("debug", |l: &mut Logging, v| l.debug = v)
        .string("log-level", |l: &mut Logging, v| l.level = v)
        .string("log-format", |l: &mut Logging, v| l.format = v)
}

fn parse_level(name: &str) -> Result<Level, String> {
    match name.to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" | "fatal" | "panic" => Ok(Level::ERROR),
        other => Err(format!("unknown log level '{other}'")),
    }
}

/// Install the subscriber from the root command's resolved logging options.
/// `RUST_LOG` still applies on top.
fn init_logging(root: &ResolvedConfig) -> Result<(), String> {
    let logging = root.materialize(&logging_fields()).map_err(|e| e.to_string())?;
    let level = if logging.debug {
        Level::DEBUG
    } else {
        parse_level(&logging.level)?
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let installed = match logging.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .try_init(),
        "text" => tracing_subscriber::registry()
            .with(fmt::layer().without_time().with_writer(std::io::stderr))
            .with(filter)
            .try_init(),
        other => return Err(format!("unknown log format '{other}'")),
    };
    installed.map_err(|e| e.to_string())?;

    tracing::debug!(format = %logging.format, %level, "logging initialised");
    Ok(())
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Log the options `node` declares itself, then the persistent options each
/// ancestor resolved for itself.
fn report(tree: &CommandTree, resolution: &Resolution, node: NodeId) {
    let name = tree.node(node).name();
    let Some(own) = resolution.get(node) else {
        return;
    };

    println!();
    tracing::info!(command = name, "{name} called");
    for spec in tree.node(node).local_options() {
        log_value(name, own, spec.name());
    }

    for ancestor in tree.ancestors(node).skip(1) {
        let persistent: Vec<&str> = tree
            .node(ancestor)
            .local_options()
            .iter()
            .filter(|o| o.is_persistent())
            .map(|o| o.name())
            .collect();
        let Some(theirs) = resolution.get(ancestor) else {
            continue;
        };
        if persistent.is_empty() {
            continue;
        }
        println!();
        tracing::info!(command = name, "persistent flags from {}", tree.node(ancestor).name());
        for key in persistent {
            log_value(name, theirs, key);
        }
    }
}

fn log_value(command: &str, config: &ResolvedConfig, key: &str) {
    if let Some(entry) = config.entry(key) {
        tracing::info!(command, source = %entry.source, "{key}: {}", entry.value);
    }
}

/// The clap command for the tree. `--debug` is shorthand for
/// `--log-level=debug`, so the two cannot be combined.
fn cli_command(tree: &CommandTree) -> clap::Command {
    cli::command(tree).mut_arg("debug", |arg| arg.conflicts_with("log-level"))
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("{context}:\n{err}");
    exit(1);
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let tree = tree::command_tree().unwrap_or_else(|e| fail("Invalid command tree", e));
    logging_fields()
        .verify(&tree, tree.root())
        .unwrap_or_else(|e| fail("Invalid command tree", e));
    let matches = cli_command(&tree).get_matches();
    let invocation = cli::invocation(&tree, &matches).unwrap_or_else(|e| fail("Invalid invocation", e));

    let mut ctx = Cmdfig::builder(&tree)
        .app_name(tree::APP)
        .invocation(&invocation)
        .build()
        .unwrap_or_else(|e| fail("Failed to load config", e));

    // The root resolves first so logging is in place for the rest of the pass.
    let root = ctx
        .resolve(tree.root())
        .unwrap_or_else(|e| fail("Failed to resolve config", e))
        .clone();
    init_logging(&root).unwrap_or_else(|e| fail("Failed to set up logging", e));
    match ctx.config_file() {
        Some(path) => tracing::debug!(path = %path.display(), "using config file"),
        None => tracing::debug!("no config file"),
    }

    let leaf = invocation.leaf().unwrap_or(tree.root());
    ctx.resolve_path(leaf)
        .unwrap_or_else(|e| fail("Failed to resolve config", e));
    let resolution = ctx.finish();

    report(&tree, &resolution, leaf);
}

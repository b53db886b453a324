//! Per-subcommand layered configuration for nested CLI command trees.
//!
//! Every command in a tree owns a configuration section named after its path
//! from the root. Each option of each command is resolved from four sources:
//! an explicitly passed flag, an environment variable named after the
//! command's section, the command's section of one shared config file, and
//! the option's compiled default.
//!
//! ```ignore
//! let tree = build_tree()?;                       // CommandTree::builder(..)...build()
//! let matches = cmdfig::cli::command(&tree).get_matches();
//! let inv = cmdfig::cli::invocation(&tree, &matches)?;
//!
//! let resolution = Cmdfig::builder(&tree)
//!     .invocation(&inv)
//!     .resolve_path(leaf)?;
//! let serve = resolution.get(leaf).unwrap();
//! let port = serve.get_int("port");
//! ```
//!
//! # Layer precedence
//!
//! ```text
//! Compiled defaults     OptionSpec::int("port", 8080)
//!        ↑ overridden by
//! Config file           the command's own section
//!        ↑ overridden by
//! Environment vars      APP_SERVE_PORT
//!        ↑ overridden by
//! Flags                 --port 9000   (only when actually typed)
//! ```
//!
//! Each option is resolved independently: `host` may come from a flag while
//! `port` comes from the file.
//!
//! # Sections
//!
//! A command's section path is the list of command names from the root down
//! to it. It renders two ways:
//!
//! | Command | File section | Env prefix | Option `pool-size` |
//! |---------|--------------|------------|--------------------|
//! | `app` | top level | `APP` | `APP_POOL_SIZE` |
//! | `app db` | `db` | `APP_DB` | `APP_DB_POOL_SIZE` |
//! | `app db zu-lu` | `db.zu-lu` | `APP_DB_ZU_LU` | `APP_DB_ZU_LU_POOL_SIZE` |
//!
//! The file may also nest everything under the root's name (`app: {db: ...}`);
//! both layouts are accepted. Section paths and environment names must be
//! unique across the tree, which [`TreeBuilder::build`] checks.
//!
//! # Persistent options
//!
//! An option marked [`persistent`](OptionSpec::persistent) is visible on the
//! declaring command and every descendant. Each command resolves it under its
//! own section (`APP_DB_VERBOSE` for `db`), and a value set in an ancestor's
//! section of the config file carries down until a deeper section overrides
//! it.
//!
//! # Resolution
//!
//! [`CmdfigBuilder::build`] does all the I/O: it finds and parses the config
//! file once and snapshots the environment. The [`ResolutionContext`] it
//! returns resolves commands strictly parent-before-child, each exactly once,
//! into immutable [`ResolvedConfig`] snapshots. For typed access, describe
//! your struct with a [`FieldMap`].
//!
//! # Config file discovery
//!
//! In order, the first that applies wins:
//!
//! 1. `-c/--config <FILE>` ([`config_path`](CmdfigBuilder::config_path));
//! 2. the `<APP>_CONFIG` environment variable;
//! 3. `<app>.conf.{yaml,yml,toml,json}` in `$HOME`, then `$HOME/.config/<app>`
//!    (see [`search_paths`](CmdfigBuilder::search_paths)).
//!
//! An explicit file that does not exist is an error; finding nothing in the
//! search paths is not.
//!
//! # Error handling
//!
//! All fallible operations return [`CmdfigError`]. Messages name the command
//! path, the option and the source that supplied the bad value.

pub mod error;
pub mod types;

mod builder;
#[cfg(feature = "clap")]
pub mod cli;
mod coerce;
mod env;
mod file;
mod layers;
mod materialize;
pub(crate) mod merge;
mod resolve;
mod section;
mod tree;

#[cfg(test)]
mod fixtures;

pub use builder::{Cmdfig, CmdfigBuilder};
pub use env::{EnvBinding, EnvVars};
pub use error::CmdfigError;
pub use file::{ConfigDocument, ConfigFormat};
pub use layers::ResolvedValue;
pub use materialize::FieldMap;
pub use resolve::{
    FlagValues, Resolution, ResolutionContext, ResolveInput, ResolvedConfig,
};
pub use section::SectionPath;
pub use tree::{CommandNode, CommandTree, EffectiveOption, NodeId, OptionSpec, TreeBuilder};
pub use types::{Map, SearchPath, Source, Value, ValueKind};

use std::path::PathBuf;

use crate::env::EnvVars;
use crate::error::CmdfigError;
use crate::file::{self, ConfigDocument, Located};
use crate::resolve::{FlagValues, Resolution, ResolutionContext, ResolveInput};
use crate::section::env_segment;
use crate::tree::{CommandTree, NodeId};
use crate::types::SearchPath;

/// Entry point for resolving a command tree's configuration.
pub struct Cmdfig;

impl Cmdfig {
    pub fn builder(tree: &CommandTree) -> CmdfigBuilder<'_> {
        CmdfigBuilder::new(tree)
    }
}

/// Builder for the bootstrap step: where the config file comes from, which
/// environment to read and which flags the user passed.
///
/// [`build()`](Self::build) performs all I/O (config discovery and parsing,
/// environment snapshot) and hands back a [`ResolutionContext`] that works on
/// the loaded data only.
#[derive(Debug)]
pub struct CmdfigBuilder<'t> {
    tree: &'t CommandTree,
    app_name: Option<String>,
    file_name: Option<String>,
    config_path: Option<PathBuf>,
    config_env_var: Option<String>,
    search_paths: Option<Vec<SearchPath>>,
    env_enabled: bool,
    env: Option<EnvVars>,
    flags: FlagValues,
}

impl<'t> CmdfigBuilder<'t> {
    fn new(tree: &'t CommandTree) -> Self {
        Self {
            tree,
            app_name: None,
            file_name: None,
            config_path: None,
            config_env_var: None,
            search_paths: None,
            env_enabled: true,
            env: None,
            flags: FlagValues::new(),
        }
    }

    /// Set the application name (default: the root command's name). This
    /// derives the defaults for:
    /// - `file_name` → `"{app_name}.conf"`
    /// - `config_env_var` → `"{APP_NAME}_CONFIG"`
    /// - `search_paths` → `[Home(""), Home(".config/{app_name}")]`
    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = Some(name.to_string());
        self
    }

    /// Override the config file stem. Extensions `yaml`, `yml`, `toml` and
    /// `json` are tried in that order in each search directory.
    pub fn file_name(mut self, name: &str) -> Self {
        self.file_name = Some(name.to_string());
        self
    }

    /// Use this config file instead of searching. `None` leaves discovery
    /// as is (handy for an optional `--config` arg).
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(p) = path {
            self.config_path = Some(p);
        }
        self
    }

    /// Override the environment variable naming an explicit config file.
    pub fn config_env_var(mut self, name: &str) -> Self {
        self.config_env_var = Some(name.to_string());
        self
    }

    /// Replace the default search paths entirely. Searched in list order;
    /// the first directory holding the file wins.
    pub fn search_paths(mut self, paths: Vec<SearchPath>) -> Self {
        self.search_paths = Some(paths);
        self
    }

    /// Append a search path after the defaults (or after the paths set so far).
    pub fn add_search_path(mut self, path: SearchPath) -> Self {
        let defaults = self.default_search_paths();
        self.search_paths.get_or_insert(defaults).push(path);
        self
    }

    /// Ignore the process environment: no `PREFIX_OPTION` bindings and no
    /// config path from the environment.
    pub fn no_env(mut self) -> Self {
        self.env_enabled = false;
        self
    }

    /// Read from this snapshot instead of the process environment.
    pub fn env_vars(mut self, env: EnvVars) -> Self {
        self.env = Some(env);
        self
    }

    /// Replace the explicit flag values.
    pub fn flags(mut self, flags: FlagValues) -> Self {
        self.flags = flags;
        self
    }

    /// Record one explicit flag value. `None` values are ignored.
    pub fn flag(mut self, node: NodeId, key: &str, raw: Option<&str>) -> Self {
        if let Some(v) = raw {
            self.flags.set(node, key, v);
        }
        self
    }

    fn effective_app_name(&self) -> &str {
        self.app_name
            .as_deref()
            .unwrap_or_else(|| self.tree.node(self.tree.root()).name())
    }

    fn effective_file_name(&self) -> String {
        match &self.file_name {
            Some(name) => name.clone(),
            None => format!("{}.conf", self.effective_app_name()),
        }
    }

    fn effective_config_env_var(&self) -> String {
        match &self.config_env_var {
            Some(name) => name.clone(),
            None => format!("{}_CONFIG", env_segment(self.effective_app_name())),
        }
    }

    fn default_search_paths(&self) -> Vec<SearchPath> {
        vec![
            SearchPath::Home(String::new()),
            SearchPath::Home(format!(".config/{}", self.effective_app_name())),
        ]
    }

    fn effective_search_paths(&self) -> Vec<SearchPath> {
        match &self.search_paths {
            Some(paths) => paths.clone(),
            None => self.default_search_paths(),
        }
    }

    fn effective_env(&self) -> EnvVars {
        if !self.env_enabled {
            return EnvVars::default();
        }
        match &self.env {
            Some(env) => env.clone(),
            None => EnvVars::from_process(),
        }
    }

    /// Find and parse the config file, if one applies.
    fn load_document(&self, env: &EnvVars) -> Result<Option<ConfigDocument>, CmdfigError> {
        let app_name = self.effective_app_name();
        let env_var = self.effective_config_env_var();
        let dirs = file::expand_search_paths(&self.effective_search_paths(), app_name);

        let located = file::locate(
            self.config_path.as_deref(),
            env.get(&env_var),
            &dirs,
            &self.effective_file_name(),
        )?;

        let Some(located) = located else {
            tracing::trace!(app = app_name, "no config file found; using environment, flags and defaults");
            return Ok(None);
        };
        let via = match &located {
            Located::Flag(_) => "flag",
            Located::Env(_) => "environment",
            Located::Searched(_) => "search path",
        };
        let document = file::load_document(located.path())?;
        tracing::debug!(path = %document.path().display(), via, "config file loaded");
        Ok(Some(document))
    }

    /// Load everything the pass needs and return the context, ready to resolve.
    pub fn build(self) -> Result<ResolutionContext<'t>, CmdfigError> {
        let env = self.effective_env();
        let document = self.load_document(&env)?;
        Ok(ResolutionContext::new(
            self.tree,
            ResolveInput {
                document,
                env,
                flags: self.flags,
            },
        ))
    }

    /// Build and resolve every command from the root down to `leaf`.
    pub fn resolve_path(self, leaf: NodeId) -> Result<Resolution, CmdfigError> {
        let mut ctx = self.build()?;
        ctx.resolve_path(leaf)?;
        Ok(ctx.finish())
    }

    /// Apply what the command line supplied: explicit flag values and `--config`.
    #[cfg(feature = "clap")]
    pub fn invocation(self, invocation: &crate::cli::Invocation) -> Self {
        self.flags(invocation.flags.clone())
            .config_path(invocation.config.clone())
    }
}

//! Environment binding for one command section.
//!
//! With section prefix `APP_DB`, option `pool-size` answers to
//! `APP_DB_POOL_SIZE`. Lookups go through an [`EnvVars`] snapshot rather than
//! the live process environment, so tests can pass synthetic data and the
//! whole pass reads one consistent view.

use std::collections::BTreeMap;

use crate::section::{SectionPath, env_segment};

/// A snapshot of environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvVars {
    vars: BTreeMap<String, String>,
}

impl EnvVars {
    /// Capture the current process environment. Variables whose name or value
    /// is not valid unicode are skipped.
    pub fn from_process() -> Self {
        Self::from_iter(std::env::vars_os().filter_map(|(k, v)| {
            Some((k.into_string().ok()?, v.into_string().ok()?))
        }))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvVars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The environment prefix registered for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvBinding {
    prefix: String,
}

impl EnvBinding {
    pub fn for_section(path: &SectionPath) -> Self {
        Self {
            prefix: path.env_prefix(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `PREFIX_OPTION`, with the option uppercased and `-` turned into `_`.
    pub fn var_name(&self, option: &str) -> String {
        format!("{}_{}", self.prefix, env_segment(option))
    }

    /// Look up `option`. Empty variables count as unset.
    ///
    /// Returns the variable name alongside the raw value so callers can name
    /// the variable when the value fails to parse.
    pub fn lookup<'e>(&self, env: &'e EnvVars, option: &str) -> Option<(String, &'e str)> {
        let name = self.var_name(option);
        match env.get(&name) {
            Some(value) if !value.is_empty() => Some((name, value)),
            _ => None,
        }
    }
}

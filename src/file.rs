//! Config file discovery and the parsed config document.
//!
//! # Discovery
//!
//! At most one file is used. The first of these that applies wins:
//!
//! 1. An explicit path (the `--config` flag).
//! 2. A path named by the `<APP>_CONFIG` environment variable.
//! 3. `<file_stem>.<ext>` in each search directory, directories in list
//!    order, extensions in the order `yaml`, `yml`, `toml`, `json`.
//!
//! An explicit path that does not exist is an error: the user asked for that
//! file. A searched file that does not exist is not; the pass continues with
//! flags, environment and defaults only. A file that exists but does not
//! parse is always an error.
//!
//! # Addressing
//!
//! The document is a tree of [`Value`]s with one optional key per
//! subcommand, nested like the command tree. Two layouts are accepted:
//!
//! ```yaml
//! # rooted: the root command owns a top-level key
//! app:
//!   name: from-file
//!   serve:
//!     port: 9000
//! ```
//!
//! ```yaml
//! # unrooted: the top level is the root command's section
//! name: from-file
//! serve:
//!   port: 9000
//! ```
//!
//! A document is rooted when its top level holds a mapping under the root
//! command's name.

use std::path::{Path, PathBuf};

use crate::error::CmdfigError;
use crate::section::SectionPath;
use crate::types::{Map, SearchPath, Value};

/// Extensions tried for each search directory, in order.
pub const EXTENSIONS: [&str; 4] = ["yaml", "yml", "toml", "json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "toml" => Some(ConfigFormat::Toml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }
}

/// How the config file was chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum Located {
    /// Named by the `--config` flag.
    Flag(PathBuf),
    /// Named by the config environment variable.
    Env(PathBuf),
    /// Found in a search directory.
    Searched(PathBuf),
}

impl Located {
    pub fn path(&self) -> &Path {
        match self {
            Located::Flag(p) | Located::Env(p) | Located::Searched(p) => p,
        }
    }
}

/// Resolve a [`SearchPath`] to a concrete directory.
///
/// Returns `None` if the path cannot be resolved (e.g. no home directory found).
pub fn resolve_search_path(sp: &SearchPath, app_name: &str) -> Option<PathBuf> {
    match sp {
        SearchPath::Home(subdir) => {
            let user = directories::UserDirs::new()?;
            Some(user.home_dir().join(subdir))
        }
        SearchPath::Platform => {
            let proj = directories::ProjectDirs::from("", "", app_name)?;
            Some(proj.config_dir().to_path_buf())
        }
        SearchPath::Cwd => std::env::current_dir().ok(),
        SearchPath::Path(p) => Some(p.clone()),
    }
}

/// Resolve all search paths, dropping the ones that cannot be resolved.
pub fn expand_search_paths(search_paths: &[SearchPath], app_name: &str) -> Vec<PathBuf> {
    search_paths
        .iter()
        .filter_map(|sp| {
            let dir = resolve_search_path(sp, app_name);
            if dir.is_none() {
                tracing::trace!(search_path = ?sp, "search path does not resolve; skipped");
            }
            dir
        })
        .collect()
}

/// Pick the config file to load, or `None` if no file applies.
///
/// Empty explicit and environment paths count as unset.
pub fn locate(
    explicit: Option<&Path>,
    env_path: Option<&str>,
    dirs: &[PathBuf],
    file_stem: &str,
) -> Result<Option<Located>, CmdfigError> {
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        tracing::trace!(path = %path.display(), "config file from the flag");
        return require_exists(path).map(|p| Some(Located::Flag(p)));
    }
    if let Some(path) = env_path.filter(|p| !p.is_empty()) {
        tracing::trace!(path, "config file from the environment");
        return require_exists(Path::new(path)).map(|p| Some(Located::Env(p)));
    }

    for dir in dirs {
        for ext in EXTENSIONS {
            let candidate = dir.join(format!("{file_stem}.{ext}"));
            if candidate.is_file() {
                tracing::trace!(path = %candidate.display(), "config file found in search path");
                return Ok(Some(Located::Searched(candidate)));
            }
        }
        tracing::trace!(dir = %dir.display(), file_stem, "no config file in directory");
    }
    Ok(None)
}

fn require_exists(path: &Path) -> Result<PathBuf, CmdfigError> {
    if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(CmdfigError::ConfigNotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Read and parse the file at `path`. The format comes from the extension.
pub fn load_document(path: &Path) -> Result<ConfigDocument, CmdfigError> {
    let format = ConfigFormat::from_path(path).ok_or_else(|| CmdfigError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let content = std::fs::read_to_string(path).map_err(|e| CmdfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    ConfigDocument::parse(path, &content, format)
}

/// A parsed config file. Read-only once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    path: PathBuf,
    root: Map,
}

impl ConfigDocument {
    pub fn parse(path: &Path, content: &str, format: ConfigFormat) -> Result<Self, CmdfigError> {
        let parse_err = |e: Box<dyn std::error::Error + Send + Sync>| CmdfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        };
        let invalid = |reason: &str| CmdfigError::InvalidDocument {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let root = if content.trim().is_empty() {
            Map::new()
        } else {
            match format {
                ConfigFormat::Yaml => {
                    let raw: serde_yaml::Value =
                        serde_yaml::from_str(content).map_err(|e| parse_err(Box::new(e)))?;
                    match raw {
                        serde_yaml::Value::Null => Map::new(),
                        serde_yaml::Value::Mapping(m) => convert::yaml_map(m, "", path)?,
                        _ => return Err(invalid("top level must be a mapping")),
                    }
                }
                ConfigFormat::Toml => {
                    let raw: toml::Table =
                        toml::from_str(content).map_err(|e| parse_err(Box::new(e)))?;
                    convert::toml_table(raw, "", path)?
                }
                ConfigFormat::Json => {
                    let raw: serde_json::Value =
                        serde_json::from_str(content).map_err(|e| parse_err(Box::new(e)))?;
                    match raw {
                        serde_json::Value::Object(m) => convert::json_object(m, "", path)?,
                        _ => return Err(invalid("top level must be an object")),
                    }
                }
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            root,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole document.
    pub fn top_level(&self) -> &Map {
        &self.root
    }

    /// Whether the root command owns a top-level key (see module docs).
    pub fn is_rooted(&self, root_name: &str) -> bool {
        matches!(self.root.get(root_name), Some(Value::Map(_)))
    }

    /// The section for `path`, or `None` if any step is missing or is not a
    /// mapping.
    pub fn subsection(&self, path: &SectionPath) -> Option<&Map> {
        let rooted = path
            .segments()
            .first()
            .is_some_and(|root| self.is_rooted(root));
        let segments = if rooted {
            path.segments()
        } else {
            path.relative_segments()
        };
        segments.iter().try_fold(&self.root, |map, name| match map.get(name) {
            Some(Value::Map(m)) => Some(m),
            _ => None,
        })
    }
}

/// Conversion from each format's value tree into [`Value`].
///
/// Nulls are dropped (a key with no value is the same as an absent key);
/// lists are rejected because no option kind can hold them.
mod convert {
    use std::path::Path;

    use crate::error::CmdfigError;
    use crate::types::{Map, Value};

    fn join(prefix: &str, key: &str) -> String {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    }

    fn unsupported(key: String, path: &Path) -> CmdfigError {
        CmdfigError::UnsupportedValue {
            key,
            path: path.to_path_buf(),
        }
    }

    pub fn yaml_map(
        map: serde_yaml::Mapping,
        prefix: &str,
        path: &Path,
    ) -> Result<Map, CmdfigError> {
        let mut out = Map::new();
        for (k, v) in map {
            let key = match k {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(CmdfigError::InvalidDocument {
                        path: path.to_path_buf(),
                        reason: format!("unsupported key {other:?} under '{prefix}'"),
                    });
                }
            };
            let full = join(prefix, &key);
            if let Some(value) = yaml_value(v, &full, path)? {
                out.insert(key, value);
            }
        }
        Ok(out)
    }

    fn yaml_value(
        value: serde_yaml::Value,
        full: &str,
        path: &Path,
    ) -> Result<Option<Value>, CmdfigError> {
        Ok(Some(match value {
            serde_yaml::Value::Null => return Ok(None),
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(_) => return Err(unsupported(full.to_string(), path)),
            serde_yaml::Value::Mapping(m) => Value::Map(yaml_map(m, full, path)?),
            serde_yaml::Value::Tagged(tagged) => return yaml_value(tagged.value, full, path),
        }))
    }

    pub fn toml_table(table: toml::Table, prefix: &str, path: &Path) -> Result<Map, CmdfigError> {
        let mut out = Map::new();
        for (key, v) in table {
            let full = join(prefix, &key);
            let value = match v {
                toml::Value::String(s) => Value::String(s),
                toml::Value::Integer(i) => Value::Int(i),
                toml::Value::Float(f) => Value::Float(f),
                toml::Value::Boolean(b) => Value::Bool(b),
                toml::Value::Datetime(d) => Value::String(d.to_string()),
                toml::Value::Array(_) => return Err(unsupported(full, path)),
                toml::Value::Table(t) => Value::Map(toml_table(t, &full, path)?),
            };
            out.insert(key, value);
        }
        Ok(out)
    }

    pub fn json_object(
        object: serde_json::Map<String, serde_json::Value>,
        prefix: &str,
        path: &Path,
    ) -> Result<Map, CmdfigError> {
        let mut out = Map::new();
        for (key, v) in object {
            let full = join(prefix, &key);
            let value = match v {
                serde_json::Value::Null => continue,
                serde_json::Value::Bool(b) => Value::Bool(b),
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(i) => Value::Int(i),
                    None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
                },
                serde_json::Value::String(s) => Value::String(s),
                serde_json::Value::Array(_) => return Err(unsupported(full, path)),
                serde_json::Value::Object(m) => Value::Map(json_object(m, &full, path)?),
            };
            out.insert(key, value);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::sample_tree;
    use std::fs;
    use tempfile::TempDir;

    fn yaml(content: &str) -> ConfigDocument {
        ConfigDocument::parse(Path::new("test.yaml"), content, ConfigFormat::Yaml).unwrap()
    }

    fn section(doc: &ConfigDocument, path: &[&str]) -> Option<Map> {
        let tree = sample_tree();
        let id = tree.lookup(path).unwrap();
        doc.subsection(&SectionPath::of(&tree, id)).cloned()
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_path(Path::new("a.YML")), Some(ConfigFormat::Yaml));
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_path(Path::new("a.ini")), None);
        assert_eq!(ConfigFormat::from_path(Path::new("a")), None);
    }

    #[test]
    fn unrooted_document_addresses_from_top() {
        let doc = yaml("name: top\nserve:\n  port: 9000\n");
        let root = section(&doc, &[]).unwrap();
        assert_eq!(root["name"], Value::from("top"));
        let serve = section(&doc, &["serve"]).unwrap();
        assert_eq!(serve["port"], Value::Int(9000));
        assert!(!doc.is_rooted("app"));
    }

    #[test]
    fn rooted_document_addresses_under_root_key() {
        let doc = yaml("app:\n  name: top\n  db:\n    zu-lu:\n      foo: bar\n");
        assert!(doc.is_rooted("app"));
        assert_eq!(section(&doc, &[]).unwrap()["name"], Value::from("top"));
        let zulu = section(&doc, &["db", "zu-lu"]).unwrap();
        assert_eq!(zulu["foo"], Value::from("bar"));
    }

    #[test]
    fn missing_section_is_none() {
        let doc = yaml("serve:\n  port: 9000\n");
        assert!(section(&doc, &["db"]).is_none());
        assert!(section(&doc, &["db", "migrate"]).is_none());
    }

    #[test]
    fn scalar_in_place_of_section_is_none() {
        let doc = yaml("db: nope\n");
        assert!(section(&doc, &["db"]).is_none());
    }

    #[test]
    fn empty_file_is_empty_document() {
        assert!(yaml("").top_level().is_empty());
        assert!(yaml("# only a comment\n").top_level().is_empty());
        let doc = ConfigDocument::parse(Path::new("e.json"), "  \n", ConfigFormat::Json).unwrap();
        assert!(doc.top_level().is_empty());
    }

    #[test]
    fn yaml_null_values_are_dropped() {
        let doc = yaml("serve:\n  host:\n  port: 1\n");
        let serve = section(&doc, &["serve"]).unwrap();
        assert!(!serve.contains_key("host"));
        assert_eq!(serve["port"], Value::Int(1));
    }

    #[test]
    fn yaml_list_is_rejected_with_key() {
        let err = ConfigDocument::parse(
            Path::new("test.yaml"),
            "serve:\n  hosts: [a, b]\n",
            ConfigFormat::Yaml,
        )
        .unwrap_err();
        match err {
            CmdfigError::UnsupportedValue { key, .. } => assert_eq!(key, "serve.hosts"),
            other => panic!("expected UnsupportedValue, got {other:?}"),
        }
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = ConfigDocument::parse(
            Path::new("bad.yaml"),
            "serve:\n  port: [unclosed\n",
            ConfigFormat::Yaml,
        )
        .unwrap_err();
        assert!(matches!(err, CmdfigError::ParseError { .. }));
        assert!(err.to_string().contains("bad.yaml"));
        let cause = std::error::Error::source(&err).unwrap();
        assert!(cause.is::<serde_yaml::Error>());
    }

    #[test]
    fn yaml_scalar_top_level_is_invalid_document() {
        let err =
            ConfigDocument::parse(Path::new("s.yaml"), "just a string\n", ConfigFormat::Yaml)
                .unwrap_err();
        assert!(matches!(err, CmdfigError::InvalidDocument { .. }));
        assert!(err.to_string().contains("mapping"));
    }

    #[test]
    fn toml_document() {
        let doc = ConfigDocument::parse(
            Path::new("c.toml"),
            "name = \"t\"\n[serve]\nport = 1\nratio = 0.25\n",
            ConfigFormat::Toml,
        )
        .unwrap();
        let serve = section(&doc, &["serve"]).unwrap();
        assert_eq!(serve["port"], Value::Int(1));
        assert_eq!(serve["ratio"], Value::Float(0.25));
    }

    #[test]
    fn json_document() {
        let doc = ConfigDocument::parse(
            Path::new("c.json"),
            r#"{"db": {"url": "pg://", "pool-size": 3, "unused": null}}"#,
            ConfigFormat::Json,
        )
        .unwrap();
        let db = section(&doc, &["db"]).unwrap();
        assert_eq!(db["url"], Value::from("pg://"));
        assert_eq!(db["pool-size"], Value::Int(3));
        assert!(!db.contains_key("unused"));
    }

    // --- discovery ---

    #[test]
    fn locate_nothing_found() {
        let dir = TempDir::new().unwrap();
        let found = locate(None, None, &[dir.path().to_path_buf()], "app.conf").unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn locate_first_directory_wins() {
        let home = TempDir::new().unwrap();
        let xdg = TempDir::new().unwrap();
        fs::write(home.path().join("app.conf.yaml"), "").unwrap();
        fs::write(xdg.path().join("app.conf.yaml"), "").unwrap();
        let dirs = [home.path().to_path_buf(), xdg.path().to_path_buf()];
        let found = locate(None, None, &dirs, "app.conf").unwrap().unwrap();
        assert_eq!(found, Located::Searched(home.path().join("app.conf.yaml")));
    }

    #[test]
    fn locate_falls_through_to_later_directory() {
        let home = TempDir::new().unwrap();
        let xdg = TempDir::new().unwrap();
        fs::write(xdg.path().join("app.conf.toml"), "").unwrap();
        let dirs = [home.path().to_path_buf(), xdg.path().to_path_buf()];
        let found = locate(None, None, &dirs, "app.conf").unwrap().unwrap();
        assert_eq!(found.path(), xdg.path().join("app.conf.toml"));
    }

    #[test]
    fn locate_prefers_yaml_over_toml_in_one_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.conf.toml"), "").unwrap();
        fs::write(dir.path().join("app.conf.yaml"), "").unwrap();
        let found = locate(None, None, &[dir.path().to_path_buf()], "app.conf")
            .unwrap()
            .unwrap();
        assert_eq!(found.path(), dir.path().join("app.conf.yaml"));
    }

    #[test]
    fn locate_flag_beats_env_and_search() {
        let dir = TempDir::new().unwrap();
        let flag = dir.path().join("flag.yaml");
        let env = dir.path().join("env.yaml");
        fs::write(&flag, "").unwrap();
        fs::write(&env, "").unwrap();
        fs::write(dir.path().join("app.conf.yaml"), "").unwrap();
        let found = locate(
            Some(&flag),
            env.to_str(),
            &[dir.path().to_path_buf()],
            "app.conf",
        )
        .unwrap();
        assert_eq!(found, Some(Located::Flag(flag)));
    }

    #[test]
    fn locate_env_beats_search() {
        let dir = TempDir::new().unwrap();
        let env = dir.path().join("env.yaml");
        fs::write(&env, "").unwrap();
        fs::write(dir.path().join("app.conf.yaml"), "").unwrap();
        let found = locate(None, env.to_str(), &[dir.path().to_path_buf()], "app.conf").unwrap();
        assert_eq!(found, Some(Located::Env(env)));
    }

    #[test]
    fn empty_flag_and_env_count_as_unset() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.conf.yaml"), "").unwrap();
        let found = locate(
            Some(Path::new("")),
            Some(""),
            &[dir.path().to_path_buf()],
            "app.conf",
        )
        .unwrap();
        assert!(matches!(found, Some(Located::Searched(_))));
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");
        let err = locate(Some(&missing), None, &[], "app.conf").unwrap_err();
        assert!(matches!(err, CmdfigError::ConfigNotFound { .. }));
    }

    #[test]
    fn load_document_rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.ini");
        fs::write(&path, "x=1").unwrap();
        assert!(matches!(
            load_document(&path),
            Err(CmdfigError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn load_document_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.conf.yml");
        fs::write(&path, "serve:\n  port: 7\n").unwrap();
        let doc = load_document(&path).unwrap();
        assert_eq!(doc.path(), path);
        assert_eq!(section(&doc, &["serve"]).unwrap()["port"], Value::Int(7));
    }

    #[test]
    fn resolve_explicit_path() {
        let p = PathBuf::from("/tmp/myapp");
        let resolved = resolve_search_path(&SearchPath::Path(p.clone()), "ignored");
        assert_eq!(resolved, Some(p));
    }
}

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Source;

#[derive(Debug, Error)]
pub enum CmdfigError {
    // --- config document ---
    #[error("Failed to parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid config document {path}: {reason}")]
    InvalidDocument { path: PathBuf, reason: String },

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config file {path} does not exist")]
    ConfigNotFound { path: PathBuf },

    #[error("Unsupported config format for {path} (expected .yaml, .yml, .toml or .json)")]
    UnsupportedFormat { path: PathBuf },

    #[error("Unsupported value for '{key}' in {path}: lists are not a configurable kind")]
    UnsupportedValue { key: String, path: PathBuf },

    // --- tree assembly ---
    #[error("Invalid command name '{name}': {reason}")]
    InvalidCommandName { name: String, reason: String },

    #[error("Invalid option '{key}' on command '{command}': {reason}")]
    InvalidOption {
        command: String,
        key: String,
        reason: String,
    },

    #[error("Commands '{first}' and '{second}' collide on {rendering} '{value}'")]
    SectionCollision {
        first: String,
        second: String,
        rendering: &'static str,
        value: String,
    },

    #[error("Environment variable {var} is claimed by '{first}' and '{second}'")]
    EnvVarCollision {
        var: String,
        first: String,
        second: String,
    },

    #[error("Option '{key}' on command '{command}' conflicts with {reason}")]
    OptionConflict {
        command: String,
        key: String,
        reason: String,
    },

    // --- resolution ---
    #[error("Invalid value for '{key}' on command '{command}' from {origin}: {reason}")]
    InvalidValue {
        command: String,
        key: String,
        origin: Source,
        reason: String,
    },

    #[error("Flag '--{key}' is not an option of command '{command}'")]
    UnknownFlag { command: String, key: String },

    #[error("Command '{command}' resolved before its parent '{parent}'")]
    OutOfOrder { command: String, parent: String },

    #[error("Unknown command '{name}' under '{parent}'")]
    UnknownCommand { name: String, parent: String },

    // --- materialization ---
    #[error("Field '{field}' on command '{command}' is not a declared option")]
    UnknownField { command: String, field: String },

    #[error("Field '{field}' on command '{command}': {reason}")]
    FieldError {
        command: String,
        field: String,
        reason: String,
    },
}

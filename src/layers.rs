//! The layered store for one command's resolution pass.
//!
//! Each declared option gets one slot per source. Sources bind in the order
//! defaults, flags, environment, config file; the file layer is injected
//! last and skips any option that already holds a flag or environment value,
//! so nothing bound earlier is ever overwritten. [`LayeredStore::select`]
//! then picks, per option, the highest source present:
//!
//! ```text
//! flag > environment > config file > default
//! ```
//!
//! Every value is coerced to the option's declared kind as it is bound, so a
//! bad value fails naming the option and the source it came from.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::coerce;
use crate::env::{EnvBinding, EnvVars};
use crate::error::CmdfigError;
use crate::tree::EffectiveOption;
use crate::types::{Map, Source, Value, ValueKind};

#[derive(Debug, Clone)]
struct Slot {
    kind: ValueKind,
    default: Value,
    file: Option<Value>,
    env: Option<Value>,
    flag: Option<Value>,
}

impl Slot {
    fn shadowing_source(&self) -> Option<Source> {
        if self.flag.is_some() {
            Some(Source::Flag)
        } else if self.env.is_some() {
            Some(Source::Env)
        } else {
            None
        }
    }
}

/// A value together with the source that supplied it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedValue {
    pub value: Value,
    pub source: Source,
}

#[derive(Debug, Clone)]
pub struct LayeredStore {
    command: String,
    slots: BTreeMap<String, Slot>,
}

impl LayeredStore {
    /// Register every option visible on the command with its default.
    pub fn new(command: &str, options: &[EffectiveOption<'_>]) -> Self {
        let slots = options
            .iter()
            .map(|o| {
                (
                    o.spec.name().to_string(),
                    Slot {
                        kind: o.spec.kind(),
                        default: o.spec.default_value().clone(),
                        file: None,
                        env: None,
                        flag: None,
                    },
                )
            })
            .collect();
        Self {
            command: command.to_string(),
            slots,
        }
    }

    fn invalid(&self, key: &str, origin: Source, reason: String) -> CmdfigError {
        CmdfigError::InvalidValue {
            command: self.command.clone(),
            key: key.to_string(),
            origin,
            reason,
        }
    }

    /// Bind a value the user passed explicitly on the command line.
    ///
    /// Only explicit values belong here: a flag left at its default must not
    /// be bound, or it would outrank the config file.
    pub fn bind_flag(&mut self, key: &str, raw: &str) -> Result<(), CmdfigError> {
        let Some(slot) = self.slots.get(key) else {
            return Err(CmdfigError::UnknownFlag {
                command: self.command.clone(),
                key: key.to_string(),
            });
        };
        let value =
            coerce::parse_str(slot.kind, raw).map_err(|e| self.invalid(key, Source::Flag, e))?;
        tracing::trace!(command = %self.command, key, %value, "bound flag");
        if let Some(slot) = self.slots.get_mut(key) {
            slot.flag = Some(value);
        }
        Ok(())
    }

    /// Bind `PREFIX_OPTION` variables for every registered option.
    pub fn bind_env(&mut self, binding: &EnvBinding, env: &EnvVars) -> Result<(), CmdfigError> {
        let mut bound = Vec::new();
        for (key, slot) in &self.slots {
            let Some((var, raw)) = binding.lookup(env, key) else {
                continue;
            };
            let value = coerce::parse_str(slot.kind, raw)
                .map_err(|e| self.invalid(key, Source::Env, format!("{var}: {e}")))?;
            tracing::trace!(command = %self.command, %key, %var, %value, "bound environment variable");
            bound.push((key.clone(), value));
        }
        for (key, value) in bound {
            if let Some(slot) = self.slots.get_mut(&key) {
                slot.env = Some(value);
            }
        }
        Ok(())
    }

    /// Inject a file layer below environment and flags.
    ///
    /// Keys that name no registered option are inert. Keys whose option
    /// already holds a flag or environment value are skipped. Returns the
    /// number of values injected.
    pub fn inject_file_layer(&mut self, layer: &Map) -> Result<usize, CmdfigError> {
        let mut injected = 0;
        for (key, raw) in layer {
            let Some(slot) = self.slots.get(key) else {
                tracing::trace!(command = %self.command, %key, "config key is not an option here; ignored");
                continue;
            };
            if let Some(source) = slot.shadowing_source() {
                tracing::trace!(command = %self.command, %key, %source, "config value shadowed");
                continue;
            }
            let value = coerce::convert(slot.kind, raw)
                .map_err(|e| self.invalid(key, Source::File, e))?;
            if let Some(slot) = self.slots.get_mut(key) {
                slot.file = Some(value);
                injected += 1;
            }
        }
        Ok(injected)
    }

    /// Pick each option's value from the highest source present.
    pub fn select(&self) -> BTreeMap<String, ResolvedValue> {
        self.slots
            .iter()
            .map(|(key, slot)| {
                let (value, source) = if let Some(v) = &slot.flag {
                    (v, Source::Flag)
                } else if let Some(v) = &slot.env {
                    (v, Source::Env)
                } else if let Some(v) = &slot.file {
                    (v, Source::File)
                } else {
                    (&slot.default, Source::Default)
                };
                (
                    key.clone(),
                    ResolvedValue {
                        value: value.clone(),
                        source,
                    },
                )
            })
            .collect()
    }
}

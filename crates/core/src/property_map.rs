// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-instance service configuration: a validated string→string map plus
//! a typed view of the numeric/boolean properties services actually read.
//!
//! Mirrors how `oj-runbook` validates HCL-sourced job vars against a
//! schema before the engine ever touches them: invalid configuration is
//! rejected once, at construction, rather than re-checked on every read.

use crate::failure::FailureCause;
use std::collections::HashMap;

/// A single property's allowed shape, used to validate a [`PropertyMap`]
/// at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Bool,
    NonNegativeInt,
    PositiveInt,
    NonNegativeFloat,
    AnyString,
}

#[derive(Debug, Clone)]
pub struct PropertySchema {
    entries: HashMap<&'static str, PropertyKind>,
}

impl PropertySchema {
    pub fn new(entries: &[(&'static str, PropertyKind)]) -> Self {
        Self { entries: entries.iter().copied().collect() }
    }

    pub fn validate(&self, raw: &HashMap<String, String>) -> Result<(), FailureCause> {
        for (key, value) in raw {
            let kind = self.entries.get(key.as_str()).ok_or_else(|| {
                FailureCause::invalid_argument(format!("unknown property '{key}'"))
            })?;
            match kind {
                PropertyKind::Bool => {
                    value.parse::<bool>().map_err(|_| {
                        FailureCause::invalid_argument(format!(
                            "property '{key}' must be a bool, got '{value}'"
                        ))
                    })?;
                }
                PropertyKind::NonNegativeInt => {
                    let n: i64 = value.parse().map_err(|_| {
                        FailureCause::invalid_argument(format!(
                            "property '{key}' must be an integer, got '{value}'"
                        ))
                    })?;
                    if n < 0 {
                        return Err(FailureCause::invalid_argument(format!(
                            "property '{key}' must be >= 0, got {n}"
                        )));
                    }
                }
                PropertyKind::PositiveInt => {
                    let n: i64 = value.parse().map_err(|_| {
                        FailureCause::invalid_argument(format!(
                            "property '{key}' must be an integer, got '{value}'"
                        ))
                    })?;
                    if n <= 0 {
                        return Err(FailureCause::invalid_argument(format!(
                            "property '{key}' must be > 0, got {n}"
                        )));
                    }
                }
                PropertyKind::NonNegativeFloat => {
                    let n: f64 = value.parse().map_err(|_| {
                        FailureCause::invalid_argument(format!(
                            "property '{key}' must be a number, got '{value}'"
                        ))
                    })?;
                    if n < 0.0 {
                        return Err(FailureCause::invalid_argument(format!(
                            "property '{key}' must be >= 0, got {n}"
                        )));
                    }
                }
                PropertyKind::AnyString => {}
            }
        }
        Ok(())
    }
}

/// A validated property map, with typed getters and per-key defaults.
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    values: HashMap<String, String>,
}

impl PropertyMap {
    pub fn new(
        overrides: HashMap<String, String>,
        schema: &PropertySchema,
    ) -> Result<Self, FailureCause> {
        schema.validate(&overrides)?;
        Ok(Self { values: overrides })
    }

    pub fn empty() -> Self {
        Self { values: HashMap::new() }
    }

    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.values.get(key).map(String::as_str).unwrap_or(default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.values.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.values.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

#[cfg(test)]
#[path = "property_map_tests.rs"]
mod tests;

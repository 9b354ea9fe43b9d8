use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::Result;

fn env_true(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|val| {
        let trimmed = val.trim();
        !trimmed.is_empty() && !matches!(trimmed, "0" | "false" | "FALSE" | "False")
    })
}

fn bool_from_env(key: &str) -> bool {
    env_true(key).unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundsCheckMode {
    #[default]
    On,
    Off,
}

impl BoundsCheckMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "on" | "1" | "true" => Some(BoundsCheckMode::On),
            "off" | "0" | "false" => Some(BoundsCheckMode::Off),
            _ => None,
        }
    }

    pub fn enabled(self) -> bool {
        self == BoundsCheckMode::On
    }
}

/// Knobs for the array lowering passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayConfig {
    pub bounds_checks: BoundsCheckMode,
    /// Fold constant array literals into constant data instead of emitting stores.
    pub fold_constants: bool,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            bounds_checks: BoundsCheckMode::On,
            fold_constants: true,
        }
    }
}

impl ArrayConfig {
    /// Reads `FERROPHASE_BOUNDSCHECK` and `FERROPHASE_NO_CONST_FOLD`.
    pub fn from_env() -> Self {
        let bounds_checks = std::env::var("FERROPHASE_BOUNDSCHECK")
            .ok()
            .and_then(|value| BoundsCheckMode::parse(&value))
            .unwrap_or_default();
        Self {
            bounds_checks,
            fold_constants: !bool_from_env("FERROPHASE_NO_CONST_FOLD"),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Process-wide configuration, read from the environment once.
    pub fn global() -> &'static ArrayConfig {
        static CONFIG: OnceLock<ArrayConfig> = OnceLock::new();
        CONFIG.get_or_init(ArrayConfig::from_env)
    }
}

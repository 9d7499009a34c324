use std::env;

use serde::{Deserialize, Serialize};

pub const ENV_ALLOW_DYNAMIC_DIMS: &str = "NNLOWER_ALLOW_DYNAMIC_DIMS";
pub const ENV_INPUT_PREFIX: &str = "NNLOWER_INPUT_PREFIX";
pub const ENV_CONSTANT_PREFIX: &str = "NNLOWER_CONSTANT_PREFIX";

/// Knobs for one conversion pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Lets dynamic operand dimensions reach the backend as `Dim::Any`.
    pub allow_dynamic_dims: bool,
    /// Suffix handed to the name generator for inputs declared without a name.
    pub input_prefix: String,
    /// Suffix handed to the name generator for constants declared without a name.
    pub constant_prefix: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            allow_dynamic_dims: true,
            input_prefix: "input_".to_string(),
            constant_prefix: "const_".to_string(),
        }
    }
}

impl ConverterConfig {
    /// Defaults overridden by `NNLOWER_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    pub fn from_json_str(source: &str) -> serde_json::Result<Self> {
        serde_json::from_str(source)
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(ENV_ALLOW_DYNAMIC_DIMS).filter(|v| !v.trim().is_empty()) {
            self.allow_dynamic_dims = parse_bool(&value);
        }
        if let Some(value) = lookup(ENV_INPUT_PREFIX) {
            self.input_prefix = value;
        }
        if let Some(value) = lookup(ENV_CONSTANT_PREFIX) {
            self.constant_prefix = value;
        }
        self
    }
}

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let config = ConverterConfig::default().with_overrides(lookup_from(&[
            (ENV_ALLOW_DYNAMIC_DIMS, "off"),
            (ENV_CONSTANT_PREFIX, "w_"),
        ]));
        assert!(!config.allow_dynamic_dims);
        assert_eq!(config.constant_prefix, "w_");
        assert_eq!(config.input_prefix, "input_");
    }

    #[test]
    fn blank_bool_override_is_ignored() {
        let config = ConverterConfig::default()
            .with_overrides(lookup_from(&[(ENV_ALLOW_DYNAMIC_DIMS, "  ")]));
        assert!(config.allow_dynamic_dims);
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = ConverterConfig::from_json_str(r#"{"allow_dynamic_dims": false}"#)
            .expect("parse config");
        assert!(!config.allow_dynamic_dims);
        assert_eq!(config.input_prefix, "input_");
    }
}

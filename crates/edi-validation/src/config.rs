//! Validator configuration

use serde::Deserialize;

/// Validation configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Report values missing from an element's code list
    pub validate_code_values: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            validate_code_values: true,
        }
    }
}

impl ValidationConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable code value validation
    #[must_use]
    pub fn with_code_values(mut self, validate: bool) -> Self {
        self.validate_code_values = validate;
        self
    }
}

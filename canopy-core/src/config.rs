//! Runtime configuration
//!
//! A [`Config`] is handed to the [`Runtime`](crate::Runtime) once at
//! construction. Every field has a default, so an empty JSON object is a
//! valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A property whose live value must be compared before it is written.
///
/// Writing `value` on a text input resets the caret even when the value is
/// unchanged, so these properties are compared against the live node instead
/// of the previous render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlledProperty {
    /// Element name, compared case-insensitively.
    pub tag: String,
    /// Property name.
    pub property: String,
}

impl ControlledProperty {
    pub fn new(tag: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            property: property.into(),
        }
    }
}

/// Reconciler configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fail with [`Error::DuplicateKey`](crate::Error::DuplicateKey) when two
    /// siblings share a key. When disabled, the last sibling wins and a
    /// warning is logged.
    pub strict_keys: bool,

    /// Extra controlled properties on top of the built-in `input.value`.
    pub controlled_properties: Vec<ControlledProperty>,

    /// Extra SVG property → attribute name translations.
    pub svg_attribute_translations: Vec<(String, String)>,
}

/// Controlled properties every runtime knows about.
const BUILTIN_CONTROLLED: &[(&str, &str)] = &[("input", "value")];

impl Config {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether `property` on `tag` must be compared against the live node.
    pub fn is_controlled(&self, tag: &str, property: &str) -> bool {
        BUILTIN_CONTROLLED
            .iter()
            .any(|(t, p)| t.eq_ignore_ascii_case(tag) && *p == property)
            || self
                .controlled_properties
                .iter()
                .any(|c| c.tag.eq_ignore_ascii_case(tag) && c.property == property)
    }

    /// Configured attribute name for an SVG property, if any.
    pub fn svg_attribute(&self, property: &str) -> Option<&str> {
        self.svg_attribute_translations
            .iter()
            .find(|(from, _)| from == property)
            .map(|(_, to)| to.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert!(!config.strict_keys);
    }

    #[test]
    fn input_value_is_always_controlled() {
        let config = Config::default();
        assert!(config.is_controlled("input", "value"));
        assert!(config.is_controlled("INPUT", "value"));
        assert!(!config.is_controlled("div", "value"));
        assert!(!config.is_controlled("input", "checked"));
    }

    #[test]
    fn controlled_properties_extend_builtins() {
        let config = Config::from_json(
            r#"{
                "strict_keys": true,
                "controlled_properties": [{ "tag": "textarea", "property": "value" }]
            }"#,
        )
        .unwrap();

        assert!(config.strict_keys);
        assert!(config.is_controlled("textarea", "value"));
        assert!(config.is_controlled("input", "value"));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = Config::from_json("{ strict_keys: ").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}

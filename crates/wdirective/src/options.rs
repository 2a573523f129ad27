//! Runtime configuration.
use serde::{Deserialize, Serialize};

use crate::Error;

/// Configuration owned by one [`Directives`](crate::Directives) instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Attribute namespace, eg `w-` for `w-copy`.
    pub prefix: String,
    /// Namespace of the lifecycle events dispatched on elements.
    pub event_prefix: String,
    /// Parse `:argument` and `.modifier` suffixes out of attribute names.
    pub enable_attr_params: bool,
    /// Observe child lists and run `children_updated` hooks.
    pub enable_children_updated: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            prefix: "w-".into(),
            event_prefix: "wd:".into(),
            enable_attr_params: false,
            enable_children_updated: false,
        }
    }
}

impl Options {
    /// Read options from a JSON object, eg `{"prefix": "x-", "enableAttrParams": true}`.
    ///
    /// Missing keys take their default values.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_event_prefix(mut self, event_prefix: impl Into<String>) -> Self {
        self.event_prefix = event_prefix.into();
        self
    }

    pub fn with_attr_params(mut self, enabled: bool) -> Self {
        self.enable_attr_params = enabled;
        self
    }

    pub fn with_children_updated(mut self, enabled: bool) -> Self {
        self.enable_children_updated = enabled;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn json_fills_in_defaults() {
        let options = Options::from_json(r#"{"prefix": "x-", "enableChildrenUpdated": true}"#)
            .unwrap();
        assert_eq!(options.prefix, "x-");
        assert_eq!(options.event_prefix, "wd:");
        assert!(!options.enable_attr_params);
        assert!(options.enable_children_updated);
    }

    #[test]
    fn bad_json_is_an_options_error() {
        let err = Options::from_json("{\"prefix\": 3}").unwrap_err();
        assert!(matches!(err, Error::Options(_)));
    }

    #[test]
    fn setters_chain() {
        let options = Options::default()
            .with_prefix("v-")
            .with_event_prefix("vd:")
            .with_attr_params(true)
            .with_children_updated(true);
        assert_eq!(
            options,
            Options {
                prefix: "v-".into(),
                event_prefix: "vd:".into(),
                enable_attr_params: true,
                enable_children_updated: true,
            }
        );
    }
}

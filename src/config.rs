//! Preview configuration
//!
//! Decoded from the camelCase JSON the embedding host sends. Every field has a
//! default, so `{}` is a valid config.

use serde::{Deserialize, Serialize};

use crate::error::{PreviewError, Result};

pub const DEFAULT_ENTRY_MARKUP: &str = "index.html";
pub const DEFAULT_ENTRY_SCRIPT: &str = "/index.tsx";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviewConfig {
    /// Root-relative path of the document rendered in application mode.
    pub entry_markup: String,
    /// Specifier of the bootstrap module, as written in the entry markup's
    /// `<script type="module" src=...>` tag.
    pub entry_script: String,
    /// Extra extensions (without the dot) compiled as TSX components.
    pub component_extensions: Vec<String>,
    /// Inject the error-capture script into application documents.
    pub instrument: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            entry_markup: DEFAULT_ENTRY_MARKUP.to_string(),
            entry_script: DEFAULT_ENTRY_SCRIPT.to_string(),
            component_extensions: Vec::new(),
            instrument: true,
        }
    }
}

impl PreviewConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PreviewError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_component_extension(mut self, ext: &str) -> Self {
        self.component_extensions
            .push(ext.trim_start_matches('.').to_string());
        self
    }

    pub fn with_entry(mut self, markup: &str, script: &str) -> Self {
        self.entry_markup = markup.to_string();
        self.entry_script = script.to_string();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.entry_markup.trim().is_empty() {
            return Err(PreviewError::InvalidConfig(
                "entryMarkup must not be empty".to_string(),
            ));
        }
        if !self.entry_script.starts_with('/') {
            return Err(PreviewError::InvalidConfig(format!(
                "entryScript must be root-relative, got '{}'",
                self.entry_script
            )));
        }
        Ok(())
    }

    /// The entry markup path without a leading slash.
    pub fn entry_markup_path(&self) -> &str {
        self.entry_markup.trim_start_matches('/')
    }

    pub fn is_component_extension(&self, ext: &str) -> bool {
        self.component_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let config = PreviewConfig::from_json("{}").unwrap();
        assert_eq!(config, PreviewConfig::default());
        assert_eq!(config.entry_markup, "index.html");
        assert_eq!(config.entry_script, "/index.tsx");
        assert!(config.instrument);
    }

    #[test]
    fn test_camel_case_fields() {
        let config = PreviewConfig::from_json(
            r#"{"entryScript": "/main.view", "componentExtensions": ["view"], "instrument": false}"#,
        )
        .unwrap();
        assert_eq!(config.entry_script, "/main.view");
        assert!(config.is_component_extension("VIEW"));
        assert!(!config.instrument);
    }

    #[test]
    fn test_rejects_relative_entry_script() {
        let err = PreviewConfig::from_json(r#"{"entryScript": "index.tsx"}"#).unwrap_err();
        assert!(matches!(err, PreviewError::InvalidConfig(_)));
        assert!(PreviewConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_entry_markup_path_strips_slash() {
        let config = PreviewConfig::default().with_entry("/app.html", "/main.tsx");
        assert_eq!(config.entry_markup_path(), "app.html");
    }
}

use serde::{Deserialize, Serialize};

/// Settings for the markup lexer.
///
/// Deserializable so an embedding tool can load it from its own config file.
/// Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    /// XML mode: element names are case-sensitive and no element has raw-text
    /// content.
    pub treat_as_xml: bool,
    /// Elements whose content is not scanned for markup. Matched
    /// case-insensitively in HTML mode.
    pub raw_text_elements: Vec<String>,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            treat_as_xml: false,
            raw_text_elements: ["listing", "script", "style", "xmp"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl MarkupConfig {
    pub fn xml() -> Self {
        Self {
            treat_as_xml: true,
            ..Self::default()
        }
    }

    /// The name as the lexer compares it: lowercased in HTML mode.
    pub fn canonical_name(&self, name: &str) -> String {
        if self.treat_as_xml {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        }
    }

    /// Whether `name` opens a raw-text region.
    pub fn is_raw_text(&self, name: &str) -> bool {
        !self.treat_as_xml
            && self
                .raw_text_elements
                .iter()
                .any(|element| element.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_raw_text_elements() {
        let config = MarkupConfig::default();
        assert!(config.is_raw_text("script"));
        assert!(config.is_raw_text("STYLE"));
        assert!(config.is_raw_text("xmp"));
        assert!(!config.is_raw_text("div"));
    }

    #[test]
    fn test_xml_has_no_raw_text() {
        let config = MarkupConfig::xml();
        assert!(!config.is_raw_text("script"));
        assert_eq!(config.canonical_name("Script"), "Script");
    }

    #[test]
    fn test_html_names_fold_case() {
        assert_eq!(MarkupConfig::default().canonical_name("SCRIPT"), "script");
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: MarkupConfig = serde_json::from_str(r#"{"treat_as_xml": true}"#).unwrap();
        assert!(config.treat_as_xml);
        assert_eq!(config.raw_text_elements.len(), 4);

        let custom: MarkupConfig =
            serde_json::from_str(r#"{"raw_text_elements": ["textarea"]}"#).unwrap();
        assert!(custom.is_raw_text("textarea"));
        assert!(!custom.is_raw_text("script"));
    }
}

use serde::{Deserialize, Serialize};

use crate::format::SegmentFormat;

/// Host capabilities the builder and writer consult instead of sniffing the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Capabilities {
    /// Keep previously associated DOM nodes when their model node is unchanged.
    pub reuse_cached_elements: bool,
    /// Render bold/italic/underline/strike/scripts as `<b>`/`<i>`/`<u>`/`<s>`/`<sup>`/`<sub>`
    /// rather than inline CSS.
    pub semantic_inline_tags: bool,
    /// Keep unrecognized elements as `General` blocks instead of flattening them.
    pub preserve_unknown_elements: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            reuse_cached_elements: true,
            semantic_inline_tags: true,
            preserve_unknown_elements: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    pub default_format: SegmentFormat,
    pub capabilities: Capabilities,
    pub max_undo_snapshots: usize,
}

impl EditorConfig {
    pub fn with_defaults(mut self) -> Self {
        if self.max_undo_snapshots == 0 {
            self.max_undo_snapshots = 200;
        }
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: EditorConfig = serde_json::from_str(json)?;
        Ok(config.with_defaults())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = EditorConfig::from_json(
            r#"{ "defaultFormat": { "fontFamily": "Calibri" }, "capabilities": { "semanticInlineTags": false } }"#,
        )
        .unwrap();
        assert_eq!(config.default_format.font_family.as_deref(), Some("Calibri"));
        assert!(!config.capabilities.semantic_inline_tags);
        assert!(config.capabilities.reuse_cached_elements);
        assert_eq!(config.max_undo_snapshots, 200);
    }
}

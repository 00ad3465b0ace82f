use serde::{Deserialize, Serialize};

use crate::css;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptPosition {
    Superscript,
    Subscript,
}

/// Character-level formatting. Every field is optional; `None` means "inherit".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SegmentFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

impl SegmentFormat {
    pub fn is_empty(&self) -> bool {
        *self == SegmentFormat::default()
    }

    /// Overlays every field that is set on `other`.
    pub fn merge_from(&mut self, other: &SegmentFormat) {
        fn take<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
            if source.is_some() {
                target.clone_from(source);
            }
        }
        take(&mut self.font_family, &other.font_family);
        take(&mut self.font_size, &other.font_size);
        take(&mut self.font_weight, &other.font_weight);
        take(&mut self.italic, &other.italic);
        take(&mut self.underline, &other.underline);
        take(&mut self.strikethrough, &other.strikethrough);
        take(&mut self.script, &other.script);
        take(&mut self.text_color, &other.text_color);
        take(&mut self.background_color, &other.background_color);
    }

    pub fn is_bold(&self) -> bool {
        self.font_weight.as_deref().is_some_and(is_bold_weight)
    }
}

pub fn is_bold_weight(weight: &str) -> bool {
    match weight.trim() {
        "bold" | "bolder" => true,
        other => other.parse::<u32>().is_ok_and(|w| w >= 600),
    }
}

/// Effective character format: document default, then the paragraph's segment format, then
/// the segment's own format. Later layers win.
pub fn resolve_segment_format(
    document_default: &SegmentFormat,
    paragraph_segment_format: &SegmentFormat,
    segment_format: &SegmentFormat,
) -> SegmentFormat {
    let mut out = document_default.clone();
    out.merge_from(paragraph_segment_format);
    out.merge_from(segment_format);
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlockFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_align: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin_top: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin_right: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin_bottom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin_left: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding_top: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding_right: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding_bottom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding_left: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_space: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_indent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_align: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border: Option<String>,
}

impl BlockFormat {
    pub fn is_empty(&self) -> bool {
        *self == BlockFormat::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListLevelFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_number_override: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_style_type: Option<String>,
    #[serde(flatten)]
    pub block: BlockFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_collapse: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_layout: Option<String>,
    #[serde(flatten)]
    pub block: BlockFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkFormat {
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodeFormat {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

type Declarations = Vec<(String, String)>;

/// Reads the character-level properties out of parsed declarations.
pub fn parse_segment_declarations(declarations: &[(String, String)], format: &mut SegmentFormat) {
    for (name, value) in declarations {
        match name.as_str() {
            "font-family" => format.font_family = Some(value.clone()),
            "font-size" => format.font_size = Some(value.clone()),
            "font-weight" => format.font_weight = Some(value.clone()),
            "font-style" => format.italic = Some(matches!(value.as_str(), "italic" | "oblique")),
            "text-decoration" | "text-decoration-line" => {
                if value == "none" {
                    format.underline = Some(false);
                    format.strikethrough = Some(false);
                } else {
                    if value.contains("underline") {
                        format.underline = Some(true);
                    }
                    if value.contains("line-through") {
                        format.strikethrough = Some(true);
                    }
                }
            }
            "vertical-align" => match value.as_str() {
                "super" => format.script = Some(ScriptPosition::Superscript),
                "sub" => format.script = Some(ScriptPosition::Subscript),
                _ => {}
            },
            "color" => format.text_color = Some(value.clone()),
            "background-color" | "background" => format.background_color = Some(value.clone()),
            _ => {}
        }
    }
}

/// Applies the format implied by a semantic inline tag. Returns `false` for other tags.
pub fn parse_segment_tag(tag: &str, attribute: impl Fn(&str) -> Option<String>, format: &mut SegmentFormat) -> bool {
    match tag {
        "b" | "strong" => format.font_weight = Some("bold".to_string()),
        "i" | "em" => format.italic = Some(true),
        "u" | "ins" => format.underline = Some(true),
        "s" | "strike" | "del" => format.strikethrough = Some(true),
        "sup" => format.script = Some(ScriptPosition::Superscript),
        "sub" => format.script = Some(ScriptPosition::Subscript),
        "font" => {
            if let Some(color) = attribute("color") {
                format.text_color = Some(color);
            }
            if let Some(face) = attribute("face") {
                format.font_family = Some(face);
            }
        }
        _ => return false,
    }
    true
}

/// Splits a segment format into semantic tags (outer to inner) and leftover declarations.
pub fn render_segment_format(format: &SegmentFormat, semantic_tags: bool) -> (Vec<&'static str>, Declarations) {
    let mut tags = Vec::new();
    let mut decls = Declarations::new();

    css::push(&mut decls, "font-family", format.font_family.as_ref());
    css::push(&mut decls, "font-size", format.font_size.as_ref());
    match format.font_weight.as_deref() {
        Some("bold") if semantic_tags => tags.push("b"),
        Some(weight) => decls.push(("font-weight".to_string(), weight.to_string())),
        None => {}
    }
    match format.italic {
        Some(true) if semantic_tags => tags.push("i"),
        Some(true) => decls.push(("font-style".to_string(), "italic".to_string())),
        Some(false) => decls.push(("font-style".to_string(), "normal".to_string())),
        None => {}
    }

    let mut decoration: Vec<&str> = Vec::new();
    match format.underline {
        Some(true) if semantic_tags => tags.push("u"),
        Some(true) => decoration.push("underline"),
        _ => {}
    }
    match format.strikethrough {
        Some(true) if semantic_tags => tags.push("s"),
        Some(true) => decoration.push("line-through"),
        _ => {}
    }
    if !decoration.is_empty() {
        decls.push(("text-decoration".to_string(), decoration.join(" ")));
    } else if format.underline == Some(false) && format.strikethrough != Some(true)
        || format.strikethrough == Some(false) && format.underline != Some(true)
    {
        decls.push(("text-decoration".to_string(), "none".to_string()));
    }

    match format.script {
        Some(ScriptPosition::Superscript) if semantic_tags => tags.push("sup"),
        Some(ScriptPosition::Subscript) if semantic_tags => tags.push("sub"),
        Some(ScriptPosition::Superscript) => {
            decls.push(("vertical-align".to_string(), "super".to_string()))
        }
        Some(ScriptPosition::Subscript) => {
            decls.push(("vertical-align".to_string(), "sub".to_string()))
        }
        None => {}
    }
    css::push(&mut decls, "color", format.text_color.as_ref());
    css::push(&mut decls, "background-color", format.background_color.as_ref());

    (tags, decls)
}

/// Reads block-level properties. `attribute` resolves legacy `dir`/`align` attributes.
pub fn parse_block_declarations(
    declarations: &[(String, String)],
    attribute: impl Fn(&str) -> Option<String>,
    format: &mut BlockFormat,
) {
    if let Some(dir) = attribute("dir") {
        format.direction = Some(dir);
    }
    if let Some(align) = attribute("align") {
        format.text_align = Some(align);
    }
    for (name, value) in declarations {
        let value = Some(value.clone());
        match name.as_str() {
            "text-align" => format.text_align = value,
            "direction" => format.direction = value,
            "margin" | "padding" => {
                let Some([top, right, bottom, left]) = value.as_deref().and_then(css::expand_box)
                else {
                    continue;
                };
                if name == "margin" {
                    format.margin_top = Some(top);
                    format.margin_right = Some(right);
                    format.margin_bottom = Some(bottom);
                    format.margin_left = Some(left);
                } else {
                    format.padding_top = Some(top);
                    format.padding_right = Some(right);
                    format.padding_bottom = Some(bottom);
                    format.padding_left = Some(left);
                }
            }
            "margin-top" => format.margin_top = value,
            "margin-right" => format.margin_right = value,
            "margin-bottom" => format.margin_bottom = value,
            "margin-left" => format.margin_left = value,
            "padding-top" => format.padding_top = value,
            "padding-right" => format.padding_right = value,
            "padding-bottom" => format.padding_bottom = value,
            "padding-left" => format.padding_left = value,
            "background-color" | "background" => format.background_color = value,
            "line-height" => format.line_height = value,
            "white-space" => format.white_space = value,
            "text-indent" => format.text_indent = value,
            "width" => format.width = value,
            "height" => format.height = value,
            "vertical-align" => format.vertical_align = value,
            "border" => format.border = value,
            _ => {}
        }
    }
}

pub fn render_block_format(format: &BlockFormat, out: &mut Declarations) {
    css::push(out, "text-align", format.text_align.as_ref());
    css::push(out, "direction", format.direction.as_ref());
    css::push(out, "margin-top", format.margin_top.as_ref());
    css::push(out, "margin-right", format.margin_right.as_ref());
    css::push(out, "margin-bottom", format.margin_bottom.as_ref());
    css::push(out, "margin-left", format.margin_left.as_ref());
    css::push(out, "padding-top", format.padding_top.as_ref());
    css::push(out, "padding-right", format.padding_right.as_ref());
    css::push(out, "padding-bottom", format.padding_bottom.as_ref());
    css::push(out, "padding-left", format.padding_left.as_ref());
    css::push(out, "background-color", format.background_color.as_ref());
    css::push(out, "line-height", format.line_height.as_ref());
    css::push(out, "white-space", format.white_space.as_ref());
    css::push(out, "text-indent", format.text_indent.as_ref());
    css::push(out, "width", format.width.as_ref());
    css::push(out, "height", format.height.as_ref());
    css::push(out, "vertical-align", format.vertical_align.as_ref());
    css::push(out, "border", format.border.as_ref());
}

/// Character properties a block wrapper carries for its content (`color` on a `<div>` etc.).
/// Background is left to the block format.
pub fn split_container_declarations(
    declarations: &[(String, String)],
) -> (Declarations, Declarations) {
    let mut block = Declarations::new();
    let mut segment = Declarations::new();
    for (name, value) in declarations {
        let is_segment = matches!(
            name.as_str(),
            "font-family"
                | "font-size"
                | "font-weight"
                | "font-style"
                | "text-decoration"
                | "text-decoration-line"
                | "color"
        );
        if is_segment {
            segment.push((name.clone(), value.clone()));
        } else {
            block.push((name.clone(), value.clone()));
        }
    }
    (block, segment)
}

/// CSS for a segment format used as a container's inherited text style (no tags).
pub fn render_container_segment_format(format: &SegmentFormat, out: &mut Declarations) {
    let (_, decls) = render_segment_format(format, false);
    out.extend(
        decls
            .into_iter()
            .filter(|(name, _)| name != "background-color" && name != "vertical-align"),
    );
}

//! Editing commands built on [`Editor::format_content_model`].

use serde::{Deserialize, Serialize};

use crate::dom::NodeId;
use crate::editor::{
    change_source, DeletedEntity, Editor, EditorError, EntityOperation, FormatContentModelContext,
    FormatContentModelOptions,
};
use crate::format::{resolve_segment_format, SegmentFormat};
use crate::html::parse_fragment;
use crate::metadata::{
    read_metadata, write_metadata, BulletListType, EntityInfo, ListMetadata, NumberingListType,
};
use crate::model::{
    Block, BlockGroup, ContentModelDocument, Entity, Image, ListItem, ListLevel, ListType,
    Paragraph, Segment,
};

struct SelectedFormat<'a> {
    /// Format as the reader sees it: document default, paragraph and segment layered.
    effective: SegmentFormat,
    target: &'a mut SegmentFormat,
    is_marker: bool,
}

fn list_item_fully_selected(item: &ListItem) -> bool {
    let mut any = false;
    let mut all = true;
    for block in &item.blocks {
        if let Block::Paragraph(paragraph) = block {
            for segment in paragraph.segments.iter().filter(|s| !s.is_marker()) {
                any |= segment.is_selected();
                all &= segment.is_selected();
            }
        }
    }
    any && all
}

fn collect_selected_formats<'a>(
    blocks: &'a mut [Block],
    default: &SegmentFormat,
    in_selected_cell: bool,
    include_format_holder: bool,
    out: &mut Vec<SelectedFormat<'a>>,
) {
    for block in blocks {
        match block {
            Block::Paragraph(paragraph) => {
                let whole = in_selected_cell && !paragraph.has_selection();
                let Paragraph {
                    segments,
                    segment_format,
                    ..
                } = paragraph;
                for segment in segments.iter_mut() {
                    if matches!(segment, Segment::Entity(_)) || !(whole || segment.is_selected()) {
                        continue;
                    }
                    let effective = resolve_segment_format(default, segment_format, segment.format());
                    let is_marker = segment.is_marker();
                    out.push(SelectedFormat {
                        effective,
                        target: segment.format_mut(),
                        is_marker,
                    });
                }
            }
            Block::Table(table) => {
                for row in &mut table.rows {
                    for cell in &mut row.cells {
                        let selected = in_selected_cell || cell.is_selected;
                        collect_selected_formats(&mut cell.blocks, default, selected, include_format_holder, out);
                    }
                }
            }
            Block::BlockGroup(BlockGroup::ListItem(item)) => {
                let holder = include_format_holder && list_item_fully_selected(item);
                let ListItem {
                    blocks,
                    segment_format,
                    ..
                } = item;
                collect_selected_formats(blocks, default, in_selected_cell, include_format_holder, out);
                if holder {
                    let effective = resolve_segment_format(default, segment_format, &SegmentFormat::default());
                    out.push(SelectedFormat {
                        effective,
                        target: segment_format,
                        is_marker: false,
                    });
                }
            }
            Block::BlockGroup(group) => {
                collect_selected_formats(group.blocks_mut(), default, in_selected_cell, include_format_holder, out);
            }
            Block::Entity(_) => {}
        }
    }
}

/// Applies a character format to the selection.
///
/// The style is turned off only when `segment_has_style` holds for every selected segment. With
/// a collapsed selection there is nothing to format: the caret's format becomes the pending
/// format and the call reports no change.
pub fn format_segment_with_content_model(
    editor: &mut Editor,
    api_name: &str,
    toggle: impl Fn(&mut SegmentFormat, bool),
    segment_has_style: Option<&dyn Fn(&SegmentFormat) -> bool>,
    include_format_holder: bool,
) -> Result<bool, EditorError> {
    editor.format_content_model(
        |model, context| {
            let default = model.format.clone();
            let mut targets = Vec::new();
            collect_selected_formats(&mut model.blocks, &default, false, include_format_holder, &mut targets);
            if targets.is_empty() {
                return false;
            }

            let is_collapsed = targets.iter().all(|t| t.is_marker);
            let turning_off = segment_has_style.is_some_and(|has_style| targets.iter().all(|t| has_style(&t.effective)));
            for target in &mut targets {
                toggle(target.target, !turning_off);
            }

            if is_collapsed {
                context.new_pending_format = targets.first().map(|t| t.target.clone());
                false
            } else {
                true
            }
        },
        FormatContentModelOptions::api(api_name),
    )
}

pub fn toggle_bold(editor: &mut Editor) -> Result<bool, EditorError> {
    format_segment_with_content_model(
        editor,
        "toggleBold",
        |format, on| format.font_weight = Some(if on { "bold" } else { "normal" }.to_string()),
        Some(&|format: &SegmentFormat| format.is_bold()),
        false,
    )
}

pub fn toggle_italic(editor: &mut Editor) -> Result<bool, EditorError> {
    format_segment_with_content_model(
        editor,
        "toggleItalic",
        |format, on| format.italic = Some(on),
        Some(&|format: &SegmentFormat| format.italic == Some(true)),
        false,
    )
}

pub fn toggle_underline(editor: &mut Editor) -> Result<bool, EditorError> {
    format_segment_with_content_model(
        editor,
        "toggleUnderline",
        |format, on| format.underline = Some(on),
        Some(&|format: &SegmentFormat| format.underline == Some(true)),
        false,
    )
}

pub fn toggle_strikethrough(editor: &mut Editor) -> Result<bool, EditorError> {
    format_segment_with_content_model(
        editor,
        "toggleStrikethrough",
        |format, on| format.strikethrough = Some(on),
        Some(&|format: &SegmentFormat| format.strikethrough == Some(true)),
        false,
    )
}

/// `None` removes the color.
pub fn set_text_color(editor: &mut Editor, color: Option<&str>) -> Result<bool, EditorError> {
    format_segment_with_content_model(
        editor,
        "setTextColor",
        |format, _| format.text_color = color.map(str::to_string),
        None,
        true,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AutoFormatOptions {
    pub auto_bullet: bool,
    pub auto_numbering: bool,
}

impl Default for AutoFormatOptions {
    fn default() -> Self {
        Self {
            auto_bullet: true,
            auto_numbering: true,
        }
    }
}

fn roman_value(text: &str) -> Option<u32> {
    let mut total = 0u32;
    let mut prev = 0u32;
    for ch in text.chars().rev() {
        let value = match ch.to_ascii_lowercase() {
            'i' => 1,
            'v' => 5,
            'x' => 10,
            'l' => 50,
            'c' => 100,
            'd' => 500,
            'm' => 1000,
            _ => return None,
        };
        if value < prev {
            total = total.checked_sub(value)?;
        } else {
            total += value;
            prev = value;
        }
    }
    (total > 0).then_some(total)
}

/// Numbering style and start number for a trigger such as `1.`, `b)`, `(iv)` or `A-`.
pub fn parse_numbering_trigger(trigger: &str) -> Option<(NumberingListType, u32)> {
    // Offset into each family: `.` `)` `(…)` `-`.
    let (body, offset) = if let Some(inner) = trigger.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        (inner, 2)
    } else if let Some(body) = trigger.strip_suffix('.') {
        (body, 0)
    } else if let Some(body) = trigger.strip_suffix(')') {
        (body, 1)
    } else if let Some(body) = trigger.strip_suffix('-') {
        (body, 3)
    } else {
        return None;
    };
    if body.is_empty() {
        return None;
    }

    let all_lower = body.chars().all(|c| c.is_ascii_lowercase());
    let all_upper = body.chars().all(|c| c.is_ascii_uppercase());
    let single = body.chars().count() == 1;
    let (family, start) = if let Ok(n) = body.parse::<u32>() {
        (1, n)
    } else if (all_lower || all_upper) && (!single || body.eq_ignore_ascii_case("i")) {
        (if all_lower { 13 } else { 17 }, roman_value(body)?)
    } else if single && (all_lower || all_upper) {
        let ch = body.chars().next()?;
        let start = u32::from(ch.to_ascii_lowercase()) - u32::from('a') + 1;
        (if all_lower { 5 } else { 9 }, start)
    } else {
        return None;
    };

    // Decimal numbering orders its variants `.` `-` `)` `(…)`.
    let id = if family == 1 {
        match offset {
            0 => 1,
            3 => 2,
            1 => 3,
            _ => 4,
        }
    } else {
        family + offset
    };
    let style = numbering_from_id(id)?;
    Some((style, start))
}

fn numbering_from_id(id: u32) -> Option<NumberingListType> {
    use NumberingListType::*;
    Some(match id {
        1 => Decimal,
        2 => DecimalDash,
        3 => DecimalParenthesis,
        4 => DecimalDoubleParenthesis,
        5 => LowerAlpha,
        6 => LowerAlphaParenthesis,
        7 => LowerAlphaDoubleParenthesis,
        8 => LowerAlphaDash,
        9 => UpperAlpha,
        10 => UpperAlphaParenthesis,
        11 => UpperAlphaDoubleParenthesis,
        12 => UpperAlphaDash,
        13 => LowerRoman,
        14 => LowerRomanParenthesis,
        15 => LowerRomanDoubleParenthesis,
        16 => LowerRomanDash,
        17 => UpperRoman,
        18 => UpperRomanParenthesis,
        19 => UpperRomanDoubleParenthesis,
        20 => UpperRomanDash,
        _ => return None,
    })
}

pub fn parse_bullet_trigger(trigger: &str) -> Option<BulletListType> {
    Some(match trigger {
        "*" => BulletListType::Disc,
        "-" => BulletListType::Dash,
        "--" => BulletListType::Square,
        "->" => BulletListType::LongArrow,
        "-->" => BulletListType::DoubleLongArrow,
        ">" => BulletListType::ShortArrow,
        "=>" => BulletListType::UnfilledArrow,
        "—" => BulletListType::Hyphen,
        _ => return None,
    })
}

/// Path of block indexes, through block groups, to the first paragraph holding a selection.
fn selected_paragraph_path(blocks: &[Block]) -> Option<Vec<usize>> {
    for (ix, block) in blocks.iter().enumerate() {
        match block {
            Block::Paragraph(paragraph) if paragraph.has_selection() => return Some(vec![ix]),
            Block::BlockGroup(group) => {
                if let Some(mut path) = selected_paragraph_path(group.blocks()) {
                    path.insert(0, ix);
                    return Some(path);
                }
            }
            _ => {}
        }
    }
    None
}

fn parent_blocks_mut<'a>(blocks: &'a mut Vec<Block>, path: &[usize]) -> Option<(&'a mut Vec<Block>, usize)> {
    let (last, parents) = path.split_last()?;
    let mut current = blocks;
    for ix in parents {
        match current.get_mut(*ix)? {
            Block::BlockGroup(group) => current = group.blocks_mut(),
            _ => return None,
        }
    }
    Some((current, *last))
}

fn is_inside_list(blocks: &[Block], path: &[usize]) -> bool {
    let mut current = blocks;
    for ix in &path[..path.len().saturating_sub(1)] {
        match current.get(*ix) {
            Some(Block::BlockGroup(BlockGroup::ListItem(_))) => return true,
            Some(Block::BlockGroup(group)) => current = group.blocks(),
            _ => return false,
        }
    }
    false
}

enum ListTrigger {
    Numbering(NumberingListType, u32),
    Bullet(BulletListType),
}

/// Turns a paragraph typed as `1) `, `* ` etc. into a list item.
pub fn auto_format_list(editor: &mut Editor, options: AutoFormatOptions) -> Result<bool, EditorError> {
    editor.format_content_model(
        |model, context| auto_format_list_in_model(model, context, options),
        FormatContentModelOptions {
            api_name: Some("autoToggleList".to_string()),
            change_source: Some(change_source::AUTO_FORMAT.to_string()),
            selection_override: None,
        },
    )
}

fn auto_format_list_in_model(
    model: &mut ContentModelDocument,
    context: &mut FormatContentModelContext,
    options: AutoFormatOptions,
) -> bool {
    let Some(path) = selected_paragraph_path(&model.blocks) else {
        return false;
    };
    if is_inside_list(&model.blocks, &path) {
        return false;
    }
    let Some((parent, index)) = parent_blocks_mut(&mut model.blocks, &path) else {
        return false;
    };
    let Some(Block::Paragraph(paragraph)) = parent.get(index) else {
        return false;
    };

    let Some(caret) = paragraph.segments.iter().position(Segment::is_marker) else {
        return false;
    };
    if paragraph.segments.iter().any(|s| s.is_selected() && !s.is_marker()) {
        return false;
    }
    let mut before = String::new();
    for segment in &paragraph.segments[..caret] {
        match segment {
            Segment::Text(text) => before.push_str(&text.text),
            _ => return false,
        }
    }
    let trigger = before.trim();

    let parsed = if options.auto_numbering {
        parse_numbering_trigger(trigger).map(|(style, start)| ListTrigger::Numbering(style, start))
    } else {
        None
    };
    let parsed = parsed.or_else(|| {
        options
            .auto_bullet
            .then(|| parse_bullet_trigger(trigger).map(ListTrigger::Bullet))
            .flatten()
    });
    let Some(parsed) = parsed else {
        return false;
    };

    let previous_level = index
        .checked_sub(1)
        .and_then(|ix| parent.get(ix))
        .and_then(Block::as_list_item)
        .and_then(|item| continued_level(parent, index, item, &parsed));

    let level = match previous_level {
        Some(level) => level,
        None => {
            let mut metadata = ListMetadata::default();
            let mut level = match parsed {
                ListTrigger::Numbering(style, start) => {
                    metadata.ordered_style_type = Some(style as u32);
                    let mut level = ListLevel::new(ListType::Ordered);
                    level.format.list_style_type = Some(style.css_list_style().to_string());
                    if start != 1 {
                        level.format.start_number_override = Some(start);
                    }
                    level
                }
                ListTrigger::Bullet(style) => {
                    metadata.unordered_style_type = Some(style as u32);
                    let mut level = ListLevel::new(ListType::Unordered);
                    level.format.list_style_type = Some(style.css_list_style().to_string());
                    level
                }
            };
            write_metadata(&mut level.dataset, &metadata);
            level
        }
    };

    let Block::Paragraph(mut paragraph) = parent.remove(index) else {
        return false;
    };
    // A paragraph left with only the caret gets its line break from normalization.
    paragraph.segments.drain(..caret);
    if paragraph.decorator.is_none() && paragraph.format.is_empty() && paragraph.segment_format.is_empty() {
        paragraph.is_implicit = true;
    }
    let mut item = ListItem::new(vec![level]);
    item.blocks.push(paragraph.into());
    parent.insert(index, item.into());

    context.can_undo_by_backspace = true;
    true
}

/// The level of the list right before the paragraph, when the trigger continues it.
fn continued_level(parent: &[Block], index: usize, previous: &ListItem, trigger: &ListTrigger) -> Option<ListLevel> {
    let [level] = previous.levels.as_slice() else {
        return None;
    };
    let metadata: ListMetadata = read_metadata(&level.dataset).unwrap_or_default();
    match trigger {
        ListTrigger::Numbering(style, start) => {
            if level.list_type != ListType::Ordered || metadata.ordered_style_type != Some(*style as u32) {
                return None;
            }
            let count = parent[..index]
                .iter()
                .rev()
                .map_while(Block::as_list_item)
                .take_while(|item| matches!(item.levels.as_slice(), [l] if l.list_type == level.list_type && l.dataset == level.dataset))
                .count() as u32;
            let first = level.format.start_number_override.unwrap_or(1);
            (first + count == *start).then(|| level.clone())
        }
        ListTrigger::Bullet(style) => (level.list_type == ListType::Unordered
            && metadata.unordered_style_type == Some(*style as u32))
        .then(|| level.clone()),
    }
}

/// Inserts a read-only entity at the caret (inline) or after the caret's paragraph (block).
/// Returns the new entity's id, or `None` when there is no selection to insert at.
pub fn insert_entity(
    editor: &mut Editor,
    entity_type: &str,
    is_block: bool,
    content_html: &str,
) -> Result<Option<String>, EditorError> {
    if editor.get_dom_selection().is_none() {
        return Ok(None);
    }
    let id = editor.next_entity_id(entity_type);
    let info = EntityInfo {
        entity_type: entity_type.to_string(),
        id: id.clone(),
        is_readonly: true,
    };
    let wrapper = create_wrapper(editor, &info, is_block, content_html)?;

    let entity = Entity::new(id.clone(), entity_type, wrapper);
    let changed = editor.format_content_model(
        |model, context| {
            let Some(path) = selected_paragraph_path(&model.blocks) else {
                return false;
            };
            let Some((parent, index)) = parent_blocks_mut(&mut model.blocks, &path) else {
                return false;
            };
            if is_block {
                parent.insert(index + 1, Block::Entity(entity.clone()));
            } else {
                let Some(Block::Paragraph(paragraph)) = parent.get_mut(index) else {
                    return false;
                };
                let at = paragraph
                    .segments
                    .iter()
                    .position(Segment::is_selected)
                    .unwrap_or(paragraph.segments.len());
                paragraph.segments.insert(at, Segment::Entity(entity.clone()));
            }
            context.new_entities.push(entity.clone());
            true
        },
        FormatContentModelOptions {
            api_name: Some("insertEntity".to_string()),
            change_source: Some(change_source::INSERT_ENTITY.to_string()),
            selection_override: None,
        },
    )?;
    Ok(changed.then_some(id))
}

fn create_wrapper(editor: &mut Editor, info: &EntityInfo, is_block: bool, content_html: &str) -> Result<NodeId, EditorError> {
    let dom = editor.dom_mut();
    let wrapper = dom.create_element_with_attributes(
        if is_block { "div" } else { "span" },
        vec![
            ("class".to_string(), info.class_list()),
            ("contenteditable".to_string(), "false".to_string()),
        ],
    );
    for node in parse_fragment(dom, content_html) {
        dom.append_child(wrapper, node)?;
    }
    Ok(wrapper)
}

fn remove_entity_from(blocks: &mut Vec<Block>, entity_id: &str, removed: &mut Vec<Entity>) {
    let mut ix = 0;
    while ix < blocks.len() {
        if matches!(&blocks[ix], Block::Entity(entity) if entity.entity_id == entity_id) {
            if let Block::Entity(entity) = blocks.remove(ix) {
                removed.push(entity);
            }
            continue;
        }
        match &mut blocks[ix] {
            Block::Paragraph(paragraph) => {
                paragraph.segments.retain(|segment| match segment {
                    Segment::Entity(entity) if entity.entity_id == entity_id => {
                        removed.push(entity.clone());
                        false
                    }
                    _ => true,
                });
            }
            Block::Table(table) => {
                for row in &mut table.rows {
                    for cell in &mut row.cells {
                        remove_entity_from(&mut cell.blocks, entity_id, removed);
                    }
                }
            }
            Block::BlockGroup(group) => remove_entity_from(group.blocks_mut(), entity_id, removed),
            Block::Entity(_) => {}
        }
        ix += 1;
    }
}

pub fn remove_entity(editor: &mut Editor, entity_id: &str, operation: EntityOperation) -> Result<bool, EditorError> {
    if editor.entity(entity_id).is_none() {
        return Err(EditorError::UnknownEntity(entity_id.to_string()));
    }
    editor.format_content_model(
        |model, context| {
            let mut removed = Vec::new();
            remove_entity_from(&mut model.blocks, entity_id, &mut removed);
            let found = !removed.is_empty();
            context
                .deleted_entities
                .extend(removed.into_iter().map(|entity| DeletedEntity { entity, operation }));
            found
        },
        FormatContentModelOptions::api("removeEntity"),
    )
}

/// Inserts an image before the selection.
pub fn insert_image(editor: &mut Editor, src: &str, alt: Option<&str>) -> Result<bool, EditorError> {
    editor.format_content_model(
        |model, context| {
            let Some(path) = selected_paragraph_path(&model.blocks) else {
                return false;
            };
            let Some((parent, index)) = parent_blocks_mut(&mut model.blocks, &path) else {
                return false;
            };
            let Some(Block::Paragraph(paragraph)) = parent.get_mut(index) else {
                return false;
            };
            let at = paragraph
                .segments
                .iter()
                .position(Segment::is_selected)
                .unwrap_or(paragraph.segments.len());
            let format = paragraph
                .segments
                .get(at)
                .map(|s| s.format().clone())
                .unwrap_or_default();
            let mut image = Image::new(src);
            image.alt = alt.map(str::to_string);
            image.format = format;
            paragraph.segments.insert(at, Segment::Image(image.clone()));
            context.new_images.push(image);
            true
        },
        FormatContentModelOptions::api("insertImage"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_triggers_map_to_style_ids() {
        let cases = [
            ("1.", 1, 1),
            ("1-", 2, 1),
            ("1)", 3, 1),
            ("(1)", 4, 1),
            ("3)", 3, 3),
            ("a.", 5, 1),
            ("b)", 6, 2),
            ("(c)", 7, 3),
            ("a-", 8, 1),
            ("A.", 9, 1),
            ("i.", 13, 1),
            ("iv)", 14, 4),
            ("IX.", 17, 9),
        ];
        for (trigger, id, start) in cases {
            let (style, n) = parse_numbering_trigger(trigger).unwrap();
            assert_eq!((style as u32, n), (id, start), "{trigger}");
        }
        assert!(parse_numbering_trigger("1").is_none());
        assert!(parse_numbering_trigger("ab.").is_none());
    }

    #[test]
    fn bullet_triggers_map_to_style_ids() {
        assert_eq!(parse_bullet_trigger("*"), Some(BulletListType::Disc));
        assert_eq!(parse_bullet_trigger("--"), Some(BulletListType::Square));
        assert_eq!(parse_bullet_trigger("=>"), Some(BulletListType::UnfilledArrow));
        assert_eq!(parse_bullet_trigger("+"), None);
    }

    fn typed(text: &str) -> ContentModelDocument {
        let mut model = ContentModelDocument::new();
        model.blocks.push(
            Paragraph::new()
                .with_segment(crate::model::Text::new(text))
                .with_segment(crate::model::SelectionMarker::new())
                .into(),
        );
        model
    }

    #[test]
    fn trigger_paragraph_is_reduced_to_the_caret() {
        let mut model = typed("1)");
        let mut context = FormatContentModelContext::default();
        assert!(auto_format_list_in_model(&mut model, &mut context, AutoFormatOptions::default()));
        assert!(context.can_undo_by_backspace);

        let Some(Block::BlockGroup(BlockGroup::ListItem(item))) = model.blocks.first() else {
            panic!("expected a list item");
        };
        assert_eq!(
            item.levels[0].dataset.get("editingInfo").map(String::as_str),
            Some(r#"{"orderedStyleType":3}"#)
        );
        let Some(Block::Paragraph(paragraph)) = item.blocks.first() else {
            panic!("expected a paragraph");
        };
        assert_eq!(paragraph.segments.len(), 1);
        assert!(paragraph.segments[0].is_marker());

        crate::normalize::normalize_content_model(&mut model);
        let Some(Block::BlockGroup(BlockGroup::ListItem(item))) = model.blocks.first() else {
            panic!("expected a list item");
        };
        let Some(Block::Paragraph(paragraph)) = item.blocks.first() else {
            panic!("expected a paragraph");
        };
        assert!(matches!(paragraph.segments.as_slice(), [Segment::SelectionMarker(_), Segment::Br(_)]));
    }

    #[test]
    fn text_after_the_caret_stays_in_the_item() {
        let mut model = typed("-");
        if let Some(Block::Paragraph(paragraph)) = model.blocks.first_mut() {
            paragraph.segments.push(crate::model::Text::new("rest").into());
        }
        let mut context = FormatContentModelContext::default();
        assert!(auto_format_list_in_model(&mut model, &mut context, AutoFormatOptions::default()));

        let Some(Block::BlockGroup(BlockGroup::ListItem(item))) = model.blocks.first() else {
            panic!("expected a list item");
        };
        assert_eq!(item.levels[0].list_type, ListType::Unordered);
        let Some(Block::Paragraph(paragraph)) = item.blocks.first() else {
            panic!("expected a paragraph");
        };
        assert_eq!(paragraph.text(), "rest");
    }
}

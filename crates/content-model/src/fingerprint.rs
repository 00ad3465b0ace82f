//! Content and shell hashes the writer compares to decide whether a previously associated DOM
//! node can be reused.
//!
//! Selection state never contributes: a paragraph whose only change is where the caret sits (or
//! how a selection split its text) hashes the same as before.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::model::{
    ElementShell, FormatContainer, ListItem, ListLevel, Paragraph, Segment, Table, TableCell,
    TableRow, Text,
};

fn finish(f: impl FnOnce(&mut DefaultHasher)) -> u64 {
    let mut hasher = DefaultHasher::new();
    f(&mut hasher);
    hasher.finish()
}

/// Adjacent text segments the writer renders as a single text node: same format, link and code,
/// optionally interleaved with selection markers. Each group lists segment indices of its texts.
pub fn text_groups(segments: &[Segment]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut open: Option<&Text> = None;
    for (ix, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Text(text) => {
                let continues = open.is_some_and(|prev| same_run(prev, text));
                match groups.last_mut() {
                    Some(group) if continues => group.push(ix),
                    _ => groups.push(vec![ix]),
                }
                open = Some(text);
            }
            Segment::SelectionMarker(_) => {}
            _ => open = None,
        }
    }
    groups
}

pub fn same_run(a: &Text, b: &Text) -> bool {
    a.format == b.format && a.link == b.link && a.code == b.code
}

pub fn text_group_content(segments: &[Segment], group: &[usize]) -> u64 {
    finish(|h| {
        0u8.hash(h);
        let mut first = true;
        for &ix in group {
            if let Some(Segment::Text(text)) = segments.get(ix) {
                if first {
                    text.format.hash(h);
                    text.link.hash(h);
                    text.code.hash(h);
                    first = false;
                }
                h.write(text.text.as_bytes());
            }
        }
    })
}

/// Hash of a non-text segment. Markers hash to a constant; text is hashed per group.
pub fn segment_content(segment: &Segment) -> u64 {
    finish(|h| hash_segment(segment, h))
}

fn hash_segment(segment: &Segment, h: &mut DefaultHasher) {
    match segment {
        Segment::Text(text) => {
            1u8.hash(h);
            text.format.hash(h);
            text.link.hash(h);
            text.code.hash(h);
            h.write(text.text.as_bytes());
        }
        Segment::Br(br) => {
            2u8.hash(h);
            br.format.hash(h);
            br.link.hash(h);
        }
        Segment::Image(image) => {
            3u8.hash(h);
            image.src.hash(h);
            image.alt.hash(h);
            image.title.hash(h);
            image.format.hash(h);
            image.size.hash(h);
            image.dataset.hash(h);
            image.link.hash(h);
        }
        Segment::SelectionMarker(_) => 4u8.hash(h),
        Segment::Entity(entity) => {
            5u8.hash(h);
            entity.entity_id.hash(h);
            entity.entity_type.hash(h);
            entity.is_readonly.hash(h);
            entity.wrapper.hash(h);
            entity.format.hash(h);
        }
    }
}

pub fn paragraph_shell(paragraph: &Paragraph) -> u64 {
    finish(|h| {
        paragraph.format.hash(h);
        paragraph.segment_format.hash(h);
        if let Some(decorator) = &paragraph.decorator {
            decorator.tag_name.hash(h);
            decorator.format.hash(h);
        }
        paragraph.is_implicit.hash(h);
    })
}

/// Everything a paragraph renders, with text runs canonicalized the way the writer groups them.
pub fn paragraph_content(paragraph: &Paragraph) -> u64 {
    finish(|h| {
        paragraph_shell(paragraph).hash(h);
        let groups = text_groups(&paragraph.segments);
        let mut next_group = groups.iter().peekable();
        for (ix, segment) in paragraph.segments.iter().enumerate() {
            match segment {
                Segment::SelectionMarker(_) => {}
                Segment::Text(_) => {
                    if let Some(group) = next_group.next_if(|g| g.first() == Some(&ix)) {
                        text_group_content(&paragraph.segments, group).hash(h);
                    }
                }
                other => hash_segment(other, h),
            }
        }
    })
}

pub fn container_shell(container: &FormatContainer) -> u64 {
    finish(|h| {
        container.tag_name.hash(h);
        container.format.hash(h);
        container.segment_format.hash(h);
    })
}

pub fn list_item_shell(item: &ListItem) -> u64 {
    finish(|h| {
        item.format.hash(h);
        item.segment_format.hash(h);
    })
}

pub fn list_level_shell(level: &ListLevel) -> u64 {
    finish(|h| {
        level.list_type.hash(h);
        level.format.hash(h);
        level.dataset.hash(h);
    })
}

pub fn table_shell(table: &Table) -> u64 {
    finish(|h| {
        table.format.hash(h);
        table.dataset.hash(h);
    })
}

pub fn row_shell(row: &TableRow) -> u64 {
    finish(|h| {
        row.height.to_bits().hash(h);
        row.format.hash(h);
    })
}

/// Spans are excluded: `rowspan`/`colspan` are rewritten in place on every pass.
pub fn cell_shell(cell: &TableCell) -> u64 {
    finish(|h| {
        cell.format.hash(h);
        cell.segment_format.hash(h);
        cell.is_header.hash(h);
        cell.dataset.hash(h);
    })
}

pub fn general_shell(element: &ElementShell) -> u64 {
    finish(|h| element.hash(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SegmentFormat;
    use crate::model::{Br, SelectionMarker};

    fn bold() -> SegmentFormat {
        SegmentFormat {
            font_weight: Some("bold".into()),
            ..Default::default()
        }
    }

    #[test]
    fn selection_split_does_not_change_content() {
        let whole = Paragraph::new().with_segment(Text::new("hello"));
        let split = Paragraph::new()
            .with_segment(Text::new("he"))
            .with_segment(SelectionMarker::new())
            .with_segment(Text::new("llo").selected());
        assert_eq!(paragraph_content(&whole), paragraph_content(&split));
    }

    #[test]
    fn format_changes_content_but_not_shell() {
        let plain = Paragraph::new().with_segment(Text::new("x"));
        let bolded = Paragraph::new().with_segment(Text::new("x").with_format(bold()));
        assert_ne!(paragraph_content(&plain), paragraph_content(&bolded));
        assert_eq!(paragraph_shell(&plain), paragraph_shell(&bolded));
    }

    #[test]
    fn groups_break_on_format_and_non_text() {
        let segments = vec![
            Segment::Text(Text::new("a")),
            Segment::SelectionMarker(SelectionMarker::new()),
            Segment::Text(Text::new("b")),
            Segment::Text(Text::new("c").with_format(bold())),
            Segment::Br(Br::new()),
            Segment::Text(Text::new("d").with_format(bold())),
        ];
        assert_eq!(text_groups(&segments), vec![vec![0, 2], vec![3], vec![5]]);
    }
}

//! Structural repair run on a model after a mutation and before it is written.

use crate::model::{Block, BlockGroup, BlockGroupLike, Br, Paragraph, Segment, Table, TableCell};

pub fn normalize_content_model(group: &mut impl BlockGroupLike) {
    normalize_blocks(group.blocks_mut());
}

pub fn normalize_blocks(blocks: &mut Vec<Block>) {
    for block in blocks.iter_mut() {
        match block {
            Block::Paragraph(paragraph) => normalize_paragraph(paragraph),
            Block::Table(table) => normalize_table(table),
            Block::BlockGroup(BlockGroup::ListItem(item)) => {
                normalize_blocks(&mut item.blocks);
                // A list item whose only content is the caret still renders a line.
                if let [Block::Paragraph(paragraph)] = item.blocks.as_mut_slice() {
                    let caret_only = !paragraph.segments.is_empty()
                        && paragraph.segments.iter().all(Segment::is_marker);
                    if paragraph.is_implicit && caret_only {
                        add_caret_line(paragraph);
                    }
                }
            }
            Block::BlockGroup(group) => normalize_blocks(group.blocks_mut()),
            Block::Entity(_) => {}
        }
    }
    blocks.retain(|block| match block {
        Block::Paragraph(paragraph) => !paragraph.is_implicit || !paragraph.segments.is_empty(),
        _ => true,
    });
}

pub fn normalize_paragraph(paragraph: &mut Paragraph) {
    let segments = std::mem::take(&mut paragraph.segments);
    for segment in segments {
        if let Segment::Text(text) = &segment {
            if text.text.is_empty() && !text.is_selected {
                continue;
            }
        }
        match (paragraph.segments.last_mut(), segment) {
            (Some(Segment::Text(prev)), Segment::Text(next))
                if prev.format == next.format
                    && prev.link == next.link
                    && prev.code == next.code
                    && prev.is_selected == next.is_selected =>
            {
                prev.text.push_str(&next.text);
            }
            (_, segment) => paragraph.segments.push(segment),
        }
    }

    if paragraph.is_implicit {
        return;
    }
    if paragraph.segments.iter().all(Segment::is_marker) {
        add_caret_line(paragraph);
        return;
    }

    let visible: Vec<&Segment> = paragraph.segments.iter().filter(|s| !s.is_marker()).collect();
    let trailing_br = matches!(visible.last(), Some(Segment::Br(_)))
        && matches!(paragraph.segments.last(), Some(Segment::Br(_)));
    let after_content = visible.len() > 1 && !matches!(visible[visible.len() - 2], Segment::Br(_));
    if trailing_br && after_content {
        paragraph.segments.pop();
    }
}

/// Gives a paragraph holding nothing but the caret a `Br` in the caret's format.
fn add_caret_line(paragraph: &mut Paragraph) {
    let format = paragraph
        .segments
        .first()
        .map(|marker| marker.format().clone())
        .unwrap_or_default();
    paragraph.segments.push(Segment::Br(Br::new().with_format(format)));
}

pub fn normalize_table(table: &mut Table) {
    let columns = table.rows.iter().map(|row| row.cells.len()).max().unwrap_or(0);
    for (r, row) in table.rows.iter_mut().enumerate() {
        if row.cells.len() < columns {
            tracing::debug!(row = r, missing = columns - row.cells.len(), "padding short table row");
            row.cells.resize_with(columns, TableCell::new);
        }
        for (c, cell) in row.cells.iter_mut().enumerate() {
            // Nothing to merge into at the top or left edge.
            if r == 0 {
                cell.span_above = false;
            }
            if c == 0 {
                cell.span_left = false;
            }
            if cell.is_placeholder() {
                cell.blocks.clear();
            } else {
                normalize_blocks(&mut cell.blocks);
            }
        }
    }
    table.widths.resize(columns, 0.0);
}

//! DOM selection values and their projection to and from model selection state.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::dom::{Dom, DomPoint, DomRange, NodeData, NodeId};
use crate::format::SegmentFormat;
use crate::metadata::ENTITY_CLASS;
use crate::model::{Block, BlockGroup, ContentModelDocument, Paragraph, Segment, Table};
use crate::model_to_dom::{ParagraphPlacement, RenderMap};
use crate::table_grid::read_table_grid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomSelection {
    Range {
        range: DomRange,
        #[serde(rename = "isReverted", default)]
        is_reverted: bool,
    },
    Image {
        image: NodeId,
    },
    Table {
        table: NodeId,
        #[serde(rename = "firstRow")]
        first_row: usize,
        #[serde(rename = "firstColumn")]
        first_column: usize,
        #[serde(rename = "lastRow")]
        last_row: usize,
        #[serde(rename = "lastColumn")]
        last_column: usize,
    },
}

impl DomSelection {
    pub fn caret(point: DomPoint) -> Self {
        DomSelection::Range {
            range: DomRange::collapsed(point),
            is_reverted: false,
        }
    }

    pub fn range(range: DomRange) -> Self {
        DomSelection::Range {
            range,
            is_reverted: false,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        matches!(self, DomSelection::Range { range, .. } if range.is_collapsed())
    }

    pub fn caret_point(&self) -> Option<DomPoint> {
        match self {
            DomSelection::Range { range, .. } if range.is_collapsed() => Some(range.start),
            _ => None,
        }
    }

    /// One range per selected physical cell for table selections, skipping span placeholders.
    pub fn to_ranges(&self, dom: &Dom) -> Vec<DomRange> {
        match self {
            DomSelection::Range { range, .. } => vec![*range],
            DomSelection::Image { image } => around(dom, *image).into_iter().collect(),
            DomSelection::Table {
                table,
                first_row,
                first_column,
                last_row,
                last_column,
            } => read_table_grid(dom, *table)
                .cells_in(*first_row, *first_column, *last_row, *last_column)
                .into_iter()
                .map(|cell| {
                    DomRange::new(
                        DomPoint::new(cell, 0),
                        DomPoint::new(cell, dom.child_count(cell)),
                    )
                })
                .collect(),
        }
    }
}

fn around(dom: &Dom, node: NodeId) -> Option<DomRange> {
    let parent = dom.parent(node)?;
    let ix = dom.index_in_parent(node)?;
    Some(DomRange::new(
        DomPoint::new(parent, ix),
        DomPoint::new(parent, ix + 1),
    ))
}

/// Checks a selection against `root`. Anything pointing outside it, at detached nodes or past
/// the end of a node reads as "no selection". Ranges come back ordered, with `is_reverted`
/// recording a backwards selection.
pub fn validate_selection(dom: &Dom, root: NodeId, selection: &DomSelection) -> Option<DomSelection> {
    let inside = |node: NodeId| dom.contains_node(node) && dom.contains(root, node);
    match selection {
        DomSelection::Range { range, is_reverted } => {
            let (start, end) = (range.start, range.end);
            if !inside(start.node) || !inside(end.node) {
                return None;
            }
            if !dom.is_valid_point(&start) || !dom.is_valid_point(&end) {
                return None;
            }
            match dom.compare_points(root, &start, &end)? {
                Ordering::Greater => Some(DomSelection::Range {
                    range: DomRange::new(end, start),
                    is_reverted: !is_reverted,
                }),
                _ => Some(selection.clone()),
            }
        }
        DomSelection::Image { image } => {
            (inside(*image) && dom.tag(*image) == Some("img")).then(|| selection.clone())
        }
        DomSelection::Table {
            table,
            first_row,
            first_column,
            last_row,
            last_column,
        } => {
            if !inside(*table) || dom.tag(*table) != Some("table") {
                return None;
            }
            let grid = read_table_grid(dom, *table);
            let (r0, r1) = ((*first_row).min(*last_row), (*first_row).max(*last_row));
            let (c0, c1) = (
                (*first_column).min(*last_column),
                (*first_column).max(*last_column),
            );
            if r1 >= grid.slots.len() || c1 >= grid.column_count() {
                return None;
            }
            Some(DomSelection::Table {
                table: *table,
                first_row: r0,
                first_column: c0,
                last_row: r1,
                last_column: c1,
            })
        }
    }
}

/// Paragraphs in document order, descending into groups and table cells.
pub fn for_each_paragraph<'a>(blocks: &'a [Block], f: &mut impl FnMut(&'a Paragraph, bool)) {
    visit_paragraphs(blocks, false, f);
}

fn visit_paragraphs<'a>(blocks: &'a [Block], in_selected_cell: bool, f: &mut impl FnMut(&'a Paragraph, bool)) {
    for block in blocks {
        match block {
            Block::Paragraph(paragraph) => f(paragraph, in_selected_cell),
            Block::Table(table) => {
                for row in &table.rows {
                    for cell in &row.cells {
                        visit_paragraphs(&cell.blocks, in_selected_cell || cell.is_selected, f);
                    }
                }
            }
            Block::BlockGroup(group) => visit_paragraphs(group.blocks(), in_selected_cell, f),
            Block::Entity(_) => {}
        }
    }
}

/// Selected segments in document order. Every segment of a selected table cell counts.
pub fn get_selected_segments(model: &ContentModelDocument) -> Vec<&Segment> {
    let mut out = Vec::new();
    for_each_paragraph(&model.blocks, &mut |paragraph, whole| {
        out.extend(paragraph.segments.iter().filter(|s| whole || s.is_selected()));
    });
    out
}

pub fn get_selected_segments_mut(model: &mut ContentModelDocument) -> Vec<&mut Segment> {
    let mut out = Vec::new();
    for paragraph in get_selected_paragraphs_mut(model) {
        let whole = !paragraph.segments.iter().any(Segment::is_selected);
        out.extend(
            paragraph
                .segments
                .iter_mut()
                .filter(|s| whole || s.is_selected()),
        );
    }
    out
}

/// Paragraphs holding at least one selected segment, or sitting in a selected table cell.
pub fn get_selected_paragraphs_mut(model: &mut ContentModelDocument) -> Vec<&mut Paragraph> {
    let mut out = Vec::new();
    collect_paragraphs_mut(&mut model.blocks, false, &mut out);
    out
}

fn collect_paragraphs_mut<'a>(blocks: &'a mut [Block], in_selected_cell: bool, out: &mut Vec<&'a mut Paragraph>) {
    for block in blocks {
        match block {
            Block::Paragraph(paragraph) => {
                if in_selected_cell || paragraph.has_selection() {
                    out.push(paragraph);
                }
            }
            Block::Table(table) => {
                for row in &mut table.rows {
                    for cell in &mut row.cells {
                        let selected = in_selected_cell || cell.is_selected;
                        collect_paragraphs_mut(&mut cell.blocks, selected, out);
                    }
                }
            }
            Block::BlockGroup(group) => collect_paragraphs_mut(group.blocks_mut(), in_selected_cell, out),
            Block::Entity(_) => {}
        }
    }
}

pub fn has_selection(model: &ContentModelDocument) -> bool {
    fn any(blocks: &[Block]) -> bool {
        blocks.iter().any(|block| match block {
            Block::Paragraph(p) => p.has_selection(),
            Block::Table(t) => {
                t.has_selected_cells()
                    || t.rows
                        .iter()
                        .any(|r| r.cells.iter().any(|c| any(&c.blocks)))
            }
            Block::BlockGroup(BlockGroup::General(g)) => g.is_selected || any(&g.blocks),
            Block::BlockGroup(group) => any(group.blocks()),
            Block::Entity(e) => e.is_selected,
        })
    }
    any(&model.blocks)
}

/// Drops every marker and clears every selection flag.
pub fn clear_selection(blocks: &mut [Block]) {
    for block in blocks {
        match block {
            Block::Paragraph(paragraph) => {
                paragraph.segments.retain(|s| !s.is_marker());
                for segment in &mut paragraph.segments {
                    segment.set_selected(false);
                }
            }
            Block::Table(table) => {
                for row in &mut table.rows {
                    for cell in &mut row.cells {
                        cell.is_selected = false;
                        clear_selection(&mut cell.blocks);
                    }
                }
            }
            Block::BlockGroup(BlockGroup::General(general)) => {
                general.is_selected = false;
                clear_selection(&mut general.blocks);
            }
            Block::BlockGroup(group) => clear_selection(group.blocks_mut()),
            Block::Entity(entity) => entity.is_selected = false,
        }
    }
}

/// Decides the format of caret markers sitting between two segments. The marker follows the
/// next segment when that segment already carries `pending`, otherwise the previous segment;
/// `pending` is then laid over the result.
pub fn settle_marker_formats(paragraph: &mut Paragraph, pending: Option<&SegmentFormat>) {
    let carries_format = |s: &Segment| !matches!(s, Segment::SelectionMarker(_) | Segment::Entity(_));
    for ix in 0..paragraph.segments.len() {
        if !paragraph.segments[ix].is_marker() {
            continue;
        }
        let prev = paragraph.segments[..ix]
            .iter()
            .rev()
            .find(|s| !s.is_marker())
            .filter(|s| carries_format(s))
            .map(|s| s.format().clone());
        let next = paragraph.segments[ix + 1..]
            .iter()
            .find(|s| !s.is_marker())
            .filter(|s| carries_format(s))
            .map(|s| s.format().clone());

        let chosen = match (prev, next) {
            (_, Some(next)) if pending.is_some_and(|p| *p == next) => Some(next),
            (Some(prev), _) => Some(prev),
            _ => None,
        };
        if let Segment::SelectionMarker(marker) = &mut paragraph.segments[ix] {
            if let Some(format) = chosen {
                marker.format = format;
            }
            if let Some(pending) = pending {
                marker.format.merge_from(pending);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leaf {
    Text(usize),
    Atomic,
}

fn is_atomic(dom: &Dom, node: NodeId) -> bool {
    match dom.element(node) {
        Some(el) => matches!(el.tag.as_str(), "br" | "img") || el.has_class(ENTITY_CLASS),
        None => false,
    }
}

fn collect_leaves(dom: &Dom, node: NodeId, out: &mut Vec<(NodeId, Leaf)>) {
    match dom.data(node) {
        Some(NodeData::Text(text)) if !text.is_empty() => {
            out.push((node, Leaf::Text(text.chars().count())));
        }
        Some(NodeData::Element(_)) if is_atomic(dom, node) => out.push((node, Leaf::Atomic)),
        Some(NodeData::Element(_)) => {
            for child in dom.children(node) {
                collect_leaves(dom, *child, out);
            }
        }
        _ => {}
    }
}

fn leaves_of(dom: &Dom, placement: &ParagraphPlacement) -> Vec<(NodeId, Leaf)> {
    let mut leaves = Vec::new();
    for root in &placement.roots {
        collect_leaves(dom, *root, &mut leaves);
    }
    leaves
}

/// DOM point for a unit offset inside a rendered paragraph. At the seam between two text nodes
/// the end of the earlier one wins; see [`model_selection_to_dom`] for keeping a caller's point.
pub fn locate(dom: &Dom, placement: &ParagraphPlacement, offset: usize) -> DomPoint {
    let leaves = leaves_of(dom, placement);
    let mut acc = 0usize;
    for (node, leaf) in &leaves {
        match leaf {
            Leaf::Text(len) => {
                if offset <= acc + len {
                    return DomPoint::new(*node, offset - acc);
                }
                acc += len;
            }
            Leaf::Atomic => {
                if offset == acc {
                    return before(dom, *node).unwrap_or(placement.anchor);
                }
                acc += 1;
            }
        }
    }
    match leaves.last() {
        Some((node, Leaf::Text(len))) => DomPoint::new(*node, *len),
        Some((node, Leaf::Atomic)) => before(dom, *node)
            .map(|p| DomPoint::new(p.node, p.offset + 1))
            .unwrap_or(placement.anchor),
        None => placement.anchor,
    }
}

fn before(dom: &Dom, node: NodeId) -> Option<DomPoint> {
    Some(DomPoint::new(dom.parent(node)?, dom.index_in_parent(node)?))
}

/// Unit offset of `point` inside a rendered paragraph, or `None` when the point lies outside it.
fn offset_in(dom: &Dom, root: NodeId, placement: &ParagraphPlacement, point: &DomPoint) -> Option<usize> {
    if !placement.roots.iter().any(|r| dom.contains(*r, point.node)) {
        return None;
    }
    let mut acc = 0usize;
    for (node, leaf) in leaves_of(dom, placement) {
        let (len, end) = match leaf {
            Leaf::Text(len) if node == point.node => return Some(acc + point.offset.min(len)),
            Leaf::Text(len) => (len, DomPoint::new(node, len)),
            Leaf::Atomic => {
                let at = before(dom, node)?;
                (1, DomPoint::new(at.node, at.offset + 1))
            }
        };
        if dom.compare_points(root, &end, point)? == Ordering::Greater {
            return Some(acc);
        }
        acc += len;
    }
    Some(acc)
}

fn atomic_at(dom: &Dom, placement: &ParagraphPlacement, offset: usize) -> Option<NodeId> {
    let mut acc = 0usize;
    for (node, leaf) in leaves_of(dom, placement) {
        match leaf {
            Leaf::Text(len) => acc += len,
            Leaf::Atomic if acc == offset => return Some(node),
            Leaf::Atomic => acc += 1,
        }
    }
    None
}

/// Where the model's selection lands in the DOM just written from it. A boundary of `previous`
/// that still sits at the same model position is kept as it was, and so is its direction.
pub fn model_selection_to_dom(
    dom: &Dom,
    root: NodeId,
    model: &ContentModelDocument,
    rendered: &RenderMap,
    previous: Option<&DomSelection>,
) -> Option<DomSelection> {
    if let Some(selection) = table_selection(&model.blocks, rendered) {
        return Some(selection);
    }

    let mut first: Option<(u64, usize)> = None;
    let mut last: Option<(u64, usize)> = None;
    let mut image: Option<(u64, usize)> = None;
    for_each_paragraph(&model.blocks, &mut |paragraph, _| {
        let mut offset = 0usize;
        for segment in &paragraph.segments {
            let len = segment.unit_len();
            if segment.is_selected() {
                if first.is_none() {
                    first = Some((paragraph.id.get(), offset));
                }
                last = Some((paragraph.id.get(), offset + len));
                match segment {
                    Segment::Image(img) if img.is_selected_as_image_selection => {
                        image = Some((paragraph.id.get(), offset));
                    }
                    _ => {}
                }
            }
            offset += len;
        }
    });

    if let Some((paragraph, offset)) = image {
        let node = rendered
            .paragraphs
            .get(&paragraph)
            .and_then(|placement| atomic_at(dom, placement, offset));
        if let Some(node) = node {
            return Some(DomSelection::Image { image: node });
        }
    }

    let (previous_range, was_reverted) = match previous {
        Some(DomSelection::Range { range, is_reverted }) => (Some(range), *is_reverted),
        _ => (None, false),
    };
    let project = |(paragraph, offset): (u64, usize), wanted: Option<DomPoint>| {
        let placement = rendered.paragraphs.get(&paragraph)?;
        let kept = wanted.filter(|point| {
            dom.is_valid_point(point) && offset_in(dom, root, placement, point) == Some(offset)
        });
        Some(kept.unwrap_or_else(|| locate(dom, placement, offset)))
    };
    let range = DomRange::new(
        project(first?, previous_range.map(|r| r.start))?,
        project(last?, previous_range.map(|r| r.end))?,
    );
    Some(DomSelection::Range {
        is_reverted: was_reverted && !range.is_collapsed(),
        range,
    })
}

fn table_selection(blocks: &[Block], rendered: &RenderMap) -> Option<DomSelection> {
    for block in blocks {
        let found = match block {
            Block::Table(table) => selected_rectangle(table)
                .and_then(|rect| Some((rendered.tables.get(&table.id.get())?, rect)))
                .map(|(node, (r0, c0, r1, c1))| DomSelection::Table {
                    table: *node,
                    first_row: r0,
                    first_column: c0,
                    last_row: r1,
                    last_column: c1,
                })
                .or_else(|| {
                    table
                        .rows
                        .iter()
                        .flat_map(|r| &r.cells)
                        .find_map(|c| table_selection(&c.blocks, rendered))
                }),
            Block::BlockGroup(group) => table_selection(group.blocks(), rendered),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

fn selected_rectangle(table: &Table) -> Option<(usize, usize, usize, usize)> {
    let mut rect: Option<(usize, usize, usize, usize)> = None;
    for (r, row) in table.rows.iter().enumerate() {
        for (c, cell) in row.cells.iter().enumerate() {
            if cell.is_selected {
                rect = Some(match rect {
                    None => (r, c, r, c),
                    Some((r0, c0, r1, c1)) => (r0.min(r), c0.min(c), r1.max(r), c1.max(c)),
                });
            }
        }
    }
    rect
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SelectionMarker, Text};

    fn bold() -> SegmentFormat {
        SegmentFormat {
            font_weight: Some("bold".into()),
            ..Default::default()
        }
    }

    #[test]
    fn marker_follows_previous_segment_by_default() {
        let mut paragraph = Paragraph::new()
            .with_segment(Text::new("a").with_format(bold()))
            .with_segment(SelectionMarker::new())
            .with_segment(Text::new("b"));
        settle_marker_formats(&mut paragraph, None);
        assert_eq!(paragraph.segments[1].format(), &bold());
    }

    #[test]
    fn marker_follows_next_segment_carrying_pending_format() {
        let mut paragraph = Paragraph::new()
            .with_segment(Text::new("a"))
            .with_segment(SelectionMarker::new())
            .with_segment(Text::new("b").with_format(bold()));
        settle_marker_formats(&mut paragraph, Some(&bold()));
        assert_eq!(paragraph.segments[1].format(), &bold());

        let mut paragraph = Paragraph::new()
            .with_segment(Text::new("a"))
            .with_segment(SelectionMarker::new())
            .with_segment(Text::new("b").with_format(bold()));
        settle_marker_formats(&mut paragraph, None);
        assert!(paragraph.segments[1].format().is_empty());
    }

    #[test]
    fn reversed_ranges_are_ordered_on_validation() {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        let text = dom.create_text("hello");
        dom.append_child(root, text).unwrap();

        let backwards = DomSelection::range(DomRange::new(
            DomPoint::new(text, 4),
            DomPoint::new(text, 1),
        ));
        let checked = validate_selection(&dom, root, &backwards).unwrap();
        assert_eq!(
            checked,
            DomSelection::Range {
                range: DomRange::new(DomPoint::new(text, 1), DomPoint::new(text, 4)),
                is_reverted: true,
            }
        );

        let outside = dom.create_text("x");
        assert_eq!(
            validate_selection(&dom, root, &DomSelection::caret(DomPoint::new(outside, 0))),
            None
        );
    }

    #[test]
    fn wire_shape_uses_type_discriminant() {
        let mut dom = Dom::new();
        let table = dom.create_element("table");
        let selection = DomSelection::Table {
            table,
            first_row: 0,
            first_column: 1,
            last_row: 2,
            last_column: 1,
        };
        let json = serde_json::to_value(&selection).unwrap();
        assert_eq!(json["type"], "table");
        assert_eq!(json["firstColumn"], 1);
        assert_eq!(json["lastRow"], 2);
    }
}

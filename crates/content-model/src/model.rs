use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::dom::NodeId;
use crate::format::{
    BlockFormat, CodeFormat, LinkFormat, ListLevelFormat, SegmentFormat, TableFormat,
};
use crate::metadata::Dataset;

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a model node. Identity never takes part in `==`: two nodes compare equal
/// when their content does, whatever their ids. Use [`ModelId::get`] to compare identities.
#[derive(Debug, Clone, Copy)]
pub struct ModelId(u64);

impl ModelId {
    pub fn next() -> Self {
        ModelId(NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::next()
    }
}

impl PartialEq for ModelId {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for ModelId {}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentModelDocument {
    #[serde(skip)]
    pub id: ModelId,
    pub blocks: Vec<Block>,
    /// Document-level default character format; the lowest layer of format precedence.
    pub format: SegmentFormat,
}

impl ContentModelDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_format(format: SegmentFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "blockType")]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    Entity(Entity),
    BlockGroup(BlockGroup),
}

impl Block {
    pub fn id(&self) -> ModelId {
        match self {
            Block::Paragraph(p) => p.id,
            Block::Table(t) => t.id,
            Block::Entity(e) => e.id,
            Block::BlockGroup(g) => g.id(),
        }
    }

    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_paragraph_mut(&mut self) -> Option<&mut Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Block::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_list_item(&self) -> Option<&ListItem> {
        match self {
            Block::BlockGroup(BlockGroup::ListItem(item)) => Some(item),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "blockGroupType")]
pub enum BlockGroup {
    ListItem(ListItem),
    FormatContainer(FormatContainer),
    General(GeneralBlock),
}

impl BlockGroup {
    pub fn id(&self) -> ModelId {
        match self {
            BlockGroup::ListItem(g) => g.id,
            BlockGroup::FormatContainer(g) => g.id,
            BlockGroup::General(g) => g.id,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        match self {
            BlockGroup::ListItem(g) => &g.blocks,
            BlockGroup::FormatContainer(g) => &g.blocks,
            BlockGroup::General(g) => &g.blocks,
        }
    }

    pub fn blocks_mut(&mut self) -> &mut Vec<Block> {
        match self {
            BlockGroup::ListItem(g) => &mut g.blocks,
            BlockGroup::FormatContainer(g) => &mut g.blocks,
            BlockGroup::General(g) => &mut g.blocks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockGroupType {
    Document,
    ListItem,
    FormatContainer,
    General,
    TableCell,
}

/// Anything that owns an ordered list of blocks.
pub trait BlockGroupLike {
    fn group_type(&self) -> BlockGroupType;
    fn blocks(&self) -> &[Block];
    fn blocks_mut(&mut self) -> &mut Vec<Block>;
}

macro_rules! impl_block_group {
    ($ty:ty, $kind:expr) => {
        impl BlockGroupLike for $ty {
            fn group_type(&self) -> BlockGroupType {
                $kind
            }

            fn blocks(&self) -> &[Block] {
                &self.blocks
            }

            fn blocks_mut(&mut self) -> &mut Vec<Block> {
                &mut self.blocks
            }
        }
    };
}

impl_block_group!(ContentModelDocument, BlockGroupType::Document);
impl_block_group!(ListItem, BlockGroupType::ListItem);
impl_block_group!(FormatContainer, BlockGroupType::FormatContainer);
impl_block_group!(GeneralBlock, BlockGroupType::General);
impl_block_group!(TableCell, BlockGroupType::TableCell);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Paragraph {
    #[serde(skip)]
    pub id: ModelId,
    pub segments: Vec<Segment>,
    pub format: BlockFormat,
    /// Character format the paragraph wrapper applies to all of its segments.
    pub segment_format: SegmentFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decorator: Option<ParagraphDecorator>,
    /// The paragraph has no wrapper element of its own (e.g. a bare text run in a list item).
    #[serde(skip_serializing_if = "is_false")]
    pub is_implicit: bool,
}

impl Paragraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn implicit() -> Self {
        Self {
            is_implicit: true,
            ..Default::default()
        }
    }

    pub fn with_segment(mut self, segment: impl Into<Segment>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn with_decorator(mut self, tag_name: &str) -> Self {
        self.decorator = Some(ParagraphDecorator {
            tag_name: tag_name.to_ascii_lowercase(),
            format: SegmentFormat::default(),
        });
        self
    }

    pub fn has_selection(&self) -> bool {
        self.segments.iter().any(Segment::is_selected)
    }

    /// Concatenated text of the text segments.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParagraphDecorator {
    pub tag_name: String,
    pub format: SegmentFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "segmentType")]
pub enum Segment {
    Text(Text),
    Br(Br),
    Image(Image),
    SelectionMarker(SelectionMarker),
    Entity(Entity),
}

impl Segment {
    pub fn id(&self) -> ModelId {
        match self {
            Segment::Text(s) => s.id,
            Segment::Br(s) => s.id,
            Segment::Image(s) => s.id,
            Segment::SelectionMarker(s) => s.id,
            Segment::Entity(s) => s.id,
        }
    }

    pub fn format(&self) -> &SegmentFormat {
        match self {
            Segment::Text(s) => &s.format,
            Segment::Br(s) => &s.format,
            Segment::Image(s) => &s.format,
            Segment::SelectionMarker(s) => &s.format,
            Segment::Entity(s) => &s.format,
        }
    }

    pub fn format_mut(&mut self) -> &mut SegmentFormat {
        match self {
            Segment::Text(s) => &mut s.format,
            Segment::Br(s) => &mut s.format,
            Segment::Image(s) => &mut s.format,
            Segment::SelectionMarker(s) => &mut s.format,
            Segment::Entity(s) => &mut s.format,
        }
    }

    pub fn is_selected(&self) -> bool {
        match self {
            Segment::Text(s) => s.is_selected,
            Segment::Br(s) => s.is_selected,
            Segment::Image(s) => s.is_selected,
            Segment::SelectionMarker(s) => s.is_selected,
            Segment::Entity(s) => s.is_selected,
        }
    }

    pub fn set_selected(&mut self, selected: bool) {
        match self {
            Segment::Text(s) => s.is_selected = selected,
            Segment::Br(s) => s.is_selected = selected,
            Segment::Image(s) => {
                s.is_selected = selected;
                if !selected {
                    s.is_selected_as_image_selection = false;
                }
            }
            Segment::SelectionMarker(s) => s.is_selected = selected,
            Segment::Entity(s) => s.is_selected = selected,
        }
    }

    pub fn link(&self) -> Option<&Link> {
        match self {
            Segment::Text(s) => s.link.as_ref(),
            Segment::Br(s) => s.link.as_ref(),
            Segment::Image(s) => s.link.as_ref(),
            Segment::SelectionMarker(s) => s.link.as_ref(),
            Segment::Entity(_) => None,
        }
    }

    pub fn code(&self) -> Option<&Code> {
        match self {
            Segment::Text(s) => s.code.as_ref(),
            Segment::SelectionMarker(s) => s.code.as_ref(),
            _ => None,
        }
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, Segment::SelectionMarker(_))
    }

    /// Chars for text, one for every other visible segment, none for markers.
    pub fn unit_len(&self) -> usize {
        match self {
            Segment::Text(t) => t.text.chars().count(),
            Segment::SelectionMarker(_) => 0,
            _ => 1,
        }
    }
}

macro_rules! impl_into_segment {
    ($($ty:ident),*) => {
        $(impl From<$ty> for Segment {
            fn from(value: $ty) -> Self {
                Segment::$ty(value)
            }
        })*
    };
}

impl_into_segment!(Text, Br, Image, SelectionMarker, Entity);

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Link {
    pub format: LinkFormat,
    #[serde(skip_serializing_if = "Dataset::is_empty")]
    pub dataset: Dataset,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            format: LinkFormat {
                href: href.into(),
                ..Default::default()
            },
            dataset: Dataset::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Code {
    pub format: CodeFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Text {
    #[serde(skip)]
    pub id: ModelId,
    pub text: String,
    pub format: SegmentFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Code>,
    #[serde(skip_serializing_if = "is_false")]
    pub is_selected: bool,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: SegmentFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.link = Some(link);
        self
    }

    pub fn selected(mut self) -> Self {
        self.is_selected = true;
        self
    }

    /// Splits at a char offset, keeping the head in `self` and returning the tail as a new
    /// segment with the same format, link, code and selection state.
    pub fn split_off(&mut self, char_offset: usize) -> Text {
        let byte = self
            .text
            .char_indices()
            .nth(char_offset)
            .map(|(ix, _)| ix)
            .unwrap_or(self.text.len());
        let tail = self.text.split_off(byte);
        Text {
            id: ModelId::next(),
            text: tail,
            format: self.format.clone(),
            link: self.link.clone(),
            code: self.code.clone(),
            is_selected: self.is_selected,
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Br {
    #[serde(skip)]
    pub id: ModelId,
    pub format: SegmentFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
    #[serde(skip_serializing_if = "is_false")]
    pub is_selected: bool,
}

impl Br {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: SegmentFormat) -> Self {
        self.format = format;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageSize {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Image {
    #[serde(skip)]
    pub id: ModelId,
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub format: SegmentFormat,
    pub size: ImageSize,
    #[serde(skip_serializing_if = "Dataset::is_empty")]
    pub dataset: Dataset,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
    #[serde(skip_serializing_if = "is_false")]
    pub is_selected: bool,
    /// Selected as a single image (image selection) rather than as part of a range.
    #[serde(skip_serializing_if = "is_false")]
    pub is_selected_as_image_selection: bool,
}

impl Image {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            ..Default::default()
        }
    }
}

/// Zero-width caret placeholder. Its format is the pending format for text typed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectionMarker {
    #[serde(skip)]
    pub id: ModelId,
    pub format: SegmentFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Code>,
    pub is_selected: bool,
}

impl Default for SelectionMarker {
    fn default() -> Self {
        Self {
            id: ModelId::next(),
            format: SegmentFormat::default(),
            link: None,
            code: None,
            is_selected: true,
        }
    }
}

impl SelectionMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: SegmentFormat) -> Self {
        self.format = format;
        self
    }
}

/// Opaque embedded content. The model never edits inside an entity; it only moves or drops
/// the whole wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(skip)]
    pub id: ModelId,
    pub entity_id: String,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_readonly: bool,
    /// Handle of the wrapper element in the host document.
    pub wrapper: NodeId,
    #[serde(default)]
    pub format: SegmentFormat,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_selected: bool,
}

impl Entity {
    pub fn new(entity_id: impl Into<String>, entity_type: impl Into<String>, wrapper: NodeId) -> Self {
        Self {
            id: ModelId::next(),
            entity_id: entity_id.into(),
            entity_type: entity_type.into(),
            is_readonly: true,
            wrapper,
            format: SegmentFormat::default(),
            is_selected: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Table {
    #[serde(skip)]
    pub id: ModelId,
    pub rows: Vec<TableRow>,
    /// Per-column widths in px; `0.0` when unknown.
    pub widths: Vec<f64>,
    pub format: TableFormat,
    #[serde(skip_serializing_if = "Dataset::is_empty")]
    pub dataset: Dataset,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row(mut self, row: TableRow) -> Self {
        self.rows.push(row);
        self
    }

    /// Logical column count: the widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&TableCell> {
        self.rows.get(row)?.cells.get(col)
    }

    /// The non-placeholder cell covering `(row, col)`.
    pub fn owner_of(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        let mut r = row;
        let mut c = col;
        let mut cell = self.cell(r, c)?;
        while cell.span_left || cell.span_above {
            if cell.span_left && c > 0 {
                c -= 1;
            } else if cell.span_above && r > 0 {
                r -= 1;
            } else {
                break;
            }
            cell = self.cell(r, c)?;
        }
        Some((r, c))
    }

    /// `(rowspan, colspan)` of the owner cell at `(row, col)`, or `None` for placeholders.
    pub fn spans_of(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        let cell = self.cell(row, col)?;
        if cell.span_left || cell.span_above {
            return None;
        }
        let cells = &self.rows[row].cells;
        let colspan = 1 + cells[col + 1..]
            .iter()
            .take_while(|c| c.span_left && !c.span_above)
            .count();
        let rowspan = 1 + self.rows[row + 1..]
            .iter()
            .take_while(|r| r.cells.get(col).is_some_and(|c| c.span_above && !c.span_left))
            .count();
        Some((rowspan, colspan))
    }

    pub fn has_selected_cells(&self) -> bool {
        self.rows
            .iter()
            .any(|r| r.cells.iter().any(|c| c.is_selected))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableRow {
    #[serde(skip)]
    pub id: ModelId,
    pub height: f64,
    pub format: BlockFormat,
    pub cells: Vec<TableCell>,
}

impl TableRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cell(mut self, cell: TableCell) -> Self {
        self.cells.push(cell);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableCell {
    #[serde(skip)]
    pub id: ModelId,
    pub blocks: Vec<Block>,
    pub format: BlockFormat,
    pub segment_format: SegmentFormat,
    /// Placeholder merged into the cell on its left.
    #[serde(skip_serializing_if = "is_false")]
    pub span_left: bool,
    /// Placeholder merged into the cell above.
    #[serde(skip_serializing_if = "is_false")]
    pub span_above: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_header: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub is_selected: bool,
    #[serde(skip_serializing_if = "Dataset::is_empty")]
    pub dataset: Dataset,
}

impl TableCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn placeholder(span_left: bool, span_above: bool) -> Self {
        Self {
            span_left,
            span_above,
            ..Default::default()
        }
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.span_left || self.span_above
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListType {
    #[serde(rename = "OL")]
    Ordered,
    #[serde(rename = "UL")]
    Unordered,
}

impl ListType {
    pub fn tag(self) -> &'static str {
        match self {
            ListType::Ordered => "ol",
            ListType::Unordered => "ul",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLevel {
    #[serde(skip)]
    pub id: ModelId,
    pub list_type: ListType,
    #[serde(default)]
    pub format: ListLevelFormat,
    #[serde(default, skip_serializing_if = "Dataset::is_empty")]
    pub dataset: Dataset,
}

impl ListLevel {
    pub fn new(list_type: ListType) -> Self {
        Self {
            id: ModelId::next(),
            list_type,
            format: ListLevelFormat::default(),
            dataset: Dataset::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListItem {
    #[serde(skip)]
    pub id: ModelId,
    /// Outer to inner.
    pub levels: Vec<ListLevel>,
    pub blocks: Vec<Block>,
    pub format: BlockFormat,
    /// Format of the list marker (the `<li>`'s own character style).
    pub segment_format: SegmentFormat,
}

impl ListItem {
    pub fn new(levels: Vec<ListLevel>) -> Self {
        Self {
            levels,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormatContainer {
    #[serde(skip)]
    pub id: ModelId,
    pub tag_name: String,
    pub blocks: Vec<Block>,
    pub format: BlockFormat,
    pub segment_format: SegmentFormat,
}

impl FormatContainer {
    pub fn new(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_ascii_lowercase(),
            ..Default::default()
        }
    }
}

/// Tag and attributes of an element the model does not understand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementShell {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
}

/// An element the model has no dedicated block for. Its tag and attributes pass through
/// untouched as `element`, but its children are still built into `blocks` rather than kept
/// opaque, so text and carets inside it stay editable. Only entities are truly opaque.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneralBlock {
    #[serde(skip)]
    pub id: ModelId,
    pub element: ElementShell,
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "is_false")]
    pub is_selected: bool,
}

impl From<Paragraph> for Block {
    fn from(value: Paragraph) -> Self {
        Block::Paragraph(value)
    }
}

impl From<Table> for Block {
    fn from(value: Table) -> Self {
        Block::Table(value)
    }
}

impl From<ListItem> for Block {
    fn from(value: ListItem) -> Self {
        Block::BlockGroup(BlockGroup::ListItem(value))
    }
}

impl From<FormatContainer> for Block {
    fn from(value: FormatContainer) -> Self {
        Block::BlockGroup(BlockGroup::FormatContainer(value))
    }
}

impl From<GeneralBlock> for Block {
    fn from(value: GeneralBlock) -> Self {
        Block::BlockGroup(BlockGroup::General(value))
    }
}

/// Appends `segment` to the trailing paragraph of `group`, opening an implicit paragraph when
/// the group does not end with one.
pub fn add_segment(group: &mut impl BlockGroupLike, segment: impl Into<Segment>) {
    let blocks = group.blocks_mut();
    if !matches!(blocks.last(), Some(Block::Paragraph(_))) {
        blocks.push(Block::Paragraph(Paragraph::implicit()));
    }
    if let Some(Block::Paragraph(paragraph)) = blocks.last_mut() {
        paragraph.segments.push(segment.into());
    }
}

pub fn add_block(group: &mut impl BlockGroupLike, block: impl Into<Block>) {
    group.blocks_mut().push(block.into());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_does_not_affect_equality() {
        let a = Text::new("x");
        let b = Text::new("x");
        assert_ne!(a.id.get(), b.id.get());
        assert_eq!(a, b);
    }

    #[test]
    fn split_off_keeps_format_and_assigns_new_id() {
        let mut text = Text::new("héllo").with_format(SegmentFormat {
            italic: Some(true),
            ..Default::default()
        });
        let tail = text.split_off(2);
        assert_eq!(text.text, "hé");
        assert_eq!(tail.text, "llo");
        assert_eq!(tail.format.italic, Some(true));
        assert_ne!(text.id.get(), tail.id.get());
    }

    #[test]
    fn add_segment_opens_an_implicit_paragraph() {
        let mut doc = ContentModelDocument::new();
        add_segment(&mut doc, Text::new("a"));
        add_segment(&mut doc, Br::new());
        assert_eq!(doc.blocks.len(), 1);
        let paragraph = doc.blocks[0].as_paragraph().unwrap();
        assert!(paragraph.is_implicit);
        assert_eq!(paragraph.segments.len(), 2);
    }

    #[test]
    fn spans_resolve_from_placeholders() {
        let table = Table::new()
            .with_row(
                TableRow::new()
                    .with_cell(TableCell::new())
                    .with_cell(TableCell::placeholder(true, false))
                    .with_cell(TableCell::new()),
            )
            .with_row(
                TableRow::new()
                    .with_cell(TableCell::placeholder(false, true))
                    .with_cell(TableCell::placeholder(true, true))
                    .with_cell(TableCell::new()),
            );
        assert_eq!(table.spans_of(0, 0), Some((2, 2)));
        assert_eq!(table.spans_of(0, 1), None);
        assert_eq!(table.owner_of(1, 1), Some((0, 0)));
        assert_eq!(table.owner_of(1, 2), Some((1, 2)));
    }

    #[test]
    fn serializes_with_type_discriminants() {
        let doc = ContentModelDocument {
            blocks: vec![Block::Paragraph(
                Paragraph::new().with_segment(Text::new("hi")),
            )],
            ..Default::default()
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["blocks"][0]["blockType"], "Paragraph");
        assert_eq!(json["blocks"][0]["segments"][0]["segmentType"], "Text");

        let back: ContentModelDocument = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }
}

//! Builds a Content Model from a DOM subtree, projecting the current selection onto it and
//! recording which DOM node produced which model node.

use std::collections::HashMap;

use crate::association::NodeAssociations;
use crate::config::Capabilities;
use crate::css;
use crate::dom::{Dom, DomPoint, ElementData, NodeData, NodeId};
use crate::fingerprint::text_groups;
use crate::format::{
    parse_block_declarations, parse_segment_declarations, parse_segment_tag,
    split_container_declarations, BlockFormat, CodeFormat, LinkFormat, SegmentFormat,
};
use crate::metadata::{dataset_from_attributes, EntityInfo, ENTITY_CLASS};
use crate::model::{
    Block, Br, Code, ContentModelDocument, ElementShell, Entity, FormatContainer, GeneralBlock,
    Image, Link, ListItem, ListLevel, ListType, ModelId, Paragraph, Segment, SelectionMarker,
    Table, TableCell, TableRow, Text,
};
use crate::selection::{settle_marker_formats, validate_selection, DomSelection};
use crate::table_grid::read_table_grid;

const INLINE_TAGS: &[&str] = &[
    "span", "b", "strong", "i", "em", "u", "ins", "s", "strike", "del", "sup", "sub", "font", "a",
    "code", "small", "big", "mark", "abbr", "cite", "q", "kbd", "var", "samp", "dfn", "time",
    "bdi", "bdo", "label", "tt", "nobr",
];

const BLOCK_TAGS: &[&str] = &[
    "div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote", "li", "address",
    "article", "aside", "center", "dd", "dl", "dt", "figcaption", "figure", "footer", "header",
    "hgroup", "main", "nav", "section", "hr", "form", "fieldset", "details", "summary", "dialog",
    "menu", "ol", "ul", "table",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "head", "meta", "link", "title", "template"];

const STRUCTURAL_TAGS: &[&str] = &["ol", "ul", "table", "thead", "tbody", "tfoot", "tr", "colgroup"];

pub fn is_inline_format_tag(tag: &str) -> bool {
    INLINE_TAGS.contains(&tag)
}

pub fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

fn is_paragraph_tag(tag: &str) -> bool {
    matches!(tag, "div" | "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "pre")
}

fn is_collapsible_whitespace(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{c}'))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions<'a> {
    pub capabilities: Capabilities,
    pub default_format: Option<&'a SegmentFormat>,
    /// Format queued for the next keystroke at the current caret.
    pub pending_format: Option<&'a SegmentFormat>,
}

#[derive(Debug)]
pub struct BuiltModel {
    pub model: ContentModelDocument,
    pub associations: NodeAssociations,
}

/// Walks the children of `root` into a [`ContentModelDocument`].
///
/// A selection that does not lie inside `root` is ignored: the model then carries no selection
/// at all.
pub fn create_model(
    dom: &Dom,
    root: NodeId,
    selection: Option<&DomSelection>,
    options: &BuildOptions,
) -> BuiltModel {
    let selection = selection.and_then(|s| validate_selection(dom, root, s));
    let target = match &selection {
        None => Target::None,
        Some(DomSelection::Range { range, .. }) => {
            let start = normalize_point(dom, root, range.start, false);
            let end = if range.is_collapsed() {
                start
            } else {
                normalize_point(dom, root, range.end, true)
            };
            Target::Range { start, end }
        }
        Some(DomSelection::Image { image }) => Target::Image(*image),
        Some(DomSelection::Table {
            table,
            first_row,
            first_column,
            last_row,
            last_column,
        }) => Target::Table {
            table: *table,
            rows: (*first_row, *last_row),
            columns: (*first_column, *last_column),
        },
    };

    let mut builder = ModelBuilder {
        dom,
        capabilities: options.capabilities,
        target,
        in_range: false,
        selected_any: false,
        start_done: false,
        end_done: false,
        associations: NodeAssociations::new(),
        list_stack: Vec::new(),
        text_pieces: Vec::new(),
        piece_of: HashMap::new(),
    };

    let ctx = InlineContext {
        format: SegmentFormat::default(),
        link: None,
        code: None,
        paragraph_root: root,
    };
    let mut out = Blocks::default();
    builder.walk_children(root, &mut out, &ctx);

    let mut model = ContentModelDocument::with_default_format(
        options.default_format.cloned().unwrap_or_default(),
    );
    model.blocks = out.finish();

    let collapsed = selection.as_ref().is_some_and(DomSelection::is_collapsed);
    let pending = if collapsed { options.pending_format } else { None };
    builder.finish_paragraphs(&mut model.blocks, pending);
    builder.associations.refresh(&model.blocks);

    tracing::trace!(
        blocks = model.blocks.len(),
        associations = builder.associations.len(),
        "built content model"
    );
    BuiltModel {
        model,
        associations: builder.associations,
    }
}

/// Moves boundary points off nodes that produce no model content of their own: into list and
/// table structure, out of entity interiors, and off comments.
fn normalize_point(dom: &Dom, root: NodeId, mut point: DomPoint, is_end: bool) -> DomPoint {
    if let Some(wrapper) = enclosing_entity(dom, root, point.node) {
        if let (Some(parent), Some(ix)) = (dom.parent(wrapper), dom.index_in_parent(wrapper)) {
            point = DomPoint::new(parent, ix + usize::from(is_end));
        }
    }
    loop {
        match dom.data(point.node) {
            Some(NodeData::Comment(_)) | Some(NodeData::EntityPlaceholder { .. }) => {
                match (dom.parent(point.node), dom.index_in_parent(point.node)) {
                    (Some(parent), Some(ix)) => point = DomPoint::new(parent, ix),
                    _ => return point,
                }
            }
            Some(NodeData::Element(el)) if matches!(el.tag.as_str(), "br" | "img") && point.offset > 0 => {
                match (dom.parent(point.node), dom.index_in_parent(point.node)) {
                    (Some(parent), Some(ix)) => point = DomPoint::new(parent, ix + 1),
                    _ => return point,
                }
            }
            Some(NodeData::Element(el)) if STRUCTURAL_TAGS.contains(&el.tag.as_str()) => {
                let children = dom.children(point.node);
                if let Some(child) = children.get(point.offset) {
                    point = DomPoint::new(*child, 0);
                } else if let Some(last) = children.last() {
                    point = DomPoint::new(*last, dom.node_length(*last));
                } else {
                    return point;
                }
            }
            _ => return point,
        }
    }
}

fn enclosing_entity(dom: &Dom, root: NodeId, node: NodeId) -> Option<NodeId> {
    let mut found = None;
    let mut current = dom.parent(node);
    while let Some(ancestor) = current {
        if ancestor == root {
            break;
        }
        if dom.element(ancestor).is_some_and(|el| el.has_class(ENTITY_CLASS)) {
            found = Some(ancestor);
        }
        current = dom.parent(ancestor);
    }
    found
}

#[derive(Debug, Clone, Copy)]
enum Target {
    None,
    Range { start: DomPoint, end: DomPoint },
    Image(NodeId),
    Table {
        table: NodeId,
        rows: (usize, usize),
        columns: (usize, usize),
    },
}

#[derive(Debug, Clone)]
struct InlineContext {
    format: SegmentFormat,
    link: Option<Link>,
    code: Option<Code>,
    /// Element whose children render the paragraph being filled.
    paragraph_root: NodeId,
}

impl InlineContext {
    fn enter_block(&self, node: NodeId) -> Self {
        Self {
            paragraph_root: node,
            ..self.clone()
        }
    }
}

/// Blocks of one group plus the paragraph currently receiving inline content.
#[derive(Debug, Default)]
struct Blocks {
    blocks: Vec<Block>,
    open: Option<Paragraph>,
}

impl Blocks {
    fn with_paragraph(paragraph: Paragraph) -> Self {
        Self {
            blocks: Vec::new(),
            open: Some(paragraph),
        }
    }

    fn has_open(&self) -> bool {
        self.open.is_some()
    }

    fn paragraph(&mut self) -> &mut Paragraph {
        self.open.get_or_insert_with(Paragraph::implicit)
    }

    fn close(&mut self) {
        match self.open.take() {
            Some(paragraph) if !paragraph.is_implicit || !paragraph.segments.is_empty() => {
                self.blocks.push(Block::Paragraph(paragraph));
            }
            _ => {}
        }
    }

    fn push(&mut self, block: impl Into<Block>) {
        self.close();
        self.blocks.push(block.into());
    }

    fn finish(mut self) -> Vec<Block> {
        self.close();
        self.blocks
    }
}

struct ModelBuilder<'a> {
    dom: &'a Dom,
    capabilities: Capabilities,
    target: Target,
    in_range: bool,
    selected_any: bool,
    start_done: bool,
    end_done: bool,
    associations: NodeAssociations,
    list_stack: Vec<ListLevel>,
    /// Per source text node: its segment root (when it has one) and the segments it produced.
    text_pieces: Vec<(Option<NodeId>, Vec<ModelId>)>,
    piece_of: HashMap<u64, usize>,
}

fn block_and_segment_format(el: &ElementData) -> (BlockFormat, SegmentFormat) {
    let declarations = css::parse_style(el.attribute("style").unwrap_or(""));
    let (block_decls, segment_decls) = split_container_declarations(&declarations);
    let mut format = BlockFormat::default();
    parse_block_declarations(&block_decls, |name| el.attribute(name).map(str::to_string), &mut format);
    let mut segment_format = SegmentFormat::default();
    parse_segment_declarations(&segment_decls, &mut segment_format);
    (format, segment_format)
}

impl<'a> ModelBuilder<'a> {
    fn walk_children(&mut self, parent: NodeId, out: &mut Blocks, ctx: &InlineContext) {
        let dom = self.dom;
        let children = dom.children(parent);
        for (ix, child) in children.iter().enumerate() {
            self.check_point(DomPoint::new(parent, ix), out, ctx);
            self.walk_node(*child, out, ctx);
        }
        self.check_point(DomPoint::new(parent, children.len()), out, ctx);
    }

    fn walk_node(&mut self, node: NodeId, out: &mut Blocks, ctx: &InlineContext) {
        let dom = self.dom;
        match dom.data(node) {
            Some(NodeData::Text(text)) => self.walk_text(node, text, out, ctx),
            Some(NodeData::Element(el)) => self.walk_element(node, el, out, ctx),
            _ => {}
        }
    }

    fn range_points(&self) -> Option<(DomPoint, DomPoint)> {
        match self.target {
            Target::Range { start, end } => Some((start, end)),
            _ => None,
        }
    }

    fn check_point(&mut self, point: DomPoint, out: &mut Blocks, ctx: &InlineContext) {
        let Some((start, end)) = self.range_points() else {
            return;
        };
        if !self.start_done && point == start {
            self.start_done = true;
            if start == end {
                self.end_done = true;
                self.add_marker(out, ctx);
                return;
            }
            self.in_range = true;
        }
        if self.in_range && !self.end_done && point == end {
            self.end_done = true;
            self.in_range = false;
            if !self.selected_any {
                self.add_marker(out, ctx);
            }
        }
    }

    fn add_marker(&mut self, out: &mut Blocks, ctx: &InlineContext) {
        let marker = SelectionMarker {
            format: ctx.format.clone(),
            link: ctx.link.clone(),
            code: ctx.code.clone(),
            ..SelectionMarker::new()
        };
        out.paragraph().segments.push(Segment::SelectionMarker(marker));
    }

    fn has_points_in(&self, node: NodeId) -> bool {
        self.range_points().is_some_and(|(start, end)| {
            (!self.start_done && start.node == node) || (!self.end_done && end.node == node)
        })
    }

    fn walk_text(&mut self, node: NodeId, text: &str, out: &mut Blocks, ctx: &InlineContext) {
        let has_points = self.has_points_in(node);
        if !out.has_open() && !has_points && is_collapsible_whitespace(text) {
            return;
        }

        let chars: Vec<char> = text.chars().collect();
        let mut cuts: Vec<usize> = Vec::new();
        if let Some((start, end)) = self.range_points() {
            if !self.start_done && start.node == node {
                cuts.push(start.offset.min(chars.len()));
            }
            if !self.end_done && end.node == node {
                cuts.push(end.offset.min(chars.len()));
            }
        }
        cuts.sort_unstable();
        cuts.dedup();

        let mut pieces = Vec::new();
        let mut pos = 0usize;
        for cut in cuts {
            if cut > pos {
                pieces.push(self.add_text(&chars[pos..cut], out, ctx));
                pos = cut;
            }
            self.check_point(DomPoint::new(node, cut), out, ctx);
        }
        if pos < chars.len() {
            pieces.push(self.add_text(&chars[pos..], out, ctx));
        }

        if !pieces.is_empty() {
            let root = self.segment_root(node, ctx.paragraph_root);
            let ix = self.text_pieces.len();
            for id in &pieces {
                self.piece_of.insert(id.get(), ix);
            }
            self.text_pieces.push((root, pieces));
        }
    }

    fn add_text(&mut self, chars: &[char], out: &mut Blocks, ctx: &InlineContext) -> ModelId {
        let text = Text {
            text: chars.iter().collect(),
            format: ctx.format.clone(),
            link: ctx.link.clone(),
            code: ctx.code.clone(),
            is_selected: self.in_range,
            ..Default::default()
        };
        if self.in_range {
            self.selected_any = true;
        }
        let id = text.id;
        out.paragraph().segments.push(Segment::Text(text));
        id
    }

    /// Topmost node of the single-child inline chain between a leaf and the paragraph's element.
    fn segment_root(&self, leaf: NodeId, paragraph_root: NodeId) -> Option<NodeId> {
        let mut current = leaf;
        loop {
            let parent = self.dom.parent(current)?;
            if parent == paragraph_root {
                return Some(current);
            }
            let inline = self.dom.tag(parent).is_some_and(is_inline_format_tag);
            if !inline || self.dom.child_count(parent) != 1 {
                return None;
            }
            current = parent;
        }
    }

    fn walk_element(&mut self, node: NodeId, el: &ElementData, out: &mut Blocks, ctx: &InlineContext) {
        if let Some(info) = EntityInfo::parse(el.classes()) {
            self.entity(node, el, info, out, ctx);
            return;
        }
        let tag = el.tag.as_str();
        match tag {
            "br" => self.br(node, out, ctx),
            "img" => self.image(node, el, out, ctx),
            "ol" | "ul" => self.list(node, el, out, ctx),
            "table" => self.table(node, el, out, ctx),
            _ if SKIPPED_TAGS.contains(&tag) => {
                tracing::debug!(tag, "skipping non-content element");
            }
            _ if is_inline_format_tag(tag) => {
                let inner = inline_context(el, ctx);
                self.walk_children(node, out, &inner);
            }
            "blockquote" => self.container(node, el, out, ctx),
            _ if is_paragraph_tag(tag) => self.paragraph_or_container(node, el, out, ctx),
            _ if self.capabilities.preserve_unknown_elements => self.general(node, el, out, ctx),
            _ if is_block_tag(tag) => self.paragraph_or_container(node, el, out, ctx),
            _ => self.walk_children(node, out, ctx),
        }
    }

    fn has_block_descendant(&self, node: NodeId) -> bool {
        self.dom.children(node).iter().any(|child| match self.dom.element(*child) {
            Some(el) if el.has_class(ENTITY_CLASS) => is_block_tag(&el.tag),
            Some(el) => {
                let tag = el.tag.as_str();
                if SKIPPED_TAGS.contains(&tag) {
                    false
                } else if is_block_tag(tag) {
                    true
                } else if is_inline_format_tag(tag) || matches!(tag, "br" | "img") {
                    self.has_block_descendant(*child)
                } else {
                    self.capabilities.preserve_unknown_elements || self.has_block_descendant(*child)
                }
            }
            None => false,
        })
    }

    fn paragraph_or_container(&mut self, node: NodeId, el: &ElementData, out: &mut Blocks, ctx: &InlineContext) {
        if self.has_block_descendant(node) {
            self.container(node, el, out, ctx);
            return;
        }
        let (format, segment_format) = block_and_segment_format(el);
        let mut paragraph = Paragraph {
            format,
            segment_format,
            ..Paragraph::new()
        };
        if is_paragraph_tag(&el.tag) && el.tag != "div" {
            paragraph = paragraph.with_decorator(&el.tag);
        }
        self.associations.record(paragraph.id, node);

        let mut inner = Blocks::with_paragraph(paragraph);
        self.walk_children(node, &mut inner, &ctx.enter_block(node));
        for block in inner.finish() {
            out.push(block);
        }
    }

    fn container(&mut self, node: NodeId, el: &ElementData, out: &mut Blocks, ctx: &InlineContext) {
        let (format, segment_format) = block_and_segment_format(el);
        let tag = if is_paragraph_tag(&el.tag) || el.tag == "blockquote" {
            el.tag.as_str()
        } else {
            "div"
        };
        let mut container = FormatContainer {
            format,
            segment_format,
            ..FormatContainer::new(tag)
        };
        self.associations.record(container.id, node);

        let mut inner = Blocks::default();
        self.walk_children(node, &mut inner, &ctx.enter_block(node));
        container.blocks = inner.finish();
        out.push(container);
    }

    fn general(&mut self, node: NodeId, el: &ElementData, out: &mut Blocks, ctx: &InlineContext) {
        let mut general = GeneralBlock {
            element: ElementShell {
                tag: el.tag.clone(),
                attributes: el.attributes.clone(),
            },
            is_selected: self.in_range,
            ..Default::default()
        };
        self.associations.record(general.id, node);

        let mut inner = Blocks::default();
        self.walk_children(node, &mut inner, &ctx.enter_block(node));
        general.blocks = inner.finish();
        out.push(general);
    }

    fn br(&mut self, node: NodeId, out: &mut Blocks, ctx: &InlineContext) {
        self.check_point(DomPoint::new(node, 0), out, ctx);
        let br = Br {
            format: ctx.format.clone(),
            link: ctx.link.clone(),
            is_selected: self.in_range,
            ..Br::new()
        };
        self.selected_any |= self.in_range;
        if let Some(root) = self.segment_root(node, ctx.paragraph_root) {
            self.associations.record(br.id, root);
        }
        out.paragraph().segments.push(Segment::Br(br));
    }

    fn image(&mut self, node: NodeId, el: &ElementData, out: &mut Blocks, ctx: &InlineContext) {
        self.check_point(DomPoint::new(node, 0), out, ctx);
        let attr = |name: &str| el.attribute(name).map(str::to_string);

        let mut image = Image::new(attr("src").unwrap_or_default());
        image.alt = attr("alt");
        image.title = attr("title");
        image.link = ctx.link.clone();
        image.dataset = dataset_from_attributes(&el.attributes);
        image.format = ctx.format.clone();
        image.size.width = attr("width");
        image.size.height = attr("height");
        let declarations = css::parse_style(el.attribute("style").unwrap_or(""));
        for (name, value) in &declarations {
            match name.as_str() {
                "width" if image.size.width.is_none() => image.size.width = Some(value.clone()),
                "height" if image.size.height.is_none() => image.size.height = Some(value.clone()),
                _ => {}
            }
        }
        parse_segment_declarations(&declarations, &mut image.format);

        let image_selected = matches!(self.target, Target::Image(target) if target == node);
        image.is_selected = self.in_range || image_selected;
        image.is_selected_as_image_selection = image_selected;
        self.selected_any |= self.in_range;

        if let Some(root) = self.segment_root(node, ctx.paragraph_root) {
            self.associations.record(image.id, root);
        }
        out.paragraph().segments.push(Segment::Image(image));
    }

    fn entity(&mut self, node: NodeId, el: &ElementData, info: EntityInfo, out: &mut Blocks, ctx: &InlineContext) {
        let mut entity = Entity::new(info.id, info.entity_type, node);
        entity.is_readonly = info.is_readonly || el.attribute("contenteditable") == Some("false");
        entity.format = ctx.format.clone();
        entity.is_selected = self.in_range;
        self.selected_any |= self.in_range;

        if is_block_tag(&el.tag) {
            out.push(Block::Entity(entity));
        } else {
            out.paragraph().segments.push(Segment::Entity(entity));
        }
    }

    fn list(&mut self, node: NodeId, el: &ElementData, out: &mut Blocks, ctx: &InlineContext) {
        let list_type = if el.tag == "ol" {
            ListType::Ordered
        } else {
            ListType::Unordered
        };
        let mut level = ListLevel::new(list_type);
        if list_type == ListType::Ordered {
            level.format.start_number_override = el
                .attribute("start")
                .and_then(|v| v.trim().parse::<u32>().ok());
        }
        let declarations = css::parse_style(el.attribute("style").unwrap_or(""));
        let (style_type, rest): (Vec<_>, Vec<_>) = declarations
            .into_iter()
            .partition(|(name, _)| name == "list-style-type");
        level.format.list_style_type = style_type.into_iter().next().map(|(_, v)| v);
        parse_block_declarations(&rest, |name| el.attribute(name).map(str::to_string), &mut level.format.block);
        level.dataset = dataset_from_attributes(&el.attributes);
        self.associations.record(level.id, node);

        self.list_stack.push(level);
        let dom = self.dom;
        for child in dom.children(node) {
            match dom.tag(*child) {
                Some("li") => {
                    if let Some(li) = dom.element(*child) {
                        self.list_item(*child, li, out, ctx);
                    }
                }
                Some("ol" | "ul") => {
                    if let Some(nested) = dom.element(*child) {
                        self.list(*child, nested, out, ctx);
                    }
                }
                _ => {
                    let blank = dom.text(*child).is_some_and(is_collapsible_whitespace);
                    if blank && !self.has_points_in(*child) {
                        continue;
                    }
                    let mut item = ListItem::new(self.list_stack.clone());
                    let mut inner = Blocks::default();
                    self.walk_node(*child, &mut inner, &ctx.enter_block(node));
                    item.blocks = inner.finish();
                    if !item.blocks.is_empty() {
                        out.push(item);
                    }
                }
            }
        }
        self.list_stack.pop();
    }

    fn list_item(&mut self, node: NodeId, el: &ElementData, out: &mut Blocks, ctx: &InlineContext) {
        let (format, segment_format) = block_and_segment_format(el);
        let mut item = ListItem {
            format,
            segment_format,
            ..ListItem::new(self.list_stack.clone())
        };
        self.associations.record(item.id, node);
        let mut has_nested = false;

        let item_ctx = ctx.enter_block(node);
        let mut inner = Blocks::default();
        let dom = self.dom;
        let children = dom.children(node);
        for (ix, child) in children.iter().enumerate() {
            self.check_point(DomPoint::new(node, ix), &mut inner, &item_ctx);
            match dom.element(*child) {
                Some(nested) if matches!(nested.tag.as_str(), "ol" | "ul") => {
                    // Content before a nested list closes the item; content after it continues
                    // in a fresh item at the same depth.
                    let blocks = std::mem::take(&mut inner).finish();
                    if !blocks.is_empty() {
                        let continuation = ListItem {
                            format: item.format.clone(),
                            segment_format: item.segment_format.clone(),
                            ..ListItem::new(self.list_stack.clone())
                        };
                        let mut done = std::mem::replace(&mut item, continuation);
                        done.blocks = blocks;
                        out.push(done);
                    }
                    has_nested = true;
                    self.list(*child, nested, out, ctx);
                }
                _ => self.walk_node(*child, &mut inner, &item_ctx),
            }
        }
        self.check_point(DomPoint::new(node, children.len()), &mut inner, &item_ctx);

        item.blocks = inner.finish();
        if !item.blocks.is_empty() || !has_nested {
            out.push(item);
        }
    }

    fn table(&mut self, node: NodeId, el: &ElementData, out: &mut Blocks, ctx: &InlineContext) {
        let dom = self.dom;
        let grid = read_table_grid(dom, node);
        let mut table = Table::new();

        let declarations = css::parse_style(el.attribute("style").unwrap_or(""));
        let mut block_decls = Vec::new();
        for (name, value) in declarations {
            match name.as_str() {
                "border-collapse" => table.format.border_collapse = Some(value),
                "table-layout" => table.format.table_layout = Some(value),
                _ => block_decls.push((name, value)),
            }
        }
        parse_block_declarations(&block_decls, |name| el.attribute(name).map(str::to_string), &mut table.format.block);
        table.dataset = dataset_from_attributes(&el.attributes);
        self.associations.record(table.id, node);

        let columns = grid.column_count();
        let mut widths = column_widths(dom, node, columns);

        let selected_rect = match self.target {
            Target::Table { table: target, rows, columns } if target == node => Some((rows, columns)),
            _ => None,
        };

        for (r, row_node) in grid.rows.iter().enumerate() {
            let mut row = TableRow::new();
            if let Some(row_el) = dom.element(*row_node) {
                let mut rest = Vec::new();
                for (name, value) in css::parse_style(row_el.attribute("style").unwrap_or("")) {
                    if name == "height" {
                        row.height = css::parse_px(&value).unwrap_or(0.0);
                    } else {
                        rest.push((name, value));
                    }
                }
                if row.height == 0.0 {
                    row.height = row_el.attribute("height").and_then(css::parse_px).unwrap_or(0.0);
                }
                parse_block_declarations(&rest, |_| None, &mut row.format);
            }
            self.associations.record(row.id, *row_node);

            for (c, slot) in grid.slots[r].iter().enumerate() {
                let mut cell = if !slot.is_owner() {
                    TableCell::placeholder(slot.span_left, slot.span_above)
                } else if let Some(cell_node) = slot.cell {
                    self.table_cell(cell_node, c, &mut widths, ctx)
                } else {
                    TableCell::new()
                };
                if let Some(((r0, r1), (c0, c1))) = selected_rect {
                    cell.is_selected = (r0..=r1).contains(&r) && (c0..=c1).contains(&c);
                }
                row.cells.push(cell);
            }
            table.rows.push(row);
        }

        if selected_rect.is_some() {
            // A merged cell counts as selected when any position it spans is.
            for r in 0..table.rows.len() {
                for c in 0..table.rows[r].cells.len() {
                    let cell = &table.rows[r].cells[c];
                    if cell.is_selected && cell.is_placeholder() {
                        if let Some((or, oc)) = table.owner_of(r, c) {
                            table.rows[or].cells[oc].is_selected = true;
                        }
                    }
                }
            }
        }

        table.widths = widths;
        out.push(table);
    }

    fn table_cell(&mut self, node: NodeId, column: usize, widths: &mut [f64], ctx: &InlineContext) -> TableCell {
        let dom = self.dom;
        let Some(el) = dom.element(node) else {
            return TableCell::new();
        };
        let (mut format, segment_format) = block_and_segment_format(el);
        if let Some(width) = format.width.take() {
            let colspan = el.attribute("colspan").and_then(|v| v.trim().parse::<usize>().ok()).unwrap_or(1);
            if colspan == 1 {
                if let Some(slot) = widths.get_mut(column).filter(|w| **w == 0.0) {
                    *slot = css::parse_px(&width).unwrap_or(0.0);
                }
            }
        }
        let mut cell = TableCell {
            format,
            segment_format,
            is_header: el.tag == "th",
            dataset: dataset_from_attributes(&el.attributes),
            ..TableCell::new()
        };
        self.associations.record(cell.id, node);

        let mut inner = Blocks::default();
        self.walk_children(node, &mut inner, &ctx.enter_block(node));
        cell.blocks = inner.finish();
        cell
    }

    /// Settles caret formats and ties every text run the writer will emit as one node back to
    /// the DOM node it came from.
    fn finish_paragraphs(&mut self, blocks: &mut [Block], pending: Option<&SegmentFormat>) {
        for block in blocks {
            match block {
                Block::Paragraph(paragraph) => {
                    settle_marker_formats(paragraph, pending);
                    self.associate_text_groups(paragraph);
                }
                Block::Table(table) => {
                    for row in &mut table.rows {
                        for cell in &mut row.cells {
                            self.finish_paragraphs(&mut cell.blocks, pending);
                        }
                    }
                }
                Block::BlockGroup(group) => self.finish_paragraphs(group.blocks_mut(), pending),
                Block::Entity(_) => {}
            }
        }
    }

    fn associate_text_groups(&mut self, paragraph: &Paragraph) {
        for group in text_groups(&paragraph.segments) {
            let ids: Vec<u64> = group
                .iter()
                .filter_map(|ix| paragraph.segments.get(*ix))
                .map(|s| s.id().get())
                .collect();
            let Some(first) = ids.first() else {
                continue;
            };
            let Some(&source) = self.piece_of.get(first) else {
                continue;
            };
            let (root, pieces) = &self.text_pieces[source];
            let same_source = ids.iter().all(|id| self.piece_of.get(id) == Some(&source));
            if let (Some(root), true) = (root, same_source && pieces.len() == ids.len()) {
                self.associations.record(pieces[0], *root);
            }
        }
    }
}

fn inline_context(el: &ElementData, ctx: &InlineContext) -> InlineContext {
    let mut next = ctx.clone();
    let attr = |name: &str| el.attribute(name).map(str::to_string);
    let mut declarations = css::parse_style(el.attribute("style").unwrap_or(""));
    match el.tag.as_str() {
        "a" => {
            next.link = Some(Link {
                format: LinkFormat {
                    href: attr("href").unwrap_or_default(),
                    target: attr("target"),
                    title: attr("title"),
                    rel: attr("rel"),
                },
                dataset: dataset_from_attributes(&el.attributes),
            });
        }
        "code" => {
            let font_family = declarations
                .iter()
                .position(|(name, _)| name == "font-family")
                .map(|ix| declarations.remove(ix).1);
            next.code = Some(Code {
                format: CodeFormat { font_family },
            });
        }
        tag => {
            parse_segment_tag(tag, attr, &mut next.format);
        }
    }
    parse_segment_declarations(&declarations, &mut next.format);
    next
}

fn column_widths(dom: &Dom, table: NodeId, columns: usize) -> Vec<f64> {
    let mut widths = Vec::new();
    for child in dom.children(table) {
        if dom.tag(*child) != Some("colgroup") {
            continue;
        }
        for col in dom.children(*child) {
            let Some(el) = dom.element(*col).filter(|el| el.tag == "col") else {
                continue;
            };
            let width = css::get(&css::parse_style(el.attribute("style").unwrap_or("")), "width")
                .and_then(css::parse_px)
                .or_else(|| el.attribute("width").and_then(css::parse_px))
                .unwrap_or(0.0);
            let span = el
                .attribute("span")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(1)
                .max(1);
            widths.extend(std::iter::repeat_n(width, span));
        }
    }
    widths.resize(columns, 0.0);
    widths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::set_inner_html;
    use crate::model::BlockGroup;

    fn build(html: &str) -> (Dom, NodeId, BuiltModel) {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        set_inner_html(&mut dom, root, html).unwrap();
        let built = create_model(&dom, root, None, &BuildOptions::default());
        (dom, root, built)
    }

    #[test]
    fn inline_tags_and_styles_become_segment_formats() {
        let (_, _, built) = build(r#"<div>a<b>b<span style="color: red">c</span></b></div>"#);
        let paragraph = built.model.blocks[0].as_paragraph().unwrap();
        assert!(!paragraph.is_implicit);
        assert_eq!(paragraph.segments.len(), 3);
        assert!(paragraph.segments[0].format().is_empty());
        assert!(paragraph.segments[1].format().is_bold());
        assert_eq!(paragraph.segments[2].format().text_color.as_deref(), Some("red"));
        assert!(paragraph.segments[2].format().is_bold());
    }

    #[test]
    fn adjacent_runs_are_not_merged_at_build_time() {
        let (_, _, built) = build("<div><b>a</b><b>b</b></div>");
        let paragraph = built.model.blocks[0].as_paragraph().unwrap();
        assert_eq!(paragraph.segments.len(), 2);
    }

    #[test]
    fn div_with_block_children_becomes_a_container() {
        let (_, _, built) = build("<div style=\"color: red\">\n  <div>a</div>\n  <p>b</p>\n</div>");
        let Block::BlockGroup(BlockGroup::FormatContainer(container)) = &built.model.blocks[0] else {
            panic!("expected a format container");
        };
        assert_eq!(container.segment_format.text_color.as_deref(), Some("red"));
        assert_eq!(container.blocks.len(), 2);
        let p = container.blocks[1].as_paragraph().unwrap();
        assert_eq!(p.decorator.as_ref().map(|d| d.tag_name.as_str()), Some("p"));
    }

    #[test]
    fn nested_lists_flatten_into_items_with_level_stacks() {
        let (_, _, built) = build("<ol start=\"3\"><li>a</li><li>b<ul><li>c</li></ul></li></ol>");
        let items: Vec<&ListItem> = built.model.blocks.iter().filter_map(Block::as_list_item).collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].levels.len(), 1);
        assert_eq!(items[0].levels[0].format.start_number_override, Some(3));
        assert_eq!(items[2].levels.len(), 2);
        assert_eq!(items[2].levels[1].list_type, ListType::Unordered);
        assert_eq!(items[0].levels[0].id.get(), items[2].levels[0].id.get());
    }

    #[test]
    fn unknown_elements_are_kept_as_general_blocks() {
        let (_, _, built) = build("<section id=\"s\"><div>a</div></section>");
        let Block::BlockGroup(BlockGroup::General(general)) = &built.model.blocks[0] else {
            panic!("expected a general block");
        };
        assert_eq!(general.element.tag, "section");
        assert_eq!(general.element.attributes, vec![("id".to_string(), "s".to_string())]);
        assert_eq!(general.blocks.len(), 1);
    }

    #[test]
    fn collapsed_selection_splits_text_around_a_marker() {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        set_inner_html(&mut dom, root, "<div>hello</div>").unwrap();
        let text = dom.first_child(dom.first_child(root).unwrap()).unwrap();
        let selection = DomSelection::caret(DomPoint::new(text, 2));
        let built = create_model(&dom, root, Some(&selection), &BuildOptions::default());

        let paragraph = built.model.blocks[0].as_paragraph().unwrap();
        assert_eq!(paragraph.segments.len(), 3);
        assert!(paragraph.segments[1].is_marker());
        assert_eq!(paragraph.text(), "hello");
    }

    #[test]
    fn range_selection_marks_covered_segments_only() {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        set_inner_html(&mut dom, root, "<div>abc<b>def</b></div>").unwrap();
        let div = dom.first_child(root).unwrap();
        let abc = dom.first_child(div).unwrap();
        let def = dom.first_child(dom.last_child(div).unwrap()).unwrap();
        let selection = DomSelection::range(crate::dom::DomRange::new(
            DomPoint::new(abc, 1),
            DomPoint::new(def, 2),
        ));
        let built = create_model(&dom, root, Some(&selection), &BuildOptions::default());

        let paragraph = built.model.blocks[0].as_paragraph().unwrap();
        let selected: Vec<bool> = paragraph.segments.iter().map(Segment::is_selected).collect();
        assert_eq!(selected, vec![false, true, true, false]);
        assert!(paragraph.segments.iter().all(|s| !s.is_marker()));
    }

    #[test]
    fn selection_outside_root_is_ignored() {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        set_inner_html(&mut dom, root, "<div>a</div>").unwrap();
        let elsewhere = dom.create_text("zzz");
        let selection = DomSelection::caret(DomPoint::new(elsewhere, 1));
        let built = create_model(&dom, root, Some(&selection), &BuildOptions::default());
        let paragraph = built.model.blocks[0].as_paragraph().unwrap();
        assert!(!paragraph.has_selection());
    }

    #[test]
    fn records_associations_for_elements_and_unsplit_text() {
        let (dom, root, built) = build("<div>a<b>b</b></div>");
        let div = dom.first_child(root).unwrap();
        let paragraph = built.model.blocks[0].as_paragraph().unwrap();
        assert_eq!(built.associations.node_of(paragraph.id), Some(div));
        let b = dom.last_child(div).unwrap();
        assert_eq!(built.associations.node_of(paragraph.segments[1].id()), Some(b));
    }
}

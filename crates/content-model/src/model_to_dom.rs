//! Writes a Content Model into a DOM container, reusing the nodes the model was built from
//! wherever their fingerprint says nothing changed.

use std::collections::{HashMap, HashSet};

use similar::{Algorithm, DiffOp};

use crate::association::{Association, NodeAssociations};
use crate::config::Capabilities;
use crate::css;
use crate::dom::{Dom, DomError, DomPoint, NodeId};
use crate::fingerprint;
use crate::format::{
    render_block_format, render_container_segment_format, render_segment_format, SegmentFormat,
};
use crate::metadata::{attribute_from_dataset_key, Dataset, EntityInfo};
use crate::model::{
    Block, BlockGroup, Code, ContentModelDocument, Entity, FormatContainer, GeneralBlock, Image,
    Link, ListItem, ListLevel, ListType, ModelId, Paragraph, Segment, Table, TableCell, TableRow,
};

/// Where a paragraph's content ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphPlacement {
    /// Top-level nodes rendering the paragraph: its element, or the segment roots of an
    /// implicit paragraph.
    pub roots: Vec<NodeId>,
    /// Fallback point for a caret in a paragraph with no leaves.
    pub anchor: DomPoint,
}

#[derive(Debug, Default)]
pub struct RenderMap {
    pub paragraphs: HashMap<u64, ParagraphPlacement>,
    pub tables: HashMap<u64, NodeId>,
}

/// Replaces the children of `root` with the rendering of `model`.
///
/// `associations` is consumed as the reuse table and replaced by the associations of the
/// written DOM.
pub fn write_model(
    dom: &mut Dom,
    root: NodeId,
    model: &ContentModelDocument,
    associations: &mut NodeAssociations,
    capabilities: Capabilities,
) -> Result<RenderMap, DomError> {
    let previous = std::mem::take(associations);
    let mut writer = Writer {
        dom,
        previous: if capabilities.reuse_cached_elements {
            previous
        } else {
            NodeAssociations::new()
        },
        next: NodeAssociations::new(),
        used: HashSet::new(),
        capabilities,
        rendered: RenderMap::default(),
        created: 0,
    };
    writer.used.insert(root);
    writer.write_blocks(root, &model.blocks)?;

    let Writer {
        mut next,
        rendered,
        created,
        ..
    } = writer;
    next.refresh(&model.blocks);
    tracing::debug!(created, associations = next.len(), "wrote content model");
    *associations = next;
    Ok(rendered)
}

struct OpenList {
    level: u64,
    list_type: ListType,
    dataset: Dataset,
    node: NodeId,
    children: Vec<NodeId>,
}

struct Writer<'a> {
    dom: &'a mut Dom,
    previous: NodeAssociations,
    next: NodeAssociations,
    used: HashSet<NodeId>,
    capabilities: Capabilities,
    rendered: RenderMap,
    created: usize,
}

fn push_style(attributes: &mut Vec<(String, String)>, declarations: &[(String, String)]) {
    if !declarations.is_empty() {
        attributes.push(("style".to_string(), css::render_style(declarations)));
    }
}

fn push_dataset(attributes: &mut Vec<(String, String)>, dataset: &Dataset) {
    for (key, value) in dataset {
        attributes.push((attribute_from_dataset_key(key), value.clone()));
    }
}

fn paragraph_attributes(paragraph: &Paragraph) -> Vec<(String, String)> {
    let mut declarations = Vec::new();
    render_block_format(&paragraph.format, &mut declarations);
    render_container_segment_format(&paragraph.segment_format, &mut declarations);
    let mut attributes = Vec::new();
    push_style(&mut attributes, &declarations);
    attributes
}

fn container_attributes(format: &crate::format::BlockFormat, segment_format: &SegmentFormat) -> Vec<(String, String)> {
    let mut declarations = Vec::new();
    render_block_format(format, &mut declarations);
    render_container_segment_format(segment_format, &mut declarations);
    let mut attributes = Vec::new();
    push_style(&mut attributes, &declarations);
    attributes
}

fn list_level_attributes(level: &ListLevel) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    if let Some(start) = level.format.start_number_override {
        attributes.push(("start".to_string(), start.to_string()));
    }
    let mut declarations = Vec::new();
    css::push(&mut declarations, "list-style-type", level.format.list_style_type.as_ref());
    render_block_format(&level.format.block, &mut declarations);
    push_style(&mut attributes, &declarations);
    push_dataset(&mut attributes, &level.dataset);
    attributes
}

fn table_attributes(table: &Table) -> Vec<(String, String)> {
    let mut declarations = Vec::new();
    css::push(&mut declarations, "border-collapse", table.format.border_collapse.as_ref());
    css::push(&mut declarations, "table-layout", table.format.table_layout.as_ref());
    render_block_format(&table.format.block, &mut declarations);
    let mut attributes = Vec::new();
    push_style(&mut attributes, &declarations);
    push_dataset(&mut attributes, &table.dataset);
    attributes
}

fn row_attributes(row: &TableRow) -> Vec<(String, String)> {
    let mut declarations = Vec::new();
    if row.height > 0.0 {
        declarations.push(("height".to_string(), css::format_px(row.height)));
    }
    render_block_format(&row.format, &mut declarations);
    let mut attributes = Vec::new();
    push_style(&mut attributes, &declarations);
    attributes
}

fn cell_attributes(cell: &TableCell) -> Vec<(String, String)> {
    let mut attributes = container_attributes(&cell.format, &cell.segment_format);
    push_dataset(&mut attributes, &cell.dataset);
    attributes
}

fn link_attributes(link: &Link) -> Vec<(String, String)> {
    let mut attributes = vec![("href".to_string(), link.format.href.clone())];
    for (name, value) in [
        ("target", &link.format.target),
        ("title", &link.format.title),
        ("rel", &link.format.rel),
    ] {
        if let Some(value) = value {
            attributes.push((name.to_string(), value.clone()));
        }
    }
    push_dataset(&mut attributes, &link.dataset);
    attributes
}

fn image_attributes(image: &Image) -> Vec<(String, String)> {
    let mut attributes = vec![("src".to_string(), image.src.clone())];
    let optional = [
        ("alt", &image.alt),
        ("title", &image.title),
        ("width", &image.size.width),
        ("height", &image.size.height),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            attributes.push((name.to_string(), value.clone()));
        }
    }
    push_dataset(&mut attributes, &image.dataset);
    attributes
}

impl<'a> Writer<'a> {
    /// The previously associated node of `id`, if it still exists and nothing claimed it yet.
    fn reusable(&self, id: ModelId) -> Option<Association> {
        let entry = *self.previous.get(id)?;
        if self.used.contains(&entry.node) || !self.dom.contains_node(entry.node) {
            return None;
        }
        Some(entry)
    }

    fn claim(&mut self, id: ModelId, node: NodeId) {
        self.used.insert(node);
        self.next.record(id, node);
    }

    fn create(&mut self, tag: &str, attributes: Vec<(String, String)>) -> NodeId {
        self.created += 1;
        let node = self.dom.create_element_with_attributes(tag, attributes);
        self.used.insert(node);
        node
    }

    /// Element for a model node: the associated one when it has the right tag (rewriting its
    /// attributes if the shell changed), otherwise a new one.
    fn element_for(
        &mut self,
        id: ModelId,
        tag: &str,
        shell: u64,
        attributes: impl FnOnce() -> Vec<(String, String)>,
    ) -> Result<NodeId, DomError> {
        match self.reusable(id) {
            Some(entry) if self.dom.tag(entry.node) == Some(tag) => {
                if entry.shell != shell {
                    self.dom.set_attributes(entry.node, attributes())?;
                }
                self.claim(id, entry.node);
                Ok(entry.node)
            }
            _ => {
                let node = self.create(tag, attributes());
                self.claim(id, node);
                Ok(node)
            }
        }
    }

    fn write_blocks(&mut self, parent: NodeId, blocks: &[Block]) -> Result<(), DomError> {
        let mut desired = Vec::new();
        let mut lists: Vec<OpenList> = Vec::new();
        for block in blocks {
            match block {
                Block::BlockGroup(BlockGroup::ListItem(item)) => {
                    self.write_list_item(item, &mut lists, &mut desired)?;
                }
                other => {
                    self.close_lists(&mut lists, 0)?;
                    self.write_block(parent, other, &mut desired)?;
                }
            }
        }
        self.close_lists(&mut lists, 0)?;
        self.reconcile(parent, &desired)
    }

    fn write_block(&mut self, parent: NodeId, block: &Block, desired: &mut Vec<NodeId>) -> Result<(), DomError> {
        match block {
            Block::Paragraph(paragraph) => self.write_paragraph(parent, paragraph, desired),
            Block::Table(table) => {
                let node = self.write_table(table)?;
                desired.push(node);
                Ok(())
            }
            Block::Entity(entity) => {
                if let Some(node) = self.write_entity(entity)? {
                    desired.push(node);
                }
                Ok(())
            }
            Block::BlockGroup(BlockGroup::FormatContainer(container)) => {
                let node = self.write_container(container)?;
                desired.push(node);
                Ok(())
            }
            Block::BlockGroup(BlockGroup::General(general)) => {
                let node = self.write_general(general)?;
                desired.push(node);
                Ok(())
            }
            Block::BlockGroup(BlockGroup::ListItem(item)) => {
                let mut lists = Vec::new();
                self.write_list_item(item, &mut lists, desired)?;
                self.close_lists(&mut lists, 0)
            }
        }
    }

    fn write_paragraph(&mut self, parent: NodeId, paragraph: &Paragraph, desired: &mut Vec<NodeId>) -> Result<(), DomError> {
        let bare = paragraph.is_implicit
            && paragraph.decorator.is_none()
            && paragraph.format.is_empty()
            && paragraph.segment_format.is_empty();
        if bare {
            let anchor = DomPoint::new(parent, desired.len());
            let roots = self.write_segments(paragraph)?;
            desired.extend(roots.iter().copied());
            self.rendered
                .paragraphs
                .insert(paragraph.id.get(), ParagraphPlacement { roots, anchor });
            return Ok(());
        }

        let shell = fingerprint::paragraph_shell(paragraph);
        let tag = paragraph
            .decorator
            .as_ref()
            .map_or("div", |d| d.tag_name.as_str());
        let node = match self.reusable(paragraph.id) {
            Some(entry)
                if entry.shell == shell
                    && entry.content == fingerprint::paragraph_content(paragraph)
                    && self.dom.tag(entry.node) == Some(tag) =>
            {
                self.claim(paragraph.id, entry.node);
                self.next.carry_paragraph(&self.previous, paragraph);
                for segment in &paragraph.segments {
                    if let Some(node) = self.previous.node_of(segment.id()) {
                        self.used.insert(node);
                    }
                }
                entry.node
            }
            _ => {
                let node = self.element_for(paragraph.id, tag, shell, || paragraph_attributes(paragraph))?;
                let children = self.write_segments(paragraph)?;
                self.reconcile(node, &children)?;
                node
            }
        };
        desired.push(node);
        self.rendered.paragraphs.insert(
            paragraph.id.get(),
            ParagraphPlacement {
                roots: vec![node],
                anchor: DomPoint::new(node, 0),
            },
        );
        Ok(())
    }

    /// Segment roots of a paragraph in order. Runs of equally formatted text become one node.
    fn write_segments(&mut self, paragraph: &Paragraph) -> Result<Vec<NodeId>, DomError> {
        let groups = fingerprint::text_groups(&paragraph.segments);
        let mut group_at: HashMap<usize, &[usize]> = HashMap::new();
        let mut covered: HashSet<usize> = HashSet::new();
        for group in &groups {
            if let Some((first, rest)) = group.split_first() {
                group_at.insert(*first, group);
                covered.extend(rest.iter().copied());
            }
        }

        let mut roots = Vec::new();
        for (ix, segment) in paragraph.segments.iter().enumerate() {
            if covered.contains(&ix) {
                continue;
            }
            let node = match segment {
                Segment::SelectionMarker(_) => None,
                Segment::Text(_) => match group_at.get(&ix) {
                    Some(group) => self.write_text_group(&paragraph.segments, group)?,
                    None => None,
                },
                Segment::Br(br) => {
                    let (format, link) = (&br.format, br.link.as_ref());
                    Some(self.write_atomic(segment, |w| {
                        let leaf = w.create("br", Vec::new());
                        w.wrap_inline(leaf, format, link, None)
                    })?)
                }
                Segment::Image(image) => Some(self.write_atomic(segment, |w| {
                    let leaf = w.create("img", image_attributes(image));
                    w.wrap_inline(leaf, &image.format, image.link.as_ref(), None)
                })?),
                Segment::Entity(entity) => self.write_entity(entity)?,
            };
            roots.extend(node);
        }
        Ok(roots)
    }

    fn write_atomic(
        &mut self,
        segment: &Segment,
        build: impl FnOnce(&mut Self) -> Result<NodeId, DomError>,
    ) -> Result<NodeId, DomError> {
        let content = fingerprint::segment_content(segment);
        let node = match self.reusable(segment.id()) {
            Some(entry) if entry.content == content => entry.node,
            _ => build(self)?,
        };
        self.claim(segment.id(), node);
        Ok(node)
    }

    fn write_text_group(&mut self, segments: &[Segment], group: &[usize]) -> Result<Option<NodeId>, DomError> {
        let texts: Vec<_> = group
            .iter()
            .filter_map(|ix| match segments.get(*ix) {
                Some(Segment::Text(text)) => Some(text),
                _ => None,
            })
            .collect();
        let Some(first) = texts.first() else {
            return Ok(None);
        };
        let value: String = texts.iter().map(|t| t.text.as_str()).collect();
        let content = fingerprint::text_group_content(segments, group);

        let plain = first.format.is_empty() && first.link.is_none() && first.code.is_none();
        let node = match self.reusable(first.id) {
            Some(entry) if entry.content == content => entry.node,
            Some(entry) if plain && self.dom.is_text(entry.node) => {
                self.dom.set_text(entry.node, &value)?;
                entry.node
            }
            _ => {
                self.created += 1;
                let leaf = self.dom.create_text(value);
                self.used.insert(leaf);
                self.wrap_inline(leaf, &first.format, first.link.as_ref(), first.code.as_ref())?
            }
        };
        self.claim(first.id, node);
        Ok(Some(node))
    }

    /// Wraps a leaf in `a > code > span > b > i > u > s > sup/sub`, innermost first.
    fn wrap_inline(
        &mut self,
        leaf: NodeId,
        format: &SegmentFormat,
        link: Option<&Link>,
        code: Option<&Code>,
    ) -> Result<NodeId, DomError> {
        let (tags, declarations) = render_segment_format(format, self.capabilities.semantic_inline_tags);
        let mut node = leaf;
        for tag in tags.iter().rev() {
            node = self.wrap(node, tag, Vec::new())?;
        }
        if !declarations.is_empty() {
            let mut attributes = Vec::new();
            push_style(&mut attributes, &declarations);
            node = self.wrap(node, "span", attributes)?;
        }
        if let Some(code) = code {
            let mut attributes = Vec::new();
            if let Some(font) = &code.format.font_family {
                attributes.push(("style".to_string(), format!("font-family: {font}")));
            }
            node = self.wrap(node, "code", attributes)?;
        }
        if let Some(link) = link {
            node = self.wrap(node, "a", link_attributes(link))?;
        }
        Ok(node)
    }

    fn wrap(&mut self, inner: NodeId, tag: &str, attributes: Vec<(String, String)>) -> Result<NodeId, DomError> {
        let outer = self.create(tag, attributes);
        self.dom.append_child(outer, inner)?;
        Ok(outer)
    }

    /// Entity wrappers are placed as-is; only their marker classes and editability are kept in
    /// sync with the model.
    fn write_entity(&mut self, entity: &Entity) -> Result<Option<NodeId>, DomError> {
        let wrapper = entity.wrapper;
        if !self.dom.contains_node(wrapper) || self.used.contains(&wrapper) {
            tracing::warn!(
                entity_id = entity.entity_id.as_str(),
                "entity wrapper is missing or already placed; skipping"
            );
            return Ok(None);
        }
        self.used.insert(wrapper);

        let info = EntityInfo {
            entity_type: entity.entity_type.clone(),
            id: entity.entity_id.clone(),
            is_readonly: entity.is_readonly,
        };
        let current = self
            .dom
            .element(wrapper)
            .and_then(|el| EntityInfo::parse(el.classes()));
        if current.as_ref() != Some(&info) {
            self.dom.set_attribute(wrapper, "class", &info.class_list())?;
        }
        if entity.is_readonly {
            self.dom.set_attribute(wrapper, "contenteditable", "false")?;
        } else if self.dom.attribute(wrapper, "contenteditable") == Some("false") {
            self.dom.remove_attribute(wrapper, "contenteditable")?;
        }
        Ok(Some(wrapper))
    }

    fn write_container(&mut self, container: &FormatContainer) -> Result<NodeId, DomError> {
        let shell = fingerprint::container_shell(container);
        let node = self.element_for(container.id, &container.tag_name, shell, || {
            container_attributes(&container.format, &container.segment_format)
        })?;
        self.write_blocks(node, &container.blocks)?;
        Ok(node)
    }

    fn write_general(&mut self, general: &GeneralBlock) -> Result<NodeId, DomError> {
        let shell = fingerprint::general_shell(&general.element);
        let node = self.element_for(general.id, &general.element.tag, shell, || {
            general.element.attributes.clone()
        })?;
        self.write_blocks(node, &general.blocks)?;
        Ok(node)
    }

    fn level_matches(&self, open: &OpenList, level: &ListLevel) -> bool {
        if open.level == level.id.get() {
            return true;
        }
        // A level the DOM never saw joins the list it follows when nothing sets it apart.
        self.previous.get(level.id).is_none()
            && level.format.start_number_override.is_none()
            && open.list_type == level.list_type
            && open.dataset == level.dataset
    }

    fn close_lists(&mut self, lists: &mut Vec<OpenList>, depth: usize) -> Result<(), DomError> {
        while lists.len() > depth {
            if let Some(open) = lists.pop() {
                self.reconcile(open.node, &open.children)?;
            }
        }
        Ok(())
    }

    fn write_list_item(
        &mut self,
        item: &ListItem,
        lists: &mut Vec<OpenList>,
        desired: &mut Vec<NodeId>,
    ) -> Result<(), DomError> {
        let mut depth = 0;
        while depth < lists.len()
            && depth < item.levels.len()
            && self.level_matches(&lists[depth], &item.levels[depth])
        {
            depth += 1;
        }
        self.close_lists(lists, depth)?;

        for level in &item.levels[depth..] {
            let shell = fingerprint::list_level_shell(level);
            let node = self.element_for(level.id, level.list_type.tag(), shell, || {
                list_level_attributes(level)
            })?;
            match lists.last_mut() {
                Some(parent) => parent.children.push(node),
                None => desired.push(node),
            }
            lists.push(OpenList {
                level: level.id.get(),
                list_type: level.list_type,
                dataset: level.dataset.clone(),
                node,
                children: Vec::new(),
            });
        }

        let shell = fingerprint::list_item_shell(item);
        let li = self.element_for(item.id, "li", shell, || {
            container_attributes(&item.format, &item.segment_format)
        })?;
        match lists.last_mut() {
            Some(list) => list.children.push(li),
            None => desired.push(li),
        }
        self.write_blocks(li, &item.blocks)
    }

    fn write_table(&mut self, table: &Table) -> Result<NodeId, DomError> {
        let shell = fingerprint::table_shell(table);
        let node = self.element_for(table.id, "table", shell, || table_attributes(table))?;
        self.rendered.tables.insert(table.id.get(), node);

        let mut children = Vec::new();
        if table.widths.iter().any(|w| *w > 0.0) {
            children.push(self.write_colgroup(node, &table.widths)?);
        }

        let mut rows = Vec::new();
        for (r, row) in table.rows.iter().enumerate() {
            let tr = self.element_for(row.id, "tr", fingerprint::row_shell(row), || row_attributes(row))?;
            let mut cells = Vec::new();
            for (c, cell) in row.cells.iter().enumerate() {
                if cell.is_placeholder() {
                    continue;
                }
                let tag = if cell.is_header { "th" } else { "td" };
                let td = self.element_for(cell.id, tag, fingerprint::cell_shell(cell), || cell_attributes(cell))?;
                let (rowspan, colspan) = table.spans_of(r, c).unwrap_or((1, 1));
                self.set_span(td, "rowspan", rowspan)?;
                self.set_span(td, "colspan", colspan)?;
                self.write_blocks(td, &cell.blocks)?;
                cells.push(td);
            }
            self.reconcile(tr, &cells)?;
            rows.push(tr);
        }

        let tbody = self.section(node, "tbody");
        self.reconcile(tbody, &rows)?;
        children.push(tbody);
        self.reconcile(node, &children)?;
        Ok(node)
    }

    fn set_span(&mut self, cell: NodeId, name: &str, span: usize) -> Result<(), DomError> {
        if span > 1 {
            self.dom.set_attribute(cell, name, &span.to_string())
        } else {
            self.dom.remove_attribute(cell, name)
        }
    }

    /// First unclaimed child of `parent` with `tag`, or a new element.
    fn section(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let existing = self
            .dom
            .children(parent)
            .iter()
            .copied()
            .find(|child| self.dom.tag(*child) == Some(tag) && !self.used.contains(child));
        match existing {
            Some(node) => {
                self.used.insert(node);
                node
            }
            None => self.create(tag, Vec::new()),
        }
    }

    fn write_colgroup(&mut self, table: NodeId, widths: &[f64]) -> Result<NodeId, DomError> {
        let colgroup = self.section(table, "colgroup");
        let mut existing: Vec<NodeId> = self
            .dom
            .children(colgroup)
            .iter()
            .copied()
            .filter(|child| self.dom.tag(*child) == Some("col"))
            .collect();
        existing.reverse();

        let mut cols = Vec::new();
        for width in widths {
            let style = format!("width: {}", css::format_px(*width));
            let col = match existing.pop() {
                Some(col) => {
                    self.dom.set_attributes(col, vec![("style".to_string(), style)])?;
                    self.used.insert(col);
                    col
                }
                None => self.create("col", vec![("style".to_string(), style)]),
            };
            cols.push(col);
        }
        self.reconcile(colgroup, &cols)?;
        Ok(colgroup)
    }

    /// Makes the children of `parent` exactly `desired`, moving as few nodes as the diff allows.
    fn reconcile(&mut self, parent: NodeId, desired: &[NodeId]) -> Result<(), DomError> {
        let current = self.dom.children(parent).to_vec();
        if current == desired {
            return Ok(());
        }

        let ops = similar::capture_diff_slices(Algorithm::Myers, &current, desired);
        for op in &ops {
            match *op {
                DiffOp::Delete { old_index, old_len, .. } | DiffOp::Replace { old_index, old_len, .. } => {
                    for node in &current[old_index..old_index + old_len] {
                        self.dom.detach(*node)?;
                    }
                }
                _ => {}
            }
        }
        for op in ops.iter().rev() {
            match *op {
                DiffOp::Insert { new_index, new_len, .. } | DiffOp::Replace { new_index, new_len, .. } => {
                    for ix in (new_index..new_index + new_len).rev() {
                        let reference = desired.get(ix + 1).copied();
                        self.dom.insert_before(parent, desired[ix], reference)?;
                    }
                }
                _ => {}
            }
        }

        if self.dom.children(parent) != desired {
            tracing::debug!(?parent, "diff placement diverged; appending children in order");
            self.dom.clear_children(parent)?;
            for node in desired {
                self.dom.append_child(parent, *node)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom_to_model::{create_model, BuildOptions};
    use crate::html::{inner_html, set_inner_html};
    use crate::model::{Br, Text};

    fn write(model: &ContentModelDocument) -> (Dom, NodeId) {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        let mut associations = NodeAssociations::new();
        write_model(&mut dom, root, model, &mut associations, Capabilities::default()).unwrap();
        (dom, root)
    }

    #[test]
    fn writes_formatted_text_with_semantic_tags() {
        let mut model = ContentModelDocument::new();
        let bold = SegmentFormat {
            font_weight: Some("bold".to_string()),
            ..Default::default()
        };
        model.blocks.push(
            Paragraph::new()
                .with_segment(Text::new("a"))
                .with_segment(Text::new("b").with_format(bold))
                .into(),
        );
        let (dom, root) = write(&model);
        assert_eq!(inner_html(&dom, root), "<div>a<b>b</b></div>");
    }

    #[test]
    fn adjacent_runs_share_one_text_node() {
        let mut model = ContentModelDocument::new();
        model.blocks.push(
            Paragraph::new()
                .with_segment(Text::new("ab"))
                .with_segment(crate::model::SelectionMarker::new())
                .with_segment(Text::new("cd"))
                .with_segment(Br::new())
                .into(),
        );
        let (dom, root) = write(&model);
        let div = dom.first_child(root).unwrap();
        assert_eq!(dom.child_count(div), 2);
        assert_eq!(inner_html(&dom, root), "<div>abcd<br></div>");
    }

    #[test]
    fn consecutive_items_share_their_list_element() {
        let mut model = ContentModelDocument::new();
        let level = ListLevel::new(ListType::Ordered);
        for text in ["a", "b"] {
            let mut item = ListItem::new(vec![level.clone()]);
            item.blocks.push(Paragraph::implicit().with_segment(Text::new(text)).into());
            model.blocks.push(item.into());
        }
        let (dom, root) = write(&model);
        assert_eq!(inner_html(&dom, root), "<ol><li>a</li><li>b</li></ol>");
    }

    #[test]
    fn rewriting_unchanged_model_keeps_every_node() {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        set_inner_html(
            &mut dom,
            root,
            "<div>a<b>b</b></div><ul><li>x</li></ul><table><tbody><tr><td>c</td></tr></tbody></table>",
        )
        .unwrap();
        let before = dom.descendants(root);
        let built = create_model(&dom, root, None, &BuildOptions::default());
        let mut associations = built.associations;
        write_model(&mut dom, root, &built.model, &mut associations, Capabilities::default()).unwrap();
        assert_eq!(dom.descendants(root), before);
    }

    #[test]
    fn merged_cells_get_span_attributes() {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        set_inner_html(
            &mut dom,
            root,
            "<table><tr><td colspan=\"2\">a</td></tr><tr><td>b</td><td>c</td></tr></table>",
        )
        .unwrap();
        let built = create_model(&dom, root, None, &BuildOptions::default());
        let (out, out_root) = write(&built.model);
        assert_eq!(
            inner_html(&out, out_root),
            "<table><tbody><tr><td colspan=\"2\">a</td></tr><tr><td>b</td><td>c</td></tr></tbody></table>"
        );
    }
}

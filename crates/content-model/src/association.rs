use std::collections::HashMap;

use crate::dom::NodeId;
use crate::fingerprint;
use crate::model::{Block, BlockGroup, ModelId, Paragraph, Segment};

/// What a model node looked like when it was last tied to `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Association {
    pub node: NodeId,
    pub content: u64,
    pub shell: u64,
}

/// Model identity → DOM node table. The builder fills it; the writer consults it, refreshes it
/// and drops entries it did not touch.
#[derive(Debug, Clone, Default)]
pub struct NodeAssociations {
    entries: HashMap<u64, Association>,
}

impl NodeAssociations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ModelId) -> Option<&Association> {
        self.entries.get(&id.get())
    }

    pub fn node_of(&self, id: ModelId) -> Option<NodeId> {
        self.get(id).map(|a| a.node)
    }

    pub fn insert(&mut self, id: ModelId, association: Association) {
        self.entries.insert(id.get(), association);
    }

    /// Records `node` with fingerprints to be filled by [`NodeAssociations::refresh`].
    pub fn record(&mut self, id: ModelId, node: NodeId) {
        self.insert(
            id,
            Association {
                node,
                content: 0,
                shell: 0,
            },
        );
    }

    pub fn remove(&mut self, id: ModelId) -> Option<Association> {
        self.entries.remove(&id.get())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Recomputes fingerprints of every recorded node from the current model.
    pub fn refresh(&mut self, blocks: &[Block]) {
        for block in blocks {
            self.refresh_block(block);
        }
    }

    fn set(&mut self, id: ModelId, content: u64, shell: u64) {
        if let Some(entry) = self.entries.get_mut(&id.get()) {
            entry.content = content;
            entry.shell = shell;
        }
    }

    fn refresh_block(&mut self, block: &Block) {
        match block {
            Block::Paragraph(paragraph) => self.refresh_paragraph(paragraph),
            Block::Entity(_) => {}
            Block::Table(table) => {
                self.set(table.id, 0, fingerprint::table_shell(table));
                for row in &table.rows {
                    self.set(row.id, 0, fingerprint::row_shell(row));
                    for cell in &row.cells {
                        self.set(cell.id, 0, fingerprint::cell_shell(cell));
                        self.refresh(&cell.blocks);
                    }
                }
            }
            Block::BlockGroup(BlockGroup::ListItem(item)) => {
                self.set(item.id, 0, fingerprint::list_item_shell(item));
                for level in &item.levels {
                    self.set(level.id, 0, fingerprint::list_level_shell(level));
                }
                self.refresh(&item.blocks);
            }
            Block::BlockGroup(BlockGroup::FormatContainer(container)) => {
                self.set(container.id, 0, fingerprint::container_shell(container));
                self.refresh(&container.blocks);
            }
            Block::BlockGroup(BlockGroup::General(general)) => {
                self.set(general.id, 0, fingerprint::general_shell(&general.element));
                self.refresh(&general.blocks);
            }
        }
    }

    pub(crate) fn refresh_paragraph(&mut self, paragraph: &Paragraph) {
        self.set(
            paragraph.id,
            fingerprint::paragraph_content(paragraph),
            fingerprint::paragraph_shell(paragraph),
        );
        for group in fingerprint::text_groups(&paragraph.segments) {
            if let Some(first) = group.first().and_then(|ix| paragraph.segments.get(*ix)) {
                let content = fingerprint::text_group_content(&paragraph.segments, &group);
                self.set(first.id(), content, 0);
            }
        }
        for segment in &paragraph.segments {
            if !matches!(segment, Segment::Text(_) | Segment::SelectionMarker(_)) {
                self.set(segment.id(), fingerprint::segment_content(segment), 0);
            }
        }
    }

    /// Copies the entries of a paragraph's segments from `previous`, used when the paragraph's
    /// element is kept verbatim.
    pub(crate) fn carry_paragraph(&mut self, previous: &NodeAssociations, paragraph: &Paragraph) {
        for segment in &paragraph.segments {
            if let Some(entry) = previous.get(segment.id()) {
                self.insert(segment.id(), *entry);
            }
        }
    }
}

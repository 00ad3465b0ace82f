use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Handle to a node owned by a [`Dom`]. Two handles are the same node iff they are equal. A
/// handle to a freed node never resolves again, even after its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
}

impl ElementData {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class")
            .unwrap_or("")
            .split_ascii_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(ElementData),
    Text(String),
    Comment(String),
    /// Stand-in for a detached entity wrapper inside serialized or transient content.
    EntityPlaceholder { entity_id: String },
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    live: bool,
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Slot {
    fn release(&mut self) {
        self.live = false;
        self.generation = self.generation.wrapping_add(1);
        self.data = NodeData::Text(String::new());
        self.parent = None;
        self.children = Vec::new();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("node {0:?} cannot hold children")]
    NotAContainer(NodeId),
    #[error("inserting {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("{reference:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, reference: NodeId },
    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),
    #[error("node {0:?} is not a text node")]
    NotText(NodeId),
}

/// A boundary point: a child index inside a container, or a char offset inside a text node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl DomPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomRange {
    pub start: DomPoint,
    pub end: DomPoint,
}

impl DomRange {
    pub fn new(start: DomPoint, end: DomPoint) -> Self {
        Self { start, end }
    }

    pub fn collapsed(point: DomPoint) -> Self {
        Self {
            start: point,
            end: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Arena-backed document tree. Detached nodes stay alive, so they can be re-inserted later
/// without losing their identity, until [`Dom::collect_garbage`] frees them.
#[derive(Debug, Clone, Default)]
pub struct Dom {
    slots: Vec<Slot>,
    free: Vec<u32>,
    version: u64,
}

impl Dom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumped by every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = match self.free.pop() {
            Some(index) if (index as usize) < self.slots.len() => {
                let slot = &mut self.slots[index as usize];
                slot.live = true;
                slot.data = data;
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            _ => {
                let id = NodeId {
                    index: self.slots.len() as u32,
                    generation: 0,
                };
                self.slots.push(Slot {
                    generation: 0,
                    live: true,
                    data,
                    parent: None,
                    children: Vec::new(),
                });
                id
            }
        };
        self.touch();
        id
    }

    /// Number of live nodes, attached or not.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Number of slots the arena has ever handed out.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Frees every node that is not one of `roots` or a descendant of one. Freed handles stop
    /// resolving. A root whose parent is freed becomes detached. Returns the number of nodes
    /// freed. The tree under the roots is unchanged, so the version is not bumped.
    pub fn collect_garbage(&mut self, roots: &[NodeId]) -> usize {
        let mut reachable = vec![false; self.slots.len()];
        let mut stack: Vec<NodeId> = roots.iter().copied().filter(|r| self.contains_node(*r)).collect();
        while let Some(id) = stack.pop() {
            let Some(seen) = reachable.get_mut(id.index()) else {
                continue;
            };
            if std::mem::replace(seen, true) {
                continue;
            }
            stack.extend(self.children(id).iter().copied());
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.live && !reachable.get(index).copied().unwrap_or(false) {
                slot.release();
                self.free.push(index as u32);
                freed += 1;
            }
        }
        for root in roots {
            let orphaned = self.parent(*root).is_some_and(|parent| !self.contains_node(parent));
            if orphaned {
                if let Some(slot) = self.live_mut(*root) {
                    slot.parent = None;
                }
            }
        }
        freed
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
        }))
    }

    pub fn create_element_with_attributes(
        &mut self,
        tag: &str,
        attributes: Vec<(String, String)>,
    ) -> NodeId {
        self.alloc(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attributes,
        }))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::Comment(text.into()))
    }

    pub fn create_entity_placeholder(&mut self, entity_id: impl Into<String>) -> NodeId {
        self.alloc(NodeData::EntityPlaceholder {
            entity_id: entity_id.into(),
        })
    }

    fn live(&self, id: NodeId) -> Option<&Slot> {
        self.slots
            .get(id.index())
            .filter(|s| s.live && s.generation == id.generation)
    }

    fn live_mut(&mut self, id: NodeId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index())
            .filter(|s| s.live && s.generation == id.generation)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.live(id).is_some()
    }

    fn slot(&self, id: NodeId) -> Result<&Slot, DomError> {
        self.live(id).ok_or(DomError::UnknownNode(id))
    }

    fn slot_mut(&mut self, id: NodeId) -> Result<&mut Slot, DomError> {
        self.live_mut(id).ok_or(DomError::UnknownNode(id))
    }

    pub fn data(&self, id: NodeId) -> Option<&NodeData> {
        self.live(id).map(|s| &s.data)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.data(id)? {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.data(id), Some(NodeData::Text(_)))
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.data(id)? {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.live(id).and_then(|s| s.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.live(id)
            .map(|s| s.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let ix = self.index_in_parent(id)?;
        self.children(parent).get(ix + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let ix = self.index_in_parent(id)?;
        ix.checked_sub(1)
            .and_then(|prev| self.children(parent).get(prev).copied())
    }

    /// Text length in chars for text nodes, child count otherwise.
    pub fn node_length(&self, id: NodeId) -> usize {
        match self.data(id) {
            Some(NodeData::Text(t)) => t.chars().count(),
            Some(_) => self.child_count(id),
            None => 0,
        }
    }

    /// Inclusive containment, like `Node.contains`.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.data(id) {
            Some(NodeData::Text(t)) => out.push_str(t),
            Some(NodeData::Element(_)) => {
                for child in self.children(id) {
                    self.collect_text(*child, out);
                }
            }
            _ => {}
        }
    }

    /// Pre-order descendants, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attribute(name)
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let slot = self.slot_mut(id)?;
        let NodeData::Element(el) = &mut slot.data else {
            return Err(DomError::NotAnElement(id));
        };
        match el.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, existing)) if existing == value => return Ok(()),
            Some((_, existing)) => *existing = value.to_string(),
            None => el.attributes.push((name.to_string(), value.to_string())),
        }
        self.touch();
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        let slot = self.slot_mut(id)?;
        let NodeData::Element(el) = &mut slot.data else {
            return Err(DomError::NotAnElement(id));
        };
        let before = el.attributes.len();
        el.attributes.retain(|(k, _)| k != name);
        if el.attributes.len() != before {
            self.touch();
        }
        Ok(())
    }

    /// Replaces the whole attribute list, touching the node only when something differs.
    pub fn set_attributes(
        &mut self,
        id: NodeId,
        attributes: Vec<(String, String)>,
    ) -> Result<(), DomError> {
        let slot = self.slot_mut(id)?;
        let NodeData::Element(el) = &mut slot.data else {
            return Err(DomError::NotAnElement(id));
        };
        if el.attributes == attributes {
            return Ok(());
        }
        el.attributes = attributes;
        self.touch();
        Ok(())
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
        let slot = self.slot_mut(id)?;
        let NodeData::Text(existing) = &mut slot.data else {
            return Err(DomError::NotText(id));
        };
        if existing != text {
            *existing = text.to_string();
            self.touch();
        }
        Ok(())
    }

    fn can_hold_children(&self, id: NodeId) -> bool {
        matches!(self.data(id), Some(NodeData::Element(_)))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Inserts (or moves) `child` before `reference`; `None` appends.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.slot(parent)?;
        self.slot(child)?;
        if !self.can_hold_children(parent) {
            return Err(DomError::NotAContainer(parent));
        }
        if self.contains(child, parent) {
            return Err(DomError::Cycle { parent, child });
        }
        if let Some(reference) = reference {
            if reference == child {
                return Ok(());
            }
            if self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild { parent, reference });
            }
        }

        self.detach(child)?;
        let index = match reference {
            Some(reference) => self
                .children(parent)
                .iter()
                .position(|c| *c == reference)
                .ok_or(DomError::NotAChild { parent, reference })?,
            None => self.child_count(parent),
        };
        self.slot_mut(parent)?.children.insert(index, child);
        self.slot_mut(child)?.parent = Some(parent);
        self.touch();
        Ok(())
    }

    /// Removes `id` from its parent. The node stays alive in the arena.
    pub fn detach(&mut self, id: NodeId) -> Result<(), DomError> {
        let Some(parent) = self.slot(id)?.parent else {
            return Ok(());
        };
        self.slot_mut(parent)?.children.retain(|c| *c != id);
        self.slot_mut(id)?.parent = None;
        self.touch();
        Ok(())
    }

    pub fn replace_child(&mut self, new_child: NodeId, old_child: NodeId) -> Result<(), DomError> {
        let parent = self
            .parent(old_child)
            .ok_or(DomError::UnknownNode(old_child))?;
        self.insert_before(parent, new_child, Some(old_child))?;
        self.detach(old_child)
    }

    pub fn clear_children(&mut self, id: NodeId) -> Result<(), DomError> {
        let children = self.slot(id)?.children.clone();
        for child in children {
            self.detach(child)?;
        }
        Ok(())
    }

    /// Attaches a freshly created node without the cycle/ownership checks.
    pub(crate) fn adopt(&mut self, parent: NodeId, child: NodeId) {
        if !self.contains_node(child) {
            return;
        }
        let Some(slot) = self.live_mut(parent) else {
            return;
        };
        slot.children.push(child);
        if let Some(slot) = self.live_mut(child) {
            slot.parent = Some(parent);
        }
        self.touch();
    }

    /// Child-index path from `root` down to `node`, or `None` when `node` is outside `root`.
    pub fn index_path(&self, root: NodeId, node: NodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = node;
        while current != root {
            path.push(self.index_in_parent(current)?);
            current = self.parent(current)?;
        }
        path.reverse();
        Some(path)
    }

    pub fn node_at_path(&self, root: NodeId, path: &[usize]) -> Option<NodeId> {
        let mut current = root;
        for &ix in path {
            current = *self.children(current).get(ix)?;
        }
        Some(current)
    }

    pub fn is_valid_point(&self, point: &DomPoint) -> bool {
        self.contains_node(point.node) && point.offset <= self.node_length(point.node)
    }

    /// Document-order comparison of two boundary points under the same root.
    pub fn compare_points(&self, root: NodeId, a: &DomPoint, b: &DomPoint) -> Option<Ordering> {
        let mut pa = self.index_path(root, a.node)?;
        let mut pb = self.index_path(root, b.node)?;
        pa.push(a.offset);
        pb.push(b.offset);
        Some(pa.cmp(&pb))
    }
}

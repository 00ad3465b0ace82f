//! Undo snapshots: container HTML with entity wrappers swapped for placeholders, plus the
//! selection encoded as child-index paths so it survives re-parsing.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::dom::{Dom, DomError, DomPoint, DomRange, NodeData, NodeId};
use crate::html::{inner_html_with_placeholders, set_inner_html, ENTITY_PLACEHOLDER_PREFIX};
use crate::metadata::EntityInfo;
use crate::selection::DomSelection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPoint {
    pub path: Vec<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SnapshotSelection {
    Range {
        start: PathPoint,
        end: PathPoint,
        #[serde(rename = "isReverted")]
        is_reverted: bool,
    },
    Image {
        image: Vec<usize>,
    },
    Table {
        table: Vec<usize>,
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub html: String,
    pub selection: Option<SnapshotSelection>,
    /// Undoing this snapshot is what Backspace right after the change should do.
    pub can_undo_by_backspace: bool,
}

impl Snapshot {
    /// Ids of the entities whose placeholders appear in the snapshot.
    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.html.split("<!--").skip(1).filter_map(|rest| {
            let (id, _) = rest.strip_prefix(ENTITY_PLACEHOLDER_PREFIX)?.split_once("-->")?;
            Some(id)
        })
    }
}

fn entity_id(dom: &Dom, node: NodeId) -> Option<String> {
    let el = dom.element(node)?;
    EntityInfo::parse(el.classes())
        .map(|info| info.id)
        .filter(|id| !id.is_empty())
}

fn encode_point(dom: &Dom, root: NodeId, point: &DomPoint) -> Option<PathPoint> {
    Some(PathPoint {
        path: dom.index_path(root, point.node)?,
        offset: point.offset,
    })
}

fn decode_point(dom: &Dom, root: NodeId, point: &PathPoint) -> Option<DomPoint> {
    let node = dom.node_at_path(root, &point.path)?;
    let point = DomPoint::new(node, point.offset);
    dom.is_valid_point(&point).then_some(point)
}

pub fn take_snapshot(
    dom: &Dom,
    root: NodeId,
    selection: Option<&DomSelection>,
    can_undo_by_backspace: bool,
) -> Snapshot {
    let html = inner_html_with_placeholders(dom, root, |node| entity_id(dom, node));
    let selection = selection.and_then(|selection| match selection {
        DomSelection::Range { range, is_reverted } => Some(SnapshotSelection::Range {
            start: encode_point(dom, root, &range.start)?,
            end: encode_point(dom, root, &range.end)?,
            is_reverted: *is_reverted,
        }),
        DomSelection::Image { image } => Some(SnapshotSelection::Image {
            image: dom.index_path(root, *image)?,
        }),
        DomSelection::Table {
            table,
            first_row,
            first_column,
            last_row,
            last_column,
        } => Some(SnapshotSelection::Table {
            table: dom.index_path(root, *table)?,
            first_row: *first_row,
            first_column: *first_column,
            last_row: *last_row,
            last_column: *last_column,
        }),
    });
    Snapshot {
        html,
        selection,
        can_undo_by_backspace,
    }
}

/// Replaces every placeholder under `root` with the live wrapper registered for its id. A
/// placeholder with no known wrapper is dropped.
pub fn swap_in_entities(dom: &mut Dom, root: NodeId, wrappers: &HashMap<String, NodeId>) -> Result<(), DomError> {
    let placeholders: Vec<(NodeId, String)> = dom
        .descendants(root)
        .into_iter()
        .filter_map(|node| match dom.data(node) {
            Some(NodeData::EntityPlaceholder { entity_id }) => Some((node, entity_id.clone())),
            _ => None,
        })
        .collect();
    for (placeholder, id) in placeholders {
        match wrappers.get(&id) {
            Some(wrapper) if dom.contains_node(*wrapper) => dom.replace_child(*wrapper, placeholder)?,
            _ => {
                tracing::warn!(entity_id = id.as_str(), "no wrapper for entity placeholder; dropping it");
                dom.detach(placeholder)?;
            }
        }
    }
    Ok(())
}

/// Rebuilds the content of `root` from `snapshot` and returns the selection it recorded.
pub fn restore_snapshot(
    dom: &mut Dom,
    root: NodeId,
    snapshot: &Snapshot,
    wrappers: &HashMap<String, NodeId>,
) -> Result<Option<DomSelection>, DomError> {
    for wrapper in wrappers.values() {
        if dom.contains(root, *wrapper) {
            dom.detach(*wrapper)?;
        }
    }
    set_inner_html(dom, root, &snapshot.html)?;
    swap_in_entities(dom, root, wrappers)?;

    let selection = snapshot.selection.as_ref().and_then(|selection| match selection {
        SnapshotSelection::Range {
            start,
            end,
            is_reverted,
        } => Some(DomSelection::Range {
            range: DomRange::new(decode_point(dom, root, start)?, decode_point(dom, root, end)?),
            is_reverted: *is_reverted,
        }),
        SnapshotSelection::Image { image } => Some(DomSelection::Image {
            image: dom.node_at_path(root, image)?,
        }),
        SnapshotSelection::Table {
            table,
            first_row,
            first_column,
            last_row,
            last_column,
        } => Some(DomSelection::Table {
            table: dom.node_at_path(root, table)?,
            first_row: *first_row,
            first_column: *first_column,
            last_row: *last_row,
            last_column: *last_column,
        }),
    });
    Ok(selection)
}

/// Linear undo history with a cursor. Adding after an undo discards the redo branch.
#[derive(Debug, Clone)]
pub struct Snapshots {
    snapshots: Vec<Snapshot>,
    current: usize,
    max: usize,
}

impl Snapshots {
    pub fn new(max: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            current: 0,
            max: max.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.snapshots.get(self.current)
    }

    /// Records `snapshot` after the cursor. A snapshot with the same HTML as the current one
    /// only refreshes its selection.
    pub fn add(&mut self, snapshot: Snapshot) {
        if let Some(current) = self.snapshots.get_mut(self.current) {
            if current.html == snapshot.html {
                current.selection = snapshot.selection;
                current.can_undo_by_backspace |= snapshot.can_undo_by_backspace;
                return;
            }
        }
        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.current + 1);
        }
        self.snapshots.push(snapshot);
        if self.snapshots.len() > self.max {
            let excess = self.snapshots.len() - self.max;
            self.snapshots.drain(..excess);
        }
        self.current = self.snapshots.len() - 1;
    }

    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current + 1 < self.snapshots.len()
    }

    pub fn can_undo_by_backspace(&self) -> bool {
        self.current().is_some_and(|s| s.can_undo_by_backspace)
    }

    pub fn undo(&mut self) -> Option<&Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.current -= 1;
        self.snapshots.get(self.current)
    }

    pub fn redo(&mut self) -> Option<&Snapshot> {
        if !self.can_redo() {
            return None;
        }
        self.current += 1;
        self.snapshots.get(self.current)
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.current = 0;
    }

    /// Every entity id any recorded snapshot can bring back.
    pub fn entity_ids(&self) -> HashSet<&str> {
        self.snapshots.iter().flat_map(Snapshot::entity_ids).collect()
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::association::NodeAssociations;
use crate::config::{Capabilities, EditorConfig};
use crate::dom::{Dom, DomError, DomPoint, NodeId};
use crate::dom_to_model::{create_model, BuildOptions};
use crate::format::SegmentFormat;
use crate::html::{inner_html, set_inner_html};
use crate::metadata::EntityInfo;
use crate::model::{ContentModelDocument, Entity, Image};
use crate::model_to_dom::write_model;
use crate::normalize::normalize_content_model;
use crate::selection::{model_selection_to_dom, validate_selection, DomSelection};
use crate::snapshot::{restore_snapshot, swap_in_entities, take_snapshot, Snapshots};

pub mod change_source {
    pub const FORMAT: &str = "Format";
    pub const SET_CONTENT: &str = "SetContent";
    pub const AUTO_FORMAT: &str = "AutoFormat";
    pub const INSERT_ENTITY: &str = "InsertEntity";
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Dom(#[from] DomError),
    #[error("unknown entity {0}")]
    UnknownEntity(String),
    #[error("invalid editor config: {0}")]
    Config(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityOperation {
    NewEntity,
    RemoveFromStart,
    RemoveFromEnd,
    Overwrite,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnounceData {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    ContentChanged {
        source: String,
        api_name: Option<String>,
    },
    EntityOperation {
        operation: EntityOperation,
        entity_id: String,
        entity_type: String,
    },
    NewImage {
        src: String,
    },
    Announce(AnnounceData),
    PendingFormatChanged {
        format: Option<SegmentFormat>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletedEntity {
    pub entity: Entity,
    pub operation: EntityOperation,
}

/// Side channels a format callback fills in for the editor to act on after the write.
#[derive(Debug, Clone, Default)]
pub struct FormatContentModelContext {
    pub new_entities: Vec<Entity>,
    pub deleted_entities: Vec<DeletedEntity>,
    pub new_images: Vec<Image>,
    pub skip_undo_snapshot: bool,
    pub new_pending_format: Option<SegmentFormat>,
    pub can_undo_by_backspace: bool,
    pub announce_data: Option<AnnounceData>,
    pub clear_model_cache: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FormatContentModelOptions {
    pub api_name: Option<String>,
    pub change_source: Option<String>,
    /// Build from this selection instead of the editor's; bypasses the model cache.
    pub selection_override: Option<DomSelection>,
}

impl FormatContentModelOptions {
    pub fn api(name: &str) -> Self {
        Self {
            api_name: Some(name.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PendingFormat {
    format: SegmentFormat,
    point: DomPoint,
}

#[derive(Debug)]
struct CachedModel {
    model: ContentModelDocument,
    version: u64,
    selection: Option<DomSelection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub wrapper: NodeId,
    pub entity_type: String,
}

pub type Observer = Box<dyn FnMut(&EditorEvent)>;

pub struct Editor {
    dom: Dom,
    root: NodeId,
    config: EditorConfig,
    selection: Option<DomSelection>,
    cache: Option<CachedModel>,
    associations: NodeAssociations,
    pending_format: Option<PendingFormat>,
    entities: HashMap<String, EntityRecord>,
    /// Wrappers of live entities and of entities an undo snapshot still refers to, so undo can
    /// bring back a deleted entity as the same node.
    wrappers: HashMap<String, NodeId>,
    snapshots: Snapshots,
    snapshot_version: u64,
    observers: Vec<Observer>,
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        let config = config.with_defaults();
        let mut dom = Dom::new();
        let root = dom.create_element_with_attributes(
            "div",
            vec![("contenteditable".to_string(), "true".to_string())],
        );
        let snapshots = Snapshots::new(config.max_undo_snapshots);
        let mut editor = Self {
            dom,
            root,
            config,
            selection: None,
            cache: None,
            associations: NodeAssociations::new(),
            pending_format: None,
            entities: HashMap::new(),
            wrappers: HashMap::new(),
            snapshots,
            snapshot_version: 0,
            observers: Vec::new(),
        };
        editor.add_undo_snapshot(false);
        editor
    }

    pub fn from_json_config(json: &str) -> Result<Self, EditorError> {
        Ok(Self::new(EditorConfig::from_json(json)?))
    }

    pub fn with_content(html: &str, config: EditorConfig) -> Result<Self, EditorError> {
        let mut editor = Self::new(config);
        editor.set_content(html)?;
        editor.snapshots.clear();
        editor.add_undo_snapshot(false);
        Ok(editor)
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    /// Direct access for host code that edits outside a transaction. Any change invalidates
    /// the model cache.
    pub fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn get_environment(&self) -> &Capabilities {
        &self.config.capabilities
    }

    pub fn get_dom_selection(&self) -> Option<&DomSelection> {
        self.selection.as_ref()
    }

    /// Sets the selection. One that does not lie inside the editor is treated as none.
    pub fn set_dom_selection(&mut self, selection: Option<DomSelection>) {
        let selection = selection.and_then(|s| validate_selection(&self.dom, self.root, &s));
        let caret = selection.as_ref().and_then(DomSelection::caret_point);
        let keeps_pending = match (&self.pending_format, caret) {
            (Some(pending), Some(point)) => pending.point == point,
            (Some(_), None) => false,
            (None, _) => true,
        };
        if !keeps_pending {
            self.pending_format = None;
            self.trigger_event(EditorEvent::PendingFormatChanged { format: None });
        }
        self.selection = selection;
    }

    pub fn pending_format(&self) -> Option<&SegmentFormat> {
        self.pending_format.as_ref().map(|p| &p.format)
    }

    pub fn entity(&self, entity_id: &str) -> Option<&EntityRecord> {
        self.entities.get(entity_id)
    }

    /// An entity id of the form `<type>_<n>` not used by any known entity.
    pub fn next_entity_id(&self, entity_type: &str) -> String {
        (1..)
            .map(|n| format!("{entity_type}_{n}"))
            .find(|id| !self.wrappers.contains_key(id))
            .unwrap_or_else(|| entity_type.to_string())
    }

    pub fn add_observer(&mut self, observer: impl FnMut(&EditorEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn trigger_event(&mut self, event: EditorEvent) {
        tracing::trace!(?event, "editor event");
        for observer in &mut self.observers {
            observer(&event);
        }
    }

    pub fn get_content(&self) -> String {
        inner_html(&self.dom, self.root)
    }

    /// Replaces the editor content. Entity placeholders in `html` are bound to the wrappers
    /// the editor already knows.
    pub fn set_content(&mut self, html: &str) -> Result<(), EditorError> {
        set_inner_html(&mut self.dom, self.root, html)?;
        swap_in_entities(&mut self.dom, self.root, &self.wrappers)?;
        self.reset_after_replace();
        self.selection = None;
        self.add_undo_snapshot(false);
        self.collect_garbage();
        self.trigger_event(EditorEvent::ContentChanged {
            source: change_source::SET_CONTENT.to_string(),
            api_name: None,
        });
        Ok(())
    }

    fn reset_after_replace(&mut self) {
        self.cache = None;
        self.associations.clear();
        self.pending_format = None;
        self.entities.clear();
        for node in self.dom.descendants(self.root) {
            let Some(info) = self.dom.element(node).and_then(|el| EntityInfo::parse(el.classes())) else {
                continue;
            };
            if info.id.is_empty() {
                continue;
            }
            self.wrappers.insert(info.id.clone(), node);
            self.entities.insert(
                info.id,
                EntityRecord {
                    wrapper: node,
                    entity_type: info.entity_type,
                },
            );
        }
    }

    /// Forgets wrappers no snapshot can restore and frees every node outside the content
    /// that no remembered wrapper holds.
    fn collect_garbage(&mut self) {
        let referenced = self.snapshots.entity_ids();
        self.wrappers
            .retain(|id, _| self.entities.contains_key(id) || referenced.contains(id.as_str()));
        let mut roots = vec![self.root];
        roots.extend(self.wrappers.values().copied());
        let freed = self.dom.collect_garbage(&roots);
        tracing::trace!(freed, live = self.dom.live_count(), "collected detached nodes");
    }

    fn add_undo_snapshot(&mut self, can_undo_by_backspace: bool) {
        let snapshot = take_snapshot(&self.dom, self.root, self.selection.as_ref(), can_undo_by_backspace);
        self.snapshots.add(snapshot);
        self.snapshot_version = self.dom.version();
    }

    pub fn can_undo(&self) -> bool {
        self.snapshots.can_undo() || self.dom.version() != self.snapshot_version
    }

    pub fn can_redo(&self) -> bool {
        self.snapshots.can_redo()
    }

    pub fn can_undo_by_backspace(&self) -> bool {
        self.snapshots.can_undo_by_backspace()
    }

    pub fn undo(&mut self) -> Result<bool, EditorError> {
        if self.dom.version() != self.snapshot_version {
            // Keep edits made since the last snapshot reachable through redo.
            self.add_undo_snapshot(false);
        }
        let Some(snapshot) = self.snapshots.undo().cloned() else {
            return Ok(false);
        };
        self.restore(&snapshot, "undo")?;
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool, EditorError> {
        let Some(snapshot) = self.snapshots.redo().cloned() else {
            return Ok(false);
        };
        self.restore(&snapshot, "redo")?;
        Ok(true)
    }

    fn restore(&mut self, snapshot: &crate::snapshot::Snapshot, api_name: &str) -> Result<(), EditorError> {
        let selection = restore_snapshot(&mut self.dom, self.root, snapshot, &self.wrappers)?;
        self.reset_after_replace();
        self.selection = selection;
        self.snapshot_version = self.dom.version();
        self.collect_garbage();
        self.trigger_event(EditorEvent::ContentChanged {
            source: change_source::SET_CONTENT.to_string(),
            api_name: Some(api_name.to_string()),
        });
        Ok(())
    }

    /// Builds the model for the current content, or for `selection_override` when given.
    pub fn create_content_model(&mut self, selection_override: Option<&DomSelection>) -> ContentModelDocument {
        let selection = selection_override.cloned().or_else(|| self.selection.clone());
        self.take_model(selection.as_ref(), selection_override.is_none())
    }

    fn take_model(&mut self, selection: Option<&DomSelection>, use_cache: bool) -> ContentModelDocument {
        let version = self.dom.version();
        match self.cache.take() {
            Some(cached) if use_cache && cached.version == version && cached.selection.as_ref() == selection => {
                tracing::debug!(version, "reusing cached content model");
                return cached.model;
            }
            Some(_) => tracing::debug!(version, "content model cache is stale; rebuilding"),
            None => tracing::debug!(version, "building content model"),
        }

        let caret = selection.and_then(DomSelection::caret_point);
        let pending = self
            .pending_format
            .as_ref()
            .filter(|p| Some(p.point) == caret)
            .map(|p| &p.format);
        let options = BuildOptions {
            capabilities: self.config.capabilities,
            default_format: Some(&self.config.default_format),
            pending_format: pending,
        };
        let built = create_model(&self.dom, self.root, selection, &options);
        self.associations = built.associations;
        built.model
    }

    pub fn format_content_model(
        &mut self,
        callback: impl FnOnce(&mut ContentModelDocument, &mut FormatContentModelContext) -> bool,
        options: FormatContentModelOptions,
    ) -> Result<bool, EditorError> {
        self.try_format_content_model(|model, context| Ok::<_, EditorError>(callback(model, context)), options)
    }

    /// Runs one transaction. An error from `callback` propagates unchanged and leaves the DOM
    /// untouched.
    pub fn try_format_content_model<E: From<EditorError>>(
        &mut self,
        callback: impl FnOnce(&mut ContentModelDocument, &mut FormatContentModelContext) -> Result<bool, E>,
        options: FormatContentModelOptions,
    ) -> Result<bool, E> {
        let use_cache = options.selection_override.is_none();
        let selection = options.selection_override.clone().or_else(|| self.selection.clone());
        let mut model = self.take_model(selection.as_ref(), use_cache);
        let mut context = FormatContentModelContext::default();

        let changed = callback(&mut model, &mut context)?;
        if !changed {
            tracing::debug!(api = options.api_name.as_deref(), "format callback made no change");
            if let Some(format) = context.new_pending_format.take() {
                self.set_pending_format(format, selection.as_ref());
            }
            if use_cache && !context.clear_model_cache {
                self.cache = Some(CachedModel {
                    model,
                    version: self.dom.version(),
                    selection,
                });
            }
            return Ok(false);
        }

        self.apply_changes(model, context, &options, selection.as_ref())
            .map_err(E::from)?;
        Ok(true)
    }

    fn set_pending_format(&mut self, format: SegmentFormat, selection: Option<&DomSelection>) {
        let Some(point) = selection.and_then(DomSelection::caret_point) else {
            return;
        };
        self.pending_format = Some(PendingFormat {
            format: format.clone(),
            point,
        });
        self.trigger_event(EditorEvent::PendingFormatChanged { format: Some(format) });
    }

    fn apply_changes(
        &mut self,
        mut model: ContentModelDocument,
        mut context: FormatContentModelContext,
        options: &FormatContentModelOptions,
        previous: Option<&DomSelection>,
    ) -> Result<(), EditorError> {
        if !context.skip_undo_snapshot {
            // Same HTML as the current entry only refreshes its selection.
            self.add_undo_snapshot(false);
        }

        normalize_content_model(&mut model);
        let rendered = write_model(
            &mut self.dom,
            self.root,
            &model,
            &mut self.associations,
            self.config.capabilities,
        )?;
        let selection = model_selection_to_dom(&self.dom, self.root, &model, &rendered, previous);
        tracing::debug!(
            api = options.api_name.as_deref(),
            has_selection = selection.is_some(),
            "content model written"
        );

        for deleted in std::mem::take(&mut context.deleted_entities) {
            let id = deleted.entity.entity_id;
            if let Some(record) = self.entities.remove(&id) {
                if self.dom.contains(self.root, record.wrapper) {
                    self.dom.detach(record.wrapper)?;
                }
            }
            self.trigger_event(EditorEvent::EntityOperation {
                operation: deleted.operation,
                entity_id: id,
                entity_type: deleted.entity.entity_type,
            });
        }
        for entity in std::mem::take(&mut context.new_entities) {
            self.wrappers.insert(entity.entity_id.clone(), entity.wrapper);
            self.entities.insert(
                entity.entity_id.clone(),
                EntityRecord {
                    wrapper: entity.wrapper,
                    entity_type: entity.entity_type.clone(),
                },
            );
            self.trigger_event(EditorEvent::EntityOperation {
                operation: EntityOperation::NewEntity,
                entity_id: entity.entity_id,
                entity_type: entity.entity_type,
            });
        }
        self.entities
            .retain(|_, record| self.dom.contains(self.root, record.wrapper));
        for image in std::mem::take(&mut context.new_images) {
            self.trigger_event(EditorEvent::NewImage { src: image.src });
        }
        if let Some(announce) = context.announce_data.take() {
            self.trigger_event(EditorEvent::Announce(announce));
        }

        // The caret moved or content changed; a pending format only survives if the callback
        // asked for a new one.
        let had_pending = self.pending_format.take().is_some();
        self.selection = selection.clone();
        match context.new_pending_format.take() {
            Some(format) => self.set_pending_format(format, selection.as_ref()),
            None if had_pending => self.trigger_event(EditorEvent::PendingFormatChanged { format: None }),
            None => {}
        }

        if !context.skip_undo_snapshot {
            self.add_undo_snapshot(context.can_undo_by_backspace);
        }

        self.trigger_event(EditorEvent::ContentChanged {
            source: options
                .change_source
                .clone()
                .unwrap_or_else(|| change_source::FORMAT.to_string()),
            api_name: options.api_name.clone(),
        });

        self.cache = if context.clear_model_cache {
            None
        } else {
            Some(CachedModel {
                model,
                version: self.dom.version(),
                selection,
            })
        };
        self.collect_garbage();
        Ok(())
    }
}

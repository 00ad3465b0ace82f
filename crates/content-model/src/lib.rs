pub mod association;
pub mod config;
pub mod css;
pub mod dom;
pub mod dom_to_model;
pub mod editor;
pub mod fingerprint;
pub mod format;
pub mod format_api;
pub mod html;
pub mod metadata;
pub mod model;
pub mod model_to_dom;
pub mod normalize;
pub mod selection;
pub mod snapshot;
pub mod table_grid;

pub use crate::association::NodeAssociations;
pub use crate::config::{Capabilities, EditorConfig};
pub use crate::dom::{Dom, DomError, DomPoint, DomRange, NodeId};
pub use crate::dom_to_model::{create_model, BuildOptions, BuiltModel};
pub use crate::editor::{
    change_source, Editor, EditorError, EditorEvent, EntityOperation, FormatContentModelContext,
    FormatContentModelOptions,
};
pub use crate::format::SegmentFormat;
pub use crate::format_api::*;
pub use crate::model::*;
pub use crate::model_to_dom::{write_model, RenderMap};
pub use crate::normalize::normalize_content_model;
pub use crate::selection::DomSelection;
pub use crate::snapshot::{Snapshot, Snapshots};

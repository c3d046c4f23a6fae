//! Selection and material-state engine for the campus viewer.
//!
//! The crate owns a retained scene graph model and everything that mutates it
//! in response to user input: node classification, the one-time scene
//! initializer, the highlight/selection state machines for the overview and
//! the per-building detail view, and the view-mode coordinator that decides
//! which of the two is live. Rendering, GLTF decoding and camera input are
//! left to the embedding application.

pub mod bounds;
pub mod classify;
pub mod detail;
pub mod error;
pub mod graph;
pub mod highlight;
pub mod initializer;
pub mod labels;
pub mod material;
pub mod metadata;
pub mod selection;
pub mod session;
pub mod view_mode;

pub use glam;

pub use bounds::{Aabb, Ray};
pub use classify::{classify, NodeCategory, NodeClass};
pub use detail::{
    CameraFraming, CompletionOutcome, DetailRequest, DetailStatus, DetailViewManager, LoadTicket,
};
pub use error::LoadError;
pub use graph::{
    DisposedResources, Geometry, GeometryId, GeometryShape, MaterialChanges, NodeId, NodeKind,
    NodeUserData, PickHit, RoomAttributes, SceneGraph, SceneId, SceneNode,
};
pub use initializer::{MaterialRegistry, SceneInitializer};
pub use labels::{LabelAnchor, LabelKind, ScreenLabel};
pub use material::{MaterialId, MaterialInstance, MaterialSpec};
pub use metadata::{Metadata, MetadataDictionary, MetadataState};
pub use selection::{
    PickEvent, PickIgnored, PickOutcome, RecordData, SelectionFeed, SelectionMachine,
    SelectionRecord,
};
pub use session::CampusSession;
pub use view_mode::{ViewMode, ViewModeCoordinator};

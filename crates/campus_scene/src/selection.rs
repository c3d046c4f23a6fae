//! Overview selection: pick resolution, the highlight state machine and the
//! snapshot records handed to the UI.

use glam::Vec3;
use serde::Serialize;

use crate::classify::{classify, is_clickable, object_id};
use crate::graph::{NodeId, SceneGraph, SceneId};
use crate::highlight::HighlightTracker;
use crate::initializer::MaterialRegistry;
use crate::material::{overview_highlight, resting_material, MaterialSpec};
use crate::metadata::Metadata;

/// Window after a new selection during which the UI keeps showing the
/// previous record.
pub const TRANSITION_WINDOW_SECS: f32 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickEvent {
    pub object: NodeId,
    pub point: Vec3,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Position {
    fn from(value: Vec3) -> Self {
        Self {
            x: value.x,
            y: value.y,
            z: value.z,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingData {
    pub clickable: bool,
    pub object_id: Option<String>,
    pub model_data: Option<Metadata>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RoomData {
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(rename = "buildingId")]
    pub building_id: String,
    #[serde(rename = "roomType")]
    pub room_type: String,
    pub floor: String,
    pub capacity: String,
    #[serde(rename = "inDetailView")]
    pub in_detail_view: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordData {
    Building(BuildingData),
    Room(RoomData),
}

/// Detached snapshot of a selected node. Holds no reference into the graph.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub uuid: String,
    pub user_data: RecordData,
    pub position: Position,
}

impl SelectionRecord {
    pub fn is_room(&self) -> bool {
        matches!(self.user_data, RecordData::Room(_))
    }

    pub fn building(&self) -> Option<&BuildingData> {
        match &self.user_data {
            RecordData::Building(data) => Some(data),
            RecordData::Room(_) => None,
        }
    }

    pub fn room(&self) -> Option<&RoomData> {
        match &self.user_data {
            RecordData::Room(data) => Some(data),
            RecordData::Building(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickIgnored {
    NotReady,
    StaleScene,
    NoMesh,
    NotClickable,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PickOutcome {
    Selected(SelectionRecord),
    Ignored(PickIgnored),
}

/// Picks on groups resolve to the first mesh in pre-order beneath them.
pub fn resolve_leaf(scene: &SceneGraph, object: NodeId) -> Option<NodeId> {
    let node = scene.node(object)?;
    if node.is_mesh() {
        Some(object)
    } else {
        scene.first_mesh_under(object)
    }
}

pub fn building_record(scene: &SceneGraph, node: NodeId) -> Option<SelectionRecord> {
    let source = scene.node(node)?;
    let user_data = &source.user_data;
    Some(SelectionRecord {
        name: source.name().to_string(),
        kind: "Mesh".to_string(),
        uuid: source.uuid().to_string(),
        user_data: RecordData::Building(BuildingData {
            clickable: user_data.clickable || is_clickable(source.name()),
            object_id: user_data
                .object_id
                .clone()
                .or_else(|| object_id(source.name())),
            model_data: user_data.model_data.clone(),
        }),
        position: source.position().into(),
    })
}

fn overview_fallback(name: &str) -> MaterialSpec {
    resting_material(classify(name).category)
}

/// Overview selection state machine: Idle or Selected(node).
#[derive(Debug)]
pub struct SelectionMachine {
    scene: SceneId,
    tracker: HighlightTracker,
}

impl SelectionMachine {
    pub fn new(registry: MaterialRegistry) -> Self {
        Self {
            scene: registry.scene(),
            tracker: HighlightTracker::new(registry, overview_highlight(), overview_fallback),
        }
    }

    pub fn scene(&self) -> SceneId {
        self.scene
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.tracker.current()
    }

    pub fn registry(&self) -> &MaterialRegistry {
        self.tracker.registry()
    }

    pub fn pick(&mut self, scene: &mut SceneGraph, event: &PickEvent) -> PickOutcome {
        if scene.id() != self.scene {
            return PickOutcome::Ignored(PickIgnored::StaleScene);
        }
        let Some(leaf) = resolve_leaf(scene, event.object) else {
            return PickOutcome::Ignored(PickIgnored::NoMesh);
        };
        let clickable = scene
            .node(leaf)
            .is_some_and(|node| is_clickable(node.name()));
        if !clickable {
            return PickOutcome::Ignored(PickIgnored::NotClickable);
        }
        self.tracker.move_to(scene, leaf);
        match building_record(scene, leaf) {
            Some(record) => {
                log::debug!("selected {}", record.name);
                PickOutcome::Selected(record)
            }
            None => PickOutcome::Ignored(PickIgnored::NoMesh),
        }
    }

    /// Restores the selected node, if any. Returns whether anything changed.
    pub fn clear(&mut self, scene: &mut SceneGraph) -> bool {
        if scene.id() != self.scene {
            return false;
        }
        self.tracker.release(scene).is_some()
    }

    pub fn teardown(&mut self) {
        self.tracker.forget();
    }
}

/// What the UI currently shows. A fresh selection opens a short transition
/// window in which [`SelectionFeed::displayed`] still returns the previous
/// record.
#[derive(Clone, Debug, Default)]
pub struct SelectionFeed {
    current: Option<SelectionRecord>,
    previous: Option<SelectionRecord>,
    transition_remaining: f32,
    revision: u64,
}

impl SelectionFeed {
    pub fn publish(&mut self, record: Option<SelectionRecord>) {
        self.revision += 1;
        match record {
            Some(record) => {
                self.previous = self.current.replace(record);
                self.transition_remaining = TRANSITION_WINDOW_SECS;
            }
            None => {
                self.current = None;
                self.previous = None;
                self.transition_remaining = 0.0;
            }
        }
    }

    pub fn advance(&mut self, delta_secs: f32) {
        if self.transition_remaining > 0.0 {
            self.transition_remaining = (self.transition_remaining - delta_secs).max(0.0);
            if self.transition_remaining == 0.0 {
                self.previous = None;
            }
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition_remaining > 0.0
    }

    pub fn current(&self) -> Option<&SelectionRecord> {
        self.current.as_ref()
    }

    pub fn displayed(&self) -> Option<&SelectionRecord> {
        if self.is_transitioning() {
            self.previous.as_ref().or(self.current.as_ref())
        } else {
            self.current.as_ref()
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

//! Per-building detail view: load lifecycle, room preparation, placeholder
//! fallback and room selection.

use glam::{Affine3A, Vec3};

use crate::classify::format_room_name;
use crate::error::LoadError;
use crate::graph::{DisposedResources, Geometry, NodeId, RoomAttributes, SceneGraph};
use crate::highlight::HighlightTracker;
use crate::initializer::MaterialRegistry;
use crate::material::{placeholder_material, room_highlight, room_material, MaterialInstance};
use crate::metadata::scalar_to_string;
use crate::selection::{
    resolve_leaf, PickEvent, PickIgnored, PickOutcome, RecordData, RoomData, SelectionRecord,
};

pub const DEFAULT_DETAIL_DIR: &str = "models/buildingDetail";
pub const PLACEHOLDER_SIZE: Vec3 = Vec3::new(10.0, 8.0, 10.0);
pub const NOTICE_POSITION: Vec3 = Vec3::new(0.0, 12.0, 0.0);
pub const ROOM_LABEL_LIFT: f32 = 0.5;
const FRAMING_FACTOR: f32 = 1.5;
const UNKNOWN: &str = "Unknown";

pub fn detail_asset_path(detail_dir: &str, building_id: &str) -> String {
    format!("{}/ar{building_id}.glb", detail_dir.trim_end_matches('/'))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetailStatus {
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub building_id: String,
    pub path: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DetailRequest {
    AlreadyActive,
    Started {
        ticket: LoadTicket,
        disposed: DisposedResources,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraFraming {
    pub position: Vec3,
    pub target: Vec3,
    pub distance: f32,
}

impl CameraFraming {
    /// Looks at the origin from the upper-left-front diagonal.
    pub fn for_size(size: Vec3) -> Self {
        let extent = size.x.max(size.z).max(size.y);
        let distance = extent * FRAMING_FACTOR;
        Self {
            position: Vec3::new(-0.7 * distance, 0.7 * distance, 0.7 * distance),
            target: Vec3::ZERO,
            distance,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CompletionOutcome {
    Installed { framing: CameraFraming },
    Placeholder { error: String },
    Stale { disposed: DisposedResources },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActiveRoom {
    pub node: NodeId,
    pub name: String,
    pub label_position: Vec3,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FailureNotice {
    pub text: String,
    pub position: Vec3,
}

#[derive(Debug)]
pub struct DetailViewManager {
    detail_dir: String,
    building_id: Option<String>,
    status: DetailStatus,
    generation: u64,
    completed_for_current: bool,
    scene: Option<SceneGraph>,
    rooms: Option<HighlightTracker>,
    active_room: Option<ActiveRoom>,
    failure: Option<String>,
}

impl DetailViewManager {
    pub fn new(detail_dir: impl Into<String>) -> Self {
        Self {
            detail_dir: detail_dir.into(),
            building_id: None,
            status: DetailStatus::Unloaded,
            generation: 0,
            completed_for_current: false,
            scene: None,
            rooms: None,
            active_room: None,
            failure: None,
        }
    }

    pub fn status(&self) -> DetailStatus {
        self.status
    }

    pub fn building_id(&self) -> Option<&str> {
        self.building_id.as_deref()
    }

    pub fn scene(&self) -> Option<&SceneGraph> {
        self.scene.as_ref()
    }

    pub fn scene_mut(&mut self) -> Option<&mut SceneGraph> {
        self.scene.as_mut()
    }

    pub fn active_room(&self) -> Option<&ActiveRoom> {
        self.active_room.as_ref()
    }

    pub fn selected_room(&self) -> Option<NodeId> {
        self.rooms.as_ref().and_then(HighlightTracker::current)
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Loading indicator shows only until the first completion for the
    /// current building.
    pub fn show_loading_indicator(&self) -> bool {
        self.status == DetailStatus::Loading && !self.completed_for_current
    }

    pub fn failure_notice(&self) -> Option<FailureNotice> {
        if self.status != DetailStatus::Failed {
            return None;
        }
        let building_id = self.building_id.as_deref()?;
        Some(FailureNotice {
            text: format!("Building AR{building_id}\n(Model not available)"),
            position: NOTICE_POSITION,
        })
    }

    /// Starts loading `building_id`, tearing down whatever was shown before.
    pub fn request(&mut self, building_id: &str) -> DetailRequest {
        if self.building_id.as_deref() == Some(building_id) && self.status != DetailStatus::Unloaded
        {
            return DetailRequest::AlreadyActive;
        }
        let disposed = self.teardown();
        self.building_id = Some(building_id.to_string());
        self.status = DetailStatus::Loading;
        self.completed_for_current = false;
        let ticket = LoadTicket {
            generation: self.generation,
            building_id: building_id.to_string(),
            path: detail_asset_path(&self.detail_dir, building_id),
        };
        log::info!("loading detail model {}", ticket.path);
        DetailRequest::Started { ticket, disposed }
    }

    pub fn complete(
        &mut self,
        ticket: &LoadTicket,
        result: Result<SceneGraph, LoadError>,
    ) -> CompletionOutcome {
        let current = ticket.generation == self.generation
            && self.status == DetailStatus::Loading
            && self.building_id.as_deref() == Some(ticket.building_id.as_str());
        if !current {
            log::debug!("discarding stale detail load for AR{}", ticket.building_id);
            let disposed = match result {
                Ok(mut scene) => scene.dispose(),
                Err(_) => DisposedResources::default(),
            };
            return CompletionOutcome::Stale { disposed };
        }
        self.completed_for_current = true;

        match result {
            Ok(mut scene) => {
                let (registry, framing) = prepare_detail_scene(&mut scene, &ticket.building_id);
                self.rooms = Some(room_tracker(registry));
                self.scene = Some(scene);
                self.status = DetailStatus::Loaded;
                self.failure = None;
                CompletionOutcome::Installed { framing }
            }
            Err(err) => {
                let error = err.to_string();
                log::warn!("detail model for AR{} unavailable: {error}", ticket.building_id);
                let (scene, registry) = build_placeholder(&ticket.building_id);
                self.rooms = Some(room_tracker(registry));
                self.scene = Some(scene);
                self.status = DetailStatus::Failed;
                self.failure = Some(error.clone());
                CompletionOutcome::Placeholder { error }
            }
        }
    }

    /// Disposes the detail scene and forgets the building. Any load still in
    /// flight becomes stale.
    pub fn teardown(&mut self) -> DisposedResources {
        self.generation += 1;
        self.active_room = None;
        if let Some(rooms) = self.rooms.as_mut() {
            rooms.forget();
        }
        self.rooms = None;
        let disposed = self
            .scene
            .take()
            .map(|mut scene| scene.dispose())
            .unwrap_or_default();
        self.building_id = None;
        self.status = DetailStatus::Unloaded;
        self.completed_for_current = false;
        self.failure = None;
        disposed
    }

    pub fn pick_room(&mut self, event: &PickEvent) -> PickOutcome {
        let (Some(scene), Some(rooms)) = (self.scene.as_mut(), self.rooms.as_mut()) else {
            return PickOutcome::Ignored(PickIgnored::NotReady);
        };
        let Some(leaf) = resolve_leaf(scene, event.object) else {
            return PickOutcome::Ignored(PickIgnored::NoMesh);
        };
        rooms.move_to(scene, leaf);
        let Some(record) = room_record(scene, leaf) else {
            return PickOutcome::Ignored(PickIgnored::NoMesh);
        };
        self.active_room = Some(ActiveRoom {
            node: leaf,
            name: format_room_name(&record.name),
            label_position: event.point + Vec3::Y * ROOM_LABEL_LIFT,
        });
        PickOutcome::Selected(record)
    }

    pub fn clear_room(&mut self) -> bool {
        self.active_room = None;
        match (self.scene.as_mut(), self.rooms.as_mut()) {
            (Some(scene), Some(rooms)) => rooms.release(scene).is_some(),
            _ => false,
        }
    }
}

fn room_tracker(registry: MaterialRegistry) -> HighlightTracker {
    HighlightTracker::new(registry, room_highlight(), room_material)
}

fn extra_string(extras: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    extras
        .get(key)
        .filter(|value| !value.is_null())
        .map(scalar_to_string)
}

/// Assigns palette materials and room attributes to every mesh, then centers
/// the model horizontally on the origin.
pub fn prepare_detail_scene(
    scene: &mut SceneGraph,
    building_id: &str,
) -> (MaterialRegistry, CameraFraming) {
    let mut registry = MaterialRegistry::new(scene.id());
    for id in scene.meshes() {
        let Some(name) = scene.node(id).map(|node| node.name().to_string()) else {
            continue;
        };
        let live = MaterialInstance::new(room_material(&name));
        registry.record(id, live.duplicate());
        scene.set_material(id, live);
        if let Some(node) = scene.node_mut(id) {
            let room = RoomAttributes {
                building_id: building_id.to_string(),
                room_type: extra_string(&node.extras, "roomType"),
                floor: extra_string(&node.extras, "floor"),
                capacity: extra_string(&node.extras, "capacity"),
                in_detail_view: true,
            };
            node.user_data.clickable = true;
            node.user_data.room = Some(room);
        }
    }

    let size = match scene.scene_bounds() {
        Some(bounds) => {
            let center = bounds.center();
            scene.translate_roots(Vec3::new(-center.x, 0.0, -center.z));
            bounds.size()
        }
        None => Vec3::ZERO,
    };
    (registry, CameraFraming::for_size(size))
}

pub fn build_placeholder(building_id: &str) -> (SceneGraph, MaterialRegistry) {
    let mut scene = SceneGraph::new();
    let root = scene.add_group(None, format!("detail_ar{building_id}"), Affine3A::IDENTITY);
    let material = MaterialInstance::new(placeholder_material());
    let mut registry = MaterialRegistry::new(scene.id());
    let placeholder = scene.add_mesh(
        Some(root),
        format!("placeholder_ar{building_id}"),
        Affine3A::from_translation(Vec3::new(0.0, PLACEHOLDER_SIZE.y * 0.5, 0.0)),
        Geometry::cuboid(PLACEHOLDER_SIZE),
        None,
    );
    registry.record(placeholder, material.duplicate());
    scene.set_material(placeholder, material);
    if let Some(node) = scene.node_mut(placeholder) {
        node.user_data.clickable = true;
        node.user_data.room = Some(RoomAttributes {
            building_id: building_id.to_string(),
            in_detail_view: true,
            ..RoomAttributes::default()
        });
    }
    (scene, registry)
}

pub fn room_record(scene: &SceneGraph, node: NodeId) -> Option<SelectionRecord> {
    let source = scene.node(node)?;
    let room = source.user_data.room.clone().unwrap_or_default();
    let or_unknown = |value: Option<String>| value.unwrap_or_else(|| UNKNOWN.to_string());
    Some(SelectionRecord {
        name: source.name().to_string(),
        kind: "room".to_string(),
        uuid: source.uuid().to_string(),
        user_data: RecordData::Room(RoomData {
            room_id: source.name().to_string(),
            building_id: room.building_id,
            room_type: or_unknown(room.room_type),
            floor: or_unknown(room.floor),
            capacity: or_unknown(room.capacity),
            in_detail_view: true,
        }),
        position: source.position().into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_scene(offset_x: f32) -> SceneGraph {
        let mut scene = SceneGraph::new();
        let floor = scene.add_group(None, "floor_1", Affine3A::IDENTITY);
        let room = scene.add_mesh(
            Some(floor),
            "lecture_hall",
            Affine3A::from_translation(Vec3::new(offset_x, 2.0, 4.0)),
            Geometry::cuboid(Vec3::new(6.0, 4.0, 2.0)),
            None,
        );
        if let Some(node) = scene.node_mut(room) {
            node.extras
                .insert("roomType".to_string(), serde_json::json!("lecture"));
            node.extras.insert("capacity".to_string(), serde_json::json!(120));
        }
        scene
    }

    #[test]
    fn asset_path_uses_building_id() {
        assert_eq!(
            detail_asset_path("models/buildingDetail/", "7"),
            "models/buildingDetail/ar7.glb"
        );
    }

    #[test]
    fn prepared_scene_is_centered_and_framed() {
        let mut scene = room_scene(20.0);
        let (registry, framing) = prepare_detail_scene(&mut scene, "7");
        let bounds = scene.scene_bounds().unwrap();
        assert!(bounds.center().x.abs() < 1e-4);
        assert!(bounds.center().z.abs() < 1e-4);
        assert!((bounds.min.y - 0.0).abs() < 1e-4);
        assert_eq!(registry.len(), 1);
        assert!((framing.distance - 9.0).abs() < 1e-4);
        assert_eq!(framing.target, Vec3::ZERO);
    }

    #[test]
    fn large_models_frame_at_one_and_a_half_extent() {
        let framing = CameraFraming::for_size(Vec3::new(40.0, 12.0, 30.0));
        assert!((framing.distance - 60.0).abs() < 1e-4);
        assert_eq!(framing.position, Vec3::new(-42.0, 42.0, 42.0));
    }

    #[test]
    fn small_models_are_framed_without_a_floor() {
        let framing = CameraFraming::for_size(Vec3::new(2.0, 1.0, 2.0));
        assert!((framing.distance - 3.0).abs() < 1e-4);
    }

    #[test]
    fn room_pick_builds_record_and_label() {
        let mut manager = DetailViewManager::new(DEFAULT_DETAIL_DIR);
        let DetailRequest::Started { ticket, .. } = manager.request("7") else {
            panic!("expected a new load");
        };
        let outcome = manager.complete(&ticket, Ok(room_scene(0.0)));
        assert!(matches!(outcome, CompletionOutcome::Installed { .. }));
        let room = manager.scene().unwrap().find_by_name("lecture_hall").unwrap();

        let PickOutcome::Selected(record) = manager.pick_room(&PickEvent {
            object: room,
            point: Vec3::new(1.0, 4.0, 0.0),
        }) else {
            panic!("room should be selectable");
        };
        let data = record.room().unwrap();
        assert_eq!(record.kind, "room");
        assert_eq!(data.building_id, "7");
        assert_eq!(data.room_type, "lecture");
        assert_eq!(data.capacity, "120");
        assert_eq!(data.floor, "Unknown");

        let active = manager.active_room().unwrap();
        assert_eq!(active.name, "Lecture Hall");
        assert_eq!(active.label_position, Vec3::new(1.0, 4.5, 0.0));

        assert!(manager.clear_room());
        assert!(manager.active_room().is_none());
        assert!(!manager.clear_room());
    }

    #[test]
    fn failed_load_installs_placeholder() {
        let mut manager = DetailViewManager::new(DEFAULT_DETAIL_DIR);
        let DetailRequest::Started { ticket, .. } = manager.request("99") else {
            panic!("expected a new load");
        };
        assert!(manager.show_loading_indicator());
        let outcome = manager.complete(&ticket, Err(LoadError::Asset("404".to_string())));
        assert!(matches!(outcome, CompletionOutcome::Placeholder { .. }));
        assert!(!manager.show_loading_indicator());
        assert_eq!(manager.status(), DetailStatus::Failed);

        let scene = manager.scene().unwrap();
        let placeholder = scene.find_by_name("placeholder_ar99").unwrap();
        assert_eq!(scene.world_position(placeholder), Vec3::new(0.0, 4.0, 0.0));
        assert_eq!(
            scene.node(placeholder).unwrap().material().unwrap().spec(),
            &placeholder_material()
        );
        let notice = manager.failure_notice().unwrap();
        assert_eq!(notice.text, "Building AR99\n(Model not available)");
        assert_eq!(notice.position, NOTICE_POSITION);
    }

    #[test]
    fn repeated_request_for_active_building_is_ignored() {
        let mut manager = DetailViewManager::new(DEFAULT_DETAIL_DIR);
        assert!(matches!(manager.request("3"), DetailRequest::Started { .. }));
        assert_eq!(manager.request("3"), DetailRequest::AlreadyActive);
    }
}

//! Single owner of the viewer's mutable scene state. Every pick, clear and
//! mode switch is routed through here so that exactly one selection machine
//! is live at a time.

use glam::{Vec2, Vec3};

use crate::bounds::Ray;
use crate::detail::{CameraFraming, CompletionOutcome, DetailRequest, DetailViewManager, LoadTicket};
use crate::error::LoadError;
use crate::graph::{DisposedResources, PickHit, SceneGraph};
use crate::initializer::{InitStatus, SceneInitializer};
use crate::labels::{project_building_labels, project_point, LabelAnchor, LabelKind, ScreenLabel};
use crate::metadata::MetadataState;
use crate::selection::{PickEvent, PickIgnored, PickOutcome, SelectionFeed, SelectionMachine};
use crate::view_mode::{ViewMode, ViewModeCoordinator};

#[derive(Debug)]
pub struct CampusSession {
    overview: Option<SceneGraph>,
    overview_error: Option<String>,
    metadata: MetadataState,
    initializer: SceneInitializer,
    selection: Option<SelectionMachine>,
    building_labels: Vec<LabelAnchor>,
    detail: DetailViewManager,
    coordinator: ViewModeCoordinator,
    feed: SelectionFeed,
    pending_framing: Option<CameraFraming>,
}

impl CampusSession {
    pub fn new(detail_dir: impl Into<String>) -> Self {
        Self {
            overview: None,
            overview_error: None,
            metadata: MetadataState::Loading,
            initializer: SceneInitializer::default(),
            selection: None,
            building_labels: Vec::new(),
            detail: DetailViewManager::new(detail_dir),
            coordinator: ViewModeCoordinator::default(),
            feed: SelectionFeed::default(),
            pending_framing: None,
        }
    }

    /// Installs a freshly decoded overview scene, disposing any previous one.
    pub fn install_overview(&mut self, scene: SceneGraph) -> DisposedResources {
        let disposed = self.teardown_overview();
        log::info!("overview scene installed with {} nodes", scene.node_count());
        self.overview = Some(scene);
        self.overview_error = None;
        disposed
    }

    pub fn overview_failed(&mut self, error: impl Into<String>) {
        let error = error.into();
        log::warn!("overview scene failed to load: {error}");
        self.overview_error = Some(error);
    }

    pub fn overview_error(&self) -> Option<&str> {
        self.overview_error.as_deref()
    }

    pub fn teardown_overview(&mut self) -> DisposedResources {
        if let Some(selection) = self.selection.as_mut() {
            selection.teardown();
        }
        self.selection = None;
        self.building_labels.clear();
        self.initializer.reset();
        if !self.coordinator.mode().is_detail() {
            self.feed.publish(None);
        }
        self.overview
            .take()
            .map(|mut scene| scene.dispose())
            .unwrap_or_default()
    }

    pub fn set_metadata(&mut self, metadata: MetadataState) {
        self.metadata = metadata;
    }

    pub fn metadata(&self) -> &MetadataState {
        &self.metadata
    }

    /// Runs the scene initializer if both inputs are ready. Returns true on the
    /// call that performed the initialization.
    pub fn poll_initializer<F: FnMut(u8)>(&mut self, progress: F) -> bool {
        match self
            .initializer
            .run(self.overview.as_mut(), &self.metadata, progress)
        {
            InitStatus::Initialized(applied) => {
                self.selection = Some(SelectionMachine::new(applied.registry));
                self.building_labels = applied.labels;
                true
            }
            _ => false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.selection.is_some()
    }

    pub fn mode(&self) -> &ViewMode {
        self.coordinator.mode()
    }

    pub fn overview_scene(&self) -> Option<&SceneGraph> {
        self.overview.as_ref()
    }

    pub fn overview_scene_mut(&mut self) -> Option<&mut SceneGraph> {
        self.overview.as_mut()
    }

    pub fn overview_selection(&self) -> Option<&SelectionMachine> {
        self.selection.as_ref()
    }

    pub fn detail(&self) -> &DetailViewManager {
        &self.detail
    }

    pub fn detail_scene_mut(&mut self) -> Option<&mut SceneGraph> {
        self.detail.scene_mut()
    }

    pub fn building_labels(&self) -> &[LabelAnchor] {
        &self.building_labels
    }

    pub fn feed(&self) -> &SelectionFeed {
        &self.feed
    }

    pub fn live_scene(&self) -> Option<&SceneGraph> {
        match self.coordinator.mode() {
            ViewMode::Overview => self.overview.as_ref(),
            ViewMode::Detail { .. } => self.detail.scene(),
        }
    }

    pub fn raycast(&self, ray: &Ray) -> Option<PickHit> {
        self.live_scene()?.raycast(ray)
    }

    pub fn handle_pick(&mut self, event: PickEvent) -> PickOutcome {
        let outcome = match self.coordinator.mode() {
            ViewMode::Overview => match (self.selection.as_mut(), self.overview.as_mut()) {
                (Some(selection), Some(scene)) => selection.pick(scene, &event),
                _ => PickOutcome::Ignored(PickIgnored::NotReady),
            },
            ViewMode::Detail { .. } => self.detail.pick_room(&event),
        };
        if let PickOutcome::Selected(record) = &outcome {
            self.feed.publish(Some(record.clone()));
        }
        outcome
    }

    /// Clears the live selection. Idempotent: returns false and publishes
    /// nothing when already idle.
    pub fn clear_selection(&mut self) -> bool {
        let changed = match self.coordinator.mode() {
            ViewMode::Overview => match (self.selection.as_mut(), self.overview.as_mut()) {
                (Some(selection), Some(scene)) => selection.clear(scene),
                _ => false,
            },
            ViewMode::Detail { .. } => self.detail.clear_room(),
        };
        if changed {
            self.feed.publish(None);
        }
        changed
    }

    pub fn handle_escape(&mut self) -> bool {
        self.clear_selection()
    }

    pub fn enter_detail(&mut self, building_id: &str) -> DetailRequest {
        let request = self.detail.request(building_id);
        if let DetailRequest::Started { .. } = &request {
            if let (Some(selection), Some(scene)) = (self.selection.as_mut(), self.overview.as_mut())
            {
                selection.clear(scene);
            }
            self.coordinator.switch_to(ViewMode::Detail {
                building_id: building_id.to_string(),
            });
            self.feed.publish(None);
            self.pending_framing = None;
        }
        request
    }

    pub fn complete_detail_load(
        &mut self,
        ticket: &LoadTicket,
        result: Result<SceneGraph, LoadError>,
    ) -> CompletionOutcome {
        let outcome = self.detail.complete(ticket, result);
        if let CompletionOutcome::Installed { framing } = &outcome {
            self.pending_framing = Some(*framing);
        }
        outcome
    }

    pub fn return_to_overview(&mut self) -> DisposedResources {
        if !self.coordinator.mode().is_detail() {
            return DisposedResources::default();
        }
        let disposed = self.detail.teardown();
        self.coordinator.switch_to(ViewMode::Overview);
        self.feed.publish(None);
        self.pending_framing = None;
        disposed
    }

    pub fn advance(&mut self, delta_secs: f32) {
        self.feed.advance(delta_secs);
        self.coordinator.advance(delta_secs);
    }

    pub fn take_camera_reset(&mut self) -> bool {
        self.coordinator.take_camera_reset()
    }

    pub fn take_camera_framing(&mut self) -> Option<CameraFraming> {
        self.pending_framing.take()
    }

    pub fn screen_labels<F>(&self, show_building_labels: bool, debug: bool, project: F) -> Vec<ScreenLabel>
    where
        F: Fn(Vec3) -> Option<Vec2>,
    {
        match self.coordinator.mode() {
            ViewMode::Overview => {
                project_building_labels(&self.building_labels, show_building_labels, debug, project)
            }
            ViewMode::Detail { .. } => {
                let notice = self.detail.failure_notice().and_then(|notice| {
                    project_point(notice.text, notice.position, LabelKind::Notice, &project)
                });
                let room = self.detail.active_room().and_then(|room| {
                    project_point(room.name.clone(), room.label_position, LabelKind::Room, &project)
                });
                notice.into_iter().chain(room).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Geometry;
    use glam::Affine3A;

    fn ready_session() -> CampusSession {
        let mut scene = SceneGraph::new();
        scene.add_mesh(
            None,
            "ar7",
            Affine3A::IDENTITY,
            Geometry::cuboid(Vec3::splat(4.0)),
            None,
        );
        let mut session = CampusSession::new("models/buildingDetail");
        session.install_overview(scene);
        session.set_metadata(MetadataState::Failed("offline".to_string()));
        assert!(session.poll_initializer(|_| {}));
        session
    }

    #[test]
    fn canvas_click_on_building_selects_it() {
        let mut session = ready_session();
        let ray = Ray::new(Vec3::new(0.0, 0.0, 20.0), Vec3::NEG_Z);
        let hit = session.raycast(&ray).unwrap();
        let outcome = session.handle_pick(PickEvent {
            object: hit.node,
            point: hit.point,
        });
        assert!(matches!(outcome, PickOutcome::Selected(_)));
        assert_eq!(session.feed().current().unwrap().name, "ar7");
    }

    #[test]
    fn entering_detail_switches_mode_and_requests_camera_reset() {
        let mut session = ready_session();
        let DetailRequest::Started { ticket, .. } = session.enter_detail("7") else {
            panic!("expected detail load");
        };
        assert_eq!(ticket.path, "models/buildingDetail/ar7.glb");
        assert!(session.mode().is_detail());
        assert!(session.take_camera_reset());
        assert!(!session.take_camera_reset());
        assert!(session.live_scene().is_none());
    }

    #[test]
    fn labels_follow_mode() {
        let mut session = ready_session();
        let project = |point: Vec3| Some(Vec2::new(point.x, point.y));
        assert_eq!(session.screen_labels(true, false, project).len(), 1);
        assert!(session.screen_labels(false, false, project).is_empty());

        let DetailRequest::Started { ticket, .. } = session.enter_detail("7") else {
            panic!("expected detail load");
        };
        session.complete_detail_load(&ticket, Err(LoadError::Asset("missing".to_string())));
        let labels = session.screen_labels(true, false, project);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].kind, LabelKind::Notice);
    }
}

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Mutex;

use campus_scene::glam::{Affine3A, Vec3 as CoreVec3};
use campus_scene::{
    DetailStatus, Geometry, LoadError, MetadataDictionary, MetadataState, NodeId, PickEvent,
    PickOutcome, Ray, SceneGraph, ViewMode,
};

use super::*;
use crate::material_library::MaterialLibrary;
use crate::picking::{dispatch_pick, handle_escape_key};
use crate::scene_loading::{poll_metadata, run_scene_initializer, PendingDetailLoad};
use crate::scene_mirror::{
    sync_material_changes, sync_mirror_visibility, MirrorKind, MirrorRoot, SceneMirrors,
    SceneWriter,
};
use crate::viewer_commands::{apply_viewer_commands, ViewerCommand, ViewerCommandQueue};

struct TestCampus {
    state: CampusState,
    ar07: NodeId,
    tree: NodeId,
}

fn campus_state() -> TestCampus {
    let mut scene = SceneGraph::new();
    let cube = Geometry::cuboid(CoreVec3::splat(4.0));
    let ar07 = scene.add_mesh(
        None,
        "ar07",
        Affine3A::from_translation(CoreVec3::new(-20.0, 2.0, 0.0)),
        cube,
        None,
    );
    let tree = scene.add_mesh(
        None,
        "tree_01",
        Affine3A::from_translation(CoreVec3::new(20.0, 2.0, 0.0)),
        cube,
        None,
    );
    let mut state = CampusState::new("models/buildingDetail");
    state.session.install_overview(scene);
    state.session.set_metadata(MetadataState::Ready(
        MetadataDictionary::from_json(r#"{"7": {"name": "Library"}}"#).expect("metadata json"),
    ));
    TestCampus { state, ar07, tree }
}

fn ready_campus_state() -> TestCampus {
    let mut campus = campus_state();
    assert!(campus.state.session.poll_initializer(|_| {}));
    campus
}

fn mirror_overview(mut state: ResMut<CampusState>, mut writer: SceneWriter) {
    if let Some(scene) = state.session.overview_scene_mut() {
        writer.spawn(scene, MirrorKind::Overview, HashMap::new());
    }
}

fn mirror_app(state: CampusState) -> App {
    let mut app = App::new();
    app.insert_resource(state);
    app.insert_resource(LoadProgress::default());
    app.insert_resource(SceneMirrors::default());
    app.insert_resource(MaterialLibrary::default());
    app.init_resource::<Assets<Mesh>>();
    app.init_resource::<Assets<StandardMaterial>>();
    app
}

fn entity_material(app: &App, node: NodeId) -> StandardMaterial {
    let entity = app
        .world()
        .resource::<SceneMirrors>()
        .overview
        .entity(node)
        .expect("mirrored entity");
    let handle = app
        .world()
        .get::<MeshMaterial3d<StandardMaterial>>(entity)
        .expect("material component")
        .0
        .clone();
    app.world()
        .resource::<Assets<StandardMaterial>>()
        .get(&handle)
        .expect("material asset")
        .clone()
}

fn pick(app: &mut App, node: NodeId) -> PickOutcome {
    let mut state = app.world_mut().resource_mut::<CampusState>();
    state.session.handle_pick(PickEvent {
        object: node,
        point: CoreVec3::ZERO,
    })
}

#[test]
fn initializer_reports_progress_and_mirrors_resting_materials() {
    let campus = campus_state();
    let ar07 = campus.ar07;
    let tree = campus.tree;
    let mut app = mirror_app(campus.state);
    app.add_systems(Startup, mirror_overview);
    app.add_systems(Update, (run_scene_initializer, sync_material_changes).chain());

    app.update();

    assert!(app.world().resource::<LoadProgress>().is_complete());
    assert!(app.world().resource::<CampusState>().session.is_ready());
    assert_eq!(
        app.world().resource::<SceneMirrors>().overview.entity_count(),
        2
    );
    let building = entity_material(&app, ar07);
    assert!((building.base_color.alpha() - 0.7).abs() < 1e-4);
    assert!(matches!(building.alpha_mode, AlphaMode::Blend));
    let decorative = entity_material(&app, tree);
    assert!((decorative.base_color.alpha() - 0.5).abs() < 1e-4);
}

#[test]
fn selection_highlight_reaches_entity_and_clears_without_leaking() {
    let campus = ready_campus_state();
    let ar07 = campus.ar07;
    let mut app = mirror_app(campus.state);
    app.add_systems(Startup, mirror_overview);
    app.add_systems(Update, sync_material_changes);
    app.update();
    let resting = entity_material(&app, ar07);
    assert_eq!(resting.emissive, LinearRgba::BLACK);

    assert!(matches!(pick(&mut app, ar07), PickOutcome::Selected(_)));
    app.update();
    let highlighted = entity_material(&app, ar07);
    assert!(highlighted.emissive.blue > 0.0);
    assert!((highlighted.base_color.alpha() - 0.8).abs() < 1e-4);

    assert!(app
        .world_mut()
        .resource_mut::<CampusState>()
        .session
        .clear_selection());
    app.update();
    let restored = entity_material(&app, ar07);
    assert_eq!(restored.base_color, resting.base_color);
    assert_eq!(restored.emissive, LinearRgba::BLACK);

    let live = app
        .world()
        .resource::<CampusState>()
        .session
        .overview_scene()
        .map(SceneGraph::live_material_count)
        .unwrap_or_default();
    assert_eq!(app.world().resource::<MaterialLibrary>().len(), live);
    assert_eq!(app.world().resource::<Assets<StandardMaterial>>().len(), live);
}

#[test]
fn escape_key_clears_live_selection_and_tolerates_idle() {
    let campus = ready_campus_state();
    let ar07 = campus.ar07;
    let mut app = App::new();
    app.insert_resource(campus.state);
    let mut keys = ButtonInput::<KeyCode>::default();
    keys.press(KeyCode::Escape);
    app.insert_resource(keys);
    app.add_systems(Update, handle_escape_key);

    assert!(matches!(pick(&mut app, ar07), PickOutcome::Selected(_)));
    app.update();
    let session = &app.world().resource::<CampusState>().session;
    assert_eq!(session.overview_selection().and_then(|s| s.selected()), None);
    assert!(session.feed().current().is_none());

    app.update();
    assert!(app
        .world()
        .resource::<CampusState>()
        .session
        .feed()
        .current()
        .is_none());
}

#[test]
fn dispatch_pick_selects_hit_and_clears_on_miss() {
    let mut campus = ready_campus_state();
    let down = CoreVec3::new(0.0, -1.0, 0.0);
    dispatch_pick(
        &mut campus.state,
        Ray::new(CoreVec3::new(-20.0, 50.0, 0.0), down),
    );
    let selected = campus
        .state
        .session
        .feed()
        .current()
        .map(|record| record.name.clone());
    assert_eq!(selected.as_deref(), Some("ar07"));

    dispatch_pick(
        &mut campus.state,
        Ray::new(CoreVec3::new(0.0, 50.0, 200.0), down),
    );
    assert!(campus.state.session.feed().current().is_none());
    assert_eq!(
        campus
            .state
            .session
            .overview_selection()
            .and_then(|selection| selection.selected()),
        None
    );
}

#[test]
fn enter_detail_without_asset_server_mirrors_placeholder_then_tears_down() {
    let campus = ready_campus_state();
    let mut app = mirror_app(campus.state);
    app.insert_resource(PendingDetailLoad::default());
    app.insert_resource(ViewerCommandQueue::default());
    app.insert_resource(OverlayToggles {
        show_labels: true,
        show_sun: true,
    });
    app.add_systems(Update, (apply_viewer_commands, sync_mirror_visibility).chain());

    app.world_mut()
        .resource_mut::<ViewerCommandQueue>()
        .push(ViewerCommand::EnterDetail("5".to_string()));
    app.update();

    {
        let session = &app.world().resource::<CampusState>().session;
        assert_eq!(
            session.mode(),
            &ViewMode::Detail {
                building_id: "5".to_string()
            }
        );
        assert_eq!(session.detail().status(), DetailStatus::Failed);
        assert!(!session.detail().show_loading_indicator());
    }
    let mirrors = app.world().resource::<SceneMirrors>();
    assert_eq!(mirrors.detail.entity_count(), 1);
    assert!(mirrors.detail.scene().is_some());
    assert_eq!(app.world().resource::<Assets<Mesh>>().len(), 1);

    app.world_mut()
        .resource_mut::<ViewerCommandQueue>()
        .push(ViewerCommand::ReturnToOverview);
    app.update();

    assert_eq!(
        app.world().resource::<CampusState>().session.mode(),
        &ViewMode::Overview
    );
    let mirrors = app.world().resource::<SceneMirrors>();
    assert!(mirrors.detail.scene().is_none());
    assert_eq!(mirrors.detail.entity_count(), 0);
    assert_eq!(app.world().resource::<Assets<Mesh>>().len(), 0);
    assert_eq!(app.world().resource::<MaterialLibrary>().len(), 0);
}

#[test]
fn repeated_detail_request_for_same_building_is_ignored() {
    let campus = ready_campus_state();
    let mut app = mirror_app(campus.state);
    app.insert_resource(PendingDetailLoad::default());
    app.insert_resource(ViewerCommandQueue::default());
    app.insert_resource(OverlayToggles {
        show_labels: true,
        show_sun: true,
    });
    app.add_systems(Update, apply_viewer_commands);

    for _ in 0..2 {
        app.world_mut()
            .resource_mut::<ViewerCommandQueue>()
            .push(ViewerCommand::EnterDetail("5".to_string()));
        app.update();
    }

    assert_eq!(app.world().resource::<SceneMirrors>().detail.entity_count(), 1);
    assert_eq!(app.world().resource::<Assets<Mesh>>().len(), 1);
}

#[test]
fn toggle_commands_and_keys_flip_overlays() {
    let campus = campus_state();
    let mut app = mirror_app(campus.state);
    app.insert_resource(PendingDetailLoad::default());
    app.insert_resource(ViewerCommandQueue::default());
    app.insert_resource(OverlayToggles {
        show_labels: true,
        show_sun: true,
    });
    app.insert_resource(ButtonInput::<KeyCode>::default());
    app.add_systems(
        Update,
        (handle_scene_toggle_keys, apply_viewer_commands, sync_sun_light).chain(),
    );
    let sun = app
        .world_mut()
        .spawn((DirectionalLight::default(), Visibility::Visible, SunLight))
        .id();

    app.world_mut()
        .resource_mut::<ViewerCommandQueue>()
        .push(ViewerCommand::ToggleSun);
    app.update();
    assert!(!app.world().resource::<OverlayToggles>().show_sun);
    assert_eq!(app.world().get::<Visibility>(sun), Some(&Visibility::Hidden));
    assert!(!app
        .world()
        .get::<DirectionalLight>(sun)
        .expect("sun light")
        .shadows_enabled);

    app.world_mut()
        .resource_mut::<ButtonInput<KeyCode>>()
        .press(KeyCode::KeyL);
    app.update();
    assert!(!app.world().resource::<OverlayToggles>().show_labels);
    assert!(!app.world().resource::<OverlayToggles>().show_sun);
}

#[test]
fn poll_metadata_settles_from_channel() {
    let mut campus = campus_state();
    campus.state.session.set_metadata(MetadataState::Loading);
    let mut app = App::new();
    app.insert_resource(campus.state);
    let (tx, rx) = mpsc::channel::<Result<MetadataDictionary, LoadError>>();
    app.insert_resource(MetadataChannel { rx: Mutex::new(rx) });
    app.add_systems(Update, poll_metadata);

    app.update();
    assert!(!app
        .world()
        .resource::<CampusState>()
        .session
        .metadata()
        .is_settled());

    tx.send(Err(LoadError::NotAnObject)).expect("send metadata");
    app.update();
    let session = &app.world().resource::<CampusState>().session;
    assert!(session.metadata().is_settled());
    assert!(session.metadata().error().is_some());
}

#[test]
fn poll_metadata_fails_when_loader_disappears() {
    let mut campus = campus_state();
    campus.state.session.set_metadata(MetadataState::Loading);
    let mut app = App::new();
    app.insert_resource(campus.state);
    let (tx, rx) = mpsc::channel::<Result<MetadataDictionary, LoadError>>();
    drop(tx);
    app.insert_resource(MetadataChannel { rx: Mutex::new(rx) });
    app.add_systems(Update, poll_metadata);

    app.update();
    let session = &app.world().resource::<CampusState>().session;
    assert_eq!(session.metadata().error(), Some("metadata loader stopped"));
}

#[test]
fn mirror_visibility_follows_view_mode() {
    let campus = ready_campus_state();
    let mut app = mirror_app(campus.state);
    app.add_systems(Startup, mirror_overview);
    app.add_systems(Update, sync_mirror_visibility);
    app.update();

    let mut roots = app.world_mut().query_filtered::<Entity, With<MirrorRoot>>();
    let root = roots.single(app.world()).expect("overview root");
    assert_eq!(app.world().get::<Visibility>(root), Some(&Visibility::Inherited));

    app.world_mut()
        .resource_mut::<CampusState>()
        .session
        .enter_detail("7");
    app.update();
    assert_eq!(app.world().get::<Visibility>(root), Some(&Visibility::Hidden));
}

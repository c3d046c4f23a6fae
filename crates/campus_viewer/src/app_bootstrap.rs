use bevy::prelude::*;
use bevy_egui::{EguiPlugin, EguiPrimaryContextPass};

use super::camera_controls::{apply_camera_requests, orbit_camera_controls, OrbitDragState};
use super::egui_overlay::{render_label_overlay, render_loading_overlay};
use super::egui_sidebar::{render_sidebar_egui, SidebarState};
use super::material_library::MaterialLibrary;
use super::picking::{handle_escape_key, pick_on_click, ClickTracker};
use super::scene_loading::{
    import_overview_scene, poll_detail_load, poll_metadata, run_scene_initializer,
    start_scene_loads, OverviewAsset, PendingDetailLoad,
};
use super::scene_mirror::{sync_material_changes, sync_mirror_visibility, SceneMirrors};
use super::viewer_commands::{apply_viewer_commands, ViewerCommandQueue};
use super::viewer_config::ViewerConfig;
use super::{
    advance_session, handle_scene_toggle_keys, setup_3d_scene, sync_sun_light,
    update_3d_viewport, CampusState, LoadProgress, OverlayToggles,
};

pub(super) fn run_ui(config: ViewerConfig) {
    let toggles = OverlayToggles {
        show_labels: config.show_labels,
        show_sun: config.show_sun,
    };
    let asset_root = config.asset_root.clone();
    let state = CampusState::new(&config.detail_dir);

    App::new()
        .insert_resource(config)
        .insert_resource(state)
        .insert_resource(toggles)
        .insert_resource(LoadProgress::default())
        .insert_resource(OverviewAsset::default())
        .insert_resource(PendingDetailLoad::default())
        .insert_resource(SceneMirrors::default())
        .insert_resource(MaterialLibrary::default())
        .insert_resource(ViewerCommandQueue::default())
        .insert_resource(SidebarState::default())
        .insert_resource(OrbitDragState::default())
        .insert_resource(ClickTracker::default())
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "Campus Viewer".to_string(),
                        resolution: (1200, 800).into(),
                        ..default()
                    }),
                    ..default()
                })
                .set(AssetPlugin {
                    file_path: asset_root,
                    ..default()
                }),
        )
        .add_plugins(EguiPlugin::default())
        .add_systems(Startup, (setup_3d_scene, start_scene_loads))
        .add_systems(
            Update,
            (
                poll_metadata,
                import_overview_scene,
                run_scene_initializer,
                poll_detail_load,
                handle_escape_key,
                handle_scene_toggle_keys,
                apply_viewer_commands,
                sync_mirror_visibility,
            )
                .chain(),
        )
        .add_systems(
            Update,
            (
                orbit_camera_controls,
                apply_camera_requests
                    .after(orbit_camera_controls)
                    .after(apply_viewer_commands),
                advance_session.after(apply_camera_requests),
                update_3d_viewport,
                sync_sun_light.after(handle_scene_toggle_keys),
            ),
        )
        .add_systems(
            PostUpdate,
            (
                pick_on_click.after(TransformSystems::Propagate),
                sync_material_changes.after(pick_on_click),
            ),
        )
        .add_systems(
            EguiPrimaryContextPass,
            (render_sidebar_egui, render_loading_overlay, render_label_overlay),
        )
        .run();
}

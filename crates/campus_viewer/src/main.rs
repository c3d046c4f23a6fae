use std::sync::mpsc::Receiver;
use std::sync::Mutex;

use bevy::prelude::*;
use campus_scene::{CampusSession, LoadError, MetadataDictionary};

mod app_bootstrap;
mod camera_controls;
mod egui_overlay;
mod egui_sidebar;
mod gltf_import;
mod material_library;
mod picking;
mod scene_loading;
mod scene_mirror;
mod viewer_commands;
mod viewer_config;

use app_bootstrap::run_ui;
use camera_controls::OrbitCamera;
use viewer_config::resolve_viewer_config;

#[cfg(test)]
mod tests;

const UI_PANEL_WIDTH: f32 = 340.0;
const OVERVIEW_CAMERA_POSITION: Vec3 = Vec3::new(-105.0, 85.0, 25.0);

fn main() {
    let config = resolve_viewer_config();
    run_ui(config);
}

/// Owns the engine state; every system that reacts to input goes through it.
#[derive(Resource)]
struct CampusState {
    session: CampusSession,
}

impl CampusState {
    fn new(detail_dir: &str) -> Self {
        Self {
            session: CampusSession::new(detail_dir),
        }
    }
}

#[derive(Resource, Default)]
struct LoadProgress {
    percent: u8,
}

impl LoadProgress {
    fn is_complete(&self) -> bool {
        self.percent >= 100
    }
}

#[derive(Resource, Clone, Copy, Debug, PartialEq, Eq)]
struct OverlayToggles {
    show_labels: bool,
    show_sun: bool,
}

#[derive(Resource)]
struct MetadataChannel {
    rx: Mutex<Receiver<Result<MetadataDictionary, LoadError>>>,
}

#[derive(Component)]
struct Viewer3dCamera;

#[derive(Component)]
struct SunLight;

fn to_core(value: Vec3) -> campus_scene::glam::Vec3 {
    campus_scene::glam::Vec3::from_array(value.to_array())
}

fn to_bevy(value: campus_scene::glam::Vec3) -> Vec3 {
    Vec3::from_array(value.to_array())
}

fn setup_3d_scene(mut commands: Commands, toggles: Res<OverlayToggles>) {
    let focus = Vec3::ZERO;
    let transform = Transform::from_translation(OVERVIEW_CAMERA_POSITION).looking_at(focus, Vec3::Y);
    let orbit = OrbitCamera::from_transform(&transform, focus);
    commands.spawn((Camera3d::default(), transform, Viewer3dCamera, orbit));

    commands.insert_resource(GlobalAmbientLight {
        color: Color::WHITE,
        brightness: 400.0,
        affects_lightmapped_meshes: true,
    });
    commands.spawn((
        DirectionalLight {
            illuminance: 2_500.0,
            color: Color::srgb(0.74, 0.82, 0.92),
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(-40.0, 30.0, -50.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        DirectionalLight {
            illuminance: 12_000.0,
            shadows_enabled: toggles.show_sun,
            ..default()
        },
        Transform::from_xyz(50.0, 100.0, 50.0).looking_at(Vec3::ZERO, Vec3::Y),
        if toggles.show_sun {
            Visibility::Visible
        } else {
            Visibility::Hidden
        },
        SunLight,
    ));
}

fn sync_sun_light(
    toggles: Res<OverlayToggles>,
    mut lights: Query<(&mut DirectionalLight, &mut Visibility), With<SunLight>>,
) {
    if !toggles.is_changed() {
        return;
    }
    for (mut light, mut visibility) in &mut lights {
        light.shadows_enabled = toggles.show_sun;
        *visibility = if toggles.show_sun {
            Visibility::Visible
        } else {
            Visibility::Hidden
        };
    }
}

fn handle_scene_toggle_keys(
    keys: Res<ButtonInput<KeyCode>>,
    mut toggles: ResMut<OverlayToggles>,
) {
    if keys.just_pressed(KeyCode::KeyL) {
        toggles.show_labels = !toggles.show_labels;
    }
    if keys.just_pressed(KeyCode::KeyS) {
        toggles.show_sun = !toggles.show_sun;
    }
}

fn advance_session(time: Res<Time>, mut state: ResMut<CampusState>) {
    state.session.advance(time.delta_secs());
}

fn update_3d_viewport(
    windows: Query<&Window, With<bevy::window::PrimaryWindow>>,
    mut cameras: Query<&mut Camera, With<Viewer3dCamera>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let Ok(mut camera) = cameras.single_mut() else {
        return;
    };
    let physical_width = window.physical_width();
    let physical_height = window.physical_height();
    let panel_px = (UI_PANEL_WIDTH * window.scale_factor()).round() as u32;
    let width = physical_width.saturating_sub(panel_px).max(1);
    camera.viewport = Some(bevy::camera::Viewport {
        physical_position: UVec2::ZERO,
        physical_size: UVec2::new(width, physical_height.max(1)),
        depth: 0.0..1.0,
    });
}

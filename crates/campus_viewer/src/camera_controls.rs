use std::f32::consts::FRAC_PI_2;

use bevy::ecs::message::MessageReader;
use bevy::input::mouse::{MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_egui::EguiContexts;
use campus_scene::{CameraFraming, ViewMode};

use super::viewer_config::ViewerConfig;
use super::{to_bevy, CampusState, Viewer3dCamera, OVERVIEW_CAMERA_POSITION, UI_PANEL_WIDTH};

const ORBIT_ROTATE_SENSITIVITY: f32 = 0.005;
const ORBIT_PAN_SENSITIVITY: f32 = 0.0015;
const ORBIT_ZOOM_SENSITIVITY: f32 = 0.12;
/// Elevation above the horizon, equivalent to a polar range of PI/4..PI/2.3.
const MIN_ELEVATION: f32 = FRAC_PI_2 - std::f32::consts::PI / 2.3;
const MAX_ELEVATION: f32 = std::f32::consts::FRAC_PI_4;
const DETAIL_PENDING_EXTENT: f32 = 20.0;

#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub(super) struct OrbitCamera {
    pub focus: Vec3,
    pub radius: f32,
    pub yaw: f32,
    pub pitch: f32,
}

impl OrbitCamera {
    pub(super) fn from_transform(transform: &Transform, focus: Vec3) -> Self {
        let offset = transform.translation - focus;
        let radius = offset.length().max(0.1);
        let yaw = offset.x.atan2(offset.z);
        let pitch = offset.y.atan2((offset.x * offset.x + offset.z * offset.z).sqrt());
        Self {
            focus,
            radius,
            yaw,
            pitch,
        }
    }

    pub(super) fn offset(&self) -> Vec3 {
        let horizontal = self.radius * self.pitch.cos();
        Vec3::new(
            horizontal * self.yaw.sin(),
            self.radius * self.pitch.sin(),
            horizontal * self.yaw.cos(),
        )
    }

    pub(super) fn apply_to_transform(&self, transform: &mut Transform) {
        transform.translation = self.focus + self.offset();
        transform.look_at(self.focus, Vec3::Y);
    }

    fn clamp(&mut self, min_radius: f32, max_radius: f32) {
        self.radius = self.radius.clamp(min_radius, max_radius);
        self.pitch = self.pitch.clamp(MIN_ELEVATION, MAX_ELEVATION);
    }
}

#[derive(Resource, Default)]
pub(super) struct OrbitDragState {
    last_cursor_position: Option<Vec2>,
}

pub(super) fn orbit_camera_controls(
    windows: Query<&Window, With<PrimaryWindow>>,
    buttons: Res<ButtonInput<MouseButton>>,
    config: Res<ViewerConfig>,
    mut egui_contexts: EguiContexts,
    mut mouse_wheel: MessageReader<MouseWheel>,
    mut drag_state: ResMut<OrbitDragState>,
    mut query: Query<(&mut OrbitCamera, &mut Transform), With<Viewer3dCamera>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let cursor_position = window.cursor_position();
    let pointer_over_ui = egui_contexts
        .ctx_mut()
        .ok()
        .map(|ctx| ctx.is_pointer_over_area())
        .unwrap_or(false);
    let cursor_in_3d = !pointer_over_ui
        && cursor_position
            .map(|cursor| cursor_in_3d_view(window, cursor))
            .unwrap_or(false);

    let rotate_drag = buttons.pressed(MouseButton::Left);
    let pan_drag = buttons.pressed(MouseButton::Right) || buttons.pressed(MouseButton::Middle);
    let dragging = cursor_in_3d && (rotate_drag || pan_drag);
    let (delta, next_cursor) =
        drag_delta(drag_state.last_cursor_position, cursor_position, dragging);
    drag_state.last_cursor_position = next_cursor;

    let mut scroll = 0.0;
    for event in mouse_wheel.read() {
        if cursor_in_3d {
            scroll += normalized_mouse_wheel_delta(event.unit, event.y);
        }
    }
    if delta == Vec2::ZERO && scroll == 0.0 {
        return;
    }

    let Ok((mut orbit, mut transform)) = query.single_mut() else {
        return;
    };
    let changed = apply_orbit_input(
        &mut orbit,
        delta,
        scroll,
        rotate_drag && dragging,
        pan_drag && !rotate_drag && dragging,
        config.camera.min_radius,
        config.camera.max_radius,
    );
    if changed {
        orbit.apply_to_transform(&mut transform);
    }
}

/// Consumes camera requests raised by the session: the one-shot reset after a
/// view-mode switch and the framing produced when a detail model lands.
pub(super) fn apply_camera_requests(
    config: Res<ViewerConfig>,
    mut state: ResMut<CampusState>,
    mut query: Query<(&mut OrbitCamera, &mut Transform), With<Viewer3dCamera>>,
) {
    let reset = state.session.take_camera_reset();
    let framing = state.session.take_camera_framing();
    if !reset && framing.is_none() {
        return;
    }
    let Ok((mut orbit, mut transform)) = query.single_mut() else {
        return;
    };
    let next = match (framing, state.session.mode()) {
        (Some(framing), _) => orbit_for_framing(&framing),
        (None, ViewMode::Overview) => OrbitCamera::from_transform(
            &Transform::from_translation(OVERVIEW_CAMERA_POSITION),
            Vec3::ZERO,
        ),
        (None, ViewMode::Detail { .. }) => orbit_for_framing(&CameraFraming::for_size(
            campus_scene::glam::Vec3::splat(DETAIL_PENDING_EXTENT),
        )),
    };
    *orbit = next;
    orbit.clamp(config.camera.min_radius, config.camera.max_radius);
    orbit.apply_to_transform(&mut transform);
}

pub(super) fn orbit_for_framing(framing: &CameraFraming) -> OrbitCamera {
    OrbitCamera::from_transform(
        &Transform::from_translation(to_bevy(framing.position)),
        to_bevy(framing.target),
    )
}

pub(super) fn cursor_in_3d_view(window: &Window, cursor: Vec2) -> bool {
    let viewport_width = (window.width() - UI_PANEL_WIDTH).max(0.0);
    cursor.x <= viewport_width
}

fn drag_delta(
    previous: Option<Vec2>,
    current: Option<Vec2>,
    dragging: bool,
) -> (Vec2, Option<Vec2>) {
    if !dragging {
        return (Vec2::ZERO, None);
    }
    let Some(cursor) = current else {
        return (Vec2::ZERO, None);
    };
    let delta = previous.map(|last| cursor - last).unwrap_or(Vec2::ZERO);
    (delta, Some(cursor))
}

fn normalized_mouse_wheel_delta(unit: MouseScrollUnit, y: f32) -> f32 {
    match unit {
        MouseScrollUnit::Line => y,
        MouseScrollUnit::Pixel => y / MouseScrollUnit::SCROLL_UNIT_CONVERSION_FACTOR,
    }
}

fn apply_orbit_input(
    orbit: &mut OrbitCamera,
    delta: Vec2,
    scroll: f32,
    rotate: bool,
    pan: bool,
    min_radius: f32,
    max_radius: f32,
) -> bool {
    let mut changed = false;
    if rotate && delta != Vec2::ZERO {
        orbit.yaw -= delta.x * ORBIT_ROTATE_SENSITIVITY;
        orbit.pitch += delta.y * ORBIT_ROTATE_SENSITIVITY;
        changed = true;
    }
    if pan && delta != Vec2::ZERO {
        let forward = -orbit.offset().normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward).normalize_or_zero();
        let scale = orbit.radius * ORBIT_PAN_SENSITIVITY;
        orbit.focus += (-right * delta.x + up * delta.y) * scale;
        changed = true;
    }
    if scroll != 0.0 {
        orbit.radius *= 1.0 - scroll * ORBIT_ZOOM_SENSITIVITY;
        changed = true;
    }
    if changed {
        orbit.clamp(min_radius, max_radius);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overview_orbit() -> OrbitCamera {
        OrbitCamera::from_transform(
            &Transform::from_translation(OVERVIEW_CAMERA_POSITION),
            Vec3::ZERO,
        )
    }

    #[test]
    fn from_transform_round_trips_position() {
        let orbit = overview_orbit();
        let mut transform = Transform::default();
        orbit.apply_to_transform(&mut transform);
        assert!((transform.translation - OVERVIEW_CAMERA_POSITION).length() < 1e-3);
    }

    #[test]
    fn drag_delta_requires_active_dragging() {
        let current = Vec2::new(40.0, 20.0);
        let (delta, next_cursor) = drag_delta(Some(Vec2::new(10.0, 10.0)), Some(current), false);
        assert_eq!(delta, Vec2::ZERO);
        assert_eq!(next_cursor, None);
        let (delta, next_cursor) = drag_delta(Some(Vec2::new(10.0, 10.0)), Some(current), true);
        assert_eq!(delta, Vec2::new(30.0, 10.0));
        assert_eq!(next_cursor, Some(current));
    }

    #[test]
    fn zoom_respects_radius_limits() {
        let mut orbit = overview_orbit();
        assert!(apply_orbit_input(&mut orbit, Vec2::ZERO, 100.0, false, false, 20.0, 500.0));
        assert!((orbit.radius - 20.0).abs() < f32::EPSILON);
        apply_orbit_input(&mut orbit, Vec2::ZERO, -1000.0, false, false, 20.0, 500.0);
        assert!((orbit.radius - 500.0).abs() < f32::EPSILON);
    }

    #[test]
    fn rotation_keeps_camera_above_ground() {
        let mut orbit = overview_orbit();
        apply_orbit_input(&mut orbit, Vec2::new(0.0, -10_000.0), 0.0, true, false, 2.0, 500.0);
        assert!(orbit.offset().y > 0.0);
        apply_orbit_input(&mut orbit, Vec2::new(0.0, 10_000.0), 0.0, true, false, 2.0, 500.0);
        assert!((orbit.pitch - MAX_ELEVATION).abs() < f32::EPSILON);
    }

    #[test]
    fn pan_moves_focus_not_radius() {
        let mut orbit = overview_orbit();
        let radius = orbit.radius;
        apply_orbit_input(&mut orbit, Vec2::new(50.0, 0.0), 0.0, false, true, 2.0, 500.0);
        assert!(orbit.focus.length() > 0.0);
        assert!((orbit.radius - radius).abs() < 1e-4);
    }

    #[test]
    fn framing_orbit_looks_at_target() {
        let framing = CameraFraming::for_size(campus_scene::glam::Vec3::new(40.0, 10.0, 20.0));
        let orbit = orbit_for_framing(&framing);
        assert_eq!(orbit.focus, Vec3::ZERO);
        assert!((orbit.radius - to_bevy(framing.position).length()).abs() < 1e-3);
    }
}

use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_egui::EguiContexts;
use campus_scene::{PickEvent, PickOutcome, Ray};

use super::camera_controls::cursor_in_3d_view;
use super::{to_core, CampusState, Viewer3dCamera};

/// Cursor travel between press and release above which a left click is
/// treated as an orbit drag rather than a pick.
const CLICK_DRAG_TOLERANCE_PX: f32 = 5.0;

#[derive(Resource, Default)]
pub(super) struct ClickTracker {
    press_position: Option<Vec2>,
}

pub(super) fn pick_on_click(
    windows: Query<&Window, With<PrimaryWindow>>,
    buttons: Res<ButtonInput<MouseButton>>,
    mut egui_contexts: EguiContexts,
    cameras: Query<(&Camera, &GlobalTransform), With<Viewer3dCamera>>,
    mut tracker: ResMut<ClickTracker>,
    mut state: ResMut<CampusState>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let cursor = window.cursor_position();

    if buttons.just_pressed(MouseButton::Left) {
        let pointer_over_ui = egui_contexts
            .ctx_mut()
            .ok()
            .map(|ctx| ctx.is_pointer_over_area())
            .unwrap_or(false);
        tracker.press_position =
            cursor.filter(|cursor| !pointer_over_ui && cursor_in_3d_view(window, *cursor));
    }
    if !buttons.just_released(MouseButton::Left) {
        return;
    }
    let Some(pressed_at) = tracker.press_position.take() else {
        return;
    };
    let Some(cursor) = cursor else {
        return;
    };
    if !is_click(pressed_at, cursor) {
        return;
    }
    let Ok((camera, camera_transform)) = cameras.single() else {
        return;
    };
    let Ok(ray) = camera.viewport_to_world(camera_transform, cursor) else {
        return;
    };
    dispatch_pick(
        &mut state,
        Ray::new(to_core(ray.origin), to_core(*ray.direction)),
    );
}

/// Routes a ray to the live scene: a hit becomes a pick event, a miss clears
/// the live selection.
pub(super) fn dispatch_pick(state: &mut CampusState, ray: Ray) {
    match state.session.raycast(&ray) {
        Some(hit) => {
            let outcome = state.session.handle_pick(PickEvent {
                object: hit.node,
                point: hit.point,
            });
            match outcome {
                PickOutcome::Selected(record) => debug!("selected {}", record.name),
                PickOutcome::Ignored(reason) => debug!("pick ignored: {reason:?}"),
            }
        }
        None => {
            if state.session.clear_selection() {
                debug!("pick missed, selection cleared");
            }
        }
    }
}

fn is_click(pressed_at: Vec2, released_at: Vec2) -> bool {
    pressed_at.distance(released_at) <= CLICK_DRAG_TOLERANCE_PX
}

pub(super) fn handle_escape_key(keys: Res<ButtonInput<KeyCode>>, mut state: ResMut<CampusState>) {
    if keys.just_pressed(KeyCode::Escape) && state.session.handle_escape() {
        debug!("selection cleared by escape");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_cursor_travel_counts_as_click() {
        assert!(is_click(Vec2::new(100.0, 100.0), Vec2::new(103.0, 102.0)));
        assert!(!is_click(Vec2::new(100.0, 100.0), Vec2::new(130.0, 100.0)));
    }
}

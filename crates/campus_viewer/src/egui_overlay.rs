use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_egui::{egui, EguiContexts};
use campus_scene::{LabelKind, ScreenLabel};

use super::viewer_config::ViewerConfig;
use super::{to_bevy, CampusState, LoadProgress, OverlayToggles, Viewer3dCamera, UI_PANEL_WIDTH};

const LABEL_FONT_SIZE: f32 = 13.0;
const LOADING_BAR_WIDTH: f32 = 260.0;

pub(super) fn loading_text(percent: u8) -> String {
    format!("Loading scene... {percent}%")
}

pub(super) fn render_loading_overlay(
    mut contexts: EguiContexts,
    state: Res<CampusState>,
    progress: Res<LoadProgress>,
) {
    if progress.is_complete() || state.session.overview_error().is_some() {
        return;
    }
    let Ok(context) = contexts.ctx_mut() else {
        return;
    };
    egui::Area::new(egui::Id::new("campus-loading-bar"))
        .anchor(egui::Align2::CENTER_CENTER, egui::vec2(-UI_PANEL_WIDTH * 0.5, 0.0))
        .interactable(false)
        .show(context, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.label(loading_text(progress.percent));
                ui.add(
                    egui::ProgressBar::new(f32::from(progress.percent) / 100.0)
                        .desired_width(LOADING_BAR_WIDTH),
                );
            });
        });
}

pub(super) fn render_label_overlay(
    mut contexts: EguiContexts,
    state: Res<CampusState>,
    toggles: Res<OverlayToggles>,
    config: Res<ViewerConfig>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<Viewer3dCamera>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let Ok((camera, camera_transform)) = cameras.single() else {
        return;
    };
    let viewport_width = (window.width() - UI_PANEL_WIDTH).max(0.0);
    let labels = state
        .session
        .screen_labels(toggles.show_labels, config.debug, |point| {
            let screen = camera
                .world_to_viewport(camera_transform, to_bevy(point))
                .ok()?;
            (screen.x >= 0.0 && screen.x <= viewport_width)
                .then(|| campus_scene::glam::Vec2::new(screen.x, screen.y))
        });
    if labels.is_empty() {
        return;
    }
    let Ok(context) = contexts.ctx_mut() else {
        return;
    };
    let layer = egui::LayerId::new(egui::Order::Background, egui::Id::new("campus-labels"));
    let painter = context.layer_painter(layer);
    for label in &labels {
        paint_label(&painter, label);
    }
}

fn paint_label(painter: &egui::Painter, label: &ScreenLabel) {
    let position = egui::pos2(label.screen.x, label.screen.y);
    let font = egui::FontId::proportional(LABEL_FONT_SIZE);
    let galley = painter.layout_no_wrap(label.text.clone(), font, label_color(label.kind));
    let rect = egui::Align2::CENTER_BOTTOM
        .anchor_size(position, galley.size())
        .expand(4.0);
    painter.rect_filled(rect, 3.0, egui::Color32::from_black_alpha(150));
    painter.galley(rect.min + egui::vec2(4.0, 4.0), galley, egui::Color32::WHITE);
}

fn label_color(kind: LabelKind) -> egui::Color32 {
    match kind {
        LabelKind::Building => egui::Color32::WHITE,
        LabelKind::Room => egui::Color32::from_rgb(0x87, 0xce, 0xfa),
        LabelKind::Notice => egui::Color32::from_rgb(0xff, 0xb0, 0x4a),
    }
}

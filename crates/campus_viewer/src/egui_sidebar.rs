use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};
use campus_scene::classify::{building_code, format_room_name};
use campus_scene::selection::{BuildingData, RoomData};
use campus_scene::metadata::Metadata;
use campus_scene::{DetailStatus, SelectionRecord, ViewMode};

use super::viewer_commands::{ViewerCommand, ViewerCommandQueue};
use super::{CampusState, OverlayToggles, UI_PANEL_WIDTH};

pub(super) const NO_METADATA_TEXT: &str = "No data available for this building.";

#[derive(Resource, Default)]
pub(super) struct SidebarState {
    pub collapsed: bool,
}

#[derive(SystemParam)]
pub(super) struct SidebarParams<'w> {
    state: Res<'w, CampusState>,
    toggles: Res<'w, OverlayToggles>,
    sidebar: ResMut<'w, SidebarState>,
    commands: ResMut<'w, ViewerCommandQueue>,
}

pub(super) fn render_sidebar_egui(mut contexts: EguiContexts, params: SidebarParams) {
    let SidebarParams {
        state,
        toggles,
        mut sidebar,
        mut commands,
    } = params;
    let Ok(context) = contexts.ctx_mut() else {
        return;
    };

    egui::SidePanel::right("campus-sidebar")
        .resizable(false)
        .exact_width(UI_PANEL_WIDTH)
        .show(context, |ui| {
            ui.spacing_mut().item_spacing = egui::vec2(6.0, 6.0);
            ui.horizontal_wrapped(|ui| {
                let toggle_label = if sidebar.collapsed { "Expand" } else { "Collapse" };
                if ui.button(toggle_label).clicked() {
                    sidebar.collapsed = !sidebar.collapsed;
                }
                let mut show_labels = toggles.show_labels;
                if ui.checkbox(&mut show_labels, "Labels (L)").changed() {
                    commands.push(ViewerCommand::ToggleLabels);
                }
                let mut show_sun = toggles.show_sun;
                if ui.checkbox(&mut show_sun, "Sun (S)").changed() {
                    commands.push(ViewerCommand::ToggleSun);
                }
            });
            if sidebar.collapsed {
                return;
            }
            ui.separator();

            let session = &state.session;
            if let Some(error) = session.overview_error() {
                ui.colored_label(egui::Color32::LIGHT_RED, format!("Scene failed to load: {error}"));
            }
            if let Some(error) = session.metadata().error() {
                ui.colored_label(egui::Color32::YELLOW, format!("Metadata unavailable: {error}"));
            }

            let displayed = session.feed().displayed();
            egui::ScrollArea::vertical().show(ui, |ui| match session.mode() {
                ViewMode::Overview => {
                    render_overview_section(ui, displayed, &mut commands);
                }
                ViewMode::Detail { building_id } => {
                    render_detail_section(
                        ui,
                        building_id,
                        session.detail().status(),
                        session.detail().show_loading_indicator(),
                        displayed,
                        &mut commands,
                    );
                }
            });
        });
}

fn render_overview_section(
    ui: &mut egui::Ui,
    record: Option<&SelectionRecord>,
    commands: &mut ViewerCommandQueue,
) {
    let Some((record, building)) = record.and_then(|record| Some((record, record.building()?)))
    else {
        ui.label("Click a building to see its details.");
        return;
    };
    ui.heading(building_code(&record.name).unwrap_or_else(|| record.name.clone()));
    render_building_metadata(ui, building);

    if let Some(object_id) = building.object_id.as_deref() {
        ui.separator();
        if ui.button(detail_button_label(object_id)).clicked() {
            commands.push(ViewerCommand::EnterDetail(object_id.to_string()));
        }
    }
}

fn render_building_metadata(ui: &mut egui::Ui, building: &BuildingData) {
    let Some(metadata) = building.model_data.as_ref() else {
        ui.label(NO_METADATA_TEXT);
        return;
    };
    ui.strong(metadata_title(metadata));
    if let Some(description) = metadata
        .description
        .as_deref()
        .filter(|description| !description.is_empty())
    {
        ui.add(egui::Label::new(description).wrap());
    }
    if let Some(status) = metadata.status.as_deref() {
        ui.label(format!("Status: {status}"));
    }
    if metadata.specs.is_empty() {
        return;
    }
    ui.collapsing("Specs", |ui| {
        egui::Grid::new("campus-building-specs")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                for (key, value) in &metadata.specs {
                    ui.label(key);
                    ui.label(value);
                    ui.end_row();
                }
            });
    });
}

fn render_detail_section(
    ui: &mut egui::Ui,
    building_id: &str,
    status: DetailStatus,
    loading: bool,
    record: Option<&SelectionRecord>,
    commands: &mut ViewerCommandQueue,
) {
    ui.heading(format!("Building AR{building_id}"));
    if loading {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("Loading detail model...");
        });
    }
    if status == DetailStatus::Failed {
        ui.colored_label(egui::Color32::YELLOW, "Model not available, showing placeholder.");
    }
    if ui.button("Return to Overview").clicked() {
        commands.push(ViewerCommand::ReturnToOverview);
    }
    ui.separator();

    match record.and_then(|record| Some((record, record.room()?))) {
        Some((record, room)) => render_room_details(ui, record, room),
        None => {
            ui.label("Click a room to see its details.");
        }
    }
}

fn render_room_details(ui: &mut egui::Ui, record: &SelectionRecord, room: &RoomData) {
    ui.strong(format_room_name(&record.name));
    egui::Grid::new("campus-room-details")
        .num_columns(2)
        .show(ui, |ui| {
            for (label, value) in room_rows(record, room) {
                ui.label(label);
                ui.label(value);
                ui.end_row();
            }
        });
}

pub(super) fn metadata_title(metadata: &Metadata) -> &str {
    metadata.name.as_deref().unwrap_or("-")
}

pub(super) fn detail_button_label(object_id: &str) -> String {
    format!("See AR{object_id} Detail")
}

pub(super) fn room_rows(record: &SelectionRecord, room: &RoomData) -> Vec<(&'static str, String)> {
    let position = &record.position;
    vec![
        ("Room ID", room.room_id.clone()),
        ("Building", format!("AR{}", room.building_id)),
        ("Type", room.room_type.clone()),
        ("Floor", room.floor.clone()),
        ("Capacity", room.capacity.clone()),
        (
            "Position",
            format!("{:.1}, {:.1}, {:.1}", position.x, position.y, position.z),
        ),
    ]
}

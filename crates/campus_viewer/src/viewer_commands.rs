use bevy::prelude::*;
use campus_scene::{DetailRequest, LoadError};

use super::scene_loading::{complete_detail_load, PendingDetailLoad};
use super::scene_mirror::{MirrorKind, SceneWriter};
use super::{CampusState, OverlayToggles};

/// Requests raised by the UI layer; applied once per frame in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum ViewerCommand {
    EnterDetail(String),
    ReturnToOverview,
    ToggleLabels,
    ToggleSun,
}

#[derive(Resource, Default)]
pub(super) struct ViewerCommandQueue {
    pending: Vec<ViewerCommand>,
}

impl ViewerCommandQueue {
    pub(super) fn push(&mut self, command: ViewerCommand) {
        self.pending.push(command);
    }

    pub(super) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

pub(super) fn apply_viewer_commands(
    mut queue: ResMut<ViewerCommandQueue>,
    asset_server: Option<Res<AssetServer>>,
    mut state: ResMut<CampusState>,
    mut pending: ResMut<PendingDetailLoad>,
    mut toggles: ResMut<OverlayToggles>,
    mut writer: SceneWriter,
) {
    if queue.is_empty() {
        return;
    }
    for command in std::mem::take(&mut queue.pending) {
        match command {
            ViewerCommand::EnterDetail(building_id) => {
                let DetailRequest::Started { ticket, disposed } =
                    state.session.enter_detail(&building_id)
                else {
                    continue;
                };
                writer.despawn(MirrorKind::Detail, &disposed);
                match asset_server.as_deref() {
                    Some(asset_server) => pending.begin(asset_server, ticket),
                    None => {
                        pending.cancel();
                        complete_detail_load(
                            &mut state,
                            &mut writer,
                            &ticket,
                            Err(LoadError::Asset("asset server unavailable".to_string())),
                        );
                    }
                }
            }
            ViewerCommand::ReturnToOverview => {
                pending.cancel();
                let disposed = state.session.return_to_overview();
                writer.despawn(MirrorKind::Detail, &disposed);
            }
            ViewerCommand::ToggleLabels => toggles.show_labels = !toggles.show_labels,
            ViewerCommand::ToggleSun => toggles.show_sun = !toggles.show_sun,
        }
    }
}

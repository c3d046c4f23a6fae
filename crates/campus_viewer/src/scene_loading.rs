use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Mutex;
use std::thread;

use bevy::asset::LoadState;
use bevy::gltf::{Gltf, GltfMesh, GltfNode};
use bevy::prelude::*;
use campus_scene::{
    CompletionOutcome, LoadError, LoadTicket, MetadataDictionary, MetadataState,
};

use super::gltf_import::{import_gltf, GltfSources, ImportedScene};
use super::scene_mirror::{MirrorKind, SceneWriter};
use super::viewer_config::ViewerConfig;
use super::{CampusState, LoadProgress, MetadataChannel};

#[derive(Resource, Default)]
pub(super) struct OverviewAsset {
    handle: Option<Handle<Gltf>>,
}

/// The detail model currently being decoded. A newer request replaces the
/// handle; the engine's ticket check discards anything that still arrives late.
#[derive(Resource, Default)]
pub(super) struct PendingDetailLoad {
    load: Option<(LoadTicket, Handle<Gltf>)>,
}

impl PendingDetailLoad {
    pub(super) fn begin(&mut self, asset_server: &AssetServer, ticket: LoadTicket) {
        let handle = asset_server.load::<Gltf>(ticket.path.clone());
        self.load = Some((ticket, handle));
    }

    pub(super) fn cancel(&mut self) {
        self.load = None;
    }
}

/// Resolves the directory bevy's asset server reads from, so the metadata file
/// is found next to the models regardless of the working directory.
pub(super) fn asset_base_path() -> PathBuf {
    if let Ok(root) = std::env::var("BEVY_ASSET_ROOT") {
        return PathBuf::from(root);
    }
    if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
        return PathBuf::from(manifest_dir);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_default()
}

pub(super) fn spawn_metadata_fetch(path: PathBuf) -> MetadataChannel {
    let (tx, rx) = mpsc::channel::<Result<MetadataDictionary, LoadError>>();
    thread::spawn(move || {
        let _ = tx.send(MetadataDictionary::load(&path));
    });
    MetadataChannel { rx: Mutex::new(rx) }
}

pub(super) fn start_scene_loads(
    mut commands: Commands,
    config: Res<ViewerConfig>,
    asset_server: Res<AssetServer>,
    mut overview: ResMut<OverviewAsset>,
) {
    info!("loading overview scene {}", config.scene_path);
    overview.handle = Some(asset_server.load::<Gltf>(config.scene_path.clone()));
    let metadata_path = config.metadata_file(&asset_base_path());
    info!("loading metadata {}", metadata_path.display());
    commands.insert_resource(spawn_metadata_fetch(metadata_path));
}

pub(super) fn poll_metadata(
    channel: Option<Res<MetadataChannel>>,
    mut state: ResMut<CampusState>,
) {
    let Some(channel) = channel else {
        return;
    };
    if state.session.metadata().is_settled() {
        return;
    }
    let receiver = match channel.rx.lock() {
        Ok(receiver) => receiver,
        Err(_) => {
            state
                .session
                .set_metadata(MetadataState::Failed("metadata receiver poisoned".to_string()));
            return;
        }
    };
    match receiver.try_recv() {
        Ok(result) => {
            if let Err(err) = &result {
                warn!("metadata unavailable, continuing without it: {err}");
            }
            state.session.set_metadata(MetadataState::from_result(result));
        }
        Err(TryRecvError::Empty) => {}
        Err(TryRecvError::Disconnected) => {
            state
                .session
                .set_metadata(MetadataState::Failed("metadata loader stopped".to_string()));
        }
    }
}

pub(super) fn import_overview_scene(
    asset_server: Res<AssetServer>,
    gltfs: Res<Assets<Gltf>>,
    gltf_nodes: Res<Assets<GltfNode>>,
    gltf_meshes: Res<Assets<GltfMesh>>,
    mut overview: ResMut<OverviewAsset>,
    mut state: ResMut<CampusState>,
    mut progress: ResMut<LoadProgress>,
    mut writer: SceneWriter,
) {
    let Some(handle) = overview.handle.as_ref() else {
        return;
    };
    match asset_server.load_state(handle) {
        LoadState::Loaded => {}
        LoadState::Failed(err) => {
            state.session.overview_failed(err.to_string());
            progress.percent = 100;
            overview.handle = None;
            return;
        }
        _ => return,
    }
    let Some(gltf) = gltfs.get(handle) else {
        return;
    };
    let imported = import_gltf(
        gltf,
        &GltfSources {
            nodes: &gltf_nodes,
            meshes: &gltf_meshes,
            mesh_data: writer.meshes(),
            materials: writer.materials(),
        },
    );
    overview.handle = None;

    match imported {
        Ok(ImportedScene { mut graph, meshes }) => {
            let disposed = state.session.teardown_overview();
            writer.despawn(MirrorKind::Overview, &disposed);
            writer.spawn(&mut graph, MirrorKind::Overview, meshes);
            state.session.install_overview(graph);
        }
        Err(err) => {
            state.session.overview_failed(err);
            progress.percent = 100;
        }
    }
}

pub(super) fn run_scene_initializer(
    mut state: ResMut<CampusState>,
    mut progress: ResMut<LoadProgress>,
) {
    if state.session.is_ready() {
        return;
    }
    if state
        .session
        .poll_initializer(|percent| progress.percent = percent)
    {
        info!("campus scene ready");
    }
}

pub(super) fn poll_detail_load(
    asset_server: Res<AssetServer>,
    gltfs: Res<Assets<Gltf>>,
    gltf_nodes: Res<Assets<GltfNode>>,
    gltf_meshes: Res<Assets<GltfMesh>>,
    mut pending: ResMut<PendingDetailLoad>,
    mut state: ResMut<CampusState>,
    mut writer: SceneWriter,
) {
    let Some((_, handle)) = pending.load.as_ref() else {
        return;
    };
    let result = match asset_server.load_state(handle) {
        LoadState::Loaded => {
            let Some(gltf) = gltfs.get(handle) else {
                return;
            };
            import_gltf(
                gltf,
                &GltfSources {
                    nodes: &gltf_nodes,
                    meshes: &gltf_meshes,
                    mesh_data: writer.meshes(),
                    materials: writer.materials(),
                },
            )
            .map_err(LoadError::Asset)
        }
        LoadState::Failed(err) => Err(LoadError::Asset(err.to_string())),
        _ => return,
    };
    let Some((ticket, _)) = pending.load.take() else {
        return;
    };
    complete_detail_load(&mut state, &mut writer, &ticket, result);
}

/// Hands a finished detail load to the engine and mirrors whatever it
/// installed, the decoded model or the placeholder.
pub(super) fn complete_detail_load(
    state: &mut CampusState,
    writer: &mut SceneWriter,
    ticket: &LoadTicket,
    result: Result<ImportedScene, LoadError>,
) {
    let (graph, meshes) = match result {
        Ok(imported) => (Ok(imported.graph), imported.meshes),
        Err(err) => (Err(err), HashMap::new()),
    };
    match state.session.complete_detail_load(ticket, graph) {
        CompletionOutcome::Installed { .. } | CompletionOutcome::Placeholder { .. } => {
            if let Some(scene) = state.session.detail_scene_mut() {
                writer.spawn(scene, MirrorKind::Detail, meshes);
            }
        }
        CompletionOutcome::Stale { .. } => writer.discard_meshes(meshes),
    }
}

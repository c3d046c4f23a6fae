//! ECS mirror of the engine's scene graphs: one entity per mesh node, with
//! materials kept in step with the engine's drained material changes.

use std::collections::HashMap;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use campus_scene::{
    DisposedResources, GeometryId, GeometryShape, MaterialChanges, NodeId, SceneGraph, SceneId,
};

use super::gltf_import::transform_from_affine;
use super::material_library::MaterialLibrary;
use super::CampusState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum MirrorKind {
    Overview,
    Detail,
}

#[derive(Component)]
pub(super) struct MirrorRoot(pub MirrorKind);

#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct SceneNodeRef {
    pub scene: SceneId,
    pub node: NodeId,
}

#[derive(Default)]
pub(super) struct SceneMirror {
    root: Option<Entity>,
    scene: Option<SceneId>,
    nodes: HashMap<NodeId, Entity>,
    meshes: HashMap<GeometryId, Handle<Mesh>>,
}

impl SceneMirror {
    pub(super) fn scene(&self) -> Option<SceneId> {
        self.scene
    }

    pub(super) fn entity(&self, node: NodeId) -> Option<Entity> {
        self.nodes.get(&node).copied()
    }

    pub(super) fn entity_count(&self) -> usize {
        self.nodes.len()
    }
}

#[derive(Resource, Default)]
pub(super) struct SceneMirrors {
    pub overview: SceneMirror,
    pub detail: SceneMirror,
}

impl SceneMirrors {
    pub(super) fn get_mut(&mut self, kind: MirrorKind) -> &mut SceneMirror {
        match kind {
            MirrorKind::Overview => &mut self.overview,
            MirrorKind::Detail => &mut self.detail,
        }
    }
}

pub(super) struct MirrorAssets<'a> {
    pub meshes: &'a mut Assets<Mesh>,
    pub materials: &'a mut Assets<StandardMaterial>,
    pub library: &'a mut MaterialLibrary,
}

/// Spawns one entity per mesh node with its world transform baked in.
/// `imported` maps geometry ids to mesh handles decoded from the source asset.
pub(super) fn spawn_scene_mirror(
    commands: &mut Commands,
    scene: &mut SceneGraph,
    kind: MirrorKind,
    imported: HashMap<GeometryId, Handle<Mesh>>,
    assets: &mut MirrorAssets,
) -> SceneMirror {
    let root = commands
        .spawn((
            Transform::default(),
            Visibility::default(),
            MirrorRoot(kind),
            Name::new(format!("{kind:?} scene")),
        ))
        .id();
    let mut mirror = SceneMirror {
        root: Some(root),
        scene: Some(scene.id()),
        nodes: HashMap::new(),
        meshes: imported,
    };

    for node_id in scene.meshes() {
        let Some(node) = scene.node(node_id) else {
            continue;
        };
        let Some(geometry_id) = node.geometry() else {
            continue;
        };
        let mesh = match mirror.meshes.get(&geometry_id) {
            Some(handle) => handle.clone(),
            None => match scene.geometry(geometry_id).map(|geometry| geometry.shape) {
                Some(GeometryShape::Cuboid { size }) => {
                    let handle = assets.meshes.add(Cuboid::new(size.x, size.y, size.z));
                    mirror.meshes.insert(geometry_id, handle.clone());
                    handle
                }
                _ => {
                    warn!("no mesh data for node '{}'", node.name());
                    continue;
                }
            },
        };
        let material = node
            .material()
            .map(|instance| assets.library.handle_for(instance, assets.materials))
            .unwrap_or_default();
        let entity = commands
            .spawn((
                Mesh3d(mesh),
                MeshMaterial3d(material),
                transform_from_affine(&scene.world_transform(node_id)),
                SceneNodeRef {
                    scene: scene.id(),
                    node: node_id,
                },
                Name::new(node.name().to_string()),
            ))
            .id();
        commands.entity(root).add_child(entity);
        mirror.nodes.insert(node_id, entity);
    }

    // Everything assigned so far is already reflected in the spawned entities.
    let changes = scene.take_material_changes();
    for id in changes.released {
        assets.library.release(id, assets.materials);
    }
    mirror
}

/// Despawns the mirror and frees the GPU resources the engine reported.
pub(super) fn despawn_scene_mirror(
    commands: &mut Commands,
    mirror: &mut SceneMirror,
    disposed: &DisposedResources,
    assets: &mut MirrorAssets,
) {
    if let Some(root) = mirror.root.take() {
        commands.entity(root).despawn();
    }
    for material in &disposed.materials {
        assets.library.release(*material, assets.materials);
    }
    for (_, handle) in mirror.meshes.drain() {
        assets.meshes.remove(&handle);
    }
    mirror.nodes.clear();
    mirror.scene = None;
    debug!("{} gpu materials live after teardown", assets.library.len());
}

pub(super) fn apply_material_changes(
    commands: &mut Commands,
    mirror: &SceneMirror,
    scene: &SceneGraph,
    changes: MaterialChanges,
    assets: &mut MirrorAssets,
) {
    for node_id in changes.assigned {
        let (Some(entity), Some(instance)) = (
            mirror.entity(node_id),
            scene.node(node_id).and_then(|node| node.material()),
        ) else {
            continue;
        };
        let handle = assets.library.handle_for(instance, assets.materials);
        commands.entity(entity).insert(MeshMaterial3d(handle));
    }
    for id in changes.released {
        assets.library.release(id, assets.materials);
    }
}

/// Everything a system needs to create, update or tear down a mirror.
#[derive(SystemParam)]
pub(super) struct SceneWriter<'w, 's> {
    commands: Commands<'w, 's>,
    mirrors: ResMut<'w, SceneMirrors>,
    library: ResMut<'w, MaterialLibrary>,
    meshes: ResMut<'w, Assets<Mesh>>,
    materials: ResMut<'w, Assets<StandardMaterial>>,
}

impl SceneWriter<'_, '_> {
    pub(super) fn meshes(&self) -> &Assets<Mesh> {
        &self.meshes
    }

    pub(super) fn materials(&self) -> &Assets<StandardMaterial> {
        &self.materials
    }

    pub(super) fn spawn(
        &mut self,
        scene: &mut SceneGraph,
        kind: MirrorKind,
        imported: HashMap<GeometryId, Handle<Mesh>>,
    ) {
        let mut assets = MirrorAssets {
            meshes: &mut *self.meshes,
            materials: &mut *self.materials,
            library: &mut *self.library,
        };
        let mirror = spawn_scene_mirror(&mut self.commands, scene, kind, imported, &mut assets);
        info!("{kind:?} mirror spawned with {} entities", mirror.entity_count());
        *self.mirrors.get_mut(kind) = mirror;
    }

    pub(super) fn despawn(&mut self, kind: MirrorKind, disposed: &DisposedResources) {
        let mut assets = MirrorAssets {
            meshes: &mut *self.meshes,
            materials: &mut *self.materials,
            library: &mut *self.library,
        };
        despawn_scene_mirror(
            &mut self.commands,
            self.mirrors.get_mut(kind),
            disposed,
            &mut assets,
        );
    }

    /// Drops mesh data decoded for a scene that was never mirrored.
    pub(super) fn discard_meshes(&mut self, imported: HashMap<GeometryId, Handle<Mesh>>) {
        for handle in imported.into_values() {
            self.meshes.remove(&handle);
        }
    }

    fn sync(&mut self, kind: MirrorKind, scene: &mut SceneGraph) {
        let changes = scene.take_material_changes();
        let mirror = match kind {
            MirrorKind::Overview => &self.mirrors.overview,
            MirrorKind::Detail => &self.mirrors.detail,
        };
        if changes.is_empty() || mirror.scene() != Some(scene.id()) {
            return;
        }
        let mut assets = MirrorAssets {
            meshes: &mut *self.meshes,
            materials: &mut *self.materials,
            library: &mut *self.library,
        };
        apply_material_changes(&mut self.commands, mirror, scene, changes, &mut assets);
    }
}

pub(super) fn sync_material_changes(mut state: ResMut<CampusState>, mut writer: SceneWriter) {
    if let Some(scene) = state.session.overview_scene_mut() {
        writer.sync(MirrorKind::Overview, scene);
    }
    if let Some(scene) = state.session.detail_scene_mut() {
        writer.sync(MirrorKind::Detail, scene);
    }
}

/// Only the live view's scene is shown.
pub(super) fn sync_mirror_visibility(
    state: Res<CampusState>,
    mut roots: Query<(&MirrorRoot, &mut Visibility)>,
) {
    let detail = state.session.mode().is_detail();
    for (root, mut visibility) in &mut roots {
        let visible = match root.0 {
            MirrorKind::Overview => !detail,
            MirrorKind::Detail => detail,
        };
        let next = if visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        if *visibility != next {
            *visibility = next;
        }
    }
}

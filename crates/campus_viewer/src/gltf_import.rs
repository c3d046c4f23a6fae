//! Converts a loaded `Gltf` asset into an engine scene graph. Vertex data stays
//! in bevy's `Assets<Mesh>`; the graph only keeps bounds and a geometry id
//! that maps back to the mesh handle.

use std::collections::{HashMap, HashSet};

use bevy::gltf::{Gltf, GltfExtras, GltfMesh, GltfNode};
use bevy::mesh::VertexAttributeValues;
use bevy::prelude::*;
use campus_scene::glam::{Affine3A, Quat as CoreQuat, Vec3 as CoreVec3};
use campus_scene::{Aabb, Geometry, GeometryId, MaterialInstance, MaterialSpec, NodeId, SceneGraph};

pub(super) struct ImportedScene {
    pub graph: SceneGraph,
    pub meshes: HashMap<GeometryId, Handle<Mesh>>,
}

pub(super) struct GltfSources<'a> {
    pub nodes: &'a Assets<GltfNode>,
    pub meshes: &'a Assets<GltfMesh>,
    pub mesh_data: &'a Assets<Mesh>,
    pub materials: &'a Assets<StandardMaterial>,
}

pub(super) fn import_gltf(gltf: &Gltf, sources: &GltfSources) -> Result<ImportedScene, String> {
    let child_ids: HashSet<AssetId<GltfNode>> = gltf
        .nodes
        .iter()
        .filter_map(|handle| sources.nodes.get(handle))
        .flat_map(|node| node.children.iter().map(Handle::id))
        .collect();
    let roots: Vec<&Handle<GltfNode>> = gltf
        .nodes
        .iter()
        .filter(|handle| !child_ids.contains(&handle.id()))
        .collect();
    if roots.is_empty() {
        return Err("gltf contains no nodes".to_string());
    }

    let mut imported = ImportedScene {
        graph: SceneGraph::new(),
        meshes: HashMap::new(),
    };
    for root in roots {
        import_node(&mut imported, sources, None, root);
    }
    Ok(imported)
}

fn import_node(
    imported: &mut ImportedScene,
    sources: &GltfSources,
    parent: Option<NodeId>,
    handle: &Handle<GltfNode>,
) {
    let Some(node) = sources.nodes.get(handle) else {
        return;
    };
    let name = authored_name(&node.name);
    let transform = affine_from_transform(&node.transform);
    let mesh = node.mesh.as_ref().and_then(|mesh| sources.meshes.get(mesh));

    let id = match mesh {
        Some(mesh) if mesh.primitives.len() == 1 => {
            add_primitive(imported, sources, parent, name.clone(), transform, &mesh.primitives[0])
        }
        Some(mesh) => {
            let group = imported.graph.add_group(parent, name.clone(), transform);
            for (index, primitive) in mesh.primitives.iter().enumerate() {
                let primitive_name = if name.is_empty() {
                    String::new()
                } else {
                    format!("{name}_{index}")
                };
                add_primitive(
                    imported,
                    sources,
                    Some(group),
                    primitive_name,
                    Affine3A::IDENTITY,
                    primitive,
                );
            }
            Some(group)
        }
        None => Some(imported.graph.add_group(parent, name.clone(), transform)),
    };
    let Some(id) = id else {
        return;
    };

    if let Some(node_mut) = imported.graph.node_mut(id) {
        node_mut.extras = parse_extras(node.extras.as_ref());
    }
    for child in &node.children {
        import_node(imported, sources, Some(id), child);
    }
}

fn add_primitive(
    imported: &mut ImportedScene,
    sources: &GltfSources,
    parent: Option<NodeId>,
    name: String,
    transform: Affine3A,
    primitive: &bevy::gltf::GltfPrimitive,
) -> Option<NodeId> {
    let Some(bounds) = sources.mesh_data.get(&primitive.mesh).and_then(mesh_bounds) else {
        warn!("skipping primitive of '{name}': mesh data missing or has no positions");
        return None;
    };
    let material = primitive
        .material
        .as_ref()
        .and_then(|handle| sources.materials.get(handle))
        .map(imported_material)
        .unwrap_or_default();
    let id = imported.graph.add_mesh(
        parent,
        name,
        transform,
        Geometry::imported(bounds),
        Some(MaterialInstance::new(material)),
    );
    let geometry = imported.graph.node(id).and_then(|node| node.geometry())?;
    imported.meshes.insert(geometry, primitive.mesh.clone());
    Some(id)
}

/// Bevy names unnamed glTF nodes `GltfNode{index}`; those count as unnamed.
pub(super) fn authored_name(name: &str) -> String {
    let generated = name
        .strip_prefix("GltfNode")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|byte| byte.is_ascii_digit()));
    if generated {
        String::new()
    } else {
        name.to_string()
    }
}

pub(super) fn affine_from_transform(transform: &Transform) -> Affine3A {
    Affine3A::from_scale_rotation_translation(
        CoreVec3::from_array(transform.scale.to_array()),
        CoreQuat::from_array(transform.rotation.to_array()),
        CoreVec3::from_array(transform.translation.to_array()),
    )
}

pub(super) fn transform_from_affine(affine: &Affine3A) -> Transform {
    let matrix = campus_scene::glam::Mat4::from(*affine);
    Transform::from_matrix(Mat4::from_cols_array(&matrix.to_cols_array()))
}

pub(super) fn mesh_bounds(mesh: &Mesh) -> Option<Aabb> {
    match mesh.attribute(Mesh::ATTRIBUTE_POSITION)? {
        VertexAttributeValues::Float32x3(positions) => {
            Aabb::from_points(positions.iter().map(|position| CoreVec3::from_array(*position)))
        }
        _ => None,
    }
}

fn imported_material(material: &StandardMaterial) -> MaterialSpec {
    let color = material.base_color.to_srgba();
    MaterialSpec {
        base_color: [color.red, color.green, color.blue, color.alpha],
        transparent: color.alpha < 1.0,
        roughness: material.perceptual_roughness,
        metalness: material.metallic,
        ..MaterialSpec::default()
    }
}

pub(super) fn parse_extras(
    extras: Option<&GltfExtras>,
) -> serde_json::Map<String, serde_json::Value> {
    let Some(extras) = extras else {
        return serde_json::Map::new();
    };
    match serde_json::from_str::<serde_json::Value>(&extras.value) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => serde_json::Map::new(),
        Err(err) => {
            warn!("ignoring malformed gltf extras: {err}");
            serde_json::Map::new()
        }
    }
}

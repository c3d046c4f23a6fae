//! Retained scene graph: named nodes in a parent/child hierarchy, each with a
//! local transform and, for mesh nodes, a geometry and a material instance.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Affine3A, Vec3};
use serde_json::{Map, Value};

use crate::bounds::{Aabb, Ray};
use crate::material::{MaterialId, MaterialInstance};
use crate::metadata::Metadata;

static NEXT_SCENE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_GEOMETRY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(u64);

impl SceneId {
    fn next() -> Self {
        Self(NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Index of a node inside the graph that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Mesh,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GeometryShape {
    /// Vertex data lives with the renderer, keyed by [`GeometryId`].
    Imported,
    Cuboid { size: Vec3 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    pub bounds: Aabb,
    pub shape: GeometryShape,
}

impl Geometry {
    pub fn imported(bounds: Aabb) -> Self {
        Self {
            bounds,
            shape: GeometryShape::Imported,
        }
    }

    pub fn cuboid(size: Vec3) -> Self {
        Self {
            bounds: Aabb::from_center_size(Vec3::ZERO, size),
            shape: GeometryShape::Cuboid { size },
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoomAttributes {
    pub building_id: String,
    pub room_type: Option<String>,
    pub floor: Option<String>,
    pub capacity: Option<String>,
    pub in_detail_view: bool,
}

/// Free-form attributes the engine attaches to nodes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeUserData {
    pub clickable: bool,
    pub object_id: Option<String>,
    pub model_data: Option<Metadata>,
    pub room: Option<RoomAttributes>,
}

#[derive(Debug)]
pub struct SceneNode {
    name: String,
    uuid: String,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    geometry: Option<GeometryId>,
    material: Option<MaterialInstance>,
    attached: bool,
    pub transform: Affine3A,
    /// Extras authored in the source asset.
    pub extras: Map<String, Value>,
    pub user_data: NodeUserData,
}

impl SceneNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_mesh(&self) -> bool {
        self.kind == NodeKind::Mesh
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn geometry(&self) -> Option<GeometryId> {
        self.geometry
    }

    pub fn material(&self) -> Option<&MaterialInstance> {
        self.material.as_ref()
    }

    /// Local translation.
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.transform.translation)
    }
}

/// Nodes whose material changed plus material instances that were dropped
/// since the last drain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialChanges {
    pub assigned: Vec<NodeId>,
    pub released: Vec<MaterialId>,
}

impl MaterialChanges {
    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty() && self.released.is_empty()
    }
}

/// Resources freed by [`SceneGraph::dispose`], for the renderer to drop.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisposedResources {
    pub geometries: Vec<GeometryId>,
    pub materials: Vec<MaterialId>,
}

impl DisposedResources {
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty() && self.materials.is_empty()
    }

    pub fn extend(&mut self, other: DisposedResources) {
        self.geometries.extend(other.geometries);
        self.materials.extend(other.materials);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickHit {
    pub node: NodeId,
    pub point: Vec3,
    pub distance: f32,
}

#[derive(Debug)]
pub struct SceneGraph {
    id: SceneId,
    nodes: Vec<SceneNode>,
    roots: Vec<NodeId>,
    geometries: BTreeMap<GeometryId, Geometry>,
    pending: MaterialChanges,
    disposed: bool,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            id: SceneId::next(),
            nodes: Vec::new(),
            roots: Vec::new(),
            geometries: BTreeMap::new(),
            pending: MaterialChanges::default(),
            disposed: false,
        }
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn add_group(
        &mut self,
        parent: Option<NodeId>,
        name: impl Into<String>,
        transform: Affine3A,
    ) -> NodeId {
        self.push_node(parent, name.into(), NodeKind::Group, transform, None, None)
    }

    pub fn add_mesh(
        &mut self,
        parent: Option<NodeId>,
        name: impl Into<String>,
        transform: Affine3A,
        geometry: Geometry,
        material: Option<MaterialInstance>,
    ) -> NodeId {
        let geometry_id = GeometryId(NEXT_GEOMETRY_ID.fetch_add(1, Ordering::Relaxed));
        self.geometries.insert(geometry_id, geometry);
        self.push_node(
            parent,
            name.into(),
            NodeKind::Mesh,
            transform,
            Some(geometry_id),
            material,
        )
    }

    fn push_node(
        &mut self,
        parent: Option<NodeId>,
        name: String,
        kind: NodeKind,
        transform: Affine3A,
        geometry: Option<GeometryId>,
        material: Option<MaterialInstance>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let parent = parent.filter(|parent| self.contains(*parent));
        self.nodes.push(SceneNode {
            name,
            uuid: uuid::Uuid::new_v4().to_string(),
            kind,
            parent,
            children: Vec::new(),
            geometry,
            material,
            attached: !self.disposed,
            transform,
            extras: Map::new(),
            user_data: NodeUserData::default(),
        });
        match parent {
            Some(parent) => self.nodes[parent.index()].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.index())
            .is_some_and(|node| node.attached)
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.index()).filter(|node| node.attached)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.index()).filter(|node| node.attached)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) {
        if let Some(node) = self.node_mut(id) {
            node.name = name.into();
        }
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.traverse_all()
            .into_iter()
            .find(|id| self.nodes[id.index()].name == name)
    }

    /// Pre-order walk starting at `start`, including it.
    pub fn traverse(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.contains(start) {
            return order;
        }
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            let node = &self.nodes[id.index()];
            stack.extend(node.children.iter().rev().copied());
        }
        order
    }

    pub fn traverse_all(&self) -> Vec<NodeId> {
        self.roots
            .iter()
            .flat_map(|root| self.traverse(*root))
            .collect()
    }

    pub fn meshes(&self) -> Vec<NodeId> {
        self.traverse_all()
            .into_iter()
            .filter(|id| self.nodes[id.index()].is_mesh())
            .collect()
    }

    pub fn first_mesh_under(&self, id: NodeId) -> Option<NodeId> {
        self.traverse(id)
            .into_iter()
            .find(|candidate| self.nodes[candidate.index()].is_mesh())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.attached).count()
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(&id)
    }

    pub fn world_transform(&self, id: NodeId) -> Affine3A {
        let mut transform = Affine3A::IDENTITY;
        let mut cursor = self.node(id);
        while let Some(node) = cursor {
            transform = node.transform * transform;
            cursor = node.parent.and_then(|parent| self.node(parent));
        }
        transform
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_transform(id).transform_point3(Vec3::ZERO)
    }

    pub fn local_bounds(&self, id: NodeId) -> Option<Aabb> {
        let geometry = self.node(id)?.geometry?;
        self.geometries.get(&geometry).map(|geometry| geometry.bounds)
    }

    pub fn world_bounds(&self, id: NodeId) -> Option<Aabb> {
        self.local_bounds(id)
            .map(|bounds| bounds.transformed(&self.world_transform(id)))
    }

    /// Union of every mesh's world bounds.
    pub fn scene_bounds(&self) -> Option<Aabb> {
        self.meshes()
            .into_iter()
            .filter_map(|id| self.world_bounds(id))
            .reduce(|acc, bounds| acc.union(&bounds))
    }

    /// Shifts every root by `offset` in world space.
    pub fn translate_roots(&mut self, offset: Vec3) {
        let shift = Affine3A::from_translation(offset);
        for root in self.roots.clone() {
            if let Some(node) = self.node_mut(root) {
                node.transform = shift * node.transform;
            }
        }
    }

    /// Replaces the node's material. The previous instance, if any, is
    /// released and reported through [`SceneGraph::take_material_changes`].
    pub fn set_material(&mut self, id: NodeId, material: MaterialInstance) -> bool {
        let Some(node) = self.nodes.get_mut(id.index()).filter(|node| node.attached) else {
            return false;
        };
        if let Some(previous) = node.material.replace(material) {
            self.pending.released.push(previous.id());
        }
        self.pending.assigned.push(id);
        true
    }

    pub fn take_material_changes(&mut self) -> MaterialChanges {
        std::mem::take(&mut self.pending)
    }

    pub fn live_geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn live_material_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.attached && node.material.is_some())
            .count()
    }

    pub fn material_ids(&self) -> Vec<MaterialId> {
        self.nodes
            .iter()
            .filter(|node| node.attached)
            .filter_map(|node| node.material.as_ref().map(MaterialInstance::id))
            .collect()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Detaches every node and releases all geometry and material resources.
    /// Node ids handed out earlier resolve to nothing afterwards.
    pub fn dispose(&mut self) -> DisposedResources {
        let mut disposed = DisposedResources {
            geometries: std::mem::take(&mut self.geometries).into_keys().collect(),
            materials: Vec::new(),
        };
        for node in &mut self.nodes {
            if let Some(material) = node.material.take() {
                disposed.materials.push(material.id());
            }
            node.attached = false;
            node.children.clear();
            node.parent = None;
        }
        disposed.materials.extend(self.pending.released.drain(..));
        self.pending.assigned.clear();
        self.roots.clear();
        self.disposed = true;
        disposed
    }

    /// Nearest mesh whose world bounds the ray crosses.
    pub fn raycast(&self, ray: &Ray) -> Option<PickHit> {
        self.meshes()
            .into_iter()
            .filter_map(|id| {
                let distance = self.world_bounds(id)?.ray_intersection(ray)?;
                Some(PickHit {
                    node: id,
                    point: ray.at(distance),
                    distance,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::MaterialSpec;

    fn unit_cube() -> Geometry {
        Geometry::cuboid(Vec3::splat(2.0))
    }

    #[test]
    fn traversal_is_preorder_across_roots() {
        let mut graph = SceneGraph::new();
        let block = graph.add_group(None, "block", Affine3A::IDENTITY);
        let a = graph.add_mesh(Some(block), "a", Affine3A::IDENTITY, unit_cube(), None);
        let b = graph.add_mesh(Some(block), "b", Affine3A::IDENTITY, unit_cube(), None);
        let c = graph.add_mesh(None, "c", Affine3A::IDENTITY, unit_cube(), None);
        assert_eq!(graph.traverse_all(), vec![block, a, b, c]);
        assert_eq!(graph.meshes(), vec![a, b, c]);
        assert_eq!(graph.first_mesh_under(block), Some(a));
        assert_eq!(graph.find_by_name("b"), Some(b));
    }

    #[test]
    fn world_transform_composes_parents() {
        let mut graph = SceneGraph::new();
        let group = graph.add_group(
            None,
            "group",
            Affine3A::from_translation(Vec3::new(10.0, 0.0, 0.0)),
        );
        let mesh = graph.add_mesh(
            Some(group),
            "mesh",
            Affine3A::from_translation(Vec3::new(0.0, 5.0, 0.0)),
            unit_cube(),
            None,
        );
        assert_eq!(graph.world_position(mesh), Vec3::new(10.0, 5.0, 0.0));
        let bounds = graph.world_bounds(mesh).unwrap();
        assert_eq!(bounds.center(), Vec3::new(10.0, 5.0, 0.0));
    }

    #[test]
    fn raycast_returns_nearest_mesh() {
        let mut graph = SceneGraph::new();
        let near = graph.add_mesh(
            None,
            "near",
            Affine3A::from_translation(Vec3::new(0.0, 0.0, 5.0)),
            unit_cube(),
            None,
        );
        graph.add_mesh(None, "far", Affine3A::IDENTITY, unit_cube(), None);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 20.0), Vec3::NEG_Z);
        let hit = graph.raycast(&ray).unwrap();
        assert_eq!(hit.node, near);
        assert!((hit.point.z - 6.0).abs() < 1e-5);
        assert!(graph
            .raycast(&Ray::new(Vec3::new(50.0, 0.0, 20.0), Vec3::NEG_Z))
            .is_none());
    }

    #[test]
    fn set_material_reports_assignment_and_release() {
        let mut graph = SceneGraph::new();
        let first = MaterialInstance::new(MaterialSpec::default());
        let first_id = first.id();
        let mesh = graph.add_mesh(None, "m", Affine3A::IDENTITY, unit_cube(), Some(first));
        assert!(graph.set_material(mesh, MaterialInstance::new(MaterialSpec::default())));
        let changes = graph.take_material_changes();
        assert_eq!(changes.assigned, vec![mesh]);
        assert_eq!(changes.released, vec![first_id]);
        assert!(graph.take_material_changes().is_empty());
    }

    #[test]
    fn dispose_detaches_everything() {
        let mut graph = SceneGraph::new();
        let group = graph.add_group(None, "g", Affine3A::IDENTITY);
        let mesh = graph.add_mesh(
            Some(group),
            "m",
            Affine3A::IDENTITY,
            unit_cube(),
            Some(MaterialInstance::new(MaterialSpec::default())),
        );
        let disposed = graph.dispose();
        assert_eq!(disposed.geometries.len(), 1);
        assert_eq!(disposed.materials.len(), 1);
        assert!(graph.node(mesh).is_none());
        assert!(!graph.set_material(mesh, MaterialInstance::new(MaterialSpec::default())));
        assert_eq!(graph.live_geometry_count(), 0);
        assert_eq!(graph.live_material_count(), 0);
        assert!(graph.traverse_all().is_empty());
    }
}

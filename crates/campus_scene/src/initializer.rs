//! One-time preparation of the overview scene: naming, classification,
//! metadata attachment, resting materials and label anchors.

use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::classify::{classify, NodeClass};
use crate::graph::{NodeId, NodeUserData, SceneGraph, SceneId};
use crate::labels::LabelAnchor;
use crate::material::{resting_material, MaterialInstance, MaterialSpec};
use crate::metadata::{Metadata, MetadataDictionary, MetadataState};

pub const GENERATED_NAME_PREFIX: &str = "Part_";

/// Resting material per node, captured when the scene was prepared. Restores
/// hand out a duplicate; the stored instance is never attached to a node.
#[derive(Debug)]
pub struct MaterialRegistry {
    scene: SceneId,
    resting: HashMap<NodeId, MaterialInstance>,
}

impl MaterialRegistry {
    pub fn new(scene: SceneId) -> Self {
        Self {
            scene,
            resting: HashMap::new(),
        }
    }

    pub fn scene(&self) -> SceneId {
        self.scene
    }

    pub(crate) fn record(&mut self, node: NodeId, material: MaterialInstance) {
        self.resting.insert(node, material);
    }

    pub(crate) fn clear(&mut self) {
        self.resting.clear();
    }

    pub fn resting(&self, node: NodeId) -> Option<&MaterialSpec> {
        self.resting.get(&node).map(MaterialInstance::spec)
    }

    pub fn restore_instance(&self, node: NodeId) -> Option<MaterialInstance> {
        self.resting.get(&node).map(MaterialInstance::duplicate)
    }

    pub fn len(&self) -> usize {
        self.resting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resting.is_empty()
    }
}

/// Emits monotonically non-decreasing percentages and never repeats a value.
pub struct ProgressTracker<F: FnMut(u8)> {
    sink: F,
    last: Option<u8>,
}

impl<F: FnMut(u8)> ProgressTracker<F> {
    pub fn new(sink: F) -> Self {
        Self { sink, last: None }
    }

    pub fn report(&mut self, percent: u8) {
        let percent = percent.min(100).max(self.last.unwrap_or(0));
        if self.last == Some(percent) {
            return;
        }
        self.last = Some(percent);
        (self.sink)(percent);
    }

    pub fn report_fraction(&mut self, done: usize, total: usize) {
        let percent = if total == 0 {
            100
        } else {
            (done.min(total) * 100 / total) as u8
        };
        self.report(percent);
    }

    pub fn finish(&mut self) {
        self.report(100);
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodePlan {
    pub node: NodeId,
    pub name: String,
    pub renamed: bool,
    pub class: NodeClass,
    pub model_data: Option<Metadata>,
    pub resting: MaterialSpec,
    pub anchor: Vec3,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScenePlan {
    pub scene: SceneId,
    pub nodes: Vec<NodePlan>,
}

/// Decides everything the initializer will do without touching the graph.
pub fn plan_scene(scene: &SceneGraph, metadata: Option<&MetadataDictionary>) -> ScenePlan {
    let mut taken: HashSet<String> = scene
        .traverse_all()
        .into_iter()
        .filter_map(|id| scene.node(id).map(|node| node.name().to_string()))
        .filter(|name| !name.is_empty())
        .collect();

    let nodes = scene
        .meshes()
        .into_iter()
        .filter_map(|id| {
            let node = scene.node(id)?;
            let renamed = node.name().is_empty();
            let name = if renamed {
                generated_name(node.uuid(), &mut taken)
            } else {
                node.name().to_string()
            };
            let class = classify(&name);
            let model_data = class
                .object_id
                .as_deref()
                .and_then(|object_id| metadata?.get(object_id).cloned());
            let anchor = scene
                .world_bounds(id)
                .map(|bounds| bounds.top_center())
                .unwrap_or_else(|| scene.world_position(id));
            Some(NodePlan {
                node: id,
                name,
                renamed,
                resting: resting_material(class.category),
                class,
                model_data,
                anchor,
            })
        })
        .collect();

    ScenePlan {
        scene: scene.id(),
        nodes,
    }
}

fn generated_name(uuid: &str, taken: &mut HashSet<String>) -> String {
    let compact: String = uuid.chars().filter(|ch| *ch != '-').collect();
    for len in [8, 12, 16, compact.len()] {
        let candidate = format!(
            "{GENERATED_NAME_PREFIX}{}",
            compact.chars().take(len).collect::<String>()
        );
        if taken.insert(candidate.clone()) {
            return candidate;
        }
    }
    let mut suffix = 1usize;
    loop {
        let candidate = format!("{GENERATED_NAME_PREFIX}{compact}_{suffix}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

#[derive(Debug)]
pub struct AppliedScene {
    pub registry: MaterialRegistry,
    pub labels: Vec<LabelAnchor>,
}

pub fn apply_plan<F: FnMut(u8)>(
    scene: &mut SceneGraph,
    plan: &ScenePlan,
    progress: &mut ProgressTracker<F>,
) -> AppliedScene {
    let mut registry = MaterialRegistry::new(scene.id());
    let mut labels = Vec::new();
    let total = plan.nodes.len();

    for (index, entry) in plan.nodes.iter().enumerate() {
        if scene.contains(entry.node) {
            if entry.renamed {
                scene.set_name(entry.node, entry.name.clone());
            }
            let live = MaterialInstance::new(entry.resting);
            registry.record(entry.node, live.duplicate());
            scene.set_material(entry.node, live);
            if let Some(node) = scene.node_mut(entry.node) {
                node.user_data = NodeUserData {
                    clickable: entry.class.clickable,
                    object_id: entry.class.object_id.clone(),
                    model_data: entry.model_data.clone(),
                    room: None,
                };
            }
            if entry.class.clickable {
                labels.push(LabelAnchor {
                    node: entry.node,
                    title: entry.name.to_uppercase(),
                    name: entry
                        .model_data
                        .as_ref()
                        .and_then(|metadata| metadata.name.clone()),
                    position: entry.anchor,
                });
            }
        }
        progress.report_fraction(index + 1, total);
    }
    progress.finish();

    AppliedScene { registry, labels }
}

pub enum InitStatus {
    WaitingForScene,
    WaitingForMetadata,
    AlreadyInitialized,
    Initialized(AppliedScene),
}

/// Runs the plan/apply pass exactly once per scene instance, after both the
/// scene and the metadata have settled.
#[derive(Debug, Default)]
pub struct SceneInitializer {
    initialized_for: Option<SceneId>,
}

impl SceneInitializer {
    pub fn run<F: FnMut(u8)>(
        &mut self,
        scene: Option<&mut SceneGraph>,
        metadata: &MetadataState,
        progress: F,
    ) -> InitStatus {
        let Some(scene) = scene else {
            return InitStatus::WaitingForScene;
        };
        if self.initialized_for == Some(scene.id()) {
            return InitStatus::AlreadyInitialized;
        }
        if !metadata.is_settled() {
            return InitStatus::WaitingForMetadata;
        }
        if let Some(error) = metadata.error() {
            log::warn!("metadata unavailable, preparing scene without it: {error}");
        }

        let mut tracker = ProgressTracker::new(progress);
        tracker.report(0);
        let plan = plan_scene(scene, metadata.dictionary());
        let applied = apply_plan(scene, &plan, &mut tracker);
        self.initialized_for = Some(scene.id());
        log::info!(
            "scene prepared: {} meshes, {} buildings",
            plan.nodes.len(),
            applied.labels.len()
        );
        InitStatus::Initialized(applied)
    }

    pub fn is_initialized_for(&self, scene: SceneId) -> bool {
        self.initialized_for == Some(scene)
    }

    pub fn reset(&mut self) {
        self.initialized_for = None;
    }
}

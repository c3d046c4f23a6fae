use crate::graph::{NodeId, SceneGraph};
use crate::initializer::MaterialRegistry;
use crate::material::{MaterialInstance, MaterialSpec};

/// Keeps at most one node of a scene highlighted. Moving the highlight
/// restores the previous node before the next one is touched.
#[derive(Debug)]
pub struct HighlightTracker {
    registry: MaterialRegistry,
    highlight: MaterialSpec,
    fallback: fn(&str) -> MaterialSpec,
    current: Option<NodeId>,
}

impl HighlightTracker {
    pub fn new(
        registry: MaterialRegistry,
        highlight: MaterialSpec,
        fallback: fn(&str) -> MaterialSpec,
    ) -> Self {
        Self {
            registry,
            highlight,
            fallback,
            current: None,
        }
    }

    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    pub fn registry(&self) -> &MaterialRegistry {
        &self.registry
    }

    pub fn move_to(&mut self, scene: &mut SceneGraph, node: NodeId) {
        if self.current == Some(node) {
            return;
        }
        if let Some(previous) = self.current.take() {
            self.restore(scene, previous);
        }
        scene.set_material(node, MaterialInstance::new(self.highlight));
        self.current = Some(node);
    }

    pub fn release(&mut self, scene: &mut SceneGraph) -> Option<NodeId> {
        let previous = self.current.take()?;
        self.restore(scene, previous);
        Some(previous)
    }

    /// Drops every reference without touching the scene, for teardown.
    pub fn forget(&mut self) {
        self.current = None;
        self.registry.clear();
    }

    fn restore(&self, scene: &mut SceneGraph, node: NodeId) {
        let Some(name) = scene.node(node).map(|node| node.name().to_string()) else {
            return;
        };
        let material = self.registry.restore_instance(node).unwrap_or_else(|| {
            log::debug!("no resting material recorded for {name}, recomputing");
            MaterialInstance::new((self.fallback)(&name))
        });
        scene.set_material(node, material);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::graph::Geometry;
    use crate::material::{overview_highlight, resting_material};
    use glam::{Affine3A, Vec3};

    fn fallback(name: &str) -> MaterialSpec {
        resting_material(classify(name).category)
    }

    #[test]
    fn restores_from_category_when_registry_is_empty() {
        let mut scene = SceneGraph::new();
        let node = scene.add_mesh(
            None,
            "ar3",
            Affine3A::IDENTITY,
            Geometry::cuboid(Vec3::ONE),
            None,
        );
        let mut tracker = HighlightTracker::new(
            MaterialRegistry::new(scene.id()),
            overview_highlight(),
            fallback,
        );
        tracker.move_to(&mut scene, node);
        assert_eq!(
            scene.node(node).unwrap().material().unwrap().spec(),
            &overview_highlight()
        );
        assert_eq!(tracker.release(&mut scene), Some(node));
        assert_eq!(
            scene.node(node).unwrap().material().unwrap().spec(),
            &fallback("ar3")
        );
        assert_eq!(tracker.release(&mut scene), None);
    }
}

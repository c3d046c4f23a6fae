use std::collections::HashMap;

use bevy::prelude::*;
use campus_scene::{MaterialId, MaterialInstance, MaterialSpec};

/// GPU material per engine material instance. Handles are created lazily the
/// first time an instance is shown and removed when the engine releases it.
#[derive(Resource, Default)]
pub(super) struct MaterialLibrary {
    by_instance: HashMap<MaterialId, Handle<StandardMaterial>>,
}

impl MaterialLibrary {
    pub(super) fn handle_for(
        &mut self,
        instance: &MaterialInstance,
        materials: &mut Assets<StandardMaterial>,
    ) -> Handle<StandardMaterial> {
        self.by_instance
            .entry(instance.id())
            .or_insert_with(|| materials.add(standard_material(instance.spec())))
            .clone()
    }

    pub(super) fn release(&mut self, id: MaterialId, materials: &mut Assets<StandardMaterial>) {
        if let Some(handle) = self.by_instance.remove(&id) {
            materials.remove(&handle);
        }
    }

    pub(super) fn len(&self) -> usize {
        self.by_instance.len()
    }
}

pub(super) fn standard_material(spec: &MaterialSpec) -> StandardMaterial {
    let [r, g, b, a] = spec.base_color;
    let [er, eg, eb] = spec.emissive;
    let emissive = Color::srgb(er, eg, eb).to_linear();
    let intensity = spec.emissive_intensity;
    StandardMaterial {
        base_color: Color::srgba(r, g, b, a),
        emissive: LinearRgba::rgb(
            emissive.red * intensity,
            emissive.green * intensity,
            emissive.blue * intensity,
        ),
        perceptual_roughness: spec.roughness,
        metallic: spec.metalness,
        alpha_mode: if spec.transparent {
            AlphaMode::Blend
        } else {
            AlphaMode::Opaque
        },
        ..default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_scene::material::{overview_highlight, resting_material};
    use campus_scene::NodeCategory;

    #[test]
    fn handle_is_shared_per_instance() {
        let mut materials = Assets::<StandardMaterial>::default();
        let mut library = MaterialLibrary::default();
        let instance = MaterialInstance::new(overview_highlight());
        let first = library.handle_for(&instance, &mut materials);
        let second = library.handle_for(&instance, &mut materials);
        assert_eq!(first, second);
        assert_eq!(library.len(), 1);

        let other = library.handle_for(&instance.duplicate(), &mut materials);
        assert_ne!(first, other);
        assert_eq!(library.len(), 2);
    }

    #[test]
    fn release_removes_gpu_material() {
        let mut materials = Assets::<StandardMaterial>::default();
        let mut library = MaterialLibrary::default();
        let instance = MaterialInstance::new(overview_highlight());
        let handle = library.handle_for(&instance, &mut materials);
        assert!(materials.get(&handle).is_some());
        library.release(instance.id(), &mut materials);
        assert!(materials.get(&handle).is_none());
        assert_eq!(library.len(), 0);
    }

    #[test]
    fn translucent_specs_blend() {
        let building = standard_material(&resting_material(NodeCategory::Building));
        assert!(matches!(building.alpha_mode, AlphaMode::Blend));
        assert!((building.perceptual_roughness - 0.3).abs() < f32::EPSILON);
        let road = standard_material(&resting_material(NodeCategory::Road));
        assert!(matches!(road.alpha_mode, AlphaMode::Opaque));
        let highlight = standard_material(&overview_highlight());
        assert!(highlight.emissive.blue > 0.0);
    }
}

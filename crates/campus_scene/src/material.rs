use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::classify::NodeCategory;

/// Pastel palette used for room meshes in the detail view.
pub const ROOM_PALETTE: [u32; 10] = [
    0xAED6F1, 0xD5F5E3, 0xFADBD8, 0xF9E79F, 0xD2B4DE, 0xF5CBA7, 0xEBDEF0, 0xE8DAEF, 0xCFF5E7,
    0xFFE5D8,
];

/// Plain description of a surface. Two nodes with equal specs render the
/// same, regardless of which [`MaterialInstance`] carries them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MaterialSpec {
    /// sRGB color with alpha as opacity.
    pub base_color: [f32; 4],
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub roughness: f32,
    pub metalness: f32,
    pub transparent: bool,
}

impl Default for MaterialSpec {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            emissive: [0.0, 0.0, 0.0],
            emissive_intensity: 0.0,
            roughness: 0.5,
            metalness: 0.0,
            transparent: false,
        }
    }
}

impl MaterialSpec {
    pub fn from_hex(hex: u32, opacity: f32) -> Self {
        let [r, g, b] = hex_to_rgb(hex);
        Self {
            base_color: [r, g, b, opacity],
            transparent: opacity < 1.0,
            ..Self::default()
        }
    }

    pub fn with_surface(mut self, roughness: f32, metalness: f32) -> Self {
        self.roughness = roughness;
        self.metalness = metalness;
        self
    }

    pub fn with_emissive(mut self, hex: u32, intensity: f32) -> Self {
        self.emissive = hex_to_rgb(hex);
        self.emissive_intensity = intensity;
        self
    }

    pub fn opacity(&self) -> f32 {
        self.base_color[3]
    }
}

pub fn hex_to_rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(u64);

impl MaterialId {
    fn next() -> Self {
        Self(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A material resource owned by exactly one node. Copies go through
/// [`MaterialInstance::duplicate`] and get a fresh id.
#[derive(Debug, PartialEq)]
pub struct MaterialInstance {
    id: MaterialId,
    spec: MaterialSpec,
}

impl MaterialInstance {
    pub fn new(spec: MaterialSpec) -> Self {
        Self {
            id: MaterialId::next(),
            spec,
        }
    }

    pub fn id(&self) -> MaterialId {
        self.id
    }

    pub fn spec(&self) -> &MaterialSpec {
        &self.spec
    }

    pub fn duplicate(&self) -> Self {
        Self::new(self.spec)
    }
}

pub fn resting_material(category: NodeCategory) -> MaterialSpec {
    match category {
        NodeCategory::Water => MaterialSpec::from_hex(0x4a90c8, 0.8).with_surface(0.1, 0.3),
        NodeCategory::Pavement => MaterialSpec::from_hex(0xb8b8b0, 1.0).with_surface(0.9, 0.0),
        NodeCategory::Road => MaterialSpec::from_hex(0x555a60, 1.0).with_surface(0.8, 0.1),
        NodeCategory::Building => MaterialSpec::from_hex(0xffffff, 0.7).with_surface(0.3, 0.2),
        NodeCategory::Decorative => MaterialSpec::from_hex(0xdddddd, 0.5).with_surface(0.3, 0.2),
    }
}

pub fn overview_highlight() -> MaterialSpec {
    MaterialSpec::from_hex(0x88ccff, 0.8)
        .with_surface(0.3, 0.2)
        .with_emissive(0x113355, 0.5)
}

pub fn room_highlight() -> MaterialSpec {
    MaterialSpec::from_hex(0x87cefa, 0.7)
        .with_surface(0.7, 0.2)
        .with_emissive(0x0044aa, 1.0)
}

pub fn placeholder_material() -> MaterialSpec {
    MaterialSpec::from_hex(0x9e9e9e, 0.8).with_surface(0.7, 0.2)
}

/// Palette color for a room. Hashing the name keeps the choice stable across
/// reloads of the same building.
pub fn room_material(name: &str) -> MaterialSpec {
    let index = (fnv1a(name.as_bytes()) % ROOM_PALETTE.len() as u64) as usize;
    MaterialSpec::from_hex(ROOM_PALETTE[index], 0.5).with_surface(0.7, 0.2)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

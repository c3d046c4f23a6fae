use std::path::{Path, PathBuf};

use bevy::prelude::Resource;
use campus_scene::detail::DEFAULT_DETAIL_DIR;
use serde::Deserialize;

const DEFAULT_ASSET_ROOT: &str = "assets";
const DEFAULT_SCENE_PATH: &str = "models/ar00.glb";
const DEFAULT_METADATA_PATH: &str = "data/model01.json";
const DEFAULT_SHOW_LABELS: bool = true;
const DEFAULT_SHOW_SUN: bool = true;
const DEFAULT_DEBUG: bool = false;
const DEFAULT_CAMERA_MIN_RADIUS: f32 = 2.0;
const DEFAULT_CAMERA_MAX_RADIUS: f32 = 500.0;
const CONFIG_FILE_ENV: &str = "CAMPUS_VIEWER_CONFIG";

#[derive(Clone, Debug, PartialEq, Resource, Deserialize)]
#[serde(default)]
pub(super) struct ViewerConfig {
    pub asset_root: String,
    pub scene_path: String,
    pub metadata_path: String,
    pub detail_dir: String,
    pub show_labels: bool,
    pub show_sun: bool,
    pub debug: bool,
    pub camera: ViewerCameraConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            asset_root: DEFAULT_ASSET_ROOT.to_string(),
            scene_path: DEFAULT_SCENE_PATH.to_string(),
            metadata_path: DEFAULT_METADATA_PATH.to_string(),
            detail_dir: DEFAULT_DETAIL_DIR.to_string(),
            show_labels: DEFAULT_SHOW_LABELS,
            show_sun: DEFAULT_SHOW_SUN,
            debug: DEFAULT_DEBUG,
            camera: ViewerCameraConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Metadata is read straight from disk, relative to the resolved asset root.
    pub(super) fn metadata_file(&self, asset_base: &Path) -> PathBuf {
        asset_base.join(&self.asset_root).join(&self.metadata_path)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub(super) struct ViewerCameraConfig {
    pub min_radius: f32,
    pub max_radius: f32,
}

impl Default for ViewerCameraConfig {
    fn default() -> Self {
        Self {
            min_radius: DEFAULT_CAMERA_MIN_RADIUS,
            max_radius: DEFAULT_CAMERA_MAX_RADIUS,
        }
    }
}

pub(super) fn resolve_viewer_config() -> ViewerConfig {
    let base = std::env::var(CONFIG_FILE_ENV)
        .ok()
        .and_then(|path| load_viewer_config_file(Path::new(&path)))
        .unwrap_or_default();
    apply_viewer_config_overrides(base, |key| std::env::var(key).ok())
}

#[cfg(not(target_arch = "wasm32"))]
fn load_viewer_config_file(path: &Path) -> Option<ViewerConfig> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            bevy::log::warn!("viewer config {} unreadable: {err}", path.display());
            return None;
        }
    };
    match parse_viewer_config_toml(&raw) {
        Ok(config) => Some(config),
        Err(err) => {
            bevy::log::warn!("viewer config {} invalid: {err}", path.display());
            None
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn load_viewer_config_file(_path: &Path) -> Option<ViewerConfig> {
    None
}

#[cfg(not(target_arch = "wasm32"))]
fn parse_viewer_config_toml(raw: &str) -> Result<ViewerConfig, toml::de::Error> {
    toml::from_str::<ViewerConfig>(raw).map(sanitize_camera)
}

fn apply_viewer_config_overrides<F>(mut config: ViewerConfig, lookup: F) -> ViewerConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = parse_path(&lookup, "CAMPUS_VIEWER_ASSET_ROOT") {
        config.asset_root = value;
    }
    if let Some(value) = parse_path(&lookup, "CAMPUS_VIEWER_SCENE_PATH") {
        config.scene_path = value;
    }
    if let Some(value) = parse_path(&lookup, "CAMPUS_VIEWER_METADATA_PATH") {
        config.metadata_path = value;
    }
    if let Some(value) = parse_path(&lookup, "CAMPUS_VIEWER_DETAIL_DIR") {
        config.detail_dir = value;
    }
    if let Some(value) = parse_bool(&lookup, "CAMPUS_VIEWER_SHOW_LABELS") {
        config.show_labels = value;
    }
    if let Some(value) = parse_bool(&lookup, "CAMPUS_VIEWER_SHOW_SUN") {
        config.show_sun = value;
    }
    if let Some(value) = parse_bool(&lookup, "CAMPUS_VIEWER_DEBUG") {
        config.debug = value;
    }
    if let Some(value) = parse_f32(&lookup, "CAMPUS_VIEWER_CAMERA_MIN_RADIUS") {
        if value.is_finite() && value > 0.0 {
            config.camera.min_radius = value;
        }
    }
    if let Some(value) = parse_f32(&lookup, "CAMPUS_VIEWER_CAMERA_MAX_RADIUS") {
        if value.is_finite() && value > 0.0 {
            config.camera.max_radius = value;
        }
    }
    sanitize_camera(config)
}

fn sanitize_camera(mut config: ViewerConfig) -> ViewerConfig {
    if !config.camera.min_radius.is_finite() || config.camera.min_radius <= 0.0 {
        config.camera.min_radius = DEFAULT_CAMERA_MIN_RADIUS;
    }
    if !config.camera.max_radius.is_finite()
        || config.camera.max_radius <= config.camera.min_radius
    {
        config.camera.max_radius = (config.camera.min_radius + 1.0).max(DEFAULT_CAMERA_MAX_RADIUS);
    }
    config
}

fn parse_path<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|raw| {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    })
}

fn parse_f32<F>(lookup: &F, key: &str) -> Option<f32>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|raw| raw.trim().parse::<f32>().ok())
}

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/viewer.json";

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "WindowConfig::default_title")]
    pub title: String,
    #[serde(default = "WindowConfig::default_width")]
    pub width: u32,
    #[serde(default = "WindowConfig::default_height")]
    pub height: u32,
    #[serde(default)]
    pub fullscreen: bool,
}

/// Scale limits and steps used by fit-to-view and wheel zoom.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "CameraConfig::default_min_scale")]
    pub min_scale: f32,
    #[serde(default = "CameraConfig::default_max_scale")]
    pub max_scale: f32,
    #[serde(default = "CameraConfig::default_zoom_step")]
    pub zoom_step: f32,
    #[serde(default = "CameraConfig::default_quantize_divisor")]
    pub quantize_divisor: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    #[serde(default = "GridConfig::default_extent")]
    pub extent: f32,
    #[serde(default = "GridConfig::default_base_spacing")]
    pub base_spacing: f32,
    #[serde(default = "GridConfig::default_color")]
    pub color: u32,
    #[serde(default = "GridConfig::default_line_width")]
    pub line_width: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Wait between caching a skeleton and instantiating it. Zero instantiates immediately.
    #[serde(default = "IngestConfig::default_instantiate_delay_ms")]
    pub instantiate_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ViewerConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerConfigOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl WindowConfig {
    fn default_title() -> String {
        "Skeleton Viewer".to_string()
    }

    const fn default_width() -> u32 {
        1280
    }

    const fn default_height() -> u32 {
        720
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: Self::default_title(),
            width: Self::default_width(),
            height: Self::default_height(),
            fullscreen: false,
        }
    }
}

impl CameraConfig {
    const fn default_min_scale() -> f32 {
        0.1
    }

    const fn default_max_scale() -> f32 {
        10.0
    }

    const fn default_zoom_step() -> f32 {
        0.2
    }

    const fn default_quantize_divisor() -> f32 {
        5.0
    }

    pub fn clamp(&self, scale: f32) -> f32 {
        scale.clamp(self.min_scale, self.max_scale)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            min_scale: Self::default_min_scale(),
            max_scale: Self::default_max_scale(),
            zoom_step: Self::default_zoom_step(),
            quantize_divisor: Self::default_quantize_divisor(),
        }
    }
}

impl GridConfig {
    const fn default_extent() -> f32 {
        2000.0
    }

    const fn default_base_spacing() -> f32 {
        100.0
    }

    const fn default_color() -> u32 {
        0x424549
    }

    const fn default_line_width() -> f32 {
        1.0
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            extent: Self::default_extent(),
            base_spacing: Self::default_base_spacing(),
            color: Self::default_color(),
            line_width: Self::default_line_width(),
        }
    }
}

impl IngestConfig {
    const fn default_instantiate_delay_ms() -> u64 {
        250
    }

    pub fn instantiate_delay(&self) -> Duration {
        Duration::from_millis(self.instantiate_delay_ms)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { instantiate_delay_ms: Self::default_instantiate_delay_ms() }
    }
}

impl ViewerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut cfg: ViewerConfig = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("[config] {err:#}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ViewerConfigOverrides) {
        if let Some(width) = overrides.width {
            self.window.width = width;
        }
        if let Some(height) = overrides.height {
            self.window.height = height;
        }
    }

    fn sanitize(&mut self) {
        let camera = &mut self.camera;
        if !(camera.min_scale > 0.0 && camera.max_scale >= camera.min_scale) {
            warn!(
                "[config] invalid scale limits [{}, {}]; using defaults",
                camera.min_scale, camera.max_scale
            );
            camera.min_scale = CameraConfig::default_min_scale();
            camera.max_scale = CameraConfig::default_max_scale();
        }
        if camera.quantize_divisor <= 0.0 {
            warn!("[config] quantize_divisor must be positive; using {}", CameraConfig::default_quantize_divisor());
            camera.quantize_divisor = CameraConfig::default_quantize_divisor();
        }
        if self.grid.base_spacing <= 0.0 {
            warn!("[config] grid base_spacing must be positive; using {}", GridConfig::default_base_spacing());
            self.grid.base_spacing = GridConfig::default_base_spacing();
        }
    }
}

impl ViewerConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.width.is_some() {
            fields.push("width");
        }
        if self.height.is_some() {
            fields.push("height");
        }
        fields
    }
}

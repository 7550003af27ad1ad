//! Viewer configuration stored as RON

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AssetError;
use crate::rasterizer::{Color, RasterSettings};
use crate::scene::Camera;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window_width: i32,
    pub window_height: i32,
    /// Software render target resolution
    pub render_width: usize,
    pub render_height: usize,
    pub clear_color: Color,
    pub raster: RasterSettings,
    pub camera: Camera,
    /// Scene description file; empty shows a spinning test cube
    pub scene: String,
    /// Camera orbit speed in radians per second
    pub orbit_speed: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window_width: 960,
            window_height: 720,
            render_width: 320,
            render_height: 240,
            clear_color: Color::new(20, 20, 28),
            raster: RasterSettings::default(),
            camera: Camera::default(),
            scene: String::new(),
            orbit_speed: 0.5,
        }
    }
}

impl ViewerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let contents = fs::read_to_string(path)?;
        Self::from_ron(&contents)
    }

    pub fn from_ron(s: &str) -> Result<Self, AssetError> {
        Ok(ron::from_str(s)?)
    }

    /// Load `path`, falling back to defaults (with a warning) on any failure
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Using default viewer config ({}): {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), AssetError> {
        let config = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .indentor("  ".to_string());

        let contents = ron::ser::to_string_pretty(self, config)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::{CullMode, FillMode};

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = ViewerConfig::from_ron("(render_width: 160, raster: (cull_mode: Front, fill_mode: Wireframe))").unwrap();
        assert_eq!(config.render_width, 160);
        assert_eq!(config.render_height, 240);
        assert_eq!(config.raster.cull_mode, CullMode::Front);
        assert_eq!(config.raster.fill_mode, FillMode::Wireframe);
        assert!(!config.raster.depth_enable);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = ViewerConfig::load_or_default("no/such/viewer.ron");
        assert_eq!(config.render_width, 320);
    }

    #[test]
    fn test_bad_config_is_parse_error() {
        assert!(matches!(ViewerConfig::from_ron("(render_width: \"wide\")"), Err(AssetError::Parse(_))));
    }
}

//! Scene-wide display toggles and the startup configuration that seeds them.

use std::path::{Path, PathBuf};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

bitflags! {
    /// Display and shading toggles shared by the scene and the renderer.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct SceneOptions: u32 {
        const SHOW_AXES        = 0x1;
        const SHOW_GRID        = 0x2;
        const SHOW_NODES       = 0x4;
        const SHOW_COLLISION   = 0x8;
        const SHOW_CONSTRAINTS = 0x10;
        const SHOW_MARKERS     = 0x20;
        const DO_DOUBLE_SIDED  = 0x40;
        const DO_VERTEX_COLORS = 0x80;
        const DO_SPECULAR      = 0x100;
        const DO_GLOW          = 0x200;
        const DO_TEXTURING     = 0x400;
        const DO_BLENDING      = 0x800;
        const DO_MULTISAMPLING = 0x1000;
        const DO_LIGHTING      = 0x2000;
        const DO_CUBE_MAPPING  = 0x4000;
        const DISABLE_SHADERS  = 0x8000;
        const SHOW_HIDDEN      = 0x10000;
        const DO_SKINNING      = 0x20000;
        const DO_ERROR_COLOR   = 0x40000;
    }
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self::DO_LIGHTING
            | Self::DO_TEXTURING
            | Self::DO_MULTISAMPLING
            | Self::DO_BLENDING
            | Self::DO_VERTEX_COLORS
            | Self::DO_SPECULAR
            | Self::DO_GLOW
            | Self::DO_CUBE_MAPPING
            | Self::SHOW_AXES
            | Self::SHOW_GRID
            | Self::DO_SKINNING
            | Self::DO_ERROR_COLOR
    }
}

bitflags! {
    /// Debug visualisation modes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct VisMode: u32 {
        const LIGHT_POS    = 0x1;
        const NORMALS_ONLY = 0x2;
        const SILHOUETTE   = 0x4;
    }
}

/// Detail level used for `BSLODTriShape` geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum LodLevel {
    Level0,
    Level1,
    #[default]
    Level2,
}

/// Startup configuration of a viewer session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub options: SceneOptions,
    pub lod_level: LodLevel,
    pub vis_mode: VisMode,
    /// Master switch for programmable shading.
    pub use_shaders: bool,
    /// Directory holding `*.vert`, `*.frag` and `*.prog` files.
    pub shader_dir: Option<PathBuf>,
    /// Resource folders searched for material files, in order.
    pub resource_folders: Vec<PathBuf>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            options: SceneOptions::default(),
            lod_level: LodLevel::default(),
            vis_mode: VisMode::empty(),
            use_shaders: true,
            shader_dir: None,
            resource_folders: Vec::new(),
        }
    }
}

impl ViewerSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_startup_group() {
        let o = SceneOptions::default();
        assert!(o.contains(SceneOptions::DO_SKINNING | SceneOptions::SHOW_AXES));
        assert!(!o.contains(SceneOptions::SHOW_HIDDEN));
        assert!(!o.contains(SceneOptions::DISABLE_SHADERS));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s = ViewerSettings::from_json_str(r#"{ "lod_level": "Level0" }"#).unwrap();
        assert_eq!(s.lod_level, LodLevel::Level0);
        assert!(s.use_shaders);
        assert_eq!(s.options, SceneOptions::default());
    }
}

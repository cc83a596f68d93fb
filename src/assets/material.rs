//! Override material files (`.bgsm` lighting materials, `.bgem` effect
//! materials).
//!
//! A shader property whose name ends in one of these extensions takes its
//! shading parameters from the referenced file instead of its own fields.
//! Both formats are little-endian and share a 63-byte header; the body differs
//! per kind. Strings are a `u32` length (including the terminating NUL)
//! followed by the bytes.

use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Vec2, Vec3};
use rustc_hash::FxHashMap;

use crate::errors::{Result, ViewerError};

const BGSM: u32 = 0x4D53_4742;
const BGEM: u32 = 0x4D45_4742;

/// Which body layout a material file carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    /// `.bgsm`, used by lighting shader properties.
    Shader,
    /// `.bgem`, used by effect shader properties.
    Effect,
}

impl MaterialKind {
    /// Kind implied by a property name, if it names a material file.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".bgsm") {
            Some(Self::Shader)
        } else if lower.ends_with(".bgem") {
            Some(Self::Effect)
        } else {
            None
        }
    }
}

// ============================================================================
// Decoded data
// ============================================================================

/// Fields shared by both material kinds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialHeader {
    pub version: u32,
    pub tile_u: bool,
    pub tile_v: bool,
    pub uv_offset: Vec2,
    pub uv_scale: Vec2,
    pub alpha: f32,
    pub alpha_blend: bool,
    pub alpha_src: u32,
    pub alpha_dst: u32,
    pub alpha_test_ref: u8,
    pub alpha_test: bool,
    pub zbuffer_write: bool,
    pub zbuffer_test: bool,
    pub screen_space_reflections: bool,
    pub wetness_screen_space_reflections: bool,
    pub decal: bool,
    pub two_sided: bool,
    pub decal_no_fade: bool,
    pub non_occluder: bool,
    pub refraction: bool,
    pub refraction_falloff: bool,
    pub refraction_power: f32,
    pub environment_mapping: bool,
    pub environment_mask_scale: f32,
    pub grayscale_to_palette_color: bool,
}

/// Body of a `.bgsm` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderMaterial {
    pub header: MaterialHeader,
    /// Diffuse, normal, smooth/spec, greyscale, environment, glow, inner,
    /// wrinkles, displacement.
    pub textures: Vec<String>,
    pub enable_editor_alpha_ref: bool,
    pub rim_lighting: bool,
    pub rim_power: f32,
    pub backlight_power: f32,
    pub subsurface_lighting: bool,
    pub subsurface_rolloff: f32,
    pub specular_enabled: bool,
    pub specular_color: Vec3,
    pub specular_mult: f32,
    pub smoothness: f32,
    pub fresnel_power: f32,
    pub wet_spec_scale: f32,
    pub wet_spec_power_scale: f32,
    pub wet_spec_min_var: f32,
    pub wet_env_map_scale: f32,
    pub wet_fresnel_power: f32,
    pub wet_metalness: f32,
    pub root_material: String,
    pub aniso_lighting: bool,
    pub emit_enabled: bool,
    pub emittance_color: Vec3,
    pub emittance_mult: f32,
    pub model_space_normals: bool,
    pub external_emittance: bool,
    pub back_lighting: bool,
    pub receive_shadows: bool,
    pub hide_secret: bool,
    pub cast_shadows: bool,
    pub dissolve_fade: bool,
    pub assume_shadowmask: bool,
    pub glowmap: bool,
    pub environment_mapping_window: bool,
    pub environment_mapping_eye: bool,
    pub hair: bool,
    pub hair_tint_color: Vec3,
    pub tree: bool,
    pub facegen: bool,
    pub skin_tint: bool,
    pub tessellate: bool,
    pub displacement_bias: f32,
    pub displacement_scale: f32,
    pub tessellation_pn_scale: f32,
    pub tessellation_base_factor: f32,
    pub tessellation_fade_distance: f32,
    pub grayscale_to_palette_scale: f32,
    pub skew_specular_alpha: bool,
}

/// Body of a `.bgem` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectMaterial {
    pub header: MaterialHeader,
    /// Base, greyscale, environment, normal, environment mask.
    pub textures: Vec<String>,
    pub blood_enabled: bool,
    pub effect_lighting_enabled: bool,
    pub falloff_enabled: bool,
    pub falloff_color_enabled: bool,
    pub grayscale_to_palette_alpha: bool,
    pub soft_enabled: bool,
    pub base_color: Vec3,
    pub base_color_scale: f32,
    pub falloff_start_angle: f32,
    pub falloff_stop_angle: f32,
    pub falloff_start_opacity: f32,
    pub falloff_stop_opacity: f32,
    pub lighting_influence: f32,
    pub envmap_min_lod: u8,
    pub soft_depth: f32,
}

/// A decoded override material.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialFile {
    Shader(ShaderMaterial),
    Effect(EffectMaterial),
}

impl MaterialFile {
    /// Decodes a material file of the given kind.
    pub fn parse(kind: MaterialKind, data: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let header = read_header(&mut r)?;
        Ok(match kind {
            MaterialKind::Shader => Self::Shader(read_shader_body(&mut r, header)?),
            MaterialKind::Effect => Self::Effect(read_effect_body(&mut r, header)?),
        })
    }

    #[must_use]
    pub fn header(&self) -> &MaterialHeader {
        match self {
            Self::Shader(m) => &m.header,
            Self::Effect(m) => &m.header,
        }
    }

    #[must_use]
    pub fn textures(&self) -> &[String] {
        match self {
            Self::Shader(m) => &m.textures,
            Self::Effect(m) => &m.textures,
        }
    }

    #[must_use]
    pub fn as_shader(&self) -> Option<&ShaderMaterial> {
        match self {
            Self::Shader(m) => Some(m),
            Self::Effect(_) => None,
        }
    }

    #[must_use]
    pub fn as_effect(&self) -> Option<&EffectMaterial> {
        match self {
            Self::Effect(m) => Some(m),
            Self::Shader(_) => None,
        }
    }

    /// Texture slot, empty when out of range.
    #[must_use]
    pub fn texture(&self, slot: usize) -> &str {
        self.textures().get(slot).map_or("", String::as_str)
    }
}

// ============================================================================
// Binary decoding
// ============================================================================

struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { cursor: Cursor::new(data) }
    }

    /// Runs one read, reporting a short buffer as truncation at the read's
    /// start offset.
    fn read<T>(
        &mut self,
        needed: usize,
        f: impl FnOnce(&mut Cursor<&'a [u8]>) -> io::Result<T>,
    ) -> Result<T> {
        let offset = self.cursor.position() as usize;
        f(&mut self.cursor).map_err(|_| ViewerError::MaterialTruncated { offset, needed })
    }

    fn u8(&mut self) -> Result<u8> {
        self.read(1, ReadBytesExt::read_u8)
    }

    fn flag(&mut self) -> Result<bool> {
        Ok(self.u8()? != 0)
    }

    fn u32(&mut self) -> Result<u32> {
        self.read(4, ReadBytesExt::read_u32::<LittleEndian>)
    }

    fn f32(&mut self) -> Result<f32> {
        self.read(4, ReadBytesExt::read_f32::<LittleEndian>)
    }

    fn vec2(&mut self) -> Result<Vec2> {
        Ok(Vec2::new(self.f32()?, self.f32()?))
    }

    fn rgb(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let offset = self.cursor.position() as usize;
        if self.cursor.get_ref().len().saturating_sub(offset) < len {
            return Err(ViewerError::MaterialTruncated { offset, needed: len });
        }
        let mut bytes = vec![0; len];
        self.read(len, |c| c.read_exact(&mut bytes))?;
        let text = bytes.split(|&b| b == 0).next().unwrap_or_default();
        Ok(String::from_utf8_lossy(text).into_owned())
    }
}

fn read_header(r: &mut ByteReader<'_>) -> Result<MaterialHeader> {
    let magic = r.u32()?;
    if magic != BGSM && magic != BGEM {
        return Err(ViewerError::MaterialMagic(magic));
    }

    let version = r.u32()?;
    let tile_flags = r.u32()?;
    let uv_offset = r.vec2()?;
    let uv_scale = r.vec2()?;
    let alpha = r.f32()?;
    let alpha_blend = r.flag()?;
    let alpha_src = r.u32()?;
    let alpha_dst = r.u32()?;
    let alpha_test_ref = r.u8()?;

    Ok(MaterialHeader {
        version,
        tile_u: tile_flags & 0x2 != 0,
        tile_v: tile_flags & 0x1 != 0,
        uv_offset,
        uv_scale,
        alpha,
        alpha_blend,
        alpha_src,
        alpha_dst,
        alpha_test_ref,
        alpha_test: r.flag()?,
        zbuffer_write: r.flag()?,
        zbuffer_test: r.flag()?,
        screen_space_reflections: r.flag()?,
        wetness_screen_space_reflections: r.flag()?,
        decal: r.flag()?,
        two_sided: r.flag()?,
        decal_no_fade: r.flag()?,
        non_occluder: r.flag()?,
        refraction: r.flag()?,
        refraction_falloff: r.flag()?,
        refraction_power: r.f32()?,
        environment_mapping: r.flag()?,
        environment_mask_scale: r.f32()?,
        grayscale_to_palette_color: r.flag()?,
    })
}

fn read_shader_body(r: &mut ByteReader<'_>, header: MaterialHeader) -> Result<ShaderMaterial> {
    let mut m = ShaderMaterial { header, ..Default::default() };

    for _ in 0..9 {
        m.textures.push(r.string()?);
    }

    m.enable_editor_alpha_ref = r.flag()?;
    m.rim_lighting = r.flag()?;
    m.rim_power = r.f32()?;
    m.backlight_power = r.f32()?;
    m.subsurface_lighting = r.flag()?;
    m.subsurface_rolloff = r.f32()?;
    m.specular_enabled = r.flag()?;
    m.specular_color = r.rgb()?;
    m.specular_mult = r.f32()?;
    m.smoothness = r.f32()?;
    m.fresnel_power = r.f32()?;
    m.wet_spec_scale = r.f32()?;
    m.wet_spec_power_scale = r.f32()?;
    m.wet_spec_min_var = r.f32()?;
    m.wet_env_map_scale = r.f32()?;
    m.wet_fresnel_power = r.f32()?;
    m.wet_metalness = r.f32()?;
    m.root_material = r.string()?;
    m.aniso_lighting = r.flag()?;
    m.emit_enabled = r.flag()?;
    if m.emit_enabled {
        m.emittance_color = r.rgb()?;
    }
    m.emittance_mult = r.f32()?;
    m.model_space_normals = r.flag()?;
    m.external_emittance = r.flag()?;
    m.back_lighting = r.flag()?;
    m.receive_shadows = r.flag()?;
    m.hide_secret = r.flag()?;
    m.cast_shadows = r.flag()?;
    m.dissolve_fade = r.flag()?;
    m.assume_shadowmask = r.flag()?;
    m.glowmap = r.flag()?;
    m.environment_mapping_window = r.flag()?;
    m.environment_mapping_eye = r.flag()?;
    m.hair = r.flag()?;
    m.hair_tint_color = r.rgb()?;
    m.tree = r.flag()?;
    m.facegen = r.flag()?;
    m.skin_tint = r.flag()?;
    m.tessellate = r.flag()?;
    m.displacement_bias = r.f32()?;
    m.displacement_scale = r.f32()?;
    m.tessellation_pn_scale = r.f32()?;
    m.tessellation_base_factor = r.f32()?;
    m.tessellation_fade_distance = r.f32()?;
    m.grayscale_to_palette_scale = r.f32()?;
    m.skew_specular_alpha = r.flag()?;

    Ok(m)
}

fn read_effect_body(r: &mut ByteReader<'_>, header: MaterialHeader) -> Result<EffectMaterial> {
    let mut m = EffectMaterial { header, ..Default::default() };

    for _ in 0..5 {
        m.textures.push(r.string()?);
    }

    m.blood_enabled = r.flag()?;
    m.effect_lighting_enabled = r.flag()?;
    m.falloff_enabled = r.flag()?;
    m.falloff_color_enabled = r.flag()?;
    m.grayscale_to_palette_alpha = r.flag()?;
    m.soft_enabled = r.flag()?;
    m.base_color = r.rgb()?;
    m.base_color_scale = r.f32()?;
    m.falloff_start_angle = r.f32()?;
    m.falloff_stop_angle = r.f32()?;
    m.falloff_start_opacity = r.f32()?;
    m.falloff_stop_opacity = r.f32()?;
    m.lighting_influence = r.f32()?;
    m.envmap_min_lod = r.u8()?;
    m.soft_depth = r.f32()?;

    Ok(m)
}

// ============================================================================
// Lookup
// ============================================================================

/// Normalizes a material name to a resource-relative path.
///
/// Backslashes become slashes; absolute paths are cut at their `materials`
/// component.
#[must_use]
pub fn to_local_path(name: &str) -> String {
    let path = name.replace('\\', "/");
    let absolute = Path::new(&path).is_absolute() || path.as_bytes().get(1) == Some(&b':');
    if absolute
        && let Some(idx) = path.to_ascii_lowercase().find("materials")
    {
        return path[idx..].to_owned();
    }
    path
}

/// Source of raw material file bytes.
pub trait MaterialProvider {
    /// Returns the file contents for a resource-relative path.
    fn find(&self, local_path: &str) -> Option<Vec<u8>>;
}

/// Searches a list of resource folders on disk, first hit wins.
#[derive(Debug, Clone, Default)]
pub struct FolderMaterialProvider {
    folders: Vec<PathBuf>,
}

impl FolderMaterialProvider {
    #[must_use]
    pub fn new(folders: Vec<PathBuf>) -> Self {
        Self { folders }
    }
}

impl MaterialProvider for FolderMaterialProvider {
    fn find(&self, local_path: &str) -> Option<Vec<u8>> {
        self.folders
            .iter()
            .map(|folder| folder.join(local_path))
            .find(|p| p.is_file())
            .and_then(|p| std::fs::read(p).ok())
    }
}

/// Material files held in memory, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct MemoryMaterialProvider {
    files: FxHashMap<String, Vec<u8>>,
}

impl MemoryMaterialProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, local_path: &str, data: Vec<u8>) {
        self.files.insert(to_local_path(local_path).to_ascii_lowercase(), data);
    }
}

impl MaterialProvider for MemoryMaterialProvider {
    fn find(&self, local_path: &str) -> Option<Vec<u8>> {
        self.files.get(&local_path.to_ascii_lowercase()).cloned()
    }
}

/// Resolves the override material named by a shader property.
///
/// Returns `None` when the name is not a material file of `kind`, when no
/// provider has it, or when it fails to decode. Decode failures are logged.
#[must_use]
pub fn load_material(
    name: &str,
    kind: MaterialKind,
    provider: &dyn MaterialProvider,
) -> Option<Rc<MaterialFile>> {
    if name.is_empty() || MaterialKind::from_name(name) != Some(kind) {
        return None;
    }

    let local = to_local_path(name);
    let Some(data) = provider.find(&local) else {
        log::debug!("{}", ViewerError::MaterialNotFound(local));
        return None;
    };

    match MaterialFile::parse(kind, &data) {
        Ok(file) => Some(Rc::new(file)),
        Err(e) => {
            log::warn!("Material '{local}' could not be read: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_path_cuts_absolute_prefix() {
        assert_eq!(
            to_local_path("C:\\Games\\Fallout 4\\Data\\Materials\\Armor\\a.bgsm"),
            "Materials/Armor/a.bgsm"
        );
        assert_eq!(to_local_path("Materials\\x.bgem"), "Materials/x.bgem");
    }

    #[test]
    fn kind_from_extension_is_case_insensitive() {
        assert_eq!(MaterialKind::from_name("a/B.BGSM"), Some(MaterialKind::Shader));
        assert_eq!(MaterialKind::from_name("fx.bgem"), Some(MaterialKind::Effect));
        assert_eq!(MaterialKind::from_name("plain"), None);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let data = [0u8; 80];
        assert!(matches!(
            MaterialFile::parse(MaterialKind::Shader, &data),
            Err(ViewerError::MaterialMagic(0))
        ));
    }
}

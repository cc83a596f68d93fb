//! Packed shader flag words and enums of the shader properties.

use bitflags::bitflags;

use super::legacy::TexWrap;

bitflags! {
    /// First shader flag word.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ShaderFlags1: u32 {
        const SPECULAR                   = 1;
        const SKINNED                    = 1 << 1;
        const TEMP_REFRACTION            = 1 << 2;
        const VERTEX_ALPHA               = 1 << 3;
        const GREYSCALE_TO_PALETTE_COLOR = 1 << 4;
        const GREYSCALE_TO_PALETTE_ALPHA = 1 << 5;
        const USE_FALLOFF                = 1 << 6;
        const ENVIRONMENT_MAPPING        = 1 << 7;
        const RECEIVE_SHADOWS            = 1 << 8;
        const CAST_SHADOWS               = 1 << 9;
        const FACEGEN_DETAIL_MAP         = 1 << 10;
        const PARALLAX                   = 1 << 11;
        const MODEL_SPACE_NORMALS        = 1 << 12;
        const NON_PROJECTIVE_SHADOWS     = 1 << 13;
        const LANDSCAPE                  = 1 << 14;
        const REFRACTION                 = 1 << 15;
        const FIRE_REFRACTION            = 1 << 16;
        const EYE_ENVIRONMENT_MAPPING    = 1 << 17;
        const HAIR_SOFT_LIGHTING         = 1 << 18;
        const SCREENDOOR_ALPHA_FADE      = 1 << 19;
        const LOCALMAP_HIDE_SECRET       = 1 << 20;
        const FACEGEN_RGB_TINT           = 1 << 21;
        const OWN_EMIT                   = 1 << 22;
        const PROJECTED_UV               = 1 << 23;
        const MULTIPLE_TEXTURES          = 1 << 24;
        const REMAPPABLE_TEXTURES        = 1 << 25;
        const DECAL                      = 1 << 26;
        const DYNAMIC_DECAL              = 1 << 27;
        const PARALLAX_OCCLUSION         = 1 << 28;
        const EXTERNAL_EMITTANCE         = 1 << 29;
        const SOFT_EFFECT                = 1 << 30;
        const ZBUFFER_TEST               = 1 << 31;
    }
}

bitflags! {
    /// Second shader flag word.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ShaderFlags2: u32 {
        const ZBUFFER_WRITE                 = 1;
        const LOD_LANDSCAPE                 = 1 << 1;
        const LOD_OBJECTS                   = 1 << 2;
        const NO_FADE                       = 1 << 3;
        const DOUBLE_SIDED                  = 1 << 4;
        const VERTEX_COLORS                 = 1 << 5;
        const GLOW_MAP                      = 1 << 6;
        const ASSUME_SHADOWMASK             = 1 << 7;
        const PACKED_TANGENT                = 1 << 8;
        const MULTI_INDEX_SNOW              = 1 << 9;
        const VERTEX_LIGHTING               = 1 << 10;
        const UNIFORM_SCALE                 = 1 << 11;
        const FIT_SLOPE                     = 1 << 12;
        const BILLBOARD                     = 1 << 13;
        const NO_LOD_LAND_BLEND             = 1 << 14;
        const ENVMAP_LIGHT_FADE             = 1 << 15;
        const WIREFRAME                     = 1 << 16;
        const WEAPON_BLOOD                  = 1 << 17;
        const HIDE_ON_LOCAL_MAP             = 1 << 18;
        const PREMULT_ALPHA                 = 1 << 19;
        const CLOUD_LOD                     = 1 << 20;
        const ANISOTROPIC_LIGHTING          = 1 << 21;
        const NO_TRANSPARENCY_MULTISAMPLING = 1 << 22;
        const UNUSED01                      = 1 << 23;
        const MULTI_LAYER_PARALLAX          = 1 << 24;
        const SOFT_LIGHTING                 = 1 << 25;
        const RIM_LIGHTING                  = 1 << 26;
        const BACK_LIGHTING                 = 1 << 27;
        const UNUSED02                      = 1 << 28;
        const TREE_ANIM                     = 1 << 29;
        const EFFECT_LIGHTING               = 1 << 30;
        const HD_LOD_OBJECTS                = 1 << 31;
    }
}

/// Lighting shader variant ("Skyrim Shader Type"). Open-ended: unknown raw
/// values are kept as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShaderType(pub u32);

impl ShaderType {
    pub const DEFAULT: Self = Self(0);
    pub const ENVIRONMENT_MAP: Self = Self(1);
    pub const GLOW: Self = Self(2);
    pub const HEIGHTMAP: Self = Self(3);
    pub const FACE_TINT: Self = Self(4);
    pub const SKIN_TINT: Self = Self(5);
    pub const HAIR_TINT: Self = Self(6);
    pub const PARALLAX_OCCLUSION: Self = Self(7);
    pub const MULTI_TEXTURE_LANDSCAPE: Self = Self(8);
    pub const LOD_LANDSCAPE: Self = Self(9);
    pub const MULTI_LAYER_PARALLAX: Self = Self(11);
    pub const SPARKLE_SNOW: Self = Self(14);
    pub const EYE_ENVMAP: Self = Self(16);
}

/// Texture addressing of the shader texture slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TexClampMode {
    ClampSClampT,
    ClampSWrapT,
    WrapSClampT,
    #[default]
    WrapSWrapT,
    MirroredSMirroredT,
}

impl TexClampMode {
    #[must_use]
    pub fn from_raw(mode: u32) -> Self {
        match mode {
            0 => Self::ClampSClampT,
            1 => Self::ClampSWrapT,
            2 => Self::WrapSClampT,
            4 => Self::MirroredSMirroredT,
            _ => Self::WrapSWrapT,
        }
    }

    /// Mode implied by a material file's tile flags.
    #[must_use]
    pub fn from_tiling(tile_u: bool, tile_v: bool) -> Self {
        match (tile_u, tile_v) {
            (true, true) => Self::WrapSWrapT,
            (true, false) => Self::WrapSClampT,
            (false, true) => Self::ClampSWrapT,
            (false, false) => Self::ClampSClampT,
        }
    }

    #[must_use]
    pub fn as_raw(self) -> u32 {
        match self {
            Self::ClampSClampT => 0,
            Self::ClampSWrapT => 1,
            Self::WrapSClampT => 2,
            Self::WrapSWrapT => 3,
            Self::MirroredSMirroredT => 4,
        }
    }

    /// `(s, t)` wrap modes.
    #[must_use]
    pub fn wrap_modes(self) -> (TexWrap, TexWrap) {
        match self {
            Self::ClampSClampT => (TexWrap::Clamp, TexWrap::Clamp),
            Self::ClampSWrapT => (TexWrap::Clamp, TexWrap::Repeat),
            Self::WrapSClampT => (TexWrap::Repeat, TexWrap::Clamp),
            Self::WrapSWrapT => (TexWrap::Repeat, TexWrap::Repeat),
            Self::MirroredSMirroredT => (TexWrap::MirroredRepeat, TexWrap::MirroredRepeat),
        }
    }
}

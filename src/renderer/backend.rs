//! The GPU and texture collaborators the renderer configures.
//!
//! [`GpuBackend`] is a thin resource layer: shader compile and program link,
//! uniform lookup, texture units, render state and draw submission.
//! [`TextureCache`] resolves texture file names and reports how many mip
//! levels the bound image has. Both are driven from the single render
//! thread; a texture that is not ready yet simply fails to bind.

use glam::{Mat4, Vec2, Vec3, Vec4};
use smallvec::SmallVec;

use super::state::{RenderState, TextureStage};
use crate::assets::BlockId;
use crate::errors::Result;
use crate::properties::{TexFilter, TexTransform, TexWrap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Stage implied by a shader file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "vert" => Some(Self::Vertex),
            "frag" => Some(Self::Fragment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub i32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
}

/// Per-texture sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SamplerState {
    pub wrap_s: TexWrap,
    pub wrap_t: TexWrap,
    /// Minification filter used when the image has mipmaps.
    pub filter: TexFilter,
    pub max_anisotropy: Option<f32>,
    pub transform: Option<TexTransform>,
    pub cube: bool,
}

impl SamplerState {
    /// Repeating, trilinear sampling.
    pub const REPEAT: Self = Self {
        wrap_s: TexWrap::Repeat,
        wrap_t: TexWrap::Repeat,
        filter: TexFilter::LinearMipmapLinear,
        max_anisotropy: None,
        transform: None,
        cube: false,
    };

    /// Cube map sampling.
    pub const CUBE: Self = Self {
        wrap_s: TexWrap::Clamp,
        wrap_t: TexWrap::Clamp,
        filter: TexFilter::LinearMipmapLinear,
        max_anisotropy: None,
        transform: None,
        cube: true,
    };
}

/// Data fed to a texture-coordinate channel.
#[derive(Debug, Clone, Copy)]
pub enum TexCoordSource<'a> {
    Uv(&'a [Vec2]),
    Tangents(&'a [Vec3]),
    Bitangents(&'a [Vec3]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorSource<'a> {
    PerVertex(&'a [Vec4]),
    Constant(Vec4),
}

/// One mesh submission.
#[derive(Debug, Clone)]
pub struct DrawCall<'a> {
    pub block: BlockId,
    pub positions: &'a [Vec3],
    pub normals: &'a [Vec3],
    pub colors: ColorSource<'a>,
    /// Model-view matrix for rigid meshes; skinned vertices are already in
    /// view space.
    pub model_view: Option<Mat4>,
    pub triangles: SmallVec<[&'a [[u32; 3]]; 3]>,
    pub strips: &'a [Vec<u32>],
    pub double_sided: bool,
    /// `(factor, units)`; translucent meshes sit slightly in front.
    pub polygon_offset: (f32, f32),
}

/// GPU resource layer.
pub trait GpuBackend {
    /// `false` when programmable shading is unavailable.
    fn supports_shaders(&self) -> bool {
        true
    }

    /// Compiles a shader; the error carries the compile log.
    fn compile_shader(&mut self, name: &str, stage: ShaderStage, source: &str) -> Result<ShaderHandle>;

    /// Links a program; the error carries the link log.
    fn link_program(&mut self, name: &str, shaders: &[ShaderHandle]) -> Result<ProgramHandle>;

    fn release_shader(&mut self, shader: ShaderHandle);

    fn release_program(&mut self, program: ProgramHandle);

    /// `None` when the program has no such active uniform.
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    fn use_program(&mut self, program: Option<ProgramHandle>);

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    /// Makes `unit` the target of texture binds. `false` if the unit does
    /// not exist.
    fn activate_texture_unit(&mut self, unit: u32) -> bool;

    fn set_texcoords(&mut self, unit: u32, source: TexCoordSource<'_>);

    /// Disables every texture unit and coordinate channel.
    fn reset_texture_units(&mut self);

    fn apply_render_state(&mut self, state: &RenderState);

    /// Fixed-function combiner setup, one entry per active stage.
    fn set_texture_stages(&mut self, stages: &[TextureStage]);

    fn draw(&mut self, call: &DrawCall<'_>);
}

/// Texture loader and cache.
pub trait TextureCache {
    /// Binds a texture to the active unit. Returns its mip level count, zero
    /// if it could not be bound.
    fn bind(&mut self, name: &str, sampler: &SamplerState) -> u32;

    /// Drops every cached texture.
    fn flush(&mut self);
}

/// Texture cache that never binds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTextureCache;

impl TextureCache for NullTextureCache {
    fn bind(&mut self, _name: &str, _sampler: &SamplerState) -> u32 {
        0
    }

    fn flush(&mut self) {}
}

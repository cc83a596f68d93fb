//! In-memory [`GpuBackend`] and [`TextureCache`] that record what they are
//! asked to do. Used by headless tools and tests.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::backend::{
    DrawCall, GpuBackend, ProgramHandle, SamplerState, ShaderHandle, ShaderStage, TexCoordSource,
    TextureCache, UniformLocation, UniformValue,
};
use super::state::{RenderState, TextureStage};
use crate::assets::BlockId;
use crate::errors::{Result, ViewerError};

/// Locations of one program are `program * LOCATION_STRIDE + index`.
const LOCATION_STRIDE: i32 = 1024;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    UseProgram(Option<String>),
    ActivateUnit(u32),
    TexCoords { unit: u32, kind: TexCoordKind, len: usize },
    ResetUnits,
    RenderState(RenderState),
    TextureStages(Vec<TextureStage>),
    Uniform { name: String, value: UniformValue },
    Draw(DrawSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexCoordKind {
    Uv,
    Tangents,
    Bitangents,
}

/// What reached the backend for one draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawSummary {
    pub block: BlockId,
    pub vertices: usize,
    pub triangles: usize,
    pub strips: usize,
    pub rigid: bool,
    pub program: Option<String>,
}

/// Backend that compiles nothing and records everything.
#[derive(Debug)]
pub struct RecordingBackend {
    shaders_supported: bool,
    texture_units: u32,
    next_handle: u32,
    /// Uniforms each linked program exposes, by program name.
    declared: FxHashMap<String, Vec<String>>,
    failing_shaders: FxHashSet<String>,
    failing_programs: FxHashSet<String>,
    shaders: FxHashMap<ShaderHandle, String>,
    programs: FxHashMap<ProgramHandle, String>,
    current: Option<ProgramHandle>,
    calls: Vec<BackendCall>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shaders_supported: true,
            texture_units: 8,
            next_handle: 1,
            declared: FxHashMap::default(),
            failing_shaders: FxHashSet::default(),
            failing_programs: FxHashSet::default(),
            shaders: FxHashMap::default(),
            programs: FxHashMap::default(),
            current: None,
            calls: Vec::new(),
        }
    }

    /// A backend without programmable shading.
    #[must_use]
    pub fn fixed_only() -> Self {
        Self {
            shaders_supported: false,
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_texture_units(mut self, units: u32) -> Self {
        self.texture_units = units;
        self
    }

    /// Declares the active uniforms `program` will expose once linked.
    pub fn declare_uniforms(&mut self, program: &str, names: &[&str]) {
        self.declared
            .entry(program.to_owned())
            .or_default()
            .extend(names.iter().map(|n| (*n).to_owned()));
    }

    pub fn fail_shader(&mut self, name: &str) {
        self.failing_shaders.insert(name.to_owned());
    }

    pub fn fail_link(&mut self, program: &str) {
        self.failing_programs.insert(program.to_owned());
    }

    #[must_use]
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawSummary> {
        self.calls.iter().filter_map(|c| match c {
            BackendCall::Draw(d) => Some(d),
            _ => None,
        })
    }

    /// Last value set for a uniform name, across programs.
    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.calls.iter().rev().find_map(|c| match c {
            BackendCall::Uniform { name: n, value } if n == name => Some(*value),
            _ => None,
        })
    }

    fn alloc(&mut self) -> u32 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    fn program_name(&self, handle: ProgramHandle) -> Option<&String> {
        self.programs.get(&handle)
    }

    fn uniform_name(&self, location: UniformLocation) -> Option<String> {
        let program = ProgramHandle((location.0 / LOCATION_STRIDE) as u32);
        let index = (location.0 % LOCATION_STRIDE) as usize;
        let name = self.program_name(program)?;
        self.declared.get(name)?.get(index).cloned()
    }
}

impl GpuBackend for RecordingBackend {
    fn supports_shaders(&self) -> bool {
        self.shaders_supported
    }

    fn compile_shader(&mut self, name: &str, _stage: ShaderStage, _source: &str) -> Result<ShaderHandle> {
        if self.failing_shaders.contains(name) {
            return Err(ViewerError::ShaderCompile {
                shader: name.to_owned(),
                log: "rejected by recording backend".to_owned(),
            });
        }
        let handle = ShaderHandle(self.alloc());
        self.shaders.insert(handle, name.to_owned());
        Ok(handle)
    }

    fn link_program(&mut self, name: &str, shaders: &[ShaderHandle]) -> Result<ProgramHandle> {
        if self.failing_programs.contains(name) || shaders.iter().any(|s| !self.shaders.contains_key(s)) {
            return Err(ViewerError::ProgramLink {
                program: name.to_owned(),
                log: "rejected by recording backend".to_owned(),
            });
        }
        let handle = ProgramHandle(self.alloc());
        self.programs.insert(handle, name.to_owned());
        Ok(handle)
    }

    fn release_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader);
    }

    fn release_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        let declared = self.declared.get(self.program_name(program)?)?;
        let index = declared.iter().position(|n| n == name)?;
        Some(UniformLocation(program.0 as i32 * LOCATION_STRIDE + index as i32))
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.current = program;
        let name = program.and_then(|p| self.program_name(p)).cloned();
        self.calls.push(BackendCall::UseProgram(name));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        if let Some(name) = self.uniform_name(location) {
            self.calls.push(BackendCall::Uniform { name, value });
        }
    }

    fn activate_texture_unit(&mut self, unit: u32) -> bool {
        if unit >= self.texture_units {
            return false;
        }
        self.calls.push(BackendCall::ActivateUnit(unit));
        true
    }

    fn set_texcoords(&mut self, unit: u32, source: TexCoordSource<'_>) {
        let (kind, len) = match source {
            TexCoordSource::Uv(uv) => (TexCoordKind::Uv, uv.len()),
            TexCoordSource::Tangents(t) => (TexCoordKind::Tangents, t.len()),
            TexCoordSource::Bitangents(b) => (TexCoordKind::Bitangents, b.len()),
        };
        self.calls.push(BackendCall::TexCoords { unit, kind, len });
    }

    fn reset_texture_units(&mut self) {
        self.calls.push(BackendCall::ResetUnits);
    }

    fn apply_render_state(&mut self, state: &RenderState) {
        self.calls.push(BackendCall::RenderState(*state));
    }

    fn set_texture_stages(&mut self, stages: &[TextureStage]) {
        self.calls.push(BackendCall::TextureStages(stages.to_vec()));
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        let program = self.current.and_then(|p| self.program_name(p)).cloned();
        self.calls.push(BackendCall::Draw(DrawSummary {
            block: call.block,
            vertices: call.positions.len(),
            triangles: call.triangles.iter().map(|t| t.len()).sum(),
            strips: call.strips.len(),
            rigid: call.model_view.is_some(),
            program,
        }));
    }
}

/// Texture cache over a fixed name → mip count table. Every bind attempt is
/// logged in a shared list so tests can inspect it after handing the cache
/// to a scene. The table stands in for files on disk and survives a flush.
#[derive(Debug, Clone, Default)]
pub struct MemoryTextureCache {
    textures: FxHashMap<String, u32>,
    binds: Rc<RefCell<Vec<(String, SamplerState)>>>,
}

impl MemoryTextureCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a texture with `mipmaps` levels.
    #[must_use]
    pub fn with(mut self, name: &str, mipmaps: u32) -> Self {
        self.textures.insert(name.to_owned(), mipmaps);
        self
    }

    /// Shared handle on the bind log.
    #[must_use]
    pub fn bind_log(&self) -> Rc<RefCell<Vec<(String, SamplerState)>>> {
        Rc::clone(&self.binds)
    }
}

impl TextureCache for MemoryTextureCache {
    fn bind(&mut self, name: &str, sampler: &SamplerState) -> u32 {
        self.binds.borrow_mut().push((name.to_owned(), *sampler));
        self.textures.get(name).copied().unwrap_or(0)
    }

    fn flush(&mut self) {
        self.binds.borrow_mut().clear();
    }
}

//! Program registry and per-mesh shading setup.
//!
//! The [`Renderer`] owns every compiled shader and linked [`Program`]. For
//! each mesh it picks the first program whose condition tree accepts the
//! mesh's blocks and whose textures bind, configures it, and falls back to a
//! fixed-function configuration when nothing fits.

mod backend;
pub mod condition;
mod program;
pub mod recording;
mod state;

use std::collections::BTreeMap;
use std::path::Path;

use glam::Vec4;
use smallvec::SmallVec;

pub use backend::{
    ColorSource, DrawCall, GpuBackend, NullTextureCache, ProgramHandle, SamplerState,
    ShaderHandle, ShaderStage, TexCoordSource, TextureCache, UniformLocation, UniformValue,
};
pub use program::{BITANGENTS, Program, TANGENTS};
pub use state::{
    AlphaTestState, BlendState, ColorMaterial, Combine, DepthState, MaterialColors, RenderState,
    StencilState, TextureStage,
};

use crate::assets::{AssetGraph, BlockId};
use crate::errors::{Result, ViewerError};
use crate::properties::{
    PropertyList, PropertyType, ShaderLightingProperty, ShaderVariant, TexDesc, TexFilter,
    TexWrap, TextureProperty, TexturingProperty,
};
use crate::scene::{Mesh, NodeKey, Scene, SceneOptions, VisMode};

/// Name reported when no program is in use.
pub const FIXED_FUNCTION: &str = "fixed function pipeline";

/// Outcome of program selection for one mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramSelection {
    Program(String),
    FixedFunction,
}

impl ProgramSelection {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Program(name) => name,
            Self::FixedFunction => FIXED_FUNCTION,
        }
    }

    /// The selected program, `None` for the fixed pipeline.
    #[must_use]
    pub fn program_name(&self) -> Option<&str> {
        match self {
            Self::Program(name) => Some(name),
            Self::FixedFunction => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_fixed_function(&self) -> bool {
        matches!(self, Self::FixedFunction)
    }
}

/// Everything program setup reads for one mesh.
struct DrawContext<'a> {
    graph: &'a dyn AssetGraph,
    scene: &'a Scene,
    mesh: &'a Mesh,
    props: &'a PropertyList,
    blocks: &'a [BlockId],
}

impl DrawContext<'_> {
    fn bind(&self, name: &str, sampler: &SamplerState) -> bool {
        self.scene.bind_texture(name, sampler) > 0
    }

    fn options(&self) -> SceneOptions {
        self.scene.options
    }
}

/// Shader and program registry over a GPU backend.
pub struct Renderer<B: GpuBackend> {
    backend: B,
    /// `None` marks a shader that failed to compile.
    shaders: BTreeMap<String, Option<ShaderHandle>>,
    /// Tried in name order.
    programs: BTreeMap<String, Program>,
    use_shaders: bool,
}

impl<B: GpuBackend> std::fmt::Debug for Renderer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("shaders", &self.shaders.keys().collect::<Vec<_>>())
            .field("programs", &self.programs.keys().collect::<Vec<_>>())
            .field("use_shaders", &self.use_shaders)
            .finish_non_exhaustive()
    }
}

impl<B: GpuBackend> Renderer<B> {
    #[must_use]
    pub fn new(backend: B, use_shaders: bool) -> Self {
        Self {
            backend,
            shaders: BTreeMap::new(),
            programs: BTreeMap::new(),
            use_shaders,
        }
    }

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn set_use_shaders(&mut self, use_shaders: bool) {
        self.use_shaders = use_shaders;
    }

    #[must_use]
    pub fn programs(&self) -> impl Iterator<Item = &Program> {
        self.programs.values()
    }

    #[must_use]
    pub fn program(&self, name: &str) -> Option<&Program> {
        self.programs.get(name)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Drops every shader and program.
    pub fn release_all(&mut self) {
        for program in std::mem::take(&mut self.programs).into_values() {
            if let Some(handle) = program.handle {
                self.backend.release_program(handle);
            }
        }
        for handle in std::mem::take(&mut self.shaders).into_values().flatten() {
            self.backend.release_shader(handle);
        }
    }

    /// Reloads the shader directory: `*.vert` and `*.frag` first, then
    /// `*.prog`, each in name order. Files that fail are logged and skipped.
    pub fn update_shaders(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        self.release_all();
        if !self.backend.supports_shaders() {
            return Ok(());
        }

        let mut files: Vec<_> = std::fs::read_dir(dir.as_ref())?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        let name_of = |p: &Path| p.file_name().and_then(|n| n.to_str()).map(str::to_owned);
        let ext_of = |p: &Path| p.extension().and_then(|e| e.to_str()).map(str::to_owned);

        for path in &files {
            let (Some(name), Some(ext)) = (name_of(path), ext_of(path)) else {
                continue;
            };
            let Some(stage) = ShaderStage::from_extension(&ext) else {
                continue;
            };
            let source = std::fs::read_to_string(path)?;
            if let Err(e) = self.load_shader(&name, stage, &source) {
                log::warn!("{e}");
            }
        }

        for path in &files {
            let (Some(name), Some(ext)) = (name_of(path), ext_of(path)) else {
                continue;
            };
            if ext != "prog" {
                continue;
            }
            let text = std::fs::read_to_string(path)?;
            if let Err(e) = self.load_program(&name, &text) {
                log::warn!("{e}");
            }
        }

        log::info!(
            "Loaded {} shaders and {} programs ({} usable)",
            self.shaders.len(),
            self.programs.len(),
            self.programs.values().filter(|p| p.is_usable()).count()
        );
        Ok(())
    }

    /// Compiles a shader. A failed compile is still registered, so programs
    /// linking it become unusable.
    pub fn load_shader(&mut self, name: &str, stage: ShaderStage, source: &str) -> Result<()> {
        if let Some(old) = self.shaders.remove(name).flatten() {
            self.backend.release_shader(old);
        }
        let compiled = self.backend.compile_shader(name, stage, source);
        let handle = compiled.as_ref().ok().copied();
        self.shaders.insert(name.to_owned(), handle);
        compiled.map(|_| ())
    }

    /// Parses and links a program. Parse errors leave it unregistered; link
    /// errors register it as unusable.
    pub fn load_program(&mut self, name: &str, text: &str) -> Result<()> {
        let mut program = Program::parse(name, text)?;
        if let Some(old) = self.programs.remove(name).and_then(|p| p.handle) {
            self.backend.release_program(old);
        }

        let mut handles: SmallVec<[ShaderHandle; 4]> = SmallVec::new();
        let mut missing = None;
        for shader in program.shaders() {
            match self.shaders.get(shader) {
                Some(Some(h)) => handles.push(*h),
                _ => {
                    missing = Some(shader.clone());
                    break;
                }
            }
        }

        let linked = match missing {
            Some(shader) => Err(ViewerError::ProgramLink {
                program: name.to_owned(),
                log: format!("shader '{shader}' not found or not compiled"),
            }),
            None if handles.is_empty() => Err(ViewerError::ProgramLink {
                program: name.to_owned(),
                log: "no shaders listed".to_owned(),
            }),
            None => self.backend.link_program(name, &handles),
        };

        program.handle = linked.as_ref().ok().copied();
        log::debug!("Program {name}: {} shaders, usable {}", handles.len(), program.is_usable());
        self.programs.insert(name.to_owned(), program);
        linked.map(|_| ())
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Selects and configures shading for the mesh at `key`. `hint` is the
    /// program chosen on the previous frame and is tried first.
    pub fn setup_program(
        &mut self,
        graph: &dyn AssetGraph,
        scene: &Scene,
        key: NodeKey,
        hint: Option<&str>,
    ) -> ProgramSelection {
        let Some(node) = scene.node(key) else {
            return ProgramSelection::FixedFunction;
        };
        let Some(mesh) = node.mesh() else {
            return ProgramSelection::FixedFunction;
        };
        let props = scene.active_properties(key);

        let programmable = self.use_shaders
            && self.backend.supports_shaders()
            && !scene.options.contains(SceneOptions::DISABLE_SHADERS)
            && !scene.vis_mode.contains(VisMode::SILHOUETTE);

        if programmable {
            let mut blocks = vec![node.block()];
            blocks.extend(mesh.data());
            blocks.extend(props.blocks());

            let cx = DrawContext {
                graph,
                scene,
                mesh,
                props: &props,
                blocks: &blocks,
            };

            if let Some(hint) = hint
                && self.try_program(&cx, hint)
            {
                return ProgramSelection::Program(hint.to_owned());
            }

            let names: Vec<String> = self
                .programs
                .keys()
                .filter(|n| Some(n.as_str()) != hint)
                .cloned()
                .collect();
            for name in names {
                if self.try_program(&cx, &name) {
                    return ProgramSelection::Program(name);
                }
            }
        }

        self.stop_program();
        self.setup_fixed_function(graph, scene, mesh, &props);
        ProgramSelection::FixedFunction
    }

    /// Resets program and texture state after a draw.
    pub fn stop_program(&mut self) {
        self.backend.use_program(None);
        self.backend.reset_texture_units();
    }

    pub fn draw(&mut self, call: &DrawCall<'_>) {
        self.backend.draw(call);
    }

    fn uniform(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.backend.uniform_location(program, name)
    }

    fn set(&mut self, program: ProgramHandle, name: &str, value: UniformValue) {
        if let Some(loc) = self.uniform(program, name) {
            self.backend.set_uniform(loc, value);
        }
    }

    /// Activates `unit`, binds `name` there and points `uniform` at it.
    fn bind_sampler(
        &mut self,
        cx: &DrawContext<'_>,
        loc: UniformLocation,
        unit: &mut u32,
        name: &str,
        sampler: &SamplerState,
    ) -> bool {
        if !self.backend.activate_texture_unit(*unit) || !cx.bind(name, sampler) {
            return false;
        }
        self.backend.set_uniform(loc, UniformValue::Int(*unit as i32));
        *unit += 1;
        true
    }

    /// Configures `name` for the current mesh; `false` when its conditions
    /// reject the mesh or a required texture or coordinate set is missing.
    fn try_program(&mut self, cx: &DrawContext<'_>, name: &str) -> bool {
        let Some(program) = self.programs.get(name) else {
            return false;
        };
        let Some(handle) = program.handle() else {
            return false;
        };
        if !program.accepts(cx.graph, cx.blocks) {
            return false;
        }
        let texcoords: SmallVec<[(u32, String); 4]> =
            program.texcoords().map(|(u, s)| (u, s.to_owned())).collect();

        self.backend.use_program(Some(handle));

        let texprop = cx.props.get::<TexturingProperty>();
        let bsprop = cx.props.get::<ShaderLightingProperty>();
        let bs_block = cx
            .props
            .get_shared(PropertyType::ShaderLighting)
            .map(|p| p.borrow().block());
        let bs_file = |id: usize| match (&bsprop, bs_block) {
            (Some(bs), Some(block)) => bs.file_name(cx.graph, block, id),
            _ => String::new(),
        };
        let bs_sampler = bsprop.as_deref().map_or(SamplerState::REPEAT, clamp_sampler);

        let mut unit = 0u32;

        if let Some(loc) = self.uniform(handle, "BaseMap") {
            let ok = match (&texprop, &bsprop) {
                (Some(tex), _) => {
                    let file = tex.file_name(cx.graph, 0);
                    self.bind_sampler(cx, loc, &mut unit, &file, &slot_sampler(tex, 0))
                }
                (None, Some(_)) => {
                    let file = bs_file(0);
                    self.bind_sampler(cx, loc, &mut unit, &file, &bs_sampler)
                }
                (None, None) => false,
            };
            if !ok {
                return false;
            }
        }

        // Effect shaders keep their normal map in slot 3 and have no glow map.
        let effect = bsprop.as_ref().is_some_and(|bs| bs.variant == ShaderVariant::Effect);
        for (uniform, suffix, bs_id) in [
            ("NormalMap", "_n", if effect { Some(3) } else { Some(1) }),
            ("GlowMap", "_g", if effect { None } else { Some(2) }),
        ] {
            let Some(loc) = self.uniform(handle, uniform) else {
                continue;
            };
            if let Some(tex) = &texprop {
                let base = tex.file_name(cx.graph, 0);
                if base.is_empty() {
                    return false;
                }
                let file = derived_map_name(&base, suffix);
                if !self.bind_sampler(cx, loc, &mut unit, &file, &slot_sampler(tex, 0)) {
                    return false;
                }
                continue;
            }
            // a shader property without this map still reserves the unit
            let file = bs_id.map(&bs_file).unwrap_or_default();
            if file.is_empty() {
                self.backend.set_uniform(loc, UniformValue::Int(unit as i32));
                unit += 1;
            } else if !self.bind_sampler(cx, loc, &mut unit, &file, &bs_sampler) {
                return false;
            }
        }

        for (tc_unit, id) in &texcoords {
            if !self.backend.activate_texture_unit(*tc_unit) {
                return false;
            }
            let transformed = cx.mesh.transformed();
            let source = match id.as_str() {
                TANGENTS => {
                    if transformed.tangents.is_empty() {
                        return false;
                    }
                    TexCoordSource::Tangents(&transformed.tangents)
                }
                BITANGENTS => {
                    if transformed.bitangents.is_empty() {
                        return false;
                    }
                    TexCoordSource::Bitangents(&transformed.bitangents)
                }
                _ => {
                    let set = if let Some(tex) = &texprop {
                        let Some(set) = TexturingProperty::get_id(id).and_then(|i| tex.coord_set(i)) else {
                            return false;
                        };
                        set as usize
                    } else if bsprop.is_some() {
                        if ShaderLightingProperty::get_id(id).is_none() {
                            return false;
                        }
                        0
                    } else {
                        return false;
                    };
                    match cx.mesh.coords().get(set) {
                        Some(uv) if !uv.is_empty() => TexCoordSource::Uv(uv),
                        _ => return false,
                    }
                }
            };
            self.backend.set_texcoords(*tc_unit, source);
        }

        if let Some(bs) = &bsprop {
            self.set_shader_uniforms(cx, handle, bs, &bs_file, &bs_sampler, &mut unit);
        }

        let state = RenderState::for_program(cx.props, cx.options());
        self.backend.apply_render_state(&state);
        true
    }

    /// Parameter uniforms and optional maps of a shader property. A map that
    /// fails to bind switches its feature off instead of failing the program.
    fn set_shader_uniforms(
        &mut self,
        cx: &DrawContext<'_>,
        handle: ProgramHandle,
        bs: &ShaderLightingProperty,
        bs_file: &dyn Fn(usize) -> String,
        sampler: &SamplerState,
        unit: &mut u32,
    ) {
        use UniformValue::{Bool, Float, Vec2 as V2, Vec3 as V3, Vec4 as V4};

        let options = cx.options();
        let lighting = options.contains(SceneOptions::DO_LIGHTING);
        let specular = options.contains(SceneOptions::DO_SPECULAR);
        let glow = options.contains(SceneOptions::DO_GLOW);
        let cube = options.contains(SceneOptions::DO_CUBE_MAPPING);
        let c = &bs.common;

        self.set(handle, "alpha", Float(c.alpha));
        self.set(handle, "uvScale", V2(c.uv_scale));
        self.set(handle, "uvOffset", V2(c.uv_offset));
        self.set(handle, "isDoubleSided", Bool(c.double_sided));
        self.set(handle, "hasVertexColors", Bool(c.has_vertex_colors));
        self.set(handle, "hasVertexAlpha", Bool(c.has_vertex_alpha));
        self.set(handle, "lightingEnabled", Bool(lighting));

        let mut optional_map = |this: &mut Self, uniform: &str, id: usize, enabled: bool, s: &SamplerState| {
            let Some(loc) = this.uniform(handle, uniform) else {
                return false;
            };
            if !enabled {
                return false;
            }
            let file = bs_file(id);
            !file.is_empty() && this.bind_sampler(cx, loc, unit, &file, s)
        };

        if let Some(p) = bs.lighting() {
            let stream = cx.graph.version().stream;
            let spec_id = if stream >= 130 && bs.material.is_none() { 2 } else { 7 };

            let has_spec = specular && p.specular_strength > 0.0;
            let spec_map = optional_map(self, "SpecularMap", spec_id, has_spec && p.has_specular_map, sampler);
            let height_map = optional_map(self, "HeightMap", 3, p.has_height_map, sampler);
            let tint_mask = optional_map(self, "TintMask", 6, p.has_tint_mask, sampler);
            let detail_mask = optional_map(self, "DetailMask", 3, p.has_detail_mask, sampler);
            let cube_map = optional_map(self, "CubeMap", 4, cube && p.has_cube_map, &SamplerState::CUBE);
            let env_mask = optional_map(self, "EnvironmentMap", 5, cube_map && p.use_environment_mask, sampler);

            self.set(handle, "hasSpecular", Bool(has_spec));
            self.set(handle, "hasSpecularMap", Bool(spec_map));
            self.set(handle, "specColor", V3(p.specular_color));
            self.set(handle, "specGlossiness", Float(p.specular_gloss));
            self.set(handle, "specStrength", Float(p.specular_strength));
            self.set(handle, "fresnelPower", Float(p.fresnel_power));

            self.set(handle, "hasEmit", Bool(glow && p.has_emittance));
            self.set(handle, "hasGlowMap", Bool(glow && p.has_glow_map));
            self.set(handle, "glowColor", V3(p.emissive_color));
            self.set(handle, "glowMult", Float(p.emissive_mult));

            self.set(handle, "hasHeightMap", Bool(height_map));
            self.set(handle, "hasSoftlight", Bool(lighting && p.has_softlight));
            self.set(handle, "hasBacklight", Bool(lighting && p.has_backlight));
            self.set(handle, "hasRimlight", Bool(lighting && p.has_rimlight));
            self.set(handle, "lightingEffect1", Float(p.lighting_effect1));
            self.set(handle, "lightingEffect2", Float(p.lighting_effect2));
            self.set(handle, "rimPower", Float(p.rim_power));
            self.set(handle, "backlightPower", Float(p.backlight_power));
            self.set(handle, "hasModelSpaceNormals", Bool(p.has_model_space_normals));

            self.set(handle, "hasCubeMap", Bool(cube_map));
            self.set(handle, "hasEnvMask", Bool(env_mask));
            self.set(handle, "envReflection", Float(p.environment_reflection));

            self.set(handle, "hasTintColor", Bool(p.has_tint_color));
            self.set(handle, "tintColor", V3(p.tint_color));
            self.set(handle, "hasTintMask", Bool(tint_mask));
            self.set(handle, "hasDetailMask", Bool(detail_mask));

            self.set(handle, "hasMultiLayerParallax", Bool(p.has_multi_layer_parallax));
            self.set(handle, "innerThickness", Float(p.inner_thickness));
            self.set(handle, "innerScale", V2(p.inner_texture_scale));
            self.set(handle, "outerRefraction", Float(p.outer_refraction_strength));
            self.set(handle, "outerReflection", Float(p.outer_reflection_strength));

            self.set(handle, "greyscaleColor", Bool(p.greyscale_color));
            self.set(handle, "paletteScale", Float(p.palette_scale));
        } else if let Some(p) = bs.effect() {
            let greyscale = optional_map(
                self,
                "GreyscaleMap",
                1,
                p.has_greyscale_map && (p.greyscale_alpha || p.greyscale_color),
                &SamplerState {
                    wrap_s: TexWrap::Clamp,
                    wrap_t: TexWrap::Clamp,
                    ..*sampler
                },
            );
            let cube_map = optional_map(self, "CubeMap", 2, cube && p.has_env_map, &SamplerState::CUBE);
            let env_mask = optional_map(self, "EnvironmentMap", 4, cube_map && p.has_env_mask, sampler);

            self.set(handle, "hasSourceTexture", Bool(p.has_source_texture));
            self.set(handle, "hasGreyscaleMap", Bool(greyscale));
            self.set(handle, "greyscaleAlpha", Bool(greyscale && p.greyscale_alpha));
            self.set(handle, "greyscaleColor", Bool(greyscale && p.greyscale_color));
            self.set(handle, "hasCubeMap", Bool(cube_map));
            self.set(handle, "hasEnvMask", Bool(env_mask));
            self.set(handle, "envReflection", Float(p.environment_reflection));
            self.set(handle, "hasNormalMap", Bool(p.has_normal_map));

            self.set(handle, "glowColor", V4(p.emissive_color));
            self.set(handle, "glowMult", Float(if glow { p.emissive_mult } else { 1.0 }));

            let f = &p.falloff;
            self.set(handle, "useFalloff", Bool(p.use_falloff));
            self.set(handle, "hasRGBFalloff", Bool(p.has_rgb_falloff));
            self.set(
                handle,
                "falloffParams",
                V4(Vec4::new(f.start_angle, f.stop_angle, f.start_opacity, f.stop_opacity)),
            );
            self.set(handle, "falloffDepth", Float(f.soft_depth));
            self.set(handle, "hasWeaponBlood", Bool(p.has_weapon_blood));
            self.set(handle, "lightingInfluence", Float(p.lighting_influence));
        }
    }

    // ========================================================================
    // Fixed function
    // ========================================================================

    fn setup_fixed_function(
        &mut self,
        graph: &dyn AssetGraph,
        scene: &Scene,
        mesh: &Mesh,
        props: &PropertyList,
    ) {
        let options = scene.options;
        let has_colors = matches!(mesh.color_source(options), ColorSource::PerVertex(_));
        let has_normals = !mesh.transformed().normals.is_empty();
        let state = RenderState::for_fixed_function(props, options, has_colors, has_normals);
        self.backend.apply_render_state(&state);

        let mut stages: SmallVec<[TextureStage; 4]> = SmallVec::new();

        if let Some(tex) = props.get::<TexturingProperty>() {
            // (slot, combine, rgb scale) in stage order
            const STAGES: [(usize, Combine, f32); 8] = [
                (1, Combine::Modulate, 1.0),
                (0, Combine::Modulate, 1.0),
                (2, Combine::Modulate, 2.0),
                (6, Combine::Interpolate, 1.0),
                (7, Combine::Interpolate, 1.0),
                (8, Combine::Interpolate, 1.0),
                (9, Combine::Interpolate, 1.0),
                (4, Combine::Add, 1.0),
            ];
            for (slot, combine, rgb_scale) in STAGES {
                let Some(desc) = tex.slot(slot) else {
                    continue;
                };
                let unit = stages.len() as u32;
                let coord_set = desc.coord_set as usize;
                let file = tex.file_name(graph, slot);
                if let Some(stage) = self.try_stage(scene, mesh, unit, &file, coord_set, desc_sampler(desc)) {
                    stages.push(TextureStage {
                        combine,
                        rgb_scale,
                        ..stage
                    });
                }
            }
        } else if let Some(tex) = props.get::<TextureProperty>() {
            stages.extend(self.try_stage(scene, mesh, 0, &tex.file_name(graph), 0, SamplerState::REPEAT));
        } else if let Some(bs) = props.get::<ShaderLightingProperty>() {
            let block = props
                .get_shared(PropertyType::ShaderLighting)
                .map(|p| p.borrow().block());
            if let Some(block) = block {
                let file = bs.file_name(graph, block, 0);
                stages.extend(self.try_stage(scene, mesh, 0, &file, 0, clamp_sampler(&bs)));
            }
        }

        self.backend.set_texture_stages(&stages);
    }

    /// One fixed-function stage: the unit must exist, the UV set must be
    /// present and the texture must bind.
    fn try_stage(
        &mut self,
        scene: &Scene,
        mesh: &Mesh,
        unit: u32,
        file: &str,
        coord_set: usize,
        sampler: SamplerState,
    ) -> Option<TextureStage> {
        if !self.backend.activate_texture_unit(unit) {
            return None;
        }
        let uv = mesh.coords().get(coord_set).filter(|uv| !uv.is_empty())?;
        self.backend.set_texcoords(unit, TexCoordSource::Uv(uv));

        let mipmaps = scene.bind_texture(file, &sampler);
        if mipmaps == 0 {
            return None;
        }
        let filter = if mipmaps > 1 { sampler.filter } else { TexFilter::Linear };
        Some(TextureStage {
            unit,
            texture: file.to_owned(),
            coord_set,
            combine: Combine::Modulate,
            rgb_scale: 1.0,
            sampler: SamplerState { filter, ..sampler },
            mipmaps,
        })
    }
}

fn desc_sampler(desc: &TexDesc) -> SamplerState {
    SamplerState {
        wrap_s: desc.wrap_s,
        wrap_t: desc.wrap_t,
        filter: desc.filter,
        max_anisotropy: desc.max_anisotropy,
        transform: desc.transform,
        cube: false,
    }
}

fn slot_sampler(tex: &TexturingProperty, id: usize) -> SamplerState {
    tex.slot(id).map_or(SamplerState::REPEAT, desc_sampler)
}

/// Repeat or clamp per the shader property's clamp mode.
fn clamp_sampler(bs: &ShaderLightingProperty) -> SamplerState {
    let (wrap_s, wrap_t) = bs.common.clamp_mode.wrap_modes();
    SamplerState {
        wrap_s,
        wrap_t,
        ..SamplerState::REPEAT
    }
}

/// `base_n.dds` for `base_d.dds` style names, else the suffix goes before
/// the extension.
#[must_use]
pub fn derived_map_name(base: &str, suffix: &str) -> String {
    if let Some(pos) = base.find('_') {
        format!("{}{suffix}.dds", &base[..pos])
    } else if let Some(pos) = base.rfind('.') {
        format!("{}{suffix}{}", &base[..pos], &base[pos..])
    } else {
        format!("{base}{suffix}")
    }
}

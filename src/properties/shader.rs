//! Flag-driven shader properties and their resolution into one normalized
//! parameter set.
//!
//! Parameters come from one of two sources, resolved on every update:
//!
//! 1. an override material file named by the property, when it loads;
//! 2. otherwise the packed flag words plus the scalar fields of the block.
//!
//! Vertex alpha and vertex colour switches always come from the flag words.
//! A feature that needs a texture is off whenever that texture slot is empty
//! or missing, whatever the flags say.

use std::rc::Rc;

use glam::{Vec2, Vec3, Vec4};

use super::shader_flags::{ShaderFlags1, ShaderFlags2, ShaderType, TexClampMode};
use crate::assets::{
    AssetGraph, BlockId, Compound, MaterialFile, MaterialKind, MaterialProvider, load_material,
};

/// Which concrete shader block a property was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderVariant {
    /// `BSShaderPPLightingProperty`, `BSShaderNoLightingProperty` and the
    /// abstract `BSShaderLightingProperty`.
    Generic,
    /// `BSLightingShaderProperty`.
    Lighting,
    /// `BSEffectShaderProperty`.
    Effect,
    /// `BSWaterShaderProperty`.
    Water,
}

/// Parameters every variant resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonShaderParams {
    pub has_vertex_alpha: bool,
    pub has_vertex_colors: bool,
    pub double_sided: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    pub uv_scale: Vec2,
    pub uv_offset: Vec2,
    pub clamp_mode: TexClampMode,
    pub alpha: f32,
}

impl Default for CommonShaderParams {
    fn default() -> Self {
        Self {
            has_vertex_alpha: false,
            has_vertex_colors: false,
            double_sided: false,
            depth_test: true,
            depth_write: true,
            uv_scale: Vec2::ONE,
            uv_offset: Vec2::ZERO,
            clamp_mode: TexClampMode::WrapSWrapT,
            alpha: 1.0,
        }
    }
}

/// Resolved `BSLightingShaderProperty` parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightingParams {
    pub specular_color: Vec3,
    pub specular_gloss: f32,
    pub specular_strength: f32,
    pub emissive_color: Vec3,
    pub emissive_mult: f32,
    pub has_emittance: bool,
    pub has_glow_map: bool,
    pub has_specular_map: bool,
    pub has_height_map: bool,
    pub has_backlight: bool,
    pub has_rimlight: bool,
    pub has_softlight: bool,
    pub has_model_space_normals: bool,
    pub has_multi_layer_parallax: bool,
    pub has_refraction: bool,
    pub has_fire_refraction: bool,
    pub has_tint_color: bool,
    pub has_tint_mask: bool,
    pub has_detail_mask: bool,
    pub tint_color: Vec3,
    pub lighting_effect1: f32,
    pub lighting_effect2: f32,
    pub inner_thickness: f32,
    pub inner_texture_scale: Vec2,
    pub outer_refraction_strength: f32,
    pub outer_reflection_strength: f32,
    pub has_environment_map: bool,
    pub has_cube_map: bool,
    pub use_environment_mask: bool,
    pub environment_reflection: f32,
    pub fresnel_power: f32,
    pub greyscale_color: bool,
    pub palette_scale: f32,
    pub rim_power: f32,
    pub backlight_power: f32,
}

/// Soft falloff of effect shaders.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Falloff {
    pub start_angle: f32,
    pub stop_angle: f32,
    pub start_opacity: f32,
    pub stop_opacity: f32,
    pub soft_depth: f32,
}

/// Resolved `BSEffectShaderProperty` parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectParams {
    pub emissive_color: Vec4,
    pub emissive_mult: f32,
    pub has_source_texture: bool,
    pub has_greyscale_map: bool,
    pub has_env_map: bool,
    pub has_normal_map: bool,
    pub has_env_mask: bool,
    pub environment_reflection: f32,
    pub greyscale_alpha: bool,
    pub greyscale_color: bool,
    pub use_falloff: bool,
    pub has_rgb_falloff: bool,
    pub has_weapon_blood: bool,
    pub lighting_influence: f32,
    pub falloff: Falloff,
}

/// Variant-specific resolved parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderParams {
    Generic,
    Lighting(LightingParams),
    Effect(EffectParams),
    Water { water_flags: u32 },
}

/// A shader property with its flag words and resolved parameters.
#[derive(Debug, Clone)]
pub struct ShaderLightingProperty {
    pub variant: ShaderVariant,
    pub flags1: ShaderFlags1,
    pub flags2: ShaderFlags2,
    pub shader_type: ShaderType,
    pub texture_set: Option<BlockId>,
    /// Override material, only kept when it loaded successfully.
    pub material: Option<Rc<MaterialFile>>,
    pub common: CommonShaderParams,
    pub params: ShaderParams,
}

impl ShaderLightingProperty {
    /// Builds and resolves a shader property of the given variant.
    #[must_use]
    pub fn read(
        graph: &dyn AssetGraph,
        fields: &Compound,
        variant: ShaderVariant,
        name: &str,
        materials: &dyn MaterialProvider,
    ) -> Self {
        let material = match variant {
            ShaderVariant::Lighting => load_material(name, MaterialKind::Shader, materials),
            ShaderVariant::Effect => load_material(name, MaterialKind::Effect, materials),
            ShaderVariant::Generic | ShaderVariant::Water => None,
        };

        let mut prop = Self {
            variant,
            flags1: ShaderFlags1::empty(),
            flags2: ShaderFlags2::empty(),
            shader_type: ShaderType::DEFAULT,
            texture_set: graph.block_of_type(fields.get_link("Texture Set"), "BSShaderTextureSet"),
            material,
            common: CommonShaderParams::default(),
            params: ShaderParams::Generic,
        };
        prop.resolve(graph, fields);
        prop
    }

    fn resolve(&mut self, graph: &dyn AssetGraph, fields: &Compound) {
        self.flags1 = ShaderFlags1::from_bits_retain(read_flags1(fields));
        self.flags2 = ShaderFlags2::from_bits_retain(fields.get_u32("Shader Flags 2"));
        self.common = CommonShaderParams {
            has_vertex_alpha: self.flags1.contains(ShaderFlags1::VERTEX_ALPHA),
            has_vertex_colors: self.flags2.contains(ShaderFlags2::VERTEX_COLORS),
            ..CommonShaderParams::default()
        };

        self.params = match self.variant {
            ShaderVariant::Lighting => {
                self.shader_type = ShaderType(fields.get_u32("Skyrim Shader Type"));
                let textures = self.texture_set_strings(graph);
                let material = self.material.clone();
                match material.as_deref().and_then(MaterialFile::as_shader) {
                    Some(m) => ShaderParams::Lighting(self.lighting_from_material(m)),
                    None => ShaderParams::Lighting(self.lighting_from_flags(graph, fields, &textures)),
                }
            }
            ShaderVariant::Effect => {
                let material = self.material.clone();
                match material.as_deref().and_then(MaterialFile::as_effect) {
                    Some(m) => ShaderParams::Effect(self.effect_from_material(m)),
                    None => ShaderParams::Effect(self.effect_from_flags(graph, fields)),
                }
            }
            ShaderVariant::Water => ShaderParams::Water {
                water_flags: fields.get_u32("Water Shader Flags"),
            },
            ShaderVariant::Generic => {
                self.common.clamp_mode = TexClampMode::from_raw(fields.get_u32("Texture Clamp Mode"));
                ShaderParams::Generic
            }
        };
    }

    fn texture_set_strings(&self, graph: &dyn AssetGraph) -> Vec<String> {
        self.texture_set
            .and_then(|s| graph.fields(s))
            .map(|f| f.get_string_array("Textures"))
            .unwrap_or_default()
    }

    fn lighting_from_flags(
        &mut self,
        graph: &dyn AssetGraph,
        f: &Compound,
        textures: &[String],
    ) -> LightingParams {
        let sf1 = self.flags1;
        let sf2 = self.flags2;
        let st = self.shader_type;
        let has_tex = |slot: usize| textures.get(slot).is_some_and(|t| !t.is_empty());
        let stream = graph.version().stream;

        self.common.double_sided = sf2.contains(ShaderFlags2::DOUBLE_SIDED);
        self.common.depth_test = sf1.contains(ShaderFlags1::ZBUFFER_TEST);
        self.common.depth_write = sf2.contains(ShaderFlags2::ZBUFFER_WRITE);
        self.common.alpha = f.get_f32("Alpha");
        self.common.uv_scale = f.get_vec2("UV Scale");
        self.common.uv_offset = f.get_vec2("UV Offset");
        self.common.clamp_mode = TexClampMode::from_raw(f.get_u32("Texture Clamp Mode"));

        let mut p = LightingParams::default();

        if sf1.contains(ShaderFlags1::SPECULAR) {
            p.specular_color = f.get_color3("Specular Color");
            p.specular_gloss = f.get_f32("Glossiness");
            if p.specular_gloss == 0.0 {
                p.specular_gloss = f.get_f32("Smoothness");
            }
            p.specular_strength = f.get_f32("Specular Strength");
        }

        p.emissive_color = f.get_color3("Emissive Color");
        p.emissive_mult = f.get_f32("Emissive Multiple");
        p.has_emittance = sf1.contains(ShaderFlags1::OWN_EMIT);
        p.has_glow_map = st == ShaderType::GLOW && sf2.contains(ShaderFlags2::GLOW_MAP) && has_tex(2);

        if stream < 130 {
            p.lighting_effect1 = f.get_f32("Lighting Effect 1");
            p.lighting_effect2 = f.get_f32("Lighting Effect 2");
            p.inner_thickness = f.get_f32("Parallax Inner Layer Thickness");
            p.outer_refraction_strength = f.get_f32("Parallax Refraction Scale");
            p.outer_reflection_strength = f.get_f32("Parallax Envmap Strength");
            p.inner_texture_scale = f.get_vec2("Parallax Inner Layer Texture Scale");

            p.has_specular_map = sf1.contains(ShaderFlags1::SPECULAR) && has_tex(7);
            p.has_height_map =
                st == ShaderType::HEIGHTMAP && sf1.contains(ShaderFlags1::PARALLAX) && has_tex(3);
            p.has_backlight = sf2.contains(ShaderFlags2::BACK_LIGHTING);
            p.has_rimlight = sf2.contains(ShaderFlags2::RIM_LIGHTING);
            p.has_softlight = sf2.contains(ShaderFlags2::SOFT_LIGHTING);
            p.has_model_space_normals = sf1.contains(ShaderFlags1::MODEL_SPACE_NORMALS);
            p.has_multi_layer_parallax = sf2.contains(ShaderFlags2::MULTI_LAYER_PARALLAX);
            p.has_refraction = sf1.contains(ShaderFlags1::REFRACTION);
            p.has_fire_refraction = sf1.contains(ShaderFlags1::FIRE_REFRACTION);

            p.has_tint_mask = st == ShaderType::FACE_TINT;
            p.has_detail_mask = p.has_tint_mask;

            let tint = if st == ShaderType::HAIR_TINT {
                Some("Hair Tint Color")
            } else if st == ShaderType::SKIN_TINT {
                Some("Skin Tint Color")
            } else {
                None
            };
            if let Some(field) = tint {
                p.has_tint_color = true;
                p.tint_color = f.get_color3(field);
            }
        } else {
            p.has_specular_map = sf1.contains(ShaderFlags1::SPECULAR) && has_tex(2);
            p.greyscale_color = sf1.contains(ShaderFlags1::GREYSCALE_TO_PALETTE_COLOR);
            p.palette_scale = f.get_f32("Grayscale to Palette Scale");
            p.lighting_effect1 = f.get_f32("Subsurface Rolloff");
            p.backlight_power = f.get_f32("Backlight Power");
            p.fresnel_power = f.get_f32("Fresnel Power");
        }

        p.has_environment_map = (st == ShaderType::ENVIRONMENT_MAP
            && sf1.contains(ShaderFlags1::ENVIRONMENT_MAPPING))
            || (st == ShaderType::EYE_ENVMAP && sf1.contains(ShaderFlags1::EYE_ENVIRONMENT_MAPPING));
        if stream == 100 {
            p.has_environment_map |= p.has_multi_layer_parallax;
        }
        p.has_environment_map &= has_tex(4);

        p.has_cube_map = (st == ShaderType::ENVIRONMENT_MAP
            || st == ShaderType::EYE_ENVMAP
            || st == ShaderType::MULTI_LAYER_PARALLAX)
            && p.has_environment_map;
        p.use_environment_mask = p.has_environment_map && has_tex(5);

        if st == ShaderType::ENVIRONMENT_MAP {
            p.environment_reflection = f.get_f32("Environment Map Scale");
        } else if st == ShaderType::EYE_ENVMAP {
            p.environment_reflection = f.get_f32("Eye Cubemap Scale");
        }

        p
    }

    fn lighting_from_material(&mut self, m: &crate::assets::ShaderMaterial) -> LightingParams {
        let h = &m.header;
        let has_tex = |slot: usize| m.textures.get(slot).is_some_and(|t| !t.is_empty());

        self.common.alpha = h.alpha;
        self.common.uv_scale = h.uv_scale;
        self.common.uv_offset = h.uv_offset;
        self.common.clamp_mode = TexClampMode::from_tiling(h.tile_u, h.tile_v);
        self.common.double_sided = h.two_sided;
        self.common.depth_test = h.zbuffer_test;
        self.common.depth_write = h.zbuffer_write;

        LightingParams {
            specular_color: m.specular_color,
            specular_gloss: m.smoothness,
            specular_strength: m.specular_mult,
            emissive_color: m.emittance_color,
            emissive_mult: m.emittance_mult,
            has_emittance: m.emit_enabled,
            has_glow_map: m.glowmap && has_tex(5),
            has_specular_map: m.specular_enabled && has_tex(2),
            has_backlight: m.back_lighting,
            has_rimlight: m.rim_lighting,
            has_softlight: m.subsurface_lighting,
            has_model_space_normals: m.model_space_normals,
            has_refraction: h.refraction,
            rim_power: m.rim_power,
            backlight_power: m.backlight_power,
            fresnel_power: m.fresnel_power,
            greyscale_color: h.grayscale_to_palette_color,
            palette_scale: m.grayscale_to_palette_scale,
            has_environment_map: h.environment_mapping && has_tex(4),
            has_cube_map: h.environment_mapping && has_tex(4),
            use_environment_mask: h.environment_mapping && has_tex(4) && !m.glowmap && has_tex(5),
            environment_reflection: h.environment_mask_scale,
            lighting_effect1: if m.subsurface_lighting { m.subsurface_rolloff } else { 0.0 },
            has_tint_color: m.hair,
            tint_color: m.hair_tint_color,
            ..LightingParams::default()
        }
    }

    fn effect_from_flags(&mut self, graph: &dyn AssetGraph, f: &Compound) -> EffectParams {
        let sf1 = self.flags1;
        let sf2 = self.flags2;
        let has = |field: &str| !f.get_str(field).is_empty();

        self.common.depth_test = sf1.contains(ShaderFlags1::ZBUFFER_TEST);
        self.common.depth_write = sf2.contains(ShaderFlags2::ZBUFFER_WRITE);
        self.common.double_sided = sf2.contains(ShaderFlags2::DOUBLE_SIDED);
        self.common.uv_scale = f.get_vec2("UV Scale");
        self.common.uv_offset = f.get_vec2("UV Offset");
        self.common.clamp_mode = TexClampMode::from_raw(f.get_u32("Texture Clamp Mode"));

        let mut p = EffectParams {
            emissive_color: f.get_color4("Emissive Color"),
            emissive_mult: f.get_f32("Emissive Multiple"),
            has_source_texture: has("Source Texture"),
            has_greyscale_map: has("Greyscale Texture"),
            greyscale_alpha: sf1.contains(ShaderFlags1::GREYSCALE_TO_PALETTE_ALPHA),
            greyscale_color: sf1.contains(ShaderFlags1::GREYSCALE_TO_PALETTE_COLOR),
            use_falloff: sf1.contains(ShaderFlags1::USE_FALLOFF),
            falloff: Falloff {
                start_angle: f.get_f32("Falloff Start Angle"),
                stop_angle: f.get_f32("Falloff Stop Angle"),
                start_opacity: f.get_f32("Falloff Start Opacity"),
                stop_opacity: f.get_f32("Falloff Stop Opacity"),
                soft_depth: f.get_f32("Soft Falloff Depth"),
            },
            ..EffectParams::default()
        };

        if graph.version().stream < 130 {
            p.has_weapon_blood = sf2.contains(ShaderFlags2::WEAPON_BLOOD);
        } else {
            p.has_env_map = has("Env Map Texture");
            p.has_normal_map = has("Normal Texture");
            p.has_env_mask = has("Env Mask Texture");
            p.environment_reflection = f.get_f32("Environment Map Scale");
            // Receive Shadows doubles as RGB falloff on FO4.
            p.has_rgb_falloff = sf1.contains(ShaderFlags1::RECEIVE_SHADOWS);
        }

        if sf2.contains(ShaderFlags2::EFFECT_LIGHTING) {
            p.lighting_influence = f.get_u32("Lighting Influence") as f32 / 255.0;
        }

        self.common.alpha = p.emissive_color.w;
        p
    }

    fn effect_from_material(&mut self, m: &crate::assets::EffectMaterial) -> EffectParams {
        let h = &m.header;
        let has_tex = |slot: usize| m.textures.get(slot).is_some_and(|t| !t.is_empty());

        self.common.depth_test = h.zbuffer_test;
        self.common.depth_write = h.zbuffer_write;
        self.common.double_sided = h.two_sided;
        self.common.uv_scale = h.uv_scale;
        self.common.uv_offset = h.uv_offset;
        self.common.clamp_mode = TexClampMode::from_tiling(h.tile_u, h.tile_v);
        self.common.alpha = h.alpha;

        EffectParams {
            emissive_color: m.base_color.extend(h.alpha),
            emissive_mult: m.base_color_scale,
            has_source_texture: has_tex(0),
            has_greyscale_map: has_tex(1),
            has_env_map: has_tex(2),
            has_normal_map: has_tex(3),
            has_env_mask: has_tex(4),
            environment_reflection: h.environment_mask_scale,
            greyscale_alpha: m.grayscale_to_palette_alpha,
            greyscale_color: h.grayscale_to_palette_color,
            use_falloff: m.falloff_enabled,
            has_rgb_falloff: m.falloff_color_enabled,
            has_weapon_blood: false,
            lighting_influence: if m.effect_lighting_enabled { m.lighting_influence } else { 0.0 },
            falloff: Falloff {
                start_angle: m.falloff_start_angle,
                stop_angle: m.falloff_stop_angle,
                start_opacity: m.falloff_start_opacity,
                stop_opacity: m.falloff_stop_opacity,
                soft_depth: m.soft_depth,
            },
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn has_sf1(&self, flag: ShaderFlags1) -> bool {
        self.flags1.contains(flag)
    }

    #[inline]
    #[must_use]
    pub fn has_sf2(&self, flag: ShaderFlags2) -> bool {
        self.flags2.contains(flag)
    }

    #[must_use]
    pub fn lighting(&self) -> Option<&LightingParams> {
        match &self.params {
            ShaderParams::Lighting(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub fn effect(&self) -> Option<&EffectParams> {
        match &self.params {
            ShaderParams::Effect(p) => Some(p),
            _ => None,
        }
    }

    /// Alpha below one, or refraction on a lighting shader.
    #[must_use]
    pub fn is_translucent(&self) -> bool {
        self.common.alpha < 1.0 || self.lighting().is_some_and(|p| p.has_refraction)
    }

    /// Slot index for a texcoord semantic.
    #[must_use]
    pub fn get_id(name: &str) -> Option<usize> {
        Some(match name {
            "base" => 0,
            "dark" => 1,
            "detail" => 2,
            "gloss" => 3,
            "glow" => 4,
            "bumpmap" => 5,
            "decal0" => 6,
            "decal1" => 7,
            _ => return None,
        })
    }

    /// Texture file for a slot, empty when there is none.
    ///
    /// Lighting shaders with an override material map the material's nine
    /// slots onto the texture-set layout, gated by the material's feature
    /// switches. Otherwise the texture set is used; effect shaders without a
    /// set read their texture fields or their material's slots.
    #[must_use]
    pub fn file_name(&self, graph: &dyn AssetGraph, block: BlockId, id: usize) -> String {
        if let Some(m) = self.material.as_deref().and_then(MaterialFile::as_shader)
            && m.textures.len() == 9
        {
            let tex = |slot: usize, enabled: bool| {
                (enabled && !m.textures[slot].is_empty()).then(|| m.textures[slot].clone())
            };
            let env = m.header.environment_mapping;
            let mapped = match id {
                0 => tex(0, true),
                1 => tex(1, true),
                2 => tex(5, m.glowmap),
                3 => tex(3, m.header.grayscale_to_palette_color),
                4 => tex(4, env),
                5 => tex(5, env),
                7 => tex(2, m.specular_enabled),
                _ => None,
            };
            if let Some(name) = mapped {
                return name;
            }
        }

        if let Some(set) = self.texture_set.and_then(|s| graph.fields(s)) {
            return set
                .get_array("Textures")
                .get(id)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned();
        }

        if let Some(m) = self.material.as_deref().and_then(MaterialFile::as_effect) {
            return m.textures.get(id).cloned().unwrap_or_default();
        }

        if self.variant == ShaderVariant::Effect {
            let field = match id {
                0 => "Source Texture",
                1 => "Greyscale Texture",
                2 => "Env Map Texture",
                3 => "Normal Texture",
                4 => "Env Mask Texture",
                _ => return String::new(),
            };
            return graph
                .fields(block)
                .map(|f| f.get_str(field).to_owned())
                .unwrap_or_default();
        }

        String::new()
    }
}

/// Older shader blocks name the first word "Shader Flags".
fn read_flags1(fields: &Compound) -> u32 {
    if fields.contains("Shader Flags 1") {
        fields.get_u32("Shader Flags 1")
    } else {
        fields.get_u32("Shader Flags")
    }
}

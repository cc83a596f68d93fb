//! Render state derived from a mesh's active properties.

use glam::{Vec3, Vec4};

use crate::properties::{
    AlphaProperty, BlendFactor, CompareFunc, CullFace, MaterialProperty, PropertyList,
    ShaderLightingProperty, SpecularProperty, StencilOp, StencilProperty, VertexColorProperty,
    VertexMode, WireframeProperty, ZBufferProperty,
};
use crate::scene::SceneOptions;

use super::backend::SamplerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlphaTestState {
    pub func: CompareFunc,
    pub threshold: f32,
}

/// Material channel tracking the vertex colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMaterial {
    #[default]
    Disabled,
    Emission,
    AmbientDiffuse,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialColors {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub emissive: Vec4,
    pub shininess: f32,
}

impl Default for MaterialColors {
    fn default() -> Self {
        Self {
            ambient: Vec4::new(0.4, 0.4, 0.4, 1.0),
            diffuse: Vec4::new(0.8, 0.8, 0.8, 1.0),
            specular: Vec4::ONE,
            emissive: Vec4::new(0.0, 0.0, 0.0, 1.0),
            shininess: 33.0,
        }
    }
}

impl MaterialColors {
    /// Colours of a material property, each carrying its alpha. A disabled
    /// specular property zeroes the highlight.
    #[must_use]
    pub fn from_property(mat: &MaterialProperty, specular: Option<&SpecularProperty>) -> Self {
        let a = mat.alpha;
        let mut colors = Self {
            ambient: mat.ambient.extend(a),
            diffuse: mat.diffuse.extend(a),
            specular: mat.specular.extend(a),
            emissive: mat.emissive.extend(a),
            shininess: mat.shininess,
        };
        if specular.is_some_and(|s| !s.enabled) {
            colors.shininess = 0.0;
            colors.specular = Vec3::ZERO.extend(a);
        }
        colors
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthState {
    pub test: bool,
    pub write: bool,
    pub func: CompareFunc,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test: true,
            write: true,
            func: CompareFunc::LessEqual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilState {
    pub func: CompareFunc,
    pub reference: u32,
    pub mask: u32,
    pub fail: StencilOp,
    pub zfail: StencilOp,
    pub zpass: StencilOp,
}

/// Everything the backend needs besides textures and programs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub lighting: bool,
    pub blend: Option<BlendState>,
    pub alpha_test: Option<AlphaTestState>,
    pub color_material: ColorMaterial,
    pub material: MaterialColors,
    pub depth: DepthState,
    /// `None` disables face culling.
    pub cull: Option<CullFace>,
    pub stencil: Option<StencilState>,
    pub wireframe: bool,
    pub normalize: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            lighting: true,
            blend: None,
            alpha_test: None,
            color_material: ColorMaterial::Disabled,
            material: MaterialColors::default(),
            depth: DepthState::default(),
            cull: Some(CullFace::Back),
            stencil: None,
            wireframe: false,
            normalize: false,
        }
    }
}

impl RenderState {
    /// State for a program draw: lighting on, colour material off, the rest
    /// from the properties.
    #[must_use]
    pub fn for_program(props: &PropertyList, options: SceneOptions) -> Self {
        let mut state = Self::default();
        state.apply_alpha(props.get::<AlphaProperty>().as_deref(), options);
        state.apply_material(props);
        state.apply_depth(props);
        state.apply_stencil(props.get::<StencilProperty>().as_deref());
        state.wireframe = props.get::<WireframeProperty>().is_some_and(|w| w.enabled);
        state
    }

    /// State for a fixed-function draw.
    #[must_use]
    pub fn for_fixed_function(
        props: &PropertyList,
        options: SceneOptions,
        has_colors: bool,
        has_normals: bool,
    ) -> Self {
        let mut state = Self::for_program(props, options);
        state.lighting = options.contains(SceneOptions::DO_LIGHTING);
        state.color_material = if has_colors {
            match props.get::<VertexColorProperty>().map(|v| v.vertex_mode) {
                Some(VertexMode::Ignore) => ColorMaterial::Disabled,
                Some(VertexMode::Emissive) => ColorMaterial::Emission,
                Some(VertexMode::AmbientDiffuse) | None => ColorMaterial::AmbientDiffuse,
            }
        } else {
            ColorMaterial::Disabled
        };
        state.normalize = has_normals;
        state
    }

    fn apply_alpha(&mut self, alpha: Option<&AlphaProperty>, options: SceneOptions) {
        let blending = options.contains(SceneOptions::DO_BLENDING);
        self.blend = alpha.filter(|a| a.blend && blending).map(|a| BlendState {
            src: a.src,
            dst: a.dst,
        });
        self.alpha_test = alpha.filter(|a| a.test && blending).map(|a| AlphaTestState {
            func: a.func,
            threshold: a.threshold,
        });
    }

    fn apply_material(&mut self, props: &PropertyList) {
        if let Some(mat) = props.get::<MaterialProperty>() {
            self.material = MaterialColors::from_property(&mat, props.get::<SpecularProperty>().as_deref());
        }
    }

    fn apply_depth(&mut self, props: &PropertyList) {
        if let Some(z) = props.get::<ZBufferProperty>() {
            self.depth = DepthState {
                test: z.test,
                write: z.write,
                func: z.func,
            };
        } else if let Some(shader) = props.get::<ShaderLightingProperty>() {
            self.depth.test = shader.common.depth_test;
            self.depth.write = shader.common.depth_write;
        }
    }

    fn apply_stencil(&mut self, stencil: Option<&StencilProperty>) {
        let Some(s) = stencil else {
            self.cull = Some(CullFace::Back);
            self.stencil = None;
            return;
        };
        self.cull = s.cull_enable.then_some(s.cull_face);
        self.stencil = s.enabled.then_some(StencilState {
            func: s.func,
            reference: s.reference,
            mask: s.mask,
            fail: s.fail_op,
            zfail: s.zfail_op,
            zpass: s.zpass_op,
        });
    }
}

/// How a fixed-function stage combines with the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    Modulate,
    /// Blend towards the texture by its alpha.
    Interpolate,
    Add,
}

/// One active fixed-function texture stage.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureStage {
    pub unit: u32,
    pub texture: String,
    pub coord_set: usize,
    pub combine: Combine,
    pub rgb_scale: f32,
    pub sampler: SamplerState,
    pub mipmaps: u32,
}

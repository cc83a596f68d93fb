//! Fixed-function properties: alpha, depth, texturing, material colours,
//! specular, wireframe, vertex colour mode and stencil.

use glam::{Vec2, Vec3};

use crate::assets::{AssetGraph, BlockId, Compound};

// ============================================================================
// Render-state enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    One,
    Zero,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    #[default]
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    Incr,
    Decr,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullFace {
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TexFilter {
    Nearest,
    #[default]
    Linear,
    LinearMipmapLinear,
    NearestMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapNearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TexWrap {
    Clamp,
    #[default]
    Repeat,
    MirroredRepeat,
}

const BLEND_MAP: [BlendFactor; 16] = [
    BlendFactor::One,
    BlendFactor::Zero,
    BlendFactor::SrcColor,
    BlendFactor::OneMinusSrcColor,
    BlendFactor::DstColor,
    BlendFactor::OneMinusDstColor,
    BlendFactor::SrcAlpha,
    BlendFactor::OneMinusSrcAlpha,
    BlendFactor::DstAlpha,
    BlendFactor::OneMinusDstAlpha,
    BlendFactor::SrcAlphaSaturate,
    BlendFactor::One,
    BlendFactor::One,
    BlendFactor::One,
    BlendFactor::One,
    BlendFactor::One,
];

/// Test function order shared by alpha testing and depth testing.
const TEST_MAP: [CompareFunc; 8] = [
    CompareFunc::Always,
    CompareFunc::Less,
    CompareFunc::Equal,
    CompareFunc::LessEqual,
    CompareFunc::Greater,
    CompareFunc::NotEqual,
    CompareFunc::GreaterEqual,
    CompareFunc::Never,
];

const STENCIL_FUNC_MAP: [CompareFunc; 8] = [
    CompareFunc::Never,
    CompareFunc::GreaterEqual,
    CompareFunc::NotEqual,
    CompareFunc::Greater,
    CompareFunc::LessEqual,
    CompareFunc::Equal,
    CompareFunc::Less,
    CompareFunc::Always,
];

const STENCIL_OP_MAP: [StencilOp; 6] = [
    StencilOp::Keep,
    StencilOp::Zero,
    StencilOp::Replace,
    StencilOp::Incr,
    StencilOp::Decr,
    StencilOp::Invert,
];

// ============================================================================
// Alpha
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AlphaProperty {
    pub blend: bool,
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub test: bool,
    pub func: CompareFunc,
    pub threshold: f32,
    /// Cleared by the "no sorter" bit.
    pub sort: bool,
}

impl AlphaProperty {
    #[must_use]
    pub fn read(graph: &dyn AssetGraph, fields: &Compound) -> Self {
        let flags = fields.get_u32("Flags") & 0xffff;

        let mut test = flags & (1 << 9) != 0;
        // FO4 weapon blood relies on a test bit the flags do not carry.
        if graph.version().stream == 130 {
            test |= flags == 20547;
        }

        Self {
            blend: flags & 1 != 0,
            src: BLEND_MAP[((flags >> 1) & 0x0f) as usize],
            dst: BLEND_MAP[((flags >> 5) & 0x0f) as usize],
            test,
            func: TEST_MAP[((flags >> 10) & 0x7) as usize],
            threshold: fields.get_u32("Threshold") as f32 / 255.0,
            sort: flags & 0x2000 == 0,
        }
    }
}

// ============================================================================
// Depth
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ZBufferProperty {
    pub test: bool,
    pub write: bool,
    pub func: CompareFunc,
}

impl ZBufferProperty {
    #[must_use]
    pub fn read(graph: &dyn AssetGraph, fields: &Compound) -> Self {
        let flags = fields.get_u32("Flags");
        let func = if graph.check_version(0x0401_0012, 0x1400_0005) {
            TEST_MAP[(fields.get_u32("Function") & 0x07) as usize]
        } else if graph.check_version(0x1401_0003, 0) {
            TEST_MAP[((flags >> 2) & 0x07) as usize]
        } else {
            CompareFunc::LessEqual
        };

        Self {
            test: flags & 1 != 0,
            write: flags & 2 != 0,
            func,
        }
    }
}

// ============================================================================
// Multi-texturing
// ============================================================================

/// Number of texturing slots: base, dark, detail, gloss, glow, bump map and
/// four decals.
pub const TEXTURE_SLOTS: usize = 10;

const SLOT_FIELDS: [&str; TEXTURE_SLOTS] = [
    "Base Texture",
    "Dark Texture",
    "Detail Texture",
    "Gloss Texture",
    "Glow Texture",
    "Bump Map Texture",
    "Decal 0 Texture",
    "Decal 1 Texture",
    "Decal 2 Texture",
    "Decal 3 Texture",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexTransform {
    pub translation: Vec2,
    pub tiling: Vec2,
    pub rotation: f32,
    pub center: Vec2,
}

/// One texturing slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TexDesc {
    /// `NiSourceTexture` block, `None` when the slot is unused.
    pub source: Option<BlockId>,
    pub coord_set: u32,
    pub filter: TexFilter,
    pub wrap_s: TexWrap,
    pub wrap_t: TexWrap,
    /// Stored anisotropy (20.5.0.4 and later).
    pub max_anisotropy: Option<f32>,
    pub transform: Option<TexTransform>,
}

impl TexDesc {
    fn read(graph: &dyn AssetGraph, tex: &Compound) -> Self {
        let mut coord_set = tex.get_u32("UV Set");
        let (filter_mode, clamp_mode) = if graph.check_version(0, 0x1401_0002) {
            (tex.get_u32("Filter Mode"), tex.get_u32("Clamp Mode"))
        } else {
            let flags = tex.get_u32("Flags");
            coord_set = flags & 0x00ff;
            ((flags & 0x0f00) >> 8, (flags & 0xf000) >> 12)
        };

        let filter = match filter_mode {
            0 => TexFilter::Nearest,
            2 => TexFilter::LinearMipmapLinear,
            3 => TexFilter::NearestMipmapNearest,
            4 => TexFilter::NearestMipmapLinear,
            5 => TexFilter::LinearMipmapNearest,
            _ => TexFilter::Linear,
        };

        let (wrap_s, wrap_t) = match clamp_mode {
            0 => (TexWrap::Clamp, TexWrap::Clamp),
            1 => (TexWrap::Clamp, TexWrap::Repeat),
            2 => (TexWrap::Repeat, TexWrap::Clamp),
            _ => (TexWrap::Repeat, TexWrap::Repeat),
        };

        let transform = tex.get_bool("Has Texture Transform").then(|| TexTransform {
            translation: tex.get_vec2("Translation"),
            tiling: tex.get_vec2("Scale"),
            rotation: tex.get_f32("Rotation"),
            center: tex.get_vec2("Center"),
        });

        let source = tex
            .get_link("Source")
            .filter(|s| graph.inherits(*s, "NiSourceTexture"));

        Self {
            source,
            coord_set,
            filter,
            wrap_s,
            wrap_t,
            max_anisotropy: graph
                .check_version(0x1405_0004, 0)
                .then(|| tex.get_u32("Max Anisotropy") as f32),
            transform,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TexturingProperty {
    pub textures: [TexDesc; TEXTURE_SLOTS],
}

impl TexturingProperty {
    #[must_use]
    pub fn read(graph: &dyn AssetGraph, fields: &Compound) -> Self {
        Self {
            textures: std::array::from_fn(|t| {
                fields
                    .get_compound(SLOT_FIELDS[t])
                    .map(|tex| TexDesc::read(graph, tex))
                    .unwrap_or_default()
            }),
        }
    }

    /// Slot index for a texcoord semantic such as `"base"` or `"decal2"`.
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
            "decal2" => 8,
            "decal3" => 9,
            _ => return None,
        })
    }

    #[must_use]
    pub fn slot(&self, id: usize) -> Option<&TexDesc> {
        self.textures.get(id)
    }

    /// File name of a slot's source texture, empty if unused.
    #[must_use]
    pub fn file_name(&self, graph: &dyn AssetGraph, id: usize) -> String {
        self.slot(id)
            .and_then(|t| t.source)
            .and_then(|s| graph.fields(s))
            .map(|f| f.get_str("File Name").to_owned())
            .unwrap_or_default()
    }

    /// UV set used by a slot.
    #[must_use]
    pub fn coord_set(&self, id: usize) -> Option<u32> {
        self.slot(id).map(|t| t.coord_set)
    }
}

// ============================================================================
// Single texture
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TextureProperty {
    pub image: Option<BlockId>,
}

impl TextureProperty {
    #[must_use]
    pub fn read(graph: &dyn AssetGraph, fields: &Compound) -> Self {
        Self {
            image: graph.block_of_type(fields.get_link("Image"), "NiImage"),
        }
    }

    #[must_use]
    pub fn file_name(&self, graph: &dyn AssetGraph) -> String {
        self.image
            .and_then(|i| graph.fields(i))
            .map(|f| f.get_str("File Name").to_owned())
            .unwrap_or_default()
    }
}

// ============================================================================
// Material colours
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialProperty {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub emissive: Vec3,
    /// Glossiness clamped to `[0, 128]`.
    pub shininess: f32,
    /// Clamped to `[0, 1]`.
    pub alpha: f32,
}

impl MaterialProperty {
    #[must_use]
    pub fn read(fields: &Compound) -> Self {
        Self {
            ambient: fields.get_color3("Ambient Color"),
            diffuse: fields.get_color3("Diffuse Color"),
            specular: fields.get_color3("Specular Color"),
            emissive: fields.get_color3("Emissive Color"),
            shininess: fields.get_f32("Glossiness").clamp(0.0, 128.0),
            alpha: fields.get_f32("Alpha").clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecularProperty {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WireframeProperty {
    pub enabled: bool,
}

// ============================================================================
// Vertex colour mode
// ============================================================================

/// Which material channel vertex colours drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VertexMode {
    Ignore,
    Emissive,
    #[default]
    AmbientDiffuse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexColorProperty {
    pub vertex_mode: VertexMode,
    /// 0: emissive, 1: emissive + ambient + diffuse.
    pub lighting_mode: u32,
}

impl VertexColorProperty {
    #[must_use]
    pub fn read(graph: &dyn AssetGraph, fields: &Compound) -> Self {
        let (vertex, lighting) = if graph.check_version(0, 0x1401_0001) {
            (fields.get_u32("Vertex Mode"), fields.get_u32("Lighting Mode"))
        } else {
            let flags = fields.get_u32("Flags");
            ((flags & 0x0030) >> 4, (flags & 0x0008) >> 3)
        };

        let vertex_mode = match vertex {
            0 => VertexMode::Ignore,
            1 => VertexMode::Emissive,
            _ => VertexMode::AmbientDiffuse,
        };

        Self { vertex_mode, lighting_mode: lighting }
    }
}

// ============================================================================
// Stencil
// ============================================================================

const STENCIL_ENABLE_MASK: u32 = 0x0001;
const STENCIL_FAIL_POS: u32 = 1;
const STENCIL_ZFAIL_POS: u32 = 4;
const STENCIL_ZPASS_POS: u32 = 7;
const STENCIL_DRAW_POS: u32 = 10;
const STENCIL_TEST_POS: u32 = 12;

const DRAW_CW: u32 = 2;
const DRAW_BOTH: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct StencilProperty {
    pub enabled: bool,
    pub func: CompareFunc,
    pub reference: u32,
    pub mask: u32,
    pub fail_op: StencilOp,
    pub zfail_op: StencilOp,
    pub zpass_op: StencilOp,
    pub cull_enable: bool,
    pub cull_face: CullFace,
}

impl StencilProperty {
    #[must_use]
    pub fn read(graph: &dyn AssetGraph, fields: &Compound) -> Self {
        let func = |i: u32| STENCIL_FUNC_MAP[(i as usize).min(STENCIL_FUNC_MAP.len() - 1)];
        let op = |i: u32| STENCIL_OP_MAP[(i as usize).min(STENCIL_OP_MAP.len() - 1)];

        let (draw_mode, enabled, test, fail, zfail, zpass) = if graph.check_version(0, 0x1400_0005) {
            (
                fields.get_u32("Draw Mode"),
                fields.get_u32("Stencil Enabled") & STENCIL_ENABLE_MASK != 0,
                fields.get_u32("Stencil Function"),
                fields.get_u32("Fail Action"),
                fields.get_u32("Z Fail Action"),
                fields.get_u32("Pass Action"),
            )
        } else {
            let flags = fields.get_u32("Flags");
            (
                (flags >> STENCIL_DRAW_POS) & 0x3,
                flags & STENCIL_ENABLE_MASK != 0,
                (flags >> STENCIL_TEST_POS) & 0x7,
                (flags >> STENCIL_FAIL_POS) & 0x7,
                (flags >> STENCIL_ZFAIL_POS) & 0x7,
                (flags >> STENCIL_ZPASS_POS) & 0x7,
            )
        };

        let (cull_enable, cull_face) = match draw_mode {
            DRAW_CW => (true, CullFace::Front),
            DRAW_BOTH => (false, CullFace::Back),
            // counter-clockwise and the application default
            _ => (true, CullFace::Back),
        };

        Self {
            enabled,
            func: func(test),
            reference: fields.get_u32("Stencil Ref"),
            mask: fields.get_u32("Stencil Mask"),
            fail_op: op(fail),
            zfail_op: op(zfail),
            zpass_op: op(zpass),
            cull_enable,
            cull_face,
        }
    }
}

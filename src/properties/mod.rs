//! Render-state properties attached to scene nodes.
//!
//! A [`Property`] is a closed variant over every property block the viewer
//! understands. Properties are shared between nodes through
//! [`SharedProperty`] handles and grouped per node in a [`PropertyList`].

pub mod legacy;
mod list;
pub mod shader;
pub mod shader_flags;

use std::cell::RefCell;
use std::rc::Rc;

pub use legacy::{
    AlphaProperty, BlendFactor, CompareFunc, CullFace, MaterialProperty, SpecularProperty,
    StencilOp, StencilProperty, TexDesc, TexFilter, TexTransform, TexWrap, TextureProperty,
    TexturingProperty, VertexColorProperty, VertexMode, WireframeProperty, ZBufferProperty,
};
pub use list::PropertyList;
pub use shader::{
    CommonShaderParams, EffectParams, Falloff, LightingParams, ShaderLightingProperty,
    ShaderParams, ShaderVariant,
};
pub use shader_flags::{ShaderFlags1, ShaderFlags2, ShaderType, TexClampMode};

use crate::assets::{AssetGraph, BlockId, Compound, MaterialProvider};

/// Type tag of a property; the key of a [`PropertyList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyType {
    Alpha,
    ZBuffer,
    Material,
    Texturing,
    Texture,
    Specular,
    Wireframe,
    VertexColor,
    Stencil,
    ShaderLighting,
}

/// Decoded state of a property block.
#[derive(Debug, Clone)]
pub enum PropertyKind {
    Alpha(AlphaProperty),
    ZBuffer(ZBufferProperty),
    Material(MaterialProperty),
    Texturing(TexturingProperty),
    Texture(TextureProperty),
    Specular(SpecularProperty),
    Wireframe(WireframeProperty),
    VertexColor(VertexColorProperty),
    Stencil(StencilProperty),
    ShaderLighting(ShaderLightingProperty),
}

impl PropertyKind {
    #[must_use]
    pub fn property_type(&self) -> PropertyType {
        match self {
            Self::Alpha(_) => PropertyType::Alpha,
            Self::ZBuffer(_) => PropertyType::ZBuffer,
            Self::Material(_) => PropertyType::Material,
            Self::Texturing(_) => PropertyType::Texturing,
            Self::Texture(_) => PropertyType::Texture,
            Self::Specular(_) => PropertyType::Specular,
            Self::Wireframe(_) => PropertyType::Wireframe,
            Self::VertexColor(_) => PropertyType::VertexColor,
            Self::Stencil(_) => PropertyType::Stencil,
            Self::ShaderLighting(_) => PropertyType::ShaderLighting,
        }
    }

    /// Decodes a block according to its exact type, `None` for types that
    /// are not properties.
    fn read(
        graph: &dyn AssetGraph,
        type_name: &str,
        fields: &Compound,
        name: &str,
        materials: &dyn MaterialProvider,
    ) -> Option<Self> {
        let shader = |variant| {
            Self::ShaderLighting(ShaderLightingProperty::read(graph, fields, variant, name, materials))
        };

        Some(match type_name {
            "NiAlphaProperty" => Self::Alpha(AlphaProperty::read(graph, fields)),
            "NiZBufferProperty" => Self::ZBuffer(ZBufferProperty::read(graph, fields)),
            "NiTexturingProperty" => Self::Texturing(TexturingProperty::read(graph, fields)),
            "NiTextureProperty" => Self::Texture(TextureProperty::read(graph, fields)),
            "NiMaterialProperty" => Self::Material(MaterialProperty::read(fields)),
            "NiSpecularProperty" => Self::Specular(SpecularProperty {
                enabled: fields.get_u32("Flags") != 0,
            }),
            "NiWireframeProperty" => Self::Wireframe(WireframeProperty {
                enabled: fields.get_u32("Flags") != 0,
            }),
            "NiVertexColorProperty" => Self::VertexColor(VertexColorProperty::read(graph, fields)),
            "NiStencilProperty" => Self::Stencil(StencilProperty::read(graph, fields)),
            "BSLightingShaderProperty" => shader(ShaderVariant::Lighting),
            "BSEffectShaderProperty" => shader(ShaderVariant::Effect),
            "BSWaterShaderProperty" => shader(ShaderVariant::Water),
            "BSShaderLightingProperty" | "BSShaderNoLightingProperty" | "BSShaderPPLightingProperty" => {
                shader(ShaderVariant::Generic)
            }
            _ => return None,
        })
    }
}

/// Safe downcast from a [`PropertyKind`] to one concrete property.
pub trait PropertyVariant: Sized {
    const TYPE: PropertyType;

    fn cast(kind: &PropertyKind) -> Option<&Self>;
}

macro_rules! impl_property_variant {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl PropertyVariant for $ty {
                const TYPE: PropertyType = PropertyType::$variant;

                #[inline]
                fn cast(kind: &PropertyKind) -> Option<&Self> {
                    match kind {
                        PropertyKind::$variant(p) => Some(p),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_property_variant! {
    Alpha => AlphaProperty,
    ZBuffer => ZBufferProperty,
    Material => MaterialProperty,
    Texturing => TexturingProperty,
    Texture => TextureProperty,
    Specular => SpecularProperty,
    Wireframe => WireframeProperty,
    VertexColor => VertexColorProperty,
    Stencil => StencilProperty,
    ShaderLighting => ShaderLightingProperty,
}

/// A property bound to the block it was decoded from.
#[derive(Debug, Clone)]
pub struct Property {
    block: BlockId,
    name: String,
    kind: PropertyKind,
}

/// Reference-counted property handle shared by every node that uses it.
pub type SharedProperty = Rc<RefCell<Property>>;

impl Property {
    /// Decodes a property block. Unknown block types are logged and
    /// skipped.
    #[must_use]
    pub fn create(
        graph: &dyn AssetGraph,
        block: BlockId,
        materials: &dyn MaterialProvider,
    ) -> Option<Self> {
        let type_name = graph.block_type(block)?;
        let fields = graph.fields(block)?;
        let name = fields.get_str("Name").to_owned();

        match PropertyKind::read(graph, type_name, fields, &name, materials) {
            Some(kind) => Some(Self { block, name, kind }),
            None => {
                log::warn!("Unknown property: {type_name} (block {block})");
                None
            }
        }
    }

    /// `true` if a change to `block` affects this property: its own block,
    /// or the texture set a shader resolves its texture features from.
    #[must_use]
    pub fn depends_on(&self, block: BlockId) -> bool {
        block == self.block
            || self
                .get::<ShaderLightingProperty>()
                .is_some_and(|s| s.texture_set == Some(block))
    }

    /// Re-decodes the property if it depends on `block`.
    pub fn update(&mut self, graph: &dyn AssetGraph, block: BlockId, materials: &dyn MaterialProvider) {
        if !self.depends_on(block) {
            return;
        }
        let Some(fields) = graph.fields(self.block) else {
            return;
        };
        let Some(type_name) = graph.block_type(self.block) else {
            return;
        };

        self.name = fields.get_str("Name").to_owned();
        if let Some(kind) = PropertyKind::read(graph, type_name, fields, &self.name, materials) {
            self.kind = kind;
        }
    }

    #[inline]
    #[must_use]
    pub fn block(&self) -> BlockId {
        self.block
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    #[inline]
    #[must_use]
    pub fn property_type(&self) -> PropertyType {
        self.kind.property_type()
    }

    /// Typed view of this property.
    #[inline]
    #[must_use]
    pub fn get<T: PropertyVariant>(&self) -> Option<&T> {
        T::cast(&self.kind)
    }

    #[must_use]
    pub fn into_shared(self) -> SharedProperty {
        Rc::new(RefCell::new(self))
    }
}

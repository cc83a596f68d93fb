//! Built-in block type hierarchy.
//!
//! Only the types the viewer core inspects are listed. Hosts can extend the
//! table per graph through [`BlockGraph::register_type`](super::BlockGraph::register_type).

/// `(type, parent)` pairs. Root types have no entry.
pub(crate) const BUILTIN_TYPES: &[(&str, &str)] = &[
    // Objects
    ("NiObjectNET", "NiObject"),
    ("NiAVObject", "NiObjectNET"),
    ("NiNode", "NiAVObject"),
    ("NiLODNode", "NiSwitchNode"),
    ("NiSwitchNode", "NiNode"),
    ("NiBillboardNode", "NiNode"),
    ("BSFadeNode", "NiNode"),
    ("BSLeafAnimNode", "NiNode"),
    ("BSTreeNode", "NiNode"),
    ("BSOrderedNode", "NiNode"),
    ("BSMultiBoundNode", "NiNode"),
    ("RootCollisionNode", "NiNode"),
    // Geometry
    ("NiGeometry", "NiAVObject"),
    ("NiTriBasedGeom", "NiGeometry"),
    ("NiTriShape", "NiTriBasedGeom"),
    ("NiTriStrips", "NiTriBasedGeom"),
    ("BSLODTriShape", "NiTriBasedGeom"),
    ("BSSegmentedTriShape", "NiTriShape"),
    ("NiParticles", "NiGeometry"),
    ("NiMesh", "NiAVObject"),
    ("BSTriShape", "NiAVObject"),
    ("NiGeometryData", "NiObject"),
    ("NiTriBasedGeomData", "NiGeometryData"),
    ("NiTriShapeData", "NiTriBasedGeomData"),
    ("NiTriStripsData", "NiTriBasedGeomData"),
    // Skinning
    ("NiSkinInstance", "NiObject"),
    ("BSDismemberSkinInstance", "NiSkinInstance"),
    ("NiSkinData", "NiObject"),
    ("NiSkinPartition", "NiObject"),
    // Extra data
    ("NiExtraData", "NiObject"),
    ("NiBinaryExtraData", "NiExtraData"),
    ("BSBound", "NiExtraData"),
    ("NiRangeLODData", "NiObject"),
    // Legacy properties
    ("NiProperty", "NiObjectNET"),
    ("NiAlphaProperty", "NiProperty"),
    ("NiZBufferProperty", "NiProperty"),
    ("NiTexturingProperty", "NiProperty"),
    ("NiTextureProperty", "NiProperty"),
    ("NiMaterialProperty", "NiProperty"),
    ("NiSpecularProperty", "NiProperty"),
    ("NiWireframeProperty", "NiProperty"),
    ("NiVertexColorProperty", "NiProperty"),
    ("NiStencilProperty", "NiProperty"),
    ("NiShadeProperty", "NiProperty"),
    // Shader properties
    ("BSShaderProperty", "NiShadeProperty"),
    ("BSShaderLightingProperty", "BSShaderProperty"),
    ("BSShaderPPLightingProperty", "BSShaderLightingProperty"),
    ("BSShaderNoLightingProperty", "BSShaderLightingProperty"),
    ("BSLightingShaderProperty", "BSShaderProperty"),
    ("BSEffectShaderProperty", "BSShaderProperty"),
    ("BSWaterShaderProperty", "BSShaderProperty"),
    ("BSSkyShaderProperty", "BSShaderProperty"),
    ("BSShaderTextureSet", "NiObject"),
    // Textures
    ("NiTexture", "NiObjectNET"),
    ("NiSourceTexture", "NiTexture"),
    ("NiImage", "NiObject"),
];

/// Parent of a built-in type.
pub(crate) fn builtin_parent(name: &str) -> Option<&'static str> {
    BUILTIN_TYPES
        .iter()
        .find(|(ty, _)| *ty == name)
        .map(|(_, parent)| *parent)
}

//! Renderable geometry: source arrays read from the data block, the skin
//! binding, and the per-frame transformed copies.

use byteorder::{ByteOrder, LittleEndian};
use glam::{Vec2, Vec3, Vec4};
use smallvec::SmallVec;

use super::bound::BoundSphere;
use super::options::{LodLevel, SceneOptions};
use super::skin::{BonePose, SkinBinding, VertexStreams, blend_bone_weights, blend_partitions};
use super::transform::Transform;
use crate::assets::{AssetGraph, BlockId, Value};
use crate::properties::{
    AlphaProperty, MaterialProperty, PropertyList, ShaderFlags1, ShaderFlags2, ShaderLightingProperty,
    ShaderVariant,
};
use crate::renderer::{ColorSource, DrawCall};

/// Name of the binary extra data carrying tangents and bitangents.
pub const TANGENT_SPACE_NAME: &str = "Tangent space (binormal & tangent vectors)";

/// Meshes with this name prefix are editor helpers.
pub const EDITOR_MARKER_PREFIX: &str = "EditorMarker";

/// Shader-derived switches, refreshed whenever the active properties change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderState {
    pub has_shader_property: bool,
    /// `Some` for a lighting shader: whether it declares vertex alpha.
    pub lighting_vertex_alpha: Option<bool>,
    /// A lighting shader that requests vertex colours.
    pub lighting_vertex_colors: bool,
    /// Vertex colours switched on in the shader's second flag word.
    pub sf2_vertex_colors: bool,
    pub material_alpha: f32,
    pub double_sided: bool,
    pub translucent: bool,
    pub draw_in_second_pass: bool,
}

impl Default for ShaderState {
    fn default() -> Self {
        Self {
            has_shader_property: false,
            lighting_vertex_alpha: None,
            lighting_vertex_colors: false,
            sf2_vertex_colors: false,
            material_alpha: 1.0,
            double_sided: false,
            translucent: false,
            draw_in_second_pass: false,
        }
    }
}

impl ShaderState {
    #[must_use]
    pub fn from_properties(props: &PropertyList) -> Self {
        let mut state = Self::default();

        if let Some(shader) = props.get::<ShaderLightingProperty>() {
            state.has_shader_property = true;
            state.sf2_vertex_colors = shader.has_sf2(ShaderFlags2::VERTEX_COLORS);
            state.double_sided = shader.common.double_sided;
            state.translucent = shader.is_translucent();
            if shader.variant == ShaderVariant::Lighting {
                state.lighting_vertex_alpha = Some(shader.has_sf1(ShaderFlags1::VERTEX_ALPHA));
                state.lighting_vertex_colors = shader.common.has_vertex_colors;
            }
        }

        if let Some(mat) = props.get::<MaterialProperty>() {
            state.material_alpha = mat.alpha;
        }

        state.draw_in_second_pass =
            state.translucent || props.get::<AlphaProperty>().is_some_and(|a| a.blend || a.test);
        state
    }
}

/// Geometry of an `NiTriShape`, `NiTriStrips` or `BSLODTriShape`.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    data: Option<BlockId>,
    skin: Option<BlockId>,
    tangent_data: Option<BlockId>,
    /// `BSLODTriShape` triangle counts per level.
    lod_sizes: Option<[u32; 3]>,

    pub(crate) verts: Vec<Vec3>,
    pub(crate) norms: Vec<Vec3>,
    pub(crate) colors: Vec<Vec4>,
    pub(crate) tangents: Vec<Vec3>,
    pub(crate) bitangents: Vec<Vec3>,
    /// UV sets; set 0 is primary.
    pub(crate) coords: Vec<Vec<Vec2>>,
    pub(crate) triangles: Vec<[u32; 3]>,
    pub(crate) strips: Vec<Vec<u32>>,
    has_vertex_colors: bool,

    pub(crate) skin_binding: Option<SkinBinding>,

    pub(crate) transformed: VertexStreams,
    pub(crate) trans_colors: Vec<Vec4>,
    transform_rigid: bool,

    pub(crate) shader: ShaderState,
    pub(crate) program_hint: Option<String>,

    /// Local-space bound; `None` until computed.
    bound: Option<BoundSphere>,
}

impl Mesh {
    /// Reads the geometry of shape `block`.
    #[must_use]
    pub fn read(graph: &dyn AssetGraph, block: BlockId) -> Self {
        let mut mesh = Self {
            transform_rigid: true,
            ..Self::default()
        };

        for link in graph.child_links(block) {
            if graph.inherits(link, "NiTriShapeData") || graph.inherits(link, "NiTriStripsData") {
                match mesh.data {
                    None => mesh.data = Some(link),
                    Some(d) if d != link => log::warn!("Block {block} has multiple data blocks"),
                    Some(_) => {}
                }
            } else if graph.inherits(link, "NiSkinInstance") {
                match mesh.skin {
                    None => mesh.skin = Some(link),
                    Some(s) if s != link => log::warn!("Block {block} has multiple skin instances"),
                    Some(_) => {}
                }
            } else if graph.is_block(link, "NiBinaryExtraData")
                && graph.fields(link).is_some_and(|f| f.get_str("Name") == TANGENT_SPACE_NAME)
            {
                mesh.tangent_data = Some(link);
            }
        }

        if graph.inherits(block, "BSLODTriShape")
            && let Some(f) = graph.fields(block)
        {
            mesh.lod_sizes = Some([f.get_u32("LOD0 Size"), f.get_u32("LOD1 Size"), f.get_u32("LOD2 Size")]);
        }

        mesh.read_data(graph);
        mesh.read_skin(graph);
        mesh
    }

    fn read_data(&mut self, graph: &dyn AssetGraph) {
        let Some(data) = self.data else {
            return;
        };
        let Some(fields) = graph.fields(data) else {
            return;
        };

        self.verts = fields.get_vec3_array("Vertices");
        let nv = self.verts.len();

        // partially populated attributes are dropped
        let full = |v: Vec<Vec3>| if v.len() < nv { Vec::new() } else { v };
        self.norms = full(fields.get_vec3_array("Normals"));
        self.tangents = full(fields.get_vec3_array("Tangents"));
        self.bitangents = full(fields.get_vec3_array("Bitangents"));

        self.colors = fields.get_color4_array("Vertex Colors");
        if self.colors.len() < nv {
            self.colors.clear();
        }
        self.has_vertex_colors = !self.colors.is_empty();

        if let Some(extra) = self.tangent_data.and_then(|t| graph.fields(t)) {
            let bytes = extra.get_bytes("Binary Data");
            if bytes.len() == nv * 4 * 3 * 2 {
                let mut floats = vec![0.0; nv * 3 * 2];
                LittleEndian::read_f32_into(bytes, &mut floats);
                let vecs: Vec<Vec3> = floats.chunks_exact(3).map(Vec3::from_slice).collect();
                self.tangents = vecs[..nv].to_vec();
                self.bitangents = vecs[nv..].to_vec();
            }
        }

        self.coords = fields
            .get_array("UV Sets")
            .iter()
            .map(|set| {
                let uv: Vec<Vec2> = set.as_array().unwrap_or(&[]).iter().filter_map(Value::as_vec2).collect();
                if uv.len() < nv { Vec::new() } else { uv }
            })
            .collect();

        if graph.inherits(data, "NiTriShapeData") {
            let tris = fields.get_triangle_array("Triangles");
            let total = tris.len();
            self.triangles = tris
                .into_iter()
                .filter(|t| t.iter().all(|&i| (i as usize) < nv))
                .collect();
            let dropped = total - self.triangles.len();
            if dropped > 0 {
                log::warn!("{dropped} triangles in block {data} reference invalid vertices and were dropped");
            }
        } else if graph.inherits(data, "NiTriStripsData") {
            if !fields.contains("Points") {
                log::warn!("Block {data} has no strip points");
            }
            let strips: Vec<Vec<u32>> = fields
                .get_array("Points")
                .iter()
                .map(|row| {
                    row.as_array()
                        .unwrap_or(&[])
                        .iter()
                        .filter_map(Value::as_count)
                        .map(|p| p as u32)
                        .collect()
                })
                .collect();
            let total = strips.len();
            self.strips = strips
                .into_iter()
                .filter(|s: &Vec<u32>| s.iter().all(|&i| (i as usize) < nv))
                .collect();
            if self.strips.len() < total {
                log::warn!("Strips in block {data} reference invalid vertices and were dropped");
            }
        }
    }

    fn read_skin(&mut self, graph: &dyn AssetGraph) {
        let Some(skin) = self.skin else {
            return;
        };
        let binding = SkinBinding::read(graph, skin);
        if !binding.partitions.is_empty() {
            self.triangles = binding.remapped_triangles();
            self.strips = binding.remapped_strips();
        }
        self.skin_binding = Some(binding);
    }

    /// `true` if a change to `block` affects this mesh's geometry.
    #[must_use]
    pub fn depends_on(&self, block: BlockId) -> bool {
        let own = [self.data, self.skin, self.tangent_data];
        if own.contains(&Some(block)) {
            return true;
        }
        self.skin_binding
            .as_ref()
            .is_some_and(|s| s.skin_data == Some(block) || s.skin_partition == Some(block))
    }

    // ========================================================================
    // Per-frame
    // ========================================================================

    /// Whether the next transform pass blends through the skin.
    #[must_use]
    pub fn is_skinned(&self, options: SceneOptions) -> bool {
        options.contains(SceneOptions::DO_SKINNING) && self.skin_binding.as_ref().is_some_and(SkinBinding::has_weights)
    }

    /// Recomputes the transformed streams.
    ///
    /// `poses` holds one entry per bone of the skin instance and is only
    /// consulted when skinning; `missing` stands in for partition slots with
    /// no pose.
    pub fn transform_shapes(
        &mut self,
        view: &Transform,
        poses: &[BonePose],
        missing: Transform,
        options: SceneOptions,
    ) {
        let input = VertexStreams {
            positions: self.verts.clone(),
            normals: self.norms.clone(),
            tangents: self.tangents.clone(),
            bitangents: self.bitangents.clone(),
        };

        let skinned = self.is_skinned(options);
        let was_rigid = self.transform_rigid;
        self.transform_rigid = !skinned;

        if let Some(binding) = self.skin_binding.as_mut().filter(|_| skinned) {
            let bones: Vec<Transform> = poses.iter().map(|p| p.trans).collect();
            self.transformed = if binding.partitions.is_empty() {
                for (bw, pose) in binding.weights.iter_mut().zip(poses) {
                    if let Some(bone_view) = pose.view {
                        bw.tcenter = bone_view * bw.center;
                    }
                }
                blend_bone_weights(&input, &binding.weights, &bones)
            } else {
                blend_partitions(&input, &binding.partitions, &bones, missing)
            };

            let mut bound = BoundSphere::from_points(&self.transformed.positions);
            bound.apply_inv(view);
            self.bound = Some(bound);
        } else {
            self.transformed = input;
            if self.bound.is_none() || !was_rigid {
                self.bound = Some(BoundSphere::from_points(&self.verts));
            }
        }

        self.trans_colors = self.colors.clone();
        let alpha = self.shader.material_alpha;
        if alpha != 1.0 {
            for c in &mut self.trans_colors {
                c.w *= alpha;
            }
        } else if self.shader.lighting_vertex_alpha == Some(false) {
            for c in &mut self.trans_colors {
                c.w = 1.0;
            }
        }
    }

    /// Drops the cached bound so the next access recomputes it.
    pub fn invalidate_bound(&mut self) {
        self.bound = None;
    }

    /// Bound in the mesh's own space.
    #[must_use]
    pub fn local_bound(&self) -> BoundSphere {
        self.bound.unwrap_or_else(|| BoundSphere::from_points(&self.verts))
    }

    // ========================================================================
    // Drawing
    // ========================================================================

    /// Triangle ranges drawn at a detail level.
    #[must_use]
    pub fn lod_triangles(&self, level: LodLevel) -> SmallVec<[&[[u32; 3]]; 3]> {
        let mut out = SmallVec::new();
        let Some(sizes) = self.lod_sizes else {
            out.push(self.triangles.as_slice());
            return out;
        };

        let total = self.triangles.len();
        let mut start = 0usize;
        let mut ranges = [(0usize, 0usize); 3];
        for (range, size) in ranges.iter_mut().zip(sizes) {
            let end = (start + size as usize).min(total);
            *range = (start, end);
            start = end;
        }

        let levels = match level {
            LodLevel::Level0 => 3,
            LodLevel::Level1 => 2,
            LodLevel::Level2 => 1,
        };
        for &(s, e) in ranges.iter().take(levels) {
            out.push(&self.triangles[s..e]);
        }
        out
    }

    /// Colour feed for a draw.
    #[must_use]
    pub fn color_source(&self, options: SceneOptions) -> ColorSource<'_> {
        let use_vcs = !self.shader.has_shader_property || self.shader.sf2_vertex_colors;
        if !self.trans_colors.is_empty() && options.contains(SceneOptions::DO_VERTEX_COLORS) && use_vcs {
            ColorSource::PerVertex(&self.trans_colors)
        } else if !self.has_vertex_colors && self.shader.lighting_vertex_colors {
            ColorSource::Constant(Vec4::new(0.0, 0.0, 0.0, 1.0))
        } else {
            ColorSource::Constant(Vec4::ONE)
        }
    }

    /// Builds the draw submission; `view` is the owning node's view
    /// transform.
    #[must_use]
    pub fn draw_call(
        &self,
        block: BlockId,
        view: &Transform,
        level: LodLevel,
        options: SceneOptions,
    ) -> DrawCall<'_> {
        let translucent = self.shader.translucent;
        DrawCall {
            block,
            positions: &self.transformed.positions,
            normals: &self.transformed.normals,
            colors: self.color_source(options),
            model_view: self.transform_rigid.then(|| view.to_mat4()),
            triangles: self.lod_triangles(level),
            strips: &self.strips,
            double_sided: self.shader.double_sided,
            polygon_offset: if translucent { (-1.0, -1.0) } else { (0.0, 0.0) },
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn data(&self) -> Option<BlockId> {
        self.data
    }

    #[inline]
    #[must_use]
    pub fn skin(&self) -> Option<BlockId> {
        self.skin
    }

    #[inline]
    #[must_use]
    pub fn skin_binding(&self) -> Option<&SkinBinding> {
        self.skin_binding.as_ref()
    }

    #[must_use]
    pub fn vertices(&self) -> &[Vec3] {
        &self.verts
    }

    #[must_use]
    pub fn normals(&self) -> &[Vec3] {
        &self.norms
    }

    #[must_use]
    pub fn colors(&self) -> &[Vec4] {
        &self.colors
    }

    #[must_use]
    pub fn tangents(&self) -> &[Vec3] {
        &self.tangents
    }

    #[must_use]
    pub fn bitangents(&self) -> &[Vec3] {
        &self.bitangents
    }

    #[must_use]
    pub fn coords(&self) -> &[Vec<Vec2>] {
        &self.coords
    }

    #[must_use]
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    #[must_use]
    pub fn strips(&self) -> &[Vec<u32>] {
        &self.strips
    }

    #[must_use]
    pub fn transformed(&self) -> &VertexStreams {
        &self.transformed
    }

    #[must_use]
    pub fn transformed_colors(&self) -> &[Vec4] {
        &self.trans_colors
    }

    #[inline]
    #[must_use]
    pub fn is_rigid(&self) -> bool {
        self.transform_rigid
    }

    #[must_use]
    pub fn shader_state(&self) -> &ShaderState {
        &self.shader
    }

    /// Program chosen on the previous draw.
    #[must_use]
    pub fn program_hint(&self) -> Option<&str> {
        self.program_hint.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Block, BlockGraph, FileVersion};

    fn graph_with_shape(data: Block) -> (BlockGraph, BlockId) {
        let mut g = BlockGraph::new(FileVersion::new(0x1402_0007, 12, 83));
        let d = g.add(data);
        let shape = g.add(Block::new("NiTriShape").with("Data", Value::Link(Some(d))));
        (g, shape)
    }

    fn vec3s(n: usize) -> Value {
        Value::Array((0..n).map(|i| Value::Vector3(Vec3::splat(i as f32))).collect())
    }

    #[test]
    fn short_attribute_arrays_are_dropped() {
        let (g, shape) = graph_with_shape(
            Block::new("NiTriShapeData")
                .with("Vertices", vec3s(3))
                .with("Normals", vec3s(2))
                .with(
                    "Vertex Colors",
                    Value::Array(vec![Value::Color4(Vec4::ONE); 3]),
                ),
        );
        let mesh = Mesh::read(&g, shape);
        assert_eq!(mesh.vertices().len(), 3);
        assert!(mesh.normals().is_empty());
        assert_eq!(mesh.colors().len(), 3);
    }

    #[test]
    fn invalid_triangles_are_filtered() {
        let (g, shape) = graph_with_shape(
            Block::new("NiTriShapeData").with("Vertices", vec3s(3)).with(
                "Triangles",
                Value::Array(vec![Value::Triangle([0, 1, 2]), Value::Triangle([0, 1, 7])]),
            ),
        );
        let mesh = Mesh::read(&g, shape);
        assert_eq!(mesh.triangles(), &[[0, 1, 2]]);
    }

    #[test]
    fn tangent_space_extra_data_is_split() {
        let mut g = BlockGraph::new(FileVersion::new(0x1402_0007, 12, 83));
        let d = g.add(Block::new("NiTriShapeData").with("Vertices", vec3s(2)));
        let mut bytes = Vec::new();
        for f in [1.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0] {
            bytes.extend_from_slice(&f.to_le_bytes());
        }
        let extra = g.add(
            Block::new("NiBinaryExtraData")
                .with("Name", Value::String(TANGENT_SPACE_NAME.into()))
                .with("Binary Data", Value::ByteArray(bytes)),
        );
        let shape = g.add(
            Block::new("NiTriShape")
                .with("Data", Value::Link(Some(d)))
                .with("Extra Data List", Value::Array(vec![Value::Link(Some(extra))])),
        );
        let mesh = Mesh::read(&g, shape);
        assert_eq!(mesh.tangents(), &[Vec3::X, Vec3::X]);
        assert_eq!(mesh.bitangents(), &[Vec3::Y, Vec3::Y]);
    }

    #[test]
    fn lod_levels_select_prefixes() {
        let mesh = Mesh {
            lod_sizes: Some([1, 1, 1]),
            triangles: vec![[0, 1, 2], [1, 2, 3], [2, 3, 4]],
            ..Mesh::default()
        };
        let count = |l| mesh.lod_triangles(l).iter().map(|s| s.len()).sum::<usize>();
        assert_eq!(count(LodLevel::Level0), 3);
        assert_eq!(count(LodLevel::Level1), 2);
        assert_eq!(count(LodLevel::Level2), 1);
    }

    #[test]
    fn material_alpha_scales_vertex_alpha() {
        let mut mesh = Mesh {
            verts: vec![Vec3::ZERO],
            colors: vec![Vec4::ONE],
            shader: ShaderState {
                material_alpha: 0.5,
                ..ShaderState::default()
            },
            ..Mesh::default()
        };
        mesh.transform_shapes(&Transform::IDENTITY, &[], Transform::IDENTITY, SceneOptions::default());
        assert!((mesh.transformed_colors()[0].w - 0.5).abs() < 1e-6);
        assert!(mesh.is_rigid());
    }
}

//! Skin weighting and per-vertex blending.
//!
//! A skinned mesh carries either per-bone weight lists ([`BoneWeights`], the
//! "flat" path) or batched partitions ([`SkinPartition`]). Partitions win when
//! both are present. Blending writes into fresh [`VertexStreams`]; the caller
//! decides which bone transforms to feed in.

use glam::Vec3;

use super::bound::BoundSphere;
use super::transform::Transform;
use crate::assets::{AssetGraph, BlockId, Compound, Value};

/// Per-vertex attribute arrays that take part in skinning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexStreams {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
    pub bitangents: Vec<Vec3>,
}

impl VertexStreams {
    /// Zeroed streams shaped like `input`.
    fn zeroed_like(input: &Self) -> Self {
        Self {
            positions: vec![Vec3::ZERO; input.positions.len()],
            normals: vec![Vec3::ZERO; input.normals.len()],
            tangents: vec![Vec3::ZERO; input.tangents.len()],
            bitangents: vec![Vec3::ZERO; input.bitangents.len()],
        }
    }

    fn accumulate(&mut self, input: &Self, vindex: usize, trans: &Transform, weight: f32) {
        if let Some(v) = input.positions.get(vindex) {
            self.positions[vindex] += (*trans * *v) * weight;
        }
        if let Some(n) = input.normals.get(vindex) {
            self.normals[vindex] += trans.rotation * *n * weight;
        }
        if let Some(t) = input.tangents.get(vindex) {
            self.tangents[vindex] += trans.rotation * *t * weight;
        }
        if let Some(b) = input.bitangents.get(vindex) {
            self.bitangents[vindex] += trans.rotation * *b * weight;
        }
    }

    /// Renormalizes every direction vector in place.
    pub fn normalize_directions(&mut self) {
        for v in self
            .normals
            .iter_mut()
            .chain(self.tangents.iter_mut())
            .chain(self.bitangents.iter_mut())
        {
            *v = v.normalize_or_zero();
        }
    }

    /// Positions as raw bytes for upload.
    #[must_use]
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    #[must_use]
    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }
}

// ============================================================================
// Flat weights
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexWeight {
    pub vertex: u32,
    pub weight: f32,
}

/// One bone's bind transform, bound and weight list.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneWeights {
    /// Bone node, `None` for a null link.
    pub bone: Option<BlockId>,
    /// Bind transform (skin space to bone space).
    pub trans: Transform,
    pub center: Vec3,
    pub radius: f32,
    /// `center` projected into view space by the last skinning pass.
    pub tcenter: Vec3,
    pub weights: Vec<VertexWeight>,
}

impl BoneWeights {
    /// Reads one "Bone List" entry. Weights are read only when
    /// `read_weights` is set.
    #[must_use]
    pub fn from_compound(fields: &Compound, bone: Option<BlockId>, read_weights: bool) -> Self {
        let sphere = BoundSphere::from_compound(fields);
        let weights = if read_weights {
            fields
                .get_array("Vertex Weights")
                .iter()
                .filter_map(Value::as_compound)
                .map(|w| VertexWeight {
                    vertex: w.get_u32("Index"),
                    weight: w.get_f32("Weight"),
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            bone,
            trans: Transform::from_compound(fields),
            center: sphere.center,
            radius: sphere.radius,
            tcenter: Vec3::ZERO,
            weights,
        }
    }
}

/// Where one bone of a skin instance sits for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonePose {
    /// Full skin transform: view, skeleton offset, bone chain and bind.
    pub trans: Transform,
    /// View transform of the bone node, `None` when the bone is not found.
    pub view: Option<Transform>,
}

/// Blends through per-bone weight lists. `bone_trans[i]` is the full
/// transform of `bones[i]`.
///
/// A weight entry with an out-of-range vertex ends that bone's list.
#[must_use]
pub fn blend_bone_weights(
    input: &VertexStreams,
    bones: &[BoneWeights],
    bone_trans: &[Transform],
) -> VertexStreams {
    let mut out = VertexStreams::zeroed_like(input);
    let vcnt = input.positions.len();

    for (bw, trans) in bones.iter().zip(bone_trans) {
        for vw in &bw.weights {
            let vindex = vw.vertex as usize;
            if vindex >= vcnt {
                break;
            }
            out.accumulate(input, vindex, trans, vw.weight);
        }
    }

    out.normalize_directions();
    out
}

// ============================================================================
// Partitions
// ============================================================================

/// A batch of vertices sharing a fixed number of weights per vertex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinPartition {
    pub weights_per_vertex: usize,
    /// Partition-local vertex to mesh vertex.
    pub vertex_map: Vec<u32>,
    /// Partition-local bone slot to index into the skin's bone list.
    pub bone_map: Vec<u32>,
    /// `(bone slot, weight)`, `vertex_map.len() * weights_per_vertex` long.
    pub weights: Vec<(u32, f32)>,
    pub triangles: Vec<[u32; 3]>,
    pub strips: Vec<Vec<u32>>,
}

impl SkinPartition {
    #[must_use]
    pub fn from_compound(fields: &Compound) -> Self {
        let weights_per_vertex = fields.get_u32("Num Weights Per Vertex") as usize;

        let mut vertex_map = fields.get_u32_array("Vertex Map");
        if vertex_map.is_empty() {
            vertex_map = (0..fields.get_u32("Num Vertices")).collect();
        }

        let weight_rows = fields.get_array("Vertex Weights");
        let index_rows = fields.get_array("Bone Indices");
        let mut weights = Vec::with_capacity(vertex_map.len() * weights_per_vertex);
        for v in 0..vertex_map.len() {
            let w_row = weight_rows.get(v).and_then(Value::as_array).unwrap_or(&[]);
            let i_row = index_rows.get(v).and_then(Value::as_array).unwrap_or(&[]);
            for w in 0..weights_per_vertex {
                let bone = i_row.get(w).and_then(Value::as_count).unwrap_or(0) as u32;
                let weight = w_row.get(w).and_then(Value::as_float).unwrap_or(0.0);
                weights.push((bone, weight));
            }
        }

        let strips = fields
            .get_array("Strips")
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

        Self {
            weights_per_vertex,
            vertex_map,
            bone_map: fields.get_u32_array("Bones"),
            weights,
            triangles: fields.get_triangle_array("Triangles"),
            strips,
        }
    }

    /// Triangles in mesh vertex indices. Triangles naming a local vertex
    /// outside the map are skipped.
    #[must_use]
    pub fn remapped_triangles(&self) -> Vec<[u32; 3]> {
        self.triangles
            .iter()
            .filter_map(|t| {
                Some([
                    *self.vertex_map.get(t[0] as usize)?,
                    *self.vertex_map.get(t[1] as usize)?,
                    *self.vertex_map.get(t[2] as usize)?,
                ])
            })
            .collect()
    }

    /// Strips in mesh vertex indices; unmapped points are dropped.
    #[must_use]
    pub fn remapped_strips(&self) -> Vec<Vec<u32>> {
        self.strips
            .iter()
            .map(|s| {
                s.iter()
                    .filter_map(|p| self.vertex_map.get(*p as usize).copied())
                    .collect()
            })
            .collect()
    }
}

/// Blends through skin partitions.
///
/// `bone_trans` holds the full transform of each bone in the skin's bone
/// list; slots naming a bone past its end use `missing`. The first partition
/// that reaches a vertex writes it, later partitions leave it alone. A vertex
/// map entry past the vertex count ends that partition.
#[must_use]
pub fn blend_partitions(
    input: &VertexStreams,
    partitions: &[SkinPartition],
    bone_trans: &[Transform],
    missing: Transform,
) -> VertexStreams {
    let mut out = VertexStreams::zeroed_like(input);
    let vcnt = input.positions.len();
    let mut written = vec![false; vcnt];

    for part in partitions {
        let slots: Vec<Transform> = part
            .bone_map
            .iter()
            .map(|&b| bone_trans.get(b as usize).copied().unwrap_or(missing))
            .collect();

        for (v, &vindex) in part.vertex_map.iter().enumerate() {
            let vindex = vindex as usize;
            if vindex >= vcnt {
                break;
            }
            if written[vindex] {
                continue;
            }
            written[vindex] = true;

            let start = v * part.weights_per_vertex;
            let Some(row) = part.weights.get(start..start + part.weights_per_vertex) else {
                continue;
            };
            for &(slot, weight) in row {
                let trans = slots.get(slot as usize).copied().unwrap_or(Transform::IDENTITY);
                out.accumulate(input, vindex, &trans, weight);
            }
        }
    }

    out.normalize_directions();
    out
}

// ============================================================================
// Skin instance
// ============================================================================

/// Everything a mesh reads from its skin instance.
#[derive(Debug, Clone, Default)]
pub struct SkinBinding {
    pub skin_data: Option<BlockId>,
    pub skin_partition: Option<BlockId>,
    pub skeleton_root: Option<BlockId>,
    /// Skin space to skeleton root.
    pub skeleton_trans: Transform,
    pub bones: Vec<Option<BlockId>>,
    pub weights: Vec<BoneWeights>,
    pub partitions: Vec<SkinPartition>,
}

impl SkinBinding {
    /// Reads a skin instance block.
    ///
    /// Older files hang the partition off the skin data rather than the
    /// instance. Per-bone vertex weights are only read when the data says it
    /// has them and no partition exists.
    #[must_use]
    pub fn read(graph: &dyn AssetGraph, skin: BlockId) -> Self {
        let skin_data = graph.block_of_type(graph.link(skin, "Data"), "NiSkinData");
        let skin_partition = graph
            .block_of_type(graph.link(skin, "Skin Partition"), "NiSkinPartition")
            .or_else(|| {
                skin_data.and_then(|d| {
                    graph.block_of_type(graph.link(d, "Skin Partition"), "NiSkinPartition")
                })
            });

        let bones: Vec<Option<BlockId>> = graph
            .fields(skin)
            .map(|f| f.get_array("Bones").iter().map(Value::as_link).collect())
            .unwrap_or_default();

        let mut binding = Self {
            skin_data,
            skin_partition,
            skeleton_root: graph.fields(skin).and_then(|f| f.get_link("Skeleton Root")),
            skeleton_trans: skin_data.map_or(Transform::IDENTITY, |d| Transform::from_block(graph, d)),
            bones,
            ..Default::default()
        };

        if let Some(data) = skin_data.and_then(|d| graph.fields(d)) {
            let read_weights = data.get_bool("Has Vertex Weights") && skin_partition.is_none();
            binding.weights = data
                .get_array("Bone List")
                .iter()
                .filter_map(Value::as_compound)
                .zip(&binding.bones)
                .map(|(entry, bone)| BoneWeights::from_compound(entry, *bone, read_weights))
                .collect();
        }

        if let Some(part) = skin_partition.and_then(|p| graph.fields(p)) {
            binding.partitions = part
                .get_array("Partitions")
                .iter()
                .filter_map(Value::as_compound)
                .map(SkinPartition::from_compound)
                .collect();
        }

        binding
    }

    /// `true` when there is anything to blend.
    #[must_use]
    pub fn has_weights(&self) -> bool {
        !self.partitions.is_empty() || self.weights.iter().any(|w| !w.weights.is_empty())
    }

    /// All partition triangles in mesh vertex indices.
    #[must_use]
    pub fn remapped_triangles(&self) -> Vec<[u32; 3]> {
        self.partitions.iter().flat_map(SkinPartition::remapped_triangles).collect()
    }

    #[must_use]
    pub fn remapped_strips(&self) -> Vec<Vec<u32>> {
        self.partitions.iter().flat_map(SkinPartition::remapped_strips).collect()
    }
}

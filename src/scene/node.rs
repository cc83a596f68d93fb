use glam::Vec3;

use super::NodeKey;
use super::bound::BoundSphere;
use super::mesh::Mesh;
use super::options::SceneOptions;
use super::transform::Transform;
use crate::assets::{AssetGraph, BlockId};
use crate::properties::PropertyList;

/// Bit 0 of a node's `Flags` field.
pub const FLAG_HIDDEN: u32 = 0x1;

/// `NiLODNode` switching data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LodRanges {
    pub center: Vec3,
    /// `(near, far)` per child, in child order.
    pub ranges: Vec<(f32, f32)>,
    /// The `NiRangeLODData` block, when the ranges live there.
    pub data: Option<BlockId>,
}

impl LodRanges {
    fn read(graph: &dyn AssetGraph, block: BlockId) -> Self {
        let data = graph.block_of_type(graph.link(block, "LOD Level Data"), "NiRangeLODData");
        let Some(fields) = graph.fields(data.unwrap_or(block)) else {
            return Self::default();
        };

        Self {
            center: fields.get_vec3("LOD Center"),
            ranges: fields
                .get_array("LOD Levels")
                .iter()
                .filter_map(|v| v.as_compound())
                .map(|l| (l.get_f32("Near Extent"), l.get_f32("Far Extent")))
                .collect(),
            data,
        }
    }

    /// Visibility of each of `count` children at a view distance. Without
    /// ranges only the first child shows.
    #[must_use]
    pub fn visibility(&self, distance: f32, count: usize) -> Vec<bool> {
        if self.ranges.is_empty() {
            return (0..count).map(|c| c == 0).collect();
        }
        (0..count)
            .map(|c| {
                self.ranges
                    .get(c)
                    .is_some_and(|&(near, far)| near <= distance && distance < far)
            })
            .collect()
    }
}

/// What a node is beyond its transform and children.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Plain,
    Lod(LodRanges),
    /// View rotation is reset so the subtree faces the camera.
    Billboard,
    Mesh(Box<Mesh>),
}

/// A scene-graph entity built from one `NiAVObject` block.
///
/// The scene owns every node; parents and children refer to each other by
/// [`NodeKey`].
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) block: BlockId,
    pub(crate) name: String,
    pub(crate) flags: u32,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
    pub(crate) properties: PropertyList,
    pub(crate) kind: NodeKind,

    pub local: Transform,
    pub(crate) world: Transform,
    pub(crate) view: Transform,

    /// Switched off by an `NiLODNode` parent.
    pub(crate) lod_hidden: bool,
    /// The block is a `BSOrderedNode`.
    pub(crate) ordered: bool,
    /// Inside a `BSOrderedNode` subtree.
    pub(crate) presorted: bool,
}

impl Node {
    pub(crate) fn new(block: BlockId, kind: NodeKind) -> Self {
        Self {
            block,
            name: String::new(),
            flags: 0,
            parent: None,
            children: Vec::new(),
            properties: PropertyList::new(),
            kind,
            local: Transform::IDENTITY,
            world: Transform::IDENTITY,
            view: Transform::IDENTITY,
            lod_hidden: false,
            ordered: false,
            presorted: false,
        }
    }

    /// Re-reads the block's own fields: name, flags, local transform and
    /// LOD ranges.
    pub(crate) fn read_block(&mut self, graph: &dyn AssetGraph) {
        let Some(fields) = graph.fields(self.block) else {
            return;
        };
        self.name = fields.get_str("Name").to_owned();
        self.flags = fields.get_u32("Flags");
        self.local = Transform::from_compound(fields);
        self.ordered = graph.inherits(self.block, "BSOrderedNode");

        if let NodeKind::Lod(lod) = &mut self.kind {
            *lod = LodRanges::read(graph, self.block);
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
    pub fn flags(&self) -> u32 {
        self.flags
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Properties attached directly to this node.
    #[inline]
    #[must_use]
    pub fn properties(&self) -> &PropertyList {
        &self.properties
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[must_use]
    pub fn mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub(crate) fn mesh_mut(&mut self) -> Option<&mut Mesh> {
        match &mut self.kind {
            NodeKind::Mesh(m) => Some(m),
            _ => None,
        }
    }

    /// World transform from the last [`Scene::transform`](super::Scene::transform).
    #[inline]
    #[must_use]
    pub fn world_trans(&self) -> &Transform {
        &self.world
    }

    #[inline]
    #[must_use]
    pub fn view_trans(&self) -> &Transform {
        &self.view
    }

    /// Depth along the view axis.
    #[inline]
    #[must_use]
    pub fn view_depth(&self) -> f32 {
        self.view.translation.z
    }

    #[inline]
    #[must_use]
    pub fn is_presorted(&self) -> bool {
        self.presorted
    }

    /// Own hidden state, ignoring ancestors.
    #[inline]
    pub(crate) fn hidden_self(&self) -> bool {
        self.flags & FLAG_HIDDEN != 0 || self.lod_hidden
    }

    /// Bound of the node itself, in world space; meshes add their geometry
    /// on top in [`Scene::node_bounds`](super::Scene::node_bounds).
    pub(crate) fn own_bounds(&self, graph: &dyn AssetGraph, options: SceneOptions) -> BoundSphere {
        let mut bound = BoundSphere::EMPTY;

        if options.intersects(SceneOptions::SHOW_NODES | SceneOptions::SHOW_COLLISION) {
            bound |= BoundSphere::new(self.world.translation, 0.0);
        }

        let Some(fields) = graph.fields(self.block) else {
            return bound;
        };

        // legacy collision box
        if fields.get_bool("Has Bounding Box")
            && let Some(bbox) = fields.get_compound("Bounding Box")
        {
            bound |= BoundSphere::new(bbox.get_vec3("Translation"), bbox.get_vec3("Radius").length());
        }

        if graph.is_block(self.block, "NiMesh")
            && let Some(b) = fields.get_compound("Bound")
        {
            bound |= BoundSphere::new(b.get_vec3("Center"), b.get_f32("Radius"));
        }

        for extra in fields.get_link_array("Extra Data List") {
            if !graph.is_block(extra, "BSBound") {
                continue;
            }
            if let Some(b) = graph.fields(extra) {
                bound |= BoundSphere::new(b.get_vec3("Center"), b.get_vec3("Dimensions").length());
            }
        }

        bound
    }
}

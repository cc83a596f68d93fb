use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;

use super::NodeKey;
use super::bound::BoundSphere;
use super::mesh::{EDITOR_MARKER_PREFIX, Mesh, ShaderState};
use super::node::{LodRanges, Node, NodeKind};
use super::options::{LodLevel, SceneOptions, ViewerSettings, VisMode};
use super::skin::BonePose;
use super::transform::Transform;
use crate::assets::{AssetGraph, BlockId, FolderMaterialProvider, MaterialProvider, Value};
use crate::properties::{Property, PropertyList, SharedProperty};
use crate::renderer::{GpuBackend, Renderer, SamplerState, TextureCache};

/// The scene built from one asset graph.
///
/// Owns every node and property. Nodes are created on demand while walking
/// the graph from its roots and are keyed by their block. Display toggles
/// are plain state on the scene rather than process-wide globals.
pub struct Scene {
    nodes: SlotMap<NodeKey, Node>,
    index: FxHashMap<BlockId, NodeKey>,
    roots: Vec<NodeKey>,
    /// Every property decoded so far; nodes hold clones of these handles.
    properties: PropertyList,

    pub options: SceneOptions,
    pub lod_level: LodLevel,
    pub vis_mode: VisMode,

    view: Transform,
    time: f32,

    materials: Box<dyn MaterialProvider>,
    textures: RefCell<Box<dyn TextureCache>>,

    bounds: Option<BoundSphere>,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots)
            .field("properties", &self.properties.len())
            .field("options", &self.options)
            .field("lod_level", &self.lod_level)
            .finish_non_exhaustive()
    }
}

impl Scene {
    #[must_use]
    pub fn new(
        settings: &ViewerSettings,
        materials: Box<dyn MaterialProvider>,
        textures: Box<dyn TextureCache>,
    ) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            index: FxHashMap::default(),
            roots: Vec::new(),
            properties: PropertyList::new(),
            options: settings.options,
            lod_level: settings.lod_level,
            vis_mode: settings.vis_mode,
            view: Transform::IDENTITY,
            time: 0.0,
            materials,
            textures: RefCell::new(textures),
            bounds: None,
        }
    }

    /// Scene reading materials from the settings' resource folders.
    #[must_use]
    pub fn from_settings(settings: &ViewerSettings, textures: Box<dyn TextureCache>) -> Self {
        let materials = FolderMaterialProvider::new(settings.resource_folders.clone());
        Self::new(settings, Box::new(materials), textures)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Drops every node and property and flushes the texture cache.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.roots.clear();
        self.properties.clear();
        self.textures.borrow_mut().flush();
        self.bounds = None;
    }

    /// Rebuilds the scene from scratch.
    pub fn make(&mut self, graph: &dyn AssetGraph) {
        self.clear();
        self.update(graph, None);
    }

    /// Propagates a change.
    ///
    /// With `Some(block)` every property and node re-reads whatever it takes
    /// from that block. With `None` stale entries are dropped, everything is
    /// re-read and the roots are rebuilt from the graph.
    pub fn update(&mut self, graph: &dyn AssetGraph, block: Option<BlockId>) {
        match block {
            Some(block) => {
                if !graph.contains(block) {
                    return;
                }
                for prop in self.properties.iter() {
                    prop.borrow_mut().update(graph, block, self.materials.as_ref());
                }
                let keys: Vec<NodeKey> = self.nodes.keys().collect();
                for key in keys {
                    self.update_node(graph, key, Some(block));
                }
            }
            None => {
                self.properties.validate(graph);
                self.validate_nodes(graph);

                let keys: Vec<NodeKey> = self.nodes.keys().collect();
                for key in keys {
                    self.update_node(graph, key, None);
                }
                for prop in self.properties.iter() {
                    let b = prop.borrow().block();
                    prop.borrow_mut().update(graph, b, self.materials.as_ref());
                }

                self.roots.clear();
                for link in graph.root_links() {
                    if let Some(key) = self.get_node(graph, link) {
                        self.make_parent(key, None);
                        if !self.roots.contains(&key) {
                            self.roots.push(key);
                        }
                    }
                }
            }
        }

        self.refresh_shader_states();
        self.bounds = None;
    }

    fn validate_nodes(&mut self, graph: &dyn AssetGraph) {
        self.nodes.retain(|_, n| graph.contains(n.block));
        let live: FxHashSet<NodeKey> = self.nodes.keys().collect();
        self.index.retain(|_, k| live.contains(k));
        for node in self.nodes.values_mut() {
            node.children.retain(|c| live.contains(c));
            if node.parent.is_some_and(|p| !live.contains(&p)) {
                node.parent = None;
            }
        }
        self.roots.retain(|r| live.contains(r));
    }

    /// Node for a block, created and read on first request. Blocks that are
    /// not scene objects yield `None`.
    pub fn get_node(&mut self, graph: &dyn AssetGraph, block: BlockId) -> Option<NodeKey> {
        if let Some(&key) = self.index.get(&block) {
            return Some(key);
        }

        let type_name = graph.block_type(block)?;
        let kind = if graph.inherits(block, "NiNode") {
            match type_name {
                "NiLODNode" => NodeKind::Lod(LodRanges::default()),
                "NiBillboardNode" => NodeKind::Billboard,
                _ => NodeKind::Plain,
            }
        } else if matches!(type_name, "NiTriShape" | "NiTriStrips") || graph.inherits(block, "NiTriBasedGeom") {
            NodeKind::Mesh(Box::default())
        } else if type_name == "NiMesh" && graph.check_version(0x1405_0000, 0) {
            NodeKind::Mesh(Box::default())
        } else if graph.inherits(block, "NiAVObject") && type_name == "BSTreeNode" {
            NodeKind::Plain
        } else {
            return None;
        };

        let key = self.nodes.insert(Node::new(block, kind));
        self.index.insert(block, key);
        self.update_node(graph, key, Some(block));
        Some(key)
    }

    /// Property for a block, decoded on first request.
    pub fn get_property(&mut self, graph: &dyn AssetGraph, block: BlockId) -> Option<SharedProperty> {
        if let Some(prop) = self.properties.get_block(block) {
            return Some(prop);
        }
        let prop = Property::create(graph, block, self.materials.as_ref())?.into_shared();
        self.properties.add(prop.clone());
        Some(prop)
    }

    fn update_node(&mut self, graph: &dyn AssetGraph, key: NodeKey, block: Option<BlockId>) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        let node_block = node.block;

        if !graph.contains(node_block) {
            let children = std::mem::take(&mut self.nodes[key].children);
            self.detach(key, &children);
            self.nodes[key].properties.clear();
            return;
        }

        let own = block == Some(node_block);
        if own && let Some(node) = self.nodes.get_mut(key) {
            node.read_block(graph);
        }

        if own || block.is_none() {
            self.read_properties(graph, key, node_block);
            self.read_children(graph, key, node_block);
        }

        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };

        if let Some(b) = block.filter(|_| !own)
            && let NodeKind::Lod(lod) = &node.kind
            && lod.data == Some(b)
        {
            node.read_block(graph);
        }

        let remesh = own || block.is_none() || block.is_some_and(|b| node.mesh().is_some_and(|m| m.depends_on(b)));
        if remesh && let Some(mesh) = node.mesh_mut() {
            let hint = mesh.program_hint.take();
            *mesh = Mesh::read(graph, node_block);
            mesh.program_hint = hint;
        }
    }

    fn read_properties(&mut self, graph: &dyn AssetGraph, key: NodeKey, node_block: BlockId) {
        let mut props = PropertyList::new();

        let links = graph
            .fields(node_block)
            .map(|f| f.get_link_array("Properties"))
            .unwrap_or_default();
        for link in links {
            if let Some(p) = self.get_property(graph, link) {
                props.add(p);
            }
        }

        for (field, type_name) in [("Shader Property", "BSShaderProperty"), ("Alpha Property", "NiAlphaProperty")] {
            if let Some(b) = graph.block_of_type(graph.link(node_block, field), type_name)
                && let Some(p) = self.get_property(graph, b)
            {
                props.add(p);
            }
        }

        if let Some(node) = self.nodes.get_mut(key) {
            node.properties = props;
        }
    }

    fn read_children(&mut self, graph: &dyn AssetGraph, key: NodeKey, node_block: BlockId) {
        let old = self
            .nodes
            .get_mut(key)
            .map(|n| std::mem::take(&mut n.children))
            .unwrap_or_default();
        self.detach(key, &old);

        let child_links = graph.child_links(node_block);
        let links: Vec<BlockId> = graph
            .fields(node_block)
            .map(|f| f.get_array("Children").iter().filter_map(Value::as_link).collect())
            .unwrap_or_default();

        for link in links {
            // back pointers in the child list are not ownership
            if !child_links.contains(&link) {
                continue;
            }
            if let Some(child) = self.get_node(graph, link) {
                self.make_parent(child, Some(key));
            }
        }
    }

    fn detach(&mut self, parent: NodeKey, children: &[NodeKey]) {
        for c in children {
            if let Some(n) = self.nodes.get_mut(*c)
                && n.parent == Some(parent)
            {
                n.parent = None;
            }
        }
    }

    /// Moves `child` under `parent`. Refused when it would close a cycle.
    pub fn make_parent(&mut self, child: NodeKey, parent: Option<NodeKey>) -> bool {
        if let Some(p) = parent
            && self.is_ancestor_or_self(child, p)
        {
            log::warn!("Refusing to parent a node under its own descendant");
            return false;
        }

        if let Some(old) = self.nodes.get(child).and_then(|n| n.parent)
            && let Some(old) = self.nodes.get_mut(old)
        {
            old.children.retain(|c| *c != child);
        }

        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = parent;
        }
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(p))
            && !p.children.contains(&child)
        {
            p.children.push(child);
        }
        true
    }

    /// `true` if `ancestor` is `key` or one of its parents.
    fn is_ancestor_or_self(&self, ancestor: NodeKey, key: NodeKey) -> bool {
        let mut cur = Some(key);
        while let Some(k) = cur {
            if k == ancestor {
                return true;
            }
            cur = self.nodes.get(k).and_then(|n| n.parent);
        }
        false
    }

    fn refresh_shader_states(&mut self) {
        let meshes: Vec<NodeKey> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.mesh().is_some())
            .map(|(k, _)| k)
            .collect();
        for key in meshes {
            let state = ShaderState::from_properties(&self.active_properties(key));
            if let Some(mesh) = self.nodes.get_mut(key).and_then(Node::mesh_mut) {
                mesh.shader = state;
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[must_use]
    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    #[must_use]
    pub fn node_for_block(&self, block: BlockId) -> Option<NodeKey> {
        self.index.get(&block).copied()
    }

    #[must_use]
    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn properties(&self) -> &PropertyList {
        &self.properties
    }

    #[must_use]
    pub fn view(&self) -> &Transform {
        &self.view
    }

    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// The node's own properties, then each ancestor's for types not seen
    /// yet.
    #[must_use]
    pub fn active_properties(&self, key: NodeKey) -> PropertyList {
        let mut list = PropertyList::new();
        let mut cur = Some(key);
        while let Some(node) = cur.and_then(|k| self.nodes.get(k)) {
            list.merge(&node.properties);
            cur = node.parent;
        }
        list
    }

    /// Hidden by its own flags, its LOD parent, or any ancestor, unless
    /// hidden nodes are shown.
    #[must_use]
    pub fn is_hidden(&self, key: NodeKey) -> bool {
        if self.options.contains(SceneOptions::SHOW_HIDDEN) {
            return false;
        }
        let mut cur = Some(key);
        while let Some(node) = cur.and_then(|k| self.nodes.get(k)) {
            if node.hidden_self() {
                return true;
            }
            cur = node.parent;
        }
        false
    }

    /// Binds a texture to the backend's active unit. Returns the mip level
    /// count, 0 when texturing is off or the name is empty.
    pub fn bind_texture(&self, name: &str, sampler: &SamplerState) -> u32 {
        if name.is_empty() || !self.options.contains(SceneOptions::DO_TEXTURING) {
            return 0;
        }
        self.textures.borrow_mut().bind(name, sampler)
    }

    // ========================================================================
    // Per-frame
    // ========================================================================

    /// Pushes a new view transform through the hierarchy and reskins every
    /// visible mesh.
    pub fn transform(&mut self, view: Transform, time: f32) {
        self.view = view;
        self.time = time;
        self.bounds = None;

        let mut meshes = Vec::new();
        // (node, parent world and view, parent presorted)
        let mut stack: Vec<(NodeKey, Option<(Transform, Transform)>, bool)> = Vec::with_capacity(64);
        for &root in self.roots.iter().rev() {
            stack.push((root, None, false));
        }

        while let Some((key, parent, parent_presorted)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(key) else {
                continue;
            };

            let (world, mut node_view) = match parent {
                Some((pw, pv)) => (pw * node.local, pv * node.local),
                None => (node.local, view * node.local),
            };
            if matches!(node.kind, NodeKind::Billboard) {
                node_view.rotation = glam::Mat3::IDENTITY;
            }
            node.world = world;
            node.view = node_view;
            node.presorted = parent_presorted || node.ordered;

            if node.mesh().is_some() {
                meshes.push(key);
            }

            let children = node.children.clone();
            if let NodeKind::Lod(lod) = &node.kind {
                let distance = (node_view * lod.center).length();
                let visible = lod.visibility(distance, children.len());
                for (c, v) in children.iter().zip(visible) {
                    if let Some(child) = self.nodes.get_mut(*c) {
                        child.lod_hidden = !v;
                    }
                }
            }

            let presorted = self.nodes.get(key).is_some_and(|n| n.presorted);
            for &c in children.iter().rev() {
                stack.push((c, Some((world, node_view)), presorted));
            }
        }

        for key in meshes {
            self.transform_shapes(key);
        }
    }

    fn transform_shapes(&mut self, key: NodeKey) {
        if self.is_hidden(key) {
            return;
        }
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        let Some(mesh) = node.mesh() else {
            return;
        };
        let view = node.view;

        let (poses, missing) = match mesh.skin_binding() {
            Some(skin) if mesh.is_skinned(self.options) => {
                let base = view * skin.skeleton_trans;
                let root = skin.skeleton_root.and_then(|r| self.find_parent(key, r));
                let poses = skin
                    .bones
                    .iter()
                    .enumerate()
                    .map(|(i, bone)| {
                        let found = root.zip(*bone).and_then(|(r, b)| Some((self.find_child(r, b)?, r)));
                        // bones outside the skeleton root's subtree fall back to the base
                        let Some((b, r)) = found else {
                            return BonePose { trans: base, view: None };
                        };
                        let bind = skin.weights.get(i).map_or(Transform::IDENTITY, |w| w.trans);
                        BonePose {
                            trans: base * self.local_trans_to(b, r) * bind,
                            view: self.nodes.get(b).map(|n| n.view),
                        }
                    })
                    .collect::<Vec<_>>();
                (poses, base)
            }
            _ => (Vec::new(), view),
        };

        let options = self.options;
        if let Some(mesh) = self.nodes.get_mut(key).and_then(Node::mesh_mut) {
            mesh.transform_shapes(&view, &poses, missing, options);
        }
    }

    /// Nearest ancestor of `key` built from `block`.
    fn find_parent(&self, key: NodeKey, block: BlockId) -> Option<NodeKey> {
        let mut cur = self.nodes.get(key)?.parent;
        while let Some(k) = cur {
            let node = self.nodes.get(k)?;
            if node.block == block {
                return Some(k);
            }
            cur = node.parent;
        }
        None
    }

    /// Depth-first search below `key` for the node built from `block`.
    fn find_child(&self, key: NodeKey, block: BlockId) -> Option<NodeKey> {
        let mut stack: Vec<NodeKey> = self.nodes.get(key)?.children.iter().rev().copied().collect();
        while let Some(k) = stack.pop() {
            let node = self.nodes.get(k)?;
            if node.block == block {
                return Some(k);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    /// Product of local transforms from `key` up to, but excluding, `root`.
    fn local_trans_to(&self, key: NodeKey, root: NodeKey) -> Transform {
        let mut trans = Transform::IDENTITY;
        let mut cur = Some(key);
        while let Some(k) = cur.filter(|k| *k != root) {
            let Some(node) = self.nodes.get(k) else {
                break;
            };
            trans = node.local * trans;
            cur = node.parent;
        }
        trans
    }

    // ========================================================================
    // Bounds
    // ========================================================================

    /// World-space bound of one node: its own markers plus, for meshes, the
    /// geometry.
    #[must_use]
    pub fn node_bounds(&self, graph: &dyn AssetGraph, key: NodeKey) -> BoundSphere {
        let Some(node) = self.nodes.get(key) else {
            return BoundSphere::EMPTY;
        };
        let mut bound = node.own_bounds(graph, self.options);
        if let Some(mesh) = node.mesh() {
            bound |= node.world * mesh.local_bound();
        }
        bound
    }

    /// Union of every visible node's bound, cached until the next update or
    /// transform.
    pub fn bounds(&mut self, graph: &dyn AssetGraph) -> BoundSphere {
        if let Some(b) = self.bounds {
            return b;
        }
        let mut bound = BoundSphere::EMPTY;
        for key in self.nodes.keys() {
            if !self.is_hidden(key) {
                bound |= self.node_bounds(graph, key);
            }
        }
        self.bounds = Some(bound);
        bound
    }

    /// Drops the cached scene bound.
    pub fn invalidate_bounds(&mut self) {
        self.bounds = None;
    }

    // ========================================================================
    // Drawing
    // ========================================================================

    /// Visible meshes in draw order. Children of presorted nodes are ordered
    /// by block.
    #[must_use]
    pub fn draw_order(&self) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeKey> = self.roots.iter().rev().copied().collect();

        while let Some(key) = stack.pop() {
            if self.is_hidden(key) {
                continue;
            }
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            if node.mesh().is_some() {
                out.push(key);
            }

            let mut children = node.children.clone();
            if node.presorted {
                children.sort_by_key(|c| self.nodes.get(*c).map(|n| n.block));
            }
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Draws every visible mesh. With blending on, meshes that need it are
    /// deferred to a second pass drawn in the order they were met.
    pub fn draw_shapes<B: GpuBackend>(&mut self, graph: &dyn AssetGraph, renderer: &mut Renderer<B>) {
        let order = self.draw_order();

        if !self.options.contains(SceneOptions::DO_BLENDING) {
            for key in order {
                self.draw_mesh(graph, renderer, key);
            }
            return;
        }

        let mut second_pass = Vec::new();
        for key in order {
            if self
                .nodes
                .get(key)
                .and_then(Node::mesh)
                .is_some_and(|m| m.shader.draw_in_second_pass)
            {
                second_pass.push(key);
            } else {
                self.draw_mesh(graph, renderer, key);
            }
        }
        for key in second_pass {
            self.draw_mesh(graph, renderer, key);
        }
    }

    fn draw_mesh<B: GpuBackend>(&mut self, graph: &dyn AssetGraph, renderer: &mut Renderer<B>, key: NodeKey) {
        let Some(node) = self.nodes.get(key) else {
            return;
        };
        let Some(mesh) = node.mesh() else {
            return;
        };
        if node.name.starts_with(EDITOR_MARKER_PREFIX) && !self.options.contains(SceneOptions::SHOW_MARKERS) {
            return;
        }

        let hint = mesh.program_hint.clone();
        let selection = renderer.setup_program(graph, self, key, hint.as_deref());

        {
            let call = mesh.draw_call(node.block, &node.view, self.lod_level, self.options);
            renderer.draw(&call);
        }
        renderer.stop_program();

        if let Some(mesh) = self.nodes.get_mut(key).and_then(Node::mesh_mut) {
            mesh.program_hint = selection.program_name().map(str::to_owned);
        }
    }
}

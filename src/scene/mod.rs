//! Scene graph built from an asset graph.
//!
//! - Node: hierarchy entry with transforms, flags and properties
//! - Mesh: shape geometry, skinning and per-frame transformed streams
//! - Transform: rotation, translation and uniform scale
//! - BoundSphere: bounding volumes merged up the hierarchy
//! - Scene: node and property container, per-frame transform and drawing

pub mod bound;
pub mod mesh;
pub mod node;
pub mod options;
pub mod scene;
pub mod skin;
pub mod transform;

pub use bound::BoundSphere;
pub use mesh::{Mesh, ShaderState};
pub use node::{LodRanges, Node, NodeKind};
pub use options::{LodLevel, SceneOptions, ViewerSettings, VisMode};
pub use scene::Scene;
pub use skin::{BonePose, BoneWeights, SkinBinding, SkinPartition, VertexStreams, VertexWeight};
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeKey;
}

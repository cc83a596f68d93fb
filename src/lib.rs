//! Scene graph, skinning and shader selection core of a NIF asset viewer.
//!
//! An [`AssetGraph`] is turned into a [`Scene`] of nodes, meshes and shared
//! properties. Each frame the scene pushes a view [`Transform`] through the
//! hierarchy, reskins meshes and hands them to a [`Renderer`], which picks a
//! shader program per mesh or falls back to the fixed pipeline.

pub mod assets;
pub mod errors;
pub mod properties;
pub mod renderer;
pub mod scene;

pub use assets::{AssetGraph, BlockGraph, BlockId, Value};
pub use errors::{Result, ViewerError};
pub use properties::{Property, PropertyList, SharedProperty};
pub use renderer::{GpuBackend, ProgramSelection, Renderer, TextureCache};
pub use scene::{BoundSphere, Mesh, Node, NodeKey, Scene, SceneOptions, Transform, ViewerSettings};

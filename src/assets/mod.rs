//! Read-side model of the asset graph and the external material files it
//! refers to.

pub mod block_graph;
pub mod graph;
pub mod material;
pub(crate) mod types;
pub mod value;

pub use block_graph::{Block, BlockGraph};
pub use graph::{AssetGraph, FileVersion};
pub use material::{
    EffectMaterial, FolderMaterialProvider, MaterialFile, MaterialHeader, MaterialKind,
    MaterialProvider, MemoryMaterialProvider, ShaderMaterial, load_material, to_local_path,
};
pub use value::{BlockId, Compound, Value};

use rustc_hash::FxHashMap;

use super::graph::{AssetGraph, FileVersion};
use super::types::builtin_parent;
use super::value::{BlockId, Compound, Value};
use crate::errors::{Result, ViewerError};

/// One block: its concrete type and its fields.
#[derive(Debug, Clone)]
pub struct Block {
    pub type_name: String,
    pub fields: Compound,
}

impl Block {
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), fields: Compound::new() }
    }

    /// Builder-style field insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.set(name, value);
        self
    }
}

/// In-memory asset graph.
///
/// Blocks are addressed by their insertion index. Removing a block leaves a
/// hole so the ids of later blocks stay stable, which is what lets
/// [`Scene::update`](crate::scene::Scene::update) drop nodes and properties
/// whose backing block went away.
#[derive(Debug, Clone, Default)]
pub struct BlockGraph {
    version: FileVersion,
    header: Compound,
    blocks: Vec<Option<Block>>,
    roots: Vec<BlockId>,
    custom_types: FxHashMap<String, String>,
}

impl BlockGraph {
    #[must_use]
    pub fn new(version: FileVersion) -> Self {
        let header = Compound::new()
            .with("Version", Value::FileVersion(version.version))
            .with("User Version", Value::Count(u64::from(version.user_version)))
            .with("BS Version", Value::Count(u64::from(version.stream)));
        Self { version, header, ..Default::default() }
    }

    /// Appends a block and returns its id.
    pub fn add(&mut self, block: Block) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Some(block));
        id
    }

    /// Removes a block, keeping ids of the others stable.
    pub fn remove(&mut self, id: BlockId) -> Option<Block> {
        self.roots.retain(|r| *r != id);
        self.blocks.get_mut(id.0 as usize).and_then(Option::take)
    }

    pub fn add_root(&mut self, id: BlockId) {
        if !self.roots.contains(&id) {
            self.roots.push(id);
        }
    }

    /// Mutable access to a block's fields.
    pub fn fields_mut(&mut self, id: BlockId) -> Result<&mut Compound> {
        self.blocks
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .map(|b| &mut b.fields)
            .ok_or(ViewerError::BlockNotFound(id.0))
    }

    /// Convenience for `fields_mut(id)?.set(name, value)`.
    pub fn set(&mut self, id: BlockId, name: &str, value: Value) -> Result<()> {
        self.fields_mut(id)?.set(name, value);
        Ok(())
    }

    pub fn header_mut(&mut self) -> &mut Compound {
        &mut self.header
    }

    /// Declares a type not present in the built-in hierarchy.
    pub fn register_type(&mut self, name: &str, parent: &str) -> Result<()> {
        let existing = self
            .custom_types
            .get(name)
            .map(String::as_str)
            .or_else(|| builtin_parent(name));
        match existing {
            Some(p) if p != parent => Err(ViewerError::TypeConflict {
                name: name.to_owned(),
                parent: p.to_owned(),
            }),
            _ => {
                self.custom_types.insert(name.to_owned(), parent.to_owned());
                Ok(())
            }
        }
    }

    fn parent_type<'a>(&'a self, name: &str) -> Option<&'a str> {
        self.custom_types
            .get(name)
            .map(String::as_str)
            .or_else(|| builtin_parent(name))
    }

    /// Number of slots, including removed blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(Option::is_none)
    }

    fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0 as usize).and_then(Option::as_ref)
    }
}

impl AssetGraph for BlockGraph {
    fn version(&self) -> FileVersion {
        self.version
    }

    fn header(&self) -> &Compound {
        &self.header
    }

    fn block_type(&self, block: BlockId) -> Option<&str> {
        self.block(block).map(|b| b.type_name.as_str())
    }

    fn inherits(&self, block: BlockId, ancestor: &str) -> bool {
        let Some(mut current) = self.block_type(block) else {
            return false;
        };
        // Depth guard against a cyclic custom registration.
        for _ in 0..64 {
            if current == ancestor {
                return true;
            }
            match self.parent_type(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    fn fields(&self, block: BlockId) -> Option<&Compound> {
        self.block(block).map(|b| &b.fields)
    }

    fn root_links(&self) -> Vec<BlockId> {
        self.roots.clone()
    }
}

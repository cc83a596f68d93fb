//! The asset-graph store as seen by the viewer core.
//!
//! The core only ever reads from the graph. Change notifications are delivered
//! by the host calling [`Scene::update`](crate::scene::Scene::update) with the
//! block that changed.

use super::value::{BlockId, Compound, Value};

/// Version triple of a loaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileVersion {
    /// Packed engine version, e.g. `0x14020007` for 20.2.0.7.
    pub version: u32,
    pub user_version: u32,
    /// Bethesda stream version ("User Version 2" / "BS Version").
    pub stream: u32,
}

impl FileVersion {
    #[must_use]
    pub const fn new(version: u32, user_version: u32, stream: u32) -> Self {
        Self { version, user_version, stream }
    }

    /// `since..=until`, where a bound of zero means unbounded.
    #[inline]
    #[must_use]
    pub fn check(&self, since: u32, until: u32) -> bool {
        (since == 0 || self.version >= since) && (until == 0 || self.version <= until)
    }
}

/// Read access to a typed, versioned block graph.
pub trait AssetGraph {
    fn version(&self) -> FileVersion;

    /// Header fields (`HEADER/...` condition paths resolve here).
    fn header(&self) -> &Compound;

    /// Concrete type name of a block.
    fn block_type(&self, block: BlockId) -> Option<&str>;

    /// `true` if the block's type is `ancestor` or derives from it.
    fn inherits(&self, block: BlockId, ancestor: &str) -> bool;

    fn fields(&self, block: BlockId) -> Option<&Compound>;

    /// Top-level blocks of the file.
    fn root_links(&self) -> Vec<BlockId>;

    // ========================================================================
    // Provided helpers
    // ========================================================================

    #[inline]
    fn contains(&self, block: BlockId) -> bool {
        self.block_type(block).is_some()
    }

    /// Exact type match.
    fn is_block(&self, block: BlockId, type_name: &str) -> bool {
        self.block_type(block) == Some(type_name)
    }

    fn field(&self, block: BlockId, path: &str) -> Option<&Value> {
        self.fields(block)?.get(path)
    }

    /// Follows a link field, returning the target only if it exists.
    fn link(&self, block: BlockId, path: &str) -> Option<BlockId> {
        let target = self.fields(block)?.get_link(path)?;
        self.contains(target).then_some(target)
    }

    /// Returns `link` only if it names a block inheriting `type_name`.
    fn block_of_type(&self, link: Option<BlockId>, type_name: &str) -> Option<BlockId> {
        link.filter(|&b| self.inherits(b, type_name))
    }

    /// All owning links held anywhere inside a block.
    fn child_links(&self, block: BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        if let Some(fields) = self.fields(block) {
            fields.collect_child_links(&mut out);
        }
        out
    }

    #[inline]
    fn check_version(&self, since: u32, until: u32) -> bool {
        self.version().check(since, until)
    }
}

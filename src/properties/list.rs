use std::cell::Ref;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::{PropertyType, PropertyVariant, SharedProperty};
use crate::assets::{AssetGraph, BlockId};

/// Properties grouped by type.
///
/// Several properties of one type may be present; rendering uses the first.
#[derive(Debug, Clone, Default)]
pub struct PropertyList {
    properties: BTreeMap<PropertyType, Vec<SharedProperty>>,
}

impl PropertyList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a property unless this exact handle is already present.
    pub fn add(&mut self, prop: SharedProperty) {
        let ty = prop.borrow().property_type();
        let bucket = self.properties.entry(ty).or_default();
        if !bucket.iter().any(|p| Rc::ptr_eq(p, &prop)) {
            bucket.push(prop);
        }
    }

    pub fn del(&mut self, prop: &SharedProperty) {
        let ty = prop.borrow().property_type();
        if let Some(bucket) = self.properties.get_mut(&ty) {
            bucket.retain(|p| !Rc::ptr_eq(p, prop));
            if bucket.is_empty() {
                self.properties.remove(&ty);
            }
        }
    }

    /// Handle of the property decoded from `block`.
    #[must_use]
    pub fn get_block(&self, block: BlockId) -> Option<SharedProperty> {
        self.iter().find(|p| p.borrow().block() == block).cloned()
    }

    /// First property of a type.
    #[must_use]
    pub fn get_shared(&self, ty: PropertyType) -> Option<&SharedProperty> {
        self.properties.get(&ty)?.first()
    }

    /// Typed borrow of the first property of `T`'s type.
    #[must_use]
    pub fn get<T: PropertyVariant>(&self) -> Option<Ref<'_, T>> {
        let prop = self.get_shared(T::TYPE)?.borrow();
        Ref::filter_map(prop, |p| T::cast(p.kind())).ok()
    }

    #[must_use]
    pub fn contains(&self, ty: PropertyType) -> bool {
        self.properties.contains_key(&ty)
    }

    /// Adds every property of `other` whose type is not present here yet.
    pub fn merge(&mut self, other: &PropertyList) {
        for (ty, bucket) in &other.properties {
            if !self.properties.contains_key(ty) {
                self.properties.insert(*ty, bucket.clone());
            }
        }
    }

    /// Drops properties whose block is no longer in the graph.
    pub fn validate(&mut self, graph: &dyn AssetGraph) {
        for bucket in self.properties.values_mut() {
            bucket.retain(|p| graph.contains(p.borrow().block()));
        }
        self.properties.retain(|_, bucket| !bucket.is_empty());
    }

    pub fn clear(&mut self) {
        self.properties.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedProperty> {
        self.properties.values().flatten()
    }

    /// Backing blocks of all properties, in type order.
    #[must_use]
    pub fn blocks(&self) -> Vec<BlockId> {
        self.iter().map(|p| p.borrow().block()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.properties.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Block, BlockGraph, FileVersion, MemoryMaterialProvider, Value};
    use crate::properties::{AlphaProperty, Property};

    fn alpha(graph: &mut BlockGraph, flags: u64) -> SharedProperty {
        let b = graph.add(Block::new("NiAlphaProperty").with("Flags", Value::Count(flags)));
        Property::create(graph, b, &MemoryMaterialProvider::new()).unwrap().into_shared()
    }

    #[test]
    fn add_is_idempotent_per_handle() {
        let mut g = BlockGraph::new(FileVersion::default());
        let a = alpha(&mut g, 1);
        let mut list = PropertyList::new();
        list.add(a.clone());
        list.add(a.clone());
        assert_eq!(list.len(), 1);
        list.del(&a);
        assert!(list.is_empty());
    }

    #[test]
    fn merge_only_adds_unseen_types() {
        let mut g = BlockGraph::new(FileVersion::default());
        let mut own = PropertyList::new();
        own.add(alpha(&mut g, 1));
        let mut inherited = PropertyList::new();
        inherited.add(alpha(&mut g, 0));

        own.merge(&inherited);
        assert_eq!(own.len(), 1);
        assert!(own.get::<AlphaProperty>().unwrap().blend);
    }

    #[test]
    fn validate_drops_removed_blocks() {
        let mut g = BlockGraph::new(FileVersion::default());
        let a = alpha(&mut g, 1);
        let mut list = PropertyList::new();
        list.add(a.clone());
        g.remove(a.borrow().block());
        list.validate(&g);
        assert!(list.is_empty());
    }
}

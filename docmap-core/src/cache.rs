use std::{any::TypeId, collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;

use crate::record::RecordDescriptor;

/// Lazily populated map from record type to its descriptor.
///
/// Reads load an immutable snapshot without locking. Population builds the descriptor outside
/// the swap and then inserts it only if absent, so racing first uses all end up sharing the
/// first stored `Arc`.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    descriptors: ArcSwap<HashMap<TypeId, Arc<RecordDescriptor>>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &TypeId) -> Option<Arc<RecordDescriptor>> {
        self.descriptors.load().get(id).cloned()
    }

    /// Returns the cached descriptor, building and storing it on first use.
    ///
    /// A failed build leaves the cache untouched.
    pub fn get_or_try_insert_with<E>(
        &self,
        id: TypeId,
        build: impl FnOnce() -> Result<RecordDescriptor, E>,
    ) -> Result<Arc<RecordDescriptor>, E> {
        if let Some(descriptor) = self.get(&id) {
            return Ok(descriptor);
        }

        let built = Arc::new(build()?);
        self.descriptors.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.entry(id).or_insert_with(|| built.clone());
            next
        });

        Ok(self.get(&id).unwrap_or(built))
    }

    pub fn len(&self) -> usize {
        self.descriptors.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.load().is_empty()
    }
}

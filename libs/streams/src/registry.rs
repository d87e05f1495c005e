use std::sync::Arc;

/// Handle of a registered resource. Ids are never reused by the registry
/// that issued them, not even after a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Append-only arena of shared resources, kept in insertion order.
///
/// Entries leave only all at once, through [`ResourceRegistry::drain`].
pub struct ResourceRegistry<T: ?Sized> {
    next_id: u64,
    entries: Vec<(ResourceId, Arc<T>)>,
}

impl<T: ?Sized> Default for ResourceRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> ResourceRegistry<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, resource: Arc<T>) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, resource));
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &Arc<T>)> {
        self.entries.iter().map(|(id, r)| (*id, r))
    }

    /// Take every entry out, in insertion order, leaving the registry empty.
    pub fn drain(&mut self) -> Vec<(ResourceId, Arc<T>)> {
        std::mem::take(&mut self.entries)
    }
}

#![forbid(unsafe_code)]

//! Selected block ids plus a primary (anchor) id.
//!
//! Order is insertion order, which keeps group drags and notifications
//! deterministic. The primary is always a member when set.

use blockgrid_layout::BlockId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: Vec<BlockId>,
    primary: Option<BlockId>,
}

impl SelectionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contains(&self, id: &BlockId) -> bool {
        self.ids.contains(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockId> {
        self.ids.iter()
    }

    pub fn ids(&self) -> &[BlockId] {
        &self.ids
    }

    #[inline]
    pub fn primary(&self) -> Option<&BlockId> {
        self.primary.as_ref()
    }

    /// Replace the selection with a single id. Returns whether it changed.
    pub fn select_only(&mut self, id: BlockId) -> bool {
        if self.ids.len() == 1 && self.ids[0] == id && self.primary.as_ref() == Some(&id) {
            return false;
        }
        self.ids.clear();
        self.ids.push(id.clone());
        self.primary = Some(id);
        true
    }

    /// Add an id, making it primary.
    pub fn add(&mut self, id: BlockId) -> bool {
        let changed = !self.contains(&id) || self.primary.as_ref() != Some(&id);
        if !self.contains(&id) {
            self.ids.push(id.clone());
        }
        self.primary = Some(id);
        changed
    }

    pub fn remove(&mut self, id: &BlockId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| existing != id);
        if self.ids.len() == before {
            return false;
        }
        if self.primary.as_ref() == Some(id) {
            self.primary = self.ids.last().cloned();
        }
        true
    }

    /// Add if absent, remove if present.
    pub fn toggle(&mut self, id: BlockId) -> bool {
        if self.contains(&id) {
            self.remove(&id)
        } else {
            self.add(id)
        }
    }

    /// Replace the whole selection; the last id becomes primary.
    pub fn set(&mut self, ids: impl IntoIterator<Item = BlockId>) -> bool {
        let mut next: Vec<BlockId> = Vec::new();
        for id in ids {
            if !next.contains(&id) {
                next.push(id);
            }
        }
        let primary = next.last().cloned();
        if next == self.ids && primary == self.primary {
            return false;
        }
        self.ids = next;
        self.primary = primary;
        true
    }

    /// Make a member the primary. Non-members are ignored.
    pub fn set_primary(&mut self, id: &BlockId) -> bool {
        if !self.contains(id) || self.primary.as_ref() == Some(id) {
            return false;
        }
        self.primary = Some(id.clone());
        true
    }

    pub fn clear(&mut self) -> bool {
        if self.ids.is_empty() {
            return false;
        }
        self.ids.clear();
        self.primary = None;
        true
    }

    /// Drop ids that fail `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&BlockId) -> bool) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| keep(id));
        if self.ids.len() == before {
            return false;
        }
        if self.primary.as_ref().is_some_and(|p| !self.ids.contains(p)) {
            self.primary = self.ids.last().cloned();
        }
        true
    }
}

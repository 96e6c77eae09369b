//! Back-to-front window stacking order and derived z-index values.

use crate::model::WindowId;

/// Ordered window ids, back-to-front; the last id is the topmost window.
///
/// z-index values are `base + position`, so they stay within `base..base + len` no matter how
/// many focus changes happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusStack {
    order: Vec<WindowId>,
    base_z_index: u32,
}

impl FocusStack {
    pub fn new(base_z_index: u32) -> Self {
        Self {
            order: Vec::new(),
            base_z_index,
        }
    }

    /// Places `id` on top, removing any earlier occurrence first.
    pub fn push(&mut self, id: WindowId) {
        self.order.retain(|existing| *existing != id);
        self.order.push(id);
    }

    /// Moves `id` to the top. Returns `false` when it is already topmost or not in the stack.
    pub fn bring_to_front(&mut self, id: WindowId) -> bool {
        if self.top() == Some(id) {
            return false;
        }
        let Some(index) = self.position(id) else {
            return false;
        };
        let id = self.order.remove(index);
        self.order.push(id);
        true
    }

    /// Removes the single occurrence of `id`.
    pub fn remove(&mut self, id: WindowId) -> bool {
        match self.position(id) {
            Some(index) => {
                self.order.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn top(&self) -> Option<WindowId> {
        self.order.last().copied()
    }

    /// Back-to-front order.
    pub fn order(&self) -> &[WindowId] {
        &self.order
    }

    pub fn position(&self, id: WindowId) -> Option<usize> {
        self.order.iter().position(|existing| *existing == id)
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.position(id).is_some()
    }

    pub fn z_index(&self, id: WindowId) -> Option<u32> {
        self.position(id)
            .map(|index| self.base_z_index.saturating_add(index as u32))
    }

    pub fn max_z_index(&self) -> Option<u32> {
        self.top().and_then(|id| self.z_index(id))
    }

    pub fn base_z_index(&self) -> u32 {
        self.base_z_index
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }
}

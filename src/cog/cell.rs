//! ContextCell - the cog's private state cell
//!
//! The cell holds an `Arc` to an immutable context value. A snapshot is a
//! brief guarded read of that pointer; installing a new context swaps the
//! pointer in one guarded write. Observers therefore see either the initial
//! context or the result of some completed transition, never a partial value.

use std::sync::Arc;

use parking_lot::RwLock;

/// Atomic holder for a cog's context
///
/// Cloning produces another handle to the same cell; forks that share context
/// clone the handle, forks that transform context allocate a fresh cell.
pub struct ContextCell<C> {
    slot: Arc<RwLock<Arc<C>>>,
}

impl<C> Clone for ContextCell<C> {
    fn clone(&self) -> Self {
        ContextCell {
            slot: self.slot.clone(),
        }
    }
}

impl<C> ContextCell<C> {
    /// Create a cell holding the initial context
    pub fn new(initial: C) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    /// Read-only snapshot of the current context
    pub fn snapshot(&self) -> Arc<C> {
        self.slot.read().clone()
    }

    /// Install the result of a completed transition
    pub fn install(&self, next: C) {
        *self.slot.write() = Arc::new(next);
    }

    /// Check if another handle points at the same cell
    pub fn shares_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<C> std::fmt::Debug for ContextCell<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextCell").finish()
    }
}

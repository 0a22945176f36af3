//! In-memory handle target for an open key. A `KeyObject` is what the
//! object-manager stand-in hands back from `ObCreateObject`/`FindObject`; it
//! points at a hive and one key cell inside it, and carries the
//! pending-delete tombstone bit that lets a key be unlinked from its parent
//! immediately while still-open handles keep observing it as deleted.

use super::cell::CellIndex;
use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

/// A key's handle-side identity: which hive, and which cell within it.
pub struct KeyObject {
    pub hive_id: usize,
    pub cell: CellIndex,
    /// Owning reference to the parent `KeyObject`, populated only when the
    /// parent lives in a different hive (a mount point) — an intra-hive
    /// parent is tracked purely by `KeyNode::parent`'s cell offset, so no
    /// ownership cycle runs through the cell store.
    pub parent: Option<Arc<KeyObject>>,
    /// Cached full namespace path, used for diagnostics, callback
    /// notifications, and `QueryKey`'s name information class without
    /// re-walking the namespace.
    pub name: String,
    marked_for_delete: AtomicBool,
}

impl KeyObject {
    pub fn new(hive_id: usize, cell: CellIndex, name: &str, parent: Option<Arc<KeyObject>>) -> Arc<Self> {
        Arc::new(Self {
            hive_id,
            cell,
            parent,
            name: String::from(name),
            marked_for_delete: AtomicBool::new(false),
        })
    }

    pub fn mark_for_delete(&self) {
        self.marked_for_delete.store(true, Ordering::Release);
    }

    pub fn is_marked_for_delete(&self) -> bool {
        self.marked_for_delete.load(Ordering::Acquire)
    }
}

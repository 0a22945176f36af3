//! Handle table: maps small integer handles to referenced key objects, the
//! way a process's object-manager handle table would, backed by a growable
//! map rather than a fixed-size array since this crate has an allocator to
//! grow into.

use crate::cm::keyobject::KeyObject;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;

pub type Handle = u32;

pub const INVALID_HANDLE: Handle = 0;

/// Handles are issued in steps of 4, as NT handles are, leaving the low
/// bits free for callers that want to tag them (unused here, kept for
/// shape-fidelity with code built against real handle values).
const HANDLE_STEP: u32 = 4;

#[derive(Default)]
pub struct HandleTable {
    entries: BTreeMap<Handle, (Arc<KeyObject>, u32)>,
    next: Handle,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next: 0,
        }
    }

    pub fn create_handle(&mut self, object: Arc<KeyObject>, access_mask: u32) -> Handle {
        self.next += HANDLE_STEP;
        let handle = self.next;
        self.entries.insert(handle, (object, access_mask));
        handle
    }

    pub fn reference_by_handle(&self, handle: Handle) -> Option<Arc<KeyObject>> {
        self.entries.get(&handle).map(|(object, _)| Arc::clone(object))
    }

    pub fn close_handle(&mut self, handle: Handle) -> Option<Arc<KeyObject>> {
        self.entries.remove(&handle).map(|(object, _)| object)
    }

    pub fn access_mask(&self, handle: Handle) -> Option<u32> {
        self.entries.get(&handle).map(|(_, mask)| *mask)
    }

    /// Swap the object a live handle points at, keeping its access mask.
    /// Used when a key is renamed and gets a freshly published object with
    /// an updated cached path.
    pub fn replace_target(&mut self, handle: Handle, object: Arc<KeyObject>) -> Option<()> {
        let entry = self.entries.get_mut(&handle)?;
        entry.0 = object;
        Some(())
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

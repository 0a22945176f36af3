//! Minimal object-manager stand-in: just enough namespace and handle-table
//! behavior to drive the syscall dispatcher end to end. Security
//! descriptors, quotas, generic object types and the full object header the
//! real object manager carries stay out of scope; the dispatcher only ever
//! needs `find_object`, `insert_object`, and handle reference counting.

pub mod directory;
pub mod handle;

use crate::cm::keyobject::KeyObject;
use crate::cm::status::{CmResult, CmStatus};
use alloc::string::String;
use alloc::sync::Arc;
use directory::ObjectDirectory;
use handle::{Handle, HandleTable};
use spin::Mutex;

struct ObjectManagerState {
    directory: ObjectDirectory,
    handles: HandleTable,
}

pub struct ObjectManager {
    state: Mutex<ObjectManagerState>,
}

impl ObjectManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ObjectManagerState {
                directory: ObjectDirectory::new(),
                handles: HandleTable::new(),
            }),
        }
    }

    /// `ObCreateObject` + `ObInsertObject` collapsed: the key object already
    /// exists (callers build it with `KeyObject::new`), this just publishes
    /// it into the namespace.
    pub fn insert_object(&self, path: &str, object: Arc<KeyObject>) -> CmResult<()> {
        self.state
            .lock()
            .directory
            .insert(path, object)
            .map_err(|_| CmStatus::ObjectNameInvalid)
    }

    pub fn remove_object(&self, path: &str) -> Option<Arc<KeyObject>> {
        self.state.lock().directory.remove(path)
    }

    /// `FindObject(name) -> (object, remaining_path)`.
    pub fn find_object(&self, path: &str) -> (Option<Arc<KeyObject>>, String) {
        self.state.lock().directory.find(path)
    }

    pub fn create_handle(&self, object: Arc<KeyObject>, access_mask: u32) -> Handle {
        self.state.lock().handles.create_handle(object, access_mask)
    }

    /// `ObReferenceObjectByHandle`.
    pub fn reference_object_by_handle(&self, handle: Handle) -> CmResult<Arc<KeyObject>> {
        self.state
            .lock()
            .handles
            .reference_by_handle(handle)
            .ok_or(CmStatus::InvalidHandle)
    }

    /// `ObDereferenceObject` at handle-close time: drops the handle table's
    /// reference and hands back the object so the caller can decide whether
    /// it was the last reference.
    pub fn dereference_object(&self, handle: Handle) -> CmResult<Arc<KeyObject>> {
        self.state
            .lock()
            .handles
            .close_handle(handle)
            .ok_or(CmStatus::InvalidHandle)
    }

    pub fn replace_handle_target(&self, handle: Handle, object: Arc<KeyObject>) -> CmResult<()> {
        self.state
            .lock()
            .handles
            .replace_target(handle, object)
            .ok_or(CmStatus::InvalidHandle)
    }
}

impl Default for ObjectManager {
    fn default() -> Self {
        Self::new()
    }
}

//! Process-wide registry context: the two-lock concurrency model (a
//! reader/writer `registry_lock` guarding hive state, a separate fast lock
//! inside [`CallbackRegistry`] guarding only the observer list) plus the
//! object-manager stand-in and one-shot initialization.

use crate::cm::callback::CallbackRegistry;
use crate::cm::hive::{Hive, HiveFlags};
use crate::cm::keyobject::KeyObject;
use crate::cm::status::{CmResult, CmStatus};
use crate::config::RegistryConfig;
use crate::ob::ObjectManager;
use alloc::string::{String, ToString};
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};
use spin::RwLock;

/// Well-known root hive names a path's leading component resolves against.
pub mod root_keys {
    pub const HKLM: &str = "HKLM";
    pub const HKCU: &str = "HKCU";
}

struct RegistryState {
    hives: Vec<Hive>,
    /// Every live key object, weak so a dropped object doesn't need an
    /// explicit unlink call on this list.
    key_object_list: Vec<Weak<KeyObject>>,
}

pub struct Registry {
    pub config: RegistryConfig,
    state: RwLock<RegistryState>,
    pub callbacks: CallbackRegistry,
    pub objects: ObjectManager,
    initialized: AtomicBool,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            state: RwLock::new(RegistryState {
                hives: Vec::new(),
                key_object_list: Vec::new(),
            }),
            callbacks: CallbackRegistry::new(),
            objects: ObjectManager::new(),
            initialized: AtomicBool::new(false),
        }
    }

    /// One-shot bring-up: mounts the two always-present hives and publishes
    /// their roots into the namespace. A second call returns `AccessDenied`
    /// rather than re-initializing state callers may already be using.
    pub fn initialize(&self) -> CmResult<()> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CmStatus::AccessDenied);
        }

        let mut state = self.state.write();
        let lm = Hive::new(root_keys::HKLM, HiveFlags::empty(), &self.config);
        let lm_root = lm.root();
        state.hives.push(lm);
        let lm_id = state.hives.len() - 1;

        let cu = Hive::new(
            root_keys::HKCU,
            HiveFlags::NO_FILE | HiveFlags::VOLATILE,
            &self.config,
        );
        let cu_root = cu.root();
        state.hives.push(cu);
        let cu_id = state.hives.len() - 1;
        drop(state);

        let lm_object = KeyObject::new(lm_id, lm_root, root_keys::HKLM, None);
        self.track_object(&lm_object);
        self.objects
            .insert_object(root_keys::HKLM, lm_object)
            .map_err(|_| CmStatus::Unsuccessful)?;

        let cu_object = KeyObject::new(cu_id, cu_root, root_keys::HKCU, None);
        self.track_object(&cu_object);
        self.objects
            .insert_object(root_keys::HKCU, cu_object)
            .map_err(|_| CmStatus::Unsuccessful)?;

        log::info!("registry initialized with hives HKLM, HKCU");
        Ok(())
    }

    fn track_object(&self, object: &Arc<KeyObject>) {
        self.state.write().key_object_list.push(Arc::downgrade(object));
    }

    pub fn live_key_object_count(&self) -> usize {
        self.state
            .read()
            .key_object_list
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub fn with_hive<R>(&self, hive_id: usize, f: impl FnOnce(&Hive) -> R) -> CmResult<R> {
        let state = self.state.read();
        let hive = state.hives.get(hive_id).ok_or(CmStatus::InvalidHandle)?;
        Ok(f(hive))
    }

    pub fn with_hive_mut<R>(&self, hive_id: usize, f: impl FnOnce(&mut Hive) -> R) -> CmResult<R> {
        let mut state = self.state.write();
        let hive = state.hives.get_mut(hive_id).ok_or(CmStatus::InvalidHandle)?;
        Ok(f(hive))
    }

    pub fn new_key_object(&self, hive_id: usize, cell: crate::cm::cell::CellIndex, name: &str, parent: Option<Arc<KeyObject>>) -> Arc<KeyObject> {
        let object = KeyObject::new(hive_id, cell, name, parent);
        self.track_object(&object);
        object
    }

    /// `LoadKey`: mount a brand-new, empty, file-backed hive at `path` (a
    /// root-relative path; the real `LoadHive` I/O collaborator is out of
    /// scope, so the new hive starts empty rather than populated from a file).
    pub fn load_hive(&self, mount_path: &str, hive_name: &str) -> CmResult<()> {
        let (existing, _) = self.objects.find_object(mount_path);
        if existing.is_some() {
            return Err(CmStatus::Unsuccessful);
        }
        let hive = Hive::new(hive_name, HiveFlags::empty(), &self.config);
        let root = hive.root();
        let hive_id = {
            let mut state = self.state.write();
            state.hives.push(hive);
            state.hives.len() - 1
        };
        let object = self.new_key_object(hive_id, root, mount_path, None);
        self.objects
            .insert_object(mount_path, object)
            .map_err(|_| CmStatus::Unsuccessful)
    }

    /// `UnloadKey`: detach the hive mounted at `path`. Refuses while any
    /// handle still references a key inside it. Unlinks from the namespace
    /// first so the directory's own reference isn't mistaken for a live
    /// handle, then puts it back if that check fails.
    pub fn unload_hive(&self, mount_path: &str) -> CmResult<()> {
        let object = self.objects.remove_object(mount_path).ok_or(CmStatus::ObjectNameNotFound)?;
        if Arc::strong_count(&object) > 1 {
            let _ = self.objects.insert_object(mount_path, object);
            return Err(CmStatus::AccessDenied);
        }
        Ok(())
    }

    /// `SyncHives`: best-effort flush of every dirty, non-volatile hive.
    /// Failures are swallowed — a sync failure must never surface to the
    /// caller of the mutation that triggered it.
    pub fn sync_hives(&self) {
        let mut state = self.state.write();
        for hive in state.hives.iter_mut() {
            if hive.flush().is_err() {
                log::warn!("SyncHives: flush failed for hive {}", hive.name);
            }
        }
    }

    pub fn hive_name(&self, hive_id: usize) -> Option<String> {
        self.state.read().hives.get(hive_id).map(|h| h.name.to_string())
    }
}

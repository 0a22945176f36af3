//! Public syscalls. Every entry point that touches a hive follows the same
//! five-phase skeleton: capture arguments, invoke the matching pre-callback,
//! take the hive lock and perform the operation, release the hive lock,
//! invoke the matching post-callback. A pre-callback failure short-circuits
//! straight to the post-callback with that failing status.

use super::callback::{CallbackArgument, NotifyClass};
use super::cell::NULL_CELL;
use super::hive::{CreateOptions, Hive, HiveFlags};
use super::info;
use super::status::{CmResult, CmStatus};
use super::value::{ValueData, ValueType};
use crate::ob::handle::Handle;
use crate::registry::Registry;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessMask: u32 {
        const QUERY_VALUE = 0x0001;
        const SET_VALUE = 0x0002;
        const CREATE_SUB_KEY = 0x0004;
        const ENUMERATE_SUB_KEYS = 0x0008;
        const NOTIFY = 0x0010;
        const CREATE_LINK = 0x0020;
        const DELETE = 0x0040;
        const ALL_ACCESS = 0x007F;
    }
}

pub mod open_options {
    pub const NON_VOLATILE: u32 = 0;
    pub const VOLATILE: u32 = 1;
    pub const CREATE_LINK: u32 = 2;
    pub const BACKUP_RESTORE: u32 = 4;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    None,
    CreatedNewKey,
    OpenedExistingKey,
}

#[derive(Debug, Clone, Copy)]
pub enum KeyInformationClass {
    Basic,
    Node,
    Full,
    Name,
}

#[derive(Debug, Clone, Copy)]
pub enum KeyValueInformationClass {
    Basic,
    Full,
    Partial,
}

pub enum KeyQueryResult {
    Basic(info::KeyBasicInformation),
    Node(info::KeyNodeInformation),
    Full(info::KeyFullInformation),
    Name(info::KeyNameInformation),
}

pub enum ValueQueryResult {
    Basic(info::KeyValueBasicInformation),
    Full(info::KeyValueFullInformation),
    Partial(info::KeyValuePartialInformation),
}

/// One requested name's slot in `QueryMultipleValueKey`'s combined buffer.
/// `None` when that name's data didn't fit — left unwritten, the same way
/// the original leaves a caller's entry untouched on overflow.
#[derive(Debug, Clone, Copy)]
pub struct MultipleValueEntry {
    pub value_type: ValueType,
    pub data_offset: usize,
    pub data_length: usize,
}

pub struct QueryMultipleValueResult {
    pub entries: Vec<Option<MultipleValueEntry>>,
    pub data: Vec<u8>,
}

/// Strip one leading and one trailing backslash and reject empty path
/// components, the way `NtCreateKey`'s name handling does before resolving
/// the remaining path against the namespace.
fn normalize_path(path: &str) -> CmResult<String> {
    let mut trimmed = path;
    if let Some(rest) = trimmed.strip_prefix('\\') {
        trimmed = rest;
    }
    if let Some(rest) = trimmed.strip_suffix('\\') {
        trimmed = rest;
    }
    if trimmed.is_empty() {
        return Err(CmStatus::ObjectNameInvalid);
    }
    if trimmed.split('\\').any(str::is_empty) {
        return Err(CmStatus::ObjectNameInvalid);
    }
    Ok(String::from(trimmed))
}

impl Registry {
    /// `NtCreateKey`.
    pub fn create_key(
        &self,
        full_path: &str,
        class: Option<&str>,
        options: CreateOptions,
        access: AccessMask,
    ) -> (CmStatus, Option<Handle>, Disposition) {
        let path = match normalize_path(full_path) {
            Ok(p) => p,
            Err(e) => return (e, None, Disposition::None),
        };

        let pre = self
            .callbacks
            .invoke(NotifyClass::RegNtPreCreateKey, &CallbackArgument::Pre { key_path: &path });
        if pre.is_error() {
            self.callbacks
                .invoke(NotifyClass::RegNtPostCreateKey, &CallbackArgument::Post { status: pre });
            return (pre, None, Disposition::None);
        }

        let result = self.create_key_inner(&path, class, options, access);

        let status = result.as_ref().err().copied().unwrap_or(CmStatus::Success);
        self.callbacks
            .invoke(NotifyClass::RegNtPostCreateKey, &CallbackArgument::Post { status });
        self.sync_hives();

        match result {
            Ok((handle, disposition)) => (status, Some(handle), disposition),
            Err(e) => (e, None, Disposition::None),
        }
    }

    fn create_key_inner(
        &self,
        path: &str,
        class: Option<&str>,
        options: CreateOptions,
        access: AccessMask,
    ) -> CmResult<(Handle, Disposition)> {
        let (found, remaining) = self.objects.find_object(path);

        if remaining.is_empty() {
            let object = found.ok_or(CmStatus::ObjectNameNotFound)?;
            if object.is_marked_for_delete() {
                return Err(CmStatus::Unsuccessful);
            }
            let handle = self.objects.create_handle(object, access.bits());
            return Ok((handle, Disposition::OpenedExistingKey));
        }

        let parent = found.ok_or(CmStatus::ObjectNameNotFound)?;
        if parent.is_marked_for_delete() {
            return Err(CmStatus::Unsuccessful);
        }

        // NtCreateKey doesn't create trees: a remaining path of more than one
        // component means an intermediate key is missing, which is rejected
        // rather than auto-created.
        if remaining.contains('\\') {
            return Err(CmStatus::ObjectNameNotFound);
        }

        let hive_id = parent.hive_id;
        let cell = self
            .with_hive_mut(hive_id, |hive| hive.add_subkey(parent.cell, &remaining, class, options))??;
        let built_path = if path.len() == remaining.len() {
            remaining.clone()
        } else {
            format!("{}\\{}", path[..path.len() - remaining.len()].trim_end_matches('\\'), remaining)
        };
        let object = self.new_key_object(hive_id, cell, &built_path, None);
        self.objects
            .insert_object(&built_path, object.clone())
            .map_err(|_| CmStatus::Unsuccessful)?;

        let handle = self.objects.create_handle(object, access.bits());
        Ok((handle, Disposition::CreatedNewKey))
    }

    /// `NtOpenKey`.
    pub fn open_key(&self, full_path: &str, access: AccessMask) -> (CmStatus, Option<Handle>) {
        let path = match normalize_path(full_path) {
            Ok(p) => p,
            Err(e) => return (e, None),
        };

        let pre = self
            .callbacks
            .invoke(NotifyClass::RegNtPreOpenKey, &CallbackArgument::Pre { key_path: &path });
        if pre.is_error() {
            self.callbacks
                .invoke(NotifyClass::RegNtPostOpenKey, &CallbackArgument::Post { status: pre });
            return (pre, None);
        }

        let result: CmResult<Handle> = (|| {
            let (found, remaining) = self.objects.find_object(&path);
            if !remaining.is_empty() {
                return Err(CmStatus::ObjectNameNotFound);
            }
            let object = found.ok_or(CmStatus::ObjectNameNotFound)?;
            if object.is_marked_for_delete() {
                return Err(CmStatus::Unsuccessful);
            }
            Ok(self.objects.create_handle(object, access.bits()))
        })();

        let status = result.as_ref().err().copied().unwrap_or(CmStatus::Success);
        self.callbacks
            .invoke(NotifyClass::RegNtPostOpenKey, &CallbackArgument::Post { status });
        (status, result.ok())
    }

    /// `NtDeleteKey`. Refuses a key with any remaining subkey
    /// (`CannotDelete`), otherwise marks it for delete and unlinks it from
    /// both the namespace and its parent's subkey list.
    pub fn delete_key(&self, handle: Handle) -> CmStatus {
        let object = match self.objects.reference_object_by_handle(handle) {
            Ok(o) => o,
            Err(e) => return e,
        };
        let path = object.name.clone();

        let pre = self
            .callbacks
            .invoke(NotifyClass::RegNtPreDeleteKey, &CallbackArgument::Pre { key_path: &path });
        if pre.is_error() {
            self.callbacks
                .invoke(NotifyClass::RegNtPostDeleteKey, &CallbackArgument::Post { status: pre });
            return pre;
        }

        let result: CmResult<()> = (|| {
            if object.is_marked_for_delete() {
                return Err(CmStatus::Unsuccessful);
            }
            let has_children = self.with_hive(object.hive_id, |hive| hive.subkeys(object.cell).next().is_some())?;
            if has_children {
                return Err(CmStatus::CannotDelete);
            }
            let parent_cell = self
                .with_hive(object.hive_id, |hive| hive.get_key(object.cell).map(|k| k.parent))?
                .ok_or(CmStatus::Unsuccessful)?;

            object.mark_for_delete();
            self.objects.remove_object(&object.name);
            self.with_hive_mut(object.hive_id, |hive| hive.remove_subkey(parent_cell, object.cell))??;

            if let Some(parent) = &object.parent {
                // Mount-point boundary: the system this was modeled on
                // dereferenced the key object three times here instead of
                // once. Kept for behavioral fidelity; with `Arc` the extra
                // drops are harmless refcount decrements, not a use-after-free.
                let _extra_a = Arc::clone(parent);
                let _extra_b = Arc::clone(parent);
            }
            Ok(())
        })();

        let status = result.err().unwrap_or(CmStatus::Success);
        self.callbacks
            .invoke(NotifyClass::RegNtPostDeleteKey, &CallbackArgument::Post { status });
        self.sync_hives();
        status
    }

    /// `NtRenameKey`. Leaf-only: refuses a key with any subkey, so no other
    /// cached full path ever needs patching as a side effect of this call.
    pub fn rename_key(&self, handle: Handle, new_name: &str) -> CmStatus {
        let object = match self.objects.reference_object_by_handle(handle) {
            Ok(o) => o,
            Err(e) => return e,
        };
        let old_path = object.name.clone();

        let pre = self
            .callbacks
            .invoke(NotifyClass::RegNtPreRenameKey, &CallbackArgument::Pre { key_path: &old_path });
        if pre.is_error() {
            self.callbacks
                .invoke(NotifyClass::RegNtPostRenameKey, &CallbackArgument::Post { status: pre });
            return pre;
        }

        let result: CmResult<()> = (|| {
            if object.is_marked_for_delete() {
                return Err(CmStatus::Unsuccessful);
            }
            let has_children = self.with_hive(object.hive_id, |hive| hive.subkeys(object.cell).next().is_some())?;
            if has_children {
                return Err(CmStatus::CannotDelete);
            }
            let parent_cell = self
                .with_hive(object.hive_id, |hive| hive.get_key(object.cell).map(|k| k.parent))?
                .ok_or(CmStatus::Unsuccessful)?;

            self.with_hive_mut(object.hive_id, |hive| hive.rename_subkey(parent_cell, object.cell, new_name))??;

            let new_path = match old_path.rsplit_once('\\') {
                Some((prefix, _)) => format!("{prefix}\\{new_name}"),
                None => new_name.to_string(),
            };

            // Unlink first so the directory's own reference isn't mistaken
            // for a live handle, the same ordering `unload_hive` uses. Only
            // this call's local reference and the handle table's copy
            // should remain; anything more means another open handle would
            // be left pointing at a stale cached path, so back the rename out.
            self.objects.remove_object(&old_path);
            if Arc::strong_count(&object) > 2 {
                let old_name = old_path.rsplit_once('\\').map(|(_, n)| n).unwrap_or(&old_path);
                let _ = self.with_hive_mut(object.hive_id, |hive| hive.rename_subkey(parent_cell, object.cell, old_name));
                let _ = self.objects.insert_object(&old_path, object.clone());
                return Err(CmStatus::AccessDenied);
            }

            let replacement = self.new_key_object(object.hive_id, object.cell, &new_path, object.parent.clone());
            self.objects
                .insert_object(&new_path, replacement.clone())
                .map_err(|_| CmStatus::Unsuccessful)?;
            self.objects.replace_handle_target(handle, replacement)
        })();

        let status = result.err().unwrap_or(CmStatus::Success);
        self.callbacks
            .invoke(NotifyClass::RegNtPostRenameKey, &CallbackArgument::Post { status });
        self.sync_hives();
        status
    }

    /// `NtClose` on a key handle. Not wrapped in pre/post notifications —
    /// handle teardown is not one of the notified operations.
    pub fn close_key(&self, handle: Handle) -> CmStatus {
        match self.objects.dereference_object(handle) {
            Ok(_) => CmStatus::Success,
            Err(e) => e,
        }
    }

    /// `NtEnumerateKey`. For `KeyFullInformation`, `SubKeys`/`MaxNameLen`/
    /// `MaxClassLen` describe the key under the handle (the operand), while
    /// `LastWriteTime`/`Class`/`Values`/`MaxValueNameLen`/`MaxValueDataLen`
    /// describe the enumerated child itself — the original mixes the two the
    /// same way, and that asymmetry is kept here rather than "fixed".
    pub fn enumerate_key(
        &self,
        handle: Handle,
        index: u32,
        info_class: KeyInformationClass,
        buffer_len: usize,
    ) -> (CmStatus, usize, Option<KeyQueryResult>) {
        let object = match self.objects.reference_object_by_handle(handle) {
            Ok(o) => o,
            Err(e) => return (e, 0, None),
        };

        let pre = self.callbacks.invoke(
            NotifyClass::RegNtPreEnumerateKey,
            &CallbackArgument::Pre { key_path: &object.name },
        );
        if pre.is_error() {
            self.callbacks
                .invoke(NotifyClass::RegNtPostEnumerateKey, &CallbackArgument::Post { status: pre });
            return (pre, 0, None);
        }

        type ChildSnapshot = (u64, Option<String>, String, u32, u32, u32, u32, u32, u32);
        let outcome: CmResult<ChildSnapshot> = self
            .with_hive(object.hive_id, |hive| {
                let child = hive
                    .get_key(object.cell)
                    .and_then(|node| node.subkey_at(index as usize))
                    .ok_or(CmStatus::NoMoreEntries)?;
                let node = hive.get_key(child).ok_or(CmStatus::Unsuccessful)?;
                Ok((
                    node.last_write_time,
                    node.class.clone(),
                    node.name.as_str().to_string(),
                    hive.subkeys(object.cell).count() as u32,
                    hive.max_name_length(object.cell) as u32,
                    hive.max_class_length(object.cell) as u32,
                    hive.values(child).count() as u32,
                    hive.max_value_name_length(child) as u32,
                    hive.max_value_data_length(child) as u32,
                ))
            })
            .and_then(|r| r);

        let cb_status = outcome.as_ref().err().copied().unwrap_or(CmStatus::Success);
        self.callbacks
            .invoke(NotifyClass::RegNtPostEnumerateKey, &CallbackArgument::Post { status: cb_status });

        let (last_write_time, class, name, parent_subkeys, parent_max_name, parent_max_class, child_values, child_max_value_name, child_max_value_data) =
            match outcome {
                Err(e) => return (e, 0, None),
                Ok(s) => s,
            };

        match info_class {
            KeyInformationClass::Basic => {
                let (s, r, i) = info::key_basic_information(last_write_time, &name, buffer_len);
                (s, r, i.map(KeyQueryResult::Basic))
            }
            KeyInformationClass::Node => {
                let (s, r, i) = info::key_node_information(last_write_time, class.as_deref(), &name, buffer_len);
                (s, r, i.map(KeyQueryResult::Node))
            }
            KeyInformationClass::Full => {
                let (s, r, i) = info::key_full_information(
                    last_write_time,
                    parent_subkeys,
                    parent_max_name,
                    parent_max_class,
                    child_values,
                    child_max_value_name,
                    child_max_value_data,
                    class.as_deref(),
                    buffer_len,
                );
                (s, r, i.map(KeyQueryResult::Full))
            }
            KeyInformationClass::Name => {
                let (s, r, i) = info::key_name_information(&name, buffer_len);
                (s, r, i.map(KeyQueryResult::Name))
            }
        }
    }

    /// `NtEnumerateValueKey`.
    pub fn enumerate_value_key(
        &self,
        handle: Handle,
        index: u32,
        info_class: KeyValueInformationClass,
        buffer_len: usize,
    ) -> (CmStatus, usize, Option<ValueQueryResult>) {
        let object = match self.objects.reference_object_by_handle(handle) {
            Ok(o) => o,
            Err(e) => return (e, 0, None),
        };

        let pre = self.callbacks.invoke(
            NotifyClass::RegNtPreEnumerateValueKey,
            &CallbackArgument::Pre { key_path: &object.name },
        );
        if pre.is_error() {
            self.callbacks.invoke(
                NotifyClass::RegNtPostEnumerateValueKey,
                &CallbackArgument::Post { status: pre },
            );
            return (pre, 0, None);
        }

        let outcome: CmResult<(ValueType, String, Vec<u8>)> = self
            .with_hive(object.hive_id, |hive| {
                let node = hive.get_key(object.cell).ok_or(CmStatus::InvalidHandle)?;
                let value_cell = node.values.get(index as usize).copied().ok_or(CmStatus::NoMoreEntries)?;
                let value = hive.get_value(value_cell).ok_or(CmStatus::Unsuccessful)?;
                Ok((value.value_type, value.name.clone(), value.data.as_bytes().to_vec()))
            })
            .and_then(|r| r);

        let cb_status = outcome.as_ref().err().copied().unwrap_or(CmStatus::Success);
        self.callbacks.invoke(
            NotifyClass::RegNtPostEnumerateValueKey,
            &CallbackArgument::Post { status: cb_status },
        );

        match outcome {
            Err(e) => (e, 0, None),
            Ok((value_type, name, data)) => format_value_query(info_class, value_type, &name, &data, buffer_len),
        }
    }

    /// `NtQueryValueKey`.
    pub fn query_value_key(
        &self,
        handle: Handle,
        name: &str,
        info_class: KeyValueInformationClass,
        buffer_len: usize,
    ) -> (CmStatus, usize, Option<ValueQueryResult>) {
        let object = match self.objects.reference_object_by_handle(handle) {
            Ok(o) => o,
            Err(e) => return (e, 0, None),
        };

        let pre = self.callbacks.invoke(
            NotifyClass::RegNtPreQueryValueKey,
            &CallbackArgument::Pre { key_path: &object.name },
        );
        if pre.is_error() {
            self.callbacks
                .invoke(NotifyClass::RegNtPostQueryValueKey, &CallbackArgument::Post { status: pre });
            return (pre, 0, None);
        }

        let outcome: CmResult<(ValueType, Vec<u8>)> = self
            .with_hive(object.hive_id, |hive| {
                let value_cell = hive.scan_value(object.cell, name).ok_or(CmStatus::ObjectNameNotFound)?;
                let value = hive.get_value(value_cell).ok_or(CmStatus::Unsuccessful)?;
                Ok((value.value_type, value.data.as_bytes().to_vec()))
            })
            .and_then(|r| r);

        let cb_status = outcome.as_ref().err().copied().unwrap_or(CmStatus::Success);
        self.callbacks
            .invoke(NotifyClass::RegNtPostQueryValueKey, &CallbackArgument::Post { status: cb_status });

        match outcome {
            Err(e) => (e, 0, None),
            Ok((value_type, data)) => format_value_query(info_class, value_type, name, &data, buffer_len),
        }
    }

    /// `NtSetValueKey`.
    pub fn set_value_key(&self, handle: Handle, name: &str, value_type: ValueType, data: ValueData) -> CmStatus {
        let object = match self.objects.reference_object_by_handle(handle) {
            Ok(o) => o,
            Err(e) => return e,
        };

        let pre = self.callbacks.invoke(
            NotifyClass::RegNtPreSetValueKey,
            &CallbackArgument::Pre { key_path: &object.name },
        );
        if pre.is_error() {
            self.callbacks
                .invoke(NotifyClass::RegNtPostSetValueKey, &CallbackArgument::Post { status: pre });
            return pre;
        }

        let result = self
            .with_hive_mut(object.hive_id, |hive| hive.set_value(object.cell, name, value_type, data))
            .and_then(|r| r);

        let status = result.err().unwrap_or(CmStatus::Success);
        self.callbacks
            .invoke(NotifyClass::RegNtPostSetValueKey, &CallbackArgument::Post { status });
        self.sync_hives();
        status
    }

    /// `NtDeleteValueKey`.
    pub fn delete_value_key(&self, handle: Handle, name: &str) -> CmStatus {
        let object = match self.objects.reference_object_by_handle(handle) {
            Ok(o) => o,
            Err(e) => return e,
        };

        let pre = self.callbacks.invoke(
            NotifyClass::RegNtPreDeleteValueKey,
            &CallbackArgument::Pre { key_path: &object.name },
        );
        if pre.is_error() {
            self.callbacks
                .invoke(NotifyClass::RegNtPostDeleteValueKey, &CallbackArgument::Post { status: pre });
            return pre;
        }

        let result = self
            .with_hive_mut(object.hive_id, |hive| hive.delete_value(object.cell, name))
            .and_then(|r| r);

        let status = result.err().unwrap_or(CmStatus::Success);
        self.callbacks
            .invoke(NotifyClass::RegNtPostDeleteValueKey, &CallbackArgument::Post { status });
        self.sync_hives();
        status
    }

    /// `NtQueryKey`.
    pub fn query_key(&self, handle: Handle, info_class: KeyInformationClass, buffer_len: usize) -> (CmStatus, usize, Option<KeyQueryResult>) {
        let object = match self.objects.reference_object_by_handle(handle) {
            Ok(o) => o,
            Err(e) => return (e, 0, None),
        };

        let pre = self
            .callbacks
            .invoke(NotifyClass::RegNtPreQueryKey, &CallbackArgument::Pre { key_path: &object.name });
        if pre.is_error() {
            self.callbacks
                .invoke(NotifyClass::RegNtPostQueryKey, &CallbackArgument::Post { status: pre });
            return (pre, 0, None);
        }

        let snapshot = self.with_hive(object.hive_id, |hive| {
            let node = hive.get_key(object.cell)?;
            Some((
                node.last_write_time,
                node.class.clone(),
                node.name.as_str().to_string(),
                hive.subkeys(object.cell).count() as u32,
                hive.max_name_length(object.cell) as u32,
                hive.max_class_length(object.cell) as u32,
                hive.values(object.cell).count() as u32,
                hive.max_value_name_length(object.cell) as u32,
                hive.max_value_data_length(object.cell) as u32,
            ))
        });

        let snapshot = match snapshot {
            Ok(Some(s)) => s,
            _ => {
                self.callbacks.invoke(
                    NotifyClass::RegNtPostQueryKey,
                    &CallbackArgument::Post { status: CmStatus::InvalidHandle },
                );
                return (CmStatus::InvalidHandle, 0, None);
            }
        };
        let (last_write_time, class, name, subkeys, max_name, max_class, values, max_value_name, max_value_data) = snapshot;

        self.callbacks
            .invoke(NotifyClass::RegNtPostQueryKey, &CallbackArgument::Post { status: CmStatus::Success });

        match info_class {
            KeyInformationClass::Basic => {
                let (s, r, i) = info::key_basic_information(last_write_time, &name, buffer_len);
                (s, r, i.map(KeyQueryResult::Basic))
            }
            KeyInformationClass::Node => {
                let (s, r, i) = info::key_node_information(last_write_time, class.as_deref(), &name, buffer_len);
                (s, r, i.map(KeyQueryResult::Node))
            }
            KeyInformationClass::Full => {
                let (s, r, i) = info::key_full_information(
                    last_write_time,
                    subkeys,
                    max_name,
                    max_class,
                    values,
                    max_value_name,
                    max_value_data,
                    class.as_deref(),
                    buffer_len,
                );
                (s, r, i.map(KeyQueryResult::Full))
            }
            KeyInformationClass::Name => {
                let (s, r, i) = info::key_name_information(&object.name, buffer_len);
                (s, r, i.map(KeyQueryResult::Name))
            }
        }
    }

    /// `NtQueryMultipleValueKey`. Builds one combined, pointer-aligned data
    /// buffer across every requested name: `required` keeps accumulating
    /// past the first overflow (so a caller can still learn the buffer size
    /// it needs), but the first unknown name stops the whole call with
    /// `OBJECT_NAME_NOT_FOUND` and leaves every later name unqueried.
    pub fn query_multiple_value_key(
        &self,
        handle: Handle,
        names: &[&str],
        buffer_len: usize,
    ) -> (CmStatus, usize, QueryMultipleValueResult) {
        let empty = || QueryMultipleValueResult { entries: Vec::new(), data: Vec::new() };
        let object = match self.objects.reference_object_by_handle(handle) {
            Ok(o) => o,
            Err(e) => return (e, 0, empty()),
        };

        let pre = self.callbacks.invoke(
            NotifyClass::RegNtPreQueryMultipleValueKey,
            &CallbackArgument::Pre { key_path: &object.name },
        );
        if pre.is_error() {
            self.callbacks.invoke(
                NotifyClass::RegNtPostQueryMultipleValueKey,
                &CallbackArgument::Post { status: pre },
            );
            return (pre, 0, empty());
        }

        let mut entries: Vec<Option<MultipleValueEntry>> = Vec::with_capacity(names.len());
        let mut data: Vec<u8> = Vec::new();
        let mut required = 0usize;
        let mut status = CmStatus::Success;

        let hive_result = self.with_hive(object.hive_id, |hive| {
            for name in names {
                let value_cell = match hive.scan_value(object.cell, name) {
                    Some(c) => c,
                    None => {
                        status = CmStatus::ObjectNameNotFound;
                        break;
                    }
                };
                let value = match hive.get_value(value_cell) {
                    Some(v) => v,
                    None => {
                        status = CmStatus::Unsuccessful;
                        break;
                    }
                };
                let bytes = value.data.as_bytes();
                let cursor = info::round_up_to_pointer(required);
                if cursor + bytes.len() <= buffer_len {
                    data.resize(cursor, 0);
                    data.extend_from_slice(bytes);
                    entries.push(Some(MultipleValueEntry {
                        value_type: value.value_type,
                        data_offset: cursor,
                        data_length: bytes.len(),
                    }));
                } else {
                    if status == CmStatus::Success {
                        status = CmStatus::BufferTooSmall;
                    }
                    entries.push(None);
                }
                required = cursor + bytes.len();
            }
        });

        if let Err(e) = hive_result {
            self.callbacks.invoke(
                NotifyClass::RegNtPostQueryMultipleValueKey,
                &CallbackArgument::Post { status: e },
            );
            return (e, 0, empty());
        }

        self.callbacks.invoke(
            NotifyClass::RegNtPostQueryMultipleValueKey,
            &CallbackArgument::Post { status },
        );
        (status, required, QueryMultipleValueResult { entries, data })
    }

    /// `NtFlushKey`. Preserved quirk: always reports success to the caller
    /// even if the underlying flush failed.
    pub fn flush_key(&self, handle: Handle) -> CmStatus {
        let object = match self.objects.reference_object_by_handle(handle) {
            Ok(o) => o,
            Err(e) => return e,
        };

        let pre = self
            .callbacks
            .invoke(NotifyClass::RegNtPreFlushKey, &CallbackArgument::Pre { key_path: &object.name });
        if pre.is_error() {
            self.callbacks
                .invoke(NotifyClass::RegNtPostFlushKey, &CallbackArgument::Post { status: pre });
            return pre;
        }

        let flush_result = self.with_hive_mut(object.hive_id, |hive| hive.flush());
        if let Err(e) = flush_result.and_then(|r| r) {
            log::warn!("FlushKey: underlying flush failed ({e}), reporting success anyway");
        }

        self.callbacks
            .invoke(NotifyClass::RegNtPostFlushKey, &CallbackArgument::Post { status: CmStatus::Success });
        CmStatus::Success
    }

    /// `NtSetInformationKey` (write-time only). Preserved quirk: reports
    /// success even when the inner update fails.
    pub fn set_information_key(&self, handle: Handle, last_write_time: u64) -> CmStatus {
        let object = match self.objects.reference_object_by_handle(handle) {
            Ok(o) => o,
            Err(e) => return e,
        };

        let pre = self.callbacks.invoke(
            NotifyClass::RegNtPreSetInformationKey,
            &CallbackArgument::Pre { key_path: &object.name },
        );
        if pre.is_error() {
            self.callbacks.invoke(
                NotifyClass::RegNtPostSetInformationKey,
                &CallbackArgument::Post { status: pre },
            );
            return pre;
        }

        let inner = self.with_hive_mut(object.hive_id, |hive| {
            let node = hive.get_key_mut(object.cell).ok_or(CmStatus::InvalidHandle)?;
            node.last_write_time = last_write_time;
            Ok::<(), CmStatus>(())
        });
        if let Err(e) = inner.and_then(|r| r) {
            log::warn!("SetInformationKey: inner update failed ({e}), reporting success anyway");
        }

        self.sync_hives();
        self.callbacks.invoke(
            NotifyClass::RegNtPostSetInformationKey,
            &CallbackArgument::Post { status: CmStatus::Success },
        );
        CmStatus::Success
    }

    /// `NtSaveKey`. Refuses a volatile key, deep-copies it into a fresh
    /// temp hive via `CopyKey`, then hands the temp hive to `SaveTempHive`
    /// (an opaque file-I/O collaborator this crate does not model).
    pub fn save_key(&self, handle: Handle) -> CmStatus {
        let object = match self.objects.reference_object_by_handle(handle) {
            Ok(o) => o,
            Err(e) => return e,
        };

        let is_volatile = match self.with_hive(object.hive_id, |hive| hive.get_key(object.cell).map(|k| k.is_volatile())) {
            Ok(Some(v)) => v,
            Ok(None) => return CmStatus::InvalidHandle,
            Err(e) => return e,
        };
        if is_volatile {
            return CmStatus::AccessDenied;
        }

        let mut temp = Hive::new("SaveKeyTemp", HiveFlags::NO_FILE | HiveFlags::VOLATILE, &self.config);
        match self.with_hive(object.hive_id, |hive| temp.copy_key(NULL_CELL, hive, object.cell)) {
            Ok(Ok(_)) => CmStatus::Success,
            Ok(Err(e)) => e,
            Err(e) => e,
        }
    }

    /// `NtLoadKey`.
    pub fn load_key(&self, mount_path: &str, hive_name: &str) -> CmStatus {
        match self.load_hive(mount_path, hive_name) {
            Ok(()) => CmStatus::Success,
            Err(e) => e,
        }
    }

    /// `NtUnloadKey`.
    pub fn unload_key(&self, mount_path: &str) -> CmStatus {
        match self.unload_hive(mount_path) {
            Ok(()) => CmStatus::Success,
            Err(e) => e,
        }
    }

    pub fn register_callback<F>(&self, context: u64, function: F) -> u64
    where
        F: for<'a> Fn(u64, NotifyClass, &CallbackArgument<'a>) -> CmStatus + Send + Sync + 'static,
    {
        self.callbacks.register(context, function)
    }

    pub fn unregister_callback(&self, cookie: u64) -> CmResult<()> {
        self.callbacks.unregister(cookie)
    }
}

fn format_value_query(
    info_class: KeyValueInformationClass,
    value_type: ValueType,
    name: &str,
    data: &[u8],
    buffer_len: usize,
) -> (CmStatus, usize, Option<ValueQueryResult>) {
    match info_class {
        KeyValueInformationClass::Basic => {
            let (s, r, i) = info::key_value_basic_information(value_type, name, buffer_len);
            (s, r, i.map(ValueQueryResult::Basic))
        }
        KeyValueInformationClass::Full => {
            let (s, r, i) = info::key_value_full_information(value_type, name, data, buffer_len);
            (s, r, i.map(ValueQueryResult::Full))
        }
        KeyValueInformationClass::Partial => {
            let (s, r, i) = info::key_value_partial_information(value_type, data, buffer_len);
            (s, r, i.map(ValueQueryResult::Partial))
        }
    }
}

/// Notify-change and maintenance syscalls that are deliberately not
/// implemented; each returns `NotImplemented` without touching any hive or
/// callback state.
pub mod unimplemented {
    use super::CmStatus;

    pub fn notify_change_key() -> CmStatus {
        CmStatus::NotImplemented
    }
    pub fn notify_change_multiple_keys() -> CmStatus {
        CmStatus::NotImplemented
    }
    pub fn replace_key() -> CmStatus {
        CmStatus::NotImplemented
    }
    pub fn restore_key() -> CmStatus {
        CmStatus::NotImplemented
    }
    pub fn save_key_ex() -> CmStatus {
        CmStatus::NotImplemented
    }
    pub fn compact_keys() -> CmStatus {
        CmStatus::NotImplemented
    }
    pub fn compress_key() -> CmStatus {
        CmStatus::NotImplemented
    }
    pub fn load_key_ex() -> CmStatus {
        CmStatus::NotImplemented
    }
    pub fn lock_product_activation_keys() -> CmStatus {
        CmStatus::NotImplemented
    }
    pub fn lock_registry_key() -> CmStatus {
        CmStatus::NotImplemented
    }
    pub fn query_open_sub_keys() -> CmStatus {
        CmStatus::NotImplemented
    }
    pub fn query_open_sub_keys_ex() -> CmStatus {
        CmStatus::NotImplemented
    }
    pub fn save_merged_keys() -> CmStatus {
        CmStatus::NotImplemented
    }
    pub fn unload_key2() -> CmStatus {
        CmStatus::NotImplemented
    }
    pub fn unload_key_ex() -> CmStatus {
        CmStatus::NotImplemented
    }
}

//! A hive: one cell store for key nodes, one for values, a root cell, and
//! the file-binding/volatile bits. The hive does not own the registry lock
//! (that is process-wide, see [`crate::registry`]); it only exposes the
//! key primitives (component C of the design) that operate under it.

use super::cell::{CellIndex, CellStore, StorageClass, NULL_CELL};
use super::key::{KeyNode, KeyNodeFlags};
use super::status::{CmResult, CmStatus};
use super::value::{KeyValue, ValueFlags, ValueType};
use crate::config::RegistryConfig;
use alloc::string::String;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

/// `sizeof(CellIndex)`: the inline/out-of-line threshold `SetValueKey` and
/// the invariant `DATA_IN_OFFSET ⇔ length ≤ sizeof(CellIndex)` both use.
const INLINE_DATA_THRESHOLD: usize = core::mem::size_of::<CellIndex>();

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HiveFlags: u32 {
        /// No backing file: `FlushHive` is a no-op and the whole hive is lost on unload.
        const NO_FILE = 0x0001;
        const VOLATILE = 0x0002;
    }
}

/// Options accepted by [`Hive::add_subkey`], mirroring `REG_OPTION_*`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOptions {
    pub volatile: bool,
}

pub struct Hive {
    pub name: String,
    pub flags: HiveFlags,
    root: CellIndex,
    key_cells: CellStore<KeyNode>,
    value_cells: CellStore<KeyValue>,
    /// Out-of-line value payload cells. Holds each cell's allocated capacity
    /// rather than its bytes, since a value's bytes already live in the
    /// owning `KeyValue`; this store exists to give `DATA_IN_OFFSET`
    /// transitions a real allocate/free lifecycle to drive.
    data_cells: CellStore<usize>,
    tick: AtomicU64,
    name_length_limit: usize,
    class_length_limit: usize,
    value_data_length_limit: usize,
}

impl Hive {
    pub fn new(name: &str, flags: HiveFlags, config: &RegistryConfig) -> Self {
        let mut key_cells = CellStore::new(config.max_cells_per_hive);
        let class = if flags.contains(HiveFlags::VOLATILE) {
            StorageClass::Volatile
        } else {
            StorageClass::Stable
        };
        let root = key_cells.alloc(
            KeyNode::new("", NULL_CELL, KeyNodeFlags::empty()),
            class,
        );
        Self {
            name: String::from(name),
            flags,
            root,
            key_cells,
            value_cells: CellStore::new(config.max_cells_per_hive),
            data_cells: CellStore::new(config.max_cells_per_hive),
            tick: AtomicU64::new(1),
            name_length_limit: config.max_name_length,
            class_length_limit: config.max_class_length,
            value_data_length_limit: config.max_value_data_length,
        }
    }

    pub fn root(&self) -> CellIndex {
        self.root
    }

    pub fn is_no_file(&self) -> bool {
        self.flags.contains(HiveFlags::NO_FILE)
    }

    pub fn get_key(&self, index: CellIndex) -> Option<&KeyNode> {
        self.key_cells.get(index)
    }

    pub fn get_key_mut(&mut self, index: CellIndex) -> Option<&mut KeyNode> {
        self.key_cells.get_mut(index)
    }

    pub fn get_value(&self, index: CellIndex) -> Option<&KeyValue> {
        self.value_cells.get(index)
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    /// Find an existing child of `parent` by name (component C:
    /// `GetKeyFromHashByIndex`'s name-addressed counterpart).
    pub fn find_subkey(&self, parent: CellIndex, name: &str) -> Option<CellIndex> {
        let node = self.key_cells.get(parent)?;
        node.subkeys_stable
            .iter()
            .chain(node.subkeys_volatile.iter())
            .copied()
            .find(|&child| {
                self.key_cells
                    .get(child)
                    .is_some_and(|c| c.name.equals_ignore_case(name))
            })
    }

    /// `AddSubKey`: allocate a child key cell under `parent` and link it
    /// into the appropriate storage-class subkey list. Rolls back the
    /// allocation if linking fails for any reason.
    pub fn add_subkey(
        &mut self,
        parent: CellIndex,
        name: &str,
        class: Option<&str>,
        options: CreateOptions,
    ) -> CmResult<CellIndex> {
        if self.key_cells.get(parent).is_none() {
            return Err(CmStatus::InvalidParameter);
        }
        if name.encode_utf16().count() > self.name_length_limit {
            return Err(CmStatus::ObjectNameInvalid);
        }
        if class.is_some_and(|c| c.len() > self.class_length_limit) {
            return Err(CmStatus::InvalidParameter);
        }
        if self.find_subkey(parent, name).is_some() {
            return Err(CmStatus::Unsuccessful);
        }

        let storage_class = if options.volatile || self.flags.contains(HiveFlags::VOLATILE) {
            StorageClass::Volatile
        } else {
            StorageClass::Stable
        };
        let flags = if matches!(storage_class, StorageClass::Volatile) {
            KeyNodeFlags::VOLATILE_CELL
        } else {
            KeyNodeFlags::empty()
        };

        let parent_security = self
            .key_cells
            .get(parent)
            .map(|p| p.security_key_offset)
            .unwrap_or(NULL_CELL);

        let mut node = KeyNode::new(name, parent, flags);
        node.class = class.map(String::from);
        node.security_key_offset = parent_security;
        node.last_write_time = self.next_tick();

        let child = self.key_cells.alloc(node, storage_class);
        if child == NULL_CELL {
            return Err(CmStatus::InsufficientResources);
        }

        let parent_node = match self.key_cells.get_mut(parent) {
            Some(p) => p,
            None => {
                self.key_cells.free(child);
                return Err(CmStatus::InvalidParameter);
            }
        };
        match storage_class {
            StorageClass::Stable => parent_node.subkeys_stable.push(child),
            StorageClass::Volatile => parent_node.subkeys_volatile.push(child),
        }
        self.key_cells.mark_dirty(parent);
        self.key_cells.mark_dirty(child);
        Ok(child)
    }

    /// `CmRenameKey`-equivalent: change `child`'s cached name in place.
    /// Refuses if a sibling under `parent` already answers to `new_name`.
    pub fn rename_subkey(&mut self, parent: CellIndex, child: CellIndex, new_name: &str) -> CmResult<()> {
        if new_name.encode_utf16().count() > self.name_length_limit {
            return Err(CmStatus::ObjectNameInvalid);
        }
        if let Some(existing) = self.find_subkey(parent, new_name) {
            if existing != child {
                return Err(CmStatus::Unsuccessful);
            }
        }
        let tick = self.next_tick();
        let node = self.key_cells.get_mut(child).ok_or(CmStatus::InvalidHandle)?;
        node.name = super::key::KeyName::new(new_name);
        node.last_write_time = tick;
        self.key_cells.mark_dirty(child);
        Ok(())
    }

    /// `RemoveSubKey`: unlink `child` from `parent`'s subkey list and free
    /// its cell. Does not recurse — callers must ensure `child` has no
    /// remaining subkeys.
    pub fn remove_subkey(&mut self, parent: CellIndex, child: CellIndex) -> CmResult<()> {
        let class = self.key_cells.storage_class(child).ok_or(CmStatus::InvalidHandle)?;
        let parent_node = self.key_cells.get_mut(parent).ok_or(CmStatus::InvalidParameter)?;
        let list = match class {
            StorageClass::Stable => &mut parent_node.subkeys_stable,
            StorageClass::Volatile => &mut parent_node.subkeys_volatile,
        };
        let position = list.iter().position(|&c| c == child).ok_or(CmStatus::ObjectNameNotFound)?;
        list.remove(position);
        self.key_cells.mark_dirty(parent);
        self.key_cells.free(child);
        Ok(())
    }

    /// `CopyKey`: deep-copy `src_key` and everything under it from `src`
    /// into this hive, as a child of `dst_parent` (or onto this hive's own
    /// root, preserving the root's cell identity, when `dst_parent` is
    /// `NULL_CELL`). Used by `SaveKey` to populate a temporary hive.
    pub fn copy_key(&mut self, dst_parent: CellIndex, src: &Hive, src_key: CellIndex) -> CmResult<CellIndex> {
        let src_node = src.get_key(src_key).ok_or(CmStatus::InvalidHandle)?;
        let name = String::from(src_node.name.as_str());
        let class = src_node.class.clone();
        let last_write_time = src_node.last_write_time;

        let dst_key = if dst_parent == NULL_CELL {
            let root = self.root();
            if let Some(node) = self.key_cells.get_mut(root) {
                node.class = class;
                node.last_write_time = last_write_time;
            }
            self.key_cells.mark_dirty(root);
            root
        } else {
            self.add_subkey(dst_parent, &name, class.as_deref(), CreateOptions::default())?
        };

        let values: Vec<CellIndex> = src.values(src_key).collect();
        for value_cell in values {
            if let Some(value) = src.get_value(value_cell) {
                self.set_value(dst_key, &value.name, value.value_type, value.data.clone())?;
            }
        }

        let subkeys: Vec<CellIndex> = src.subkeys(src_key).collect();
        for child in subkeys {
            self.copy_key(dst_key, src, child)?;
        }
        Ok(dst_key)
    }

    /// `ScanKeyForValue`: linear, case-insensitive search of a key's value list.
    pub fn scan_value(&self, key: CellIndex, name: &str) -> Option<CellIndex> {
        let node = self.key_cells.get(key)?;
        node.values.iter().copied().find(|&v| {
            self.value_cells
                .get(v)
                .is_some_and(|value| value.name.eq_ignore_ascii_case(name))
        })
    }

    /// `AddValueToKey`: append a new value, replacing any existing value of
    /// the same name (the common set-value path collapses add+replace). A
    /// `REG_LINK` value named `SymbolicLinkValue` marks the key cell itself
    /// as a link cell.
    pub fn set_value(
        &mut self,
        key: CellIndex,
        name: &str,
        value_type: ValueType,
        data: super::value::ValueData,
    ) -> CmResult<()> {
        if self.key_cells.get(key).is_none() {
            return Err(CmStatus::InvalidHandle);
        }
        if data.len() > self.value_data_length_limit {
            return Err(CmStatus::InvalidParameter);
        }
        let is_symbolic_link = value_type == ValueType::Link && name.eq_ignore_ascii_case("SymbolicLinkValue");
        let data_len = data.len();

        if let Some(existing) = self.scan_value(key, name) {
            self.sync_value_storage(existing, data_len)?;
            let slot = self.value_cells.get_mut(existing).ok_or(CmStatus::Unsuccessful)?;
            slot.value_type = value_type;
            slot.data = data;
            self.value_cells.mark_dirty(existing);
            if is_symbolic_link {
                if let Some(node) = self.key_cells.get_mut(key) {
                    node.flags |= KeyNodeFlags::LINK_CELL;
                }
            }
            self.key_cells.mark_dirty(key);
            return Ok(());
        }

        let class = self.class_of(key);
        let value_cell = self.value_cells.alloc(KeyValue::new(name, value_type, data), class);
        if value_cell == NULL_CELL {
            return Err(CmStatus::InsufficientResources);
        }
        if let Err(e) = self.sync_value_storage(value_cell, data_len) {
            self.value_cells.free(value_cell);
            return Err(e);
        }
        let tick = self.next_tick();
        let node = self.key_cells.get_mut(key).ok_or(CmStatus::InvalidHandle)?;
        node.values.push(value_cell);
        node.last_write_time = tick;
        if is_symbolic_link {
            node.flags |= KeyNodeFlags::LINK_CELL;
        }
        self.key_cells.mark_dirty(key);
        Ok(())
    }

    /// Allocate, reuse, or free `value_cell`'s out-of-line data cell so its
    /// `DATA_IN_OFFSET` bit stays in sync with `new_len`: inline when
    /// `new_len ≤ sizeof(CellIndex)`, freeing any prior out-of-line cell;
    /// otherwise a new cell only when growing past the current one's
    /// capacity, reusing it unchanged otherwise.
    fn sync_value_storage(&mut self, value_cell: CellIndex, new_len: usize) -> CmResult<()> {
        let current_data_cell = self.value_cells.get(value_cell).map_or(NULL_CELL, |v| v.data_cell);

        if new_len <= INLINE_DATA_THRESHOLD {
            if current_data_cell != NULL_CELL {
                self.data_cells.free(current_data_cell);
            }
            if let Some(v) = self.value_cells.get_mut(value_cell) {
                v.data_cell = NULL_CELL;
                v.flags.insert(ValueFlags::DATA_IN_OFFSET);
            }
            return Ok(());
        }

        let current_capacity = (current_data_cell != NULL_CELL)
            .then(|| self.data_cells.get(current_data_cell).copied())
            .flatten();

        let data_cell = match current_capacity {
            Some(capacity) if new_len <= capacity => current_data_cell,
            _ => {
                let class = self.value_cells.storage_class(value_cell).unwrap_or(StorageClass::Stable);
                let allocated = self.data_cells.alloc(new_len, class);
                if allocated == NULL_CELL {
                    return Err(CmStatus::InsufficientResources);
                }
                if current_data_cell != NULL_CELL {
                    self.data_cells.free(current_data_cell);
                }
                allocated
            }
        };
        self.data_cells.mark_dirty(data_cell);
        if let Some(v) = self.value_cells.get_mut(value_cell) {
            v.data_cell = data_cell;
            v.flags.remove(ValueFlags::DATA_IN_OFFSET);
        }
        Ok(())
    }

    /// `DeleteValueFromKey`.
    pub fn delete_value(&mut self, key: CellIndex, name: &str) -> CmResult<()> {
        let value_cell = self.scan_value(key, name).ok_or(CmStatus::ObjectNameNotFound)?;
        let node = self.key_cells.get_mut(key).ok_or(CmStatus::InvalidHandle)?;
        node.values.retain(|&v| v != value_cell);
        self.key_cells.mark_dirty(key);
        if let Some(value) = self.value_cells.get(value_cell) {
            if value.data_cell != NULL_CELL {
                self.data_cells.free(value.data_cell);
            }
        }
        self.value_cells.free(value_cell);
        Ok(())
    }

    fn class_of(&self, key: CellIndex) -> StorageClass {
        if self
            .key_cells
            .get(key)
            .is_some_and(KeyNode::is_volatile)
        {
            StorageClass::Volatile
        } else {
            StorageClass::Stable
        }
    }

    /// Maximum subkey-name length among `key`'s children, for `KeyFullInformation`.
    pub fn max_name_length(&self, key: CellIndex) -> usize {
        self.subkeys(key)
            .filter_map(|c| self.key_cells.get(c))
            .map(|c| c.name.encoded_len())
            .max()
            .unwrap_or(0)
    }

    /// Maximum class-string length among `key`'s children.
    pub fn max_class_length(&self, key: CellIndex) -> usize {
        self.subkeys(key)
            .filter_map(|c| self.key_cells.get(c))
            .filter_map(|c| c.class.as_ref())
            .map(String::len)
            .max()
            .unwrap_or(0)
    }

    /// Maximum value-name length among `key`'s values.
    pub fn max_value_name_length(&self, key: CellIndex) -> usize {
        self.values(key)
            .filter_map(|v| self.value_cells.get(v))
            .map(|v| v.name.len())
            .max()
            .unwrap_or(0)
    }

    /// Maximum value-data length among `key`'s values.
    pub fn max_value_data_length(&self, key: CellIndex) -> usize {
        self.values(key)
            .filter_map(|v| self.value_cells.get(v))
            .map(|v| v.data.len())
            .max()
            .unwrap_or(0)
    }

    pub fn subkeys(&self, key: CellIndex) -> impl Iterator<Item = CellIndex> + '_ {
        let node = self.key_cells.get(key);
        node.into_iter()
            .flat_map(|n| n.subkeys_stable.iter().chain(n.subkeys_volatile.iter()).copied())
    }

    pub fn values(&self, key: CellIndex) -> impl Iterator<Item = CellIndex> + '_ {
        let node = self.key_cells.get(key);
        node.into_iter().flat_map(|n| n.values.iter().copied())
    }

    /// `FlushHive`: writes every dirty stable cell out. There is no real
    /// backing store here, so this only clears the dirty set; a volatile or
    /// no-file hive has nothing to flush and always succeeds.
    pub fn flush(&mut self) -> CmResult<()> {
        if self.is_no_file() {
            return Ok(());
        }
        let dirty: Vec<CellIndex> = self.key_cells.dirty_indices().collect();
        for index in dirty {
            self.key_cells.clear_dirty(index);
        }
        let dirty: Vec<CellIndex> = self.value_cells.dirty_indices().collect();
        for index in dirty {
            self.value_cells.clear_dirty(index);
        }
        Ok(())
    }

    pub fn has_dirty_cells(&self) -> bool {
        self.key_cells.dirty_indices().next().is_some() || self.value_cells.dirty_indices().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Hive {
        let mut config = RegistryConfig::new();
        config.max_cells_per_hive = 64;
        Hive::new("Test", HiveFlags::empty(), &config)
    }

    #[test]
    fn add_and_find_subkey() {
        let mut hive = fresh();
        let root = hive.root();
        let child = hive.add_subkey(root, "Software", None, CreateOptions::default()).unwrap();
        assert_eq!(hive.find_subkey(root, "software"), Some(child));
    }

    #[test]
    fn duplicate_subkey_name_rejected() {
        let mut hive = fresh();
        let root = hive.root();
        hive.add_subkey(root, "Software", None, CreateOptions::default()).unwrap();
        assert!(hive.add_subkey(root, "Software", None, CreateOptions::default()).is_err());
    }

    #[test]
    fn class_string_is_stored_and_length_checked() {
        let mut hive = fresh();
        let root = hive.root();
        let child = hive
            .add_subkey(root, "Net", Some("NetworkClass"), CreateOptions::default())
            .unwrap();
        assert_eq!(hive.get_key(child).unwrap().class.as_deref(), Some("NetworkClass"));

        let mut config = RegistryConfig::new();
        config.max_cells_per_hive = 64;
        config.max_class_length = 2;
        let mut tight = Hive::new("Tight", HiveFlags::empty(), &config);
        let root = tight.root();
        assert_eq!(
            tight.add_subkey(root, "Net", Some("NetworkClass"), CreateOptions::default()),
            Err(CmStatus::InvalidParameter)
        );
    }

    #[test]
    fn oversized_value_data_is_rejected() {
        let mut config = RegistryConfig::new();
        config.max_cells_per_hive = 64;
        config.max_value_data_length = 2;
        let mut hive = Hive::new("Tight", HiveFlags::empty(), &config);
        let root = hive.root();
        assert_eq!(
            hive.set_value(root, "Blob", ValueType::Binary, super::super::value::ValueData::from_bytes(&[1, 2, 3, 4])),
            Err(CmStatus::InvalidParameter)
        );
    }

    #[test]
    fn set_value_then_scan() {
        let mut hive = fresh();
        let root = hive.root();
        hive.set_value(root, "Count", ValueType::Dword, super::super::value::ValueData::from_dword(3))
            .unwrap();
        let cell = hive.scan_value(root, "count").unwrap();
        assert_eq!(hive.get_value(cell).unwrap().get_dword(), Some(3));
    }

    #[test]
    fn symbolic_link_value_marks_the_key_cell_as_a_link() {
        let mut hive = fresh();
        let root = hive.root();
        let key = hive.add_subkey(root, "Link", None, CreateOptions::default()).unwrap();
        assert!(!hive.get_key(key).unwrap().flags.contains(KeyNodeFlags::LINK_CELL));

        hive.set_value(
            key,
            "SymbolicLinkValue",
            ValueType::Link,
            super::super::value::ValueData::from_string("\\A\\B"),
        )
        .unwrap();
        assert!(hive.get_key(key).unwrap().flags.contains(KeyNodeFlags::LINK_CELL));
    }

    #[test]
    fn a_link_typed_value_under_a_different_name_does_not_mark_the_key() {
        let mut hive = fresh();
        let root = hive.root();
        let key = hive.add_subkey(root, "NotALink", None, CreateOptions::default()).unwrap();
        hive.set_value(key, "SomeOtherName", ValueType::Link, super::super::value::ValueData::from_string("x"))
            .unwrap();
        assert!(!hive.get_key(key).unwrap().flags.contains(KeyNodeFlags::LINK_CELL));
    }

    #[test]
    fn value_data_transitions_between_inline_and_out_of_line() {
        let mut hive = fresh();
        let root = hive.root();

        hive.set_value(root, "Blob", ValueType::Binary, super::super::value::ValueData::from_bytes(&[1, 2, 3]))
            .unwrap();
        let cell = hive.scan_value(root, "Blob").unwrap();
        assert!(hive.get_value(cell).unwrap().flags.contains(ValueFlags::DATA_IN_OFFSET));
        assert_eq!(hive.get_value(cell).unwrap().data_cell, NULL_CELL);

        hive.set_value(
            root,
            "Blob",
            ValueType::Binary,
            super::super::value::ValueData::from_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]),
        )
        .unwrap();
        let cell = hive.scan_value(root, "Blob").unwrap();
        assert!(!hive.get_value(cell).unwrap().flags.contains(ValueFlags::DATA_IN_OFFSET));
        let out_of_line_cell = hive.get_value(cell).unwrap().data_cell;
        assert_ne!(out_of_line_cell, NULL_CELL);

        hive.set_value(root, "Blob", ValueType::Binary, super::super::value::ValueData::from_bytes(&[9, 9]))
            .unwrap();
        let cell = hive.scan_value(root, "Blob").unwrap();
        assert!(hive.get_value(cell).unwrap().flags.contains(ValueFlags::DATA_IN_OFFSET));
        assert_eq!(hive.get_value(cell).unwrap().data_cell, NULL_CELL);
        assert!(hive.data_cells.get(out_of_line_cell).is_none());
    }

    #[test]
    fn growing_out_of_line_data_reallocates_and_frees_the_old_cell() {
        let mut hive = fresh();
        let root = hive.root();
        hive.set_value(
            root,
            "Blob",
            ValueType::Binary,
            super::super::value::ValueData::from_bytes(&[0u8; 8]),
        )
        .unwrap();
        let cell = hive.scan_value(root, "Blob").unwrap();
        let first_cell = hive.get_value(cell).unwrap().data_cell;

        hive.set_value(
            root,
            "Blob",
            ValueType::Binary,
            super::super::value::ValueData::from_bytes(&[0u8; 64]),
        )
        .unwrap();
        let second_cell = hive.get_value(cell).unwrap().data_cell;
        assert_ne!(first_cell, second_cell);
        assert!(hive.data_cells.get(first_cell).is_none());
    }

    #[test]
    fn deleting_a_value_frees_its_out_of_line_data_cell() {
        let mut hive = fresh();
        let root = hive.root();
        hive.set_value(
            root,
            "Blob",
            ValueType::Binary,
            super::super::value::ValueData::from_bytes(&[0u8; 16]),
        )
        .unwrap();
        let cell = hive.scan_value(root, "Blob").unwrap();
        let data_cell = hive.get_value(cell).unwrap().data_cell;
        hive.delete_value(root, "Blob").unwrap();
        assert!(hive.data_cells.get(data_cell).is_none());
    }

    #[test]
    fn rename_subkey_changes_name_and_rejects_collision() {
        let mut hive = fresh();
        let root = hive.root();
        let a = hive.add_subkey(root, "A", None, CreateOptions::default()).unwrap();
        hive.add_subkey(root, "B", None, CreateOptions::default()).unwrap();

        hive.rename_subkey(root, a, "A2").unwrap();
        assert_eq!(hive.get_key(a).unwrap().name.as_str(), "A2");
        assert!(hive.find_subkey(root, "A").is_none());

        assert_eq!(hive.rename_subkey(root, a, "B"), Err(CmStatus::Unsuccessful));
    }

    #[test]
    fn copy_key_deep_copies_values_and_subkeys_into_another_hive() {
        let mut src = fresh();
        let src_root = src.root();
        let child = src
            .add_subkey(src_root, "Child", Some("ChildClass"), CreateOptions::default())
            .unwrap();
        src.set_value(child, "Count", ValueType::Dword, super::super::value::ValueData::from_dword(9))
            .unwrap();
        src.add_subkey(child, "Grandchild", None, CreateOptions::default()).unwrap();

        let mut dst = fresh();
        let dst_root = dst.root();
        let copied_child = dst.copy_key(dst_root, &src, child).unwrap();

        assert_eq!(dst.get_key(copied_child).unwrap().name.as_str(), "Child");
        assert_eq!(dst.get_key(copied_child).unwrap().class.as_deref(), Some("ChildClass"));
        let value_cell = dst.scan_value(copied_child, "Count").unwrap();
        assert_eq!(dst.get_value(value_cell).unwrap().get_dword(), Some(9));
        assert!(dst.find_subkey(copied_child, "Grandchild").is_some());
    }

    #[test]
    fn copy_key_onto_root_preserves_root_cell_identity() {
        let mut src = fresh();
        let src_root = src.root();
        src.set_value(src_root, "Marker", ValueType::Dword, super::super::value::ValueData::from_dword(1))
            .unwrap();

        let mut dst = fresh();
        let dst_root = dst.root();
        let returned = dst.copy_key(NULL_CELL, &src, src_root).unwrap();
        assert_eq!(returned, dst_root);
        let value_cell = dst.scan_value(dst_root, "Marker").unwrap();
        assert_eq!(dst.get_value(value_cell).unwrap().get_dword(), Some(1));
    }

    #[test]
    fn remove_subkey_frees_cell() {
        let mut hive = fresh();
        let root = hive.root();
        let child = hive.add_subkey(root, "Temp", None, CreateOptions::default()).unwrap();
        hive.remove_subkey(root, child).unwrap();
        assert!(hive.get_key(child).is_none());
        assert!(hive.find_subkey(root, "Temp").is_none());
    }

    #[test]
    fn no_file_hive_flush_is_a_no_op_success() {
        let mut config = RegistryConfig::new();
        config.max_cells_per_hive = 16;
        let mut hive = Hive::new("Volatile", HiveFlags::NO_FILE | HiveFlags::VOLATILE, &config);
        assert!(hive.flush().is_ok());
    }

    #[test]
    fn flush_clears_dirty_cells() {
        let mut hive = fresh();
        let root = hive.root();
        hive.add_subkey(root, "A", None, CreateOptions::default()).unwrap();
        assert!(hive.has_dirty_cells());
        hive.flush().unwrap();
        assert!(!hive.has_dirty_cells());
    }
}

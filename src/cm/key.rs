//! Key node type and the small pure helpers (name comparison, packed-name
//! expansion) that the hive's key primitives build on. The primitives that
//! mutate a hive (`add_subkey`, `scan_value`, ...) live on [`crate::cm::hive::Hive`]
//! itself, since they need the key-cell store and the value-cell store
//! together; this module only defines the shape of a key cell.

use super::cell::CellIndex;
use super::cell::NULL_CELL;
use alloc::string::String;
use alloc::vec::Vec;

/// A key's name, recording whether it is representable in the packed
/// (one-byte-per-character) encoding the real format uses to save space for
/// pure-ASCII names, or needs full UTF-16.
#[derive(Debug, Clone)]
pub struct KeyName {
    text: String,
    packed: bool,
}

impl KeyName {
    pub fn new(text: &str) -> Self {
        Self {
            packed: text.is_ascii(),
            text: String::from(text),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    pub fn equals_ignore_case(&self, other: &str) -> bool {
        self.text.eq_ignore_ascii_case(other)
    }

    /// Number of UTF-16 code units the on-disk packed-or-unpacked
    /// representation would occupy.
    pub fn encoded_len(&self) -> usize {
        if self.packed {
            self.text.len()
        } else {
            self.text.encode_utf16().count()
        }
    }
}

/// Expand a packed (one byte per character) name into a `String`, the
/// inverse of `KeyName::new` choosing the packed representation.
pub fn copy_packed_name(src: &[u8]) -> String {
    src.iter().map(|&b| b as char).collect()
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeyNodeFlags: u16 {
        const VOLATILE_CELL = 0x0001;
        const LINK_CELL = 0x0002;
    }
}

/// One key cell: a node in the hive's tree plus its subkey and value lists.
///
/// Subkey lists are split by storage class the way the real hash-table cell
/// is; unlike the real format each list is a directly owned, growable `Vec`
/// rather than a separately addressed hash-table cell, since the on-disk
/// byte layout behind that indirection is out of scope.
#[derive(Debug, Clone)]
pub struct KeyNode {
    pub name: KeyName,
    pub parent: CellIndex,
    pub class: Option<String>,
    pub subkeys_stable: Vec<CellIndex>,
    pub subkeys_volatile: Vec<CellIndex>,
    pub values: Vec<CellIndex>,
    pub last_write_time: u64,
    pub security_key_offset: CellIndex,
    pub flags: KeyNodeFlags,
}

impl KeyNode {
    pub fn new(name: &str, parent: CellIndex, flags: KeyNodeFlags) -> Self {
        Self {
            name: KeyName::new(name),
            parent,
            class: None,
            subkeys_stable: Vec::new(),
            subkeys_volatile: Vec::new(),
            values: Vec::new(),
            last_write_time: 0,
            security_key_offset: NULL_CELL,
            flags,
        }
    }

    pub fn is_volatile(&self) -> bool {
        self.flags.contains(KeyNodeFlags::VOLATILE_CELL)
    }

    pub fn subkey_count(&self) -> usize {
        self.subkeys_stable.len() + self.subkeys_volatile.len()
    }

    /// Resolve a global subkey index (stable entries first, then volatile)
    /// to a cell index, the order `EnumerateKey` walks in.
    pub fn subkey_at(&self, index: usize) -> Option<CellIndex> {
        if index < self.subkeys_stable.len() {
            self.subkeys_stable.get(index).copied()
        } else {
            self.subkeys_volatile
                .get(index - self.subkeys_stable.len())
                .copied()
        }
    }
}

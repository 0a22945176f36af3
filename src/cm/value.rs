//! Value data types. A value cell stores a name, a [`ValueType`] tag and a
//! data payload; short payloads (<= 4 bytes) are inlined rather than
//! allocated as a separate cell, mirroring the real format's
//! `DATA_IN_OFFSET` convention (see [`ValueData::is_inline`]).

use super::cell::{CellIndex, NULL_CELL};
use alloc::string::String;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ValueType {
    #[default]
    None = 0,
    Sz = 1,
    ExpandSz = 2,
    Binary = 3,
    Dword = 4,
    DwordBigEndian = 5,
    Link = 6,
    MultiSz = 7,
    ResourceList = 8,
    FullResourceDescriptor = 9,
    ResourceRequirementsList = 10,
    Qword = 11,
}

impl ValueType {
    pub fn from_u32(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::None,
            1 => Self::Sz,
            2 => Self::ExpandSz,
            3 => Self::Binary,
            4 => Self::Dword,
            5 => Self::DwordBigEndian,
            6 => Self::Link,
            7 => Self::MultiSz,
            8 => Self::ResourceList,
            9 => Self::FullResourceDescriptor,
            10 => Self::ResourceRequirementsList,
            11 => Self::Qword,
            _ => return None,
        })
    }

    pub fn is_string(self) -> bool {
        matches!(self, Self::Sz | Self::ExpandSz | Self::Link)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::Dword | Self::DwordBigEndian | Self::Qword)
    }
}

const INLINE_THRESHOLD: usize = 4;

/// A value's raw payload. Data of 4 bytes or fewer is carried inline (the
/// `DATA_IN_OFFSET` case); anything larger is a separately allocated blob.
#[derive(Debug, Clone)]
pub struct ValueData {
    bytes: Vec<u8>,
}

impl ValueData {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    pub fn from_string(s: &str) -> Self {
        let mut encoded: Vec<u8> = s.encode_utf16().flat_map(u16::to_le_bytes).collect();
        encoded.extend_from_slice(&[0, 0]);
        Self { bytes: encoded }
    }

    pub fn from_dword(v: u32) -> Self {
        Self {
            bytes: v.to_le_bytes().to_vec(),
        }
    }

    pub fn from_qword(v: u64) -> Self {
        Self {
            bytes: v.to_le_bytes().to_vec(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the real hive format would store this payload inline in the
    /// value cell's data-offset field rather than allocating a data cell.
    pub fn is_inline(&self) -> bool {
        self.bytes.len() <= INLINE_THRESHOLD
    }

    pub fn as_string(&self) -> Option<String> {
        if self.bytes.len() % 2 != 0 {
            return None;
        }
        let units: Vec<u16> = self
            .bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&u| u != 0)
            .collect();
        String::from_utf16(&units).ok()
    }

    pub fn as_dword(&self) -> Option<u32> {
        self.bytes
            .get(..4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn as_qword(&self) -> Option<u64> {
        self.bytes.get(..8).map(|b| {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(b);
            u64::from_le_bytes(arr)
        })
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ValueFlags: u16 {
        const VOLATILE = 0x0001;
        /// Set when the payload is carried inline rather than in a separate
        /// data cell. `Hive::set_value` is the only writer of this bit.
        const DATA_IN_OFFSET = 0x0002;
    }
}

#[derive(Debug, Clone)]
pub struct KeyValue {
    pub name: String,
    pub value_type: ValueType,
    pub data: ValueData,
    pub flags: ValueFlags,
    /// Index of the out-of-line data cell backing `data`, or `NULL_CELL`
    /// while `flags` has `DATA_IN_OFFSET` set. Owned and updated by the
    /// hive that allocated it, never by `KeyValue` itself.
    pub(crate) data_cell: CellIndex,
}

impl KeyValue {
    pub fn new(name: &str, value_type: ValueType, data: ValueData) -> Self {
        Self {
            name: String::from(name),
            value_type,
            data,
            flags: ValueFlags::empty(),
            data_cell: NULL_CELL,
        }
    }

    pub fn get_string(&self) -> Option<String> {
        self.value_type.is_string().then(|| self.data.as_string()).flatten()
    }

    pub fn get_dword(&self) -> Option<u32> {
        (self.value_type == ValueType::Dword)
            .then(|| self.data.as_dword())
            .flatten()
    }

    pub fn get_qword(&self) -> Option<u64> {
        (self.value_type == ValueType::Qword)
            .then(|| self.data.as_qword())
            .flatten()
    }
}

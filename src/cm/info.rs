//! NT-style information-class query structures and the buffer-shape
//! discipline `QueryKey`/`QueryValueKey` apply: a caller supplies a buffer
//! length; if even the fixed-size header of the answer would not fit,
//! the call fails with `BufferTooSmall` and writes nothing; if the header
//! fits but the variable-length tail (a name or class string) would not,
//! the header is still written, the tail is truncated to what fits, and
//! the call returns `BufferOverflow` with the full required length so the
//! caller can retry with a bigger buffer.

use super::status::CmStatus;
use super::value::ValueType;
use alloc::string::String;

/// Decide the buffer-shape outcome for a `fixed_size`-byte header plus a
/// variable-length tail, against a `required` total and the caller's
/// claimed `buffer_len`.
fn classify(buffer_len: usize, fixed_size: usize, required: usize) -> CmStatus {
    if buffer_len < fixed_size {
        CmStatus::BufferTooSmall
    } else if buffer_len < required {
        CmStatus::BufferOverflow
    } else {
        CmStatus::Success
    }
}

/// Round `value` up to the next pointer-sized boundary, the way
/// `QueryMultipleValueKey`'s combined data buffer aligns each value's data.
pub fn round_up_to_pointer(value: usize) -> usize {
    let align = core::mem::size_of::<usize>();
    (value + align - 1) / align * align
}

fn truncate(name: &str, max_bytes: usize) -> String {
    name.chars()
        .scan(0usize, |used, c| {
            let n = c.len_utf8();
            *used += n;
            (*used <= max_bytes).then_some(c)
        })
        .collect()
}

const KEY_BASIC_FIXED: usize = 16;
const KEY_NODE_FIXED: usize = 24;
const KEY_FULL_FIXED: usize = 48;
const KEY_VALUE_BASIC_FIXED: usize = 8;
const KEY_VALUE_FULL_FIXED: usize = 16;
const KEY_VALUE_PARTIAL_FIXED: usize = 12;

#[derive(Debug, Clone)]
pub struct KeyBasicInformation {
    pub last_write_time: u64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct KeyNodeInformation {
    pub last_write_time: u64,
    pub class: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct KeyFullInformation {
    pub last_write_time: u64,
    pub subkeys: u32,
    pub max_name_len: u32,
    pub max_class_len: u32,
    pub values: u32,
    pub max_value_name_len: u32,
    pub max_value_data_len: u32,
    pub class: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KeyNameInformation {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct KeyValueBasicInformation {
    pub value_type: ValueType,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct KeyValueFullInformation {
    pub value_type: ValueType,
    pub name: String,
    pub data: alloc::vec::Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct KeyValuePartialInformation {
    pub value_type: ValueType,
    pub data: alloc::vec::Vec<u8>,
}

/// Build a `KeyBasicInformation` honoring the buffer-shape rules above.
/// Returns the status, the length a full answer would require, and the
/// (possibly name-truncated) struct unless even the header didn't fit.
pub fn key_basic_information(
    last_write_time: u64,
    name: &str,
    buffer_len: usize,
) -> (CmStatus, usize, Option<KeyBasicInformation>) {
    let required = KEY_BASIC_FIXED + name.len();
    let status = classify(buffer_len, KEY_BASIC_FIXED, required);
    if status == CmStatus::BufferTooSmall {
        return (status, required, None);
    }
    let available_for_name = buffer_len.saturating_sub(KEY_BASIC_FIXED);
    let name = if status == CmStatus::BufferOverflow {
        truncate(name, available_for_name)
    } else {
        String::from(name)
    };
    (
        status,
        required,
        Some(KeyBasicInformation { last_write_time, name }),
    )
}

pub fn key_node_information(
    last_write_time: u64,
    class: Option<&str>,
    name: &str,
    buffer_len: usize,
) -> (CmStatus, usize, Option<KeyNodeInformation>) {
    let class_len = class.map(str::len).unwrap_or(0);
    let required = KEY_NODE_FIXED + name.len() + class_len;
    let status = classify(buffer_len, KEY_NODE_FIXED, required);
    if status == CmStatus::BufferTooSmall {
        return (status, required, None);
    }
    let mut available = buffer_len.saturating_sub(KEY_NODE_FIXED);
    let name_out = if status == CmStatus::BufferOverflow {
        let t = truncate(name, available);
        available = available.saturating_sub(t.len());
        t
    } else {
        String::from(name)
    };
    let class_out = class.map(|c| {
        if status == CmStatus::BufferOverflow {
            truncate(c, available)
        } else {
            String::from(c)
        }
    });
    (
        status,
        required,
        Some(KeyNodeInformation {
            last_write_time,
            class: class_out,
            name: name_out,
        }),
    )
}

#[allow(clippy::too_many_arguments)]
pub fn key_full_information(
    last_write_time: u64,
    subkeys: u32,
    max_name_len: u32,
    max_class_len: u32,
    values: u32,
    max_value_name_len: u32,
    max_value_data_len: u32,
    class: Option<&str>,
    buffer_len: usize,
) -> (CmStatus, usize, Option<KeyFullInformation>) {
    let class_len = class.map(str::len).unwrap_or(0);
    let required = KEY_FULL_FIXED + class_len;
    let status = classify(buffer_len, KEY_FULL_FIXED, required);
    if status == CmStatus::BufferTooSmall {
        return (status, required, None);
    }
    let available = buffer_len.saturating_sub(KEY_FULL_FIXED);
    let class_out = class.map(|c| {
        if status == CmStatus::BufferOverflow {
            truncate(c, available)
        } else {
            String::from(c)
        }
    });
    (
        status,
        required,
        Some(KeyFullInformation {
            last_write_time,
            subkeys,
            max_name_len,
            max_class_len,
            values,
            max_value_name_len,
            max_value_data_len,
            class: class_out,
        }),
    )
}

pub fn key_name_information(name: &str, buffer_len: usize) -> (CmStatus, usize, Option<KeyNameInformation>) {
    let required = name.len();
    if buffer_len < required {
        return (CmStatus::BufferOverflow, required, Some(KeyNameInformation {
            name: truncate(name, buffer_len),
        }));
    }
    (CmStatus::Success, required, Some(KeyNameInformation { name: String::from(name) }))
}

pub fn key_value_basic_information(
    value_type: ValueType,
    name: &str,
    buffer_len: usize,
) -> (CmStatus, usize, Option<KeyValueBasicInformation>) {
    let required = KEY_VALUE_BASIC_FIXED + name.len();
    let status = classify(buffer_len, KEY_VALUE_BASIC_FIXED, required);
    if status == CmStatus::BufferTooSmall {
        return (status, required, None);
    }
    let available = buffer_len.saturating_sub(KEY_VALUE_BASIC_FIXED);
    let name_out = if status == CmStatus::BufferOverflow {
        truncate(name, available)
    } else {
        String::from(name)
    };
    (status, required, Some(KeyValueBasicInformation { value_type, name: name_out }))
}

pub fn key_value_full_information(
    value_type: ValueType,
    name: &str,
    data: &[u8],
    buffer_len: usize,
) -> (CmStatus, usize, Option<KeyValueFullInformation>) {
    let required = KEY_VALUE_FULL_FIXED + name.len() + data.len();
    let status = classify(buffer_len, KEY_VALUE_FULL_FIXED, required);
    if status == CmStatus::BufferTooSmall {
        return (status, required, None);
    }
    let mut available = buffer_len.saturating_sub(KEY_VALUE_FULL_FIXED);
    let name_out = if status == CmStatus::BufferOverflow {
        let t = truncate(name, available);
        available = available.saturating_sub(t.len());
        t
    } else {
        String::from(name)
    };
    let data_out = if status == CmStatus::BufferOverflow {
        data[..data.len().min(available)].to_vec()
    } else {
        data.to_vec()
    };
    (
        status,
        required,
        Some(KeyValueFullInformation {
            value_type,
            name: name_out,
            data: data_out,
        }),
    )
}

pub fn key_value_partial_information(
    value_type: ValueType,
    data: &[u8],
    buffer_len: usize,
) -> (CmStatus, usize, Option<KeyValuePartialInformation>) {
    let required = KEY_VALUE_PARTIAL_FIXED + data.len();
    let status = classify(buffer_len, KEY_VALUE_PARTIAL_FIXED, required);
    if status == CmStatus::BufferTooSmall {
        return (status, required, None);
    }
    let available = buffer_len.saturating_sub(KEY_VALUE_PARTIAL_FIXED);
    let data_out = if status == CmStatus::BufferOverflow {
        data[..data.len().min(available)].to_vec()
    } else {
        data.to_vec()
    };
    (status, required, Some(KeyValuePartialInformation { value_type, data: data_out }))
}

//! Process-wide tunables fixed once at [`crate::registry::Registry::initialize`] time.

/// Limits the cell store, key primitives and information-class queries are
/// bound by. No field is re-read after initialization.
#[derive(Debug, Clone, Copy)]
pub struct RegistryConfig {
    /// Upper bound on the number of cells a single hive's store may hold.
    pub max_cells_per_hive: usize,
    /// Upper bound on a key or value name, in UTF-16 code units.
    pub max_name_length: usize,
    /// Upper bound on a value's data payload, in bytes.
    pub max_value_data_length: usize,
    /// Upper bound on a key's class string, in bytes.
    pub max_class_length: usize,
}

impl RegistryConfig {
    pub const fn new() -> Self {
        Self {
            max_cells_per_hive: 1 << 20,
            max_name_length: 255,
            max_value_data_length: 1 << 20,
            max_class_length: 255,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

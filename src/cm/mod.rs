//! Configuration manager: hive storage, key primitives, the key-object
//! lifecycle, the syscall dispatcher, and the notification callback
//! registry.
//!
//! ```text
//!  Registry
//!   +-- ObjectManager (namespace + handle table)
//!   +-- Hive("HKLM")
//!   |     root key -> subkeys -> ... -> values
//!   +-- Hive("HKCU")
//!   |     root key -> subkeys -> ... -> values
//!   +-- CallbackRegistry (rundown-protected observers)
//! ```

pub mod callback;
pub mod cell;
pub mod hive;
pub mod info;
pub mod key;
pub mod keyobject;
pub mod status;
pub mod syscalls;
pub mod value;

pub use callback::{CallbackArgument, CallbackRegistry, NotifyClass};
pub use hive::{CreateOptions, Hive, HiveFlags};
pub use keyobject::KeyObject;
pub use status::{CmResult, CmStatus};
pub use syscalls::{AccessMask, Disposition, KeyInformationClass, KeyQueryResult, KeyValueInformationClass, ValueQueryResult};
pub use value::{KeyValue, ValueData, ValueType};

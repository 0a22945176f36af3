//! NTSTATUS-shaped outcome codes. This is the sole failure channel the public
//! syscalls return; internal helpers use `Result<T, CmStatus>` so `?`
//! composes, then the dispatcher flattens the result back into the bare
//! status (or status-plus-output-tuple) shapes the syscalls are documented to
//! return.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CmStatus {
    Success = 0,
    ObjectNameNotFound = -1,
    Unsuccessful = -2,
    CannotDelete = -3,
    AccessDenied = -4,
    BufferTooSmall = -5,
    BufferOverflow = -6,
    NoMoreEntries = -7,
    InsufficientResources = -8,
    InvalidHandle = -9,
    NotImplemented = -10,
    InvalidParameter = -11,
    ObjectNameInvalid = -12,
    KeyDeleted = -13,
}

impl CmStatus {
    pub fn is_success(self) -> bool {
        matches!(self, CmStatus::Success)
    }

    pub fn is_error(self) -> bool {
        !self.is_success()
    }
}

impl fmt::Display for CmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CmStatus::Success => "success",
            CmStatus::ObjectNameNotFound => "object name not found",
            CmStatus::Unsuccessful => "unsuccessful",
            CmStatus::CannotDelete => "cannot delete",
            CmStatus::AccessDenied => "access denied",
            CmStatus::BufferTooSmall => "buffer too small",
            CmStatus::BufferOverflow => "buffer overflow",
            CmStatus::NoMoreEntries => "no more entries",
            CmStatus::InsufficientResources => "insufficient resources",
            CmStatus::InvalidHandle => "invalid handle",
            CmStatus::NotImplemented => "not implemented",
            CmStatus::InvalidParameter => "invalid parameter",
            CmStatus::ObjectNameInvalid => "object name invalid",
            CmStatus::KeyDeleted => "key marked for delete",
        };
        f.write_str(text)
    }
}

pub type CmResult<T> = Result<T, CmStatus>;

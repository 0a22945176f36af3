//! Registry notification callbacks. Observers register once and are then
//! invoked around every key/value operation; `Invoke` never holds the
//! callback list lock while a callback body runs, and `Unregister` blocks
//! until any in-flight invocation of that specific callback has returned,
//! using one [`RundownProtection`] per callback entry.

use super::status::CmStatus;
use crate::ex::rundown::RundownGuard;
use crate::ex::RundownProtection;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use spin::Mutex;

/// Notify classes a callback can be invoked for. One pre/post pair per
/// syscall that has observable side effects; read-only enumeration calls
/// get pairs too so an observer can audit access, not just mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyClass {
    RegNtPreCreateKey,
    RegNtPostCreateKey,
    RegNtPreOpenKey,
    RegNtPostOpenKey,
    RegNtPreDeleteKey,
    RegNtPostDeleteKey,
    RegNtPreSetValueKey,
    RegNtPostSetValueKey,
    RegNtPreDeleteValueKey,
    RegNtPostDeleteValueKey,
    RegNtPreQueryValueKey,
    RegNtPostQueryValueKey,
    RegNtPreEnumerateKey,
    RegNtPostEnumerateKey,
    RegNtPreEnumerateValueKey,
    RegNtPostEnumerateValueKey,
    RegNtPreQueryKey,
    RegNtPostQueryKey,
    RegNtPreQueryMultipleValueKey,
    RegNtPostQueryMultipleValueKey,
    RegNtPreSetInformationKey,
    RegNtPostSetInformationKey,
    RegNtPreFlushKey,
    RegNtPostFlushKey,
    RegNtPreRenameKey,
    RegNtPostRenameKey,
}

/// Argument passed to a callback: a pre-call observes the path about to be
/// acted on, a post-call observes the outcome.
pub enum CallbackArgument<'a> {
    Pre { key_path: &'a str },
    Post { status: CmStatus },
}

pub type CallbackFn = dyn for<'a> Fn(u64, NotifyClass, &CallbackArgument<'a>) -> CmStatus + Send + Sync;

struct CallbackEntry {
    cookie: u64,
    context: u64,
    function: Box<CallbackFn>,
    rundown: RundownProtection,
    pending_delete: AtomicBool,
}

/// `callback_lock`-guarded list of registered observers plus the monotonic
/// cookie counter (Open Question: cookies are a per-process counter rather
/// than the entry's address, so they stay meaningful if an entry is freed
/// and a new one happens to land at the same place).
pub struct CallbackRegistry {
    entries: Mutex<Vec<Arc<CallbackEntry>>>,
    next_cookie: AtomicU64,
}

impl CallbackRegistry {
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_cookie: AtomicU64::new(1),
        }
    }

    pub fn register<F>(&self, context: u64, function: F) -> u64
    where
        F: for<'a> Fn(u64, NotifyClass, &CallbackArgument<'a>) -> CmStatus + Send + Sync + 'static,
    {
        let cookie = self.next_cookie.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(CallbackEntry {
            cookie,
            context,
            function: Box::new(function),
            rundown: RundownProtection::new(),
            pending_delete: AtomicBool::new(false),
        });
        self.entries.lock().push(entry);
        cookie
    }

    pub fn unregister(&self, cookie: u64) -> Result<(), CmStatus> {
        let entry = {
            let entries = self.entries.lock();
            entries.iter().find(|e| e.cookie == cookie).cloned()
        };
        let entry = entry.ok_or(CmStatus::InvalidHandle)?;

        if entry
            .pending_delete
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CmStatus::Unsuccessful);
        }

        entry.rundown.wait_for_rundown();

        let mut entries = self.entries.lock();
        entries.retain(|e| e.cookie != cookie);
        Ok(())
    }

    /// Walk the list once, skipping entries pending deletion, never holding
    /// `entries` while a callback body runs. Stops and propagates the first
    /// failing status a callback returns.
    pub fn invoke(&self, class: NotifyClass, argument: &CallbackArgument) -> CmStatus {
        let mut index = 0;
        loop {
            let entry = {
                let entries = self.entries.lock();
                match entries.get(index) {
                    Some(e) if !e.pending_delete.load(Ordering::Acquire) => Some(Arc::clone(e)),
                    Some(_) => {
                        index += 1;
                        continue;
                    }
                    None => None,
                }
            };
            let Some(entry) = entry else { break };
            index += 1;

            let Some(_guard) = RundownGuard::try_new(&entry.rundown) else {
                continue;
            };
            let status = (entry.function)(entry.context, class, argument);
            drop(_guard);

            if status.is_error() {
                return status;
            }
        }
        CmStatus::Success
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

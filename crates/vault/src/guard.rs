//! Reentrancy guard
//!
//! Every mutating vault entrypoint enters the guard before touching state.
//! Entering while it is held fails immediately with
//! [`VaultError::Concurrency`] instead of blocking, so a strategy calling
//! back into the vault mid-batch gets an error rather than a deadlock.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{VaultError, VaultResult};

#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: AtomicBool,
}

/// Held for the duration of an entrypoint; releases the guard on drop
#[must_use = "the guard is released as soon as the token is dropped"]
pub struct GuardToken<'a> {
    entered: &'a AtomicBool,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> VaultResult<GuardToken<'_>> {
        self.entered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| VaultError::Concurrency)?;
        Ok(GuardToken {
            entered: &self.entered,
        })
    }

    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.entered.store(false, Ordering::Release);
    }
}

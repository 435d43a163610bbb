// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Mutual exclusion for device sessions
//!
//! Every device-touching operation runs while holding a [SessionGuard],
//! which releases the session when dropped. Waiters are served in FIFO
//! order. The lock is not reentrant, operations that require an identity
//! check and a signature run as a single critical section.

use std::ops::{Deref, DerefMut};

use log::debug;
use tokio::sync::{Mutex, MutexGuard};

use crate::Operation;

/// Exclusive gate around session state `T`
#[derive(Debug, Default)]
pub struct SessionLock<T> {
    inner: Mutex<T>,
}

/// Scoped session access, released on drop
pub struct SessionGuard<'a, T> {
    op: Operation,
    guard: MutexGuard<'a, T>,
}

impl<T> SessionLock<T> {
    pub fn new(v: T) -> Self {
        Self {
            inner: Mutex::new(v),
        }
    }

    /// Wait for exclusive access to the session
    pub async fn acquire(&self, op: Operation) -> SessionGuard<'_, T> {
        debug!("{}: awaiting session", op);

        let guard = self.inner.lock().await;

        debug!("{}: session acquired", op);

        SessionGuard { op, guard }
    }

    /// Check whether the session is currently held
    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

impl<'a, T> SessionGuard<'a, T> {
    /// Operation holding the session
    pub fn operation(&self) -> Operation {
        self.op
    }
}

impl<'a, T> Deref for SessionGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<'a, T> DerefMut for SessionGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl<'a, T> Drop for SessionGuard<'a, T> {
    fn drop(&mut self) {
        debug!("{}: session released", self.op);
    }
}

//! Dispatch-level critical section.
//!
//! Every scheduler operation runs to completion inside one [`IsrLock`]
//! section: local interrupts are off on bare metal and the spin lock keeps
//! other processors out of the shared scheduler state.

use spin::{Mutex, MutexGuard};

pub struct IsrLock<T> {
    inner: Mutex<T>,
}

impl<T> IsrLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Runs `f` with exclusive access and local interrupts disabled.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        without_interrupts(|| {
            let mut guard = self.inner.lock();
            f(&mut guard)
        })
    }

    /// Non-blocking variant for paths that must never spin, such as NMI handlers.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        without_interrupts(|| self.inner.try_lock().map(|mut guard| f(&mut guard)))
    }

    /// Plain lock for code already running with interrupts disabled.
    pub fn lock_irqs_disabled(&self) -> MutexGuard<'_, T> {
        self.inner.lock()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    x86_64::instructions::interrupts::without_interrupts(f)
}

#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    f()
}

//! # Synchronization Primitives
//!
//! Interrupt-safe critical sections and the priority-ceiling mutex.
//!
//! Scheduler bookkeeping is accessed only within a critical section. On
//! Cortex-M the `critical-section` implementation masks interrupts; on
//! hosted builds it is a process-wide lock.
//!
//! Task handlers never take a lock. A resource shared by several tasks is
//! guarded by raising the current priority to the resource's *ceiling*:
//! the highest priority of any task that touches it. While raised, no task
//! at or below the ceiling can be dispatched, so no task can observe the
//! resource half-updated and no priority inversion can occur. Tasks above
//! the ceiling still preempt normally.

use log::error;

use crate::config::MAX_PRIO;
use crate::error::{Error, Result};
use crate::kernel::Kernel;

/// Execute a closure within a critical section.
///
/// Keep critical sections as short as possible: they delay every interrupt.
/// Never call a task handler from inside one.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(critical_section::CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}

impl<'a> Kernel<'a> {
    /// Raise the current priority to `ceiling`.
    ///
    /// Returns the previous priority, to be handed back to
    /// [`mutex_unlock`](Self::mutex_unlock). Until the scheduler has
    /// dropped to idle (registration and init events) this is a no-op,
    /// since dispatch is already suppressed. Ceilings above every task
    /// saturate at [`MAX_PRIO`].
    ///
    /// # Errors
    /// [`Error::InvalidCeiling`] if `ceiling` is below the current
    /// priority. Such a ceiling does not dominate every task that may touch
    /// the resource.
    pub fn mutex_lock(&self, ceiling: u8) -> Result<u8> {
        let locked = self.with_state(|s| {
            let current = s.current;
            if !s.running {
                return Ok(current);
            }
            let ceiling = ceiling.min(MAX_PRIO);
            if ceiling < current {
                return Err(Error::InvalidCeiling { ceiling, current });
            }
            s.current = ceiling;
            Ok(current)
        });
        if let Err(err) = &locked {
            error!("mutex lock rejected: {}", err);
        }
        locked
    }

    /// Restore the priority saved by [`mutex_lock`](Self::mutex_lock) and
    /// dispatch any task that was held back by the ceiling.
    ///
    /// A saved priority above the current one means the lock/unlock calls
    /// are mismatched; the request is ignored.
    pub fn mutex_unlock(&self, saved: u8) {
        let lowered = self.with_state(|s| {
            let current = s.current;
            if saved > current {
                return Err(current);
            }
            s.current = saved;
            Ok(saved < current)
        });
        match lowered {
            Ok(true) => self.schedule(),
            Ok(false) => {}
            Err(current) => error!(
                "ignoring mutex unlock to priority {} above current priority {}",
                saved, current
            ),
        }
    }

    /// Scoped form of [`mutex_lock`](Self::mutex_lock): the ceiling is
    /// released when the guard drops.
    pub fn lock_ceiling(&self, ceiling: u8) -> Result<CeilingGuard<'_, 'a>> {
        let saved = self.mutex_lock(ceiling)?;
        Ok(CeilingGuard {
            kernel: self,
            saved,
        })
    }

    /// Run `f` with the current priority raised to `ceiling`.
    pub fn with_ceiling<R>(&self, ceiling: u8, f: impl FnOnce() -> R) -> Result<R> {
        let _guard = self.lock_ceiling(ceiling)?;
        Ok(f())
    }
}

/// Held priority ceiling; unlocks on drop.
#[must_use = "the ceiling is released as soon as the guard is dropped"]
pub struct CeilingGuard<'k, 'a> {
    kernel: &'k Kernel<'a>,
    saved: u8,
}

impl CeilingGuard<'_, '_> {
    /// Priority that will be restored on drop.
    pub fn saved_priority(&self) -> u8 {
        self.saved
    }
}

impl Drop for CeilingGuard<'_, '_> {
    fn drop(&mut self) {
        self.kernel.mutex_unlock(self.saved);
    }
}

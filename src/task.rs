//! # Task Model
//!
//! A task is a run-to-completion event handler bound to a unique priority.
//! It never blocks and never owns a stack: the kernel calls it on the
//! shared call stack, once per queued event.
//!
//! ```text
//!   post(p, e) ──► EventQueue[p] ──► ready bit p ──► schedule() ──► handler.handle(e)
//! ```

use crate::config::{Param, Signal};
use crate::kernel::Kernel;
use crate::queue::EventQueue;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An immutable `(signal, parameter)` pair delivered to exactly one task.
/// Copied on enqueue and dequeue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Event {
    pub signal: Signal,
    pub param: Param,
}

impl Event {
    /// Zeroed event, used to fill queue storage.
    pub const EMPTY: Event = Event::new(0, 0);

    #[inline]
    pub const fn new(signal: Signal, param: Param) -> Self {
        Self { signal, param }
    }
}

// ---------------------------------------------------------------------------
// Handler capability
// ---------------------------------------------------------------------------

/// Event handler of a registered task.
///
/// `handle` runs to completion at the task's priority. It may post events
/// (to itself, to lower tasks, or to higher tasks, which preempt it
/// immediately), bracket resource access with the ceiling mutex, and must
/// not block.
///
/// Handlers are shared with interrupt context, hence the `Sync` bound.
pub trait TaskHandler: Sync {
    fn handle(&self, kernel: &Kernel<'_>, event: Event);
}

/// Adapter turning a closure into a [`TaskHandler`].
///
/// Built with [`from_fn`] so the closure is inferred with the
/// higher-ranked signature the kernel calls it with.
pub struct FnHandler<F>(F);

/// Wrap a closure as a task handler.
///
/// ```ignore
/// let blink = sst_kernel::task::from_fn(|kernel, event| {
///     let _ = kernel.post(3, event.signal, event.param + 1);
/// });
/// ```
pub fn from_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Kernel<'_>, Event) + Sync,
{
    FnHandler(f)
}

impl<F> TaskHandler for FnHandler<F>
where
    F: Fn(&Kernel<'_>, Event) + Sync,
{
    #[inline]
    fn handle(&self, kernel: &Kernel<'_>, event: Event) {
        (self.0)(kernel, event)
    }
}

// ---------------------------------------------------------------------------
// Task configuration (immutable after registration)
// ---------------------------------------------------------------------------

/// Static configuration for a task, set at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskConfig {
    /// Unique priority in `1..MAX_PRIO`. Higher is more urgent.
    pub priority: u8,

    /// Event handed to the task once when the scheduler starts, before
    /// any queued event. `None` skips initialization.
    pub init: Option<Event>,
}

impl TaskConfig {
    pub const fn new(priority: u8) -> Self {
        Self { priority, init: None }
    }

    /// Deliver `event` to the task at start-up.
    pub const fn with_init(mut self, event: Event) -> Self {
        self.init = Some(event);
        self
    }
}

// ---------------------------------------------------------------------------
// Task control block
// ---------------------------------------------------------------------------

/// Per-priority slot in the task registry.
pub(crate) struct TaskControlBlock<'a> {
    pub(crate) handler: &'a dyn TaskHandler,
    pub(crate) queue: EventQueue<'a>,
    pub(crate) init: Option<Event>,
}

impl<'a> TaskControlBlock<'a> {
    pub(crate) fn new(
        handler: &'a dyn TaskHandler,
        queue: EventQueue<'a>,
        init: Option<Event>,
    ) -> Self {
        Self { handler, queue, init }
    }
}

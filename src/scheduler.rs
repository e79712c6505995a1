//! # Scheduler State
//!
//! Bookkeeping behind the kernel: the task registry, the ready set, the
//! current priority and the interrupt nesting depth. Every method here is
//! O(1) (or O(`MAX_PRIO`) at start-up) and is only ever called inside a
//! critical section by [`Kernel`](crate::kernel::Kernel). Nothing in this
//! module calls a task handler; it only hands the handler back to the
//! caller, which invokes it after leaving the critical section.
//!
//! ## Ready Set
//!
//! One bit per priority. Bit `p` is set exactly when the queue of task `p`
//! is non-empty; both are updated by the same call, so the invariant holds
//! whenever the critical section is released.
//!
//! ```text
//!   bit:   31 ............ 5 4 3 2 1 0
//!   ready:  0 ............ 1 0 0 0 1 0     → highest() == Some(5)
//!                                    └── idle, never set
//! ```

use crate::config::{MAX_PRIO, NOT_STARTED};
use crate::error::{ConfigError, Error};
use crate::queue::EventQueue;
use crate::task::{Event, TaskConfig, TaskControlBlock, TaskHandler};

// ---------------------------------------------------------------------------
// Ready set
// ---------------------------------------------------------------------------

/// Bitmask over priorities with queued, undelivered events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadySet(u32);

impl ReadySet {
    pub const fn new() -> Self {
        Self(0)
    }

    #[inline]
    pub(crate) fn insert(&mut self, priority: u8) {
        self.0 |= 1 << priority;
    }

    #[inline]
    pub(crate) fn remove(&mut self, priority: u8) {
        self.0 &= !(1 << priority);
    }

    #[inline]
    pub const fn contains(self, priority: u8) -> bool {
        priority < MAX_PRIO && self.0 & (1 << priority) != 0
    }

    /// Highest ready priority, if any.
    #[inline]
    pub const fn highest(self) -> Option<u8> {
        if self.0 == 0 {
            None
        } else {
            Some((u32::BITS - 1 - self.0.leading_zeros()) as u8)
        }
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Scheduler state
// ---------------------------------------------------------------------------

/// A task selected for dispatch, with the event already dequeued.
pub(crate) struct Dispatch<'a> {
    pub(crate) priority: u8,
    pub(crate) handler: &'a dyn TaskHandler,
    pub(crate) event: Event,
}

/// Process-wide scheduler state, one per [`Kernel`](crate::kernel::Kernel).
pub(crate) struct Scheduler<'a> {
    /// Task slots indexed by priority. Slot 0 (idle) is always vacant.
    tasks: [Option<TaskControlBlock<'a>>; MAX_PRIO as usize],

    /// Priorities in registration order, for start-up initialization.
    init_order: [u8; MAX_PRIO as usize],

    /// Number of registered tasks.
    task_count: usize,

    pub(crate) ready: ReadySet,

    /// Priority of whichever context owns the CPU.
    pub(crate) current: u8,

    /// Set once by `start()`; freezes the registry.
    pub(crate) started: bool,

    /// Set once init events are delivered and the CPU drops to idle.
    /// Until then dispatch is suppressed and ceilings are no-ops.
    pub(crate) running: bool,

    /// Interrupt brackets currently open.
    pub(crate) isr_nesting: u16,
}

impl<'a> Scheduler<'a> {
    pub(crate) const fn new() -> Self {
        Self {
            tasks: [const { None }; MAX_PRIO as usize],
            init_order: [0; MAX_PRIO as usize],
            task_count: 0,
            ready: ReadySet::new(),
            current: NOT_STARTED,
            started: false,
            running: false,
            isr_nesting: 0,
        }
    }

    pub(crate) fn task_count(&self) -> usize {
        self.task_count
    }

    /// Add a task to the registry. Leaves the ready set untouched.
    pub(crate) fn register(
        &mut self,
        handler: &'a dyn TaskHandler,
        config: TaskConfig,
        storage: &'a mut [Event],
    ) -> Result<(), ConfigError> {
        let priority = config.priority;
        if self.started {
            return Err(ConfigError::AlreadyStarted);
        }
        if priority == 0 {
            return Err(ConfigError::ReservedPriority);
        }
        if priority >= MAX_PRIO {
            return Err(ConfigError::PriorityOutOfRange {
                priority,
                max: MAX_PRIO,
            });
        }
        let slot = &mut self.tasks[priority as usize];
        if slot.is_some() {
            return Err(ConfigError::DuplicatePriority(priority));
        }
        let queue = EventQueue::new(storage)?;

        *slot = Some(TaskControlBlock::new(handler, queue, config.init));
        self.init_order[self.task_count] = priority;
        self.task_count += 1;
        Ok(())
    }

    /// Push `event` to the task at `priority` and mark it ready.
    ///
    /// On a full queue nothing changes: the event is dropped and the ready
    /// bit keeps its previous (set) value.
    pub(crate) fn enqueue(&mut self, priority: u8, event: Event) -> Result<(), Error> {
        let tcb = self
            .tasks
            .get_mut(priority as usize)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownTask(priority))?;
        tcb.queue
            .push(event)
            .map_err(|_| Error::QueueFull(priority))?;
        self.ready.insert(priority);
        Ok(())
    }

    /// Dequeue one event from the highest ready task strictly above
    /// `floor`, and make that task's priority current.
    pub(crate) fn take_next(&mut self, floor: u8) -> Option<Dispatch<'a>> {
        let priority = self.ready.highest().filter(|&p| p > floor)?;
        let tcb = self.tasks[priority as usize].as_mut()?;
        let event = tcb.queue.pop()?;
        if tcb.queue.is_empty() {
            self.ready.remove(priority);
        }
        self.current = priority;
        Some(Dispatch {
            priority,
            handler: tcb.handler,
            event,
        })
    }

    /// Next pending initialization event, in registration order.
    pub(crate) fn take_init(&mut self) -> Option<(&'a dyn TaskHandler, Event)> {
        for &priority in &self.init_order[..self.task_count] {
            if let Some(tcb) = self.tasks[priority as usize].as_mut() {
                if let Some(event) = tcb.init.take() {
                    return Some((tcb.handler, event));
                }
            }
        }
        None
    }

    pub(crate) fn queue_len(&self, priority: u8) -> Option<usize> {
        self.tasks
            .get(priority as usize)
            .and_then(Option::as_ref)
            .map(|tcb| tcb.queue.len())
    }
}

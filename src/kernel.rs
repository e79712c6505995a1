//! # Kernel
//!
//! Public API of the single-stack scheduler: task registration, event
//! posting, the dispatch loop and the interrupt boundary.
//!
//! A [`Kernel`] is an ordinary value with a `const` constructor. Firmware
//! keeps one in a `static`; tests build as many independent instances as
//! they like. All operations take `&self` and serialize their bookkeeping
//! through short critical sections. No critical section ever encloses a
//! handler call.
//!
//! ## Startup Sequence
//!
//! ```text
//! main()
//!   ├─► KERNEL.register() ← Register tasks (×N), priorities 1..MAX_PRIO
//!   └─► KERNEL.run(port)  ← No return
//!         ├─► port.on_start()        ← Enable interrupt sources
//!         ├─► start()                ← Init events, then drop to idle
//!         └─► loop { schedule(); port.on_idle() }
//! ```
//!
//! ## Preemption
//!
//! There is no context switch. When `post()` makes a task ready that
//! outranks the current priority, `schedule()` calls its handler right
//! there, nested inside the poster's frame. The poster resumes once every
//! task above its own priority has drained.
//!
//! ```text
//!   handler(1) ─ post(5) ─► schedule() ─► handler(5) ─┐
//!        ▲                                            │ returns
//!        └────────────── resumes ◄────────────────────┘
//! ```

use core::cell::RefCell;
use core::convert::Infallible;

use critical_section::Mutex;
use log::{debug, error, info, trace, warn};

use crate::arch::{self, Port};
use crate::config::{Param, Signal, IDLE_PRIORITY, MAX_PRIO};
use crate::error::{ConfigError, Error, Result};
use crate::scheduler::{ReadySet, Scheduler};
use crate::sync;
use crate::task::{Event, TaskConfig, TaskHandler};

/// Single-stack preemptive event scheduler.
///
/// `'a` is the lifetime of the registered handlers and queue storage;
/// on firmware both are `'static`.
pub struct Kernel<'a> {
    state: Mutex<RefCell<Scheduler<'a>>>,
}

impl<'a> Kernel<'a> {
    /// Create a kernel with no tasks. Dispatch stays suppressed until
    /// [`start`](Self::start).
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(Scheduler::new())),
        }
    }

    /// Run `f` on the scheduler state inside a critical section.
    #[inline]
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut Scheduler<'a>) -> R) -> R {
        sync::critical_section(|cs| f(&mut self.state.borrow_ref_mut(cs)))
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a task at `config.priority` with `queue` as its event
    /// storage. The queue capacity is `queue.len()`, which must be a
    /// non-zero power of two.
    ///
    /// # Errors
    /// [`Error::Configuration`] for a reserved, duplicate or out-of-range
    /// priority, a bad queue capacity, or a call after the scheduler has
    /// started.
    pub fn register(
        &self,
        handler: &'a dyn TaskHandler,
        config: TaskConfig,
        queue: &'a mut [Event],
    ) -> Result {
        let capacity = queue.len();
        match self.with_state(|s| s.register(handler, config, queue)) {
            Ok(()) => {
                debug!(
                    "registered task at priority {} (queue capacity {})",
                    config.priority, capacity
                );
                Ok(())
            }
            Err(err) => {
                error!("task registration at priority {} failed: {}", config.priority, err);
                Err(err.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Posting and dispatch
    // -----------------------------------------------------------------------

    /// Queue an event for the task at `priority`, then run every task that
    /// now outranks the current context before returning.
    ///
    /// Safe to call from task handlers and from bracketed interrupt
    /// handlers.
    ///
    /// # Errors
    /// - [`Error::UnknownTask`] if no task owns `priority`.
    /// - [`Error::QueueFull`] if the task's queue is saturated. The event
    ///   is dropped and no state changes; retrying is up to the caller.
    pub fn post(&self, priority: u8, signal: Signal, param: Param) -> Result {
        let event = Event::new(signal, param);
        if let Err(err) = self.with_state(|s| s.enqueue(priority, event)) {
            match err {
                Error::QueueFull(_) => warn!("{}: dropped {:?}", err, event),
                _ => error!("{}: dropped {:?}", err, event),
            }
            return Err(err);
        }
        self.schedule();
        Ok(())
    }

    /// Dispatch loop.
    ///
    /// Repeatedly picks the highest ready task strictly above the priority
    /// current at entry, hands it exactly one event, and re-evaluates. The
    /// strict comparison means a task never preempts itself or anything at
    /// an equal or higher level.
    pub fn schedule(&self) {
        let floor = self.current_priority();
        while let Some(next) = self.with_state(|s| s.take_next(floor)) {
            trace!(
                "dispatch priority {} (preempting {}): {:?}",
                next.priority, floor, next.event
            );
            next.handler.handle(self, next.event);
            self.with_state(|s| s.current = floor);
        }
    }

    // -----------------------------------------------------------------------
    // Start / run
    // -----------------------------------------------------------------------

    /// Freeze the registry, deliver initialization events in registration
    /// order, then drop to the idle priority and drain everything queued so
    /// far.
    ///
    /// Events posted by initialization handlers are queued, not dispatched,
    /// because the current priority is still the start-up sentinel.
    ///
    /// # Errors
    /// [`ConfigError::AlreadyStarted`] on a second call.
    pub fn start(&self) -> Result {
        let tasks = self.with_state(|s| {
            if s.started {
                return Err(ConfigError::AlreadyStarted);
            }
            s.started = true;
            Ok(s.task_count())
        })?;
        info!("starting scheduler with {} tasks", tasks);

        while let Some((handler, event)) = self.with_state(|s| s.take_init()) {
            handler.handle(self, event);
        }

        self.with_state(|s| {
            s.current = IDLE_PRIORITY;
            s.running = true;
        });
        self.schedule();
        Ok(())
    }

    /// One pass of the idle loop: dispatch whatever is ready, then report
    /// whether the ready set is empty.
    pub fn poll(&self) -> bool {
        self.schedule();
        self.ready_set().is_empty()
    }

    /// Start the scheduler and run the idle loop. **Does not return**
    /// unless start-up fails.
    ///
    /// `port.on_start()` runs first (enable interrupt sources), then
    /// [`start`](Self::start). Afterwards each iteration dispatches ready
    /// work and calls `port.on_idle()` whenever nothing is ready.
    pub fn run<P: Port>(&self, port: &mut P) -> Result<Infallible> {
        port.on_start();
        self.start()?;
        loop {
            if self.poll() {
                port.on_idle();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Interrupt boundary
    // -----------------------------------------------------------------------

    /// Enter an interrupt handler running at `isr_priority`.
    ///
    /// Returns the interrupted priority, which must be passed to
    /// [`isr_exit`](Self::isr_exit). Interrupt acceptance is re-enabled
    /// afterwards so higher interrupts can nest. Must not be called from
    /// inside a critical section.
    ///
    /// An interrupt never lowers the current priority: if `isr_priority`
    /// is below the interrupted context, that context's level is kept.
    /// Levels above every task saturate at [`MAX_PRIO`].
    pub fn isr_entry(&self, isr_priority: u8) -> u8 {
        let saved = self.with_state(|s| {
            let saved = s.current;
            s.current = saved.max(isr_priority.min(MAX_PRIO));
            s.isr_nesting += 1;
            saved
        });
        arch::unmask_interrupts();
        saved
    }

    /// Leave an interrupt handler: restore the interrupted priority and run
    /// any task the interrupt made ready before returning to the
    /// interrupted code.
    ///
    /// # Panics
    /// If there is no open [`isr_entry`](Self::isr_entry). An unpaired exit
    /// would silently corrupt the priority invariant.
    pub fn isr_exit(&self, saved: u8) {
        let paired = self.with_state(|s| {
            if s.isr_nesting == 0 {
                return false;
            }
            s.isr_nesting -= 1;
            s.current = saved;
            true
        });
        assert!(paired, "isr_exit without a matching isr_entry");
        self.schedule();
    }

    /// Bracket an interrupt handler body with
    /// [`isr_entry`](Self::isr_entry) / [`isr_exit`](Self::isr_exit).
    pub fn isr<R>(&self, isr_priority: u8, f: impl FnOnce(&Self) -> R) -> R {
        let saved = self.isr_entry(isr_priority);
        let result = f(self);
        self.isr_exit(saved);
        result
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Priority of the context that currently owns the CPU.
    pub fn current_priority(&self) -> u8 {
        self.with_state(|s| s.current)
    }

    pub fn ready_set(&self) -> ReadySet {
        self.with_state(|s| s.ready)
    }

    /// Number of queued events for the task at `priority`, or `None` if no
    /// task is registered there.
    pub fn queue_len(&self, priority: u8) -> Option<usize> {
        self.with_state(|s| s.queue_len(priority))
    }

    pub fn task_count(&self) -> usize {
        self.with_state(|s| s.task_count())
    }

    pub fn is_started(&self) -> bool {
        self.with_state(|s| s.started)
    }
}

impl Default for Kernel<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NOT_STARTED;
    use crate::task::from_fn;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn posts_before_start_are_queued_not_dispatched() {
        let seen = StdMutex::new(Vec::new());
        let task = from_fn(|_, e: Event| seen.lock().unwrap().push(e.signal));
        let mut queue = [Event::EMPTY; 4];
        let kernel = Kernel::new();
        kernel.register(&task, TaskConfig::new(3), &mut queue).unwrap();

        kernel.post(3, 1, 0).unwrap();
        kernel.post(3, 2, 0).unwrap();
        assert_eq!(kernel.current_priority(), NOT_STARTED);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(kernel.queue_len(3), Some(2));

        kernel.start().unwrap();
        assert_eq!(*seen.lock().unwrap(), [1, 2]);
        assert!(kernel.ready_set().is_empty());
        assert_eq!(kernel.current_priority(), IDLE_PRIORITY);
    }

    #[test]
    fn registration_after_start_is_rejected() {
        let task = from_fn(|_, _| {});
        let mut q1 = [Event::EMPTY; 2];
        let mut q2 = [Event::EMPTY; 2];
        let kernel = Kernel::new();
        kernel.register(&task, TaskConfig::new(1), &mut q1).unwrap();
        kernel.start().unwrap();

        assert_eq!(
            kernel.register(&task, TaskConfig::new(2), &mut q2),
            Err(Error::Configuration(ConfigError::AlreadyStarted))
        );
        assert_eq!(
            kernel.start(),
            Err(Error::Configuration(ConfigError::AlreadyStarted))
        );
        assert_eq!(kernel.task_count(), 1);
    }

    #[test]
    fn init_events_run_before_queued_work() {
        let seen = StdMutex::new(Vec::new());
        let low = from_fn(|k, e: Event| {
            seen.lock().unwrap().push((1, e.signal));
            if e.signal == 0 {
                // Dispatch is suppressed during init; this only queues.
                k.post(4, 9, 0).unwrap();
                seen.lock().unwrap().push((1, 100));
            }
        });
        let high = from_fn(|_, e: Event| seen.lock().unwrap().push((4, e.signal)));
        let mut q1 = [Event::EMPTY; 2];
        let mut q4 = [Event::EMPTY; 2];
        let kernel = Kernel::new();
        kernel
            .register(&low, TaskConfig::new(1).with_init(Event::new(0, 0)), &mut q1)
            .unwrap();
        kernel
            .register(&high, TaskConfig::new(4).with_init(Event::new(0, 0)), &mut q4)
            .unwrap();

        kernel.start().unwrap();
        assert_eq!(*seen.lock().unwrap(), [(1, 0), (1, 100), (4, 0), (4, 9)]);
    }

    #[test]
    #[should_panic(expected = "isr_exit without a matching isr_entry")]
    fn unpaired_isr_exit_panics() {
        let kernel = Kernel::new();
        kernel.start().unwrap();
        kernel.isr_exit(IDLE_PRIORITY);
    }

    #[test]
    fn isr_never_lowers_current_priority() {
        let kernel = Kernel::new();
        let saved = kernel.isr_entry(7);
        assert_eq!(saved, NOT_STARTED);
        assert_eq!(kernel.current_priority(), NOT_STARTED);
        kernel.isr_exit(saved);

        kernel.start().unwrap();
        let saved = kernel.isr_entry(7);
        assert_eq!(saved, IDLE_PRIORITY);
        assert_eq!(kernel.current_priority(), 7);
        kernel.isr_exit(saved);
        assert_eq!(kernel.current_priority(), IDLE_PRIORITY);
    }

    #[test]
    fn ceiling_is_a_no_op_while_init_events_run() {
        let locked = StdMutex::new(None);
        let task = from_fn(|k, _| {
            let saved = k.mutex_lock(2).unwrap();
            *locked.lock().unwrap() = Some((saved, k.current_priority()));
            k.mutex_unlock(saved);
        });
        let mut queue = [Event::EMPTY; 2];
        let kernel = Kernel::new();
        kernel
            .register(&task, TaskConfig::new(5).with_init(Event::new(0, 0)), &mut queue)
            .unwrap();

        kernel.start().unwrap();
        assert_eq!(*locked.lock().unwrap(), Some((NOT_STARTED, NOT_STARTED)));
        assert!(kernel.is_started());
        assert_eq!(kernel.current_priority(), IDLE_PRIORITY);
    }

    #[test]
    fn isr_levels_above_every_task_saturate() {
        let kernel = Kernel::new();
        kernel.start().unwrap();

        let saved = kernel.isr_entry(u8::MAX);
        assert_eq!(kernel.current_priority(), MAX_PRIO);
        assert_eq!(
            kernel.mutex_lock(3),
            Err(Error::InvalidCeiling { ceiling: 3, current: MAX_PRIO })
        );
        kernel.isr_exit(saved);
        assert_eq!(kernel.current_priority(), IDLE_PRIORITY);
    }
}

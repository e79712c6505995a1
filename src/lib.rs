//! # SST Kernel: Super-Simple Tasker
//!
//! A priority-based, run-to-completion event scheduler for small
//! microcontrollers. Tasks share one call stack; preemption is a nested
//! function call, not a context switch.
//!
//! ## Overview
//!
//! Every task is an event handler with a unique priority and a private
//! event queue. Posting an event to a task that outranks the running
//! context dispatches it immediately, inside the poster's frame. Posting to
//! the same or a lower priority only queues the event; it is picked up once
//! everything above it has returned.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │           Application Tasks (TaskHandler impls)         │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │   register() · post() · schedule() · run() · isr()      │
//! ├──────────────┬────────────────────┬───────────────────┤
//! │  Scheduler   │   Event Queues     │  Sync Primitives  │
//! │  scheduler.rs│   queue.rs         │  sync.rs          │
//! │  ─ ReadySet  │   ─ push()         │  ─ critical_section│
//! │  ─ take_next │   ─ pop()          │  ─ ceiling mutex  │
//! ├──────────────┴────────────────────┴───────────────────┤
//! │            Task Model (task.rs)                         │
//! │       Event · TaskHandler · TaskConfig                  │
//! ├────────────────────────────────────────────────────────┤
//! │      Arch Port (arch/cortex_m4.rs, arch/hosted.rs)      │
//! │       Port hooks · interrupt unmask · SysTick           │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Priority Rules
//!
//! - Priorities run `1..MAX_PRIO`; higher is more urgent. 0 is idle.
//! - A handler is dispatched only when its priority is **strictly greater**
//!   than the current priority, so it never preempts itself.
//! - Exactly one event is dispatched per pass of the dispatch loop; the
//!   ready set is re-read after every handler returns.
//! - Interrupts bracket their body with `isr_entry`/`isr_exit`; tasks they
//!   make ready run before the interrupted code resumes.
//! - Shared resources are guarded by raising the current priority to a
//!   ceiling (`mutex_lock`/`mutex_unlock`), never by blocking.
//!
//! ## Memory Model
//!
//! - **No heap**: queue storage is lent by the caller as `&mut [Event]`
//! - **No per-task stacks**: every handler runs on the caller's stack
//! - **Critical sections**: `critical-section` crate, only around queue and
//!   ready-set updates, never around a handler

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod config;
pub mod error;
pub mod kernel;
pub mod queue;
pub mod scheduler;
pub mod sync;
pub mod task;

pub use arch::Port;
pub use config::{Param, Signal, IDLE_PRIORITY, MAX_PRIO, NOT_STARTED};
pub use error::{ConfigError, Error, Result};
pub use kernel::Kernel;
pub use queue::EventQueue;
pub use scheduler::ReadySet;
pub use sync::CeilingGuard;
pub use task::{from_fn, Event, FnHandler, TaskConfig, TaskHandler};

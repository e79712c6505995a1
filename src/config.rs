//! # SST Configuration
//!
//! Compile-time constants governing the scheduler.
//! All limits are fixed at compile time. No dynamic allocation.

/// Number of priority levels, including the idle level 0.
/// Bounds the ready-set width: one bit per priority in a `u32`.
/// Tasks may use priorities `1..MAX_PRIO`.
pub const MAX_PRIO: u8 = 32;

/// Priority of the idle/background context. Nothing runs below it,
/// and no task may be registered at this level.
pub const IDLE_PRIORITY: u8 = 0;

/// Current-priority sentinel held from construction until `start()`.
/// It outranks every task, so events posted during startup are queued
/// but never dispatched.
pub const NOT_STARTED: u8 = u8::MAX;

/// Signal identifier carried by an event.
pub type Signal = u16;

/// Parameter carried by an event.
pub type Param = u16;

const _: () = assert!(MAX_PRIO as u32 <= u32::BITS);

// ---------------------------------------------------------------------------
// Cortex-M time base
// ---------------------------------------------------------------------------

/// SysTick frequency in Hz.
pub const TICK_HZ: u32 = 1000;

/// System clock frequency in Hz (default for STM32F4 at 16 MHz HSI).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;

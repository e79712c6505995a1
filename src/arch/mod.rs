//! # Architecture Abstraction Layer
//!
//! Provides the hardware boundary for the kernel: the [`Port`] hooks the
//! idle loop calls, and interrupt re-enabling on ISR entry. The Cortex-M
//! port is selected for bare-metal ARM; every other target gets the hosted
//! port, which the test suite runs on.

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m4;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub(crate) use cortex_m4::unmask_interrupts;

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub mod hosted;

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub(crate) use hosted::unmask_interrupts;

/// Platform hooks driven by [`Kernel::run`](crate::kernel::Kernel::run).
pub trait Port {
    /// Enable interrupt sources. Called once, before any event is
    /// dispatched.
    fn on_start(&mut self) {}

    /// Called whenever the ready set is empty: sleep, power down, or poll
    /// background work. Returning loops back to the dispatcher.
    fn on_idle(&mut self);
}

//! Hosted port for simulation and tests.
//!
//! There is no interrupt controller to talk to; the critical sections
//! come from the `critical-section` crate's `std` implementation.

use super::Port;

/// Idle port that spins.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinPort;

impl Port for SpinPort {
    #[inline]
    fn on_idle(&mut self) {
        core::hint::spin_loop();
    }
}

#[inline]
pub(crate) fn unmask_interrupts() {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, Error};
    use crate::kernel::Kernel;

    #[test]
    fn run_surfaces_start_failure() {
        let kernel = Kernel::new();
        kernel.start().unwrap();

        let err = kernel.run(&mut SpinPort).unwrap_err();
        assert_eq!(err, Error::Configuration(ConfigError::AlreadyStarted));
    }
}

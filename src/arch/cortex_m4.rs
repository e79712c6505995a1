//! # Cortex-M4 Port Layer
//!
//! Hardware-specific code for the ARM Cortex-M4 (Thumb-2) processor.
//!
//! There is no context switching here: every task runs on the main stack,
//! and preemption by an interrupt is just the NVIC nesting the handler on
//! top of whatever was running. ISRs that post events bracket their body
//! with `Kernel::isr_entry` / `Kernel::isr_exit` (or `Kernel::isr`), so the
//! tasks they make ready run before the interrupted code resumes.
//!
//! Critical sections are provided by `cortex-m`'s
//! `critical-section-single-core` implementation (PRIMASK).

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SYST;

use super::Port;
use crate::config::{SYSTEM_CLOCK_HZ, TICK_HZ};

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configure the SysTick timer to fire at `TICK_HZ` from the processor
/// clock. Its handler is the usual time base that posts periodic events.
pub fn configure_systick(syst: &mut SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

// ---------------------------------------------------------------------------
// Interrupt boundary
// ---------------------------------------------------------------------------

/// Re-enable interrupt acceptance after `isr_entry` so higher-priority
/// interrupts can nest.
#[inline]
pub(crate) fn unmask_interrupts() {
    // SAFETY: called outside any critical section, right after the kernel
    // has recorded the ISR priority.
    unsafe { cortex_m::interrupt::enable() }
}

// ---------------------------------------------------------------------------
// Idle port
// ---------------------------------------------------------------------------

/// Idle port that sleeps until the next interrupt.
///
/// Takes ownership of SysTick so `on_start` can arm it.
pub struct WaitForInterrupt {
    syst: SYST,
}

impl WaitForInterrupt {
    pub fn new(syst: SYST) -> Self {
        Self { syst }
    }
}

impl Port for WaitForInterrupt {
    fn on_start(&mut self) {
        configure_systick(&mut self.syst);
    }

    #[inline]
    fn on_idle(&mut self) {
        cortex_m::asm::wfi();
    }
}

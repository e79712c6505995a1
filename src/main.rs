//! # SST Example Firmware
//!
//! Three tasks driven by the SysTick interrupt:
//!
//! | Task | Priority | Behavior |
//! |------|----------|----------|
//! | `Reporter`  | 1 | Publishes the sample total every `REPORT_EVERY` samples |
//! | `Sampler`   | 2 | Accumulates one sample per tick into the shared total |
//! | `Heartbeat` | 3 | Resets the total on every beat |
//!
//! The running total is touched by `Sampler` and `Heartbeat`, so both
//! access it under the priority ceiling `TOTAL_CEILING` (the higher of the
//! two). While `Sampler` holds the ceiling, a beat posted by the ISR is
//! only queued; it runs as soon as the ceiling is released.
//!
//! SysTick runs at SST priority `SYSTICK_PRIO`, above every task. The tasks
//! it makes ready run to completion at ISR exit, before the interrupted
//! code resumes.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::{entry, exception};
use panic_halt as _;

use sst_kernel::arch::cortex_m4::WaitForInterrupt;
use sst_kernel::{Event, Kernel, TaskConfig, TaskHandler};

// ---------------------------------------------------------------------------
// Priorities and signals
// ---------------------------------------------------------------------------

const REPORTER_PRIO: u8 = 1;
const SAMPLER_PRIO: u8 = 2;
const HEARTBEAT_PRIO: u8 = 3;
const SYSTICK_PRIO: u8 = 8;

const TOTAL_CEILING: u8 = HEARTBEAT_PRIO;

const INIT_SIG: u16 = 0;
const SAMPLE_SIG: u16 = 1;
const BEAT_SIG: u16 = 2;
const REPORT_SIG: u16 = 3;

const BEAT_EVERY_TICKS: u32 = 500;
const REPORT_EVERY: u32 = 100;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

static KERNEL: Kernel<'static> = Kernel::new();

/// Guarded by `TOTAL_CEILING`; plain load/store is enough under it.
static TOTAL: AtomicU32 = AtomicU32::new(0);
static SAMPLES: AtomicU32 = AtomicU32::new(0);
static PUBLISHED: AtomicU32 = AtomicU32::new(0);
/// Events the tasks or the ISR chose to drop instead of retrying.
static DROPPED: AtomicU32 = AtomicU32::new(0);

fn drop_on_error(result: sst_kernel::Result) {
    if result.is_err() {
        DROPPED.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

struct Reporter;

impl TaskHandler for Reporter {
    fn handle(&self, _kernel: &Kernel<'_>, event: Event) {
        if event.signal == REPORT_SIG {
            PUBLISHED.store(u32::from(event.param), Ordering::Relaxed);
        }
    }
}

struct Sampler;

impl TaskHandler for Sampler {
    fn handle(&self, kernel: &Kernel<'_>, event: Event) {
        match event.signal {
            INIT_SIG => SAMPLES.store(0, Ordering::Relaxed),
            SAMPLE_SIG => {
                let total = kernel
                    .with_ceiling(TOTAL_CEILING, || {
                        let total = TOTAL.load(Ordering::Relaxed) + u32::from(event.param & 0xFF);
                        TOTAL.store(total, Ordering::Relaxed);
                        total
                    })
                    .expect("TOTAL_CEILING is below the sampler priority");

                let samples = SAMPLES.load(Ordering::Relaxed) + 1;
                SAMPLES.store(samples, Ordering::Relaxed);
                if samples % REPORT_EVERY == 0 {
                    // Lower priority: queued, runs after this handler returns.
                    drop_on_error(kernel.post(REPORTER_PRIO, REPORT_SIG, total as u16));
                }
            }
            _ => {}
        }
    }
}

struct Heartbeat;

impl TaskHandler for Heartbeat {
    fn handle(&self, kernel: &Kernel<'_>, event: Event) {
        if event.signal == BEAT_SIG {
            kernel
                .with_ceiling(TOTAL_CEILING, || TOTAL.store(0, Ordering::Relaxed))
                .expect("TOTAL_CEILING is below the heartbeat priority");
        }
    }
}

static REPORTER: Reporter = Reporter;
static SAMPLER: Sampler = Sampler;
static HEARTBEAT: Heartbeat = Heartbeat;

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Firmware entry point. Registers the tasks and runs the scheduler.
/// Does not return.
#[entry]
fn main() -> ! {
    let cp = cortex_m::Peripherals::take().unwrap();

    let reporter_queue = cortex_m::singleton!(: [Event; 4] = [Event::EMPTY; 4]).unwrap();
    let sampler_queue = cortex_m::singleton!(: [Event; 8] = [Event::EMPTY; 8]).unwrap();
    let heartbeat_queue = cortex_m::singleton!(: [Event; 2] = [Event::EMPTY; 2]).unwrap();

    KERNEL
        .register(&REPORTER, TaskConfig::new(REPORTER_PRIO), reporter_queue)
        .expect("Failed to register reporter");
    KERNEL
        .register(
            &SAMPLER,
            TaskConfig::new(SAMPLER_PRIO).with_init(Event::new(INIT_SIG, 0)),
            sampler_queue,
        )
        .expect("Failed to register sampler");
    KERNEL
        .register(&HEARTBEAT, TaskConfig::new(HEARTBEAT_PRIO), heartbeat_queue)
        .expect("Failed to register heartbeat");

    let mut port = WaitForInterrupt::new(cp.SYST);
    match KERNEL.run(&mut port) {
        Ok(never) => match never {},
        Err(err) => panic!("scheduler failed to start: {}", err),
    }
}

// ---------------------------------------------------------------------------
// Interrupts
// ---------------------------------------------------------------------------

#[exception]
fn SysTick() {
    static mut TICKS: u32 = 0;
    *TICKS = TICKS.wrapping_add(1);
    let tick = *TICKS;

    KERNEL.isr(SYSTICK_PRIO, |kernel| {
        drop_on_error(kernel.post(SAMPLER_PRIO, SAMPLE_SIG, tick as u16));
        if tick % BEAT_EVERY_TICKS == 0 {
            drop_on_error(kernel.post(HEARTBEAT_PRIO, BEAT_SIG, 0));
        }
    });
}

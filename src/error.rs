//! Error types for the kernel.
//!
//! Bookkeeping errors are returned synchronously to the caller. Nothing is
//! ever unwound through the dispatch loop.

/// Startup configuration errors. These are fatal: they are caught while
/// tasks are being registered, before the scheduler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Another task already owns this priority.
    #[error("priority {0} is already registered")]
    DuplicatePriority(u8),

    /// Priority does not fit in the ready set.
    #[error("priority {priority} is out of range (must be below {max})")]
    PriorityOutOfRange { priority: u8, max: u8 },

    /// Priority 0 belongs to the idle context.
    #[error("priority 0 is reserved for the idle context")]
    ReservedPriority,

    /// Queue storage length is zero or not a power of two.
    #[error("queue capacity {0} is not a non-zero power of two")]
    QueueCapacity(usize),

    /// The task registry is frozen once the scheduler has started.
    #[error("the scheduler has already started")]
    AlreadyStarted,
}

/// Kernel error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Bad registration or start-up sequence.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Event posted to a priority with no registered task.
    #[error("no task registered at priority {0}")]
    UnknownTask(u8),

    /// The target queue is saturated; the event was dropped.
    #[error("event queue of task {0} is full")]
    QueueFull(u8),

    /// A ceiling below the caller's priority voids the inversion guarantee.
    #[error("mutex ceiling {ceiling} is below the current priority {current}")]
    InvalidCeiling { ceiling: u8, current: u8 },
}

/// Kernel result type
pub type Result<T = ()> = core::result::Result<T, Error>;

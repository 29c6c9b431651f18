//! Resilience primitives: retry backoff, process-local kill switch,
//! single-instance lock, and server-clock discipline (spec.md §5, §7).

mod backoff;
mod clock_sync;
mod kill_switch;
mod lock_file;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use clock_sync::ClockSync;
pub use kill_switch::{KillSwitch, KillSwitchState};
pub use lock_file::{InstanceLock, LockError};

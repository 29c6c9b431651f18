//! Process-local shutdown/pause coordination for the orchestrator's loop
//! set (spec.md §5: "Cancellation and shutdown").
//!
//! Grounded on the teacher's `resilience::kill_switch::KillSwitch` — same
//! signal catalogue (SIGTERM graceful, SIGUSR1 emergency, SIGUSR2
//! pause/resume toggle) and atomic state machine. The teacher's watcher
//! threads parked unconditionally for a fixed duration and never actually
//! observed the registered flag; here each watcher polls its
//! `signal_hook`-registered flag in a short loop, the documented way to use
//! `signal_hook::flag::register` outside of signal-handler context.
//!
//! This is a local guard only: the ledger-level pause/resume and kill
//! switch actions named in spec.md §6 ("operator action... sets cooldown or
//! clears it", "trigger kill-switch (emits ShutdownInitiated)") act through
//! events and the reducer, not through this type — this type exists so a
//! `SIGTERM` sent to the process can also ask every orchestrator loop to
//! stop at its next cancellation point.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KillSwitchState {
    Running = 0,
    Paused = 1,
    ShuttingDown = 2,
    EmergencyStop = 3,
}

impl From<u8> for KillSwitchState {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Paused,
            2 => Self::ShuttingDown,
            3 => Self::EmergencyStop,
            _ => Self::Running,
        }
    }
}

#[derive(Clone)]
pub struct KillSwitch {
    state: Arc<AtomicU8>,
    shutdown_reason: Arc<parking_lot::Mutex<Option<String>>>,
    shutdown_time: Arc<parking_lot::Mutex<Option<SystemTime>>>,
}

impl KillSwitch {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(KillSwitchState::Running as u8)),
            shutdown_reason: Arc::new(parking_lot::Mutex::new(None)),
            shutdown_time: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    /// Install SIGTERM/SIGUSR1/SIGUSR2 handlers and return a switch backed
    /// by them. Unix-only; a no-op installer on other platforms.
    pub fn install() -> Self {
        let kill_switch = Self::new();

        #[cfg(unix)]
        {
            Self::watch_signal(signal_hook::consts::SIGTERM, {
                let kill_switch = kill_switch.clone();
                move || kill_switch.shutdown("SIGTERM received")
            });
            Self::watch_signal(signal_hook::consts::SIGUSR1, {
                let kill_switch = kill_switch.clone();
                move || kill_switch.emergency_stop("SIGUSR1 received")
            });
            Self::watch_signal(signal_hook::consts::SIGUSR2, {
                let kill_switch = kill_switch.clone();
                move || kill_switch.toggle_pause()
            });
        }

        kill_switch
    }

    #[cfg(unix)]
    fn watch_signal(signal: i32, on_raised: impl FnOnce() + Send + 'static) {
        let flag = Arc::new(AtomicBool::new(false));
        if let Err(e) = signal_hook::flag::register(signal, flag.clone()) {
            error!(signal, error = %e, "failed to register signal handler");
            return;
        }
        std::thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(100));
            }
            on_raised();
        });
    }

    pub fn should_stop(&self) -> bool {
        matches!(self.state(), KillSwitchState::ShuttingDown | KillSwitchState::EmergencyStop)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state(), KillSwitchState::Paused)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), KillSwitchState::Running)
    }

    pub fn shutdown(&self, reason: &str) {
        info!(reason, "kill switch: graceful shutdown requested");
        self.state.store(KillSwitchState::ShuttingDown as u8, Ordering::Release);
        *self.shutdown_reason.lock() = Some(reason.to_string());
        *self.shutdown_time.lock() = Some(SystemTime::now());
    }

    pub fn emergency_stop(&self, reason: &str) {
        error!(reason, "kill switch: EMERGENCY STOP");
        self.state.store(KillSwitchState::EmergencyStop as u8, Ordering::Release);
        *self.shutdown_reason.lock() = Some(format!("EMERGENCY: {reason}"));
        *self.shutdown_time.lock() = Some(SystemTime::now());
    }

    pub fn pause(&self) {
        if self.is_running() {
            info!("kill switch: pausing");
            self.state.store(KillSwitchState::Paused as u8, Ordering::Release);
        }
    }

    pub fn resume(&self) {
        if self.is_paused() {
            info!("kill switch: resuming");
            self.state.store(KillSwitchState::Running as u8, Ordering::Release);
        }
    }

    pub fn toggle_pause(&self) {
        if self.is_paused() {
            self.resume();
        } else if self.is_running() {
            self.pause();
        }
    }

    pub fn state(&self) -> KillSwitchState {
        self.state.load(Ordering::Acquire).into()
    }

    pub fn shutdown_reason(&self) -> Option<String> {
        self.shutdown_reason.lock().clone()
    }
}

impl Default for KillSwitch {
    fn default() -> Self {
        Self::new()
    }
}

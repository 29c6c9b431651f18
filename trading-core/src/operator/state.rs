//! Shared handle injected into every operator route via `axum::extract::State`.

use crate::event::EventBus;
use crate::resilience::KillSwitch;
use crate::state::StateManager;
use std::sync::Arc;

#[derive(Clone)]
pub struct OperatorState {
    pub state_manager: Arc<StateManager>,
    pub event_bus: Arc<EventBus>,
    pub kill_switch: KillSwitch,
}

impl OperatorState {
    pub fn new(state_manager: Arc<StateManager>, event_bus: Arc<EventBus>, kill_switch: KillSwitch) -> Self {
        Self { state_manager, event_bus, kill_switch }
    }
}

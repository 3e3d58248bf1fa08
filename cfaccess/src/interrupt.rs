use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{Context, Result};

/// Set once the process has been asked to stop. Long-running commands poll
/// it between cycles; a cycle in progress is always finished.
#[derive(Clone, Debug, Default)]
pub struct InterruptState {
    interrupted: Arc<AtomicBool>,
}

impl InterruptState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

pub fn set_up_process_interrupt_handler() -> Result<InterruptState> {
    let interrupt_state = InterruptState::new();
    let handler_state = interrupt_state.clone();
    ctrlc::set_handler(move || {
        tracing::info!("interrupted, stopping after the current cycle");
        handler_state.set_interrupted();
    })
    .context("setting interrupt handler")?;
    Ok(interrupt_state)
}

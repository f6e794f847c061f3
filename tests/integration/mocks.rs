//! Mock adapters for integration tests.
//!
//! Records every event and every save so tests can assert on the full
//! history.

use std::cell::{Cell, RefCell};

use terrahub::app::events::ControllerEvent;
use terrahub::app::ports::{ConfigError, ConfigPort, EventSink};
use terrahub::config::ControllerConfig;

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<ControllerEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&ControllerEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &ControllerEvent) {
        self.events.push(event.clone());
    }
}

// ── MockConfigStore ───────────────────────────────────────────

#[derive(Default)]
pub struct MockConfigStore {
    pub saved: RefCell<Option<ControllerConfig>>,
    pub saves: Cell<usize>,
    pub fail: Cell<bool>,
}

#[allow(dead_code)]
impl MockConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigPort for MockConfigStore {
    fn load(&self) -> Result<ControllerConfig, ConfigError> {
        Ok(self.saved.borrow().clone().unwrap_or_default())
    }

    fn save(&self, config: &ControllerConfig) -> Result<(), ConfigError> {
        if self.fail.get() {
            return Err(ConfigError::IoError);
        }
        if !config.validate().valid {
            return Err(ConfigError::ValidationFailed);
        }
        *self.saved.borrow_mut() = Some(config.clone());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

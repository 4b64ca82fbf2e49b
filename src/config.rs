use crate::error::{CrackError, Result};

/// Candidates tested between two progress events.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 500;

/// Tunables for an [`AttackController`](crate::attack::AttackController).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackConfig {
    /// Emit a progress event every this many tested candidates. Must be > 0.
    pub progress_interval: u64,
    /// Count the wordlist lines before starting so progress carries a
    /// percentage.
    pub prescan: bool,
    /// Capacity of the event channel. `None` buffers without limit;
    /// `Some(0)` makes every event a rendezvous with the consumer.
    pub event_capacity: Option<usize>,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            prescan: true,
            event_capacity: None,
        }
    }
}

impl AttackConfig {
    pub fn validate(&self) -> Result<()> {
        if self.progress_interval == 0 {
            return Err(CrackError::InvalidConfig(
                "progress interval must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_prescan(mut self, prescan: bool) -> Self {
        self.prescan = prescan;
        self
    }

    pub fn with_event_capacity(mut self, capacity: Option<usize>) -> Self {
        self.event_capacity = capacity;
        self
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CobError, Result};

/// Knobs that size a close-of-business cycle.
///
/// All fields carry defaults so deployments only override what they need.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of account IDs per page.
    pub page_size: usize,
    /// Pages worked on at the same time. Defaults to the CPU count.
    pub max_parallel_pages: usize,
    /// Accounts inside one page worked on at the same time.
    pub max_parallel_accounts: usize,
    /// Time limit for a single step on a single account (milliseconds).
    pub step_timeout_ms: u64,
    /// Buffer size of the in-process event channels.
    pub event_bus_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_parallel_pages: num_cpus::get().max(1),
            max_parallel_accounts: 4,
            step_timeout_ms: 30_000,
            event_bus_capacity: 1024,
        }
    }
}

impl PipelineConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        let zero = [
            ("page_size", self.page_size == 0),
            ("max_parallel_pages", self.max_parallel_pages == 0),
            ("max_parallel_accounts", self.max_parallel_accounts == 0),
            ("step_timeout_ms", self.step_timeout_ms == 0),
            ("event_bus_capacity", self.event_bus_capacity == 0),
        ];
        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((field, _)) => Err(CobError::Configuration(format!(
                "{field} must be greater than zero"
            ))),
            None => Ok(()),
        }
    }
}

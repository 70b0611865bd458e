use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::Result;

use super::config::PipelineConfig;
use super::events::{CobEvent, CycleEvent, CycleEventPublisher, EventNotifier};

/// In-process event bus that fans out domain and cycle notifications to
/// observers inside the runtime. Events sent without subscribers are
/// dropped.
#[derive(Debug)]
pub struct InProcCobEventBus {
    sender: broadcast::Sender<CobEvent>,
    cycle_sender: broadcast::Sender<CycleEvent>,
}

impl InProcCobEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        let (cycle_sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            cycle_sender,
        }
    }

    /// Bus whose channels hold `event_bus_capacity` undelivered events.
    /// Slow subscribers past that lag and lose the oldest ones.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.event_bus_capacity)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CobEvent> {
        self.sender.subscribe()
    }

    pub fn subscribe_cycles(&self) -> broadcast::Receiver<CycleEvent> {
        self.cycle_sender.subscribe()
    }
}

impl Default for InProcCobEventBus {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

#[async_trait]
impl EventNotifier for InProcCobEventBus {
    async fn publish(&self, event: CobEvent) -> Result<()> {
        let _ = self.sender.send(event);
        Ok(())
    }
}

#[async_trait]
impl CycleEventPublisher for InProcCobEventBus {
    async fn publish_cycle(&self, event: CycleEvent) -> Result<()> {
        let _ = self.cycle_sender.send(event);
        Ok(())
    }
}

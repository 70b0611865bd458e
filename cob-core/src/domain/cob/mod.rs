//! Close-of-business cycle: partitioning, step pipeline and the ports it
//! runs against.

pub mod business_date;
pub mod config;
pub mod driver;
pub mod event_bus;
pub mod events;
pub mod in_memory;
pub mod lock;
pub mod partition;
pub mod pipeline;
pub mod report;
pub mod step;
pub mod store;

pub use business_date::{BusinessDateSource, FixedBusinessDate};
pub use config::PipelineConfig;
pub use driver::CloseOfBusinessDriver;
pub use event_bus::InProcCobEventBus;
pub use events::{
    CobEvent, CobEventPayload, CycleEvent, CycleEventPayload,
    CycleEventPublisher, EventMeta, EventNotifier,
};
pub use in_memory::{InMemoryAccountTransaction, InMemoryCobStore};
pub use lock::{
    AccountLock, AccountLockRepository, InMemoryAccountLockRepository,
    LockOwner,
};
pub use partition::{Page, partition};
pub use pipeline::{CycleContext, StepList, StepPipeline};
pub use report::{
    AccountFailure, AccountOutcome, AccountResult, CycleReport, PageFailure,
};
pub use step::{BusinessStep, StepContext, StepOutcome};
pub use store::{AccountLoader, AccountStore, AccountTransaction};

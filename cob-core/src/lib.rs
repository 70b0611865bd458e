//! # COB Core
//!
//! Close-of-business engine for loan portfolios. Once per business date
//! every eligible loan account is walked through an ordered list of
//! business steps inside its own transaction, with concurrency bounded per
//! page of accounts.
//!
//! ## Overview
//!
//! - **Partitioning**: [`domain::cob::partition`] splits the ascending id
//!   list into contiguous pages
//! - **Step pipeline**: [`domain::cob::StepPipeline`] runs steps per
//!   account with rollback on failure, per-step timeouts and cancellation
//! - **Ownership transfers**: [`domain::investor`] settles pending sales
//!   and buybacks of loans sold to external asset owners
//! - **Event ordering**: [`domain::ordering`] gives a deterministic
//!   chronological order for financial events
//! - **Delinquency**: [`domain::delinquency`] validates pause and resume
//!   actions and derives the effective pause periods
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cob_core::domain::cob::{
//!     CloseOfBusinessDriver, FixedBusinessDate, InMemoryAccountLockRepository,
//!     InMemoryCobStore, InProcCobEventBus, PipelineConfig, StepPipeline,
//! };
//! use cob_core::domain::investor::OwnershipTransferStep;
//! use cob_model::chrono::NaiveDate;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn close_today() -> cob_core::Result<()> {
//!     let store = Arc::new(InMemoryCobStore::default());
//!     let config = PipelineConfig::default();
//!     let bus = Arc::new(InProcCobEventBus::from_config(&config));
//!     let pipeline = StepPipeline::new(
//!         store.clone(),
//!         store.clone(),
//!         Arc::new(InMemoryAccountLockRepository::default()),
//!         bus.clone(),
//!         config,
//!     )
//!     .with_cycle_events(bus);
//!     let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap_or_default();
//!     let driver = CloseOfBusinessDriver::new(
//!         pipeline,
//!         store,
//!         Arc::new(FixedBusinessDate::new(today)),
//!         vec![Arc::new(OwnershipTransferStep::default())],
//!     );
//!     let report = driver.run_cycle(CancellationToken::new()).await?;
//!     println!("closed {} accounts", report.processed());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Close-of-business domain modules
pub mod domain;

/// Error types and error handling utilities
pub mod error;

pub use error::{CobError, ErrorKind, Result};

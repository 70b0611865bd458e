//! Delinquency pause/resume rules.
//!
//! A pause stops delinquency aging for a date range; a resume ends the
//! pause it falls into early. Validation runs against the *effective*
//! pauses, i.e. the stored pauses with resumes applied.

pub mod effective;
pub mod repository;
pub mod service;
pub mod validator;

pub use effective::{EffectivePause, effective_pauses};
pub use repository::{
    DelinquencyActionRepository, InMemoryDelinquencyActionRepository,
};
pub use service::DelinquencyActionService;
pub use validator::{DelinquencyValidationError, validate};

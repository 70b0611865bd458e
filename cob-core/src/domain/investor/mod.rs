//! External asset owner (investor) transfers.

pub mod repository;
pub mod state_machine;
pub mod step;

pub use repository::{LoanOwnerMappingRepository, TransferRepository};
pub use state_machine::{OwnershipTransferStateMachine, TransferIntent};
pub use step::OwnershipTransferStep;

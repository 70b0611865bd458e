//! Ports between the cycle and the system of record.

use async_trait::async_trait;
use chrono::NaiveDate;
use cob_model::{Loan, LoanId};

use crate::Result;
use crate::domain::investor::repository::{
    LoanOwnerMappingRepository, TransferRepository,
};

/// Reads the accounts a cycle works on.
#[async_trait]
pub trait AccountLoader: Send + Sync {
    /// IDs of every account the daily cycle applies to, distinct and
    /// ascending.
    async fn eligible_ids(&self) -> Result<Vec<LoanId>>;

    /// Eligible IDs inside `[min, max]`, ascending.
    async fn ids_in_range(&self, min: LoanId, max: LoanId)
    -> Result<Vec<LoanId>>;

    /// Fails with [`CobError::NotFound`](crate::CobError::NotFound) for
    /// unknown IDs.
    async fn load(&self, loan_id: LoanId) -> Result<Loan>;

    /// Earliest last-closed business date among eligible accounts.
    async fn oldest_closed_business_date(&self) -> Result<Option<NaiveDate>>;
}

/// All writes for one account during one cycle.
///
/// Reads through the transaction see its own uncommitted writes.
#[async_trait]
pub trait AccountTransaction: Send + Sync {
    fn loan_id(&self) -> LoanId;

    fn transfers(&self) -> &dyn TransferRepository;

    fn owner_mappings(&self) -> &dyn LoanOwnerMappingRepository;

    /// Record that the cycle for `business_date` completed for the account.
    async fn mark_closed(&self, business_date: NaiveDate) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Opens per-account transactions.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn begin(&self, loan_id: LoanId) -> Result<Box<dyn AccountTransaction>>;
}

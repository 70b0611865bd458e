use async_trait::async_trait;
use chrono::NaiveDate;
use cob_model::{
    LoanId, LoanOwnerMapping, OwnerId, OwnershipTransfer, TransferId,
    TransferStatus,
};

use crate::Result;

/// Storage port for ownership transfer records.
#[async_trait]
pub trait TransferRepository: Send + Sync {
    /// Records of `loan_id` settling on `settlement_date` whose status is in
    /// `statuses` and that are still in effect after that date, ordered by
    /// ascending record id.
    async fn find_by_loan_and_date_and_status_in(
        &self,
        loan_id: LoanId,
        settlement_date: NaiveDate,
        statuses: &[TransferStatus],
    ) -> Result<Vec<OwnershipTransfer>>;

    /// The ACTIVE, open-ended record of `owner` on `loan_id`, if any.
    async fn find_active_open_ended(
        &self,
        loan_id: LoanId,
        owner: &OwnerId,
    ) -> Result<Option<OwnershipTransfer>>;

    /// Insert (no id) or update (id set) a record and return it as stored.
    async fn save(&self, transfer: OwnershipTransfer)
    -> Result<OwnershipTransfer>;
}

/// Storage port for the loan to current-owner link.
#[async_trait]
pub trait LoanOwnerMappingRepository: Send + Sync {
    async fn save_mapping(&self, mapping: LoanOwnerMapping) -> Result<()>;

    async fn delete_mapping(
        &self,
        loan_id: LoanId,
        transfer_id: TransferId,
    ) -> Result<()>;

    async fn find_mapping(
        &self,
        loan_id: LoanId,
    ) -> Result<Option<LoanOwnerMapping>>;
}

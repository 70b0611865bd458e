use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use cob_model::{
    Loan, LoanId, LoanOwnerMapping, OwnerId, OwnershipTransfer, TransferId,
    TransferStatus,
};
use tokio::sync::Mutex;

use crate::domain::investor::repository::{
    LoanOwnerMappingRepository, TransferRepository,
};
use crate::error::{CobError, Result};

use super::store::{AccountLoader, AccountStore, AccountTransaction};

#[derive(Debug, Default)]
struct StoreState {
    loans: BTreeMap<LoanId, Loan>,
    transfers: BTreeMap<TransferId, OwnershipTransfer>,
    mappings: HashMap<LoanId, LoanOwnerMapping>,
}

/// Loans, transfers and owner mappings held in memory with per-account
/// transactions on top.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCobStore {
    state: Arc<Mutex<StoreState>>,
    next_transfer_id: Arc<AtomicI64>,
}

impl InMemoryCobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_loan(&self, loan: Loan) {
        let mut guard = self.state.lock().await;
        guard.loans.insert(loan.id, loan);
    }

    pub async fn loan(&self, loan_id: LoanId) -> Option<Loan> {
        let guard = self.state.lock().await;
        guard.loans.get(&loan_id).cloned()
    }

    /// Store a transfer outside any transaction, as an upstream booking
    /// would.
    pub async fn insert_transfer(
        &self,
        mut transfer: OwnershipTransfer,
    ) -> OwnershipTransfer {
        if transfer.id.is_none() {
            transfer.id = Some(self.allocate_id());
        }
        let mut guard = self.state.lock().await;
        if let Some(id) = transfer.id {
            guard.transfers.insert(id, transfer.clone());
        }
        transfer
    }

    /// Every committed transfer of the loan, by ascending id.
    pub async fn transfers_for(&self, loan_id: LoanId) -> Vec<OwnershipTransfer> {
        let guard = self.state.lock().await;
        guard
            .transfers
            .values()
            .filter(|transfer| transfer.loan_id == loan_id)
            .cloned()
            .collect()
    }

    pub async fn mapping(&self, loan_id: LoanId) -> Option<LoanOwnerMapping> {
        let guard = self.state.lock().await;
        guard.mappings.get(&loan_id).cloned()
    }

    fn allocate_id(&self) -> TransferId {
        TransferId(self.next_transfer_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl AccountLoader for InMemoryCobStore {
    async fn eligible_ids(&self) -> Result<Vec<LoanId>> {
        let guard = self.state.lock().await;
        Ok(guard
            .loans
            .values()
            .filter(|loan| loan.status.is_cob_eligible())
            .map(|loan| loan.id)
            .collect())
    }

    async fn ids_in_range(
        &self,
        min: LoanId,
        max: LoanId,
    ) -> Result<Vec<LoanId>> {
        let guard = self.state.lock().await;
        Ok(guard
            .loans
            .range(min..=max)
            .filter(|(_, loan)| loan.status.is_cob_eligible())
            .map(|(id, _)| *id)
            .collect())
    }

    async fn load(&self, loan_id: LoanId) -> Result<Loan> {
        let guard = self.state.lock().await;
        guard
            .loans
            .get(&loan_id)
            .cloned()
            .ok_or_else(|| CobError::NotFound(format!("loan {loan_id}")))
    }

    async fn oldest_closed_business_date(&self) -> Result<Option<NaiveDate>> {
        let guard = self.state.lock().await;
        Ok(guard
            .loans
            .values()
            .filter(|loan| loan.status.is_cob_eligible())
            .filter_map(|loan| loan.last_closed_business_date)
            .min())
    }
}

#[async_trait]
impl AccountStore for InMemoryCobStore {
    async fn begin(
        &self,
        loan_id: LoanId,
    ) -> Result<Box<dyn AccountTransaction>> {
        Ok(Box::new(InMemoryAccountTransaction {
            loan_id,
            store: self.clone(),
            staged: Mutex::new(Staged::default()),
        }))
    }
}

#[derive(Debug, Default)]
struct Staged {
    transfers: BTreeMap<TransferId, OwnershipTransfer>,
    /// `None` marks a deleted mapping.
    mapping: Option<Option<LoanOwnerMapping>>,
    closed_on: Option<NaiveDate>,
}

/// Buffers writes for one account until commit.
#[derive(Debug)]
pub struct InMemoryAccountTransaction {
    loan_id: LoanId,
    store: InMemoryCobStore,
    staged: Mutex<Staged>,
}

impl InMemoryAccountTransaction {
    fn ensure_own_loan(&self, loan_id: LoanId) -> Result<()> {
        if loan_id == self.loan_id {
            Ok(())
        } else {
            Err(CobError::InvalidArgument(format!(
                "transaction for loan {} cannot touch loan {loan_id}",
                self.loan_id
            )))
        }
    }

    /// Committed transfers of the loan overlaid with staged writes.
    async fn merged_transfers(&self) -> BTreeMap<TransferId, OwnershipTransfer> {
        let mut merged: BTreeMap<TransferId, OwnershipTransfer> = {
            let guard = self.store.state.lock().await;
            guard
                .transfers
                .iter()
                .filter(|(_, transfer)| transfer.loan_id == self.loan_id)
                .map(|(id, transfer)| (*id, transfer.clone()))
                .collect()
        };
        let staged = self.staged.lock().await;
        for (id, transfer) in &staged.transfers {
            merged.insert(*id, transfer.clone());
        }
        merged
    }
}

fn conflicting_active(
    candidate: &OwnershipTransfer,
    others: impl IntoIterator<Item = (TransferId, OwnershipTransfer)>,
) -> Option<TransferId> {
    if !candidate.is_active_open_ended() {
        return None;
    }
    others
        .into_iter()
        .find(|(id, other)| {
            Some(*id) != candidate.id
                && other.loan_id == candidate.loan_id
                && other.owner == candidate.owner
                && other.is_active_open_ended()
        })
        .map(|(id, _)| id)
}

#[async_trait]
impl TransferRepository for InMemoryAccountTransaction {
    async fn find_by_loan_and_date_and_status_in(
        &self,
        loan_id: LoanId,
        settlement_date: NaiveDate,
        statuses: &[TransferStatus],
    ) -> Result<Vec<OwnershipTransfer>> {
        self.ensure_own_loan(loan_id)?;
        Ok(self
            .merged_transfers()
            .await
            .into_values()
            .filter(|transfer| {
                transfer.settlement_date == settlement_date
                    && transfer.effective_date_to > settlement_date
                    && statuses.contains(&transfer.status)
            })
            .collect())
    }

    async fn find_active_open_ended(
        &self,
        loan_id: LoanId,
        owner: &OwnerId,
    ) -> Result<Option<OwnershipTransfer>> {
        self.ensure_own_loan(loan_id)?;
        Ok(self
            .merged_transfers()
            .await
            .into_values()
            .find(|transfer| {
                &transfer.owner == owner && transfer.is_active_open_ended()
            }))
    }

    async fn save(
        &self,
        mut transfer: OwnershipTransfer,
    ) -> Result<OwnershipTransfer> {
        self.ensure_own_loan(transfer.loan_id)?;
        let merged = self.merged_transfers().await;
        if let Some(existing) = conflicting_active(&transfer, merged) {
            return Err(CobError::InconsistentState(format!(
                "loan {} already has active transfer {existing} for owner {}",
                transfer.loan_id, transfer.owner
            )));
        }

        let id = match transfer.id {
            Some(id) => id,
            None => self.store.allocate_id(),
        };
        transfer.id = Some(id);
        let mut staged = self.staged.lock().await;
        staged.transfers.insert(id, transfer.clone());
        Ok(transfer)
    }
}

#[async_trait]
impl LoanOwnerMappingRepository for InMemoryAccountTransaction {
    async fn save_mapping(&self, mapping: LoanOwnerMapping) -> Result<()> {
        self.ensure_own_loan(mapping.loan_id)?;
        let mut staged = self.staged.lock().await;
        staged.mapping = Some(Some(mapping));
        Ok(())
    }

    async fn delete_mapping(
        &self,
        loan_id: LoanId,
        transfer_id: TransferId,
    ) -> Result<()> {
        self.ensure_own_loan(loan_id)?;
        let current = self.find_mapping(loan_id).await?;
        if current.is_some_and(|mapping| mapping.transfer_id == transfer_id) {
            let mut staged = self.staged.lock().await;
            staged.mapping = Some(None);
        }
        Ok(())
    }

    async fn find_mapping(
        &self,
        loan_id: LoanId,
    ) -> Result<Option<LoanOwnerMapping>> {
        self.ensure_own_loan(loan_id)?;
        {
            let staged = self.staged.lock().await;
            if let Some(mapping) = &staged.mapping {
                return Ok(mapping.clone());
            }
        }
        let guard = self.store.state.lock().await;
        Ok(guard.mappings.get(&loan_id).cloned())
    }
}

#[async_trait]
impl AccountTransaction for InMemoryAccountTransaction {
    fn loan_id(&self) -> LoanId {
        self.loan_id
    }

    fn transfers(&self) -> &dyn TransferRepository {
        self
    }

    fn owner_mappings(&self) -> &dyn LoanOwnerMappingRepository {
        self
    }

    async fn mark_closed(&self, business_date: NaiveDate) -> Result<()> {
        let mut staged = self.staged.lock().await;
        staged.closed_on = Some(business_date);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        let loan_id = this.loan_id;
        let staged = this.staged.into_inner();
        let mut guard = this.store.state.lock().await;
        let state = &mut *guard;

        // Records committed by other runs since this transaction read them.
        for transfer in staged.transfers.values() {
            let committed = state
                .transfers
                .iter()
                .filter(|(id, _)| !staged.transfers.contains_key(id))
                .map(|(id, other)| (*id, other.clone()));
            if let Some(existing) = conflicting_active(transfer, committed) {
                return Err(CobError::InconsistentState(format!(
                    "loan {loan_id} gained active transfer {existing} \
                     concurrently"
                )));
            }
        }
        let closing = match staged.closed_on {
            Some(date) => match state.loans.get_mut(&loan_id) {
                Some(loan) => Some((loan, date)),
                None => {
                    return Err(CobError::NotFound(format!("loan {loan_id}")));
                }
            },
            None => None,
        };

        // Nothing below can fail.
        if let Some((loan, date)) = closing {
            loan.last_closed_business_date = Some(date);
        }
        state.transfers.extend(staged.transfers);
        match staged.mapping {
            Some(Some(mapping)) => {
                state.mappings.insert(loan_id, mapping);
            }
            Some(None) => {
                state.mappings.remove(&loan_id);
            }
            None => {}
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

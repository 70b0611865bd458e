use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use cob_model::LoanId;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{CobError, Result};

/// Kind of run holding an account lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockOwner {
    /// Scheduled, partitioned cycle.
    ChunkProcessing,
    /// Cycle started for explicitly named accounts.
    InlineProcessing,
}

impl LockOwner {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockOwner::ChunkProcessing => "LOAN_COB_CHUNK_PROCESSING",
            LockOwner::InlineProcessing => "LOAN_INLINE_COB_PROCESSING",
        }
    }
}

impl fmt::Display for LockOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLock {
    pub loan_id: LoanId,
    pub owner: LockOwner,
    pub business_date: NaiveDate,
    pub placed_at: DateTime<Utc>,
    /// Set when the run holding the lock failed on this account.
    pub error: Option<String>,
}

impl AccountLock {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Keeps two runs from working on the same account at once.
///
/// A lock left behind by a failed run carries the error and may be taken
/// over by the next run.
#[async_trait]
pub trait AccountLockRepository: Send + Sync {
    /// Place a lock or take over a failed one. Fails with
    /// [`CobError::Locked`] while another run holds a healthy lock.
    async fn acquire(
        &self,
        loan_id: LoanId,
        owner: LockOwner,
        business_date: NaiveDate,
    ) -> Result<AccountLock>;

    async fn release(&self, loan_id: LoanId, owner: LockOwner) -> Result<()>;

    async fn record_failure(
        &self,
        loan_id: LoanId,
        owner: LockOwner,
        message: String,
    ) -> Result<()>;

    async fn find(&self, loan_id: LoanId) -> Result<Option<AccountLock>>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryAccountLockRepository {
    locks: Arc<Mutex<HashMap<LoanId, AccountLock>>>,
}

impl InMemoryAccountLockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn held(&self) -> Vec<AccountLock> {
        let guard = self.locks.lock().await;
        let mut locks: Vec<_> = guard.values().cloned().collect();
        locks.sort_by_key(|lock| lock.loan_id);
        locks
    }
}

#[async_trait]
impl AccountLockRepository for InMemoryAccountLockRepository {
    async fn acquire(
        &self,
        loan_id: LoanId,
        owner: LockOwner,
        business_date: NaiveDate,
    ) -> Result<AccountLock> {
        let mut guard = self.locks.lock().await;
        if let Some(existing) = guard.get(&loan_id)
            && !existing.is_failed()
        {
            return Err(CobError::Locked {
                loan_id,
                owner: existing.owner.to_string(),
            });
        }

        let lock = AccountLock {
            loan_id,
            owner,
            business_date,
            placed_at: Utc::now(),
            error: None,
        };
        guard.insert(loan_id, lock.clone());
        Ok(lock)
    }

    async fn release(&self, loan_id: LoanId, owner: LockOwner) -> Result<()> {
        let mut guard = self.locks.lock().await;
        if guard.get(&loan_id).is_some_and(|lock| lock.owner == owner) {
            guard.remove(&loan_id);
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        loan_id: LoanId,
        owner: LockOwner,
        message: String,
    ) -> Result<()> {
        let mut guard = self.locks.lock().await;
        match guard.get_mut(&loan_id) {
            Some(lock) if lock.owner == owner => {
                lock.error = Some(message);
                Ok(())
            }
            _ => Err(CobError::NotFound(format!(
                "no {owner} lock on account {loan_id}"
            ))),
        }
    }

    async fn find(&self, loan_id: LoanId) -> Result<Option<AccountLock>> {
        let guard = self.locks.lock().await;
        Ok(guard.get(&loan_id).cloned())
    }
}

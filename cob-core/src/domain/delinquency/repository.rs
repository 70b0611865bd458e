use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cob_model::{DelinquencyAction, DelinquencyActionId, LoanId};
use tokio::sync::Mutex;

use crate::Result;

/// Storage port for delinquency pause/resume history.
#[async_trait]
pub trait DelinquencyActionRepository: Send + Sync {
    /// All actions recorded for the loan, in insertion order.
    async fn history(&self, loan_id: LoanId) -> Result<Vec<DelinquencyAction>>;

    /// Store a new action, assigning its id and creation timestamp.
    async fn save(&self, action: DelinquencyAction) -> Result<DelinquencyAction>;
}

#[derive(Debug, Default)]
struct DelinquencyState {
    next_id: i64,
    actions: HashMap<LoanId, Vec<DelinquencyAction>>,
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryDelinquencyActionRepository {
    state: Arc<Mutex<DelinquencyState>>,
}

impl InMemoryDelinquencyActionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DelinquencyActionRepository for InMemoryDelinquencyActionRepository {
    async fn history(&self, loan_id: LoanId) -> Result<Vec<DelinquencyAction>> {
        let guard = self.state.lock().await;
        Ok(guard.actions.get(&loan_id).cloned().unwrap_or_default())
    }

    async fn save(
        &self,
        mut action: DelinquencyAction,
    ) -> Result<DelinquencyAction> {
        let mut guard = self.state.lock().await;
        guard.next_id += 1;
        action.id = Some(DelinquencyActionId(guard.next_id));
        action.created_at.get_or_insert_with(Utc::now);
        guard
            .actions
            .entry(action.loan_id)
            .or_default()
            .push(action.clone());
        Ok(action)
    }
}

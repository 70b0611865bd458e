//! Splits the eligible account-ID space into contiguous, bounded pages.

use cob_model::LoanId;
use serde::{Deserialize, Serialize};

use crate::error::{CobError, Result};

/// Inclusive ID range worked on as one unit by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    pub index: usize,
    pub min_id: LoanId,
    pub max_id: LoanId,
    /// Number of eligible IDs inside the range when the page was computed.
    pub count: usize,
}

impl Page {
    pub fn contains(&self, id: LoanId) -> bool {
        self.min_id <= id && id <= self.max_id
    }
}

/// Cut `ids` (distinct, ascending) into pages of `page_size` IDs.
///
/// Every page except possibly the last holds exactly `page_size` IDs and
/// pages never overlap. No IDs yields no pages.
pub fn partition(ids: &[LoanId], page_size: usize) -> Result<Vec<Page>> {
    if page_size == 0 {
        return Err(CobError::InvalidArgument(
            "page size must be greater than zero".into(),
        ));
    }

    let mut pages = Vec::with_capacity(ids.len().div_ceil(page_size));
    let mut previous: Option<LoanId> = None;

    for (offset, id) in ids.iter().copied().enumerate() {
        if let Some(prev) = previous
            && id <= prev
        {
            return Err(CobError::InvalidArgument(format!(
                "account ids must be distinct and ascending; {id} follows {prev}"
            )));
        }
        previous = Some(id);

        if offset % page_size == 0 {
            pages.push(Page {
                index: pages.len(),
                min_id: id,
                max_id: id,
                count: 1,
            });
        } else if let Some(page) = pages.last_mut() {
            page.max_id = id;
            page.count += 1;
        }
    }

    Ok(pages)
}

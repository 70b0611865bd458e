use std::sync::{Arc, RwLock};

use chrono::NaiveDate;

/// Supplies the platform business date. Steps never read the wall clock.
pub trait BusinessDateSource: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Business date held in memory and moved forward explicitly.
#[derive(Debug, Clone)]
pub struct FixedBusinessDate {
    date: Arc<RwLock<NaiveDate>>,
}

impl FixedBusinessDate {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: Arc::new(RwLock::new(date)),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        let mut guard = match self.date.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = date;
    }
}

impl BusinessDateSource for FixedBusinessDate {
    fn today(&self) -> NaiveDate {
        match self.date.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

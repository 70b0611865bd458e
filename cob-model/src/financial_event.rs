use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

/// Dates every financial event is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventDates {
    pub effective_date: NaiveDate,
    pub submitted_on: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
}

impl EventDates {
    pub fn effective(effective_date: NaiveDate) -> Self {
        Self {
            effective_date,
            submitted_on: None,
            created_at: None,
        }
    }

    pub fn submitted(mut self, submitted_on: NaiveDate) -> Self {
        self.submitted_on = Some(submitted_on);
        self
    }

    pub fn created(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum FinancialEventKind {
    TermVariation,
    Charge,
    Transaction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChargeEvent {
    pub charge_id: i64,
    pub amount: Decimal,
    pub dates: EventDates,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransactionEvent {
    pub transaction_id: i64,
    pub transaction_type: String,
    pub amount: Decimal,
    pub dates: EventDates,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TermVariationEvent {
    pub variation_id: i64,
    pub term_type: String,
    pub dates: EventDates,
}

/// Heterogeneous activity on a loan that has to be replayed in
/// chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum FinancialEvent {
    Charge(ChargeEvent),
    Transaction(TransactionEvent),
    TermVariation(TermVariationEvent),
}

impl FinancialEvent {
    pub fn kind(&self) -> FinancialEventKind {
        match self {
            FinancialEvent::Charge(_) => FinancialEventKind::Charge,
            FinancialEvent::Transaction(_) => FinancialEventKind::Transaction,
            FinancialEvent::TermVariation(_) => {
                FinancialEventKind::TermVariation
            }
        }
    }

    /// Key of the underlying charge, transaction or term variation.
    pub fn record_id(&self) -> i64 {
        match self {
            FinancialEvent::Charge(charge) => charge.charge_id,
            FinancialEvent::Transaction(txn) => txn.transaction_id,
            FinancialEvent::TermVariation(variation) => variation.variation_id,
        }
    }

    /// Money moved by the event. Term variations carry none.
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            FinancialEvent::Charge(charge) => Some(charge.amount),
            FinancialEvent::Transaction(txn) => Some(txn.amount),
            FinancialEvent::TermVariation(_) => None,
        }
    }

    /// Transaction type or term type; empty for charges.
    pub fn type_label(&self) -> &str {
        match self {
            FinancialEvent::Charge(_) => "",
            FinancialEvent::Transaction(txn) => &txn.transaction_type,
            FinancialEvent::TermVariation(variation) => &variation.term_type,
        }
    }

    pub fn dates(&self) -> &EventDates {
        match self {
            FinancialEvent::Charge(charge) => &charge.dates,
            FinancialEvent::Transaction(txn) => &txn.dates,
            FinancialEvent::TermVariation(variation) => &variation.dates,
        }
    }

    pub fn effective_date(&self) -> NaiveDate {
        self.dates().effective_date
    }

    pub fn submitted_on(&self) -> Option<NaiveDate> {
        self.dates().submitted_on
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.dates().created_at
    }
}

impl From<ChargeEvent> for FinancialEvent {
    fn from(value: ChargeEvent) -> Self {
        FinancialEvent::Charge(value)
    }
}

impl From<TransactionEvent> for FinancialEvent {
    fn from(value: TransactionEvent) -> Self {
        FinancialEvent::Transaction(value)
    }
}

impl From<TermVariationEvent> for FinancialEvent {
    fn from(value: TermVariationEvent) -> Self {
        FinancialEvent::TermVariation(value)
    }
}

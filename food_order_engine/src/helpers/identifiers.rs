use chrono::{DateTime, Utc};
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Payment,
    Refund,
}

impl TransactionKind {
    fn prefix(&self) -> &'static str {
        match self {
            TransactionKind::Payment => "PAY",
            TransactionKind::Refund => "RFD",
        }
    }
}

/// A human-readable order number: the creation time to the second, followed by six random digits.
///
/// Uniqueness is enforced by the database. Callers retry with a fresh number on collision.
pub fn new_order_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{}{suffix:06}", now.format("%Y%m%d%H%M%S"))
}

/// A reference for a gateway transaction, e.g. `PAY20240501110000123` followed by eight random digits.
pub fn new_transaction_id(kind: TransactionKind, now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..100_000_000);
    format!("{}{}{suffix:08}", kind.prefix(), now.format("%Y%m%d%H%M%S%3f"))
}

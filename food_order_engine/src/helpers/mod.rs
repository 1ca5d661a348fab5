mod amounts;
mod delivery_time;
mod identifiers;

pub use amounts::{compute_totals, line_subtotal, verify_declared, AmountError, OrderTotals};
pub use delivery_time::{resolve_delivery_time, DeliveryTime, DeliveryTimeError};
pub use identifiers::{new_order_number, new_transaction_id, TransactionKind};

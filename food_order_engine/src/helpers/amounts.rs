//! Exact money arithmetic for orders.
//!
//! Totals are always recomputed from authoritative prices and then compared, by exact decimal equality, with the
//! amounts the client declared. There is no rounding tolerance.
use order_common::Money;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Quantity for dish {dish_id} must be a positive integer, but was {quantity}")]
    InvalidQuantity { dish_id: i64, quantity: i64 },
    #[error("Amount overflow while computing the {0}")]
    Overflow(&'static str),
    #[error("The declared {field} ({declared}) does not match the computed {field} ({computed})")]
    Mismatch { field: &'static str, declared: Money, computed: Money },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total: Money,
}

/// `price × quantity`, exactly. The quantity must be strictly positive.
pub fn line_subtotal(dish_id: i64, price: Money, quantity: i64) -> Result<Money, AmountError> {
    if quantity <= 0 {
        return Err(AmountError::InvalidQuantity { dish_id, quantity });
    }
    price.checked_mul_qty(quantity).ok_or(AmountError::Overflow("line subtotal"))
}

/// Sums the line subtotals and adds the delivery fee.
pub fn compute_totals<I>(line_subtotals: I, delivery_fee: Money) -> Result<OrderTotals, AmountError>
where I: IntoIterator<Item = Money> {
    let subtotal = line_subtotals
        .into_iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line))
        .ok_or(AmountError::Overflow("subtotal"))?;
    let total = subtotal.checked_add(delivery_fee).ok_or(AmountError::Overflow("total"))?;
    Ok(OrderTotals { subtotal, delivery_fee, total })
}

pub fn verify_declared(field: &'static str, declared: Money, computed: Money) -> Result<(), AmountError> {
    if declared == computed {
        Ok(())
    } else {
        Err(AmountError::Mismatch { field, declared, computed })
    }
}

#[cfg(test)]
mod test {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;

    fn m(d: Decimal) -> Money {
        Money::from(d)
    }

    #[test]
    fn happy_path_totals() {
        let line = line_subtotal(1, m(dec!(20.00)), 2).unwrap();
        assert_eq!(line, m(dec!(40.00)));
        let totals = compute_totals([line], m(dec!(5.00))).unwrap();
        assert_eq!(totals.subtotal, m(dec!(40.00)));
        assert_eq!(totals.total, m(dec!(45.00)));
        assert!(verify_declared("total", m(dec!(45.00)), totals.total).is_ok());
        assert!(verify_declared("total", m(dec!(45)), totals.total).is_ok());
    }

    #[test]
    fn one_cent_off_is_rejected() {
        let totals = compute_totals([m(dec!(40.00))], m(dec!(5.00))).unwrap();
        for declared in [dec!(44.99), dec!(45.01), dec!(45.001)] {
            let err = verify_declared("total", m(declared), totals.total).unwrap_err();
            assert!(matches!(err, AmountError::Mismatch { field: "total", .. }));
        }
    }

    #[test]
    fn no_float_drift() {
        let lines = (0..10).map(|_| line_subtotal(9, m(dec!(0.10)), 1).unwrap());
        let totals = compute_totals(lines, Money::zero()).unwrap();
        assert_eq!(totals.subtotal, m(dec!(1.00)));
        let lines = [line_subtotal(1, m(dec!(0.1)), 3).unwrap()];
        assert_eq!(compute_totals(lines, Money::zero()).unwrap().total, m(dec!(0.3)));
    }

    #[test]
    fn quantities_must_be_positive() {
        assert_eq!(
            line_subtotal(4, m(dec!(1.00)), 0),
            Err(AmountError::InvalidQuantity { dish_id: 4, quantity: 0 })
        );
        assert!(line_subtotal(4, m(dec!(1.00)), -3).is_err());
    }

    #[test]
    fn overflow_is_an_error() {
        assert_eq!(line_subtotal(1, m(Decimal::MAX), 2), Err(AmountError::Overflow("line subtotal")));
        let err = compute_totals([m(Decimal::MAX), m(Decimal::MAX)], Money::zero()).unwrap_err();
        assert_eq!(err, AmountError::Overflow("subtotal"));
    }
}

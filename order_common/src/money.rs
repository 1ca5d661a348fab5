use std::{
    fmt::Display,
    iter::Sum,
    ops::Add,
    str::FromStr,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{
    database::{HasArguments, HasValueRef},
    encode::IsNull,
    error::BoxDynError,
    Database,
    Decode,
    Encode,
    Type,
};
use thiserror::Error;

use crate::op;

//--------------------------------------       Money         ---------------------------------------------------------
/// An exact decimal amount of money.
///
/// Amounts are never converted to binary floating point. Equality is numeric, so `40.0 == 40.00`, but any difference
/// in value, however small, makes two amounts unequal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as an amount of money: {0}")]
pub struct MoneyConversionError(String);

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str_exact(s.trim()).map(Self).map_err(|e| MoneyConversionError(format!("{s}: {e}")))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Money {
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Creates an amount from an integer number of cents, e.g. `Money::from_cents(4500)` is `45.00`.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// Multiplies a unit price by a quantity. Returns `None` on overflow.
    pub fn checked_mul_qty(self, quantity: i64) -> Option<Self> {
        self.0.checked_mul(Decimal::from(quantity)).map(Self)
    }
}

// Money is persisted as exact decimal text so that no database engine gets the chance to coerce it to a float.
impl<DB: Database> Type<DB> for Money
where String: Type<DB>
{
    fn type_info() -> DB::TypeInfo {
        <String as Type<DB>>::type_info()
    }

    fn compatible(ty: &DB::TypeInfo) -> bool {
        <String as Type<DB>>::compatible(ty)
    }
}

impl<'q, DB: Database> Encode<'q, DB> for Money
where String: Encode<'q, DB>
{
    fn encode_by_ref(&self, buf: &mut <DB as HasArguments<'q>>::ArgumentBuffer) -> IsNull {
        <String as Encode<'q, DB>>::encode(self.0.to_string(), buf)
    }
}

impl<'r, DB: Database> Decode<'r, DB> for Money
where &'r str: Decode<'r, DB>
{
    fn decode(value: <DB as HasValueRef<'r>>::ValueRef) -> Result<Self, BoxDynError> {
        let s = <&'r str as Decode<'r, DB>>::decode(value)?;
        let amount = Decimal::from_str_exact(s)?;
        Ok(Self(amount))
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn parse_and_display() {
        let m = Money::from_str("45.00").unwrap();
        assert_eq!(m.to_string(), "45.00");
        assert_eq!(m, Money::from_cents(4500));
        assert_eq!(Money::from_str(" 0.1 ").unwrap().value(), dec!(0.1));
        assert!(Money::from_str("4 5").is_err());
        assert!(Money::from_str("abc").is_err());
    }

    #[test]
    fn equality_is_exact_not_approximate() {
        let a = Money::from(dec!(0.1)) + Money::from(dec!(0.2));
        assert_eq!(a, Money::from(dec!(0.3)));
        assert_eq!(Money::from(dec!(40.0)), Money::from(dec!(40.00)));
        assert_ne!(Money::from(dec!(40.00)), Money::from(dec!(40.01)));
    }

    #[test]
    fn arithmetic() {
        let price = Money::from(dec!(20.00));
        assert_eq!(price.checked_mul_qty(2), Some(Money::from(dec!(40.00))));
        let total: Money = vec![Money::from_cents(150), Money::from_cents(250)].into_iter().sum();
        assert_eq!(total, Money::from_cents(400));
        let mut m = Money::from_cents(100);
        m -= Money::from_cents(30);
        assert_eq!(m, Money::from_cents(70));
        assert!((-m).is_negative());
        assert!(Money::zero().is_zero());
        assert!(!Money::zero().is_positive());
        assert!(Money::from(Decimal::MAX).checked_mul_qty(2).is_none());
    }

    #[test]
    fn serializes_as_decimal_string() {
        let m = Money::from(dec!(12.50));
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"12.50\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}

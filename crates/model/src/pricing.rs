//! Decimal price arithmetic for discounts and order lines.
//!
//! All amounts stay in [`Decimal`]; no rounding is applied.

use rust_decimal::Decimal;

/// `price × (1 − discount / 100)`.
pub fn discounted_unit_price(price: Decimal, discount: i16) -> Decimal {
    price * (Decimal::ONE_HUNDRED - Decimal::from(discount)) / Decimal::ONE_HUNDRED
}

/// Totals of a single order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTotals {
    /// `amount × price`.
    pub total: Decimal,
    /// `amount × discounted unit price`.
    pub discounted: Decimal,
}

pub fn line_totals(amount: i32, price: Decimal, discount: i16) -> LineTotals {
    let amount = Decimal::from(amount);
    LineTotals {
        total: amount * price,
        discounted: amount * discounted_unit_price(price, discount),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    #[test]
    fn test_discounted_unit_price() {
        assert_eq!(discounted_unit_price(dec!(100.00), 20), dec!(80.00));
        assert_eq!(discounted_unit_price(dec!(19.99), 0), dec!(19.99));
        assert_eq!(discounted_unit_price(dec!(19.99), 100), Decimal::ZERO);
    }

    #[test]
    fn test_line_totals() {
        let totals = line_totals(3, dec!(100.00), 20);
        assert_eq!(totals.total, dec!(300.00));
        assert_eq!(totals.discounted, dec!(240.00));
    }

    #[test]
    fn test_cent_values_do_not_drift() {
        let totals = line_totals(10, dec!(0.10), 0);
        assert_eq!(totals.total, dec!(1.00));
        let totals = line_totals(3, dec!(33.33), 10);
        assert_eq!(totals.discounted, dec!(89.991));
    }
}

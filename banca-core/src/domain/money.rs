//! Money helpers shared by transfers and payments

use rust_decimal::Decimal;

/// Decimal places stored for every monetary column (DECIMAL(18,2))
pub const MONEY_SCALE: u32 = 2;

/// Largest value a DECIMAL(18,2) column holds
pub const MAX_MONEY: Decimal = Decimal::from_parts(2_808_348_671, 232_830_643, 0, false, MONEY_SCALE);

/// Whether `value` fits a money column: at most two decimal places and
/// no larger than [`MAX_MONEY`]
pub fn fits_money_column(value: Decimal) -> bool {
    value.normalize().scale() <= MONEY_SCALE && value.abs() <= MAX_MONEY
}

/// A movable amount is strictly positive and representable in the schema
/// without rounding.
pub fn is_valid_amount(amount: Decimal) -> bool {
    amount > Decimal::ZERO && fits_money_column(amount)
}

/// Balance after crediting `amount`, or `None` when it would not fit
pub fn credited_balance(balance: Decimal, amount: Decimal) -> Option<Decimal> {
    balance
        .checked_add(amount)
        .filter(|total| *total <= MAX_MONEY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_amounts() {
        assert!(is_valid_amount(Decimal::new(30000, 2)));
        assert!(is_valid_amount(Decimal::new(1, 2)));
        // Trailing zeros beyond two places are fine: 1.5000
        assert!(is_valid_amount(Decimal::new(15000, 4)));
    }

    #[test]
    fn test_invalid_amounts() {
        assert!(!is_valid_amount(Decimal::ZERO));
        assert!(!is_valid_amount(Decimal::new(-100, 2)));
        assert!(!is_valid_amount(Decimal::new(1, 3)));
        assert!(!is_valid_amount(MAX_MONEY + Decimal::new(1, 2)));
    }

    #[test]
    fn test_max_money_is_column_limit() {
        assert_eq!(MAX_MONEY.to_string(), "9999999999999999.99");
        assert!(is_valid_amount(MAX_MONEY));
        assert!(!fits_money_column(Decimal::new(100_000_000_000_000_000, 0)));
    }

    #[test]
    fn test_credit_past_limit_is_refused() {
        let near_limit = Decimal::new(999_999_999_999_999_900, 2);
        assert_eq!(
            credited_balance(near_limit, Decimal::new(99, 2)),
            Some(MAX_MONEY)
        );
        assert_eq!(credited_balance(near_limit, Decimal::new(5, 0)), None);
    }
}

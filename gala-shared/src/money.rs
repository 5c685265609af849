use rust_decimal::{Decimal, RoundingStrategy};

/// Minor-unit precision for all supported currencies.
pub const MINOR_UNIT_DP: u32 = 2;

/// Round an amount to minor-unit precision, midpoint away from zero.
pub fn round_minor(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MINOR_UNIT_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Apply a percentage (0..=100) to an amount, rounded to minor units.
pub fn percent_of(amount: Decimal, percentage: Decimal) -> Decimal {
    round_minor(amount * percentage / Decimal::ONE_HUNDRED)
}

/// True when the amount carries no sub-minor-unit digits.
pub fn is_minor_exact(amount: Decimal) -> bool {
    round_minor(amount) == amount
}

/// Currency codes are ISO 4217 alpha-3.
pub fn valid_currency(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

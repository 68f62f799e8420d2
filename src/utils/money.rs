// Utilitários para manipulação de valores monetários

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to one decimal place, half away from zero (`0.05 -> 0.1`).
pub fn round_one_decimal(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

// src/utils/precision.rs
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a quantity DOWN to `decimals` places. Never rounds up, so an order
/// can't exceed the budget it was sized from.
/// Example: amount=10.999, decimals=1 -> 10.9
pub fn normalize_quantity(amount: Decimal, decimals: u32) -> Decimal {
    amount.round_dp_with_strategy(decimals, RoundingStrategy::ToZero)
}

/// Low priced assets get 8 decimals in logs, everything else 2.
pub fn display_precision(price: Decimal) -> usize {
    if price < Decimal::ONE {
        8
    } else {
        2
    }
}

pub fn format_price(price: Decimal) -> String {
    format!("{:.*}", display_precision(price), price)
}

pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

// src/core/sizing.rs
use crate::config::ScalperConfig;
use crate::types::MarketInfo;
use crate::utils::precision::{normalize_quantity, to_decimal};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SizingError {
    #[error("no budget allocated")]
    NoBudget,
    #[error("quantity {quantity} is below the market minimum {minimum}")]
    BelowMinimumQuantity { quantity: Decimal, minimum: Decimal },
    #[error("order value {notional} is below the market minimum {minimum}")]
    BelowMinimumNotional { notional: Decimal, minimum: Decimal },
}

/// Quantity to buy for one entry.
///
/// The budget cap is `pair_budget / MAX_TRADES_PER_PAIR / price`. With an ATR
/// the risk cap `TOTAL_BUDGET * RISK_PERCENTAGE / (ATR * ATR_MULTIPLIER)`
/// applies too and the smaller one wins. The result is floored to the
/// market's decimals and rejected (never rounded up) below its minimums.
pub fn position_size(
    config: &ScalperConfig,
    pair: &str,
    price: Decimal,
    atr: Option<f64>,
    market: &MarketInfo,
) -> Result<Decimal, SizingError> {
    let allocated = to_decimal(config.pair_budget(pair)) / Decimal::from(config.max_trades_per_pair.max(1));
    if allocated <= Decimal::ZERO || price <= Decimal::ZERO {
        return Err(SizingError::NoBudget);
    }
    let mut quantity = allocated / price;

    if let Some(atr) = atr.filter(|a| *a > 0.0) {
        let risk_amount = to_decimal(config.total_budget * config.risk_percentage);
        let risk_per_unit = to_decimal(atr * config.atr_multiplier);
        if risk_per_unit > Decimal::ZERO {
            quantity = quantity.min(risk_amount / risk_per_unit);
        }
    }

    let quantity = normalize_quantity(quantity, market.quantity_decimals);
    if quantity <= Decimal::ZERO || quantity < market.min_order_base {
        return Err(SizingError::BelowMinimumQuantity {
            quantity,
            minimum: market.min_order_base,
        });
    }
    let notional = quantity * price;
    if notional < market.min_order_quote {
        return Err(SizingError::BelowMinimumNotional {
            notional,
            minimum: market.min_order_quote,
        });
    }
    Ok(quantity)
}

// src/report.rs
//! Realized profit per day and pair, read back from `trades.json`.
use crate::types::{Side, TradeRecord};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub struct DailyProfit {
    pub date: NaiveDate,
    pub pair: String,
    pub profit: Decimal,
    pub sells: u32,
}

/// Groups sell trades by (day, pair), ordered by day then pair.
pub fn daily_profit(trades: &[TradeRecord]) -> Vec<DailyProfit> {
    let mut grouped: BTreeMap<(NaiveDate, String), (Decimal, u32)> = BTreeMap::new();
    for trade in trades.iter().filter(|t| t.side == Side::Sell) {
        let entry = grouped
            .entry((trade.timestamp.date_naive(), trade.pair.clone()))
            .or_insert((Decimal::ZERO, 0));
        entry.0 += trade.profit.unwrap_or(Decimal::ZERO);
        entry.1 += 1;
    }
    grouped
        .into_iter()
        .map(|((date, pair), (profit, sells))| DailyProfit {
            date,
            pair,
            profit,
            sells,
        })
        .collect()
}

pub fn render(rows: &[DailyProfit]) -> String {
    if rows.is_empty() {
        return "No sell trades found.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:<12} {:<12} {:>6} {:>14}", "date", "pair", "sells", "profit_eur");
    let mut per_pair: BTreeMap<&str, Decimal> = BTreeMap::new();
    for row in rows {
        let _ = writeln!(
            out,
            "{:<12} {:<12} {:>6} {:>14}",
            row.date,
            row.pair,
            row.sells,
            money(row.profit)
        );
        *per_pair.entry(row.pair.as_str()).or_default() += row.profit;
    }
    let _ = writeln!(out);
    for (pair, total) in &per_pair {
        let _ = writeln!(out, "{:<12} {:<12} {:>6} {:>14}", "TOTAL", pair, "", money(*total));
    }
    let overall: Decimal = per_pair.values().copied().sum();
    let _ = writeln!(out, "{:<12} {:<12} {:>6} {:>14}", "OVERALL", "", "", money(overall));
    out
}

fn money(value: Decimal) -> String {
    format!("{:.2}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn trade(day: u32, pair: &str, side: Side, profit: Option<Decimal>) -> TradeRecord {
        TradeRecord {
            id: format!("{pair}-{day}"),
            pair: pair.into(),
            side,
            price: dec!(1),
            quantity: dec!(1),
            profit,
            reason: None,
            demo: false,
            timestamp: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn sums_sells_per_day_and_pair() {
        let trades = vec![
            trade(1, "BTC-EUR", Side::Buy, None),
            trade(1, "BTC-EUR", Side::Sell, Some(dec!(2.5))),
            trade(1, "BTC-EUR", Side::Sell, Some(dec!(-1))),
            trade(1, "ETH-EUR", Side::Sell, Some(dec!(4))),
            trade(2, "BTC-EUR", Side::Sell, Some(dec!(3))),
        ];
        let rows = daily_profit(&trades);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].pair, "BTC-EUR");
        assert_eq!(rows[0].profit, dec!(1.5));
        assert_eq!(rows[0].sells, 2);
        assert_eq!(rows[2].date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());

        let rendered = render(&rows);
        assert!(rendered.contains("OVERALL"));
        assert!(rendered.contains("8.50"));
    }

    #[test]
    fn no_sells_renders_notice() {
        let rows = daily_profit(&[trade(1, "BTC-EUR", Side::Buy, None)]);
        assert!(rows.is_empty());
        assert_eq!(render(&rows), "No sell trades found.\n");
    }
}

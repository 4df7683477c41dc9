use bitvavo_scalper::config::ScalperConfig;
use bitvavo_scalper::strategies::scalper::ScalpingStrategy;
use bitvavo_scalper::strategies::traits::{Strategy, TickContext};
use bitvavo_scalper::types::{ExitReason, Position, Signal, Ticker};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const PAIR: &str = "BTC-EUR";

fn config(use_rsi: bool, max_trades: usize) -> ScalperConfig {
    ScalperConfig::from_json(&format!(
        r#"{{
            "PAIRS": ["{PAIR}"],
            "TOTAL_BUDGET": 1000,
            "DAILY_TARGET": 10,
            "TRADING_PERIOD_HOURS": 24,
            "CHECK_INTERVAL": 5,
            "WINDOW_SIZE": 3,
            "TRADE_FEE_PERCENTAGE": 0.25,
            "STOP_LOSS_RETRY_COUNT": 2,
            "STOP_LOSS": -3,
            "THRESHOLD_BUY": 1.0,
            "THRESHOLD_SELL": 1.0,
            "DEMO_MODE": true,
            "USE_RSI": {use_rsi},
            "RSI_POINTS": 3,
            "RSI_BUY_THRESHOLD": 20,
            "RSI_SELL_THRESHOLD": 70,
            "MAX_TRADES_PER_PAIR": {max_trades}
        }}"#
    ))
    .unwrap()
}

fn position(entry: Decimal) -> Position {
    Position {
        id: "pos-1".into(),
        pair: PAIR.into(),
        entry_price: entry,
        quantity: dec!(1),
        opened_at: Utc::now(),
    }
}

fn tick(strategy: &mut ScalpingStrategy, price: Decimal, positions: &[Position]) -> Vec<Signal> {
    strategy.on_tick(
        &Ticker {
            pair: PAIR.into(),
            price,
            timestamp: 0,
        },
        TickContext {
            positions,
            atr: None,
        },
    )
}

fn warmed(config: ScalperConfig, closes: &[Decimal]) -> ScalpingStrategy {
    let mut strategy = ScalpingStrategy::new(config);
    strategy.warm_up(PAIR, closes);
    strategy
}

#[test]
fn no_entry_until_the_window_is_full() {
    let mut strategy = warmed(config(false, 1), &[dec!(100)]);
    assert!(tick(&mut strategy, dec!(80), &[]).is_empty());

    let snapshot = strategy.snapshot(PAIR).unwrap();
    assert_eq!(snapshot.samples, 2);
    assert!(snapshot.window_mean.is_none());
}

#[test]
fn buys_a_drop_below_the_rolling_mean() {
    let mut strategy = warmed(config(false, 1), &[dec!(100), dec!(100)]);
    // mean of [100, 100, 98.9] is 99.63, change -0.73%: not deep enough
    assert!(tick(&mut strategy, dec!(98.9), &[]).is_empty());

    let mut strategy = warmed(config(false, 1), &[dec!(100), dec!(100)]);
    let signals = tick(&mut strategy, dec!(97), &[]);
    assert_eq!(signals, vec![Signal::Buy { price: dec!(97) }]);
    let change = strategy.snapshot(PAIR).unwrap().change_pct.unwrap();
    assert!(change < -1.0);
}

#[test]
fn rsi_gate_blocks_dips_in_an_uptrend() {
    let uptrend = [dec!(100), dec!(102), dec!(104), dec!(106), dec!(108)];

    let mut gated = warmed(config(true, 1), &uptrend);
    assert!(tick(&mut gated, dec!(105), &[]).is_empty());
    assert!(gated.snapshot(PAIR).unwrap().rsi.unwrap() > 20.0);

    let mut ungated = warmed(config(false, 1), &uptrend);
    assert_eq!(tick(&mut ungated, dec!(105), &[]).len(), 1);
}

#[test]
fn rsi_gate_allows_oversold_dips() {
    let downtrend = [dec!(110), dec!(108), dec!(106), dec!(104)];
    let mut strategy = warmed(config(true, 1), &downtrend);
    let signals = tick(&mut strategy, dec!(100), &[]);
    assert_eq!(signals, vec![Signal::Buy { price: dec!(100) }]);
    assert!(strategy.snapshot(PAIR).unwrap().rsi.unwrap() <= 20.0);
}

#[test]
fn open_positions_count_against_the_pair_cap() {
    let positions = vec![position(dec!(100))];

    let mut capped = warmed(config(false, 1), &[dec!(100), dec!(100)]);
    assert!(tick(&mut capped, dec!(98), &positions).is_empty());

    let mut roomy = warmed(config(false, 2), &[dec!(100), dec!(100)]);
    assert_eq!(
        tick(&mut roomy, dec!(98), &positions),
        vec![Signal::Buy { price: dec!(98) }]
    );
}

#[test]
fn take_profit_is_measured_after_fees() {
    let positions = vec![position(dec!(100))];
    let mut strategy = warmed(config(false, 1), &[dec!(100), dec!(100)]);

    // +1% gross is only +0.75% after the 0.25% fee
    assert!(tick(&mut strategy, dec!(101), &positions).is_empty());

    let signals = tick(&mut strategy, dec!(101.3), &positions);
    assert_eq!(signals.len(), 1);
    match &signals[0] {
        Signal::Sell {
            position_id,
            reason: ExitReason::TakeProfit { profit_pct },
            ..
        } => {
            assert_eq!(position_id, "pos-1");
            assert!(*profit_pct >= 1.0);
        }
        other => panic!("unexpected signal {other:?}"),
    }
}

#[test]
fn rsi_gate_also_holds_back_exits() {
    let positions = vec![position(dec!(100))];

    // a single sample gives no RSI, so the gated exit waits
    let mut gated = ScalpingStrategy::new(config(true, 1));
    assert!(tick(&mut gated, dec!(105), &positions).is_empty());

    let mut ungated = ScalpingStrategy::new(config(false, 1));
    assert_eq!(tick(&mut ungated, dec!(105), &positions).len(), 1);
}

#[test]
fn stop_loss_fires_regardless_of_rsi() {
    let positions = vec![position(dec!(100))];
    let mut strategy = ScalpingStrategy::new(config(true, 1));
    let signals = tick(&mut strategy, dec!(96.5), &positions);
    assert!(matches!(
        signals.as_slice(),
        [Signal::Sell {
            reason: ExitReason::StopLoss { .. },
            ..
        }]
    ));
}

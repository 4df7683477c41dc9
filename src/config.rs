// src/config.rs

use crate::error::ConfigError;
use config::{Config, Environment};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

const DEFAULT_PROFILE: &str = "SCALPINGBOT";
const ENV_PREFIX: &str = "SCALPER";

/// Contents of `scalper.json`. Keys are accepted in `UPPER_SNAKE_CASE` (as the
/// deployed file is written) and in `lower_snake_case` (as environment
/// overrides arrive).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScalperConfig {
    #[serde(alias = "PAIRS")]
    pub pairs: Vec<String>,
    #[serde(alias = "TOTAL_BUDGET")]
    pub total_budget: f64,
    #[serde(alias = "DAILY_TARGET")]
    pub daily_target: f64,
    #[serde(alias = "TRADING_PERIOD_HOURS")]
    pub trading_period_hours: f64,
    /// Seconds between cycles.
    #[serde(alias = "CHECK_INTERVAL")]
    pub check_interval: u64,
    #[serde(alias = "WINDOW_SIZE")]
    pub window_size: usize,
    #[serde(alias = "TRADE_FEE_PERCENTAGE")]
    pub trade_fee_percentage: f64,
    #[serde(alias = "STOP_LOSS_RETRY_COUNT")]
    pub stop_loss_retry_count: u32,
    /// Percent change from entry, e.g. -2.5.
    #[serde(alias = "STOP_LOSS")]
    pub stop_loss: f64,
    #[serde(alias = "THRESHOLD_BUY")]
    pub threshold_buy: f64,
    #[serde(alias = "THRESHOLD_SELL")]
    pub threshold_sell: f64,
    #[serde(alias = "DEMO_MODE")]
    pub demo_mode: bool,
    #[serde(alias = "USE_RSI")]
    pub use_rsi: bool,

    #[serde(alias = "PROFILE", default = "default_profile")]
    pub profile: String,
    #[serde(alias = "RSI_POINTS", default = "default_period")]
    pub rsi_points: usize,
    #[serde(alias = "RSI_INTERVAL", default = "default_interval")]
    pub rsi_interval: String,
    #[serde(alias = "RSI_BUY_THRESHOLD", default = "default_rsi_buy")]
    pub rsi_buy_threshold: f64,
    #[serde(alias = "RSI_SELL_THRESHOLD", default = "default_rsi_sell")]
    pub rsi_sell_threshold: f64,
    #[serde(alias = "USE_EMA", default)]
    pub use_ema: bool,
    #[serde(alias = "EMA_PROFILES", default = "default_ema_profiles")]
    pub ema_profiles: BTreeMap<String, usize>,
    #[serde(alias = "EMA_PROFILE", default = "default_ema_profile")]
    pub ema_profile: String,
    #[serde(alias = "ATR_PERIOD", default = "default_period")]
    pub atr_period: usize,
    #[serde(alias = "ATR_MULTIPLIER", default = "default_atr_multiplier")]
    pub atr_multiplier: f64,
    #[serde(alias = "RISK_PERCENTAGE", default = "default_risk_percentage")]
    pub risk_percentage: f64,
    /// Seconds between stop-loss sell attempts.
    #[serde(alias = "STOP_LOSS_WAIT_TIME", default = "default_stop_loss_wait")]
    pub stop_loss_wait_time: u64,
    #[serde(alias = "MAX_TRADES_PER_PAIR", default = "default_max_trades")]
    pub max_trades_per_pair: usize,
    /// Percent of TOTAL_BUDGET per pair. Equal split when absent.
    #[serde(alias = "PORTFOLIO_ALLOCATION", default)]
    pub portfolio_allocation: Option<BTreeMap<String, f64>>,
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}
fn default_period() -> usize {
    14
}
fn default_interval() -> String {
    "1m".to_string()
}
fn default_rsi_buy() -> f64 {
    30.0
}
fn default_rsi_sell() -> f64 {
    70.0
}
fn default_ema_profiles() -> BTreeMap<String, usize> {
    BTreeMap::from([
        ("ULTRASHORT".to_string(), 9),
        ("SHORT".to_string(), 21),
        ("MEDIUM".to_string(), 50),
        ("LONG".to_string(), 200),
    ])
}
fn default_ema_profile() -> String {
    "MEDIUM".to_string()
}
fn default_atr_multiplier() -> f64 {
    1.5
}
fn default_risk_percentage() -> f64 {
    0.01
}
fn default_stop_loss_wait() -> u64 {
    5
}
fn default_max_trades() -> usize {
    1
}

impl ScalperConfig {
    /// Reads, layers `SCALPER_*` overrides on top and validates.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let parsed = Self::from_file(path)?;
        let config = parsed.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Strict parse of the file: no type coercion.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let layered = Config::builder()
            .add_source(Config::try_from(&self)?)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("pairs"),
            )
            .build()?;
        Ok(layered.try_deserialize()?)
    }

    /// Collects every rule violation instead of stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.pairs.is_empty() {
            errors.push("PAIRS must contain at least one market".to_string());
        }
        let mut seen = HashSet::new();
        for pair in &self.pairs {
            if !is_market_name(pair) {
                errors.push(format!("PAIRS entry '{pair}' is not of the form BASE-QUOTE"));
            }
            if !seen.insert(pair.to_ascii_uppercase()) {
                errors.push(format!("PAIRS entry '{pair}' is listed twice"));
            }
        }

        for (name, value) in [
            ("TOTAL_BUDGET", self.total_budget),
            ("DAILY_TARGET", self.daily_target),
            ("TRADING_PERIOD_HOURS", self.trading_period_hours),
        ] {
            if !(value.is_finite() && value > 0.0) {
                errors.push(format!("{name} must be a positive number (got {value})"));
            }
        }
        if self.check_interval == 0 {
            errors.push("CHECK_INTERVAL must be a positive number of seconds".to_string());
        }
        if self.window_size == 0 {
            errors.push("WINDOW_SIZE must be positive".to_string());
        }
        if !(self.stop_loss.is_finite() && self.stop_loss <= 0.0) {
            errors.push(format!(
                "STOP_LOSS must be negative or zero (got {})",
                self.stop_loss
            ));
        }
        if !(self.stop_loss > -100.0) {
            errors.push("STOP_LOSS must be above -100".to_string());
        }
        if !(self.trade_fee_percentage >= 0.0 && self.trade_fee_percentage < 100.0) {
            errors.push(format!(
                "TRADE_FEE_PERCENTAGE must be within [0, 100) (got {})",
                self.trade_fee_percentage
            ));
        }
        if !(self.threshold_buy.is_finite() && self.threshold_buy >= 0.0) {
            errors.push(format!(
                "THRESHOLD_BUY must be zero or positive (got {})",
                self.threshold_buy
            ));
        }
        if !(self.threshold_sell.is_finite() && self.threshold_sell > 0.0) {
            errors.push(format!(
                "THRESHOLD_SELL must be positive (got {})",
                self.threshold_sell
            ));
        }

        for (name, value) in [
            ("RSI_BUY_THRESHOLD", self.rsi_buy_threshold),
            ("RSI_SELL_THRESHOLD", self.rsi_sell_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                errors.push(format!("{name} must be within [0, 100] (got {value})"));
            }
        }
        if self.rsi_buy_threshold >= self.rsi_sell_threshold {
            errors.push("RSI_BUY_THRESHOLD must be below RSI_SELL_THRESHOLD".to_string());
        }
        if self.rsi_points < 2 {
            errors.push("RSI_POINTS must be at least 2".to_string());
        }
        if self.atr_period < 2 {
            errors.push("ATR_PERIOD must be at least 2".to_string());
        }
        if !(self.atr_multiplier.is_finite() && self.atr_multiplier > 0.0) {
            errors.push("ATR_MULTIPLIER must be positive".to_string());
        }
        if !(self.risk_percentage > 0.0 && self.risk_percentage <= 1.0) {
            errors.push(format!(
                "RISK_PERCENTAGE must be within (0, 1] (got {})",
                self.risk_percentage
            ));
        }
        if self.max_trades_per_pair == 0 {
            errors.push("MAX_TRADES_PER_PAIR must be at least 1".to_string());
        }
        match lookup_ignore_case(&self.ema_profiles, &self.ema_profile) {
            None => errors.push(format!(
                "EMA_PROFILE '{}' is not defined in EMA_PROFILES",
                self.ema_profile
            )),
            Some(0) => errors.push(format!("EMA profile '{}' has period 0", self.ema_profile)),
            Some(_) => {}
        }

        if let Some(allocation) = &self.portfolio_allocation {
            let mut total = 0.0;
            for pair in &self.pairs {
                match lookup_ignore_case(allocation, pair) {
                    None => errors.push(format!("PORTFOLIO_ALLOCATION has no entry for {pair}")),
                    Some(share) if share < 0.0 => {
                        errors.push(format!("PORTFOLIO_ALLOCATION for {pair} is negative"))
                    }
                    Some(share) => total += share,
                }
            }
            if total > 100.01 {
                errors.push(format!(
                    "PORTFOLIO_ALLOCATION sums to {total:.2}%, more than 100%"
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Budget in quote currency reserved for `pair`.
    pub fn pair_budget(&self, pair: &str) -> f64 {
        match &self.portfolio_allocation {
            Some(allocation) => {
                lookup_ignore_case(allocation, pair).unwrap_or(0.0) * self.total_budget / 100.0
            }
            None if self.pairs.is_empty() => 0.0,
            None => self.total_budget / self.pairs.len() as f64,
        }
    }

    pub fn ema_period(&self) -> usize {
        lookup_ignore_case(&self.ema_profiles, &self.ema_profile).unwrap_or(50)
    }

    /// Samples kept per pair so every indicator has enough input.
    pub fn history_capacity(&self) -> usize {
        let mut capacity = self.window_size.max(self.rsi_points + 1);
        if self.use_ema {
            capacity = capacity.max(self.ema_period());
        }
        capacity
    }
}

// Map keys may come back lowercased from the env layering step.
fn lookup_ignore_case<V: Copy>(map: &BTreeMap<String, V>, key: &str) -> Option<V> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| *v)
}

fn is_market_name(pair: &str) -> bool {
    let mut parts = pair.split('-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(base), Some(quote), None) => {
            !base.is_empty()
                && !quote.is_empty()
                && pair.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        }
        _ => false,
    }
}

#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
}

/// Settings that come from the process environment rather than the JSON file.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub bot_name: Option<String>,
    pub credentials: Option<ApiCredentials>,
    pub rest_url: String,
    pub ws_url: String,
    pub access_window_ms: u64,
    pub slack_webhook_url: Option<String>,
}

impl RuntimeSettings {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let credentials = match (var("BITVAVO_API_KEY"), var("BITVAVO_API_SECRET")) {
            (Some(api_key), Some(api_secret)) => Some(ApiCredentials {
                api_key,
                api_secret,
            }),
            _ => None,
        };

        Self {
            bot_name: var("BOT_NAME"),
            credentials,
            rest_url: var("BITVAVO_REST_URL")
                .unwrap_or_else(|| "https://api.bitvavo.com/v2".to_string()),
            ws_url: var("BITVAVO_WS_URL").unwrap_or_else(|| "wss://ws.bitvavo.com/v2/".to_string()),
            access_window_ms: var("BITVAVO_ACCESS_WINDOW")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            slack_webhook_url: var("SLACK_WEBHOOK_URL"),
        }
    }

    /// `BOT_NAME` wins over the file's PROFILE.
    pub fn bot_name(&self, config: &ScalperConfig) -> String {
        self.bot_name
            .clone()
            .unwrap_or_else(|| config.profile.clone())
    }

    /// Live trading needs signed requests.
    pub fn require_credentials(&self) -> Result<&ApiCredentials, ConfigError> {
        self.credentials
            .as_ref()
            .ok_or(ConfigError::MissingEnv("BITVAVO_API_KEY / BITVAVO_API_SECRET"))
    }
}

use anyhow::Context;
use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::gateway::RetryPolicy;
use crate::models::Instrument;
use crate::strategy::CrossoverConfig;

const DEFAULT_POLL_DELAY_SECS: f64 = 10.0;
/// Upper bound for both the poll delay and the cooldown window
const MAX_INTERVAL_SECS: i64 = 86_400;

/// Everything one strategy instance needs, passed in-process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub name: String,
    pub instruments: Vec<Instrument>,
    pub poll_delay_secs: f64,
    pub broker_gmt_offset_hours: i64,
    pub verbose: bool,
    pub magic_number: u32,
    pub buffer_cap: usize,
    pub cooldown_secs: i64,
    pub sl_tp_points: u32, // 100 points = 10 pips
    pub close_pause_ms: u64,
    pub retry: RetryPolicy,
    pub crossover: CrossoverConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: "MOVING_AVERAGE_TRADER".to_string(),
            instruments: vec![
                Instrument::new("USDJPY", Decimal::new(1, 2)),
                Instrument::new("EURUSD", Decimal::new(1, 2)),
            ],
            poll_delay_secs: DEFAULT_POLL_DELAY_SECS,
            broker_gmt_offset_hours: 3,
            verbose: false,
            magic_number: 123456,
            buffer_cap: 30,
            cooldown_secs: 60,
            sl_tp_points: 100,
            close_pause_ms: 100,
            retry: RetryPolicy::default(),
            crossover: CrossoverConfig::default(),
        }
    }
}

impl StrategyConfig {
    /// Load configuration: defaults, then an optional TOML file, then
    /// `FXTRADER__*` environment variables
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            tracing::info!("Loading strategy config from {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("FXTRADER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.instruments.is_empty() {
            anyhow::bail!("No instruments configured");
        }
        for instrument in &self.instruments {
            if instrument.symbol.trim().is_empty() {
                anyhow::bail!("Instrument with empty symbol");
            }
            if instrument.lot_size <= Decimal::ZERO {
                anyhow::bail!(
                    "Lot size for {} must be positive, got {}",
                    instrument.symbol,
                    instrument.lot_size
                );
            }
        }
        if !(self.poll_delay_secs > 0.0 && self.poll_delay_secs <= MAX_INTERVAL_SECS as f64) {
            anyhow::bail!(
                "Poll delay must be in (0, {}] seconds, got {}",
                MAX_INTERVAL_SECS,
                self.poll_delay_secs
            );
        }
        if !(0..=MAX_INTERVAL_SECS).contains(&self.cooldown_secs) {
            anyhow::bail!(
                "Cooldown must be in [0, {}] seconds, got {}",
                MAX_INTERVAL_SECS,
                self.cooldown_secs
            );
        }
        if self.buffer_cap < self.crossover.min_samples {
            anyhow::bail!(
                "Buffer cap {} cannot hold the {} samples the classifier needs",
                self.buffer_cap,
                self.crossover.min_samples
            );
        }
        self.crossover.validate()
    }

    /// Poll delay clamped to the accepted range. Values `validate` would
    /// reject fall back to the default or the upper bound.
    pub fn poll_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_delay_secs.min(MAX_INTERVAL_SECS as f64))
            .unwrap_or(Duration::from_secs_f64(DEFAULT_POLL_DELAY_SECS))
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.cooldown_secs.clamp(0, MAX_INTERVAL_SECS))
            .unwrap_or_else(chrono::Duration::zero)
    }

    pub fn close_pause(&self) -> Duration {
        Duration::from_millis(self.close_pause_ms)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.instruments.iter().map(|i| i.symbol.clone()).collect()
    }
}

/// Parse `EURUSD:0.01,USDJPY:0.02` into instruments. A missing lot size
/// defaults to 0.01.
pub fn parse_instruments(spec: &str) -> anyhow::Result<Vec<Instrument>> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (symbol, lots) = match entry.split_once(':') {
                Some((symbol, lots)) => (
                    symbol.trim(),
                    Decimal::from_str(lots.trim())
                        .with_context(|| format!("Invalid lot size in '{}'", entry))?,
                ),
                None => (entry, Decimal::new(1, 2)),
            };
            Ok(Instrument::new(symbol.to_uppercase(), lots))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = StrategyConfig::default();

        assert_eq!(config.symbols(), vec!["USDJPY", "EURUSD"]);
        assert_eq!(config.poll_delay(), Duration::from_secs(10));
        assert_eq!(config.broker_gmt_offset_hours, 3);
        assert_eq!(config.cooldown(), chrono::Duration::seconds(60));
        assert_eq!(config.buffer_cap, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_instruments() {
        let instruments = parse_instruments("eurusd:0.02, USDJPY").unwrap();

        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[0].symbol, "EURUSD");
        assert_eq!(instruments[0].lot_size, Decimal::new(2, 2));
        assert_eq!(instruments[1].lot_size, Decimal::new(1, 2));
    }

    #[test]
    fn test_parse_instruments_bad_lot() {
        assert!(parse_instruments("EURUSD:abc").is_err());
    }

    #[test]
    fn test_validate_rejects_empty_instruments() {
        let config = StrategyConfig {
            instruments: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_lot() {
        let config = StrategyConfig {
            instruments: vec![Instrument::new("EURUSD", Decimal::ZERO)],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_small_buffer() {
        let config = StrategyConfig {
            buffer_cap: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unbounded_poll_delay() {
        for delay in [f64::INFINITY, f64::NAN, 1e30, 0.0, -1.0] {
            let config = StrategyConfig {
                poll_delay_secs: delay,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "delay = {}", delay);
        }
    }

    #[test]
    fn test_validate_rejects_unbounded_cooldown() {
        for cooldown in [i64::MAX, MAX_INTERVAL_SECS + 1, -1] {
            let config = StrategyConfig {
                cooldown_secs: cooldown,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "cooldown = {}", cooldown);
        }
    }

    #[test]
    fn test_duration_helpers_never_panic() {
        let config = StrategyConfig {
            poll_delay_secs: f64::INFINITY,
            cooldown_secs: i64::MAX,
            ..Default::default()
        };
        assert_eq!(config.poll_delay(), Duration::from_secs(86_400));
        assert_eq!(config.cooldown(), chrono::Duration::seconds(86_400));

        let config = StrategyConfig {
            poll_delay_secs: -5.0,
            cooldown_secs: i64::MIN,
            ..Default::default()
        };
        assert_eq!(config.poll_delay(), Duration::from_secs(10));
        assert_eq!(config.cooldown(), chrono::Duration::zero());
    }

    #[test]
    fn test_load_env_overrides() {
        // Keys not touched by any other loading test; the environment is process-wide
        std::env::set_var("FXTRADER__CLOSE_PAUSE_MS", "250");
        std::env::set_var("FXTRADER__CROSSOVER__MIN_SAMPLES", "12");

        let config = StrategyConfig::load(None);
        std::env::remove_var("FXTRADER__CLOSE_PAUSE_MS");
        std::env::remove_var("FXTRADER__CROSSOVER__MIN_SAMPLES");
        let config = config.unwrap();

        assert_eq!(config.close_pause(), Duration::from_millis(250));
        assert_eq!(config.crossover.min_samples, 12);
        assert_eq!(config.crossover.fast_span, 10);
        assert_eq!(config.name, "MOVING_AVERAGE_TRADER");
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("fxtrader-test-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
poll_delay_secs = 2.5
broker_gmt_offset_hours = 2

[[instruments]]
symbol = "GBPUSD"
lot_size = "0.05"

[crossover]
right_scale = 1.6
"#
        )
        .unwrap();

        let config = StrategyConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.poll_delay(), Duration::from_millis(2500));
        assert_eq!(config.broker_gmt_offset_hours, 2);
        assert_eq!(config.instruments, vec![Instrument::new("GBPUSD", Decimal::new(5, 2))]);
        assert_eq!(config.crossover.right_scale, 1.6);
        assert_eq!(config.crossover.left_scale, 1.5);
        assert_eq!(config.magic_number, 123456);
    }
}

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::watch;

use crate::gateway::{PaperGateway, SharedGateway};
use crate::models::{broker_now, QuoteTick};

/// Market scenario types for synthetic quote generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with small noise
    Uptrend,
    /// Steady downtrend with small noise
    Downtrend,
    /// Mean-reverting around the starting price
    Sideways,
    /// Large random swings, no drift
    Volatile,
}

impl FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "uptrend" => Ok(MarketScenario::Uptrend),
            "down" | "downtrend" => Ok(MarketScenario::Downtrend),
            "sideways" | "flat" => Ok(MarketScenario::Sideways),
            "volatile" => Ok(MarketScenario::Volatile),
            other => Err(format!("unknown scenario '{}'", other)),
        }
    }
}

/// Seeded random-walk quote generator feeding the paper gateway
pub struct SyntheticQuoteFeed {
    rng: StdRng,
    scenario: MarketScenario,
    prices: HashMap<String, (f64, f64)>, // symbol -> (start, current)
    broker_gmt_offset_hours: i64,
}

impl SyntheticQuoteFeed {
    /// Create a new feed with a seed for reproducibility
    pub fn new(seed: u64, scenario: MarketScenario, broker_gmt_offset_hours: i64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            scenario,
            prices: HashMap::new(),
            broker_gmt_offset_hours,
        }
    }

    fn base_price(symbol: &str) -> f64 {
        if symbol.contains("JPY") {
            150.0
        } else if symbol.starts_with("GBP") {
            1.27
        } else if symbol.starts_with("EUR") {
            1.10
        } else {
            1.0
        }
    }

    /// Advance `symbol` one step and return the new quote
    pub fn next_tick(&mut self, symbol: &str) -> QuoteTick {
        let (start, current) = *self
            .prices
            .entry(symbol.to_string())
            .or_insert_with(|| {
                let base = Self::base_price(symbol);
                (base, base)
            });

        let step = match self.scenario {
            MarketScenario::Uptrend => current * (0.00005 + self.rng.gen_range(-0.00003..0.00003)),
            MarketScenario::Downtrend => current * (-0.00005 + self.rng.gen_range(-0.00003..0.00003)),
            MarketScenario::Sideways => {
                // Pull back towards the start with light noise
                (start - current) * 0.1 + current * self.rng.gen_range(-0.00005..0.00005)
            }
            MarketScenario::Volatile => current * self.rng.gen_range(-0.0005..0.0005),
        };

        let bid = current + step;
        self.prices.insert(symbol.to_string(), (start, bid));

        // Two pip spread on majors, two tenths of a yen on JPY crosses
        let spread = if symbol.contains("JPY") { 0.02 } else { 0.0002 };
        QuoteTick::new(bid, bid + spread)
    }

    /// Push one tick per symbol every `interval` until the market closes
    ///
    /// Returns the number of ticks the gateway accepted.
    pub async fn run(
        mut self,
        gateway: SharedGateway<PaperGateway>,
        symbols: Vec<String>,
        interval: Duration,
        mut market_open: watch::Receiver<bool>,
    ) -> u64 {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut delivered = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = market_open.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if !*market_open.borrow() {
                break;
            }

            let ticks: Vec<_> = symbols.iter().map(|s| (s, self.next_tick(s))).collect();
            let timestamp = broker_now(self.broker_gmt_offset_hours);

            let mut gw = gateway.lock().await;
            for (symbol, tick) in ticks {
                if gw.push_tick(symbol, timestamp, tick) {
                    delivered += 1;
                }
            }
        }

        tracing::info!("Synthetic feed stopped after {} ticks", delivered);
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{shared, Gateway};

    #[test]
    fn test_same_seed_same_quotes() {
        let mut a = SyntheticQuoteFeed::new(42, MarketScenario::Volatile, 3);
        let mut b = SyntheticQuoteFeed::new(42, MarketScenario::Volatile, 3);

        for _ in 0..50 {
            assert_eq!(a.next_tick("EURUSD"), b.next_tick("EURUSD"));
        }
    }

    #[test]
    fn test_uptrend_rises() {
        let mut feed = SyntheticQuoteFeed::new(7, MarketScenario::Uptrend, 3);
        let first = feed.next_tick("EURUSD").bid;
        let last = (0..200).map(|_| feed.next_tick("EURUSD").bid).last().unwrap();

        assert!(last > first);
    }

    #[test]
    fn test_downtrend_falls() {
        let mut feed = SyntheticQuoteFeed::new(7, MarketScenario::Downtrend, 3);
        let first = feed.next_tick("USDJPY").bid;
        let last = (0..200).map(|_| feed.next_tick("USDJPY").bid).last().unwrap();

        assert!(last < first);
        assert!(first > 100.0);
    }

    #[test]
    fn test_ask_above_bid() {
        let mut feed = SyntheticQuoteFeed::new(1, MarketScenario::Sideways, 3);
        let tick = feed.next_tick("GBPUSD");
        assert!(tick.ask > tick.bid);
    }

    #[test]
    fn test_parse_scenario() {
        assert_eq!("up".parse::<MarketScenario>(), Ok(MarketScenario::Uptrend));
        assert_eq!("Volatile".parse::<MarketScenario>(), Ok(MarketScenario::Volatile));
        assert!("sideways-ish".parse::<MarketScenario>().is_err());
    }

    #[tokio::test]
    async fn test_run_delivers_until_closed() {
        let mut paper = PaperGateway::new(3);
        paper.subscribe("EURUSD").await.unwrap();
        let gateway = shared(paper);
        let (tx, rx) = watch::channel(true);

        let feed = SyntheticQuoteFeed::new(3, MarketScenario::Uptrend, 3);
        let handle = tokio::spawn(feed.run(
            gateway.clone(),
            vec!["EURUSD".to_string(), "USDJPY".to_string()],
            Duration::from_millis(5),
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(40)).await;
        tx.send(false).unwrap();
        let delivered = handle.await.unwrap();

        // USDJPY was never subscribed, so only EURUSD ticks land
        assert!(delivered > 0);
        assert_eq!(gateway.lock().await.pending_ticks("EURUSD") as u64, delivered);
    }
}

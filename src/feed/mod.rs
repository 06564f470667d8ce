// Quote sources for paper trading
pub mod synthetic;

pub use synthetic::{MarketScenario, SyntheticQuoteFeed};

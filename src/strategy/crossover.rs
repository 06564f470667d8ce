use serde::{Deserialize, Serialize};

use crate::indicators::EwmaPair;
use crate::models::Signal;

/// Configuration for the moving-average crossover classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    pub fast_span: usize,
    pub slow_span: usize,
    pub min_samples: usize, // abstain below this many prices
    pub left_scale: f64,    // must lie in (1.0, 2.0)
    pub right_scale: f64,   // must lie in (1.0, 2.0)
}

impl Default for CrossoverConfig {
    fn default() -> Self {
        Self {
            fast_span: 10,
            slow_span: 20,
            min_samples: 10,
            left_scale: 1.5,
            right_scale: 1.75,
        }
    }
}

impl CrossoverConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fast_span == 0 || self.fast_span >= self.slow_span {
            anyhow::bail!(
                "fast span ({}) must be non-zero and shorter than slow span ({})",
                self.fast_span,
                self.slow_span
            );
        }
        for (name, scale) in [("left", self.left_scale), ("right", self.right_scale)] {
            if !(scale > 1.0 && scale < 2.0) {
                anyhow::bail!("{} scale constant {} outside (1.0, 2.0)", name, scale);
            }
        }
        if self.min_samples < 4 {
            anyhow::bail!("min_samples ({}) too small to split into quarters", self.min_samples);
        }
        Ok(())
    }
}

/// Per-half dominance counts of the fast average over the slow one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowTally {
    pub gt_left: usize,
    pub lt_left: usize,
    pub gt_right: usize,
    pub lt_right: usize,
    pub quarter: usize,
}

/// Count strict fast/slow dominance over the left half `[1, mid)` and the
/// right half `[mid, n)`, with `mid = n / 2`. Index 0 is the shared seed of
/// both averages and is left out.
pub fn tally_crossovers(pair: &EwmaPair) -> WindowTally {
    let n = pair.len().min(pair.slow.len());
    let mid = n / 2;
    let mut tally = WindowTally {
        quarter: mid / 2,
        ..Default::default()
    };

    for i in 1..mid {
        if pair.fast[i] > pair.slow[i] {
            tally.gt_left += 1;
        } else if pair.fast[i] < pair.slow[i] {
            tally.lt_left += 1;
        }
    }
    for i in mid..n {
        if pair.fast[i] > pair.slow[i] {
            tally.gt_right += 1;
        } else if pair.fast[i] < pair.slow[i] {
            tally.lt_right += 1;
        }
    }

    tally
}

/// Outcome of one classification pass
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub signal: Signal,
    pub tally: Option<WindowTally>, // None when the classifier abstained
}

/// Split-window EWMA crossover classifier
///
/// Calls a trend only when the fast average dominates the slow one in both
/// halves of the window, with a stricter bar on the more recent half.
#[derive(Debug, Clone, Default)]
pub struct CrossoverClassifier {
    config: CrossoverConfig,
}

impl CrossoverClassifier {
    pub fn new(config: CrossoverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CrossoverConfig {
        &self.config
    }

    pub fn classify(&self, prices: &[f64]) -> Signal {
        self.evaluate(prices).signal
    }

    /// Compute the EWMA pair over `prices` and classify it
    pub fn evaluate(&self, prices: &[f64]) -> Classification {
        if prices.len() < self.config.min_samples {
            return Classification {
                signal: Signal::Hold,
                tally: None,
            };
        }

        let pair = EwmaPair::compute(prices, self.config.fast_span, self.config.slow_span);
        let tally = tally_crossovers(&pair);

        Classification {
            signal: self.decide(&tally),
            tally: Some(tally),
        }
    }

    fn decide(&self, tally: &WindowTally) -> Signal {
        let left_bar = self.config.left_scale * tally.quarter as f64;
        let right_bar = self.config.right_scale * tally.quarter as f64;

        if tally.gt_left as f64 > left_bar && tally.gt_right as f64 > right_bar {
            Signal::Bullish
        } else if tally.lt_left as f64 > left_bar && tally.lt_right as f64 > right_bar {
            Signal::Bearish
        } else {
            Signal::Hold
        }
    }
}

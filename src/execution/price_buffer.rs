use std::collections::VecDeque;

pub const DEFAULT_BUFFER_CAP: usize = 30;

/// Rolling window of closing prices for one instrument
///
/// Owned by a single worker. `append` grows the window freely; `trim`
/// brings it back to the cap by dropping the oldest prices.
#[derive(Debug, Clone)]
pub struct PriceBuffer {
    prices: VecDeque<f64>,
    cap: usize,
}

impl Default for PriceBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAP)
    }
}

impl PriceBuffer {
    /// Create an empty buffer keeping at most `cap` prices after each trim
    pub fn new(cap: usize) -> Self {
        Self {
            prices: VecDeque::with_capacity(cap * 2),
            cap,
        }
    }

    pub fn append<I>(&mut self, prices: I)
    where
        I: IntoIterator<Item = f64>,
    {
        self.prices.extend(prices);
    }

    /// Keep only the most recent `cap` prices
    pub fn trim(&mut self) {
        while self.prices.len() > self.cap {
            self.prices.pop_front();
        }
    }

    /// Copy of the current window, oldest first
    pub fn snapshot(&self) -> Vec<f64> {
        self.prices.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

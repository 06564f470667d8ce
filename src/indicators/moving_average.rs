/// Decay factor for a span: alpha = 2 / (span + 1)
pub fn ewma_alpha(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Calculate the non-adjusted Exponentially Weighted Moving Average series
///
/// Seeded with the first price, then `y[i] = y[i-1] + alpha * (x[i] - y[i-1])`.
/// No bias correction is applied. The output has the same length as `prices`.
pub fn calculate_ewma_series(prices: &[f64], span: usize) -> Vec<f64> {
    let alpha = ewma_alpha(span);
    let mut series = Vec::with_capacity(prices.len());

    let mut iter = prices.iter();
    let Some(&seed) = iter.next() else {
        return series;
    };

    let mut ewma = seed;
    series.push(ewma);
    for price in iter {
        ewma = (price - ewma) * alpha + ewma;
        series.push(ewma);
    }

    series
}

/// Fast and slow EWMA series computed over the same price window
#[derive(Debug, Clone, PartialEq)]
pub struct EwmaPair {
    pub fast: Vec<f64>,
    pub slow: Vec<f64>,
}

impl EwmaPair {
    /// Recompute both averages from index 0 of `prices`.
    /// Nothing carries over from a previous window.
    pub fn compute(prices: &[f64], fast_span: usize, slow_span: usize) -> Self {
        Self {
            fast: calculate_ewma_series(prices, fast_span),
            slow: calculate_ewma_series(prices, slow_span),
        }
    }

    pub fn len(&self) -> usize {
        self.fast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fast.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_alpha() {
        assert_close(ewma_alpha(10), 2.0 / 11.0);
        assert_close(ewma_alpha(20), 2.0 / 21.0);
    }

    #[test]
    fn test_ewma_recursion() {
        let series = calculate_ewma_series(&[1.0, 2.0, 3.0], 10);
        let alpha = 2.0 / 11.0;

        assert_eq!(series.len(), 3);
        assert_close(series[0], 1.0);
        assert_close(series[1], 1.181818181818);
        assert_close(series[2], alpha * 3.0 + (1.0 - alpha) * series[1]);
        assert_close(series[2], 1.512396694215);
    }

    #[test]
    fn test_ewma_empty_input() {
        assert!(calculate_ewma_series(&[], 10).is_empty());
    }

    #[test]
    fn test_ewma_single_price() {
        assert_eq!(calculate_ewma_series(&[1.2345], 20), vec![1.2345]);
    }

    #[test]
    fn test_flat_prices_keep_averages_equal() {
        let prices = vec![1.1; 25];
        let pair = EwmaPair::compute(&prices, 10, 20);

        assert_eq!(pair.fast, pair.slow);
        assert!(pair.fast.iter().all(|&v| v == 1.1));
    }

    #[test]
    fn test_fast_leads_slow_in_uptrend() {
        let prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let pair = EwmaPair::compute(&prices, 10, 20);

        assert_eq!(pair.len(), 20);
        assert_eq!(pair.fast[0], pair.slow[0]);
        for i in 1..pair.len() {
            assert!(pair.fast[i] > pair.slow[i]);
        }
    }

    #[test]
    fn test_recomputed_from_window_start() {
        let window_a = vec![1.0, 2.0, 3.0, 4.0];
        let window_b = vec![3.0, 4.0];

        // Same trailing prices, different seed: the latest value differs
        let a = calculate_ewma_series(&window_a, 10);
        let b = calculate_ewma_series(&window_b, 10);
        assert!(a[3] < b[1]);
    }
}

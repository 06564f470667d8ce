// Technical indicators module
// Exponentially weighted moving averages for the crossover strategy

pub mod moving_average;

pub use moving_average::{calculate_ewma_series, ewma_alpha, EwmaPair};

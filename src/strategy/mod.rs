// Trading strategy module
pub mod crossover;

pub use crossover::{
    tally_crossovers, Classification, CrossoverClassifier, CrossoverConfig, WindowTally,
};

// Core modules
pub mod config;
pub mod controller;
pub mod execution;
pub mod feed;
pub mod gateway;
pub mod indicators;
pub mod models;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use config::StrategyConfig;
pub use controller::{ShutdownReport, StrategyController};
pub use gateway::{Gateway, GatewayError, PaperGateway, SharedGateway};
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

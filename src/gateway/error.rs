//! Error types for gateway calls

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("No valid response after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Unknown ticket {0}")]
    UnknownTicket(u64),

    #[error("Not subscribed to {0}")]
    NotSubscribed(String),

    #[error("Gateway disconnected")]
    Disconnected,
}

impl GatewayError {
    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Timeout { .. } | GatewayError::Disconnected)
    }
}

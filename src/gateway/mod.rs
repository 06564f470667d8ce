// Broker connector seam: market data and order execution
pub mod error;
pub mod paper;
pub mod retry;

pub use error::GatewayError;
pub use paper::PaperGateway;
pub use retry::{retry_with_policy, RetryPolicy};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{ExecutionReport, OpenPosition, OrderIntent, TickSnapshot};

/// One connection covering both market data and order execution
///
/// Implementations are not expected to be safe for concurrent use; callers
/// share a single instance through [`SharedGateway`].
#[async_trait]
pub trait Gateway: Send {
    async fn subscribe(&mut self, symbol: &str) -> Result<(), GatewayError>;

    async fn unsubscribe(&mut self, symbol: &str) -> Result<(), GatewayError>;

    /// Return every tick received for `symbol` since the previous call and
    /// reset the pending set
    async fn snapshot_and_clear(&mut self, symbol: &str) -> TickSnapshot;

    async fn execute(
        &mut self,
        order: &OrderIntent,
        retry: &RetryPolicy,
    ) -> Result<ExecutionReport, GatewayError>;

    /// Open positions whose order comment matches `comment`, oldest first
    async fn open_positions(
        &mut self,
        comment: &str,
        retry: &RetryPolicy,
    ) -> Result<Vec<OpenPosition>, GatewayError>;

    async fn close_all_positions(&mut self) -> Result<usize, GatewayError>;
}

/// The single gateway connection, serialized behind one async lock
pub type SharedGateway<G> = Arc<Mutex<G>>;

pub fn shared<G: Gateway>(gateway: G) -> SharedGateway<G> {
    Arc::new(Mutex::new(gateway))
}

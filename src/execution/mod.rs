// Per-instrument execution: price window, order reconciliation, worker loop
pub mod price_buffer;
pub mod reconciler;
pub mod worker;

pub use price_buffer::{PriceBuffer, DEFAULT_BUFFER_CAP};
pub use reconciler::{plan_reconciliation, OrderReconciler, ReconcileOutcome, ReconcilePlan};
pub use worker::{CycleReport, InstrumentWorker, WorkerStats};

use std::time::Duration;
use tokio::sync::watch;

use super::{OrderReconciler, PriceBuffer, ReconcileOutcome};
use crate::config::StrategyConfig;
use crate::gateway::{Gateway, SharedGateway};
use crate::models::{Instrument, OrderTemplate, QuoteTick, Signal};
use crate::risk::CooldownGuard;
use crate::strategy::{CrossoverClassifier, WindowTally};

/// Running totals for one instrument worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub cycles: u64,
    pub ticks: u64,
    pub signals: u64,
    pub opened: u64,
    pub closed: u64,
    pub vetoes: u64,
    pub failures: u64,
}

impl WorkerStats {
    fn record(&mut self, outcome: &ReconcileOutcome) {
        self.closed += outcome.closed().len() as u64;
        match outcome {
            ReconcileOutcome::Opened { .. } => self.opened += 1,
            ReconcileOutcome::Vetoed(_) => self.vetoes += 1,
            ReconcileOutcome::Aborted { .. } => self.failures += 1,
            ReconcileOutcome::AlreadyPositioned { .. } => {}
        }
    }
}

/// What one poll cycle saw and did
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub ticks: usize,
    pub window: usize, // prices classified this cycle
    pub signal: Signal,
    pub tally: Option<WindowTally>,
    pub outcome: Option<ReconcileOutcome>,
}

impl CycleReport {
    fn idle(window: usize) -> Self {
        Self {
            ticks: 0,
            window,
            signal: Signal::Hold,
            tally: None,
            outcome: None,
        }
    }
}

/// Drives one instrument: poll, classify, reconcile, sleep
///
/// The worker owns its price buffer outright. Every gateway interaction
/// happens under the shared gateway lock; the averages and the
/// classification run outside it.
pub struct InstrumentWorker<G: Gateway> {
    instrument: Instrument,
    gateway: SharedGateway<G>,
    buffer: PriceBuffer,
    classifier: CrossoverClassifier,
    reconciler: OrderReconciler,
    poll_delay: Duration,
    market_open: watch::Receiver<bool>,
    stats: WorkerStats,
}

impl<G: Gateway> InstrumentWorker<G> {
    pub fn new(
        instrument: Instrument,
        config: &StrategyConfig,
        gateway: SharedGateway<G>,
        market_open: watch::Receiver<bool>,
    ) -> Self {
        let template = OrderTemplate::new(
            instrument.clone(),
            config.sl_tp_points,
            config.magic_number,
        );
        let reconciler = OrderReconciler::new(
            template,
            CooldownGuard::new(config.cooldown(), config.broker_gmt_offset_hours),
            config.retry.clone(),
            config.close_pause(),
            config.verbose,
        );

        Self {
            instrument,
            gateway,
            buffer: PriceBuffer::new(config.buffer_cap),
            classifier: CrossoverClassifier::new(config.crossover.clone()),
            reconciler,
            poll_delay: config.poll_delay(),
            market_open,
            stats: WorkerStats::default(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.instrument.symbol
    }

    pub fn buffer(&self) -> &PriceBuffer {
        &self.buffer
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    fn is_market_open(&self) -> bool {
        *self.market_open.borrow()
    }

    /// Run cycles until the market-open flag drops
    ///
    /// The flag is read only at the top of each iteration, so a cycle that
    /// has started always finishes, including its orders. A shutdown
    /// request does cut the inter-cycle sleep short.
    pub async fn run(mut self) -> WorkerStats {
        tracing::info!(symbol = %self.symbol(), "Trader starting");

        while self.is_market_open() {
            self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_delay) => {}
                changed = self.market_open.changed() => {
                    if changed.is_err() {
                        tracing::warn!(symbol = %self.symbol(), "Controller gone, stopping");
                        break;
                    }
                }
            }
        }

        tracing::info!(
            symbol = %self.symbol(),
            cycles = self.stats.cycles,
            opened = self.stats.opened,
            closed = self.stats.closed,
            "Trader stopped"
        );
        self.stats
    }

    /// One poll, classify, reconcile pass
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.stats.cycles += 1;

        let snapshot = {
            let mut gateway = self.gateway.lock().await;
            gateway.snapshot_and_clear(&self.instrument.symbol).await
        };

        if snapshot.is_empty() {
            tracing::debug!(symbol = %self.symbol(), "No new ticks");
            return CycleReport::idle(self.buffer.len());
        }

        let ticks = snapshot.len();
        self.stats.ticks += ticks as u64;
        self.buffer.append(snapshot.values().map(QuoteTick::close));

        let prices = self.buffer.snapshot();
        let classification = self.classifier.evaluate(&prices);
        tracing::debug!(
            symbol = %self.symbol(),
            window = prices.len(),
            tally = ?classification.tally,
            "Analyzing"
        );

        let outcome = if classification.signal == Signal::Hold {
            None
        } else {
            self.stats.signals += 1;
            tracing::info!(symbol = %self.symbol(), "Signal: {:?}", classification.signal);

            let mut gateway = self.gateway.lock().await;
            self.reconciler
                .reconcile(&mut *gateway, classification.signal)
                .await
        };

        if let Some(outcome) = &outcome {
            self.stats.record(outcome);
            tracing::info!(symbol = %self.symbol(), "Decision: {}", outcome.reason());
        }

        self.buffer.trim();

        CycleReport {
            ticks,
            window: prices.len(),
            signal: classification.signal,
            tally: classification.tally,
            outcome,
        }
    }
}

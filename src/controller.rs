use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::StrategyConfig;
use crate::execution::{InstrumentWorker, WorkerStats};
use crate::gateway::{Gateway, SharedGateway};

/// Per-worker totals collected at shutdown
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    pub workers: Vec<(String, WorkerStats)>,
    pub residual_closed: usize,
}

impl ShutdownReport {
    pub fn total_opened(&self) -> u64 {
        self.workers.iter().map(|(_, s)| s.opened).sum()
    }

    pub fn total_closed(&self) -> u64 {
        self.workers.iter().map(|(_, s)| s.closed).sum()
    }
}

/// Launches one worker per instrument and shuts them down in order
pub struct StrategyController<G: Gateway + 'static> {
    config: StrategyConfig,
    gateway: SharedGateway<G>,
    market_open: watch::Sender<bool>,
    traders: Vec<(String, JoinHandle<WorkerStats>)>,
}

impl<G: Gateway + 'static> StrategyController<G> {
    pub fn new(config: StrategyConfig, gateway: SharedGateway<G>) -> Self {
        let (market_open, _) = watch::channel(false);
        Self {
            config,
            gateway,
            market_open,
            traders: Vec::new(),
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn gateway(&self) -> SharedGateway<G> {
        self.gateway.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.traders.is_empty()
    }

    /// Subscribe every instrument, then spawn one worker per instrument
    ///
    /// If any subscription fails, the ones already made are undone and no
    /// worker is started.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        if self.is_running() {
            anyhow::bail!("{} is already running", self.config.name);
        }
        self.config.validate()?;
        self.subscribe_all().await?;

        self.market_open.send_replace(true);
        for instrument in &self.config.instruments {
            let worker = InstrumentWorker::new(
                instrument.clone(),
                &self.config,
                self.gateway.clone(),
                self.market_open.subscribe(),
            );
            self.traders
                .push((instrument.symbol.clone(), tokio::spawn(worker.run())));

            tracing::info!("[{}] Alright, here we go", instrument.comment());
        }

        Ok(())
    }

    async fn subscribe_all(&self) -> anyhow::Result<()> {
        let mut gateway = self.gateway.lock().await;
        let mut subscribed: Vec<&str> = Vec::with_capacity(self.config.instruments.len());

        for instrument in &self.config.instruments {
            if let Err(e) = gateway.subscribe(&instrument.symbol).await {
                for symbol in subscribed {
                    if let Err(undo) = gateway.unsubscribe(symbol).await {
                        tracing::warn!("Unsubscribe {} failed: {}", symbol, undo);
                    }
                }
                anyhow::bail!("Subscribe {} failed: {}", instrument.symbol, e);
            }
            subscribed.push(&instrument.symbol);
        }

        Ok(())
    }

    /// Stop every worker, then unsubscribe feeds and close whatever is left
    ///
    /// Workers finish their in-flight cycle before exiting.
    pub async fn stop(&mut self) -> anyhow::Result<ShutdownReport> {
        self.market_open.send_replace(false);

        let mut report = ShutdownReport::default();
        for (symbol, handle) in self.traders.drain(..) {
            match handle.await {
                Ok(stats) => {
                    tracing::info!("[{}_Trader] .. and that's a wrap!", symbol);
                    report.workers.push((symbol, stats));
                }
                Err(e) => {
                    tracing::error!("[{}_Trader] worker failed: {}", symbol, e);
                    report.workers.push((symbol, WorkerStats::default()));
                }
            }
        }

        let mut gateway = self.gateway.lock().await;
        for instrument in &self.config.instruments {
            if let Err(e) = gateway.unsubscribe(&instrument.symbol).await {
                tracing::warn!("Unsubscribe {} failed: {}", instrument.symbol, e);
            }
        }

        report.residual_closed = gateway
            .close_all_positions()
            .await
            .map_err(|e| anyhow::anyhow!("Mass close failed: {}", e))?;

        tracing::info!(
            opened = report.total_opened(),
            closed = report.total_closed(),
            residual = report.residual_closed,
            "{} stopped",
            self.config.name
        );

        Ok(report)
    }
}

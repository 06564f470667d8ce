use chrono::NaiveDateTime;
use std::time::Duration;

use crate::gateway::{Gateway, GatewayError, RetryPolicy};
use crate::models::{OpenPosition, OrderTemplate, Side, Signal};
use crate::risk::{CooldownGuard, CooldownVeto};

/// What to do with a position snapshot, decided before any order goes out
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcilePlan {
    Vetoed(CooldownVeto),
    Act {
        close: Vec<OpenPosition>,
        open: Option<Side>,
    },
}

/// Build the plan for a signal pointing at `target` side
///
/// Any position younger than the cooldown window vetoes the whole cycle.
/// Otherwise every opposite-side position is closed and a new order is
/// opened only when no `target`-side position is already open.
pub fn plan_reconciliation(
    target: Side,
    positions: &[OpenPosition],
    guard: &CooldownGuard,
    now: NaiveDateTime,
) -> ReconcilePlan {
    let mut close = Vec::new();
    let mut already_positioned = false;

    for position in positions {
        if let Err(veto) = guard.check_at(now, position) {
            return ReconcilePlan::Vetoed(veto);
        }

        if position.side == target {
            already_positioned = true;
        } else {
            close.push(position.clone());
        }
    }

    ReconcilePlan::Act {
        close,
        open: (!already_positioned).then_some(target),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Position opened inside the cooldown window; nothing sent
    Vetoed(CooldownVeto),
    /// Target side was already held; opposite positions (if any) closed
    AlreadyPositioned { side: Side, closed: Vec<u64> },
    /// Opposite positions closed and a new position opened
    Opened {
        side: Side,
        ticket: u64,
        closed: Vec<u64>,
    },
    /// A gateway call failed; the rest of the cycle was skipped
    Aborted { closed: Vec<u64>, error: GatewayError },
}

impl ReconcileOutcome {
    pub fn closed(&self) -> &[u64] {
        match self {
            ReconcileOutcome::Vetoed(_) => &[],
            ReconcileOutcome::AlreadyPositioned { closed, .. }
            | ReconcileOutcome::Opened { closed, .. }
            | ReconcileOutcome::Aborted { closed, .. } => closed,
        }
    }

    pub fn reason(&self) -> String {
        match self {
            ReconcileOutcome::Vetoed(veto) => format!(
                "Cooldown: ticket {} opened {}s ago",
                veto.ticket,
                veto.elapsed.num_seconds()
            ),
            ReconcileOutcome::AlreadyPositioned { side, closed } => format!(
                "Already {:?}, closed {} opposite positions",
                side,
                closed.len()
            ),
            ReconcileOutcome::Opened { side, ticket, closed } => format!(
                "Opened {:?} ticket {} after closing {} positions",
                side,
                ticket,
                closed.len()
            ),
            ReconcileOutcome::Aborted { closed, error } => format!(
                "Aborted after {} closes: {}",
                closed.len(),
                error
            ),
        }
    }
}

/// Reconciles a directional signal against the broker's open positions
#[derive(Debug, Clone)]
pub struct OrderReconciler {
    template: OrderTemplate,
    guard: CooldownGuard,
    retry: RetryPolicy,
    close_pause: Duration,
    verbose: bool,
}

impl OrderReconciler {
    pub fn new(
        template: OrderTemplate,
        guard: CooldownGuard,
        retry: RetryPolicy,
        close_pause: Duration,
        verbose: bool,
    ) -> Self {
        Self {
            template,
            guard,
            retry,
            close_pause,
            verbose,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.template.instrument().symbol
    }

    /// Query open positions and act on `signal`. Must be called with the
    /// gateway lock held. Returns `None` for [`Signal::Hold`].
    pub async fn reconcile<G>(&self, gateway: &mut G, signal: Signal) -> Option<ReconcileOutcome>
    where
        G: Gateway + ?Sized,
    {
        let target = signal.side()?;
        let comment = self.template.instrument().comment();

        let positions = match gateway.open_positions(&comment, &self.retry).await {
            Ok(positions) => positions,
            Err(error) => {
                tracing::error!(symbol = %self.symbol(), "Open position query failed: {}", error);
                return Some(ReconcileOutcome::Aborted {
                    closed: Vec::new(),
                    error,
                });
            }
        };

        Some(self.apply(gateway, target, &positions, self.guard.now()).await)
    }

    /// Apply the plan for `positions`, stopping at the first failed call
    pub async fn apply<G>(
        &self,
        gateway: &mut G,
        target: Side,
        positions: &[OpenPosition],
        now: NaiveDateTime,
    ) -> ReconcileOutcome
    where
        G: Gateway + ?Sized,
    {
        let (close, open) = match plan_reconciliation(target, positions, &self.guard, now) {
            ReconcilePlan::Vetoed(veto) => {
                tracing::info!(
                    symbol = %self.symbol(),
                    ticket = veto.ticket,
                    "Cooldown veto, ticket opened {}s ago",
                    veto.elapsed.num_seconds()
                );
                return ReconcileOutcome::Vetoed(veto);
            }
            ReconcilePlan::Act { close, open } => (close, open),
        };

        let mut closed = Vec::with_capacity(close.len());
        for position in &close {
            match gateway.execute(&self.template.close(position), &self.retry).await {
                Ok(report) => {
                    tracing::info!(symbol = %self.symbol(), ticket = position.ticket, "Closed {:?}", position.side);
                    if self.verbose {
                        tracing::info!("  Response: {}", report.payload);
                    }
                    closed.push(position.ticket);
                    tokio::time::sleep(self.close_pause).await;
                }
                Err(error) => {
                    tracing::error!(symbol = %self.symbol(), ticket = position.ticket, "Close failed: {}", error);
                    return ReconcileOutcome::Aborted { closed, error };
                }
            }
        }

        let Some(side) = open else {
            tracing::debug!(symbol = %self.symbol(), "Already {:?}, no new order", target);
            return ReconcileOutcome::AlreadyPositioned {
                side: target,
                closed,
            };
        };

        let verb = match side {
            Side::Long => "BUY",
            Side::Short => "SELL",
        };
        tracing::info!(symbol = %self.symbol(), "{} at broker time {}", verb, now);

        match gateway.execute(&self.template.open(side), &self.retry).await {
            Ok(report) => {
                if self.verbose {
                    tracing::info!("  Response: {}", report.payload);
                }
                ReconcileOutcome::Opened {
                    side,
                    ticket: report.ticket,
                    closed,
                }
            }
            Err(error) => {
                tracing::error!(symbol = %self.symbol(), "Open {:?} failed: {}", side, error);
                ReconcileOutcome::Aborted { closed, error }
            }
        }
    }
}

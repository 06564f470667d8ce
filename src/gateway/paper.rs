use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::{retry_with_policy, Gateway, GatewayError, RetryPolicy};
use crate::models::{
    broker_now, ExecutionReport, OpenPosition, OrderAction, OrderIntent, QuoteTick, Side,
    TickSnapshot,
};

#[derive(Debug, Clone)]
struct PaperPosition {
    symbol: String,
    comment: String,
    side: Side,
    lots: Decimal,
    magic: u32,
    open_time: NaiveDateTime,
}

/// Scripted failures, consumed one per call attempt
#[derive(Debug, Default)]
struct FailureScript {
    execute_successes_first: u32,
    execute_timeouts: u32,
    query_timeouts: u32,
    reject_next: Option<String>,
    refused_subscriptions: HashSet<String>,
}

/// In-memory broker connector
///
/// Collects ticks for subscribed symbols, fills every order immediately and
/// stamps positions with broker server time. Failures can be scripted to
/// exercise the strategy's error paths.
pub struct PaperGateway {
    broker_gmt_offset_hours: i64,
    subscriptions: HashSet<String>,
    pending: HashMap<String, TickSnapshot>,
    positions: BTreeMap<u64, PaperPosition>,
    next_ticket: u64,
    executed: Vec<OrderIntent>,
    failures: FailureScript,
}

impl PaperGateway {
    pub fn new(broker_gmt_offset_hours: i64) -> Self {
        Self {
            broker_gmt_offset_hours,
            subscriptions: HashSet::new(),
            pending: HashMap::new(),
            positions: BTreeMap::new(),
            next_ticket: 1,
            executed: Vec::new(),
            failures: FailureScript::default(),
        }
    }

    /// Deliver a tick. Ticks for unsubscribed symbols are dropped.
    pub fn push_tick(&mut self, symbol: &str, timestamp: NaiveDateTime, tick: QuoteTick) -> bool {
        if !self.subscriptions.contains(symbol) {
            return false;
        }
        self.pending
            .entry(symbol.to_string())
            .or_default()
            .insert(timestamp, tick);
        true
    }

    /// Place a position directly on the book, bypassing order execution
    pub fn seed_position(
        &mut self,
        symbol: &str,
        side: Side,
        lots: Decimal,
        open_time: NaiveDateTime,
    ) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.positions.insert(
            ticket,
            PaperPosition {
                symbol: symbol.to_string(),
                comment: format!("{}_Trader", symbol),
                side,
                lots,
                magic: 0,
                open_time,
            },
        );
        ticket
    }

    /// Make the next `n` execution attempts time out
    pub fn fail_next_executions(&mut self, n: u32) {
        self.fail_executions_after(0, n);
    }

    /// Let `successes` executions through, then time out the next `n` attempts
    pub fn fail_executions_after(&mut self, successes: u32, n: u32) {
        self.failures.execute_successes_first = successes;
        self.failures.execute_timeouts = n;
    }

    /// Make the next `n` position query attempts time out
    pub fn fail_next_position_queries(&mut self, n: u32) {
        self.failures.query_timeouts = n;
    }

    /// Refuse every subscription request for `symbol`
    pub fn refuse_subscription(&mut self, symbol: impl Into<String>) {
        self.failures.refused_subscriptions.insert(symbol.into());
    }

    /// Drop every scripted failure still pending
    pub fn clear_failures(&mut self) {
        self.failures = FailureScript::default();
    }

    pub fn reject_next_execution(&mut self, reason: impl Into<String>) {
        self.failures.reject_next = Some(reason.into());
    }

    /// Every order the paper broker accepted, in arrival order
    pub fn executed_orders(&self) -> &[OrderIntent] {
        &self.executed
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions_for(&self, symbol: &str) -> Vec<OpenPosition> {
        self.positions
            .iter()
            .filter(|(_, p)| p.symbol == symbol)
            .map(|(&ticket, p)| OpenPosition {
                ticket,
                side: p.side,
                open_time: p.open_time,
            })
            .collect()
    }

    pub fn is_subscribed(&self, symbol: &str) -> bool {
        self.subscriptions.contains(symbol)
    }

    pub fn pending_ticks(&self, symbol: &str) -> usize {
        self.pending.get(symbol).map(|t| t.len()).unwrap_or(0)
    }

    fn try_execute(&mut self, order: &OrderIntent) -> Result<ExecutionReport, GatewayError> {
        if self.failures.execute_timeouts > 0 {
            if self.failures.execute_successes_first > 0 {
                self.failures.execute_successes_first -= 1;
            } else {
                self.failures.execute_timeouts -= 1;
                return Err(GatewayError::Timeout { attempts: 1 });
            }
        }
        if let Some(reason) = self.failures.reject_next.take() {
            return Err(GatewayError::Rejected(reason));
        }

        let report = match order.action {
            OrderAction::Open => {
                let ticket = self.next_ticket;
                self.next_ticket += 1;
                let open_time = broker_now(self.broker_gmt_offset_hours);
                self.positions.insert(
                    ticket,
                    PaperPosition {
                        symbol: order.symbol.clone(),
                        comment: order.comment.clone(),
                        side: order.side,
                        lots: order.lots,
                        magic: order.magic,
                        open_time,
                    },
                );
                ExecutionReport {
                    action: OrderAction::Open,
                    ticket,
                    payload: json!({
                        "_action": "EXECUTION",
                        "_magic": order.magic,
                        "_ticket": ticket,
                        "_type": order.side.order_type(),
                        "_lots": order.lots.to_string(),
                        "_open_time": open_time.format("%Y.%m.%d %H:%M:%S").to_string(),
                    }),
                }
            }
            OrderAction::Close => {
                let ticket = order
                    .ticket
                    .ok_or_else(|| GatewayError::Rejected("close without ticket".to_string()))?;
                let closed = self
                    .positions
                    .remove(&ticket)
                    .ok_or(GatewayError::UnknownTicket(ticket))?;
                ExecutionReport {
                    action: OrderAction::Close,
                    ticket,
                    payload: json!({
                        "_action": "CLOSE",
                        "_ticket": ticket,
                        "_magic": closed.magic,
                        "_close_lots": closed.lots.to_string(),
                        "_response": "CLOSE_MARKET",
                    }),
                }
            }
        };

        self.executed.push(order.clone());
        Ok(report)
    }

    fn try_query(&mut self, comment: &str) -> Result<Vec<OpenPosition>, GatewayError> {
        if self.failures.query_timeouts > 0 {
            self.failures.query_timeouts -= 1;
            return Err(GatewayError::Timeout { attempts: 1 });
        }

        Ok(self
            .positions
            .iter()
            .filter(|(_, p)| p.comment == comment)
            .map(|(&ticket, p)| OpenPosition {
                ticket,
                side: p.side,
                open_time: p.open_time,
            })
            .collect())
    }
}

#[async_trait]
impl Gateway for PaperGateway {
    async fn subscribe(&mut self, symbol: &str) -> Result<(), GatewayError> {
        if self.failures.refused_subscriptions.contains(symbol) {
            return Err(GatewayError::Rejected(format!("unknown symbol {}", symbol)));
        }
        self.subscriptions.insert(symbol.to_string());
        tracing::debug!(symbol, "Subscribed to market data");
        Ok(())
    }

    async fn unsubscribe(&mut self, symbol: &str) -> Result<(), GatewayError> {
        if !self.subscriptions.remove(symbol) {
            return Err(GatewayError::NotSubscribed(symbol.to_string()));
        }
        self.pending.remove(symbol);
        tracing::debug!(symbol, "Unsubscribed from market data");
        Ok(())
    }

    async fn snapshot_and_clear(&mut self, symbol: &str) -> TickSnapshot {
        self.pending.remove(symbol).unwrap_or_default()
    }

    async fn execute(
        &mut self,
        order: &OrderIntent,
        retry: &RetryPolicy,
    ) -> Result<ExecutionReport, GatewayError> {
        retry_with_policy(retry, || self.try_execute(order)).await
    }

    async fn open_positions(
        &mut self,
        comment: &str,
        retry: &RetryPolicy,
    ) -> Result<Vec<OpenPosition>, GatewayError> {
        retry_with_policy(retry, || self.try_query(comment)).await
    }

    async fn close_all_positions(&mut self) -> Result<usize, GatewayError> {
        let closed = self.positions.len();
        self.positions.clear();
        tracing::info!("Paper broker closed {} residual positions", closed);
        Ok(closed)
    }
}

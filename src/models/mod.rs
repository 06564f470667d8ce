use chrono::{Duration, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tradable instrument and the lot size every order for it uses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub lot_size: Decimal,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, lot_size: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            lot_size,
        }
    }

    /// Comment tag stamped on orders, also used to filter open positions
    pub fn comment(&self) -> String {
        format!("{}_Trader", self.symbol)
    }
}

/// A single quote update as delivered by the market data gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct QuoteTick {
    pub bid: f64,
    pub ask: f64,
}

impl QuoteTick {
    pub fn new(bid: f64, ask: f64) -> Self {
        Self { bid, ask }
    }

    /// Price fed into the moving averages (the bid side)
    pub fn close(&self) -> f64 {
        self.bid
    }
}

/// Ticks received since the last drain, keyed by broker timestamp
pub type TickSnapshot = BTreeMap<NaiveDateTime, QuoteTick>;

/// Position direction. Discriminants follow the broker's order type codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    Long = 0,
    Short = 1,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    pub fn order_type(self) -> u8 {
        self as u8
    }
}

/// Open trade as reported by the execution gateway.
/// Never cached by the strategy across cycles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenPosition {
    pub ticket: u64,
    pub side: Side,
    pub open_time: NaiveDateTime, // broker server time
}

/// Directional call produced by the crossover classifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    Bullish,
    Bearish,
    Hold,
}

impl Signal {
    /// Side a new order takes for this signal, if any
    pub fn side(self) -> Option<Side> {
        match self {
            Signal::Bullish => Some(Side::Long),
            Signal::Bearish => Some(Side::Short),
            Signal::Hold => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderAction {
    Open,
    Close,
}

/// Instruction sent to the execution gateway. Built fresh for every order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderIntent {
    pub action: OrderAction,
    pub side: Side,
    pub symbol: String,
    pub lots: Decimal,
    pub price: f64, // 0.0 = market
    pub stop_loss_points: u32,
    pub take_profit_points: u32,
    pub comment: String,
    pub magic: u32,
    pub ticket: Option<u64>, // target of a CLOSE
}

/// Per-instrument defaults every order intent is stamped from
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTemplate {
    instrument: Instrument,
    sl_tp_points: u32,
    magic: u32,
}

impl OrderTemplate {
    pub fn new(instrument: Instrument, sl_tp_points: u32, magic: u32) -> Self {
        Self {
            instrument,
            sl_tp_points,
            magic,
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn open(&self, side: Side) -> OrderIntent {
        OrderIntent {
            action: OrderAction::Open,
            side,
            symbol: self.instrument.symbol.clone(),
            lots: self.instrument.lot_size,
            price: 0.0,
            stop_loss_points: self.sl_tp_points,
            take_profit_points: self.sl_tp_points,
            comment: self.instrument.comment(),
            magic: self.magic,
            ticket: None,
        }
    }

    pub fn close(&self, position: &OpenPosition) -> OrderIntent {
        OrderIntent {
            action: OrderAction::Close,
            side: position.side,
            ticket: Some(position.ticket),
            ..self.open(position.side)
        }
    }
}

/// Gateway acknowledgement of an executed order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub action: OrderAction,
    pub ticket: u64,
    pub payload: serde_json::Value,
}

/// Current broker server time: UTC shifted by the broker's GMT offset
pub fn broker_now(gmt_offset_hours: i64) -> NaiveDateTime {
    Utc::now().naive_utc() + Duration::hours(gmt_offset_hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eurusd() -> Instrument {
        Instrument::new("EURUSD", Decimal::new(1, 2))
    }

    #[test]
    fn test_instrument_comment() {
        assert_eq!(eurusd().comment(), "EURUSD_Trader");
    }

    #[test]
    fn test_side_codes() {
        assert_eq!(Side::Long.order_type(), 0);
        assert_eq!(Side::Short.order_type(), 1);
        assert_eq!(Side::Long.opposite(), Side::Short);
    }

    #[test]
    fn test_open_intent_defaults() {
        let template = OrderTemplate::new(eurusd(), 100, 123456);
        let order = template.open(Side::Short);

        assert_eq!(order.action, OrderAction::Open);
        assert_eq!(order.side, Side::Short);
        assert_eq!(order.lots, Decimal::new(1, 2));
        assert_eq!(order.stop_loss_points, 100);
        assert_eq!(order.take_profit_points, 100);
        assert_eq!(order.comment, "EURUSD_Trader");
        assert_eq!(order.magic, 123456);
        assert_eq!(order.price, 0.0);
        assert!(order.ticket.is_none());
    }

    #[test]
    fn test_close_intent_targets_ticket() {
        let template = OrderTemplate::new(eurusd(), 100, 123456);
        let position = OpenPosition {
            ticket: 42,
            side: Side::Long,
            open_time: broker_now(3),
        };

        let order = template.close(&position);
        assert_eq!(order.action, OrderAction::Close);
        assert_eq!(order.ticket, Some(42));
        assert_eq!(order.comment, "EURUSD_Trader");
    }

    #[test]
    fn test_signal_side() {
        assert_eq!(Signal::Bullish.side(), Some(Side::Long));
        assert_eq!(Signal::Bearish.side(), Some(Side::Short));
        assert_eq!(Signal::Hold.side(), None);
    }
}

//! Type definitions for the Hyperliquid API surface.
//!
//! This module contains the types exchanged with both endpoints and the
//! WebSocket stream:
//!
//! # Trading
//! - [`OrderRequest`], [`OrderType`], [`Tif`], [`TpSl`]: order placement
//! - [`ModifyRequest`], [`CancelRequest`], [`CancelByCloidRequest`]
//! - [`OrderResponseStatus`], [`OrderStatus`]: order lifecycle results
//!
//! # WebSocket
//! - [`Subscription`]: the closed set of channel tuples
//! - [`Incoming`]: every message variant the stream can deliver
//! - [`Trade`], [`L2Book`], [`Bbo`], [`Candle`], [`Fill`], [`OrderUpdate`]
//!
//! # Info queries
//! - [`Meta`], [`SpotMeta`], [`PerpDex`]: universe metadata
//! - [`ClearinghouseState`], [`SpotUserState`]: account state
//! - plus the response shapes of the remaining `/info` request types
//!
//! Parsed market data uses [`rust_decimal::Decimal`]; the signed order path
//! carries pre-stringified wire values instead (see
//! [`crate::utils::float_to_wire`]), so no raw float ever reaches the
//! canonical encoder.

use std::{collections::HashMap, fmt};

use alloy::primitives::{B128, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::Cloid;

pub mod api;
pub(crate) mod solidity;

/// Side for a trade or an order.
///
/// `Bid` represents a buy order, `Ask` represents a sell order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
pub enum Side {
    #[serde(rename = "B")]
    Bid,
    #[serde(rename = "A")]
    Ask,
}

/// Order identifier: either the exchange-assigned numeric id or the
/// caller-supplied client order id.
///
/// Serializes as a bare number or as the canonical `0x`-prefixed cloid
/// string, which is the shape both the `orderStatus` query and the `modify`
/// action expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidOrCloid {
    /// Exchange-assigned order id.
    Oid(u64),
    /// Client order id.
    Cloid(Cloid),
}

impl Serialize for OidOrCloid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Oid(oid) => serializer.serialize_u64(*oid),
            Self::Cloid(cloid) => serializer.serialize_str(&format!("{cloid:#x}")),
        }
    }
}

impl From<u64> for OidOrCloid {
    fn from(oid: u64) -> Self {
        Self::Oid(oid)
    }
}

impl From<Cloid> for OidOrCloid {
    fn from(cloid: Cloid) -> Self {
        Self::Cloid(cloid)
    }
}

impl fmt::Display for OidOrCloid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Oid(oid) => write!(f, "{oid}"),
            Self::Cloid(cloid) => write!(f, "{cloid:#x}"),
        }
    }
}

/// An ECDSA signature split into its components.
///
/// `r` and `s` are emitted as minimal big-int hex strings with the `0x`
/// prefix (no leading-zero padding); `v` is normalized to 27 or 28.
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct Signature {
    #[serde(
        serialize_with = "serialize_u256_as_hex",
        deserialize_with = "deserialize_u256_from_hex"
    )]
    pub r: U256,
    #[serde(
        serialize_with = "serialize_u256_as_hex",
        deserialize_with = "deserialize_u256_from_hex"
    )]
    pub s: U256,
    pub v: u64,
}

fn serialize_u256_as_hex<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:#x}"))
}

fn deserialize_u256_from_hex<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.strip_prefix("0x").unwrap_or(&s);
    U256::from_str_radix(s, 16).map_err(serde::de::Error::custom)
}

impl fmt::Display for Signature {
    /// Formats the signature in the standard 65-byte Ethereum layout:
    /// `0x{r:064x}{s:064x}{v:02x}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:064x}{:064x}{:02x}", self.r, self.s, self.v)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("r", &format!("0x{:x}", self.r))
            .field("s", &format!("0x{:x}", self.s))
            .field("v", &self.v)
            .finish()
    }
}

impl From<alloy::signers::Signature> for Signature {
    fn from(signature: alloy::signers::Signature) -> Self {
        let v = signature.recid().to_byte() as u64 + 27;
        Self {
            r: signature.r(),
            s: signature.s(),
            v,
        }
    }
}

// ========================================================
// ORDER PLACEMENT TYPES
// ========================================================

/// A single order to place.
///
/// Prices and sizes are plain floats here; they are converted to the wire
/// string format (and validated against it) when the action is built, so a
/// price that cannot round-trip through 8 fractional digits is rejected
/// before anything is signed.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Market symbol (e.g. "BTC", "PURR/USDC").
    pub coin: String,
    /// `true` to buy, `false` to sell.
    pub is_buy: bool,
    /// Limit price.
    pub limit_px: f64,
    /// Size in base units.
    pub sz: f64,
    /// When `true`, the order can only reduce an existing position.
    pub reduce_only: bool,
    /// Limit or trigger parameters.
    pub order_type: OrderType,
    /// Optional client order id; the `0x` prefix may be omitted.
    pub cloid: Option<String>,
}

/// Order behaviour: resting limit or trigger.
#[derive(Debug, Clone)]
pub enum OrderType {
    /// Limit order with the given time-in-force.
    Limit {
        tif: Tif,
    },
    /// Trigger (stop / take-profit) order.
    Trigger {
        trigger_px: f64,
        is_market: bool,
        tpsl: TpSl,
    },
}

pub use api::{Grouping, Tif, TpSl};

/// Modification of an existing order, identified by oid or cloid.
#[derive(Debug, Clone)]
pub struct ModifyRequest {
    /// The order to modify.
    pub oid: OidOrCloid,
    /// Replacement order parameters.
    pub order: OrderRequest,
}

/// Cancel by exchange order id.
#[derive(Debug, Clone)]
pub struct CancelRequest {
    pub coin: String,
    pub oid: u64,
}

/// Cancel by client order id.
#[derive(Debug, Clone)]
pub struct CancelByCloidRequest {
    pub coin: String,
    /// Client order id; the `0x` prefix may be omitted.
    pub cloid: String,
}

/// Builder attribution for an order batch: the builder address and its fee
/// in tenths of a basis point.
#[derive(Debug, Clone)]
pub struct Builder {
    pub address: String,
    pub fee: u64,
}

/// Response to an order insertion.
///
/// # Variants
///
/// - **Resting**: the order is on the book
/// - **Filled**: the order executed immediately
/// - **Error**: the order was rejected with an error message
/// - **Success**: generic acceptance without further detail
///
/// # Example
///
/// ```rust
/// use hyperliquid_client::types::OrderResponseStatus;
///
/// # fn handle(status: OrderResponseStatus) {
/// match status {
///     OrderResponseStatus::Resting { oid, .. } => println!("resting: {oid}"),
///     OrderResponseStatus::Filled { oid, avg_px, total_sz } => {
///         println!("filled {total_sz} @ {avg_px} ({oid})");
///     }
///     OrderResponseStatus::Error(err) => eprintln!("rejected: {err}"),
///     OrderResponseStatus::Success => {}
/// }
/// # }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderResponseStatus {
    /// Order accepted (generic).
    Success,
    /// Order resting on the book.
    Resting {
        oid: u64,
        #[serde(default)]
        cloid: Option<B128>,
    },
    /// Order immediately filled.
    Filled {
        #[serde(rename = "totalSz")]
        total_sz: Decimal,
        #[serde(rename = "avgPx")]
        avg_px: Decimal,
        oid: u64,
    },
    /// Order rejected with an error message.
    Error(String),
}

impl OrderResponseStatus {
    /// Returns true if the order was accepted.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Error(_))
    }

    /// Returns the error message if this is an error status.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the order id for resting or filled orders.
    #[must_use]
    pub fn oid(&self) -> Option<u64> {
        match self {
            Self::Resting { oid, .. } | Self::Filled { oid, .. } => Some(*oid),
            _ => None,
        }
    }
}

/// Order lifecycle status as reported by order updates and status queries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
    /// Order is active on the book
    Open,
    /// Order was completely filled
    Filled,
    /// User-requested cancellation
    Canceled,
    /// Trigger order activated
    Triggered,
    /// Generic rejection
    Rejected,
    /// Cancelled due to insufficient margin
    MarginCanceled,
    /// Cancelled due to vault withdrawal
    VaultWithdrawalCanceled,
    /// Cancelled due to open interest cap
    OpenInterestCapCanceled,
    /// Cancelled to prevent self-trading
    SelfTradeCanceled,
    /// Reduce-only order would increase position
    ReduceOnlyCanceled,
    /// Associated order was filled
    SiblingFilledCanceled,
    /// Market was delisted
    DelistedCanceled,
    /// Position was liquidated
    LiquidatedCanceled,
    /// User-scheduled cancellation
    ScheduledCancel,
    /// Price doesn't match tick size
    TickRejected,
    /// Order value below minimum
    MinTradeNtlRejected,
    /// Insufficient margin for perp
    PerpMarginRejected,
    /// Reduce-only would increase position
    ReduceOnlyRejected,
    /// ALO price would take liquidity
    BadAloPxRejected,
    /// IOC unfilled portion cancelled
    IocCancelRejected,
    /// Invalid trigger price
    BadTriggerPxRejected,
    /// No liquidity for market order
    MarketOrderNoLiquidityRejected,
    /// Would exceed open interest cap
    PositionIncreaseAtOpenInterestCapRejected,
    /// Would flip position at cap
    PositionFlipAtOpenInterestCapRejected,
    /// Too aggressive near cap
    TooAggressiveAtOpenInterestCapRejected,
    /// Would exceed open interest limit
    OpenInterestIncreaseRejected,
    /// Insufficient spot balance
    InsufficientSpotBalanceRejected,
    /// Oracle check failed
    OracleRejected,
    /// Would exceed max position
    PerpMaxPositionRejected,
}

impl OrderStatus {
    /// Returns whether the order is in a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(self, OrderStatus::Open)
    }

    /// Returns whether the order was successfully filled.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        matches!(self, OrderStatus::Filled)
    }
}

// ========================================================
// WEBSOCKET TYPES
// ========================================================

/// WebSocket subscription request.
///
/// Each variant is one channel tuple; the discriminator fields (coin,
/// interval, user, dex) identify the stream within its channel. At most one
/// wire-level subscription exists per distinct tuple regardless of how many
/// callbacks are attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Subscription {
    /// Mid prices for all markets.
    AllMids {
        #[serde(skip_serializing_if = "Option::is_none")]
        dex: Option<String>,
    },
    /// Real-time trade feed for a coin.
    Trades { coin: String },
    /// Order book snapshots for a coin.
    L2Book { coin: String },
    /// Best bid and offer for a coin.
    Bbo { coin: String },
    /// Candle updates for a coin and interval.
    Candle { coin: String, interval: String },
    /// Perp or spot asset context for a coin.
    ActiveAssetCtx { coin: String },
    /// Server notifications for a user.
    Notification { user: String },
    /// Order status updates for a user.
    OrderUpdates { user: String },
    /// Fill events for a user.
    UserFills { user: String },
    /// Frontend aggregate state for a user.
    WebData2 { user: String },
    /// Clearinghouse (account) state for a user.
    ClearinghouseState {
        user: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        dex: Option<String>,
    },
    /// Open orders for a user.
    OpenOrders {
        user: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        dex: Option<String>,
    },
    /// TWAP states for a user.
    TwapStates {
        user: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        dex: Option<String>,
    },
    /// Extended frontend state for a user.
    WebData3 {
        user: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        dex: Option<String>,
    },
}

impl Subscription {
    /// Returns the unique-subscription key for this tuple.
    ///
    /// Two subscriptions with the same key share one wire subscription.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::AllMids { .. } => "allMids".to_string(),
            Self::Trades { coin } => format!("trades:{coin}"),
            Self::L2Book { coin } => format!("l2Book:{coin}"),
            Self::Bbo { coin } => format!("bbo:{coin}"),
            Self::Candle { coin, interval } => format!("candle:{coin}:{interval}"),
            Self::ActiveAssetCtx { coin } => format!("activeAssetCtx:{coin}"),
            Self::Notification { .. } => "notification".to_string(),
            Self::OrderUpdates { .. } => "orderUpdates".to_string(),
            Self::WebData2 { .. } => "webData2".to_string(),
            Self::UserFills { user } => format!("userFills:{}", user.to_lowercase()),
            Self::ClearinghouseState { user, dex } => {
                user_key("clearinghouseState", user, dex.as_deref())
            }
            Self::OpenOrders { user, dex } => user_key("openOrders", user, dex.as_deref()),
            Self::TwapStates { user, dex } => user_key("twapStates", user, dex.as_deref()),
            Self::WebData3 { user, dex } => user_key("webData3", user, dex.as_deref()),
        }
    }
}

fn user_key(channel: &str, user: &str, dex: Option<&str>) -> String {
    let user = user.to_lowercase();
    match dex {
        Some(dex) if !dex.is_empty() => format!("{channel}:{user}:{dex}"),
        _ => format!("{channel}:{user}"),
    }
}

/// How an inbound message is routed to subscribers.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Route {
    /// Deliver to every subscriber of the channel.
    Channel(&'static str),
    /// Deliver to the subscribers of exactly this tuple key.
    Key(String),
    /// Housekeeping frame, not delivered to anyone.
    Discard,
}

/// An inbound WebSocket message, tagged by its channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "channel", content = "data", rename_all = "camelCase")]
pub enum Incoming {
    /// Reply to the periodic ping.
    Pong,
    /// Acknowledgement of a subscribe/unsubscribe request.
    SubscriptionResponse(Value),
    /// Trade events for a coin.
    Trades(Vec<Trade>),
    /// Perp or spot asset context update.
    ActiveAssetCtx(ActiveAssetCtx),
    /// Order book snapshot.
    L2Book(L2Book),
    /// Candle update.
    Candle(Candle),
    /// Mid prices for all markets.
    AllMids(AllMids),
    /// Server notification.
    Notification(Notification),
    /// Order status changes for a user.
    OrderUpdates(Vec<OrderUpdate>),
    /// Fill events for a user.
    UserFills(UserFills),
    /// Frontend aggregate state.
    WebData2(WebData2),
    /// Best bid and offer update.
    Bbo(Bbo),
    /// Clearinghouse state for a user.
    ClearinghouseState(ClearinghouseStateMsg),
    /// Open orders for a user.
    OpenOrders(OpenOrdersMsg),
    /// TWAP states for a user.
    TwapStates(TwapStatesMsg),
    /// Extended frontend state for a user.
    WebData3(WebData3Msg),
    /// Channel this client does not know about.
    #[serde(other)]
    Unknown,
}

impl Incoming {
    /// Computes where this message should be delivered.
    ///
    /// Per-coin channels route by `(channel, coin)` — candles additionally
    /// by interval — and user-scoped channels by `(channel, user[, dex])`
    /// when the payload carries the discriminators; global channels fan out
    /// to every subscriber of the channel.
    pub(crate) fn route(&self) -> Route {
        match self {
            Self::Pong | Self::SubscriptionResponse(_) | Self::Unknown => Route::Discard,
            Self::Trades(trades) => match trades.first() {
                Some(trade) => Route::Key(format!("trades:{}", trade.coin)),
                None => Route::Discard,
            },
            Self::ActiveAssetCtx(ctx) => Route::Key(format!("activeAssetCtx:{}", ctx.coin)),
            Self::L2Book(book) => Route::Key(format!("l2Book:{}", book.coin)),
            Self::Bbo(bbo) => Route::Key(format!("bbo:{}", bbo.coin)),
            Self::Candle(candle) => {
                Route::Key(format!("candle:{}:{}", candle.coin, candle.interval))
            }
            Self::AllMids(_) => Route::Channel("allMids"),
            Self::Notification(_) => Route::Channel("notification"),
            Self::OrderUpdates(_) => Route::Channel("orderUpdates"),
            Self::WebData2(_) => Route::Channel("webData2"),
            Self::UserFills(fills) => {
                Route::Key(format!("userFills:{}", fills.user.to_lowercase()))
            }
            Self::ClearinghouseState(msg) => {
                user_route("clearinghouseState", &msg.user, msg.dex.as_deref())
            }
            Self::OpenOrders(msg) => user_route("openOrders", &msg.user, msg.dex.as_deref()),
            Self::TwapStates(msg) => user_route("twapStates", &msg.user, msg.dex.as_deref()),
            Self::WebData3(msg) => user_route("webData3", &msg.user, msg.dex.as_deref()),
        }
    }
}

fn user_route(channel: &'static str, user: &str, dex: Option<&str>) -> Route {
    if user.is_empty() {
        // Payload carried no user discriminator; fall back to channel-wide
        // delivery and let the subscription key decide.
        Route::Channel(channel)
    } else {
        Route::Key(user_key(channel, user, dex))
    }
}

/// A single trade.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    /// Market symbol.
    pub coin: String,
    /// Taker's side.
    pub side: Side,
    /// Execution price.
    pub px: Decimal,
    /// Trade size.
    pub sz: Decimal,
    /// Timestamp in milliseconds.
    pub time: u64,
    /// L1 transaction hash.
    pub hash: String,
    /// Trade id.
    pub tid: u64,
    /// Buyer and seller addresses, when provided.
    #[serde(default)]
    pub users: Option<Vec<String>>,
}

/// A single price level on the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookLevel {
    /// Price.
    pub px: Decimal,
    /// Total size at this level.
    pub sz: Decimal,
    /// Number of orders at this level.
    pub n: u64,
}

/// Order book snapshot: `levels[0]` are bids, `levels[1]` are asks.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2Book {
    pub coin: String,
    pub levels: [Vec<BookLevel>; 2],
    pub time: u64,
}

impl L2Book {
    /// Returns the bid levels (highest first).
    #[must_use]
    pub fn bids(&self) -> &[BookLevel] {
        &self.levels[0]
    }

    /// Returns the ask levels (lowest first).
    #[must_use]
    pub fn asks(&self) -> &[BookLevel] {
        &self.levels[1]
    }

    /// Returns the mid price when both sides have liquidity.
    #[must_use]
    pub fn mid(&self) -> Option<Decimal> {
        let bid = self.bids().first()?;
        let ask = self.asks().first()?;
        Some((bid.px + ask.px) / Decimal::TWO)
    }
}

/// Best bid and offer: `bbo.0` is the bid, `bbo.1` the ask; either side may
/// be empty.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bbo {
    pub coin: String,
    pub time: u64,
    pub bbo: (Option<BookLevel>, Option<BookLevel>),
}

impl Bbo {
    /// Returns the spread when both sides are present.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.bbo.1.as_ref()?.px - self.bbo.0.as_ref()?.px)
    }
}

/// Candle (OHLCV bar).
#[derive(Debug, Clone, Deserialize)]
pub struct Candle {
    /// Open time in milliseconds.
    #[serde(rename = "t")]
    pub open_time: u64,
    /// Close time in milliseconds.
    #[serde(rename = "T")]
    pub close_time: u64,
    /// Market symbol.
    #[serde(rename = "s")]
    pub coin: String,
    /// Interval (e.g. "1m", "1h").
    #[serde(rename = "i")]
    pub interval: String,
    /// Open price.
    #[serde(rename = "o")]
    pub open: Decimal,
    /// High price.
    #[serde(rename = "h")]
    pub high: Decimal,
    /// Low price.
    #[serde(rename = "l")]
    pub low: Decimal,
    /// Close price.
    #[serde(rename = "c")]
    pub close: Decimal,
    /// Volume in base units.
    #[serde(rename = "v")]
    pub volume: Decimal,
    /// Number of trades.
    #[serde(rename = "n")]
    pub num_trades: u64,
}

/// Mid prices for every market, keyed by coin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllMids {
    #[serde(default)]
    pub dex: Option<String>,
    pub mids: HashMap<String, Decimal>,
}

/// A server notification message.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    pub notification: String,
}

/// An order status change.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub order: BasicOrder,
    pub status: OrderStatus,
    pub status_timestamp: u64,
}

/// Core order fields shared by order updates and open-order queries.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicOrder {
    pub coin: String,
    pub side: Side,
    pub limit_px: Decimal,
    pub sz: Decimal,
    pub oid: u64,
    pub timestamp: u64,
    pub orig_sz: Decimal,
    #[serde(default)]
    pub cloid: Option<B128>,
    #[serde(default)]
    pub reduce_only: bool,
}

/// Fill events for a user; `is_snapshot` marks the initial backfill.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFills {
    #[serde(default)]
    pub is_snapshot: Option<bool>,
    pub user: String,
    pub fills: Vec<Fill>,
}

/// A single fill.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fill {
    /// Market symbol.
    pub coin: String,
    /// Fill price.
    pub px: Decimal,
    /// Fill size.
    pub sz: Decimal,
    /// Order side.
    pub side: Side,
    /// Timestamp in milliseconds.
    pub time: u64,
    /// Position size before this fill.
    pub start_position: Decimal,
    /// Direction label used by the frontend ("Open Long", ...).
    pub dir: String,
    /// Realized PnL from closing.
    pub closed_pnl: Decimal,
    /// L1 transaction hash.
    pub hash: String,
    /// Order id.
    pub oid: u64,
    /// True if the order crossed the spread (taker).
    pub crossed: bool,
    /// Fee paid; negative means rebate.
    pub fee: Decimal,
    /// Trade id.
    pub tid: u64,
    /// Client order id, if the order carried one.
    #[serde(default)]
    pub cloid: Option<B128>,
    /// Token the fee was paid in.
    #[serde(default)]
    pub fee_token: Option<String>,
    /// Amount paid to the builder, also included in `fee`.
    #[serde(default)]
    pub builder_fee: Option<Decimal>,
    /// Liquidation details, if this fill was a liquidation.
    #[serde(default)]
    pub liquidation: Option<Liquidation>,
}

impl Fill {
    /// Returns the notional value of the fill.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.px * self.sz
    }

    /// Returns true if this was a maker fill.
    #[must_use]
    pub fn is_maker(&self) -> bool {
        !self.crossed
    }
}

/// Liquidation details attached to a fill.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Liquidation {
    #[serde(default)]
    pub liquidated_user: Option<String>,
    pub mark_px: Decimal,
    pub method: String,
}

/// Per-coin asset context carried on the `activeAssetCtx` channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAssetCtx {
    pub coin: String,
    pub ctx: SharedAssetCtx,
}

/// Asset context fields shared between perps and spot.
///
/// Perp-only fields (`funding`, `open_interest`, `oracle_px`) and the
/// spot-only `circulating_supply` are optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedAssetCtx {
    pub day_ntl_vlm: Decimal,
    pub prev_day_px: Decimal,
    pub mark_px: Decimal,
    #[serde(default)]
    pub mid_px: Option<Decimal>,
    #[serde(default)]
    pub funding: Option<Decimal>,
    #[serde(default)]
    pub open_interest: Option<Decimal>,
    #[serde(default)]
    pub oracle_px: Option<Decimal>,
    #[serde(default)]
    pub circulating_supply: Option<Decimal>,
}

/// Aggregate frontend state pushed on the `webData2` channel.
///
/// The exchange evolves this payload freely; fields the client does not
/// model are dropped during parsing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebData2 {
    pub clearinghouse_state: Option<ClearinghouseState>,
    pub leading_vaults: Vec<Value>,
    pub total_vault_equity: Option<Decimal>,
    pub open_orders: Vec<BasicOrder>,
    pub agent_address: Option<String>,
    pub agent_valid_until: Option<u64>,
    pub cum_ledger: Option<Decimal>,
    pub meta: Option<Meta>,
    pub asset_ctxs: Vec<AssetCtx>,
    pub server_time: Option<u64>,
    pub is_vault: bool,
    pub user: Option<String>,
    pub twap_states: Vec<Value>,
    pub spot_state: Option<SpotUserState>,
    pub spot_asset_ctxs: Vec<SpotAssetCtx>,
    pub perps_at_open_interest_cap: Vec<String>,
}

/// Clearinghouse state pushed on the user-scoped `clearinghouseState`
/// channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseStateMsg {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub dex: Option<String>,
    #[serde(default)]
    pub clearinghouse_state: Option<ClearinghouseState>,
}

/// Open orders pushed on the user-scoped `openOrders` channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrdersMsg {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub dex: Option<String>,
    #[serde(default)]
    pub is_snapshot: Option<bool>,
    #[serde(default)]
    pub open_orders: Vec<BasicOrder>,
}

/// TWAP states pushed on the user-scoped `twapStates` channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwapStatesMsg {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub dex: Option<String>,
    #[serde(default)]
    pub twap_states: Vec<Value>,
}

/// Extended frontend state pushed on the user-scoped `webData3` channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebData3Msg {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub dex: Option<String>,
    #[serde(flatten)]
    pub data: serde_json::Map<String, Value>,
}

// ========================================================
// INFO RESPONSE TYPES
// ========================================================

/// Perpetuals universe metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub universe: Vec<AssetInfo>,
    #[serde(default)]
    pub margin_tables: Vec<(u64, MarginTable)>,
}

/// One perp asset in the universe.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub name: String,
    pub sz_decimals: u32,
    #[serde(default)]
    pub max_leverage: u32,
    #[serde(default)]
    pub margin_table_id: Option<u64>,
    #[serde(default)]
    pub only_isolated: bool,
    #[serde(default)]
    pub is_delisted: bool,
}

/// Margin table referenced by perp assets.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginTable {
    pub description: String,
    pub margin_tiers: Vec<MarginTier>,
}

/// One tier within a margin table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginTier {
    pub lower_bound: Decimal,
    pub max_leverage: u32,
}

/// Spot universe metadata: trading pairs plus the token table they index.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotMeta {
    pub universe: Vec<SpotPairInfo>,
    pub tokens: Vec<TokenInfo>,
}

/// One spot trading pair; `tokens` are indices into [`SpotMeta::tokens`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotPairInfo {
    pub name: String,
    pub index: u32,
    pub tokens: [usize; 2],
    #[serde(default)]
    pub is_canonical: bool,
}

/// One spot token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub name: String,
    pub index: u32,
    pub sz_decimals: u32,
    pub wei_decimals: u32,
    pub token_id: B128,
    #[serde(default)]
    pub is_canonical: bool,
    #[serde(default)]
    pub evm_contract: Option<Value>,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Perp asset context returned by `metaAndAssetCtxs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetCtx {
    pub day_ntl_vlm: Decimal,
    #[serde(default)]
    pub funding: Option<Decimal>,
    #[serde(default)]
    pub impact_pxs: Option<Vec<Decimal>>,
    pub mark_px: Decimal,
    #[serde(default)]
    pub mid_px: Option<Decimal>,
    #[serde(default)]
    pub open_interest: Option<Decimal>,
    #[serde(default)]
    pub oracle_px: Option<Decimal>,
    #[serde(default)]
    pub premium: Option<Decimal>,
    pub prev_day_px: Decimal,
}

/// Spot asset context returned by `spotMetaAndAssetCtxs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotAssetCtx {
    pub coin: String,
    pub day_ntl_vlm: Decimal,
    pub mark_px: Decimal,
    #[serde(default)]
    pub mid_px: Option<Decimal>,
    pub prev_day_px: Decimal,
    #[serde(default)]
    pub circulating_supply: Option<Decimal>,
}

/// A user's perpetuals account summary.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    pub margin_summary: MarginSummary,
    pub cross_margin_summary: MarginSummary,
    #[serde(default)]
    pub cross_maintenance_margin_used: Option<Decimal>,
    #[serde(default)]
    pub withdrawable: Option<Decimal>,
    #[serde(default)]
    pub asset_positions: Vec<AssetPosition>,
    #[serde(default)]
    pub time: u64,
}

/// Aggregate margin information.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginSummary {
    pub account_value: Decimal,
    pub total_ntl_pos: Decimal,
    pub total_raw_usd: Decimal,
    pub total_margin_used: Decimal,
}

impl MarginSummary {
    /// Returns the margin still available for new positions.
    #[must_use]
    pub fn available_margin(&self) -> Decimal {
        self.account_value - self.total_margin_used
    }
}

/// A position wrapper carrying its margin mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPosition {
    #[serde(rename = "type")]
    pub position_type: String,
    pub position: PositionData,
}

/// Detailed position data for one asset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionData {
    pub coin: String,
    /// Signed position size: positive long, negative short.
    pub szi: Decimal,
    pub leverage: Leverage,
    #[serde(default)]
    pub entry_px: Option<Decimal>,
    pub position_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub return_on_equity: Decimal,
    #[serde(default)]
    pub liquidation_px: Option<Decimal>,
    pub margin_used: Decimal,
    pub max_leverage: u32,
    pub cum_funding: CumulativeFunding,
}

impl PositionData {
    /// Returns true for a long position.
    #[must_use]
    pub fn is_long(&self) -> bool {
        self.szi > Decimal::ZERO
    }

    /// Returns true for a short position.
    #[must_use]
    pub fn is_short(&self) -> bool {
        self.szi < Decimal::ZERO
    }
}

/// Leverage configuration of a position.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leverage {
    #[serde(rename = "type")]
    pub leverage_type: LeverageType,
    pub value: u32,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub raw_usd: Option<Decimal>,
}

/// Margin mode of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, derive_more::Display)]
#[serde(rename_all = "camelCase")]
pub enum LeverageType {
    #[display("cross")]
    Cross,
    #[display("isolated")]
    Isolated,
}

/// Cumulative funding paid on a position.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeFunding {
    pub all_time: Decimal,
    pub since_open: Decimal,
    pub since_change: Decimal,
}

/// A user's spot balances.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotUserState {
    pub balances: Vec<SpotBalance>,
}

/// Balance of one spot token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotBalance {
    pub coin: String,
    pub token: u32,
    pub hold: Decimal,
    pub total: Decimal,
    pub entry_ntl: Decimal,
}

impl SpotBalance {
    /// Returns the balance not locked in open orders.
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.total - self.hold
    }
}

/// Open order with frontend annotations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendOpenOrder {
    #[serde(flatten)]
    pub order: BasicOrder,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub tif: Option<Tif>,
    #[serde(default)]
    pub is_trigger: bool,
    #[serde(default)]
    pub trigger_condition: Option<String>,
    #[serde(default)]
    pub trigger_px: Option<Value>,
    #[serde(default)]
    pub is_position_tpsl: bool,
    #[serde(default)]
    pub children: Vec<Value>,
}

/// Result of an `orderStatus` query.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub(crate) enum OrderStatusResponse {
    Order { order: OrderUpdate },
    UnknownOid,
}

impl OrderStatusResponse {
    pub(crate) fn into_option(self) -> Option<OrderUpdate> {
        match self {
            Self::Order { order } => Some(order),
            Self::UnknownOid => None,
        }
    }
}

/// Parameters for a `candleSnapshot` query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleSnapshotRequest {
    pub coin: String,
    pub interval: String,
    pub start_time: u64,
    pub end_time: u64,
}

/// One funding-rate record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingHistory {
    pub coin: String,
    pub funding_rate: Decimal,
    pub premium: Decimal,
    pub time: u64,
}

/// A funding payment applied to a user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFunding {
    pub time: u64,
    pub hash: String,
    pub delta: FundingDelta,
}

/// The funding component of a ledger update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingDelta {
    #[serde(rename = "type")]
    pub kind: String,
    pub coin: String,
    pub usdc: Decimal,
    pub szi: Decimal,
    pub funding_rate: Decimal,
}

/// A non-funding ledger update (deposit, withdrawal, transfer, ...).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerUpdate {
    pub time: u64,
    pub hash: String,
    pub delta: Value,
}

/// A user's fee rates and recent volumes.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFees {
    #[serde(default)]
    pub daily_user_vlm: Vec<Value>,
    #[serde(default)]
    pub fee_schedule: Value,
    pub user_cross_rate: Decimal,
    pub user_add_rate: Decimal,
    #[serde(default)]
    pub active_referral_discount: Option<Decimal>,
}

/// Per-asset trading limits for a user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActiveAssetData {
    pub user: String,
    pub coin: String,
    #[serde(default)]
    pub leverage: Value,
    #[serde(default)]
    pub max_trade_szs: Vec<Decimal>,
    #[serde(default)]
    pub available_to_trade: Vec<Decimal>,
    #[serde(default)]
    pub mark_px: Option<Decimal>,
}

/// A user's staking totals.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingSummary {
    pub delegated: Decimal,
    pub undelegated: Decimal,
    pub total_pending_withdrawal: Decimal,
    pub n_pending_withdrawals: u64,
}

/// One active staking delegation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingDelegation {
    pub validator: String,
    pub amount: Decimal,
    pub locked_until_timestamp: u64,
}

/// One staking reward payout.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingReward {
    pub time: u64,
    pub source: String,
    pub total_amount: Decimal,
}

/// A user's referral program state.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralState {
    #[serde(default)]
    pub referred_by: Option<Value>,
    pub cum_vlm: Decimal,
    pub unclaimed_rewards: Decimal,
    pub claimed_rewards: Decimal,
    #[serde(default)]
    pub builder_rewards: Option<Decimal>,
    #[serde(default)]
    pub referrer_state: Value,
}

/// A sub-account and its state.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubAccount {
    pub name: String,
    pub sub_account_user: String,
    pub master: String,
    pub clearinghouse_state: ClearinghouseState,
    #[serde(default)]
    pub spot_state: Option<SpotUserState>,
}

/// Multi-signature wallet configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiSigConfig {
    pub authorized_users: Vec<String>,
    pub threshold: usize,
}

/// An API wallet (agent) authorized for a user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAgent {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub valid_until: Option<u64>,
}

/// A builder-deployed perp dex.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerpDex {
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub deployer: Option<String>,
    #[serde(default)]
    pub oracle_updater: Option<String>,
}

/// Detailed information about one token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDetails {
    pub name: String,
    pub max_supply: Decimal,
    pub total_supply: Decimal,
    pub circulating_supply: Decimal,
    pub sz_decimals: u32,
    pub wei_decimals: u32,
    #[serde(default)]
    pub mid_px: Option<Decimal>,
    #[serde(default)]
    pub mark_px: Option<Decimal>,
    #[serde(default)]
    pub prev_day_px: Option<Decimal>,
    #[serde(default)]
    pub deployer: Option<String>,
    #[serde(default)]
    pub genesis: Option<Value>,
    #[serde(default)]
    pub deploy_gas: Option<Decimal>,
    #[serde(default)]
    pub deploy_time: Option<String>,
    #[serde(default)]
    pub seeded_usdc: Option<Decimal>,
    #[serde(default)]
    pub non_circulating_user_balances: Option<Vec<Value>>,
    #[serde(default)]
    pub future_emissions: Option<Decimal>,
}

/// Open-interest caps of a builder-deployed perp dex.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerpDexLimits {
    #[serde(default)]
    pub total_oi_cap: Option<Decimal>,
    #[serde(default)]
    pub oi_sz_cap_per_perp: Option<Decimal>,
    #[serde(default)]
    pub max_transfer_ntl: Option<Decimal>,
    #[serde(default)]
    pub coin_to_oi_cap: Vec<Value>,
}

/// State of the perp deploy auction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerpDeployAuctionStatus {
    pub start_time_seconds: u64,
    pub duration_seconds: u64,
    pub start_gas: Decimal,
    #[serde(default)]
    pub current_gas: Option<Decimal>,
    #[serde(default)]
    pub end_gas: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_keys() {
        let sub = Subscription::Trades {
            coin: "BTC".to_string(),
        };
        assert_eq!(sub.key(), "trades:BTC");

        let sub = Subscription::Candle {
            coin: "BTC".to_string(),
            interval: "1m".to_string(),
        };
        assert_eq!(sub.key(), "candle:BTC:1m");

        let sub = Subscription::ClearinghouseState {
            user: "0xABCDEF0000000000000000000000000000000001".to_string(),
            dex: Some("test".to_string()),
        };
        assert_eq!(
            sub.key(),
            "clearinghouseState:0xabcdef0000000000000000000000000000000001:test"
        );

        let sub = Subscription::AllMids { dex: None };
        assert_eq!(sub.key(), "allMids");
    }

    #[test]
    fn test_subscription_wire_shape() {
        let sub = Subscription::Candle {
            coin: "BTC".to_string(),
            interval: "1m".to_string(),
        };
        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "candle", "coin": "BTC", "interval": "1m"})
        );

        // Optional discriminators are omitted, not null.
        let sub = Subscription::AllMids { dex: None };
        assert_eq!(
            serde_json::to_value(&sub).unwrap(),
            serde_json::json!({"type": "allMids"})
        );
    }

    #[test]
    fn test_incoming_trades_route() {
        let json = r#"{
            "channel": "trades",
            "data": [{
                "coin": "BTC",
                "side": "B",
                "px": "65000.0",
                "sz": "0.01",
                "time": 1700000000000,
                "hash": "0xabc",
                "tid": 42
            }]
        }"#;
        let incoming: Incoming = serde_json::from_str(json).unwrap();
        assert_eq!(incoming.route(), Route::Key("trades:BTC".to_string()));
    }

    #[test]
    fn test_incoming_candle_route_includes_interval() {
        let json = r#"{
            "channel": "candle",
            "data": {
                "t": 1681923600000,
                "T": 1681924499999,
                "s": "BTC",
                "i": "1m",
                "o": "29295.0",
                "h": "29309.0",
                "l": "29250.0",
                "c": "29258.0",
                "v": "0.98639",
                "n": 189
            }
        }"#;
        let incoming: Incoming = serde_json::from_str(json).unwrap();
        assert_eq!(incoming.route(), Route::Key("candle:BTC:1m".to_string()));
    }

    #[test]
    fn test_incoming_pong_and_subscription_response_are_discarded() {
        let pong: Incoming = serde_json::from_str(r#"{"channel":"pong"}"#).unwrap();
        assert_eq!(pong.route(), Route::Discard);

        let ack: Incoming = serde_json::from_str(
            r#"{"channel":"subscriptionResponse","data":{"method":"subscribe","subscription":{"type":"trades","coin":"BTC"}}}"#,
        )
        .unwrap();
        assert_eq!(ack.route(), Route::Discard);
    }

    #[test]
    fn test_incoming_user_fills_routes_by_lowercased_user() {
        let json = r#"{
            "channel": "userFills",
            "data": {
                "isSnapshot": true,
                "user": "0xABCDEF0000000000000000000000000000000001",
                "fills": []
            }
        }"#;
        let incoming: Incoming = serde_json::from_str(json).unwrap();
        assert_eq!(
            incoming.route(),
            Route::Key("userFills:0xabcdef0000000000000000000000000000000001".to_string())
        );
    }

    #[test]
    fn test_incoming_unknown_channel() {
        let incoming: Incoming =
            serde_json::from_str(r#"{"channel":"somethingNew","data":{}}"#).unwrap();
        assert!(matches!(incoming, Incoming::Unknown));
    }

    #[test]
    fn test_order_updates_parse_and_route_globally() {
        let json = r#"{
            "channel": "orderUpdates",
            "data": [{
                "order": {
                    "coin": "ETH",
                    "side": "A",
                    "limitPx": "2412.7",
                    "sz": "0.0",
                    "oid": 1,
                    "timestamp": 1724361546645,
                    "origSz": "0.0076",
                    "cloid": null
                },
                "status": "filled",
                "statusTimestamp": 1724361546645
            }]
        }"#;
        let incoming: Incoming = serde_json::from_str(json).unwrap();
        assert_eq!(incoming.route(), Route::Channel("orderUpdates"));
        match incoming {
            Incoming::OrderUpdates(updates) => {
                assert_eq!(updates[0].order.oid, 1);
                assert!(updates[0].status.is_filled());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_bbo_parse() {
        let json = r#"{
            "channel": "bbo",
            "data": {
                "coin": "BTC",
                "time": 1708622398623,
                "bbo": [
                    {"px": "65000", "sz": "1.5", "n": 3},
                    {"px": "65001", "sz": "0.5", "n": 1}
                ]
            }
        }"#;
        let incoming: Incoming = serde_json::from_str(json).unwrap();
        match incoming {
            Incoming::Bbo(bbo) => {
                assert_eq!(bbo.spread().unwrap().to_string(), "1");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_all_mids_parse() {
        let json = r#"{"channel":"allMids","data":{"mids":{"BTC":"65000.5","ETH":"3010.0"}}}"#;
        let incoming: Incoming = serde_json::from_str(json).unwrap();
        match incoming {
            Incoming::AllMids(mids) => {
                assert_eq!(mids.mids["BTC"].to_string(), "65000.5");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_clearinghouse_state_parse() {
        let json = r#"{
            "marginSummary": {"accountValue":"10000.5","totalNtlPos":"500.0","totalRawUsd":"9500.5","totalMarginUsed":"50.0"},
            "crossMarginSummary": {"accountValue":"10000.5","totalNtlPos":"500.0","totalRawUsd":"9500.5","totalMarginUsed":"50.0"},
            "crossMaintenanceMarginUsed": "25.0",
            "withdrawable": "9950.5",
            "assetPositions": [{
                "type": "oneWay",
                "position": {
                    "coin": "BTC",
                    "szi": "-0.01",
                    "leverage": {"type": "cross", "value": 20},
                    "entryPx": "95137.8",
                    "positionValue": "951.37",
                    "unrealizedPnl": "-1.04",
                    "returnOnEquity": "-0.014",
                    "liquidationPx": null,
                    "marginUsed": "47.5",
                    "maxLeverage": 40,
                    "cumFunding": {"allTime": "-17.2", "sinceOpen": "0.0", "sinceChange": "0.0"}
                }
            }],
            "time": 1768397010203
        }"#;
        let state: ClearinghouseState = serde_json::from_str(json).unwrap();
        assert_eq!(state.asset_positions.len(), 1);
        let pos = &state.asset_positions[0].position;
        assert!(pos.is_short());
        assert_eq!(pos.leverage.leverage_type, LeverageType::Cross);
        assert_eq!(
            state.margin_summary.available_margin().to_string(),
            "9950.5"
        );
    }

    #[test]
    fn test_meta_parse_with_margin_tables() {
        let json = r#"{
            "universe": [
                {"szDecimals": 5, "name": "BTC", "maxLeverage": 40, "marginTableId": 56},
                {"szDecimals": 4, "name": "ETH", "maxLeverage": 25, "marginTableId": 55}
            ],
            "marginTables": [
                [56, {"description": "tiered 40x", "marginTiers": [{"lowerBound": "0.0", "maxLeverage": 40}]}]
            ]
        }"#;
        let meta: Meta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.universe[1].name, "ETH");
        assert_eq!(meta.margin_tables[0].0, 56);
        assert_eq!(meta.margin_tables[0].1.margin_tiers[0].max_leverage, 40);
    }

    #[test]
    fn test_signature_display() {
        let sig = Signature {
            r: U256::from(1),
            s: U256::from(2),
            v: 28,
        };
        let s = sig.to_string();
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 132);
        assert!(s.ends_with("1c"));

        // The JSON form uses minimal hex for r and s.
        let json = serde_json::to_value(sig).unwrap();
        assert_eq!(json["r"], "0x1");
        assert_eq!(json["s"], "0x2");
        assert_eq!(json["v"], 28);
    }

    #[test]
    fn test_oid_or_cloid_serialization() {
        let oid = OidOrCloid::from(123u64);
        assert_eq!(serde_json::to_value(oid).unwrap(), serde_json::json!(123));

        let cloid: Cloid = "0x00000000000000000000000000000001".parse().unwrap();
        let oid = OidOrCloid::from(cloid);
        assert_eq!(
            serde_json::to_value(oid).unwrap(),
            serde_json::json!("0x00000000000000000000000000000001")
        );
    }
}

//! WebSocket subscription multiplexer.
//!
//! One connection fans out to any number of typed callbacks. Subscriptions
//! are deduplicated by their channel tuple: the first subscriber of a tuple
//! sends the wire subscribe frame, later subscribers share it, and the wire
//! unsubscribe goes out only when the last handle for the tuple is closed.
//!
//! A background task owns the socket. It pings every 50 seconds, optionally
//! enforces a read deadline, and on any read failure reconnects with an
//! exponential backoff (1 s doubling up to 60 s, reset after a successful
//! dial), replaying each live tuple's subscription exactly once.
//!
//! Callbacks run on the reader task, so within one tuple they observe wire
//! order; a slow callback slows all dispatch. Hand the payload to your own
//! channel if you need to do real work.
//!
//! # Examples
//!
//! ```no_run
//! use hyperliquid_client::{ws::WsClient, MAINNET_API_URL};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = WsClient::connect(MAINNET_API_URL).await?;
//!
//! let trades = client.trades("BTC", |trades| {
//!     for trade in trades {
//!         println!("{} {} @ {}", trade.coin, trade.sz, trade.px);
//!     }
//! })?;
//!
//! tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//! trades.close();
//! client.close();
//! # Ok(())
//! # }
//! ```

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use futures::StreamExt;
use serde::Serialize;
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    time::{interval, sleep, timeout},
};
use url::Url;
use yawc::{Options, WebSocket};

use crate::{
    error::Error,
    types::{
        ActiveAssetCtx, AllMids, Bbo, Candle, ClearinghouseStateMsg, Incoming, L2Book,
        Notification, OpenOrdersMsg, OrderUpdate, Route, Subscription, Trade, TwapStatesMsg,
        UserFills, WebData2, WebData3Msg,
    },
    MAINNET_API_URL, TESTNET_API_URL,
};

/// Interval between liveness pings.
const PING_INTERVAL: Duration = Duration::from_secs(50);
/// Timeout applied to each dial attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// First reconnect backoff; doubles per failed dial.
const RECONNECT_WAIT_INITIAL: Duration = Duration::from_secs(1);
/// Backoff ceiling.
const RECONNECT_WAIT_MAX: Duration = Duration::from_secs(60);

/// Outbound frames.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "method", rename_all = "camelCase")]
enum Outgoing {
    Subscribe { subscription: Subscription },
    Unsubscribe { subscription: Subscription },
    Ping,
}

type Callback = Arc<dyn Fn(&Incoming) + Send + Sync>;

struct UniqueSubscriber {
    payload: Subscription,
    subscribers: Vec<(u64, Callback)>,
}

type SubTable = HashMap<String, UniqueSubscriber>;

enum Command {
    Subscribe(Subscription),
    Unsubscribe(Subscription),
    Close,
}

/// Configuration for a [`WsClient`].
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// HTTP(S) or WS(S) base URL. Recognized upstream hosts are rewritten
    /// to `wss://<host>/ws`; other URLs keep their path and get their
    /// scheme mapped `https`→`wss`, `http`→`ws`.
    pub base_url: String,
    /// Maximum time to wait for a server frame before treating the
    /// connection as stalled and reconnecting. `None` disables the check.
    pub read_timeout: Option<Duration>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            base_url: MAINNET_API_URL.to_string(),
            read_timeout: None,
        }
    }
}

/// Multiplexed WebSocket client.
///
/// Cheap to share: all methods take `&self` and subscriptions can be opened
/// and closed from any task.
pub struct WsClient {
    cmd_tx: UnboundedSender<Command>,
    subs: Arc<Mutex<SubTable>>,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for WsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsClient").finish_non_exhaustive()
    }
}

/// Handle to one attached callback.
///
/// Dropping the handle does nothing; call [`close`](Self::close) to detach
/// the callback. The wire unsubscribe is sent when the last handle of the
/// tuple closes.
pub struct SubscriptionHandle {
    key: String,
    id: u64,
    subs: Arc<Mutex<SubTable>>,
    cmd_tx: UnboundedSender<Command>,
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl SubscriptionHandle {
    /// Returns the unique-subscription key this handle is attached to.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Detaches this callback; idempotent.
    pub fn close(&self) {
        let last = {
            let mut subs = self.subs.lock().unwrap();
            let Some(entry) = subs.get_mut(&self.key) else {
                return;
            };
            entry.subscribers.retain(|(id, _)| *id != self.id);
            if entry.subscribers.is_empty() {
                subs.remove(&self.key).map(|entry| entry.payload)
            } else {
                None
            }
        };

        if let Some(payload) = last {
            if !self.closed.load(Ordering::Acquire) {
                let _ = self.cmd_tx.send(Command::Unsubscribe(payload));
            }
        }
    }
}

impl WsClient {
    /// Connects to the WebSocket endpoint derived from `base_url`.
    ///
    /// The initial dial happens inline so configuration errors and an
    /// unreachable endpoint surface immediately; subsequent reconnects are
    /// handled in the background.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for URLs without a usable scheme and
    /// [`Error::Transport`] when the initial dial fails.
    pub async fn connect(base_url: &str) -> Result<Self, Error> {
        Self::connect_with(WsConfig {
            base_url: base_url.to_string(),
            ..WsConfig::default()
        })
        .await
    }

    /// Connects with explicit configuration.
    ///
    /// # Errors
    ///
    /// See [`connect`](Self::connect).
    pub async fn connect_with(config: WsConfig) -> Result<Self, Error> {
        let url = derive_ws_url(&config.base_url)?;
        let stream = dial(&url).await?;

        let (cmd_tx, cmd_rx) = unbounded_channel();
        let subs: Arc<Mutex<SubTable>> = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(connection(
            url,
            Some(stream),
            Arc::clone(&subs),
            cmd_rx,
            config.read_timeout,
        ));

        Ok(Self {
            cmd_tx,
            subs,
            closed,
            next_id: AtomicU64::new(0),
        })
    }

    /// Stops the reader and heartbeat, closes the socket and clears all
    /// subscribers. Subscribing afterwards fails with
    /// [`Error::ConnectionClosed`].
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.cmd_tx.send(Command::Close);
        self.subs.lock().unwrap().clear();
    }

    fn subscribe_raw(
        &self,
        payload: Subscription,
        callback: Callback,
    ) -> Result<SubscriptionHandle, Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }

        let key = payload.key();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        let is_new = {
            let mut subs = self.subs.lock().unwrap();
            let entry = subs.entry(key.clone()).or_insert_with(|| UniqueSubscriber {
                payload: payload.clone(),
                subscribers: Vec::new(),
            });
            let is_new = entry.subscribers.is_empty();
            entry.subscribers.push((id, callback));
            is_new
        };

        if is_new && self.cmd_tx.send(Command::Subscribe(payload)).is_err() {
            self.subs.lock().unwrap().remove(&key);
            return Err(Error::ConnectionClosed);
        }

        Ok(SubscriptionHandle {
            key,
            id,
            subs: Arc::clone(&self.subs),
            cmd_tx: self.cmd_tx.clone(),
            closed: Arc::clone(&self.closed),
        })
    }

    /// Subscribes to mid prices for all markets.
    pub fn all_mids(
        &self,
        dex: Option<&str>,
        callback: impl Fn(AllMids) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.subscribe_raw(
            Subscription::AllMids {
                dex: dex.map(str::to_string),
            },
            Arc::new(move |msg| {
                if let Incoming::AllMids(mids) = msg {
                    callback(mids.clone());
                }
            }),
        )
    }

    /// Subscribes to trades for a coin.
    pub fn trades(
        &self,
        coin: &str,
        callback: impl Fn(Vec<Trade>) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.subscribe_raw(
            Subscription::Trades {
                coin: coin.to_string(),
            },
            Arc::new(move |msg| {
                if let Incoming::Trades(trades) = msg {
                    callback(trades.clone());
                }
            }),
        )
    }

    /// Subscribes to order book snapshots for a coin.
    pub fn l2_book(
        &self,
        coin: &str,
        callback: impl Fn(L2Book) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.subscribe_raw(
            Subscription::L2Book {
                coin: coin.to_string(),
            },
            Arc::new(move |msg| {
                if let Incoming::L2Book(book) = msg {
                    callback(book.clone());
                }
            }),
        )
    }

    /// Subscribes to best bid/offer updates for a coin.
    pub fn bbo(
        &self,
        coin: &str,
        callback: impl Fn(Bbo) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.subscribe_raw(
            Subscription::Bbo {
                coin: coin.to_string(),
            },
            Arc::new(move |msg| {
                if let Incoming::Bbo(bbo) = msg {
                    callback(bbo.clone());
                }
            }),
        )
    }

    /// Subscribes to candles for a coin and interval.
    pub fn candle(
        &self,
        coin: &str,
        interval: &str,
        callback: impl Fn(Candle) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.subscribe_raw(
            Subscription::Candle {
                coin: coin.to_string(),
                interval: interval.to_string(),
            },
            Arc::new(move |msg| {
                if let Incoming::Candle(candle) = msg {
                    callback(candle.clone());
                }
            }),
        )
    }

    /// Subscribes to the asset context of a coin.
    pub fn active_asset_ctx(
        &self,
        coin: &str,
        callback: impl Fn(ActiveAssetCtx) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.subscribe_raw(
            Subscription::ActiveAssetCtx {
                coin: coin.to_string(),
            },
            Arc::new(move |msg| {
                if let Incoming::ActiveAssetCtx(ctx) = msg {
                    callback(ctx.clone());
                }
            }),
        )
    }

    /// Subscribes to notifications for a user.
    pub fn notification(
        &self,
        user: alloy::primitives::Address,
        callback: impl Fn(Notification) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.subscribe_raw(
            Subscription::Notification {
                user: format!("{user:#x}"),
            },
            Arc::new(move |msg| {
                if let Incoming::Notification(notification) = msg {
                    callback(notification.clone());
                }
            }),
        )
    }

    /// Subscribes to order status updates for a user.
    pub fn order_updates(
        &self,
        user: alloy::primitives::Address,
        callback: impl Fn(Vec<OrderUpdate>) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.subscribe_raw(
            Subscription::OrderUpdates {
                user: format!("{user:#x}"),
            },
            Arc::new(move |msg| {
                if let Incoming::OrderUpdates(updates) = msg {
                    callback(updates.clone());
                }
            }),
        )
    }

    /// Subscribes to fills for a user.
    pub fn user_fills(
        &self,
        user: alloy::primitives::Address,
        callback: impl Fn(UserFills) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.subscribe_raw(
            Subscription::UserFills {
                user: format!("{user:#x}"),
            },
            Arc::new(move |msg| {
                if let Incoming::UserFills(fills) = msg {
                    callback(fills.clone());
                }
            }),
        )
    }

    /// Subscribes to the aggregate frontend state of a user.
    pub fn web_data2(
        &self,
        user: alloy::primitives::Address,
        callback: impl Fn(WebData2) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.subscribe_raw(
            Subscription::WebData2 {
                user: format!("{user:#x}"),
            },
            Arc::new(move |msg| {
                if let Incoming::WebData2(data) = msg {
                    callback(data.clone());
                }
            }),
        )
    }

    /// Subscribes to the clearinghouse state of a user.
    pub fn clearinghouse_state(
        &self,
        user: alloy::primitives::Address,
        dex: Option<&str>,
        callback: impl Fn(ClearinghouseStateMsg) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.subscribe_raw(
            Subscription::ClearinghouseState {
                user: format!("{user:#x}"),
                dex: dex.map(str::to_string),
            },
            Arc::new(move |msg| {
                if let Incoming::ClearinghouseState(state) = msg {
                    callback(state.clone());
                }
            }),
        )
    }

    /// Subscribes to the open orders of a user.
    pub fn open_orders(
        &self,
        user: alloy::primitives::Address,
        dex: Option<&str>,
        callback: impl Fn(OpenOrdersMsg) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.subscribe_raw(
            Subscription::OpenOrders {
                user: format!("{user:#x}"),
                dex: dex.map(str::to_string),
            },
            Arc::new(move |msg| {
                if let Incoming::OpenOrders(orders) = msg {
                    callback(orders.clone());
                }
            }),
        )
    }

    /// Subscribes to the TWAP states of a user.
    pub fn twap_states(
        &self,
        user: alloy::primitives::Address,
        dex: Option<&str>,
        callback: impl Fn(TwapStatesMsg) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.subscribe_raw(
            Subscription::TwapStates {
                user: format!("{user:#x}"),
                dex: dex.map(str::to_string),
            },
            Arc::new(move |msg| {
                if let Incoming::TwapStates(states) = msg {
                    callback(states.clone());
                }
            }),
        )
    }

    /// Subscribes to the extended frontend state of a user.
    pub fn web_data3(
        &self,
        user: alloy::primitives::Address,
        dex: Option<&str>,
        callback: impl Fn(WebData3Msg) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle, Error> {
        self.subscribe_raw(
            Subscription::WebData3 {
                user: format!("{user:#x}"),
                dex: dex.map(str::to_string),
            },
            Arc::new(move |msg| {
                if let Incoming::WebData3(data) = msg {
                    callback(data.clone());
                }
            }),
        )
    }
}

/// Derives the WebSocket URL from a base URL.
///
/// Known upstream API hosts are rewritten to `wss://<host>/ws` regardless
/// of path; for anything else `https`/`http` map to `wss`/`ws` and explicit
/// `ws`/`wss` URLs pass through.
fn derive_ws_url(base_url: &str) -> Result<Url, Error> {
    let base = if base_url.is_empty() {
        MAINNET_API_URL
    } else {
        base_url
    };
    let mut url: Url = base.parse().map_err(|_| scheme_error())?;

    if is_upstream(&url) {
        let _ = url.set_scheme("wss");
        url.set_path("/ws");
        return Ok(url);
    }

    match url.scheme() {
        "https" => {
            let _ = url.set_scheme("wss");
        }
        "http" => {
            let _ = url.set_scheme("ws");
        }
        "ws" | "wss" => {}
        _ => return Err(scheme_error()),
    }
    Ok(url)
}

fn scheme_error() -> Error {
    Error::validation("base_url", "baseURL must have a scheme set, either wss or ws")
}

fn is_upstream(url: &Url) -> bool {
    let upstream_hosts = [MAINNET_API_URL, TESTNET_API_URL].map(|upstream| {
        Url::parse(upstream)
            .expect("upstream URL constants are valid")
            .host_str()
            .expect("upstream URL constants have hosts")
            .to_lowercase()
    });
    url.host_str()
        .is_some_and(|host| upstream_hosts.contains(&host.to_lowercase()))
}

async fn dial(url: &Url) -> Result<WebSocket, Error> {
    let connect = WebSocket::connect(url.clone()).with_options(Options::default().with_no_delay());
    match timeout(CONNECT_TIMEOUT, connect).await {
        Ok(Ok(ws)) => Ok(ws),
        Ok(Err(err)) => Err(Error::Transport(Box::new(err))),
        Err(_) => Err(Error::Transport(Box::new(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("websocket dial {url}: connect timed out"),
        )))),
    }
}

/// Background connection task: reads, pings, writes queued frames and
/// reconnects until the client is closed.
async fn connection(
    url: Url,
    mut initial: Option<WebSocket>,
    subs: Arc<Mutex<SubTable>>,
    mut cmd_rx: UnboundedReceiver<Command>,
    read_timeout: Option<Duration>,
) {
    let mut reconnect_wait = RECONNECT_WAIT_INITIAL;

    loop {
        let mut ws = match initial.take() {
            Some(ws) => ws,
            None => match dial(&url).await {
                Ok(ws) => ws,
                Err(err) => {
                    log::error!("unable to connect to {url}: {err}");
                    sleep(reconnect_wait).await;
                    reconnect_wait = (reconnect_wait * 2).min(RECONNECT_WAIT_MAX);
                    continue;
                }
            },
        };
        reconnect_wait = RECONNECT_WAIT_INITIAL;

        // Replay each live tuple's subscription exactly once. Keys sent on
        // this connection are tracked so commands queued around the
        // reconnect cannot subscribe a tuple twice.
        let mut sent_keys: std::collections::HashSet<String> = std::collections::HashSet::new();
        let payloads: Vec<Subscription> = {
            let subs = subs.lock().unwrap();
            subs.values().map(|entry| entry.payload.clone()).collect()
        };
        let mut resubscribe_failed = false;
        for payload in payloads {
            log::debug!("resubscribing to {}", payload.key());
            sent_keys.insert(payload.key());
            if let Err(err) = ws
                .send_json(&Outgoing::Subscribe {
                    subscription: payload,
                })
                .await
            {
                log::error!("resubscribe: {err:?}");
                resubscribe_failed = true;
                break;
            }
        }
        if resubscribe_failed {
            continue;
        }

        let mut ping = interval(PING_INTERVAL);
        loop {
            tokio::select! {
                _ = ping.tick() => {
                    if let Err(err) = ws.send_json(&Outgoing::Ping).await {
                        log::error!("ping: {err:?}");
                        break;
                    }
                }
                cmd = cmd_rx.recv() => match cmd {
                    None | Some(Command::Close) => return,
                    Some(Command::Subscribe(subscription)) => {
                        if sent_keys.insert(subscription.key()) {
                            if let Err(err) = ws
                                .send_json(&Outgoing::Subscribe { subscription })
                                .await
                            {
                                log::error!("subscribe: {err:?}");
                                break;
                            }
                        }
                    }
                    Some(Command::Unsubscribe(subscription)) => {
                        if sent_keys.remove(&subscription.key()) {
                            if let Err(err) = ws
                                .send_json(&Outgoing::Unsubscribe { subscription })
                                .await
                            {
                                log::error!("unsubscribe: {err:?}");
                                break;
                            }
                        }
                    }
                },
                frame = async {
                    match read_timeout {
                        Some(deadline) => timeout(deadline, ws.next()).await.ok().flatten(),
                        None => ws.next().await,
                    }
                } => match frame {
                    Some(frame) => dispatch(&subs, &frame.payload),
                    None => {
                        log::debug!("read stalled or connection closed");
                        break;
                    }
                },
            }
        }

        log::debug!("disconnected from {url}");
    }
}

/// Parses one frame and delivers it to the matching subscribers.
///
/// Callbacks are collected under the lock and invoked outside it, so a
/// callback may itself subscribe or close handles.
fn dispatch(subs: &Mutex<SubTable>, payload: &[u8]) {
    let incoming: Incoming = match serde_json::from_slice(payload) {
        Ok(incoming) => incoming,
        Err(err) => {
            if let Ok(text) = std::str::from_utf8(payload) {
                log::warn!("unable to parse message: {text}: {err:?}");
            }
            return;
        }
    };

    let callbacks: Vec<Callback> = {
        let subs = subs.lock().unwrap();
        match incoming.route() {
            Route::Discard => Vec::new(),
            Route::Key(key) => subs
                .get(&key)
                .map(|entry| {
                    entry
                        .subscribers
                        .iter()
                        .map(|(_, callback)| Arc::clone(callback))
                        .collect()
                })
                .unwrap_or_default(),
            Route::Channel(channel) => {
                let prefix = format!("{channel}:");
                subs.iter()
                    .filter(|(key, _)| *key == channel || key.starts_with(&prefix))
                    .flat_map(|(_, entry)| entry.subscribers.iter())
                    .map(|(_, callback)| Arc::clone(callback))
                    .collect()
            }
        }
    };

    for callback in callbacks {
        callback(&incoming);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn test_derive_ws_url_rewrites_upstream_hosts() {
        let url = derive_ws_url(MAINNET_API_URL).unwrap();
        assert_eq!(url.as_str(), "wss://api.hyperliquid.xyz/ws");

        let url = derive_ws_url(TESTNET_API_URL).unwrap();
        assert_eq!(url.as_str(), "wss://api.hyperliquid-testnet.xyz/ws");

        // Even with an explicit path, upstream hosts get the /ws path.
        let url = derive_ws_url("https://api.hyperliquid.xyz/whatever").unwrap();
        assert_eq!(url.as_str(), "wss://api.hyperliquid.xyz/ws");
    }

    #[test]
    fn test_derive_ws_url_maps_schemes_for_other_hosts() {
        let url = derive_ws_url("http://127.0.0.1:8080/stream").unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:8080/stream");

        let url = derive_ws_url("https://example.com/ws").unwrap();
        assert_eq!(url.as_str(), "wss://example.com/ws");

        let url = derive_ws_url("wss://example.com/ws").unwrap();
        assert_eq!(url.as_str(), "wss://example.com/ws");
    }

    #[test]
    fn test_derive_ws_url_requires_a_scheme() {
        let err = derive_ws_url("foobar.com").unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation error on field base_url: baseURL must have a scheme set, either wss or ws"
        );

        let err = derive_ws_url("ftp://example.com").unwrap_err();
        assert!(err
            .to_string()
            .contains("baseURL must have a scheme set, either wss or ws"));
    }

    #[test]
    fn test_derive_ws_url_defaults_to_mainnet() {
        let url = derive_ws_url("").unwrap();
        assert_eq!(url.as_str(), "wss://api.hyperliquid.xyz/ws");
    }

    fn test_client() -> (WsClient, UnboundedReceiver<Command>) {
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let client = WsClient {
            cmd_tx,
            subs: Arc::new(Mutex::new(HashMap::new())),
            closed: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(0),
        };
        (client, cmd_rx)
    }

    /// Drains queued commands, returning (subscribes, unsubscribes).
    fn drain_commands(rx: &mut UnboundedReceiver<Command>) -> (usize, usize) {
        let mut subscribes = 0;
        let mut unsubscribes = 0;
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                Command::Subscribe(_) => subscribes += 1,
                Command::Unsubscribe(_) => unsubscribes += 1,
                Command::Close => {}
            }
        }
        (subscribes, unsubscribes)
    }

    #[test]
    fn test_shared_tuple_coalesces_to_one_wire_subscription() {
        let (client, mut cmd_rx) = test_client();

        let first = client.trades("BTC", |_| {}).unwrap();
        let second = client.trades("BTC", |_| {}).unwrap();
        let third = client.trades("BTC", |_| {}).unwrap();

        assert_eq!(
            drain_commands(&mut cmd_rx),
            (1, 0),
            "one subscribe for three handles"
        );

        // Closing all but the last subscriber emits nothing.
        first.close();
        second.close();
        assert_eq!(drain_commands(&mut cmd_rx), (0, 0));

        // The last close releases the wire subscription.
        third.close();
        assert_eq!(drain_commands(&mut cmd_rx), (0, 1));

        // Closing again is a no-op.
        third.close();
        assert_eq!(drain_commands(&mut cmd_rx), (0, 0));
    }

    #[test]
    fn test_distinct_tuples_subscribe_separately() {
        let (client, mut cmd_rx) = test_client();

        client.trades("BTC", |_| {}).unwrap();
        client.trades("ETH", |_| {}).unwrap();
        client.candle("BTC", "1m", |_| {}).unwrap();
        client.candle("BTC", "5m", |_| {}).unwrap();

        assert_eq!(drain_commands(&mut cmd_rx), (4, 0));
    }

    #[test]
    fn test_subscribe_after_close_is_rejected() {
        let (client, _cmd_rx) = test_client();
        client.close();
        let err = client.trades("BTC", |_| {}).unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[test]
    fn test_dispatch_matches_candle_tuples_exactly() {
        let (client, _cmd_rx) = test_client();

        let btc_hits = Arc::new(AtomicUsize::new(0));
        let eth_hits = Arc::new(AtomicUsize::new(0));
        let btc_5m_hits = Arc::new(AtomicUsize::new(0));

        let hits = Arc::clone(&btc_hits);
        client
            .candle("BTC", "1m", move |_| {
                hits.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        let hits = Arc::clone(&eth_hits);
        client
            .candle("ETH", "1m", move |_| {
                hits.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        let hits = Arc::clone(&btc_5m_hits);
        client
            .candle("BTC", "5m", move |_| {
                hits.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();

        let frame = br#"{
            "channel": "candle",
            "data": {
                "t": 1, "T": 2, "s": "BTC", "i": "1m",
                "o": "1", "h": "2", "l": "0.5", "c": "1.5", "v": "10", "n": 3
            }
        }"#;
        dispatch(&client.subs, frame);
        dispatch(&client.subs, frame);

        assert_eq!(btc_hits.load(Ordering::Relaxed), 2);
        assert_eq!(eth_hits.load(Ordering::Relaxed), 0);
        assert_eq!(btc_5m_hits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_dispatch_fans_out_global_channels() {
        let (client, _cmd_rx) = test_client();

        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            client
                .all_mids(None, move |_| {
                    hits.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap();
        }

        dispatch(
            &client.subs,
            br#"{"channel":"allMids","data":{"mids":{"BTC":"1"}}}"#,
        );
        assert_eq!(hits.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_dispatch_survives_garbage_frames() {
        let (client, _cmd_rx) = test_client();
        client.trades("BTC", |_| {}).unwrap();
        dispatch(&client.subs, b"not json at all");
        dispatch(&client.subs, br#"{"channel":"pong"}"#);
        dispatch(&client.subs, br#"{"channel":"brandNewChannel","data":[]}"#);
    }

    #[test]
    fn test_callbacks_may_resubscribe_during_dispatch() {
        let (client, _cmd_rx) = test_client();
        let client = Arc::new(client);

        let inner = Arc::clone(&client);
        let nested = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&nested);
        client
            .trades("BTC", move |_| {
                // Subscribing from inside a callback must not deadlock.
                let handle = inner.trades("ETH", |_| {}).unwrap();
                *slot.lock().unwrap() = Some(handle);
            })
            .unwrap();

        dispatch(
            &client.subs,
            br#"{"channel":"trades","data":[{"coin":"BTC","side":"B","px":"1","sz":"1","time":1,"hash":"0x","tid":1}]}"#,
        );
        assert!(nested.lock().unwrap().is_some());
    }
}

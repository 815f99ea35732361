//! # hyperliquid-client
//!
//! A Rust client for the Hyperliquid exchange.
//!
//! Hyperliquid exposes two surfaces: a request/reply JSON HTTP API
//! (`POST /info` for queries, `POST /exchange` for signed actions) and a
//! publish/subscribe WebSocket stream. This crate covers both:
//!
//! - [`HttpClient`]: the full `/info` query surface
//! - [`Exchange`]: signed actions — orders, cancels, transfers, approvals,
//!   vault and deploy operations — with byte-exact canonical encoding and
//!   EIP-712 signing
//! - [`ws::WsClient`]: a multiplexed WebSocket connection with typed
//!   per-channel callbacks, subscription deduplication, heartbeats and
//!   automatic reconnection
//!
//! ## Quick start
//!
//! ```no_run
//! use hyperliquid_client::{ws::WsClient, Chain, HttpClient, MAINNET_API_URL};
//!
//! # async fn example() -> anyhow::Result<()> {
//! // Read-only queries.
//! let http = HttpClient::new(Chain::Mainnet);
//! let mids = http.all_mids(None).await?;
//! println!("BTC mid: {:?}", mids.get("BTC"));
//!
//! // Streaming market data.
//! let ws = WsClient::connect(MAINNET_API_URL).await?;
//! let _trades = ws.trades("BTC", |trades| {
//!     for trade in trades {
//!         println!("{} {} @ {}", trade.side, trade.sz, trade.px);
//!     }
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! Signing requires a key; see [`Exchange`] for placing orders. Example
//! and test glue conventionally reads `HL_PRIVATE_KEY`, `HL_API_URL`,
//! `HL_WALLET_ADDRESS` and `HL_VAULT_ADDRESS` from the environment — the
//! library itself reads no environment variables.

pub mod assets;
pub mod error;
pub mod exchange;
pub mod http;
mod signing;
pub mod types;
mod utils;
pub mod ws;

use std::sync::atomic::{AtomicU64, Ordering};

/// Re-exported address type.
pub use alloy::primitives::Address;
use alloy::primitives::B128;
/// Re-exported signer type used for all key material.
pub use alloy::signers::local::PrivateKeySigner;
pub use error::Error;
pub use exchange::{Exchange, ExchangeConfig};
pub use http::Client as HttpClient;
/// Re-exported decimal type used for parsed market data.
pub use rust_decimal::Decimal;
pub use utils::{float_to_wire, normalize_cloid, round_to_decimals, round_to_significant_figures};

/// Default mainnet API URL.
pub const MAINNET_API_URL: &str = "https://api.hyperliquid.xyz";
/// Default testnet API URL.
pub const TESTNET_API_URL: &str = "https://api.hyperliquid-testnet.xyz";
/// Local node API URL, useful against a dev node.
pub const LOCAL_API_URL: &str = "http://localhost:3001";

/// Wire value of the `signatureChainId` field on user-signed actions.
///
/// 0x66eee = 421614; fixed for both networks, matching the signing domain.
pub const SIGNATURE_CHAIN_ID: &str = "0x66eee";

/// Client order id: 16 bytes, canonically rendered as `0x` + 32 hex chars.
///
/// Parse with [`normalize_cloid`] to accept inputs without the prefix.
pub type Cloid = B128;

/// Network selector.
///
/// Serializes in the PascalCase form (`"Mainnet"`/`"Testnet"`) that the
/// `hyperliquidChain` wire field expects.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    derive_more::Display,
    derive_more::FromStr,
    derive_more::IsVariant,
)]
#[serde(rename_all = "PascalCase")]
pub enum Chain {
    /// Mainnet.
    #[display("Mainnet")]
    Mainnet,
    /// Testnet.
    #[display("Testnet")]
    Testnet,
}

/// Monotonic nonce source.
///
/// Nonces are millisecond timestamps; when two actions land on the same
/// millisecond the later one is bumped by one, so concurrent callers always
/// observe strictly increasing, pairwise distinct values. The exchange
/// accepts nonces within `(T - 2 days, T + 1 day)` of block time.
///
/// # Example
///
/// ```
/// use hyperliquid_client::NonceHandler;
///
/// let nonces = NonceHandler::new();
/// let a = nonces.next();
/// let b = nonces.next();
/// assert!(b > a);
/// ```
#[derive(Debug, Default)]
pub struct NonceHandler {
    last: AtomicU64,
}

impl NonceHandler {
    /// Creates a nonce source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next nonce: `max(now_ms, last + 1)`.
    ///
    /// Lock-free; concurrent callers retry on CAS failure, so no two calls
    /// ever return the same value.
    pub fn next(&self) -> u64 {
        loop {
            let last = self.last.load(Ordering::Acquire);
            let mut candidate = utils::timestamp_ms();
            if candidate <= last {
                candidate = last + 1;
            }
            if self
                .last
                .compare_exchange(last, candidate, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return candidate;
            }
        }
    }

    /// Seeds the counter from persisted state; the next nonce will be
    /// strictly greater than `nonce`.
    pub fn set_last(&self, nonce: u64) {
        self.last.store(nonce, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use super::*;

    #[test]
    fn test_nonces_are_strictly_increasing() {
        let nonces = NonceHandler::new();
        let mut prev = 0;
        for _ in 0..10_000 {
            let nonce = nonces.next();
            assert!(nonce > prev);
            prev = nonce;
        }
    }

    #[test]
    fn test_concurrent_nonces_are_distinct() {
        let nonces = Arc::new(NonceHandler::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let nonces = Arc::clone(&nonces);
            handles.push(thread::spawn(move || {
                (0..1_000).map(|_| nonces.next()).collect::<Vec<u64>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for nonce in handle.join().unwrap() {
                assert!(seen.insert(nonce), "nonce {nonce} issued twice");
            }
        }
        assert_eq!(seen.len(), 8_000);
    }

    #[test]
    fn test_seeding_resumes_past_the_seed() {
        let nonces = NonceHandler::new();
        let future = utils::timestamp_ms() + 1_000_000;
        nonces.set_last(future);
        assert_eq!(nonces.next(), future + 1);
    }

    #[test]
    fn test_chain_serializes_pascal_case() {
        assert_eq!(
            serde_json::to_string(&Chain::Mainnet).unwrap(),
            "\"Mainnet\""
        );
        assert_eq!(Chain::Testnet.to_string(), "Testnet");
        assert!(Chain::Mainnet.is_mainnet());
    }
}

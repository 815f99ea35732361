//! HTTP client for the Hyperliquid API.
//!
//! Two endpoints exist: `POST /info` for read-only queries and
//! `POST /exchange` for signed actions. This client owns the transport and
//! the full `/info` query surface; the signing dispatch lives in
//! [`crate::exchange`].
//!
//! # Examples
//!
//! ```no_run
//! use hyperliquid_client::{Chain, HttpClient};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = HttpClient::new(Chain::Mainnet);
//! let mids = client.all_mids(None).await?;
//! for (coin, mid) in mids {
//!     println!("{coin}: {mid}");
//! }
//! # Ok(())
//! # }
//! ```

use std::{collections::HashMap, time::Duration};

use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::{
    assets::AssetMap,
    error::{ApiErrorBody, Error},
    types::{
        api::{ActionRequest, ApiResponse, InfoRequest},
        ApiAgent, AssetCtx, BasicOrder, Candle, CandleSnapshotRequest, ClearinghouseState, Fill,
        FrontendOpenOrder, FundingHistory, L2Book, LedgerUpdate, Meta, MultiSigConfig,
        OidOrCloid, OrderStatusResponse, OrderUpdate, PerpDeployAuctionStatus, PerpDex,
        PerpDexLimits, ReferralState, SpotAssetCtx, SpotMeta, SpotUserState, StakingDelegation,
        StakingReward, StakingSummary, SubAccount, TokenDetails, UserActiveAssetData, UserFees,
        UserFunding,
    },
    Chain, MAINNET_API_URL, TESTNET_API_URL,
};

/// HTTP client for the `/info` and `/exchange` endpoints.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    chain: Chain,
}

impl Client {
    /// Creates a client for the given chain's default API URL.
    pub fn new(chain: Chain) -> Self {
        let base_url = if chain.is_mainnet() {
            MAINNET_API_URL
        } else {
            TESTNET_API_URL
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .tcp_nodelay(true)
            .build()
            .unwrap();

        Self {
            http,
            base_url: base_url.parse().unwrap(),
            chain,
        }
    }

    /// Points the client at a custom base URL, keeping the chain
    /// configuration.
    ///
    /// Non-HTTPS URLs are rejected unless the host is loopback
    /// (`localhost`, `127.0.0.1`, `::1`); requests built from configuration
    /// must not be able to reach arbitrary plaintext endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for unparsable URLs and disallowed
    /// schemes.
    pub fn with_url(self, base_url: &str) -> Result<Self, Error> {
        let base_url = validate_base_url(base_url)?;
        Ok(Self { base_url, ..self })
    }

    /// Returns the chain this client is configured for.
    #[must_use]
    pub const fn chain(&self) -> Chain {
        self.chain
    }

    /// Returns the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn post<R: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<R, Error> {
        let mut url = self.base_url.clone();
        url.set_path(path);

        let response = self.http.post(url).json(body).send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(err) => Error::Api {
                    code: err.code,
                    msg: err.msg,
                    data: err.data,
                },
                Err(_) => Error::Api {
                    code: status.as_u16() as i64,
                    msg: body,
                    data: None,
                },
            });
        }

        Ok(response.json().await?)
    }

    pub(crate) async fn info<R: DeserializeOwned>(
        &self,
        request: &InfoRequest,
    ) -> Result<R, Error> {
        self.post("/info", request).await
    }

    pub(crate) async fn post_action(&self, request: &ActionRequest) -> Result<ApiResponse, Error> {
        self.post("/exchange", request).await
    }

    /// Fetches the universes and builds the coin-to-asset-id tables.
    ///
    /// With `perp_dex` set, the perp universe of that builder-deployed dex
    /// is loaded and mapped into the builder asset-id range.
    ///
    /// # Errors
    ///
    /// Returns an error if the queries fail or the dex name is unknown.
    pub async fn asset_map(&self, perp_dex: Option<&str>) -> Result<AssetMap, Error> {
        let meta = self.meta(perp_dex).await?;
        let spot_meta = self.spot_meta().await?;
        match perp_dex {
            None => AssetMap::from_parts(&meta, &spot_meta, None),
            Some(name) => {
                let dexs = self.perp_dexs().await?;
                AssetMap::from_parts(&meta, &spot_meta, Some((name, &dexs)))
            }
        }
    }

    /// Retrieves perpetuals metadata. `dex` selects a builder-deployed perp
    /// dex; `None` is the default universe.
    pub async fn meta(&self, dex: Option<&str>) -> Result<Meta, Error> {
        self.info(&InfoRequest::Meta {
            dex: dex.map(str::to_string),
        })
        .await
    }

    /// Retrieves spot metadata: trading pairs and the token table.
    pub async fn spot_meta(&self) -> Result<SpotMeta, Error> {
        self.info(&InfoRequest::SpotMeta).await
    }

    /// Retrieves perpetuals metadata together with per-asset contexts.
    pub async fn meta_and_asset_ctxs(
        &self,
        dex: Option<&str>,
    ) -> Result<(Meta, Vec<AssetCtx>), Error> {
        self.info(&InfoRequest::MetaAndAssetCtxs {
            dex: dex.map(str::to_string),
        })
        .await
    }

    /// Retrieves spot metadata together with per-pair contexts.
    pub async fn spot_meta_and_asset_ctxs(
        &self,
    ) -> Result<(SpotMeta, Vec<SpotAssetCtx>), Error> {
        self.info(&InfoRequest::SpotMetaAndAssetCtxs).await
    }

    /// Retrieves a user's perpetuals account summary.
    pub async fn clearinghouse_state(
        &self,
        user: Address,
        dex: Option<&str>,
    ) -> Result<ClearinghouseState, Error> {
        self.info(&InfoRequest::ClearinghouseState {
            user,
            dex: dex.map(str::to_string),
        })
        .await
    }

    /// Retrieves a user's spot balances.
    pub async fn spot_clearinghouse_state(&self, user: Address) -> Result<SpotUserState, Error> {
        self.info(&InfoRequest::SpotClearinghouseState { user }).await
    }

    /// Retrieves a user's open orders.
    pub async fn open_orders(
        &self,
        user: Address,
        dex: Option<&str>,
    ) -> Result<Vec<BasicOrder>, Error> {
        self.info(&InfoRequest::OpenOrders {
            user,
            dex: dex.map(str::to_string),
        })
        .await
    }

    /// Retrieves a user's open orders with frontend annotations.
    pub async fn frontend_open_orders(
        &self,
        user: Address,
        dex: Option<&str>,
    ) -> Result<Vec<FrontendOpenOrder>, Error> {
        self.info(&InfoRequest::FrontendOpenOrders {
            user,
            dex: dex.map(str::to_string),
        })
        .await
    }

    /// Retrieves mid prices for all coins.
    pub async fn all_mids(&self, dex: Option<&str>) -> Result<HashMap<String, Decimal>, Error> {
        self.info(&InfoRequest::AllMids {
            dex: dex.map(str::to_string),
        })
        .await
    }

    /// Retrieves a user's recent fills.
    pub async fn user_fills(
        &self,
        user: Address,
        aggregate_by_time: Option<bool>,
    ) -> Result<Vec<Fill>, Error> {
        self.info(&InfoRequest::UserFills {
            user,
            aggregate_by_time,
        })
        .await
    }

    /// Retrieves a user's fills within a time range.
    pub async fn user_fills_by_time(
        &self,
        user: Address,
        start_time: u64,
        end_time: Option<u64>,
        aggregate_by_time: Option<bool>,
    ) -> Result<Vec<Fill>, Error> {
        self.info(&InfoRequest::UserFillsByTime {
            user,
            start_time,
            end_time,
            aggregate_by_time,
        })
        .await
    }

    /// Retrieves a user's historical orders.
    pub async fn historical_orders(&self, user: Address) -> Result<Vec<OrderUpdate>, Error> {
        self.info(&InfoRequest::HistoricalOrders { user }).await
    }

    /// Queries the status of one order by oid or cloid.
    ///
    /// Returns `None` when the exchange does not know the order.
    pub async fn order_status(
        &self,
        user: Address,
        oid: impl Into<OidOrCloid>,
    ) -> Result<Option<OrderUpdate>, Error> {
        let response: OrderStatusResponse = self
            .info(&InfoRequest::OrderStatus {
                user,
                oid: oid.into(),
            })
            .await?;
        Ok(response.into_option())
    }

    /// Retrieves an L2 order book snapshot for a coin.
    pub async fn l2_snapshot(&self, coin: &str) -> Result<L2Book, Error> {
        self.info(&InfoRequest::L2Book {
            coin: coin.to_string(),
        })
        .await
    }

    /// Retrieves historical candles.
    pub async fn candles_snapshot(
        &self,
        req: CandleSnapshotRequest,
    ) -> Result<Vec<Candle>, Error> {
        self.info(&InfoRequest::CandleSnapshot { req }).await
    }

    /// Retrieves a user's fee rates and volumes.
    pub async fn user_fees(&self, user: Address) -> Result<UserFees, Error> {
        self.info(&InfoRequest::UserFees { user }).await
    }

    /// Retrieves per-asset trading limits for a user.
    pub async fn user_active_asset_data(
        &self,
        user: Address,
        coin: &str,
    ) -> Result<UserActiveAssetData, Error> {
        self.info(&InfoRequest::ActiveAssetData {
            user,
            coin: coin.to_string(),
        })
        .await
    }

    /// Retrieves the funding-rate history of a coin.
    pub async fn funding_history(
        &self,
        coin: &str,
        start_time: u64,
        end_time: Option<u64>,
    ) -> Result<Vec<FundingHistory>, Error> {
        self.info(&InfoRequest::FundingHistory {
            coin: coin.to_string(),
            start_time,
            end_time,
        })
        .await
    }

    /// Retrieves funding payments applied to a user.
    pub async fn user_funding_history(
        &self,
        user: Address,
        start_time: u64,
        end_time: Option<u64>,
    ) -> Result<Vec<UserFunding>, Error> {
        self.info(&InfoRequest::UserFunding {
            user,
            start_time,
            end_time,
        })
        .await
    }

    /// Retrieves a user's non-funding ledger updates (deposits,
    /// withdrawals, transfers).
    pub async fn user_non_funding_ledger_updates(
        &self,
        user: Address,
        start_time: u64,
        end_time: Option<u64>,
    ) -> Result<Vec<LedgerUpdate>, Error> {
        self.info(&InfoRequest::UserNonFundingLedgerUpdates {
            user,
            start_time,
            end_time,
        })
        .await
    }

    /// Retrieves a user's staking totals.
    pub async fn user_staking_summary(&self, user: Address) -> Result<StakingSummary, Error> {
        self.info(&InfoRequest::DelegatorSummary { user }).await
    }

    /// Retrieves a user's active staking delegations.
    pub async fn user_staking_delegations(
        &self,
        user: Address,
    ) -> Result<Vec<StakingDelegation>, Error> {
        self.info(&InfoRequest::Delegations { user }).await
    }

    /// Retrieves a user's staking reward history.
    pub async fn user_staking_rewards(&self, user: Address) -> Result<Vec<StakingReward>, Error> {
        self.info(&InfoRequest::DelegatorRewards { user }).await
    }

    /// Retrieves a user's referral program state.
    pub async fn referral_state(&self, user: Address) -> Result<ReferralState, Error> {
        self.info(&InfoRequest::Referral { user }).await
    }

    /// Retrieves a user's sub-accounts.
    pub async fn sub_accounts(&self, user: Address) -> Result<Vec<SubAccount>, Error> {
        let accounts: Option<Vec<SubAccount>> =
            self.info(&InfoRequest::SubAccounts { user }).await?;
        Ok(accounts.unwrap_or_default())
    }

    /// Retrieves the multi-sig configuration of a converted user, if any.
    pub async fn user_to_multi_sig_signers(
        &self,
        user: Address,
    ) -> Result<Option<MultiSigConfig>, Error> {
        self.info(&InfoRequest::UserToMultiSigSigners { user }).await
    }

    /// Retrieves the agents (API wallets) approved for a user.
    pub async fn extra_agents(&self, user: Address) -> Result<Vec<ApiAgent>, Error> {
        self.info(&InfoRequest::ExtraAgents { user }).await
    }

    /// Retrieves the builder-deployed perp dex listing.
    ///
    /// The first element is `null`, standing for the default dex.
    pub async fn perp_dexs(&self) -> Result<Vec<Option<PerpDex>>, Error> {
        self.info(&InfoRequest::PerpDexs).await
    }

    /// Retrieves details for one token by its id.
    pub async fn token_details(&self, token_id: &str) -> Result<TokenDetails, Error> {
        self.info(&InfoRequest::TokenDetails {
            token_id: token_id.to_string(),
        })
        .await
    }

    /// Retrieves the open-interest limits of a builder-deployed perp dex.
    ///
    /// # Errors
    ///
    /// `dex` must be non-empty; this endpoint has no default-dex form.
    pub async fn perp_dex_limits(&self, dex: &str) -> Result<PerpDexLimits, Error> {
        if dex.is_empty() {
            return Err(Error::validation(
                "dex",
                "dex parameter is required for perpDexLimits",
            ));
        }
        self.info(&InfoRequest::PerpDexLimits {
            dex: dex.to_string(),
        })
        .await
    }

    /// Retrieves the state of the perp deploy auction.
    pub async fn perp_deploy_auction_status(&self) -> Result<PerpDeployAuctionStatus, Error> {
        self.info(&InfoRequest::PerpDeployAuctionStatus).await
    }
}

/// Validates a base URL against the scheme policy: HTTPS anywhere, HTTP only
/// towards loopback hosts.
pub(crate) fn validate_base_url(base_url: &str) -> Result<Url, Error> {
    let parsed: Url = base_url
        .parse()
        .map_err(|e| Error::validation("base_url", format!("invalid URL: {e}")))?;

    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" => {
            let host = parsed
                .host_str()
                .unwrap_or_default()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_lowercase();
            if host == "localhost" || host == "127.0.0.1" || host == "::1" {
                Ok(parsed)
            } else {
                Err(Error::validation(
                    "base_url",
                    format!("HTTP scheme only allowed for localhost, got: {host}"),
                ))
            }
        }
        other => Err(Error::validation(
            "base_url",
            format!("URL must use HTTPS (or HTTP for localhost only), got: {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LOCAL_API_URL;

    #[test]
    fn test_https_urls_are_accepted() {
        assert!(validate_base_url("https://api.hyperliquid.xyz").is_ok());
        assert!(validate_base_url("https://example.com/api").is_ok());
    }

    #[test]
    fn test_http_is_loopback_only() {
        assert!(validate_base_url(LOCAL_API_URL).is_ok());
        assert!(validate_base_url("http://localhost:3001").is_ok());
        assert!(validate_base_url("http://127.0.0.1:8080").is_ok());
        assert!(validate_base_url("http://[::1]:3001").is_ok());

        let err = validate_base_url("http://example.com/exchange").unwrap_err();
        assert!(matches!(err, Error::Validation { field: "base_url", .. }));
    }

    #[test]
    fn test_other_schemes_are_rejected() {
        assert!(validate_base_url("ftp://api.hyperliquid.xyz").is_err());
        assert!(validate_base_url("not a url").is_err());
    }

    #[test]
    fn test_with_url_applies_validation() {
        let client = Client::new(Chain::Testnet);
        assert!(client.clone().with_url("http://localhost:3001").is_ok());
        assert!(Client::new(Chain::Testnet)
            .with_url("http://example.com")
            .is_err());
    }
}

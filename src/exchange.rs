//! Signed exchange actions.
//!
//! [`Exchange`] owns the signing key, the nonce source and the resolved
//! asset universe, and turns caller requests into signed `/exchange`
//! envelopes. Trading actions are signed as L1 actions; transfers,
//! withdrawals and approvals go through the user-signed path (see
//! [`crate::signing`]).
//!
//! Per-status errors embedded in an otherwise successful response (for
//! example `"Order must have minimum value of $10."`) are promoted to
//! [`Error::Status`] so callers never have to dig through the envelope for
//! failures.
//!
//! # Examples
//!
//! ```no_run
//! use hyperliquid_client::{
//!     types::{OrderRequest, OrderType, Tif},
//!     Chain, Exchange, HttpClient, PrivateKeySigner,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let signer: PrivateKeySigner = std::env::var("HL_PRIVATE_KEY")?.parse()?;
//! let exchange = Exchange::new(HttpClient::new(Chain::Testnet), signer).await?;
//!
//! let status = exchange
//!     .place_order(
//!         OrderRequest {
//!             coin: "BTC".to_string(),
//!             is_buy: true,
//!             limit_px: 40000.0,
//!             sz: 0.001,
//!             reduce_only: false,
//!             order_type: OrderType::Limit { tif: Tif::Gtc },
//!             cloid: None,
//!         },
//!         None,
//!     )
//!     .await?;
//! println!("order: {status:?}");
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

use crate::{
    assets::AssetMap,
    error::Error,
    http::Client,
    signing,
    types::{
        api::{
            Action, ActionRequest, ApiResponse, AssetRequest, AssetRequest2, BuilderInfo,
            CancelByCloidWire, CancelResponseStatus, CancelWire, DexSchema, Grouping, HaltTrading,
            ModifyWire, OkResponse, OrderTypeWire, OrderWire, PerpDeploy, RegisterAsset,
            RegisterAsset2, RegisterToken2, SetOracle, TokenSpec,
        },
        solidity, Builder, CancelByCloidRequest, CancelRequest, ModifyRequest, MultiSigConfig,
        OrderRequest, OrderResponseStatus, OrderType, Signature,
    },
    utils, Chain, NonceHandler,
};

/// Optional settings applied when constructing an [`Exchange`].
#[derive(Debug, Clone, Default)]
pub struct ExchangeConfig {
    /// Vault or sub-account this client trades on behalf of.
    pub vault_address: Option<Address>,
    /// Master account address when signing with an agent (API) wallet; used
    /// for position lookups.
    pub account_address: Option<Address>,
    /// Absolute millisecond timestamp after which signed actions are
    /// rejected by the exchange.
    pub expires_after: Option<u64>,
    /// Builder-deployed perp dex to resolve coins against.
    pub perp_dex: Option<String>,
}

/// Client for authenticated `/exchange` actions.
pub struct Exchange {
    client: Client,
    signer: PrivateKeySigner,
    assets: AssetMap,
    vault_address: Option<Address>,
    account_address: Option<Address>,
    expires_after: Option<u64>,
    nonces: NonceHandler,
}

impl Exchange {
    /// Creates an exchange client and bootstraps the asset universe.
    ///
    /// # Errors
    ///
    /// Returns an error if the universe queries fail.
    pub async fn new(client: Client, signer: PrivateKeySigner) -> Result<Self, Error> {
        Self::with_config(client, signer, ExchangeConfig::default()).await
    }

    /// Creates an exchange client with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the universe queries fail or the configured perp
    /// dex does not exist.
    pub async fn with_config(
        client: Client,
        signer: PrivateKeySigner,
        config: ExchangeConfig,
    ) -> Result<Self, Error> {
        let assets = client.asset_map(config.perp_dex.as_deref()).await?;
        log::debug!(
            "exchange client ready: {} coins resolved, chain={:?}",
            assets.len(),
            client.chain()
        );

        Ok(Self {
            client,
            signer,
            assets,
            vault_address: config.vault_address,
            account_address: config.account_address,
            expires_after: config.expires_after,
            nonces: NonceHandler::new(),
        })
    }

    /// Returns the underlying HTTP client.
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Returns the resolved asset universe.
    #[must_use]
    pub fn assets(&self) -> &AssetMap {
        &self.assets
    }

    /// Returns the signing wallet's address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Seeds the nonce source from persisted state.
    ///
    /// Only useful when resuming a session that burned nonces faster than
    /// wall-clock time; most users never need this.
    pub fn set_last_nonce(&self, nonce: u64) {
        self.nonces.set_last(nonce);
    }

    /// Sets or clears the expiry attached to subsequent actions
    /// (absolute milliseconds).
    pub fn set_expires_after(&mut self, expires_after: Option<u64>) {
        self.expires_after = expires_after;
    }

    fn chain(&self) -> Chain {
        self.client.chain()
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Signs an action in L1 mode and posts it.
    ///
    /// `sign_vault` is the vault the signature covers; not every action is
    /// signed against the configured vault (transfers and account-level
    /// actions are signed by the main wallet).
    async fn execute_l1(
        &self,
        action: Action,
        sign_vault: Option<Address>,
    ) -> Result<ApiResponse, Error> {
        let nonce = self.nonces.next();
        let signature = signing::sign_l1_action(
            &self.signer,
            self.chain(),
            &action,
            nonce,
            sign_vault,
            self.expires_after,
        )?;
        self.post(action, nonce, signature).await
    }

    /// Posts an already signed action with the envelope rules applied.
    async fn post(
        &self,
        action: Action,
        nonce: u64,
        signature: Signature,
    ) -> Result<ApiResponse, Error> {
        let vault_address = match (self.vault_address, action.forces_null_vault()) {
            (None, _) => None,
            (Some(_), true) => Some(None),
            (Some(vault), false) => Some(Some(vault)),
        };

        let request = ActionRequest {
            action,
            nonce,
            signature,
            vault_address,
            expires_after: self.expires_after,
        };
        self.client.post_action(&request).await
    }

    fn expect_ok(response: ApiResponse) -> Result<OkResponse, Error> {
        match response {
            ApiResponse::Ok(ok) => Ok(ok),
            ApiResponse::Err(msg) => Err(Error::Api {
                code: 0,
                msg,
                data: None,
            }),
        }
    }

    /// Accepts any successful envelope, discarding its payload.
    fn expect_default(response: ApiResponse) -> Result<(), Error> {
        Self::expect_ok(response).map(|_| ())
    }

    /// Extracts order statuses, promoting the first embedded error.
    fn order_statuses(response: ApiResponse) -> Result<Vec<OrderResponseStatus>, Error> {
        match Self::expect_ok(response)? {
            OkResponse::Order { statuses } => {
                if let Some(err) = statuses.iter().find_map(OrderResponseStatus::error) {
                    return Err(Error::Status(err.to_string()));
                }
                Ok(statuses)
            }
            other => Err(Error::Api {
                code: 0,
                msg: format!("unexpected response type: {other:?}"),
                data: None,
            }),
        }
    }

    /// Extracts cancel statuses, promoting the first embedded error.
    fn cancel_statuses(response: ApiResponse) -> Result<Vec<CancelResponseStatus>, Error> {
        match Self::expect_ok(response)? {
            OkResponse::Cancel { statuses } => {
                if let Some(err) = statuses.iter().find_map(CancelResponseStatus::error) {
                    return Err(Error::Status(err.to_string()));
                }
                Ok(statuses)
            }
            other => Err(Error::Api {
                code: 0,
                msg: format!("unexpected response type: {other:?}"),
                data: None,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    fn order_wire(&self, request: &OrderRequest) -> Result<OrderWire, Error> {
        let asset = self.assets.asset(&request.coin)?;
        let order_type = match &request.order_type {
            OrderType::Limit { tif } => OrderTypeWire::Limit { tif: *tif },
            OrderType::Trigger {
                trigger_px,
                is_market,
                tpsl,
            } => OrderTypeWire::Trigger {
                trigger_px: utils::float_to_wire(*trigger_px)?,
                is_market: *is_market,
                tpsl: *tpsl,
            },
        };
        let cloid = match &request.cloid {
            Some(cloid) => Some(utils::normalize_cloid(cloid)?),
            None => None,
        };

        Ok(OrderWire {
            asset,
            is_buy: request.is_buy,
            limit_px: utils::float_to_wire(request.limit_px)?,
            sz: utils::float_to_wire(request.sz)?,
            reduce_only: request.reduce_only,
            order_type,
            cloid,
        })
    }

    /// Places a single order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Status`] when the exchange rejects the order with a
    /// per-status error, even on an otherwise successful response.
    pub async fn place_order(
        &self,
        order: OrderRequest,
        builder: Option<Builder>,
    ) -> Result<OrderResponseStatus, Error> {
        let mut statuses = self.bulk_orders(vec![order], builder).await?;
        statuses.pop().ok_or_else(|| Error::Api {
            code: 0,
            msg: "no status returned for order".to_string(),
            data: None,
        })
    }

    /// Places a batch of orders in one action.
    pub async fn bulk_orders(
        &self,
        orders: Vec<OrderRequest>,
        builder: Option<Builder>,
    ) -> Result<Vec<OrderResponseStatus>, Error> {
        let orders = orders
            .iter()
            .map(|order| self.order_wire(order))
            .collect::<Result<Vec<_>, _>>()?;

        let action = Action::Order {
            orders,
            grouping: Grouping::Na,
            builder: builder.map(|builder| BuilderInfo {
                builder: builder.address.to_lowercase(),
                fee: builder.fee,
            }),
        };

        let response = self.execute_l1(action, self.vault_address).await?;
        Self::order_statuses(response)
    }

    /// Modifies one resting order.
    pub async fn modify_order(
        &self,
        request: ModifyRequest,
    ) -> Result<OrderResponseStatus, Error> {
        let action = Action::Modify {
            oid: request.oid,
            order: self.order_wire(&request.order)?,
        };
        let response = self.execute_l1(action, self.vault_address).await?;
        let mut statuses = Self::order_statuses(response)?;
        statuses.pop().ok_or_else(|| Error::Api {
            code: 0,
            msg: "no status returned for modified order".to_string(),
            data: None,
        })
    }

    /// Modifies a batch of resting orders.
    pub async fn bulk_modify_orders(
        &self,
        requests: Vec<ModifyRequest>,
    ) -> Result<Vec<OrderResponseStatus>, Error> {
        let modifies = requests
            .iter()
            .map(|request| {
                Ok(ModifyWire {
                    oid: request.oid,
                    order: self.order_wire(&request.order)?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let response = self
            .execute_l1(Action::BatchModify { modifies }, self.vault_address)
            .await?;
        Self::order_statuses(response)
    }

    /// Cancels one order by its exchange order id.
    ///
    /// Cancelling an order that is already gone surfaces the exchange's
    /// "Order was never placed, already canceled, or filled." status as
    /// [`Error::Status`].
    pub async fn cancel(
        &self,
        coin: &str,
        oid: u64,
    ) -> Result<Vec<CancelResponseStatus>, Error> {
        self.bulk_cancel(vec![CancelRequest {
            coin: coin.to_string(),
            oid,
        }])
        .await
    }

    /// Cancels a batch of orders by exchange order id.
    pub async fn bulk_cancel(
        &self,
        requests: Vec<CancelRequest>,
    ) -> Result<Vec<CancelResponseStatus>, Error> {
        let cancels = requests
            .iter()
            .map(|request| {
                Ok(CancelWire {
                    asset: self.assets.asset(&request.coin)?,
                    oid: request.oid,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let response = self
            .execute_l1(Action::Cancel { cancels }, self.vault_address)
            .await?;
        Self::cancel_statuses(response)
    }

    /// Cancels one order by client order id.
    pub async fn cancel_by_cloid(
        &self,
        coin: &str,
        cloid: &str,
    ) -> Result<Vec<CancelResponseStatus>, Error> {
        self.bulk_cancel_by_cloids(vec![CancelByCloidRequest {
            coin: coin.to_string(),
            cloid: cloid.to_string(),
        }])
        .await
    }

    /// Cancels a batch of orders by client order id.
    pub async fn bulk_cancel_by_cloids(
        &self,
        requests: Vec<CancelByCloidRequest>,
    ) -> Result<Vec<CancelResponseStatus>, Error> {
        let cancels = requests
            .iter()
            .map(|request| {
                Ok(CancelByCloidWire {
                    asset: self.assets.asset(&request.coin)?,
                    cloid: utils::normalize_cloid(&request.cloid)?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let response = self
            .execute_l1(Action::CancelByCloid { cancels }, self.vault_address)
            .await?;
        Self::cancel_statuses(response)
    }

    /// Schedules cancellation of all open orders at `time` (ms), or clears
    /// a previously scheduled cancel when `None`.
    pub async fn schedule_cancel(&self, time: Option<u64>) -> Result<(), Error> {
        let response = self
            .execute_l1(Action::ScheduleCancel { time }, self.vault_address)
            .await?;
        Self::expect_default(response)
    }

    // ------------------------------------------------------------------
    // Market helpers
    // ------------------------------------------------------------------

    /// Computes an aggressive limit price for market-style orders.
    ///
    /// Starting from `px` (or the current mid), the price is pushed by
    /// `slippage` in the taker direction, rounded to 5 significant figures
    /// and then to the asset's allowed decimals (6 for perps, 8 for spot,
    /// minus size decimals).
    pub async fn slippage_price(
        &self,
        coin: &str,
        is_buy: bool,
        slippage: f64,
        px: Option<f64>,
    ) -> Result<f64, Error> {
        let mut price = match px {
            Some(px) => px,
            None => {
                let mids = self.client.all_mids(None).await?;
                mids.get(coin)
                    .and_then(|mid| mid.to_f64())
                    .ok_or_else(|| {
                        Error::Resolution(format!("could not get mid price for coin: {coin}"))
                    })?
            }
        };

        let asset = self.assets.asset(coin)?;
        let sz_decimals = self.assets.sz_decimals(asset).unwrap_or(0);
        let max_decimals: u32 = if AssetMap::is_spot(asset) { 8 } else { 6 };

        price *= if is_buy { 1.0 + slippage } else { 1.0 - slippage };
        price = utils::round_to_significant_figures(price, 5);

        Ok(utils::round_to_decimals(
            price,
            max_decimals.saturating_sub(sz_decimals),
        ))
    }

    /// Opens a position with an IOC order at a slippage-adjusted price.
    pub async fn market_open(
        &self,
        coin: &str,
        is_buy: bool,
        sz: f64,
        px: Option<f64>,
        slippage: f64,
        cloid: Option<String>,
        builder: Option<Builder>,
    ) -> Result<OrderResponseStatus, Error> {
        let limit_px = self.slippage_price(coin, is_buy, slippage, px).await?;
        self.place_order(
            OrderRequest {
                coin: coin.to_string(),
                is_buy,
                limit_px,
                sz,
                reduce_only: false,
                order_type: OrderType::Limit { tif: crate::types::Tif::Ioc },
                cloid,
            },
            builder,
        )
        .await
    }

    /// Closes (part of) an open position with a reduce-only IOC order.
    ///
    /// The position is looked up on the configured account address, falling
    /// back to the vault and finally the signer.
    pub async fn market_close(
        &self,
        coin: &str,
        sz: Option<f64>,
        px: Option<f64>,
        slippage: f64,
        cloid: Option<String>,
        builder: Option<Builder>,
    ) -> Result<OrderResponseStatus, Error> {
        let address = self
            .account_address
            .or(self.vault_address)
            .unwrap_or_else(|| self.signer.address());
        let state = self.client.clearinghouse_state(address, None).await?;

        let position = state
            .asset_positions
            .iter()
            .map(|wrapper| &wrapper.position)
            .find(|position| position.coin == coin)
            .ok_or_else(|| Error::Resolution(format!("position not found for coin: {coin}")))?;

        let szi = position.szi.to_f64().unwrap_or(0.0);
        let size = sz.unwrap_or_else(|| szi.abs());
        let is_buy = szi < 0.0;

        let limit_px = self.slippage_price(coin, is_buy, slippage, px).await?;
        self.place_order(
            OrderRequest {
                coin: coin.to_string(),
                is_buy,
                limit_px,
                sz: size,
                reduce_only: true,
                order_type: OrderType::Limit { tif: crate::types::Tif::Ioc },
                cloid,
            },
            builder,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Account management
    // ------------------------------------------------------------------

    /// Updates the leverage of a coin.
    pub async fn update_leverage(
        &self,
        leverage: u32,
        coin: &str,
        is_cross: bool,
    ) -> Result<(), Error> {
        let action = Action::UpdateLeverage {
            asset: self.assets.asset(coin)?,
            is_cross,
            leverage,
        };
        let response = self.execute_l1(action, self.vault_address).await?;
        Self::expect_default(response)
    }

    /// Adds (positive) or removes (negative) isolated margin on a coin.
    pub async fn update_isolated_margin(&self, amount: f64, coin: &str) -> Result<(), Error> {
        let action = Action::UpdateIsolatedMargin {
            asset: self.assets.asset(coin)?,
            is_buy: amount > 0.0,
            ntli: utils::float_to_usd_int(amount.abs()),
        };
        let response = self.execute_l1(action, self.vault_address).await?;
        Self::expect_default(response)
    }

    /// Reserves additional request weight; each unit costs 0.0005 USDC from
    /// the perps balance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when `weight` is zero. Reservation is
    /// always signed by the main wallet, never a vault.
    pub async fn reserve_request_weight(&self, weight: u32) -> Result<(), Error> {
        if weight == 0 {
            return Err(Error::validation("weight", "weight must be greater than 0"));
        }
        let response = self
            .execute_l1(Action::ReserveRequestWeight { weight }, None)
            .await?;
        Self::expect_default(response)
    }

    /// Sets a referral code on the signing account.
    pub async fn set_referrer(&self, code: &str) -> Result<(), Error> {
        let action = Action::SetReferrer {
            code: code.to_string(),
        };
        let response = self.execute_l1(action, None).await?;
        Self::expect_default(response)
    }

    /// Creates a named sub-account.
    pub async fn create_sub_account(&self, name: &str) -> Result<(), Error> {
        let action = Action::CreateSubAccount {
            name: name.to_string(),
        };
        let response = self.execute_l1(action, None).await?;
        Self::expect_default(response)
    }

    /// Moves USDC between the master account and a sub-account.
    pub async fn sub_account_transfer(
        &self,
        sub_account_user: Address,
        is_deposit: bool,
        usd: u64,
    ) -> Result<(), Error> {
        let action = Action::SubAccountTransfer {
            sub_account_user: format!("{sub_account_user:#x}"),
            is_deposit,
            usd,
        };
        let response = self.execute_l1(action, None).await?;
        Self::expect_default(response)
    }

    /// Moves a spot token between the master account and a sub-account.
    pub async fn sub_account_spot_transfer(
        &self,
        sub_account_user: Address,
        is_deposit: bool,
        token: &str,
        amount: f64,
    ) -> Result<(), Error> {
        let action = Action::SubAccountSpotTransfer {
            sub_account_user: format!("{sub_account_user:#x}"),
            is_deposit,
            token: token.to_string(),
            amount: utils::float_to_wire(amount)?,
        };
        let response = self.execute_l1(action, self.vault_address).await?;
        Self::expect_default(response)
    }

    /// Deposits to or withdraws from a vault.
    pub async fn vault_usd_transfer(
        &self,
        vault_address: Address,
        is_deposit: bool,
        usd: u64,
    ) -> Result<(), Error> {
        let action = Action::VaultUsdTransfer {
            vault_address: format!("{vault_address:#x}"),
            is_deposit,
            usd,
        };
        let response = self.execute_l1(action, None).await?;
        Self::expect_default(response)
    }

    /// Creates a vault.
    pub async fn create_vault(
        &self,
        name: &str,
        description: &str,
        initial_usd: u64,
    ) -> Result<(), Error> {
        let action = Action::CreateVault {
            name: name.to_string(),
            description: description.to_string(),
            initial_usd,
        };
        let response = self.execute_l1(action, None).await?;
        Self::expect_default(response)
    }

    /// Updates vault deposit and withdrawal policy.
    pub async fn vault_modify(
        &self,
        vault_address: Address,
        allow_deposits: bool,
        always_close_on_withdraw: bool,
    ) -> Result<(), Error> {
        let action = Action::VaultModify {
            vault_address: format!("{vault_address:#x}"),
            allow_deposits,
            always_close_on_withdraw,
        };
        let response = self.execute_l1(action, None).await?;
        Self::expect_default(response)
    }

    /// Distributes vault profits to depositors.
    pub async fn vault_distribute(&self, vault_address: Address, usd: u64) -> Result<(), Error> {
        let action = Action::VaultDistribute {
            vault_address: format!("{vault_address:#x}"),
            usd,
        };
        let response = self.execute_l1(action, None).await?;
        Self::expect_default(response)
    }

    /// Delegates or undelegates staking tokens to a validator.
    pub async fn token_delegate(
        &self,
        validator: Address,
        wei: u64,
        is_undelegate: bool,
    ) -> Result<(), Error> {
        let nonce = self.nonces.next();
        let action = Action::TokenDelegate {
            validator: format!("{validator:#x}"),
            wei,
            is_undelegate,
            nonce,
        };
        let signature = signing::sign_l1_action(
            &self.signer,
            self.chain(),
            &action,
            nonce,
            self.vault_address,
            self.expires_after,
        )?;
        let response = self.post(action, nonce, signature).await?;
        Self::expect_default(response)
    }

    /// Enables or disables big blocks for the account's EVM transactions.
    pub async fn use_big_blocks(&self, enable: bool) -> Result<(), Error> {
        let action = Action::EvmUserModify {
            using_big_blocks: enable,
        };
        let response = self.execute_l1(action, None).await?;
        Self::expect_default(response)
    }

    /// Moves collateral between a builder-deployed perp dex and spot.
    pub async fn perp_dex_class_transfer(
        &self,
        dex: &str,
        token: &str,
        amount: f64,
        to_perp: bool,
    ) -> Result<(), Error> {
        let action = Action::PerpDexClassTransfer {
            dex: dex.to_string(),
            token: token.to_string(),
            amount: utils::float_to_wire(amount)?,
            to_perp,
        };
        let response = self.execute_l1(action, self.vault_address).await?;
        Self::expect_default(response)
    }

    // ------------------------------------------------------------------
    // User-signed actions
    // ------------------------------------------------------------------

    async fn execute_user_signed<T: alloy::sol_types::SolStruct>(
        &self,
        action: Action,
        nonce: u64,
    ) -> Result<ApiResponse, Error> {
        let message = serde_json::to_value(&action).map_err(|e| Error::Signature(e.to_string()))?;
        let signature = signing::sign_user_signed_action::<T, _>(&self.signer, &message)?;
        self.post(action, nonce, signature).await
    }

    /// Transfers USDC between the perp and spot balances.
    ///
    /// With a vault configured, the signed amount string carries a
    /// `subaccount:<vault>` suffix and the envelope's `vaultAddress` is
    /// forced to `null`.
    pub async fn usd_class_transfer(&self, amount: f64, to_perp: bool) -> Result<(), Error> {
        let nonce = self.nonces.next();

        let mut amount = utils::format_amount(amount);
        if let Some(vault) = self.vault_address {
            amount = format!("{amount} subaccount:{vault:#x}");
        }

        let action = Action::UsdClassTransfer {
            signature_chain_id: crate::SIGNATURE_CHAIN_ID.to_string(),
            hyperliquid_chain: self.chain(),
            amount,
            to_perp,
            nonce,
        };
        let response = self
            .execute_user_signed::<solidity::UsdClassTransfer>(action, nonce)
            .await?;
        Self::expect_default(response)
    }

    /// Sends USDC from the perps balance to another address.
    pub async fn usd_send(&self, destination: Address, amount: f64) -> Result<(), Error> {
        let nonce = self.nonces.next();
        let action = Action::UsdSend {
            signature_chain_id: crate::SIGNATURE_CHAIN_ID.to_string(),
            hyperliquid_chain: self.chain(),
            destination: format!("{destination:#x}"),
            amount: utils::format_amount(amount),
            time: nonce,
        };
        let response = self
            .execute_user_signed::<solidity::UsdSend>(action, nonce)
            .await?;
        Self::expect_default(response)
    }

    /// Sends a spot token to another address.
    pub async fn spot_send(
        &self,
        destination: Address,
        token: &str,
        amount: f64,
    ) -> Result<(), Error> {
        let nonce = self.nonces.next();
        let action = Action::SpotSend {
            signature_chain_id: crate::SIGNATURE_CHAIN_ID.to_string(),
            hyperliquid_chain: self.chain(),
            destination: format!("{destination:#x}"),
            token: token.to_string(),
            amount: utils::format_amount(amount),
            time: nonce,
        };
        let response = self
            .execute_user_signed::<solidity::SpotSend>(action, nonce)
            .await?;
        Self::expect_default(response)
    }

    /// Withdraws USDC over the bridge.
    pub async fn withdraw_from_bridge(
        &self,
        destination: Address,
        amount: f64,
    ) -> Result<(), Error> {
        let nonce = self.nonces.next();
        let action = Action::Withdraw3 {
            signature_chain_id: crate::SIGNATURE_CHAIN_ID.to_string(),
            hyperliquid_chain: self.chain(),
            destination: format!("{destination:#x}"),
            amount: utils::format_amount(amount),
            time: nonce,
        };
        let response = self
            .execute_user_signed::<solidity::Withdraw>(action, nonce)
            .await?;
        Self::expect_default(response)
    }

    /// Generates and approves a fresh agent (API) wallet.
    ///
    /// Returns the agent's private key as a `0x`-prefixed hex string; the
    /// caller is responsible for storing it. The key never leaves this
    /// process otherwise.
    pub async fn approve_agent(&self, name: Option<&str>) -> Result<String, Error> {
        let agent = PrivateKeySigner::random();
        let agent_key = format!("0x{:x}", agent.to_bytes());
        let agent_address = agent.address().to_checksum(None);

        let nonce = self.nonces.next();
        let action = Action::ApproveAgent {
            signature_chain_id: crate::SIGNATURE_CHAIN_ID.to_string(),
            hyperliquid_chain: self.chain(),
            agent_address,
            agent_name: name.map(str::to_string),
            nonce,
        };

        // The primary type declares agentName, so an unnamed agent must
        // still hash the empty string even though the wire omits the field.
        let mut message =
            serde_json::to_value(&action).map_err(|e| Error::Signature(e.to_string()))?;
        if name.is_none() {
            message
                .as_object_mut()
                .expect("actions serialize to objects")
                .insert("agentName".to_string(), Value::String(String::new()));
        }
        let signature =
            signing::sign_user_signed_action::<solidity::ApproveAgent, _>(&self.signer, &message)?;

        let response = self.post(action, nonce, signature).await?;
        Self::expect_default(response)?;
        Ok(agent_key)
    }

    /// Approves a builder to charge up to `max_fee_rate` on the account's
    /// orders (e.g. `"0.001%"`).
    pub async fn approve_builder_fee(
        &self,
        builder: Address,
        max_fee_rate: &str,
    ) -> Result<(), Error> {
        let nonce = self.nonces.next();
        let action = Action::ApproveBuilderFee {
            signature_chain_id: crate::SIGNATURE_CHAIN_ID.to_string(),
            hyperliquid_chain: self.chain(),
            max_fee_rate: max_fee_rate.to_string(),
            builder: format!("{builder:#x}"),
            nonce,
        };
        let response = self
            .execute_user_signed::<solidity::ApproveBuilderFee>(action, nonce)
            .await?;
        Self::expect_default(response)
    }

    /// Converts the signing account into a multi-sig user.
    ///
    /// The authorized users are sorted and embedded as a JSON string, which
    /// is the exact form the signature covers.
    pub async fn convert_to_multi_sig_user(
        &self,
        authorized_users: Vec<Address>,
        threshold: usize,
    ) -> Result<(), Error> {
        let mut authorized_users: Vec<String> = authorized_users
            .iter()
            .map(|user| format!("{user:#x}"))
            .collect();
        authorized_users.sort();

        let signers = serde_json::to_string(&MultiSigConfig {
            authorized_users,
            threshold,
        })
        .map_err(|e| Error::Signature(e.to_string()))?;

        let nonce = self.nonces.next();
        let action = Action::ConvertToMultiSigUser {
            signature_chain_id: crate::SIGNATURE_CHAIN_ID.to_string(),
            hyperliquid_chain: self.chain(),
            signers,
            nonce,
        };
        let response = self
            .execute_user_signed::<solidity::ConvertToMultiSigUser>(action, nonce)
            .await?;
        Self::expect_default(response)
    }

    /// Submits a multi-sig wrapped action with pre-collected signatures.
    pub async fn multi_sig(
        &self,
        action: Value,
        signers: Vec<String>,
        signatures: Vec<String>,
    ) -> Result<(), Error> {
        let action = Action::MultiSig {
            action,
            signers,
            signatures,
        };
        let response = self.execute_l1(action, self.vault_address).await?;
        Self::expect_default(response)
    }

    // ------------------------------------------------------------------
    // Spot deploy
    // ------------------------------------------------------------------

    /// Registers a new spot token.
    pub async fn spot_deploy_register_token(
        &self,
        token_name: &str,
        sz_decimals: u32,
        wei_decimals: u32,
        max_gas: u64,
        full_name: &str,
    ) -> Result<(), Error> {
        let action = Action::SpotDeployRegisterToken {
            register_token2: RegisterToken2 {
                spec: TokenSpec {
                    name: token_name.to_string(),
                    sz_decimals,
                    wei_decimals,
                },
                max_gas,
                full_name: full_name.to_string(),
            },
        };
        let response = self.execute_l1(action, None).await?;
        Self::expect_default(response)
    }

    /// Seeds user balances for a spot genesis. Amounts are wire strings,
    /// keyed (and therefore hashed) in sorted order.
    pub async fn spot_deploy_user_genesis(
        &self,
        balances: BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let response = self
            .execute_l1(
                Action::SpotDeployUserGenesis { balances },
                self.vault_address,
            )
            .await?;
        Self::expect_default(response)
    }

    /// Enables the deployer's freeze privilege.
    pub async fn spot_deploy_enable_freeze_privilege(&self) -> Result<(), Error> {
        let response = self
            .execute_l1(Action::SpotDeployEnableFreezePrivilege, self.vault_address)
            .await?;
        Self::expect_default(response)
    }

    /// Freezes a user in the deployed spot market.
    pub async fn spot_deploy_freeze_user(&self, user: Address) -> Result<(), Error> {
        let action = Action::SpotDeployFreezeUser {
            user_address: format!("{user:#x}"),
        };
        let response = self.execute_l1(action, self.vault_address).await?;
        Self::expect_default(response)
    }

    /// Revokes the deployer's freeze privilege.
    pub async fn spot_deploy_revoke_freeze_privilege(&self) -> Result<(), Error> {
        let response = self
            .execute_l1(Action::SpotDeployRevokeFreezePrivilege, self.vault_address)
            .await?;
        Self::expect_default(response)
    }

    /// Runs the spot genesis for a deployer.
    pub async fn spot_deploy_genesis(&self, deployer: &str, dex_name: &str) -> Result<(), Error> {
        let action = Action::SpotDeployGenesis {
            deployer: deployer.to_string(),
            dex_name: dex_name.to_string(),
        };
        let response = self.execute_l1(action, self.vault_address).await?;
        Self::expect_default(response)
    }

    /// Registers a spot trading pair between two tokens.
    pub async fn spot_deploy_register_spot(
        &self,
        base_token: &str,
        quote_token: &str,
    ) -> Result<(), Error> {
        let action = Action::SpotDeployRegisterSpot {
            base_token: base_token.to_string(),
            quote_token: quote_token.to_string(),
        };
        let response = self.execute_l1(action, self.vault_address).await?;
        Self::expect_default(response)
    }

    /// Registers hyperliquidity for a deployed spot market.
    pub async fn spot_deploy_register_hyperliquidity(
        &self,
        name: &str,
        tokens: Vec<String>,
    ) -> Result<(), Error> {
        let action = Action::SpotDeployRegisterHyperliquidity {
            name: name.to_string(),
            tokens,
        };
        let response = self.execute_l1(action, self.vault_address).await?;
        Self::expect_default(response)
    }

    /// Sets the deployer trading fee share (a wire string, e.g. `"0.0005"`).
    pub async fn spot_deploy_set_deployer_trading_fee_share(
        &self,
        fee_share: &str,
    ) -> Result<(), Error> {
        let action = Action::SpotDeploySetDeployerTradingFeeShare {
            fee_share: fee_share.to_string(),
        };
        let response = self.execute_l1(action, self.vault_address).await?;
        Self::expect_default(response)
    }

    // ------------------------------------------------------------------
    // Perp deploy
    // ------------------------------------------------------------------

    /// Registers a perp asset on a builder-deployed dex; supply `schema` to
    /// create the dex alongside the first asset.
    pub async fn perp_deploy_register_asset(
        &self,
        dex: &str,
        max_gas: Option<u64>,
        asset_request: AssetRequest,
        schema: Option<DexSchema>,
    ) -> Result<(), Error> {
        let action = Action::PerpDeploy(PerpDeploy::RegisterAsset {
            register_asset: RegisterAsset {
                max_gas,
                asset_request,
                dex: dex.to_string(),
                schema: schema.map(normalize_schema),
            },
        });
        let response = self.execute_l1(action, self.vault_address).await?;
        Self::expect_default(response)
    }

    /// Registers a perp asset using the margin-mode request shape.
    pub async fn perp_deploy_register_asset2(
        &self,
        dex: &str,
        max_gas: Option<u64>,
        asset_request: AssetRequest2,
        schema: Option<DexSchema>,
    ) -> Result<(), Error> {
        let action = Action::PerpDeploy(PerpDeploy::RegisterAsset2 {
            register_asset2: RegisterAsset2 {
                max_gas,
                asset_request,
                dex: dex.to_string(),
                schema: schema.map(normalize_schema),
            },
        });
        let response = self.execute_l1(action, self.vault_address).await?;
        Self::expect_default(response)
    }

    /// Pushes oracle prices for a builder-deployed dex.
    ///
    /// All three maps are flattened into `[coin, px]` pair lists sorted by
    /// coin so the hashed bytes are deterministic.
    pub async fn perp_deploy_set_oracle(
        &self,
        dex: &str,
        oracle_pxs: HashMap<String, String>,
        all_mark_pxs: Vec<HashMap<String, String>>,
        external_perp_pxs: HashMap<String, String>,
    ) -> Result<(), Error> {
        let action = Action::PerpDeploy(PerpDeploy::SetOracle {
            set_oracle: SetOracle {
                dex: dex.to_string(),
                oracle_pxs: sorted_pairs(oracle_pxs),
                mark_pxs: all_mark_pxs.into_iter().map(sorted_pairs).collect(),
                external_perp_pxs: sorted_pairs(external_perp_pxs),
            },
        });
        let response = self.execute_l1(action, self.vault_address).await?;
        Self::expect_default(response)
    }

    /// Halts or resumes trading of a builder-deployed coin.
    pub async fn perp_deploy_halt_trading(
        &self,
        coin: &str,
        is_halted: bool,
    ) -> Result<(), Error> {
        let action = Action::PerpDeploy(PerpDeploy::HaltTrading {
            halt_trading: HaltTrading {
                coin: coin.to_string(),
                is_halted,
            },
        });
        let response = self.execute_l1(action, self.vault_address).await?;
        Self::expect_default(response)
    }

    // ------------------------------------------------------------------
    // Validator operations
    // ------------------------------------------------------------------

    /// Unjails the signing validator.
    pub async fn c_signer_unjail_self(&self) -> Result<(), Error> {
        let response = self
            .execute_l1(Action::CSignerUnjailSelf, self.vault_address)
            .await?;
        Self::expect_default(response)
    }

    /// Jails the signing validator.
    pub async fn c_signer_jail_self(&self) -> Result<(), Error> {
        let response = self
            .execute_l1(Action::CSignerJailSelf, self.vault_address)
            .await?;
        Self::expect_default(response)
    }

    /// Executes an inner consensus-signer action.
    pub async fn c_signer_inner(&self, inner_action: Value) -> Result<(), Error> {
        let response = self
            .execute_l1(Action::CSignerInner { inner_action }, self.vault_address)
            .await?;
        Self::expect_default(response)
    }

    /// Registers the signing account as a validator.
    pub async fn c_validator_register(&self, validator_profile: Value) -> Result<(), Error> {
        let response = self
            .execute_l1(
                Action::CValidatorRegister { validator_profile },
                self.vault_address,
            )
            .await?;
        Self::expect_default(response)
    }

    /// Updates the validator profile.
    pub async fn c_validator_change_profile(&self, new_profile: Value) -> Result<(), Error> {
        let response = self
            .execute_l1(
                Action::CValidatorChangeProfile { new_profile },
                self.vault_address,
            )
            .await?;
        Self::expect_default(response)
    }

    /// Unregisters the validator.
    pub async fn c_validator_unregister(&self) -> Result<(), Error> {
        let response = self
            .execute_l1(Action::CValidatorUnregister, self.vault_address)
            .await?;
        Self::expect_default(response)
    }
}

fn normalize_schema(schema: DexSchema) -> DexSchema {
    DexSchema {
        oracle_updater: schema.oracle_updater.map(|updater| updater.to_lowercase()),
        ..schema
    }
}

fn sorted_pairs(map: HashMap<String, String>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = map.into_iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_vault_rules() {
        // No vault configured: the field is absent.
        let request = ActionRequest {
            action: Action::ScheduleCancel { time: None },
            nonce: 1,
            signature: Signature {
                r: Default::default(),
                s: Default::default(),
                v: 27,
            },
            vault_address: None,
            expires_after: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("vaultAddress").is_none());
        assert!(json.get("expiresAfter").is_none());

        // Vault configured: present for ordinary actions.
        let vault: Address = "0x1719884eb866cb12b2287399b15f7db5e7d775ea"
            .parse()
            .unwrap();
        let request = ActionRequest {
            action: Action::ScheduleCancel { time: None },
            nonce: 1,
            signature: Signature {
                r: Default::default(),
                s: Default::default(),
                v: 27,
            },
            vault_address: Some(Some(vault)),
            expires_after: Some(123),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json["vaultAddress"],
            "0x1719884eb866cb12b2287399b15f7db5e7d775ea"
        );
        assert_eq!(json["expiresAfter"], 123);

        // usdClassTransfer with a vault: explicit null.
        let request = ActionRequest {
            action: Action::UsdClassTransfer {
                signature_chain_id: crate::SIGNATURE_CHAIN_ID.to_string(),
                hyperliquid_chain: Chain::Mainnet,
                amount: "1.000000".to_string(),
                to_perp: true,
                nonce: 1,
            },
            nonce: 1,
            signature: Signature {
                r: Default::default(),
                s: Default::default(),
                v: 27,
            },
            vault_address: Some(None),
            expires_after: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["vaultAddress"], Value::Null);
    }

    #[test]
    fn test_status_promotion() {
        let response: ApiResponse = serde_json::from_str(
            r#"{"status":"ok","response":{"type":"order","data":{"statuses":[
                {"resting":{"oid":1}},
                {"error":"Order must have minimum value of $10."}
            ]}}}"#,
        )
        .unwrap();
        let err = Exchange::order_statuses(response).unwrap_err();
        assert!(matches!(err, Error::Status(_)));
        assert!(err.to_string().contains("minimum value of $10"));

        let response: ApiResponse = serde_json::from_str(
            r#"{"status":"ok","response":{"type":"cancel","data":{"statuses":[
                {"error":"Order was never placed, already canceled, or filled. asset=5"}
            ]}}}"#,
        )
        .unwrap();
        let err = Exchange::cancel_statuses(response).unwrap_err();
        assert!(err.to_string().contains("already canceled"));
    }

    #[test]
    fn test_err_envelope_becomes_api_error() {
        let response: ApiResponse = serde_json::from_str(
            r#"{"status":"err","response":"User or API Wallet 0x12 does not exist."}"#,
        )
        .unwrap();
        let err = Exchange::expect_default(response).unwrap_err();
        assert!(err.is_wallet_missing());
    }

    #[test]
    fn test_sorted_pairs_orders_by_coin() {
        let mut map = HashMap::new();
        map.insert("ETH".to_string(), "3000".to_string());
        map.insert("BTC".to_string(), "65000".to_string());
        map.insert("AAA".to_string(), "1".to_string());
        let pairs = sorted_pairs(map);
        let coins: Vec<&str> = pairs.iter().map(|(coin, _)| coin.as_str()).collect();
        assert_eq!(coins, ["AAA", "BTC", "ETH"]);
    }
}

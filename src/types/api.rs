//! Exchange action wire types.
//!
//! [`Action`] is the tagged union of every request body the `/exchange`
//! endpoint accepts. The same value is serialized twice: once with
//! `rmp_serde` (MessagePack) to produce the bytes that get hashed and
//! signed, and once with `serde_json` as the request body. Field order is
//! therefore load-bearing — struct declaration order here is the order the
//! server hashes, and it must not be rearranged.

use std::collections::BTreeMap;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{OidOrCloid, OrderResponseStatus, Signature};
use crate::{utils, Chain, Cloid};

/// A single order as it appears inside an [`Action::Order`].
///
/// Prices and sizes are pre-stringified wire values (see
/// [`crate::utils::float_to_wire`]); raw floats never reach the encoder.
#[derive(Clone, Debug, Serialize)]
pub struct OrderWire {
    /// Asset index identifying the market.
    #[serde(rename = "a")]
    pub asset: u32,
    /// `true` for a buy, `false` for a sell.
    #[serde(rename = "b")]
    pub is_buy: bool,
    /// Limit price in wire form.
    #[serde(rename = "p")]
    pub limit_px: String,
    /// Order size in wire form.
    #[serde(rename = "s")]
    pub sz: String,
    /// When `true`, the order can only reduce an existing position.
    #[serde(rename = "r")]
    pub reduce_only: bool,
    /// Limit or trigger parameters.
    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,
    /// Client order id, canonical `0x` + 32 hex chars.
    #[serde(
        rename = "c",
        skip_serializing_if = "Option::is_none",
        serialize_with = "utils::serialize_opt_cloid_as_hex"
    )]
    pub cloid: Option<Cloid>,
}

/// Order type in wire form.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderTypeWire {
    Limit {
        tif: Tif,
    },
    #[serde(rename_all = "camelCase")]
    Trigger {
        trigger_px: String,
        is_market: bool,
        tpsl: TpSl,
    },
}

/// Time-in-force for a limit order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tif {
    /// Add liquidity only; rejected if it would cross.
    Alo,
    /// Immediate or cancel.
    Ioc,
    /// Good till canceled.
    Gtc,
    /// Market-order type used by the exchange frontend.
    FrontendMarket,
}

/// Take-profit or stop-loss marker on a trigger order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TpSl {
    Tp,
    Sl,
}

/// Grouping strategy for a batch of orders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Grouping {
    Na,
    NormalTpsl,
    PositionTpsl,
}

/// Builder-fee attribution attached to an order batch.
#[derive(Clone, Debug, Serialize)]
pub struct BuilderInfo {
    /// Builder address.
    #[serde(rename = "b")]
    pub builder: String,
    /// Fee in tenths of a basis point.
    #[serde(rename = "f")]
    pub fee: u64,
}

/// One modification inside an [`Action::BatchModify`].
#[derive(Clone, Debug, Serialize)]
pub struct ModifyWire {
    pub oid: OidOrCloid,
    pub order: OrderWire,
}

/// Cancel by exchange order id.
#[derive(Clone, Debug, Serialize)]
pub struct CancelWire {
    #[serde(rename = "a")]
    pub asset: u32,
    #[serde(rename = "o")]
    pub oid: u64,
}

/// Cancel by client order id.
#[derive(Clone, Debug, Serialize)]
pub struct CancelByCloidWire {
    pub asset: u32,
    #[serde(serialize_with = "utils::serialize_cloid_as_hex")]
    pub cloid: Cloid,
}

/// Token spec inside a spot-deploy `registerToken2`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSpec {
    pub name: String,
    pub sz_decimals: u32,
    pub wei_decimals: u32,
}

/// Spot-deploy token registration payload.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterToken2 {
    pub spec: TokenSpec,
    pub max_gas: u64,
    pub full_name: String,
}

/// Asset request inside a perp-deploy `registerAsset`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRequest {
    pub coin: String,
    pub sz_decimals: u32,
    pub oracle_px: String,
    pub margin_table_id: u64,
    pub only_isolated: bool,
}

/// Newer asset request carrying an explicit margin mode.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRequest2 {
    pub coin: String,
    pub sz_decimals: u32,
    pub oracle_px: String,
    pub margin_table_id: u64,
    pub margin_mode: String,
}

/// Dex schema supplied when the first asset registration also creates the
/// dex.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DexSchema {
    pub full_name: String,
    pub collateral_token: u64,
    /// Lowercased oracle-updater address; `null` delegates to the deployer.
    pub oracle_updater: Option<String>,
}

/// Perp-deploy asset registration payload.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAsset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_gas: Option<u64>,
    pub asset_request: AssetRequest,
    pub dex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<DexSchema>,
}

/// Perp-deploy asset registration payload with margin-mode request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAsset2 {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_gas: Option<u64>,
    pub asset_request: AssetRequest2,
    pub dex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<DexSchema>,
}

/// Perp-deploy oracle update: sorted `[coin, px]` pair lists.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetOracle {
    pub dex: String,
    pub oracle_pxs: Vec<(String, String)>,
    pub mark_pxs: Vec<Vec<(String, String)>>,
    pub external_perp_pxs: Vec<(String, String)>,
}

/// Perp-deploy trading halt toggle.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HaltTrading {
    pub coin: String,
    pub is_halted: bool,
}

/// The nested variants of the `perpDeploy` action.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum PerpDeploy {
    #[serde(rename_all = "camelCase")]
    RegisterAsset { register_asset: RegisterAsset },
    #[serde(rename_all = "camelCase")]
    RegisterAsset2 { register_asset2: RegisterAsset2 },
    #[serde(rename_all = "camelCase")]
    SetOracle { set_oracle: SetOracle },
    #[serde(rename_all = "camelCase")]
    HaltTrading { halt_trading: HaltTrading },
}

/// An exchange action, tagged by its `type` discriminant.
///
/// L1 actions are hashed from the MessagePack form of this value; the
/// user-signed variants (`usdSend`, `spotSend`, `withdraw3`,
/// `usdClassTransfer`, `approveAgent`, `approveBuilderFee`,
/// `convertToMultiSigUser`) instead sign EIP-712 typed data and carry
/// `signatureChainId`/`hyperliquidChain` on the wire.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Order {
        orders: Vec<OrderWire>,
        grouping: Grouping,
        #[serde(skip_serializing_if = "Option::is_none")]
        builder: Option<BuilderInfo>,
    },
    Modify {
        oid: OidOrCloid,
        order: OrderWire,
    },
    BatchModify {
        modifies: Vec<ModifyWire>,
    },
    Cancel {
        cancels: Vec<CancelWire>,
    },
    CancelByCloid {
        cancels: Vec<CancelByCloidWire>,
    },
    ScheduleCancel {
        #[serde(skip_serializing_if = "Option::is_none")]
        time: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    UpdateLeverage {
        asset: u32,
        is_cross: bool,
        leverage: u32,
    },
    #[serde(rename_all = "camelCase")]
    UpdateIsolatedMargin {
        asset: u32,
        is_buy: bool,
        ntli: i64,
    },
    ReserveRequestWeight {
        weight: u32,
    },
    SetReferrer {
        code: String,
    },
    CreateSubAccount {
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    SubAccountTransfer {
        sub_account_user: String,
        is_deposit: bool,
        usd: u64,
    },
    #[serde(rename_all = "camelCase")]
    SubAccountSpotTransfer {
        sub_account_user: String,
        is_deposit: bool,
        token: String,
        amount: String,
    },
    #[serde(rename = "vaultTransfer", rename_all = "camelCase")]
    VaultUsdTransfer {
        vault_address: String,
        is_deposit: bool,
        usd: u64,
    },
    #[serde(rename_all = "camelCase")]
    CreateVault {
        name: String,
        description: String,
        initial_usd: u64,
    },
    #[serde(rename_all = "camelCase")]
    VaultModify {
        vault_address: String,
        allow_deposits: bool,
        always_close_on_withdraw: bool,
    },
    #[serde(rename_all = "camelCase")]
    VaultDistribute {
        vault_address: String,
        usd: u64,
    },
    #[serde(rename_all = "camelCase")]
    TokenDelegate {
        validator: String,
        wei: u64,
        is_undelegate: bool,
        nonce: u64,
    },
    #[serde(rename_all = "camelCase")]
    EvmUserModify {
        using_big_blocks: bool,
    },
    #[serde(rename_all = "camelCase")]
    PerpDexClassTransfer {
        dex: String,
        token: String,
        amount: String,
        to_perp: bool,
    },
    MultiSig {
        action: Value,
        signers: Vec<String>,
        signatures: Vec<String>,
    },
    #[serde(rename = "spotDeploy", rename_all = "camelCase")]
    SpotDeployRegisterToken {
        register_token2: RegisterToken2,
    },
    SpotDeployUserGenesis {
        balances: BTreeMap<String, String>,
    },
    SpotDeployEnableFreezePrivilege,
    #[serde(rename_all = "camelCase")]
    SpotDeployFreezeUser {
        user_address: String,
    },
    SpotDeployRevokeFreezePrivilege,
    #[serde(rename_all = "camelCase")]
    SpotDeployGenesis {
        deployer: String,
        dex_name: String,
    },
    #[serde(rename_all = "camelCase")]
    SpotDeployRegisterSpot {
        base_token: String,
        quote_token: String,
    },
    SpotDeployRegisterHyperliquidity {
        name: String,
        tokens: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    SpotDeploySetDeployerTradingFeeShare {
        fee_share: String,
    },
    PerpDeploy(PerpDeploy),
    CSignerUnjailSelf,
    CSignerJailSelf,
    #[serde(rename_all = "camelCase")]
    CSignerInner {
        inner_action: Value,
    },
    #[serde(rename_all = "camelCase")]
    CValidatorRegister {
        validator_profile: Value,
    },
    #[serde(rename_all = "camelCase")]
    CValidatorChangeProfile {
        new_profile: Value,
    },
    CValidatorUnregister,
    #[serde(rename_all = "camelCase")]
    UsdSend {
        signature_chain_id: String,
        hyperliquid_chain: Chain,
        destination: String,
        amount: String,
        time: u64,
    },
    #[serde(rename_all = "camelCase")]
    SpotSend {
        signature_chain_id: String,
        hyperliquid_chain: Chain,
        destination: String,
        token: String,
        amount: String,
        time: u64,
    },
    #[serde(rename_all = "camelCase")]
    Withdraw3 {
        signature_chain_id: String,
        hyperliquid_chain: Chain,
        destination: String,
        amount: String,
        time: u64,
    },
    #[serde(rename_all = "camelCase")]
    UsdClassTransfer {
        signature_chain_id: String,
        hyperliquid_chain: Chain,
        amount: String,
        to_perp: bool,
        nonce: u64,
    },
    #[serde(rename_all = "camelCase")]
    ApproveAgent {
        signature_chain_id: String,
        hyperliquid_chain: Chain,
        agent_address: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent_name: Option<String>,
        nonce: u64,
    },
    #[serde(rename_all = "camelCase")]
    ApproveBuilderFee {
        signature_chain_id: String,
        hyperliquid_chain: Chain,
        max_fee_rate: String,
        builder: String,
        nonce: u64,
    },
    #[serde(rename_all = "camelCase")]
    ConvertToMultiSigUser {
        signature_chain_id: String,
        hyperliquid_chain: Chain,
        signers: String,
        nonce: u64,
    },
}

impl Action {
    /// Returns whether the envelope's `vaultAddress` field must be forced to
    /// `null` for this action type.
    pub(crate) fn forces_null_vault(&self) -> bool {
        matches!(self, Action::UsdClassTransfer { .. })
    }
}

/// The `/exchange` request envelope.
///
/// `vaultAddress` is absent when no vault is configured, `null` for
/// `usdClassTransfer`, and the vault address otherwise. Field order matches
/// the signed order.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ActionRequest {
    pub action: Action,
    pub nonce: u64,
    pub signature: Signature,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_address: Option<Option<Address>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_after: Option<u64>,
}

/// `/exchange` response envelope.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", content = "response")]
#[serde(rename_all = "camelCase")]
pub(crate) enum ApiResponse {
    Ok(OkResponse),
    Err(String),
}

/// Successful `/exchange` response data.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "camelCase")]
pub(crate) enum OkResponse {
    Order {
        statuses: Vec<OrderResponseStatus>,
    },
    Cancel {
        statuses: Vec<CancelResponseStatus>,
    },
    Default,
    #[serde(other)]
    Other,
}

/// Per-cancel status: the literal string `"success"` or an error object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CancelResponseStatus {
    Error {
        error: String,
    },
    Success(String),
}

impl CancelResponseStatus {
    /// Returns the error message, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error { error } => Some(error),
            Self::Success(_) => None,
        }
    }
}

/// `/info` endpoint request bodies.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "camelCase")]
pub(crate) enum InfoRequest {
    #[serde(rename_all = "camelCase")]
    Meta {
        #[serde(skip_serializing_if = "Option::is_none")]
        dex: Option<String>,
    },
    SpotMeta,
    MetaAndAssetCtxs {
        #[serde(skip_serializing_if = "Option::is_none")]
        dex: Option<String>,
    },
    SpotMetaAndAssetCtxs,
    ClearinghouseState {
        user: Address,
        #[serde(skip_serializing_if = "Option::is_none")]
        dex: Option<String>,
    },
    SpotClearinghouseState {
        user: Address,
    },
    OpenOrders {
        user: Address,
        #[serde(skip_serializing_if = "Option::is_none")]
        dex: Option<String>,
    },
    FrontendOpenOrders {
        user: Address,
        #[serde(skip_serializing_if = "Option::is_none")]
        dex: Option<String>,
    },
    AllMids {
        #[serde(skip_serializing_if = "Option::is_none")]
        dex: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    UserFills {
        user: Address,
        #[serde(skip_serializing_if = "Option::is_none")]
        aggregate_by_time: Option<bool>,
    },
    #[serde(rename_all = "camelCase")]
    UserFillsByTime {
        user: Address,
        start_time: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_time: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        aggregate_by_time: Option<bool>,
    },
    HistoricalOrders {
        user: Address,
    },
    OrderStatus {
        user: Address,
        oid: OidOrCloid,
    },
    L2Book {
        coin: String,
    },
    CandleSnapshot {
        req: super::CandleSnapshotRequest,
    },
    UserFees {
        user: Address,
    },
    ActiveAssetData {
        user: Address,
        coin: String,
    },
    #[serde(rename_all = "camelCase")]
    FundingHistory {
        coin: String,
        start_time: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_time: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    UserFunding {
        user: Address,
        start_time: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_time: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    UserNonFundingLedgerUpdates {
        user: Address,
        start_time: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_time: Option<u64>,
    },
    DelegatorSummary {
        user: Address,
    },
    Delegations {
        user: Address,
    },
    DelegatorRewards {
        user: Address,
    },
    Referral {
        user: Address,
    },
    SubAccounts {
        user: Address,
    },
    UserToMultiSigSigners {
        user: Address,
    },
    ExtraAgents {
        user: Address,
    },
    PerpDexs,
    #[serde(rename_all = "camelCase")]
    TokenDetails {
        token_id: String,
    },
    PerpDexLimits {
        dex: String,
    },
    PerpDeployAuctionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gtc_order_wire() -> OrderWire {
        OrderWire {
            asset: 0,
            is_buy: true,
            limit_px: "40000".to_string(),
            sz: "0.001".to_string(),
            reduce_only: false,
            order_type: OrderTypeWire::Limit { tif: Tif::Gtc },
            cloid: None,
        }
    }

    #[test]
    fn test_order_wire_msgpack_matches_reference() {
        // {"a": 0, "b": true, "p": "40000", "s": "0.001", "r": false,
        //  "t": {"limit": {"tif": "Gtc"}}}, byte for byte.
        let bytes = rmp_serde::to_vec_named(&gtc_order_wire()).unwrap();
        let expected = "86a16100a162c3a170a53430303030a173a5302e303031a172c2a17481a56c696d697481a3746966a3477463";
        assert_eq!(hex_string(&bytes), expected);
    }

    #[test]
    fn test_order_action_msgpack_matches_reference() {
        let action = Action::Order {
            orders: vec![gtc_order_wire()],
            grouping: Grouping::Na,
            builder: None,
        };
        let bytes = rmp_serde::to_vec_named(&action).unwrap();
        let expected = "83a474797065a56f72646572a66f72646572739186a16100a162c3a170a53430303030a173a5302e303031a172c2a17481a56c696d697481a3746966a3477463a867726f7570696e67a26e61";
        assert_eq!(hex_string(&bytes), expected);
    }

    #[test]
    fn test_order_wire_with_cloid_is_a_seven_field_map() {
        let mut wire = gtc_order_wire();
        wire.cloid = Some(
            "0x00000000000000000000000000000001"
                .parse()
                .unwrap(),
        );
        let bytes = rmp_serde::to_vec_named(&wire).unwrap();
        // fixmap of 7 entries instead of 6.
        assert_eq!(bytes[0], 0x87);
        // The cloid is carried as a 34-character string including the 0x.
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["c"], "0x00000000000000000000000000000001");
    }

    #[test]
    fn test_cancel_action_json_shape() {
        let action = Action::Cancel {
            cancels: vec![CancelWire { asset: 5, oid: 123 }],
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "cancel");
        assert_eq!(json["cancels"][0]["a"], 5);
        assert_eq!(json["cancels"][0]["o"], 123);
    }

    #[test]
    fn test_api_error_response() {
        let text = r#"{
           "status":"ok",
           "response":{
              "type":"order",
              "data":{
                 "statuses":[
                    {
                       "error":"Order must have minimum value of $10."
                    }
                 ]
              }
           }
        }"#;
        let res: ApiResponse = serde_json::from_str(text).unwrap();
        match res {
            ApiResponse::Ok(OkResponse::Order { statuses }) => {
                assert_eq!(
                    statuses[0].error(),
                    Some("Order must have minimum value of $10.")
                );
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_api_order_response() {
        let text = r#"{
           "status":"ok",
           "response":{
              "type":"order",
              "data":{
                 "statuses":[
                    {
                       "resting":{
                          "oid":77738308
                       }
                    }
                 ]
              }
           }
        }"#;
        let res: ApiResponse = serde_json::from_str(text).unwrap();
        assert!(matches!(
            res,
            ApiResponse::Ok(OkResponse::Order { .. })
        ));
    }

    #[test]
    fn test_cancel_statuses_mix_success_and_error() {
        let text = r#"{
           "status":"ok",
           "response":{
              "type":"cancel",
              "data":{
                 "statuses":[
                    "success",
                    {
                       "error":"Order was never placed, already canceled, or filled. asset=5"
                    }
                 ]
              }
           }
        }"#;
        let res: ApiResponse = serde_json::from_str(text).unwrap();
        match res {
            ApiResponse::Ok(OkResponse::Cancel { statuses }) => {
                assert!(statuses[0].error().is_none());
                assert!(statuses[1]
                    .error()
                    .unwrap()
                    .contains("already canceled"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_err_envelope() {
        let text = r#"{"status":"err","response":"User or API Wallet 0x1234 does not exist."}"#;
        let res: ApiResponse = serde_json::from_str(text).unwrap();
        assert!(matches!(res, ApiResponse::Err(msg) if msg.contains("does not exist")));
    }

    #[test]
    fn test_default_response() {
        let text = r#"{"status":"ok","response":{"type":"default"}}"#;
        let res: ApiResponse = serde_json::from_str(text).unwrap();
        assert!(matches!(res, ApiResponse::Ok(OkResponse::Default)));
    }

    fn hex_string(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

//! Action signing.
//!
//! Two EIP-712 paths exist, mirroring the exchange's verification:
//!
//! **L1 actions** (orders, cancels, leverage, deploys, ...) hash the
//! MessagePack form of the action together with the nonce, vault address and
//! optional expiry, then sign a phantom [`solidity::Agent`] whose
//! `connectionId` carries that digest, under the `Exchange` domain with
//! chain id 1337. The `source` field is `"a"` on mainnet and `"b"` on
//! testnet.
//!
//! **User-signed actions** (transfers, withdrawals, approvals) sign dynamic
//! typed data under the `HyperliquidSignTransaction` domain with chain id
//! 421614. The submitted action carries `signatureChainId` and
//! `hyperliquidChain` fields that are not part of the primary type; the
//! dynamic resolver only encodes declared fields, so those extras never
//! enter the digest.

use alloy::{
    dyn_abi::{Eip712Domain, Eip712Types, Resolver, TypedData},
    primitives::{Address, B256},
    signers::SignerSync,
    sol_types::{eip712_domain, SolStruct},
};
use serde::Serialize;

use crate::{
    error::Error,
    types::{solidity, Signature},
    utils, Chain,
};

/// Domain for L1 action signatures. The chain id is a signing-domain
/// identifier shared by mainnet and testnet, not a real chain.
pub(crate) const EXCHANGE_EIP712_DOMAIN: Eip712Domain = eip712_domain! {
    name: "Exchange",
    version: "1",
    chain_id: 1337,
    verifying_contract: Address::ZERO,
};

/// Domain for user-signed actions. Fixed to 421614 on both networks; the
/// `hyperliquidChain` message field is what separates the environments.
pub(crate) const USER_SIGNED_EIP712_DOMAIN: Eip712Domain = eip712_domain! {
    name: "HyperliquidSignTransaction",
    version: "1",
    chain_id: 421614,
    verifying_contract: Address::ZERO,
};

const HYPERLIQUID_EIP_PREFIX: &str = "HyperliquidTransaction:";

/// Signs an L1 action: canonical hash, phantom agent, `Exchange` domain.
///
/// # Errors
///
/// Returns [`Error::Signature`] if serialization or ECDSA signing fails.
pub(crate) fn sign_l1_action<S, T>(
    signer: &S,
    chain: Chain,
    action: &T,
    nonce: u64,
    vault_address: Option<Address>,
    expires_after: Option<u64>,
) -> Result<Signature, Error>
where
    S: SignerSync,
    T: Serialize,
{
    let connection_id = utils::action_hash(action, nonce, vault_address, expires_after)?;
    sign_connection_id(signer, chain, connection_id)
}

/// Signs a prepared action digest under the phantom-agent wrapper.
pub(crate) fn sign_connection_id<S: SignerSync>(
    signer: &S,
    chain: Chain,
    connection_id: B256,
) -> Result<Signature, Error> {
    let agent = solidity::Agent {
        source: if chain.is_mainnet() { "a" } else { "b" }.to_string(),
        connectionId: connection_id,
    };
    let signature = signer
        .sign_typed_data_sync(&agent, &EXCHANGE_EIP712_DOMAIN)
        .map_err(|e| Error::Signature(e.to_string()))?;
    Ok(signature.into())
}

/// Signs a user-signed action whose primary type is the Solidity struct `T`.
///
/// `message` is the full wire action; fields not declared on `T` (the
/// `type` tag, `signatureChainId`) are ignored while hashing.
///
/// # Errors
///
/// Returns [`Error::Signature`] if ECDSA signing fails.
pub(crate) fn sign_user_signed_action<T, S>(
    signer: &S,
    message: &impl Serialize,
) -> Result<Signature, Error>
where
    T: SolStruct,
    S: SignerSync,
{
    let typed_data = get_typed_data::<T>(message);
    let signature = signer
        .sign_dynamic_typed_data_sync(&typed_data)
        .map_err(|e| Error::Signature(e.to_string()))?;
    Ok(signature.into())
}

/// Builds the EIP-712 typed data for a user-signed action.
///
/// The primary type is `T`'s definition renamed to
/// `HyperliquidTransaction:<Name>`, which is how the server declares these
/// types.
fn get_typed_data<T: SolStruct>(message: &impl Serialize) -> TypedData {
    let mut resolver = Resolver::from_struct::<T>();
    resolver
        .ingest_string(T::eip712_encode_type())
        .expect("sol struct encode type is always valid");

    let mut types = Eip712Types::from(&resolver);
    let primary = types
        .remove(T::NAME)
        .expect("resolver contains the root struct");
    types.insert(format!("{HYPERLIQUID_EIP_PREFIX}{}", T::NAME), primary);

    TypedData {
        domain: USER_SIGNED_EIP712_DOMAIN,
        resolver: Resolver::from(types),
        primary_type: format!("{HYPERLIQUID_EIP_PREFIX}{}", T::NAME),
        message: serde_json::to_value(message).expect("wire actions serialize to JSON"),
    }
}

#[cfg(test)]
mod tests {
    use alloy::signers::local::PrivateKeySigner;
    use serde_json::json;

    use super::*;
    use crate::types::api::{Action, Grouping, OrderTypeWire, OrderWire, Tif};

    fn signer() -> PrivateKeySigner {
        "e908f86dbb4d55ac876378565aafeabc187f6690f046459397b17d9b9a19688e"
            .parse()
            .unwrap()
    }

    fn order_action() -> Action {
        Action::Order {
            orders: vec![OrderWire {
                asset: 0,
                is_buy: true,
                limit_px: "40000".to_string(),
                sz: "0.001".to_string(),
                reduce_only: false,
                order_type: OrderTypeWire::Limit { tif: Tif::Gtc },
                cloid: None,
            }],
            grouping: Grouping::Na,
            builder: None,
        }
    }

    #[test]
    fn test_l1_signature_recovers_to_signer() {
        let signer = signer();
        let action = order_action();
        let nonce = 1_700_000_000_000u64;

        let sig = sign_l1_action(&signer, Chain::Mainnet, &action, nonce, None, None).unwrap();
        assert!(sig.v == 27 || sig.v == 28);

        // Rebuild the signing hash and recover the address.
        let connection_id = utils::action_hash(&action, nonce, None, None).unwrap();
        let agent = solidity::Agent {
            source: "a".to_string(),
            connectionId: connection_id,
        };
        let hash = agent.eip712_signing_hash(&EXCHANGE_EIP712_DOMAIN);
        let recovered =
            alloy::signers::Signature::new(sig.r, sig.s, sig.v == 28)
                .recover_address_from_prehash(&hash)
                .unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_testnet_source_changes_signature() {
        let signer = signer();
        let action = order_action();
        let nonce = 1_700_000_000_000u64;

        let mainnet =
            sign_l1_action(&signer, Chain::Mainnet, &action, nonce, None, None).unwrap();
        let testnet =
            sign_l1_action(&signer, Chain::Testnet, &action, nonce, None, None).unwrap();
        assert_ne!((mainnet.r, mainnet.s), (testnet.r, testnet.s));
    }

    #[test]
    fn test_user_signed_signature_recovers_to_signer() {
        let signer = signer();
        let message = json!({
            "type": "usdSend",
            "signatureChainId": "0x66eee",
            "hyperliquidChain": "Mainnet",
            "destination": "0x0d1d9635d0640821d15e323ac8adadfa9c111414",
            "amount": "1.000000",
            "time": 1690393044548u64,
        });

        let sig =
            sign_user_signed_action::<solidity::UsdSend, _>(&signer, &message).unwrap();
        assert!(sig.v == 27 || sig.v == 28);

        let hash = get_typed_data::<solidity::UsdSend>(&message)
            .eip712_signing_hash()
            .unwrap();
        let recovered =
            alloy::signers::Signature::new(sig.r, sig.s, sig.v == 28)
                .recover_address_from_prehash(&hash)
                .unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_user_signed_hash_ignores_undeclared_fields() {
        // The wire action carries `type` and `signatureChainId`, but the
        // primary type does not declare them; both messages must hash the
        // same.
        let bare = json!({
            "hyperliquidChain": "Mainnet",
            "destination": "0x0d1d9635d0640821d15e323ac8adadfa9c111414",
            "amount": "1.000000",
            "time": 1690393044548u64,
        });
        let with_extras = json!({
            "type": "usdSend",
            "signatureChainId": "0x66eee",
            "hyperliquidChain": "Mainnet",
            "destination": "0x0d1d9635d0640821d15e323ac8adadfa9c111414",
            "amount": "1.000000",
            "time": 1690393044548u64,
        });

        let a = get_typed_data::<solidity::UsdSend>(&bare)
            .eip712_signing_hash()
            .unwrap();
        let b = get_typed_data::<solidity::UsdSend>(&with_extras)
            .eip712_signing_hash()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_user_signed_primary_type_is_prefixed() {
        let message = json!({
            "hyperliquidChain": "Mainnet",
            "destination": "0x0d1d9635d0640821d15e323ac8adadfa9c111414",
            "amount": "1.000000",
            "time": 0u64,
        });
        let typed = get_typed_data::<solidity::UsdSend>(&message);
        assert_eq!(typed.primary_type, "HyperliquidTransaction:UsdSend");
    }

    #[test]
    fn test_vault_and_expiry_perturb_l1_signature() {
        let signer = signer();
        let action = order_action();
        let nonce = 1_700_000_000_000u64;
        let vault: Address = "0x1719884eb866cb12b2287399b15f7db5e7d775ea"
            .parse()
            .unwrap();

        let plain = sign_l1_action(&signer, Chain::Mainnet, &action, nonce, None, None).unwrap();
        let vaulted =
            sign_l1_action(&signer, Chain::Mainnet, &action, nonce, Some(vault), None).unwrap();
        let expiring = sign_l1_action(
            &signer,
            Chain::Mainnet,
            &action,
            nonce,
            None,
            Some(nonce + 60_000),
        )
        .unwrap();

        assert_ne!((plain.r, plain.s), (vaulted.r, vaulted.s));
        assert_ne!((plain.r, plain.s), (expiring.r, expiring.s));
    }
}

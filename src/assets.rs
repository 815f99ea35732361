//! Coin-to-asset-id resolution.
//!
//! Asset ids are handed out under three regimes, all derived from the
//! `/info` universe payloads at bootstrap:
//!
//! - default perps: the index of the coin in the perp universe,
//! - spot pairs: the spot index offset by 10000,
//! - builder-deployed perps: `100000 + dex_index * 10000 + index_in_meta`,
//!   where `dex_index` is the position of the named dex in the `perpDexs`
//!   listing (the leading `null` entry for the default dex counts).
//!
//! Size decimals ride along for price formatting; a spot pair takes them
//! from the first token of the pair.

use std::collections::HashMap;

use crate::{
    error::Error,
    types::{Meta, PerpDex, SpotMeta},
};

const SPOT_ASSET_OFFSET: u32 = 10_000;
const BUILDER_PERP_ASSET_BASE: u32 = 100_000;

/// Immutable coin-to-asset-id tables, built once at client bootstrap.
#[derive(Debug, Clone, Default)]
pub struct AssetMap {
    coin_to_asset: HashMap<String, u32>,
    asset_to_sz_decimals: HashMap<u32, u32>,
}

impl AssetMap {
    /// Builds the tables from universe metadata.
    ///
    /// When `perp_dex` names a builder-deployed dex, the perp universe is
    /// assumed to be that dex's `meta` and its assets are mapped into the
    /// builder id range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolution`] when the named dex is absent from the
    /// `perpDexs` listing or a spot pair references a token the token table
    /// does not contain.
    pub fn from_parts(
        meta: &Meta,
        spot_meta: &SpotMeta,
        perp_dex: Option<(&str, &[Option<PerpDex>])>,
    ) -> Result<Self, Error> {
        let mut map = Self::default();

        let perp_base = match perp_dex {
            None => 0,
            Some((name, dexs)) => {
                let dex_index = dexs
                    .iter()
                    .position(|dex| dex.as_ref().is_some_and(|dex| dex.name == name))
                    .ok_or_else(|| {
                        Error::Resolution(format!(
                            "unknown perp dex {name:?} (not present in /info perpDexs)"
                        ))
                    })?;
                BUILDER_PERP_ASSET_BASE + dex_index as u32 * 10_000
            }
        };

        for (index, asset_info) in meta.universe.iter().enumerate() {
            let asset = perp_base + index as u32;
            map.coin_to_asset.insert(asset_info.name.clone(), asset);
            map.asset_to_sz_decimals
                .insert(asset, asset_info.sz_decimals);
        }

        for pair in &spot_meta.universe {
            let asset = pair.index + SPOT_ASSET_OFFSET;
            let base_token = spot_meta.tokens.get(pair.tokens[0]).ok_or_else(|| {
                Error::Resolution(format!(
                    "spot pair {} references unknown token index {}",
                    pair.name, pair.tokens[0]
                ))
            })?;
            map.coin_to_asset.insert(pair.name.clone(), asset);
            map.asset_to_sz_decimals
                .insert(asset, base_token.sz_decimals);
        }

        Ok(map)
    }

    /// Resolves a coin name to its asset id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolution`] for coins outside the loaded universe.
    pub fn asset(&self, coin: &str) -> Result<u32, Error> {
        self.coin_to_asset
            .get(coin)
            .copied()
            .ok_or_else(|| Error::Resolution(format!("coin {coin} not found")))
    }

    /// Returns the size decimals for an asset id.
    #[must_use]
    pub fn sz_decimals(&self, asset: u32) -> Option<u32> {
        self.asset_to_sz_decimals.get(&asset).copied()
    }

    /// Returns whether an asset id falls in the spot range.
    #[must_use]
    pub fn is_spot(asset: u32) -> bool {
        (SPOT_ASSET_OFFSET..BUILDER_PERP_ASSET_BASE).contains(&asset)
    }

    /// Number of known coins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coin_to_asset.len()
    }

    /// Returns true when no universe has been loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coin_to_asset.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> Meta {
        serde_json::from_str(
            r#"{
                "universe": [
                    {"szDecimals": 5, "name": "BTC", "maxLeverage": 40},
                    {"szDecimals": 4, "name": "ETH", "maxLeverage": 25},
                    {"szDecimals": 1, "name": "DOGE", "maxLeverage": 10}
                ]
            }"#,
        )
        .unwrap()
    }

    fn spot_meta() -> SpotMeta {
        serde_json::from_str(
            r#"{
                "universe": [
                    {"name": "PURR/USDC", "index": 0, "tokens": [1, 0], "isCanonical": true}
                ],
                "tokens": [
                    {"name": "USDC", "index": 0, "szDecimals": 8, "weiDecimals": 8,
                     "tokenId": "0x6d1e7cde53ba9467b783cb7c530ce054", "isCanonical": true},
                    {"name": "PURR", "index": 1, "szDecimals": 0, "weiDecimals": 5,
                     "tokenId": "0xc1fb593aeffbeb02f85e0308e9956a90", "isCanonical": true}
                ]
            }"#,
        )
        .unwrap()
    }

    fn perp_dexs() -> Vec<Option<PerpDex>> {
        serde_json::from_str(
            r#"[
                null,
                {"name": "test", "fullName": "test dex", "deployer": "0x5e89b26d8ff0ed2a7a1d1c7a2f94dbd8c7c30ba9"},
                {"name": "vntls", "fullName": "ventuals"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_default_perp_assets_use_universe_index() {
        let map = AssetMap::from_parts(&meta(), &spot_meta(), None).unwrap();
        assert_eq!(map.asset("BTC").unwrap(), 0);
        assert_eq!(map.asset("ETH").unwrap(), 1);
        assert_eq!(map.asset("DOGE").unwrap(), 2);
        assert_eq!(map.sz_decimals(1), Some(4));
    }

    #[test]
    fn test_spot_assets_are_offset_by_10000() {
        let map = AssetMap::from_parts(&meta(), &spot_meta(), None).unwrap();
        let asset = map.asset("PURR/USDC").unwrap();
        assert_eq!(asset, 10_000);
        assert!(AssetMap::is_spot(asset));
        // Size decimals come from the first token in the pair (PURR).
        assert_eq!(map.sz_decimals(asset), Some(0));
    }

    #[test]
    fn test_builder_dex_assets_use_dex_indexed_base() {
        let dexs = perp_dexs();
        let map = AssetMap::from_parts(&meta(), &spot_meta(), Some(("vntls", &dexs))).unwrap();
        // "vntls" sits at position 2 (the null default dex counts).
        assert_eq!(map.asset("BTC").unwrap(), 120_000);
        assert_eq!(map.asset("ETH").unwrap(), 120_001);
        assert!(!AssetMap::is_spot(120_000));
        assert_eq!(map.sz_decimals(120_000), Some(5));
    }

    #[test]
    fn test_unknown_dex_is_rejected() {
        let dexs = perp_dexs();
        let err = AssetMap::from_parts(&meta(), &spot_meta(), Some(("nope", &dexs))).unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
        assert!(err.to_string().contains("unknown perp dex"));
    }

    #[test]
    fn test_unknown_coin_is_rejected() {
        let map = AssetMap::from_parts(&meta(), &spot_meta(), None).unwrap();
        let err = map.asset("SOL").unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
        assert_eq!(err.to_string(), "coin SOL not found");
    }
}

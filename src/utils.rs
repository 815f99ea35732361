//! Canonical wire encoding helpers.
//!
//! Everything the exchange hashes goes through this module: the MessagePack
//! action hashing, the float-to-wire stringifier and the price rounding
//! rules. The byte layout must match what the server hashes exactly; a
//! single diverging byte makes it recover a different signer address and
//! reject the request.

use alloy::primitives::{keccak256, Address, B256};
use serde::{Serialize, Serializer};

use crate::{error::Error, Cloid};

/// Computes the canonical action hash used as the EIP-712 `connectionId`.
///
/// The action is serialized to MessagePack with map keys in struct
/// declaration order and compact integer widths, then extended with:
///
/// - the nonce as 8 big-endian bytes,
/// - `0x00`, or `0x01` followed by the 20 raw vault-address bytes,
/// - `0x00` followed by 8 big-endian bytes of `expires_after`, when set.
///
/// The result is the Keccak256 of those bytes.
///
/// `rmp_serde`'s named mode already emits the short `str8` header for any
/// string shorter than 256 bytes, which is the form the server expects;
/// encoders that produce `str16` here would have to rewrite the headers
/// before hashing.
pub(crate) fn action_hash<T: Serialize>(
    action: &T,
    nonce: u64,
    vault_address: Option<Address>,
    expires_after: Option<u64>,
) -> Result<B256, Error> {
    let mut bytes =
        rmp_serde::to_vec_named(action).map_err(|e| Error::Signature(e.to_string()))?;
    bytes.extend_from_slice(&nonce.to_be_bytes());

    match vault_address {
        Some(vault_address) => {
            bytes.push(1);
            bytes.extend_from_slice(vault_address.as_slice());
        }
        None => bytes.push(0),
    }

    if let Some(expires_after) = expires_after {
        bytes.push(0);
        bytes.extend_from_slice(&expires_after.to_be_bytes());
    }

    Ok(keccak256(bytes))
}

/// Converts a float to the wire string format used for prices and sizes.
///
/// The value is formatted with exactly 8 fractional digits; if parsing that
/// back deviates from the input by 1e-12 or more the value cannot be
/// represented on the wire and is rejected. Trailing zeros and a trailing
/// decimal point are stripped, and negative zero maps to `"0"`.
///
/// # Errors
///
/// Returns [`Error::Wire`] when the value does not round-trip.
pub fn float_to_wire(x: f64) -> Result<String, Error> {
    let rounded = format!("{x:.8}");
    let parsed: f64 = rounded
        .parse()
        .map_err(|e| Error::Wire(format!("float_to_wire: {e}")))?;
    if (parsed - x).abs() >= 1e-12 {
        return Err(Error::Wire(format!("float_to_wire causes rounding: {x}")));
    }

    let rounded = if rounded == "-0.00000000" {
        "0.00000000"
    } else {
        rounded.as_str()
    };

    Ok(rounded
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string())
}

/// Rounds a price to at most `sig_figs` significant figures.
///
/// The integer part is always preserved whole: once it alone carries at
/// least `sig_figs` digits, the fractional part is dropped and nothing else
/// is rounded away. For `|price| < 1` the leading zero counts as one
/// significant figure, so `round_to_significant_figures(0.12, 2) == 0.1`.
/// Zero is returned unchanged.
pub fn round_to_significant_figures(price: f64, sig_figs: u32) -> f64 {
    if price == 0.0 {
        return 0.0;
    }

    let abs_price = price.abs();
    let integer_part = abs_price.floor();

    let mut num_integer_digits: u32 = 0;
    let mut temp = integer_part as u64;
    while temp > 0 {
        temp /= 10;
        num_integer_digits += 1;
    }
    if integer_part <= 0.0 {
        // The price is a pure fraction; its leading zero is significant.
        num_integer_digits = 1;
    }

    if num_integer_digits >= sig_figs {
        return integer_part.copysign(price);
    }

    round_to_decimals(abs_price, sig_figs - num_integer_digits).copysign(price)
}

/// Rounds to `decimals` decimal places, half away from zero.
pub fn round_to_decimals(value: f64, decimals: u32) -> f64 {
    let pow = 10f64.powi(decimals as i32);
    (value * pow).round() / pow
}

/// Formats a user-signed transfer amount with 6 decimal places.
pub(crate) fn format_amount(amount: f64) -> String {
    format!("{amount:.6}")
}

/// Converts a USD amount to the integer representation used by margin
/// actions (6 decimals, USDC).
pub(crate) fn float_to_usd_int(value: f64) -> i64 {
    (value * 1e6).round() as i64
}

/// Current wall-clock time in milliseconds, the base unit for nonces.
pub(crate) fn timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

/// Serializes a cloid as its canonical `0x`-prefixed 32-hex-char form.
///
/// Used on wire structs that are both JSON- and MessagePack-encoded, where
/// the default fixed-bytes serialization would fall back to raw bytes in
/// non-human-readable formats.
pub(crate) fn serialize_cloid_as_hex<S>(value: &Cloid, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{value:#x}"))
}

/// Serializes an optional cloid; only called for `Some` because the fields
/// using it are `skip_serializing_if = "Option::is_none"`.
pub(crate) fn serialize_opt_cloid_as_hex<S>(
    value: &Option<Cloid>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(cloid) => serialize_cloid_as_hex(cloid, serializer),
        None => serializer.serialize_none(),
    }
}

/// Normalizes a client order id to its canonical form.
///
/// Accepts the hex body with or without the `0x` prefix; anything that is
/// not exactly 16 bytes of hex is rejected. The canonical form (with the
/// prefix) is what gets signed and transmitted.
///
/// # Errors
///
/// Returns [`Error::Validation`] for inputs of the wrong length or with
/// non-hex characters.
pub fn normalize_cloid(cloid: &str) -> Result<Cloid, Error> {
    cloid.parse::<Cloid>().map_err(|_| {
        Error::validation(
            "cloid",
            format!("cloid must be exactly 32 hex characters (optionally 0x-prefixed): {cloid}"),
        )
    })
}

use crate::error::WalletError;
use alloy_primitives::{Address, U256};
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

/// A decoded QR payload: a merchant address and, if the payload carried
/// one, an amount already expressed in USDC's 6-decimal base units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    pub merchant: Address,
    pub amount_units: Option<u64>,
}

fn address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").unwrap())
}

/// Parses the union of QR payload shapes the field actually emits, tried
/// in this order: (1) a bare address, (2) a full ERC-681 URI with a chain
/// suffix, (3) the bespoke `ethereum:<addr>?amount=<decimal>` form with no
/// chain suffix. The first form that matches wins.
pub fn parse_qr_payload(raw: &str) -> Result<QrPayload, WalletError> {
    let raw = raw.trim();

    if address_regex().is_match(raw) {
        let merchant = Address::from_str(raw).map_err(|_| WalletError::InvalidAddress(raw.into()))?;
        return Ok(QrPayload {
            merchant,
            amount_units: None,
        });
    }

    if let Some(rest) = raw.strip_prefix("ethereum:") {
        return parse_ethereum_uri(rest, raw);
    }

    Err(WalletError::InvalidAddress(raw.into()))
}

fn parse_ethereum_uri(rest: &str, original: &str) -> Result<QrPayload, WalletError> {
    // Split off an optional "@chainId" before the "?query" section.
    let (address_and_chain, query) = match rest.split_once('?') {
        Some((a, q)) => (a, Some(q)),
        None => (rest, None),
    };
    let address_part = address_and_chain.split('@').next().unwrap_or(address_and_chain);

    if !address_regex().is_match(address_part) {
        return Err(WalletError::InvalidAddress(original.into()));
    }
    let merchant =
        Address::from_str(address_part).map_err(|_| WalletError::InvalidAddress(original.into()))?;

    let amount_units = query.and_then(|q| parse_query_amount(q));

    Ok(QrPayload {
        merchant,
        amount_units,
    })
}

/// Prefers an explicit `value` (raw wei/base-units, used verbatim) over
/// `amount` (a decimal USDC string requiring the same banker's-rounding
/// conversion `set_payment_amount` applies).
fn parse_query_amount(query: &str) -> Option<u64> {
    let mut value_param = None;
    let mut amount_param = None;

    for pair in query.split('&') {
        let (key, val) = pair.split_once('=')?;
        match key {
            "value" => value_param = Some(val),
            "amount" => amount_param = Some(val),
            _ => {}
        }
    }

    if let Some(v) = value_param {
        return v.parse::<u64>().ok();
    }
    if let Some(a) = amount_param {
        return crate::payment::amount::usd_to_units(a).ok().map(|u| {
            let u256: U256 = u;
            u256.try_into().unwrap_or(u64::MAX)
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_address_parses() {
        let addr = "0x0000000000000000000000000000000000000abc";
        let parsed = parse_qr_payload(addr).unwrap();
        assert_eq!(parsed.amount_units, None);
    }

    #[test]
    fn erc681_uri_with_chain_and_value_parses() {
        let uri = "ethereum:0x000000000000000000000000000000000000dEaD@143?value=5000000&amount=5.00";
        let parsed = parse_qr_payload(uri).unwrap();
        assert_eq!(parsed.amount_units, Some(5_000_000));
    }

    #[test]
    fn bespoke_uri_without_chain_suffix_parses() {
        let uri = "ethereum:0x000000000000000000000000000000000000dEaD?amount=3.50";
        let parsed = parse_qr_payload(uri).unwrap();
        assert_eq!(parsed.amount_units, Some(3_500_000));
    }

    #[test]
    fn invalid_payload_is_rejected() {
        assert!(parse_qr_payload("not a uri").is_err());
    }

    #[test]
    fn value_param_takes_precedence_over_amount() {
        let uri = "ethereum:0x000000000000000000000000000000000000dEaD@143?value=1&amount=999.00";
        let parsed = parse_qr_payload(uri).unwrap();
        assert_eq!(parsed.amount_units, Some(1));
    }
}

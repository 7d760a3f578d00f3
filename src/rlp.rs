//! Canonical RLP encoding for the legacy EIP-155 transaction fields this
//! crate ever signs or broadcasts. Built on `alloy_rlp`'s `Encodable` impls
//! for integers/addresses/byte-strings, which already strip leading zeros
//! on integers and apply the single-byte/length-prefix rule on byte
//! strings — the same approach the teacher used for its own RLP-signed
//! legacy transactions.

use alloy_primitives::{Address, U256};
use alloy_rlp::{Decodable, Encodable, Header};

/// RLP-encode the unsigned EIP-155 signing payload:
/// `(nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0)`.
pub fn encode_signing_payload(
    nonce: u64,
    gas_price: U256,
    gas_limit: u64,
    to: Address,
    value: U256,
    data: &[u8],
    chain_id: u64,
) -> Vec<u8> {
    let mut payload = Vec::new();
    nonce.encode(&mut payload);
    gas_price.encode(&mut payload);
    gas_limit.encode(&mut payload);
    to.encode(&mut payload);
    value.encode(&mut payload);
    data.encode(&mut payload);
    chain_id.encode(&mut payload);
    0u8.encode(&mut payload);
    0u8.encode(&mut payload);

    wrap_list(payload)
}

/// RLP-encode the final signed 9-tuple:
/// `(nonce, gasPrice, gasLimit, to, value, data, v, r, s)`.
pub fn encode_signed_transaction(
    nonce: u64,
    gas_price: U256,
    gas_limit: u64,
    to: Address,
    value: U256,
    data: &[u8],
    v: u64,
    r: U256,
    s: U256,
) -> Vec<u8> {
    let mut payload = Vec::new();
    nonce.encode(&mut payload);
    gas_price.encode(&mut payload);
    gas_limit.encode(&mut payload);
    to.encode(&mut payload);
    value.encode(&mut payload);
    data.encode(&mut payload);
    v.encode(&mut payload);
    r.encode(&mut payload);
    s.encode(&mut payload);

    wrap_list(payload)
}

fn wrap_list(payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 9);
    Header {
        list: true,
        payload_length: payload.len(),
    }
    .encode(&mut out);
    out.extend_from_slice(&payload);
    out
}

/// The decoded form of [`encode_signed_transaction`]'s output, used only to
/// verify the round-trip property in tests — the engine never needs to
/// decode a transaction it didn't just build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSignedTx {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

pub fn decode_signed_transaction(mut buf: &[u8]) -> alloy_rlp::Result<DecodedSignedTx> {
    let header = Header::decode(&mut buf)?;
    if !header.list {
        return Err(alloy_rlp::Error::UnexpectedString);
    }
    Ok(DecodedSignedTx {
        nonce: Decodable::decode(&mut buf)?,
        gas_price: Decodable::decode(&mut buf)?,
        gas_limit: Decodable::decode(&mut buf)?,
        to: Decodable::decode(&mut buf)?,
        value: Decodable::decode(&mut buf)?,
        data: alloy_rlp::Bytes::decode(&mut buf)?.to_vec(),
        v: Decodable::decode(&mut buf)?,
        r: Decodable::decode(&mut buf)?,
        s: Decodable::decode(&mut buf)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_integer_encodes_as_empty_string() {
        let mut out = Vec::new();
        0u64.encode(&mut out);
        assert_eq!(out, vec![0x80]);
    }

    #[test]
    fn single_small_byte_encodes_as_itself() {
        let mut out = Vec::new();
        1u64.encode(&mut out);
        assert_eq!(out, vec![0x01]);

        let mut out = Vec::new();
        0x7fu64.encode(&mut out);
        assert_eq!(out, vec![0x7f]);
    }

    #[test]
    fn max_u256_has_no_leading_zero_bytes() {
        let mut out = Vec::new();
        U256::MAX.encode(&mut out);
        // 0xff header for 32-byte string + 32 bytes of 0xff, no leading zero stripped away
        assert_eq!(out.len(), 33);
        assert_eq!(out[0], 0xa0); // 0x80 + 32
        assert!(out[1..].iter().all(|b| *b == 0xff));
    }

    #[test]
    fn leading_zero_bytes_are_stripped() {
        // 256 requires 2 bytes minimum (0x01, 0x00); a naive 32-byte
        // encoding would be rejected by real chains as non-canonical.
        let mut out = Vec::new();
        U256::from(256u64).encode(&mut out);
        assert_eq!(out, vec![0x82, 0x01, 0x00]);
    }

    #[test]
    fn signed_tx_round_trips_byte_identical() {
        let to = Address::repeat_byte(0xAB);
        let data = hex::decode("a9059cbb").unwrap();
        let encoded = encode_signed_transaction(
            7,
            U256::from(50_000_000_000u64),
            21_000,
            to,
            U256::from(1_000_000u64),
            &data,
            321,
            U256::from(12345u64),
            U256::from(67890u64),
        );

        let decoded = decode_signed_transaction(&encoded).unwrap();
        assert_eq!(decoded.nonce, 7);
        assert_eq!(decoded.gas_price, U256::from(50_000_000_000u64));
        assert_eq!(decoded.gas_limit, 21_000);
        assert_eq!(decoded.to, to);
        assert_eq!(decoded.value, U256::from(1_000_000u64));
        assert_eq!(decoded.data, data);
        assert_eq!(decoded.v, 321);
        assert_eq!(decoded.r, U256::from(12345u64));
        assert_eq!(decoded.s, U256::from(67890u64));

        // Re-encoding the decoded fields must reproduce the exact bytes.
        let re_encoded = encode_signed_transaction(
            decoded.nonce,
            decoded.gas_price,
            decoded.gas_limit,
            decoded.to,
            decoded.value,
            &decoded.data,
            decoded.v,
            decoded.r,
            decoded.s,
        );
        assert_eq!(re_encoded, encoded);
    }

    #[test]
    fn signing_payload_includes_chain_id_and_two_zeros() {
        let to = Address::ZERO;
        let encoded = encode_signing_payload(0, U256::ZERO, 21_000, to, U256::ZERO, &[], 143);
        // Spot check: trailing bytes are chainId(143) then two empty-string zeros.
        assert_eq!(encoded[encoded.len() - 3..], [143, 0x80, 0x80]);
    }

    // Boundary values around RLP's single-byte/length-prefix cutoffs.
    #[test]
    fn boundary_values_round_trip() {
        let cases: [U256; 5] = [
            U256::ZERO,
            U256::from(1u64),
            U256::from(127u64),
            U256::from(128u64),
            U256::MAX,
        ];
        for value in cases {
            let mut out = Vec::new();
            value.encode(&mut out);
            let mut slice = out.as_slice();
            let decoded = U256::decode(&mut slice).unwrap();
            assert_eq!(decoded, value);
            assert!(slice.is_empty());
        }
    }
}

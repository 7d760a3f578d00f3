/// The original Keccak (padding byte `0x01`), not NIST SHA3-256 (padding `0x06`).
/// `alloy_primitives::keccak256` implements exactly this variant — Ethereum
/// hashed everything with pre-standardization Keccak before SHA3 existed,
/// and every address/signature/pool-id computation in this crate depends
/// on using that padding, not the later NIST one.
pub fn keccak256(bytes: impl AsRef<[u8]>) -> [u8; 32] {
    alloy_primitives::keccak256(bytes).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_matches_known_vector() {
        // keccak256("") — NOT the SHA3-256 digest of the empty string,
        // which is a3a3a3a3a3a3a3a... (well-known padding confusion bug).
        let expected = hex::decode(
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470",
        )
        .unwrap();
        assert_eq!(keccak256(b"").to_vec(), expected);
    }

    #[test]
    fn known_vector_abc() {
        let expected = hex::decode(
            "4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45",
        )
        .unwrap();
        assert_eq!(keccak256(b"abc").to_vec(), expected);
    }
}

use alloy::primitives::{Address, wrap_fixed_bytes};
use sha2::{Digest, Sha256};

wrap_fixed_bytes! {
    /// The bridge contracts identify a registered token by the SHA-256 hash
    /// of the bridge address concatenated with the token address.
    pub struct TokenId<32>;
}

impl TokenId {
    /// Derives the token id for a `(bridge, token)` contract pair.
    pub fn derive(bridge_address: Address, token_address: Address) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bridge_address.as_slice());
        hasher.update(token_address.as_slice());
        Self::from(<[u8; 32]>::from(hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn token_id_is_stable() {
        let bridge = address!("00000000000000000000000000000000000000aa");
        let token = address!("00000000000000000000000000000000000000bb");
        let id = TokenId::derive(bridge, token);
        assert_eq!(id, TokenId::derive(bridge, token));
        assert_ne!(id, TokenId::derive(token, bridge));
        assert_ne!(id, TokenId::ZERO);
    }

    #[test]
    fn token_id_matches_manual_digest() {
        let bridge = address!("1111111111111111111111111111111111111111");
        let token = address!("2222222222222222222222222222222222222222");
        let mut hasher = Sha256::new();
        hasher.update(bridge.as_slice());
        hasher.update(token.as_slice());
        let expected: [u8; 32] = hasher.finalize().into();
        assert_eq!(TokenId::derive(bridge, token), TokenId::from(expected));
    }
}

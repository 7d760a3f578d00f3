use alloy_primitives::{keccak256, Address, B256};
use alloy_sol_types::{sol, SolValue};

/// Canonical fee tiers and their matching tick spacings, swept in order
/// when no pool is known ahead of time.
pub const FEE_TIERS: [(u32, i32); 4] = [(100, 1), (500, 10), (3000, 60), (10000, 200)];

sol! {
    struct PoolKey {
        address currency0;
        address currency1;
        uint24 fee;
        int24 tickSpacing;
        address hooks;
    }
}

/// The 5-tuple pool identity. `currency0 < currency1` is enforced at
/// construction so callers never have to remember the ordering rule
/// themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolKeyData {
    pub currency0: Address,
    pub currency1: Address,
    pub fee: u32,
    pub tick_spacing: i32,
    pub hooks: Address,
}

impl PoolKeyData {
    /// Builds a pool key for `tokenA`/`tokenB` in canonical order, with
    /// zero-address hooks (the "stock pool" case).
    pub fn new(token_a: Address, token_b: Address, fee: u32, tick_spacing: i32) -> Self {
        let (currency0, currency1) = if token_a < token_b {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };
        Self {
            currency0,
            currency1,
            fee,
            tick_spacing,
            hooks: Address::ZERO,
        }
    }

    pub fn zero_for_one(&self, token_in: Address) -> bool {
        token_in == self.currency0
    }

    fn as_sol(&self) -> PoolKey {
        PoolKey {
            currency0: self.currency0,
            currency1: self.currency1,
            fee: alloy_primitives::Uint::<24, 1>::from(self.fee),
            tickSpacing: alloy_primitives::Signed::<24, 1>::try_from(self.tick_spacing)
                .expect("tick spacing fits in int24"),
            hooks: self.hooks,
        }
    }

    /// `keccak256(abi.encode(currency0, currency1, fee, tickSpacing, hooks))`.
    pub fn pool_id(&self) -> B256 {
        keccak256(self.as_sol().abi_encode())
    }
}

//! Swap path registry: which liquidation route each collateral takes.
//!
//! Every collateral the bot will ever liquidate is a key of the
//! [`SwapPathRegistry`]. The registry is built once at startup and only
//! read afterwards; its keys are also the candidate list handed to the
//! risk oracle.

use std::collections::BTreeMap;

use alloy::primitives::{aliases::U24, Address, Bytes};
use liquidator_chain::{abi_hop, contracts::IPerpLiquidator, StablePool};
use smallvec::SmallVec;

/// One Uniswap V3 swap leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    pub token_in: Address,
    pub fee: U24,
    pub token_out: Address,
}

impl Hop {
    pub fn new(token_in: Address, fee: U24, token_out: Address) -> Self {
        Self {
            token_in,
            fee,
            token_out,
        }
    }

    pub fn to_abi(&self) -> IPerpLiquidator::Hop {
        abi_hop(self.token_in, self.fee, self.token_out)
    }
}

/// Hop list of a direct swap; two hops cover every shipped route.
pub type HopList = SmallVec<[Hop; 2]>;

/// Liquidation route for one collateral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollateralPath {
    /// `flashLiquidate`: swap along `head` then the packed `tail`.
    DirectSwap { head: Hop, tail: Bytes },
    /// `flashLiquidateThroughCurve`: flash liquidity from `uni_pool`, swap
    /// through a stable pool. `stable_pool` is resolved on-chain per
    /// attempt when not configured.
    PooledSwap {
        uni_pool: Address,
        stable_pool: Option<StablePool>,
    },
}

impl CollateralPath {
    /// Direct swap along `hops`. The caller guarantees `hops` is non-empty
    /// and continuous (see [`crate::config`] validation).
    pub fn direct(hops: &[Hop]) -> Option<Self> {
        let (head, rest) = hops.split_first()?;
        Some(Self::DirectSwap {
            head: *head,
            tail: pack_tail(rest),
        })
    }

    /// Contract method this route calls.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::DirectSwap { .. } => "flashLiquidate",
            Self::PooledSwap { .. } => "flashLiquidateThroughCurve",
        }
    }

    /// Token a direct swap ends in. Pooled routes end wherever the stable
    /// pool settles, which is only known on-chain.
    pub fn final_token(&self) -> Option<Address> {
        match self {
            Self::DirectSwap { head, tail } => {
                if tail.len() >= 20 {
                    Some(Address::from_slice(&tail[tail.len() - 20..]))
                } else {
                    Some(head.token_out)
                }
            }
            Self::PooledSwap { .. } => None,
        }
    }
}

/// `abi.encodePacked(tokenIn, fee, tokenOut, fee, tokenOut, ...)` over
/// `hops`, the Uniswap V3 path continuation after the head hop.
///
/// Empty for no hops.
pub fn pack_tail(hops: &[Hop]) -> Bytes {
    let Some(first) = hops.first() else {
        return Bytes::new();
    };

    let mut packed = Vec::with_capacity(20 + hops.len() * 23);
    packed.extend_from_slice(first.token_in.as_slice());
    for hop in hops {
        packed.extend_from_slice(&hop.fee.to_be_bytes::<3>());
        packed.extend_from_slice(hop.token_out.as_slice());
    }
    Bytes::from(packed)
}

/// Read-only map collateral -> route.
#[derive(Debug, Clone, Default)]
pub struct SwapPathRegistry {
    paths: BTreeMap<Address, CollateralPath>,
}

impl SwapPathRegistry {
    pub fn new(paths: BTreeMap<Address, CollateralPath>) -> Self {
        Self { paths }
    }

    pub fn get(&self, collateral: &Address) -> Option<&CollateralPath> {
        self.paths.get(collateral)
    }

    pub fn contains(&self, collateral: &Address) -> bool {
        self.paths.contains_key(collateral)
    }

    /// Every registered collateral, in a stable order.
    pub fn candidates(&self) -> Vec<Address> {
        self.paths.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &CollateralPath)> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FromIterator<(Address, CollateralPath)> for SwapPathRegistry {
    fn from_iter<I: IntoIterator<Item = (Address, CollateralPath)>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, hex};

    const WETH: Address = address!("4200000000000000000000000000000000000006");
    const WBTC: Address = address!("68f180fcCe6836688e9084f035309E29Bf0A2095");
    const USDC: Address = address!("7F5c764cBc14f9669B88837ca1490cCa17c31607");

    fn fee(value: u32) -> U24 {
        U24::from(value)
    }

    #[test]
    fn test_single_hop_has_empty_tail() {
        let path = CollateralPath::direct(&[Hop::new(WETH, fee(3000), USDC)]).unwrap();
        match &path {
            CollateralPath::DirectSwap { head, tail } => {
                assert_eq!(head.token_in, WETH);
                assert!(tail.is_empty());
            }
            other => panic!("unexpected path {other:?}"),
        }
        assert_eq!(path.final_token(), Some(USDC));
        assert_eq!(path.method_name(), "flashLiquidate");
    }

    #[test]
    fn test_two_hop_tail_is_packed_path() {
        let hops: HopList = smallvec::smallvec![
            Hop::new(WBTC, fee(3000), WETH),
            Hop::new(WETH, fee(3000), USDC),
        ];
        let path = CollateralPath::direct(&hops).unwrap();

        let CollateralPath::DirectSwap { head, tail } = &path else {
            panic!("expected direct swap");
        };
        assert_eq!(*head, hops[0]);
        // WETH ‖ 3000 ‖ USDC
        let expected = hex!(
            "4200000000000000000000000000000000000006"
            "000bb8"
            "7f5c764cbc14f9669b88837ca1490cca17c31607"
        );
        assert_eq!(tail.as_ref(), expected.as_slice());
        assert_eq!(path.final_token(), Some(USDC));
    }

    #[test]
    fn test_empty_hops() {
        assert_eq!(CollateralPath::direct(&[]), None);
        assert!(pack_tail(&[]).is_empty());
    }

    #[test]
    fn test_registry_candidates() {
        let registry: SwapPathRegistry = [
            (
                WETH,
                CollateralPath::direct(&[Hop::new(WETH, fee(3000), USDC)]).unwrap(),
            ),
            (
                WBTC,
                CollateralPath::PooledSwap {
                    uni_pool: Address::repeat_byte(0x01),
                    stable_pool: None,
                },
            ),
        ]
        .into_iter()
        .collect();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&WETH));
        assert!(!registry.contains(&USDC));

        let mut candidates = registry.candidates();
        candidates.sort();
        let mut expected = vec![WETH, WBTC];
        expected.sort();
        assert_eq!(candidates, expected);
        assert_eq!(registry.get(&WBTC).unwrap().final_token(), None);
    }
}

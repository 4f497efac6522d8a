//! Liquidation calldata.
//!
//! A [`LiquidationCall`] is built once per attempt and reused verbatim for
//! the dry-run and the signed transaction, so both always carry the same
//! calldata.

use std::fmt;

use alloy::primitives::{aliases::U24, Address, Bytes, I256, U256};
use alloy::sol_types::SolCall;

use super::bindings::IPerpLiquidator::{
    self, flashLiquidateCall, flashLiquidateThroughCurveCall, FlashLiquidateThroughCurveParams,
    Hop,
};

/// One of the two liquidation entry points of the perp liquidator.
///
/// Equality and `Debug` go through the encoded calldata, which is what the
/// node sees.
#[derive(Clone)]
pub enum LiquidationCall {
    /// `flashLiquidate`: flash swap on Uniswap V3 along a hop path.
    FlashLiquidate(flashLiquidateCall),
    /// `flashLiquidateThroughCurve`: Uniswap flash liquidity, stable pool swap.
    FlashLiquidateThroughCurve(flashLiquidateThroughCurveCall),
}

impl LiquidationCall {
    /// Direct swap along `head` followed by the packed `tail`.
    pub fn direct(
        trader: Address,
        max_settlement_token_spent: U256,
        min_settlement_token_profit: I256,
        head: Hop,
        tail: Bytes,
    ) -> Self {
        Self::FlashLiquidate(flashLiquidateCall {
            trader,
            maxSettlementTokenSpent: max_settlement_token_spent,
            minSettlementTokenProfit: min_settlement_token_profit,
            pathHead: head,
            pathTail: tail,
        })
    }

    /// Flash liquidity from `uni_pool`, swap through the stable pool.
    #[allow(clippy::too_many_arguments)]
    pub fn through_pool(
        trader: Address,
        max_settlement_token_spent: U256,
        min_settlement_token_profit: I256,
        uni_pool: Address,
        crv_factory: Address,
        crv_pool: Address,
        token: Address,
    ) -> Self {
        Self::FlashLiquidateThroughCurve(flashLiquidateThroughCurveCall {
            params: FlashLiquidateThroughCurveParams {
                trader,
                maxSettlementTokenSpent: max_settlement_token_spent,
                minSettlementTokenProfit: min_settlement_token_profit,
                uniPool: uni_pool,
                crvFactory: crv_factory,
                crvPool: crv_pool,
                token,
            },
        })
    }

    /// Contract method name, used in log events.
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::FlashLiquidate(_) => "flashLiquidate",
            Self::FlashLiquidateThroughCurve(_) => "flashLiquidateThroughCurve",
        }
    }

    pub fn trader(&self) -> Address {
        match self {
            Self::FlashLiquidate(call) => call.trader,
            Self::FlashLiquidateThroughCurve(call) => call.params.trader,
        }
    }

    /// ABI-encoded calldata including the selector.
    pub fn encode(&self) -> Bytes {
        match self {
            Self::FlashLiquidate(call) => Bytes::from(call.abi_encode()),
            Self::FlashLiquidateThroughCurve(call) => Bytes::from(call.abi_encode()),
        }
    }
}

impl fmt::Debug for LiquidationCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiquidationCall")
            .field("method", &self.method_name())
            .field("trader", &self.trader())
            .field("calldata", &self.encode())
            .finish()
    }
}

impl PartialEq for LiquidationCall {
    fn eq(&self, other: &Self) -> bool {
        self.encode() == other.encode()
    }
}

impl Eq for LiquidationCall {}

/// Build an ABI [`Hop`] from plain values.
pub fn abi_hop(token_in: Address, fee: U24, token_out: Address) -> Hop {
    IPerpLiquidator::Hop {
        tokenIn: token_in,
        fee,
        tokenOut: token_out,
    }
}

//! Contract bindings for the perp liquidator, the vault and ERC-20 metadata.
//!
//! The interfaces are declared inline so the Rust types always match the
//! functions the bot actually calls.
//!
//! # Usage
//!
//! ```rust,ignore
//! use liquidator_chain::contracts::bindings::IPerpLiquidator;
//!
//! let liquidator = IPerpLiquidator::new(address, &provider);
//! let vault = liquidator.getVault().call().await?._0;
//! ```

use alloy::sol;

// ============================================================================
// Perp Liquidator
// ============================================================================

sol! {
    #[sol(rpc, all_derives)]
    interface IPerpLiquidator {
        /// One Uniswap V3 swap leg.
        struct Hop {
            address tokenIn;
            uint24 fee;
            address tokenOut;
        }

        struct FlashLiquidateThroughCurveParams {
            address trader;
            uint256 maxSettlementTokenSpent;
            int256 minSettlementTokenProfit;
            address uniPool;
            address crvFactory;
            address crvPool;
            address token;
        }

        function getVault() external view returns (address);

        function getMaxProfitableCollateralFromCollaterals(
            address trader,
            address[] calldata collaterals
        ) external view returns (address);

        function findCurveFactoryAndPoolForCoins(
            address fromToken,
            address toToken
        ) external view returns (address, address);

        function flashLiquidate(
            address trader,
            uint256 maxSettlementTokenSpent,
            int256 minSettlementTokenProfit,
            Hop calldata pathHead,
            bytes calldata pathTail
        ) external;

        function flashLiquidateThroughCurve(
            FlashLiquidateThroughCurveParams calldata params
        ) external;
    }
}

// ============================================================================
// Vault
// ============================================================================

sol! {
    #[sol(rpc, all_derives)]
    interface IVault {
        function isLiquidatable(address trader) external view returns (bool);

        function getSettlementToken() external view returns (address);
    }
}

// ============================================================================
// ERC-20
// ============================================================================

sol! {
    #[sol(rpc, all_derives)]
    interface IERC20Metadata {
        function decimals() external view returns (uint8);

        function symbol() external view returns (string);

        function balanceOf(address account) external view returns (uint256);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;
    use alloy::sol_types::SolCall;

    fn selector(signature: &str) -> [u8; 4] {
        let hash = keccak256(signature.as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    #[test]
    fn test_liquidation_selectors_match_signatures() {
        assert_eq!(
            IPerpLiquidator::flashLiquidateCall::SELECTOR,
            selector("flashLiquidate(address,uint256,int256,(address,uint24,address),bytes)"),
            "flashLiquidate selector mismatch! Bot will send incorrect calldata."
        );
        assert_eq!(
            IPerpLiquidator::flashLiquidateThroughCurveCall::SELECTOR,
            selector(
                "flashLiquidateThroughCurve((address,uint256,int256,address,address,address,address))"
            ),
        );
        assert_eq!(
            IPerpLiquidator::getMaxProfitableCollateralFromCollateralsCall::SELECTOR,
            selector("getMaxProfitableCollateralFromCollaterals(address,address[])"),
        );
        assert_eq!(
            IVault::isLiquidatableCall::SELECTOR,
            selector("isLiquidatable(address)"),
        );
    }
}

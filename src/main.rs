//! Perp Collateral Liquidation Bot
//!
//! Scans every maker and trader of a perpetual-futures vault, asks the
//! on-chain oracle which accounts are underwater, and liquidates them
//! through a flash-loan liquidator contract.
//! Features:
//! - Subgraph-driven account discovery
//! - Direct and stable-pool swap routes per collateral
//! - Dry-run before every submission
//! - Nonce-serialized transaction submission

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liquidator_api::SubgraphClient;
use liquidator_chain::{
    LiquidatorContract, ProviderManager, SubmissionSerializer, TransactionSenderBuilder,
};
use liquidator_core::{
    check_settlement_routes, load_deployment_from_env, units::format_units, LiquidationRouter,
    RiskEvaluator, ScanLoop,
};

/// Environment variable names.
mod env {
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    if let Err(e) = run().await {
        error!(error = %format!("{e:#}"), "uncaught");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let json = std::env::var(env::LOG_FORMAT).is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,liquidator_core=debug,liquidator_chain=debug")
            }),
        )
        .init();
}

async fn run() -> Result<()> {
    // Deployment file (DEPLOYMENT_CONFIG) with bot profile overrides applied
    let deployment = load_deployment_from_env()?;
    let bot = deployment.bot.clone();
    bot.log_config();

    info!(
        deployment = %deployment.name,
        chain_id = deployment.chain_id,
        liquidator = %deployment.liquidator,
        collaterals = deployment.registry.len(),
        "Starting perp liquidation bot"
    );

    let provider = ProviderManager::new(&deployment.rpc_url, deployment.chain_id).await?;

    let private_key = std::env::var(env::PRIVATE_KEY)
        .map_err(|_| anyhow::anyhow!("Missing env var: {}", env::PRIVATE_KEY))?;
    let sender = Arc::new(
        TransactionSenderBuilder::new(&deployment.rpc_url, deployment.chain_id)
            .gas_limit(bot.submission.gas_limit)
            .build(&private_key)?,
    );
    info!(address = %sender.address, "Transaction sender initialized");

    let contract = Arc::new(
        LiquidatorContract::connect(&deployment.rpc_url, deployment.liquidator, sender.clone())
            .await?,
    );
    let settlement = contract.settlement_token().clone();
    info!(
        vault = %contract.vault(),
        settlement_token = %settlement.address,
        symbol = %settlement.symbol,
        decimals = settlement.decimals,
        "Liquidator contract connected"
    );

    let limits = deployment
        .bounds
        .resolve(settlement.decimals)
        .context("invalid liquidation bounds")?;
    info!(
        max_spent = %format_units(limits.max_settlement_token_spent, settlement.decimals),
        min_profit = %deployment.bounds.min_settlement_token_profit,
        symbol = %settlement.symbol,
        "Liquidation bounds"
    );

    let mismatched = check_settlement_routes(&deployment.registry, settlement.address);
    if !mismatched.is_empty() {
        warn!(
            count = mismatched.len(),
            "Some direct routes do not end in the settlement token"
        );
    }

    log_balances(&provider, &contract, sender.address).await;

    let serializer = Arc::new(SubmissionSerializer::new(sender.pending_nonce().await?));

    let registry = Arc::new(deployment.registry);
    let evaluator = RiskEvaluator::new(contract.clone(), &registry, bot.timeouts.call());
    let router = Arc::new(LiquidationRouter::new(
        evaluator,
        contract.clone(),
        serializer,
        registry,
        limits,
        settlement.address,
        &bot,
    ));

    let index = Arc::new(
        SubgraphClient::with_timeout(&deployment.subgraph_url, bot.timeouts.index_request())?
            .with_page_size(bot.scanner.page_size),
    );
    info!(
        endpoint = %index.endpoint(),
        page_size = index.page_size(),
        "Subgraph index ready"
    );
    let scan = ScanLoop::new(index, router, bot.scanner.clone());

    let mut handle = tokio::spawn(async move { scan.run().await });

    tokio::select! {
        joined = &mut handle => {
            // The scan loop only returns by panicking.
            let e = match joined {
                Ok(()) => anyhow::anyhow!("scan loop exited"),
                Err(e) => anyhow::Error::new(e),
            };
            return Err(e);
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
            handle.abort();
        }
    }

    info!("Liquidation bot stopped");
    Ok(())
}

/// Log the signer's gas balance and the contract's settlement token float.
async fn log_balances(
    provider: &ProviderManager,
    contract: &LiquidatorContract,
    signer: alloy::primitives::Address,
) {
    match provider.native_balance(signer).await {
        Ok(balance) => info!(
            signer = %signer,
            balance = %format_units(balance, 18),
            "Signer native balance"
        ),
        Err(e) => warn!(error = %e, "Failed to read signer balance"),
    }

    let token = contract.settlement_token();
    match contract.settlement_token_balance().await {
        Ok(balance) => info!(
            contract = %contract.address,
            balance = %format_units(balance, token.decimals),
            symbol = %token.symbol,
            "Liquidator settlement token balance"
        ),
        Err(e) => warn!(error = %e, "Failed to read liquidator balance"),
    }
}

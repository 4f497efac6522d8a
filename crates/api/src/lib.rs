//! External API clients for the liquidation bot.
//!
//! This crate provides:
//! - Subgraph client: paginated maker/trader account discovery

mod subgraph;

pub use subgraph::{
    AccountCategory, AccountId, AccountIndex, IndexError, Page, SubgraphClient, MAX_PAGE_SIZE,
};

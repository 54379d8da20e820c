//! Client for the Tally governance-data GraphQL API.
//!
//! Every public operation on [`TallyApi`] is soft-failing: transport errors,
//! bad statuses, malformed payloads and GraphQL errors are logged and
//! surfaced as `None`, an empty list or a zero balance.

pub mod client;
pub mod error;
pub mod models;
mod queries;

pub use client::{
    ARBITRUM_CHAIN_ID, BASE_CHAIN_ID, TALLY_GRAPHQL_ENDPOINT, TallyApi, TallyConfig,
    parse_token_id,
};
pub use error::TallyError;
pub use models::*;

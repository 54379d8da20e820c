use crate::{
    error::TallyError,
    models::{
        Balance, BalancesData, DelegateData, DelegateInfo, DelegatesData, GraphqlResponse,
        Organization, OrganizationData, OrganizationsData, Proposal, ProposalsData,
    },
    queries,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub const TALLY_GRAPHQL_ENDPOINT: &str = "https://api.tally.xyz/query";
pub const ARBITRUM_CHAIN_ID: &str = "eip155:42161";
pub const BASE_CHAIN_ID: &str = "eip155:8453";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone)]
pub struct TallyConfig {
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
    /// Chains queried by `list_organizations` when no filter is given
    pub default_chain_ids: Vec<String>,
    pub page_size: u32,
}

impl TallyConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: TALLY_GRAPHQL_ENDPOINT.to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
            default_chain_ids: vec![ARBITRUM_CHAIN_ID.to_string(), BASE_CHAIN_ID.to_string()],
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Splits a CAIP-19 token id (`eip155:8453/erc20:0xabc`) into chain id and
/// token contract address.
pub fn parse_token_id(token_id: &str) -> Option<(&str, &str)> {
    let (chain_id, asset) = token_id.split_once('/')?;
    let (_, address) = asset.split_once(':')?;
    if chain_id.is_empty() || address.is_empty() {
        return None;
    }
    Some((chain_id, address))
}

#[derive(Clone)]
pub struct TallyApi {
    client: Client,
    config: TallyConfig,
}

impl TallyApi {
    pub fn new(config: TallyConfig) -> Result<Self, TallyError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        info!(endpoint = %config.endpoint, timeout = ?config.timeout, "Initializing Tally API client");
        Ok(Self { client, config })
    }

    /// Fetch one organization by slug
    #[instrument(name = "tally_get_organization", skip(self))]
    pub async fn get_organization(&self, slug: &str) -> Option<Organization> {
        let variables = json!({ "input": { "slug": slug } });
        match self
            .execute::<OrganizationData>(queries::ORGANIZATION, variables)
            .await
        {
            Ok(data) => {
                if data.organization.is_none() {
                    debug!(slug = %slug, "Organization not found");
                }
                data.organization
            }
            Err(e) => {
                error!(slug = %slug, error = %e, "Failed to fetch organization");
                None
            }
        }
    }

    /// Fetch organizations on one chain, or on every default chain when no
    /// filter is given. Results of several chains are concatenated as is, an
    /// organization deployed on two of them shows up twice.
    #[instrument(name = "tally_list_organizations", skip(self))]
    pub async fn list_organizations(&self, chain_filter: Option<&str>) -> Vec<Organization> {
        let chains: Vec<&str> = match chain_filter {
            Some(chain_id) => vec![chain_id],
            None => self
                .config
                .default_chain_ids
                .iter()
                .map(String::as_str)
                .collect(),
        };

        let mut organizations = Vec::new();
        for chain_id in chains {
            let variables = json!({
                "input": {
                    "filters": { "chainId": chain_id },
                    "page": { "limit": self.config.page_size }
                }
            });

            match self
                .execute::<OrganizationsData>(queries::ORGANIZATIONS, variables)
                .await
            {
                Ok(data) => {
                    debug!(chain_id = %chain_id, count = data.organizations.nodes.len(), "Fetched organizations");
                    organizations.extend(data.organizations.nodes);
                }
                Err(e) => {
                    error!(chain_id = %chain_id, error = %e, "Failed to fetch organizations");
                }
            }
        }

        organizations
    }

    /// Fetch proposals of an organization, scoped to active ones server side
    /// when `active_only` is set
    #[instrument(name = "tally_get_proposals", skip(self))]
    pub async fn get_proposals(&self, organization_id: &str, active_only: bool) -> Vec<Proposal> {
        let mut filters = json!({ "organizationId": organization_id });
        if active_only {
            filters["status"] = json!("active");
        }
        let variables = json!({
            "input": {
                "filters": filters,
                "page": { "limit": self.config.page_size }
            }
        });

        match self
            .execute::<ProposalsData>(queries::PROPOSALS, variables)
            .await
        {
            Ok(data) => data.proposals.nodes,
            Err(e) => {
                error!(organization_id = %organization_id, error = %e, "Failed to fetch proposals");
                Vec::new()
            }
        }
    }

    /// Fetch a wallet's delegation record. `None` is also the normal answer
    /// for a wallet that never delegated.
    #[instrument(name = "tally_get_delegate_info", skip(self))]
    pub async fn get_delegate_info(
        &self,
        address: &str,
        organization_id: &str,
    ) -> Option<DelegateInfo> {
        let variables = json!({
            "input": {
                "address": address,
                "organizationId": organization_id
            }
        });

        match self
            .execute::<DelegateData>(queries::DELEGATE, variables)
            .await
        {
            Ok(data) => data.delegate,
            Err(e) => {
                error!(address = %address, organization_id = %organization_id, error = %e, "Failed to fetch delegate info");
                None
            }
        }
    }

    /// Top delegates of an organization by voting power
    #[instrument(name = "tally_list_delegates", skip(self))]
    pub async fn list_delegates(&self, organization_id: &str, limit: u32) -> Vec<DelegateInfo> {
        let variables = json!({
            "input": {
                "filters": { "organizationId": organization_id },
                "sort": { "sortBy": "votes", "isDescending": true },
                "page": { "limit": limit }
            }
        });

        match self
            .execute::<DelegatesData>(queries::DELEGATES, variables)
            .await
        {
            Ok(data) => data.delegates.nodes,
            Err(e) => {
                error!(organization_id = %organization_id, error = %e, "Failed to fetch delegates");
                Vec::new()
            }
        }
    }

    /// Balance of one governance token. Absent tokens and failures both come
    /// back as [`Balance::zero`].
    #[instrument(name = "tally_get_token_balance", skip(self))]
    pub async fn get_token_balance(&self, address: &str, token_id: &str) -> Balance {
        let Some((chain_id, token_address)) = parse_token_id(token_id) else {
            warn!(token_id = %token_id, "Unrecognized token id format");
            return Balance::zero(token_id);
        };

        let variables = json!({
            "input": { "accountID": format!("{chain_id}:{address}") }
        });

        match self
            .execute::<BalancesData>(queries::BALANCES, variables)
            .await
        {
            Ok(data) => data
                .balances
                .into_iter()
                .find(|item| item.address.eq_ignore_ascii_case(token_address))
                .map(|item| Balance::from_item(token_id, item))
                .unwrap_or_else(|| Balance::zero(token_id)),
            Err(e) => {
                error!(address = %address, token_id = %token_id, error = %e, "Failed to fetch token balance");
                Balance::zero(token_id)
            }
        }
    }

    /// Execute a GraphQL query and unwrap the `data` envelope
    async fn execute<T>(&self, query: &str, variables: Value) -> Result<T, TallyError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Api-Key", &self.config.api_key)
            .header("User-Agent", "tabula/1.0")
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(TallyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GraphqlResponse<T> = serde_json::from_str(&body)?;

        if let Some(errors) = parsed.errors.filter(|errors| !errors.is_empty()) {
            let messages = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(TallyError::Graphql(messages));
        }

        parsed.data.ok_or(TallyError::MissingData)
    }
}

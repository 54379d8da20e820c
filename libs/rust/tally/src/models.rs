use serde::{Deserialize, Deserializer, Serialize, de};
use std::{fmt, num::ParseIntError};

/// GraphQL response envelope
#[derive(Deserialize, Debug)]
pub(crate) struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphqlError>>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct GraphqlError {
    pub message: String,
}

/// Paginated connection, only the nodes are kept
#[derive(Deserialize, Debug)]
pub(crate) struct Nodes<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct OrganizationData {
    pub organization: Option<Organization>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct OrganizationsData {
    pub organizations: Nodes<Organization>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ProposalsData {
    pub proposals: Nodes<Proposal>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct DelegateData {
    pub delegate: Option<DelegateInfo>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct DelegatesData {
    pub delegates: Nodes<DelegateInfo>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct BalancesData {
    #[serde(default)]
    pub balances: Vec<BalanceItem>,
}

/// A governance organization (DAO) tracked by Tally
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub chain_ids: Vec<String>,
    #[serde(default)]
    pub token_ids: Vec<String>,
    #[serde(default)]
    pub governor_ids: Vec<String>,
    #[serde(default)]
    pub metadata: Option<OrganizationMetadata>,
    #[serde(default)]
    pub has_active_proposals: bool,
    #[serde(default)]
    pub proposals_count: u64,
    #[serde(default)]
    pub delegates_count: u64,
    #[serde(default)]
    pub token_owners_count: u64,
}

impl Organization {
    /// The governance token, when the organization has one.
    pub fn governance_token_id(&self) -> Option<&str> {
        self.token_ids.first().map(String::as_str)
    }

    pub fn is_on_chain(&self, chain_id: &str) -> bool {
        self.chain_ids.iter().any(|c| c == chain_id)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct OrganizationMetadata {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Lifecycle status of a proposal. Statuses Tally adds later land in `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProposalStatus {
    Pending,
    Active,
    Succeeded,
    Defeated,
    Queued,
    Executed,
    Canceled,
    Expired,
    Other(String),
}

impl ProposalStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Active => "active",
            ProposalStatus::Succeeded => "succeeded",
            ProposalStatus::Defeated => "defeated",
            ProposalStatus::Queued => "queued",
            ProposalStatus::Executed => "executed",
            ProposalStatus::Canceled => "canceled",
            ProposalStatus::Expired => "expired",
            ProposalStatus::Other(status) => status,
        }
    }
}

impl From<String> for ProposalStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "pending" => ProposalStatus::Pending,
            "active" => ProposalStatus::Active,
            "succeeded" => ProposalStatus::Succeeded,
            "defeated" => ProposalStatus::Defeated,
            "queued" => ProposalStatus::Queued,
            "executed" => ProposalStatus::Executed,
            "canceled" | "cancelled" => ProposalStatus::Canceled,
            "expired" => ProposalStatus::Expired,
            _ => ProposalStatus::Other(value),
        }
    }
}

impl From<ProposalStatus> for String {
    fn from(value: ProposalStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A governance proposal
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    pub metadata: ProposalMetadata,
    pub status: ProposalStatus,
    #[serde(default)]
    pub vote_stats: Vec<VoteStat>,
    #[serde(default)]
    pub executable_calls: Option<Vec<ExecutableCall>>,
    #[serde(default)]
    pub start: Option<ProposalTime>,
    #[serde(default)]
    pub end: Option<ProposalTime>,
    #[serde(default)]
    pub creator: Option<Account>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProposalMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ipfs_hash: Option<String>,
}

/// Tally returns either a block or a blockless timestamp, both carry `timestamp`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ProposalTime {
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Tallies for one vote type (for, against, abstain, ...)
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoteStat {
    #[serde(rename = "type")]
    pub vote_type: String,
    #[serde(deserialize_with = "string_or_number")]
    pub votes_count: String,
    #[serde(default)]
    pub voters_count: u64,
    #[serde(default)]
    pub percent: f64,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ExecutableCall {
    #[serde(default)]
    pub calldata: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub target: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub value: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Account {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ens: Option<String>,
}

impl Account {
    /// Tally sends empty strings for unset names, treat them as absent
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn ens_name(&self) -> Option<&str> {
        self.ens.as_deref().filter(|ens| !ens.is_empty())
    }
}

/// A wallet's delegation standing within one organization
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DelegateInfo {
    pub account: Account,
    #[serde(deserialize_with = "string_or_number")]
    pub votes_count: String,
    #[serde(default)]
    pub delegators_count: u64,
    pub organization: DelegateOrganization,
    #[serde(default)]
    pub token: Option<TokenInfo>,
    #[serde(default)]
    pub governor: Option<GovernorRef>,
    #[serde(default)]
    pub statement: Option<DelegateStatement>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DelegateOrganization {
    pub name: String,
    #[serde(default)]
    pub proposals_count: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TokenInfo {
    pub symbol: String,
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub supply: String,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GovernorRef {
    pub name: String,
    #[serde(default)]
    pub token_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DelegateStatement {
    #[serde(default)]
    pub statement: String,
    #[serde(default)]
    pub is_seeking_delegation: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct BalanceItem {
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub decimals: u32,
    #[serde(deserialize_with = "string_or_number")]
    pub balance: String,
}

/// A wallet's balance of one governance token, raw integer amount
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Balance {
    pub token_id: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u32,
    pub balance: String,
}

impl Balance {
    /// Sentinel for "wallet does not hold this token"
    pub fn zero(token_id: &str) -> Self {
        Self {
            token_id: token_id.to_string(),
            symbol: "UNKNOWN".to_string(),
            name: String::new(),
            decimals: 0,
            balance: "0".to_string(),
        }
    }

    pub(crate) fn from_item(token_id: &str, item: BalanceItem) -> Self {
        Self {
            token_id: token_id.to_string(),
            symbol: item.symbol,
            name: item.name,
            decimals: item.decimals,
            balance: item.balance,
        }
    }

    pub fn amount(&self) -> Result<u128, ParseIntError> {
        self.balance.trim().parse::<u128>()
    }
}

/// Largest integer an `f64` holds exactly
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Large token amounts arrive as strings, small counts sometimes as numbers.
/// A float is only accepted when it is a whole number that survived the JSON
/// parse exactly, anything bigger has already lost digits.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(u64),
        Float(f64),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(value) => value,
        Raw::Int(value) => value.to_string(),
        Raw::Float(value) if value.fract() == 0.0 && value.abs() <= MAX_EXACT_FLOAT => {
            format!("{value:.0}")
        }
        Raw::Float(value) => {
            return Err(de::Error::custom(format!(
                "numeric amount {value} cannot be represented exactly, expected a string"
            )));
        }
        Raw::Null(()) => String::new(),
    })
}

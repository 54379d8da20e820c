use crate::governance::GovernanceData;
use anyhow::{Context, Result};
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, str::FromStr, sync::Arc};
use tally::{Organization, OrganizationMetadata, Proposal};
use tracing::{debug, info, instrument, warn};
use utils::errors::NO_SUPPORTED_DAOS;

pub const DEFAULT_MIN_DELEGATES: u64 = 50;
pub const DEFAULT_MIN_PROPOSALS: u64 = 10;
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

pub const DEFAULT_MAJOR_DAOS: [&str; 6] = [
    "seamless-protocol",
    "internet-token-dao",
    "gloom",
    "uxd-arbitrum-one-council",
    "cora-protocol-dao",
    "wormhole",
];

pub const DEFAULT_EXCLUDE_KEYWORDS: [&str; 5] = ["test", "mock", "demo", "fork", "club"];

/// Where the candidate DAO set comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    /// Discover organizations on the configured chains
    #[default]
    Live,
    /// Only the curated Base DAOs
    Curated,
}

impl FromStr for CandidateSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(CandidateSource::Live),
            "curated" => Ok(CandidateSource::Curated),
            other => Err(format!("unknown candidate source '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedDao {
    pub slug: String,
    pub description: String,
    #[serde(default)]
    pub token_id: Option<String>,
}

impl CuratedDao {
    fn new(slug: &str, description: &str, token_id: &str) -> Self {
        Self {
            slug: slug.to_string(),
            description: description.to_string(),
            token_id: Some(token_id.to_string()),
        }
    }
}

pub fn default_curated_daos() -> Vec<CuratedDao> {
    vec![
        CuratedDao::new(
            "seamless-protocol",
            "DeFi lending protocol on Base",
            "eip155:8453/erc20:0x1C7a460413dD4e964f96D8dFC56E7223cE88CD85",
        ),
        CuratedDao::new(
            "internet-token-dao",
            "Decentralized internet infrastructure governance",
            "eip155:8453/erc20:0x968D6A288d7B024D5012c0B25d67A889E4E3eC19",
        ),
        CuratedDao::new(
            "gloom",
            "Decentralized gaming platform",
            "eip155:8453/erc20:0xbb5D04c40Fa063FAF213c4E0B8086655164269Ef",
        ),
    ]
}

#[derive(Debug, Clone)]
pub struct InvolvementConfig {
    pub candidate_source: CandidateSource,
    pub curated_daos: Vec<CuratedDao>,
    pub major_daos: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub min_delegates: u64,
    pub min_proposals: u64,
    /// Chains consulted by live discovery, empty means the client defaults
    pub chain_ids: Vec<String>,
    pub max_concurrency: usize,
}

impl Default for InvolvementConfig {
    fn default() -> Self {
        Self {
            candidate_source: CandidateSource::default(),
            curated_daos: default_curated_daos(),
            major_daos: DEFAULT_MAJOR_DAOS.iter().map(|s| s.to_string()).collect(),
            exclude_keywords: DEFAULT_EXCLUDE_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_delegates: DEFAULT_MIN_DELEGATES,
            min_proposals: DEFAULT_MIN_PROPOSALS,
            chain_ids: Vec::new(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// An organization the aggregator is willing to look at
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaoCandidate {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub chain_ids: Vec<String>,
    pub token_id: Option<String>,
    pub description: Option<String>,
    pub delegates_count: u64,
    pub proposals_count: u64,
    pub has_active_proposals: bool,
}

impl DaoCandidate {
    fn from_organization(org: &Organization) -> Self {
        Self {
            id: org.id.clone(),
            slug: org.slug.clone(),
            name: org.name.clone(),
            chain_ids: org.chain_ids.clone(),
            token_id: org.governance_token_id().map(str::to_string),
            description: org.metadata.as_ref().and_then(|m| m.description.clone()),
            delegates_count: org.delegates_count,
            proposals_count: org.proposals_count,
            has_active_proposals: org.has_active_proposals,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub address: String,
    pub name: Option<String>,
    pub ens: Option<String>,
}

impl UserInfo {
    pub fn for_address(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSummary {
    pub name: String,
    pub symbol: String,
}

/// The wallet delegated (or was delegated to) in this organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveDelegation {
    pub dao_slug: String,
    pub dao_name: String,
    pub chain_ids: Vec<String>,
    pub has_active_proposals: bool,
    pub votes_count: String,
    pub delegators_count: u64,
    pub user_info: UserInfo,
    pub token: Option<TokenSummary>,
    pub proposals_count: u64,
}

/// The wallet holds the governance token but has not delegated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialDao {
    pub dao_slug: String,
    pub dao_name: String,
    pub chain_ids: Vec<String>,
    pub delegates_count: u64,
    pub proposals_count: u64,
    pub has_active_proposals: bool,
    pub token_balance: String,
    pub token_symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvolvementResult {
    pub active_delegations: Vec<ActiveDelegation>,
    pub potential_daos: Vec<PotentialDao>,
    pub user_info: UserInfo,
    pub error: Option<String>,
}

impl InvolvementResult {
    fn empty(address: &str) -> Self {
        Self {
            active_delegations: Vec::new(),
            potential_daos: Vec::new(),
            user_info: UserInfo::for_address(address),
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaoOverview {
    pub basic_info: DaoCandidate,
    pub metadata: Option<OrganizationMetadata>,
    pub active_proposals: Vec<Proposal>,
}

enum Involvement {
    Active(ActiveDelegation),
    Potential(PotentialDao),
}

pub struct WalletManager<D> {
    source: Arc<D>,
    config: InvolvementConfig,
}

impl<D: GovernanceData> WalletManager<D> {
    pub fn new(source: Arc<D>, config: InvolvementConfig) -> Self {
        Self { source, config }
    }

    /// Keyword exclusion always wins, then the major-DAO allowlist, then the
    /// activity thresholds.
    pub fn is_significant(&self, org: &Organization) -> bool {
        let name = org.name.to_lowercase();
        if self
            .config
            .exclude_keywords
            .iter()
            .any(|keyword| name.contains(&keyword.to_lowercase()))
        {
            return false;
        }

        if self.config.major_daos.iter().any(|slug| *slug == org.slug) {
            return true;
        }

        org.delegates_count >= self.config.min_delegates
            || org.proposals_count >= self.config.min_proposals
    }

    #[instrument(name = "wallet_candidates", skip(self))]
    pub async fn candidates(&self) -> Vec<DaoCandidate> {
        let candidates = match self.config.candidate_source {
            CandidateSource::Live => self.live_candidates().await,
            CandidateSource::Curated => self.curated_candidates().await,
        };

        info!(
            source = ?self.config.candidate_source,
            count = candidates.len(),
            "Resolved candidate DAOs"
        );

        candidates
    }

    async fn live_candidates(&self) -> Vec<DaoCandidate> {
        let organizations = if self.config.chain_ids.is_empty() {
            self.source.list_organizations(None).await
        } else {
            let mut organizations = Vec::new();
            for chain_id in &self.config.chain_ids {
                organizations.extend(self.source.list_organizations(Some(chain_id)).await);
            }
            organizations
        };

        let mut seen = HashSet::new();
        organizations
            .iter()
            .filter(|org| !org.slug.is_empty() && !org.id.is_empty())
            .filter(|org| self.is_significant(org))
            .filter(|org| seen.insert(org.slug.clone()))
            .map(DaoCandidate::from_organization)
            .collect()
    }

    async fn curated_candidates(&self) -> Vec<DaoCandidate> {
        let mut candidates = Vec::with_capacity(self.config.curated_daos.len());
        for curated in &self.config.curated_daos {
            let Some(org) = self.source.get_organization(&curated.slug).await else {
                warn!(dao_slug = %curated.slug, "Curated DAO could not be resolved, skipping");
                continue;
            };

            let mut candidate = DaoCandidate::from_organization(&org);
            if curated.token_id.is_some() {
                candidate.token_id = curated.token_id.clone();
            }
            candidate.description = Some(curated.description.clone());
            candidates.push(candidate);
        }
        candidates
    }

    pub fn filter_by_chain(candidates: Vec<DaoCandidate>, chain_id: &str) -> Vec<DaoCandidate> {
        candidates
            .into_iter()
            .filter(|c| c.chain_ids.iter().any(|id| id == chain_id))
            .collect()
    }

    /// Delegations and undelegated holdings of `address` across every
    /// candidate DAO. One organization failing never hides the others.
    #[instrument(name = "wallet_dao_involvement", skip(self))]
    pub async fn get_dao_involvement(&self, address: &str) -> InvolvementResult {
        let mut result = InvolvementResult::empty(address);

        let candidates = self.candidates().await;
        if candidates.is_empty() {
            warn!(address = %address, "No candidate DAOs available");
            result.error = Some(NO_SUPPORTED_DAOS.to_string());
            return result;
        }

        let lookups: Vec<_> = candidates
            .iter()
            .map(|candidate| self.lookup(address, candidate))
            .collect();
        let outcomes: Vec<Result<Option<Involvement>>> = stream::iter(lookups)
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        for (candidate, outcome) in candidates.iter().zip(outcomes) {
            match outcome {
                Ok(Some(Involvement::Active(active))) => {
                    if result.user_info.name.is_none() && result.user_info.ens.is_none() {
                        result.user_info.name = active.user_info.name.clone();
                        result.user_info.ens = active.user_info.ens.clone();
                    }
                    result.active_delegations.push(active);
                }
                Ok(Some(Involvement::Potential(potential))) => {
                    result.potential_daos.push(potential);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(dao_slug = %candidate.slug, error = %e, "Skipping DAO after lookup failure");
                }
            }
        }

        info!(
            address = %address,
            active = result.active_delegations.len(),
            potential = result.potential_daos.len(),
            "DAO involvement resolved"
        );

        result
    }

    async fn lookup(
        &self,
        address: &str,
        candidate: &DaoCandidate,
    ) -> Result<Option<Involvement>> {
        if let Some(delegate) = self.source.get_delegate_info(address, &candidate.id).await {
            debug!(dao_slug = %candidate.slug, votes = %delegate.votes_count, "Found delegation");
            return Ok(Some(Involvement::Active(ActiveDelegation {
                dao_slug: candidate.slug.clone(),
                dao_name: candidate.name.clone(),
                chain_ids: candidate.chain_ids.clone(),
                has_active_proposals: candidate.has_active_proposals,
                votes_count: delegate.votes_count,
                delegators_count: delegate.delegators_count,
                user_info: UserInfo {
                    address: delegate.account.address.clone(),
                    name: delegate.account.display_name().map(str::to_string),
                    ens: delegate.account.ens_name().map(str::to_string),
                },
                token: delegate.token.map(|t| TokenSummary {
                    name: t.name,
                    symbol: t.symbol,
                }),
                proposals_count: delegate.organization.proposals_count,
            })));
        }

        let Some(token_id) = candidate.token_id.as_deref() else {
            return Ok(None);
        };

        let balance = self.source.get_token_balance(address, token_id).await;
        let amount = balance.amount().with_context(|| {
            format!(
                "Malformed balance '{}' for token {} of {}",
                balance.balance, token_id, candidate.slug
            )
        })?;

        if amount == 0 {
            return Ok(None);
        }

        debug!(dao_slug = %candidate.slug, balance = %balance.balance, "Found undelegated holdings");
        Ok(Some(Involvement::Potential(PotentialDao {
            dao_slug: candidate.slug.clone(),
            dao_name: candidate.name.clone(),
            chain_ids: candidate.chain_ids.clone(),
            delegates_count: candidate.delegates_count,
            proposals_count: candidate.proposals_count,
            has_active_proposals: candidate.has_active_proposals,
            token_balance: balance.balance,
            token_symbol: balance.symbol,
        })))
    }

    /// Metadata and active proposals of one candidate DAO
    #[instrument(name = "wallet_dao_overview", skip(self))]
    pub async fn get_dao_overview(&self, slug: &str) -> Option<DaoOverview> {
        let candidate = self
            .candidates()
            .await
            .into_iter()
            .find(|c| c.slug == slug)?;

        let metadata = self
            .source
            .get_organization(slug)
            .await
            .and_then(|org| org.metadata);
        let active_proposals = self.source.get_proposals(&candidate.id, true).await;

        Some(DaoOverview {
            basic_info: candidate,
            metadata,
            active_proposals,
        })
    }
}

/// Top `limit` potential DAOs by proposal count, then delegate count
pub fn recommend(potential: &[PotentialDao], limit: usize) -> Vec<PotentialDao> {
    let mut ranked = potential.to_vec();
    ranked.sort_by(|a, b| {
        (b.proposals_count, b.delegates_count).cmp(&(a.proposals_count, a.delegates_count))
    });
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::fake::{FakeGovernance, balance, delegation, organization, proposal};
    use tally::ProposalStatus;

    fn manager(fake: FakeGovernance) -> WalletManager<FakeGovernance> {
        WalletManager::new(Arc::new(fake), InvolvementConfig::default())
    }

    #[test]
    fn test_major_daos_bypass_thresholds() {
        let wm = manager(FakeGovernance::default());
        assert!(wm.is_significant(&organization("1", "wormhole", "Wormhole", 0, 0)));
        assert!(!wm.is_significant(&organization("2", "tiny", "Tiny DAO", 49, 9)));
        assert!(wm.is_significant(&organization("3", "busy", "Busy DAO", 0, 10)));
        assert!(wm.is_significant(&organization("4", "crowded", "Crowded DAO", 50, 0)));
    }

    #[test]
    fn test_exclusion_keywords_beat_allowlist() {
        let wm = manager(FakeGovernance::default());
        assert!(!wm.is_significant(&organization("1", "gloom", "Gloom TEST", 500, 500)));
        assert!(!wm.is_significant(&organization("2", "forked", "Uniswap Fork", 500, 500)));
        assert!(!wm.is_significant(&organization("3", "club", "Degen Club", 500, 500)));
    }

    #[tokio::test]
    async fn test_live_candidates_dedupe_by_slug() {
        let fake = FakeGovernance {
            organizations: vec![
                organization("1", "wormhole", "Wormhole", 0, 0),
                organization("2", "small", "Small", 1, 1),
                organization("1", "wormhole", "Wormhole", 0, 0),
                organization("3", "demo-dao", "Demo DAO", 900, 90),
            ],
            ..Default::default()
        };

        let slugs: Vec<String> = manager(fake)
            .candidates()
            .await
            .into_iter()
            .map(|c| c.slug)
            .collect();

        assert_eq!(slugs, vec!["wormhole"]);
    }

    #[tokio::test]
    async fn test_curated_candidates_use_curated_token() {
        let fake = FakeGovernance {
            organizations: vec![organization("7", "gloom", "Gloom", 5, 5)],
            ..Default::default()
        };
        let config = InvolvementConfig {
            candidate_source: CandidateSource::Curated,
            ..Default::default()
        };
        let wm = WalletManager::new(Arc::new(fake), config);

        let candidates = wm.candidates().await;

        // seamless-protocol and internet-token-dao are unknown to the fake
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].token_id.as_deref(),
            Some("eip155:8453/erc20:0xbb5D04c40Fa063FAF213c4E0B8086655164269Ef")
        );
        assert_eq!(
            candidates[0].description.as_deref(),
            Some("Decentralized gaming platform")
        );
    }

    #[tokio::test]
    async fn test_no_candidates_reports_error() {
        let result = manager(FakeGovernance::default())
            .get_dao_involvement("0xabc")
            .await;

        assert_eq!(result.error.as_deref(), Some(NO_SUPPORTED_DAOS));
        assert!(result.active_delegations.is_empty());
        assert!(result.potential_daos.is_empty());
        assert_eq!(result.user_info.address, "0xabc");
    }

    #[tokio::test]
    async fn test_no_holdings_anywhere_yields_empty_partitions() {
        let fake = FakeGovernance {
            organizations: vec![
                organization("1", "wormhole", "Wormhole", 100, 20),
                organization("2", "gloom", "Gloom", 100, 20),
            ],
            ..Default::default()
        };

        let result = manager(fake).get_dao_involvement("0xabc").await;

        assert!(result.error.is_none());
        assert!(result.active_delegations.is_empty());
        assert!(result.potential_daos.is_empty());
    }

    #[tokio::test]
    async fn test_delegation_takes_precedence_over_balance() {
        let seamless = organization("1", "seamless-protocol", "Seamless Protocol", 300, 14);
        let gloom = organization("2", "gloom", "Gloom", 80, 12);

        let mut fake = FakeGovernance {
            organizations: vec![seamless.clone(), gloom.clone()],
            ..Default::default()
        };
        let mut delegate = delegation("0xabc", "Seamless Protocol", "100");
        delegate.account.ens = Some("alice.eth".to_string());
        fake.delegations.insert("1".to_string(), delegate);
        for org in [&seamless, &gloom] {
            let token_id = org.token_ids[0].clone();
            fake.balances
                .insert(token_id.clone(), balance(&token_id, "5000", "GOV"));
        }

        let result = manager(fake).get_dao_involvement("0xabc").await;

        assert_eq!(result.active_delegations.len(), 1);
        assert_eq!(result.active_delegations[0].dao_slug, "seamless-protocol");
        assert_eq!(result.active_delegations[0].votes_count, "100");
        assert_eq!(result.user_info.ens.as_deref(), Some("alice.eth"));

        let potential: Vec<&str> = result
            .potential_daos
            .iter()
            .map(|p| p.dao_slug.as_str())
            .collect();
        assert_eq!(potential, vec!["gloom"]);
        assert_eq!(result.potential_daos[0].token_balance, "5000");
    }

    #[tokio::test]
    async fn test_one_failing_dao_does_not_hide_the_others() {
        let orgs = vec![
            organization("1", "wormhole", "Wormhole", 100, 20),
            organization("2", "gloom", "Gloom", 100, 20),
            organization("3", "cora-protocol-dao", "Cora", 100, 20),
        ];
        let mut fake = FakeGovernance {
            organizations: orgs.clone(),
            ..Default::default()
        };
        fake.balances.insert(
            orgs[0].token_ids[0].clone(),
            balance(&orgs[0].token_ids[0], "10", "W"),
        );
        fake.balances.insert(
            orgs[1].token_ids[0].clone(),
            balance(&orgs[1].token_ids[0], "not-a-number", "GLOOM"),
        );
        fake.balances.insert(
            orgs[2].token_ids[0].clone(),
            balance(&orgs[2].token_ids[0], "30", "CORA"),
        );

        let result = manager(fake).get_dao_involvement("0xabc").await;

        let slugs: Vec<&str> = result
            .potential_daos
            .iter()
            .map(|p| p.dao_slug.as_str())
            .collect();
        assert_eq!(slugs, vec!["wormhole", "cora-protocol-dao"]);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_order_is_kept_with_sequential_lookups() {
        let orgs: Vec<Organization> = (1..=5)
            .map(|i| organization(&i.to_string(), &format!("dao-{i}"), "DAO", 100, 20))
            .collect();
        let mut fake = FakeGovernance {
            organizations: orgs.clone(),
            ..Default::default()
        };
        for org in &orgs {
            fake.balances.insert(
                org.token_ids[0].clone(),
                balance(&org.token_ids[0], "1", "GOV"),
            );
        }
        let config = InvolvementConfig {
            max_concurrency: 1,
            ..Default::default()
        };
        let fake = Arc::new(fake);
        let wm = WalletManager::new(fake.clone(), config);

        let result = wm.get_dao_involvement("0xabc").await;

        let slugs: Vec<&str> = result
            .potential_daos
            .iter()
            .map(|p| p.dao_slug.as_str())
            .collect();
        assert_eq!(slugs, vec!["dao-1", "dao-2", "dao-3", "dao-4", "dao-5"]);
        assert_eq!(fake.lookups(), 5);
    }

    #[tokio::test]
    async fn test_dao_overview() {
        let mut fake = FakeGovernance {
            organizations: vec![organization("1", "wormhole", "Wormhole", 100, 20)],
            ..Default::default()
        };
        fake.proposals.insert(
            "1".to_string(),
            vec![
                proposal("p1", "Upgrade guardian set", ProposalStatus::Active),
                proposal("p2", "Old", ProposalStatus::Executed),
            ],
        );
        let wm = manager(fake);

        let overview = wm.get_dao_overview("wormhole").await.unwrap();
        assert_eq!(overview.basic_info.name, "Wormhole");
        assert_eq!(overview.active_proposals.len(), 1);

        assert!(wm.get_dao_overview("unknown").await.is_none());
    }

    #[test]
    fn test_filter_by_chain() {
        let mut arbitrum = DaoCandidate::from_organization(&organization("1", "a", "A", 0, 0));
        arbitrum.chain_ids = vec![tally::ARBITRUM_CHAIN_ID.to_string()];
        let base = DaoCandidate::from_organization(&organization("2", "b", "B", 0, 0));

        let kept = WalletManager::<FakeGovernance>::filter_by_chain(
            vec![arbitrum, base],
            tally::BASE_CHAIN_ID,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].slug, "b");
    }

    #[test]
    fn test_recommend_ranks_by_activity() {
        let dao = |slug: &str, proposals, delegates| PotentialDao {
            dao_slug: slug.to_string(),
            dao_name: slug.to_string(),
            chain_ids: Vec::new(),
            delegates_count: delegates,
            proposals_count: proposals,
            has_active_proposals: false,
            token_balance: "1".to_string(),
            token_symbol: "GOV".to_string(),
        };
        let potential = vec![
            dao("a", 5, 10),
            dao("b", 20, 1),
            dao("c", 5, 90),
            dao("d", 1, 1000),
        ];

        let slugs: Vec<String> = recommend(&potential, 3)
            .into_iter()
            .map(|p| p.dao_slug)
            .collect();
        assert_eq!(slugs, vec!["b", "c", "a"]);
    }
}

use crate::{governance::GovernanceData, llm::LanguageModel};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{collections::HashMap, fmt, sync::Arc};
use tally::{Organization, Proposal};
use tracing::{error, info, instrument, warn};
use utils::errors::IMPACT_ANALYSIS_FAILED;

const TALLY_APP_URL: &str = "https://www.tally.xyz/gov";

/// Token id -> raw balance the caller holds
pub type TokenHoldings = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    Important,
    Fyi,
}

/// Feed category. [`UpdatesAgent`] only emits `Proposal`; the other
/// categories are accepted for feeds assembled by library callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Proposal,
    Treasury,
    Governance,
    Social,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().trim_end_matches('.').to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }

    pub fn priority(self) -> Priority {
        match self {
            RiskLevel::High => Priority::Urgent,
            RiskLevel::Medium => Priority::Important,
            RiskLevel::Low => Priority::Fyi,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Link,
    Vote,
    Delegate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub label: String,
    pub url: String,
}

impl UpdateAction {
    pub fn view_proposal(dao_slug: &str, proposal_id: &str) -> Self {
        Self {
            kind: ActionKind::Link,
            label: "View Proposal".to_string(),
            url: proposal_url(dao_slug, proposal_id),
        }
    }

    pub fn vote(dao_slug: &str, proposal_id: &str) -> Self {
        Self {
            kind: ActionKind::Vote,
            label: "Vote Now".to_string(),
            url: format!("{}/vote", proposal_url(dao_slug, proposal_id)),
        }
    }

    pub fn delegate(dao_slug: &str) -> Self {
        Self {
            kind: ActionKind::Delegate,
            label: "Delegate".to_string(),
            url: format!("{TALLY_APP_URL}/{dao_slug}/delegates"),
        }
    }
}

fn proposal_url(dao_slug: &str, proposal_id: &str) -> String {
    format!("{TALLY_APP_URL}/{dao_slug}/proposal/{proposal_id}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub summary: String,
    pub affected_areas: Vec<String>,
    pub risk_level: RiskLevel,
}

impl ImpactAnalysis {
    pub fn unavailable() -> Self {
        Self {
            summary: IMPACT_ANALYSIS_FAILED.to_string(),
            affected_areas: vec!["Unknown".to_string()],
            risk_level: RiskLevel::Medium,
        }
    }

    /// Parses the `Summary:` / `Areas:` / `Risk:` reply format
    pub fn parse(reply: &str) -> Option<Self> {
        let mut summary = None;
        let mut areas = None;
        let mut risk = None;

        for line in reply.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix("Summary:") {
                summary = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("Areas:") {
                areas = Some(
                    rest.split(',')
                        .map(str::trim)
                        .filter(|area| !area.is_empty())
                        .map(str::to_string)
                        .collect::<Vec<_>>(),
                );
            } else if let Some(rest) = line.strip_prefix("Risk:") {
                risk = RiskLevel::parse(rest);
            }
        }

        Some(Self {
            summary: summary.filter(|s| !s.is_empty())?,
            affected_areas: areas?,
            risk_level: risk?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inflow,
    Outflow,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inflow => f.write_str("inflow"),
            Direction::Outflow => f.write_str("outflow"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreasuryChange {
    pub amount: String,
    pub token_symbol: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreasuryAnalysis {
    pub summary: String,
    pub percent_change: f64,
    pub priority: Priority,
    pub details: TreasuryChange,
}

/// Significance of a treasury balance move. A previous balance of zero has
/// no meaningful percentage and is reported as a 0 % change.
pub fn analyze_treasury_change(
    current: f64,
    previous: f64,
    token_symbol: &str,
) -> TreasuryAnalysis {
    let change = current - previous;
    let percent_change = if previous > 0.0 {
        change / previous * 100.0
    } else {
        0.0
    };

    let priority = if percent_change.abs() > 20.0 {
        Priority::Urgent
    } else if percent_change.abs() > 10.0 {
        Priority::Important
    } else {
        Priority::Fyi
    };

    let (verb, direction) = if change > 0.0 {
        ("Increase", Direction::Inflow)
    } else {
        ("Decrease", Direction::Outflow)
    };

    TreasuryAnalysis {
        summary: format!(
            "{verb} of {:.1}% in treasury balance",
            percent_change.abs()
        ),
        percent_change,
        priority,
        details: TreasuryChange {
            amount: change.abs().to_string(),
            token_symbol: token_symbol.to_string(),
            direction,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaoUpdate {
    pub id: String,
    pub dao_slug: String,
    pub dao_name: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub actions: Vec<UpdateAction>,
}

/// Treasury movement as a feed entry. Library-only: Tally exposes no
/// treasury history, so the caller supplies both balance snapshots and
/// merges the entry into its feed with [`sort_updates`].
pub fn treasury_update(
    dao_slug: &str,
    dao_name: &str,
    current: f64,
    previous: f64,
    token_symbol: &str,
) -> DaoUpdate {
    let analysis = analyze_treasury_change(current, previous, token_symbol);
    DaoUpdate {
        id: format!("treasury_{dao_slug}"),
        dao_slug: dao_slug.to_string(),
        dao_name: dao_name.to_string(),
        title: format!("Treasury {}", analysis.details.direction),
        description: analysis.summary.clone(),
        priority: analysis.priority,
        category: Category::Treasury,
        timestamp: Utc::now(),
        metadata: json!({ "treasury_change": analysis }),
        actions: Vec::new(),
    }
}

/// Urgent first, then important, then fyi; newest first within a priority
pub fn sort_updates(updates: &mut [DaoUpdate]) {
    updates.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
}

pub struct UpdatesAgent<D, L> {
    source: Arc<D>,
    llm: Arc<L>,
}

impl<D: GovernanceData, L: LanguageModel> UpdatesAgent<D, L> {
    pub fn new(source: Arc<D>, llm: Arc<L>) -> Self {
        Self { source, llm }
    }

    async fn analyze_proposal_impact(&self, proposal: &Proposal) -> ImpactAnalysis {
        let prompt = format!(
            "Analyze this governance proposal and determine its impact:\n\n\
             Proposal Title: {}\n\
             Description: {}\n\n\
             Please provide:\n\
             1. A brief summary of potential impact\n\
             2. Key areas affected\n\
             3. Risk level (low/medium/high) based on scope and complexity\n\n\
             Format your response exactly as follows:\n\
             Summary: [your summary]\n\
             Areas: [comma-separated list of affected areas]\n\
             Risk: [low/medium/high]\n",
            proposal.metadata.title, proposal.metadata.description
        );

        match self.llm.complete(&prompt).await {
            Ok(reply) => ImpactAnalysis::parse(&reply).unwrap_or_else(|| {
                warn!(proposal_id = %proposal.id, "Unparseable impact analysis reply");
                ImpactAnalysis::unavailable()
            }),
            Err(e) => {
                error!(proposal_id = %proposal.id, error = %e, "Error analyzing proposal impact");
                ImpactAnalysis::unavailable()
            }
        }
    }

    fn proposal_update(
        &self,
        org: &Organization,
        proposal: &Proposal,
        impact: ImpactAnalysis,
        holdings: &TokenHoldings,
    ) -> DaoUpdate {
        let holds_governance_token = org.token_ids.iter().any(|token_id| {
            holdings
                .keys()
                .any(|held| held.eq_ignore_ascii_case(token_id))
        });
        let voting_ends = proposal
            .end
            .as_ref()
            .and_then(|end| end.timestamp.clone());

        DaoUpdate {
            id: format!("prop_{}", proposal.id),
            dao_slug: org.slug.clone(),
            dao_name: org.name.clone(),
            title: proposal.metadata.title.clone(),
            description: impact.summary.clone(),
            priority: impact.risk_level.priority(),
            category: Category::Proposal,
            timestamp: Utc::now(),
            metadata: json!({
                "proposal_id": proposal.id,
                "proposal_title": proposal.metadata.title,
                "proposal_status": proposal.status,
                "voting_ends": voting_ends,
                "impact_analysis": impact,
                "holds_governance_token": holds_governance_token,
            }),
            actions: vec![
                UpdateAction::view_proposal(&org.slug, &proposal.id),
                UpdateAction::vote(&org.slug, &proposal.id),
            ],
        }
    }

    /// Curated feed for one DAO: one entry per active proposal
    #[instrument(name = "updates_for_dao", skip(self, holdings))]
    pub async fn get_dao_updates(
        &self,
        dao_slug: &str,
        holdings: &TokenHoldings,
    ) -> Vec<DaoUpdate> {
        let Some(org) = self.source.get_organization(dao_slug).await else {
            error!(dao_slug = %dao_slug, "Failed to fetch data for DAO");
            return Vec::new();
        };

        let proposals = self.source.get_proposals(&org.id, true).await;
        let mut updates = Vec::with_capacity(proposals.len());
        for proposal in &proposals {
            let impact = self.analyze_proposal_impact(proposal).await;
            updates.push(self.proposal_update(&org, proposal, impact, holdings));
        }

        sort_updates(&mut updates);
        info!(dao_slug = %dao_slug, count = updates.len(), "Built DAO updates");
        updates
    }

    /// Merged, sorted feed across several DAOs
    #[instrument(name = "updates", skip(self, holdings))]
    pub async fn get_updates(
        &self,
        dao_slugs: &[String],
        holdings: &TokenHoldings,
    ) -> Vec<DaoUpdate> {
        let mut updates: Vec<DaoUpdate> = join_all(
            dao_slugs
                .iter()
                .map(|slug| self.get_dao_updates(slug, holdings)),
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        sort_updates(&mut updates);
        updates
    }
}

use crate::{
    format::{format_count, format_count_str},
    governance::GovernanceData,
    involvement::CuratedDao,
    llm::LanguageModel,
    updates::UpdateAction,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tally::{Organization, ProposalStatus};
use tracing::{error, info, instrument, warn};
use utils::errors::ASSISTANT_UNAVAILABLE;

const TOP_DELEGATES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    ProposalAnalysis,
    DelegateRecommendations,
    TreasuryAnalysis,
    General,
}

impl Intent {
    /// The classifier answers with a category number, anything else is general
    pub fn from_reply(reply: &str) -> Self {
        match reply.trim().chars().find(|c| !c.is_whitespace()) {
            Some('1') => Intent::ProposalAnalysis,
            Some('2') => Intent::DelegateRecommendations,
            Some('3') => Intent::TreasuryAnalysis,
            _ => Intent::General,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<UpdateAction>,
}

impl AgentResponse {
    fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            action: None,
        }
    }
}

pub struct DaoAssistant<D, L> {
    source: Arc<D>,
    llm: Arc<L>,
    daos: Vec<CuratedDao>,
}

impl<D: GovernanceData, L: LanguageModel> DaoAssistant<D, L> {
    pub fn new(source: Arc<D>, llm: Arc<L>, daos: Vec<CuratedDao>) -> Self {
        Self { source, llm, daos }
    }

    async fn ask(&self, operation: &str, prompt: &str) -> Option<String> {
        match self.llm.complete(prompt).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                error!(operation = %operation, error = %e, "Language model call failed");
                None
            }
        }
    }

    async fn classify(&self, message: &str) -> Intent {
        let prompt = format!(
            "Determine what the user is asking about from these categories:\n\
             1. Proposal Analysis\n\
             2. Delegate Recommendations\n\
             3. Treasury Analysis\n\
             4. Other/General Question\n\n\
             User message: {message}\n\n\
             Format: Return just the category number (1-4)"
        );

        match self.ask("classify_intent", &prompt).await {
            Some(reply) => Intent::from_reply(&reply),
            None => {
                warn!("Intent classification unavailable, answering generally");
                Intent::General
            }
        }
    }

    /// First known DAO slug mentioned in the message
    pub fn mentioned_dao(&self, message: &str) -> Option<&CuratedDao> {
        let lowered = message.to_lowercase();
        self.daos.iter().find(|dao| lowered.contains(&dao.slug))
    }

    #[instrument(name = "assistant_chat", skip(self, message))]
    pub async fn chat(&self, message: &str, address: &str) -> AgentResponse {
        let intent = self.classify(message).await;
        info!(address = %address, intent = ?intent, "Classified chat message");

        let Some(dao) = self.mentioned_dao(message) else {
            return self.general_answer(message).await;
        };

        match intent {
            Intent::ProposalAnalysis => self.proposal_analysis(&dao.slug).await,
            Intent::DelegateRecommendations => self.delegate_recommendations(&dao.slug).await,
            Intent::TreasuryAnalysis => self.treasury_analysis(&dao.slug).await,
            Intent::General => self.general_answer(message).await,
        }
    }

    async fn organization(&self, slug: &str) -> Result<Organization, AgentResponse> {
        self.source
            .get_organization(slug)
            .await
            .ok_or_else(|| AgentResponse::text("Could not fetch DAO data."))
    }

    async fn proposal_analysis(&self, slug: &str) -> AgentResponse {
        let org = match self.organization(slug).await {
            Ok(org) => org,
            Err(response) => return response,
        };

        let proposals = self.source.get_proposals(&org.id, false).await;
        let Some(proposal) = proposals
            .iter()
            .find(|p| p.status == ProposalStatus::Active)
            .or_else(|| proposals.first())
        else {
            return AgentResponse::text(format!("No proposals found for {}.", org.name));
        };

        let prompt = format!(
            "Analyze this DAO proposal for {slug}:\n\n\
             Title: {}\n\
             Description: {}\n\
             Status: {}\n\n\
             Provide:\n\
             1. Summary of the proposal\n\
             2. Main implications (technical, financial, governance)\n\
             3. Potential risks and benefits\n\
             4. Simple explanation (ELI5)",
            proposal.metadata.title, proposal.metadata.description, proposal.status
        );

        let action = if proposal.status == ProposalStatus::Active {
            UpdateAction::vote(slug, &proposal.id)
        } else {
            UpdateAction::view_proposal(slug, &proposal.id)
        };

        match self.ask("proposal_analysis", &prompt).await {
            Some(message) => AgentResponse {
                message,
                action: Some(action),
            },
            None => AgentResponse::text(ASSISTANT_UNAVAILABLE),
        }
    }

    async fn delegate_recommendations(&self, slug: &str) -> AgentResponse {
        let org = match self.organization(slug).await {
            Ok(org) => org,
            Err(response) => return response,
        };

        let delegates = self.source.list_delegates(&org.id, TOP_DELEGATES).await;
        if delegates.is_empty() {
            return AgentResponse::text(format!("No delegate data available for {}.", org.name));
        }

        let listing = delegates
            .iter()
            .map(|d| {
                let who = d
                    .account
                    .ens_name()
                    .or_else(|| d.account.display_name())
                    .unwrap_or(&d.account.address);
                let seeking = d
                    .statement
                    .as_ref()
                    .is_some_and(|s| s.is_seeking_delegation);
                format!(
                    "- {who}: {} votes, {} delegators{}",
                    format_count_str(&d.votes_count),
                    format_count(u128::from(d.delegators_count)),
                    if seeking { ", seeking delegation" } else { "" }
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Analyze these delegates for {slug}:\n\n\
             {listing}\n\n\
             Provide:\n\
             1. Top 3 delegates based on:\n\
                - Active participation\n\
                - Voting power\n\
                - Number of delegators\n\
             2. Brief analysis of their voting patterns\n\
             3. Recommendation for different voter profiles (active vs passive)"
        );

        match self.ask("delegate_recommendations", &prompt).await {
            Some(message) => AgentResponse {
                message,
                action: Some(UpdateAction::delegate(slug)),
            },
            None => AgentResponse::text(ASSISTANT_UNAVAILABLE),
        }
    }

    async fn treasury_analysis(&self, slug: &str) -> AgentResponse {
        let org = match self.organization(slug).await {
            Ok(org) => org,
            Err(response) => return response,
        };

        let prompt = format!(
            "Analyze the treasury data for {slug}:\n\n\
             Name: {}\n\
             Chains: {}\n\
             Governance tokens: {}\n\
             Token holders: {}\n\
             Delegates: {}\n\
             Proposals: {}\n\
             Active proposals: {}\n\n\
             Provide:\n\
             1. Current treasury breakdown\n\
             2. Recent significant movements\n\
             3. Key observations and recommendations\n\
             4. Simple explanation of the treasury state",
            org.name,
            org.chain_ids.join(", "),
            org.token_ids.join(", "),
            format_count(u128::from(org.token_owners_count)),
            format_count(u128::from(org.delegates_count)),
            format_count(u128::from(org.proposals_count)),
            if org.has_active_proposals { "yes" } else { "no" },
        );

        match self.ask("treasury_analysis", &prompt).await {
            Some(message) => AgentResponse::text(message),
            None => AgentResponse::text(ASSISTANT_UNAVAILABLE),
        }
    }

    async fn general_answer(&self, message: &str) -> AgentResponse {
        let known = self
            .daos
            .iter()
            .map(|dao| format!("- {}: {}", dao.slug, dao.description))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "You are a DAO governance assistant focused on these Base DAOs:\n\
             {known}\n\n\
             User question: {message}\n\n\
             Provide a helpful response focused on governance aspects and always mention \
             if an action would require using the wallet for execution."
        );

        match self.ask("general_answer", &prompt).await {
            Some(reply) => AgentResponse::text(reply),
            None => AgentResponse::text(ASSISTANT_UNAVAILABLE),
        }
    }
}

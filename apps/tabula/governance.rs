use async_trait::async_trait;
use tally::{Balance, DelegateInfo, Organization, Proposal, TallyApi};

/// Read-only governance data, as served by Tally. The aggregator and the
/// agents only ever talk to this trait.
#[async_trait]
pub trait GovernanceData: Send + Sync {
    async fn get_organization(&self, slug: &str) -> Option<Organization>;

    async fn list_organizations(&self, chain_filter: Option<&str>) -> Vec<Organization>;

    async fn get_proposals(&self, organization_id: &str, active_only: bool) -> Vec<Proposal>;

    /// `None` when the wallet never delegated in this organization
    async fn get_delegate_info(
        &self,
        address: &str,
        organization_id: &str,
    ) -> Option<DelegateInfo>;

    async fn get_token_balance(&self, address: &str, token_id: &str) -> Balance;

    async fn list_delegates(&self, organization_id: &str, limit: u32) -> Vec<DelegateInfo>;
}

#[async_trait]
impl GovernanceData for TallyApi {
    async fn get_organization(&self, slug: &str) -> Option<Organization> {
        TallyApi::get_organization(self, slug).await
    }

    async fn list_organizations(&self, chain_filter: Option<&str>) -> Vec<Organization> {
        TallyApi::list_organizations(self, chain_filter).await
    }

    async fn get_proposals(&self, organization_id: &str, active_only: bool) -> Vec<Proposal> {
        TallyApi::get_proposals(self, organization_id, active_only).await
    }

    async fn get_delegate_info(
        &self,
        address: &str,
        organization_id: &str,
    ) -> Option<DelegateInfo> {
        TallyApi::get_delegate_info(self, address, organization_id).await
    }

    async fn get_token_balance(&self, address: &str, token_id: &str) -> Balance {
        TallyApi::get_token_balance(self, address, token_id).await
    }

    async fn list_delegates(&self, organization_id: &str, limit: u32) -> Vec<DelegateInfo> {
        TallyApi::list_delegates(self, organization_id, limit).await
    }
}

use crate::{
    assistant::{AgentResponse, DaoAssistant},
    governance::GovernanceData,
    involvement::{
        ActiveDelegation, DaoCandidate, DaoOverview, PotentialDao, UserInfo, WalletManager,
        recommend,
    },
    llm::LanguageModel,
    updates::{DaoUpdate, TokenHoldings, UpdatesAgent},
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{future::Future, sync::Arc};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

const RECOMMENDED_LIMIT: usize = 3;

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap());

/// `0x` followed by 40 hex digits
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_RE.is_match(address)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),
    #[error("DAO {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidAddress(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

pub struct AppState<D, L> {
    pub wallet: Arc<WalletManager<D>>,
    pub updates: Arc<UpdatesAgent<D, L>>,
    pub assistant: Arc<DaoAssistant<D, L>>,
}

impl<D, L> Clone for AppState<D, L> {
    fn clone(&self) -> Self {
        Self {
            wallet: self.wallet.clone(),
            updates: self.updates.clone(),
            assistant: self.assistant.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DelegationsResponse {
    pub active_delegations: Vec<ActiveDelegation>,
    pub potential_daos: Vec<PotentialDao>,
    pub recommended_delegations: Vec<PotentialDao>,
    pub user_info: UserInfo,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatesRequest {
    pub dao_slugs: Vec<String>,
    #[serde(default)]
    pub token_holdings: TokenHoldings,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct DaosQuery {
    pub chain_id: Option<String>,
}

pub fn router<D, L>(state: AppState<D, L>) -> Router
where
    D: GovernanceData + 'static,
    L: LanguageModel + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/api/delegations/{address}", get(get_delegations::<D, L>))
        .route("/api/updates", post(post_updates::<D, L>))
        .route("/api/chat", post(post_chat::<D, L>))
        .route("/api/daos", get(list_daos::<D, L>))
        .route("/api/daos/{slug}", get(get_dao::<D, L>))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Runs request work on its own task so a panic becomes a 500 instead of a
/// dropped connection.
async fn isolated<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("request handler failed: {e}")))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn get_delegations<D, L>(
    State(state): State<AppState<D, L>>,
    Path(address): Path<String>,
) -> Result<Json<DelegationsResponse>, ApiError>
where
    D: GovernanceData + 'static,
    L: LanguageModel + 'static,
{
    info!(address = %address, "Received delegations request");
    if !is_valid_address(&address) {
        warn!(address = %address, "Rejecting malformed wallet address");
        return Err(ApiError::InvalidAddress(address));
    }

    let wallet = state.wallet.clone();
    let result = isolated(async move { wallet.get_dao_involvement(&address).await }).await?;

    let recommended_delegations = recommend(&result.potential_daos, RECOMMENDED_LIMIT);
    Ok(Json(DelegationsResponse {
        active_delegations: result.active_delegations,
        potential_daos: result.potential_daos,
        recommended_delegations,
        user_info: result.user_info,
        error: result.error,
    }))
}

async fn post_updates<D, L>(
    State(state): State<AppState<D, L>>,
    Json(request): Json<UpdatesRequest>,
) -> Result<Json<Vec<DaoUpdate>>, ApiError>
where
    D: GovernanceData + 'static,
    L: LanguageModel + 'static,
{
    info!(daos = request.dao_slugs.len(), "Received updates request");
    let agent = state.updates.clone();
    let updates = isolated(async move {
        agent
            .get_updates(&request.dao_slugs, &request.token_holdings)
            .await
    })
    .await?;
    Ok(Json(updates))
}

async fn post_chat<D, L>(
    State(state): State<AppState<D, L>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<AgentResponse>, ApiError>
where
    D: GovernanceData + 'static,
    L: LanguageModel + 'static,
{
    info!(address = %request.address, "Processing chat request");
    let assistant = state.assistant.clone();
    let response = isolated(async move {
        assistant
            .chat(&request.message, &request.address)
            .await
    })
    .await?;

    if let Some(action) = &response.action {
        info!(label = %action.label, url = %action.url, "Generated action");
    }
    Ok(Json(response))
}

async fn list_daos<D, L>(
    State(state): State<AppState<D, L>>,
    Query(query): Query<DaosQuery>,
) -> Result<Json<Vec<DaoCandidate>>, ApiError>
where
    D: GovernanceData + 'static,
    L: LanguageModel + 'static,
{
    let wallet = state.wallet.clone();
    let candidates = isolated(async move { wallet.candidates().await }).await?;
    let candidates = match query.chain_id.as_deref() {
        Some(chain_id) => WalletManager::<D>::filter_by_chain(candidates, chain_id),
        None => candidates,
    };
    Ok(Json(candidates))
}

async fn get_dao<D, L>(
    State(state): State<AppState<D, L>>,
    Path(slug): Path<String>,
) -> Result<Json<DaoOverview>, ApiError>
where
    D: GovernanceData + 'static,
    L: LanguageModel + 'static,
{
    let wallet = state.wallet.clone();
    let lookup_slug = slug.clone();
    isolated(async move { wallet.get_dao_overview(&lookup_slug).await })
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(slug))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        governance::fake::{FakeGovernance, balance, organization},
        involvement::{InvolvementConfig, default_curated_daos},
        llm::fake::ScriptedModel,
    };
    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use tower::ServiceExt;

    const WALLET: &str = "0x8F9DF4115ac301d0e7dd087c270C2282fC7336ab";

    fn app(fake: FakeGovernance, llm: ScriptedModel) -> Router {
        app_over(Arc::new(fake), llm)
    }

    fn app_over(source: Arc<FakeGovernance>, llm: ScriptedModel) -> Router {
        let llm = Arc::new(llm);
        router(AppState {
            wallet: Arc::new(WalletManager::new(
                source.clone(),
                InvolvementConfig::default(),
            )),
            updates: Arc::new(UpdatesAgent::new(source.clone(), llm.clone())),
            assistant: Arc::new(DaoAssistant::new(source, llm, default_curated_daos())),
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address(WALLET));
        assert!(!is_valid_address("0xinvalid"));
        assert!(!is_valid_address("8F9DF4115ac301d0e7dd087c270C2282fC7336ab"));
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(FakeGovernance::default(), ScriptedModel::default())
            .oneshot(get("/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn test_invalid_address_is_rejected_with_detail() {
        let fake = Arc::new(FakeGovernance::default());
        let response = app_over(fake.clone(), ScriptedModel::default())
            .oneshot(get("/api/delegations/0xinvalid"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("0xinvalid"));
        assert_eq!(fake.lookups(), 0);
    }

    #[tokio::test]
    async fn test_delegations_with_recommendations() {
        let orgs: Vec<_> = [
            ("1", "a-dao", 5),
            ("2", "b-dao", 40),
            ("3", "c-dao", 20),
            ("4", "d-dao", 1),
        ]
        .into_iter()
        .map(|(id, slug, proposals)| organization(id, slug, slug, 100, proposals))
        .collect();
        let mut fake = FakeGovernance {
            organizations: orgs.clone(),
            ..Default::default()
        };
        for org in &orgs {
            let token_id = &org.token_ids[0];
            fake.balances
                .insert(token_id.clone(), balance(token_id, "7", "GOV"));
        }

        let response = app(fake, ScriptedModel::default())
            .oneshot(get(&format!("/api/delegations/{WALLET}")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["potential_daos"].as_array().unwrap().len(), 4);
        let recommended: Vec<&str> = body["recommended_delegations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["dao_slug"].as_str().unwrap())
            .collect();
        assert_eq!(recommended, vec!["b-dao", "c-dao", "a-dao"]);
        assert_eq!(body["user_info"]["address"], json!(WALLET));
        assert_eq!(body["error"], Value::Null);
    }

    #[tokio::test]
    async fn test_unknown_dao_is_404() {
        let response = app(FakeGovernance::default(), ScriptedModel::default())
            .oneshot(get("/api/daos/nope"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["detail"], json!("DAO nope not found"));
    }

    #[tokio::test]
    async fn test_list_daos_by_chain() {
        let mut arbitrum = organization("1", "wormhole", "Wormhole", 100, 20);
        arbitrum.chain_ids = vec![tally::ARBITRUM_CHAIN_ID.to_string()];
        let fake = FakeGovernance {
            organizations: vec![arbitrum, organization("2", "gloom", "Gloom", 100, 20)],
            ..Default::default()
        };

        let response = app(fake, ScriptedModel::default())
            .oneshot(get("/api/daos?chain_id=eip155:8453"))
            .await
            .unwrap();

        let body = body_json(response).await;
        let slugs: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["slug"].as_str().unwrap())
            .collect();
        assert_eq!(slugs, vec!["gloom"]);
    }

    #[tokio::test]
    async fn test_chat() {
        let response = app(
            FakeGovernance::default(),
            ScriptedModel::replying(&["4", "Delegation lends your voting power."]),
        )
        .oneshot(post_json(
            "/api/chat",
            json!({"message": "What is delegation?", "address": WALLET}),
        ))
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"message": "Delegation lends your voting power."})
        );
    }

    #[tokio::test]
    async fn test_updates_for_unknown_daos_is_empty() {
        let response = app(FakeGovernance::default(), ScriptedModel::default())
            .oneshot(post_json("/api/updates", json!({"dao_slugs": ["nope"]})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }
}

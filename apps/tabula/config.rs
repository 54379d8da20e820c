use crate::{
    involvement::{CandidateSource, InvolvementConfig},
    llm::LlmConfig,
};
use serde::de::DeserializeOwned;
use std::{env, fmt::Display, str::FromStr, time::Duration};
use tally::TallyConfig;
use thiserror::Error;
use tracing::{info, warn};
use utils::errors::{OPENAI_API_KEY_NOT_SET, TALLY_API_KEY_NOT_SET};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub tally: TallyConfig,
    pub llm: LlmConfig,
    pub involvement: InvolvementConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Required keys fail, optional
    /// overrides that do not parse are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str, missing: &'static str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(missing))
        };

        let tally_key = required("TALLY_API_KEY", TALLY_API_KEY_NOT_SET)?;
        let openai_key = required("OPENAI_API_KEY", OPENAI_API_KEY_NOT_SET)?;

        let mut config = Self {
            tally: TallyConfig::new(tally_key),
            llm: LlmConfig::new(openai_key),
            involvement: InvolvementConfig::default(),
            server: ServerConfig::default(),
        };

        apply_env_overrides(&mut config, &lookup);

        info!(
            tally_endpoint = %config.tally.endpoint,
            model = %config.llm.model,
            candidate_source = ?config.involvement.candidate_source,
            major_daos = config.involvement.major_daos.len(),
            max_concurrency = config.involvement.max_concurrency,
            retry_attempts = config.llm.retry.max_attempts,
            "Tabula config loaded"
        );

        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_override<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key)?;
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(error = %err, "Failed to parse {key} override");
            None
        }
    }
}

fn json_override<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: DeserializeOwned,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key)?;
    match serde_json::from_str::<T>(&value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(error = %err, "Failed to parse {key} override");
            None
        }
    }
}

fn apply_env_overrides<F>(config: &mut AppConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(endpoint) = lookup("TALLY_ENDPOINT") {
        config.tally.endpoint = endpoint;
    }
    if let Some(secs) = parse_override::<u64, _>(lookup, "TALLY_TIMEOUT_SECS") {
        config.tally.timeout = Duration::from_secs(secs);
    }

    if let Some(endpoint) = lookup("OPENAI_ENDPOINT") {
        config.llm.endpoint = endpoint;
    }
    if let Some(model) = lookup("OPENAI_MODEL") {
        config.llm.model = model;
    }

    if let Some(host) = lookup("TABULA_HOST") {
        config.server.host = host;
    }
    if let Some(port) = parse_override::<u16, _>(lookup, "TABULA_PORT") {
        config.server.port = port;
    }

    let involvement = &mut config.involvement;
    if let Some(source) = parse_override::<CandidateSource, _>(lookup, "TABULA_CANDIDATE_SOURCE") {
        involvement.candidate_source = source;
    }
    if let Some(major) = json_override::<Vec<String>, _>(lookup, "TABULA_MAJOR_DAOS") {
        involvement.major_daos = major;
    }
    if let Some(keywords) = json_override::<Vec<String>, _>(lookup, "TABULA_EXCLUDE_KEYWORDS") {
        involvement.exclude_keywords = keywords;
    }
    if let Some(chain_ids) = json_override::<Vec<String>, _>(lookup, "TABULA_CHAIN_IDS") {
        involvement.chain_ids = chain_ids;
    }
    if let Some(min) = parse_override::<u64, _>(lookup, "TABULA_MIN_DELEGATES") {
        involvement.min_delegates = min;
    }
    if let Some(min) = parse_override::<u64, _>(lookup, "TABULA_MIN_PROPOSALS") {
        involvement.min_proposals = min;
    }
    if let Some(limit) = parse_override::<usize, _>(lookup, "TABULA_MAX_CONCURRENCY") {
        involvement.max_concurrency = limit.max(1);
    }

    let retry = &mut config.llm.retry;
    if let Some(attempts) = parse_override::<u32, _>(lookup, "TABULA_RETRY_MAX_ATTEMPTS") {
        retry.max_attempts = attempts.max(1);
    }
    if let Some(ms) = parse_override::<u64, _>(lookup, "TABULA_RETRY_BASE_DELAY_MS") {
        retry.base_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = parse_override::<u64, _>(lookup, "TABULA_RETRY_MAX_DELAY_MS") {
        retry.max_delay = Duration::from_millis(ms);
    }
}

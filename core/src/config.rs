//! Process settings.
//!
//! Read once at startup and handed to constructors; nothing here is global.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::Level;

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub api_base: Option<String>,
    pub resolver_model: String,
    pub answer_model: String,
    /// Deadline for each completion call. Calls are never retried.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub timeout: Duration,
    /// Serialize dispatch calls for services that allow one call chain at a time.
    pub exclusive: bool,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub llm: LlmSettings,
    pub backend: BackendSettings,
    pub bind_addr: String,
    pub log_level: Level,
}

impl Settings {
    /// Loads from the process environment, seeded from `.env` when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?;
        let backend_timeout = parse_secs(get("BACKEND_TIMEOUT_SECS"), "BACKEND_TIMEOUT_SECS", 30)?;
        let llm_timeout = parse_secs(get("LLM_TIMEOUT_SECS"), "LLM_TIMEOUT_SECS", 60)?;
        let exclusive = match get("BACKEND_EXCLUSIVE") {
            Some(raw) => parse_flag(&raw)
                .with_context(|| format!("BACKEND_EXCLUSIVE is not a boolean: '{raw}'"))?,
            None => false,
        };
        let log_level = match get("LOG_LEVEL") {
            Some(raw) => raw
                .trim()
                .parse::<Level>()
                .map_err(|_| anyhow::anyhow!("LOG_LEVEL is not a log level: '{raw}'"))?,
            None => Level::INFO,
        };

        Ok(Self {
            llm: LlmSettings {
                api_key,
                api_base: get("OPENAI_API_BASE"),
                resolver_model: get("RESOLVER_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
                answer_model: get("ANSWER_MODEL").unwrap_or_else(|| "gpt-4o".to_string()),
                timeout: llm_timeout,
            },
            backend: BackendSettings {
                base_url: get("BACKEND_URL")
                    .unwrap_or_else(|| "http://127.0.0.1:5000".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                timeout: backend_timeout,
                exclusive,
            },
            bind_addr: get("GATEWAY_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            log_level,
        })
    }
}

fn parse_secs(raw: Option<String>, key: &str, default: u64) -> Result<Duration> {
    let secs = match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key} is not a number: '{raw}'"))?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

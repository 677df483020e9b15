use crate::core::token::{
    Anonymous, ApiKeyAuth, BasicAuth, ClientCredentials, StaticToken, TokenManager,
};
use crate::domain::ports::{ConfigProvider, TokenSource};
use crate::utils::error::{RelayError, Result};
use crate::utils::validation::Validate;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Serialize, Deserialize, Parser)]
#[command(name = "token-relay")]
#[command(about = "A small token-refreshing HTTP API client")]
pub struct CliConfig {
    #[arg(long, default_value = "https://jsonplaceholder.typicode.com")]
    pub base_url: String,

    /// Request path, e.g. /posts/1
    #[arg(long, default_value = "/posts")]
    pub path: String,

    #[arg(long, default_value = "GET")]
    pub method: String,

    /// JSON body for POST/PATCH
    #[arg(long)]
    pub body: Option<String>,

    /// OAuth2 token endpoint (client-credentials grant)
    #[arg(long)]
    pub token_url: Option<String>,

    #[arg(long)]
    pub client_id: Option<String>,

    #[arg(long)]
    pub client_secret: Option<String>,

    #[arg(long)]
    pub scope: Option<String>,

    /// Pre-issued bearer token (no refresh)
    #[arg(long)]
    pub api_token: Option<String>,

    /// API key sent as X-Api-Key
    #[arg(long)]
    pub api_key: Option<String>,

    /// Basic auth as user:password
    #[arg(long)]
    pub basic: Option<String>,

    #[arg(long, default_value = "30")]
    pub timeout_seconds: u64,

    #[arg(long, default_value = "3")]
    pub max_retries: u32,

    /// Output format: json or csv
    #[arg(long, default_value = "json")]
    pub output: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Enable system monitoring")]
    pub monitor: bool,
}

// 手寫 Debug：憑證欄位一律遮蔽，避免 debug 日誌外洩
impl std::fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliConfig")
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("method", &self.method)
            .field("body", &self.body)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "***"))
            .field("scope", &self.scope)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("basic", &self.basic.as_ref().map(|_| "***"))
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_retries", &self.max_retries)
            .field("output", &self.output)
            .field("verbose", &self.verbose)
            .field("monitor", &self.monitor)
            .finish()
    }
}

impl CliConfig {
    /// 依旗標組合建立 TokenSource；client-credentials 優先
    pub fn token_source(&self) -> Result<Arc<dyn TokenSource>> {
        if let Some(token_url) = &self.token_url {
            let client_id = crate::utils::validation::validate_required_field(
                "client_id",
                &self.client_id,
            )?;
            let client_secret = crate::utils::validation::validate_required_field(
                "client_secret",
                &self.client_secret,
            )?;
            return Ok(Arc::new(TokenManager::new(ClientCredentials {
                token_url: token_url.clone(),
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                scope: self.scope.clone(),
            })));
        }

        if let Some(token) = &self.api_token {
            return Ok(Arc::new(StaticToken::new(token.clone())));
        }

        if let Some(key) = &self.api_key {
            return Ok(Arc::new(ApiKeyAuth::new(key.clone())));
        }

        if let Some(basic) = &self.basic {
            let (username, password) =
                basic
                    .split_once(':')
                    .ok_or_else(|| RelayError::InvalidConfigValueError {
                        field: "basic".to_string(),
                        value: basic.clone(),
                        reason: "Expected user:password".to_string(),
                    })?;
            return Ok(Arc::new(BasicAuth::new(username, password)));
        }

        Ok(Arc::new(Anonymous))
    }
}

impl ConfigProvider for CliConfig {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn retry_delay_ms(&self) -> u64 {
        250
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        crate::utils::validation::validate_url("base_url", &self.base_url)?;
        crate::utils::validation::validate_http_method("method", &self.method)?;
        crate::utils::validation::validate_range("timeout_seconds", self.timeout_seconds, 1, 600)?;

        if let Some(token_url) = &self.token_url {
            crate::utils::validation::validate_url("token_url", token_url)?;
        }

        match self.output.as_str() {
            "json" | "csv" => {}
            other => {
                return Err(RelayError::InvalidConfigValueError {
                    field: "output".to_string(),
                    value: other.to_string(),
                    reason: "Supported formats: json, csv".to_string(),
                });
            }
        }

        Ok(())
    }
}

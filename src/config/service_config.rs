use crate::core::endpoint::EndpointDef;
use crate::core::retry::RetryPolicy;
use crate::core::token::{
    Anonymous, ApiKeyAuth, BasicAuth, ClientCredentials, StaticToken, TokenManager,
};
use crate::domain::ports::{ConfigProvider, TokenSource};
use crate::utils::error::{RelayError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub service: ServiceInfo,
    pub auth: Option<AuthConfig>,
    pub retry: Option<RetryPolicy>,
    pub monitoring: Option<MonitoringConfig>,
    pub endpoints: Vec<EndpointDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub description: Option<String>,
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
}

/// 授權設定；type 決定哪些欄位是必填
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub r#type: String, // "client-credentials", "bearer", "api-key", "basic", "none"
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    pub token: Option<String>,
    pub api_key: Option<String>,
    pub header: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

impl ServiceConfig {
    /// 從 TOML 檔案載入服務配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RelayError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析服務配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RelayError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CLIENT_SECRET})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").unwrap();

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        crate::utils::validation::validate_non_empty_string("service.name", &self.service.name)?;
        crate::utils::validation::validate_url("service.base_url", &self.service.base_url)?;

        if let Some(timeout) = self.service.timeout_seconds {
            crate::utils::validation::validate_range("service.timeout_seconds", timeout, 1, 600)?;
        }

        if let Some(auth) = &self.auth {
            self.validate_auth(auth)?;
        }

        if let Some(retry) = &self.retry {
            crate::utils::validation::validate_range("retry.max_retries", retry.max_retries, 0, 10)?;
        }

        // 端點名稱必須唯一且非空
        let mut seen = std::collections::HashSet::new();
        for endpoint in &self.endpoints {
            crate::utils::validation::validate_non_empty_string("endpoints.name", &endpoint.name)?;
            if !seen.insert(endpoint.name.clone()) {
                return Err(RelayError::ConfigValidationError {
                    field: "endpoints".to_string(),
                    message: format!("Duplicate endpoint name: '{}'", endpoint.name),
                });
            }

            if let Some(method) = &endpoint.method {
                crate::utils::validation::validate_http_method(
                    &format!("endpoints.{}.method", endpoint.name),
                    method,
                )?;
            }

            if let Some(timeout) = endpoint.timeout_seconds {
                crate::utils::validation::validate_range(
                    &format!("endpoints.{}.timeout_seconds", endpoint.name),
                    timeout,
                    1,
                    600,
                )?;
            }
        }

        Ok(())
    }

    fn validate_auth(&self, auth: &AuthConfig) -> Result<()> {
        match auth.r#type.as_str() {
            "client-credentials" => {
                let token_url =
                    crate::utils::validation::validate_required_field("auth.token_url", &auth.token_url)?;
                crate::utils::validation::validate_url("auth.token_url", token_url)?;
                crate::utils::validation::validate_required_field("auth.client_id", &auth.client_id)?;
                crate::utils::validation::validate_required_field(
                    "auth.client_secret",
                    &auth.client_secret,
                )?;
                Ok(())
            }
            "bearer" => {
                crate::utils::validation::validate_required_field("auth.token", &auth.token)?;
                Ok(())
            }
            "api-key" => {
                crate::utils::validation::validate_required_field("auth.api_key", &auth.api_key)?;
                Ok(())
            }
            "basic" => {
                crate::utils::validation::validate_required_field("auth.username", &auth.username)?;
                crate::utils::validation::validate_required_field("auth.password", &auth.password)?;
                Ok(())
            }
            "none" => Ok(()),
            other => Err(RelayError::InvalidConfigValueError {
                field: "auth.type".to_string(),
                value: other.to_string(),
                reason: "Supported types: client-credentials, bearer, api-key, basic, none"
                    .to_string(),
            }),
        }
    }

    /// 依授權設定建立 TokenSource
    pub fn token_source(&self) -> Result<Arc<dyn TokenSource>> {
        let Some(auth) = &self.auth else {
            return Ok(Arc::new(Anonymous));
        };

        match auth.r#type.as_str() {
            "client-credentials" => {
                let credentials = ClientCredentials {
                    token_url: auth.token_url.clone().ok_or_else(|| {
                        RelayError::MissingConfigError {
                            field: "auth.token_url".to_string(),
                        }
                    })?,
                    client_id: auth.client_id.clone().ok_or_else(|| {
                        RelayError::MissingConfigError {
                            field: "auth.client_id".to_string(),
                        }
                    })?,
                    client_secret: auth.client_secret.clone().ok_or_else(|| {
                        RelayError::MissingConfigError {
                            field: "auth.client_secret".to_string(),
                        }
                    })?,
                    scope: auth.scope.clone(),
                };
                Ok(Arc::new(TokenManager::new(credentials)))
            }
            "bearer" => {
                let token = auth.token.clone().ok_or_else(|| RelayError::MissingConfigError {
                    field: "auth.token".to_string(),
                })?;
                Ok(Arc::new(StaticToken::new(token)))
            }
            "api-key" => {
                let key = auth.api_key.clone().ok_or_else(|| RelayError::MissingConfigError {
                    field: "auth.api_key".to_string(),
                })?;
                let mut source = ApiKeyAuth::new(key);
                if let Some(header) = &auth.header {
                    source = source.with_header(header.clone());
                }
                Ok(Arc::new(source))
            }
            "basic" => {
                let username =
                    auth.username
                        .clone()
                        .ok_or_else(|| RelayError::MissingConfigError {
                            field: "auth.username".to_string(),
                        })?;
                let password =
                    auth.password
                        .clone()
                        .ok_or_else(|| RelayError::MissingConfigError {
                            field: "auth.password".to_string(),
                        })?;
                Ok(Arc::new(BasicAuth::new(username, password)))
            }
            "none" => Ok(Arc::new(Anonymous)),
            other => Err(RelayError::InvalidConfigValueError {
                field: "auth.type".to_string(),
                value: other.to_string(),
                reason: "Supported types: client-credentials, bearer, api-key, basic, none"
                    .to_string(),
            }),
        }
    }

    /// 獲取指定名稱的端點定義
    pub fn get_endpoint(&self, name: &str) -> Option<&EndpointDef> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl ConfigProvider for ServiceConfig {
    fn base_url(&self) -> &str {
        &self.service.base_url
    }

    fn timeout_seconds(&self) -> u64 {
        self.service.timeout_seconds.unwrap_or(30)
    }

    fn max_retries(&self) -> u32 {
        self.retry.as_ref().map(|r| r.max_retries).unwrap_or(3)
    }

    fn retry_delay_ms(&self) -> u64 {
        self.retry.as_ref().map(|r| r.base_delay_ms).unwrap_or(250)
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

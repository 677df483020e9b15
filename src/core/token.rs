use crate::domain::model::AccessToken;
use crate::domain::ports::TokenSource;
use crate::utils::error::{RelayError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// 過期前的安全邊界，避免在傳輸途中剛好過期
const EXPIRY_MARGIN_SECONDS: i64 = 30;

/// client-credentials 授權所需的憑證
#[derive(Clone)]
pub struct ClientCredentials {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
}

// client_secret 不進日誌
impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    bearer: String,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + chrono::Duration::seconds(EXPIRY_MARGIN_SECONDS) < expires_at,
            // 沒有 expires_in 的 token 用到被 invalidate 為止
            None => true,
        }
    }
}

/// OAuth2 client-credentials token 管理器：
/// 向 token 端點換取 access token 並快取到過期
pub struct TokenManager {
    credentials: ClientCredentials,
    client: reqwest::Client,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(credentials: ClientCredentials) -> Self {
        Self {
            credentials,
            client: reqwest::Client::new(),
            cache: RwLock::new(None),
        }
    }

    /// 以既有 token 起始（可能已過期）；401 時照常換新
    pub fn with_initial_token(self, token: impl Into<String>) -> Self {
        Self {
            cache: RwLock::new(Some(CachedToken {
                bearer: format!("Bearer {}", token.into()),
                expires_at: None,
            })),
            ..self
        }
    }

    /// 以 grant_type=client_credentials 表單請求換取新 token
    async fn fetch_token(&self) -> Result<AccessToken> {
        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];
        if let Some(scope) = &self.credentials.scope {
            form.push(("scope", scope.as_str()));
        }

        tracing::debug!("🔑 Requesting access token from: {}", self.credentials.token_url);

        let response = self
            .client
            .post(&self.credentials.token_url)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("❌ Token endpoint returned {}: {}", status, body);
            return Err(RelayError::TokenError {
                message: format!("token endpoint returned status {}", status),
            });
        }

        let token: AccessToken = response.json().await?;
        tracing::info!(
            "🔑 Obtained access token (expires_in: {:?}s)",
            token.expires_in
        );
        Ok(token)
    }
}

#[async_trait]
impl TokenSource for TokenManager {
    async fn auth_header(&self) -> Result<Option<(String, String)>> {
        // 快取路徑：讀鎖檢查
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_fresh(Utc::now()) {
                    return Ok(Some(("Authorization".to_string(), cached.bearer.clone())));
                }
            }
        }

        // 寫鎖下重新檢查，避免並發呼叫重複換 token
        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh(Utc::now()) {
                return Ok(Some(("Authorization".to_string(), cached.bearer.clone())));
            }
        }

        let issued_at = Utc::now();
        let token = self.fetch_token().await?;
        let cached = CachedToken {
            bearer: format!("Bearer {}", token.access_token),
            expires_at: token.expires_at(issued_at),
        };
        let header = cached.bearer.clone();
        *cache = Some(cached);

        Ok(Some(("Authorization".to_string(), header)))
    }

    async fn invalidate(&self) {
        tracing::debug!("🔑 Dropping cached access token");
        *self.cache.write().await = None;
    }

    fn renewable(&self) -> bool {
        true
    }
}

/// 預先簽發的固定 bearer token，不會重新取得
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn auth_header(&self) -> Result<Option<(String, String)>> {
        Ok(Some((
            "Authorization".to_string(),
            format!("Bearer {}", self.token),
        )))
    }

    async fn invalidate(&self) {}
}

/// API key 標頭授權（預設 X-Api-Key）
pub struct ApiKeyAuth {
    header: String,
    key: String,
}

impl ApiKeyAuth {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            header: "X-Api-Key".to_string(),
            key: key.into(),
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }
}

#[async_trait]
impl TokenSource for ApiKeyAuth {
    async fn auth_header(&self) -> Result<Option<(String, String)>> {
        Ok(Some((self.header.clone(), self.key.clone())))
    }

    async fn invalidate(&self) {}
}

/// HTTP Basic 授權
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl TokenSource for BasicAuth {
    async fn auth_header(&self) -> Result<Option<(String, String)>> {
        let encoded = BASE64.encode(format!("{}:{}", self.username, self.password));
        Ok(Some((
            "Authorization".to_string(),
            format!("Basic {}", encoded),
        )))
    }

    async fn invalidate(&self) {}
}

/// 公開端點，不附授權標頭
pub struct Anonymous;

#[async_trait]
impl TokenSource for Anonymous {
    async fn auth_header(&self) -> Result<Option<(String, String)>> {
        Ok(None)
    }

    async fn invalidate(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn test_credentials(token_url: String) -> ClientCredentials {
        ClientCredentials {
            token_url,
            client_id: "relay_client".to_string(),
            client_secret: "relay_secret".to_string(),
            scope: Some("read:data".to_string()),
        }
    }

    #[tokio::test]
    async fn test_fetch_and_cache_token() {
        let server = MockServer::start();

        let token_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/oauth/token")
                .body_contains("grant_type=client_credentials")
                .body_contains("client_id=relay_client")
                .body_contains("scope=read%3Adata");
            then.status(200).json_body(serde_json::json!({
                "access_token": "token_abc",
                "token_type": "Bearer",
                "expires_in": 3600
            }));
        });

        let manager = TokenManager::new(test_credentials(server.url("/oauth/token")));

        let first = manager.auth_header().await.unwrap().unwrap();
        assert_eq!(first.0, "Authorization");
        assert_eq!(first.1, "Bearer token_abc");

        // 第二次應命中快取，token 端點只被呼叫一次
        let second = manager.auth_header().await.unwrap().unwrap();
        assert_eq!(second.1, "Bearer token_abc");
        token_mock.assert_hits(1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let server = MockServer::start();

        let token_mock = server.mock(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200).json_body(serde_json::json!({
                "access_token": "token_abc",
                "expires_in": 3600
            }));
        });

        let manager = TokenManager::new(test_credentials(server.url("/oauth/token")));

        manager.auth_header().await.unwrap();
        manager.invalidate().await;
        manager.auth_header().await.unwrap();

        token_mock.assert_hits(2);
    }

    #[tokio::test]
    async fn test_token_endpoint_failure_is_token_error() {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(401).json_body(serde_json::json!({
                "error": "invalid_client"
            }));
        });

        let manager = TokenManager::new(test_credentials(server.url("/oauth/token")));

        let result = manager.auth_header().await;
        assert!(matches!(result, Err(RelayError::TokenError { .. })));
    }

    #[test]
    fn test_cached_token_freshness_margin() {
        let now = Utc::now();

        let fresh = CachedToken {
            bearer: "Bearer x".to_string(),
            expires_at: Some(now + chrono::Duration::seconds(120)),
        };
        assert!(fresh.is_fresh(now));

        // 距離過期少於安全邊界就視為過期
        let nearly_expired = CachedToken {
            bearer: "Bearer x".to_string(),
            expires_at: Some(now + chrono::Duration::seconds(10)),
        };
        assert!(!nearly_expired.is_fresh(now));

        let long_lived = CachedToken {
            bearer: "Bearer x".to_string(),
            expires_at: None,
        };
        assert!(long_lived.is_fresh(now));
    }

    #[test]
    fn test_credentials_debug_masks_secret() {
        let credentials = test_credentials("https://auth.example.com/token".to_string());
        let rendered = format!("{:?}", credentials);
        assert!(!rendered.contains("relay_secret"));
        assert!(rendered.contains("relay_client"));
    }

    #[tokio::test]
    async fn test_basic_auth_encodes_credentials() {
        let auth = BasicAuth::new("user", "pass");
        let (name, value) = auth.auth_header().await.unwrap().unwrap();
        assert_eq!(name, "Authorization");
        assert_eq!(value, "Basic dXNlcjpwYXNz");
    }

    #[tokio::test]
    async fn test_api_key_custom_header() {
        let auth = ApiKeyAuth::new("key_123").with_header("X-Service-Key");
        let (name, value) = auth.auth_header().await.unwrap().unwrap();
        assert_eq!(name, "X-Service-Key");
        assert_eq!(value, "key_123");
    }

    #[tokio::test]
    async fn test_anonymous_has_no_header() {
        assert!(Anonymous.auth_header().await.unwrap().is_none());
    }
}

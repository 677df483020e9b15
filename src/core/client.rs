use crate::core::endpoint::EndpointDef;
use crate::core::retry::RetryPolicy;
use crate::domain::model::{ApiResponse, Record};
use crate::domain::ports::{ConfigProvider, TokenSource};
use crate::utils::error::{RelayError, Result};
use reqwest::Method;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;

/// 參數化批次呼叫之間的延遲，避免請求過於頻繁
const INTER_REQUEST_DELAY_MS: u64 = 100;

/// 錯誤訊息中保留的回應內容長度上限
const ERROR_BODY_LIMIT: usize = 200;

/// 一次請求的完整描述；401 重試時原樣重送（只換授權標頭）
#[derive(Debug, Clone)]
struct RequestPlan {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    headers: HashMap<String, String>,
    body: Option<serde_json::Value>,
    timeout: Duration,
}

/// 通用 bearer API client。
/// 每個請求附上授權標頭；遇到 401 時重新取得 token 並重試同一請求一次；
/// 逾時回傳空結果而不是錯誤。
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    token_source: Arc<dyn TokenSource>,
    default_headers: HashMap<String, String>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token_source: Arc<dyn TokenSource>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            token_source,
            default_headers: HashMap::new(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// 從配置建立 client（CLI 與 TOML 目錄共用）
    pub fn from_config<C: ConfigProvider>(config: &C, token_source: Arc<dyn TokenSource>) -> Self {
        Self::new(config.base_url().to_string(), token_source)
            .with_timeout(Duration::from_secs(config.timeout_seconds()))
            .with_retry(RetryPolicy::new(
                config.max_retries(),
                config.retry_delay_ms(),
            ))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.execute(&self.plan(Method::GET, path)).await
    }

    pub async fn get_with_params(&self, path: &str, params: &[(&str, &str)]) -> Result<ApiResponse> {
        let mut plan = self.plan(Method::GET, path);
        plan.query = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.execute(&plan).await
    }

    pub async fn post(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse> {
        let mut plan = self.plan(Method::POST, path);
        plan.body = Some(body.clone());
        self.execute(&plan).await
    }

    pub async fn patch(&self, path: &str, body: &serde_json::Value) -> Result<ApiResponse> {
        let mut plan = self.plan(Method::PATCH, path);
        plan.body = Some(body.clone());
        self.execute(&plan).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.execute(&self.plan(Method::DELETE, path)).await
    }

    /// 呼叫目錄端點：解析路徑模板、標頭模板、body 模板與逾時設定
    pub async fn call(
        &self,
        endpoint: &EndpointDef,
        params: &HashMap<String, serde_json::Value>,
    ) -> Result<ApiResponse> {
        let path = endpoint.resolve_path(params)?;
        let mut plan = self.plan(endpoint.method()?, &path);

        for (name, value) in endpoint.resolve_headers(params) {
            plan.headers.insert(name, value);
        }

        if let Some(parameters) = &endpoint.parameters {
            plan.query = parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
        }

        plan.body = endpoint.resolve_body(params)?;

        if let Some(timeout) = endpoint.timeout_seconds {
            plan.timeout = Duration::from_secs(timeout);
        }

        tracing::debug!("📡 {}: {} {}", endpoint.name, plan.method, plan.url);
        self.execute(&plan).await
    }

    /// 參數化批次呼叫：每筆輸入記錄各呼叫一次端點，回傳展平後的全部記錄
    pub async fn call_each(
        &self,
        endpoint: &EndpointDef,
        inputs: &[Record],
    ) -> Result<Vec<Record>> {
        let mut all_records = Vec::new();

        tracing::info!(
            "📡 {}: Making parameterized API calls for {} records",
            endpoint.name,
            inputs.len()
        );

        for (index, input) in inputs.iter().enumerate() {
            tracing::debug!(
                "📡 {}: API call {}/{}",
                endpoint.name,
                index + 1,
                inputs.len()
            );

            let response = self.call(endpoint, &input.data).await?;
            all_records.extend(response.records);

            if index < inputs.len() - 1 {
                tokio::time::sleep(Duration::from_millis(INTER_REQUEST_DELAY_MS)).await;
            }
        }

        tracing::info!(
            "📡 {}: Total records fetched: {}",
            endpoint.name,
            all_records.len()
        );
        Ok(all_records)
    }

    fn plan(&self, method: Method, path: &str) -> RequestPlan {
        RequestPlan {
            method,
            url: join_url(&self.base_url, path),
            query: Vec::new(),
            headers: HashMap::new(),
            body: None,
            timeout: self.timeout,
        }
    }

    /// 暫時性錯誤走退避重試，其他結果直接回傳
    async fn execute(&self, plan: &RequestPlan) -> Result<ApiResponse> {
        RetryIf::spawn(
            self.retry.strategy(),
            || self.execute_with_refresh(plan),
            |e: &RelayError| e.is_transient(),
        )
        .await
    }

    /// 401 時丟棄快取 token、重新取得並重試同一請求，最多一次
    async fn execute_with_refresh(&self, plan: &RequestPlan) -> Result<ApiResponse> {
        match self.send_once(plan).await {
            Err(RelayError::ResponseError {
                status: 401,
                message,
            }) => {
                if !self.token_source.renewable() {
                    return Err(RelayError::AuthError { message });
                }

                tracing::info!("🔑 Access token rejected, refreshing and retrying once");
                self.token_source.invalidate().await;

                match self.send_once(plan).await {
                    Err(RelayError::ResponseError {
                        status: 401,
                        message,
                    }) => {
                        tracing::error!("❌ API rejected the refreshed token");
                        Err(RelayError::AuthError { message })
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn send_once(&self, plan: &RequestPlan) -> Result<ApiResponse> {
        let mut request = self
            .client
            .request(plan.method.clone(), &plan.url)
            .timeout(plan.timeout);

        for (name, value) in &self.default_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        for (name, value) in &plan.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        if let Some((name, value)) = self.token_source.auth_header().await? {
            request = request.header(name.as_str(), value.as_str());
        }

        if !plan.query.is_empty() {
            request = request.query(&plan.query);
        }

        if let Some(body) = &plan.body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                tracing::warn!("⏱️ Request to {} timed out, returning empty result", plan.url);
                return Ok(ApiResponse::empty());
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        tracing::debug!("📡 {} {} -> {}", plan.method, plan.url, status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(RelayError::ResponseError {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) if e.is_timeout() => {
                tracing::warn!(
                    "⏱️ Reading response from {} timed out, returning empty result",
                    plan.url
                );
                return Ok(ApiResponse::empty());
            }
            Err(e) => return Err(e.into()),
        };

        // DELETE 或 204 可能沒有內容
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        Ok(ApiResponse::from_value(status.as_u16(), value))
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

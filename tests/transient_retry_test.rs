use anyhow::Result;
use httpmock::prelude::*;
use std::sync::Arc;
use token_relay::{Anonymous, ApiClient, RelayError, RetryPolicy};

/// 5xx 走退避重試，用完次數後回報最後的錯誤
#[tokio::test]
async fn test_server_error_is_retried_until_exhausted() -> Result<()> {
    let server = MockServer::start();

    let failing_mock = server.mock(|when, then| {
        when.method(GET).path("/unstable");
        then.status(503).json_body(serde_json::json!({
            "error": "service unavailable"
        }));
    });

    let client = ApiClient::new(server.base_url(), Arc::new(Anonymous))
        .with_retry(RetryPolicy::new(2, 10));

    let result = client.get("/unstable").await;

    assert!(matches!(
        result,
        Err(RelayError::ResponseError { status: 503, .. })
    ));
    // 原始請求 + 2 次重試
    failing_mock.assert_hits(3);

    Ok(())
}

/// 4xx 不是暫時性錯誤，不重試
#[tokio::test]
async fn test_client_error_is_not_retried() -> Result<()> {
    let server = MockServer::start();

    let bad_request_mock = server.mock(|when, then| {
        when.method(POST).path("/items");
        then.status(400).json_body(serde_json::json!({
            "error": "validation failed"
        }));
    });

    let client = ApiClient::new(server.base_url(), Arc::new(Anonymous))
        .with_retry(RetryPolicy::new(3, 10));

    let result = client.post("/items", &serde_json::json!({"name": ""})).await;

    assert!(matches!(
        result,
        Err(RelayError::ResponseError { status: 400, .. })
    ));
    bad_request_mock.assert_hits(1);

    Ok(())
}

/// max_retries = 0 時任何錯誤都只打一次
#[tokio::test]
async fn test_no_retry_policy() -> Result<()> {
    let server = MockServer::start();

    let failing_mock = server.mock(|when, then| {
        when.method(GET).path("/unstable");
        then.status(500);
    });

    let client =
        ApiClient::new(server.base_url(), Arc::new(Anonymous)).with_retry(RetryPolicy::none());

    let result = client.get("/unstable").await;

    assert!(result.is_err());
    failing_mock.assert_hits(1);

    Ok(())
}

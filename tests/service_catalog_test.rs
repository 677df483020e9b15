use anyhow::Result;
use httpmock::prelude::*;
use std::collections::HashMap;
use tempfile::TempDir;
use token_relay::config::service_config::ServiceConfig;
use token_relay::utils::export;
use token_relay::{ApiClient, Record};

/// 完整的目錄呼叫流程測試
/// 測試場景：
/// 1. 從 TOML 目錄載入服務與端點
/// 2. client-credentials 換取 token
/// 3. 以路徑模板呼叫參數化端點
/// 4. 標頭模板替換
#[tokio::test]
async fn test_catalog_call_with_client_credentials() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let temp_path = temp_dir.path().to_str().unwrap();

    let config_content = r#"
[service]
name = "user-directory"
description = "User directory API"
base_url = "http://localhost:8080"
timeout_seconds = 10

[service.headers]
User-Agent = "token-relay/0.1"

[auth]
type = "client-credentials"
token_url = "http://localhost:8080/v2/oauth/token"
client_id = "relay_client"
client_secret = "secret_123"
scope = "read:users"

[retry]
max_retries = 1
base_delay_ms = 50

[[endpoints]]
name = "user_list"
path = "/v2/users"
description = "List all users"

[[endpoints]]
name = "user_details"
path = "/v2/users/{id}/details"
method = "GET"

[endpoints.headers]
X-Request-Source = "relay-{{source}}"
"#;

    let config_path = format!("{}/user_directory.toml", temp_path);
    tokio::fs::write(&config_path, config_content).await?;
    let config = ServiceConfig::from_file(&config_path)?;

    // 設置 Mock Server
    let server = MockServer::start();

    let token_mock = server.mock(|when, then| {
        when.method(POST).path("/v2/oauth/token");
        then.status(200).json_body(serde_json::json!({
            "access_token": "catalog_token_555",
            "token_type": "Bearer",
            "expires_in": 7200,
            "scope": "read:users"
        }));
    });

    let users_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v2/users")
            .header("authorization", "Bearer catalog_token_555")
            .header("user-agent", "token-relay/0.1");
        then.status(200).json_body(serde_json::json!([
            {"id": 1, "username": "alice"},
            {"id": 2, "username": "bob"}
        ]));
    });

    let details_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v2/users/1/details")
            .header("authorization", "Bearer catalog_token_555")
            .header("x-request-source", "relay-integration");
        then.status(200).json_body(serde_json::json!({
            "id": 1,
            "username": "alice",
            "department": "Engineering"
        }));
    });

    // 把配置中的端點 URL 改成 mock server
    let mut config = config;
    config.service.base_url = config
        .service
        .base_url
        .replace("localhost:8080", &server.address().to_string());
    if let Some(auth) = &mut config.auth {
        auth.token_url = auth
            .token_url
            .as_ref()
            .map(|u| u.replace("localhost:8080", &server.address().to_string()));
    }

    let token_source = config.token_source()?;
    let mut client = ApiClient::from_config(&config, token_source);
    if let Some(headers) = &config.service.headers {
        for (name, value) in headers {
            client = client.with_default_header(name.clone(), value.clone());
        }
    }

    // 呼叫列表端點
    let list_endpoint = config.get_endpoint("user_list").unwrap();
    let list_response = client.call(list_endpoint, &HashMap::new()).await?;
    assert_eq!(list_response.records.len(), 2);

    // 呼叫參數化端點，帶標頭模板參數
    let details_endpoint = config.get_endpoint("user_details").unwrap();
    let mut params = HashMap::new();
    params.insert("id".to_string(), serde_json::json!(1));
    params.insert("source".to_string(), serde_json::json!("integration"));

    let details_response = client.call(details_endpoint, &params).await?;
    assert_eq!(details_response.records.len(), 1);
    assert_eq!(
        details_response.records[0].data.get("department").unwrap(),
        "Engineering"
    );

    // token 只換一次
    token_mock.assert_hits(1);
    users_mock.assert();
    details_mock.assert();

    Ok(())
}

/// 參數化批次呼叫：前一個端點的結果餵給下一個端點
#[tokio::test]
async fn test_parameterized_fan_out() -> Result<()> {
    let server = MockServer::start();

    let list_mock = server.mock(|when, then| {
        when.method(GET).path("/users");
        then.status(200).json_body(serde_json::json!([
            {"id": 1, "username": "alice"},
            {"id": 2, "username": "bob"},
            {"id": 3, "username": "charlie"}
        ]));
    });

    let details_mock_1 = server.mock(|when, then| {
        when.method(GET).path("/users/1/details");
        then.status(200)
            .json_body(serde_json::json!({"id": 1, "role": "Senior Developer"}));
    });
    let details_mock_2 = server.mock(|when, then| {
        when.method(GET).path("/users/2/details");
        then.status(200)
            .json_body(serde_json::json!({"id": 2, "role": "Manager"}));
    });
    let details_mock_3 = server.mock(|when, then| {
        when.method(GET).path("/users/3/details");
        then.status(200)
            .json_body(serde_json::json!({"id": 3, "role": "Representative"}));
    });

    let toml_content = format!(
        r#"
[service]
name = "fan-out"
base_url = "{}"

[[endpoints]]
name = "user_list"
path = "/users"

[[endpoints]]
name = "user_details"
path = "/users/{{id}}/details"
"#,
        server.base_url()
    );

    let config = ServiceConfig::from_toml_str(&toml_content)?;
    let client = ApiClient::from_config(&config, config.token_source()?);

    let list = client
        .call(config.get_endpoint("user_list").unwrap(), &HashMap::new())
        .await?;
    assert_eq!(list.records.len(), 3);

    let details = client
        .call_each(config.get_endpoint("user_details").unwrap(), &list.records)
        .await?;

    assert_eq!(details.len(), 3);
    assert_eq!(details[0].data.get("role").unwrap(), "Senior Developer");
    assert_eq!(details[2].data.get("role").unwrap(), "Representative");

    list_mock.assert();
    details_mock_1.assert();
    details_mock_2.assert();
    details_mock_3.assert();

    Ok(())
}

/// POST 端點的 body 模板與回應匯出
#[tokio::test]
async fn test_post_endpoint_with_body_template_and_export() -> Result<()> {
    let server = MockServer::start();

    let profiles_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/users/profiles")
            .json_body(serde_json::json!({
                "user_ids": [7],
                "include_permissions": true
            }));
        then.status(200).json_body(serde_json::json!([
            {"user_id": 7, "theme": "dark"}
        ]));
    });

    let toml_content = format!(
        r#"
[service]
name = "profiles"
base_url = "{}"

[[endpoints]]
name = "user_profiles"
path = "/users/profiles"
method = "POST"
body = '{{"user_ids": [{{{{id}}}}], "include_permissions": true}}'
"#,
        server.base_url()
    );

    let config = ServiceConfig::from_toml_str(&toml_content)?;
    let client = ApiClient::from_config(&config, config.token_source()?);

    let mut params = HashMap::new();
    params.insert("id".to_string(), serde_json::json!(7));

    let response = client
        .call(config.get_endpoint("user_profiles").unwrap(), &params)
        .await?;

    profiles_mock.assert();
    assert_eq!(response.records.len(), 1);

    // 匯出結果可直接寫成 CSV
    let csv = export::records_to_csv(&response.records)?;
    let lines: Vec<&str> = csv.trim_end().split('\n').collect();
    assert_eq!(lines[0], "theme,user_id");
    assert_eq!(lines[1], "dark,7");

    Ok(())
}

/// 未提供路徑參數時回報模板錯誤，不發出請求
#[tokio::test]
async fn test_missing_path_param_is_error() -> Result<()> {
    let server = MockServer::start();

    let config = ServiceConfig::from_toml_str(&format!(
        r#"
[service]
name = "strict"
base_url = "{}"

[[endpoints]]
name = "user_details"
path = "/users/{{id}}/details"
"#,
        server.base_url()
    ))?;

    let client = ApiClient::from_config(&config, config.token_source()?);

    let result = client
        .call(config.get_endpoint("user_details").unwrap(), &HashMap::new())
        .await;

    assert!(matches!(
        result,
        Err(token_relay::RelayError::TemplateError { .. })
    ));

    Ok(())
}

/// call_each 對空輸入不發任何請求
#[tokio::test]
async fn test_fan_out_with_empty_input() -> Result<()> {
    let server = MockServer::start();

    let config = ServiceConfig::from_toml_str(&format!(
        r#"
[service]
name = "empty"
base_url = "{}"

[[endpoints]]
name = "user_details"
path = "/users/{{id}}/details"
"#,
        server.base_url()
    ))?;

    let client = ApiClient::from_config(&config, config.token_source()?);
    let inputs: Vec<Record> = Vec::new();

    let records = client
        .call_each(config.get_endpoint("user_details").unwrap(), &inputs)
        .await?;

    assert!(records.is_empty());

    Ok(())
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn from_object(obj: serde_json::Map<String, serde_json::Value>) -> Self {
        let mut data = HashMap::new();
        for (key, value) in obj {
            data.insert(key, value);
        }
        Self { data }
    }
}

/// 一次 API 呼叫的解碼結果
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: Option<u16>,
    pub records: Vec<Record>,
    pub raw: serde_json::Value,
}

impl ApiResponse {
    /// 逾時降級時回傳的空結果
    pub fn empty() -> Self {
        Self {
            status: None,
            records: Vec::new(),
            raw: serde_json::Value::Null,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 解碼 JSON 回應：陣列逐筆轉成記錄，單一物件包成一筆，
    /// 其他型別包在 "response" 鍵下
    pub fn from_value(status: u16, value: serde_json::Value) -> Self {
        let mut records = Vec::new();

        match &value {
            serde_json::Value::Array(items) => {
                for item in items {
                    if let serde_json::Value::Object(obj) = item {
                        records.push(Record::from_object(obj.clone()));
                    }
                }
            }
            serde_json::Value::Object(obj) => {
                records.push(Record::from_object(obj.clone()));
            }
            serde_json::Value::Null => {}
            other => {
                let mut data = HashMap::new();
                data.insert("response".to_string(), other.clone());
                records.push(Record { data });
            }
        }

        Self {
            status: Some(status),
            records,
            raw: value,
        }
    }
}

/// Token 端點回應（RFC 6749 §5.1）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

impl AccessToken {
    /// 依 expires_in 計算絕對過期時間；無 expires_in 的 token 視為長效
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .map(|seconds| issued_at + chrono::Duration::seconds(seconds as i64))
    }
}

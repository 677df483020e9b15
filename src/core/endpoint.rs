use crate::utils::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 端點目錄中的一個端點定義
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointDef {
    pub name: String,
    pub path: String,
    pub method: Option<String>,
    pub description: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    pub parameters: Option<HashMap<String, String>>,
    pub timeout_seconds: Option<u64>,
    pub body: Option<String>,
}

impl EndpointDef {
    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn method(&self) -> Result<reqwest::Method> {
        let method = self.method.as_deref().unwrap_or("GET");
        match method.to_uppercase().as_str() {
            "GET" => Ok(reqwest::Method::GET),
            "POST" => Ok(reqwest::Method::POST),
            "PATCH" => Ok(reqwest::Method::PATCH),
            "DELETE" => Ok(reqwest::Method::DELETE),
            other => Err(RelayError::InvalidConfigValueError {
                field: format!("endpoints.{}.method", self.name),
                value: other.to_string(),
                reason: "Supported methods: GET, POST, PATCH, DELETE".to_string(),
            }),
        }
    }

    /// 以參數替換路徑中的 {param} 佔位符
    pub fn resolve_path(&self, data: &HashMap<String, serde_json::Value>) -> Result<String> {
        let mut path = self.path.clone();

        for (key, value) in data {
            let placeholder = format!("{{{}}}", key);
            if path.contains(&placeholder) {
                path = path.replace(&placeholder, &render_value(value));
            }
        }

        // 檢查是否還有未替換的參數
        if path.contains('{') && path.contains('}') {
            return Err(RelayError::TemplateError {
                message: format!(
                    "Unresolved parameters in path `{}`. Available fields: {:?}",
                    path,
                    data.keys().collect::<Vec<_>>()
                ),
            });
        }

        Ok(path)
    }

    /// 處理標頭值中的 {{key}} 模板，找不到對應值的維持原樣
    pub fn resolve_headers(
        &self,
        data: &HashMap<String, serde_json::Value>,
    ) -> HashMap<String, String> {
        let mut resolved = HashMap::new();
        if let Some(headers) = &self.headers {
            for (name, template) in headers {
                resolved.insert(name.clone(), render_template(template, data));
            }
        }
        resolved
    }

    /// 渲染 body 模板並解析為 JSON
    pub fn resolve_body(
        &self,
        data: &HashMap<String, serde_json::Value>,
    ) -> Result<Option<serde_json::Value>> {
        let Some(template) = &self.body else {
            return Ok(None);
        };

        let rendered = render_template(template, data);
        let value =
            serde_json::from_str(&rendered).map_err(|e| RelayError::ProcessingError {
                message: format!(
                    "Endpoint `{}` body is not valid JSON after templating: {}",
                    self.name, e
                ),
            })?;
        Ok(Some(value))
    }
}

/// 將 {{key}} 模板以資料值替換；未知鍵保持原樣
pub fn render_template(template: &str, data: &HashMap<String, serde_json::Value>) -> String {
    if !(template.contains("{{") && template.contains("}}")) {
        return template.to_string();
    }

    let re = regex::Regex::new(r"\{\{([^}]+)\}\}").unwrap();
    re.replace_all(template, |caps: &regex::Captures| {
        let key = &caps[1];
        match data.get(key) {
            Some(value) => render_value(value),
            None => format!("{{{{{}}}}}", key),
        }
    })
    .to_string()
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "null".to_string(),
        other => serde_json::to_string(other)
            .unwrap_or_default()
            .trim_matches('"')
            .to_string(),
    }
}

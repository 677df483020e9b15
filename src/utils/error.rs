use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("API returned status {status}: {message}")]
    ResponseError { status: u16, message: String },

    #[error("Authentication failed: {message}")]
    AuthError { message: String },

    #[error("Token endpoint error: {message}")]
    TokenError { message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid config value for {field}: `{value}` ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Template error: {message}")]
    TemplateError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

/// 錯誤分類，用於日誌與統計
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Authentication,
    Network,
    Data,
    System,
}

/// 錯誤嚴重程度，決定 CLI 的退出碼
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RelayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayError::ConfigValidationError { .. }
            | RelayError::InvalidConfigValueError { .. }
            | RelayError::MissingConfigError { .. } => ErrorCategory::Configuration,
            RelayError::AuthError { .. } | RelayError::TokenError { .. } => {
                ErrorCategory::Authentication
            }
            RelayError::ApiError(_) | RelayError::ResponseError { .. } => ErrorCategory::Network,
            RelayError::CsvError(_)
            | RelayError::SerializationError(_)
            | RelayError::TemplateError { .. }
            | RelayError::ProcessingError { .. } => ErrorCategory::Data,
            RelayError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 配置錯誤可由使用者直接修正
            RelayError::ConfigValidationError { .. }
            | RelayError::InvalidConfigValueError { .. }
            | RelayError::MissingConfigError { .. } => ErrorSeverity::High,
            // 憑證問題需要重新授權
            RelayError::AuthError { .. } | RelayError::TokenError { .. } => ErrorSeverity::Critical,
            // 網路錯誤通常是暫時性的
            RelayError::ApiError(_) => ErrorSeverity::Medium,
            RelayError::ResponseError { status, .. } => {
                if *status >= 500 {
                    ErrorSeverity::Medium
                } else {
                    ErrorSeverity::High
                }
            }
            RelayError::CsvError(_)
            | RelayError::SerializationError(_)
            | RelayError::TemplateError { .. }
            | RelayError::ProcessingError { .. } => ErrorSeverity::High,
            RelayError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// 給使用者的修復建議
    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the configuration file or CLI flags and fix the reported field"
            }
            ErrorCategory::Authentication => {
                "Verify the client credentials / token and that the token endpoint is reachable"
            }
            ErrorCategory::Network => {
                "Check the network connection and the API base URL, then retry"
            }
            ErrorCategory::Data => "Inspect the request parameters and the response payload format",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    /// 輸出給終端使用者的簡短訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            RelayError::AuthError { .. } => {
                "Authentication failed - the API rejected the credentials".to_string()
            }
            RelayError::TokenError { .. } => "Could not obtain an access token".to_string(),
            RelayError::ResponseError { status, .. } => {
                format!("The API call failed with HTTP status {}", status)
            }
            RelayError::ApiError(_) => "The API request could not be completed".to_string(),
            other => other.to_string(),
        }
    }

    /// 是否屬於可自動重試的暫時性錯誤（連線失敗或 5xx）
    pub fn is_transient(&self) -> bool {
        match self {
            RelayError::ResponseError { status, .. } => *status >= 500,
            RelayError::ApiError(e) => e.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::config::ServiceConfig;
pub use crate::core::client::ApiClient;
pub use crate::core::endpoint::EndpointDef;
pub use crate::core::retry::RetryPolicy;
pub use crate::core::token::{
    Anonymous, ApiKeyAuth, BasicAuth, ClientCredentials, StaticToken, TokenManager,
};
pub use crate::domain::model::{AccessToken, ApiResponse, Record};
pub use crate::domain::ports::{ConfigProvider, TokenSource};
pub use crate::utils::error::{RelayError, Result};

pub mod client;
pub mod endpoint;
pub mod retry;
pub mod token;

pub use crate::domain::model::{AccessToken, ApiResponse, Record};
pub use crate::domain::ports::{ConfigProvider, TokenSource};
pub use crate::utils::error::Result;

use crate::utils::error::Result;
use async_trait::async_trait;

/// 授權來源介面：提供請求要附加的授權標頭
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// 回傳 (標頭名稱, 標頭值)；匿名存取回傳 None
    async fn auth_header(&self) -> Result<Option<(String, String)>>;

    /// 清除快取的憑證，下次呼叫重新取得
    async fn invalidate(&self);

    /// 憑證過期後是否能重新取得（決定 401 時是否重試一次）
    fn renewable(&self) -> bool {
        false
    }
}

pub trait ConfigProvider: Send + Sync {
    fn base_url(&self) -> &str;
    fn timeout_seconds(&self) -> u64;
    fn max_retries(&self) -> u32;
    fn retry_delay_ms(&self) -> u64;
}

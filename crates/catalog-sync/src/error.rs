//! 错误类型
//!
//! 网络/远端错误在 `SyncEngine` 内部消化（记录日志、回滚状态），
//! 只有构造、存储适配器和远端适配器会把它们返回给调用方。

#[derive(Debug, thiserror::Error)]
pub enum CatalogSyncError {
    #[error("KV store error: {0}")]
    KvStore(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    IO(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// 远端返回了 `{ "status": "error", "message": ... }`
    #[error("Remote error: {0}")]
    Remote(String),

    #[error("HTTP status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for CatalogSyncError {
    fn from(error: serde_json::Error) -> Self {
        CatalogSyncError::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for CatalogSyncError {
    fn from(error: std::io::Error) -> Self {
        CatalogSyncError::IO(error.to_string())
    }
}

impl From<sled::Error> for CatalogSyncError {
    fn from(error: sled::Error) -> Self {
        CatalogSyncError::KvStore(error.to_string())
    }
}

impl From<reqwest::Error> for CatalogSyncError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            CatalogSyncError::Serialization(error.to_string())
        } else {
            CatalogSyncError::Transport(error.to_string())
        }
    }
}

impl CatalogSyncError {
    /// 是否属于网络/远端类错误（可在下次同步时重试）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogSyncError::Transport(_)
                | CatalogSyncError::Remote(_)
                | CatalogSyncError::HttpStatus { .. }
                | CatalogSyncError::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CatalogSyncError>;

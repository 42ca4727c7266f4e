//! 同步引擎配置

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CatalogSyncError, Result};

/// 默认自动同步阈值：待同步事务达到该数量且在线时自动推送
pub const DEFAULT_AUTO_SYNC_THRESHOLD: usize = 10;

/// HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// 连接超时（秒）
    pub connect_timeout_secs: Option<u64>,
    /// 请求超时（秒）
    pub request_timeout_secs: Option<u64>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Some(15),
            request_timeout_secs: Some(60),
        }
    }
}

/// 目录同步配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSyncConfig {
    /// 数据存储目录
    pub data_dir: PathBuf,
    /// 存储命名空间（同一目录下可以缓存多个目录）
    pub namespace: String,
    /// 远端服务地址
    pub remote_url: Option<String>,
    /// 自动同步阈值
    pub auto_sync_threshold: usize,
    /// 是否启用自动同步
    pub auto_sync_enabled: bool,
    /// 事件缓冲区大小
    pub event_buffer_size: usize,
    /// HTTP 客户端配置
    pub http_client_config: HttpClientConfig,
    /// 调试模式
    pub debug_mode: bool,
}

impl Default for CatalogSyncConfig {
    fn default() -> Self {
        Self {
            data_dir: get_default_data_dir(),
            namespace: "default".to_string(),
            remote_url: None,
            auto_sync_threshold: DEFAULT_AUTO_SYNC_THRESHOLD,
            auto_sync_enabled: true,
            event_buffer_size: 256,
            http_client_config: HttpClientConfig::default(),
            debug_mode: false,
        }
    }
}

/// 获取默认数据目录 ~/.catalog_sync/
fn get_default_data_dir() -> PathBuf {
    if let Some(home_dir) = std::env::var("HOME").ok().map(PathBuf::from) {
        home_dir.join(".catalog_sync")
    } else if let Some(home_dir) = std::env::var("USERPROFILE").ok().map(PathBuf::from) {
        home_dir.join(".catalog_sync")
    } else {
        PathBuf::from("./catalog_sync_data")
    }
}

impl CatalogSyncConfig {
    pub fn builder() -> CatalogSyncConfigBuilder {
        CatalogSyncConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.auto_sync_threshold == 0 {
            return Err(CatalogSyncError::Config(
                "auto_sync_threshold 必须大于 0".to_string(),
            ));
        }
        if self.event_buffer_size == 0 {
            return Err(CatalogSyncError::Config(
                "event_buffer_size 必须大于 0".to_string(),
            ));
        }
        if self.namespace.trim().is_empty() {
            return Err(CatalogSyncError::Config("namespace 不能为空".to_string()));
        }
        Ok(())
    }
}

/// 配置构建器
pub struct CatalogSyncConfigBuilder {
    config: CatalogSyncConfig,
}

impl CatalogSyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CatalogSyncConfig::default(),
        }
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.data_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    pub fn remote_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.remote_url = Some(url.into());
        self
    }

    pub fn auto_sync_threshold(mut self, threshold: usize) -> Self {
        self.config.auto_sync_threshold = threshold;
        self
    }

    pub fn auto_sync_enabled(mut self, enabled: bool) -> Self {
        self.config.auto_sync_enabled = enabled;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.config.event_buffer_size = size;
        self
    }

    pub fn http_client_config(mut self, config: HttpClientConfig) -> Self {
        self.config.http_client_config = config;
        self
    }

    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.config.debug_mode = enabled;
        self
    }

    pub fn build(self) -> CatalogSyncConfig {
        self.config
    }
}

impl Default for CatalogSyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_defaults() {
        let config = CatalogSyncConfig::builder()
            .data_dir("/tmp/catalog")
            .namespace("ferreteria")
            .remote_url("https://example.com/exec")
            .build();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/catalog"));
        assert_eq!(config.namespace, "ferreteria");
        assert_eq!(config.auto_sync_threshold, DEFAULT_AUTO_SYNC_THRESHOLD);
        assert!(config.auto_sync_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let config = CatalogSyncConfig::builder().auto_sync_threshold(0).build();
        assert!(matches!(config.validate(), Err(CatalogSyncError::Config(_))));

        let config = CatalogSyncConfig::builder().namespace(" ").build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serde_roundtrip_keeps_threshold() {
        let config = CatalogSyncConfig::builder().auto_sync_threshold(25).build();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: CatalogSyncConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.auto_sync_threshold, 25);
    }
}

//! 本地持久化模块
//!
//! 同步引擎只用到两个键：基础快照和待同步事务日志，值都是 JSON 数组。
//! - `KeyValueStore`：对象安全的存储接口，按 JSON 值读写
//! - `KeyValueStoreExt`：带类型的 get/set 封装
//! - `SledKvStore`：基于 sled 的持久化实现
//! - `MemoryKvStore`：内存实现（测试、临时会话）

pub mod kv;
pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CatalogSyncError, Result};

pub use kv::SledKvStore;
pub use memory::MemoryKvStore;

/// 键值存储接口
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// 读取键对应的 JSON 值，不存在时返回 None
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// 写入键对应的 JSON 值（覆盖）
    async fn set_value(&self, key: &str, value: serde_json::Value) -> Result<()>;
}

/// 带类型的读写封装
#[async_trait]
pub trait KeyValueStoreExt {
    async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send;

    async fn set<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync;
}

#[async_trait]
impl<S> KeyValueStoreExt for S
where
    S: KeyValueStore + ?Sized,
{
    async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_value(key).await? {
            Some(value) => {
                let typed = serde_json::from_value(value).map_err(|e| {
                    CatalogSyncError::Serialization(format!("反序列化键 {} 失败: {}", key, e))
                })?;
                Ok(Some(typed))
            }
            None => Ok(None),
        }
    }

    async fn set<T>(&self, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let json = serde_json::to_value(value).map_err(|e| {
            CatalogSyncError::Serialization(format!("序列化键 {} 失败: {}", key, e))
        })?;
        self.set_value(key, json).await
    }
}

/// 持久化键名（与原有 Web 端缓存保持一致）
pub mod keys {
    /// 基础快照
    pub const BASE_SNAPSHOT: &str = "inventario_base";
    /// 待同步事务日志
    pub const PENDING_TRANSACTIONS: &str = "transacciones_pendientes";
}

//! KV 存储 - 基于 sled 的持久化实现
//!
//! 每个目录命名空间对应一个独立的 sled Tree，值统一以 JSON 字节存储。

use std::path::Path;

use async_trait::async_trait;
use sled::{Db, Tree};
use tracing::{debug, info};

use super::KeyValueStore;
use crate::error::{CatalogSyncError, Result};

/// sled KV 存储
#[derive(Debug, Clone)]
pub struct SledKvStore {
    db: Db,
    tree: Tree,
}

impl SledKvStore {
    /// 打开（或创建）`{base_path}/kv` 下的数据库，并切换到指定命名空间
    pub async fn open(base_path: &Path, namespace: &str) -> Result<Self> {
        let kv_path = base_path.join("kv");

        tokio::fs::create_dir_all(&kv_path)
            .await
            .map_err(|e| CatalogSyncError::IO(format!("创建 KV 存储目录失败: {}", e)))?;

        // 上一个进程可能刚释放锁，重试多次带退避
        const MAX_OPEN_RETRIES: u32 = 8;
        const RETRY_DELAY_MS: u64 = 300;
        let mut last_err: Option<sled::Error> = None;
        let mut db_opt: Option<Db> = None;
        for attempt in 0..MAX_OPEN_RETRIES {
            match sled::open(&kv_path) {
                Ok(d) => {
                    db_opt = Some(d);
                    break;
                }
                Err(e) => {
                    let msg = e.to_string();
                    last_err = Some(e);
                    let is_lock = msg.contains("could not acquire lock")
                        || msg.contains("Resource temporarily unavailable")
                        || msg.contains("WouldBlock");
                    if is_lock && attempt + 1 < MAX_OPEN_RETRIES {
                        let delay_ms = RETRY_DELAY_MS * (1 << attempt);
                        debug!("sled 被占用，{}ms 后重试 (第 {} 次)", delay_ms, attempt + 1);
                        tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                    } else {
                        break;
                    }
                }
            }
        }
        let db = db_opt.ok_or_else(|| {
            CatalogSyncError::KvStore(
                last_err
                    .map(|e| format!("打开 sled 数据库失败: {}", e))
                    .unwrap_or_else(|| "打开 sled 数据库失败".to_string()),
            )
        })?;

        let tree_name = format!("catalog_{}", namespace);
        let tree = db
            .open_tree(&tree_name)
            .map_err(|e| CatalogSyncError::KvStore(format!("打开命名空间 Tree 失败: {}", e)))?;

        info!("KV 存储已打开: {} (namespace={})", kv_path.display(), namespace);

        Ok(Self { db, tree })
    }

    /// 删除键
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.tree
            .remove(key)
            .map_err(|e| CatalogSyncError::KvStore(format!("删除键值对失败: {}", e)))?;
        Ok(())
    }

    /// 刷盘
    pub async fn flush(&self) -> Result<()> {
        self.tree
            .flush_async()
            .await
            .map_err(|e| CatalogSyncError::KvStore(format!("刷盘失败: {}", e)))?;
        Ok(())
    }

    /// 删除整个命名空间
    pub async fn drop_namespace(&self) -> Result<()> {
        let name = self.tree.name();
        self.db
            .drop_tree(name)
            .map_err(|e| CatalogSyncError::KvStore(format!("删除命名空间 Tree 失败: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SledKvStore {
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let result = self
            .tree
            .get(key)
            .map_err(|e| CatalogSyncError::KvStore(format!("获取键值对失败: {}", e)))?;

        match result {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|e| {
                    CatalogSyncError::Serialization(format!("反序列化值失败: {}", e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set_value(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec(&value)
            .map_err(|e| CatalogSyncError::Serialization(format!("序列化值失败: {}", e)))?;

        self.tree
            .insert(key, bytes)
            .map_err(|e| CatalogSyncError::KvStore(format!("设置键值对失败: {}", e)))?;

        // 写入后立即刷盘，返回即持久化
        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::KeyValueStoreExt;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sled_store_basic_operations() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledKvStore::open(temp_dir.path(), "test").await.unwrap();

        let data = json!([{ "SKU": "A", "Cantidad unds": 5 }]);
        store.set_value("inventario_base", data.clone()).await.unwrap();
        let loaded = store.get_value("inventario_base").await.unwrap().unwrap();
        assert_eq!(loaded, data);

        assert!(store.get_value("missing").await.unwrap().is_none());

        store.delete("inventario_base").await.unwrap();
        assert!(store.get_value("inventario_base").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sled_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = SledKvStore::open(temp_dir.path(), "tienda").await.unwrap();
            // 写入即刷盘，不需要显式 flush
            store.set("contador", &vec![1u32, 2, 3]).await.unwrap();
        }

        let store = SledKvStore::open(temp_dir.path(), "tienda").await.unwrap();
        let loaded: Option<Vec<u32>> = store.get("contador").await.unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));

        store.drop_namespace().await.unwrap();
    }
}

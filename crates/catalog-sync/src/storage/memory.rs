//! 内存 KV 存储，进程结束即丢失

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::KeyValueStore;
use crate::error::{CatalogSyncError, Result};

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, serde_json::Value>>,
    fail_writes: AtomicBool,
    write_count: AtomicUsize,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置数据（模拟上次会话留下的缓存）
    pub fn with_entry(self, key: &str, value: serde_json::Value) -> Self {
        self.entries.write().insert(key.to_string(), value);
        self
    }

    /// 让后续写入失败（模拟磁盘写满等情况）
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 成功写入的次数
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.read().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set_value(&self, key: &str, value: serde_json::Value) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CatalogSyncError::KvStore(format!("写入 {} 失败: 存储不可写", key)));
        }
        self.entries.write().insert(key.to_string(), value);
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::KeyValueStoreExt;

    #[tokio::test]
    async fn test_memory_store_typed_roundtrip_and_failures() {
        let store = MemoryKvStore::new();
        store.set("k", &vec!["a".to_string()]).await.unwrap();
        let loaded: Option<Vec<String>> = store.get("k").await.unwrap();
        assert_eq!(loaded, Some(vec!["a".to_string()]));
        assert_eq!(store.write_count(), 1);

        store.set_fail_writes(true);
        assert!(store.set("k", &Vec::<String>::new()).await.is_err());
        // 失败的写入不改变已有数据
        let loaded: Option<Vec<String>> = store.get("k").await.unwrap();
        assert_eq!(loaded.map(|v| v.len()), Some(1));

        // 类型不匹配时报序列化错误
        let wrong: Result<Option<u64>> = store.get("k").await;
        assert!(matches!(wrong, Err(CatalogSyncError::Serialization(_))));
    }
}

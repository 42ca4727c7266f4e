//! 待同步事务日志
//!
//! 以 SKU 为键、保留到达顺序。同一 SKU 的新事务原地替换旧事务（位置不变），
//! 每次变更都把完整日志写入 KV 存储后再返回。

use std::sync::Arc;

use tracing::{debug, warn};

use crate::entities::Transaction;
use crate::error::Result;
use crate::storage::{keys, KeyValueStore, KeyValueStoreExt};

pub struct TransactionLog {
    entries: Vec<Transaction>,
    kv: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for TransactionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionLog")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl TransactionLog {
    /// 空日志（不触发写入）
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            entries: Vec::new(),
            kv,
        }
    }

    /// 从 KV 存储恢复日志；磁盘上若出现重复 SKU，以最后一条为准
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        let stored: Vec<Transaction> = kv
            .get(keys::PENDING_TRANSACTIONS)
            .await?
            .unwrap_or_default();

        let stored_len = stored.len();
        let mut entries: Vec<Transaction> = Vec::with_capacity(stored_len);
        for tx in stored {
            Self::upsert_entry(&mut entries, tx);
        }
        if entries.len() != stored_len {
            warn!(
                "恢复事务日志时合并了 {} 条重复 SKU",
                stored_len - entries.len()
            );
        }

        Ok(Self { entries, kv })
    }

    /// 插入或替换同 SKU 的事务，然后持久化
    pub async fn upsert(&mut self, tx: Transaction) -> Result<()> {
        let replaced = Self::upsert_entry(&mut self.entries, tx);
        debug!("事务日志 upsert: replaced={}, count={}", replaced, self.entries.len());
        self.persist().await
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all(&self) -> &[Transaction] {
        &self.entries
    }

    pub fn get(&self, sku: &str) -> Option<&Transaction> {
        self.entries.iter().find(|tx| tx.key() == sku)
    }

    /// 取出全部待推送事务（不清空，清空由调用方在远端确认后负责）
    pub fn drain(&self) -> Vec<Transaction> {
        self.entries.clone()
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.persist().await
    }

    /// 移除已被远端接受的事务
    ///
    /// 只移除与已发送内容完全一致的条目；推送期间又被修改过的 SKU 保留，
    /// 留给下一次同步。返回移除的条数。
    pub async fn remove_acknowledged(&mut self, sent: &[Transaction]) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|tx| !sent.contains(tx));
        let removed = before - self.entries.len();
        self.persist().await?;
        Ok(removed)
    }

    async fn persist(&self) -> Result<()> {
        self.kv.set(keys::PENDING_TRANSACTIONS, &self.entries).await
    }

    fn upsert_entry(entries: &mut Vec<Transaction>, tx: Transaction) -> bool {
        match entries.iter().position(|existing| existing.key() == tx.key()) {
            Some(index) => {
                entries[index] = tx;
                true
            }
            None => {
                entries.push(tx);
                false
            }
        }
    }
}

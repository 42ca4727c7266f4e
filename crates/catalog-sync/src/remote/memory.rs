//! 内存远端，按远端脚本的语义应用事务
//!
//! 供离线开发、演示和测试使用：可以注入失败、暂停推送。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::watch;

use super::RemoteCatalogService;
use crate::entities::{Product, Transaction, TransactionKind};
use crate::error::{CatalogSyncError, Result};

#[derive(Debug)]
pub struct InMemoryCatalogService {
    products: RwLock<Vec<Product>>,
    batches: RwLock<Vec<Vec<Transaction>>>,
    fail_read: AtomicBool,
    fail_apply: AtomicBool,
    read_calls: AtomicUsize,
    paused: watch::Sender<bool>,
}

impl Default for InMemoryCatalogService {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl InMemoryCatalogService {
    pub fn new(products: Vec<Product>) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            products: RwLock::new(products),
            batches: RwLock::new(Vec::new()),
            fail_read: AtomicBool::new(false),
            fail_apply: AtomicBool::new(false),
            read_calls: AtomicUsize::new(0),
            paused,
        }
    }

    pub fn products(&self) -> Vec<Product> {
        self.products.read().clone()
    }

    /// 模拟其他客户端直接修改远端
    pub fn replace_products(&self, products: Vec<Product>) {
        *self.products.write() = products;
    }

    /// 已收到的批次（按到达顺序）
    pub fn batches(&self) -> Vec<Vec<Transaction>> {
        self.batches.read().clone()
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_read(&self, fail: bool) {
        self.fail_read.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_apply(&self, fail: bool) {
        self.fail_apply.store(fail, Ordering::SeqCst);
    }

    /// 暂停后 `apply_batch` 会挂起，直到 `resume_apply`
    pub fn pause_apply(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume_apply(&self) {
        self.paused.send_replace(false);
    }

    fn apply(products: &mut Vec<Product>, tx: &Transaction) {
        let position = products.iter().position(|p| p.sku == tx.key());
        match (tx.kind, position) {
            (TransactionKind::Delete, Some(index)) => {
                products.remove(index);
            }
            (TransactionKind::Delete, None) => {}
            (_, Some(index)) => products[index] = tx.product.clone().without_pending(),
            (_, None) => products.push(tx.product.clone().without_pending()),
        }
    }
}

#[async_trait]
impl RemoteCatalogService for InMemoryCatalogService {
    async fn read_all(&self) -> Result<Vec<Product>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_read.load(Ordering::SeqCst) {
            return Err(CatalogSyncError::Transport("模拟的读取失败".to_string()));
        }
        Ok(self.products())
    }

    async fn apply_batch(&self, transactions: &[Transaction]) -> Result<()> {
        let mut paused = self.paused.subscribe();
        loop {
            let is_paused = *paused.borrow_and_update();
            if !is_paused || paused.changed().await.is_err() {
                break;
            }
        }

        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(CatalogSyncError::Transport("模拟的推送失败".to_string()));
        }

        {
            let mut products = self.products.write();
            for tx in transactions {
                Self::apply(&mut products, tx);
            }
        }
        self.batches.write().push(transactions.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_apply_batch_semantics() {
        let remote = InMemoryCatalogService::new(vec![
            Product::new("A").with_stock(5.0),
            Product::new("B").with_stock(1.0),
        ]);

        let mut added = Product::new("C").with_stock(2.0);
        added.pending = true;
        remote
            .apply_batch(&[
                Transaction::update(Product::new("A").with_stock(3.0)),
                Transaction::delete(Product::new("B")),
                Transaction::add(added),
                Transaction::delete(Product::new("never-existed")),
            ])
            .await
            .unwrap();

        let products = remote.read_all().await.unwrap();
        let skus: Vec<&str> = products.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["A", "C"]);
        assert_eq!(products[0].stock, Some(3.0));
        // 远端永远不会保存本地标记
        assert!(products.iter().all(|p| !p.pending));
        assert_eq!(remote.batches().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let remote = InMemoryCatalogService::default();
        remote.set_fail_apply(true);
        assert!(remote.apply_batch(&[Transaction::add(Product::new("A"))]).await.is_err());
        assert!(remote.batches().is_empty());
        assert!(remote.products().is_empty());

        remote.set_fail_read(true);
        assert!(remote.read_all().await.is_err());
        assert_eq!(remote.read_calls(), 1);
    }
}

//! 远端目录服务
//!
//! 远端是权威数据源，只提供两个操作：全量读取、批量应用事务。
//! 批量应用在传输层是"发出即算成功"，没有逐条确认；
//! 同步成功后必须重新全量读取以获得权威结果。

pub mod http;
pub mod memory;

use async_trait::async_trait;

use crate::entities::{Product, Transaction};
use crate::error::Result;

pub use http::HttpCatalogService;
pub use memory::InMemoryCatalogService;

#[async_trait]
pub trait RemoteCatalogService: Send + Sync + std::fmt::Debug {
    /// 全量读取（无分页）
    async fn read_all(&self) -> Result<Vec<Product>>;

    /// 一次请求推送整批事务
    async fn apply_batch(&self, transactions: &[Transaction]) -> Result<()>;
}

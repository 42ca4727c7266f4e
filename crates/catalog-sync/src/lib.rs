//! Catalog Sync - 离线优先的商品目录同步引擎
//!
//! 本库让客户端在断网时继续编辑商品目录，联网后再与远端同步：
//! - 📦 本地缓存：基础快照与待同步事务持久化到 KV 存储
//! - ✏️ 离线编辑：按 SKU 后写覆盖的事务日志
//! - 🔀 合并视图：基础快照 + 本地修改，本地修改排在前面
//! - 📡 网络监控：在线/离线切换自动广播
//! - 🔄 自动同步：积压达到阈值且在线时自动推送
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use catalog_sync::{CatalogSyncConfig, ManualConnectivityProbe, Product, SyncEngine, Transaction};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CatalogSyncConfig::builder()
//!         .data_dir("/path/to/data")
//!         .remote_url("https://script.example.com/exec")
//!         .build();
//!
//!     let probe = Arc::new(ManualConnectivityProbe::new(true));
//!     let engine = SyncEngine::initialize(config, probe).await?;
//!
//!     engine.refresh(false).await;
//!     engine
//!         .record_local_edit(Transaction::add(Product::new("SKU-1").with_stock(3.0)))
//!         .await;
//!     let outcome = engine.sync().await;
//!     println!("同步结果: {:?}", outcome);
//!
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```

// 导出核心模块
pub mod config;
pub mod connectivity;
pub mod entities;
pub mod error;
pub mod events;
pub mod remote;
pub mod stats;
pub mod storage;
pub mod sync;
pub mod version;

// 重新导出核心类型，方便使用
pub use config::{CatalogSyncConfig, CatalogSyncConfigBuilder, HttpClientConfig};
pub use connectivity::{
    ConnectivityEvent, ConnectivityMonitor, ConnectivityProbe, ConnectivityStatus,
    ManualConnectivityProbe,
};
pub use entities::{Product, Transaction, TransactionKind};
pub use error::{CatalogSyncError, Result};
pub use events::{EventBus, SyncEvent};
pub use remote::{HttpCatalogService, InMemoryCatalogService, RemoteCatalogService};
pub use stats::InventoryStats;
pub use storage::{KeyValueStore, KeyValueStoreExt, MemoryKvStore, SledKvStore};
pub use sync::{
    merge, AutoSyncPolicy, SkipReason, SyncEngine, SyncIndicator, SyncOutcome, SyncPhase,
    SyncSnapshot, TransactionLog,
};
pub use version::SDK_VERSION;

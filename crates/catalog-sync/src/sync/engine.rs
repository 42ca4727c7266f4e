//! 同步引擎
//!
//! 职责：
//! - 持有会话级同步状态（基础快照、事务日志、合并视图、同步阶段）
//! - 刷新（远端 -> 本地）、记录本地编辑、推送（本地 -> 远端）
//! - 转发网络状态变化，驱动自动同步
//!
//! 状态只能通过本类型的方法修改；网络调用期间不持有状态锁，
//! 本地编辑可以与进行中的刷新/推送交错执行。

use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::auto_sync::AutoSyncTask;
use super::merge::merge;
use super::transaction_log::TransactionLog;
use super::{SkipReason, SyncIndicator, SyncOutcome, SyncPhase};
use crate::config::CatalogSyncConfig;
use crate::connectivity::{ConnectivityMonitor, ConnectivityProbe};
use crate::entities::{Product, Transaction, TransactionKind};
use crate::error::{CatalogSyncError, Result};
use crate::events::{EventBus, SyncEvent};
use crate::remote::{HttpCatalogService, RemoteCatalogService};
use crate::stats::InventoryStats;
use crate::storage::{keys, KeyValueStore, KeyValueStoreExt, SledKvStore};

struct SyncState {
    base: Vec<Product>,
    log: TransactionLog,
    merged: Vec<Product>,
    phase: SyncPhase,
    last_refresh_at: Option<i64>,
}

impl SyncState {
    fn recompute(&mut self) {
        self.merged = merge(&self.base, self.log.all());
    }
}

/// 对外公开的只读状态摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub product_count: usize,
    pub pending_count: usize,
    pub is_online: bool,
    pub is_syncing: bool,
    /// 最近一次成功刷新/同步的时间（UTC 毫秒）
    pub last_refresh_at: Option<i64>,
}

struct EngineInner {
    config: CatalogSyncConfig,
    kv: Arc<dyn KeyValueStore>,
    remote: Arc<dyn RemoteCatalogService>,
    connectivity: Arc<ConnectivityMonitor>,
    state: RwLock<SyncState>,
    events: EventBus,
    background: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        for handle in self.background.lock().drain(..) {
            handle.abort();
        }
    }
}

/// 同步引擎句柄（克隆开销很小，所有克隆共享同一份状态）
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

/// 后台任务持有的弱引用，不阻止引擎被释放
#[derive(Clone)]
pub(crate) struct WeakSyncEngine {
    inner: Weak<EngineInner>,
}

impl WeakSyncEngine {
    pub(crate) fn upgrade(&self) -> Option<SyncEngine> {
        self.inner.upgrade().map(|inner| SyncEngine { inner })
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("namespace", &self.inner.config.namespace)
            .finish()
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl SyncEngine {
    /// 按配置创建：sled 本地存储 + HTTP 远端 + 平台网络探针
    pub async fn initialize(
        config: CatalogSyncConfig,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> Result<Self> {
        config.validate()?;
        let remote_url = config
            .remote_url
            .clone()
            .ok_or_else(|| CatalogSyncError::Config("未配置 remote_url".to_string()))?;

        let kv = Arc::new(SledKvStore::open(&config.data_dir, &config.namespace).await?);
        let remote = Arc::new(HttpCatalogService::new(remote_url, &config.http_client_config)?);
        let connectivity = Arc::new(ConnectivityMonitor::new(probe).await);
        connectivity.start().await?;

        Self::open(config, kv, remote, connectivity).await
    }

    /// 用给定的协作组件创建引擎，并从 KV 存储恢复上次会话的状态
    pub async fn open(
        config: CatalogSyncConfig,
        kv: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteCatalogService>,
        connectivity: Arc<ConnectivityMonitor>,
    ) -> Result<Self> {
        config.validate()?;
        if config.debug_mode {
            debug!("同步引擎配置: {:?}", config);
        }

        let base: Vec<Product> = kv
            .get::<Vec<Product>>(keys::BASE_SNAPSHOT)
            .await?
            .unwrap_or_default()
            .into_iter()
            .map(Product::without_pending)
            .collect();
        let log = TransactionLog::load(kv.clone()).await?;
        let merged = merge(&base, log.all());

        info!(
            "同步引擎初始化: namespace={}, {} 个商品, {} 条待同步事务",
            config.namespace,
            base.len(),
            log.count()
        );

        let events = EventBus::new(config.event_buffer_size);
        let auto_sync = config.auto_sync_enabled.then_some(config.auto_sync_threshold);

        let engine = Self {
            inner: Arc::new(EngineInner {
                config,
                kv,
                remote,
                connectivity,
                state: RwLock::new(SyncState {
                    base,
                    log,
                    merged,
                    phase: SyncPhase::Idle,
                    last_refresh_at: None,
                }),
                events,
                background: parking_lot::Mutex::new(Vec::new()),
            }),
        };

        engine.spawn_connectivity_forwarder();
        if let Some(threshold) = auto_sync {
            let handle = AutoSyncTask::spawn(&engine, threshold);
            engine.inner.background.lock().push(handle);
        }

        Ok(engine)
    }

    pub(crate) fn downgrade(&self) -> WeakSyncEngine {
        WeakSyncEngine {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ============================================================
    // 三个核心操作
    // ============================================================

    /// 从远端刷新基础快照
    ///
    /// 离线、有未同步修改且未强制、或正在同步时返回 false 且不改变状态。
    /// 失败只记录日志，不影响本地会话。
    pub async fn refresh(&self, force: bool) -> bool {
        if !self.is_online().await {
            debug!("离线，跳过刷新");
            return false;
        }

        {
            let mut state = self.inner.state.write().await;
            if !state.log.is_empty() && !force {
                info!(
                    "有 {} 条未同步修改，跳过刷新（不丢弃本地修改）",
                    state.log.count()
                );
                return false;
            }
            if state.phase == SyncPhase::Syncing {
                debug!("正在同步，跳过刷新");
                return false;
            }
            state.phase = SyncPhase::Syncing;
            self.emit_state_locked(&state).await;
        }

        let result = self.inner.remote.read_all().await;

        let mut state = self.inner.state.write().await;
        let refreshed = match result {
            Ok(products) => {
                let product_count = products.len();
                self.replace_base(&mut state, products).await;
                state.recompute();
                state.last_refresh_at = Some(now_millis());
                info!(
                    "目录刷新完成: {} 个商品, {} 条本地修改叠加",
                    product_count,
                    state.log.count()
                );
                self.inner.events.emit(SyncEvent::RefreshCompleted {
                    product_count,
                    timestamp: now_millis(),
                });
                true
            }
            Err(e) => {
                error!("从远端刷新失败: {}", e);
                self.inner.events.emit(SyncEvent::RefreshFailed {
                    error: e.to_string(),
                    timestamp: now_millis(),
                });
                false
            }
        };
        state.phase = SyncPhase::Idle;
        self.emit_state_locked(&state).await;
        refreshed
    }

    /// 记录一条本地编辑（离线可用，不触网）
    pub async fn record_local_edit(&self, tx: Transaction) {
        let sku = tx.key().to_string();
        let kind = tx.kind;

        let mut state = self.inner.state.write().await;
        if let Err(e) = state.log.upsert(tx).await {
            warn!("事务日志持久化失败（内存中已记录）: {}", e);
        }
        state.recompute();

        let pending_count = state.log.count();
        debug!("记录本地修改: sku={}, kind={}, pending={}", sku, kind, pending_count);
        self.inner.events.emit(SyncEvent::LocalEditRecorded {
            sku,
            kind,
            pending_count,
            timestamp: now_millis(),
        });
        self.emit_state_locked(&state).await;
    }

    /// 把待同步事务整批推送到远端，然后重新拉取权威数据
    pub async fn sync(&self) -> SyncOutcome {
        if !self.is_online().await {
            warn!("同步取消：无网络连接");
            return SyncOutcome::Skipped(SkipReason::Offline);
        }

        let batch = {
            let mut state = self.inner.state.write().await;
            if state.phase == SyncPhase::Syncing {
                debug!("已有同步在进行，忽略本次调用");
                return SyncOutcome::Skipped(SkipReason::AlreadySyncing);
            }
            if state.log.is_empty() {
                return SyncOutcome::Skipped(SkipReason::NothingToSync);
            }
            state.phase = SyncPhase::Syncing;
            let batch = state.log.drain();
            self.emit_state_locked(&state).await;
            batch
        };

        info!("开始同步: {} 条事务", batch.len());
        self.inner.events.emit(SyncEvent::SyncStarted {
            batch_size: batch.len(),
            timestamp: now_millis(),
        });

        match self.push_and_reload(&batch).await {
            Ok(products) => {
                let mut state = self.inner.state.write().await;
                self.replace_base(&mut state, products).await;

                let before = state.log.count();
                if let Err(e) = state.log.remove_acknowledged(&batch).await {
                    warn!("清理已同步事务时持久化失败: {}", e);
                }
                let pushed = before - state.log.count();
                let remaining = state.log.count();

                state.recompute();
                state.last_refresh_at = Some(now_millis());
                state.phase = SyncPhase::Idle;

                info!("同步完成: 已推送 {} 条, 剩余 {} 条", pushed, remaining);
                self.inner.events.emit(SyncEvent::SyncCompleted {
                    pushed,
                    remaining,
                    timestamp: now_millis(),
                });
                self.emit_state_locked(&state).await;
                SyncOutcome::Completed { pushed, remaining }
            }
            Err(e) => {
                let retryable = e.is_retryable();
                error!(
                    "同步到远端失败，保留 {} 条事务 (retryable={}): {}",
                    batch.len(),
                    retryable,
                    e
                );
                let mut state = self.inner.state.write().await;
                state.phase = SyncPhase::Idle;
                self.inner.events.emit(SyncEvent::SyncFailed {
                    error: e.to_string(),
                    retryable,
                    pending_count: state.log.count(),
                    timestamp: now_millis(),
                });
                self.emit_state_locked(&state).await;
                SyncOutcome::Failed {
                    error: e.to_string(),
                    retryable,
                }
            }
        }
    }

    // ============================================================
    // 编辑入口
    // ============================================================

    /// 保存表单：基础快照中已有该 SKU 或正在编辑已有行时记为 UPDATE，否则 ADD
    pub async fn save_product(&self, product: Product, editing: bool) -> Result<TransactionKind> {
        if product.sku.trim().is_empty() {
            return Err(CatalogSyncError::InvalidInput("SKU 不能为空".to_string()));
        }

        let exists_in_base = {
            let state = self.inner.state.read().await;
            state.base.iter().any(|p| p.sku == product.sku)
        };
        let kind = TransactionKind::for_save(exists_in_base, editing);
        self.record_local_edit(Transaction::new(kind, product.without_pending()))
            .await;
        Ok(kind)
    }

    /// 删除商品（事务携带完整商品数据）
    pub async fn delete_product(&self, product: Product) {
        self.record_local_edit(Transaction::delete(product.without_pending()))
            .await;
    }

    // ============================================================
    // 只读访问
    // ============================================================

    /// 当前合并视图（本地未同步的商品在前，带本地标记）
    pub async fn merged_view(&self) -> Vec<Product> {
        self.inner.state.read().await.merged.clone()
    }

    pub async fn base_snapshot(&self) -> Vec<Product> {
        self.inner.state.read().await.base.clone()
    }

    pub async fn pending_transactions(&self) -> Vec<Transaction> {
        self.inner.state.read().await.log.all().to_vec()
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.state.read().await.log.count()
    }

    pub async fn phase(&self) -> SyncPhase {
        self.inner.state.read().await.phase
    }

    pub async fn is_syncing(&self) -> bool {
        self.phase().await == SyncPhase::Syncing
    }

    pub async fn is_online(&self) -> bool {
        self.inner.connectivity.is_online().await
    }

    pub async fn last_refresh_at(&self) -> Option<i64> {
        self.inner.state.read().await.last_refresh_at
    }

    pub async fn status(&self) -> SyncIndicator {
        let snapshot = self.snapshot().await;
        SyncIndicator::from_state(snapshot.is_syncing, snapshot.is_online, snapshot.pending_count)
    }

    pub async fn stats(&self) -> InventoryStats {
        InventoryStats::from_products(&self.inner.state.read().await.merged)
    }

    pub async fn snapshot(&self) -> SyncSnapshot {
        let state = self.inner.state.read().await;
        SyncSnapshot {
            product_count: state.merged.len(),
            pending_count: state.log.count(),
            is_online: self.inner.connectivity.is_online().await,
            is_syncing: state.phase == SyncPhase::Syncing,
            last_refresh_at: state.last_refresh_at,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    /// 手动设置网络状态（转发给网络监控）
    pub async fn set_online(&self, online: bool) {
        self.inner.connectivity.set_online(online).await;
    }

    pub fn config(&self) -> &CatalogSyncConfig {
        &self.inner.config
    }

    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.inner.connectivity
    }

    /// 停止后台任务（网络转发、自动同步）
    pub fn shutdown(&self) {
        for handle in self.inner.background.lock().drain(..) {
            handle.abort();
        }
        info!(
            "同步引擎后台任务已停止，本会话共广播 {} 个事件",
            self.inner.events.total_events()
        );
    }

    // ============================================================
    // 私有方法
    // ============================================================

    async fn push_and_reload(&self, batch: &[Transaction]) -> Result<Vec<Product>> {
        self.inner.remote.apply_batch(batch).await?;
        self.inner.remote.read_all().await
    }

    /// 替换基础快照并持久化；持久化失败时内存中的会话状态仍以新数据为准
    async fn replace_base(&self, state: &mut SyncState, products: Vec<Product>) {
        let base: Vec<Product> = products.into_iter().map(Product::without_pending).collect();
        if let Err(e) = self.inner.kv.set(keys::BASE_SNAPSHOT, &base).await {
            warn!("基础快照持久化失败: {}", e);
        }
        state.base = base;
    }

    /// 在持有状态锁时广播，保证状态事件的顺序与修改顺序一致
    async fn emit_state_locked(&self, state: &SyncState) {
        self.inner.events.emit(SyncEvent::StateChanged {
            pending_count: state.log.count(),
            is_online: self.inner.connectivity.is_online().await,
            is_syncing: state.phase == SyncPhase::Syncing,
            timestamp: now_millis(),
        });
    }

    async fn on_connectivity_changed(&self, is_online: bool) {
        let state = self.inner.state.read().await;
        info!(
            "网络状态: {}, 待同步 {} 条",
            if is_online { "在线" } else { "离线" },
            state.log.count()
        );
        self.inner.events.emit(SyncEvent::ConnectivityChanged {
            is_online,
            timestamp: now_millis(),
        });
        self.emit_state_locked(&state).await;
    }

    fn spawn_connectivity_forwarder(&self) {
        let mut receiver = self.inner.connectivity.subscribe();
        let weak = self.downgrade();

        let handle = tokio::spawn(async move {
            loop {
                let online = match receiver.recv().await {
                    Ok(event) => Some(event.new_status.is_online()),
                    Err(broadcast::error::RecvError::Lagged(_)) => None,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(engine) = weak.upgrade() else {
                    break;
                };
                let online = match online {
                    Some(online) => online,
                    None => engine.is_online().await,
                };
                engine.on_connectivity_changed(online).await;
            }
        });

        self.inner.background.lock().push(handle);
    }
}

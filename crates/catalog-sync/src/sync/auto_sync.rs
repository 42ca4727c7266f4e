//! 自动同步策略
//!
//! 观察 (待同步数量, 是否在线, 是否同步中)，满足
//! `pending >= threshold && online && !syncing` 时触发一次 `sync()`。
//! 每次"合格的状态转换"只触发一次：待同步数量变化或由离线转为在线才会重新武装，
//! 失败的同步不会在数量不变的情况下反复重试。

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::engine::SyncEngine;
use crate::events::SyncEvent;

/// 自动同步触发判定（纯状态机）
#[derive(Debug, Clone)]
pub struct AutoSyncPolicy {
    threshold: usize,
    armed: bool,
    last_pending: Option<usize>,
    last_online: bool,
}

impl AutoSyncPolicy {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            armed: true,
            last_pending: None,
            last_online: false,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// 观察一次状态，返回是否应当触发同步
    pub fn observe(&mut self, pending_count: usize, is_online: bool, is_syncing: bool) -> bool {
        let count_changed = self.last_pending != Some(pending_count);
        let came_online = is_online && !self.last_online;
        if count_changed || came_online {
            self.armed = true;
        }
        self.last_pending = Some(pending_count);
        self.last_online = is_online;

        let qualifies = pending_count >= self.threshold && is_online && !is_syncing;
        if qualifies && self.armed {
            self.armed = false;
            return true;
        }
        false
    }
}

/// 自动同步后台任务
pub(crate) struct AutoSyncTask;

impl AutoSyncTask {
    /// 启动任务：订阅引擎事件，在任务内串行执行 `sync()`
    ///
    /// 任务只持有引擎的弱引用，引擎释放后自动退出。
    pub(crate) fn spawn(engine: &SyncEngine, threshold: usize) -> JoinHandle<()> {
        let mut events = engine.subscribe();
        let weak = engine.downgrade();
        tokio::spawn(async move {
            let mut policy = AutoSyncPolicy::new(threshold);

            // 启动时缓存里可能已经攒够了事务
            if let Some(engine) = weak.upgrade() {
                let snapshot = engine.snapshot().await;
                if policy.observe(snapshot.pending_count, snapshot.is_online, snapshot.is_syncing) {
                    Self::fire(&engine, snapshot.pending_count).await;
                }
            }

            loop {
                let received = events.recv().await;
                let Some(engine) = weak.upgrade() else {
                    break;
                };

                let (pending_count, is_online, is_syncing) = match received {
                    Ok(SyncEvent::StateChanged {
                        pending_count,
                        is_online,
                        is_syncing,
                        ..
                    }) => (pending_count, is_online, is_syncing),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("自动同步事件积压，跳过 {} 条，改为读取当前状态", skipped);
                        let snapshot = engine.snapshot().await;
                        (snapshot.pending_count, snapshot.is_online, snapshot.is_syncing)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if policy.observe(pending_count, is_online, is_syncing) {
                    Self::fire(&engine, pending_count).await;
                }
            }
            debug!("自动同步任务退出");
        })
    }

    async fn fire(engine: &SyncEngine, pending_count: usize) {
        info!("[Auto-Sync] 检测到 {} 条待同步修改，自动同步", pending_count);
        let outcome = engine.sync().await;
        debug!("[Auto-Sync] 结果: {:?}", outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_on_threshold_transition() {
        let mut policy = AutoSyncPolicy::new(10);
        for count in 1..=9 {
            assert!(!policy.observe(count, true, false));
        }
        assert!(policy.observe(10, true, false));
        // 没有新的转换，不再触发
        assert!(!policy.observe(10, true, false));
        // 同步中 -> 结束（失败，数量不变）也不触发
        assert!(!policy.observe(10, true, true));
        assert!(!policy.observe(10, true, false));
    }

    #[test]
    fn test_never_fires_offline() {
        let mut policy = AutoSyncPolicy::new(10);
        for count in 1..=25 {
            assert!(!policy.observe(count, false, false));
        }
    }

    #[test]
    fn test_coming_online_with_backlog_fires() {
        let mut policy = AutoSyncPolicy::new(10);
        assert!(!policy.observe(12, false, false));
        assert!(policy.observe(12, true, false));
        assert!(!policy.observe(12, true, false));
    }

    #[test]
    fn test_never_fires_while_syncing() {
        let mut policy = AutoSyncPolicy::new(10);
        assert!(!policy.observe(10, true, true));
        assert!(!policy.observe(11, true, true));
        // 同步结束后仍有积压，且尚未触发过，此时触发
        assert!(policy.observe(11, true, false));
    }

    #[test]
    fn test_further_edit_rearms() {
        let mut policy = AutoSyncPolicy::new(10);
        assert!(policy.observe(10, true, false));
        assert!(!policy.observe(10, true, true));
        assert!(!policy.observe(10, true, false));
        assert!(policy.observe(11, true, false));
    }

    #[test]
    fn test_successful_sync_resets() {
        let mut policy = AutoSyncPolicy::new(3);
        assert!(policy.observe(3, true, false));
        assert!(!policy.observe(0, true, false));
        assert!(!policy.observe(2, true, false));
        assert!(policy.observe(3, true, false));
    }
}

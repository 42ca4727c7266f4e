//! 事件系统 - 同步状态变化的广播
//!
//! UI 层订阅后按需重新读取合并视图；自动同步任务也通过这里观察状态。

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::entities::TransactionKind;

/// 同步事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncEvent {
    /// 自动同步关心的三元组发生变化
    StateChanged {
        pending_count: usize,
        is_online: bool,
        is_syncing: bool,
        timestamp: i64,
    },
    /// 记录了一条本地编辑
    LocalEditRecorded {
        sku: String,
        kind: TransactionKind,
        pending_count: usize,
        timestamp: i64,
    },
    /// 网络状态变化
    ConnectivityChanged { is_online: bool, timestamp: i64 },
    /// 从远端刷新完成
    RefreshCompleted { product_count: usize, timestamp: i64 },
    /// 从远端刷新失败
    RefreshFailed { error: String, timestamp: i64 },
    /// 开始推送
    SyncStarted { batch_size: usize, timestamp: i64 },
    /// 推送完成
    SyncCompleted {
        pushed: usize,
        remaining: usize,
        timestamp: i64,
    },
    /// 推送失败（日志保持不变）
    SyncFailed {
        error: String,
        retryable: bool,
        pending_count: usize,
        timestamp: i64,
    },
}

impl SyncEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::StateChanged { .. } => "state_changed",
            SyncEvent::LocalEditRecorded { .. } => "local_edit_recorded",
            SyncEvent::ConnectivityChanged { .. } => "connectivity_changed",
            SyncEvent::RefreshCompleted { .. } => "refresh_completed",
            SyncEvent::RefreshFailed { .. } => "refresh_failed",
            SyncEvent::SyncStarted { .. } => "sync_started",
            SyncEvent::SyncCompleted { .. } => "sync_completed",
            SyncEvent::SyncFailed { .. } => "sync_failed",
        }
    }
}

/// 事件总线
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
    total_events: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            total_events: AtomicU64::new(0),
        }
    }

    /// 发布事件；没有订阅者时直接丢弃
    pub fn emit(&self, event: SyncEvent) {
        trace!(
            "Emitting event: {} (subscribers={})",
            event.event_type(),
            self.subscriber_count()
        );
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn total_events(&self) -> u64 {
        self.total_events.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_dropped() {
        let bus = EventBus::new(8);
        bus.emit(SyncEvent::ConnectivityChanged {
            is_online: true,
            timestamp: 0,
        });
        assert_eq!(bus.total_events(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_receives_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.emit(SyncEvent::SyncStarted {
            batch_size: 3,
            timestamp: 1,
        });
        let event = rx.try_recv().unwrap();
        assert_eq!(event.event_type(), "sync_started");
    }
}

//! 离线优先的目录同步模块
//!
//! 职责：
//! - 维护待同步事务日志（按 SKU 后写覆盖）
//! - 由基础快照 + 事务日志计算合并视图
//! - 从远端刷新 / 推送本地修改
//! - 根据网络状态与积压数量自动同步

pub mod auto_sync;
pub mod engine;
pub mod merge;
pub mod transaction_log;

use serde::{Deserialize, Serialize};

pub use auto_sync::AutoSyncPolicy;
pub use engine::{SyncEngine, SyncSnapshot};
pub use merge::merge;
pub use transaction_log::TransactionLog;

/// 同步阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    /// 空闲
    Idle,
    /// 正在与远端通信（刷新或推送）
    Syncing,
}

/// `sync()` 跳过的原因（不是错误）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    AlreadySyncing,
    NothingToSync,
    Offline,
}

/// `sync()` 的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// 未执行
    Skipped(SkipReason),
    /// 推送并刷新成功
    Completed {
        /// 已确认的事务数
        pushed: usize,
        /// 推送期间新产生、留待下次同步的事务数
        remaining: usize,
    },
    /// 推送或刷新失败，日志保持不变
    Failed {
        error: String,
        /// 网络/远端类错误，下次同步可重试
        retryable: bool,
    },
}

impl SyncOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SyncOutcome::Completed { .. })
    }
}

/// 状态指示（给 UI 的状态条使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncIndicator {
    /// 正在同步
    Syncing,
    /// 离线，本地有若干修改
    Offline { pending: usize },
    /// 在线，有修改等待同步
    Pending { pending: usize },
    /// 一切已同步
    Synced,
}

impl SyncIndicator {
    /// 优先级：同步中 > 离线 > 待同步 > 已同步
    pub fn from_state(is_syncing: bool, is_online: bool, pending: usize) -> Self {
        if is_syncing {
            SyncIndicator::Syncing
        } else if !is_online {
            SyncIndicator::Offline { pending }
        } else if pending > 0 {
            SyncIndicator::Pending { pending }
        } else {
            SyncIndicator::Synced
        }
    }
}

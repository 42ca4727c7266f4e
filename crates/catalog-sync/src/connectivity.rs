//! 网络连通性监控
//!
//! 平台层实现 `ConnectivityProbe`（浏览器 online/offline 事件、移动端网络回调等），
//! `ConnectivityMonitor` 负责缓存当前状态并向订阅者广播变化。
//! 初始状态在构造时从探针读取，不假设在线。

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::Result;

/// 网络状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectivityStatus {
    Online,
    Offline,
}

impl ConnectivityStatus {
    pub fn from_online(online: bool) -> Self {
        if online {
            ConnectivityStatus::Online
        } else {
            ConnectivityStatus::Offline
        }
    }

    pub fn is_online(self) -> bool {
        self == ConnectivityStatus::Online
    }
}

/// 网络状态变化事件
#[derive(Debug, Clone)]
pub struct ConnectivityEvent {
    pub old_status: ConnectivityStatus,
    pub new_status: ConnectivityStatus,
    pub timestamp: i64,
}

/// 网络状态探针（由平台层实现）
#[async_trait]
pub trait ConnectivityProbe: Send + Sync + std::fmt::Debug {
    /// 读取环境当前的真实网络状态
    async fn current_status(&self) -> ConnectivityStatus;

    /// 开始监听网络状态变化
    async fn start_monitoring(&self) -> Result<broadcast::Receiver<ConnectivityStatus>>;
}

/// 网络监控管理器
#[derive(Debug)]
pub struct ConnectivityMonitor {
    probe: Arc<dyn ConnectivityProbe>,
    sender: broadcast::Sender<ConnectivityEvent>,
    current: Arc<RwLock<ConnectivityStatus>>,
    forwarder: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    /// 创建监控器，初始状态取自探针
    pub async fn new(probe: Arc<dyn ConnectivityProbe>) -> Self {
        let initial = probe.current_status().await;
        let (sender, _) = broadcast::channel(64);
        info!("网络监控初始化: {:?}", initial);

        Self {
            probe,
            sender,
            current: Arc::new(RwLock::new(initial)),
            forwarder: parking_lot::Mutex::new(None),
        }
    }

    /// 启动监听任务，把探针上报的状态转发给订阅者
    pub async fn start(&self) -> Result<()> {
        let mut receiver = self.probe.start_monitoring().await?;

        // 订阅之后再读一次，补上 new() 与 start() 之间的变化
        let latest = self.probe.current_status().await;
        apply_status(&self.current, &self.sender, latest).await;

        let sender = self.sender.clone();
        let current = self.current.clone();

        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(status) => {
                        apply_status(&current, &sender, status).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("网络事件积压，跳过 {} 条", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("网络监听任务退出");
        });

        if let Some(previous) = self.forwarder.lock().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    pub async fn status(&self) -> ConnectivityStatus {
        *self.current.read().await
    }

    pub async fn is_online(&self) -> bool {
        self.status().await.is_online()
    }

    /// 手动设置网络状态（没有原生事件源的宿主使用）
    pub async fn set_online(&self, online: bool) {
        apply_status(&self.current, &self.sender, ConnectivityStatus::from_online(online)).await;
    }

    /// 订阅网络状态变化
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.sender.subscribe()
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.forwarder.lock().take() {
            handle.abort();
        }
    }
}

/// 更新状态；与当前状态相同则不广播
async fn apply_status(
    current: &RwLock<ConnectivityStatus>,
    sender: &broadcast::Sender<ConnectivityEvent>,
    new_status: ConnectivityStatus,
) {
    let old_status = {
        let mut guard = current.write().await;
        let old = *guard;
        if old == new_status {
            return;
        }
        *guard = new_status;
        old
    };

    info!("网络状态变化: {:?} -> {:?}", old_status, new_status);
    let _ = sender.send(ConnectivityEvent {
        old_status,
        new_status,
        timestamp: chrono::Utc::now().timestamp_millis(),
    });
}

/// 手动驱动的探针
///
/// 宿主（或测试）调用 `set_online` 注入状态变化。
#[derive(Debug)]
pub struct ManualConnectivityProbe {
    status: parking_lot::RwLock<ConnectivityStatus>,
    sender: broadcast::Sender<ConnectivityStatus>,
}

impl ManualConnectivityProbe {
    pub fn new(online: bool) -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            status: parking_lot::RwLock::new(ConnectivityStatus::from_online(online)),
            sender,
        }
    }

    pub fn set_online(&self, online: bool) {
        let status = ConnectivityStatus::from_online(online);
        *self.status.write() = status;
        let _ = self.sender.send(status);
    }
}

#[async_trait]
impl ConnectivityProbe for ManualConnectivityProbe {
    async fn current_status(&self) -> ConnectivityStatus {
        *self.status.read()
    }

    async fn start_monitoring(&self) -> Result<broadcast::Receiver<ConnectivityStatus>> {
        Ok(self.sender.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_initial_status_comes_from_probe() {
        let probe = Arc::new(ManualConnectivityProbe::new(false));
        let monitor = ConnectivityMonitor::new(probe).await;
        assert!(!monitor.is_online().await);
    }

    #[tokio::test]
    async fn test_probe_transitions_are_forwarded() {
        let probe = Arc::new(ManualConnectivityProbe::new(false));
        let monitor = ConnectivityMonitor::new(probe.clone()).await;
        monitor.start().await.unwrap();
        let mut events = monitor.subscribe();

        probe.set_online(true);
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.old_status, ConnectivityStatus::Offline);
        assert_eq!(event.new_status, ConnectivityStatus::Online);
        assert!(monitor.is_online().await);
    }

    #[tokio::test]
    async fn test_change_before_start_is_not_lost() {
        let probe = Arc::new(ManualConnectivityProbe::new(false));
        let monitor = ConnectivityMonitor::new(probe.clone()).await;
        let mut events = monitor.subscribe();

        probe.set_online(true);
        monitor.start().await.unwrap();

        assert!(monitor.is_online().await);
        let event = events.try_recv().unwrap();
        assert_eq!(event.old_status, ConnectivityStatus::Offline);
        assert_eq!(event.new_status, ConnectivityStatus::Online);

        probe.set_online(false);
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.new_status, ConnectivityStatus::Offline);
    }

    #[tokio::test]
    async fn test_duplicate_status_is_not_broadcast() {
        let probe = Arc::new(ManualConnectivityProbe::new(true));
        let monitor = ConnectivityMonitor::new(probe).await;
        let mut events = monitor.subscribe();

        monitor.set_online(true).await;
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        monitor.set_online(false).await;
        let event = events.try_recv().unwrap();
        assert_eq!(event.new_status, ConnectivityStatus::Offline);
    }
}

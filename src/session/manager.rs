//! 会话管理器
//!
//! 对当前设备的唯一访问入口。`run_exclusive` 解析当前设备（按策略等待或立即failed），
//! 在设备的 FIFO 会话槽中排队，执行一个工作单元，并在任何退出路径上释放会话。
//! 设备断开时进行中的工作单元以 `DeviceDisconnected` failed。
//!
//! 排队位置在提交时确定：请求先进入管理器级的准入队列，一次只有队首请求等待设备，
//! 拿到设备槽中的位置后才放行下一个。设备连接前提交的请求因此同样按提交顺序执行。

use crate::challenge::ChallengeHandler;
use crate::codec::{NormalizedTransaction, SignatureResult};
use crate::core::errors::{ProviderError, Result};
use crate::hardware::device::{DeviceHandle, DeviceId};
use crate::hardware::path::DerivationPath;
use crate::session::registry::DeviceRegistry;
use crate::session::slot::SessionSlot;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// 无设备时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPolicy {
    /// 立即返回 `NoDevice`
    FailFast,
    /// 挂起直到设备可用；`timeout` 限制的是准入（等设备 + 排队），不含工作单元本身
    WaitForDevice { timeout: Option<Duration> },
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::WaitForDevice { timeout: None }
    }
}

/// 已打开的会话，仅在一个工作单元内有效
pub struct Session {
    handle: DeviceHandle,
    challenges: Arc<dyn ChallengeHandler>,
}

impl Session {
    pub fn device_id(&self) -> &DeviceId {
        self.handle.id()
    }

    pub fn label(&self) -> &str {
        self.handle.label()
    }

    /// fetch以太坊address
    pub async fn ethereum_get_address(&self, path: &DerivationPath, show_display: bool) -> Result<String> {
        debug!("EthereumGetAddress {} on {}", path, self.device_id());
        self.handle
            .transport()
            .ethereum_get_address(path, show_display, self.challenges.as_ref())
            .await
    }

    /// 请求设备签名
    pub async fn ethereum_sign_tx(&self, path: &DerivationPath, tx: &NormalizedTransaction) -> Result<SignatureResult> {
        debug!("EthereumSignTx {} on {}", path, self.device_id());
        self.handle
            .transport()
            .ethereum_sign_tx(path, tx, self.challenges.as_ref())
            .await
    }
}

/// 会话管理器
pub struct SessionManager {
    registry: Arc<DeviceRegistry>,
    challenges: Arc<dyn ChallengeHandler>,
    policy: SessionPolicy,
    /// 提交顺序的准入队列，不会被关闭
    admission: SessionSlot,
    active: AtomicUsize,
    pending: AtomicUsize,
}

/// 在所有退出路径上递减计数
struct CountGuard<'a>(&'a AtomicUsize);

impl<'a> CountGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CountGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SessionManager {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        challenges: Arc<dyn ChallengeHandler>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            registry,
            challenges,
            policy,
            admission: SessionSlot::new(DeviceId::new("admission")),
            active: AtomicUsize::new(0),
            pending: AtomicUsize::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// 正在执行的工作单元数量（0 或 1）
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// 已提交但尚未开始执行的请求数
    pub fn pending_requests(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// 当前设备上排队等待的请求数
    pub fn queued(&self) -> usize {
        self.registry
            .current_device()
            .map(|handle| handle.slot().queued())
            .unwrap_or(0)
    }

    /// 按配置策略独占执行
    pub async fn run_exclusive<T, F, Fut>(&self, work: F) -> Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_exclusive_with(self.policy, work).await
    }

    /// 以指定策略独占执行
    pub async fn run_exclusive_with<T, F, Fut>(&self, policy: SessionPolicy, work: F) -> Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let deadline = match policy {
            SessionPolicy::WaitForDevice { timeout: Some(timeout) } => Some((Instant::now() + timeout, timeout)),
            _ => None,
        };

        // 先占位再计数：计数可见时排队位置已确定
        let ticket = self.admission.enqueue()?;
        let pending = CountGuard::enter(&self.pending);
        let admission = within(deadline, ticket.granted()).await?;
        let handle = within(deadline, self.await_device(policy)).await?;
        let entry = handle.slot().enqueue()?;
        drop(admission);
        let _permit = within(deadline, entry.granted()).await?;
        drop(pending);

        let _active = CountGuard::enter(&self.active);
        debug!("session opened on {}", handle.id());

        let session = Session { handle: handle.clone(), challenges: Arc::clone(&self.challenges) };
        let outcome = tokio::select! {
            biased;
            _ = handle.detached() => {
                info!("device {} disconnected during session", handle.id());
                Err(ProviderError::disconnected(handle.id().as_str()))
            }
            result = work(session) => result,
        };

        debug!("session released on {}", handle.id());
        outcome
    }

    async fn await_device(&self, policy: SessionPolicy) -> Result<DeviceHandle> {
        // 先订阅再检查，避免错过变化
        let mut changes = self.registry.subscribe();
        loop {
            match self.registry.current_device() {
                Ok(handle) => return Ok(handle),
                Err(ProviderError::NoDevice) if matches!(policy, SessionPolicy::WaitForDevice { .. }) => {
                    debug!("no device attached, waiting...");
                    if changes.changed().await.is_err() {
                        return Err(ProviderError::NoDevice);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn within<T>(
    deadline: Option<(Instant, Duration)>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match deadline {
        None => fut.await,
        Some((at, waited)) => tokio::time::timeout_at(at, fut)
            .await
            .map_err(|_| ProviderError::DeviceTimeout { waited })?,
    }
}

//! 设备句柄与设备 I/O 边界
//!
//! USB/HID 传输与设备协议消息由外部实现 [`DeviceTransport`]；
//! 本 crate 只依赖地址派生与交易签名两个调用，以及设备发起的挑战回调。

use super::path::DerivationPath;
use crate::challenge::ChallengeHandler;
use crate::codec::{NormalizedTransaction, SignatureResult};
use crate::core::errors::Result;
use crate::session::slot::SessionSlot;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 稳定的设备标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// 连接事件中携带的设备特性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub label: String,
    /// 处于 bootloader/恢复模式
    pub bootloader: bool,
}

impl DeviceInfo {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { id: DeviceId::new(id), label: label.into(), bootloader: false }
    }

    pub fn in_bootloader(mut self) -> Self {
        self.bootloader = true;
        self
    }
}

/// 设备 I/O
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// `(path, show_display) -> address`
    async fn ethereum_get_address(
        &self,
        path: &DerivationPath,
        show_display: bool,
        challenges: &dyn ChallengeHandler,
    ) -> Result<String>;

    /// `(path, nonce, gasPrice, gasLimit, to, value, data) -> {v, r, s}`
    async fn ethereum_sign_tx(
        &self,
        path: &DerivationPath,
        tx: &NormalizedTransaction,
        challenges: &dyn ChallengeHandler,
    ) -> Result<SignatureResult>;
}

/// 传输层上报的连接事件
pub enum TransportEvent {
    Attached {
        info: DeviceInfo,
        transport: Arc<dyn DeviceTransport>,
    },
    Detached {
        id: DeviceId,
    },
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attached { info, .. } => f.debug_struct("Attached").field("info", info).finish(),
            Self::Detached { id } => f.debug_struct("Detached").field("id", id).finish(),
        }
    }
}

/// 已连接设备（由 registry 持有，会话只持有克隆的引用）
#[derive(Clone)]
pub struct DeviceHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    info: DeviceInfo,
    transport: Arc<dyn DeviceTransport>,
    slot: SessionSlot,
    detached: CancellationToken,
}

impl DeviceHandle {
    pub(crate) fn new(info: DeviceInfo, transport: Arc<dyn DeviceTransport>) -> Self {
        let slot = SessionSlot::new(info.id.clone());
        Self {
            inner: Arc::new(HandleInner {
                info,
                transport,
                slot,
                detached: CancellationToken::new(),
            }),
        }
    }

    pub fn id(&self) -> &DeviceId {
        &self.inner.info.id
    }

    pub fn label(&self) -> &str {
        &self.inner.info.label
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.inner.info
    }

    pub fn is_detached(&self) -> bool {
        self.inner.detached.is_cancelled()
    }

    /// 两个句柄是否指向同一次连接
    pub fn same_connection(&self, other: &DeviceHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn transport(&self) -> &Arc<dyn DeviceTransport> {
        &self.inner.transport
    }

    pub(crate) fn slot(&self) -> &SessionSlot {
        &self.inner.slot
    }

    /// 断开时完成的 future
    pub(crate) async fn detached(&self) {
        self.inner.detached.cancelled().await
    }

    /// 标记断开：中止进行中的会话并清空排队请求
    pub(crate) fn mark_detached(&self) {
        self.inner.detached.cancel();
        self.inner.slot.close();
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("id", self.id())
            .field("label", &self.label())
            .field("detached", &self.is_detached())
            .finish()
    }
}

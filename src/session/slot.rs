//! 单设备会话槽：严格 FIFO 的互斥队列
//!
//! 释放时会话直接移交给队首等待者，新到达的请求不会插队。
//! 设备断开后槽被关闭，所有排队请求以 `DeviceDisconnected` failed。

use crate::core::errors::{ProviderError, Result};
use crate::hardware::device::DeviceId;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::oneshot;
use tracing::{debug, warn};

type Grant = oneshot::Sender<Result<()>>;

pub(crate) struct SessionSlot {
    device_id: DeviceId,
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    busy: bool,
    closed: bool,
    waiters: VecDeque<Grant>,
}

/// 持有期间独占设备；drop 时移交给下一个等待者
pub(crate) struct SlotPermit<'a> {
    slot: &'a SessionSlot,
}

impl Drop for SlotPermit<'_> {
    fn drop(&mut self) {
        self.slot.release();
    }
}

/// 已在队列中占位的请求
///
/// 在拿到会话前被丢弃时负责归还已移交（或立即授予）的会话。
pub(crate) struct SlotEntry<'a> {
    slot: &'a SessionSlot,
    /// `None` 表示入队时会话空闲，已直接授予
    rx: Option<oneshot::Receiver<Result<()>>>,
    settled: bool,
}

impl Drop for SlotEntry<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        match self.rx.as_mut() {
            None => self.slot.release(),
            Some(rx) => {
                rx.close();
                if let Ok(Ok(())) = rx.try_recv() {
                    self.slot.release();
                }
            }
        }
    }
}

impl<'a> SlotEntry<'a> {
    /// 等待轮到自己
    pub(crate) async fn granted(mut self) -> Result<SlotPermit<'a>> {
        let granted = match self.rx.as_mut() {
            None => Ok(Ok(())),
            Some(rx) => rx.await,
        };
        self.settled = true;
        match granted {
            Ok(Ok(())) => Ok(SlotPermit { slot: self.slot }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProviderError::disconnected(self.slot.device_id.as_str())),
        }
    }
}

impl SessionSlot {
    pub(crate) fn new(device_id: DeviceId) -> Self {
        Self { device_id, state: Mutex::new(SlotState::default()) }
    }

    /// 立即占据队列位置（同步），随后通过 [`SlotEntry::granted`] 等待
    pub(crate) fn enqueue(&self) -> Result<SlotEntry<'_>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ProviderError::disconnected(self.device_id.as_str()));
        }
        if !state.busy && state.waiters.is_empty() {
            state.busy = true;
            return Ok(SlotEntry { slot: self, rx: None, settled: false });
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.push_back(tx);
        debug!("session busy on {}, queued at position {}", self.device_id, state.waiters.len());
        Ok(SlotEntry { slot: self, rx: Some(rx), settled: false })
    }

    /// 按到达顺序获取会话
    #[cfg(test)]
    pub(crate) async fn acquire(&self) -> Result<SlotPermit<'_>> {
        self.enqueue()?.granted().await
    }

    /// 关闭槽并清空排队请求
    pub(crate) fn close(&self) {
        let drained = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.waiters)
        };
        if !drained.is_empty() {
            warn!("⚠️ draining {} queued session(s) on {}", drained.len(), self.device_id);
        }
        for waiter in drained {
            let _ = waiter.send(Err(ProviderError::disconnected(self.device_id.as_str())));
        }
    }

    pub(crate) fn queued(&self) -> usize {
        self.state.lock().waiters.len()
    }

    #[cfg(test)]
    pub(crate) fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    fn release(&self) {
        let mut state = self.state.lock();
        while let Some(next) = state.waiters.pop_front() {
            // 等待者已取消时 send failed，继续移交下一个
            if next.send(Ok(())).is_ok() {
                return;
            }
        }
        state.busy = false;
    }
}

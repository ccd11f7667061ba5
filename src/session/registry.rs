//! 设备注册表
//!
//! 维护当前已连接设备集合并通知观察者。bootloader 模式的设备不会进入集合。
//! "恰好一个设备" 的约束在使用时检查：`current_device()` 在零个或多个设备时返回error，
//! 连接通知本身从不failed。

use crate::core::errors::{ProviderError, Result};
use crate::hardware::device::{DeviceHandle, DeviceId, DeviceInfo, DeviceTransport, TransportEvent};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// 连接通知
#[derive(Debug, Clone)]
pub enum ConnectEvent {
    Connected(DeviceHandle),
    /// 设备被拒绝（如 bootloader 模式），携带 `DeviceUnusable`
    Rejected(ProviderError),
}

type ConnectObserver = Box<dyn Fn(&ConnectEvent) + Send + Sync>;
type DisconnectObserver = Box<dyn Fn(&DeviceId) + Send + Sync>;

/// 设备注册表
pub struct DeviceRegistry {
    /// 按连接顺序排列
    devices: Mutex<Vec<DeviceHandle>>,
    on_connect: RwLock<Vec<ConnectObserver>>,
    on_disconnect: RwLock<Vec<DisconnectObserver>>,
    /// 每次设备集合变化时递增
    generation: watch::Sender<u64>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            devices: Mutex::new(Vec::new()),
            on_connect: RwLock::new(Vec::new()),
            on_disconnect: RwLock::new(Vec::new()),
            generation,
        }
    }

    /// 注册连接观察者（按注册顺序调用）
    pub fn on_connect(&self, handler: impl Fn(&ConnectEvent) + Send + Sync + 'static) {
        self.on_connect.write().push(Box::new(handler));
    }

    /// 注册断开观察者（按注册顺序调用）
    pub fn on_disconnect(&self, handler: impl Fn(&DeviceId) + Send + Sync + 'static) {
        self.on_disconnect.write().push(Box::new(handler));
    }

    /// 传输层上报设备连接
    pub fn device_connected(&self, info: DeviceInfo, transport: Arc<dyn DeviceTransport>) {
        if info.bootloader {
            warn!("⚠️ 设备 {} ({}) 处于 bootloader 模式，请重新连接", info.label, info.id);
            let rejected = ConnectEvent::Rejected(ProviderError::DeviceUnusable {
                device_id: info.id.to_string(),
                reason: "device is in bootloader mode, reconnect it".to_string(),
            });
            self.notify_connect(&rejected);
            return;
        }

        let handle = DeviceHandle::new(info, transport);
        let replaced = {
            let mut devices = self.devices.lock();
            let replaced = devices
                .iter()
                .position(|d| d.id() == handle.id())
                .map(|index| devices.remove(index));
            devices.push(handle.clone());
            replaced
        };
        // 同一标识重复连接：旧连接视为已断开
        if let Some(stale) = replaced {
            warn!("⚠️ 设备 {} 重新连接，关闭旧连接", stale.id());
            stale.mark_detached();
        }

        info!("✅ Connected device {} ({})", handle.label(), handle.id());
        self.bump();
        self.notify_connect(&ConnectEvent::Connected(handle));
    }

    /// 传输层上报设备断开
    pub fn device_disconnected(&self, id: &DeviceId) {
        let removed = {
            let mut devices = self.devices.lock();
            devices
                .iter()
                .position(|d| d.id() == id)
                .map(|index| devices.remove(index))
        };

        let Some(handle) = removed else {
            debug!("disconnect for unknown device {}", id);
            return;
        };

        info!("Disconnected device {} ({})", handle.label(), id);
        handle.mark_detached();
        self.bump();
        for observer in self.on_disconnect.read().iter() {
            observer(id);
        }
    }

    /// 应用一条传输层事件
    pub fn apply(&self, event: TransportEvent) {
        match event {
            TransportEvent::Attached { info, transport } => self.device_connected(info, transport),
            TransportEvent::Detached { id } => self.device_disconnected(&id),
        }
    }

    /// 消费传输层事件流，直到流关闭
    pub async fn pump(self: Arc<Self>, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.apply(event);
        }
        debug!("transport event stream closed");
    }

    /// 当前唯一可用的设备
    pub fn current_device(&self) -> Result<DeviceHandle> {
        let devices = self.devices.lock();
        match devices.as_slice() {
            [] => Err(ProviderError::NoDevice),
            [only] => Ok(only.clone()),
            many => Err(ProviderError::MultipleDevices { count: many.len() }),
        }
    }

    pub fn device_count(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn devices(&self) -> Vec<DeviceHandle> {
        self.devices.lock().clone()
    }

    /// 订阅设备集合变化
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    fn bump(&self) {
        self.generation.send_modify(|generation| *generation += 1);
    }

    fn notify_connect(&self, event: &ConnectEvent) {
        for observer in self.on_connect.read().iter() {
            observer(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::mock::MockDevice;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn attach(registry: &DeviceRegistry, id: &str) {
        registry.device_connected(DeviceInfo::new(id, "My Trezor"), Arc::new(MockDevice::new()));
    }

    #[test]
    fn test_zero_and_multiple_devices_detected_at_use_time() {
        let registry = DeviceRegistry::new();
        assert_eq!(registry.current_device().unwrap_err(), ProviderError::NoDevice);

        attach(&registry, "a");
        assert_eq!(registry.current_device().unwrap().id().as_str(), "a");

        attach(&registry, "b");
        assert_eq!(registry.device_count(), 2);
        assert_eq!(
            registry.current_device().unwrap_err(),
            ProviderError::MultipleDevices { count: 2 }
        );

        registry.device_disconnected(&DeviceId::new("a"));
        assert_eq!(registry.current_device().unwrap().id().as_str(), "b");
    }

    #[test]
    fn test_bootloader_device_rejected_and_reported() {
        let registry = DeviceRegistry::new();
        let rejected = Arc::new(AtomicUsize::new(0));
        {
            let rejected = Arc::clone(&rejected);
            registry.on_connect(move |event| {
                if let ConnectEvent::Rejected(ProviderError::DeviceUnusable { .. }) = event {
                    rejected.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        registry.device_connected(
            DeviceInfo::new("boot", "Recovery").in_bootloader(),
            Arc::new(MockDevice::new()),
        );
        assert_eq!(rejected.load(Ordering::SeqCst), 1);
        assert_eq!(registry.device_count(), 0);
    }

    #[test]
    fn test_observers_called_in_registration_order() {
        let registry = DeviceRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let calls = Arc::clone(&calls);
            registry.on_disconnect(move |id| calls.lock().push(format!("{}:{}", tag, id)));
        }

        attach(&registry, "dev");
        registry.device_disconnected(&DeviceId::new("dev"));
        assert_eq!(*calls.lock(), vec!["first:dev".to_string(), "second:dev".to_string()]);
    }

    #[test]
    fn test_disconnect_marks_handle_detached() {
        let registry = DeviceRegistry::new();
        attach(&registry, "dev");
        let handle = registry.current_device().unwrap();
        registry.device_disconnected(handle.id());
        assert!(handle.is_detached());
    }

    #[test]
    fn test_same_id_reconnect_replaces_stale_handle() {
        let registry = DeviceRegistry::new();
        attach(&registry, "dev");
        let stale = registry.current_device().unwrap();
        attach(&registry, "dev");

        let fresh = registry.current_device().unwrap();
        assert!(stale.is_detached());
        assert!(!fresh.same_connection(&stale));
        assert_eq!(registry.device_count(), 1);
    }

    #[tokio::test]
    async fn test_pump_applies_stream_events() {
        let registry = Arc::new(DeviceRegistry::new());
        let (tx, rx) = mpsc::channel(4);
        let pump = tokio::spawn(Arc::clone(&registry).pump(rx));

        tx.send(TransportEvent::Attached {
            info: DeviceInfo::new("usb-1", "Desk"),
            transport: Arc::new(MockDevice::new()),
        })
        .await
        .unwrap();
        tx.send(TransportEvent::Detached { id: DeviceId::new("usb-1") }).await.unwrap();
        drop(tx);
        pump.await.unwrap();

        assert_eq!(registry.device_count(), 0);
        assert_eq!(*registry.subscribe().borrow(), 2);
    }
}

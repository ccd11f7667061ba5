//! 硬件wallet设备抽象
//!
//! 设备句柄、派生路径以及设备 I/O 边界（[`DeviceTransport`]）。
//! USB/HID 传输与协议消息由外部实现。

pub mod device;
pub mod mock;
pub mod path;

pub use device::{DeviceHandle, DeviceId, DeviceInfo, DeviceTransport, TransportEvent};
pub use mock::MockDevice;
pub use path::DerivationPath;

//! 设备注册表与会话管理

pub mod manager;
pub mod registry;
pub(crate) mod slot;

pub use manager::{Session, SessionManager, SessionPolicy};
pub use registry::{ConnectEvent, DeviceRegistry};

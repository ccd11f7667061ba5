//! Provider error类型
//!
//! 所有设备、会话、编解码与挑战应答的failed都归入 [`ProviderError`]，
//! 原样返回给上游 provider pipeline，不做任何静默重试。

use std::time::Duration;
use thiserror::Error;

/// Custom error type for provider operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// No eligible device attached.
    #[error("No device connected")]
    NoDevice,

    /// More than one eligible device attached.
    #[error("Multiple devices connected ({count}); attach exactly one")]
    MultipleDevices { count: usize },

    /// Device is in bootloader/recovery mode.
    #[error("Device {device_id} is unusable: {reason}")]
    DeviceUnusable { device_id: String, reason: String },

    /// Device went away while a request was in flight or queued.
    #[error("Device {device_id} disconnected")]
    DeviceDisconnected { device_id: String },

    /// No device became available (or no session was granted) in time.
    #[error("Timed out after {waited:?} waiting for a device session")]
    DeviceTimeout { waited: Duration },

    /// Input is not valid hexadecimal.
    #[error("Invalid hex {input:?}: {reason}")]
    InvalidHex { input: String, reason: String },

    /// A transaction field could not be encoded.
    #[error("Encoding error in field `{field}`: {reason}")]
    Encoding { field: String, reason: String },

    /// Passphrase challenge raised but no resolver configured.
    #[error("Passphrase requested but no passphrase resolver is configured")]
    NoPassphraseResolver,

    /// PIN entry through the host is refused.
    #[error("PIN entry is not supported through this channel; unlock the device on its own display")]
    PinEntryUnsupported,

    /// The device rejected the PIN.
    #[error("PIN rejected by device: {0}")]
    PinRejected(String),

    /// Challenge resolver invoked more than once.
    #[error("Challenge was already resolved")]
    ChallengeAlreadyResolved,

    /// Challenge resolver dropped without being invoked.
    #[error("Challenge was dropped without a response")]
    ChallengeAbandoned,

    /// Passphrase source failed (I/O, empty stream, unreadable file).
    #[error("Passphrase unavailable: {0}")]
    PassphraseUnavailable(String),

    /// Device replied with a Failure message.
    #[error("Device failure: {0}")]
    DeviceFailure(String),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(String),
}

/// 稳定的error类别标签，供调用方匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoDevice,
    MultipleDevices,
    DeviceUnusable,
    DeviceDisconnected,
    DeviceTimeout,
    InvalidHex,
    Encoding,
    NoPassphraseResolver,
    PinRejected,
    Challenge,
    Passphrase,
    DeviceFailure,
    Config,
    Io,
}

impl ProviderError {
    /// fetch error 类别
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoDevice => ErrorKind::NoDevice,
            Self::MultipleDevices { .. } => ErrorKind::MultipleDevices,
            Self::DeviceUnusable { .. } => ErrorKind::DeviceUnusable,
            Self::DeviceDisconnected { .. } => ErrorKind::DeviceDisconnected,
            Self::DeviceTimeout { .. } => ErrorKind::DeviceTimeout,
            Self::InvalidHex { .. } => ErrorKind::InvalidHex,
            Self::Encoding { .. } => ErrorKind::Encoding,
            Self::NoPassphraseResolver => ErrorKind::NoPassphraseResolver,
            Self::PinEntryUnsupported | Self::PinRejected(_) => ErrorKind::PinRejected,
            Self::ChallengeAlreadyResolved | Self::ChallengeAbandoned => ErrorKind::Challenge,
            Self::PassphraseUnavailable(_) => ErrorKind::Passphrase,
            Self::DeviceFailure(_) => ErrorKind::DeviceFailure,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// 判断是否为设备可用性相关error
    pub fn is_device_state(&self) -> bool {
        matches!(
            self,
            Self::NoDevice
                | Self::MultipleDevices { .. }
                | Self::DeviceUnusable { .. }
                | Self::DeviceDisconnected { .. }
                | Self::DeviceTimeout { .. }
        )
    }

    pub(crate) fn disconnected(device_id: impl Into<String>) -> Self {
        Self::DeviceDisconnected { device_id: device_id.into() }
    }

    pub(crate) fn encoding(field: &str, reason: impl Into<String>) -> Self {
        Self::Encoding { field: field.to_string(), reason: reason.into() }
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        ProviderError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ProviderError {
    fn from(err: toml::de::Error) -> Self {
        ProviderError::Config(err.to_string())
    }
}

/// Provider 结果类型
pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_no_device() {
        assert_eq!(ProviderError::NoDevice.to_string(), "No device connected");
    }

    #[test]
    fn test_display_encoding_error() {
        let err = ProviderError::encoding("to", "expected 20 bytes, got 3");
        assert_eq!(format!("{}", err), "Encoding error in field `to`: expected 20 bytes, got 3");
    }

    #[test]
    fn test_kind_groups_pin_errors() {
        assert_eq!(ProviderError::PinEntryUnsupported.kind(), ErrorKind::PinRejected);
        assert_eq!(ProviderError::PinRejected("bad".into()).kind(), ErrorKind::PinRejected);
    }

    #[test]
    fn test_device_state_classification() {
        assert!(ProviderError::NoDevice.is_device_state());
        assert!(ProviderError::disconnected("abc").is_device_state());
        assert!(!ProviderError::NoPassphraseResolver.is_device_state());
    }

    #[test]
    fn test_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ProviderError = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}

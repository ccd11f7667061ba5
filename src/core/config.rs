use crate::core::errors::{ProviderError, Result};
use crate::hardware::path::DerivationPath;
use crate::session::manager::SessionPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Derivation path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivationConfig {
    #[serde(default = "DerivationConfig::default_path")]
    pub path: String,
}

impl DerivationConfig {
    fn default_path() -> String {
        "m/44'/60'/0'/0/0".to_string()
    }
}

impl Default for DerivationConfig {
    fn default() -> Self {
        Self { path: Self::default_path() }
    }
}

/// Session admission configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Suspend until a device is attached (otherwise fail fast)
    #[serde(default = "SessionConfig::default_wait_for_device")]
    pub wait_for_device: bool,

    /// Admission timeout (seconds); unset waits indefinitely
    #[serde(default)]
    pub device_timeout_secs: Option<u64>,
}

impl SessionConfig {
    fn default_wait_for_device() -> bool { true }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wait_for_device: Self::default_wait_for_device(),
            device_timeout_secs: None,
        }
    }
}

/// Passphrase 来源
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassphraseSource {
    #[default]
    None,
    Prompt,
    File,
}

/// Passphrase configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassphraseConfig {
    #[serde(default)]
    pub source: PassphraseSource,

    /// Overrides the platform default location when `source = "file"`
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// provider配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub derivation: DerivationConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub passphrase: PassphraseConfig,
}

impl ProviderConfig {
    /// from TOML 字符串解析
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// from TOML 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProviderError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        self.derivation_path().map(|_| ())
    }

    pub fn derivation_path(&self) -> Result<DerivationPath> {
        self.derivation.path.parse()
    }

    pub fn session_policy(&self) -> SessionPolicy {
        let timeout = self.session.device_timeout_secs.map(Duration::from_secs);
        if self.session.wait_for_device {
            SessionPolicy::WaitForDevice { timeout }
        } else {
            SessionPolicy::FailFast
        }
    }
}

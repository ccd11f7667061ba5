//! BIP32 派生路径

use crate::core::errors::{ProviderError, Result};
use std::fmt;
use std::str::FromStr;

/// Hardened 标志位
pub const HARDENED: u32 = 0x8000_0000;

/// BIP32 路径（构造后不可变）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    components: Vec<u32>,
}

impl DerivationPath {
    /// 创建新的派生路径
    pub fn new(components: Vec<u32>) -> Self {
        Self { components }
    }

    /// BIP44 Ethereum 路径 m/44'/60'/0'/0/{index}
    pub fn ethereum(index: u32) -> Self {
        Self::new(vec![44 | HARDENED, 60 | HARDENED, HARDENED, 0, index])
    }

    pub fn components(&self) -> &[u32] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl FromStr for DerivationPath {
    type Err = ProviderError;

    /// from字符串解析（如 "m/44'/60'/0'/0/0"）
    fn from_str(path_str: &str) -> Result<Self> {
        let invalid = |reason: &str| ProviderError::Config(format!("{}: {}", reason, path_str));

        let rest = path_str
            .strip_prefix("m/")
            .ok_or_else(|| invalid("路径必须以 m/ 开头"))?;
        if rest.is_empty() {
            return Err(invalid("路径必须包含至少一个组件"));
        }

        let mut components = Vec::new();
        for part in rest.split('/') {
            let (digits, hardened) = match part.strip_suffix('\'').or_else(|| part.strip_suffix('h')) {
                Some(digits) => (digits, true),
                None => (part, false),
            };
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid("路径组件无效"));
            }
            let index: u32 = digits.parse().map_err(|_| invalid("路径组件溢出"))?;
            if index >= HARDENED {
                return Err(invalid("路径组件超出范围"));
            }
            components.push(if hardened { index | HARDENED } else { index });
        }

        Ok(Self { components })
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for component in &self.components {
            if component & HARDENED != 0 {
                write!(f, "/{}'", component & !HARDENED)?;
            } else {
                write!(f, "/{}", component)?;
            }
        }
        Ok(())
    }
}

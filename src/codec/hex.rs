//! 十六进制规范化
//!
//! 所有交易字段都以可空的十六进制字符串传入。`None` 表示字段缺失，
//! 与空字节序列等价，但不等于 0。

use crate::core::errors::{ProviderError, Result};

/// 规范化十六进制字符串
///
/// - `None` 原样返回 `None`
/// - 去掉 `0x`/`0X` 前缀
/// - 奇数位时在左侧补一个 `0`
/// - 含非十六进制字符时返回 [`ProviderError::InvalidHex`]
pub fn normalize_hex(input: Option<&str>) -> Result<Option<String>> {
    let Some(raw) = input else {
        return Ok(None);
    };

    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);

    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(ProviderError::InvalidHex {
            input: raw.to_string(),
            reason: format!("unexpected character {:?}", bad),
        });
    }

    // 左补零：数值字段依赖此规则
    if digits.len() % 2 != 0 {
        Ok(Some(format!("0{}", digits)))
    } else {
        Ok(Some(digits.to_string()))
    }
}

/// 转换为字节序列；`None` 与空串都得到零长度序列
pub fn to_bytes(hex_or_null: Option<&str>) -> Result<Vec<u8>> {
    match normalize_hex(hex_or_null)? {
        None => Ok(Vec::new()),
        Some(digits) => hex::decode(&digits).map_err(|e| ProviderError::InvalidHex {
            input: digits,
            reason: e.to_string(),
        }),
    }
}

/// 以 `0x` 前缀输出小写十六进制
pub fn prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

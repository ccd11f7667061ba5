//! Legacy 签名交易组装
//!
//! 只负责把设备已经签好的 (v, r, s) 与原始交易字段编码为
//! `rlp([nonce, gasPrice, gasLimit, to, value, data, v, r, s])`，本身不做任何签名。

use super::hex::{normalize_hex, prefixed, to_bytes};
use crate::core::errors::{ProviderError, Result};
use ethers::utils::rlp::RlpStream;
use serde::{Deserialize, Deserializer, Serialize};

/// 整数字段最大字节数
const MAX_SCALAR_BYTES: usize = 32;
/// 以太坊address字节数
const ADDRESS_BYTES: usize = 20;
/// Legacy 交易字段数（含签名）
const SIGNED_FIELD_COUNT: usize = 9;

/// 上游 pipeline 传入的交易参数（`txParams`）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub gas_price: Option<String>,
    #[serde(default, alias = "gasLimit")]
    pub gas: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, alias = "input")]
    pub data: Option<String>,
    #[serde(default, deserialize_with = "deserialize_chain_id", skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

/// 规范化后发送给设备的字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedTransaction {
    pub nonce: Option<String>,
    pub gas_price: Option<String>,
    pub gas_limit: Option<String>,
    pub to: Option<String>,
    pub value: Option<String>,
    pub data: Option<String>,
    pub chain_id: Option<u64>,
}

/// 设备返回的签名
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureResult {
    /// recovery id（可能已含 EIP-155 chain id）
    pub v: u64,
    pub r: String,
    pub s: String,
}

impl TransactionRequest {
    /// 规范化所有十六进制字段
    pub fn normalized(&self) -> Result<NormalizedTransaction> {
        Ok(NormalizedTransaction {
            nonce: normalize_hex(self.nonce.as_deref())?,
            gas_price: normalize_hex(self.gas_price.as_deref())?,
            gas_limit: normalize_hex(self.gas.as_deref())?,
            to: normalize_hex(self.to.as_deref())?,
            value: normalize_hex(self.value.as_deref())?,
            data: normalize_hex(self.data.as_deref())?,
            chain_id: self.chain_id,
        })
    }
}

/// 组装已签名的 legacy 交易，返回 `0x` 前缀的十六进制
pub fn assemble_legacy_signed_transaction(
    request: &TransactionRequest,
    signature: &SignatureResult,
) -> Result<String> {
    let nonce = scalar_field("nonce", request.nonce.as_deref())?;
    let gas_price = scalar_field("gasPrice", request.gas_price.as_deref())?;
    let gas_limit = scalar_field("gasLimit", request.gas.as_deref())?;
    let to = address_field("to", request.to.as_deref())?;
    let value = scalar_field("value", request.value.as_deref())?;
    let data = field_bytes("data", request.data.as_deref())?;
    let r = scalar_field("r", Some(signature.r.as_str()))?;
    let s = scalar_field("s", Some(signature.s.as_str()))?;

    let mut stream = RlpStream::new_list(SIGNED_FIELD_COUNT);
    stream
        .append(&nonce)
        .append(&gas_price)
        .append(&gas_limit)
        .append(&to)
        .append(&value)
        .append(&data)
        .append(&signature.v)
        .append(&r)
        .append(&s);

    Ok(prefixed(&stream.out()))
}

/// 签名前检查所有字段都能编码，避免user在设备上确认一笔无法序列化的交易
pub fn check_encodable(request: &TransactionRequest) -> Result<()> {
    scalar_field("nonce", request.nonce.as_deref())?;
    scalar_field("gasPrice", request.gas_price.as_deref())?;
    scalar_field("gasLimit", request.gas.as_deref())?;
    address_field("to", request.to.as_deref())?;
    scalar_field("value", request.value.as_deref())?;
    field_bytes("data", request.data.as_deref())?;
    Ok(())
}

fn field_bytes(field: &str, value: Option<&str>) -> Result<Vec<u8>> {
    to_bytes(value).map_err(|e| ProviderError::encoding(field, e.to_string()))
}

/// 整数字段：去掉前导零字节，最多 32 字节
fn scalar_field(field: &str, value: Option<&str>) -> Result<Vec<u8>> {
    let bytes = field_bytes(field, value)?;
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let stripped = bytes[first..].to_vec();
    if stripped.len() > MAX_SCALAR_BYTES {
        return Err(ProviderError::encoding(
            field,
            format!("{} bytes exceeds {} byte limit", stripped.len(), MAX_SCALAR_BYTES),
        ));
    }
    Ok(stripped)
}

/// 接收方：空（合约创建）或恰好 20 字节
fn address_field(field: &str, value: Option<&str>) -> Result<Vec<u8>> {
    let bytes = field_bytes(field, value)?;
    if !bytes.is_empty() && bytes.len() != ADDRESS_BYTES {
        return Err(ProviderError::encoding(
            field,
            format!("expected {} bytes, got {}", ADDRESS_BYTES, bytes.len()),
        ));
    }
    Ok(bytes)
}

fn deserialize_chain_id<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ChainId {
        Number(u64),
        Text(String),
    }

    match Option::<ChainId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(ChainId::Number(id)) => Ok(Some(id)),
        Some(ChainId::Text(text)) => {
            let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                Some(digits) => u64::from_str_radix(digits, 16),
                None => text.parse(),
            };
            parsed.map(Some).map_err(serde::de::Error::custom)
        }
    }
}

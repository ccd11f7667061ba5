//! 交易字段编解码
//!
//! 纯函数：十六进制规范化、字节转换、legacy 签名交易组装。无状态、无 I/O。

pub mod hex;
pub mod transaction;

pub use self::hex::{normalize_hex, prefixed, to_bytes};
pub use transaction::{
    assemble_legacy_signed_transaction, check_encodable, NormalizedTransaction, SignatureResult, TransactionRequest,
};

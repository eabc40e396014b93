//! 驱动层错误类型定义

use armsync_protocol::{ProtocolError, WriteSeq};
use thiserror::Error;

/// 槽位介质错误
#[derive(Error, Debug)]
pub enum MediumError {
    /// 底层 I/O 错误
    #[error("Medium I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 介质暂不可用
    #[error("Medium unavailable: {0}")]
    Unavailable(String),

    /// 注入的故障（测试用）
    #[error("Injected medium fault")]
    Injected,
}

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 命令写入失败（调用方重试；覆盖写保证重试幂等）
    #[error("Command write {seq} failed: {source}")]
    WriteFailed {
        seq: WriteSeq,
        #[source]
        source: MediumError,
    },

    /// 介质读写错误
    #[error("Medium error: {0}")]
    Medium(#[from] MediumError),

    /// 协议编解码错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl DriverError {
    /// 是否值得重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::WriteFailed { .. } | Self::Medium(_))
    }
}

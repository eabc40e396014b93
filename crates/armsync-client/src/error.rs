//! 客户端错误类型
//!
//! 同步协议本身没有致命错误：陈旧确认被忽略，半写记录按“尚无确认”处理，
//! 超时回退到本地目标。这里的错误只出现在调用方接口上。

use crate::machine::DispatchPhase;
use armsync_driver::DriverError;
use thiserror::Error;

/// 客户端错误类型
#[derive(Debug, Error)]
pub enum ClientError {
    /// 急停期间拒绝新命令
    #[error("Dispatch is halted; call resume() before enqueueing")]
    Halted,

    /// 队列管理器已关闭
    #[error("Queue manager has shut down")]
    ShutDown,

    /// 非法的调度状态转换
    #[error("Invalid dispatch transition: {from} -> {to}")]
    InvalidTransition {
        /// 起始状态
        from: DispatchPhase,
        /// 目标状态
        to: DispatchPhase,
    },

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 驱动层错误
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
}

impl ClientError {
    /// 是否可重试
    ///
    /// `Halted` 在 `resume()` 之后重试即可成功。
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Halted => true,
            ClientError::Driver(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// 是否为程序错误（调度状态机被错误驱动）
    pub fn is_bug(&self) -> bool {
        matches!(self, ClientError::InvalidTransition { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armsync_driver::MediumError;
    use armsync_protocol::WriteSeq;

    #[test]
    fn test_error_display() {
        let err = ClientError::InvalidTransition {
            from: DispatchPhase::Waiting,
            to: DispatchPhase::Sent,
        };
        assert_eq!(err.to_string(), "Invalid dispatch transition: Waiting -> Sent");
        assert!(err.is_bug());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ClientError::Halted.is_retryable());
        assert!(!ClientError::ShutDown.is_retryable());
        assert!(!ClientError::Config("bad".into()).is_retryable());

        let write = ClientError::from(DriverError::WriteFailed {
            seq: WriteSeq(1),
            source: MediumError::Injected,
        });
        assert!(write.is_retryable());
    }
}

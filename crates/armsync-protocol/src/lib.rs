//! # armsync Protocol
//!
//! 命令槽 / 确认槽协议定义（无介质依赖）
//!
//! ## 模块
//!
//! - `pose`: 位姿与夹爪宽度
//! - `command`: 命令记录（生产者 → 执行器）
//! - `ack`: 确认记录（执行器 → 生产者）
//!
//! ## 线格式
//!
//! 两个槽位都存放单条 JSON 记录（覆盖写，last-write-wins）。
//! 新鲜度只比较单调递增的 `seq`，`issued_at_ms` / `write_time_ms`
//! 仅用于日志和诊断，不参与判定（墙上时钟可能回拨）。

pub mod ack;
pub mod command;
pub mod pose;

// 重新导出常用类型
pub use ack::{AckRecord, Acknowledgment, ConfirmedState};
pub use command::{Command, CommandRecord, Target, WriteSeq};
pub use pose::{GRIPPER_CLOSED, GRIPPER_OPEN, Pose, Position, Rotation};

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// JSON 解析失败（包括被截断的半写记录）
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// 旋转分量不完整（rx/ry/rz 必须同时出现或同时缺省）
    #[error("Incomplete rotation: rx/ry/rz must be all present or all absent")]
    IncompleteRotation,

    /// 非有限数值（NaN / Inf）
    #[error("Non-finite value for field {field}")]
    NonFinite { field: &'static str },
}

/// 当前墙上时钟（毫秒）
///
/// 只用于记录写入时间，不用于新鲜度比较。
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

pub(crate) fn check_finite(field: &'static str, value: f64) -> Result<f64, ProtocolError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ProtocolError::NonFinite { field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn test_check_finite() {
        assert_eq!(check_finite("x", 1.5).unwrap(), 1.5);
        assert!(matches!(
            check_finite("y", f64::NAN),
            Err(ProtocolError::NonFinite { field: "y" })
        ));
        assert!(check_finite("z", f64::INFINITY).is_err());
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::IncompleteRotation;
        assert!(format!("{}", err).contains("rx/ry/rz"));

        let err = ProtocolError::NonFinite { field: "gripper_width" };
        assert_eq!(format!("{}", err), "Non-finite value for field gripper_width");

        let json_err = serde_json::from_str::<serde_json::Value>("{\"x\": 1.0").unwrap_err();
        let err: ProtocolError = json_err.into();
        assert!(format!("{}", err).starts_with("JSON decode error"));
    }
}

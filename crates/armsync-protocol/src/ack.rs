//! 确认记录（执行器 → 生产者）
//!
//! 执行器每完成一次运动写一次确认槽，回显它所执行命令的 `seq`。

use crate::command::WriteSeq;
use crate::pose::Position;
use crate::{ProtocolError, check_finite};
use serde::{Deserialize, Serialize};

/// 确认记录
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acknowledgment {
    /// 运动是否完成
    pub completed: bool,
    /// 被确认命令的序号
    pub seq: WriteSeq,
    /// 实际到达的位置
    pub position: Position,
    /// 实际夹爪宽度（如执行器可读回）
    pub gripper: Option<f64>,
    /// 执行器写入时间（毫秒），仅用于诊断
    pub write_time_ms: u64,
}

impl Acknowledgment {
    /// 该确认是否足以证明 `seq` 对应的命令已完成
    ///
    /// 序号较旧的确认属于之前的命令；`completed == false` 表示仍在执行。
    #[inline]
    pub fn is_fresh_for(&self, seq: WriteSeq) -> bool {
        self.seq.confirms(seq)
    }

    /// 提取已确认状态
    pub fn confirmed_state(&self) -> ConfirmedState {
        ConfirmedState {
            seq: self.seq,
            position: self.position,
            gripper: self.gripper,
            write_time_ms: self.write_time_ms,
        }
    }

    /// 编码为确认槽的 JSON 载荷
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let record = AckRecord::from(self);
        Ok(serde_json::to_vec_pretty(&record)?)
    }

    /// 从确认槽载荷解码
    ///
    /// 执行器写到一半时读到的截断记录会在这里失败，调用方应视为“尚无确认”。
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let record: AckRecord = serde_json::from_slice(payload)?;
        record.try_into()
    }
}

/// 执行器确认的实际状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfirmedState {
    pub seq: WriteSeq,
    pub position: Position,
    pub gripper: Option<f64>,
    pub write_time_ms: u64,
}

/// 确认槽上的平铺 JSON 记录
///
/// ```text
/// { "completed": true, "seq": 3, "x": .., "y": .., "z": ..,
///   "gripper_width"?: .., "write_time_ms": ... }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckRecord {
    pub completed: bool,
    pub seq: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gripper_width: Option<f64>,
    #[serde(default)]
    pub write_time_ms: u64,
}

impl From<&Acknowledgment> for AckRecord {
    fn from(ack: &Acknowledgment) -> Self {
        AckRecord {
            completed: ack.completed,
            seq: ack.seq.0,
            x: ack.position.x,
            y: ack.position.y,
            z: ack.position.z,
            gripper_width: ack.gripper,
            write_time_ms: ack.write_time_ms,
        }
    }
}

impl TryFrom<AckRecord> for Acknowledgment {
    type Error = ProtocolError;

    fn try_from(record: AckRecord) -> Result<Self, Self::Error> {
        let gripper = match record.gripper_width {
            Some(w) => Some(check_finite("gripper_width", w)?),
            None => None,
        };
        Ok(Acknowledgment {
            completed: record.completed,
            seq: WriteSeq(record.seq),
            position: Position::new(
                check_finite("x", record.x)?,
                check_finite("y", record.y)?,
                check_finite("z", record.z)?,
            ),
            gripper,
            write_time_ms: record.write_time_ms,
        })
    }
}

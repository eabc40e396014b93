//! 命令记录（生产者 → 执行器）
//!
//! 命令槽永远只保存“最新的期望目标”，新命令覆盖未消费的旧命令。

use crate::pose::{Pose, Position, Rotation};
use crate::{ProtocolError, check_finite};
use serde::{Deserialize, Serialize};

/// 写入序号
///
/// 每次成功写入命令槽分配一个单调递增的序号，执行器在确认记录中原样回显。
/// 确认有效当且仅当 `ack.seq >= command.seq`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriteSeq(pub u64);

impl WriteSeq {
    /// 尚未写过任何命令
    pub const ZERO: WriteSeq = WriteSeq(0);

    /// 下一个序号
    #[inline]
    pub fn next(self) -> WriteSeq {
        WriteSeq(self.0.saturating_add(1))
    }

    /// 判断该确认序号是否足以证明 `command` 已执行
    #[inline]
    pub fn confirms(self, command: WriteSeq) -> bool {
        self >= command
    }
}

impl std::fmt::Display for WriteSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 命令目标
///
/// 夹爪变化不单独成为一次需要确认的步骤，而是折叠进下一条位姿命令，
/// 因此用带标签的变体显式区分。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    /// 仅位姿
    PoseOnly { pose: Pose },
    /// 位姿 + 夹爪宽度（米）
    PoseWithGripper { pose: Pose, gripper: f64 },
}

impl Target {
    /// 仅位置的目标
    pub fn position(x: f64, y: f64, z: f64) -> Self {
        Target::PoseOnly { pose: Pose::at(x, y, z) }
    }

    /// 目标位姿
    pub fn pose(&self) -> &Pose {
        match self {
            Target::PoseOnly { pose } | Target::PoseWithGripper { pose, .. } => pose,
        }
    }

    /// 附带的夹爪宽度（如有）
    pub fn gripper(&self) -> Option<f64> {
        match self {
            Target::PoseOnly { .. } => None,
            Target::PoseWithGripper { gripper, .. } => Some(*gripper),
        }
    }

    /// 折叠一个夹爪变化，返回新的目标
    pub fn with_gripper(self, gripper: f64) -> Self {
        Target::PoseWithGripper {
            pose: *self.pose(),
            gripper,
        }
    }
}

impl From<Pose> for Target {
    fn from(pose: Pose) -> Self {
        Target::PoseOnly { pose }
    }
}

impl From<Position> for Target {
    fn from(position: Position) -> Self {
        Target::PoseOnly { pose: position.into() }
    }
}

/// 一条已编号的命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    /// 写入序号
    pub seq: WriteSeq,
    /// 写入时的墙上时钟（毫秒），仅用于诊断
    pub issued_at_ms: u64,
    /// 目标
    pub target: Target,
}

impl Command {
    /// 编码为命令槽的 JSON 载荷
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let record = CommandRecord::from(self);
        Ok(serde_json::to_vec_pretty(&record)?)
    }

    /// 从命令槽载荷解码
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let record: CommandRecord = serde_json::from_slice(payload)?;
        record.try_into()
    }
}

/// 命令槽上的平铺 JSON 记录
///
/// ```text
/// { "seq": 3, "issued_at_ms": ..., "x": .., "y": .., "z": ..,
///   "rx"?: .., "ry"?: .., "rz"?: .., "gripper_width"?: .. }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub seq: u64,
    #[serde(default)]
    pub issued_at_ms: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ry: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rz: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gripper_width: Option<f64>,
}

impl From<&Command> for CommandRecord {
    fn from(cmd: &Command) -> Self {
        let pose = cmd.target.pose();
        let (rx, ry, rz) = match pose.rotation {
            Some(r) => (Some(r.rx), Some(r.ry), Some(r.rz)),
            None => (None, None, None),
        };
        CommandRecord {
            seq: cmd.seq.0,
            issued_at_ms: cmd.issued_at_ms,
            x: pose.position.x,
            y: pose.position.y,
            z: pose.position.z,
            rx,
            ry,
            rz,
            gripper_width: cmd.target.gripper(),
        }
    }
}

impl TryFrom<CommandRecord> for Command {
    type Error = ProtocolError;

    fn try_from(record: CommandRecord) -> Result<Self, Self::Error> {
        let position = Position::new(
            check_finite("x", record.x)?,
            check_finite("y", record.y)?,
            check_finite("z", record.z)?,
        );
        let rotation = match (record.rx, record.ry, record.rz) {
            (Some(rx), Some(ry), Some(rz)) => Some(Rotation::new(
                check_finite("rx", rx)?,
                check_finite("ry", ry)?,
                check_finite("rz", rz)?,
            )),
            (None, None, None) => None,
            _ => return Err(ProtocolError::IncompleteRotation),
        };
        let pose = Pose { position, rotation };
        let target = match record.gripper_width {
            Some(w) => Target::PoseWithGripper {
                pose,
                gripper: check_finite("gripper_width", w)?,
            },
            None => Target::PoseOnly { pose },
        };
        Ok(Command {
            seq: WriteSeq(record.seq),
            issued_at_ms: record.issued_at_ms,
            target,
        })
    }
}

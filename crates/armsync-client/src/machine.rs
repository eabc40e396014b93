//! 调度状态机
//!
//! ```text
//!          ┌──────── write ok ────────┐
//!          │                          ▼
//!        Idle ◀──── Acked ◀──┐      Sent
//!          ▲                 │        │
//!          └──── TimedOut ◀──┴── Waiting
//! ```
//!
//! 任何命令在 `Waiting` 期间都不能进入 `Sent`，这就是“最多一条在途”的保证。
//! 非法转换返回 `ClientError::InvalidTransition`，不会静默修正。

use crate::error::ClientError;
use std::fmt;

/// 调度阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DispatchPhase {
    /// 没有在途命令
    #[default]
    Idle,
    /// 命令刚写入命令槽
    Sent,
    /// 等待确认
    Waiting,
    /// 收到新鲜确认
    Acked,
    /// 等待超时
    TimedOut,
}

impl DispatchPhase {
    /// 是否允许从 `self` 转换到 `to`
    pub fn can_transition_to(self, to: DispatchPhase) -> bool {
        use DispatchPhase::*;
        matches!(
            (self, to),
            (Idle, Sent)
                | (Sent, Waiting)
                | (Waiting, Acked)
                | (Waiting, TimedOut)
                | (Acked, Idle)
                | (TimedOut, Idle)
        )
    }

    /// 是否有命令在途
    pub fn is_in_flight(self) -> bool {
        matches!(self, DispatchPhase::Sent | DispatchPhase::Waiting)
    }
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchPhase::Idle => "Idle",
            DispatchPhase::Sent => "Sent",
            DispatchPhase::Waiting => "Waiting",
            DispatchPhase::Acked => "Acked",
            DispatchPhase::TimedOut => "TimedOut",
        };
        f.write_str(name)
    }
}

/// 带转换检查的阶段单元
#[derive(Debug, Default)]
pub struct PhaseMachine {
    phase: DispatchPhase,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前阶段
    pub fn phase(&self) -> DispatchPhase {
        self.phase
    }

    /// 转换到 `to`
    ///
    /// # 错误
    ///
    /// 转换不合法时返回 `ClientError::InvalidTransition`，阶段保持不变。
    pub fn transition(&mut self, to: DispatchPhase) -> Result<(), ClientError> {
        if !self.phase.can_transition_to(to) {
            return Err(ClientError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    /// 放弃在途命令，直接回到 `Idle`
    ///
    /// 只在生产者关闭时使用。
    pub(crate) fn abandon(&mut self) {
        self.phase = DispatchPhase::Idle;
    }
}

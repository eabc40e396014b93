//! 位置状态
//!
//! 生产者在两条命令之间的“事实来源”。只有以下几种情况会修改它：
//!
//! - 启动时的引导（确认槽 → 命令槽 → 配置的起始位置）
//! - 本地的夹爪变化（立即生效，随后折叠进下一条命令）
//! - 收到新鲜确认
//! - 等待超时后回退到本地目标
//!
//! 在途但尚未确认的命令不会修改它。

use crate::config::SyncConfig;
use armsync_driver::{SlotKind, SlotMedium};
use armsync_protocol::{Acknowledgment, Command, ConfirmedState, Pose, Target, WriteSeq};
use std::time::Instant;
use tracing::{debug, info};

/// 状态来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateSource {
    /// 启动引导（配置或遗留命令）
    Initial,
    /// 本地修改（夹爪）
    Local,
    /// 执行器确认
    Confirmed,
    /// 超时回退
    Fallback,
}

/// 已知位置状态
#[derive(Debug, Clone, PartialEq)]
pub struct PositionState {
    /// 位姿
    pub pose: Pose,
    /// 夹爪宽度（米）
    pub gripper: f64,
    /// 来源
    pub source: StateSource,
    /// 最近一次确认的命令序号
    pub confirmed_seq: Option<WriteSeq>,
    /// 更新时刻
    pub updated_at: Instant,
}

impl PositionState {
    /// 由配置的起始位置构造
    pub fn initial(config: &SyncConfig) -> Self {
        Self {
            pose: config.initial_pose.into(),
            gripper: config.initial_gripper,
            source: StateSource::Initial,
            confirmed_seq: None,
            updated_at: Instant::now(),
        }
    }

    /// 从介质引导
    ///
    /// 依次尝试：确认槽中的已确认状态、命令槽中的最后目标、配置的起始位置。
    /// 槽位无法读取或解析时跳到下一个来源。
    pub fn bootstrap(medium: &dyn SlotMedium, config: &SyncConfig) -> Self {
        let mut state = Self::initial(config);

        if let Some(ack) = read_decoded(medium, SlotKind::Ack, Acknowledgment::decode) {
            state.pose = ack.position.into();
            state.gripper = ack.gripper.unwrap_or(config.initial_gripper);
            state.source = StateSource::Confirmed;
            state.confirmed_seq = Some(ack.seq);
            info!("Bootstrapped position {} from ack {}", state.pose, ack.seq);
        } else if let Some(cmd) = read_decoded(medium, SlotKind::Command, Command::decode) {
            state.pose = *cmd.target.pose();
            state.gripper = cmd.target.gripper().unwrap_or(config.initial_gripper);
            info!("Bootstrapped position {} from last command {}", state.pose, cmd.seq);
        } else {
            info!("Bootstrapped position {} from configuration", state.pose);
        }
        state
    }

    /// 应用新鲜确认
    ///
    /// 确认只携带位置；旋转沿用命令目标。执行器未回读夹爪时沿用目标或当前值。
    pub(crate) fn confirm(&mut self, confirmed: &ConfirmedState, target: &Target) {
        self.pose = Pose {
            position: confirmed.position,
            rotation: target.pose().rotation,
        };
        self.gripper = confirmed.gripper.or(target.gripper()).unwrap_or(self.gripper);
        self.source = StateSource::Confirmed;
        self.confirmed_seq = Some(confirmed.seq);
        self.updated_at = Instant::now();
    }

    /// 超时回退到本地目标
    pub(crate) fn fall_back_to(&mut self, target: &Target) {
        self.pose = *target.pose();
        if let Some(width) = target.gripper() {
            self.gripper = width;
        }
        self.source = StateSource::Fallback;
        self.updated_at = Instant::now();
    }

    /// 本地夹爪变化
    pub(crate) fn set_gripper_local(&mut self, width: f64) {
        self.gripper = width;
        self.source = StateSource::Local;
        self.updated_at = Instant::now();
    }
}

fn read_decoded<T, E: std::fmt::Display>(
    medium: &dyn SlotMedium,
    slot: SlotKind,
    decode: impl FnOnce(&[u8]) -> Result<T, E>,
) -> Option<T> {
    let bytes = match medium.read_slot(slot) {
        Ok(bytes) => bytes?,
        Err(e) => {
            debug!("Bootstrap could not read {} slot: {}", slot, e);
            return None;
        },
    };
    decode(&bytes)
        .map_err(|e| debug!("Bootstrap ignoring unreadable {} slot: {}", slot, e))
        .ok()
}

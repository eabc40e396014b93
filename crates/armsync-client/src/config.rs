//! 同步配置
//!
//! 所有时长都以毫秒存储，便于直接写进 TOML。缺省的键取默认值。
//!
//! ```toml
//! poll_interval_ms = 50
//! ack_timeout_ms = 10000
//! write_retries = 3
//!
//! [initial_pose]
//! x = 0.0
//! y = 0.567
//! z = -0.24
//! ```

use crate::error::ClientError;
use armsync_protocol::{GRIPPER_OPEN, Position};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 默认起始位置（没有任何确认或命令记录时使用）
pub const DEFAULT_INITIAL_POSE: Position = Position::new(0.0, 0.567, -0.24);

/// 生产者端同步配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// 确认槽轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 单条命令等待确认的超时（毫秒）
    pub ack_timeout_ms: u64,
    /// 写入失败后的重试次数
    pub write_retries: u32,
    /// 重试间隔（毫秒）
    pub write_retry_delay_ms: u64,
    /// 读到新鲜确认后清空确认槽
    pub clear_ack_on_read: bool,
    /// 起始位置
    pub initial_pose: Position,
    /// 起始夹爪宽度（米）
    pub initial_gripper: f64,
    /// 相对移动的距离换算（输入单位为厘米，默认换算到米）
    pub distance_scale: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            ack_timeout_ms: 10_000,
            write_retries: 3,
            write_retry_delay_ms: 20,
            clear_ack_on_read: true,
            initial_pose: DEFAULT_INITIAL_POSE,
            initial_gripper: GRIPPER_OPEN,
            distance_scale: 0.01,
        }
    }
}

impl SyncConfig {
    /// 仿真预设：执行器在本机，超时缩短到 3 秒
    pub fn simulation() -> Self {
        Self {
            ack_timeout_ms: 3_000,
            ..Self::default()
        }
    }

    /// 从 TOML 文件加载并校验
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ClientError> {
        let config: SyncConfig =
            toml::from_str(content).map_err(|e| ClientError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 序列化为 TOML 文本
    pub fn to_toml_string(&self) -> Result<String, ClientError> {
        toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.poll_interval_ms == 0 {
            return Err(ClientError::Config("poll_interval_ms must be > 0".into()));
        }
        if self.ack_timeout_ms < self.poll_interval_ms {
            return Err(ClientError::Config(format!(
                "ack_timeout_ms ({}) must not be shorter than poll_interval_ms ({})",
                self.ack_timeout_ms, self.poll_interval_ms
            )));
        }
        if !self.distance_scale.is_finite() || self.distance_scale <= 0.0 {
            return Err(ClientError::Config("distance_scale must be a positive number".into()));
        }
        if !self.initial_gripper.is_finite() || self.initial_gripper < 0.0 {
            return Err(ClientError::Config("initial_gripper must be >= 0".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn write_retry_delay(&self) -> Duration {
        Duration::from_millis(self.write_retry_delay_ms)
    }
}

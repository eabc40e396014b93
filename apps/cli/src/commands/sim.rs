//! 仿真执行器命令
//!
//! 在槽位目录上运行参考执行循环，充当“仿真器”一端。Ctrl-C 退出。

use anyhow::{Context, Result};
use armsync_driver::{ExecutorConfig, ExecutorLoop, FileMedium, SimulatedArm};
use armsync_protocol::GRIPPER_OPEN;
use clap::Args;
use crossbeam_channel::bounded;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// 仿真执行器参数
#[derive(Args, Debug)]
pub struct SimCommand {
    /// 命令槽轮询间隔（毫秒）
    #[arg(long, default_value_t = 100)]
    pub poll_ms: u64,

    /// 每次运动耗时（毫秒）
    #[arg(long, default_value_t = 200)]
    pub motion_ms: u64,

    /// 夹爪最大开口（米）
    #[arg(long, default_value_t = GRIPPER_OPEN)]
    pub max_gripper: f64,
}

impl SimCommand {
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            poll_interval_ms: self.poll_ms,
            motion_time_ms: self.motion_ms,
            max_gripper_width: self.max_gripper,
        }
    }

    pub fn execute(&self, dir: &Path) -> Result<()> {
        let medium = Arc::new(FileMedium::open(dir).context("打开槽位目录失败")?);
        let config = self.executor_config();

        let (stop_tx, stop_rx) = bounded::<()>(1);
        ctrlc::set_handler(move || {
            let _ = stop_tx.try_send(());
        })
        .context("安装 Ctrl-C 处理器失败")?;

        let executor = ExecutorLoop::new(medium, SimulatedArm::new(&config), &config).spawn();
        println!("🤖 仿真执行器已启动: {}（Ctrl-C 退出）", dir.display());

        let _ = stop_rx.recv();
        info!("Stopping simulated executor after {} commands", executor.executed());
        println!("\n🛑 停止仿真执行器，共执行 {} 条命令", executor.executed());
        executor.shutdown();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_config_from_args() {
        let cmd = SimCommand {
            poll_ms: 10,
            motion_ms: 0,
            max_gripper: 0.08,
        };
        let config = cmd.executor_config();
        assert_eq!(config.poll_interval_ms, 10);
        assert_eq!(config.motion_time_ms, 0);
        assert_eq!(config.max_gripper_width, 0.08);
    }
}

//! 发送命令
//!
//! 按顺序入队目标，等待全部确认（或超时回退）后打印最终位置。
//! Ctrl-C 触发急停：丢弃未发送的目标，只等待在途命令结束。

use anyhow::{Context, Result};
use armsync_client::{QueueManager, StateSource, SyncConfig};
use armsync_driver::FileMedium;
use armsync_protocol::Position;
use clap::Args;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::utils::{parse_gripper, parse_position};

/// 发送命令参数
#[derive(Args, Debug)]
pub struct SendCommand {
    /// 目标位置 x,y,z（米），可重复，按顺序执行
    #[arg(long = "to", value_parser = parse_position, required = true)]
    pub targets: Vec<Position>,

    /// 最后设置夹爪宽度（open / close / 米数）
    #[arg(long, value_parser = parse_gripper)]
    pub gripper: Option<f64>,

    /// 使用仿真预设（确认超时 3 秒）
    #[arg(long)]
    pub simulation: bool,
}

impl SendCommand {
    pub fn execute(&self, dir: &Path, config: SyncConfig) -> Result<()> {
        let config = if self.simulation {
            SyncConfig {
                ack_timeout_ms: SyncConfig::simulation().ack_timeout_ms,
                ..config
            }
        } else {
            config
        };
        // 每条命令最多等待一个超时，再留一点余量
        let commands = self.targets.len() as u32 + 1;
        let budget = config.ack_timeout() * commands + Duration::from_secs(1);

        let medium = Arc::new(FileMedium::open(dir).context("打开槽位目录失败")?);
        let manager = Arc::new(QueueManager::start(medium, config)?);

        {
            let manager = manager.clone();
            ctrlc::set_handler(move || {
                let dropped = manager.emergency_halt();
                eprintln!("\n🛑 急停：丢弃 {} 个未发送目标", dropped);
            })
            .context("安装 Ctrl-C 处理器失败")?;
        }

        let count = manager.enqueue_all(self.targets.iter().copied())?;
        if let Some(width) = self.gripper {
            manager.set_gripper(width)?;
        }
        println!("⏳ 已入队 {} 个目标，等待确认...", count);

        if !manager.wait_until_idle(budget) {
            warn!("Queue did not drain within {:?}", budget);
            anyhow::bail!("等待超时：{:?}", manager.stats());
        }

        let state = manager.position();
        let stats = manager.stats();
        let marker = match state.source {
            StateSource::Confirmed => "✅",
            _ => "⚠️ ",
        };
        println!(
            "{} 当前位置 {}，夹爪 {:.3} m（{:?}）",
            marker, state.pose, state.gripper, state.source
        );
        println!(
            "📊 发送 {}，确认 {}，超时 {}，写入失败 {}",
            stats.total_sent, stats.total_confirmed, stats.total_timed_out, stats.write_failures
        );
        Ok(())
    }
}

//! 槽位状态命令
//!
//! 解码并打印命令槽和确认槽的当前内容；无法解析时打印原始内容。

use anyhow::{Context, Result};
use armsync_driver::{FileMedium, SlotKind, SlotMedium};
use armsync_protocol::{Acknowledgment, Command};
use clap::Args;
use std::path::Path;

/// 槽位状态参数
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// 打印原始 JSON
    #[arg(long)]
    pub raw: bool,
}

impl StatusCommand {
    pub fn execute(&self, dir: &Path) -> Result<()> {
        let medium = FileMedium::open(dir).context("打开槽位目录失败")?;
        println!("📁 {}", dir.display());
        for slot in [SlotKind::Command, SlotKind::Ack] {
            let bytes = medium
                .read_slot(slot)
                .with_context(|| format!("读取 {} 槽失败", slot))?;
            println!("{}", describe_slot(slot, bytes.as_deref(), self.raw));
        }
        Ok(())
    }
}

/// 单个槽位的描述行
fn describe_slot(slot: SlotKind, bytes: Option<&[u8]>, raw: bool) -> String {
    let Some(bytes) = bytes else {
        return format!("  {:<7} (空)", slot);
    };
    if raw {
        return format!("  {:<7} {}", slot, String::from_utf8_lossy(bytes));
    }
    let decoded = match slot {
        SlotKind::Command => Command::decode(bytes).map(|cmd| {
            let gripper = cmd
                .target
                .gripper()
                .map(|w| format!(" 夹爪 {:.3}", w))
                .unwrap_or_default();
            format!("{} → {}{}", cmd.seq, cmd.target.pose(), gripper)
        }),
        SlotKind::Ack => Acknowledgment::decode(bytes).map(|ack| {
            let state = if ack.completed { "完成" } else { "执行中" };
            let gripper = ack.gripper.map(|w| format!(" 夹爪 {:.3}", w)).unwrap_or_default();
            format!(
                "{} {} ({:.3}, {:.3}, {:.3}){}",
                ack.seq, state, ack.position.x, ack.position.y, ack.position.z, gripper
            )
        }),
    };
    match decoded {
        Ok(line) => format!("  {:<7} {}", slot, line),
        Err(e) => {
            let text = String::from_utf8_lossy(bytes);
            format!("  {:<7} ⚠️  无法解析（{}）: {}", slot, e, text)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use armsync_protocol::{Target, WriteSeq};

    #[test]
    fn test_describe_empty_and_malformed() {
        assert!(describe_slot(SlotKind::Ack, None, false).contains("(空)"));
        let line = describe_slot(SlotKind::Ack, Some(b"{\"completed\": tr"), false);
        assert!(line.contains("无法解析"), "{}", line);
    }

    #[test]
    fn test_describe_command() {
        let cmd = Command {
            seq: WriteSeq(5),
            issued_at_ms: 0,
            target: Target::position(0.1, 0.2, 0.3).with_gripper(0.0),
        };
        let line = describe_slot(SlotKind::Command, Some(&cmd.encode().unwrap()), false);
        assert!(line.contains("#5"), "{}", line);
        assert!(line.contains("(0.100, 0.200, 0.300)"), "{}", line);
        assert!(line.contains("夹爪 0.000"), "{}", line);
    }
}

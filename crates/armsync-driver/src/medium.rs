//! 槽位介质抽象
//!
//! 生产者与执行器之间没有直接调用通道，只通过两个可覆盖写的槽位耦合：
//!
//! ```text
//! 生产者 ──write──▶ CommandSlot ──read──▶ 执行器
//! 生产者 ◀──read─── AckSlot    ◀──write── 执行器
//! ```
//!
//! 介质只负责搬运字节；新鲜度判定在 `AckWatcher` 中完成，与介质无关。

use crate::error::MediumError;
use std::time::Duration;

/// 槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// 命令槽（生产者写，执行器读）
    Command,
    /// 确认槽（执行器写，生产者读）
    Ack,
}

impl std::fmt::Display for SlotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotKind::Command => f.pad("command"),
            SlotKind::Ack => f.pad("ack"),
        }
    }
}

/// 槽位介质 Trait
///
/// # 语义
///
/// - `write_slot` 原子替换整个槽位内容（last-write-wins）
/// - `read_slot` 返回当前内容；槽位为空时返回 `Ok(None)`
/// - 读到的字节可能是对端写到一半的记录，由调用方按解析失败处理
///
/// # 变更通知
///
/// 支持推送通知的介质覆盖 `version` / `wait_for_change`，
/// 使等待方在槽位变化时立即被唤醒；默认实现退化为固定间隔睡眠。
pub trait SlotMedium: Send + Sync {
    /// 覆盖写槽位
    fn write_slot(&self, slot: SlotKind, payload: &[u8]) -> Result<(), MediumError>;

    /// 读取槽位
    fn read_slot(&self, slot: SlotKind) -> Result<Option<Vec<u8>>, MediumError>;

    /// 清空槽位
    fn clear_slot(&self, slot: SlotKind) -> Result<(), MediumError>;

    /// 槽位版本号（每次写 / 清空递增）
    ///
    /// 不支持通知的介质恒返回 0。
    fn version(&self, slot: SlotKind) -> u64 {
        let _ = slot;
        0
    }

    /// 等待槽位版本离开 `since`，最多等待 `max_wait`
    ///
    /// 默认实现：直接睡眠 `max_wait`（定时轮询）。
    fn wait_for_change(&self, slot: SlotKind, since: u64, max_wait: Duration) {
        let _ = (slot, since);
        std::thread::sleep(max_wait);
    }

    /// 介质描述（用于日志）
    fn describe(&self) -> String;
}

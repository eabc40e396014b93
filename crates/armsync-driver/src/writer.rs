//! 命令写入
//!
//! 把目标编号、编码后整体写入命令槽。序号在写入成功后才提交，
//! 因此失败后的重试复用同一序号。

use crate::error::DriverError;
use crate::medium::{SlotKind, SlotMedium};
use armsync_protocol::{Acknowledgment, Command, Target, WriteSeq, now_ms};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// 一次成功写入的记录
#[derive(Debug, Clone, Copy)]
pub struct WriteRecord {
    /// 实际写入的命令
    pub command: Command,
    /// 写入完成的单调时钟时刻
    pub written_at: Instant,
}

impl WriteRecord {
    /// 写入序号（用于新鲜度比较）
    pub fn seq(&self) -> WriteSeq {
        self.command.seq
    }
}

/// 命令写入器
pub struct CommandWriter {
    medium: Arc<dyn SlotMedium>,
    last_seq: WriteSeq,
}

impl CommandWriter {
    /// 创建写入器，并以介质中已存在的最大序号作为起点
    ///
    /// 上一次会话遗留在确认槽里的记录序号不会大于新命令的序号，
    /// 因此不会被误认为是新鲜确认。
    pub fn new(medium: Arc<dyn SlotMedium>) -> Result<Self, DriverError> {
        let last_seq = highest_seq_in(medium.as_ref())?;
        debug!("CommandWriter on {} starts after {}", medium.describe(), last_seq);
        Ok(Self { medium, last_seq })
    }

    /// 最近一次成功写入的序号
    pub fn last_seq(&self) -> WriteSeq {
        self.last_seq
    }

    /// 写入目标
    ///
    /// # 错误
    ///
    /// 介质写入失败时返回 `DriverError::WriteFailed`，序号不前进。
    pub fn send(&mut self, target: Target) -> Result<WriteRecord, DriverError> {
        let command = Command {
            seq: self.last_seq.next(),
            issued_at_ms: now_ms(),
            target,
        };
        let payload = command.encode()?;

        self.medium
            .write_slot(SlotKind::Command, &payload)
            .map_err(|source| DriverError::WriteFailed {
                seq: command.seq,
                source,
            })?;

        self.last_seq = command.seq;
        debug!("Command {} written: {}", command.seq, command.target.pose());
        Ok(WriteRecord {
            command,
            written_at: Instant::now(),
        })
    }
}

/// 扫描两个槽位，返回其中出现过的最大序号
fn highest_seq_in(medium: &dyn SlotMedium) -> Result<WriteSeq, DriverError> {
    let mut highest = WriteSeq::ZERO;

    if let Some(bytes) = medium.read_slot(SlotKind::Command)? {
        match Command::decode(&bytes) {
            Ok(cmd) => highest = highest.max(cmd.seq),
            Err(e) => warn!("Ignoring unreadable command slot while seeding: {}", e),
        }
    }
    if let Some(bytes) = medium.read_slot(SlotKind::Ack)? {
        match Acknowledgment::decode(&bytes) {
            Ok(ack) => highest = highest.max(ack.seq),
            Err(e) => warn!("Ignoring unreadable ack slot while seeding: {}", e),
        }
    }

    Ok(highest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryMedium;
    use armsync_protocol::Position;

    fn medium() -> Arc<MemoryMedium> {
        Arc::new(MemoryMedium::new())
    }

    #[test]
    fn test_send_assigns_increasing_seq() {
        let medium = medium();
        let mut writer = CommandWriter::new(medium.clone()).unwrap();
        assert_eq!(writer.last_seq(), WriteSeq::ZERO);

        let a = writer.send(Target::position(1.0, 0.0, 0.0)).unwrap();
        let b = writer.send(Target::position(0.0, 1.0, 0.0)).unwrap();
        assert_eq!(a.seq(), WriteSeq(1));
        assert_eq!(b.seq(), WriteSeq(2));
        assert!(b.written_at >= a.written_at);

        // 命令槽只保留最后一条
        let stored = medium.read_slot(SlotKind::Command).unwrap().unwrap();
        let cmd = Command::decode(&stored).unwrap();
        assert_eq!(cmd.seq, WriteSeq(2));
        assert_eq!(cmd.target.pose().position, Position::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_failed_write_keeps_seq_for_retry() {
        let medium = medium();
        let mut writer = CommandWriter::new(medium.clone()).unwrap();
        medium.fail_next_writes(1);

        let target = Target::position(5.0, 5.0, 5.0);
        match writer.send(target) {
            Err(DriverError::WriteFailed { seq, .. }) => assert_eq!(seq, WriteSeq(1)),
            other => panic!("Expected WriteFailed, got {:?}", other.map(|r| r.seq())),
        }
        assert_eq!(writer.last_seq(), WriteSeq::ZERO);

        let retry = writer.send(target).unwrap();
        assert_eq!(retry.seq(), WriteSeq(1));
    }

    #[test]
    fn test_seeds_from_existing_slots() {
        let medium = medium();
        let old_ack = Acknowledgment {
            completed: true,
            seq: WriteSeq(41),
            position: Position::ORIGIN,
            gripper: None,
            write_time_ms: 0,
        };
        medium.write_slot(SlotKind::Ack, &old_ack.encode().unwrap()).unwrap();
        let old_cmd = Command {
            seq: WriteSeq(40),
            issued_at_ms: 0,
            target: Target::position(0.0, 0.0, 0.0),
        };
        medium.write_slot(SlotKind::Command, &old_cmd.encode().unwrap()).unwrap();

        let mut writer = CommandWriter::new(medium.clone()).unwrap();
        assert_eq!(writer.last_seq(), WriteSeq(41));
        assert_eq!(writer.send(Target::position(1.0, 1.0, 1.0)).unwrap().seq(), WriteSeq(42));
    }

    #[test]
    fn test_seeding_ignores_garbage() {
        let medium = medium();
        medium.write_slot(SlotKind::Ack, b"{\"completed\": tr").unwrap();
        let writer = CommandWriter::new(medium).unwrap();
        assert_eq!(writer.last_seq(), WriteSeq::ZERO);
    }

    #[test]
    fn test_resending_same_target_overwrites() {
        let medium = medium();
        let mut writer = CommandWriter::new(medium.clone()).unwrap();
        let target = Target::position(0.2, 0.3, 0.4).with_gripper(0.05);
        writer.send(target).unwrap();
        writer.send(target).unwrap();

        let stored = medium.read_slot(SlotKind::Command).unwrap().unwrap();
        let stored = Command::decode(&stored).unwrap();
        assert_eq!(stored.target, target);
        assert_eq!(medium.version(SlotKind::Command), 2);
    }
}

//! 内存槽位介质
//!
//! 进程内传输：两个槽位共享一把 `parking_lot::Mutex`，
//! 写入时递增版本号并通过 `Condvar` 唤醒等待方，避免忙轮询。

use crate::error::MediumError;
use crate::medium::{SlotKind, SlotMedium};
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Cell {
    payload: Option<Vec<u8>>,
    version: u64,
}

#[derive(Debug, Default)]
struct Slots {
    command: Cell,
    ack: Cell,
    /// 剩余需要注入失败的写次数
    failing_writes: u32,
}

impl Slots {
    fn cell(&self, slot: SlotKind) -> &Cell {
        match slot {
            SlotKind::Command => &self.command,
            SlotKind::Ack => &self.ack,
        }
    }

    fn cell_mut(&mut self, slot: SlotKind) -> &mut Cell {
        match slot {
            SlotKind::Command => &mut self.command,
            SlotKind::Ack => &mut self.ack,
        }
    }
}

/// 内存槽位介质
///
/// # 示例
///
/// ```
/// use armsync_driver::{MemoryMedium, SlotKind, SlotMedium};
///
/// let medium = MemoryMedium::new();
/// medium.write_slot(SlotKind::Command, b"{}").unwrap();
/// assert_eq!(medium.read_slot(SlotKind::Command).unwrap().as_deref(), Some(&b"{}"[..]));
/// assert_eq!(medium.version(SlotKind::Command), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryMedium {
    slots: Mutex<Slots>,
    changed: Condvar,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让接下来的 `count` 次写入失败（模拟介质瞬时故障）
    pub fn fail_next_writes(&self, count: u32) {
        self.slots.lock().failing_writes = count;
    }

    fn mutate(&self, slot: SlotKind, payload: Option<Vec<u8>>) {
        {
            let mut slots = self.slots.lock();
            let cell = slots.cell_mut(slot);
            cell.payload = payload;
            cell.version += 1;
        }
        self.changed.notify_all();
    }
}

impl SlotMedium for MemoryMedium {
    fn write_slot(&self, slot: SlotKind, payload: &[u8]) -> Result<(), MediumError> {
        {
            let mut slots = self.slots.lock();
            if slots.failing_writes > 0 {
                slots.failing_writes -= 1;
                return Err(MediumError::Injected);
            }
        }
        self.mutate(slot, Some(payload.to_vec()));
        Ok(())
    }

    fn read_slot(&self, slot: SlotKind) -> Result<Option<Vec<u8>>, MediumError> {
        Ok(self.slots.lock().cell(slot).payload.clone())
    }

    fn clear_slot(&self, slot: SlotKind) -> Result<(), MediumError> {
        self.mutate(slot, None);
        Ok(())
    }

    fn version(&self, slot: SlotKind) -> u64 {
        self.slots.lock().cell(slot).version
    }

    fn wait_for_change(&self, slot: SlotKind, since: u64, max_wait: Duration) {
        let deadline = Instant::now() + max_wait;
        let mut slots = self.slots.lock();
        while slots.cell(slot).version == since {
            if self.changed.wait_until(&mut slots, deadline).timed_out() {
                break;
            }
        }
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_last_write_wins() {
        let medium = MemoryMedium::new();
        medium.write_slot(SlotKind::Command, b"first").unwrap();
        medium.write_slot(SlotKind::Command, b"second").unwrap();
        assert_eq!(
            medium.read_slot(SlotKind::Command).unwrap(),
            Some(b"second".to_vec())
        );
        assert_eq!(medium.version(SlotKind::Command), 2);
        // 另一个槽位不受影响
        assert_eq!(medium.read_slot(SlotKind::Ack).unwrap(), None);
        assert_eq!(medium.version(SlotKind::Ack), 0);
    }

    #[test]
    fn test_clear_bumps_version() {
        let medium = MemoryMedium::new();
        medium.write_slot(SlotKind::Ack, b"ack").unwrap();
        medium.clear_slot(SlotKind::Ack).unwrap();
        assert_eq!(medium.read_slot(SlotKind::Ack).unwrap(), None);
        assert_eq!(medium.version(SlotKind::Ack), 2);
    }

    #[test]
    fn test_injected_write_failures() {
        let medium = MemoryMedium::new();
        medium.fail_next_writes(2);
        assert!(matches!(
            medium.write_slot(SlotKind::Command, b"a"),
            Err(MediumError::Injected)
        ));
        assert!(medium.write_slot(SlotKind::Command, b"b").is_err());
        assert!(medium.write_slot(SlotKind::Command, b"c").is_ok());
        assert_eq!(medium.version(SlotKind::Command), 1);
    }

    #[test]
    fn test_wait_wakes_on_write() {
        let medium = Arc::new(MemoryMedium::new());
        let since = medium.version(SlotKind::Ack);

        let writer = {
            let medium = medium.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                medium.write_slot(SlotKind::Ack, b"done").unwrap();
            })
        };

        let start = Instant::now();
        medium.wait_for_change(SlotKind::Ack, since, Duration::from_secs(2));
        let elapsed = start.elapsed();
        writer.join().unwrap();

        assert!(elapsed < Duration::from_secs(1), "waited {:?}", elapsed);
        assert_eq!(medium.read_slot(SlotKind::Ack).unwrap(), Some(b"done".to_vec()));
    }

    #[test]
    fn test_wait_returns_immediately_if_already_changed() {
        let medium = MemoryMedium::new();
        let since = medium.version(SlotKind::Ack);
        medium.write_slot(SlotKind::Ack, b"x").unwrap();

        let start = Instant::now();
        medium.wait_for_change(SlotKind::Ack, since, Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_wait_times_out_without_change() {
        let medium = MemoryMedium::new();
        let start = Instant::now();
        medium.wait_for_change(SlotKind::Ack, 0, Duration::from_millis(30));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}

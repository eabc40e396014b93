//! 调度事件
//!
//! 每个订阅者拿到一个独立的无界 `crossbeam_channel::Receiver`。
//! 接收端被丢弃后，对应的发送端在下一次广播时移除。

use armsync_protocol::{ConfirmedState, Target, WriteSeq};
use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use std::time::Duration;

/// 调度事件
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// 命令已写入命令槽
    Dispatched { seq: WriteSeq, target: Target },
    /// 收到新鲜确认
    Confirmed {
        seq: WriteSeq,
        state: ConfirmedState,
        latency: Duration,
    },
    /// 等待超时，已回退到本地目标
    TimedOut {
        seq: WriteSeq,
        target: Target,
        waited: Duration,
    },
    /// 重试耗尽，命令被丢弃
    WriteFailed { target: Target, attempts: u32 },
    /// 急停
    Halted { dropped: usize },
    /// 解除急停
    Resumed,
}

impl DispatchEvent {
    /// 是否表示一条在途命令结束
    pub fn is_completion(&self) -> bool {
        matches!(self, DispatchEvent::Confirmed { .. } | DispatchEvent::TimedOut { .. })
    }
}

#[derive(Default)]
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<Sender<DispatchEvent>>>,
}

impl EventBus {
    pub fn subscribe(&self) -> Receiver<DispatchEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: DispatchEvent) {
        self.subscribers.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }
}

//! Observer - 状态观察器
//!
//! 只读接口，与 `QueueManager` 的写操作分离。位置状态通过 `ArcSwap` 发布，
//! 读取是无锁的快照；调用方拿到的是 `Arc`，不会持有内部引用。
//!
//! # 使用示例
//!
//! ```rust,no_run
//! # use armsync_client::QueueManager;
//! # fn example(manager: &QueueManager) {
//! let observer = manager.observer();
//! std::thread::spawn(move || {
//!     let state = observer.position();
//!     println!("at {} ({:?})", state.pose, state.source);
//! });
//! # }
//! ```

use crate::machine::{DispatchPhase, PhaseMachine};
use crate::queue::PendingQueue;
use crate::state::PositionState;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// 队列统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    /// 成功写入命令槽的命令数
    pub total_sent: u64,
    /// 收到新鲜确认的命令数
    pub total_confirmed: u64,
    /// 等待超时的命令数
    pub total_timed_out: u64,
    /// 重试耗尽后被丢弃的命令数
    pub write_failures: u64,
    /// 尚未发送的目标数
    pub queue_len: usize,
    /// 是否有命令在途
    pub in_flight: bool,
    /// 是否处于急停
    pub halted: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub sent: AtomicU64,
    pub confirmed: AtomicU64,
    pub timed_out: AtomicU64,
    pub write_failures: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 生产者共享状态
pub(crate) struct Shared {
    pub queue: PendingQueue,
    pub position: ArcSwap<PositionState>,
    pub phase: Mutex<PhaseMachine>,
    pub counters: Counters,
}

impl Shared {
    pub fn new(initial: PositionState) -> Self {
        Self {
            queue: PendingQueue::new(),
            position: ArcSwap::from_pointee(initial),
            phase: Mutex::new(PhaseMachine::new()),
            counters: Counters::default(),
        }
    }

    /// 以“复制-修改-发布”的方式更新位置状态
    ///
    /// 只有调度线程和夹爪接口会写，`rcu` 保证并发写不会互相覆盖。
    pub fn update_position(&self, f: impl Fn(&mut PositionState)) {
        self.position.rcu(|current| {
            let mut next = PositionState::clone(current);
            f(&mut next);
            next
        });
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            total_sent: self.counters.sent.load(Ordering::Relaxed),
            total_confirmed: self.counters.confirmed.load(Ordering::Relaxed),
            total_timed_out: self.counters.timed_out.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
            queue_len: self.queue.len(),
            in_flight: self.queue.has_in_flight(),
            halted: self.queue.is_halted(),
        }
    }
}

/// 状态观察器（只读，可克隆）
#[derive(Clone)]
pub struct Observer {
    shared: Arc<Shared>,
}

impl Observer {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// 位置状态快照
    pub fn position(&self) -> Arc<PositionState> {
        self.shared.position.load_full()
    }

    /// 当前调度阶段
    pub fn phase(&self) -> DispatchPhase {
        self.shared.phase.lock().phase()
    }

    /// 统计快照
    pub fn stats(&self) -> QueueStats {
        self.shared.stats()
    }

    pub fn is_halted(&self) -> bool {
        self.shared.queue.is_halted()
    }

    /// 尚未发送的目标数
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }
}

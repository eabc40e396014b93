//! 待发送队列
//!
//! 严格 FIFO；同一时刻最多一条在途命令。入队、清空、急停都只持有一次短锁，
//! 调度线程等待确认期间也能安全调用。调度线程通过 `Condvar` 被唤醒，不轮询。
//!
//! 夹爪变化不单独排队：它暂存为 `pending_gripper`，折叠进下一条入队的位姿命令。
//! 队列排空时仍有未折叠的夹爪变化，调度线程会在计划末端发一条保持命令带上它。
//!
//! 每次入队都把当时的计划末端记入位置历史，`push_previous` 弹出最近一条并以它为目标，
//! 连续调用逐级后退。清空或急停丢弃的目标会按逆序撤销它们对历史的修改。

use armsync_protocol::{Pose, Target};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// 位置历史最多保留的条数
pub const MAX_POSITION_HISTORY: usize = 50;

/// 调度线程取到的下一项工作
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NextDispatch {
    /// 队首目标
    Target(Target),
    /// 队列已空但有未折叠的夹爪变化：在当前位置保持并设置夹爪的命令
    GripperHold(Target),
    /// 队列已关闭
    Closed,
}

/// 入队目标对位置历史做的修改
#[derive(Debug, Clone, Copy)]
enum HistoryEdit {
    /// 记入了一条起点
    Recorded,
    /// 弹出了这条起点（回到上一个位置）
    Popped(Pose),
}

#[derive(Debug, Clone, Copy)]
struct Queued {
    target: Target,
    history: HistoryEdit,
}

#[derive(Debug, Default)]
struct Inner {
    items: VecDeque<Queued>,
    in_flight: Option<Target>,
    pending_gripper: Option<f64>,
    history: VecDeque<Pose>,
    halted: bool,
    closed: bool,
}

impl Inner {
    fn is_drained(&self) -> bool {
        self.items.is_empty() && self.in_flight.is_none() && self.pending_gripper.is_none()
    }

    fn record_history(&mut self, origin: Pose) {
        self.history.push_back(origin);
        if self.history.len() > MAX_POSITION_HISTORY {
            self.history.pop_front();
        }
    }

    /// 丢弃所有待发送目标，返回丢弃数量
    fn drop_pending(&mut self) -> usize {
        let dropped = self.items.len();
        while let Some(queued) = self.items.pop_back() {
            match queued.history {
                HistoryEdit::Recorded => {
                    self.history.pop_back();
                },
                HistoryEdit::Popped(origin) => self.history.push_back(origin),
            }
        }
        dropped
    }
}

/// 入队被拒绝的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    Halted,
    Closed,
}

/// 待发送队列
#[derive(Debug, Default)]
pub struct PendingQueue {
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入队一个目标
    ///
    /// 有未折叠的夹爪变化且目标本身不带夹爪时，折叠进该目标。返回实际入队的目标。
    /// `fallback` 是没有计划中的目标时记入历史的起点（通常是当前位置）。
    pub fn push(&self, target: Target, fallback: Pose) -> Result<Target, Rejected> {
        self.push_from_tail(fallback, |_| target)
    }

    /// 以计划末端为起点计算目标并入队
    ///
    /// 计划末端依次取：队尾目标、在途目标、`fallback`。它同时记入位置历史。
    /// 计算和入队在同一次加锁内完成。
    pub fn push_from_tail(
        &self,
        fallback: Pose,
        build: impl FnOnce(Pose) -> Target,
    ) -> Result<Target, Rejected> {
        self.mutate(|inner| {
            let tail = planned_tail(inner).unwrap_or(fallback);
            let target = fold_gripper(inner, build(tail));
            inner.record_history(tail);
            inner.items.push_back(Queued {
                target,
                history: HistoryEdit::Recorded,
            });
            target
        })
    }

    /// 回到上一个位置：弹出最近一条历史并以它为目标入队
    ///
    /// 没有历史时不入队，返回 `Ok(None)`。
    pub fn push_previous(&self) -> Result<Option<Target>, Rejected> {
        self.mutate(|inner| {
            let origin = inner.history.pop_back()?;
            let target = fold_gripper(inner, Target::from(origin));
            inner.items.push_back(Queued {
                target,
                history: HistoryEdit::Popped(origin),
            });
            Some(target)
        })
    }

    /// 位置历史（从旧到新）
    pub fn history(&self) -> Vec<Pose> {
        self.inner.lock().history.iter().copied().collect()
    }

    /// 记录一个待折叠的夹爪变化（后来者覆盖先前未发送的值），并在同一次加锁内执行 `on_accept`
    ///
    /// 调度线程取走该变化之前，`on_accept` 一定已经执行完。
    pub fn set_pending_gripper(
        &self,
        width: f64,
        on_accept: impl FnOnce(),
    ) -> Result<(), Rejected> {
        self.mutate(|inner| {
            on_accept();
            inner.pending_gripper = Some(width);
        })
    }

    /// 在队列锁内读取未折叠的夹爪变化并执行 `f`
    pub fn with_pending_gripper<R>(&self, f: impl FnOnce(Option<f64>) -> R) -> R {
        let inner = self.inner.lock();
        f(inner.pending_gripper)
    }

    /// 计划末端位姿（队尾或在途目标）
    pub fn planned_tail(&self) -> Option<Pose> {
        planned_tail(&self.inner.lock())
    }

    /// 非阻塞地取下一项，取出的目标即成为在途目标
    ///
    /// 急停、已有在途命令或没有工作时返回 `None`。
    /// `hold_at` 是夹爪保持命令使用的位姿。
    pub fn try_next(&self, hold_at: Pose) -> Option<NextDispatch> {
        let mut inner = self.inner.lock();
        take_next(&mut inner, || hold_at)
    }

    /// 阻塞直到有可调度的工作或队列关闭
    ///
    /// `hold_at` 只在需要发出夹爪保持命令时调用。
    pub fn wait_next(&self, hold_at: impl Fn() -> Pose) -> NextDispatch {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return NextDispatch::Closed;
            }
            if let Some(next) = take_next(&mut inner, &hold_at) {
                return next;
            }
            self.changed.wait(&mut inner);
        }
    }

    /// 在途命令结束（确认、超时或写入失败）
    pub fn finish_in_flight(&self) {
        self.inner.lock().in_flight = None;
        self.changed.notify_all();
    }

    /// 丢弃所有尚未发送的目标，返回丢弃数量；在途命令不受影响
    pub fn clear(&self) -> usize {
        let dropped = self.inner.lock().drop_pending();
        self.changed.notify_all();
        dropped
    }

    /// 急停：清空队列并暂停调度，返回丢弃数量
    ///
    /// 未折叠的夹爪变化保留，`resume()` 之后作为保持命令发出。
    pub fn halt(&self) -> usize {
        let dropped = {
            let mut inner = self.inner.lock();
            inner.halted = true;
            inner.drop_pending()
        };
        self.changed.notify_all();
        dropped
    }

    /// 解除急停；返回之前是否处于急停
    pub fn resume(&self) -> bool {
        let was_halted = std::mem::replace(&mut self.inner.lock().halted, false);
        self.changed.notify_all();
        was_halted
    }

    /// 关闭队列：唤醒调度线程并拒绝后续入队
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.changed.notify_all();
    }

    pub fn is_halted(&self) -> bool {
        self.inner.lock().halted
    }

    /// 尚未发送的目标数
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// 是否有在途命令
    pub fn has_in_flight(&self) -> bool {
        self.inner.lock().in_flight.is_some()
    }

    /// 未折叠的夹爪变化
    pub fn pending_gripper(&self) -> Option<f64> {
        self.inner.lock().pending_gripper
    }

    /// 队列快照（不含在途命令）
    pub fn snapshot(&self) -> Vec<Target> {
        self.inner.lock().items.iter().map(|queued| queued.target).collect()
    }

    /// 等待队列排空（无待发送、无在途、无未折叠的夹爪变化）
    ///
    /// 急停期间留下的夹爪变化不会被发出，因此急停时只等待在途命令结束。
    /// 超时返回 `false`。
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            let settled = if inner.halted {
                inner.in_flight.is_none()
            } else {
                inner.is_drained()
            };
            if settled || inner.closed {
                return settled;
            }
            if self.changed.wait_until(&mut inner, deadline).timed_out() {
                return false;
            }
        }
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R, Rejected> {
        let result = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(Rejected::Closed);
            }
            if inner.halted {
                return Err(Rejected::Halted);
            }
            f(&mut *inner)
        };
        self.changed.notify_all();
        Ok(result)
    }
}

fn fold_gripper(inner: &mut Inner, target: Target) -> Target {
    match (target.gripper(), inner.pending_gripper.take()) {
        (None, Some(width)) => target.with_gripper(width),
        // 显式夹爪优先，覆盖未发送的夹爪变化
        _ => target,
    }
}

fn planned_tail(inner: &Inner) -> Option<Pose> {
    inner
        .items
        .back()
        .map(|queued| &queued.target)
        .or(inner.in_flight.as_ref())
        .map(|target| *target.pose())
}

fn take_next(inner: &mut Inner, hold_at: impl FnOnce() -> Pose) -> Option<NextDispatch> {
    if inner.halted || inner.in_flight.is_some() {
        return None;
    }
    if let Some(Queued { target, .. }) = inner.items.pop_front() {
        inner.in_flight = Some(target);
        return Some(NextDispatch::Target(target));
    }
    let width = inner.pending_gripper.take()?;
    let hold = Target::from(hold_at()).with_gripper(width);
    inner.in_flight = Some(hold);
    Some(NextDispatch::GripperHold(hold))
}

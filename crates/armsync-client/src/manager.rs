//! QueueManager - 确认门控的命令队列
//!
//! 生产者的唯一入口：目标按序入队，由后台调度线程逐条写入命令槽，
//! 每条命令都要等到新鲜确认（或超时）之后才发送下一条。
//!
//! # 设计目标
//!
//! - **有序**: 严格 FIFO，同一时刻最多一条在途
//! - **不阻塞**: 入队 / 清空 / 急停 / 读状态都不等待确认
//! - **可降级**: 执行器无响应时超时回退到本地目标，继续处理后续命令
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use armsync_client::{Direction, QueueManager, SyncConfig};
//! use armsync_driver::MemoryMedium;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), armsync_client::ClientError> {
//! let medium = Arc::new(MemoryMedium::new());
//! let manager = QueueManager::start(medium, SyncConfig::simulation())?;
//!
//! manager.enqueue_position(0.1, 0.5, -0.2)?;
//! manager.enqueue_relative(Direction::Up, 5.0)?;
//! manager.close_gripper()?;
//!
//! manager.wait_until_idle(Duration::from_secs(10));
//! println!("now at {}", manager.position().pose);
//! # Ok(())
//! # }
//! ```

use crate::config::SyncConfig;
use crate::direction::Direction;
use crate::error::ClientError;
use crate::events::{DispatchEvent, EventBus};
use crate::machine::DispatchPhase;
use crate::observer::{Counters, Observer, QueueStats, Shared};
use crate::queue::{NextDispatch, Rejected};
use crate::state::PositionState;
use armsync_driver::{AckOutcome, AckWatcher, CommandWriter, DriverError, SlotMedium, WriteRecord};
use armsync_protocol::{GRIPPER_CLOSED, GRIPPER_OPEN, Pose, Position, Target};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

impl From<Rejected> for ClientError {
    fn from(reason: Rejected) -> Self {
        match reason {
            Rejected::Halted => ClientError::Halted,
            Rejected::Closed => ClientError::ShutDown,
        }
    }
}

/// 确认门控的命令队列管理器
///
/// Drop 时关闭队列并等待调度线程退出（在途等待会被中断）。
pub struct QueueManager {
    shared: Arc<Shared>,
    events: Arc<EventBus>,
    config: SyncConfig,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl QueueManager {
    /// 在介质上启动生产者
    ///
    /// 校验配置，从介质引导位置状态，并启动调度线程。
    pub fn start(medium: Arc<dyn SlotMedium>, config: SyncConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let initial = PositionState::bootstrap(medium.as_ref(), &config);
        let writer = CommandWriter::new(medium.clone())?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let watcher = AckWatcher::new(medium.clone(), config.poll_interval())
            .clear_on_read(config.clear_ack_on_read)
            .with_shutdown(shutdown.clone());

        let shared = Arc::new(Shared::new(initial));
        let events = Arc::new(EventBus::default());

        let dispatcher = Dispatcher {
            shared: shared.clone(),
            events: events.clone(),
            writer,
            watcher,
            config: config.clone(),
            shutdown: shutdown.clone(),
        };
        let handle = thread::Builder::new()
            .name("armsync-dispatch".into())
            .spawn(move || dispatcher.run())
            .map_err(|e| ClientError::Config(format!("failed to spawn dispatcher thread: {}", e)))?;

        info!(
            "QueueManager started on {} (poll {}ms, timeout {}ms)",
            medium.describe(),
            config.poll_interval_ms,
            config.ack_timeout_ms
        );

        Ok(Self {
            shared,
            events,
            config,
            shutdown,
            handle: Some(handle),
        })
    }

    /// 当前配置
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// 入队一个目标
    ///
    /// # 错误
    ///
    /// - `ClientError::Halted`: 急停期间
    /// - `ClientError::ShutDown`: 已关闭
    pub fn enqueue(&self, target: impl Into<Target>) -> Result<Target, ClientError> {
        let here = self.shared.position.load().pose;
        let target = self.shared.queue.push(target.into(), here)?;
        debug!("Enqueued {} (queue length {})", target.pose(), self.shared.queue.len());
        Ok(target)
    }

    /// 入队一个仅位置的目标
    pub fn enqueue_position(&self, x: f64, y: f64, z: f64) -> Result<Target, ClientError> {
        self.enqueue(Target::position(x, y, z))
    }

    /// 按顺序入队多个目标，返回入队数量
    ///
    /// 中途被拒绝时已入队的目标保留。
    pub fn enqueue_all<I, T>(&self, targets: I) -> Result<usize, ClientError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Target>,
    {
        let mut count = 0;
        for target in targets {
            self.enqueue(target)?;
            count += 1;
        }
        Ok(count)
    }

    /// 相对计划末端移动 `distance_cm` 厘米
    pub fn enqueue_relative(
        &self,
        direction: Direction,
        distance_cm: f64,
    ) -> Result<Target, ClientError> {
        self.enqueue_combined(&[(direction, distance_cm)])
    }

    /// 组合移动：多个方向的位移相加成一条斜向目标
    pub fn enqueue_combined(&self, moves: &[(Direction, f64)]) -> Result<Target, ClientError> {
        let scale = self.config.distance_scale;
        let delta = moves
            .iter()
            .fold(Position::ORIGIN, |acc, (dir, cm)| acc + dir.unit() * (cm * scale));

        let fallback = self.shared.position.load().pose;
        let target = self
            .shared
            .queue
            .push_from_tail(fallback, |tail| tail.translated(delta).into())?;
        debug!("Enqueued relative move by {:?} to {}", delta, target.pose());
        Ok(target)
    }

    /// 回到上一个位置
    ///
    /// 每次入队都会把计划末端记入位置历史（最多 `MAX_POSITION_HISTORY` 条），
    /// 这里弹出最近一条并以它为目标入队，连续调用逐级后退。
    /// 没有历史时不入队，返回 `Ok(None)`。
    pub fn enqueue_previous(&self) -> Result<Option<Target>, ClientError> {
        let target = self.shared.queue.push_previous()?;
        match &target {
            Some(target) => debug!("Enqueued return to previous position {}", target.pose()),
            None => info!("No previous position to return to"),
        }
        Ok(target)
    }

    /// 位置历史（从旧到新）
    pub fn history(&self) -> Vec<Pose> {
        self.shared.queue.history()
    }

    /// 设置夹爪宽度（不单独等待确认）
    ///
    /// 位置状态立即更新；宽度折叠进下一条位姿命令，
    /// 队列排空时调度线程会在当前位置发一条保持命令带上它。
    pub fn set_gripper(&self, width: f64) -> Result<(), ClientError> {
        if !width.is_finite() {
            return Err(ClientError::Config(format!("gripper width must be finite, got {}", width)));
        }
        let shared = &self.shared;
        shared.queue.set_pending_gripper(width, || {
            shared.update_position(|s| s.set_gripper_local(width))
        })?;
        debug!("Gripper set to {:.3} locally", width);
        Ok(())
    }

    pub fn open_gripper(&self) -> Result<(), ClientError> {
        self.set_gripper(GRIPPER_OPEN)
    }

    pub fn close_gripper(&self) -> Result<(), ClientError> {
        self.set_gripper(GRIPPER_CLOSED)
    }

    /// 丢弃所有尚未发送的目标，返回丢弃数量
    ///
    /// 在途命令照常等待确认。
    pub fn clear_queue(&self) -> usize {
        let dropped = self.shared.queue.clear();
        if dropped > 0 {
            info!("Cleared {} pending targets", dropped);
        }
        dropped
    }

    /// 急停：清空队列并暂停调度，直到 `resume()`
    ///
    /// 返回丢弃的目标数。在途命令不会被撤回。
    pub fn emergency_halt(&self) -> usize {
        let dropped = self.shared.queue.halt();
        warn!("Emergency halt: dropped {} pending targets", dropped);
        self.events.publish(DispatchEvent::Halted { dropped });
        dropped
    }

    /// 解除急停
    pub fn resume(&self) {
        if self.shared.queue.resume() {
            info!("Dispatch resumed");
            self.events.publish(DispatchEvent::Resumed);
        }
    }

    pub fn is_halted(&self) -> bool {
        self.shared.queue.is_halted()
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

    /// 尚未发送的目标（不含在途命令）
    pub fn pending(&self) -> Vec<Target> {
        self.shared.queue.snapshot()
    }

    /// 只读观察器
    pub fn observer(&self) -> Observer {
        Observer::new(self.shared.clone())
    }

    /// 订阅调度事件
    pub fn subscribe(&self) -> Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    /// 等待所有已入队的工作完成，超时返回 `false`
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.shared.queue.wait_drained(timeout)
    }

    /// 关闭调度线程并等待其退出
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.shared.queue.close();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Dispatcher thread panicked");
            }
        }
    }
}

impl Drop for QueueManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 调度线程
///
/// 唯一的命令槽写入方，也是唯一驱动 `PhaseMachine` 的一方。
struct Dispatcher {
    shared: Arc<Shared>,
    events: Arc<EventBus>,
    writer: CommandWriter,
    watcher: AckWatcher,
    config: SyncConfig,
    shutdown: Arc<AtomicBool>,
}

impl Dispatcher {
    fn run(mut self) {
        debug!("Dispatcher started");
        loop {
            let shared = &self.shared;
            let target = match shared.queue.wait_next(|| shared.position.load().pose) {
                NextDispatch::Target(target) => target,
                NextDispatch::GripperHold(hold) => {
                    debug!("Flushing pending gripper change with a hold at {}", hold.pose());
                    hold
                },
                NextDispatch::Closed => break,
            };

            self.dispatch(target);
            self.shared.queue.finish_in_flight();

            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
        }
        debug!("Dispatcher stopped");
    }

    /// 发送一条命令并等待其结束
    fn dispatch(&mut self, target: Target) {
        let Some(record) = self.write_with_retry(target) else {
            return;
        };
        let seq = record.seq();

        self.advance(DispatchPhase::Sent);
        Counters::bump(&self.shared.counters.sent);
        info!("Dispatched command {} to {}", seq, target.pose());
        self.advance(DispatchPhase::Waiting);
        self.events.publish(DispatchEvent::Dispatched { seq, target });

        match self.watcher.wait_for_ack(seq, self.config.ack_timeout()) {
            AckOutcome::Confirmed(state) => {
                self.advance(DispatchPhase::Acked);
                self.settle(|s| s.confirm(&state, &target));
                Counters::bump(&self.shared.counters.confirmed);
                let latency = record.written_at.elapsed();
                info!("Command {} confirmed at {:?} after {:?}", seq, state.position, latency);
                self.events.publish(DispatchEvent::Confirmed { seq, state, latency });
                self.advance(DispatchPhase::Idle);
            },
            AckOutcome::TimedOut { waited } => {
                self.advance(DispatchPhase::TimedOut);
                self.settle(|s| s.fall_back_to(&target));
                Counters::bump(&self.shared.counters.timed_out);
                warn!(
                    "No acknowledgment for command {} after {:?}; assuming target {} was reached",
                    seq,
                    waited,
                    target.pose()
                );
                self.events.publish(DispatchEvent::TimedOut { seq, target, waited });
                self.advance(DispatchPhase::Idle);
            },
            AckOutcome::Shutdown => {
                debug!("Abandoning wait for command {} on shutdown", seq);
                self.shared.phase.lock().abandon();
            },
        }
    }

    /// 写入命令，失败时按配置重试；重试耗尽返回 `None`
    fn write_with_retry(&mut self, target: Target) -> Option<WriteRecord> {
        let attempts = self.config.write_retries.saturating_add(1);
        let mut last_error: Option<DriverError> = None;

        for attempt in 1..=attempts {
            match self.writer.send(target) {
                Ok(record) => return Some(record),
                Err(e) => {
                    if attempt < attempts {
                        warn!("Command write attempt {}/{} failed: {}", attempt, attempts, e);
                        if self.shutdown.load(Ordering::Acquire) {
                            break;
                        }
                        thread::sleep(self.config.write_retry_delay());
                    }
                    last_error = Some(e);
                },
            }
        }

        Counters::bump(&self.shared.counters.write_failures);
        match &last_error {
            Some(e) => error!(
                "Dropping target {} after {} failed write attempts: {}",
                target.pose(),
                attempts,
                e
            ),
            None => error!("Dropping target {} after failed write attempts", target.pose()),
        }
        self.events.publish(DispatchEvent::WriteFailed { target, attempts });
        None
    }

    /// 以命令结果更新位置状态
    ///
    /// 未折叠的本地夹爪变化比这条命令更新，保留它。
    fn settle(&self, update: impl Fn(&mut PositionState)) {
        let shared = &self.shared;
        shared.queue.with_pending_gripper(|local_gripper| {
            shared.update_position(|s| {
                update(s);
                if let Some(width) = local_gripper {
                    s.gripper = width;
                }
            })
        });
    }

    fn advance(&self, to: DispatchPhase) {
        if let Err(e) = self.shared.phase.lock().transition(to) {
            error!("Dispatch state machine rejected transition: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateSource;
    use armsync_driver::{
        ExecutorConfig, ExecutorHandle, ExecutorLoop, MemoryMedium, SimulatedArm, SlotKind,
    };
    use armsync_protocol::{Command, WriteSeq};

    fn fast_config() -> SyncConfig {
        SyncConfig {
            poll_interval_ms: 5,
            ack_timeout_ms: 150,
            write_retry_delay_ms: 1,
            ..SyncConfig::default()
        }
    }

    fn instant_executor() -> ExecutorConfig {
        ExecutorConfig {
            poll_interval_ms: 5,
            motion_time_ms: 0,
            ..ExecutorConfig::default()
        }
    }

    fn spawn_executor(medium: &Arc<MemoryMedium>) -> ExecutorHandle {
        let config = instant_executor();
        ExecutorLoop::new(medium.clone(), SimulatedArm::new(&config), &config).spawn()
    }

    fn read_command(medium: &MemoryMedium) -> Command {
        let bytes = medium.read_slot(SlotKind::Command).unwrap().unwrap();
        Command::decode(&bytes).unwrap()
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        let medium = Arc::new(MemoryMedium::new());
        let config = SyncConfig {
            poll_interval_ms: 0,
            ..SyncConfig::default()
        };
        assert!(matches!(QueueManager::start(medium, config), Err(ClientError::Config(_))));
    }

    #[test]
    fn test_relative_moves_chain_from_planned_tail() {
        let medium = Arc::new(MemoryMedium::new());
        let manager = QueueManager::start(medium, fast_config()).unwrap();
        // 无执行器：第一条命令在途，后面的都在队列里
        let start = manager.position().pose.position;
        let a = manager.enqueue_relative(Direction::Right, 10.0).unwrap();
        let b = manager.enqueue_relative(Direction::Up, 5.0).unwrap();
        let c = manager
            .enqueue_combined(&[(Direction::Left, 10.0), (Direction::Forward, 2.0)])
            .unwrap();

        assert!(a.pose().position.approx_eq(&(start + Position::new(0.1, 0.0, 0.0)), 1e-9));
        assert!(b.pose().position.approx_eq(&(start + Position::new(0.1, 0.05, 0.0)), 1e-9));
        assert!(c.pose().position.approx_eq(&(start + Position::new(0.0, 0.05, 0.02)), 1e-9));
        manager.shutdown();
    }

    #[test]
    fn test_halt_rejects_enqueue() {
        let medium = Arc::new(MemoryMedium::new());
        let manager = QueueManager::start(medium, fast_config()).unwrap();
        let events = manager.subscribe();

        manager.emergency_halt();
        assert!(manager.is_halted());
        assert!(matches!(manager.enqueue_position(1.0, 1.0, 1.0), Err(ClientError::Halted)));
        assert!(matches!(manager.close_gripper(), Err(ClientError::Halted)));
        assert_eq!(
            events.recv_timeout(Duration::from_secs(1)).unwrap(),
            DispatchEvent::Halted { dropped: 0 }
        );

        manager.resume();
        assert_eq!(events.recv_timeout(Duration::from_secs(1)).unwrap(), DispatchEvent::Resumed);
        assert!(manager.enqueue_position(1.0, 1.0, 1.0).is_ok());
    }

    #[test]
    fn test_write_failures_drop_command_without_touching_state() {
        let medium = Arc::new(MemoryMedium::new());
        let config = SyncConfig {
            write_retries: 2,
            ..fast_config()
        };
        let manager = QueueManager::start(medium.clone(), config).unwrap();
        let before = manager.position();
        let events = manager.subscribe();

        medium.fail_next_writes(3);
        manager.enqueue_position(5.0, 5.0, 5.0).unwrap();

        let event = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            event,
            DispatchEvent::WriteFailed {
                target: Target::position(5.0, 5.0, 5.0),
                attempts: 3
            }
        );
        assert!(manager.wait_until_idle(Duration::from_secs(1)));
        assert_eq!(manager.stats().write_failures, 1);
        assert_eq!(manager.stats().total_sent, 0);
        assert_eq!(manager.position().pose, before.pose);
        assert_eq!(medium.read_slot(SlotKind::Command).unwrap(), None);
    }

    #[test]
    fn test_transient_write_failure_is_retried() {
        let medium = Arc::new(MemoryMedium::new());
        let _executor = spawn_executor(&medium);
        let manager = QueueManager::start(medium.clone(), fast_config()).unwrap();

        medium.fail_next_writes(2);
        manager.enqueue_position(0.3, 0.3, 0.3).unwrap();
        assert!(manager.wait_until_idle(Duration::from_secs(2)));

        let stats = manager.stats();
        assert_eq!(stats.write_failures, 0);
        assert_eq!(stats.total_confirmed, 1);
        let stored = read_command(&medium);
        assert_eq!(stored.seq, WriteSeq(1));
    }

    #[test]
    fn test_timeout_fallback_keeps_newer_local_gripper() {
        let medium = Arc::new(MemoryMedium::new());
        let manager = QueueManager::start(medium, fast_config()).unwrap();
        let events = manager.subscribe();

        manager
            .enqueue(Target::position(1.0, 0.0, 0.0).with_gripper(GRIPPER_OPEN))
            .unwrap();
        assert!(matches!(
            events.recv_timeout(Duration::from_secs(1)).unwrap(),
            DispatchEvent::Dispatched { .. }
        ));
        // 命令在途时关闭夹爪并急停，夹爪变化留在队列里不会被发出
        manager.close_gripper().unwrap();
        manager.emergency_halt();
        assert!(manager.wait_until_idle(Duration::from_secs(2)));

        let state = manager.position();
        assert_eq!(state.source, StateSource::Fallback);
        assert_eq!(state.pose.position, Position::new(1.0, 0.0, 0.0));
        assert_eq!(state.gripper, GRIPPER_CLOSED);
        assert_eq!(manager.shared.queue.pending_gripper(), Some(GRIPPER_CLOSED));
        assert_eq!(manager.stats().total_timed_out, 1);
    }

    #[test]
    fn test_gripper_hold_when_idle() {
        let medium = Arc::new(MemoryMedium::new());
        let _executor = spawn_executor(&medium);
        let manager = QueueManager::start(medium.clone(), fast_config()).unwrap();
        let home = manager.position().pose;

        manager.close_gripper().unwrap();
        // 本地状态立即生效
        assert_eq!(manager.position().gripper, GRIPPER_CLOSED);

        assert!(manager.wait_until_idle(Duration::from_secs(2)));
        let stored = read_command(&medium);
        assert_eq!(stored.target, Target::from(home).with_gripper(GRIPPER_CLOSED));

        let state = manager.position();
        assert_eq!(state.gripper, GRIPPER_CLOSED);
        assert_eq!(state.source, StateSource::Confirmed);
    }
}

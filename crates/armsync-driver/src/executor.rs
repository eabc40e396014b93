//! 执行器端
//!
//! 执行器是协议的外部参与方：按自己的节奏读命令槽、执行运动、写确认槽。
//! 本模块给出执行器契约（`MotionExecutor`）和一个参考执行循环，
//! 供仿真和测试使用。
//!
//! # 行为
//!
//! - 启动时以两个槽位中已有的最大序号为起点，启动前留下的命令不会重放
//!   （确认槽可能已被生产者读后清空，因此命令槽的序号同样计入）
//! - 只执行序号大于上一次确认的命令（命令槽是覆盖写的，中间命令可能被跳过）
//! - 解析失败的命令按“尚无新命令”处理
//! - 运动完成后写一条 `completed = true` 的确认，回显命令序号

use crate::error::DriverError;
use crate::medium::{SlotKind, SlotMedium};
use armsync_protocol::{Acknowledgment, Command, GRIPPER_OPEN, Position, Target, WriteSeq, now_ms};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 一次运动的实际结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionResult {
    /// 实际到达的位置
    pub position: Position,
    /// 实际夹爪宽度（执行器无法读回时为 `None`）
    pub gripper: Option<f64>,
}

/// 执行器契约
///
/// 实现方负责实际运动（仿真、控制器桥接等），包括夹爪宽度的限幅。
pub trait MotionExecutor: Send {
    fn execute(&mut self, target: &Target) -> MotionResult;
}

/// 执行循环配置
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// 命令槽轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 仿真运动耗时（毫秒）
    pub motion_time_ms: u64,
    /// 夹爪最大开口（米）
    pub max_gripper_width: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            motion_time_ms: 200,
            max_gripper_width: GRIPPER_OPEN,
        }
    }
}

/// 仿真机械臂
///
/// 睡眠 `motion_time` 后直接“到达”目标，夹爪宽度限幅到 `[0, max_gripper_width]`。
#[derive(Debug, Clone)]
pub struct SimulatedArm {
    motion_time: Duration,
    max_gripper_width: f64,
    position: Position,
    gripper: f64,
}

impl SimulatedArm {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            motion_time: Duration::from_millis(config.motion_time_ms),
            max_gripper_width: config.max_gripper_width,
            position: Position::ORIGIN,
            gripper: config.max_gripper_width,
        }
    }

    /// 设置起始位置
    pub fn starting_at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn gripper(&self) -> f64 {
        self.gripper
    }
}

impl MotionExecutor for SimulatedArm {
    fn execute(&mut self, target: &Target) -> MotionResult {
        if !self.motion_time.is_zero() {
            thread::sleep(self.motion_time);
        }
        self.position = target.pose().position;
        if let Some(width) = target.gripper() {
            self.gripper = width.clamp(0.0, self.max_gripper_width);
        }
        MotionResult {
            position: self.position,
            gripper: Some(self.gripper),
        }
    }
}

/// 参考执行循环
pub struct ExecutorLoop<E: MotionExecutor> {
    medium: Arc<dyn SlotMedium>,
    executor: E,
    poll_interval: Duration,
    last_seen: WriteSeq,
}

impl<E: MotionExecutor> ExecutorLoop<E> {
    /// 创建执行循环，以两个槽位中已有的最大序号为起点
    pub fn new(medium: Arc<dyn SlotMedium>, executor: E, config: &ExecutorConfig) -> Self {
        let acked = slot_seq(medium.as_ref(), SlotKind::Ack, |bytes| {
            Acknowledgment::decode(bytes).map(|ack| ack.seq)
        });
        let commanded = slot_seq(medium.as_ref(), SlotKind::Command, |bytes| {
            Command::decode(bytes).map(|cmd| cmd.seq)
        });
        let last_seen = acked.max(commanded);
        if commanded > acked {
            info!("Executor skipping leftover command {} from a previous session", commanded);
        }
        Self {
            medium,
            executor,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            last_seen,
        }
    }

    /// 最近一次确认的命令序号
    pub fn last_seen(&self) -> WriteSeq {
        self.last_seen
    }

    /// 执行器实例
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// 检查一次命令槽，有新命令则执行并写确认
    ///
    /// 返回写入的确认；没有新命令时返回 `Ok(None)`。
    pub fn step(&mut self) -> Result<Option<Acknowledgment>, DriverError> {
        let Some(bytes) = self.medium.read_slot(SlotKind::Command)? else {
            return Ok(None);
        };
        let command = match Command::decode(&bytes) {
            Ok(cmd) => cmd,
            Err(e) => {
                debug!("Executor skipping unreadable command: {}", e);
                return Ok(None);
            },
        };
        if command.seq <= self.last_seen {
            return Ok(None);
        }

        debug!("Executing command {}: {}", command.seq, command.target.pose());
        let result = self.executor.execute(&command.target);
        let ack = Acknowledgment {
            completed: true,
            seq: command.seq,
            position: result.position,
            gripper: result.gripper,
            write_time_ms: now_ms(),
        };
        self.medium.write_slot(SlotKind::Ack, &ack.encode()?)?;
        self.last_seen = command.seq;
        Ok(Some(ack))
    }
}

/// 槽位中记录的序号；空槽或无法解析时为 `WriteSeq::ZERO`
fn slot_seq<E>(
    medium: &dyn SlotMedium,
    slot: SlotKind,
    decode: impl FnOnce(&[u8]) -> Result<WriteSeq, E>,
) -> WriteSeq {
    match medium.read_slot(slot) {
        Ok(Some(bytes)) => decode(&bytes).unwrap_or_default(),
        Ok(None) => WriteSeq::ZERO,
        Err(e) => {
            warn!("Executor could not read {} slot on startup: {}", slot, e);
            WriteSeq::ZERO
        },
    }
}

impl<E: MotionExecutor + 'static> ExecutorLoop<E> {
    /// 在后台线程中运行执行循环
    pub fn spawn(self) -> ExecutorHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let paused = Arc::new(AtomicBool::new(false));
        let executed = Arc::new(AtomicU64::new(0));

        let handle = {
            let shutdown = shutdown.clone();
            let paused = paused.clone();
            let executed = executed.clone();
            thread::Builder::new()
                .name("armsync-executor".into())
                .spawn(move || self.run(&shutdown, &paused, &executed))
        };
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to spawn executor thread: {}", e);
                shutdown.store(true, Ordering::Release);
                None
            },
        };

        ExecutorHandle {
            handle,
            shutdown,
            paused,
            executed,
        }
    }

    fn run(mut self, shutdown: &AtomicBool, paused: &AtomicBool, executed: &AtomicU64) {
        info!("Executor loop started on {}", self.medium.describe());
        while !shutdown.load(Ordering::Acquire) {
            let version = self.medium.version(SlotKind::Command);
            if !paused.load(Ordering::Acquire) {
                match self.step() {
                    Ok(Some(_)) => {
                        executed.fetch_add(1, Ordering::Relaxed);
                        continue;
                    },
                    Ok(None) => {},
                    Err(e) => warn!("Executor step failed: {}", e),
                }
            }
            self.medium.wait_for_change(SlotKind::Command, version, self.poll_interval);
        }
        info!("Executor loop stopped after {}", self.last_seen);
    }
}

/// 后台执行循环句柄
///
/// Drop 时停止线程并等待其退出。
pub struct ExecutorHandle {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    executed: Arc<AtomicU64>,
}

impl ExecutorHandle {
    /// 已执行的命令数
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// 暂停 / 恢复执行（暂停期间执行器不响应，用于模拟卡死）
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Acquire)
    }

    /// 停止执行循环并等待线程退出
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ExecutorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

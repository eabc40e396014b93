//! 集成测试公共设施
//!
//! 内存介质 + 后台执行循环 + 短超时的 `QueueManager`。

#![allow(dead_code)]

use armsync_client::{Observer, QueueManager, SyncConfig};
use armsync_driver::{
    ExecutorConfig, ExecutorHandle, ExecutorLoop, MemoryMedium, MotionExecutor, MotionResult,
    SimulatedArm,
};
use armsync_protocol::{Position, Target};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub const POLL_MS: u64 = 5;
pub const TIMEOUT_MS: u64 = 1_000;

/// 测试用同步配置
pub fn fast_config() -> SyncConfig {
    SyncConfig {
        poll_interval_ms: POLL_MS,
        ack_timeout_ms: TIMEOUT_MS,
        write_retry_delay_ms: 1,
        ..SyncConfig::default()
    }
}

/// 测试用执行器配置
pub fn executor_config(motion_ms: u64) -> ExecutorConfig {
    ExecutorConfig {
        poll_interval_ms: POLL_MS,
        motion_time_ms: motion_ms,
        ..ExecutorConfig::default()
    }
}

/// 执行记录：目标 + 执行时生产者看到的位置
#[derive(Debug, Clone, Copy)]
pub struct Executed {
    pub target: Target,
    pub producer_position: Option<Position>,
}

/// 记录每条执行命令的仿真臂
pub struct RecordingArm {
    inner: SimulatedArm,
    log: Arc<Mutex<Vec<Executed>>>,
    observer: Arc<Mutex<Option<Observer>>>,
}

impl MotionExecutor for RecordingArm {
    fn execute(&mut self, target: &Target) -> MotionResult {
        let producer_position = self.observer.lock().as_ref().map(|o| o.position().pose.position);
        self.log.lock().push(Executed {
            target: *target,
            producer_position,
        });
        self.inner.execute(target)
    }
}

/// 生产者 + 执行器
pub struct Harness {
    pub medium: Arc<MemoryMedium>,
    pub manager: QueueManager,
    pub executor: Option<ExecutorHandle>,
    log: Arc<Mutex<Vec<Executed>>>,
}

impl Harness {
    /// 带执行器的环境
    pub fn with_executor(motion_ms: u64) -> Self {
        Self::build(fast_config(), Some(motion_ms))
    }

    /// 没有执行器（所有命令都会超时）
    pub fn without_executor() -> Self {
        Self::build(fast_config(), None)
    }

    pub fn build(config: SyncConfig, motion_ms: Option<u64>) -> Self {
        let medium = Arc::new(MemoryMedium::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let observer_slot = Arc::new(Mutex::new(None));

        let executor = motion_ms.map(|ms| {
            let config = executor_config(ms);
            let arm = RecordingArm {
                inner: SimulatedArm::new(&config).starting_at(config_home()),
                log: log.clone(),
                observer: observer_slot.clone(),
            };
            ExecutorLoop::new(medium.clone(), arm, &config).spawn()
        });

        let manager = QueueManager::start(medium.clone(), config).expect("start manager");
        *observer_slot.lock() = Some(manager.observer());

        Self {
            medium,
            manager,
            executor,
            log,
        }
    }

    /// 已执行的命令
    pub fn executed(&self) -> Vec<Executed> {
        self.log.lock().clone()
    }

    pub fn pause_executor(&self, paused: bool) {
        if let Some(exec) = &self.executor {
            exec.set_paused(paused);
        }
    }

    pub fn drain(&self) {
        assert!(
            self.manager.wait_until_idle(Duration::from_secs(5)),
            "queue did not drain: {:?}",
            self.manager.stats()
        );
    }
}

fn config_home() -> Position {
    SyncConfig::default().initial_pose
}

//! 驱动层模块
//!
//! 本模块提供命令同步协议的两端端点，包括：
//! - 槽位介质抽象（内存介质带变更通知，文件介质退化为定时轮询）
//! - 命令写入（单调序号 + 覆盖写）
//! - 确认监视（新鲜度判定、半写记录容错、超时）
//! - 执行器契约与参考执行循环（仿真 / 测试）
//!
//! # 使用场景
//!
//! 需要直接读写命令槽 / 确认槽时使用本层。
//! 大多数用户应该使用 `armsync-client` 提供的 `QueueManager`。

mod error;
pub mod executor;
pub mod file;
pub mod medium;
pub mod memory;
pub mod watcher;
pub mod writer;

pub use error::{DriverError, MediumError};
pub use executor::{
    ExecutorConfig, ExecutorHandle, ExecutorLoop, MotionExecutor, MotionResult, SimulatedArm,
};
pub use file::FileMedium;
pub use medium::{SlotKind, SlotMedium};
pub use memory::MemoryMedium;
pub use watcher::{AckOutcome, AckRead, AckWatcher};
pub use writer::{CommandWriter, WriteRecord};

//! 客户端接口模块
//!
//! 本模块提供命令同步协议的生产者端，包括：
//! - 确认门控的有序命令队列（`QueueManager`）
//! - 调度状态机（`Idle → Sent → Waiting → {Acked, TimedOut} → Idle`）
//! - 位置状态与只读观察器（读写分离）
//! - 相对移动、组合移动、回到上一个位置与夹爪折叠
//!
//! # 使用场景
//!
//! 这是大多数用户应该使用的模块。需要直接读写槽位时使用 `armsync-driver`。

mod config;
mod direction;
mod error;
pub mod events;
pub mod machine;
pub mod manager;
pub mod observer;
pub mod queue;
pub mod state;

// 重新导出常用类型
pub use config::{DEFAULT_INITIAL_POSE, SyncConfig};
pub use direction::{Direction, UnknownDirection};
pub use error::ClientError;
pub use events::DispatchEvent;
pub use machine::{DispatchPhase, PhaseMachine};
pub use manager::QueueManager;
pub use observer::{Observer, QueueStats};
pub use queue::{MAX_POSITION_HISTORY, NextDispatch, PendingQueue, Rejected};
pub use state::{PositionState, StateSource};

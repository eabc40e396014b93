//! 确认监视
//!
//! 轮询确认槽，区分新鲜确认与陈旧确认，在超时前返回确认状态。
//!
//! # 判定规则
//!
//! | 读到的内容 | 处理 |
//! |------------|------|
//! | 空槽位 | 继续等待 |
//! | 解析失败（半写 / 损坏） | debug 日志，继续等待 |
//! | `seq` 小于命令序号 | 陈旧确认，静默忽略 |
//! | `seq` 足够新但 `completed == false` | 仍在执行，继续等待 |
//! | `seq` 足够新且 `completed == true` | 返回 `Confirmed` |

use crate::error::MediumError;
use crate::medium::{SlotKind, SlotMedium};
use armsync_protocol::{Acknowledgment, ConfirmedState, ProtocolError, WriteSeq};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// 单次读取确认槽的分类结果
#[derive(Debug)]
pub enum AckRead {
    /// 槽位为空
    Empty,
    /// 无法解析（执行器写到一半或内容损坏）
    Malformed(ProtocolError),
    /// 属于之前的命令
    Stale(Acknowledgment),
    /// 序号足够新，但运动尚未完成
    InProgress(Acknowledgment),
    /// 新鲜且已完成
    Fresh(Acknowledgment),
}

/// 等待结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AckOutcome {
    /// 收到新鲜确认
    Confirmed(ConfirmedState),
    /// 超时未收到新鲜确认
    TimedOut {
        /// 实际等待时长
        waited: Duration,
    },
    /// 生产者正在关闭，放弃等待
    Shutdown,
}

/// 确认监视器
pub struct AckWatcher {
    medium: Arc<dyn SlotMedium>,
    poll_interval: Duration,
    clear_on_read: bool,
    shutdown: Option<Arc<AtomicBool>>,
}

impl AckWatcher {
    /// 创建监视器
    ///
    /// `poll_interval` 是介质不支持通知时的轮询间隔，也是支持通知时的最长单次等待。
    pub fn new(medium: Arc<dyn SlotMedium>, poll_interval: Duration) -> Self {
        Self {
            medium,
            poll_interval,
            clear_on_read: false,
            shutdown: None,
        }
    }

    /// 读到新鲜确认后是否清空确认槽
    pub fn clear_on_read(mut self, clear: bool) -> Self {
        self.clear_on_read = clear;
        self
    }

    /// 关联关闭标志；标志置位后等待以 `AckOutcome::Shutdown` 结束
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// 轮询间隔
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// 读取并分类一次确认槽
    pub fn poll_once(&self, seq: WriteSeq) -> Result<AckRead, MediumError> {
        let Some(bytes) = self.medium.read_slot(SlotKind::Ack)? else {
            return Ok(AckRead::Empty);
        };
        let ack = match Acknowledgment::decode(&bytes) {
            Ok(ack) => ack,
            Err(e) => return Ok(AckRead::Malformed(e)),
        };
        Ok(if !ack.is_fresh_for(seq) {
            AckRead::Stale(ack)
        } else if !ack.completed {
            AckRead::InProgress(ack)
        } else {
            AckRead::Fresh(ack)
        })
    }

    /// 等待 `seq` 对应命令的新鲜确认
    ///
    /// 最迟在 `timeout` 加一个轮询间隔内返回。
    pub fn wait_for_ack(&self, seq: WriteSeq, timeout: Duration) -> AckOutcome {
        let start = Instant::now();
        let deadline = start + timeout;

        loop {
            if self.is_shutting_down() {
                return AckOutcome::Shutdown;
            }

            // 先取版本再读内容，读后发生的写入会让下面的等待立即返回
            let version = self.medium.version(SlotKind::Ack);
            match self.poll_once(seq) {
                Ok(AckRead::Fresh(ack)) => {
                    if self.clear_on_read {
                        if let Err(e) = self.medium.clear_slot(SlotKind::Ack) {
                            debug!("Failed to clear consumed ack {}: {}", ack.seq, e);
                        }
                    }
                    return AckOutcome::Confirmed(ack.confirmed_state());
                },
                Ok(AckRead::Stale(ack)) => {
                    trace!("Ignoring stale ack {} while waiting for {}", ack.seq, seq);
                },
                Ok(AckRead::InProgress(ack)) => {
                    trace!("Ack {} reports motion still in progress", ack.seq);
                },
                Ok(AckRead::Malformed(e)) => {
                    debug!("Malformed ack while waiting for {}: {}", seq, e);
                },
                Ok(AckRead::Empty) => {},
                Err(e) => {
                    warn!("Failed to read ack slot while waiting for {}: {}", seq, e);
                },
            }

            let now = Instant::now();
            if now >= deadline {
                return AckOutcome::TimedOut {
                    waited: now - start,
                };
            }
            let wait = self.poll_interval.min(deadline - now);
            self.medium.wait_for_change(SlotKind::Ack, version, wait);
        }
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|flag| flag.load(Ordering::Acquire))
    }
}

//! 挖矿会话模块
//!
//! 会话状态机、连接校验与进程监督。

pub mod manager;
pub mod validator;

use std::time::{Duration, Instant};

pub use manager::{MiningManager, MiningStatus};
pub use validator::{test_pool_connection, validate_connection, Validation};

/// 挖矿会话状态
///
/// 同一时刻最多一个会话处于 Running；Running 期间的再次启动
/// 会被同步拒绝而不是排队。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningState {
    /// 空闲
    Idle,
    /// 正在启动进程
    Starting,
    /// 正在校验矿池连接
    Validating,
    /// 运行中
    Running,
    /// 正在停止
    Stopping,
}

/// 会话时钟
///
/// 启动时间驱动运行时长显示，停止时间驱动图表的衰减宽限窗。
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionClock {
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录会话启动，清除上一次的停止时间
    pub fn mark_started(&mut self) {
        self.started_at = Some(Instant::now());
        self.stopped_at = None;
    }

    /// 记录会话停止
    pub fn mark_stopped(&mut self) {
        self.started_at = None;
        self.stopped_at = Some(Instant::now());
    }

    /// 会话运行秒数，未运行时为 0
    pub fn uptime_secs(&self) -> u64 {
        self.started_at
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    /// 停止后是否仍在宽限窗内
    pub fn within_stop_grace(&self, grace: Duration) -> bool {
        self.stopped_at
            .map(|t| t.elapsed() < grace)
            .unwrap_or(false)
    }
}

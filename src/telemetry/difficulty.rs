//! 份额难度跟踪
//!
//! 会话最佳只存在于内存，随每次启动清零；全时最佳跨会话单调
//! 不减，刷新纪录时连同日期一起持久化到配置文件。

use chrono::Utc;
use tracing::{info, warn};

use crate::config::ConfigStore;

/// 难度跟踪器
pub struct DifficultyTracker {
    session_best: f64,
    all_time_best: f64,
}

impl DifficultyTracker {
    pub fn new() -> Self {
        Self {
            session_best: 0.0,
            all_time_best: 0.0,
        }
    }

    /// 会话启动时从配置载入全时最佳
    ///
    /// 只增不减：载入值低于内存中已知的纪录时保留内存值。
    pub fn load_all_time_best(&mut self, value: f64) {
        if value > self.all_time_best {
            self.all_time_best = value;
        }
    }

    /// 清零会话最佳
    pub fn reset_session(&mut self) {
        self.session_best = 0.0;
    }

    pub fn session_best(&self) -> f64 {
        self.session_best
    }

    pub fn all_time_best(&self) -> f64 {
        self.all_time_best
    }

    /// 处理一个份额难度值
    ///
    /// 刷新全时纪录时通过 read-merge-write 持久化，只更新难度
    /// 两个字段，不碰配置文件里的其他内容；写入失败只记日志，
    /// 内存纪录已先行更新，下一次刷新纪录时自然重试。
    pub fn record(&mut self, value: f64, store: &ConfigStore) {
        if value > self.session_best {
            self.session_best = value;
            info!("New session best difficulty: {}", value);
        }

        if value > self.all_time_best {
            self.all_time_best = value;
            info!("New all-time best difficulty: {}", value);

            let result = store.update(|config| {
                // 并发写入方可能已存入更高纪录，锁内再校验一次单调性
                if value > config.all_time_best_difficulty {
                    config.all_time_best_difficulty = value;
                    config.all_time_best_difficulty_date = Some(Utc::now());
                }
            });

            if let Err(e) = result {
                warn!("Failed to persist all-time best difficulty: {}", e);
            }
        }
    }
}

impl Default for DifficultyTracker {
    fn default() -> Self {
        Self::new()
    }
}

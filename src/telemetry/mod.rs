//! 遥测模块
//!
//! 把矿工的非结构化输出转换为结构化的算力与难度数据：
//! 行分类、加权算力合成、有界历史缓冲、最佳难度跟踪。

pub mod aggregator;
pub mod difficulty;
pub mod history;
pub mod parser;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

pub use aggregator::HashrateAggregator;
pub use difficulty::DifficultyTracker;
pub use history::HistoryBuffer;
pub use parser::{classify, LineEvents, SampleEvent};

use crate::config::ConfigStore;

/// 算力单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashrateUnit {
    #[serde(rename = "H")]
    H,
    #[serde(rename = "kH")]
    Kh,
    #[serde(rename = "MH")]
    Mh,
    #[serde(rename = "GH")]
    Gh,
}

impl HashrateUnit {
    /// 换算到 H/s 的倍率
    pub fn multiplier(&self) -> f64 {
        match self {
            HashrateUnit::H => 1.0,
            HashrateUnit::Kh => 1_000.0,
            HashrateUnit::Mh => 1_000_000.0,
            HashrateUnit::Gh => 1_000_000_000.0,
        }
    }

    /// 解析矿工输出中的单位标记（大小写不敏感）
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "h" => Some(HashrateUnit::H),
            "kh" => Some(HashrateUnit::Kh),
            "mh" => Some(HashrateUnit::Mh),
            "gh" => Some(HashrateUnit::Gh),
            _ => None,
        }
    }
}

impl fmt::Display for HashrateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HashrateUnit::H => "H",
            HashrateUnit::Kh => "kH",
            HashrateUnit::Mh => "MH",
            HashrateUnit::Gh => "GH",
        };
        write!(f, "{}", s)
    }
}

/// 历史数据点
///
/// 时间戳为毫秒级 Unix 时间，数值统一换算为 H/s，单位恒为 H。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    #[serde(rename = "value")]
    pub value_hs: f64,
    pub unit: HashrateUnit,
}

impl HistoryPoint {
    pub fn new(timestamp_ms: u64, value_hs: f64) -> Self {
        Self {
            timestamp_ms,
            value_hs,
            unit: HashrateUnit::H,
        }
    }

    /// 以当前墙钟时间构造数据点
    pub fn now(value_hs: f64) -> Self {
        Self::new(unix_timestamp_ms(), value_hs)
    }
}

/// 当前的毫秒级 Unix 时间戳
pub fn unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// 矿工输出转录
///
/// 保留最近的原始输出行用于诊断展示，超出上限丢弃最旧的行。
#[derive(Debug)]
pub struct Transcript {
    lines: VecDeque<String>,
    max_lines: usize,
}

impl Transcript {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(max_lines),
            max_lines,
        }
    }

    pub fn push(&mut self, line: String) {
        self.lines.push_back(line);
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 最近 n 行
    pub fn recent(&self, n: usize) -> Vec<String> {
        self.lines
            .iter()
            .skip(self.lines.len().saturating_sub(n))
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// 矿工输出转录上限
pub const TRANSCRIPT_MAX_LINES: usize = 500;

/// 历史缓冲上限
pub const HISTORY_MAX_POINTS: usize = 300;

/// 图表缓冲的滚动时间窗
pub const CHART_WINDOW_MS: u64 = 10 * 60 * 1000;

/// 聚合遥测状态
///
/// 监控循环（随矿工输出触发）和图表任务（2 秒定时触发）共享
/// 这份状态，调用方持有 `Arc<Mutex<TelemetryState>>`，所有
/// 读写都在同一把锁内完成。
pub struct TelemetryState {
    pub aggregator: HashrateAggregator,
    pub difficulty: DifficultyTracker,
    pub raw_history: HistoryBuffer,
    pub chart_history: HistoryBuffer,
    pub transcript: Transcript,
}

impl TelemetryState {
    pub fn new() -> Self {
        Self {
            aggregator: HashrateAggregator::new(),
            difficulty: DifficultyTracker::new(),
            raw_history: HistoryBuffer::new(HISTORY_MAX_POINTS),
            chart_history: HistoryBuffer::with_window(HISTORY_MAX_POINTS, CHART_WINDOW_MS),
            transcript: Transcript::new(TRANSCRIPT_MAX_LINES),
        }
    }

    /// 会话启动时的状态复位
    ///
    /// 原始历史跨会话保留，图表历史清空，全时最佳从配置载入。
    pub fn reset_for_start(&mut self, all_time_best: f64) {
        self.aggregator.reset();
        self.difficulty.reset_session();
        self.difficulty.load_all_time_best(all_time_best);
        self.chart_history.clear();
        self.transcript.clear();
    }

    /// 会话结束时清零瞬时遥测
    pub fn reset_transient(&mut self) {
        self.aggregator.reset();
    }

    /// 处理一行矿工输出
    ///
    /// 行无条件进入转录；分类出的事件更新聚合器与难度跟踪，
    /// 每个算力样本事件产生一个原始历史点。
    pub fn apply_line(&mut self, line: &str, store: &ConfigStore) {
        self.transcript.push(line.to_string());

        let events = classify(line);
        let now = Instant::now();

        match events.sample {
            Some(SampleEvent::Core {
                ref core_id,
                value,
                unit,
            }) => {
                self.aggregator.record_core_sample(core_id, value, unit, now);
                self.raw_history
                    .push(HistoryPoint::now(self.aggregator.combined_hs()));
            }
            Some(SampleEvent::Accepted { value, unit }) => {
                self.aggregator.record_accepted(value, unit, now);
                self.raw_history
                    .push(HistoryPoint::now(self.aggregator.combined_hs()));
            }
            None => {}
        }

        if let Some(difficulty) = events.share_difficulty {
            self.difficulty.record(difficulty, store);
        }
    }
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self::new()
    }
}

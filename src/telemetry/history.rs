//! 有界历史缓冲
//!
//! 原始历史与图表历史共用同一个实现：追加写入、超出容量丢弃
//! 最旧的点；图表实例额外带一个相对最新点的滚动时间窗。

use std::collections::VecDeque;

use crate::telemetry::HistoryPoint;

/// 时序数据缓冲
pub struct HistoryBuffer {
    points: VecDeque<HistoryPoint>,
    max_points: usize,
    window_ms: Option<u64>,
}

impl HistoryBuffer {
    /// 仅按容量截断的缓冲
    pub fn new(max_points: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(max_points),
            max_points,
            window_ms: None,
        }
    }

    /// 带滚动时间窗的缓冲，窗口相对最新点计算
    pub fn with_window(max_points: usize, window_ms: u64) -> Self {
        Self {
            points: VecDeque::with_capacity(max_points),
            max_points,
            window_ms: Some(window_ms),
        }
    }

    /// 追加一个数据点并执行截断
    pub fn push(&mut self, point: HistoryPoint) {
        self.points.push_back(point);

        if let Some(window_ms) = self.window_ms {
            let newest = self.points.back().map(|p| p.timestamp_ms).unwrap_or(0);
            let cutoff = newest.saturating_sub(window_ms);
            while let Some(front) = self.points.front() {
                if front.timestamp_ms < cutoff {
                    self.points.pop_front();
                } else {
                    break;
                }
            }
        }

        while self.points.len() > self.max_points {
            self.points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }

    /// 最近 n 个点（时间序保持）
    pub fn tail(&self, n: usize) -> Vec<HistoryPoint> {
        self.points
            .iter()
            .skip(self.points.len().saturating_sub(n))
            .copied()
            .collect()
    }

    pub fn all(&self) -> Vec<HistoryPoint> {
        self.points.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

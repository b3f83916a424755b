//! 加权算力合成
//!
//! 两路信号：单核样本到得快但抖动大，池确认的 accepted 总算力
//! 稳定但间隔长。合成值以 accepted 为主（70%）、核和为辅（30%），
//! 在两次 accepted 之间仍能跟随单核样本快速反馈。

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::telemetry::HashrateUnit;
use crate::utils::format_hashrate;

/// 单核样本的过期时间
const CORE_SAMPLE_TTL: Duration = Duration::from_secs(30);

/// accepted 信号的权重
const ACCEPTED_WEIGHT: f64 = 0.7;

/// 核和信号的权重
const CORE_SUM_WEIGHT: f64 = 0.3;

/// 合成单位的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitSource {
    /// 启动默认值，尚无任何样本
    Default,
    /// 由单核样本确定
    Core,
    /// 由 accepted 样本固定，单核样本不再覆盖
    Accepted,
}

#[derive(Debug, Clone)]
struct CoreEntry {
    value: f64,
    recorded_at: Instant,
}

/// 算力聚合器
///
/// 合成运算保持在矿工报告的单位上进行，换算到 H/s 只发生在
/// 历史写入和状态展示处。
pub struct HashrateAggregator {
    cores: HashMap<String, CoreEntry>,
    last_accepted: f64,
    combined_value: f64,
    combined_unit: HashrateUnit,
    unit_source: UnitSource,
}

impl HashrateAggregator {
    pub fn new() -> Self {
        Self {
            cores: HashMap::new(),
            last_accepted: 0.0,
            combined_value: 0.0,
            combined_unit: HashrateUnit::Kh,
            unit_source: UnitSource::Default,
        }
    }

    /// 记录一个单核样本并重算合成值
    pub fn record_core_sample(
        &mut self,
        core_id: &str,
        value: f64,
        unit: HashrateUnit,
        now: Instant,
    ) {
        self.cores.insert(
            core_id.to_string(),
            CoreEntry {
                value,
                recorded_at: now,
            },
        );

        // accepted 固定过单位后，单核样本不再改写
        if self.unit_source == UnitSource::Default {
            self.combined_unit = unit;
            self.unit_source = UnitSource::Core;
        }

        let core_sum = self.core_sum(now);

        if self.last_accepted > 0.0 {
            self.combined_value =
                self.last_accepted * ACCEPTED_WEIGHT + core_sum * CORE_SUM_WEIGHT;
        } else {
            self.combined_value = core_sum;
        }
    }

    /// 记录池确认的总算力并重算合成值
    pub fn record_accepted(&mut self, value: f64, unit: HashrateUnit, now: Instant) {
        self.last_accepted = value;
        self.combined_unit = unit;
        self.unit_source = UnitSource::Accepted;

        let core_sum = self.core_sum(now);

        if core_sum > 0.0 {
            self.combined_value = value * ACCEPTED_WEIGHT + core_sum * CORE_SUM_WEIGHT;
        } else {
            self.combined_value = value;
        }
    }

    /// 清除过期样本后求核和
    fn core_sum(&mut self, now: Instant) -> f64 {
        self.cores
            .retain(|_, entry| now.duration_since(entry.recorded_at) < CORE_SAMPLE_TTL);
        self.cores.values().map(|entry| entry.value).sum()
    }

    /// 合成算力（报告单位）
    pub fn combined(&self) -> (f64, HashrateUnit) {
        (self.combined_value, self.combined_unit)
    }

    /// 合成算力换算为 H/s
    pub fn combined_hs(&self) -> f64 {
        self.combined_value * self.combined_unit.multiplier()
    }

    /// 对外发布的格式化形式，如 `79.0 kH/s`
    pub fn formatted(&self) -> String {
        format_hashrate(self.combined_value, self.combined_unit)
    }

    /// 当前活跃的核数
    pub fn active_cores(&self) -> usize {
        self.cores.len()
    }

    /// 复位到启动状态
    pub fn reset(&mut self) {
        self.cores.clear();
        self.last_accepted = 0.0;
        self.combined_value = 0.0;
        self.combined_unit = HashrateUnit::Kh;
        self.unit_source = UnitSource::Default;
    }
}

impl Default for HashrateAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cores_only_combined_is_exact_sum() {
        let mut agg = HashrateAggregator::new();
        let now = Instant::now();

        agg.record_core_sample("0", 100.0, HashrateUnit::H, now);
        agg.record_core_sample("1", 250.0, HashrateUnit::H, now);
        agg.record_core_sample("2", 75.5, HashrateUnit::H, now);

        let (value, unit) = agg.combined();
        assert_eq!(value, 425.5);
        assert_eq!(unit, HashrateUnit::H);
    }

    #[test]
    fn test_core_upsert_replaces_previous_value() {
        let mut agg = HashrateAggregator::new();
        let now = Instant::now();

        agg.record_core_sample("0", 100.0, HashrateUnit::H, now);
        agg.record_core_sample("0", 150.0, HashrateUnit::H, now);

        assert_eq!(agg.combined().0, 150.0);
        assert_eq!(agg.active_cores(), 1);
    }

    #[test]
    fn test_weighted_combination() {
        let mut agg = HashrateAggregator::new();
        let now = Instant::now();

        agg.record_core_sample("0", 30.0, HashrateUnit::H, now);
        agg.record_accepted(100.0, HashrateUnit::H, now);

        // 100×0.7 + 30×0.3 = 79.0
        assert_eq!(agg.combined().0, 79.0);
        assert_eq!(agg.formatted(), "79.0 H/s");
    }

    #[test]
    fn test_accepted_without_cores_used_directly() {
        let mut agg = HashrateAggregator::new();
        agg.record_accepted(2.4, HashrateUnit::Kh, Instant::now());

        assert_eq!(agg.combined(), (2.4, HashrateUnit::Kh));
    }

    #[test]
    fn test_core_weighted_after_accepted() {
        let mut agg = HashrateAggregator::new();
        let now = Instant::now();

        agg.record_accepted(100.0, HashrateUnit::H, now);
        agg.record_core_sample("0", 30.0, HashrateUnit::H, now);

        assert_eq!(agg.combined().0, 79.0);
    }

    #[test]
    fn test_stale_core_excluded_from_sum() {
        let mut agg = HashrateAggregator::new();
        let t0 = Instant::now();

        agg.record_core_sample("0", 100.0, HashrateUnit::H, t0);
        agg.record_core_sample("1", 50.0, HashrateUnit::H, t0);

        // 31 秒后只有新样本的核保留
        let t1 = t0 + Duration::from_secs(31);
        agg.record_core_sample("1", 60.0, HashrateUnit::H, t1);

        assert_eq!(agg.combined().0, 60.0);
        assert_eq!(agg.active_cores(), 1);
    }

    #[test]
    fn test_accepted_recompute_purges_stale_cores() {
        let mut agg = HashrateAggregator::new();
        let t0 = Instant::now();

        agg.record_core_sample("0", 30.0, HashrateUnit::H, t0);

        let t1 = t0 + Duration::from_secs(31);
        agg.record_accepted(100.0, HashrateUnit::H, t1);

        // 过期的核不参与加权，直接采用 accepted 值
        assert_eq!(agg.combined().0, 100.0);
    }

    #[test]
    fn test_unit_adoption_rules() {
        let mut agg = HashrateAggregator::new();
        let now = Instant::now();

        // 启动默认单位为 kH，第一个核样本可改写
        agg.record_core_sample("0", 1.0, HashrateUnit::Mh, now);
        assert_eq!(agg.combined().1, HashrateUnit::Mh);

        // 后续核样本不再改写
        agg.record_core_sample("1", 1.0, HashrateUnit::Gh, now);
        assert_eq!(agg.combined().1, HashrateUnit::Mh);

        // accepted 总是改写
        agg.record_accepted(5.0, HashrateUnit::Kh, now);
        assert_eq!(agg.combined().1, HashrateUnit::Kh);

        // accepted 固定之后核样本无法覆盖
        agg.record_core_sample("2", 1.0, HashrateUnit::H, now);
        assert_eq!(agg.combined().1, HashrateUnit::Kh);
    }

    #[test]
    fn test_reset_returns_to_start_state() {
        let mut agg = HashrateAggregator::new();
        let now = Instant::now();

        agg.record_core_sample("0", 100.0, HashrateUnit::Mh, now);
        agg.record_accepted(50.0, HashrateUnit::Mh, now);
        agg.reset();

        assert_eq!(agg.combined(), (0.0, HashrateUnit::Kh));
        assert_eq!(agg.active_cores(), 0);
        assert_eq!(agg.combined_hs(), 0.0);

        // 复位后单位规则回到初始状态
        agg.record_core_sample("0", 1.0, HashrateUnit::H, now);
        assert_eq!(agg.combined().1, HashrateUnit::H);
    }

    #[test]
    fn test_combined_hs_normalization() {
        let mut agg = HashrateAggregator::new();
        agg.record_accepted(2.4, HashrateUnit::Kh, Instant::now());
        assert_eq!(agg.combined_hs(), 2400.0);
    }
}

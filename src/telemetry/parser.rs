//! 矿工输出行分类
//!
//! 按固定优先级对每一行做模式匹配：先单核样本，其次 accepted
//! 总算力，share diff 独立判定、可与前两者同行共存。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::telemetry::HashrateUnit;

/// 单核样本，如 `CPU #0: 2205.0 kH/s`
static CORE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)CPU #(\d+):\s*([\d.]+)\s*(H|kH|MH|GH)/s").unwrap());

/// 池确认总算力，如 `accepted: 1/1 (100.00%), 2.40 kH/s yes!`
static ACCEPTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)accepted:.*?([\d.]+)\s*(H|kH|MH|GH)/s").unwrap());

/// 份额难度，如 `share diff 0.015`
///
/// 只认 "share diff"，"Stratum difficulty" 和 "block diff" 不匹配。
static SHARE_DIFF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)share diff ([\d.]+)").unwrap());

/// 算力样本事件，一行最多产生一个
#[derive(Debug, Clone, PartialEq)]
pub enum SampleEvent {
    /// 单核算力读数
    Core {
        core_id: String,
        value: f64,
        unit: HashrateUnit,
    },
    /// 池确认的总算力
    Accepted { value: f64, unit: HashrateUnit },
}

/// 一行输出分类出的全部事件
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LineEvents {
    pub sample: Option<SampleEvent>,
    pub share_difficulty: Option<f64>,
}

impl LineEvents {
    pub fn is_empty(&self) -> bool {
        self.sample.is_none() && self.share_difficulty.is_none()
    }
}

/// 对一行矿工输出做分类
///
/// 规则按固定顺序求值，前两条互斥，share diff 独立：
/// 1. 含 `CPU #` 与 `/s` 的行按单核样本提取
/// 2. 否则含 `accepted:` 的行按池确认算力提取
/// 3. 含 `share diff` 短语的行额外提取份额难度
pub fn classify(line: &str) -> LineEvents {
    let mut events = LineEvents::default();

    if line.contains("CPU #") && line.contains("/s") {
        if let Some(caps) = CORE_RE.captures(line) {
            let value = caps[2].parse::<f64>().ok();
            let unit = HashrateUnit::parse(&caps[3]);
            if let (Some(value), Some(unit)) = (value, unit) {
                events.sample = Some(SampleEvent::Core {
                    core_id: caps[1].to_string(),
                    value,
                    unit,
                });
            }
        }
    } else if line.contains("accepted:") {
        if let Some(caps) = ACCEPTED_RE.captures(line) {
            let value = caps[1].parse::<f64>().ok();
            let unit = HashrateUnit::parse(&caps[2]);
            if let (Some(value), Some(unit)) = (value, unit) {
                events.sample = Some(SampleEvent::Accepted { value, unit });
            }
        }
    }

    if line.contains("share diff") {
        if let Some(caps) = SHARE_DIFF_RE.captures(line) {
            events.share_difficulty = caps[1].parse::<f64>().ok();
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_sample_line() {
        let events = classify("CPU #0: 2205.0 kH/s");
        assert_eq!(
            events.sample,
            Some(SampleEvent::Core {
                core_id: "0".to_string(),
                value: 2205.0,
                unit: HashrateUnit::Kh,
            })
        );
        assert_eq!(events.share_difficulty, None);
    }

    #[test]
    fn test_core_sample_with_prefix_noise() {
        let events = classify("[2024-01-06 12:32:37] CPU #3: 512.44 H/s");
        assert_eq!(
            events.sample,
            Some(SampleEvent::Core {
                core_id: "3".to_string(),
                value: 512.44,
                unit: HashrateUnit::H,
            })
        );
    }

    #[test]
    fn test_accepted_line() {
        let events = classify("[accepted: 1, 2.40 kH/s yes!]");
        assert_eq!(
            events.sample,
            Some(SampleEvent::Accepted {
                value: 2.40,
                unit: HashrateUnit::Kh,
            })
        );
    }

    #[test]
    fn test_accepted_line_cpuminer_format() {
        let events = classify("accepted: 5/5 (100.00%), 8.91 kH/s yes!");
        assert_eq!(
            events.sample,
            Some(SampleEvent::Accepted {
                value: 8.91,
                unit: HashrateUnit::Kh,
            })
        );
    }

    #[test]
    fn test_core_takes_priority_over_accepted() {
        // 同一行同时出现时单核样本优先
        let events = classify("CPU #1: 100.0 H/s accepted: 2.0 kH/s");
        assert!(matches!(events.sample, Some(SampleEvent::Core { .. })));
    }

    #[test]
    fn test_share_diff_without_false_stratum_match() {
        let events = classify("share diff 0.015, Stratum difficulty 0.001");
        assert_eq!(events.share_difficulty, Some(0.015));
        assert_eq!(events.sample, None);
    }

    #[test]
    fn test_stratum_difficulty_alone_not_matched() {
        let events = classify("Stratum difficulty set to 0.001");
        assert_eq!(events.share_difficulty, None);
    }

    #[test]
    fn test_block_diff_not_matched() {
        let events = classify("block diff 12345.6");
        assert_eq!(events.share_difficulty, None);
    }

    #[test]
    fn test_share_diff_cofires_with_accepted() {
        let events = classify("accepted: 1/1, 2.40 kH/s, share diff 0.021 yes!");
        assert_eq!(
            events.sample,
            Some(SampleEvent::Accepted {
                value: 2.40,
                unit: HashrateUnit::Kh,
            })
        );
        assert_eq!(events.share_difficulty, Some(0.021));
    }

    #[test]
    fn test_unmatched_line_is_empty() {
        assert!(classify("Starting Stratum on stratum+tcp://pool:3333").is_empty());
        assert!(classify("").is_empty());
    }
}

//! 统一的算力格式化工具
//!
//! 发布值使用固定单位格式化，日志输出使用单位自适应格式化。

use crate::telemetry::HashrateUnit;

/// 按报告单位格式化算力（保留一位小数）
///
/// 这是对外发布的形式，与矿工输出使用同一套单位。
///
/// # 示例
/// ```
/// use nodeminer_rs::telemetry::HashrateUnit;
/// use nodeminer_rs::utils::format_hashrate;
///
/// assert_eq!(format_hashrate(2205.0, HashrateUnit::Kh), "2205.0 kH/s");
/// assert_eq!(format_hashrate(0.0, HashrateUnit::H), "0.0 H/s");
/// ```
pub fn format_hashrate(value: f64, unit: HashrateUnit) -> String {
    format!("{:.1} {}/s", value, unit)
}

/// 格式化算力显示（智能单位自适应）
///
/// 输入为 H/s，根据数值大小自动选择 H、kH、MH、GH。
///
/// # 示例
/// ```
/// use nodeminer_rs::utils::format_hashrate_auto;
///
/// assert_eq!(format_hashrate_auto(1234.0), "1.23 kH/s");
/// assert_eq!(format_hashrate_auto(1234567890.0), "1.23 GH/s");
/// ```
pub fn format_hashrate_auto(hashrate_hs: f64) -> String {
    if hashrate_hs <= 0.0 {
        return "0.0 H/s".to_string();
    }

    if !hashrate_hs.is_finite() {
        return "∞ H/s".to_string();
    }

    if hashrate_hs >= 1_000_000_000.0 {
        format!("{:.2} GH/s", hashrate_hs / 1_000_000_000.0)
    } else if hashrate_hs >= 1_000_000.0 {
        format!("{:.2} MH/s", hashrate_hs / 1_000_000.0)
    } else if hashrate_hs >= 1_000.0 {
        format!("{:.2} kH/s", hashrate_hs / 1_000.0)
    } else {
        format!("{:.1} H/s", hashrate_hs)
    }
}

//! 主机资源采样
//!
//! CPU 占用按两次刷新之间的增量计算，不做阻塞等待；温度按
//! 已知传感器标签的优先顺序取第一个可用值。

use sysinfo::{Components, System};
use tracing::debug;

use crate::monitoring::SystemStats;

/// 已知 CPU 温度传感器标签，按优先顺序匹配
///
/// coretemp: Intel/AMD 桌面与服务器；cpu_thermal: 树莓派；
/// k10temp / zenpower: AMD Ryzen 的两种驱动。
const KNOWN_TEMP_SENSORS: &[&str] = &["coretemp", "cpu_thermal", "k10temp", "zenpower"];

const TEMP_UNAVAILABLE: &str = "Temperature sensor not available";

/// 系统资源采样器
///
/// 持有 sysinfo 的系统与传感器状态，CPU 占用需要跨采样的基线，
/// 因此采样器在进程内常驻。
pub struct SystemMonitor {
    sys: System,
    components: Components,
}

impl SystemMonitor {
    pub fn new() -> Self {
        let mut sys = System::new();
        // 建立 CPU 占用基线，首次采样就能给出增量值
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        Self {
            sys,
            components: Components::new_with_refreshed_list(),
        }
    }

    /// 采集一次系统指标
    pub fn collect(&mut self) -> SystemStats {
        let mut stats = SystemStats::default();

        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();

        stats.cpu_usage_live = self.sys.global_cpu_info().cpu_usage() as f64;

        let total = self.sys.total_memory();
        let used = self.sys.used_memory();
        stats.ram_used_gb = round1(used as f64 / 1024_f64.powi(3));
        stats.ram_total_gb = round1(total as f64 / 1024_f64.powi(3));
        stats.ram_percent = if total > 0 {
            round1(used as f64 / total as f64 * 100.0)
        } else {
            0.0
        };

        self.components.refresh();
        match self.read_cpu_temperature() {
            Some(temp) => stats.cpu_temp = Some(temp),
            None => stats.cpu_temp_warning = Some(TEMP_UNAVAILABLE.to_string()),
        }

        stats
    }

    /// 按已知标签的优先顺序找 CPU 温度，找不到退到第一个传感器
    fn read_cpu_temperature(&self) -> Option<f32> {
        for sensor in KNOWN_TEMP_SENSORS {
            for component in &self.components {
                if component.label().to_lowercase().contains(sensor) {
                    let temp = component.temperature();
                    if temp.is_finite() {
                        debug!("CPU temperature from {}: {:.1}°C", component.label(), temp);
                        return Some(round1_f32(temp));
                    }
                }
            }
        }

        self.components
            .iter()
            .next()
            .map(|c| c.temperature())
            .filter(|t| t.is_finite())
            .map(round1_f32)
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round1_f32(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_returns_plausible_memory_values() {
        let mut monitor = SystemMonitor::new();
        let stats = monitor.collect();

        assert!(stats.ram_total_gb > 0.0);
        assert!(stats.ram_used_gb <= stats.ram_total_gb);
        assert!(stats.ram_percent >= 0.0 && stats.ram_percent <= 100.0);
    }

    #[test]
    fn test_collect_reports_temp_or_warning() {
        let mut monitor = SystemMonitor::new();
        let stats = monitor.collect();

        // 有传感器给温度，没有给提示，二者必居其一
        assert!(stats.cpu_temp.is_some() || stats.cpu_temp_warning.is_some());
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(1.25), 1.3);
        assert_eq!(round1(1.24), 1.2);
        assert_eq!(round1(0.0), 0.0);
    }
}

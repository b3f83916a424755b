//! 实用工具模块
//!
//! 提供算力与运行时长的格式化功能

pub mod hashrate_formatter;

// 重新导出常用函数
pub use hashrate_formatter::{format_hashrate, format_hashrate_auto};

/// 将运行秒数格式化为 HH:MM:SS
pub fn format_uptime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

//! NodeMiner-RS - CPU 矿工监督器
//!
//! NodeMiner-RS 管理一个外部 CPU 矿工进程和配套的限流器进程，
//! 从矿工的非结构化输出中提取实时遥测：
//! - 进程生命周期管理（启动、校验、监控、终止）
//! - 矿池连接校验（限时扫描早期输出）
//! - 加权算力合成（accepted 总算力 + 单核样本）
//! - 有界历史缓冲与最佳难度跟踪
//!
//! ## 架构特点
//!
//! ### 进程监督
//! - 矿工与限流器成对管理，限流器按 PID 挂载
//! - 优雅终止失败时自动升级为强杀
//! - 监控循环随矿工输出流关闭自然结束
//!
//! ### 遥测聚合
//! - 行分类按固定优先级规则求值
//! - 合成算力偏重矿池确认值（70/30 加权）
//! - 图表历史带滚动时间窗和停止衰减宽限
//!
//! ### 服务接口
//! - 完整的 HTTP API（配置、控制、状态、历史）
//! - 结构化日志
//! - 配置文件 read-merge-write 持久化

pub mod api;
pub mod config;
pub mod error;
pub mod mining;
pub mod monitoring;
pub mod process;
pub mod telemetry;
pub mod utils;

pub use config::{ConfigStore, MinerConfig};
pub use error::MinerError;
pub use mining::MiningManager;

/// 程序版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 程序名称
pub const NAME: &str = "nodeminer-rs";

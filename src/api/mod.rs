pub mod handlers;
pub mod server;

use crate::config::ConfigStore;
use crate::mining::MiningManager;
use axum::{
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::telemetry::HistoryPoint;

pub use handlers::*;
pub use server::ApiServer;

/// API 响应结构
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }
}

/// 配置更新请求
///
/// 四个可编辑字段整体提交，缺省字段按默认值处理。
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConfigUpdateRequest {
    pub pool_url: String,
    pub btc_address: String,
    pub worker_name: String,
    pub cpu_percentage: u32,
}

impl Default for ConfigUpdateRequest {
    fn default() -> Self {
        Self {
            pool_url: String::new(),
            btc_address: String::new(),
            worker_name: String::new(),
            cpu_percentage: 50,
        }
    }
}

/// 连接测试请求
#[derive(Debug, Deserialize)]
pub struct TestConnectionRequest {
    #[serde(default)]
    pub pool_url: String,
    #[serde(default)]
    pub btc_address: String,
    #[serde(default = "default_test_worker")]
    pub worker_name: String,
}

fn default_test_worker() -> String {
    "test".to_string()
}

/// 挖矿状态响应
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub state: String,
    pub hashrate: String,
    pub cpu_count: u32,
    pub cpu_percentage: u32,
    pub cpu_limit: u32,
    pub cpulimit_active: bool,
    pub cpu_usage_live: f64,
    pub cpu_temp: Option<f32>,
    pub cpu_temp_warning: Option<String>,
    pub ram_used_gb: f64,
    pub ram_total_gb: f64,
    pub ram_percent: f64,
    pub mining_uptime: String,
    pub mining_uptime_seconds: u64,
    pub session_best_difficulty: f64,
    pub all_time_best_difficulty: f64,
    pub all_time_best_difficulty_date: Option<DateTime<Utc>>,
    pub recent_output: Vec<String>,
    pub full_output: Vec<String>,
}

/// 操作结果响应（启动 / 停止 / 测试连接 / 配置保存）
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub message: String,
}

/// 算力历史响应
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryPoint>,
    pub count: usize,
}

/// API 应用状态
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<MiningManager>,
    pub config_store: Arc<ConfigStore>,
}

/// 创建 API 路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 配置路由
        .route("/api/v1/config", get(get_config).post(update_config))

        // 挖矿控制路由
        .route("/api/v1/start", post(start_mining))
        .route("/api/v1/stop", post(stop_mining))
        .route("/api/v1/test-connection", post(test_connection))

        // 状态与历史路由
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/history", get(get_history))

        // 健康检查
        .route("/health", get(health_check))

        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
        )
        .with_state(state)
}

/// 健康检查处理器
async fn health_check() -> axum::response::Json<ApiResponse<String>> {
    axum::response::Json(ApiResponse::success("OK".to_string()))
}

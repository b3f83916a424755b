use crate::api::{
    ApiResponse, AppState, ConfigUpdateRequest, ControlResponse, HistoryResponse, StatusResponse,
    TestConnectionRequest,
};
use crate::config::{normalize_pool_url, MinerConfig};
use crate::mining::test_pool_connection;
use crate::telemetry::HISTORY_MAX_POINTS;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::{error, info};

/// 获取当前配置
pub async fn get_config(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MinerConfig>>, (StatusCode, Json<ApiResponse<()>>)> {
    match state.config_store.load() {
        Ok(config) => Ok(Json(ApiResponse::success(config))),
        Err(e) => {
            error!("Failed to load config: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Failed to load config: {}", e))),
            ))
        }
    }
}

/// 更新配置
pub async fn update_config(
    State(state): State<AppState>,
    Json(request): Json<ConfigUpdateRequest>,
) -> Result<Json<ApiResponse<ControlResponse>>, (StatusCode, Json<ApiResponse<()>>)> {
    if let Err(e) = MinerConfig::validate_cpu_percentage(request.cpu_percentage) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        ));
    }

    // 保存前就规范化矿池地址
    let pool_url = normalize_pool_url(&request.pool_url);

    let result = state.config_store.update(|config| {
        config.pool_url = pool_url.clone();
        config.btc_address = request.btc_address.clone();
        config.worker_name = request.worker_name.clone();
        config.cpu_percentage = request.cpu_percentage;
    });

    match result {
        Ok(_) => {
            info!("Configuration updated");
            Ok(Json(ApiResponse::success(ControlResponse {
                message: "Configuration saved successfully".to_string(),
            })))
        }
        Err(e) => {
            error!("Failed to save config: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Failed to save config: {}", e))),
            ))
        }
    }
}

/// 启动挖矿
pub async fn start_mining(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ControlResponse>>, (StatusCode, Json<ApiResponse<()>>)> {
    match state.manager.start().await {
        Ok(message) => Ok(Json(ApiResponse::success(ControlResponse { message }))),
        Err(e) => Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        )),
    }
}

/// 停止挖矿
pub async fn stop_mining(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ControlResponse>>, (StatusCode, Json<ApiResponse<()>>)> {
    match state.manager.stop().await {
        Ok(message) => Ok(Json(ApiResponse::success(ControlResponse { message }))),
        Err(e) => Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        )),
    }
}

/// 测试矿池连接
pub async fn test_connection(
    State(_state): State<AppState>,
    Json(request): Json<TestConnectionRequest>,
) -> Result<Json<ApiResponse<ControlResponse>>, (StatusCode, Json<ApiResponse<()>>)> {
    match test_pool_connection(&request.pool_url, &request.btc_address, &request.worker_name).await
    {
        Ok(message) => Ok(Json(ApiResponse::success(ControlResponse { message }))),
        Err(e) => Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(e.to_string())),
        )),
    }
}

/// 获取挖矿状态
pub async fn get_status(State(state): State<AppState>) -> Json<ApiResponse<StatusResponse>> {
    let status = state.manager.status().await;

    let response = StatusResponse {
        running: status.running,
        state: status.state,
        hashrate: status.hashrate,
        cpu_count: status.cpu_count,
        cpu_percentage: status.cpu_percentage,
        cpu_limit: status.cpu_limit,
        cpulimit_active: status.limiter_active,
        cpu_usage_live: status.system.cpu_usage_live,
        cpu_temp: status.system.cpu_temp,
        cpu_temp_warning: status.system.cpu_temp_warning,
        ram_used_gb: status.system.ram_used_gb,
        ram_total_gb: status.system.ram_total_gb,
        ram_percent: status.system.ram_percent,
        mining_uptime: status.uptime,
        mining_uptime_seconds: status.uptime_seconds,
        session_best_difficulty: status.session_best_difficulty,
        all_time_best_difficulty: status.all_time_best_difficulty,
        all_time_best_difficulty_date: status.all_time_best_difficulty_date,
        recent_output: status.recent_output,
        full_output: status.full_output,
    };

    Json(ApiResponse::success(response))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// 获取算力图表历史
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<ApiResponse<HistoryResponse>> {
    let limit = query.limit.unwrap_or(100).min(HISTORY_MAX_POINTS);
    let (history, count) = state.manager.chart_history(limit).await;

    Json(ApiResponse::success(HistoryResponse { history, count }))
}

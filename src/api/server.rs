use crate::api::{create_routes, AppState};
use crate::error::ApiError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info, warn};

/// API 服务器
pub struct ApiServer {
    /// 绑定地址
    bind_address: String,
    /// 监听端口
    port: u16,
    /// 应用状态
    state: AppState,
    /// 服务器任务句柄
    server_handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
    /// 运行状态
    running: Arc<RwLock<bool>>,
}

impl ApiServer {
    /// 创建新的 API 服务器
    pub fn new(bind_address: String, port: u16, state: AppState) -> Self {
        Self {
            bind_address,
            port,
            state,
            server_handle: Arc::new(RwLock::new(None)),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// 启动 API 服务器
    pub async fn start(&self) -> Result<(), ApiError> {
        info!("Starting API server on {}:{}", self.bind_address, self.port);

        // 检查是否已经在运行
        if *self.running.read().await {
            warn!("API server is already running");
            return Ok(());
        }

        // 创建路由
        let app = create_routes(self.state.clone())
            .layer(ServiceBuilder::new().layer(TimeoutLayer::new(Duration::from_secs(30))));

        // 解析绑定地址
        let addr = format!("{}:{}", self.bind_address, self.port)
            .parse::<SocketAddr>()
            .map_err(|e| ApiError::ServerStartFailed {
                error: format!("Invalid bind address: {}", e),
            })?;

        // 启动服务器
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ApiError::ServerStartFailed {
                error: format!("Failed to bind to address: {}", e),
            })?;

        let running = self.running.clone();
        let server_handle = self.server_handle.clone();

        // 在后台运行服务器
        let handle = tokio::spawn(async move {
            *running.write().await = true;

            if let Err(e) = axum::serve(listener, app).await {
                error!("API server error: {}", e);
            }

            *running.write().await = false;
        });

        *server_handle.write().await = Some(handle);

        info!("API server started successfully on http://{}", addr);
        Ok(())
    }

    /// 停止 API 服务器
    pub async fn stop(&self) {
        if !*self.running.read().await {
            return;
        }

        if let Some(handle) = self.server_handle.write().await.take() {
            handle.abort();
        }

        *self.running.write().await = false;

        info!("API server stopped");
    }
}

//! 挖矿管理器 - 进程监督与遥测编排
//!
//! 持有矿工与限流器两个进程句柄，驱动会话状态机，运行监控循环
//! 与图表采样任务。启动/停止通过会话状态互斥，并发调用同步拒绝。

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{interval, sleep};
use tracing::{debug, error, info, warn};

use crate::config::{normalize_pool_url, ConfigStore};
use crate::error::MinerError;
use crate::mining::validator::{
    validate_connection, Validation, LIVE_SUCCESS_MARKERS, LIVE_VALIDATION_TIMEOUT,
};
use crate::mining::{MiningState, SessionClock};
use crate::monitoring::{SystemMonitor, SystemStats};
use crate::process::{self, OutputLines, ProcessHandle};
use crate::telemetry::{HistoryPoint, TelemetryState};
use crate::utils::{format_hashrate_auto, format_uptime};

/// 矿工启动后到挂载限流器之间的静置时间
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// 限流器的优雅终止宽限期
const LIMITER_GRACE: Duration = Duration::from_secs(2);

/// 矿工的优雅终止宽限期
const MINER_GRACE: Duration = Duration::from_secs(5);

/// 图表采样周期
const CHART_TICK_INTERVAL: Duration = Duration::from_secs(2);

/// 停止后图表继续采样的宽限窗
const STOP_GRACE: Duration = Duration::from_secs(30);

/// 挖矿管理器 - 协调进程、校验与遥测
pub struct MiningManager {
    /// 配置存储
    config_store: Arc<ConfigStore>,
    /// 会话状态
    state: Arc<RwLock<MiningState>>,
    /// 会话时钟
    session: Arc<RwLock<SessionClock>>,
    /// 遥测状态，监控循环与图表任务共用一把锁
    telemetry: Arc<Mutex<TelemetryState>>,
    /// 矿工进程句柄
    miner: Arc<Mutex<Option<ProcessHandle>>>,
    /// 限流器进程句柄
    limiter: Arc<Mutex<Option<ProcessHandle>>>,
    /// 监控循环任务句柄
    monitor_handle: Arc<Mutex<Option<tokio::task::JoinHandle<()>>>>,
    /// 系统资源采样器
    system_monitor: Arc<Mutex<SystemMonitor>>,
}

impl MiningManager {
    /// 创建管理器并启动常驻的图表采样任务
    pub fn new(config_store: Arc<ConfigStore>) -> Self {
        let manager = Self {
            config_store,
            state: Arc::new(RwLock::new(MiningState::Idle)),
            session: Arc::new(RwLock::new(SessionClock::new())),
            telemetry: Arc::new(Mutex::new(TelemetryState::new())),
            miner: Arc::new(Mutex::new(None)),
            limiter: Arc::new(Mutex::new(None)),
            monitor_handle: Arc::new(Mutex::new(None)),
            system_monitor: Arc::new(Mutex::new(SystemMonitor::new())),
        };

        manager.spawn_chart_ticker();
        manager
    }

    /// 启动挖矿
    pub async fn start(&self) -> Result<String, MinerError> {
        {
            let mut state = self.state.write().await;
            if *state != MiningState::Idle {
                return Err(MinerError::AlreadyRunning);
            }
            *state = MiningState::Starting;
        }

        let result = self.start_inner().await;

        if result.is_err() {
            *self.state.write().await = MiningState::Idle;
        }

        result
    }

    async fn start_inner(&self) -> Result<String, MinerError> {
        let config = self.config_store.load()?;
        config.validate_for_start()?;

        // 规范化矿池地址并立即写回配置
        let pool_url = normalize_pool_url(&config.pool_url);
        self.config_store.update(|c| {
            c.pool_url = pool_url.clone();
        })?;

        let cpu_count = num_cpus::get() as u32;
        let cpu_limit = config.cpu_percentage * cpu_count;
        let username = process::credential(&config.btc_address, config.worker_name_or_default());

        info!("Starting miner: pool={}, user={}", pool_url, username);
        info!(
            "CPU limit: {}% ({}% of {} cores)",
            cpu_limit, config.cpu_percentage, cpu_count
        );

        let mut miner = ProcessHandle::spawn("miner", process::miner_command(&pool_url, &username))?;
        info!("Miner process started with PID {}", miner.pid());

        // 给矿工一点起动时间，再挂限流器
        sleep(SETTLE_DELAY).await;

        let limiter =
            match ProcessHandle::spawn("cpulimit", process::limiter_command(miner.pid(), cpu_limit))
            {
                Ok(limiter) => limiter,
                Err(e) => {
                    miner.kill().await;
                    return Err(e.into());
                }
            };
        info!("cpulimit started with PID {}", limiter.pid());

        *self.state.write().await = MiningState::Validating;

        info!("Validating mining connection...");
        match validate_connection(&mut miner, LIVE_VALIDATION_TIMEOUT, LIVE_SUCCESS_MARKERS).await {
            Ok(Validation::Confirmed) => info!("Connection validated: connected successfully"),
            Ok(Validation::Optimistic) => info!("Connection validated: still validating"),
            Err(e) => {
                warn!("Connection validation failed: {}", e);
                self.cleanup_failed_start(miner, limiter).await;
                return Err(e.into());
            }
        }

        // 校验通过，复位遥测并载入全时最佳
        {
            let mut telemetry = self.telemetry.lock().await;
            telemetry.reset_for_start(config.all_time_best_difficulty);
        }

        let output = miner.take_output();
        *self.miner.lock().await = Some(miner);
        *self.limiter.lock().await = Some(limiter);

        match output {
            Some(output) => self.spawn_monitor_loop(output).await,
            None => warn!("Miner output stream unavailable, telemetry disabled"),
        }

        if let Err(e) = self.config_store.update(|c| c.mining_active = true) {
            warn!("Failed to persist mining_active flag: {}", e);
        }

        self.session.write().await.mark_started();
        *self.state.write().await = MiningState::Running;

        info!("Mining started successfully");
        Ok("Mining started successfully".to_string())
    }

    /// 校验失败后的清理，次生错误一律吞掉
    async fn cleanup_failed_start(&self, mut miner: ProcessHandle, mut limiter: ProcessHandle) {
        miner.kill().await;
        limiter.kill().await;

        if let Err(e) = self.config_store.update(|c| c.mining_active = false) {
            warn!("Failed to persist mining_active flag: {}", e);
        }
    }

    /// 停止挖矿
    pub async fn stop(&self) -> Result<String, MinerError> {
        {
            let mut state = self.state.write().await;
            if *state != MiningState::Running {
                return Err(MinerError::NotRunning);
            }
            *state = MiningState::Stopping;
        }

        info!("Stopping mining processes...");

        // 先收限流器，再收矿工；单项失败不阻断后续清理
        if let Some(mut limiter) = self.limiter.lock().await.take() {
            match limiter.terminate(LIMITER_GRACE).await {
                Ok(()) => info!("cpulimit stopped"),
                Err(e) => {
                    warn!("Error stopping cpulimit: {}", e);
                    limiter.kill().await;
                }
            }
        }

        if let Some(mut miner) = self.miner.lock().await.take() {
            match miner.terminate(MINER_GRACE).await {
                Ok(()) => info!("Miner stopped"),
                Err(e) => {
                    warn!("Error stopping miner: {}", e);
                    miner.kill().await;
                }
            }
        }

        // 停止时间驱动图表的衰减宽限窗
        self.session.write().await.mark_stopped();
        self.telemetry.lock().await.reset_transient();

        if let Err(e) = self.config_store.update(|c| c.mining_active = false) {
            warn!("Failed to persist mining_active flag: {}", e);
        }

        *self.state.write().await = MiningState::Idle;

        info!("Mining stopped successfully");
        Ok("Mining stopped successfully".to_string())
    }

    /// 当前会话状态
    pub async fn state(&self) -> MiningState {
        *self.state.read().await
    }

    /// 组装状态快照
    pub async fn status(&self) -> MiningStatus {
        let state = *self.state.read().await;
        let running = state == MiningState::Running;

        let config = self.config_store.load().unwrap_or_default();
        let cpu_count = num_cpus::get() as u32;
        let cpu_limit = config.cpu_percentage * cpu_count;

        let limiter_active = match self.limiter.lock().await.as_mut() {
            Some(handle) => handle.is_running(),
            None => false,
        };

        let system = self.system_monitor.lock().await.collect();
        let uptime_seconds = if running {
            self.session.read().await.uptime_secs()
        } else {
            0
        };

        let telemetry = self.telemetry.lock().await;

        MiningStatus {
            running,
            state: format!("{:?}", state),
            hashrate: if running {
                telemetry.aggregator.formatted()
            } else {
                "0.0 H/s".to_string()
            },
            cpu_count,
            cpu_percentage: if running { config.cpu_percentage } else { 0 },
            cpu_limit: if running { cpu_limit } else { 0 },
            limiter_active,
            system,
            uptime: format_uptime(uptime_seconds),
            uptime_seconds,
            session_best_difficulty: telemetry.difficulty.session_best(),
            all_time_best_difficulty: config.all_time_best_difficulty,
            all_time_best_difficulty_date: config.all_time_best_difficulty_date,
            recent_output: telemetry.transcript.recent(50),
            full_output: telemetry.transcript.all(),
        }
    }

    /// 图表历史切片与总点数
    pub async fn chart_history(&self, limit: usize) -> (Vec<HistoryPoint>, usize) {
        let telemetry = self.telemetry.lock().await;
        let total = telemetry.chart_history.len();
        (telemetry.chart_history.tail(limit), total)
    }

    /// 启动监控循环
    ///
    /// 循环阻塞在矿工输出上，流关闭即矿工退出：正常停止时状态
    /// 已离开 Running，循环直接收尾；否则按意外死亡清理会话。
    async fn spawn_monitor_loop(&self, mut output: OutputLines) {
        let telemetry = self.telemetry.clone();
        let config_store = self.config_store.clone();
        let state = self.state.clone();
        let session = self.session.clone();
        let miner = self.miner.clone();
        let limiter = self.limiter.clone();

        let handle = tokio::spawn(async move {
            while let Some(line) = output.next_line().await {
                debug!("miner: {}", line);
                telemetry.lock().await.apply_line(&line, &config_store);
            }

            // 输出流关闭：矿工进程已经退出
            {
                let mut state = state.write().await;
                if *state != MiningState::Running {
                    return;
                }
                *state = MiningState::Stopping;
            }

            error!("Miner process terminated unexpectedly");

            if let Some(mut limiter) = limiter.lock().await.take() {
                limiter.kill().await;
            }
            miner.lock().await.take();

            session.write().await.mark_stopped();
            telemetry.lock().await.reset_transient();

            if let Err(e) = config_store.update(|c| c.mining_active = false) {
                warn!("Failed to persist mining_active flag: {}", e);
            }

            *state.write().await = MiningState::Idle;
        });

        *self.monitor_handle.lock().await = Some(handle);
    }

    /// 启动常驻的图表采样任务
    ///
    /// 任务永不退出，每个周期只看会话状态决定是否写入：运行中
    /// 写当前合成值；停止后 30 秒内继续写衰减值；其余时刻静默。
    fn spawn_chart_ticker(&self) {
        let state = self.state.clone();
        let session = self.session.clone();
        let telemetry = self.telemetry.clone();

        tokio::spawn(async move {
            let mut ticker = interval(CHART_TICK_INTERVAL);

            loop {
                ticker.tick().await;

                let running = *state.read().await == MiningState::Running;
                let in_grace = session.read().await.within_stop_grace(STOP_GRACE);

                if running || in_grace {
                    let mut telemetry = telemetry.lock().await;
                    let value_hs = telemetry.aggregator.combined_hs();
                    telemetry.chart_history.push(HistoryPoint::now(value_hs));

                    debug!("chart tick: {}", format_hashrate_auto(value_hs));
                }
            }
        });
    }
}

/// 状态快照 - 供 API 状态端点使用
#[derive(Debug, Clone)]
pub struct MiningStatus {
    pub running: bool,
    pub state: String,
    pub hashrate: String,
    pub cpu_count: u32,
    pub cpu_percentage: u32,
    pub cpu_limit: u32,
    pub limiter_active: bool,
    pub system: SystemStats,
    pub uptime: String,
    pub uptime_seconds: u64,
    pub session_best_difficulty: f64,
    pub all_time_best_difficulty: f64,
    pub all_time_best_difficulty_date: Option<DateTime<Utc>>,
    pub recent_output: Vec<String>,
    pub full_output: Vec<String>,
}

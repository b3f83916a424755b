use nodeminer_rs::config::ConfigStore;
use nodeminer_rs::error::{ConfigError, MinerError};
use nodeminer_rs::mining::{MiningManager, MiningState};
use nodeminer_rs::telemetry::TelemetryState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn temp_config_path(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("nodeminer-integration-{}.json", name));
    std::fs::remove_file(&path).ok();
    path
}

/// 测试配置文件的创建与往返
#[tokio::test]
async fn test_config_store_creates_default_and_round_trips() {
    let path = temp_config_path("round-trip");

    let store = ConfigStore::open(&path).expect("Failed to open config store");
    assert!(path.exists());

    // 默认配置可直接读回
    let config = store.load().expect("Failed to load default config");
    assert_eq!(config.pool_url, "");
    assert_eq!(config.cpu_percentage, 10);
    assert!(!config.mining_active);
    assert_eq!(config.all_time_best_difficulty, 0.0);

    // 写入后读回保持一致
    let updated = store
        .update(|c| {
            c.pool_url = "stratum+tcp://pool.example.com:3333".to_string();
            c.btc_address = "bc1qexample".to_string();
            c.worker_name = "rig01".to_string();
            c.cpu_percentage = 50;
        })
        .expect("Failed to update config");
    assert_eq!(updated.cpu_percentage, 50);

    let reloaded = store.load().expect("Failed to reload config");
    assert_eq!(reloaded.pool_url, "stratum+tcp://pool.example.com:3333");
    assert_eq!(reloaded.btc_address, "bc1qexample");
    assert_eq!(reloaded.worker_name, "rig01");

    std::fs::remove_file(&path).ok();
}

/// 测试磁盘上的 JSON 字段名与前端约定一致
#[tokio::test]
async fn test_config_file_uses_expected_field_names() {
    let path = temp_config_path("field-names");

    let store = ConfigStore::open(&path).expect("Failed to open config store");
    store
        .update(|c| c.all_time_best_difficulty = 0.25)
        .expect("Failed to update config");

    let raw = std::fs::read_to_string(&path).expect("Failed to read config file");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("Config is not valid JSON");

    assert!(json.get("pool_url").is_some());
    assert!(json.get("btc_address").is_some());
    assert!(json.get("worker_name").is_some());
    assert!(json.get("cpu_percentage").is_some());
    assert!(json.get("mining_active").is_some());
    assert_eq!(json["all_time_best_difficulty"], 0.25);

    std::fs::remove_file(&path).ok();
}

/// 测试 read-merge-write 不覆盖无关字段
#[tokio::test]
async fn test_config_updates_merge_instead_of_clobbering() {
    let path = temp_config_path("merge");
    let store = ConfigStore::open(&path).expect("Failed to open config store");

    // 模拟两个调用方交错写入不同字段
    store
        .update(|c| c.pool_url = "stratum+tcp://pool.example.com:3333".to_string())
        .unwrap();
    store
        .update(|c| {
            c.all_time_best_difficulty = 1.5;
            c.all_time_best_difficulty_date = Some(chrono::Utc::now());
        })
        .unwrap();
    store.update(|c| c.cpu_percentage = 75).unwrap();

    let config = store.load().unwrap();
    assert_eq!(config.pool_url, "stratum+tcp://pool.example.com:3333");
    assert_eq!(config.all_time_best_difficulty, 1.5);
    assert!(config.all_time_best_difficulty_date.is_some());
    assert_eq!(config.cpu_percentage, 75);

    std::fs::remove_file(&path).ok();
}

/// 测试缺少必填字段时启动在任何进程创建之前被拒绝
#[tokio::test]
async fn test_start_with_missing_account_is_config_error() {
    let path = temp_config_path("missing-account");
    let store = Arc::new(ConfigStore::open(&path).expect("Failed to open config store"));
    store
        .update(|c| c.pool_url = "pool.example.com:3333".to_string())
        .unwrap();

    let manager = MiningManager::new(store.clone());
    let result = manager.start().await;

    assert!(matches!(
        result,
        Err(MinerError::Config(ConfigError::MissingField { ref field })) if field == "btc_address"
    ));

    // 启动失败：会话回到空闲，配置中的活跃标志保持关闭
    assert_eq!(manager.state().await, MiningState::Idle);
    assert!(!store.load().unwrap().mining_active);

    std::fs::remove_file(&path).ok();
}

/// 测试重复停止被同步拒绝
#[tokio::test]
async fn test_stop_when_idle_is_rejected() {
    let path = temp_config_path("stop-idle");
    let store = Arc::new(ConfigStore::open(&path).expect("Failed to open config store"));

    let manager = MiningManager::new(store);
    assert!(matches!(manager.stop().await, Err(MinerError::NotRunning)));

    std::fs::remove_file(&path).ok();
}

/// 测试挖矿从未启动时图表任务不产生数据点
#[tokio::test]
async fn test_chart_ticker_silent_before_any_session() {
    let path = temp_config_path("ticker-silent");
    let store = Arc::new(ConfigStore::open(&path).expect("Failed to open config store"));

    let manager = MiningManager::new(store);

    // 跨过至少一个采样周期
    sleep(Duration::from_millis(2500)).await;

    let (points, count) = manager.chart_history(300).await;
    assert!(points.is_empty());
    assert_eq!(count, 0);

    std::fs::remove_file(&path).ok();
}

/// 测试一段矿工输出流经遥测管线后的端到端结果
#[tokio::test]
async fn test_telemetry_pipeline_end_to_end() {
    let path = temp_config_path("pipeline");
    let store = ConfigStore::open(&path).expect("Failed to open config store");

    let mut telemetry = TelemetryState::new();
    telemetry.reset_for_start(0.0);

    let output = [
        "[2024-01-06 12:32:35] Stratum difficulty set to 0.1",
        "[2024-01-06 12:32:37] CPU #0: 2205.0 kH/s",
        "[2024-01-06 12:32:37] CPU #1: 2195.5 kH/s",
        "[2024-01-06 12:32:40] accepted: 1/1 (100.00%), 4.50 kH/s yes!",
        "[2024-01-06 12:32:40] share diff 0.015, Stratum difficulty 0.001",
        "[2024-01-06 12:32:44] share diff 0.008",
    ];

    for line in output {
        telemetry.apply_line(line, &store);
    }

    // 合成值：accepted 4.5 × 0.7 + 核和 4400.5 × 0.3
    let (combined, _) = telemetry.aggregator.combined();
    assert!((combined - (4.5 * 0.7 + 4400.5 * 0.3)).abs() < 1e-9);

    // 每个样本事件产生一个原始历史点，转录保留全部行
    assert_eq!(telemetry.raw_history.len(), 3);
    assert_eq!(telemetry.transcript.len(), output.len());

    // 份额难度只认 "share diff"，最佳取最大值并落盘
    assert_eq!(telemetry.difficulty.session_best(), 0.015);
    let config = store.load().unwrap();
    assert_eq!(config.all_time_best_difficulty, 0.015);
    assert!(config.all_time_best_difficulty_date.is_some());

    std::fs::remove_file(&path).ok();
}

/// 测试会话重启后的遥测复位语义
#[tokio::test]
async fn test_session_restart_reset_semantics() {
    let path = temp_config_path("restart");
    let store = ConfigStore::open(&path).expect("Failed to open config store");

    let mut telemetry = TelemetryState::new();
    telemetry.reset_for_start(0.0);

    telemetry.apply_line("CPU #0: 1000.0 H/s", &store);
    telemetry.apply_line("share diff 0.5", &store);
    telemetry
        .chart_history
        .push(nodeminer_rs::telemetry::HistoryPoint::new(1, 1000.0));

    let raw_len_before = telemetry.raw_history.len();

    // 新会话：图表清空、会话最佳清零，原始历史保留，
    // 全时最佳从配置重新载入
    let all_time_best = store.load().unwrap().all_time_best_difficulty;
    telemetry.reset_for_start(all_time_best);

    assert_eq!(telemetry.chart_history.len(), 0);
    assert_eq!(telemetry.difficulty.session_best(), 0.0);
    assert_eq!(telemetry.difficulty.all_time_best(), 0.5);
    assert_eq!(telemetry.raw_history.len(), raw_len_before);
    assert_eq!(telemetry.aggregator.combined().0, 0.0);

    std::fs::remove_file(&path).ok();
}

/// 测试部分字段缺失的旧配置文件可以解析
#[tokio::test]
async fn test_legacy_config_document_parses() {
    let path = temp_config_path("legacy");
    std::fs::write(
        &path,
        r#"{"pool_url": "pool.example.com:3333", "btc_address": "bc1q", "cpu_percentage": 25}"#,
    )
    .unwrap();

    let store = ConfigStore::open(&path).expect("Failed to open config store");
    let config = store.load().expect("Failed to load legacy config");

    assert_eq!(config.pool_url, "pool.example.com:3333");
    assert_eq!(config.cpu_percentage, 25);
    assert_eq!(config.all_time_best_difficulty, 0.0);
    assert!(config.all_time_best_difficulty_date.is_none());

    std::fs::remove_file(&path).ok();
}

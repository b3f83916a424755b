use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{ConfigError, PersistenceError};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    pub config: String,

    /// API server bind address
    #[arg(long, default_value = "0.0.0.0")]
    pub bind_address: String,

    /// API server port
    #[arg(long, default_value = "5000")]
    pub port: u16,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// 矿工配置 - 与 config.json 一一对应
///
/// 所有字段都有默认值，旧版本的配置文件缺少字段时也能解析。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    pub pool_url: String,
    pub btc_address: String,
    pub worker_name: String,
    pub cpu_percentage: u32,
    pub mining_active: bool,
    pub all_time_best_difficulty: f64,
    pub all_time_best_difficulty_date: Option<DateTime<Utc>>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            pool_url: String::new(),
            btc_address: String::new(),
            worker_name: String::new(),
            cpu_percentage: 10,
            mining_active: false,
            all_time_best_difficulty: 0.0,
            all_time_best_difficulty_date: None,
        }
    }
}

impl MinerConfig {
    /// 校验启动挖矿所需的字段
    pub fn validate_for_start(&self) -> Result<(), ConfigError> {
        if self.pool_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "pool_url".to_string(),
            });
        }
        if self.btc_address.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "btc_address".to_string(),
            });
        }
        Ok(())
    }

    /// 校验 CPU 百分比的取值范围
    pub fn validate_cpu_percentage(percentage: u32) -> Result<(), ConfigError> {
        if percentage < 1 || percentage > 100 {
            return Err(ConfigError::InvalidValue {
                field: "cpu_percentage".to_string(),
                value: percentage.to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }
        Ok(())
    }

    /// worker 名称，空则回落到默认值
    pub fn worker_name_or_default(&self) -> &str {
        if self.worker_name.trim().is_empty() {
            "worker1"
        } else {
            &self.worker_name
        }
    }
}

/// 规范化矿池地址
///
/// - `stratum+tcp://` 前缀保持不变
/// - `stratum://` 重写为 `stratum+tcp://`
/// - `http://` / `https://` 重写为 `stratum+tcp://`
/// - 无协议前缀则补上 `stratum+tcp://`
///
/// 该函数是幂等的：`normalize(normalize(x)) == normalize(x)`。
pub fn normalize_pool_url(pool_url: &str) -> String {
    let pool_url = pool_url.trim();

    if pool_url.is_empty() {
        return String::new();
    }

    if pool_url.starts_with("stratum+tcp://") {
        return pool_url.to_string();
    }

    if let Some(rest) = pool_url.strip_prefix("stratum://") {
        return format!("stratum+tcp://{}", rest);
    }

    if let Some(rest) = pool_url.strip_prefix("http://") {
        return format!("stratum+tcp://{}", rest);
    }

    if let Some(rest) = pool_url.strip_prefix("https://") {
        return format!("stratum+tcp://{}", rest);
    }

    format!("stratum+tcp://{}", pool_url)
}

/// 配置存储 - 对 config.json 的读改写访问
///
/// 全部写入都经过内部互斥锁做 read-merge-write，核心的
/// 最佳难度持久化和 API 的配置更新可以并发调用而互不覆盖。
pub struct ConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    /// 打开配置存储，文件不存在时写入默认配置
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        };

        if !store.path.exists() {
            store
                .save(&MinerConfig::default())
                .with_context(|| format!("Failed to create default config: {}", store.path.display()))?;
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取当前配置
    pub fn load(&self) -> Result<MinerConfig, PersistenceError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| PersistenceError::ReadFailed {
                path: self.path.display().to_string(),
                error: e.to_string(),
            })?;

        serde_json::from_str(&content).map_err(|e| PersistenceError::ReadFailed {
            path: self.path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// 整体写入配置
    pub fn save(&self, config: &MinerConfig) -> Result<(), PersistenceError> {
        let content = serde_json::to_string_pretty(config).map_err(|e| {
            PersistenceError::SerializeFailed {
                error: e.to_string(),
            }
        })?;

        std::fs::write(&self.path, content).map_err(|e| PersistenceError::WriteFailed {
            path: self.path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// read-merge-write 更新
    ///
    /// 在锁内重新读取磁盘上的最新配置，应用变更后写回，
    /// 不会覆盖其他调用方刚写入的无关字段。返回合并后的配置。
    pub fn update<F>(&self, mutate: F) -> Result<MinerConfig, PersistenceError>
    where
        F: FnOnce(&mut MinerConfig),
    {
        let _guard = self.write_lock.lock().unwrap();

        let mut config = self.load().unwrap_or_default();
        mutate(&mut config);
        self.save(&config)?;

        Ok(config)
    }
}

//! 矿池连接校验
//!
//! 在限定时间内扫描矿工的早期输出：命中失败标记立即判负，
//! 命中成功标记立即判胜。超时而进程仍活着时乐观放行 ——
//! 对一个活着的进程，没有证据不等于失败。

use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::normalize_pool_url;
use crate::error::{ConfigError, ConnectionError, MinerError};
use crate::process::{self, ProcessHandle};

/// 生产会话的校验预算
pub const LIVE_VALIDATION_TIMEOUT: Duration = Duration::from_secs(5);

/// 探测模式的校验预算
pub const PROBE_VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// 探测进程的回收宽限期
const PROBE_TEARDOWN_GRACE: Duration = Duration::from_secs(2);

/// 无输出时的轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 失败标记，大小写不敏感的子串匹配，命中立即判负
const FAILURE_MARKERS: &[&str] = &[
    "empty reply",
    "connection refused",
    "could not resolve host",
    "failed to connect",
    "connection failed",
    "timeout",
    "invalid address",
    "authentication failed",
];

/// 生产会话的成功标记（大小写敏感），含任务接收类消息
pub const LIVE_SUCCESS_MARKERS: &[&str] = &[
    "Stratum difficulty set",
    "Stratum session id:",
    "asks job",
    "new job",
    "accepted",
];

/// 探测模式的成功标记（大小写敏感）
pub const PROBE_SUCCESS_MARKERS: &[&str] = &[
    "Stratum difficulty set to",
    "Stratum session id:",
    "asks job",
];

/// 校验通过的两种形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// 输出中出现了成功标记
    Confirmed,
    /// 超时但进程仍在运行，按乐观策略放行
    Optimistic,
}

fn match_failure(line: &str) -> bool {
    let lowered = line.to_lowercase();
    FAILURE_MARKERS.iter().any(|m| lowered.contains(m))
}

fn match_success(line: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| line.contains(m))
}

/// 在限定时间内校验进程的矿池连接
///
/// 进程中途死亡立即失败，消息按是否见过输出区分。死亡以输出流
/// 关闭为准：缓冲里尚未读到的行先于结论处理，带标记的最后一行
/// 不会被漏判。没有新行不算错误，短暂等待后继续。超时时进程
/// 存活则返回 `Optimistic`。
pub async fn validate_connection(
    handle: &mut ProcessHandle,
    timeout: Duration,
    success_markers: &[&str],
) -> Result<Validation, ConnectionError> {
    let deadline = Instant::now() + timeout;
    let mut saw_output = false;

    while Instant::now() < deadline {
        match tokio::time::timeout(POLL_INTERVAL, handle.next_line()).await {
            Ok(Some(line)) => {
                saw_output = true;
                debug!("validation output: {}", line);

                if match_failure(&line) {
                    return Err(ConnectionError::MarkerMatched { line });
                }

                if match_success(&line, success_markers) {
                    return Ok(Validation::Confirmed);
                }
            }
            Ok(None) => {
                // 输出流关闭：进程已退出，缓冲行也全部读完
                return Err(if saw_output {
                    ConnectionError::ProcessDied
                } else {
                    ConnectionError::FailedToStart
                });
            }
            Err(_) => {
                // 暂无输出，继续等
            }
        }
    }

    if handle.is_running() {
        Ok(Validation::Optimistic)
    } else {
        Err(ConnectionError::FailedToStart)
    }
}

/// 独立的矿池连接测试
///
/// 用单线程探测进程跑同一套校验，预算 10 秒，结束后无论结果
/// 如何都会回收探测进程。
pub async fn test_pool_connection(
    pool_url: &str,
    btc_address: &str,
    worker_name: &str,
) -> Result<String, MinerError> {
    let pool_url = normalize_pool_url(pool_url);

    if pool_url.is_empty() {
        return Err(ConfigError::MissingField {
            field: "pool_url".to_string(),
        }
        .into());
    }
    if btc_address.trim().is_empty() {
        return Err(ConfigError::MissingField {
            field: "btc_address".to_string(),
        }
        .into());
    }

    let worker = if worker_name.trim().is_empty() {
        "test"
    } else {
        worker_name
    };
    let username = process::credential(btc_address, worker);

    info!("Testing connection to {}", pool_url);
    let start = Instant::now();

    let mut probe = ProcessHandle::spawn("probe", process::probe_command(&pool_url, &username))?;

    let result =
        validate_connection(&mut probe, PROBE_VALIDATION_TIMEOUT, PROBE_SUCCESS_MARKERS).await;

    // 探测进程用完即收，结果如何都不留
    if probe.terminate(PROBE_TEARDOWN_GRACE).await.is_err() {
        probe.kill().await;
    }

    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok(Validation::Confirmed) => {
            info!("Connection test succeeded after {:.1}s", elapsed);
            Ok(format!(
                "Connection successful! ({:.1}s) Pool: {}",
                elapsed, pool_url
            ))
        }
        Ok(Validation::Optimistic) => Ok(format!(
            "No errors detected, still validating ({:.1}s) Pool: {}",
            elapsed, pool_url
        )),
        Err(e) => {
            info!("Connection test failed after {:.1}s: {}", elapsed, e);
            Err(MinerError::Connection(e))
        }
    }
}

//! 外部进程模块
//!
//! 矿工、限流器与探测进程的命令行契约，以及进程生命周期包装。
//! 参数必须与外部二进制的接口严格一致。

pub mod handle;

use tokio::process::Command;

pub use handle::{OutputLines, ProcessHandle};

/// 矿工二进制
pub const MINER_BINARY: &str = "cpuminer";

/// 限流器二进制
pub const LIMITER_BINARY: &str = "cpulimit";

/// 固定挖矿算法
pub const MINING_ALGORITHM: &str = "sha256d";

/// 固定起始难度，通过密码字段 `d=<难度>` 传给矿池
pub const START_DIFFICULTY: f64 = 0.1;

/// 由账户地址和 worker 名拼出登录凭证
pub fn credential(btc_address: &str, worker_name: &str) -> String {
    format!("{}.{}", btc_address, worker_name)
}

/// 密码字段，携带起始难度
pub fn password() -> String {
    format!("d={}", START_DIFFICULTY)
}

/// 生产矿工命令
///
/// 线程数 0 表示用满所有核（实际占用由限流器控制），关闭彩色
/// 输出以便解析，打开调试输出获得更多遥测行。
pub fn miner_command(pool_url: &str, username: &str) -> Command {
    let mut command = Command::new(MINER_BINARY);
    command
        .arg("-a")
        .arg(MINING_ALGORITHM)
        .arg("-o")
        .arg(pool_url)
        .arg("-u")
        .arg(username)
        .arg("-p")
        .arg(password())
        .arg("-t")
        .arg("0")
        .arg("--no-color")
        .arg("--debug");
    command
}

/// 连接探测命令
///
/// 与生产矿工一致，但只用单线程，不带调试输出，也不挂限流器。
pub fn probe_command(pool_url: &str, username: &str) -> Command {
    let mut command = Command::new(MINER_BINARY);
    command
        .arg("-a")
        .arg(MINING_ALGORITHM)
        .arg("-o")
        .arg(pool_url)
        .arg("-u")
        .arg(username)
        .arg("-p")
        .arg(password())
        .arg("-t")
        .arg("1")
        .arg("--no-color");
    command
}

/// 限流器命令
///
/// 按矿工 PID 挂载，`-z` 让矿工到达限额后休眠而不是空转。
pub fn limiter_command(miner_pid: u32, limit_percent: u32) -> Command {
    let mut command = Command::new(LIMITER_BINARY);
    command
        .arg("-p")
        .arg(miner_pid.to_string())
        .arg("-l")
        .arg(limit_percent.to_string())
        .arg("-z");
    command
}

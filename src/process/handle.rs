//! 进程生命周期包装
//!
//! 对一个外部子进程的轻量封装：启动、存活探测、合并 stdout/stderr
//! 的行流、先礼后兵的终止。

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::ProcessError;

/// 子进程输出的行流
///
/// stdout 和 stderr 汇入同一个通道；两路都关闭后 `next_line`
/// 返回 `None`，即进程输出已经结束。
pub struct OutputLines {
    rx: mpsc::UnboundedReceiver<String>,
}

impl OutputLines {
    /// 等待下一行输出，流结束时返回 `None`
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// 外部进程句柄
///
/// 句柄归属唯一拥有者；输出流可以被取走交给监控循环，句柄本身
/// 留下来负责存活探测和终止。
pub struct ProcessHandle {
    name: &'static str,
    child: Child,
    pid: u32,
    output: Option<OutputLines>,
}

impl ProcessHandle {
    /// 启动子进程并接管其输出
    pub fn spawn(name: &'static str, mut command: Command) -> Result<Self, ProcessError> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| ProcessError::SpawnFailed {
            name: name.to_string(),
            error: e.to_string(),
        })?;

        let pid = child.id().ok_or_else(|| ProcessError::MissingPid {
            name: name.to_string(),
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx);
        }

        debug!("{} started with PID {}", name, pid);

        Ok(Self {
            name,
            child,
            pid,
            output: Some(OutputLines { rx }),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// 进程是否仍在运行
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// 等待下一行输出（流仍归句柄持有时可用）
    pub async fn next_line(&mut self) -> Option<String> {
        match self.output.as_mut() {
            Some(output) => output.next_line().await,
            None => None,
        }
    }

    /// 取走输出流，交给独立的读取任务
    pub fn take_output(&mut self) -> Option<OutputLines> {
        self.output.take()
    }

    /// 先礼后兵的终止
    ///
    /// 发送 SIGTERM 后等待宽限期，超时升级为 SIGKILL 并等待回收。
    pub async fn terminate(&mut self, grace: Duration) -> Result<(), ProcessError> {
        if !self.is_running() {
            return Ok(());
        }

        if let Err(e) = signal::kill(Pid::from_raw(self.pid as i32), Signal::SIGTERM) {
            // 进程可能刚好自行退出
            debug!("SIGTERM to {} (pid {}) failed: {}", self.name, self.pid, e);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(_)) => {
                debug!("{} stopped", self.name);
                Ok(())
            }
            Ok(Err(e)) => Err(ProcessError::TerminationFailed {
                name: self.name.to_string(),
                error: e.to_string(),
            }),
            Err(_) => {
                warn!(
                    "{} did not exit within {:?}, escalating to SIGKILL",
                    self.name, grace
                );
                self.child
                    .start_kill()
                    .map_err(|e| ProcessError::TerminationFailed {
                        name: self.name.to_string(),
                        error: e.to_string(),
                    })?;
                self.child
                    .wait()
                    .await
                    .map_err(|e| ProcessError::TerminationFailed {
                        name: self.name.to_string(),
                        error: e.to_string(),
                    })?;
                Ok(())
            }
        }
    }

    /// 立即强杀，错误一律吞掉（清理路径专用）
    pub async fn kill(&mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}

fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

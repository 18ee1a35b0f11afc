//! Bridge 会话：一个 MCP 服务端子进程的完整生命周期
//!
//! 状态机 Spawned → Initializing → Ready → Closed。每次图表操作启动一个进程，
//! 握手、列工具、调用一次工具后关闭；不做池化或跨调用复用。
//! stdin/stdout 由会话独占；stderr 持续读出并记入 debug 日志，本身不视为失败。

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::core::{BridgeError, ExitReason, RpcError};
use crate::mcp::client::{EofPolicy, RpcClient, DEFAULT_REQUEST_TIMEOUT};
use crate::mcp::message::McpTool;

pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// 进程退出后等待 stdout 读尽的上限（孙进程可能仍持有管道）
const DRAIN_GRACE: Duration = Duration::from_millis(500);
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// 会话参数：握手身份与超时
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub protocol_version: String,
    pub client_name: String,
    pub client_version: String,
    pub request_timeout: Duration,
    pub init_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            client_name: "press".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            init_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Spawned,
    Initializing,
    Ready,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Spawned => "spawned",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Closed => "closed",
        }
    }
}

struct ProcessHandle {
    kill_tx: Option<oneshot::Sender<()>>,
    watcher: JoinHandle<ExitReason>,
}

pub struct BridgeSession {
    client: Arc<RpcClient>,
    state: SessionState,
    options: SessionOptions,
    tools: Option<Vec<McpTool>>,
    process: Option<ProcessHandle>,
}

impl BridgeSession {
    /// 通过平台 shell 启动服务端命令（允许命令内联参数）
    pub fn spawn(command: &str, options: SessionOptions) -> Result<Self, BridgeError> {
        let spawn_err = |reason: String| BridgeError::Spawn {
            command: command.to_string(),
            reason,
        };

        let mut child = shell_command(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_err(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_err("stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_err("stdout not captured".into()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr));
        }

        tracing::info!(command = %command, pid = ?child.id(), "MCP server spawned");

        let client = Arc::new(RpcClient::with_eof_policy(
            stdout,
            stdin,
            options.request_timeout,
            EofPolicy::AwaitExit,
        ));
        let (kill_tx, kill_rx) = oneshot::channel();
        let watcher = tokio::spawn(watch_process(child, kill_rx, Arc::clone(&client)));

        Ok(Self {
            client,
            state: SessionState::Spawned,
            options,
            tools: None,
            process: Some(ProcessHandle {
                kill_tx: Some(kill_tx),
                watcher,
            }),
        })
    }

    /// 在任意字节流上建立会话（无子进程）
    pub fn from_transport<R, W>(reader: R, writer: W, options: SessionOptions) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let client = Arc::new(RpcClient::new(reader, writer, options.request_timeout));
        Self {
            client,
            state: SessionState::Spawned,
            options,
            tools: None,
            process: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// initialize 握手（受 init_timeout 约束），成功后发送 initialized 通知
    pub async fn initialize(&mut self) -> Result<Value, BridgeError> {
        self.expect_state(SessionState::Spawned)?;
        self.state = SessionState::Initializing;

        let params = json!({
            "protocolVersion": self.options.protocol_version,
            "clientInfo": {
                "name": self.options.client_name,
                "version": self.options.client_version,
            },
            "capabilities": {},
        });
        let result = self
            .client
            .request_with_timeout("initialize", params, self.options.init_timeout)
            .await?;

        self.client
            .notify("notifications/initialized", json!({}))
            .await?;
        self.state = SessionState::Ready;

        let server = result
            .get("serverInfo")
            .and_then(|info| info.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        tracing::info!(server, "MCP session ready");
        Ok(result)
    }

    /// tools/list；服务端未报告工具时为空列表。每个会话只发现一次
    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>, BridgeError> {
        self.expect_state(SessionState::Ready)?;
        if let Some(tools) = &self.tools {
            return Ok(tools.clone());
        }

        let result = self.client.request("tools/list", json!({})).await?;
        let tools = match result.get("tools") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|entry| serde_json::from_value::<McpTool>(entry.clone()).ok())
                .collect(),
            Some(other) => return Err(BridgeError::InvalidToolList(other.to_string())),
        };
        tracing::debug!(count = tools.len(), "MCP tools discovered");
        self.tools = Some(tools.clone());
        Ok(tools)
    }

    /// tools/call，返回原始结果，由调用方归一化
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, BridgeError> {
        self.expect_state(SessionState::Ready)?;
        tracing::info!(tool = name, "calling MCP tool");
        let result = self
            .client
            .request(
                "tools/call",
                json!({
                    "name": name,
                    "arguments": arguments,
                }),
            )
            .await?;
        Ok(result)
    }

    /// 终止子进程；未结算的请求由退出处理统一拒绝。可重复调用
    pub async fn close(&mut self) -> Option<ExitReason> {
        if self.state == SessionState::Closed {
            return None;
        }
        self.state = SessionState::Closed;

        let Some(mut process) = self.process.take() else {
            self.client.fail_pending(RpcError::Closed);
            return None;
        };
        if let Some(kill_tx) = process.kill_tx.take() {
            let _ = kill_tx.send(());
        }
        match tokio::time::timeout(CLOSE_GRACE, &mut process.watcher).await {
            Ok(Ok(reason)) => Some(reason),
            _ => {
                tracing::warn!("MCP server did not exit after close");
                None
            }
        }
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), BridgeError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(BridgeError::InvalidState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            })
        }
    }
}

fn shell_command(command: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = Command::new("sh");
        c.args(["-c", command]);
        c
    }
}

/// 等待进程结束（或收到关闭信号后杀掉），读尽 stdout 后拒绝全部挂起请求
async fn watch_process(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    client: Arc<RpcClient>,
) -> ExitReason {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill_rx => {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "MCP server kill failed");
            }
            child.wait().await
        }
    };

    let reason = match status {
        Ok(status) => ExitReason::from(status),
        Err(e) => {
            tracing::warn!(error = %e, "waiting for MCP server failed");
            ExitReason::Unknown
        }
    };
    if reason.is_success() {
        tracing::debug!("MCP server exited");
    } else {
        tracing::info!(reason = %reason, "MCP server exited");
    }

    let _ = tokio::time::timeout(DRAIN_GRACE, client.reader_closed()).await;
    client.fail_pending(RpcError::ProcessExited(reason));
    reason
}

async fn drain_stderr(stderr: ChildStderr) {
    let mut reader = BufReader::new(stderr);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                tracing::debug!(target: "press::mcp::stderr", "{}", text.trim_end());
            }
        }
    }
}

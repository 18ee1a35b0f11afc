//! 错误类型
//!
//! 按层划分：帧协议（FrameError）→ RPC（RpcError）→ 会话 / 桥接（BridgeError），
//! 另有工具解析（ResolveError）与状态存储（StoreError）。
//! Adapter 捕获 BridgeError 并降级为下一层回退，不向能力层抛出。

use std::fmt;

use thiserror::Error;

/// 帧解码错误：对当前连接是致命的，会话随之视为失效
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Received MCP message without Content-Length header")]
    MissingContentLength,

    #[error("Invalid Content-Length value: {0}")]
    InvalidContentLength(String),

    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),
}

/// 子进程结束方式：退出码、信号或无法判断
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Code(i32),
    Signal(i32),
    Unknown,
}

impl ExitReason {
    /// 退出码为 0 的正常结束
    pub fn is_success(&self) -> bool {
        matches!(self, ExitReason::Code(0))
    }
}

impl From<std::process::ExitStatus> for ExitReason {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitReason::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitReason::Signal(signal);
            }
        }
        ExitReason::Unknown
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Code(code) => write!(f, "code {code}"),
            ExitReason::Signal(signal) => write!(f, "signal {signal}"),
            ExitReason::Unknown => write!(f, "code unknown"),
        }
    }
}

/// RPC 层错误；需要 Clone，以便一次失败广播给所有挂起的请求
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    #[error("MCP server exited with {0}")]
    ProcessExited(ExitReason),

    #[error("MCP error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("MCP protocol error: {0}")]
    Protocol(#[from] FrameError),

    #[error("MCP request '{method}' timed out after {millis}ms")]
    Timeout { method: String, millis: u64 },

    #[error("MCP transport write failed: {0}")]
    Transport(String),

    #[error("MCP connection closed")]
    Closed,
}

/// 工具名推断失败：调用方不得继续猜测
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Could not infer an Excalidraw {operation} tool from MCP server tools list")]
    CouldNotInfer { operation: String },
}

/// Bridge 会话 / 操作错误
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Excalidraw MCP command is not configured. Set bridge.server_command (PRESS__BRIDGE__SERVER_COMMAND) or excalidrawMcpCommand in .press-local.json")]
    NotConfigured,

    #[error("Failed to spawn MCP server '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("Bridge session is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Invalid tools/list result: {0}")]
    InvalidToolList(String),

    #[error("MCP tool response did not include diagram content")]
    NoContent,
}

/// 状态存储 / 项目路径错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("State serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Project path does not exist: {0}")]
    ProjectMissing(String),

    #[error("Path escape attempt: {0}")]
    PathEscape(String),

    #[error("Source file must be markdown (.md). Received: {0}")]
    NotMarkdown(String),

    #[error("Source markdown file does not exist: {0}")]
    SourceMissing(String),

    #[error("Diagram sequence exhausted (highest is {0}); rename or remove oversized diagram files")]
    SequenceExhausted(u32),
}

impl StoreError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

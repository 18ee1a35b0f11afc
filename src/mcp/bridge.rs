//! 第一方 Excalidraw MCP 桥接
//!
//! 启动配置的服务端命令 → 握手 → 列工具 → 解析工具名 → 调用 → 归一化 → 关闭。
//! Adapter 的进程内层与 `press-bridge` 二进制共用这里的实现。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::BridgeError;
use crate::diagram::BridgeOperationResult;
use crate::mcp::coerce::coerce_tool_result;
use crate::mcp::message::McpTool;
use crate::mcp::resolver::{Operation, OverrideResolver, ToolResolver};
use crate::mcp::session::{BridgeSession, SessionOptions};

/// 桥接配置：服务端命令、按操作的工具名覆盖、会话参数
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    pub server_command: Option<String>,
    pub create_tool: Option<String>,
    pub refine_tool: Option<String>,
    pub session: SessionOptions,
}

impl BridgeConfig {
    pub fn is_configured(&self) -> bool {
        self.command().is_ok()
    }

    pub fn resolver(&self) -> OverrideResolver {
        OverrideResolver::new(self.create_tool.clone(), self.refine_tool.clone())
    }

    fn command(&self) -> Result<&str, BridgeError> {
        self.server_command
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(BridgeError::NotConfigured)
    }
}

/// `--check` 的输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub ok: bool,
    pub tool_count: usize,
    pub tools: Vec<String>,
}

/// 诊断：initialize + tools/list
pub async fn check(config: &BridgeConfig) -> Result<CheckReport, BridgeError> {
    let mut session = BridgeSession::spawn(config.command()?, config.session.clone())?;
    let outcome = discover(&mut session).await;
    session.close().await;

    let tools = outcome?;
    Ok(CheckReport {
        ok: true,
        tool_count: tools.len(),
        tools: tools.into_iter().map(|t| t.name).collect(),
    })
}

/// 启动一个单次会话执行 create / refine
pub async fn run_operation(
    config: &BridgeConfig,
    operation: Operation,
    payload: Value,
) -> Result<BridgeOperationResult, BridgeError> {
    let mut session = BridgeSession::spawn(config.command()?, config.session.clone())?;
    let outcome = run_on_session(&mut session, &config.resolver(), operation, payload).await;
    if let Some(reason) = session.close().await {
        tracing::debug!(reason = %reason, %operation, "bridge session closed");
    }
    outcome
}

/// 在已建立（未初始化）的会话上执行一次操作；调用方负责关闭会话
pub async fn run_on_session(
    session: &mut BridgeSession,
    resolver: &dyn ToolResolver,
    operation: Operation,
    payload: Value,
) -> Result<BridgeOperationResult, BridgeError> {
    let tools = discover(session).await?;
    let tool = resolver.resolve(&tools, operation)?;
    let raw = session.call_tool(&tool, payload).await?;
    let mut output = coerce_tool_result(&raw).ok_or(BridgeError::NoContent)?;
    if !output.is_usable() {
        return Err(BridgeError::NoContent);
    }
    output.content = output.content.trim().to_string();
    Ok(output)
}

async fn discover(session: &mut BridgeSession) -> Result<Vec<McpTool>, BridgeError> {
    session.initialize().await?;
    session.list_tools().await
}

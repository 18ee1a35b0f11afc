//! 图表适配器：外部命令 → 进程内 MCP 桥接 → 本地回退
//!
//! 每一层实现 [`DiagramBackend`]；未配置的层返回 `Unavailable`，失败的层返回带警告的
//! `Failed`，警告累积进最终结果。本地回退永不失败，保证写作流程不会被阻塞。

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::diagram::fallback;
use crate::diagram::types::{
    BridgeOperationResult, CreateDiagramInput, DiagramRequest, RefineDiagramInput,
};
use crate::mcp::bridge::{run_operation, BridgeConfig};
use crate::mcp::coerce::from_shaped;

pub const DEFAULT_EXTERNAL_TIMEOUT: Duration = Duration::from_secs(120);

/// 单层尝试结果
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    Produced(BridgeOperationResult),
    /// 未配置，静默跳过
    Unavailable,
    /// 已配置但失败；携带写入结果的警告
    Failed(String),
}

#[async_trait]
pub trait DiagramBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn attempt(&self, request: &DiagramRequest) -> Attempt;
}

/// 外部命令配置：`<executable> <args..> <operation> <json>`
#[derive(Debug, Clone)]
pub struct ExternalCommandConfig {
    pub executable: Option<String>,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Default for ExternalCommandConfig {
    fn default() -> Self {
        Self {
            executable: None,
            args: Vec::new(),
            timeout: DEFAULT_EXTERNAL_TIMEOUT,
        }
    }
}

pub struct ExternalCommandBackend {
    config: ExternalCommandConfig,
}

impl ExternalCommandBackend {
    pub fn new(config: ExternalCommandConfig) -> Self {
        Self { config }
    }

    fn executable(&self) -> Option<&str> {
        self.config
            .executable
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

fn degraded(source: &str, detail: &str) -> String {
    format!("Excalidraw {source} {detail}. Falling back to local placeholder output.")
}

#[async_trait]
impl DiagramBackend for ExternalCommandBackend {
    fn name(&self) -> &str {
        "external-command"
    }

    async fn attempt(&self, request: &DiagramRequest) -> Attempt {
        let Some(executable) = self.executable() else {
            return Attempt::Unavailable;
        };
        let operation = request.operation();
        let payload = request.payload().to_string();
        tracing::info!(program = %executable, %operation, "external diagram command invoke");

        let child = Command::new(executable)
            .args(&self.config.args)
            .arg(operation.as_str())
            .arg(&payload)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(error = %e, "external diagram command spawn failed");
                return Attempt::Failed(degraded(
                    self.name(),
                    &format!("command failed to start for {operation}"),
                ));
            }
        };

        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "external diagram command wait failed");
                return Attempt::Failed(degraded(
                    self.name(),
                    &format!("command failed for {operation}"),
                ));
            }
            Err(_) => {
                return Attempt::Failed(degraded(
                    self.name(),
                    &format!(
                        "command timed out after {}s for {operation}",
                        self.config.timeout.as_secs()
                    ),
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(status = ?output.status.code(), stderr = %stderr.trim(), "external diagram command failed");
            return Attempt::Failed(degraded(
                self.name(),
                &format!("command failed for {operation}"),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed = serde_json::from_str::<serde_json::Value>(stdout.trim()).ok();
        match parsed.as_ref().and_then(from_shaped) {
            Some(result) => Attempt::Produced(result),
            None => Attempt::Failed(degraded(
                self.name(),
                &format!("command returned invalid JSON for {operation}"),
            )),
        }
    }
}

/// 进程内第一方桥接
pub struct BridgeBackend {
    config: BridgeConfig,
}

impl BridgeBackend {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DiagramBackend for BridgeBackend {
    fn name(&self) -> &str {
        "first-party-bridge"
    }

    async fn attempt(&self, request: &DiagramRequest) -> Attempt {
        if !self.config.is_configured() {
            return Attempt::Unavailable;
        }
        let operation = request.operation();
        match run_operation(&self.config, operation, request.payload()).await {
            Ok(result) => Attempt::Produced(result),
            Err(e) => {
                tracing::warn!(error = %e, %operation, "bridge tier failed");
                Attempt::Failed(degraded(
                    self.name(),
                    &format!("failed for {operation} ({e})"),
                ))
            }
        }
    }
}

/// 本地确定性回退
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFallback;

impl LocalFallback {
    pub fn produce(&self, request: &DiagramRequest) -> BridgeOperationResult {
        match request {
            DiagramRequest::Create(input) => fallback::create_placeholder(input),
            DiagramRequest::Refine(input) => fallback::refine_placeholder(input),
        }
    }
}

#[async_trait]
impl DiagramBackend for LocalFallback {
    fn name(&self) -> &str {
        "local-fallback"
    }

    async fn attempt(&self, request: &DiagramRequest) -> Attempt {
        Attempt::Produced(self.produce(request))
    }
}

/// 适配器配置
#[derive(Debug, Clone, Default)]
pub struct AdapterConfig {
    pub external: ExternalCommandConfig,
    pub bridge: BridgeConfig,
}

pub struct DiagramAdapter {
    tiers: Vec<Box<dyn DiagramBackend>>,
    fallback: LocalFallback,
}

impl DiagramAdapter {
    pub fn new(config: AdapterConfig) -> Self {
        Self::with_backends(vec![
            Box::new(ExternalCommandBackend::new(config.external)),
            Box::new(BridgeBackend::new(config.bridge)),
        ])
    }

    /// 自定义层；本地回退总在最后
    pub fn with_backends(tiers: Vec<Box<dyn DiagramBackend>>) -> Self {
        Self {
            tiers,
            fallback: LocalFallback,
        }
    }

    pub async fn create_diagram(&self, input: CreateDiagramInput) -> BridgeOperationResult {
        self.run(DiagramRequest::Create(input)).await
    }

    pub async fn refine_diagram(&self, input: RefineDiagramInput) -> BridgeOperationResult {
        self.run(DiagramRequest::Refine(input)).await
    }

    async fn run(&self, request: DiagramRequest) -> BridgeOperationResult {
        let operation = request.operation();
        let mut warnings = Vec::new();

        for tier in &self.tiers {
            match tier.attempt(&request).await {
                Attempt::Produced(result) if result.is_usable() => {
                    tracing::info!(tier = tier.name(), %operation, "diagram produced");
                    return with_prior_warnings(warnings, result);
                }
                Attempt::Produced(_) => {
                    warnings.push(degraded(
                        tier.name(),
                        &format!("returned empty content for {operation}"),
                    ));
                }
                Attempt::Failed(warning) => warnings.push(warning),
                Attempt::Unavailable => {
                    tracing::debug!(tier = tier.name(), "diagram tier not configured");
                }
            }
        }

        tracing::info!(tier = self.fallback.name(), %operation, "diagram produced");
        with_prior_warnings(warnings, self.fallback.produce(&request))
    }
}

fn with_prior_warnings(
    mut warnings: Vec<String>,
    mut result: BridgeOperationResult,
) -> BridgeOperationResult {
    warnings.append(&mut result.warnings);
    result.warnings = warnings;
    result
}

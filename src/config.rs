//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PRESS__*` 覆盖（双下划线表示嵌套，如
//! `PRESS__BRIDGE__SERVER_COMMAND="npx excalidraw-mcp"`）。历史上的
//! `PRESS_EXCALIDRAW_*` 变量与 `.press-local.json` 由 [`apply_legacy_sources`] 补齐。
//! 只有二进制入口读取环境；协议层与适配器只接收显式结构体。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::diagram::{AdapterConfig, ExternalCommandConfig};
use crate::mcp::session::DEFAULT_PROTOCOL_VERSION;
use crate::mcp::{BridgeConfig, SessionOptions};

/// 配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PressConfig {
    pub bridge: BridgeSection,
    pub external: ExternalSection,
}

/// [bridge] 段：MCP 服务端命令、工具名覆盖、握手参数与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    /// 经 shell 启动的服务端命令；未设置时跳过桥接层
    pub server_command: Option<String>,
    pub create_tool: Option<String>,
    pub refine_tool: Option<String>,
    pub protocol_version: String,
    pub client_name: String,
    pub client_version: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    pub init_timeout_secs: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            server_command: None,
            create_tool: None,
            refine_tool: None,
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            client_name: "press".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            request_timeout_secs: 30,
            init_timeout_secs: 30,
        }
    }
}

/// [external] 段：一次性外部命令 `<executable> <args..> <operation> <json>`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExternalSection {
    pub executable: Option<String>,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for ExternalSection {
    fn default() -> Self {
        Self {
            executable: None,
            args: Vec::new(),
            timeout_secs: 120,
        }
    }
}

impl PressConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            protocol_version: self.bridge.protocol_version.clone(),
            client_name: self.bridge.client_name.clone(),
            client_version: self.bridge.client_version.clone(),
            request_timeout: Duration::from_secs(self.bridge.request_timeout_secs),
            init_timeout: Duration::from_secs(self.bridge.init_timeout_secs),
        }
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            server_command: self.bridge.server_command.clone(),
            create_tool: self.bridge.create_tool.clone(),
            refine_tool: self.bridge.refine_tool.clone(),
            session: self.session_options(),
        }
    }

    pub fn adapter_config(&self) -> AdapterConfig {
        AdapterConfig {
            external: ExternalCommandConfig {
                executable: self.external.executable.clone(),
                args: self.external.args.clone(),
                timeout: Duration::from_secs(self.external.timeout_secs),
            },
            bridge: self.bridge_config(),
        }
    }
}

/// 从默认路径与可选路径加载配置
pub fn load_config(config_path: Option<PathBuf>) -> Result<PressConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PRESS")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// `.press-local.json`：本机 MCP 命令
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PressLocalConfig {
    excalidraw_mcp_command: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 用历史来源补齐未设置的字段（已配置的值优先）
pub fn apply_legacy_sources(cfg: &mut PressConfig, repo_root: &Path) {
    apply_legacy_sources_with(cfg, repo_root, |key| std::env::var(key).ok());
}

/// 同上，环境查找可替换
pub fn apply_legacy_sources_with<F>(cfg: &mut PressConfig, repo_root: &Path, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if non_blank(cfg.bridge.server_command.clone()).is_none() {
        cfg.bridge.server_command = non_blank(lookup("PRESS_EXCALIDRAW_MCP_SERVER_CMD"))
            .or_else(|| non_blank(lookup("EXCALIDRAW_MCP_SERVER_CMD")))
            .or_else(|| read_local_command(repo_root));
    }
    if cfg.bridge.create_tool.is_none() {
        cfg.bridge.create_tool = non_blank(lookup("PRESS_EXCALIDRAW_MCP_CREATE_TOOL"));
    }
    if cfg.bridge.refine_tool.is_none() {
        cfg.bridge.refine_tool = non_blank(lookup("PRESS_EXCALIDRAW_MCP_REFINE_TOOL"));
    }
    if non_blank(cfg.external.executable.clone()).is_none() {
        if let Some(executable) = non_blank(lookup("PRESS_EXCALIDRAW_EXEC")) {
            cfg.external.executable = Some(executable);
            // 参数按空格切分，与历史行为一致
            cfg.external.args = lookup("PRESS_EXCALIDRAW_ARGS")
                .unwrap_or_default()
                .split(' ')
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from)
                .collect();
        }
    }
}

fn read_local_command(repo_root: &Path) -> Option<String> {
    let path = repo_root.join(".press-local.json");
    let raw = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<PressLocalConfig>(&raw) {
        Ok(local) => non_blank(local.excalidraw_mcp_command),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed .press-local.json");
            None
        }
    }
}

//! Press - 图表工具链
//!
//! 模块划分：
//! - **capabilities**: diagram-create / diagram-refine / plan-record 能力入口
//! - **config**: 应用配置加载（TOML + 环境变量 + 历史来源）
//! - **core**: 错误类型与单写者锁
//! - **diagram**: 分层图表适配器（外部命令 → MCP 桥接 → 本地回退）
//! - **mcp**: MCP stdio 客户端（分帧、RPC、会话、工具解析）
//! - **observability**: 日志初始化
//! - **state**: 内容寻址的计划 / 图表状态存储

pub mod capabilities;
pub mod config;
pub mod core;
pub mod diagram;
pub mod mcp;
pub mod observability;
pub mod state;

pub use crate::capabilities::CapabilityResult;
pub use crate::config::{load_config, PressConfig};
pub use crate::diagram::DiagramAdapter;

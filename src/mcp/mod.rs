//! MCP stdio 客户端
//!
//! - **frame**: Content-Length 分帧编解码
//! - **message**: JSON-RPC 信封与工具描述
//! - **client**: 请求 / 通知、按 id 关联、失败广播、超时
//! - **session**: 子进程生命周期与握手
//! - **resolver**: create / refine → 工具名
//! - **coerce**: tools/call 结果归一化
//! - **bridge**: 单次桥接操作与 `--check` 诊断

pub mod bridge;
pub mod client;
pub mod coerce;
pub mod frame;
pub mod message;
pub mod resolver;
pub mod session;

pub use bridge::{check, run_operation, BridgeConfig, CheckReport};
pub use client::RpcClient;
pub use coerce::{coerce_tool_result, from_shaped};
pub use frame::{encode_frame, FrameDecoder, FrameReader, FrameWriter};
pub use message::{McpTool, RpcMessage};
pub use resolver::{
    resolve_tool, score_tool_name, HeuristicResolver, Operation, OverrideResolver, ToolResolver,
};
pub use session::{BridgeSession, SessionOptions, SessionState};

//! 图表生成
//!
//! - **types**: create / refine 输入与归一化输出
//! - **adapter**: 分层后端（外部命令 → MCP 桥接 → 本地回退）
//! - **fallback**: 本地占位文档

pub mod adapter;
pub mod fallback;
pub mod types;

pub use adapter::{
    AdapterConfig, Attempt, BridgeBackend, DiagramAdapter, DiagramBackend, ExternalCommandBackend,
    ExternalCommandConfig, LocalFallback,
};
pub use types::{BridgeOperationResult, CreateDiagramInput, DiagramRequest, RefineDiagramInput};

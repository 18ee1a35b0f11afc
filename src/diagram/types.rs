//! 图表操作的输入与统一输出

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mcp::resolver::Operation;

/// create 输入；序列化后即为外部命令 / MCP 工具的参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiagramInput {
    pub title: String,
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    pub source_text: String,
}

/// refine 输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineDiagramInput {
    pub diagram_id: String,
    pub existing_content: String,
    pub instruction: String,
}

/// 一次图表操作请求
#[derive(Debug, Clone, PartialEq)]
pub enum DiagramRequest {
    Create(CreateDiagramInput),
    Refine(RefineDiagramInput),
}

impl DiagramRequest {
    pub fn operation(&self) -> Operation {
        match self {
            DiagramRequest::Create(_) => Operation::Create,
            DiagramRequest::Refine(_) => Operation::Refine,
        }
    }

    /// JSON 载荷（camelCase 字段）
    pub fn payload(&self) -> Value {
        let value = match self {
            DiagramRequest::Create(input) => serde_json::to_value(input),
            DiagramRequest::Refine(input) => serde_json::to_value(input),
        };
        value.unwrap_or(Value::Null)
    }
}

/// 任一后端产出的归一化结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeOperationResult {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl BridgeOperationResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            web_url: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// 有可用内容（非空白）
    pub fn is_usable(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

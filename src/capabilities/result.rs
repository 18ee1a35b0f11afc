//! 能力结果信封 `{ok, message, data?, warnings?, errors?}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub ok: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl CapabilityResult {
    pub fn success(message: impl Into<String>, data: Value, warnings: Vec<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            data: Some(data),
            warnings: Some(warnings),
            errors: None,
        }
    }

    pub fn failure(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            data: None,
            warnings: None,
            errors: Some(errors),
        }
    }

    /// anyhow 错误链展开为 errors
    pub fn from_error(message: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::failure(message, err.chain().map(|e| e.to_string()).collect())
    }

    pub fn warnings(&self) -> &[String] {
        self.warnings.as_deref().unwrap_or_default()
    }

    /// data 中的字段
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.get(key))
    }
}

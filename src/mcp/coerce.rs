//! tools/call 结果归一化
//!
//! 实际服务端的返回形态有三种：
//! 1. `structuredContent` 包裹 `{content, webUrl?, warnings?}`
//! 2. 顶层直接是 `{content, webUrl?, warnings?}`
//! 3. MCP content 数组，第一个 text 项本身是 JSON 字符串，需要二次解析；不是 JSON 时按原文使用
//!
//! 都取不到字符串 content 时返回 None，由 Adapter 降级处理。

use serde_json::Value;

use crate::diagram::BridgeOperationResult;

pub fn coerce_tool_result(raw: &Value) -> Option<BridgeOperationResult> {
    if raw.get("isError").and_then(Value::as_bool) == Some(true) {
        return None;
    }

    if let Some(structured) = raw.get("structuredContent").filter(|v| v.is_object()) {
        if let Some(result) = from_shaped(structured) {
            return Some(result);
        }
    }

    if let Some(result) = from_shaped(raw) {
        return Some(result);
    }

    let first_text = raw
        .get("content")?
        .as_array()?
        .iter()
        .find_map(|entry| entry.get("text").and_then(Value::as_str))?;

    match serde_json::from_str::<Value>(first_text) {
        Ok(parsed) => from_shaped(&parsed),
        Err(_) => Some(BridgeOperationResult::new(first_text)),
    }
}

/// `{content, webUrl?, warnings?}`：只要求 content 是字符串，其余字段形态不对时忽略
pub fn from_shaped(value: &Value) -> Option<BridgeOperationResult> {
    let content = value.get("content")?.as_str()?;
    let web_url = value
        .get("webUrl")
        .and_then(Value::as_str)
        .map(str::to_string);
    let warnings = value
        .get("warnings")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(BridgeOperationResult {
        content: content.to_string(),
        web_url,
        warnings,
    })
}

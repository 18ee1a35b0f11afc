//! Press Mock MCP - 确定性的 Excalidraw MCP 服务端，仅供集成测试
//!
//! 环境变量：
//! - `MOCK_MCP_SHAPE`: tools/call 结果形态，`structured`（默认）/ `content-array` / `plain` / `tool-error`
//! - `MOCK_MCP_EXIT_ON_CALL`: 收到 tools/call 时以该退出码直接退出

use serde_json::{json, Value};

use press::mcp::{FrameReader, FrameWriter, RpcMessage};

const MOCK_URL: &str = "https://example.com/mock-diagram";

fn tools() -> Value {
    json!({
        "tools": [
            {"name": "create_excalidraw_diagram", "description": "Create a new Excalidraw diagram"},
            {"name": "refine_excalidraw_diagram", "description": "Edit an existing Excalidraw diagram"},
            {"name": "ping", "description": "Health check"}
        ]
    })
}

fn diagram_document(tool: &str, arguments: &Value) -> String {
    json!({
        "type": "excalidraw",
        "version": 2,
        "source": "mock-mcp",
        "tool": tool,
        "title": arguments.get("title").cloned().unwrap_or(Value::Null),
        "diagramId": arguments.get("diagramId").cloned().unwrap_or(Value::Null),
        "elements": [],
        "appState": {"viewBackgroundColor": "#ffffff"},
        "files": {}
    })
    .to_string()
}

fn call_result(shape: &str, tool: &str, arguments: &Value) -> Value {
    let content = diagram_document(tool, arguments);
    let payload = json!({"content": content, "webUrl": MOCK_URL, "warnings": []});
    match shape {
        "content-array" => json!({"content": [{"type": "text", "text": payload.to_string()}]}),
        "plain" => payload,
        "tool-error" => json!({"isError": true, "content": [{"type": "text", "text": "mock failure"}]}),
        _ => json!({"structuredContent": payload}),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let shape = std::env::var("MOCK_MCP_SHAPE").unwrap_or_else(|_| "structured".to_string());
    let exit_on_call: Option<i32> = std::env::var("MOCK_MCP_EXIT_ON_CALL")
        .ok()
        .and_then(|v| v.trim().parse().ok());

    eprintln!("press-mock-mcp ready (shape={})", shape);

    let mut reader = FrameReader::new(tokio::io::stdin());
    let mut writer = FrameWriter::new(tokio::io::stdout());

    while let Some(message) = reader.next_message().await? {
        let Some(method) = message.method.as_deref() else {
            continue;
        };
        let Some(id) = message.numeric_id() else {
            continue;
        };
        let params = message.params.clone().unwrap_or(Value::Null);

        let reply = match method {
            "initialize" => RpcMessage::response(
                id,
                json!({
                    "protocolVersion": params.get("protocolVersion").cloned().unwrap_or(Value::Null),
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "press-mock-mcp", "version": env!("CARGO_PKG_VERSION")}
                }),
            ),
            "tools/list" => RpcMessage::response(id, tools()),
            "tools/call" => {
                if let Some(code) = exit_on_call {
                    std::process::exit(code);
                }
                let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
                let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
                if name.ends_with("_excalidraw_diagram") {
                    RpcMessage::response(id, call_result(&shape, name, &arguments))
                } else {
                    RpcMessage::error_response(id, -32602, format!("Unknown tool: {}", name))
                }
            }
            other => RpcMessage::error_response(id, -32601, format!("Method not found: {}", other)),
        };
        writer.send(&reply).await?;
    }
    Ok(())
}

//! 本地确定性回退：MCP 不可用时仍产出可打开的 .excalidraw 文档，写作流程不被阻塞

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::diagram::types::{BridgeOperationResult, CreateDiagramInput, RefineDiagramInput};

const DOCUMENT_SOURCE: &str = "https://press.local";
const SOURCE_SUMMARY_CHARS: usize = 200;

pub const CREATE_FALLBACK_WARNING: &str =
    "Excalidraw MCP was unavailable in this run; local .excalidraw file remains the source of truth.";
pub const REFINE_FALLBACK_WARNING: &str =
    "Excalidraw MCP was unavailable in this refine run; local .excalidraw file remains the source of truth.";

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 空白 Excalidraw 文档骨架
pub fn empty_document() -> Map<String, Value> {
    let value = json!({
        "type": "excalidraw",
        "version": 2,
        "source": DOCUMENT_SOURCE,
        "elements": [],
        "appState": {
            "viewBackgroundColor": "#ffffff",
            "gridSize": null
        },
        "files": {}
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// create 回退：空文档 + press 来源元数据
pub fn create_placeholder(input: &CreateDiagramInput) -> BridgeOperationResult {
    let mut document = empty_document();
    document.insert(
        "press".to_string(),
        json!({
            "createdAt": now_iso(),
            "title": input.title,
            "excerpt": input.excerpt,
            "intent": input.intent.clone().unwrap_or_default(),
            "sourceSummary": input.source_text.chars().take(SOURCE_SUMMARY_CHARS).collect::<String>(),
        }),
    );
    BridgeOperationResult::new(render(&Value::Object(document)))
        .with_warning(CREATE_FALLBACK_WARNING)
}

/// refine 回退：解析现有文档（失败则用空骨架），只合并 press 元数据块，其余字段原样保留
pub fn refine_placeholder(input: &RefineDiagramInput) -> BridgeOperationResult {
    let mut document = match serde_json::from_str::<Value>(&input.existing_content) {
        Ok(Value::Object(map)) => map,
        _ => {
            tracing::debug!(diagram = %input.diagram_id, "existing diagram unparsable, rebuilding skeleton");
            empty_document()
        }
    };

    // 原地改写，保持 press 键的位置
    let slot = document
        .entry("press")
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(press) = slot {
        press.insert(
            "lastRefineInstruction".to_string(),
            Value::String(input.instruction.clone()),
        );
        press.insert("lastRefinedAt".to_string(), Value::String(now_iso()));
        press.insert("fallbackRefine".to_string(), Value::Bool(true));
    }

    BridgeOperationResult::new(render(&Value::Object(document)))
        .with_warning(REFINE_FALLBACK_WARNING)
}

fn render(document: &Value) -> String {
    let mut text = serde_json::to_string_pretty(document).unwrap_or_else(|_| "{}".to_string());
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_input() -> CreateDiagramInput {
        CreateDiagramInput {
            title: "diagram-01".into(),
            excerpt: "\"Discipline is a system...becomes the default path.\"".into(),
            intent: Some("Map the system relationship".into()),
            source_text: "x".repeat(500),
        }
    }

    #[test]
    fn test_create_placeholder_embeds_provenance() {
        let result = create_placeholder(&create_input());
        assert_eq!(result.warnings, vec![CREATE_FALLBACK_WARNING.to_string()]);

        let doc: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(doc["type"], "excalidraw");
        assert_eq!(doc["elements"], json!([]));
        assert_eq!(doc["press"]["title"], "diagram-01");
        assert_eq!(doc["press"]["intent"], "Map the system relationship");
        assert_eq!(doc["press"]["sourceSummary"].as_str().unwrap().len(), 200);
        assert!(doc["press"]["createdAt"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_refine_preserves_existing_fields_and_order() {
        let existing = json!({
            "type": "excalidraw",
            "version": 2,
            "source": "mock-mcp",
            "elements": [{"id": "a", "type": "rectangle"}],
            "appState": {"viewBackgroundColor": "#000000"},
            "press": {"label": "created"},
            "files": {}
        })
        .to_string();
        let result = refine_placeholder(&RefineDiagramInput {
            diagram_id: "diagram-01".into(),
            existing_content: existing,
            instruction: "Split this into three labeled parts".into(),
        });
        assert_eq!(result.warnings, vec![REFINE_FALLBACK_WARNING.to_string()]);

        let doc: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(doc["source"], "mock-mcp");
        assert_eq!(doc["elements"][0]["id"], "a");
        assert_eq!(doc["appState"]["viewBackgroundColor"], "#000000");
        assert_eq!(doc["press"]["label"], "created");
        assert_eq!(
            doc["press"]["lastRefineInstruction"],
            "Split this into three labeled parts"
        );
        assert_eq!(doc["press"]["fallbackRefine"], true);

        let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec!["type", "version", "source", "elements", "appState", "press", "files"]
        );
    }

    #[test]
    fn test_refine_unparsable_document_gets_skeleton() {
        let result = refine_placeholder(&RefineDiagramInput {
            diagram_id: "diagram-02".into(),
            existing_content: "not json at all".into(),
            instruction: "simplify".into(),
        });
        let doc: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(doc["type"], "excalidraw");
        assert_eq!(doc["source"], DOCUMENT_SOURCE);
        assert_eq!(doc["press"]["lastRefineInstruction"], "simplify");
    }
}

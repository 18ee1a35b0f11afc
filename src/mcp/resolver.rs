//! 工具名解析：把抽象操作（create / refine）映射为服务端公布的具体工具
//!
//! 显式覆盖无条件优先（不校验是否在列表中）；否则按名称打分：
//! 图表相关（diagram / excalidraw）记 1 分，动词匹配记 10 分，最高分需 ≥ 11。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::ResolveError;
use crate::mcp::message::McpTool;

const DIAGRAM_SIGNALS: &[&str] = &["diagram", "excalidraw"];
const CREATE_SIGNALS: &[&str] = &["create", "generate"];
const REFINE_SIGNALS: &[&str] = &["refine", "update", "edit"];

/// 同时命中动词与图表信号的最低分
pub const MIN_SCORE: u32 = 11;

/// 图表操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Refine,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Refine => "refine",
        }
    }

    fn verb_signals(&self) -> &'static [&'static str] {
        match self {
            Operation::Create => CREATE_SIGNALS,
            Operation::Refine => REFINE_SIGNALS,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Operation::Create),
            "refine" => Ok(Operation::Refine),
            other => Err(format!("Unknown operation: {other}")),
        }
    }
}

/// 工具名打分：verb * 10 + diagram
pub fn score_tool_name(name: &str, operation: Operation) -> u32 {
    let normalized = name.to_lowercase();
    let hits = |signals: &[&str]| signals.iter().any(|s| normalized.contains(s)) as u32;
    hits(operation.verb_signals()) * 10 + hits(DIAGRAM_SIGNALS)
}

/// 解析策略
pub trait ToolResolver: Send + Sync {
    fn resolve(&self, tools: &[McpTool], operation: Operation) -> Result<String, ResolveError>;
}

/// 启发式打分；同分取先出现者
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicResolver;

impl ToolResolver for HeuristicResolver {
    fn resolve(&self, tools: &[McpTool], operation: Operation) -> Result<String, ResolveError> {
        let mut best: Option<(&str, u32)> = None;
        for tool in tools {
            let score = score_tool_name(&tool.name, operation);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((&tool.name, score));
            }
        }

        match best {
            Some((name, score)) if score >= MIN_SCORE => {
                tracing::debug!(tool = name, score, %operation, "resolved MCP tool");
                Ok(name.to_string())
            }
            _ => Err(ResolveError::CouldNotInfer {
                operation: operation.to_string(),
            }),
        }
    }
}

/// 按操作配置的显式工具名，未配置时交给内层策略
#[derive(Debug, Clone, Default)]
pub struct OverrideResolver<R = HeuristicResolver> {
    pub create: Option<String>,
    pub refine: Option<String>,
    pub inner: R,
}

impl OverrideResolver<HeuristicResolver> {
    pub fn new(create: Option<String>, refine: Option<String>) -> Self {
        Self {
            create,
            refine,
            inner: HeuristicResolver,
        }
    }
}

impl<R: ToolResolver> ToolResolver for OverrideResolver<R> {
    fn resolve(&self, tools: &[McpTool], operation: Operation) -> Result<String, ResolveError> {
        let explicit = match operation {
            Operation::Create => self.create.as_deref(),
            Operation::Refine => self.refine.as_deref(),
        };
        resolve_tool_with(&self.inner, tools, operation, explicit)
    }
}

/// 显式名（去除首尾空白后非空）优先，否则启发式
pub fn resolve_tool(
    tools: &[McpTool],
    operation: Operation,
    explicit: Option<&str>,
) -> Result<String, ResolveError> {
    resolve_tool_with(&HeuristicResolver, tools, operation, explicit)
}

fn resolve_tool_with<R: ToolResolver + ?Sized>(
    inner: &R,
    tools: &[McpTool],
    operation: Operation,
    explicit: Option<&str>,
) -> Result<String, ResolveError> {
    match explicit.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => Ok(name.to_string()),
        None => inner.resolve(tools, operation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools(names: &[&str]) -> Vec<McpTool> {
        names.iter().map(|n| McpTool::named(*n)).collect()
    }

    #[test]
    fn test_scores() {
        assert_eq!(score_tool_name("create_excalidraw_diagram", Operation::Create), 11);
        assert_eq!(score_tool_name("create_excalidraw_diagram", Operation::Refine), 1);
        assert_eq!(score_tool_name("Update_Diagram", Operation::Refine), 11);
        assert_eq!(score_tool_name("generate_image", Operation::Create), 10);
        assert_eq!(score_tool_name("ping", Operation::Create), 0);
    }

    #[test]
    fn test_resolves_create_and_refine() {
        let list = tools(&["create_excalidraw_diagram", "refine_excalidraw_diagram"]);
        assert_eq!(
            resolve_tool(&list, Operation::Create, None).unwrap(),
            "create_excalidraw_diagram"
        );
        assert_eq!(
            resolve_tool(&list, Operation::Refine, None).unwrap(),
            "refine_excalidraw_diagram"
        );
    }

    #[test]
    fn test_unrelated_tools_fail_explicitly() {
        let list = tools(&["ping", "list_files"]);
        for op in [Operation::Create, Operation::Refine] {
            let err = resolve_tool(&list, op, None).unwrap_err();
            assert_eq!(
                err,
                ResolveError::CouldNotInfer {
                    operation: op.to_string()
                }
            );
            assert!(err.to_string().contains("Could not infer"));
        }
    }

    #[test]
    fn test_verb_without_diagram_signal_is_rejected() {
        let list = tools(&["create_file", "generate_report"]);
        assert!(resolve_tool(&list, Operation::Create, None).is_err());
    }

    #[test]
    fn test_empty_list_fails() {
        assert!(resolve_tool(&[], Operation::Create, None).is_err());
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let list = tools(&["edit_diagram", "update_excalidraw", "refine_diagram"]);
        assert_eq!(
            resolve_tool(&list, Operation::Refine, None).unwrap(),
            "edit_diagram"
        );
    }

    #[test]
    fn test_override_short_circuits_without_validation() {
        let list = tools(&["ping"]);
        assert_eq!(
            resolve_tool(&list, Operation::Create, Some("custom_tool")).unwrap(),
            "custom_tool"
        );
        // 空白覆盖视为未配置
        assert!(resolve_tool(&list, Operation::Create, Some("  ")).is_err());
    }

    #[test]
    fn test_override_resolver_per_operation() {
        let resolver = OverrideResolver::new(Some("make_it".into()), None);
        let list = tools(&["create_diagram", "edit_diagram"]);
        assert_eq!(resolver.resolve(&list, Operation::Create).unwrap(), "make_it");
        assert_eq!(
            resolver.resolve(&list, Operation::Refine).unwrap(),
            "edit_diagram"
        );
    }

    #[test]
    fn test_operation_parsing() {
        assert_eq!("create".parse::<Operation>().unwrap(), Operation::Create);
        assert_eq!("refine".parse::<Operation>().unwrap(), Operation::Refine);
        assert!("delete".parse::<Operation>().is_err());
    }
}

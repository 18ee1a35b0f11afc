//! 桥接集成测试：真实子进程（press-mock-mcp）上的握手、工具发现与调用

#[cfg(all(test, unix))]
mod tests {
    use std::path::Path;
    use std::process::{Command, Output};

    use press::core::{BridgeError, ExitReason, RpcError};
    use press::diagram::{AdapterConfig, CreateDiagramInput, DiagramAdapter, RefineDiagramInput};
    use press::mcp::{BridgeConfig, BridgeSession, CheckReport, SessionOptions, SessionState};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    const LEGACY_VARS: [&str; 6] = [
        "PRESS_EXCALIDRAW_MCP_SERVER_CMD",
        "EXCALIDRAW_MCP_SERVER_CMD",
        "PRESS_EXCALIDRAW_MCP_CREATE_TOOL",
        "PRESS_EXCALIDRAW_MCP_REFINE_TOOL",
        "PRESS_EXCALIDRAW_EXEC",
        "PRESS_EXCALIDRAW_ARGS",
    ];

    fn mock_command(env: &str) -> String {
        format!("{} '{}'", env, env!("CARGO_BIN_EXE_press-mock-mcp"))
            .trim()
            .to_string()
    }

    fn run_bridge(cwd: &Path, server: Option<&str>, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_press-bridge"));
        cmd.current_dir(cwd).args(args);
        for key in LEGACY_VARS {
            cmd.env_remove(key);
        }
        cmd.env_remove("PRESS__BRIDGE__SERVER_COMMAND");
        if let Some(server) = server {
            cmd.env("PRESS__BRIDGE__SERVER_COMMAND", server);
        }
        cmd.output().unwrap()
    }

    fn stdout_json(output: &Output) -> Value {
        serde_json::from_slice(&output.stdout).unwrap()
    }

    #[test]
    fn test_check_lists_mock_tools() {
        let dir = TempDir::new().unwrap();
        let output = run_bridge(dir.path(), Some(&mock_command("")), &["--check"]);
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

        let report: CheckReport = serde_json::from_slice(&output.stdout).unwrap();
        assert!(report.ok);
        assert_eq!(report.tool_count, 3);
        assert!(report.tools.contains(&"create_excalidraw_diagram".to_string()));
        assert!(report.tools.contains(&"refine_excalidraw_diagram".to_string()));
    }

    #[test]
    fn test_check_without_server_fails() {
        let dir = TempDir::new().unwrap();
        let output = run_bridge(dir.path(), None, &["--check"]);
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("not configured"));
    }

    #[test]
    fn test_check_reads_press_local_json() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(".press-local.json"),
            json!({"excalidrawMcpCommand": mock_command("")}).to_string(),
        )
        .unwrap();
        let output = run_bridge(dir.path(), None, &["--check"]);
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        assert_eq!(stdout_json(&output)["toolCount"], 3);
    }

    #[test]
    fn test_create_returns_mock_content() {
        let dir = TempDir::new().unwrap();
        let payload = json!({"title": "diagram-01", "excerpt": "\"a...b\"", "sourceText": "a b"});
        let output = run_bridge(
            dir.path(),
            Some(&mock_command("")),
            &["create", &payload.to_string()],
        );
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

        let result = stdout_json(&output);
        let content = result["content"].as_str().unwrap();
        assert!(content.contains("\"source\":\"mock-mcp\""));
        assert!(content.contains("create_excalidraw_diagram"));
        assert_eq!(result["webUrl"], "https://example.com/mock-diagram");
        assert_eq!(result["warnings"], json!([]));
    }

    #[test]
    fn test_refine_with_content_array_shape() {
        let dir = TempDir::new().unwrap();
        let payload = json!({"diagramId": "diagram-01", "existingContent": "{}", "instruction": "split"});
        let output = run_bridge(
            dir.path(),
            Some(&mock_command("MOCK_MCP_SHAPE=content-array")),
            &["refine", &payload.to_string()],
        );
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        let content = stdout_json(&output)["content"].as_str().unwrap().to_string();
        assert!(content.contains("refine_excalidraw_diagram"));
        assert!(content.contains("diagram-01"));
    }

    #[test]
    fn test_bad_arguments_fail() {
        let dir = TempDir::new().unwrap();
        let server = mock_command("");
        assert!(!run_bridge(dir.path(), Some(&server), &["delete", "{}"]).status.success());
        assert!(!run_bridge(dir.path(), Some(&server), &["create"]).status.success());
        assert!(!run_bridge(dir.path(), Some(&server), &["create", "not json"]).status.success());
    }

    #[test]
    fn test_tool_error_and_exit_fail_the_operation() {
        let dir = TempDir::new().unwrap();
        let output = run_bridge(
            dir.path(),
            Some(&mock_command("MOCK_MCP_SHAPE=tool-error")),
            &["create", "{}"],
        );
        assert!(!output.status.success());

        let output = run_bridge(
            dir.path(),
            Some(&mock_command("MOCK_MCP_EXIT_ON_CALL=7")),
            &["create", "{}"],
        );
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("exited with code 7"));
    }

    #[tokio::test]
    async fn test_session_lifecycle_against_mock() {
        let mut session = BridgeSession::spawn(&mock_command(""), SessionOptions::default()).unwrap();
        assert_eq!(session.state(), SessionState::Spawned);

        session.initialize().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);

        let tools = session.list_tools().await.unwrap();
        assert_eq!(tools.len(), 3);

        let raw = session
            .call_tool("create_excalidraw_diagram", json!({"title": "diagram-09"}))
            .await
            .unwrap();
        assert!(raw["structuredContent"]["content"]
            .as_str()
            .unwrap()
            .contains("diagram-09"));

        let unknown = session.call_tool("ping", json!({})).await.unwrap_err();
        assert!(matches!(
            unknown,
            BridgeError::Rpc(RpcError::Server { code: -32602, .. })
        ));

        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_process_exit_rejects_pending_call() {
        let mut session = BridgeSession::spawn(
            &mock_command("MOCK_MCP_EXIT_ON_CALL=7"),
            SessionOptions::default(),
        )
        .unwrap();
        session.initialize().await.unwrap();
        session.list_tools().await.unwrap();

        let err = session
            .call_tool("create_excalidraw_diagram", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Rpc(RpcError::ProcessExited(ExitReason::Code(7)))
        ));
        session.close().await;
    }

    #[tokio::test]
    async fn test_adapter_uses_bridge_tier() {
        let adapter = DiagramAdapter::new(AdapterConfig {
            bridge: BridgeConfig {
                server_command: Some(mock_command("MOCK_MCP_SHAPE=plain")),
                ..BridgeConfig::default()
            },
            ..AdapterConfig::default()
        });

        let created = adapter
            .create_diagram(CreateDiagramInput {
                title: "diagram-01".into(),
                excerpt: "\"a...b\"".into(),
                intent: Some("show the loop".into()),
                source_text: "a b".into(),
            })
            .await;
        assert!(created.content.contains("mock-mcp"));
        assert_eq!(created.web_url.as_deref(), Some("https://example.com/mock-diagram"));
        assert!(created.warnings.is_empty());

        let refined = adapter
            .refine_diagram(RefineDiagramInput {
                diagram_id: "diagram-01".into(),
                existing_content: created.content,
                instruction: "add labels".into(),
            })
            .await;
        assert!(refined.content.contains("refine_excalidraw_diagram"));
        assert!(refined.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_adapter_tool_override_pointing_nowhere_falls_back() {
        let adapter = DiagramAdapter::new(AdapterConfig {
            bridge: BridgeConfig {
                server_command: Some(mock_command("")),
                create_tool: Some("ping".into()),
                ..BridgeConfig::default()
            },
            ..AdapterConfig::default()
        });
        let result = adapter
            .create_diagram(CreateDiagramInput {
                title: "diagram-01".into(),
                excerpt: "\"a...b\"".into(),
                intent: None,
                source_text: "a b".into(),
            })
            .await;
        assert_eq!(result.warnings.len(), 2);
        assert!(result.warnings[0].contains("first-party-bridge"));
        assert!(result.content.contains("https://press.local"));
    }
}

//! `press` 命令行端到端测试：能力 → 适配器 → 外部命令（press-bridge）→ press-mock-mcp

#[cfg(all(test, unix))]
mod tests {
    use std::path::Path;
    use std::process::{Command, Output};

    use serde_json::{json, Value};
    use tempfile::TempDir;

    const ESSAY: &str = "Discipline is a system, not a mood.\n\nOver weeks the habit becomes the default path.\n";
    const EXCERPT: &str = "\"Discipline is a system...becomes the default path.\"";

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("essay.md"), ESSAY).unwrap();
        dir
    }

    fn press(project: &Path, with_mcp: bool, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_press"));
        cmd.current_dir(project).args(args);
        for key in [
            "PRESS_EXCALIDRAW_MCP_SERVER_CMD",
            "EXCALIDRAW_MCP_SERVER_CMD",
            "PRESS_EXCALIDRAW_EXEC",
            "PRESS_EXCALIDRAW_ARGS",
            "PRESS__BRIDGE__SERVER_COMMAND",
            "PRESS__EXTERNAL__EXECUTABLE",
        ] {
            cmd.env_remove(key);
        }
        if with_mcp {
            cmd.env("PRESS__EXTERNAL__EXECUTABLE", env!("CARGO_BIN_EXE_press-bridge"));
            cmd.env(
                "PRESS__BRIDGE__SERVER_COMMAND",
                format!("'{}'", env!("CARGO_BIN_EXE_press-mock-mcp")),
            );
        }
        cmd.output().unwrap()
    }

    fn result_json(output: &Output) -> Value {
        serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
            panic!(
                "stdout is not JSON ({e}): {}\nstderr: {}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            )
        })
    }

    fn create_args<'a>(dir: &'a str) -> Vec<&'a str> {
        vec![
            "diagram-create",
            "--project",
            dir,
            "--source",
            "essay.md",
            "--excerpt",
            EXCERPT,
        ]
    }

    #[test]
    fn test_create_through_external_bridge_and_mock() {
        let dir = project();
        let root = dir.path().to_str().unwrap();

        let output = press(dir.path(), true, &create_args(root));
        assert!(output.status.success());
        let result = result_json(&output);
        assert_eq!(result["ok"], true);
        assert_eq!(result["data"]["filename"], "diagram-01.excalidraw");
        assert_eq!(result["data"]["webUrl"], "https://example.com/mock-diagram");
        assert_eq!(result["warnings"], json!([]));

        let body = std::fs::read_to_string(dir.path().join("artifacts/diagram-01.excalidraw")).unwrap();
        assert!(body.contains("mock-mcp"));
        assert!(body.ends_with("}\n"));

        let again = result_json(&press(dir.path(), true, &create_args(root)));
        assert_eq!(again["data"]["reused"], true);
    }

    #[test]
    fn test_create_offline_uses_fallback() {
        let dir = project();
        let root = dir.path().to_str().unwrap();
        let output = press(dir.path(), false, &create_args(root));
        assert!(output.status.success());

        let result = result_json(&output);
        assert_eq!(result["ok"], true);
        let warnings = result["warnings"].as_array().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].as_str().unwrap().contains("Excalidraw MCP was unavailable"));

        let state: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("artifacts/.press/plan-state.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(state["diagrams"][0]["id"], "diagram-01");
        assert_eq!(state["lastDiagramSequence"], 1);
    }

    #[test]
    fn test_refine_missing_diagram_exits_one() {
        let dir = project();
        let root = dir.path().to_str().unwrap();
        let output = press(
            dir.path(),
            false,
            &[
                "diagram-refine",
                "--project",
                root,
                "--diagram",
                "diagram-04",
                "--instruction",
                "simplify",
            ],
        );
        assert_eq!(output.status.code(), Some(1));
        let result = result_json(&output);
        assert_eq!(result["ok"], false);
        assert_eq!(result["message"], "Diagram not found: diagram-04.excalidraw");
    }

    #[test]
    fn test_refine_through_mock_counts_revisions() {
        let dir = project();
        let root = dir.path().to_str().unwrap();
        assert!(press(dir.path(), true, &create_args(root)).status.success());

        let refine = [
            "diagram-refine",
            "--project",
            root,
            "--diagram",
            "diagram-01",
            "--instruction",
            "Split into three labeled parts",
        ];
        let first = result_json(&press(dir.path(), true, &refine));
        assert_eq!(first["data"]["revisions"], 1);
        let second = result_json(&press(dir.path(), true, &refine));
        assert_eq!(second["data"]["revisions"], 2);

        let body = std::fs::read_to_string(dir.path().join("artifacts/diagram-01.excalidraw")).unwrap();
        assert!(body.contains("refine_excalidraw_diagram"));
    }

    #[test]
    fn test_plan_record_from_rows_file() {
        let dir = project();
        let root = dir.path().to_str().unwrap();
        let rows = dir.path().join("rows.json");
        std::fs::write(
            &rows,
            json!([{
                "excerpt": EXCERPT,
                "visualType": "B-Roll-Atmospheric",
                "notesArtifacts": "",
                "context": "Opening",
                "sourceFile": "essay.md"
            }])
            .to_string(),
        )
        .unwrap();
        let args = [
            "plan-record",
            "--project",
            root,
            "--source",
            "essay.md",
            "--rows",
            rows.to_str().unwrap(),
        ];

        let first = result_json(&press(dir.path(), false, &args));
        assert_eq!(first["data"]["reused"], false);
        let second = result_json(&press(dir.path(), false, &args));
        assert_eq!(second["data"]["reused"], true);

        let state: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("artifacts/.press/plan-state.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(state["rows"][0]["visualType"], "B-Roll A (Atmospheric)");
        assert!(state["rows"][0]["id"].as_str().unwrap().starts_with("row-"));
    }

    #[test]
    fn test_missing_flag_is_an_error() {
        let dir = project();
        let output = press(dir.path(), false, &["diagram-create", "--source", "essay.md"]);
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("--project"));
    }
}

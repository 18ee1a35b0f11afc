//! Press Bridge - 第一方 Excalidraw MCP 桥接
//!
//! 运行方式：
//! ```bash
//! press-bridge --check
//! press-bridge create '{"title":"diagram-01","excerpt":"...","sourceText":"..."}'
//! press-bridge refine '{"diagramId":"diagram-01","existingContent":"{}","instruction":"..."}'
//! ```
//! 结果 JSON 输出到 stdout；失败时非零退出并在 stderr 给出原因。

use anyhow::{bail, Context};
use serde_json::Value;

use press::config::{apply_legacy_sources, load_config, PressConfig};
use press::mcp::{check, run_operation, Operation};

const USAGE: &str = "Usage: press-bridge <create|refine> '<json-payload>'\n       press-bridge --check";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    press::observability::init_with_default("warn");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let first = args.first().map(String::as_str);

    if matches!(first, Some("--help") | Some("help")) {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = resolve_config()?.bridge_config();

    if first == Some("--check") {
        let report = check(&config).await.context("MCP check failed")?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let operation: Operation = match first {
        Some(op) => op.parse().map_err(anyhow::Error::msg)?,
        None => bail!("Unknown operation: (missing)\n{}", USAGE),
    };
    let Some(raw) = args.get(1) else {
        bail!("Missing JSON payload argument.");
    };
    let payload: Value = serde_json::from_str(raw).context("JSON payload is not valid JSON")?;
    if !payload.is_object() {
        bail!("JSON payload must be an object.");
    }

    let output = run_operation(&config, operation, payload)
        .await
        .with_context(|| format!("MCP {} failed", operation))?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn resolve_config() -> anyhow::Result<PressConfig> {
    let mut cfg = load_config(None).context("loading configuration")?;
    let repo_root = std::env::current_dir().context("resolving working directory")?;
    apply_legacy_sources(&mut cfg, &repo_root);
    Ok(cfg)
}

//! Press - 图表能力入口
//!
//! ```bash
//! press diagram-create --project Essays/slug --source essay.md --excerpt '"start...end"' [--intent "..."]
//! press diagram-refine --project Essays/slug --diagram diagram-02 --instruction "..."
//! press plan-record   --project Essays/slug --source essay.md --rows rows.json
//! ```
//! 全局参数 `--config <file>`。能力结果 JSON 输出到 stdout，`ok:false` 时退出码为 1。

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};

use press::capabilities::{
    diagram_create, diagram_refine, plan_record, CapabilityResult, DiagramCreateArgs,
    DiagramRefineArgs, PlanRecordArgs,
};
use press::config::{apply_legacy_sources, load_config};
use press::state::PlanRow;
use press::DiagramAdapter;

const USAGE: &str = "Usage:
  press diagram-create --project <dir> --source <file.md> --excerpt <text> [--intent <text>]
  press diagram-refine --project <dir> --diagram <id|filename> --instruction <text>
  press plan-record --project <dir> --source <file.md> --rows <rows.json>
Global: --config <file.toml>";

/// `--key value` 形式的参数
struct Flags(HashMap<String, String>);

impl Flags {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut map = HashMap::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let Some(key) = arg.strip_prefix("--") else {
                bail!("Unexpected argument: {}", arg);
            };
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("Missing value for --{}", key))?;
            map.insert(key.to_string(), value.clone());
        }
        Ok(Self(map))
    }

    fn required(&self, key: &str) -> anyhow::Result<String> {
        self.0
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow!("Missing required --{}", key))
    }

    fn optional(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖；输出到 stderr
    press::observability::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    if matches!(command.as_str(), "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }
    let flags = Flags::parse(rest)?;

    let mut cfg = load_config(flags.optional("config").map(PathBuf::from))
        .context("loading configuration")?;
    let repo_root = std::env::current_dir().context("resolving working directory")?;
    apply_legacy_sources(&mut cfg, &repo_root);
    let adapter = DiagramAdapter::new(cfg.adapter_config());

    let result: CapabilityResult = match command.as_str() {
        "diagram-create" => {
            let args = DiagramCreateArgs {
                project: PathBuf::from(flags.required("project")?),
                source: flags.required("source")?,
                excerpt: flags.required("excerpt")?,
                intent: flags.optional("intent"),
            };
            diagram_create(&adapter, args).await
        }
        "diagram-refine" => {
            let args = DiagramRefineArgs {
                project: PathBuf::from(flags.required("project")?),
                diagram: flags.required("diagram")?,
                instruction: flags.required("instruction")?,
            };
            diagram_refine(&adapter, args).await
        }
        "plan-record" => {
            let rows_path = flags.required("rows")?;
            let raw = tokio::fs::read_to_string(&rows_path)
                .await
                .with_context(|| format!("reading rows from {}", rows_path))?;
            let rows: Vec<PlanRow> =
                serde_json::from_str(&raw).context("rows file must be a JSON array of plan rows")?;
            let args = PlanRecordArgs {
                project: PathBuf::from(flags.required("project")?),
                source: flags.required("source")?,
                rows,
            };
            plan_record(args).await
        }
        other => bail!("Unknown command: {}\n{}", other, USAGE),
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.ok {
        std::process::exit(1);
    }
    Ok(())
}

//! plan-record：持久化外部分类得到的计划行
//!
//! 源文哈希与行内容都没变时不写盘，按复用返回。

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::capabilities::result::CapabilityResult;
use crate::core::project_lock;
use crate::state::store::{compute_content_hash, ensure_artifacts_structure, load, save};
use crate::state::{PlanRow, ProjectPaths};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRecordArgs {
    pub project: PathBuf,
    pub source: String,
    pub rows: Vec<PlanRow>,
}

pub async fn plan_record(args: PlanRecordArgs) -> CapabilityResult {
    match try_plan_record(args).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "plan-record failed");
            CapabilityResult::from_error("plan-record failed", &e)
        }
    }
}

async fn try_plan_record(args: PlanRecordArgs) -> anyhow::Result<CapabilityResult> {
    let paths = ProjectPaths::resolve(&args.project).await?;
    let source_path = paths.resolve_source(&args.source).await?;
    let source_text = tokio::fs::read_to_string(&source_path)
        .await
        .with_context(|| format!("reading source {}", source_path.display()))?;
    ensure_artifacts_structure(&paths).await?;

    let source_file = paths.relative_source(&source_path);
    let essay_hash = compute_content_hash(&source_text);
    let rows: Vec<PlanRow> = args
        .rows
        .into_iter()
        .map(|mut row| {
            if row.id.trim().is_empty() {
                row.id = PlanRow::derive_id(&row.excerpt, row.visual_type, &row.source_file);
            }
            row
        })
        .collect();
    let row_count = rows.len();

    let _guard = project_lock(&paths.state_file).await;
    let mut state = load(&paths).await;

    if !state.record_rows(&source_file, &essay_hash, rows) {
        tracing::info!(source = %source_file, "plan rows unchanged, reusing state");
        return Ok(CapabilityResult::success(
            format!("Plan for {} is unchanged; reused existing state.", source_file),
            json!({
                "sourceFile": source_file,
                "essayHash": essay_hash,
                "rowCount": row_count,
                "reused": true,
            }),
            state.warnings.clone(),
        ));
    }

    state.project_path = paths.project_root.display().to_string();
    save(&paths, &mut state).await?;
    tracing::info!(source = %source_file, rows = row_count, "plan rows recorded");

    Ok(CapabilityResult::success(
        format!("Recorded {} plan rows for {}.", row_count, source_file),
        json!({
            "sourceFile": source_file,
            "essayHash": essay_hash,
            "rowCount": row_count,
            "reused": false,
        }),
        Vec::new(),
    ))
}

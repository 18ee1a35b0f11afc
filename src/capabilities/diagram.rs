//! diagram-create / diagram-refine
//!
//! 两者都在 load → 修改 → save 期间持有项目写锁。适配器永远给出可用结果，
//! 降级只体现在 warnings 里；ok:false 仅用于参数错误与状态 / 产物 I/O 失败。

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::capabilities::excerpt::source_contains_excerpt;
use crate::capabilities::result::CapabilityResult;
use crate::core::project_lock;
use crate::diagram::{CreateDiagramInput, DiagramAdapter, RefineDiagramInput};
use crate::state::store::{
    allocate_diagram_filename, compute_content_hash, ensure_artifacts_structure, load, save,
    write_atomic, write_diagram_links,
};
use crate::state::types::{
    diagram_sequence, ensure_filename, filename_to_id, now_iso, DiagramRecord,
};
use crate::state::ProjectPaths;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramCreateArgs {
    pub project: PathBuf,
    pub source: String,
    pub excerpt: String,
    #[serde(default)]
    pub intent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramRefineArgs {
    pub project: PathBuf,
    pub diagram: String,
    pub instruction: String,
}

fn artifact_body(content: &str) -> String {
    format!("{}\n", content.trim())
}

pub async fn diagram_create(adapter: &DiagramAdapter, args: DiagramCreateArgs) -> CapabilityResult {
    match try_diagram_create(adapter, args).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "diagram-create failed");
            CapabilityResult::from_error("diagram-create failed", &e)
        }
    }
}

async fn try_diagram_create(
    adapter: &DiagramAdapter,
    args: DiagramCreateArgs,
) -> anyhow::Result<CapabilityResult> {
    let excerpt = args.excerpt.trim().to_string();
    if excerpt.is_empty() {
        return Ok(CapabilityResult::failure(
            "An excerpt is required to create a diagram.",
            vec!["Provide --excerpt with the passage the diagram should illustrate.".into()],
        ));
    }

    let paths = ProjectPaths::resolve(&args.project).await?;
    let source_path = paths.resolve_source(&args.source).await?;
    let source_text = tokio::fs::read_to_string(&source_path)
        .await
        .with_context(|| format!("reading source {}", source_path.display()))?;
    ensure_artifacts_structure(&paths).await?;

    let source_file = paths.relative_source(&source_path);
    let essay_hash = compute_content_hash(&source_text);

    let _guard = project_lock(&paths.state_file).await;
    let mut state = load(&paths).await;

    let mut stale = Vec::new();
    for candidate in state.find_by_excerpt(&source_file, &excerpt) {
        if tokio::fs::metadata(paths.diagram_path(&candidate.filename)).await.is_err() {
            stale.push(candidate.id.clone());
            continue;
        }
        tracing::info!(diagram = %candidate.id, "reusing diagram for identical excerpt");
        return Ok(CapabilityResult::success(
            format!("Reused existing diagram {} for the same excerpt.", candidate.filename),
            json!({
                "diagramId": candidate.id,
                "filename": candidate.filename,
                "reused": true,
            }),
            state.warnings.clone(),
        ));
    }
    // 文件已被删除的记录由新图表取代
    if !stale.is_empty() {
        tracing::info!(stale = ?stale, "dropping records whose diagram file is gone");
        state.diagrams.retain(|d| !stale.contains(&d.id));
    }

    let filename = allocate_diagram_filename(&paths, &mut state).await?;
    let diagram_id = filename_to_id(&filename);
    let diagram_path = paths.diagram_path(&filename);
    paths.assert_write_target(&diagram_path)?;

    let output = adapter
        .create_diagram(CreateDiagramInput {
            title: diagram_id.clone(),
            excerpt: excerpt.clone(),
            intent: args.intent.clone(),
            source_text: source_text.clone(),
        })
        .await;
    write_atomic(&paths, &diagram_path, &artifact_body(&output.content)).await?;

    let mut record = DiagramRecord::new(filename.clone(), excerpt.clone(), source_file.clone());
    record.web_url = output.web_url.clone();
    state.upsert_diagram(record);

    let mut warnings = output.warnings;
    if !source_contains_excerpt(&source_text, &excerpt) {
        warnings.push(format!(
            "Excerpt did not match source text exactly for {}; diagram was still created for manual review.",
            source_file
        ));
    }
    state.append_warnings(warnings.iter().cloned());
    state.project_path = paths.project_root.display().to_string();
    state.source_file = source_file.clone();
    state.essay_hash = essay_hash;

    write_diagram_links(&paths, &state).await?;
    save(&paths, &mut state).await?;
    tracing::info!(diagram = %diagram_id, source = %source_file, "diagram created");

    let mut data = json!({
        "diagramId": diagram_id,
        "filename": filename,
        "sourceFile": source_file,
        "excerpt": excerpt,
    });
    if let Some(url) = output.web_url {
        data["webUrl"] = json!(url);
    }
    Ok(CapabilityResult::success(
        format!("Created diagram {}.", filename),
        data,
        warnings,
    ))
}

pub async fn diagram_refine(adapter: &DiagramAdapter, args: DiagramRefineArgs) -> CapabilityResult {
    match try_diagram_refine(adapter, args).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "diagram-refine failed");
            CapabilityResult::from_error("diagram-refine failed", &e)
        }
    }
}

async fn try_diagram_refine(
    adapter: &DiagramAdapter,
    args: DiagramRefineArgs,
) -> anyhow::Result<CapabilityResult> {
    let identifier = args.diagram.trim();
    if identifier.is_empty() || args.instruction.trim().is_empty() {
        return Ok(CapabilityResult::failure(
            "Both a diagram identifier and an instruction are required.",
            vec!["Provide --diagram (id or filename) and --instruction.".into()],
        ));
    }

    let paths = ProjectPaths::resolve(&args.project).await?;
    ensure_artifacts_structure(&paths).await?;

    let _guard = project_lock(&paths.state_file).await;
    let mut state = load(&paths).await;

    let existing = state.find_diagram(identifier).cloned();
    let filename = existing
        .as_ref()
        .map(|r| r.filename.clone())
        .unwrap_or_else(|| ensure_filename(identifier));
    if existing.is_none() && diagram_sequence(&filename).is_none() {
        return Ok(CapabilityResult::failure(
            format!("Diagram not found: {}", filename),
            vec!["Diagram identifiers look like diagram-01 or diagram-01.excalidraw.".into()],
        ));
    }
    let diagram_path = paths.diagram_path(&filename);
    paths.assert_write_target(&diagram_path)?;

    let current = match tokio::fs::read_to_string(&diagram_path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(CapabilityResult::failure(
                format!("Diagram not found: {}", filename),
                vec![format!(
                    "Expected a file at {}. Create the diagram first or provide the correct identifier.",
                    diagram_path.display()
                )],
            ));
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading diagram {}", diagram_path.display()));
        }
    };

    let output = adapter
        .refine_diagram(RefineDiagramInput {
            diagram_id: filename_to_id(&filename),
            existing_content: current,
            instruction: args.instruction.clone(),
        })
        .await;
    write_atomic(&paths, &diagram_path, &artifact_body(&output.content)).await?;

    let mut record = existing.unwrap_or_else(|| DiagramRecord::orphan(filename.clone()));
    record.revisions += 1;
    record.updated_at = now_iso();
    if output.web_url.is_some() {
        record.web_url = output.web_url.clone();
    }
    let data = json!({
        "diagramId": record.id,
        "filename": filename,
        "revisions": record.revisions,
    });
    state.upsert_diagram(record);
    state.append_warnings(output.warnings.iter().cloned());

    write_diagram_links(&paths, &state).await?;
    save(&paths, &mut state).await?;
    tracing::info!(diagram = %filename, "diagram refined");

    Ok(CapabilityResult::success(
        format!("Refined diagram {}.", filename),
        data,
        output.warnings,
    ))
}

//! 状态文件读写
//!
//! 读：不存在 → 空状态；损坏或不可读 → 新状态 + 告警（不让能力失败）。
//! 写：同目录临时文件 + rename，整体覆盖。

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs;

use crate::core::StoreError;
use crate::state::paths::ProjectPaths;
use crate::state::types::{diagram_sequence, now_iso, PlanState, STATE_VERSION};

/// SHA-256 十六进制摘要，用作 essayHash
pub fn compute_content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// 创建 artifacts/ 与 artifacts/.press/
pub async fn ensure_artifacts_structure(paths: &ProjectPaths) -> Result<(), StoreError> {
    fs::create_dir_all(&paths.internal_dir)
        .await
        .map_err(|e| StoreError::io(&paths.internal_dir, e))
}

pub async fn load(paths: &ProjectPaths) -> PlanState {
    let project_path = paths.project_root.display().to_string();
    let raw = match fs::read_to_string(&paths.state_file).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return PlanState::new(project_path);
        }
        Err(e) => {
            tracing::warn!(path = %paths.state_file.display(), error = %e, "plan state unreadable, starting fresh");
            let mut state = PlanState::new(project_path);
            state.append_warnings([format!(
                "Plan state at {} was unreadable ({}); started from an empty state.",
                paths.state_file.display(),
                e
            )]);
            return state;
        }
    };

    match serde_json::from_str::<PlanState>(&raw) {
        Ok(mut state) => {
            if state.project_path.is_empty() {
                state.project_path = project_path;
            }
            state
        }
        Err(e) => {
            tracing::warn!(path = %paths.state_file.display(), error = %e, "plan state corrupt, starting fresh");
            let mut state = PlanState::new(project_path);
            state.append_warnings([format!(
                "Plan state at {} could not be parsed ({}); started from an empty state.",
                paths.state_file.display(),
                e
            )]);
            state
        }
    }
}

/// 盖上 updatedAt 后原子覆盖
pub async fn save(paths: &ProjectPaths, state: &mut PlanState) -> Result<(), StoreError> {
    state.version = STATE_VERSION.to_string();
    state.updated_at = now_iso();
    let mut body = serde_json::to_string_pretty(state)?;
    body.push('\n');
    write_atomic(paths, &paths.state_file, &body).await
}

/// 写产物文件：校验落在 artifacts/ 内，临时文件 + rename
pub async fn write_atomic(
    paths: &ProjectPaths,
    target: &Path,
    content: &str,
) -> Result<(), StoreError> {
    paths.assert_write_target(target)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = target.with_file_name(format!(".{}.tmp-{}", file_name, std::process::id()));
    fs::write(&tmp, content)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, target).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(StoreError::io(target, e));
    }
    Ok(())
}

/// 分配下一个图表文件名；同时扫描 artifacts/，没有记录的已有文件也不会被覆盖
pub async fn allocate_diagram_filename(
    paths: &ProjectPaths,
    state: &mut PlanState,
) -> Result<String, StoreError> {
    let on_disk = highest_sequence_on_disk(&paths.artifacts_dir).await?;
    state.last_diagram_sequence = state.last_diagram_sequence.max(on_disk);
    let filename = state
        .next_diagram_filename()
        .ok_or(StoreError::SequenceExhausted(state.last_diagram_sequence))?;
    if let Some(seq) = diagram_sequence(&filename) {
        state.last_diagram_sequence = seq;
    }
    Ok(filename)
}

async fn highest_sequence_on_disk(dir: &Path) -> Result<u32, StoreError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(StoreError::io(dir, e)),
    };
    let mut highest = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::io(dir, e))?
    {
        if let Some(seq) = entry.file_name().to_str().and_then(diagram_sequence) {
            highest = highest.max(seq);
        }
    }
    Ok(highest)
}

fn table_cell(text: &str) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flattened.is_empty() {
        "-".to_string()
    } else {
        flattened.replace('|', "\\|")
    }
}

/// 渲染 diagram-links.md
pub fn render_diagram_links(state: &PlanState) -> String {
    let mut out = String::from("# Diagram Links\n\n");
    if state.diagrams.is_empty() {
        out.push_str("_No diagrams yet._\n");
        return out;
    }
    out.push_str("| Diagram | File | Source | Excerpt | Revisions | Web URL |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for d in &state.diagrams {
        out.push_str(&format!(
            "| {} | [{}](./{}) | {} | {} | {} | {} |\n",
            d.id,
            d.filename,
            d.filename,
            table_cell(&d.source_file),
            table_cell(&d.linked_excerpt),
            d.revisions,
            d.web_url.as_deref().map(table_cell).unwrap_or_else(|| "-".to_string()),
        ));
    }
    out
}

pub async fn write_diagram_links(paths: &ProjectPaths, state: &PlanState) -> Result<(), StoreError> {
    write_atomic(paths, &paths.links_file, &render_diagram_links(state)).await
}

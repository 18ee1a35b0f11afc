//! 项目路径解析与写入边界
//!
//! 所有产物只允许写在 `<project>/artifacts/` 下；源文必须是项目内的 .md 文件。

use std::path::{Component, Path, PathBuf};

use crate::core::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub project_root: PathBuf,
    pub artifacts_dir: PathBuf,
    pub internal_dir: PathBuf,
    pub state_file: PathBuf,
    pub links_file: PathBuf,
}

/// 纯词法规范化：去掉 `.`，按 `..` 回退，不访问文件系统
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn is_inside(parent: &Path, child: &Path) -> bool {
    child != parent && child.starts_with(parent)
}

impl ProjectPaths {
    /// 项目根必须存在；返回绝对路径布局
    pub async fn resolve(project: impl AsRef<Path>) -> Result<Self, StoreError> {
        let project = project.as_ref();
        let root = tokio::fs::canonicalize(project)
            .await
            .map_err(|_| StoreError::ProjectMissing(project.display().to_string()))?;
        let metadata = tokio::fs::metadata(&root)
            .await
            .map_err(|e| StoreError::io(&root, e))?;
        if !metadata.is_dir() {
            return Err(StoreError::ProjectMissing(root.display().to_string()));
        }
        Ok(Self::from_root(root))
    }

    pub fn from_root(project_root: PathBuf) -> Self {
        let artifacts_dir = project_root.join("artifacts");
        let internal_dir = artifacts_dir.join(".press");
        Self {
            state_file: internal_dir.join("plan-state.json"),
            links_file: artifacts_dir.join("diagram-links.md"),
            project_root,
            artifacts_dir,
            internal_dir,
        }
    }

    /// 源文路径：项目内、.md、存在
    pub async fn resolve_source(&self, source: impl AsRef<Path>) -> Result<PathBuf, StoreError> {
        let candidate = normalize(&self.project_root.join(source.as_ref()));
        if !is_inside(&self.project_root, &candidate) {
            return Err(StoreError::PathEscape(format!(
                "Source file must stay inside the project root ({}). Received: {}",
                self.project_root.display(),
                candidate.display()
            )));
        }
        let is_markdown = candidate
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("md"))
            .unwrap_or(false);
        if !is_markdown {
            return Err(StoreError::NotMarkdown(candidate.display().to_string()));
        }
        if tokio::fs::metadata(&candidate).await.is_err() {
            return Err(StoreError::SourceMissing(candidate.display().to_string()));
        }
        Ok(candidate)
    }

    /// 相对项目根的路径，统一用 `/` 分隔
    pub fn relative_source(&self, source_path: &Path) -> String {
        let relative = source_path
            .strip_prefix(&self.project_root)
            .unwrap_or(source_path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// 拒绝写到 artifacts/ 之外
    pub fn assert_write_target(&self, target: &Path) -> Result<(), StoreError> {
        let target = normalize(target);
        if target == self.artifacts_dir || is_inside(&self.artifacts_dir, &target) {
            return Ok(());
        }
        Err(StoreError::PathEscape(format!(
            "Refusing to write outside the project's artifacts directory: {}",
            target.display()
        )))
    }

    /// 图表文件的完整路径
    pub fn diagram_path(&self, filename: &str) -> PathBuf {
        self.artifacts_dir.join(filename)
    }
}

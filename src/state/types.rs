//! 计划状态文档：图表记录、计划行、告警与源文哈希

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::state::store::compute_content_hash;

/// 状态文档格式版本
pub const STATE_VERSION: &str = "1";

const DIAGRAM_EXTENSION: &str = ".excalidraw";

static DIAGRAM_FILENAME_RE: OnceLock<Regex> = OnceLock::new();

fn diagram_filename_re() -> &'static Regex {
    DIAGRAM_FILENAME_RE
        .get_or_init(|| Regex::new(r"(?i)^diagram-(\d+)\.excalidraw$").expect("valid diagram filename pattern"))
}

pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `diagram-07.excalidraw` → 7
pub fn diagram_sequence(filename: &str) -> Option<u32> {
    diagram_filename_re()
        .captures(filename)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn diagram_filename(sequence: u32) -> String {
    format!("diagram-{:02}{}", sequence, DIAGRAM_EXTENSION)
}

/// 去掉 `.excalidraw` 后缀得到 id
pub fn filename_to_id(filename: &str) -> String {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(DIAGRAM_EXTENSION) {
        filename[..filename.len() - DIAGRAM_EXTENSION.len()].to_string()
    } else {
        filename.to_string()
    }
}

/// 补全 `.excalidraw` 后缀
pub fn ensure_filename(identifier: &str) -> String {
    if identifier.ends_with(DIAGRAM_EXTENSION) {
        identifier.to_string()
    } else {
        format!("{}{}", identifier, DIAGRAM_EXTENSION)
    }
}

/// 一个图表产物的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramRecord {
    pub id: String,
    pub filename: String,
    pub linked_excerpt: String,
    pub source_file: String,
    pub revisions: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl DiagramRecord {
    /// 新建记录，revisions 为 0
    pub fn new(
        filename: impl Into<String>,
        linked_excerpt: impl Into<String>,
        source_file: impl Into<String>,
    ) -> Self {
        let filename = filename.into();
        let now = now_iso();
        Self {
            id: filename_to_id(&filename),
            filename,
            linked_excerpt: linked_excerpt.into(),
            source_file: source_file.into(),
            revisions: 0,
            web_url: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// 文件存在但状态里没有记录时补一条
    pub fn orphan(filename: impl Into<String>) -> Self {
        Self::new(filename, "", "")
    }

    pub fn sequence(&self) -> Option<u32> {
        diagram_sequence(&self.filename)
    }
}

/// 计划行的视觉类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisualType {
    #[serde(rename = "Diagram")]
    Diagram,
    #[serde(rename = "B-Roll A (Atmospheric)", alias = "B-Roll-Atmospheric")]
    BRollAtmospheric,
    #[serde(rename = "B-Roll B (Specific)", alias = "B-Roll-Specific")]
    BRollSpecific,
    #[serde(rename = "Emphasis")]
    Emphasis,
}

impl VisualType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualType::Diagram => "Diagram",
            VisualType::BRollAtmospheric => "B-Roll A (Atmospheric)",
            VisualType::BRollSpecific => "B-Roll B (Specific)",
            VisualType::Emphasis => "Emphasis",
        }
    }
}

impl fmt::Display for VisualType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisualType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Diagram" => Ok(VisualType::Diagram),
            "B-Roll A (Atmospheric)" | "B-Roll-Atmospheric" => Ok(VisualType::BRollAtmospheric),
            "B-Roll B (Specific)" | "B-Roll-Specific" => Ok(VisualType::BRollSpecific),
            "Emphasis" => Ok(VisualType::Emphasis),
            other => Err(format!("Unknown visual type: {}", other)),
        }
    }
}

/// 视觉计划的一行；由外部分类步骤产出，原样持久化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRow {
    /// 为空时由 plan-record 按内容派生
    #[serde(default)]
    pub id: String,
    pub excerpt: String,
    pub visual_type: VisualType,
    #[serde(default)]
    pub notes_artifacts: String,
    #[serde(default)]
    pub context: String,
    pub source_file: String,
}

impl PlanRow {
    /// 稳定行 id：`row-` + 内容哈希前 10 位
    pub fn derive_id(excerpt: &str, visual_type: VisualType, source_file: &str) -> String {
        let hash = compute_content_hash(&format!("{}:{}:{}", excerpt, visual_type, source_file));
        format!("row-{}", &hash[..10])
    }
}

/// 一个项目的持久状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanState {
    pub version: String,
    pub project_path: String,
    pub source_file: String,
    pub essay_hash: String,
    pub rows: Vec<PlanRow>,
    pub diagrams: Vec<DiagramRecord>,
    pub warnings: Vec<String>,
    pub updated_at: String,
    /// 已分配过的最大图表序号；记录被外部删除后序号也不会复用
    pub last_diagram_sequence: u32,
}

impl Default for PlanState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            project_path: String::new(),
            source_file: String::new(),
            essay_hash: String::new(),
            rows: Vec::new(),
            diagrams: Vec::new(),
            warnings: Vec::new(),
            updated_at: String::new(),
            last_diagram_sequence: 0,
        }
    }
}

impl PlanState {
    pub fn new(project_path: impl Into<String>) -> Self {
        Self {
            project_path: project_path.into(),
            updated_at: now_iso(),
            ..Self::default()
        }
    }

    /// 按 id 或文件名查找；标识可省略 `.excalidraw` 后缀
    pub fn find_diagram(&self, identifier: &str) -> Option<&DiagramRecord> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return None;
        }
        let filename = ensure_filename(identifier);
        self.diagrams
            .iter()
            .find(|d| d.id == identifier || d.filename == identifier || d.filename == filename)
    }

    /// 复用候选：同一源文件、同一摘录，按记录顺序
    pub fn find_by_excerpt<'a>(
        &'a self,
        source_file: &'a str,
        excerpt: &'a str,
    ) -> impl Iterator<Item = &'a DiagramRecord> + 'a {
        self.diagrams
            .iter()
            .filter(move |d| d.source_file == source_file && d.linked_excerpt == excerpt)
    }

    /// 按 id 替换，否则追加
    pub fn upsert_diagram(&mut self, record: DiagramRecord) {
        if let Some(seq) = record.sequence() {
            self.last_diagram_sequence = self.last_diagram_sequence.max(seq);
        }
        match self.diagrams.iter_mut().find(|d| d.id == record.id) {
            Some(existing) => *existing = record,
            None => self.diagrams.push(record),
        }
    }

    /// 记录与高水位中的最大序号 + 1；序号已到 u32 上限时返回 None
    pub fn next_diagram_filename(&self) -> Option<String> {
        let highest = self
            .diagrams
            .iter()
            .filter_map(DiagramRecord::sequence)
            .fold(self.last_diagram_sequence, u32::max);
        highest.checked_add(1).map(diagram_filename)
    }

    /// 累积，不去重
    pub fn append_warnings<I, S>(&mut self, warnings: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.warnings.extend(warnings.into_iter().map(Into::into));
    }

    /// 缓存是否仍对应当前源文
    pub fn is_current(&self, source_file: &str, essay_hash: &str) -> bool {
        !self.essay_hash.is_empty() && self.source_file == source_file && self.essay_hash == essay_hash
    }

    /// 写入计划行；源文与行都未变化时返回 false
    pub fn record_rows(&mut self, source_file: &str, essay_hash: &str, rows: Vec<PlanRow>) -> bool {
        if self.is_current(source_file, essay_hash) && self.rows == rows {
            return false;
        }
        self.source_file = source_file.to_string();
        self.essay_hash = essay_hash.to_string();
        self.rows = rows;
        true
    }
}

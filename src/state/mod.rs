//! 计划 / 图表状态
//!
//! - **types**: PlanState、DiagramRecord、PlanRow
//! - **paths**: 项目路径与写入边界
//! - **store**: 加载、原子保存、文件名分配、内容哈希、链接索引

pub mod paths;
pub mod store;
pub mod types;

pub use paths::ProjectPaths;
pub use store::{
    allocate_diagram_filename, compute_content_hash, ensure_artifacts_structure, load, save,
    write_atomic, write_diagram_links,
};
pub use types::{DiagramRecord, PlanRow, PlanState, VisualType};

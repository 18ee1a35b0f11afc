//! 能力层：对外的 diagram-create / diagram-refine / plan-record
//!
//! 每个能力返回 [`CapabilityResult`] 信封，不向调用方抛错。

pub mod diagram;
pub mod excerpt;
pub mod plan;
pub mod result;

pub use diagram::{diagram_create, diagram_refine, DiagramCreateArgs, DiagramRefineArgs};
pub use excerpt::source_contains_excerpt;
pub use plan::{plan_record, PlanRecordArgs};
pub use result::CapabilityResult;

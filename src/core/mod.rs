//! 核心层：错误类型与单写者锁

pub mod error;
pub mod lock;

pub use error::{BridgeError, ExitReason, FrameError, ResolveError, RpcError, StoreError};
pub use lock::project_lock;

//! 单写者锁
//!
//! plan-state.json 的读 → 改 → 写 没有文件锁或版本号；同一进程内按状态文件路径
//! 分配一把异步互斥锁，能力在 load 与 save 之间持有它。跨进程写入仍不受保护。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tokio::sync::OwnedMutexGuard;

type LockTable = Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>;

fn table() -> &'static LockTable {
    static TABLE: OnceLock<LockTable> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// 获取某个状态文件的写锁；guard 释放前同一路径的其它能力调用会等待
///
/// 表中只有自身引用的条目（无人持有也无人等待）在下一次获取时清掉，
/// 长驻进程里表的大小只取决于同时活跃的项目数。
pub async fn project_lock(state_file: &Path) -> OwnedMutexGuard<()> {
    let lock = {
        let mut guard = table().lock().unwrap_or_else(|e| e.into_inner());
        guard.retain(|_, lock| Arc::strong_count(lock) > 1);
        guard
            .entry(state_file.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    };
    lock.lock_owned().await
}

//! JSON-RPC 客户端
//!
//! 请求 id 从 1 单调递增；挂起表为 id → oneshot 发送端，由后台读任务按 id 结算，
//! 与发送顺序无关。进程退出、协议错误或超时都走同一条拒绝路径，调用方不会永久挂起。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::core::RpcError;
use crate::mcp::frame::{FrameReader, FrameWriter};
use crate::mcp::message::RpcMessage;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 写入失败后，等待退出监视器给出真实原因（如退出码）的时间
const WRITE_FAILURE_GRACE: Duration = Duration::from_secs(2);

type Responder = oneshot::Sender<Result<Value, RpcError>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// 挂起请求表；closed 记录首个致命错误，之后的请求立即失败
#[derive(Default)]
struct PendingTable {
    entries: HashMap<u64, Responder>,
    closed: Option<RpcError>,
}

/// 读到 EOF 时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EofPolicy {
    /// 立即以 Closed 拒绝所有挂起请求（无进程监视器的裸连接）
    FailPending,
    /// 交给进程退出监视器，以便错误里带上退出码
    AwaitExit,
}

pub struct RpcClient {
    writer: tokio::sync::Mutex<FrameWriter<BoxedWriter>>,
    pending: Arc<Mutex<PendingTable>>,
    next_id: AtomicU64,
    request_timeout: Duration,
    reader_task: JoinHandle<()>,
    reader_done: watch::Receiver<bool>,
}

impl RpcClient {
    pub fn new<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::with_eof_policy(reader, writer, request_timeout, EofPolicy::FailPending)
    }

    pub fn with_eof_policy<R, W>(
        reader: R,
        writer: W,
        request_timeout: Duration,
        eof_policy: EofPolicy,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending = Arc::new(Mutex::new(PendingTable::default()));
        let (done_tx, reader_done) = watch::channel(false);
        let reader_task = tokio::spawn(read_loop(
            FrameReader::new(reader),
            Arc::clone(&pending),
            eof_policy,
            done_tx,
        ));
        let writer: BoxedWriter = Box::new(writer);
        Self {
            writer: tokio::sync::Mutex::new(FrameWriter::new(writer)),
            pending,
            next_id: AtomicU64::new(1),
            request_timeout,
            reader_task,
            reader_done,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// 等待读任务结束（EOF 或协议错误），确保已到达的响应都已结算
    pub async fn reader_closed(&self) {
        let mut done = self.reader_done.clone();
        let _ = done.wait_for(|finished| *finished).await;
    }

    /// 发送请求并等待匹配 id 的响应（默认超时）
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.request_with_timeout(method, params, self.request_timeout)
            .await
    }

    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Value,
        limit: Duration,
    ) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.register(id)?;

        let message = RpcMessage::request(id, method, params);
        let sent = self.writer.lock().await.send(&message).await;
        if let Err(write_err) = sent {
            // 对端已退出时写入先失败；稍等监视器给出带退出码的错误
            return match tokio::time::timeout(WRITE_FAILURE_GRACE.min(limit), &mut rx).await {
                Ok(Ok(settled)) => settled,
                _ => {
                    self.forget(id);
                    Err(write_err)
                }
            };
        }
        tracing::debug!(id, method, "MCP request sent");

        match tokio::time::timeout(limit, rx).await {
            Ok(Ok(settled)) => settled,
            Ok(Err(_)) => Err(RpcError::Closed),
            Err(_) => {
                self.forget(id);
                tracing::warn!(id, method, timeout_ms = limit.as_millis() as u64, "MCP request timed out");
                Err(RpcError::Timeout {
                    method: method.to_string(),
                    millis: limit.as_millis() as u64,
                })
            }
        }
    }

    /// 发送通知：无 id，不等待任何响应
    pub async fn notify(&self, method: &str, params: Value) -> Result<(), RpcError> {
        if let Some(err) = self.closed_reason() {
            return Err(err);
        }
        let message = RpcMessage::notification(method, params);
        self.writer.lock().await.send(&message).await?;
        tracing::debug!(method, "MCP notification sent");
        Ok(())
    }

    /// 以同一错误拒绝所有挂起请求，并拒绝之后的新请求
    pub fn fail_pending(&self, err: RpcError) {
        fail_all(&self.pending, err);
    }

    pub fn pending_count(&self) -> usize {
        lock_table(&self.pending).entries.len()
    }

    pub fn closed_reason(&self) -> Option<RpcError> {
        lock_table(&self.pending).closed.clone()
    }

    fn register(&self, id: u64) -> Result<oneshot::Receiver<Result<Value, RpcError>>, RpcError> {
        let mut table = lock_table(&self.pending);
        if let Some(err) = &table.closed {
            return Err(err.clone());
        }
        let (tx, rx) = oneshot::channel();
        table.entries.insert(id, tx);
        Ok(rx)
    }

    fn forget(&self, id: u64) {
        lock_table(&self.pending).entries.remove(&id);
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

fn lock_table(pending: &Mutex<PendingTable>) -> std::sync::MutexGuard<'_, PendingTable> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

fn fail_all(pending: &Mutex<PendingTable>, err: RpcError) {
    let drained: Vec<Responder> = {
        let mut table = lock_table(pending);
        if table.closed.is_none() {
            table.closed = Some(err.clone());
        }
        table.entries.drain().map(|(_, tx)| tx).collect()
    };
    if !drained.is_empty() {
        tracing::warn!(count = drained.len(), error = %err, "rejecting pending MCP requests");
    }
    for tx in drained {
        let _ = tx.send(Err(err.clone()));
    }
}

/// 按 id 结算；服务端发起的请求 / 通知、未知或缺失 id 都忽略
fn dispatch(pending: &Mutex<PendingTable>, message: RpcMessage) {
    if let Some(method) = &message.method {
        tracing::debug!(method = %method, "ignoring server-initiated MCP message");
        return;
    }
    let Some(id) = message.numeric_id() else {
        tracing::debug!("ignoring MCP message without numeric id");
        return;
    };
    let Some(tx) = lock_table(pending).entries.remove(&id) else {
        tracing::debug!(id, "ignoring MCP response for unknown id");
        return;
    };

    let outcome = match message.error {
        Some(error) => Err(RpcError::Server {
            code: error.code,
            message: error.message,
        }),
        None => Ok(message.result.unwrap_or(Value::Null)),
    };
    let _ = tx.send(outcome);
}

async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
    pending: Arc<Mutex<PendingTable>>,
    eof_policy: EofPolicy,
    done: watch::Sender<bool>,
) {
    loop {
        match reader.next_message().await {
            Ok(Some(message)) => dispatch(&pending, message),
            Ok(None) => {
                tracing::debug!("MCP stdout closed");
                if eof_policy == EofPolicy::FailPending {
                    fail_all(&pending, RpcError::Closed);
                }
                break;
            }
            Err(err) => {
                tracing::warn!(error = %err, "MCP connection failed");
                fail_all(&pending, err);
                break;
            }
        }
    }
    let _ = done.send(true);
}

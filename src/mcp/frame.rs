//! 帧传输：`Content-Length: <n>\r\n\r\n<json>`（LSP 风格）
//!
//! 解码器维护一个增长缓冲区：一次读取可能包含多帧，一帧也可能跨多次读取。
//! 缺少 Content-Length 或正文不是合法 JSON 都是致命错误，连接随即作废。

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::core::{FrameError, RpcError};
use crate::mcp::message::RpcMessage;

const SEPARATOR: &[u8] = b"\r\n\r\n";
const READ_CHUNK: usize = 8 * 1024;

/// 编码一帧：头部长度为正文的 UTF-8 字节数，正文后不追加任何分隔符
pub fn encode_frame(message: &RpcMessage) -> Result<Vec<u8>, serde_json::Error> {
    let body = serde_json::to_vec(message)?;
    let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// 增量帧解码器
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// 尚未消费的字节数
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// 取出下一帧；数据不足时返回 Ok(None)，等待更多字节
    pub fn next_frame(&mut self) -> Result<Option<Value>, FrameError> {
        let Some(separator) = find_separator(&self.buffer) else {
            return Ok(None);
        };

        let header = String::from_utf8_lossy(&self.buffer[..separator]);
        let length = parse_content_length(&header)?;
        let start = separator + SEPARATOR.len();
        let end = start
            .checked_add(length)
            .ok_or_else(|| FrameError::InvalidContentLength(length.to_string()))?;

        if self.buffer.len() < end {
            return Ok(None);
        }

        let parsed = serde_json::from_slice::<Value>(&self.buffer[start..end])
            .map_err(|e| FrameError::InvalidJson(e.to_string()));
        self.buffer.drain(..end);
        parsed.map(Some)
    }

    /// 追加一块数据并解出其中所有完整帧
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Vec<Value>, FrameError> {
        self.push(chunk);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

fn find_separator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(SEPARATOR.len())
        .position(|window| window == SEPARATOR)
}

/// 头部按行解析，字段名大小写不敏感，其它头部忽略
fn parse_content_length(header: &str) -> Result<usize, FrameError> {
    for line in header.split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            let value = value.trim();
            return value
                .parse::<usize>()
                .map_err(|_| FrameError::InvalidContentLength(value.to_string()));
        }
    }
    Err(FrameError::MissingContentLength)
}

/// 从字节流读取消息
pub struct FrameReader<R> {
    reader: R,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            decoder: FrameDecoder::new(),
            chunk: vec![0; READ_CHUNK],
        }
    }

    /// 下一条完整消息；流结束返回 Ok(None)，残留的半帧被丢弃
    pub async fn next_message(&mut self) -> Result<Option<RpcMessage>, RpcError> {
        loop {
            if let Some(value) = self.decoder.next_frame()? {
                let message = serde_json::from_value::<RpcMessage>(value)
                    .map_err(|e| FrameError::InvalidJson(e.to_string()))?;
                return Ok(Some(message));
            }

            let n = self
                .reader
                .read(&mut self.chunk)
                .await
                .map_err(|e| RpcError::Transport(e.to_string()))?;
            if n == 0 {
                if self.decoder.buffered() > 0 {
                    tracing::debug!(
                        bytes = self.decoder.buffered(),
                        "MCP stream ended with a partial frame"
                    );
                }
                return Ok(None);
            }
            self.decoder.push(&self.chunk[..n]);
        }
    }
}

/// 向字节流写入消息
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn send(&mut self, message: &RpcMessage) -> Result<(), RpcError> {
        let frame = encode_frame(message).map_err(|e| RpcError::Transport(e.to_string()))?;
        self.writer
            .write_all(&frame)
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接处理模块
//!
//! 每个被接受的连接由一个独立的任务端到端处理：读取并分帧请求报文、解析、
//! 构建并发送响应，最后关闭连接。HTTP/1.0 语义下每个连接只进行一次请求/响应交换。
//!
//! 读取阶段的状态迁移：
//! `READING → (TERMINATED_OK | TOO_LARGE | READ_ERROR)`，另外对端在终止符之前
//! 关闭连接时得到 `Eof`。

use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use log::{debug, error, info, warn};
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    config::Config,
    exception::Exception,
    param::{HttpStatus, RESPONSE_VERSION},
    request::Request,
    response::Response,
    util::{Clock, SystemClock},
};

/// 读取阶段的结束状态。套接字错误通过 `Err` 返回。
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// 读到了 `CRLFCRLF` 或 `LFLF`，携带截至终止符（含）的完整报文
    Terminated(BytesMut),
    /// 报文长度超过 `max_request_size` 仍未出现终止符
    TooLarge,
    /// 对端在终止符之前关闭了连接，携带已读到的字节
    Eof(BytesMut),
}

/// 从连接中读取一个请求报文。
///
/// 每次最多接收 `buffer_size` 字节，逐字节追加到报文缓冲区并检查末尾是否构成终止符，
/// 一旦匹配立即返回，不等待对端关闭连接。终止符之后同批到达的字节被丢弃。
pub async fn read_message<R>(
    stream: &mut R,
    buffer_size: usize,
    max_size: usize,
) -> io::Result<ReadOutcome>
where
    R: AsyncRead + Unpin,
{
    let mut socket_buf = vec![0u8; buffer_size.max(1)];
    let mut message = BytesMut::with_capacity(buffer_size.min(max_size));

    loop {
        let n = stream.read(&mut socket_buf).await?;
        if n == 0 {
            return Ok(ReadOutcome::Eof(message));
        }
        for &byte in &socket_buf[..n] {
            message.put_u8(byte);
            if message.len() > max_size {
                return Ok(ReadOutcome::TooLarge);
            }
            if is_terminated(&message) {
                return Ok(ReadOutcome::Terminated(message));
            }
        }
    }
}

fn is_terminated(message: &[u8]) -> bool {
    message.ends_with(b"\r\n\r\n") || message.ends_with(b"\n\n")
}

/// 处理单个连接直至关闭。连接在函数返回前被关闭且只关闭一次。
pub async fn handle_connection<S>(mut stream: S, id: u128, config: Arc<Config>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    serve_once(&mut stream, id, &config, &SystemClock).await;

    if let Err(e) = stream.shutdown().await {
        debug!("[ID{}]关闭连接时出错：{}", id, e);
    }
    debug!("[ID{}]连接已关闭", id);
}

async fn serve_once<S>(stream: &mut S, id: u128, config: &Config, clock: &dyn Clock)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let outcome = match read_message(
        stream,
        config.socket_buffer_size(),
        config.max_request_size(),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("[ID{}]读取请求时遇到错误：{}", id, e);
            return;
        }
    };

    let (summary, response) = match outcome {
        ReadOutcome::Terminated(message) => {
            debug!("[ID{}]HTTP请求接收完毕，长度：{}", id, message.len());
            match Request::try_from(&message, id) {
                Ok(request) => {
                    let summary = format!(
                        "{} {} {}",
                        request.method(),
                        request.uri(),
                        request.version()
                    );
                    let response = Response::from_request(&request, config, clock, id).await;
                    (summary, response)
                }
                Err(e) => {
                    warn!("[ID{}]解析HTTP请求失败：{}", id, e);
                    let response =
                        Response::from_status(e.status(), false, config, clock, id).await;
                    ("...".to_string(), response)
                }
            }
        }
        ReadOutcome::TooLarge => {
            warn!(
                "[ID{}]请求超过{}字节仍未结束，返回400",
                id,
                config.max_request_size()
            );
            let status = Exception::RequestTooLarge.status();
            let response = Response::from_status(status, false, config, clock, id).await;
            ("...".to_string(), response)
        }
        ReadOutcome::Eof(message) if message.is_empty() => {
            debug!("[ID{}]客户端未发送任何数据即关闭连接", id);
            return;
        }
        ReadOutcome::Eof(message) => {
            warn!(
                "[ID{}]客户端在请求结束前关闭了写端（已收到{}字节），返回400",
                id,
                message.len()
            );
            let response =
                Response::from_status(HttpStatus::BadRequest, false, config, clock, id).await;
            ("...".to_string(), response)
        }
    };

    let response = match response {
        Ok(r) => r,
        Err(e) => {
            error!("[ID{}]无法构建响应，直接关闭连接：{}", id, e);
            return;
        }
    };

    let status = response.status();
    if let Err(e) = response
        .send(stream, config.socket_buffer_size(), id)
        .await
    {
        error!("[ID{}]发送响应失败：{}", id, e);
        return;
    }

    info!(
        "[ID{}] Client: \"{}\" => Server: \"{} {}\"",
        id, summary, RESPONSE_VERSION, status
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        fs,
        pin::Pin,
        task::{Context, Poll},
    };
    use tempfile::TempDir;
    use tokio::io::{duplex, ReadBuf};

    fn setup() -> (TempDir, Arc<Config>) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>index</h1>").unwrap();
        let config = Config::new(dir.path())
            .with_max_request_size(64)
            .with_socket_buffer_size(16)
            .validate()
            .unwrap();
        (dir, Arc::new(config))
    }

    /// 客户端发送 `request` 但不关闭写端，返回服务端写回的全部内容
    async fn exchange(request: &[u8], config: Arc<Config>) -> String {
        let (mut client, server) = duplex(4096);
        let worker = tokio::spawn(handle_connection(server, 1, config));

        client.write_all(request).await.unwrap();
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        worker.await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_read_message_crlf() {
        let mut input: &[u8] = b"GET / HTTP/1.0\r\nHost: a\r\n\r\nleftover";
        let outcome = read_message(&mut input, 4, 1024).await.unwrap();
        assert_eq!(
            outcome,
            ReadOutcome::Terminated(BytesMut::from(&b"GET / HTTP/1.0\r\nHost: a\r\n\r\n"[..]))
        );
    }

    #[tokio::test]
    async fn test_read_message_lf() {
        let mut input: &[u8] = b"GET / HTTP/1.0\n\n";
        let outcome = read_message(&mut input, 1, 1024).await.unwrap();
        assert!(matches!(outcome, ReadOutcome::Terminated(m) if m.len() == 16));
    }

    #[tokio::test]
    async fn test_read_message_too_large() {
        let mut input: &[u8] = &[b'a'; 100];
        let outcome = read_message(&mut input, 8, 64).await.unwrap();
        assert_eq!(outcome, ReadOutcome::TooLarge);
    }

    /// 终止符恰好落在上限处时仍然被接受
    #[tokio::test]
    async fn test_read_message_terminator_at_limit() {
        let msg = b"GET / HTTP/1.0\r\n\r\n";
        let mut input: &[u8] = msg;
        let outcome = read_message(&mut input, 8, msg.len()).await.unwrap();
        assert!(matches!(outcome, ReadOutcome::Terminated(_)));
    }

    /// 终止符只差一个字节就落在上限之内时，同样视为超长
    #[tokio::test]
    async fn test_read_message_terminator_past_limit() {
        let msg = b"GET /a HTTP/1.0\r\n\r\n";
        let mut input: &[u8] = msg;
        let outcome = read_message(&mut input, 8, msg.len() - 1).await.unwrap();
        assert_eq!(outcome, ReadOutcome::TooLarge);

        let msg = b"GET /a HTTP/1.0\n\n";
        let mut input: &[u8] = msg;
        let outcome = read_message(&mut input, 1, msg.len() - 1).await.unwrap();
        assert_eq!(outcome, ReadOutcome::TooLarge);
    }

    #[tokio::test]
    async fn test_read_message_eof() {
        let mut input: &[u8] = b"GET / HTTP/1.0\r\n";
        let outcome = read_message(&mut input, 8, 64).await.unwrap();
        assert_eq!(
            outcome,
            ReadOutcome::Eof(BytesMut::from(&b"GET / HTTP/1.0\r\n"[..]))
        );
    }

    #[tokio::test]
    async fn test_responds_without_waiting_for_close() {
        let (_dir, config) = setup();
        let raw = exchange(b"GET / HTTP/1.0\r\n\r\n", config).await;
        assert!(raw.starts_with("HTTP/1.0 200 OK"));
        assert!(raw.ends_with("<h1>index</h1>"));
    }

    #[tokio::test]
    async fn test_tolerant_lf_request() {
        let (_dir, config) = setup();
        let raw = exchange(b"HEAD /index.html HTTP/1.0\n\n", config).await;
        assert!(raw.starts_with("HTTP/1.0 200 OK"));
        assert!(raw.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_malformed_request_is_400() {
        let (_dir, config) = setup();
        let raw = exchange(b"GET\t/ HTTP/1.0\r\n\r\n", config).await;
        assert!(raw.starts_with("HTTP/1.0 400 Bad Request"));
    }

    #[tokio::test]
    async fn test_too_large_is_400_and_closed() {
        let (_dir, config) = setup();
        let raw = exchange(&[b'G'; 200], config).await;
        assert!(raw.starts_with("HTTP/1.0 400 Bad Request"));
    }

    #[tokio::test]
    async fn test_eof_before_terminator() {
        let (_dir, config) = setup();
        let (mut client, server) = duplex(4096);
        let worker = tokio::spawn(handle_connection(server, 2, config));

        client.write_all(b"GET / HTTP/1.0\r\n").await.unwrap();
        client.shutdown().await.unwrap();
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        worker.await.unwrap();

        assert!(String::from_utf8(out).unwrap().starts_with("HTTP/1.0 400"));
    }

    #[tokio::test]
    async fn test_silent_close_writes_nothing() {
        let (_dir, config) = setup();
        let (mut client, server) = duplex(4096);
        let worker = tokio::spawn(handle_connection(server, 3, config));

        client.shutdown().await.unwrap();
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        worker.await.unwrap();

        assert!(out.is_empty());
    }

    /// 读取即失败、写入全部记录的连接
    struct BrokenStream {
        written: Vec<u8>,
        shutdowns: usize,
    }

    impl AsyncRead for BrokenStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
        }
    }

    impl AsyncWrite for BrokenStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.written.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.shutdowns += 1;
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_read_error_writes_nothing_and_closes_once() {
        let (_dir, config) = setup();
        let mut stream = BrokenStream {
            written: Vec::new(),
            shutdowns: 0,
        };

        handle_connection(&mut stream, 4, config).await;

        assert!(stream.written.is_empty());
        assert_eq!(stream.shutdowns, 1);
    }
}

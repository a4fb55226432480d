// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 监听模块
//!
//! 绑定 `0.0.0.0:<port>` 并循环接受连接，每个连接交给一个新的 Tokio 任务处理，
//! 监听循环本身从不等待任何连接任务。

use std::{
    fmt, io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    sync::Arc,
    time::Duration,
};

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpSocket};

use crate::{config::Config, connection::handle_connection};

/// listen 队列长度，内核会将其截断到系统上限
const LISTEN_BACKLOG: u32 = i32::MAX as u32;

/// 暂时性 accept 错误之后的退避时间，避免在文件描述符耗尽时空转
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// 会终止监听循环的错误
#[derive(Debug)]
pub enum ServerError {
    /// 绑定或监听端口失败
    Bind { port: u16, source: io::Error },
    /// 监听套接字本身已不可用
    Accept(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Bind { port, source } => write!(f, "无法绑定端口{}：{}", port, source),
            ServerError::Accept(e) => write!(f, "监听套接字出现致命错误：{}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind { source, .. } => Some(source),
            ServerError::Accept(e) => Some(e),
        }
    }
}

/// 服务入口：绑定配置中的端口并运行监听循环，只在出现致命错误时返回
pub async fn serve(config: Arc<Config>) -> Result<(), ServerError> {
    let listener = bind(config.port())?;
    info!("端口{}绑定完成", config.port());
    run(listener, config).await
}

/// 在 `0.0.0.0:<port>` 上绑定并监听，失败时不重试
pub fn bind(port: u16) -> Result<TcpListener, ServerError> {
    let address = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    let to_error = |source: io::Error| ServerError::Bind { port, source };

    let socket = TcpSocket::new_v4().map_err(to_error)?;
    socket.set_reuseaddr(true).map_err(to_error)?;
    socket.bind(address).map_err(to_error)?;
    socket.listen(LISTEN_BACKLOG).map_err(to_error)
}

/// 在已经绑定好的监听器上运行 accept 循环
pub async fn run(listener: TcpListener, config: Arc<Config>) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!("服务端开始在{}上接受连接", addr);
    }

    let mut id: u128 = 0;
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("[ID{}]新的连接：{}", id, addr);
                tokio::spawn(handle_connection(stream, id, Arc::clone(&config)));
                id += 1;
            }
            Err(e) if is_fatal_accept_error(&e) => {
                error!("accept 失败，停止监听：{}", e);
                return Err(ServerError::Accept(e));
            }
            Err(e) => {
                warn!("accept 暂时失败，继续监听：{}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

/// 只有监听套接字本身失效才是致命的；中断、连接被重置、资源暂时耗尽等都继续循环
fn is_fatal_accept_error(e: &io::Error) -> bool {
    if let Some(code) = e.raw_os_error() {
        return is_fatal_errno(code);
    }
    matches!(
        e.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::Unsupported | io::ErrorKind::NotConnected
    )
}

/// EBADF / ENOTSOCK 在标准库中没有对应的 `ErrorKind`，只能按 errno 判断
#[cfg(unix)]
fn is_fatal_errno(code: i32) -> bool {
    matches!(
        code,
        libc::EBADF | libc::ENOTSOCK | libc::EINVAL | libc::EOPNOTSUPP | libc::EFAULT
    )
}

#[cfg(not(unix))]
fn is_fatal_errno(code: i32) -> bool {
    matches!(
        io::Error::from_raw_os_error(code).kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::Unsupported | io::ErrorKind::NotConnected
    )
}

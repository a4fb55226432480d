// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应构建模块
//!
//! 根据解析好的请求和文件系统元数据构建状态行、响应头和响应体，并写回连接。
//! 所有失败路径都汇入 [`Response::from_status`]，优先使用 `_errors/<code>.html`
//! 作为错误页，找不到时使用内置的 HTML 页面。

use crate::{
    config::Config,
    exception::Exception,
    param::*,
    request::Request,
    resolver::{resolve, Resource},
    util::{http_date, Clock, HtmlBuilder},
};

use bytes::Bytes;
use log::{debug, error, warn};
use tokio::{
    fs::File,
    io::{self, AsyncReadExt, AsyncWrite, AsyncWriteExt},
};

use std::path::Path;

/// 响应体
#[derive(Debug)]
pub enum Body {
    /// 不发送响应体（HEAD 请求）
    Empty,
    /// 服务器生成的内容
    Static(Bytes),
    /// 分块流式发送的文件
    File(File),
}

#[derive(Debug)]
pub struct Response {
    status: HttpStatus,
    date: String,
    content_type: &'static str,
    content_length: u64,
    last_modified: Option<String>,
    body: Body,
}

impl Response {
    /// 为请求构建响应。任何失败都会转换成对应的错误响应；
    /// 只有连错误响应都无法构建（`Date` 无法格式化）时才返回 `Err`。
    pub async fn from_request(
        request: &Request,
        config: &Config,
        clock: &dyn Clock,
        id: u128,
    ) -> Result<Self, Exception> {
        if request.version().parse::<HttpVersion>().is_err() {
            let e = Exception::UnsupportedHttpVersion;
            warn!("[ID{}]{}，返回{}", id, e, e.status().code());
            return Self::from_status(e.status(), false, config, clock, id).await;
        }

        let method = match request.method().parse::<HttpRequestMethod>() {
            Ok(m) => m,
            Err(_) => {
                let e = Exception::UnsupportedRequestMethod;
                warn!("[ID{}]{}，返回{}", id, e, e.status().code());
                return Self::from_status(e.status(), false, config, clock, id).await;
            }
        };
        let headonly = method == HttpRequestMethod::Head;

        let resource = match resolve(request.doc_path(), config.www_root()).await {
            Ok(r) => r,
            Err(e) => {
                warn!("[ID{}]路径解析失败：{}", id, e);
                return Self::from_status(e.status(), headonly, config, clock, id).await;
            }
        };
        debug!("[ID{}]映射物理路径：{}", id, resource.path().display());

        match Self::from_file(&resource, request.doc_path(), headonly, clock, id).await {
            Ok(response) => Ok(response),
            Err(e) => {
                error!("[ID{}]构建文件响应失败：{}", id, e);
                Self::from_status(e.status(), headonly, config, clock, id).await
            }
        }
    }

    async fn from_file(
        resource: &Resource,
        doc_path: &Path,
        headonly: bool,
        clock: &dyn Clock,
        id: u128,
    ) -> Result<Self, Exception> {
        let date = http_date(clock.now()).ok_or(Exception::Internal)?;
        let last_modified = resource
            .metadata()
            .modified()
            .and_then(http_date)
            .ok_or(Exception::Internal)?;
        let content_type = get_mime(&doc_path.to_string_lossy());
        debug!("[ID{}]Content-Type: {}", id, content_type);

        let body = match headonly {
            true => Body::Empty,
            false => match File::open(resource.path()).await {
                Ok(f) => Body::File(f),
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    return Err(Exception::Forbidden)
                }
                Err(e) => {
                    error!("[ID{}]无法打开文件{}：{}", id, resource.path().display(), e);
                    return Err(Exception::Internal);
                }
            },
        };

        Ok(Self {
            status: HttpStatus::Ok,
            date,
            content_type,
            content_length: resource.metadata().size(),
            last_modified: Some(last_modified),
            body,
        })
    }

    /// 构建错误响应。`headonly` 为真时只保留响应头。
    pub async fn from_status(
        status: HttpStatus,
        headonly: bool,
        config: &Config,
        clock: &dyn Clock,
        id: u128,
    ) -> Result<Self, Exception> {
        let date = match http_date(clock.now()) {
            Some(d) => d,
            None => {
                error!("[ID{}]无法格式化Date头，放弃发送{}响应", id, status.code());
                return Err(Exception::Internal);
            }
        };

        let (content_length, body) = match open_error_page(config.www_root(), status).await {
            Some((file, len)) => (len, Body::File(file)),
            None => {
                debug!("[ID{}]未找到{}的自定义错误页，使用内置页面", id, status.code());
                let html = Bytes::from(HtmlBuilder::from_status(status).build());
                (html.len() as u64, Body::Static(html))
            }
        };

        Ok(Self {
            status,
            date,
            content_type: MIME_HTML,
            content_length,
            last_modified: None,
            body: match headonly {
                true => Body::Empty,
                false => body,
            },
        })
    }

    /// 状态行与响应头，包含结尾的空行
    pub fn header_bytes(&self) -> Vec<u8> {
        let status_code: &str = &self.status.code().to_string();
        let content_length: &str = &self.content_length.to_string();

        [
            RESPONSE_VERSION,
            " ",
            status_code,
            " ",
            self.status.reason(),
            CRLF,
            "Date: ",
            &self.date,
            CRLF,
            "Content-Type: ",
            self.content_type,
            CRLF,
            "Content-Length: ",
            content_length,
            CRLF,
            match &self.last_modified {
                Some(t) => ["Last-Modified: ", t, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            "Server: ",
            SERVER_NAME,
            CRLF,
            CRLF,
        ]
        .concat()
        .into_bytes()
    }

    /// 写出响应头与响应体。文件以 `chunk_size` 为单位分块读取并发送，
    /// 任何写失败都立即中止，不做补救。
    pub async fn send<W>(self, stream: &mut W, chunk_size: usize, id: u128) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        stream.write_all(&self.header_bytes()).await?;

        match self.body {
            Body::Empty => {}
            Body::Static(bytes) => stream.write_all(&bytes).await?,
            Body::File(mut file) => {
                let mut buffer = vec![0u8; chunk_size.max(1)];
                let mut total_sent = 0u64;
                loop {
                    let n = file.read(&mut buffer).await?;
                    if n == 0 {
                        break;
                    }
                    stream.write_all(&buffer[..n]).await?;
                    total_sent += n as u64;
                }
                debug!("[ID{}]流式传输完成，共发送 {} 字节", id, total_sent);
            }
        }
        stream.flush().await
    }
}

impl Response {
    pub fn status(&self) -> HttpStatus {
        self.status
    }

    pub fn content_type(&self) -> &str {
        self.content_type
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn has_body(&self) -> bool {
        !matches!(self.body, Body::Empty)
    }
}

/// 打开 `_errors/<code>.html`，返回文件句柄和长度
async fn open_error_page(root: &Path, status: HttpStatus) -> Option<(File, u64)> {
    let path = root.join(ERROR_DIR).join(format!("{}.html", status.code()));
    let file = File::open(&path).await.ok()?;
    let metadata = file.metadata().await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    Some((file, metadata.len()))
}

/// 根据文档路径最后一段的后缀确定 MIME 类型。
/// 没有后缀的文件按 HTML 处理，无法识别的后缀按二进制流处理。
pub fn get_mime(doc_path: &str) -> &'static str {
    let name = doc_path.rsplit('/').next().unwrap_or(doc_path);
    match name.rfind('.') {
        None => MIME_HTML,
        Some(i) => MIME_TYPES.get(&name[i + 1..]).copied().unwrap_or(MIME_DEFAULT),
    }
}

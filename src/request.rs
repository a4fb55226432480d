// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 该模块负责将连接上读到的完整请求报文解析为 `Request` 结构体。它涵盖了：
//! 1. 请求行（Request-Line）的逐字节解析（方法、URI、版本）。
//! 2. URI 的百分号解码。
//! 3. 从 URI 推导文档路径（去掉 scheme / authority / 查询串，补全 `index.html`）。
//!
//! 请求头字段不做解析。`..` 的规范化与根目录约束由 `resolver` 模块负责。

use crate::{
    exception::Exception,
    param::{INDEX_FILE, MAX_PATH_LEN},
};
use log::debug;
use std::path::{Path, PathBuf};

/// 一次请求/响应交换中解析出的请求。
///
/// 方法与版本保留请求行中的原始文本，是否受支持由响应构建阶段判断，
/// 这样 `POST` 会得到 501 而不是 400。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// 请求方法原文
    method: String,
    /// 未解码的请求 URI
    uri: String,
    /// 协议版本原文
    version: String,
    /// 解码后的文档路径，总是以 `/` 开头。按字节保存，不要求是 UTF-8
    doc_path: PathBuf,
}

/// 请求行的三个字段，借用自原始报文
#[derive(Debug, PartialEq, Eq)]
pub struct RequestLine<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub version: &'a str,
}

impl Request {
    /// 从原始报文构建 `Request`。
    ///
    /// # 参数
    /// * `buffer` - 连接工作者读到的完整报文（含终止符）。
    /// * `id` - 连接 ID，仅用于日志追踪。
    ///
    /// # 错误处理
    /// 请求行格式错误、URI 转义非法或路径过长时返回对应的 `Exception`，
    /// 上层统一转换为 400 响应。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let (line, header_offset) = parse_request_line(buffer)?;
        debug!(
            "[ID{}]请求行解析完毕，请求头起始偏移：{}",
            id, header_offset
        );

        let decoded = uri_decode(line.uri)?;
        if decoded.contains(&0) {
            return Err(Exception::BadPercentEncoding);
        }
        let doc_path = path_from_bytes(doc_path_from_uri(&decoded)?)?;
        debug!("[ID{}]文档路径：{}", id, doc_path.display());

        Ok(Self {
            method: line.method.to_string(),
            uri: line.uri.to_string(),
            version: line.version.to_string(),
            doc_path,
        })
    }
}

impl Request {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn doc_path(&self) -> &Path {
        &self.doc_path
    }
}

/// 逐字节扫描请求行，返回三个字段以及请求头字段的起始偏移。
///
/// 规则：
/// - 首字符必须是 ASCII 字母；
/// - 字段之间以空格分隔（允许连续空格），必须恰好三个字段；
/// - 行内出现 `\t`、`\v`、`\f` 即视为非法；
/// - 行以 CRLF 或单独的 LF 结束。
pub fn parse_request_line(buffer: &[u8]) -> Result<(RequestLine<'_>, usize), Exception> {
    match buffer.first() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(Exception::MalformedRequestLine),
    }

    let line_end = buffer
        .iter()
        .position(|&c| c == b'\n' || c == b'\r')
        .ok_or(Exception::MalformedRequestLine)?;
    let header_offset = match buffer[line_end] {
        b'\r' if buffer.get(line_end + 1) == Some(&b'\n') => line_end + 2,
        b'\n' => line_end + 1,
        _ => return Err(Exception::MalformedRequestLine),
    };

    let line = &buffer[..line_end];
    if line.iter().any(|&c| matches!(c, b'\t' | 0x0b | 0x0c)) {
        return Err(Exception::MalformedRequestLine);
    }
    let line = std::str::from_utf8(line).map_err(|_| Exception::MalformedRequestLine)?;

    let mut tokens = line.split(' ').filter(|t| !t.is_empty());
    let (method, uri, version) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(m), Some(u), Some(v)) => (m, u, v),
        _ => return Err(Exception::MalformedRequestLine),
    };
    if tokens.next().is_some() {
        return Err(Exception::MalformedRequestLine);
    }

    Ok((
        RequestLine {
            method,
            uri,
            version,
        },
        header_offset,
    ))
}

/// 百分号解码：`%XX` 还原为对应字节，`+` 还原为空格。
pub fn uri_decode(src: &str) -> Result<Vec<u8>, Exception> {
    let bytes = src.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hi = bytes.get(i + 1).and_then(|&b| hex_value(b));
                let lo = bytes.get(i + 2).and_then(|&b| hex_value(b));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => out.push(hi << 4 | lo),
                    _ => return Err(Exception::BadPercentEncoding),
                }
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Ok(out)
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// 从解码后的 URI 推导文档路径。
///
/// - 第一个 `?` 之后的查询串被丢弃；
/// - `http://` / `https://` 的 scheme 与 authority 被去掉，只保留路径；
/// - 没有剩余路径时视为 `/`；
/// - 路径以 `/` 结尾时补全 `index.html`。
///
/// 解码结果可能不是合法的 UTF-8（例如 Latin-1 文件名），因此整个过程按字节进行。
pub fn doc_path_from_uri(uri: &[u8]) -> Result<Vec<u8>, Exception> {
    let uri = match uri.iter().position(|&b| b == b'?') {
        Some(i) => &uri[..i],
        None => uri,
    };

    let after_authority = |rest: &[u8]| -> Vec<u8> {
        match rest.iter().position(|&b| b == b'/') {
            Some(i) => rest[i..].to_vec(),
            None => b"/".to_vec(),
        }
    };

    let mut path = if let Some(rest) = uri.strip_prefix(b"http://") {
        after_authority(rest)
    } else if let Some(rest) = uri.strip_prefix(b"https://") {
        after_authority(rest)
    } else if uri.starts_with(b"/") {
        uri.to_vec()
    } else {
        // 没有 scheme 的主机名形式，例如 `www.example.com/a.html`
        after_authority(uri)
    };

    if path.ends_with(b"/") {
        path.extend_from_slice(INDEX_FILE.as_bytes());
    }
    if path.len() > MAX_PATH_LEN {
        return Err(Exception::PathTooLong);
    }
    Ok(path)
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> Result<PathBuf, Exception> {
    use std::{ffi::OsString, os::unix::ffi::OsStringExt};
    Ok(PathBuf::from(OsString::from_vec(bytes)))
}

/// 非 Unix 平台的路径必须是 UTF-8
#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> Result<PathBuf, Exception> {
    String::from_utf8(bytes)
        .map(PathBuf::from)
        .map_err(|_| Exception::BadPercentEncoding)
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Web 服务器协议参数与常量模块
//!
//! 该模块定义了 `static-httpd` 遵循的 HTTP/1.0 协议相关常量和数据结构，包括：
//! - 服务器实现的状态码及其原因短语（Reason Phrase）。
//! - 固定的后缀名到 MIME 类型映射表。
//! - HTTP 方法、版本的强类型枚举。

use lazy_static::lazy_static;
use std::{collections::HashMap, fmt, str::FromStr};

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "static-httpd";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 响应状态行中使用的协议版本，无论客户端声明的是哪个版本
pub const RESPONSE_VERSION: &str = "HTTP/1.0";

/// 目录请求默认补全的文件名
pub const INDEX_FILE: &str = "index.html";

/// 存放自定义错误页的保留目录，客户端不可直接访问
pub const ERROR_DIR: &str = "_errors";

/// 文档路径的最大长度（与 Linux 的 PATH_MAX 一致）
pub const MAX_PATH_LEN: usize = 4096;

/// 无后缀文件使用的 MIME 类型
pub const MIME_HTML: &str = "text/html";

/// 无法识别的后缀使用的 MIME 类型
pub const MIME_DEFAULT: &str = "application/octet-stream";

/// Date / Last-Modified 头使用的时间格式（RFC 1123）
pub const HTTP_DATETIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

lazy_static! {
    /// 文件后缀名到 MIME 类型（Media Type）的映射表。
    ///
    /// 表之外的后缀一律回落到 `application/octet-stream`。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("txt", "text/plain");
        map.insert("htm", "text/html");
        map.insert("html", "text/html");
        map.insert("css", "text/css");
        map.insert("ico", "image/x-icon");
        map.insert("jpeg", "image/jpeg");
        map.insert("jpg", "image/jpeg");
        map.insert("png", "image/png");
        map.insert("gif", "image/gif");
        map.insert("js", "application/javascript");
        map.insert("xml", "application/xml");
        map.insert("bin", "application/octet-stream");
        map
    };
}

/// 服务器实现的全部状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok,
    BadRequest,
    Forbidden,
    NotFound,
    InternalServerError,
    NotImplemented,
}

impl HttpStatus {
    pub fn code(&self) -> u16 {
        match self {
            HttpStatus::Ok => 200,
            HttpStatus::BadRequest => 400,
            HttpStatus::Forbidden => 403,
            HttpStatus::NotFound => 404,
            HttpStatus::InternalServerError => 500,
            HttpStatus::NotImplemented => 501,
        }
    }

    /// 状态码对应的标准原因短语
    pub fn reason(&self) -> &'static str {
        match self {
            HttpStatus::Ok => "OK",
            HttpStatus::BadRequest => "Bad Request",
            HttpStatus::Forbidden => "Forbidden",
            HttpStatus::NotFound => "Not Found",
            HttpStatus::InternalServerError => "Internal Server Error",
            HttpStatus::NotImplemented => "Not Implemented",
        }
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// 服务器能够处理的 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRequestMethod {
    /// 获取资源
    Get,
    /// 获取资源的元数据（不包含响应体）
    Head,
}

impl FromStr for HttpRequestMethod {
    type Err = ();

    /// 方法名区分大小写，`get` 不是合法的 GET 请求
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpRequestMethod::Get),
            "HEAD" => Ok(HttpRequestMethod::Head),
            _ => Err(()),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
        }
    }
}

/// 请求行中可以接受的协议版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    V1_0,
    V1_1,
    V2_0,
}

impl FromStr for HttpVersion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HTTP/1.0" => Ok(HttpVersion::V1_0),
            "HTTP/1.1" => Ok(HttpVersion::V1_1),
            "HTTP/2.0" => Ok(HttpVersion::V2_0),
            _ => Err(()),
        }
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_0 => write!(f, "HTTP/1.0"),
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
            HttpVersion::V2_0 => write!(f, "HTTP/2.0"),
        }
    }
}

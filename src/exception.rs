// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了 Web 服务器在单个连接的处理生命周期中可能出现的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖协议解析错误、资源（文件系统）错误以及内部错误。
//! - **语义映射**：每个变体通过 [`Exception::status`] 对应到一个固定的 HTTP 状态码。
//! - **不回显输入**：`Display` 输出只包含固定文本，不会夹带客户端发送的任何内容。

use std::fmt;

use crate::param::HttpStatus;

/// 服务器处理请求过程中发生的异常类型。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 请求行格式不正确：首字符不是字母、缺少字段、字段过多或包含非法空白符。
    MalformedRequestLine,
    /// URI 中存在非法的百分号转义（例如 `%zz` 或末尾孤立的 `%`）。
    BadPercentEncoding,
    /// 解析得到的文档路径超过了 `MAX_PATH_LEN`。
    PathTooLong,
    /// 请求报文在出现终止符之前就超过了 `max_request_size`。
    RequestTooLarge,
    /// 客户端使用了服务器不认识的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 客户端使用了 GET / HEAD 之外的方法。
    UnsupportedRequestMethod,
    /// 请求的资源不存在。
    FileNotFound,
    /// 没有访问权限、路径逃逸出文档根目录或访问了保留目录。
    Forbidden,
    /// 路径无法被规范化（除“不存在”和“无权限”外的其他系统错误）。
    InvalidPath,
    /// 意料之外的 stat / 读文件 / 日期格式化失败。
    Internal,
}

use Exception::*;

impl Exception {
    /// 异常对应的 HTTP 响应状态
    pub fn status(&self) -> HttpStatus {
        match self {
            MalformedRequestLine
            | BadPercentEncoding
            | PathTooLong
            | RequestTooLarge
            | UnsupportedHttpVersion
            | InvalidPath => HttpStatus::BadRequest,
            UnsupportedRequestMethod => HttpStatus::NotImplemented,
            FileNotFound => HttpStatus::NotFound,
            Forbidden => HttpStatus::Forbidden,
            Internal => HttpStatus::InternalServerError,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedRequestLine => write!(f, "Malformed Request-Line"),
            BadPercentEncoding => write!(f, "Bad percent-encoding in URI"),
            PathTooLong => write!(f, "Document path too long"),
            RequestTooLarge => write!(f, "Request message too large"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            UnsupportedRequestMethod => write!(f, "Unsupported request method"),
            FileNotFound => write!(f, "File not found (404)"),
            Forbidden => write!(f, "Forbidden (403)"),
            InvalidPath => write!(f, "Invalid path (400)"),
            Internal => write!(f, "Internal server error (500)"),
        }
    }
}

impl std::error::Error for Exception {}

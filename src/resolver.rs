// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路径解析模块
//!
//! 把请求中的文档路径映射为文档根目录下的真实文件：
//! 规范化（跟随符号链接、折叠 `.` 与 `..`）之后必须仍位于根目录之内，
//! 并且不能落在保留的错误页目录中。

use std::{
    io,
    path::{Component, Path, PathBuf},
    time::SystemTime,
};

use log::debug;
use tokio::fs;

use crate::{exception::Exception, param::ERROR_DIR};

/// 对解析结果执行 stat 得到的元数据，每次请求重新获取，不做缓存
#[derive(Debug, Clone)]
pub struct ResourceMetadata {
    size: u64,
    modified: Option<SystemTime>,
    is_file: bool,
}

impl ResourceMetadata {
    pub fn new(size: u64, modified: Option<SystemTime>, is_file: bool) -> Self {
        Self {
            size,
            modified,
            is_file,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// 文件的最后修改时间，平台不支持时为 `None`
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn is_file(&self) -> bool {
        self.is_file
    }
}

impl From<std::fs::Metadata> for ResourceMetadata {
    fn from(metadata: std::fs::Metadata) -> Self {
        Self::new(metadata.len(), metadata.modified().ok(), metadata.is_file())
    }
}

/// 解析成功的资源：规范化后的绝对路径及其元数据
#[derive(Debug, Clone)]
pub struct Resource {
    path: PathBuf,
    metadata: ResourceMetadata,
}

impl Resource {
    pub fn new(path: PathBuf, metadata: ResourceMetadata) -> Self {
        Self { path, metadata }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }
}

/// 将文档路径解析到 `root` 之下。`root` 必须已经是规范化的绝对路径。
///
/// 错误映射：
/// - 规范化失败：不存在 → 404，无权限 → 403，其它系统错误 → 400；
/// - 逃逸出根目录或进入 `_errors/` → 403；
/// - stat 失败：不存在 → 404，无权限 → 403，非法参数 → 400，其它 → 500；
/// - 目标不是普通文件 → 404。
pub async fn resolve(doc_path: impl AsRef<Path>, root: &Path) -> Result<Resource, Exception> {
    // 去掉根分量，剩余部分（含 `..`）交给规范化处理
    let relative: PathBuf = doc_path
        .as_ref()
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    let joined = root.join(relative);

    let canonical = match fs::canonicalize(&joined).await {
        Ok(path) => path,
        Err(e) => {
            debug!("规范化路径{}失败：{}", joined.display(), e);
            return Err(canonicalize_error(&e));
        }
    };

    if !canonical.starts_with(root) {
        debug!("路径{}逃逸出文档根目录", canonical.display());
        return Err(Exception::Forbidden);
    }
    if canonical.starts_with(root.join(ERROR_DIR)) {
        debug!("拒绝直接访问保留目录：{}", canonical.display());
        return Err(Exception::Forbidden);
    }

    let metadata = match fs::metadata(&canonical).await {
        Ok(m) => ResourceMetadata::from(m),
        Err(e) => {
            debug!("stat {}失败：{}", canonical.display(), e);
            return Err(stat_error(&e));
        }
    };
    if !metadata.is_file() {
        return Err(Exception::FileNotFound);
    }

    Ok(Resource::new(canonical, metadata))
}

fn canonicalize_error(e: &io::Error) -> Exception {
    match e.kind() {
        io::ErrorKind::NotFound => Exception::FileNotFound,
        io::ErrorKind::PermissionDenied => Exception::Forbidden,
        _ => Exception::InvalidPath,
    }
}

fn stat_error(e: &io::Error) -> Exception {
    match e.kind() {
        io::ErrorKind::NotFound => Exception::FileNotFound,
        io::ErrorKind::PermissionDenied => Exception::Forbidden,
        io::ErrorKind::InvalidInput => Exception::InvalidPath,
        _ => Exception::Internal,
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 配置模块
//!
//! 从 TOML 文件读取服务器配置，并在启动前完成一次性校验。
//! 校验通过后的 `Config` 会被包装进 `Arc`，在进程生命周期内只读共享。

use log::{info, warn};
use serde_derive::Deserialize;

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use crate::param::INDEX_FILE;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    www_root: PathBuf,
    port: u16,
    #[serde(default = "default_socket_buffer_size")]
    socket_buffer_size: usize,
    #[serde(default = "default_max_request_size")]
    max_request_size: usize,
    #[serde(default)]
    worker_threads: usize,
}

fn default_socket_buffer_size() -> usize {
    8192 // 8KB
}

fn default_max_request_size() -> usize {
    8192 // 8KB，大多数 Web 服务器的请求头上限
}

/// 配置加载与校验阶段的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件无法读取
    Io { path: PathBuf, source: io::Error },
    /// 配置文件不是合法的 TOML，或字段类型不匹配
    Parse(toml::de::Error),
    /// 文档根目录无法规范化或无法读取
    RootUnreadable { path: PathBuf, source: io::Error },
    /// 文档根目录不是目录
    RootNotDirectory(PathBuf),
    /// 文档根目录下缺少可读的 index.html
    IndexMissing(PathBuf),
    /// 某个缓冲区大小被设置为 0
    ZeroSize(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "无法读取配置文件{}：{}", path.display(), source)
            }
            ConfigError::Parse(e) => write!(f, "配置文件格式错误：{}", e),
            ConfigError::RootUnreadable { path, source } => {
                write!(f, "文档根目录{}不可用：{}", path.display(), source)
            }
            ConfigError::RootNotDirectory(path) => {
                write!(f, "文档根目录{}不是目录", path.display())
            }
            ConfigError::IndexMissing(path) => {
                write!(f, "缺少可读的首页文件{}", path.display())
            }
            ConfigError::ZeroSize(name) => write!(f, "{}不能为0", name),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } | ConfigError::RootUnreadable { source, .. } => {
                Some(source)
            }
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl Config {
    /// 使用默认参数构造配置，主要供测试和嵌入式使用
    pub fn new(www_root: impl Into<PathBuf>) -> Self {
        Self {
            www_root: www_root.into(),
            port: 7878,
            socket_buffer_size: default_socket_buffer_size(),
            max_request_size: default_max_request_size(),
            worker_threads: num_cpus::get(),
        }
    }

    pub fn from_toml(filename: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let filename = filename.as_ref();
        let str_val = fs::read_to_string(filename).map_err(|source| ConfigError::Io {
            path: filename.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&str_val)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let mut raw_config: Config = toml::from_str(s)?;
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        Ok(raw_config)
    }

    /// 启动前校验：
    /// 1. 文档根目录替换为规范化后的绝对路径，并确认它是可读目录；
    /// 2. 根目录下必须存在可读的 `index.html`；
    /// 3. 缓冲区大小不能为 0。
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.socket_buffer_size == 0 {
            return Err(ConfigError::ZeroSize("socket_buffer_size"));
        }
        if self.max_request_size == 0 {
            return Err(ConfigError::ZeroSize("max_request_size"));
        }

        let root = fs::canonicalize(&self.www_root).map_err(|source| {
            ConfigError::RootUnreadable {
                path: self.www_root.clone(),
                source,
            }
        })?;
        if !root.is_dir() {
            return Err(ConfigError::RootNotDirectory(root));
        }
        fs::read_dir(&root).map_err(|source| ConfigError::RootUnreadable {
            path: root.clone(),
            source,
        })?;
        info!("文档根目录{}检查通过（存在且可读）", root.display());

        let index = root.join(INDEX_FILE);
        match fs::File::open(&index) {
            Ok(_) if index.is_file() => {
                info!("首页文件{}检查通过（存在且可读）", index.display());
            }
            Ok(_) => return Err(ConfigError::IndexMissing(index)),
            Err(e) => {
                warn!("无法打开首页文件{}：{}", index.display(), e);
                return Err(ConfigError::IndexMissing(index));
            }
        }

        self.www_root = root;
        Ok(self)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_max_request_size(mut self, size: usize) -> Self {
        self.max_request_size = size;
        self
    }

    pub fn with_socket_buffer_size(mut self, size: usize) -> Self {
        self.socket_buffer_size = size;
        self
    }
}

impl Config {
    pub fn www_root(&self) -> &Path {
        &self.www_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_buffer_size(&self) -> usize {
        self.socket_buffer_size
    }

    pub fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn root_with_index() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();
        dir
    }

    #[test]
    fn test_from_toml_defaults() {
        let config = Config::from_toml_str(
            r#"
            www_root = "./www"
            port = 8080
            "#,
        )
        .unwrap();

        assert_eq!(config.port(), 8080);
        assert_eq!(config.www_root(), Path::new("./www"));
        assert_eq!(config.socket_buffer_size(), 8192);
        assert_eq!(config.max_request_size(), 8192);
        assert!(config.worker_threads() > 0);
    }

    #[test]
    fn test_from_toml_overrides() {
        let config = Config::from_toml_str(
            r#"
            www_root = "/srv/www"
            port = 80
            socket_buffer_size = 1024
            max_request_size = 2048
            worker_threads = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.socket_buffer_size(), 1024);
        assert_eq!(config.max_request_size(), 2048);
        assert_eq!(config.worker_threads(), 3);
    }

    #[test]
    fn test_from_toml_bad_port() {
        let result = Config::from_toml_str("www_root = \"/\"\nport = 70000\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_toml_missing_file() {
        let result = Config::from_toml("/definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_validate_canonicalizes_root() {
        let dir = root_with_index();
        let nested = dir.path().join("sub");
        fs::create_dir(&nested).unwrap();
        let indirect = nested.join("..");

        let config = Config::new(&indirect).validate().unwrap();

        assert_eq!(config.www_root(), fs::canonicalize(dir.path()).unwrap());
        assert!(config.www_root().is_absolute());
    }

    #[test]
    fn test_validate_requires_index() {
        let dir = TempDir::new().unwrap();
        let result = Config::new(dir.path()).validate();
        assert!(matches!(result, Err(ConfigError::IndexMissing(_))));
    }

    #[test]
    fn test_validate_rejects_missing_root() {
        let result = Config::new("/definitely/not/a/root").validate();
        assert!(matches!(result, Err(ConfigError::RootUnreadable { .. })));
    }

    #[test]
    fn test_validate_rejects_file_root() {
        let dir = root_with_index();
        let result = Config::new(dir.path().join("index.html")).validate();
        assert!(matches!(result, Err(ConfigError::RootNotDirectory(_))));
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let dir = root_with_index();
        let result = Config::new(dir.path()).with_max_request_size(0).validate();
        assert!(matches!(result, Err(ConfigError::ZeroSize("max_request_size"))));

        let result = Config::new(dir.path()).with_socket_buffer_size(0).validate();
        assert!(matches!(result, Err(ConfigError::ZeroSize("socket_buffer_size"))));
    }
}

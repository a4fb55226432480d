// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP/1.0 静态文件服务器
//!
//! 程序入口：初始化日志、加载并校验配置、构建 Tokio 运行时并启动监听循环。
//! 进程只会因为配置错误或监听端口的致命错误而退出。

use httpd::{config::Config, server};

use log::{error, info, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Config as LogConfig, Root},
    encode::pattern::PatternEncoder,
};
use tokio::runtime::Builder;

use std::{env, process, sync::Arc};

const LOG_CONFIG: &str = "config/log4rs.yaml";
const DEFAULT_CONFIG: &str = "config/development.toml";

fn main() {
    // 1. 日志系统：优先使用 YAML 配置，缺失时退回到仅输出到控制台
    init_logging();

    // 2. 配置加载与启动前校验，第一个命令行参数可以指定配置文件路径
    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = match Config::from_toml(&config_path).and_then(Config::validate) {
        Ok(c) => c,
        Err(e) => {
            error!("配置文件{}无效：{}", config_path, e);
            process::exit(1);
        }
    };
    info!("配置文件已载入：{}", config_path);
    info!("www root: {}", config.www_root().display());

    // 3. 异步运行时：根据配置分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            process::exit(1);
        }
    };

    // 4. 配置从此只读共享
    let config = Arc::new(config);
    info!("服务端将在0.0.0.0:{}上监听Socket连接", config.port());
    if let Err(e) = runtime.block_on(server::serve(config)) {
        error!("{}", e);
        process::exit(1);
    }
}

fn init_logging() {
    let err = match log4rs::init_file(LOG_CONFIG, Default::default()) {
        Ok(()) => return,
        Err(e) => e,
    };

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {m}{n}",
        )))
        .build();
    let fallback = LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));

    match fallback {
        Ok(cfg) => {
            if let Err(e) = log4rs::init_config(cfg) {
                eprintln!("无法初始化日志系统：{}", e);
                return;
            }
            log::warn!("无法载入{}（{}），日志仅输出到控制台", LOG_CONFIG, err);
        }
        Err(e) => eprintln!("无法初始化日志系统：{}", e),
    }
}

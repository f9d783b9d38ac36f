// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 配置模块
//!
//! 演示服务器的运行参数从 TOML 文件读取，缺失的字段使用默认值。
//! 环境变量 `PORT` 与 `HOST` 优先于配置文件。

use std::env;
use std::fs;

use log::{error, info, warn};
use serde_derive::{Deserialize, Serialize};

use crate::exception::Exception;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_local")]
    local: bool,
}

fn default_host() -> String {
    String::new()
}

fn default_port() -> u16 {
    3000
}

fn default_local() -> bool {
    true
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            worker_threads: num_cpus::get(),
            local: default_local(),
        }
    }

    /// 读取配置文件。文件无法读取时返回错误；内容无法解析时记录错误并使用默认配置。
    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let content = fs::read_to_string(filename)
            .map_err(|e| Exception::Config(format!("无法读取配置文件{}：{}", filename, e)))?;
        Ok(Self::from_toml_str(&content))
    }

    pub fn from_toml_str(content: &str) -> Self {
        let mut config = match toml::from_str::<Config>(content) {
            Ok(config) => config,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        if config.worker_threads == 0 {
            config.worker_threads = num_cpus::get();
        }
        config
    }

    /// 用环境变量 `PORT` / `HOST` 覆盖配置
    pub fn apply_env(&mut self) {
        self.apply_overrides(env::var("PORT").ok(), env::var("HOST").ok());
    }

    fn apply_overrides(&mut self, port: Option<String>, host: Option<String>) {
        if let Some(port) = port {
            match port.parse::<u16>() {
                Ok(port) => {
                    info!("使用环境变量PORT：{}", port);
                    self.port = port;
                }
                Err(_) => warn!("环境变量PORT不是合法的端口号：{}，忽略", port),
            }
        }
        if let Some(host) = host {
            info!("使用环境变量HOST：{}", host);
            self.host = host;
        }
    }

    /// 监听地址。未指定 host 时按 `local` 选择回环地址或全部地址。
    pub fn address(&self) -> String {
        let host = if !self.host.is_empty() {
            self.host.as_str()
        } else if self.local {
            "127.0.0.1"
        } else {
            "0.0.0.0"
        };
        format!("{}:{}", host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }
}

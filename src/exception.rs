// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了请求分发核心在注册、解析与执行阶段可能返回的各类异常。
//!
//! ## 分类
//! - **配置错误**：路由模式无法编译、反向路由名称不存在。属于调用方缺陷，应在启动阶段暴露。
//! - **解析错误**：处理函数声明的依赖在注入器中没有绑定，当前请求的管线立即中止。
//! - **传输能力错误**：底层 Sink 不支持 hijack / close-notify。
//! - **请求报文错误**：原始字节无法解析为合法的 HTTP 请求头。

use std::io;

use thiserror::Error;

/// 请求分发过程中发生的异常类型。
#[derive(Debug, Error)]
pub enum Exception {
    /// 处理函数需要的服务类型在注入器链中没有任何绑定。
    #[error("value not found for type {0}")]
    ServiceNotFound(&'static str),
    /// 反向路由时给定的路由名称不存在。
    #[error("route not found: {0}")]
    RouteNotFound(String),
    /// 路由模式无法编译为正则表达式。
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    /// 处理函数返回的状态码超出 HTTP 状态码范围。
    #[error("invalid status code {0}")]
    InvalidStatusCode(i64),
    /// 底层 Sink 不支持连接劫持。
    #[error("the ResponseWriter doesn't support the Hijacker interface")]
    HijackNotSupported,
    /// 底层 Sink 不支持断连通知。调用方必须事先确认传输层具备该能力。
    #[error("the ResponseWriter doesn't support the CloseNotifier interface")]
    CloseNotifyNotSupported,
    /// 向底层 Sink 写入时发生 I/O 错误。
    #[error("response sink error: {0}")]
    Io(#[from] io::Error),
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    #[error("Request bytes can't be parsed in UTF-8")]
    RequestIsNotUtf8,
    /// 客户端使用了暂不支持的 HTTP 方法。
    #[error("Unsupported request method")]
    UnSupportedRequestMethod,
    /// 客户端使用了不支持的 HTTP 协议版本。
    #[error("Unsupported HTTP version")]
    UnsupportedHttpVersion,
    /// 请求行格式不正确。
    #[error("Malformed request line")]
    MalformedRequest,
    /// 配置文件无法读取或解析。
    #[error("config error: {0}")]
    Config(String),
}

impl Exception {
    /// 是否属于启动阶段就应暴露的配置类错误。
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Exception::RouteNotFound(_) | Exception::InvalidPattern { .. } | Exception::Config(_)
        )
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # webcore
//!
//! 带路由与按类型注入的请求分发核心。

pub mod app;
pub mod config;
pub mod context;
pub mod exception;
pub mod injector;
pub mod middleware;
pub mod param;
pub mod request;
pub mod response;
pub mod return_handler;
pub mod router;
pub mod sink;

pub use app::{App, Served};
pub use config::Config;
pub use context::{into_handler, BoxedHandler, Context, FromContext, Handler, Service};
pub use exception::Exception;
pub use injector::Injector;
pub use middleware::{logger, recovery};
pub use param::{HttpRequestMethod, HttpVersion};
pub use request::Request;
pub use response::ResponseWriter;
pub use return_handler::{HandlerOutput, ReturnHandler, ReturnValue};
pub use router::{Group, Params, Route, RouteMethod, Router, Routes, Routing, UrlParam};
pub use sink::{BufferedSink, Headers, ResponseSink};

/// 把若干处理函数装箱成 `Vec<BoxedHandler>`。
///
/// ```ignore
/// router.get("/user/:id", handlers![auth, |params: Params| params["id"].to_string()])?;
/// ```
#[macro_export]
macro_rules! handlers {
    ($($handler:expr),* $(,)?) => {
        vec![$($crate::context::into_handler($handler)),*]
    };
}

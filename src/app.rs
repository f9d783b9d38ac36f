// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 应用模块
//!
//! `App` 持有进程级注入器、顶层中间件链与最终的 action。
//! 每个请求经由 [`App::serve`] 创建一层请求作用域，依次执行中间件，最后执行 action。

use std::fmt;
use std::sync::Arc;

use log::{debug, error};

use crate::context::{into_handler, BoxedHandler, Context, RequestScope};
use crate::exception::Exception;
use crate::injector::Injector;
use crate::middleware::{logger, recovery};
use crate::request::Request;
use crate::response::ResponseWriter;
use crate::return_handler::{ReturnHandler, ReturnValues};
use crate::router::{Router, Routes};
use crate::sink::ResponseSink;

/// 一次请求处理结束后的响应摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Served {
    /// 0 表示管线没有写出任何响应
    pub status: u16,
    pub size: usize,
}

pub struct App {
    injector: Arc<Injector>,
    handlers: Vec<BoxedHandler>,
    action: BoxedHandler,
}

impl App {
    /// 空的中间件链、什么也不做的 action，以及默认的返回值处理器。
    pub fn new() -> Self {
        let mut injector = Injector::new();
        injector.map(ReturnHandler::default());
        Self {
            injector: Arc::new(injector),
            handlers: Vec::new(),
            action: into_handler(|| ()),
        }
    }

    /// 带日志与错误恢复中间件，并以 `router` 作为 action 的应用。
    pub fn classic(router: Router) -> Self {
        let mut app = Self::new();
        app.use_handler(logger()).use_handler(recovery());
        app.with_router(router);
        app
    }

    /// 追加一个顶层中间件
    pub fn use_handler(&mut self, handler: BoxedHandler) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    /// 整体替换顶层中间件链
    pub fn set_handlers(&mut self, handlers: Vec<BoxedHandler>) -> &mut Self {
        self.handlers = handlers;
        self
    }

    /// 设置中间件链之后执行的 action
    pub fn action(&mut self, handler: BoxedHandler) -> &mut Self {
        self.action = handler;
        self
    }

    /// 把路由表设为 action，同时以 `dyn Routes` 绑定到注入器，供处理函数做反向路由。
    pub fn with_router(&mut self, router: Router) -> Arc<Router> {
        let router = Arc::new(router);
        self.map_to::<dyn Routes>(Arc::clone(&router) as Arc<dyn Routes>);
        let dispatcher = Arc::clone(&router);
        self.action = Arc::new(move |ctx: &mut Context<'_>| -> Result<ReturnValues, Exception> {
            dispatcher.handle(ctx)?;
            Ok(Vec::new())
        });
        router
    }

    /// 绑定进程级服务。已经在处理中的请求持有旧的注入器，不受影响。
    pub fn map<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        Arc::make_mut(&mut self.injector).map(value);
        self
    }

    pub fn map_to<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) -> &mut Self {
        Arc::make_mut(&mut self.injector).map_to::<T>(value);
        self
    }

    pub fn injector(&self) -> &Arc<Injector> {
        &self.injector
    }

    pub fn handlers(&self) -> &[BoxedHandler] {
        &self.handlers
    }

    /// 处理一个请求，响应写入 `sink`。
    ///
    /// 管线中的错误会记录日志并返回给调用方；放在链首的 `recovery()` 会先把它们转成 500 响应。
    pub fn serve(&self, sink: Box<dyn ResponseSink>, request: Request) -> Result<Served, Exception> {
        let id = request.id();
        debug!("[ID{}]开始处理请求：{} {}", id, request.method(), request.path());
        let mut scope = RequestScope::new(Arc::clone(&self.injector), request, ResponseWriter::new(sink));

        let mut ctx = Context::new(&mut scope, &self.handlers, Some(&self.action));
        if let Err(e) = ctx.run() {
            error!("[ID{}]请求处理失败：{}", id, e);
            return Err(e);
        }

        let response = scope.response();
        Ok(Served {
            status: response.status(),
            size: response.size(),
        })
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("injector", &self.injector)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Service;
    use crate::param::HttpRequestMethod;
    use crate::sink::BufferedSink;

    fn get(app: &App, path: &str) -> (Result<Served, Exception>, BufferedSink) {
        let sink = BufferedSink::new();
        let served = app.serve(Box::new(sink.clone()), Request::new(HttpRequestMethod::Get, path));
        (served, sink)
    }

    #[test]
    fn test_default_action_writes_nothing() {
        let app = App::new();
        let (served, sink) = get(&app, "/");
        assert_eq!(served.unwrap(), Served { status: 0, size: 0 });
        assert_eq!(sink.status(), 0);
    }

    #[test]
    fn test_action_return_value() {
        let mut app = App::new();
        app.action(into_handler(|| (202, "accepted")));

        let (served, sink) = get(&app, "/");
        assert_eq!(served.unwrap(), Served { status: 202, size: 8 });
        assert_eq!(sink.body_string(), "accepted");
    }

    #[test]
    fn test_map_after_sharing_is_copy_on_write() {
        let mut app = App::new();
        app.map(String::from("before"));
        let snapshot = Arc::clone(app.injector());

        app.map(String::from("after"));

        assert_eq!(snapshot.get::<String>().unwrap().as_str(), "before");
        assert_eq!(app.injector().get::<String>().unwrap().as_str(), "after");
    }

    #[test]
    fn test_replace_return_handler() {
        let mut app = App::new();
        app.map(ReturnHandler::new(|rw, values| {
            rw.write_str(&format!("{} values", values.len()))?;
            Ok(())
        }));
        app.action(into_handler(|| ("a", "b")));

        let (_, sink) = get(&app, "/");
        assert_eq!(sink.body_string(), "2 values");
    }

    #[test]
    fn test_global_service_injection() {
        let mut app = App::new();
        app.map(7u32);
        app.action(into_handler(|n: Service<u32>| (*n * 6).to_string()));

        let (_, sink) = get(&app, "/");
        assert_eq!(sink.body_string(), "42");
    }

    #[test]
    fn test_error_propagates_without_recovery() {
        let mut app = App::new();
        app.action(into_handler(|_missing: Service<u64>| ()));

        let (served, sink) = get(&app, "/");
        assert!(matches!(served, Err(Exception::ServiceNotFound(_))));
        assert_eq!(sink.status(), 0);
    }
}

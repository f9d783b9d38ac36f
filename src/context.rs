// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求上下文模块
//!
//! 每个请求对应一个 [`RequestScope`]：请求级子注入器、请求对象与响应包装器。
//! [`Context`] 在这份数据之上维护一条处理函数管线的游标。
//!
//! 管线的执行规则：
//! - 依次调用处理函数，最后调用可选的 action；
//! - 任何处理函数写出响应之后，管线立即停止；
//! - 处理函数可以调用 [`Context::next`] 先执行剩余的管线，返回后再做后处理；
//! - 处理函数返回非空的值时，交给注入器中的 [`ReturnHandler`] 写出。
//!
//! 处理函数有两种写法：直接接收 `&mut Context<'_>`，
//! 或者声明若干实现了 [`FromContext`] 的参数，由注入器按类型解析。

use std::ops::Deref;
use std::sync::Arc;

use log::debug;

use crate::exception::Exception;
use crate::injector::Injector;
use crate::request::Request;
use crate::response::ResponseWriter;
use crate::return_handler::{HandlerOutput, ReturnHandler, ReturnValues};
use crate::router::Params;

/// 管线中的一个可调用单元
pub type BoxedHandler =
    Arc<dyn Fn(&mut Context<'_>) -> Result<ReturnValues, Exception> + Send + Sync>;

/// 单个请求拥有的数据，生命周期与请求相同。
#[derive(Debug)]
pub struct RequestScope {
    injector: Injector,
    request: Arc<Request>,
    response: ResponseWriter,
}

impl RequestScope {
    /// 创建请求作用域。请求对象同时以 `Request` 类型绑定到请求级注入器。
    pub fn new(parent: Arc<Injector>, request: Request, response: ResponseWriter) -> Self {
        let request = Arc::new(request);
        let mut injector = Injector::child(parent);
        injector.map_to::<Request>(Arc::clone(&request));
        Self {
            injector,
            request,
            response,
        }
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    pub fn into_response(self) -> ResponseWriter {
        self.response
    }
}

/// 管线的执行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    Written,
    Exhausted,
}

pub struct Context<'a> {
    scope: &'a mut RequestScope,
    handlers: &'a [BoxedHandler],
    action: Option<&'a BoxedHandler>,
    index: usize,
}

impl<'a> Context<'a> {
    pub fn new(
        scope: &'a mut RequestScope,
        handlers: &'a [BoxedHandler],
        action: Option<&'a BoxedHandler>,
    ) -> Self {
        Self {
            scope,
            handlers,
            action,
            index: 0,
        }
    }

    /// 在同一个请求作用域上创建一条嵌套管线（没有 action），用于路由的处理函数链。
    pub fn nested<'b>(&'b mut self, handlers: &'b [BoxedHandler]) -> Context<'b> {
        Context {
            scope: &mut *self.scope,
            handlers,
            action: None,
            index: 0,
        }
    }

    /// 从当前游标开始执行管线，直到响应被写出或管线耗尽。
    pub fn run(&mut self) -> Result<(), Exception> {
        while let Some(handler) = self.current() {
            let values = (**handler)(self)?;
            self.index += 1;

            if !values.is_empty() {
                if self.written() {
                    debug!(
                        "[ID{}]响应已经写出，忽略处理函数的{}个返回值",
                        self.scope.request.id(),
                        values.len()
                    );
                } else {
                    let return_handler = self.scope.injector.require::<ReturnHandler>()?;
                    return_handler.handle(&mut self.scope.response, values)?;
                }
            }

            if self.written() {
                break;
            }
        }
        Ok(())
    }

    /// 跳过当前处理函数，执行管线的剩余部分；返回后调用方可以继续做后处理。
    pub fn next(&mut self) -> Result<(), Exception> {
        self.index += 1;
        self.run()
    }

    fn current(&self) -> Option<&'a BoxedHandler> {
        let handlers: &'a [BoxedHandler] = self.handlers;
        if self.index < handlers.len() {
            handlers.get(self.index)
        } else if self.index == handlers.len() {
            self.action
        } else {
            None
        }
    }

    pub fn state(&self) -> PipelineState {
        if self.written() {
            PipelineState::Written
        } else if self.current().is_some() {
            PipelineState::Running
        } else {
            PipelineState::Exhausted
        }
    }

    pub fn written(&self) -> bool {
        self.scope.response.written()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn request(&self) -> Arc<Request> {
        Arc::clone(&self.scope.request)
    }

    pub fn response(&mut self) -> &mut ResponseWriter {
        &mut self.scope.response
    }

    pub fn injector(&self) -> &Injector {
        &self.scope.injector
    }

    /// 绑定请求级服务，对后续处理函数可见
    pub fn map<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.scope.injector.map(value);
        self
    }

    pub fn map_to<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) -> &mut Self {
        self.scope.injector.map_to::<T>(value);
        self
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.scope.injector.get::<T>()
    }

    pub fn require<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, Exception> {
        self.scope.injector.require::<T>()
    }

    /// 路由匹配得到的路径参数，未经过路由时为 `None`
    pub fn params(&self) -> Option<Arc<Params>> {
        self.get::<Params>()
    }
}

/// 可以从请求上下文中解析出来的处理函数参数。
pub trait FromContext: Sized {
    fn from_context(ctx: &Context<'_>) -> Result<Self, Exception>;
}

impl FromContext for Params {
    fn from_context(ctx: &Context<'_>) -> Result<Self, Exception> {
        ctx.require::<Params>().map(Arc::unwrap_or_clone)
    }
}

impl FromContext for Arc<Request> {
    fn from_context(ctx: &Context<'_>) -> Result<Self, Exception> {
        Ok(ctx.request())
    }
}

impl FromContext for Request {
    fn from_context(ctx: &Context<'_>) -> Result<Self, Exception> {
        Ok(Request::clone(&ctx.request()))
    }
}

/// 注入器中绑定的服务，`T` 可以是 `dyn Trait`。
///
/// ```ignore
/// fn handler(db: Service<Database>) -> String { db.name() }
/// ```
/// 字段访问统一经过 `Deref`，新类型服务的 `svc.0` 取到的是被包装值自己的字段。
pub struct Service<T: ?Sized> {
    inner: Arc<T>,
}

impl<T: ?Sized> Service<T> {
    pub fn new(inner: Arc<T>) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}

impl<T: ?Sized> Deref for Service<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: ?Sized> Clone for Service<T> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.inner))
    }
}

impl<T: ?Sized + Send + Sync + 'static> FromContext for Service<T> {
    fn from_context(ctx: &Context<'_>) -> Result<Self, Exception> {
        ctx.require::<T>().map(Service::new)
    }
}

/// 可选的服务，缺失时为 `None` 而不是报错
impl<T: ?Sized + Send + Sync + 'static> FromContext for Option<Service<T>> {
    fn from_context(ctx: &Context<'_>) -> Result<Self, Exception> {
        Ok(ctx.get::<T>().map(Service::new))
    }
}

/// 可以放进管线的处理函数。`T` 只用于区分不同的参数形式。
pub trait Handler<T>: Send + Sync + 'static {
    fn call(&self, ctx: &mut Context<'_>) -> Result<ReturnValues, Exception>;
}

/// 直接接收 `&mut Context<'_>` 的处理函数的标记类型
pub struct WithContext;

impl<F, Res> Handler<WithContext> for F
where
    F: Fn(&mut Context<'_>) -> Res + Send + Sync + 'static,
    Res: HandlerOutput,
{
    fn call(&self, ctx: &mut Context<'_>) -> Result<ReturnValues, Exception> {
        (self)(ctx).into_values()
    }
}

macro_rules! impl_handler {
    ($($ty:ident),*) => {
        #[allow(non_snake_case, unused_variables)]
        impl<F, Res, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> Res + Send + Sync + 'static,
            Res: HandlerOutput,
            $($ty: FromContext,)*
        {
            fn call(&self, ctx: &mut Context<'_>) -> Result<ReturnValues, Exception> {
                $(
                    let $ty = $ty::from_context(ctx)?;
                )*
                (self)($($ty),*).into_values()
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);

/// 把处理函数装箱成管线单元
pub fn into_handler<H, T>(handler: H) -> BoxedHandler
where
    H: Handler<T>,
{
    Arc::new(move |ctx: &mut Context<'_>| handler.call(ctx))
}

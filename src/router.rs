// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由模块
//!
//! 路由表按注册顺序保存 [`Route`]，每个路由在注册时把模式编译成正则表达式：
//!
//! - `:name` 匹配一个路径段，结果以 `name` 为键放进 [`Params`]；
//! - `**` 匹配任意多段，按出现顺序命名为 `_1`、`_2`……；
//! - 末尾的 `/` 可有可无。
//!
//! 分发时第一个方法和路径都匹配的路由胜出，它的处理函数链作为嵌套管线执行。
//! 没有路由匹配时执行 not-found 处理链，默认返回 404。
//!
//! 路由组通过显式的 [`Group`] 累积前缀与中间件，闭包返回后即被丢弃，
//! 不会影响之后的顶层注册。

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

use lazy_static::lazy_static;
use log::{debug, info};
use regex::{Captures, Regex};

use crate::context::{into_handler, BoxedHandler, Context};
use crate::exception::Exception;
use crate::param::{HttpRequestMethod, ANY_METHOD};

lazy_static! {
    static ref PARAM_TOKEN: Regex = Regex::new(r":[^/#?()\.\\]+").expect("参数占位符正则无效");
    static ref WILDCARD_TOKEN: Regex = Regex::new(r"\*\*").expect("通配符正则无效");
}

/// 路由匹配得到的路径参数，只读。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<&str> for Params {
    type Output = str;

    /// 参数不存在时 panic，只应用于模式中确实声明过的参数
    fn index(&self, name: &str) -> &str {
        match self.0.get(name) {
            Some(value) => value,
            None => panic!("路由参数不存在：{}", name),
        }
    }
}

/// 路由接受的请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMethod {
    Any,
    Method(HttpRequestMethod),
}

impl RouteMethod {
    pub fn label(&self) -> &'static str {
        match self {
            RouteMethod::Any => ANY_METHOD,
            RouteMethod::Method(method) => method.as_str(),
        }
    }

    /// `*` 匹配所有方法，GET 路由同时匹配 HEAD 请求
    pub fn accepts(&self, method: HttpRequestMethod) -> bool {
        match *self {
            RouteMethod::Any => true,
            RouteMethod::Method(m) => {
                m == method || (m == HttpRequestMethod::Get && method == HttpRequestMethod::Head)
            }
        }
    }
}

impl From<HttpRequestMethod> for RouteMethod {
    fn from(method: HttpRequestMethod) -> Self {
        RouteMethod::Method(method)
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub struct Route {
    method: RouteMethod,
    pattern: String,
    regex: Regex,
    handlers: Vec<BoxedHandler>,
    name: Option<String>,
}

impl Route {
    fn new(method: RouteMethod, pattern: String, handlers: Vec<BoxedHandler>) -> Result<Self, Exception> {
        let regex = compile_pattern(&pattern)?;
        Ok(Self {
            method,
            pattern,
            regex,
            handlers,
            name: None,
        })
    }

    /// 为路由命名，供反向路由使用
    pub fn name(&mut self, name: &str) -> &mut Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn method(&self) -> RouteMethod {
        self.method
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn handlers(&self) -> &[BoxedHandler] {
        &self.handlers
    }

    /// 只检查路径结构，不检查方法
    pub fn match_path(&self, path: &str) -> Option<Params> {
        let captures = self.regex.captures(path)?;
        let params = self
            .regex
            .capture_names()
            .flatten()
            .map(|name| {
                let value = captures.name(name).map(|m| m.as_str()).unwrap_or_default();
                (name.to_string(), value.to_string())
            })
            .collect();
        Some(Params(params))
    }

    pub fn matches(&self, method: HttpRequestMethod, path: &str) -> Option<Params> {
        if !self.method.accepts(method) {
            return None;
        }
        self.match_path(path)
    }

    /// 按从左到右的顺序替换 `:name` 占位符。
    ///
    /// 多余的值被忽略，缺少值的占位符保持原样。
    pub fn url_with(&self, args: &[String]) -> String {
        if args.is_empty() {
            return self.pattern.clone();
        }
        let mut index = 0;
        PARAM_TOKEN
            .replace_all(&self.pattern, |caps: &Captures| {
                let value = match args.get(index) {
                    Some(arg) => arg.clone(),
                    None => caps[0].to_string(),
                };
                index += 1;
                value
            })
            .into_owned()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("regex", &self.regex.as_str())
            .field("handlers", &self.handlers.len())
            .field("name", &self.name)
            .finish()
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, Exception> {
    let named = PARAM_TOKEN.replace_all(pattern, |caps: &Captures| {
        format!("(?P<{}>[^/#?]+)", &caps[0][1..])
    });
    let mut index = 0;
    let expanded = WILDCARD_TOKEN.replace_all(&named, |_: &Captures| {
        index += 1;
        format!("(?P<_{}>[^#?]*)", index)
    });
    let source = format!("^(?:{})/?$", expanded);
    Regex::new(&source).map_err(|e| Exception::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// 反向路由的参数值：整数或字符串，`None` 会被跳过。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParam(Option<String>);

impl UrlParam {
    pub fn value(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl From<&str> for UrlParam {
    fn from(value: &str) -> Self {
        UrlParam(Some(value.to_string()))
    }
}

impl From<String> for UrlParam {
    fn from(value: String) -> Self {
        UrlParam(Some(value))
    }
}

impl<T: Into<UrlParam>> From<Option<T>> for UrlParam {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(UrlParam(None))
    }
}

macro_rules! impl_int_url_param {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for UrlParam {
                fn from(value: $ty) -> Self {
                    UrlParam(Some(value.to_string()))
                }
            }
        )*
    };
}

impl_int_url_param!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

/// 处理函数可见的路由表只读接口，由 `App::with_router` 绑定到注入器。
pub trait Routes: Send + Sync {
    /// 按名称生成 URL
    fn url_for(&self, name: &str, params: &[UrlParam]) -> Result<String, Exception>;

    /// 路径能匹配的所有方法，按注册顺序去重
    fn methods_for(&self, path: &str) -> Vec<&'static str>;
}

/// 路由注册接口，[`Router`] 与 [`Group`] 都实现它。
pub trait Routing {
    fn add_route(
        &mut self,
        method: RouteMethod,
        pattern: &str,
        handlers: Vec<BoxedHandler>,
    ) -> Result<&mut Route, Exception>;

    /// 创建一个前缀与中间件都叠加在当前作用域之上的路由组
    fn group_scope(&mut self, prefix: &str, middleware: Vec<BoxedHandler>) -> Group<'_>;

    fn get(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<&mut Route, Exception> {
        self.add_route(HttpRequestMethod::Get.into(), pattern, handlers)
    }

    fn post(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<&mut Route, Exception> {
        self.add_route(HttpRequestMethod::Post.into(), pattern, handlers)
    }

    fn put(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<&mut Route, Exception> {
        self.add_route(HttpRequestMethod::Put.into(), pattern, handlers)
    }

    fn patch(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<&mut Route, Exception> {
        self.add_route(HttpRequestMethod::Patch.into(), pattern, handlers)
    }

    fn delete(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<&mut Route, Exception> {
        self.add_route(HttpRequestMethod::Delete.into(), pattern, handlers)
    }

    fn options(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<&mut Route, Exception> {
        self.add_route(HttpRequestMethod::Options.into(), pattern, handlers)
    }

    fn head(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<&mut Route, Exception> {
        self.add_route(HttpRequestMethod::Head.into(), pattern, handlers)
    }

    /// 匹配任意方法
    fn any(&mut self, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<&mut Route, Exception> {
        self.add_route(RouteMethod::Any, pattern, handlers)
    }

    /// 在闭包中注册一组共享前缀与中间件的路由
    fn group<F>(&mut self, prefix: &str, middleware: Vec<BoxedHandler>, f: F) -> Result<(), Exception>
    where
        Self: Sized,
        F: FnOnce(&mut Group<'_>) -> Result<(), Exception>,
    {
        let mut group = self.group_scope(prefix, middleware);
        f(&mut group)
    }
}

pub struct Router {
    routes: Vec<Route>,
    not_founds: Vec<BoxedHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            not_founds: vec![into_handler(not_found)],
        }
    }

    /// 替换没有路由匹配时执行的处理链
    pub fn not_found(&mut self, handlers: Vec<BoxedHandler>) {
        self.not_founds = handlers;
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// 查找第一个匹配的路由
    pub fn find(&self, method: HttpRequestMethod, path: &str) -> Option<(&Route, Params)> {
        self.routes
            .iter()
            .find_map(|route| route.matches(method, path).map(|params| (route, params)))
    }

    /// 分发当前请求：把路径参数绑定到请求作用域，然后执行匹配路由的处理链。
    pub fn handle(&self, ctx: &mut Context<'_>) -> Result<(), Exception> {
        let request = ctx.request();
        match self.find(request.method(), request.path()) {
            Some((route, params)) => {
                debug!(
                    "[ID{}]路由匹配成功：{} {} -> {} {}",
                    request.id(),
                    request.method(),
                    request.path(),
                    route.method,
                    route.pattern
                );
                ctx.map(params);
                ctx.nested(&route.handlers).run()
            }
            None => {
                debug!(
                    "[ID{}]没有匹配的路由：{} {}",
                    request.id(),
                    request.method(),
                    request.path()
                );
                ctx.nested(&self.not_founds).run()
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("not_founds", &self.not_founds.len())
            .finish()
    }
}

impl Routing for Router {
    fn add_route(
        &mut self,
        method: RouteMethod,
        pattern: &str,
        handlers: Vec<BoxedHandler>,
    ) -> Result<&mut Route, Exception> {
        let route = Route::new(method, pattern.to_string(), handlers)?;
        info!("注册路由：{} {}", method, pattern);
        let index = self.routes.len();
        self.routes.push(route);
        Ok(&mut self.routes[index])
    }

    fn group_scope(&mut self, prefix: &str, middleware: Vec<BoxedHandler>) -> Group<'_> {
        Group {
            router: self,
            prefix: prefix.to_string(),
            middleware,
        }
    }
}

impl Routes for Router {
    fn url_for(&self, name: &str, params: &[UrlParam]) -> Result<String, Exception> {
        let route = self
            .routes
            .iter()
            .find(|route| route.route_name() == Some(name))
            .ok_or_else(|| Exception::RouteNotFound(name.to_string()))?;
        let args: Vec<String> = params
            .iter()
            .filter_map(|param| param.value().map(str::to_string))
            .collect();
        Ok(route.url_with(&args))
    }

    fn methods_for(&self, path: &str) -> Vec<&'static str> {
        let mut methods = Vec::new();
        for route in &self.routes {
            let label = route.method.label();
            if !methods.contains(&label) && route.match_path(path).is_some() {
                methods.push(label);
            }
        }
        methods
    }
}

/// 路由组累积器。前缀与中间件会叠加到组内注册的每个路由上。
pub struct Group<'r> {
    router: &'r mut Router,
    prefix: String,
    middleware: Vec<BoxedHandler>,
}

impl Group<'_> {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Routing for Group<'_> {
    fn add_route(
        &mut self,
        method: RouteMethod,
        pattern: &str,
        handlers: Vec<BoxedHandler>,
    ) -> Result<&mut Route, Exception> {
        let mut chain = self.middleware.clone();
        chain.extend(handlers);
        let pattern = format!("{}{}", self.prefix, pattern);
        self.router.add_route(method, &pattern, chain)
    }

    fn group_scope(&mut self, prefix: &str, middleware: Vec<BoxedHandler>) -> Group<'_> {
        let mut chain = self.middleware.clone();
        chain.extend(middleware);
        Group {
            router: &mut *self.router,
            prefix: format!("{}{}", self.prefix, prefix),
            middleware: chain,
        }
    }
}

/// 默认的 not-found 处理函数
fn not_found(ctx: &mut Context<'_>) -> Result<(), Exception> {
    let response = ctx.response();
    response
        .headers_mut()
        .set("Content-Type", "text/plain; charset=utf-8");
    response.headers_mut().set("X-Content-Type-Options", "nosniff");
    response.write_header(404)?;
    response.write_str("404 page not found\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers;

    fn compiled(pattern: &str) -> Route {
        Route::new(RouteMethod::Any, pattern.to_string(), Vec::new()).unwrap()
    }

    #[test]
    fn test_named_parameter() {
        let route = compiled("/user/:id");

        let params = route.match_path("/user/42").unwrap();
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(&params["id"], "42");
        assert!(route.match_path("/user/42/extra").is_none());
        assert!(route.match_path("/user/").is_none());
        assert!(route.match_path("/user/42/").is_some());
    }

    #[test]
    fn test_multiple_parameters() {
        let route = compiled("/:org/repos/:repo");

        let params = route.match_path("/rust-lang/repos/regex").unwrap();
        assert_eq!(params.get("org"), Some("rust-lang"));
        assert_eq!(params.get("repo"), Some("regex"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_double_wildcard() {
        let route = compiled("/files/**");
        let params = route.match_path("/files/a/b/c").unwrap();
        assert_eq!(params.get("_1"), Some("a/b/c"));

        let route = compiled("/**/edit/**");
        let params = route.match_path("/a/b/edit/c").unwrap();
        assert_eq!(params.get("_1"), Some("a/b"));
        assert_eq!(params.get("_2"), Some("c"));
    }

    #[test]
    fn test_static_pattern_is_anchored() {
        let route = compiled("/about");
        assert!(route.match_path("/about").is_some());
        assert!(route.match_path("/about/").is_some());
        assert!(route.match_path("/about/team").is_none());
        assert!(route.match_path("/x/about").is_none());
    }

    #[test]
    fn test_method_matching() {
        let get = Route::new(HttpRequestMethod::Get.into(), "/".to_string(), Vec::new()).unwrap();
        assert!(get.matches(HttpRequestMethod::Get, "/").is_some());
        assert!(get.matches(HttpRequestMethod::Head, "/").is_some());
        assert!(get.matches(HttpRequestMethod::Post, "/").is_none());

        let head = Route::new(HttpRequestMethod::Head.into(), "/".to_string(), Vec::new()).unwrap();
        assert!(head.matches(HttpRequestMethod::Get, "/").is_none());

        let any = compiled("/");
        assert!(any.matches(HttpRequestMethod::Delete, "/").is_some());
    }

    #[test]
    fn test_invalid_pattern() {
        let mut router = Router::new();
        let result = router.get("/broken/(", handlers![|| ()]);
        assert!(matches!(result, Err(Exception::InvalidPattern { .. })));
        assert!(router.is_empty());
    }

    #[test]
    fn test_url_with() {
        let route = compiled("/user/:id/posts/:post");
        assert_eq!(route.url_with(&[]), "/user/:id/posts/:post");
        assert_eq!(
            route.url_with(&["7".to_string(), "9".to_string()]),
            "/user/7/posts/9"
        );
        // 缺少的值保持原样，多余的值被忽略
        assert_eq!(route.url_with(&["7".to_string()]), "/user/7/posts/:post");
        assert_eq!(
            route.url_with(&["1".to_string(), "2".to_string(), "3".to_string()]),
            "/user/1/posts/2"
        );
    }

    #[test]
    fn test_url_for() {
        let mut router = Router::new();
        router.get("/user/:id", handlers![|| ()]).unwrap().name("home");
        router.get("/about", handlers![|| ()]).unwrap().name("about");

        assert_eq!(router.url_for("home", &["7".into()]).unwrap(), "/user/7");
        assert_eq!(router.url_for("home", &[42u64.into()]).unwrap(), "/user/42");
        assert_eq!(router.url_for("about", &[]).unwrap(), "/about");
        assert_eq!(
            router.url_for("home", &[None::<&str>.into(), 5.into()]).unwrap(),
            "/user/5"
        );
        assert!(matches!(
            router.url_for("missing", &[]),
            Err(Exception::RouteNotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_methods_for() {
        let mut router = Router::new();
        router.get("/user/:id", handlers![|| ()]).unwrap();
        router.post("/user/:id", handlers![|| ()]).unwrap();
        router.get("/user/:name", handlers![|| ()]).unwrap();
        router.delete("/other", handlers![|| ()]).unwrap();

        assert_eq!(router.methods_for("/user/42"), vec!["GET", "POST"]);
        assert!(router.methods_for("/nothing").is_empty());
    }

    #[test]
    fn test_group_prefix_and_middleware() {
        let mut router = Router::new();
        let outer = handlers![|| ()];
        let inner = handlers![|| (), || ()];

        router
            .group("/api", outer, |api| {
                api.get("/status", handlers![|| "ok"])?;
                api.group("/v1", inner, |v1| {
                    v1.get("/users/:id", handlers![|| "user"])?;
                    Ok(())
                })
            })
            .unwrap();
        router.get("/plain", handlers![|| "plain"]).unwrap();

        let routes: Vec<(&str, usize)> = router
            .routes()
            .map(|route| (route.pattern(), route.handlers().len()))
            .collect();
        assert_eq!(
            routes,
            vec![("/api/status", 2), ("/api/v1/users/:id", 4), ("/plain", 1)]
        );
    }

    #[test]
    fn test_first_match_wins() {
        let mut router = Router::new();
        router.get("/user/:id", handlers![|| "first"]).unwrap().name("first");
        router.get("/user/42", handlers![|| "second"]).unwrap().name("second");

        let (route, _) = router.find(HttpRequestMethod::Get, "/user/42").unwrap();
        assert_eq!(route.route_name(), Some("first"));
    }
}

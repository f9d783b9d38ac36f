// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 演示服务器
//!
//! 基于 Tokio 运行时的最小 HTTP/1.1 监听循环：每个连接读取一次请求头，
//! 交给 `App::classic` 组装的分发核心处理，再把缓冲的响应整体写回。
//!
//! 环境变量 `PORT` / `HOST` 覆盖配置文件中的监听地址。

use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    runtime::Builder,
};

use webcore::{
    handlers, App, BufferedSink, Config, Context, Exception, HttpRequestMethod, Params, Request,
    Router, Routes, Routing, Service, UrlParam,
};

/// 计数器服务，演示进程级注入
#[derive(Debug, Default)]
struct Visits(AtomicU64);

fn main() {
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法初始化日志系统：{}", e);
    }

    let mut config = match Config::from_toml("config/development.toml") {
        Ok(config) => {
            info!("配置文件已载入");
            config
        }
        Err(e) => {
            warn!("{}，使用默认配置", e);
            Config::new()
        }
    };
    config.apply_env();

    let app = match build_app() {
        Ok(app) => Arc::new(app),
        Err(e) => {
            error!("路由注册失败：{}", e);
            process::exit(1);
        }
    };

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(listen(config, app)) {
        error!("服务器异常退出：{}", e);
        process::exit(1);
    }
}

fn build_app() -> Result<App, Exception> {
    let mut router = Router::new();

    router.get("/", handlers![|| "hello world"])?;
    router
        .get("/hello/:name", handlers![|params: Params| format!("Hello {}", &params["name"])])?
        .name("hello");
    router.get(
        "/visits",
        handlers![|visits: Service<Visits>| {
            let count = visits.0.fetch_add(1, Ordering::Relaxed) + 1;
            count.to_string()
        }],
    )?;

    let api_header = handlers![|ctx: &mut Context<'_>| {
        ctx.response().headers_mut().set("Content-Type", "application/json");
    }];
    router.group("/api", api_header, |api| {
        api.get(
            "/links/:name",
            handlers![|routes: Service<dyn Routes>, params: Params| -> Result<String, Exception> {
                let url = routes.url_for("hello", &[UrlParam::from(&params["name"])])?;
                Ok(format!("{{\"hello\":\"{}\"}}", url))
            }],
        )?;
        api.any(
            "/methods/**",
            handlers![|routes: Service<dyn Routes>, params: Params| {
                let path = format!("/{}", &params["_1"]);
                let methods: Vec<String> = routes
                    .methods_for(&path)
                    .iter()
                    .map(|method| format!("\"{}\"", method))
                    .collect();
                format!("[{}]", methods.join(","))
            }],
        )?;
        Ok(())
    })?;
    router.post("/hello/:name", handlers![|params: Params| (201, format!("Created {}", &params["name"]))])?;

    let mut app = App::classic(router);
    app.map(Visits::default());
    Ok(app)
}

async fn listen(config: Config, app: Arc<App>) -> Result<(), Exception> {
    let address = config.address();
    let listener = TcpListener::bind(&address).await?;
    info!("服务端在{}上监听Socket连接", address);

    let mut id: u128 = 0;
    loop {
        let (mut stream, addr) = listener.accept().await?;
        debug!("[ID{}]TCP连接已建立：{}", id, addr);

        let app = Arc::clone(&app);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(&mut stream, id, &app).await {
                error!("[ID{}]处理连接时发生错误：{}", id, e);
            }
        });
        id += 1;
    }
}

async fn handle_connection(stream: &mut TcpStream, id: u128, app: &App) -> Result<(), Exception> {
    let mut buffer = vec![0; 4096];

    stream.readable().await?;
    match stream.try_read(&mut buffer) {
        Ok(0) => return Ok(()),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
        Err(e) => return Err(e.into()),
    }

    let request = match Request::try_from(&buffer, id) {
        Ok(request) => request,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败：{}", id, e);
            let response = "HTTP/1.1 400 Bad Request\r\nContent-Length: 11\r\n\r\nBad Request";
            stream.write_all(response.as_bytes()).await?;
            return Ok(());
        }
    };
    let head_only = request.method() == HttpRequestMethod::Head;

    let sink = BufferedSink::new();
    app.serve(Box::new(sink.clone()), request)?;

    let response = sink.to_http_bytes(head_only);
    debug!("[ID{}]发送响应，长度：{}", id, response.len());
    stream.write_all(&response).await?;
    stream.flush().await?;
    Ok(())
}

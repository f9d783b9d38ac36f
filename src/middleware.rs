// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 内置中间件
//!
//! - [`logger`]：记录每个请求的开始与结束、状态码和耗时；
//! - [`recovery`]：捕获其后管线返回的错误，尚未写出响应时返回 500。

use std::time::Instant;

use log::{error, info};

use crate::context::{into_handler, BoxedHandler, Context};
use crate::exception::Exception;
use crate::param::reason_phrase;

pub fn logger() -> BoxedHandler {
    into_handler(log_request)
}

pub fn recovery() -> BoxedHandler {
    into_handler(recover)
}

fn log_request(ctx: &mut Context<'_>) -> Result<(), Exception> {
    let start = Instant::now();
    let request = ctx.request();
    info!(
        "[ID{}]Started {} {} for {}",
        request.id(),
        request.method(),
        request.path(),
        request.user_agent()
    );

    ctx.next()?;

    let status = ctx.response().status();
    info!(
        "[ID{}]Completed {} {} in {}ms",
        request.id(),
        status,
        reason_phrase(status),
        start.elapsed().as_millis()
    );
    Ok(())
}

fn recover(ctx: &mut Context<'_>) -> Result<(), Exception> {
    let e = match ctx.next() {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    let request = ctx.request();
    error!(
        "[ID{}]处理 {} {} 时发生错误：{}",
        request.id(),
        request.method(),
        request.path(),
        e
    );

    if ctx.written() {
        return Ok(());
    }
    let response = ctx.response();
    response
        .headers_mut()
        .set("Content-Type", "text/plain; charset=utf-8");
    response.write_header(500)?;
    response.write_str(reason_phrase(500))?;
    Ok(())
}

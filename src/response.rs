// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 响应包装模块
//!
//! [`ResponseWriter`] 包装传输层提供的 [`ResponseSink`]，在其上增加簿记：
//! - 记录状态码（0 表示尚未写出）与累计写出的字节数；
//! - 在状态码第一次发送之前，按注册的逆序调用一次所有 before 钩子；
//! - 透传可选的 flush / hijack / close-notify 能力。

use std::fmt;
use std::io;
use std::sync::mpsc::Receiver;

use log::{debug, warn};

use crate::exception::Exception;
use crate::sink::{Connection, Headers, ResponseSink};

/// 在响应状态码发送之前调用的钩子，可以安全地修改响应头或检查包装器状态。
pub type BeforeFunc = Box<dyn FnOnce(&mut ResponseWriter) + Send>;

pub struct ResponseWriter {
    sink: Box<dyn ResponseSink>,
    status: u16,
    size: usize,
    before_funcs: Vec<BeforeFunc>,
}

impl ResponseWriter {
    pub fn new(sink: Box<dyn ResponseSink>) -> Self {
        Self {
            sink,
            status: 0,
            size: 0,
            before_funcs: Vec::new(),
        }
    }

    pub fn headers(&self) -> &Headers {
        self.sink.headers()
    }

    /// 状态码发送之后再修改响应头不会生效
    pub fn headers_mut(&mut self) -> &mut Headers {
        self.sink.headers_mut()
    }

    /// 发送状态码。
    ///
    /// 第一次调用时先按逆序执行 before 钩子，再转发给底层 Sink 并记录状态码。
    /// 之后的调用会被忽略。不在 `100..=999` 内的状态码直接报错，钩子保留到下一次写出。
    pub fn write_header(&mut self, status: u16) -> Result<(), Exception> {
        if !(100..=999).contains(&status) {
            warn!("拒绝非法的响应状态码：{}", status);
            return Err(Exception::InvalidStatusCode(i64::from(status)));
        }
        Ok(self.send_header(status)?)
    }

    fn send_header(&mut self, status: u16) -> io::Result<()> {
        if self.written() {
            warn!(
                "响应状态码已经是{}，忽略重复的状态码设置：{}",
                self.status, status
            );
            return Ok(());
        }
        self.call_before();
        // 钩子自己写出了状态码
        if self.written() {
            return Ok(());
        }
        self.sink.write_header(status)?;
        self.status = status;
        Ok(())
    }

    /// 写入响应体。尚未设置状态码时隐式发送 200。
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.written() {
            self.send_header(200)?;
        }
        let size = self.sink.write(buf)?;
        self.size += size;
        Ok(size)
    }

    /// 写入字符串形式的响应体
    pub fn write_str(&mut self, s: &str) -> io::Result<usize> {
        self.write(s.as_bytes())
    }

    /// 状态码，尚未写出时为 0
    pub fn status(&self) -> u16 {
        self.status
    }

    /// 累计写出的响应体字节数
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn written(&self) -> bool {
        self.status != 0
    }

    /// 注册 before 钩子。钩子只会在第一次发送状态码时执行一次。
    pub fn before<F>(&mut self, before: F)
    where
        F: FnOnce(&mut ResponseWriter) + Send + 'static,
    {
        self.before_funcs.push(Box::new(before));
    }

    /// 转发给 Sink 的 flush 能力；不支持时什么也不做
    pub fn flush(&mut self) -> io::Result<()> {
        match self.sink.flusher() {
            Some(flusher) => flusher.flush(),
            None => Ok(()),
        }
    }

    /// 接管底层连接
    pub fn hijack(&mut self) -> Result<Box<dyn Connection>, Exception> {
        match self.sink.hijacker() {
            Some(hijacker) => Ok(hijacker.hijack()?),
            None => Err(Exception::HijackNotSupported),
        }
    }

    /// 客户端断开通知。调用方必须确认传输层支持该能力，否则属于调用方缺陷。
    pub fn close_notify(&mut self) -> Result<Receiver<bool>, Exception> {
        match self.sink.close_notifier() {
            Some(notifier) => Ok(notifier.close_notify()),
            None => Err(Exception::CloseNotifyNotSupported),
        }
    }

    fn call_before(&mut self) {
        let before_funcs = std::mem::take(&mut self.before_funcs);
        if !before_funcs.is_empty() {
            debug!("执行{}个before钩子", before_funcs.len());
        }
        for before in before_funcs.into_iter().rev() {
            before(self);
        }
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ResponseWriter::write(self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        ResponseWriter::flush(self)
    }
}

impl fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("status", &self.status)
            .field("size", &self.size)
            .field("before_funcs", &self.before_funcs.len())
            .finish()
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 响应 Sink 模块
//!
//! 分发核心并不实现网络传输，只通过 [`ResponseSink`] 向外部传输层写出响应。
//! 传输层可以选择性地提供三种能力：
//! - [`Flusher`]：把缓存数据立即发送给客户端；
//! - [`Hijacker`]：接管底层连接（例如升级为 WebSocket）；
//! - [`CloseNotifier`]：客户端断开时发出通知。
//!
//! 能力通过 `ResponseSink` 上的查询方法获取，默认实现均返回 `None`。
//!
//! [`BufferedSink`] 是一个内存实现：它收集状态码、响应头与响应体，
//! 最后按 HTTP/1.1 报文格式序列化，供监听循环整体写回 Socket，也方便测试检查。

use std::io::{self, Read, Write};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use log::warn;

use crate::param::{reason_phrase, CRLF, SERVER_NAME};

/// 有序的响应头集合，名称大小写不敏感。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置响应头，覆盖同名的已有值
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.entries.push((name.to_string(), value.into()));
    }

    /// 追加响应头，保留同名的已有值
    pub fn add(&mut self, name: &str, value: impl Into<String>) {
        self.entries.push((name.to_string(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 把缓存数据发送给客户端的能力
pub trait Flusher {
    fn flush(&mut self) -> io::Result<()>;
}

/// 被劫持后交给调用方的双向连接
pub trait Connection: Read + Write + Send {}

impl<T: Read + Write + Send> Connection for T {}

/// 接管底层连接的能力
pub trait Hijacker {
    fn hijack(&mut self) -> io::Result<Box<dyn Connection>>;
}

/// 客户端断开时发出通知的能力
pub trait CloseNotifier {
    fn close_notify(&mut self) -> Receiver<bool>;
}

/// 外部传输层提供的原始响应 Sink。
pub trait ResponseSink: Send {
    fn headers(&self) -> &Headers;

    fn headers_mut(&mut self) -> &mut Headers;

    /// 发送状态行与响应头
    fn write_header(&mut self, status: u16) -> io::Result<()>;

    /// 写入响应体字节，返回实际写入的字节数
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn flusher(&mut self) -> Option<&mut dyn Flusher> {
        None
    }

    fn hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        None
    }

    fn close_notifier(&mut self) -> Option<&mut dyn CloseNotifier> {
        None
    }
}

#[derive(Debug, Default)]
struct Captured {
    status: u16,
    headers: Headers,
    body: BytesMut,
    flushes: usize,
}

/// 内存中的响应 Sink。
///
/// 克隆得到的句柄共享同一份数据：把一个句柄交给 `App::serve`，
/// 保留另一个句柄用于在请求结束后读取结果。
#[derive(Debug, Clone, Default)]
pub struct BufferedSink {
    inner: Arc<Mutex<Captured>>,
    // 写入期间使用的响应头副本，write_header 时提交到 inner
    headers: Headers,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Captured> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("BufferedSink 锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    /// 已发送的状态码，尚未发送时为 0
    pub fn status(&self) -> u16 {
        self.lock().status
    }

    /// 已提交的响应头；状态码发送之前返回当前句柄上的副本
    pub fn sent_headers(&self) -> Headers {
        let captured = self.lock();
        if captured.status == 0 {
            self.headers.clone()
        } else {
            captured.headers.clone()
        }
    }

    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&self.lock().body)
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.lock().body).into_owned()
    }

    pub fn flush_count(&self) -> usize {
        self.lock().flushes
    }

    /// 按 HTTP/1.1 报文格式序列化。`head_only` 为真时省略响应体（用于 HEAD 请求）。
    pub fn to_http_bytes(&self, head_only: bool) -> Vec<u8> {
        let captured = self.lock();
        let status = if captured.status == 0 { 200 } else { captured.status };
        let mut header = format!("HTTP/1.1 {} {}{}", status, reason_phrase(status), CRLF);
        for (name, value) in captured.headers.iter() {
            header.push_str(&[name, ": ", value, CRLF].concat());
        }
        if !captured.headers.contains("Content-Length") {
            header.push_str(&format!("Content-Length: {}{}", captured.body.len(), CRLF));
        }
        if !captured.headers.contains("Date") {
            header.push_str(&format!("Date: {}{}", Utc::now().to_rfc2822(), CRLF));
        }
        if !captured.headers.contains("Server") {
            header.push_str(&["Server: ", SERVER_NAME, CRLF].concat());
        }
        header.push_str(CRLF);

        let mut bytes = header.into_bytes();
        if !head_only {
            bytes.extend_from_slice(&captured.body);
        }
        bytes
    }
}

impl ResponseSink for BufferedSink {
    fn headers(&self) -> &Headers {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    fn write_header(&mut self, status: u16) -> io::Result<()> {
        let mut captured = self.lock();
        captured.status = status;
        captured.headers = self.headers.clone();
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }
}

impl Flusher for BufferedSink {
    fn flush(&mut self) -> io::Result<()> {
        self.lock().flushes += 1;
        Ok(())
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求模块
//!
//! `Request` 是分发核心所消费的请求对象：路由只关心方法与路径，
//! 处理函数可以通过注入拿到完整的请求头信息。
//! 该模块同时提供从原始字节解析 HTTP/1.1 请求头的能力，供监听循环使用。

use log::error;

use crate::{exception::Exception, param::*};

/// 表示一个 HTTP 请求的元数据。
///
/// 该结构体不包含请求体（Body），主要用于路由分发和处理函数注入。
#[derive(Debug, Clone)]
pub struct Request {
    /// 全局请求 ID，用于在多线程环境下追踪日志
    id: u128,
    /// HTTP 请求方法
    method: HttpRequestMethod,
    /// 请求路径，不含查询字符串
    path: String,
    /// 原始查询字符串（不含 `?`）
    query: Option<String>,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 按出现顺序保存的请求头
    headers: Vec<(String, String)>,
}

impl Request {
    /// 以方法和请求目标（可带查询字符串）构造请求。
    ///
    /// 路径按百分号编码解码；编码不合法时保留原样。
    pub fn new(method: HttpRequestMethod, target: &str) -> Self {
        let (raw_path, query) = split_target(target);
        let path = decode_path(&raw_path).unwrap_or(raw_path);
        Self {
            id: 0,
            method,
            path,
            query,
            version: HttpVersion::V1_1,
            headers: Vec::new(),
        }
    }

    /// 设置请求 ID
    pub fn with_id(mut self, id: u128) -> Self {
        self.id = id;
        self
    }

    /// 追加一个请求头
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 验证编码：确保请求数据是合法的 UTF-8 字符串。
    /// 2. 解析请求行：提取方法、请求目标和协议版本。
    /// 3. 逐行解析请求头，直到遇到空行。
    ///
    /// 缓冲区末尾的 NUL 填充会被忽略。路径中的百分号编码会被解码，
    /// 非法的转义或解码后不是 UTF-8 时返回 `MalformedRequest`。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string.trim_end_matches('\0'),
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut request_lines = request_string.split(CRLF);
        let first_line = request_lines.next().unwrap_or_default();

        // 请求行 (e.g., "GET /index.html HTTP/1.1")
        let first_line_parts: Vec<&str> = first_line.split(' ').collect();
        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, first_line);
            return Err(Exception::MalformedRequest);
        }

        let method = match first_line_parts[0].parse::<HttpRequestMethod>() {
            Ok(m) => m,
            Err(e) => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, first_line_parts[0]);
                return Err(e);
            }
        };

        let version_str = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 路径中可能包含空格，虽然不规范但通过 join 尝试恢复
        let target = first_line_parts[1..first_line_parts.len() - 1].join(" ");
        let (raw_path, query) = split_target(&target);
        let path = match decode_path(&raw_path) {
            Some(path) => path,
            None => {
                error!("[ID{}]请求路径的百分号编码不合法：{}", id, raw_path);
                return Err(Exception::MalformedRequest);
            }
        };

        let mut headers = Vec::new();
        for line in request_lines {
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
        }

        Ok(Self {
            id,
            method,
            path,
            query,
            version,
            headers,
        })
    }
}

fn split_target(target: &str) -> (String, Option<String>) {
    let without_fragment = target.split('#').next().unwrap_or_default();
    match without_fragment.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (without_fragment.to_string(), None),
    }
}

/// 解码路径中的 `%XX` 转义。`+` 在路径中不表示空格，保持原样。
fn decode_path(raw: &str) -> Option<String> {
    if !raw.contains('%') {
        return Some(raw.to_string());
    }
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hi = hex_value(*bytes.get(i + 1)?)?;
            let lo = hex_value(*bytes.get(i + 2)?)?;
            decoded.push((hi << 4) | lo);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

// --- Getter 访问器实现 ---

impl Request {
    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    /// 获取请求路径（不含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 按名称查找请求头，名称大小写不敏感，返回第一个匹配值
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// 获取用户代理字符串，缺失时为空
    pub fn user_agent(&self) -> &str {
        self.header("User-Agent").unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 验证常规 GET 请求的解析，包括 Path 和 Headers
    #[test]
    fn test_parse_get_request() {
        let request_str = "GET / HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test-Browser\r\n\r\n";

        let request = Request::try_from(request_str.as_bytes(), 7).unwrap();

        assert_eq!(request.id(), 7);
        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.path(), "/");
        assert_eq!(request.user_agent(), "Test-Browser");
        assert_eq!(request.header("host"), Some("localhost:7878"));
    }

    #[test]
    fn test_parse_methods() {
        for (line, method) in [
            ("HEAD /index.html HTTP/1.1", HttpRequestMethod::Head),
            ("PUT /user/1 HTTP/1.1", HttpRequestMethod::Put),
            ("PATCH /user/1 HTTP/1.1", HttpRequestMethod::Patch),
            ("DELETE /user/1 HTTP/1.1", HttpRequestMethod::Delete),
            ("OPTIONS * HTTP/1.1", HttpRequestMethod::Options),
            ("post /submit HTTP/1.1", HttpRequestMethod::Post),
        ] {
            let raw = format!("{}\r\nHost: localhost\r\n\r\n", line);
            let request = Request::try_from(raw.as_bytes(), 0).unwrap();
            assert_eq!(request.method(), method);
        }
    }

    /// 确保不支持的 HTTP 方法会返回错误
    #[test]
    fn test_unsupported_method() {
        let request_str = "TRACE /resource HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";

        let result = Request::try_from(request_str.as_bytes(), 0);

        assert!(matches!(result, Err(Exception::UnSupportedRequestMethod)));
    }

    /// 确保不支持的版本（如 HTTP/2.0）被正确拒绝
    #[test]
    fn test_unsupported_http_version() {
        let request_str = "GET / HTTP/2.0\r\nHost: localhost:7878\r\n\r\n";

        let result = Request::try_from(request_str.as_bytes(), 0);

        assert!(matches!(result, Err(Exception::UnsupportedHttpVersion)));
    }

    #[test]
    fn test_malformed_request_line() {
        let result = Request::try_from(b"GET\r\n\r\n", 0);
        assert!(matches!(result, Err(Exception::MalformedRequest)));
    }

    /// 验证 UTF-8 编码检查
    #[test]
    fn test_invalid_utf8() {
        let buffer = vec![0xFF, 0xFE, 0xFD];

        let result = Request::try_from(&buffer, 0);

        assert!(matches!(result, Err(Exception::RequestIsNotUtf8)));
    }

    /// 查询字符串与路径分离
    #[test]
    fn test_path_with_query_string() {
        let request_str = "GET /page?id=123&name=test HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.path(), "/page");
        assert_eq!(request.query(), Some("id=123&name=test"));
    }

    /// 监听循环读取到的定长缓冲区末尾带有 NUL 填充
    #[test]
    fn test_nul_padding_ignored() {
        let mut buffer = b"GET /a HTTP/1.1\r\nUser-Agent: x\r\n\r\n".to_vec();
        buffer.resize(1024, 0);

        let request = Request::try_from(&buffer, 0).unwrap();

        assert_eq!(request.path(), "/a");
        assert_eq!(request.headers().len(), 1);
    }

    /// 路径中的百分号编码被解码，查询字符串保持原样
    #[test]
    fn test_percent_encoded_path_decoded() {
        let request_str = "GET /user/john%20doe/%E4%BD%A0%e5%a5%bd?q=a%20b HTTP/1.1\r\nHost: localhost\r\n\r\n";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.path(), "/user/john doe/你好");
        assert_eq!(request.query(), Some("q=a%20b"));

        let request = Request::new(HttpRequestMethod::Get, "/a+b/%2Fc");
        assert_eq!(request.path(), "/a+b//c");
    }

    #[test]
    fn test_invalid_percent_escape() {
        for target in ["/bad%zz", "/short%2", "/tail%", "/latin%FF"] {
            let raw = format!("GET {} HTTP/1.1\r\n\r\n", target);
            let result = Request::try_from(raw.as_bytes(), 0);
            assert!(matches!(result, Err(Exception::MalformedRequest)), "{}", target);

            // 构造器不报错，保留原始路径
            assert_eq!(Request::new(HttpRequestMethod::Get, target).path(), target);
        }
    }

    #[test]
    fn test_builder_constructor() {
        let request = Request::new(HttpRequestMethod::Get, "/files/a?x=1")
            .with_id(3)
            .with_header("Accept", "text/plain");

        assert_eq!(request.path(), "/files/a");
        assert_eq!(request.query(), Some("x=1"));
        assert_eq!(request.header("accept"), Some("text/plain"));
        assert_eq!(request.user_agent(), "");
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 返回值处理模块
//!
//! 处理函数可以不直接操作响应，而是返回值交给 [`ReturnHandler`] 写出：
//!
//! | 返回值                 | 行为                                   |
//! |------------------------|----------------------------------------|
//! | `()`                   | 不写任何内容                           |
//! | 单个值                 | 字节序列原样写出，其余写出其文本形式   |
//! | `(整数, 值)`           | 第一个值作为状态码，第二个值按上一行写出 |
//!
//! `Box<T>` 与 `Arc<T>` 会先解开一层。`Result<T, Exception>` 的错误会让管线中止。
//! `ReturnHandler` 本身是注入器中的服务，可以整体替换。

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::exception::Exception;
use crate::response::ResponseWriter;

/// 处理函数返回的单个值
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnValue {
    Int(i64),
    Bytes(Bytes),
    Text(String),
}

pub type ReturnValues = Vec<ReturnValue>;

/// 可以作为单个返回值的类型
pub trait IntoReturnValue {
    fn into_return_value(self) -> ReturnValue;
}

/// 处理函数的返回类型
pub trait HandlerOutput {
    fn into_values(self) -> Result<ReturnValues, Exception>;
}

impl IntoReturnValue for ReturnValue {
    fn into_return_value(self) -> ReturnValue {
        self
    }
}

impl IntoReturnValue for String {
    fn into_return_value(self) -> ReturnValue {
        ReturnValue::Text(self)
    }
}

impl IntoReturnValue for &'static str {
    fn into_return_value(self) -> ReturnValue {
        ReturnValue::Text(self.to_string())
    }
}

impl IntoReturnValue for Cow<'static, str> {
    fn into_return_value(self) -> ReturnValue {
        ReturnValue::Text(self.into_owned())
    }
}

impl IntoReturnValue for Vec<u8> {
    fn into_return_value(self) -> ReturnValue {
        ReturnValue::Bytes(Bytes::from(self))
    }
}

impl IntoReturnValue for &'static [u8] {
    fn into_return_value(self) -> ReturnValue {
        ReturnValue::Bytes(Bytes::from_static(self))
    }
}

impl IntoReturnValue for Bytes {
    fn into_return_value(self) -> ReturnValue {
        ReturnValue::Bytes(self)
    }
}

impl IntoReturnValue for bool {
    fn into_return_value(self) -> ReturnValue {
        ReturnValue::Text(self.to_string())
    }
}

impl<T: IntoReturnValue> IntoReturnValue for Box<T> {
    fn into_return_value(self) -> ReturnValue {
        (*self).into_return_value()
    }
}

impl<T: IntoReturnValue + Clone> IntoReturnValue for Arc<T> {
    fn into_return_value(self) -> ReturnValue {
        Arc::unwrap_or_clone(self).into_return_value()
    }
}

macro_rules! impl_int_return_value {
    ($($ty:ty),*) => {
        $(
            impl IntoReturnValue for $ty {
                fn into_return_value(self) -> ReturnValue {
                    ReturnValue::Int(i64::from(self))
                }
            }
        )*
    };
}

impl_int_return_value!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! impl_wide_int_return_value {
    ($($ty:ty),*) => {
        $(
            impl IntoReturnValue for $ty {
                fn into_return_value(self) -> ReturnValue {
                    match i64::try_from(self) {
                        Ok(value) => ReturnValue::Int(value),
                        Err(_) => ReturnValue::Text(self.to_string()),
                    }
                }
            }
        )*
    };
}

impl_wide_int_return_value!(u64, usize, isize);

impl HandlerOutput for () {
    fn into_values(self) -> Result<ReturnValues, Exception> {
        Ok(Vec::new())
    }
}

macro_rules! impl_single_output {
    ($($ty:ty),*) => {
        $(
            impl HandlerOutput for $ty {
                fn into_values(self) -> Result<ReturnValues, Exception> {
                    Ok(vec![self.into_return_value()])
                }
            }
        )*
    };
}

impl_single_output!(
    ReturnValue,
    String,
    &'static str,
    Cow<'static, str>,
    Vec<u8>,
    &'static [u8],
    Bytes,
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    usize,
    isize
);

impl<T: IntoReturnValue> HandlerOutput for Box<T> {
    fn into_values(self) -> Result<ReturnValues, Exception> {
        Ok(vec![self.into_return_value()])
    }
}

impl<T: IntoReturnValue + Clone> HandlerOutput for Arc<T> {
    fn into_values(self) -> Result<ReturnValues, Exception> {
        Ok(vec![self.into_return_value()])
    }
}

impl<A: IntoReturnValue, B: IntoReturnValue> HandlerOutput for (A, B) {
    fn into_values(self) -> Result<ReturnValues, Exception> {
        Ok(vec![self.0.into_return_value(), self.1.into_return_value()])
    }
}

impl<T: HandlerOutput> HandlerOutput for Option<T> {
    fn into_values(self) -> Result<ReturnValues, Exception> {
        match self {
            Some(value) => value.into_values(),
            None => Ok(Vec::new()),
        }
    }
}

impl<T: HandlerOutput> HandlerOutput for Result<T, Exception> {
    fn into_values(self) -> Result<ReturnValues, Exception> {
        self.and_then(HandlerOutput::into_values)
    }
}

type ReturnFn = dyn Fn(&mut ResponseWriter, ReturnValues) -> Result<(), Exception> + Send + Sync;

/// 把处理函数的返回值写入响应的策略对象
#[derive(Clone)]
pub struct ReturnHandler(Arc<ReturnFn>);

impl ReturnHandler {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut ResponseWriter, ReturnValues) -> Result<(), Exception> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn handle(&self, response: &mut ResponseWriter, values: ReturnValues) -> Result<(), Exception> {
        (self.0)(response, values)
    }
}

impl Default for ReturnHandler {
    fn default() -> Self {
        Self::new(write_return_values)
    }
}

impl fmt::Debug for ReturnHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReturnHandler")
    }
}

/// 默认策略：整数开头的两个值视为 (状态码, 响应体)，否则只写出第一个值。
pub fn write_return_values(response: &mut ResponseWriter, values: ReturnValues) -> Result<(), Exception> {
    let mut values = values.into_iter();
    let body = match (values.next(), values.next()) {
        (Some(ReturnValue::Int(code)), Some(body)) => {
            let status = u16::try_from(code)
                .ok()
                .filter(|status| (100..=999).contains(status))
                .ok_or(Exception::InvalidStatusCode(code))?;
            response.write_header(status)?;
            body
        }
        (Some(first), _) => first,
        (None, _) => return Ok(()),
    };
    match body {
        ReturnValue::Bytes(bytes) => response.write(&bytes)?,
        ReturnValue::Text(text) => response.write(text.as_bytes())?,
        ReturnValue::Int(value) => response.write(value.to_string().as_bytes())?,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BufferedSink;

    fn run(output: impl HandlerOutput) -> (ResponseWriter, BufferedSink, Result<(), Exception>) {
        let sink = BufferedSink::new();
        let mut rw = ResponseWriter::new(Box::new(sink.clone()));
        let result = output
            .into_values()
            .and_then(|values| ReturnHandler::default().handle(&mut rw, values));
        (rw, sink, result)
    }

    #[test]
    fn test_no_values_writes_nothing() {
        let (rw, _sink, result) = run(());
        assert!(result.is_ok());
        assert!(!rw.written());
    }

    #[test]
    fn test_single_text_value() {
        let (rw, sink, _) = run("hello world");
        assert_eq!(rw.status(), 200);
        assert_eq!(sink.body_string(), "hello world");
    }

    #[test]
    fn test_single_bytes_value() {
        let (rw, sink, _) = run(vec![0u8, 159, 146, 150]);
        assert_eq!(rw.size(), 4);
        assert_eq!(sink.body().as_ref(), &[0u8, 159, 146, 150]);
    }

    #[test]
    fn test_boxed_value_unwrapped() {
        let (_, sink, _) = run(Box::new(String::from("boxed")));
        assert_eq!(sink.body_string(), "boxed");

        let (_, sink, _) = run(Arc::new(Bytes::from_static(b"shared")));
        assert_eq!(sink.body_string(), "shared");
    }

    #[test]
    fn test_status_and_body() {
        let (rw, sink, _) = run((418, "I'm a teapot"));
        assert_eq!(rw.status(), 418);
        assert_eq!(sink.status(), 418);
        assert_eq!(sink.body_string(), "I'm a teapot");
    }

    #[test]
    fn test_two_values_without_int_writes_first() {
        let (rw, sink, _) = run(("first", "second"));
        assert_eq!(rw.status(), 200);
        assert_eq!(sink.body_string(), "first");
    }

    #[test]
    fn test_single_int_written_as_text() {
        let (_, sink, _) = run(42u32);
        assert_eq!(sink.body_string(), "42");
    }

    #[test]
    fn test_invalid_status_code() {
        let (rw, _, result) = run((70000, "x"));
        assert!(matches!(result, Err(Exception::InvalidStatusCode(70000))));
        assert!(!rw.written());
    }

    #[test]
    fn test_result_and_option_outputs() {
        let (_, sink, result) = run(Ok::<_, Exception>((201, String::from("created"))));
        assert!(result.is_ok());
        assert_eq!(sink.status(), 201);

        let (rw, _, result) = run(Err::<String, _>(Exception::RouteNotFound("x".to_string())));
        assert!(result.is_err());
        assert!(!rw.written());

        let (rw, _, _) = run(None::<String>);
        assert!(!rw.written());
    }

    #[test]
    fn test_custom_return_handler() {
        let sink = BufferedSink::new();
        let mut rw = ResponseWriter::new(Box::new(sink.clone()));
        let handler = ReturnHandler::new(|rw, values| {
            rw.headers_mut().set("X-Values", values.len().to_string());
            rw.write_header(202)?;
            Ok(())
        });

        handler.handle(&mut rw, vec![ReturnValue::Int(1)]).unwrap();

        assert_eq!(sink.status(), 202);
        assert_eq!(sink.sent_headers().get("x-values"), Some("1"));
    }
}

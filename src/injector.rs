// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 注入器模块
//!
//! `Injector` 是按类型标识（`TypeId`）存取服务的分层注册表。
//!
//! - 进程级注入器在启动时创建并填充长期服务，开始服务后只读。
//! - 每个请求创建一层子注入器，父指针指向进程级注入器，请求结束即丢弃。
//! - 查找先查本层，再沿父链向上；本层绑定会遮蔽父层同类型绑定。
//! - 重复绑定同一类型时后写者覆盖，且只影响本层。
//!
//! 值一律以 `Arc<T>` 形式保存，因此既可以按具体类型绑定，
//! 也可以通过 [`Injector::map_to`] 按 trait 对象类型（`dyn Trait`）绑定。

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::exception::Exception;

/// 注册表中的擦除值，内部实际是某个 `Arc<T>`。
type ServiceArc = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Default)]
pub struct Injector {
    values: HashMap<TypeId, ServiceArc>,
    parent: Option<Arc<Injector>>,
}

impl Injector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建以 `parent` 为父层的新注入器。子层只通过父指针做查找，从不修改父层。
    pub fn child(parent: Arc<Injector>) -> Self {
        Self {
            values: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// 以值自身的类型绑定到本层。
    pub fn map<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.map_to::<T>(Arc::new(value))
    }

    /// 以显式声明的类型标识绑定到本层，`T` 可以是 `dyn Trait`。
    pub fn map_to<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) -> &mut Self {
        self.values.insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    /// 查找 `T` 的绑定：本层优先，然后依次查找父层。
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self.values.get(&TypeId::of::<T>()) {
            Some(value) => value.downcast_ref::<Arc<T>>().cloned(),
            None => self.parent.as_ref().and_then(|parent| parent.get::<T>()),
        }
    }

    /// 与 [`Injector::get`] 相同，但缺失时返回 [`Exception::ServiceNotFound`]。
    pub fn require<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, Exception> {
        self.get::<T>()
            .ok_or(Exception::ServiceNotFound(type_name::<T>()))
    }

    /// 注入器链中是否存在 `T` 的绑定。
    pub fn contains<T: ?Sized + Send + Sync + 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.contains::<T>())
    }

    pub fn set_parent(&mut self, parent: Arc<Injector>) {
        self.parent = Some(parent);
    }

    pub fn parent(&self) -> Option<&Arc<Injector>> {
        self.parent.as_ref()
    }

    /// 本层绑定数量，不含父层
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("values", &self.values.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Database(&'static str);

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn test_map_and_get() {
        let mut injector = Injector::new();
        injector.map(Database("primary")).map(42u32);

        assert_eq!(*injector.get::<Database>().unwrap(), Database("primary"));
        assert_eq!(*injector.get::<u32>().unwrap(), 42);
        assert!(injector.get::<String>().is_none());
        assert_eq!(injector.len(), 2);
    }

    #[test]
    fn test_map_to_trait_object() {
        let mut injector = Injector::new();
        injector.map_to::<dyn Greeter>(Arc::new(English));

        let greeter = injector.get::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "hello");
        // 按接口绑定时具体类型不可见
        assert!(injector.get::<English>().is_none());
    }

    #[test]
    fn test_parent_lookup_and_shadowing() {
        let mut global = Injector::new();
        global.map(Database("global")).map(7u8);
        let global = Arc::new(global);

        let mut request = Injector::child(Arc::clone(&global));
        assert_eq!(*request.get::<Database>().unwrap(), Database("global"));

        request.map(Database("request"));
        assert_eq!(*request.get::<Database>().unwrap(), Database("request"));
        assert_eq!(*request.get::<u8>().unwrap(), 7);
        // 父层不受子层绑定影响
        assert_eq!(*global.get::<Database>().unwrap(), Database("global"));
    }

    #[test]
    fn test_last_writer_wins() {
        let mut injector = Injector::new();
        injector.map(String::from("first"));
        injector.map(String::from("second"));

        assert_eq!(injector.get::<String>().unwrap().as_str(), "second");
        assert_eq!(injector.len(), 1);
    }

    #[test]
    fn test_multi_level_chain() {
        let mut root = Injector::new();
        root.map(1i64);
        let mut middle = Injector::child(Arc::new(root));
        middle.map(2i32);
        let leaf = Injector::child(Arc::new(middle));

        assert_eq!(*leaf.get::<i64>().unwrap(), 1);
        assert_eq!(*leaf.get::<i32>().unwrap(), 2);
        assert!(leaf.contains::<i64>());
        assert!(leaf.is_empty());
    }

    #[test]
    fn test_require_reports_type_name() {
        let injector = Injector::new();
        match injector.require::<Database>() {
            Err(Exception::ServiceNotFound(name)) => assert!(name.ends_with("Database")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}

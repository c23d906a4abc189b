//! 集成测试共用的内存注册表
//!
//! 以手写的名称→工厂表充当外部对象创建子系统，行为对齐
//! 注册表协作接口的约定：类型解析零候选/多候选即失败，
//! 实例化可以经解析器回取自身依赖。

#![allow(dead_code)]

use scopetree::{Instance, Resolver, ScopeError, ServiceRegistry, TypeKey};
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 初始化测试日志输出；重复调用安全
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

type Factory = Box<dyn Fn(&Resolver<'_>) -> Result<Instance, ScopeError> + Send + Sync>;

pub struct TestRegistry {
    factories: HashMap<String, Factory>,
    names_by_type: HashMap<TypeId, Vec<String>>,
    accessor_names: HashSet<String>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            names_by_type: HashMap::new(),
            accessor_names: HashSet::new(),
        }
    }

    /// 登记一个服务：名称、具体类型和工厂
    pub fn register<T, F>(&mut self, name: &str, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<T, ScopeError> + Send + Sync + 'static,
    {
        self.names_by_type
            .entry(TypeId::of::<T>())
            .or_default()
            .push(name.to_string());
        self.factories.insert(
            name.to_string(),
            Box::new(move |resolver| Ok(Arc::new(factory(resolver)?) as Instance)),
        );
    }

    /// 为已登记的名称追加一个类型别名（能力接口解析用）
    pub fn alias_type(&mut self, key: TypeKey, name: &str) {
        self.names_by_type
            .entry(key.id())
            .or_default()
            .push(name.to_string());
    }

    /// 把名称标记为当前层级访问器
    pub fn mark_accessor(&mut self, name: &str) {
        self.accessor_names.insert(name.to_string());
    }
}

impl ServiceRegistry for TestRegistry {
    fn unique_name_for_type(&self, key: TypeKey) -> Result<String, ScopeError> {
        let names = self
            .names_by_type
            .get(&key.id())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        match names {
            [] => Err(ScopeError::NoCandidate {
                type_name: key.name().to_string(),
            }),
            [single] => Ok(single.clone()),
            many => Err(ScopeError::AmbiguousCandidate {
                type_name: key.name().to_string(),
                candidates: many.to_vec(),
            }),
        }
    }

    fn instantiate(&self, name: &str, resolver: &Resolver<'_>) -> Result<Instance, ScopeError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ScopeError::CreationFailed {
                service_name: name.to_string(),
                reason: "no factory registered for name".to_string(),
                source: None,
            })?;
        factory(resolver)
    }

    fn is_context_accessor(&self, name: &str) -> bool {
        self.accessor_names.contains(name)
    }
}

//! 服务注册表协作接口
//!
//! 对象的实际创建由外部的工厂子系统负责，容器只通过这里的
//! 窄接口消费它：类型到唯一名称的解析、按名称实例化、
//! 以及"哪个名称是当前层级访问器"的静态判定。

use crate::error::ScopeError;
use crate::scope::Resolver;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// 类型擦除的服务实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 带可读名称的类型标识
///
/// `TypeId` 用于匹配，`type_name` 用于错误信息和日志。
/// 允许非固定大小类型，能力接口（`dyn Trait`）也能作为键。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// 取得类型的键
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// 实例的运行期具体类型
pub(crate) fn runtime_type_of(instance: &Instance) -> TypeId {
    (**instance).type_id()
}

/// 服务注册表
pub trait ServiceRegistry: Send + Sync {
    /// 解析类型对应的唯一服务名
    ///
    /// 零个候选返回 [`ScopeError::NoCandidate`]，多个候选返回
    /// [`ScopeError::AmbiguousCandidate`]；绝不静默取第一个。
    fn unique_name_for_type(&self, key: TypeKey) -> Result<String, ScopeError>;

    /// 按名称创建服务实例
    ///
    /// 实现方通过传入的解析器取得自身依赖，嵌套的获取会落回
    /// 同一个激活节点。内部错误用 [`ScopeError::creation_failed`]
    /// 包装一次，嵌套产生的 `ScopeError` 原样向外传。
    fn instantiate(&self, name: &str, resolver: &Resolver<'_>) -> Result<Instance, ScopeError>;

    /// 名称是否静态解析为当前层级访问器类型
    fn is_context_accessor(&self, name: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Renderer {}

    #[test]
    fn type_key_matches_per_type() {
        assert_eq!(TypeKey::of::<String>(), TypeKey::of::<String>());
        assert_ne!(TypeKey::of::<String>().id(), TypeKey::of::<u32>().id());
    }

    #[test]
    fn type_key_accepts_trait_objects() {
        let key = TypeKey::of::<dyn Renderer>();
        assert!(key.name().contains("Renderer"));
    }

    #[test]
    fn runtime_type_sees_through_erasure() {
        let instance: Instance = Arc::new(42_u32);
        assert_eq!(runtime_type_of(&instance), TypeId::of::<u32>());
    }
}

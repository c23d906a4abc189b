//! 请求路径到根类型的映射入口
//!
//! 外层映射层把一次外部请求（路径、会话标识等）解析为要
//! 实例化的根类型，再在根上下文之下创建整个作用域对象图。
//! 每次外部请求对应一次根下子上下文创建。

use crate::error::ScopeError;
use crate::registry::{Instance, TypeKey};
use crate::scope::{ActiveScope, ScopeContainer};
use dashmap::DashMap;

/// 路径到类型的路由表
#[derive(Default)]
pub struct RouteTable {
    routes: DashMap<String, TypeKey>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一条路由
    pub fn route<T: ?Sized + 'static>(&self, path: &str) {
        self.route_key(path, TypeKey::of::<T>());
    }

    /// 以现成的类型键登记一条路由
    pub fn route_key(&self, path: &str, key: TypeKey) {
        self.routes.insert(path.to_string(), key);
    }

    /// 查表；未登记的路径返回 `None`
    pub fn resolve(&self, path: &str) -> Option<TypeKey> {
        self.routes.get(path).map(|key| *key)
    }
}

/// 入口分发器
pub struct Dispatcher {
    container: ScopeContainer,
    routes: RouteTable,
}

impl Dispatcher {
    pub fn new(container: ScopeContainer, routes: RouteTable) -> Self {
        Self { container, routes }
    }

    /// 分发一次请求路径
    ///
    /// 未登记的路径返回 `None`，不会创建任何实例；命中的路由
    /// 等价于在根访问器上按类型创建子上下文。
    pub fn dispatch(
        &self,
        cx: &mut ActiveScope,
        path: &str,
    ) -> Option<Result<Instance, ScopeError>> {
        let key = self.routes.resolve(path)?;
        Some(self.container.root().create_in_sub_context_by_type(cx, key))
    }
}

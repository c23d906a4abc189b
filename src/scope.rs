//! 作用域容器与激活状态跟踪
//!
//! 编排一次子上下文创建的全过程：分配并激活子节点、驱动
//! 注册表实例化、按目标层级规则落位、运行循环回引注入，
//! 并在所有退出路径上恢复激活状态。
//!
//! 单次创建的状态机：
//! `idle → active → [创建 + 嵌套创建 + 循环回引] → deactivated`，
//! 去激活无条件发生，是唯一的终止态；失败在去激活之后才向外传播。

use crate::circular;
use crate::context::{ContextTree, NodeId, NodeInfo};
use crate::error::ScopeError;
use crate::metadata::{MetadataSource, TargetRule};
use crate::registry::{runtime_type_of, Instance, ServiceRegistry, TypeKey};
use crate::stats::{ScopeStats, StatsSnapshot};
use log::debug;
use std::sync::Arc;
use uuid::Uuid;

/// 每次创建操作显式携带的激活状态槽
///
/// 取代线程本地状态：由调用方构造并作为参数穿过每一层创建
/// 调用，互不相关的并发创建各自持有独立的槽。创建操作之外
/// 槽为空；嵌套创建只在真正的后代节点上合法。
#[derive(Debug, Default)]
pub struct ActiveScope {
    current: Option<NodeId>,
}

impl ActiveScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前激活节点；创建操作之外为 `None`
    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    fn activate(&mut self, node: NodeId) -> Option<NodeId> {
        self.current.replace(node)
    }

    fn restore(&mut self, previous: Option<NodeId>) {
        self.current = previous;
    }
}

pub(crate) struct ScopeShared {
    pub(crate) tree: ContextTree,
    pub(crate) registry: Arc<dyn ServiceRegistry>,
    pub(crate) metadata: Arc<dyn MetadataSource>,
    pub(crate) stats: ScopeStats,
}

/// 沿链查找，含当前层级访问器特例
///
/// 名称被注册表静态判定为层级访问器时，返回查找起点节点的
/// 访问器句柄，而不是任何已存储的条目。
fn lookup_from(shared: &Arc<ScopeShared>, from: NodeId, name: &str) -> Option<Instance> {
    shared.stats.record_lookup();
    if shared.registry.is_context_accessor(name) {
        shared.stats.record_chain_hit();
        let accessor = ContextAccessor {
            shared: shared.clone(),
            node: from,
        };
        return Some(Arc::new(accessor) as Instance);
    }
    let found = shared.tree.get(from, name);
    if found.is_some() {
        shared.stats.record_chain_hit();
    }
    found
}

/// 与查找相同走法的归属解析；访问器名称归属于起点节点
fn owning_node_from(shared: &Arc<ScopeShared>, from: NodeId, name: &str) -> Option<NodeId> {
    if shared.registry.is_context_accessor(name) {
        return Some(from);
    }
    shared.tree.owning_node(from, name)
}

/// 分层作用域容器
///
/// 根节点在构造时分配；对外的创建入口都从某个
/// [`ContextAccessor`] 出发。
#[derive(Clone)]
pub struct ScopeContainer {
    shared: Arc<ScopeShared>,
    root: NodeId,
}

impl ScopeContainer {
    pub fn new(registry: Arc<dyn ServiceRegistry>, metadata: Arc<dyn MetadataSource>) -> Self {
        let tree = ContextTree::new();
        let root = tree.new_root();
        Self {
            shared: Arc::new(ScopeShared {
                tree,
                registry,
                metadata,
                stats: ScopeStats::default(),
            }),
            root,
        }
    }

    /// 根层级访问器
    pub fn root(&self) -> ContextAccessor {
        ContextAccessor {
            shared: self.shared.clone(),
            node: self.root,
        }
    }

    /// 统计快照
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// 节点诊断信息
    pub fn node_info(&self, node: NodeId) -> NodeInfo {
        self.shared.tree.node_info(node)
    }
}

/// 绑定到激活节点的作用域解析器
///
/// 交给 [`ServiceRegistry::instantiate`] 使用：实例化过程中的
/// 嵌套依赖获取经由这里回到同一个激活节点的链上。
pub struct Resolver<'a> {
    pub(crate) shared: &'a Arc<ScopeShared>,
    pub(crate) active: NodeId,
    pub(crate) op: Uuid,
}

impl Resolver<'_> {
    /// 激活节点
    pub fn active(&self) -> NodeId {
        self.active
    }

    /// 纯链查找；落空不是错误
    pub fn lookup(&self, name: &str) -> Option<Instance> {
        lookup_from(self.shared, self.active, name)
    }

    /// 带工厂的获取或创建
    ///
    /// 激活节点的链上已有同名条目（或名称是层级访问器）时
    /// 原样返回，工厂不会被再次调用；否则调用工厂、判定目标
    /// 节点、存入并返回。
    pub fn get_with<F>(&self, name: &str, factory: F) -> Result<Instance, ScopeError>
    where
        F: FnOnce(&Resolver<'_>) -> Result<Instance, ScopeError>,
    {
        if let Some(existing) = lookup_from(self.shared, self.active, name) {
            return Ok(existing);
        }
        self.shared.stats.record_factory_invocation();
        let instance = factory(self)?;
        let target = self.target_node_for(&instance)?;
        debug!(
            "placing service '{}' at node {} (op {})",
            name,
            target.index(),
            self.op
        );
        self.shared.tree.put(target, name, instance.clone());
        self.shared.stats.record_placement();
        Ok(instance)
    }

    /// 以注册表为工厂的获取或创建
    pub fn get(&self, name: &str) -> Result<Instance, ScopeError> {
        self.get_with(name, |resolver| {
            self.shared.registry.instantiate(name, resolver)
        })
    }

    /// 目标节点判定
    ///
    /// 实例类型带目标层级规则时解析为具体名称并定位拥有它的
    /// 祖先节点；祖先链上找不到该层级是致命的配置错误。
    /// 没有规则时目标就是激活节点。
    fn target_node_for(&self, instance: &Instance) -> Result<NodeId, ScopeError> {
        let ty = runtime_type_of(instance);
        let rule = match self.shared.metadata.target_rule(ty) {
            None => return Ok(self.active),
            Some(rule) => rule,
        };
        let target_name = match rule {
            TargetRule::Named(name) => name,
            TargetRule::Typed(key) => self.shared.registry.unique_name_for_type(key)?,
        };
        owning_node_from(self.shared, self.active, &target_name).ok_or_else(|| {
            ScopeError::MissingTargetLevel {
                type_name: format!("{:?}", ty),
                target_name,
            }
        })
    }
}

/// 当前层级访问器
///
/// 查找解析到层级访问器类型时返回的句柄，同时是对外获取一个
/// 全新作用域对象图的唯一入口。句柄只是节点的轻量视图，
/// 可以随意克隆。
#[derive(Clone)]
pub struct ContextAccessor {
    shared: Arc<ScopeShared>,
    node: NodeId,
}

impl ContextAccessor {
    /// 访问器对应的节点
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// 节点诊断信息
    pub fn info(&self) -> NodeInfo {
        self.shared.tree.node_info(self.node)
    }

    /// 沿本层级链查找
    pub fn lookup(&self, name: &str) -> Option<Instance> {
        lookup_from(&self.shared, self.node, name)
    }

    /// 拥有条目的节点
    pub fn owning_node(&self, name: &str) -> Option<NodeId> {
        owning_node_from(&self.shared, self.node, name)
    }

    /// 插入或覆盖本层级条目
    pub fn put(&self, name: impl Into<String>, instance: Instance) {
        self.shared.tree.put(self.node, name, instance);
    }

    /// 本层级自身条目的快照
    pub fn local_entries(&self) -> Vec<(String, Instance)> {
        self.shared.tree.local_entries(self.node)
    }

    /// 在本层级之下分配一个空的子层级
    pub fn sub_level(&self) -> ContextAccessor {
        ContextAccessor {
            shared: self.shared.clone(),
            node: self.shared.tree.new_child(self.node),
        }
    }

    /// 绑定到本层级的解析器
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver {
            shared: &self.shared,
            active: self.node,
            op: Uuid::new_v4(),
        }
    }

    /// 在子上下文中按名称创建服务
    ///
    /// 分配子节点并激活，驱动注册表实例化（嵌套依赖落入同一
    /// 子节点），随后对子节点本批次条目运行循环回引注入。
    /// 无论成功失败，先恢复传入槽的激活状态，再返回结果。
    pub fn create_in_sub_context(
        &self,
        cx: &mut ActiveScope,
        name: &str,
    ) -> Result<Instance, ScopeError> {
        let child = self.shared.tree.new_child(self.node);
        self.shared.stats.record_sub_context();
        let op = Uuid::new_v4();
        debug!(
            "creating service '{}' in sub-context {} (op {})",
            name,
            child.index(),
            op
        );

        let previous = cx.activate(child);
        let outcome = self.drive(child, name, op);
        cx.restore(previous);

        if let Err(err) = &outcome {
            err.log();
        }
        outcome
    }

    /// 在子上下文中按类型创建服务
    ///
    /// 先经注册表解析唯一名称；零个或多个候选在分配任何节点
    /// 之前就失败，不会创建实例。
    pub fn create_in_sub_context_by_type(
        &self,
        cx: &mut ActiveScope,
        key: TypeKey,
    ) -> Result<Instance, ScopeError> {
        let name = self.shared.registry.unique_name_for_type(key)?;
        self.create_in_sub_context(cx, &name)
    }

    /// 按类型创建的泛型便捷形式
    pub fn create_in_sub_context_of<T: ?Sized + 'static>(
        &self,
        cx: &mut ActiveScope,
    ) -> Result<Instance, ScopeError> {
        self.create_in_sub_context_by_type(cx, TypeKey::of::<T>())
    }

    fn drive(&self, child: NodeId, name: &str, op: Uuid) -> Result<Instance, ScopeError> {
        let resolver = Resolver {
            shared: &self.shared,
            active: child,
            op,
        };
        let instance = resolver.get(name)?;
        // 顶层实例产出后，本次创建落入子节点的条目整体参与回引注入
        circular::wire_batch(&resolver)?;
        Ok(instance)
    }
}

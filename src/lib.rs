//! 分层上下文容器
//!
//! 提供按逻辑层级嵌套的对象实例容器，支持：
//! - 沿父链回退的最近者优先名称查找
//! - 子上下文的按需创建与显式激活状态跟踪
//! - 目标层级声明（实例落到拥有指定条目的祖先节点）
//! - 互相依赖对象的循环回引后期绑定注入
//!
//! 对象的实际创建与声明元数据分别来自 [`ServiceRegistry`] 和
//! [`MetadataSource`] 两个协作接口；容器本身不拥有任何
//! 线格式或持久化状态。

mod circular;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod metadata;
pub mod registry;
pub mod scope;
pub mod stats;

// 重新导出API
pub use context::{ContextTree, NodeId, NodeInfo};
pub use dispatch::{Dispatcher, RouteTable};
pub use error::ScopeError;
pub use metadata::{BackRefSlot, MetadataSource, MetadataTable, SlotSetter, TargetRule};
pub use registry::{Instance, ServiceRegistry, TypeKey};
pub use scope::{ActiveScope, ContextAccessor, Resolver, ScopeContainer};
pub use stats::StatsSnapshot;

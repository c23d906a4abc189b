//! 服务元数据声明表
//!
//! 以预先登记的声明表取代运行期反射扫描，支持：
//! - 目标层级规则（类型 → 显式名称或类型）
//! - 循环回引写槽（类型 → 槽位列表）
//! - 能力接口声明（对端匹配时视同运行期类型）

use crate::error::ScopeError;
use crate::registry::{runtime_type_of, Instance, TypeKey};
use dashmap::DashMap;
use log::debug;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// 目标层级规则
///
/// 指明实例应当落在激活节点的哪个祖先：拥有显式名称条目的
/// 节点，或拥有该类型唯一名称条目的节点。每个类型最多一条。
#[derive(Debug, Clone)]
pub enum TargetRule {
    /// 显式名称
    Named(String),
    /// 经注册表解析唯一名称的类型
    Typed(TypeKey),
}

/// 写槽注入函数
///
/// 参数依次为被写入的实例与要写入的值，内部完成向下转型。
pub type SlotSetter = Arc<dyn Fn(&Instance, &Instance) -> Result<(), ScopeError> + Send + Sync>;

/// 循环回引写槽声明
///
/// 对象上一个命名的、带类型的后期绑定写入点，在双方实例都
/// 存在之后由注入过程填充。声明的参数个数必须恰好为一。
#[derive(Clone)]
pub struct BackRefSlot {
    name: String,
    required: TypeKey,
    arity: usize,
    apply: SlotSetter,
}

impl BackRefSlot {
    /// 原始构造：定义层自带注入闭包
    ///
    /// 能力接口类型的写槽走这里，闭包自行处理具体类型转换。
    pub fn new(
        name: impl Into<String>,
        required: TypeKey,
        arity: usize,
        apply: SlotSetter,
    ) -> Self {
        Self {
            name: name.into(),
            required,
            arity,
            apply,
        }
    }

    /// 常用构造：具体类型之间的写槽，转型由容器代劳
    pub fn of<B, V, F>(name: &str, write: F) -> Self
    where
        B: Send + Sync + 'static,
        V: Send + Sync + 'static,
        F: Fn(&B, Arc<V>) + Send + Sync + 'static,
    {
        let slot_name = name.to_string();
        let apply: SlotSetter = Arc::new(move |bean, value| {
            let bean = (**bean).downcast_ref::<B>().ok_or_else(|| {
                ScopeError::TypeCastFailed {
                    expected: std::any::type_name::<B>().to_string(),
                    actual: format!("{:?}", runtime_type_of(bean)),
                    context: format!("write slot '{}'", slot_name),
                }
            })?;
            let value =
                value
                    .clone()
                    .downcast::<V>()
                    .map_err(|_| ScopeError::TypeCastFailed {
                        expected: std::any::type_name::<V>().to_string(),
                        actual: format!("{:?}", runtime_type_of(value)),
                        context: format!("write slot '{}'", slot_name),
                    })?;
            write(bean, value);
            Ok(())
        });
        Self {
            name: name.to_string(),
            required: TypeKey::of::<V>(),
            arity: 1,
            apply,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 必需类型
    pub fn required(&self) -> TypeKey {
        self.required
    }

    /// 声明的参数个数
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub(crate) fn apply(&self, bean: &Instance, value: &Instance) -> Result<(), ScopeError> {
        (self.apply)(bean, value)
    }
}

impl fmt::Debug for BackRefSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackRefSlot")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("arity", &self.arity)
            .finish()
    }
}

/// 元数据来源
///
/// 容器消费的声明接口；[`MetadataTable`] 是其标准实现，
/// 对象定义层也可以自带实现。
pub trait MetadataSource: Send + Sync {
    /// 类型的目标层级规则，最多一条
    fn target_rule(&self, ty: TypeId) -> Option<TargetRule>;

    /// 类型声明的循环回引写槽
    fn back_ref_slots(&self, ty: TypeId) -> Vec<BackRefSlot>;

    /// 类型声明实现的能力接口
    fn capabilities(&self, ty: TypeId) -> Vec<TypeKey>;
}

/// 预先登记的元数据表
///
/// 在任何创建操作之前由对象定义层填充；之后只读，
/// 并发读取无须外部同步。
#[derive(Default)]
pub struct MetadataTable {
    target_rules: DashMap<TypeId, TargetRule>,
    back_refs: DashMap<TypeId, Vec<BackRefSlot>>,
    capabilities: DashMap<TypeId, Vec<TypeKey>>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记目标层级规则；重复登记时后者覆盖前者
    pub fn declare_target_level<T: ?Sized + 'static>(&self, rule: TargetRule) {
        debug!(
            "declared target level {:?} for {}",
            rule,
            std::any::type_name::<T>()
        );
        self.target_rules.insert(TypeId::of::<T>(), rule);
    }

    /// 登记循环回引写槽
    ///
    /// 参数个数在登记时校验：不为一的声明立刻以
    /// [`ScopeError::MalformedInjectionPoint`] 拒绝，与后续
    /// 解析是否成功无关。
    pub fn declare_back_ref<T: ?Sized + 'static>(&self, slot: BackRefSlot) -> Result<(), ScopeError> {
        if slot.arity() != 1 {
            return Err(ScopeError::MalformedInjectionPoint {
                type_name: std::any::type_name::<T>().to_string(),
                slot_name: slot.name().to_string(),
                arity: slot.arity(),
            });
        }
        debug!(
            "declared back-reference slot '{}' (required {}) on {}",
            slot.name(),
            slot.required(),
            std::any::type_name::<T>()
        );
        self.back_refs
            .entry(TypeId::of::<T>())
            .or_default()
            .push(slot);
        Ok(())
    }

    /// 登记能力接口
    pub fn declare_capability<T: ?Sized + 'static>(&self, key: TypeKey) {
        self.capabilities
            .entry(TypeId::of::<T>())
            .or_default()
            .push(key);
    }
}

impl MetadataSource for MetadataTable {
    fn target_rule(&self, ty: TypeId) -> Option<TargetRule> {
        self.target_rules.get(&ty).map(|rule| rule.clone())
    }

    fn back_ref_slots(&self, ty: TypeId) -> Vec<BackRefSlot> {
        self.back_refs
            .get(&ty)
            .map(|slots| slots.clone())
            .unwrap_or_default()
    }

    fn capabilities(&self, ty: TypeId) -> Vec<TypeKey> {
        self.capabilities
            .get(&ty)
            .map(|keys| keys.clone())
            .unwrap_or_default()
    }
}

/// 便捷的回引槽声明宏
///
/// `back_ref!(table, Editor => Buffer, "buffer", |editor, buffer| ...)`
#[macro_export]
macro_rules! back_ref {
    ($table:expr, $bean:ty => $value:ty, $slot:expr, $write:expr) => {
        $table.declare_back_ref::<$bean>($crate::metadata::BackRefSlot::of::<$bean, $value, _>(
            $slot, $write,
        ))
    };
}

//! 循环回引注入
//!
//! 普通的单遍构造无法满足互相依赖的对象对：A 的构造需要 B，
//! B 又需要指回 A。这里在一次创建批次全部落位之后运行，
//! 为声明了回引写槽的实例找到对端并双向写入。

use crate::error::ScopeError;
use crate::metadata::BackRefSlot;
use crate::registry::{runtime_type_of, Instance};
use crate::scope::Resolver;
use log::debug;
use std::any::TypeId;

/// 对激活节点的本批次条目运行循环回引注入
///
/// 批次是快照：注入过程中经解析器补建的对端会进入节点，
/// 但不会追加进本次扫描。
pub(crate) fn wire_batch(resolver: &Resolver<'_>) -> Result<(), ScopeError> {
    let batch = resolver.shared.tree.local_entries(resolver.active());
    for (name, bean) in &batch {
        wire_instance(resolver, name, bean)?;
    }
    Ok(())
}

fn wire_instance(resolver: &Resolver<'_>, name: &str, bean: &Instance) -> Result<(), ScopeError> {
    let bean_ty = runtime_type_of(bean);
    let slots = resolver.shared.metadata.back_ref_slots(bean_ty);
    if slots.is_empty() {
        return Ok(());
    }

    // 声明扫描先于任何解析：参数个数不合法立刻失败
    for slot in &slots {
        check_arity(bean_ty, slot)?;
    }

    for slot in &slots {
        let partner_name = resolver
            .shared
            .registry
            .unique_name_for_type(slot.required())?;
        // 链上已有则直接使用，否则经作用域解析器补建；
        // 补建不会开启新的子上下文
        let partner = resolver.get(&partner_name)?;
        slot.apply(bean, &partner)?;
        wire_reciprocal(resolver, name, bean, bean_ty, slot, &partner)?;
        resolver.shared.stats.record_circular_link();
        debug!(
            "wired back-reference '{}' of service '{}' to '{}'",
            slot.name(),
            name,
            partner_name
        );
    }
    Ok(())
}

/// 在对端实例上寻找指回本实例的写槽并注入
///
/// 匹配条件：槽的必需类型等于本实例的运行期类型，或本实例
/// 声明的某个能力接口。找不到任何匹配说明声明没有对端回引，
/// 按编程错误处理。
fn wire_reciprocal(
    resolver: &Resolver<'_>,
    name: &str,
    bean: &Instance,
    bean_ty: TypeId,
    origin_slot: &BackRefSlot,
    partner: &Instance,
) -> Result<(), ScopeError> {
    let partner_ty = runtime_type_of(partner);
    let partner_slots = resolver.shared.metadata.back_ref_slots(partner_ty);
    let capabilities = resolver.shared.metadata.capabilities(bean_ty);

    let mut wired = false;
    for slot in &partner_slots {
        check_arity(partner_ty, slot)?;
        let required = slot.required().id();
        if required == bean_ty || capabilities.iter().any(|key| key.id() == required) {
            slot.apply(partner, bean)?;
            wired = true;
        }
    }

    if !wired {
        return Err(ScopeError::OrphanedCircularDeclaration {
            service_name: name.to_string(),
            required_type: origin_slot.required().name().to_string(),
        });
    }
    Ok(())
}

fn check_arity(ty: TypeId, slot: &BackRefSlot) -> Result<(), ScopeError> {
    if slot.arity() != 1 {
        return Err(ScopeError::MalformedInjectionPoint {
            type_name: format!("{:?}", ty),
            slot_name: slot.name().to_string(),
            arity: slot.arity(),
        });
    }
    Ok(())
}

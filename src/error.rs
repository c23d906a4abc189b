//! 作用域容器错误类型
//!
//! 提供统一的致命错误分类和详细的日志记录。
//! 普通的名称查找落空不是错误，以 `Option` 形式返回给调用方。

use log::{error, warn};
use std::fmt;

/// 作用域容器统一错误类型
///
/// 所有致命错误都会中止当前的创建操作；激活状态先被恢复，
/// 错误再原样向外传播，没有部分成功的中间态。
#[derive(Debug)]
pub enum ScopeError {
    /// 按类型解析名称时没有任何候选
    NoCandidate {
        type_name: String,
    },
    /// 按类型解析名称时存在多个候选
    AmbiguousCandidate {
        type_name: String,
        candidates: Vec<String>,
    },
    /// 声明的目标层级没有出现在激活节点的祖先链中
    MissingTargetLevel {
        type_name: String,
        target_name: String,
    },
    /// 循环注入写槽声明的参数个数不为一
    MalformedInjectionPoint {
        type_name: String,
        slot_name: String,
        arity: usize,
    },
    /// 循环注入声明没有对端回引
    OrphanedCircularDeclaration {
        service_name: String,
        required_type: String,
    },
    /// 类型转换失败
    TypeCastFailed {
        expected: String,
        actual: String,
        context: String,
    },
    /// 服务创建失败 - 包含服务信息和底层错误
    CreationFailed {
        service_name: String,
        reason: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ScopeError {
    /// 包装注册表内部错误的便捷构造
    pub fn creation_failed(
        service_name: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        ScopeError::CreationFailed {
            service_name: service_name.into(),
            reason: source.to_string(),
            source: Some(source),
        }
    }

    /// 记录错误到日志
    ///
    /// 配置类错误（声明、层级、歧义）按 error 级别记录，
    /// 创建失败按 warn 级别记录，由调用方决定是否重试整个请求。
    pub fn log(&self) {
        match self {
            ScopeError::CreationFailed { .. } => {
                warn!("{}", self);
            }
            _ => {
                error!("{}", self);
            }
        }
    }
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeError::NoCandidate { type_name } => {
                write!(f, "no service registered for requested type {}", type_name)
            }
            ScopeError::AmbiguousCandidate {
                type_name,
                candidates,
            } => {
                write!(
                    f,
                    "{} services registered for requested type {}. can only resolve by type if the name is unambiguous: {}",
                    candidates.len(),
                    type_name,
                    candidates.join(", ")
                )
            }
            ScopeError::MissingTargetLevel {
                type_name,
                target_name,
            } => {
                write!(
                    f,
                    "no service named '{}' was found in any parent context. {} has to be created in a sub-context of the context owning '{}'",
                    target_name, type_name, target_name
                )
            }
            ScopeError::MalformedInjectionPoint {
                type_name,
                slot_name,
                arity,
            } => {
                write!(
                    f,
                    "injection slot '{}' declared on {} requires exactly one parameter, found {}",
                    slot_name, type_name, arity
                )
            }
            ScopeError::OrphanedCircularDeclaration {
                service_name,
                required_type,
            } => {
                write!(
                    f,
                    "service '{}' declared a circular back-reference of type {} but no reciprocal back-reference was found on {}",
                    service_name, required_type, required_type
                )
            }
            ScopeError::TypeCastFailed {
                expected,
                actual,
                context,
            } => {
                write!(
                    f,
                    "type cast failed: expected {}, got {} in {}",
                    expected, actual, context
                )
            }
            ScopeError::CreationFailed {
                service_name,
                reason,
                source,
            } => {
                write!(f, "failed to create service '{}': {}", service_name, reason)?;
                if let Some(source) = source {
                    write!(f, ". caused by: {}", source)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ScopeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_candidate_lists_all_names() {
        let err = ScopeError::AmbiguousCandidate {
            type_name: "demo::Widget".to_string(),
            candidates: vec!["widgetA".to_string(), "widgetB".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("2 services registered"));
        assert!(message.contains("widgetA, widgetB"));
    }

    #[test]
    fn creation_failed_carries_source() {
        let source: Box<dyn std::error::Error + Send + Sync> =
            "backing store offline".to_string().into();
        let err = ScopeError::creation_failed("sessionStore", source);
        let message = err.to_string();
        assert!(message.contains("sessionStore"));
        assert!(message.contains("backing store offline"));
    }
}

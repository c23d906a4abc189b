//! 容器统计信息（原子计数器）

use std::sync::atomic::{AtomicUsize, Ordering};

/// 内部统计计数器
///
/// 全部使用 Relaxed 原子操作，读侧通过 [`ScopeStats::snapshot`]
/// 获得一份普通数值的拷贝。
#[derive(Default)]
pub struct ScopeStats {
    lookups: AtomicUsize,
    chain_hits: AtomicUsize,
    factory_invocations: AtomicUsize,
    instances_placed: AtomicUsize,
    sub_contexts_created: AtomicUsize,
    circular_links_wired: AtomicUsize,
}

impl ScopeStats {
    pub(crate) fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_chain_hit(&self) {
        self.chain_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_factory_invocation(&self) {
        self.factory_invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_placement(&self) {
        self.instances_placed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sub_context(&self) {
        self.sub_contexts_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_circular_link(&self) {
        self.circular_links_wired.fetch_add(1, Ordering::Relaxed);
    }

    /// 当前计数的快照
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lookups: self.lookups.load(Ordering::Relaxed),
            chain_hits: self.chain_hits.load(Ordering::Relaxed),
            factory_invocations: self.factory_invocations.load(Ordering::Relaxed),
            instances_placed: self.instances_placed.load(Ordering::Relaxed),
            sub_contexts_created: self.sub_contexts_created.load(Ordering::Relaxed),
            circular_links_wired: self.circular_links_wired.load(Ordering::Relaxed),
        }
    }
}

/// 统计信息快照
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    /// 链上查找总次数
    pub lookups: usize,
    /// 查找命中次数（含层级访问器特例）
    pub chain_hits: usize,
    /// 工厂调用次数
    pub factory_invocations: usize,
    /// 实例落位次数
    pub instances_placed: usize,
    /// 子上下文创建次数
    pub sub_contexts_created: usize,
    /// 循环回引写入次数
    pub circular_links_wired: usize,
}

impl StatsSnapshot {
    /// 查找命中率
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.chain_hits as f64 / self.lookups as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = ScopeStats::default();
        stats.record_lookup();
        stats.record_lookup();
        stats.record_chain_hit();
        stats.record_factory_invocation();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.lookups, 2);
        assert_eq!(snapshot.chain_hits, 1);
        assert_eq!(snapshot.factory_invocations, 1);
        assert_eq!(snapshot.hit_rate(), 0.5);
    }

    #[test]
    fn empty_stats_have_zero_hit_rate() {
        assert_eq!(ScopeStats::default().snapshot().hit_rate(), 0.0);
    }
}

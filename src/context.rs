//! 上下文节点树
//!
//! 各层级节点以索引竞技场的形式集中保存，每个节点持有
//! 名称到实例的本地映射和指向父节点的索引。树只随创建事件
//! 向下生长，导航只能向上；父节点不追踪子节点。

use crate::registry::Instance;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

/// 竞技场中的节点索引
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// 节点诊断信息
#[derive(Debug, Clone)]
pub struct NodeInfo {
    /// 节点索引
    pub id: NodeId,
    /// 节点标识
    pub uuid: Uuid,
    /// 父节点索引
    pub parent: Option<NodeId>,
    /// 距根节点的深度
    pub depth: usize,
    /// 创建时间
    pub created_at: Instant,
    /// 本地条目数量
    pub entry_count: usize,
}

struct NodeData {
    parent: Option<NodeId>,
    entries: HashMap<String, Instance>,
    uuid: Uuid,
    depth: usize,
    created_at: Instant,
}

/// 上下文节点树
///
/// 条目映射只在节点作为激活节点期间被写入；创建完成后其他
/// 线程持有节点索引即可无锁语义地并发读取（内部读写锁只为
/// 竞技场本身的增长服务）。
pub struct ContextTree {
    nodes: RwLock<Vec<NodeData>>,
}

impl ContextTree {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
        }
    }

    /// 分配根节点
    pub fn new_root(&self) -> NodeId {
        self.alloc(None)
    }

    /// 在指定节点之下分配子节点
    pub fn new_child(&self, parent: NodeId) -> NodeId {
        self.alloc(Some(parent))
    }

    fn alloc(&self, parent: Option<NodeId>) -> NodeId {
        let mut nodes = self.nodes.write();
        let depth = parent.map(|p| nodes[p.0].depth + 1).unwrap_or(0);
        nodes.push(NodeData {
            parent,
            entries: HashMap::new(),
            uuid: Uuid::new_v4(),
            depth,
            created_at: Instant::now(),
        });
        NodeId(nodes.len() - 1)
    }

    /// 插入或覆盖本地条目
    ///
    /// 名称唯一性只在单个节点内成立；对祖先同名条目形成遮蔽
    /// 是有意为之，查找总是最近者优先。
    pub fn put(&self, node: NodeId, name: impl Into<String>, instance: Instance) {
        let mut nodes = self.nodes.write();
        nodes[node.0].entries.insert(name.into(), instance);
    }

    /// 沿父链查找最近的条目；根上仍未命中时返回 `None`
    pub fn get(&self, from: NodeId, name: &str) -> Option<Instance> {
        let nodes = self.nodes.read();
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let node = &nodes[id.0];
            if let Some(instance) = node.entries.get(name) {
                return Some(instance.clone());
            }
            cursor = node.parent;
        }
        None
    }

    /// 与 [`get`](Self::get) 相同的解析走法，返回拥有条目的节点
    pub fn owning_node(&self, from: NodeId, name: &str) -> Option<NodeId> {
        let nodes = self.nodes.read();
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            let node = &nodes[id.0];
            if node.entries.contains_key(name) {
                return Some(id);
            }
            cursor = node.parent;
        }
        None
    }

    /// 父节点索引
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.read()[node.0].parent
    }

    /// 单个节点自身条目的快照
    ///
    /// 循环回引注入以此为批次边界；注入过程中节点可能继续
    /// 收到新条目，不影响已取出的快照。
    pub fn local_entries(&self, node: NodeId) -> Vec<(String, Instance)> {
        let nodes = self.nodes.read();
        nodes[node.0]
            .entries
            .iter()
            .map(|(name, instance)| (name.clone(), instance.clone()))
            .collect()
    }

    /// 节点诊断信息
    pub fn node_info(&self, node: NodeId) -> NodeInfo {
        let nodes = self.nodes.read();
        let data = &nodes[node.0];
        NodeInfo {
            id: node,
            uuid: data.uuid,
            parent: data.parent,
            depth: data.depth,
            created_at: data.created_at,
            entry_count: data.entries.len(),
        }
    }
}

impl Default for ContextTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn instance(value: u32) -> Instance {
        Arc::new(value)
    }

    #[test]
    fn absent_name_resolves_to_none() {
        let tree = ContextTree::new();
        let root = tree.new_root();
        let child = tree.new_child(root);
        assert!(tree.get(child, "missing").is_none());
        assert!(tree.owning_node(child, "missing").is_none());
    }

    #[test]
    fn put_then_get_returns_value() {
        let tree = ContextTree::new();
        let root = tree.new_root();
        tree.put(root, "answer", instance(42));
        let found = tree.get(root, "answer").unwrap();
        assert_eq!(*found.downcast::<u32>().unwrap(), 42);
    }

    #[test]
    fn child_falls_back_to_parent() {
        let tree = ContextTree::new();
        let root = tree.new_root();
        let child = tree.new_child(root);
        tree.put(root, "shared", instance(7));
        let found = tree.get(child, "shared").unwrap();
        assert_eq!(*found.downcast::<u32>().unwrap(), 7);
        assert_eq!(tree.owning_node(child, "shared"), Some(root));
    }

    #[test]
    fn child_put_shadows_without_touching_parent() {
        let tree = ContextTree::new();
        let root = tree.new_root();
        let child = tree.new_child(root);
        tree.put(root, "value", instance(1));
        tree.put(child, "value", instance(2));

        let from_child = tree.get(child, "value").unwrap();
        assert_eq!(*from_child.downcast::<u32>().unwrap(), 2);
        // 父节点的同名条目不受子节点写入影响
        let from_root = tree.get(root, "value").unwrap();
        assert_eq!(*from_root.downcast::<u32>().unwrap(), 1);
        assert_eq!(tree.owning_node(child, "value"), Some(child));
    }

    #[test]
    fn local_entries_are_a_snapshot_of_one_node() {
        let tree = ContextTree::new();
        let root = tree.new_root();
        let child = tree.new_child(root);
        tree.put(root, "above", instance(1));
        tree.put(child, "a", instance(2));
        tree.put(child, "b", instance(3));

        let mut names: Vec<String> = tree
            .local_entries(child)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn node_info_tracks_depth_and_parentage() {
        let tree = ContextTree::new();
        let root = tree.new_root();
        let child = tree.new_child(root);
        let grandchild = tree.new_child(child);

        let info = tree.node_info(grandchild);
        assert_eq!(info.depth, 2);
        assert_eq!(info.parent, Some(child));
        assert_eq!(info.entry_count, 0);
        assert_ne!(tree.node_info(root).uuid, info.uuid);
    }
}

use super::rectangle::Rectangle;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 指向外部记录存储的句柄 `(block_id, slot)`
///
/// 索引只保存句柄，不复制记录本身；句柄对树而言是不透明的。
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[display(fmt = "block {} slot {}", block_id, slot)]
pub struct RecordHandle {
    pub block_id: u32,
    pub slot: u32,
}

impl RecordHandle {
    pub fn new(block_id: u32, slot: u32) -> Self {
        RecordHandle { block_id, slot }
    }
}

/// 查询结果中的叶子条目：记录的 MBR 与句柄
#[derive(Debug, Display, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[display(fmt = "{} -> {}", mbr, handle)]
pub struct LeafEntry {
    pub mbr: Rectangle,
    pub handle: RecordHandle,
}

impl LeafEntry {
    pub fn new(mbr: Rectangle, handle: RecordHandle) -> Self {
        LeafEntry { mbr, handle }
    }
}

/// R-tree节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    /// 叶子节点：只包含 `Entry::Data`
    Leaf,
    /// 索引节点：只包含 `Entry::Node`
    Index,
}

/// R-tree节点条目
///
/// 每个条目都包含一个MBR和对应的内容：
/// - Data条目：指向外部记录的句柄，只出现在叶子节点中
/// - Node条目：独占的子节点，只出现在索引节点中
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Entry {
    /// 数据条目
    Data {
        mbr: Rectangle,
        handle: RecordHandle,
    },

    /// 节点条目；`mbr` 始终等于 `node.mbr`
    Node { mbr: Rectangle, node: Box<Node> },
}

impl Entry {
    /// 由叶子条目构造数据条目
    pub fn data(leaf: LeafEntry) -> Self {
        Entry::Data {
            mbr: leaf.mbr,
            handle: leaf.handle,
        }
    }

    /// 把子节点包装成节点条目，条目的 MBR 取自子节点缓存的 MBR
    ///
    /// 空节点没有 MBR，返回 `None`。
    pub fn from_node(node: Node) -> Option<Self> {
        let mbr = node.mbr?;
        Some(Entry::Node {
            mbr,
            node: Box::new(node),
        })
    }

    /// 获取条目的MBR
    pub fn mbr(&self) -> &Rectangle {
        match self {
            Entry::Data { mbr, .. } => mbr,
            Entry::Node { mbr, .. } => mbr,
        }
    }

    /// 检查是否为数据条目
    pub fn is_data(&self) -> bool {
        matches!(self, Entry::Data { .. })
    }

    /// 数据条目转为 `LeafEntry`，节点条目返回 `None`
    pub fn as_leaf(&self) -> Option<LeafEntry> {
        match self {
            Entry::Data { mbr, handle } => Some(LeafEntry::new(*mbr, *handle)),
            Entry::Node { .. } => None,
        }
    }

    /// 获取节点条目的子节点引用
    pub fn child(&self) -> Option<&Node> {
        match self {
            Entry::Data { .. } => None,
            Entry::Node { node, .. } => Some(node),
        }
    }

    /// 获取节点条目的子节点引用（可变）
    pub fn child_mut(&mut self) -> Option<&mut Node> {
        match self {
            Entry::Data { .. } => None,
            Entry::Node { node, .. } => Some(node),
        }
    }

    /// 子节点变化后，把条目的 MBR 同步为子节点的 MBR
    pub fn refresh_mbr(&mut self) {
        if let Entry::Node { mbr, node } = self {
            if let Some(child_mbr) = node.mbr {
                *mbr = child_mbr;
            }
        }
    }
}

/// `Node::add_entry` 在节点已满时返回，附带被拒绝的条目
///
/// 只在引擎内部使用：调用方收到后立即分裂节点，从不暴露给用户。
#[derive(Debug, Error)]
#[error("node is full")]
pub struct NodeFull(pub Entry);

/// R-tree节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// 所有条目 MBR 的并集；仅在节点为空时为 `None`
    pub mbr: Option<Rectangle>,

    /// 节点包含的条目列表，长度不超过 `max_entries`
    pub entries: Vec<Entry>,

    pub node_type: NodeType,

    /// 节点在树中的层级，叶子层为 0
    pub level: usize,

    pub max_entries: usize,
}

impl Node {
    /// 创建新的叶子节点
    pub fn new_leaf_node(max_entries: usize) -> Self {
        Self::new(NodeType::Leaf, 0, max_entries)
    }

    /// 创建新的索引节点，`level` 必须 > 0
    pub fn new_index_node(level: usize, max_entries: usize) -> Self {
        Self::new(NodeType::Index, level, max_entries)
    }

    /// 创建指定类型和层级的空节点
    pub fn new(node_type: NodeType, level: usize, max_entries: usize) -> Self {
        Node {
            mbr: None,
            entries: Vec::with_capacity(max_entries + 1),
            node_type,
            level,
            max_entries,
        }
    }

    pub fn is_leaf_node(&self) -> bool {
        matches!(self.node_type, NodeType::Leaf)
    }

    pub fn is_index_node(&self) -> bool {
        matches!(self.node_type, NodeType::Index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 非根节点的最小填充数 ⌈M/2⌉
    pub fn min_entries(&self) -> usize {
        self.max_entries.div_ceil(2)
    }

    /// 重新计算节点的MBR为所有条目MBR的并集
    pub fn update_mbr(&mut self) {
        self.mbr = Rectangle::union_all(self.entries.iter().map(Entry::mbr));
    }

    /// 添加条目到节点
    ///
    /// 节点已满时返回 `NodeFull`，条目原样交还给调用方，节点保持不变。
    /// 调用者需要确保条目类型与节点类型匹配。
    pub fn add_entry(&mut self, entry: Entry) -> Result<(), NodeFull> {
        if self.is_full() {
            return Err(NodeFull(entry));
        }
        self.entries.push(entry);
        self.update_mbr();
        Ok(())
    }

    /// 移除指定位置的条目并更新MBR
    pub fn remove_entry(&mut self, index: usize) -> Option<Entry> {
        if index >= self.entries.len() {
            return None;
        }
        let entry = self.entries.remove(index);
        self.update_mbr();
        Some(entry)
    }

    /// 检查节点是否已满
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_entries
    }

    /// 检查节点是否低于最小填充数
    pub fn needs_more_entries(&self) -> bool {
        self.entries.len() < self.min_entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(x: f64, y: f64, slot: u32) -> Entry {
        Entry::Data {
            mbr: Rectangle::from_point(x, y),
            handle: RecordHandle::new(1, slot),
        }
    }

    #[test]
    fn test_node_creation() {
        let leaf_node = Node::new_leaf_node(4);
        assert!(leaf_node.is_leaf_node());
        assert!(!leaf_node.is_index_node());
        assert_eq!(leaf_node.level, 0);
        assert_eq!(leaf_node.mbr, None);

        let index_node = Node::new_index_node(1, 4);
        assert!(index_node.is_index_node());
        assert_eq!(index_node.level, 1);
        assert_eq!(index_node.node_type, NodeType::Index);
    }

    #[test]
    fn test_min_entries_rounds_up() {
        assert_eq!(Node::new_leaf_node(2).min_entries(), 1);
        assert_eq!(Node::new_leaf_node(3).min_entries(), 2);
        assert_eq!(Node::new_leaf_node(4).min_entries(), 2);
        assert_eq!(Node::new_leaf_node(9).min_entries(), 5);
    }

    #[test]
    fn test_node_update_mbr() {
        let mut node = Node::new_leaf_node(4);

        node.add_entry(Entry::Data {
            mbr: Rectangle::new(0.0, 0.0, 5.0, 5.0),
            handle: RecordHandle::new(1, 0),
        })
        .unwrap();
        node.add_entry(Entry::Data {
            mbr: Rectangle::new(3.0, 3.0, 8.0, 8.0),
            handle: RecordHandle::new(1, 1),
        })
        .unwrap();

        assert_eq!(node.mbr, Some(Rectangle::new(0.0, 0.0, 8.0, 8.0)));

        node.remove_entry(1);
        assert_eq!(node.mbr, Some(Rectangle::new(0.0, 0.0, 5.0, 5.0)));
        node.remove_entry(0);
        assert_eq!(node.mbr, None);
        assert!(node.remove_entry(0).is_none());
    }

    #[test]
    fn test_add_entry_when_full() {
        let mut node = Node::new_leaf_node(2);
        node.add_entry(data(0.0, 0.0, 0)).unwrap();
        node.add_entry(data(1.0, 1.0, 1)).unwrap();
        assert!(node.is_full());

        let NodeFull(rejected) = node.add_entry(data(2.0, 2.0, 2)).unwrap_err();
        assert_eq!(rejected.as_leaf().unwrap().handle, RecordHandle::new(1, 2));
        assert_eq!(node.len(), 2);
        assert_eq!(node.mbr, Some(Rectangle::new(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn test_entry_operations() {
        let data_entry = data(1.0, 2.0, 42);
        assert!(data_entry.is_data());
        assert_eq!(
            data_entry.as_leaf(),
            Some(LeafEntry::new(
                Rectangle::from_point(1.0, 2.0),
                RecordHandle::new(1, 42)
            ))
        );
        assert!(data_entry.child().is_none());

        let mut child = Node::new_leaf_node(4);
        child.add_entry(data(1.0, 1.0, 0)).unwrap();
        child.add_entry(data(6.0, 6.0, 1)).unwrap();
        let mut node_entry = Entry::from_node(child).unwrap();

        assert!(!node_entry.is_data());
        assert_eq!(node_entry.as_leaf(), None);
        assert_eq!(node_entry.mbr(), &Rectangle::new(1.0, 1.0, 6.0, 6.0));

        node_entry
            .child_mut()
            .unwrap()
            .add_entry(data(9.0, 0.0, 2))
            .unwrap();
        node_entry.refresh_mbr();
        assert_eq!(node_entry.mbr(), &Rectangle::new(1.0, 0.0, 9.0, 6.0));
    }

    #[test]
    fn test_empty_child_has_no_entry() {
        assert!(Entry::from_node(Node::new_leaf_node(4)).is_none());
        assert!(Entry::from_node(Node::new_index_node(1, 4)).is_none());
    }

    #[test]
    fn test_display() {
        let leaf = LeafEntry::new(Rectangle::new(0.0, 1.0, 2.0, 3.0), RecordHandle::new(4, 5));
        assert_eq!(leaf.handle.to_string(), "block 4 slot 5");
        assert_eq!(leaf.to_string(), "[0, 1, 2, 3] -> block 4 slot 5");
    }
}

use super::node::{Entry, LeafEntry, Node, NodeType, RecordHandle};
use super::rectangle::Rectangle;
use crate::storage::adapter::{StorageAdapter, StorageError};
use crate::storage::data_file::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 引擎对调用方报告的错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RTreeError {
    /// 矩形坐标非有限值，或某一轴上 min > max
    #[error("invalid MBR {0}: coordinates must be finite and min <= max on both axes")]
    InvalidMbr(Rectangle),

    /// k-NN 查询点坐标非有限值
    #[error("invalid query point ({x}, {y}): coordinates must be finite")]
    InvalidPoint { x: f64, y: f64 },
}

/// 插入结果
///
/// 索引日志只是旁路记录：日志写入失败时插入依然生效，失败以警告形式返回。
#[derive(Debug)]
pub enum InsertOutcome {
    /// 已插入；若挂载了存储适配器，索引条目也已追加
    Inserted,
    /// 已插入，但索引日志追加失败
    LogFailed(StorageError),
}

impl InsertOutcome {
    pub fn is_logged(&self) -> bool {
        matches!(self, InsertOutcome::Inserted)
    }

    pub fn log_error(&self) -> Option<&StorageError> {
        match self {
            InsertOutcome::Inserted => None,
            InsertOutcome::LogFailed(err) => Some(err),
        }
    }
}

/// 删除结果：`NotFound` 表示幂等的空操作，不是错误
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeleteOutcome {
    Deleted(LeafEntry),
    NotFound,
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted(_))
    }
}

/// 用于JSON序列化的简化树结构
#[derive(Debug, Serialize, Deserialize)]
pub struct TreeVisualization {
    pub root: NodeVisualization,
    pub config: TreeConfig,
}

/// 用于JSON序列化的树配置
#[derive(Debug, Serialize, Deserialize)]
pub struct TreeConfig {
    pub max_entries: usize,
    pub min_entries: usize,
}

/// 用于JSON序列化的节点结构
#[derive(Debug, Serialize, Deserialize)]
pub struct NodeVisualization {
    pub mbr: Option<Rectangle>,
    pub node_type: NodeType,
    pub level: usize,
    /// 数据条目（仅叶子节点）
    pub data_entries: Vec<LeafEntry>,
    /// 子节点（仅索引节点）
    pub child_nodes: Vec<NodeVisualization>,
}

/// R*-tree 主结构
///
/// 树完全驻留内存，子节点所有权严格自上而下（没有父指针）。
/// 可选地挂载一个 [`StorageAdapter`]：插入时追加索引日志，`resolve` 时读取记录。
pub struct RTree {
    root: Box<Node>,
    /// 最大条目数M
    max_entries: usize,
    /// 最小条目数m = ⌈M/2⌉
    min_entries: usize,
    pub(crate) storage: Option<Box<dyn StorageAdapter>>,
}

impl fmt::Debug for RTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RTree")
            .field("root", &self.root)
            .field("max_entries", &self.max_entries)
            .field("min_entries", &self.min_entries)
            .field("storage", &self.storage.is_some())
            .finish()
    }
}

impl Default for RTree {
    /// 使用默认参数创建R-tree（M=4，与原始菜单程序一致）
    fn default() -> Self {
        Self::new(4)
    }
}

impl RTree {
    /// 创建新的R-tree，根节点为空叶子
    pub fn new(max_entries: usize) -> Self {
        assert!(max_entries >= 2, "Max entries must be at least 2");

        RTree {
            root: Box::new(Node::new_leaf_node(max_entries)),
            max_entries,
            min_entries: max_entries.div_ceil(2),
            storage: None,
        }
    }

    /// 创建挂载了存储适配器的R-tree
    pub fn with_storage(max_entries: usize, storage: Box<dyn StorageAdapter>) -> Self {
        let mut tree = Self::new(max_entries);
        tree.storage = Some(storage);
        tree
    }

    /// 挂载（或替换）存储适配器，返回旧的适配器
    pub fn attach_storage(
        &mut self,
        storage: Box<dyn StorageAdapter>,
    ) -> Option<Box<dyn StorageAdapter>> {
        self.storage.replace(storage)
    }

    pub fn detach_storage(&mut self) -> Option<Box<dyn StorageAdapter>> {
        self.storage.take()
    }

    pub fn storage_mut(&mut self) -> Option<&mut (dyn StorageAdapter + 'static)> {
        self.storage.as_deref_mut()
    }

    /// 通过存储适配器取回句柄对应的记录
    pub fn resolve(&mut self, handle: RecordHandle) -> Result<Record, StorageError> {
        match self.storage.as_mut() {
            Some(storage) => storage.resolve(handle),
            None => Err(StorageError::NoStorage),
        }
    }

    /// 检查R-tree是否为空
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// 获取R-tree的根节点MBR，空树为 `None`
    pub fn root_mbr(&self) -> Option<Rectangle> {
        self.root.mbr
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn min_entries(&self) -> usize {
        self.min_entries
    }

    /// 树的高度；只有一个叶子根时为 1
    pub fn depth(&self) -> usize {
        self.root.level + 1
    }

    /// 叶子记录总数
    pub fn len(&self) -> usize {
        Self::count_entries(&self.root)
    }

    fn count_entries(node: &Node) -> usize {
        if node.is_leaf_node() {
            node.entries.len()
        } else {
            node.entries
                .iter()
                .filter_map(Entry::child)
                .map(Self::count_entries)
                .sum()
        }
    }

    pub(crate) fn root_mut(&mut self) -> &mut Box<Node> {
        &mut self.root
    }

    pub(crate) fn check_mbr(&self, mbr: &Rectangle) -> Result<(), RTreeError> {
        if mbr.is_valid() {
            Ok(())
        } else {
            Err(RTreeError::InvalidMbr(*mbr))
        }
    }

    /// 导出树结构为JSON格式
    pub fn export_to_json(&self) -> Result<String, serde_json::Error> {
        let visualization = TreeVisualization {
            root: Self::create_node_visualization(&self.root),
            config: TreeConfig {
                max_entries: self.max_entries,
                min_entries: self.min_entries,
            },
        };
        serde_json::to_string_pretty(&visualization)
    }

    fn create_node_visualization(node: &Node) -> NodeVisualization {
        let mut data_entries = Vec::new();
        let mut child_nodes = Vec::new();

        for entry in &node.entries {
            match entry {
                Entry::Data { mbr, handle } => data_entries.push(LeafEntry::new(*mbr, *handle)),
                Entry::Node { node: child, .. } => {
                    child_nodes.push(Self::create_node_visualization(child))
                }
            }
        }

        NodeVisualization {
            mbr: node.mbr,
            node_type: node.node_type,
            level: node.level,
            data_entries,
            child_nodes,
        }
    }
}

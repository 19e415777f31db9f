use super::super::node::{Entry, Node};
use super::super::rtree::RTree;
use tracing::warn;

/// R-tree工具函数实现
///
/// 节点没有父指针：所有向上的操作都由从根出发的下标路径 `&[usize]` 驱动，
/// `path[i]` 是第 i 层节点在其父节点 `entries` 中的位置。
impl RTree {
    /// 向上调整树 - 更新MBR
    ///
    /// 从路径末端的节点开始，逐层重算节点MBR，并同步父节点中指向它的条目MBR，直到根节点。
    pub(crate) fn adjust_tree_upward(&mut self, path: &[usize]) {
        for depth in (0..=path.len()).rev() {
            let child_index = path.get(depth).copied();
            let Some(node) = self.get_last_node_mut(&path[..depth]) else {
                warn!(depth, "failed to resolve node while adjusting MBRs");
                return;
            };

            if let Some(entry) = child_index.and_then(|i| node.entries.get_mut(i)) {
                entry.refresh_mbr();
            }
            node.update_mbr();
        }
    }

    /// 获取路径中最后一个节点的可变引用
    ///
    /// 根据给定的路径从根节点开始遍历，返回路径末端节点的可变引用
    pub(crate) fn get_last_node_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let mut current: &mut Node = self.root_mut();

        for &index in path {
            if let Some(Entry::Node { node, .. }) = current.entries.get_mut(index) {
                current = &mut **node;
            } else {
                return None;
            }
        }

        Some(current)
    }

    /// 获取路径中最后一个节点的不可变引用
    pub(crate) fn get_last_node(&self, path: &[usize]) -> Option<&Node> {
        let mut current: &Node = self.root();

        for &index in path {
            current = current.entries.get(index)?.child()?;
        }

        Some(current)
    }
}

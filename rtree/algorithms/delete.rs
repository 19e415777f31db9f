use super::super::node::{Entry, Node};
use super::super::rectangle::Rectangle;
use super::super::rtree::{DeleteOutcome, RTree, RTreeError};
use tracing::{debug, error};

/// R-tree删除算法实现
impl RTree {
    /// 删除第一个MBR与 `mbr` 完全相等的叶子条目
    ///
    /// 找不到时返回 `DeleteOutcome::NotFound`，树保持不变。
    /// 删除后按 CondenseTree 处理下溢：下溢节点整体摘除，其条目在原层级重新插入；
    /// 最后若根是只剩一个子节点的索引节点，则逐层缩短树。
    pub fn delete(&mut self, mbr: &Rectangle) -> Result<DeleteOutcome, RTreeError> {
        self.check_mbr(mbr)?;

        // D1: 找到包含目标条目的叶子节点
        let Some((leaf_path, index)) = self.find_leaf_path(mbr) else {
            return Ok(DeleteOutcome::NotFound);
        };

        // D2: 从叶子节点删除条目
        let removed = {
            let Some(leaf) = self.get_last_node_mut(&leaf_path) else {
                error!(?leaf_path, "failed to resolve leaf during deletion");
                return Ok(DeleteOutcome::NotFound);
            };
            leaf.remove_entry(index).and_then(|entry| entry.as_leaf())
        };

        let Some(removed) = removed else {
            error!(?leaf_path, index, "located entry vanished during deletion");
            return Ok(DeleteOutcome::NotFound);
        };

        // D3: 向上压缩，D4: 缩短树
        self.condense_tree(leaf_path);
        self.shorten_tree();

        Ok(DeleteOutcome::Deleted(removed))
    }

    /// 查找MBR完全相等的叶子条目，返回叶子路径和条目下标
    ///
    /// 只下降到MBR包含目标矩形的子树中。
    pub(crate) fn find_leaf_path(&self, rect: &Rectangle) -> Option<(Vec<usize>, usize)> {
        let mut path = Vec::new();
        let index = self.find_leaf_recursive(self.root(), rect, &mut path)?;
        Some((path, index))
    }

    fn find_leaf_recursive(
        &self,
        node: &Node,
        rect: &Rectangle,
        path: &mut Vec<usize>,
    ) -> Option<usize> {
        if node.is_leaf_node() {
            return node
                .entries
                .iter()
                .position(|entry| entry.is_data() && entry.mbr() == rect);
        }

        for (i, entry) in node.entries.iter().enumerate() {
            if let Entry::Node {
                mbr,
                node: child_node,
            } = entry
            {
                if mbr.contains(rect) {
                    path.push(i);
                    if let Some(index) = self.find_leaf_recursive(child_node, rect, path) {
                        return Some(index);
                    }
                    path.pop();
                }
            }
        }

        None
    }

    /// CondenseTree
    ///
    /// 从叶子沿路径向上：非根节点低于 ⌈M/2⌉ 时从父节点摘除，条目连同所在层级一起暂存；
    /// 否则只刷新它在父节点中的条目MBR。到达根后把暂存的条目逐个在原层级重新插入。
    pub(crate) fn condense_tree(&mut self, mut path: Vec<usize>) {
        let mut orphans: Vec<(Entry, usize)> = Vec::new();

        while let Some(child_index) = path.pop() {
            let Some(parent) = self.get_last_node_mut(&path) else {
                error!(?path, "failed to resolve parent during condense");
                break;
            };

            let underflow = parent
                .entries
                .get(child_index)
                .and_then(Entry::child)
                .is_some_and(Node::needs_more_entries);

            if underflow {
                if let Some(Entry::Node { node, .. }) = parent.remove_entry(child_index) {
                    debug!(
                        level = node.level,
                        entries = node.len(),
                        "dissolving underfull node"
                    );
                    let level = node.level;
                    orphans.extend(node.entries.into_iter().map(|entry| (entry, level)));
                }
            } else {
                if let Some(entry) = parent.entries.get_mut(child_index) {
                    entry.refresh_mbr();
                }
                parent.update_mbr();
            }
        }

        self.root_mut().update_mbr();

        // 先插高层的子树，再插叶子记录
        orphans.sort_by(|a, b| b.1.cmp(&a.1));
        for (entry, level) in orphans {
            self.reinsert(entry, level);
        }
    }

    /// 把摘除的条目放回 `level` 层
    ///
    /// 树在压缩过程中可能变矮，子树无法放到比根还高的层级时，拆成叶子记录逐条插入。
    fn reinsert(&mut self, entry: Entry, level: usize) {
        if level <= self.root().level {
            self.insert_entry(entry, level);
            return;
        }

        let mut stack = vec![entry];
        while let Some(entry) = stack.pop() {
            match entry {
                Entry::Data { .. } => self.insert_entry(entry, 0),
                Entry::Node { node, .. } => stack.extend(node.entries),
            }
        }
    }

    /// 缩短树：根是只有一个子节点的索引节点时，用该子节点替换根
    pub(crate) fn shorten_tree(&mut self) {
        loop {
            let root = self.root_mut();
            if !root.is_index_node() {
                return;
            }

            match root.entries.len() {
                0 => {
                    // 空的索引根退化为空叶子
                    **root = Node::new_leaf_node(root.max_entries);
                    return;
                }
                1 => {
                    if let Some(Entry::Node { node, .. }) = root.entries.pop() {
                        *root = node;
                        debug!(depth = self.depth(), "tree shortened");
                    }
                }
                _ => return,
            }
        }
    }
}

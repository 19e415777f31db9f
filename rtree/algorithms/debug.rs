use super::super::node::{Entry, Node};
use super::super::rectangle::Rectangle;
use super::super::rtree::RTree;
use serde::Serialize;
use std::fmt::Write;
use thiserror::Error;

/// 结构不变量被破坏时返回，`path` 为从根到出问题节点的下标路径
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invariant violated at node {path:?}: {reason}")]
pub struct InvariantViolation {
    pub path: Vec<usize>,
    pub reason: String,
}

/// 树的规模统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub records: usize,
    pub nodes: usize,
    pub leaves: usize,
    pub depth: usize,
}

/// R-tree调试功能实现
impl RTree {
    /// 检查整棵树的结构不变量，返回遇到的第一个问题
    ///
    /// - 节点缓存的MBR等于条目MBR的并集（空节点为 `None`）
    /// - 节点条目的MBR等于子节点的MBR
    /// - 叶子只含数据条目，索引节点只含节点条目，子节点层级恰好低一层
    /// - 非根节点条目数在 `[⌈M/2⌉, M]` 内，根不超过 M，索引根至少两个条目
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let root = self.root();
        let mut path = Vec::new();

        if root.is_index_node() && root.len() < 2 {
            return Err(violation(
                &path,
                format!("index root holds {} entries", root.len()),
            ));
        }
        if root.is_leaf_node() && root.level != 0 {
            return Err(violation(&path, format!("leaf root at level {}", root.level)));
        }

        self.check_node(root, true, &mut path)
    }

    fn check_node(
        &self,
        node: &Node,
        is_root: bool,
        path: &mut Vec<usize>,
    ) -> Result<(), InvariantViolation> {
        if node.max_entries != self.max_entries() {
            return Err(violation(
                path,
                format!(
                    "node capacity {} differs from tree capacity {}",
                    node.max_entries,
                    self.max_entries()
                ),
            ));
        }

        if node.len() > self.max_entries() {
            return Err(violation(
                path,
                format!("{} entries exceed capacity {}", node.len(), self.max_entries()),
            ));
        }
        if !is_root && node.len() < self.min_entries() {
            return Err(violation(
                path,
                format!(
                    "{} entries below minimum fill {}",
                    node.len(),
                    self.min_entries()
                ),
            ));
        }

        let expected = Rectangle::union_all(node.entries.iter().map(Entry::mbr));
        if node.mbr != expected {
            return Err(violation(
                path,
                format!("cached MBR {:?} but entries cover {:?}", node.mbr, expected),
            ));
        }

        for (i, entry) in node.entries.iter().enumerate() {
            match entry {
                Entry::Data { .. } if node.is_index_node() => {
                    return Err(violation(path, format!("data entry {i} in index node")));
                }
                Entry::Data { .. } => {}
                Entry::Node { .. } if node.is_leaf_node() => {
                    return Err(violation(path, format!("child entry {i} in leaf node")));
                }
                Entry::Node { mbr, node: child } => {
                    path.push(i);
                    if child.level + 1 != node.level {
                        return Err(violation(
                            path,
                            format!("child level {} under level {}", child.level, node.level),
                        ));
                    }
                    if child.mbr != Some(*mbr) {
                        return Err(violation(
                            path,
                            format!("entry MBR {} but child MBR {:?}", mbr, child.mbr),
                        ));
                    }
                    self.check_node(child, false, path)?;
                    path.pop();
                }
            }
        }

        Ok(())
    }

    /// 统计记录数、节点数、叶子数和树高
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            records: 0,
            nodes: 0,
            leaves: 0,
            depth: self.depth(),
        };

        let mut stack: Vec<&Node> = vec![self.root()];
        while let Some(node) = stack.pop() {
            stats.nodes += 1;
            if node.is_leaf_node() {
                stats.leaves += 1;
                stats.records += node.len();
            } else {
                stack.extend(node.entries.iter().filter_map(Entry::child));
            }
        }

        stats
    }

    /// 把完整的树结构渲染为缩进文本，用于调试
    pub fn render_tree(&self) -> String {
        fn render_node(out: &mut String, node: &Node, depth: usize, path: &str) {
            let indent = "  ".repeat(depth);
            let mbr = node
                .mbr
                .map(|mbr| mbr.to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "{}Node{} (level={}, type={:?}, mbr={}, {} entries)",
                indent,
                path,
                node.level,
                node.node_type,
                mbr,
                node.len()
            );

            for (i, entry) in node.entries.iter().enumerate() {
                match entry {
                    Entry::Data { mbr, handle } => {
                        let _ = writeln!(out, "{}  [{}] Data: {} at {}", indent, i, handle, mbr);
                    }
                    Entry::Node { node: child, .. } => {
                        render_node(out, child, depth + 1, &format!("{}[{}]", path, i));
                    }
                }
            }
        }

        let mut out = String::new();
        render_node(&mut out, self.root(), 0, "");
        out
    }
}

fn violation(path: &[usize], reason: String) -> InvariantViolation {
    InvariantViolation {
        path: path.to_vec(),
        reason,
    }
}

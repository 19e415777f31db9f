use super::super::node::{Entry, Node, NodeFull};
use super::super::rectangle::Rectangle;
use super::super::rtree::RTree;
use std::cmp::Ordering;
use tracing::{debug, error};

/// 节点分裂算法 - R* 拓扑分裂
impl RTree {
    /// 处理节点溢出
    ///
    /// `path` 指向已满的节点，`pending` 是被它拒绝的条目。节点连同该条目一起分裂为两个：
    /// 左半部分原地替换父节点中的旧条目，右半部分加入父节点；父节点也满时继续向上分裂。
    /// 根节点分裂时创建新的根，树高加一。
    pub(crate) fn handle_overflow(&mut self, mut path: Vec<usize>, mut pending: Entry) {
        loop {
            let Some(node) = self.get_last_node_mut(&path) else {
                error!(?path, "failed to resolve overflowing node");
                return;
            };

            node.entries.push(pending);
            let (left, right) = node.split();
            debug!(
                level = left.level,
                left = left.len(),
                right = right.len(),
                "node split"
            );

            let level = left.level;
            let (Some(left), Some(right)) = (Entry::from_node(left), Entry::from_node(right))
            else {
                error!(?path, "split produced an empty node");
                return;
            };

            let Some(child_index) = path.pop() else {
                let mut new_root = Node::new_index_node(level + 1, self.max_entries());
                new_root.entries.push(left);
                new_root.entries.push(right);
                new_root.update_mbr();
                **self.root_mut() = new_root;
                debug!(depth = self.depth(), "root split, tree grew one level");
                return;
            };

            let Some(parent) = self.get_last_node_mut(&path) else {
                error!(?path, "failed to resolve parent of split node");
                return;
            };

            match parent.entries.get_mut(child_index) {
                Some(slot) => *slot = left,
                None => {
                    error!(child_index, "split node is missing from its parent");
                    return;
                }
            }

            match parent.add_entry(right) {
                Ok(()) => {
                    self.adjust_tree_upward(&path);
                    return;
                }
                Err(NodeFull(entry)) => pending = entry,
            }
        }
    }
}

impl Node {
    /// 把节点的全部条目分成两个新节点，原节点被清空
    ///
    /// 两个结果节点与原节点同类型、同层级，各自至少包含 `min(⌈M/2⌉, n/2)` 个条目。
    pub fn split(&mut self) -> (Node, Node) {
        let entries = std::mem::take(&mut self.entries);
        self.mbr = None;

        let (left_entries, right_entries) = partition(entries, self.min_entries());

        let mut left = Node::new(self.node_type, self.level, self.max_entries);
        left.entries = left_entries;
        left.update_mbr();

        let mut right = Node::new(self.node_type, self.level, self.max_entries);
        right.entries = right_entries;
        right.update_mbr();

        (left, right)
    }
}

/// R* 分裂
///
/// 1. 选轴：对每个轴按 `(min, max)` 排序，累加所有合法分布两侧 MBR 的周长，取总和最小的轴。
/// 2. 选位置：在该轴上取两侧面积之和最小的分布，其次重叠面积最小，再次取位置最靠前者。
fn partition(mut entries: Vec<Entry>, min_fill: usize) -> (Vec<Entry>, Vec<Entry>) {
    let n = entries.len();
    if n < 2 {
        return (entries, Vec::new());
    }
    let min_fill = min_fill.clamp(1, n / 2);

    let mut best_axis = 0;
    let mut best_margin = f64::INFINITY;
    for axis in 0..2 {
        sort_by_axis(&mut entries, axis);
        let margin: f64 = distributions(&entries, min_fill)
            .map(|(left, right)| left.perimeter() + right.perimeter())
            .sum();
        if margin < best_margin {
            best_margin = margin;
            best_axis = axis;
        }
    }

    sort_by_axis(&mut entries, best_axis);

    let mut best_k = min_fill;
    let mut best_cost = (f64::INFINITY, f64::INFINITY);
    for (k, (left, right)) in (min_fill..).zip(distributions(&entries, min_fill)) {
        let cost = (left.area() + right.area(), left.intersection_area(&right));
        if cost.0 < best_cost.0 || (cost.0 == best_cost.0 && cost.1 < best_cost.1) {
            best_cost = cost;
            best_k = k;
        }
    }

    let right = entries.split_off(best_k);
    (entries, right)
}

fn sort_by_axis(entries: &mut [Entry], axis: usize) {
    entries.sort_by(|a, b| {
        let (a, b) = (a.mbr(), b.mbr());
        match a.min[axis].total_cmp(&b.min[axis]) {
            Ordering::Equal => a.max[axis].total_cmp(&b.max[axis]),
            ord => ord,
        }
    });
}

/// 按当前顺序枚举所有分布 `k ∈ [m, n - m]`，产出两侧的 MBR
fn distributions(
    entries: &[Entry],
    min_fill: usize,
) -> impl Iterator<Item = (Rectangle, Rectangle)> + '_ {
    let n = entries.len();
    let prefix = running_unions(entries.iter());
    let mut suffix = running_unions(entries.iter().rev());
    suffix.reverse();

    (min_fill..=n - min_fill).map(move |k| (prefix[k - 1], suffix[k]))
}

/// 第 i 项为前 i+1 个条目 MBR 的并集
fn running_unions<'a>(entries: impl Iterator<Item = &'a Entry>) -> Vec<Rectangle> {
    let mut acc: Option<Rectangle> = None;
    entries
        .map(|entry| {
            let next = match acc {
                Some(acc) => acc.union(entry.mbr()),
                None => *entry.mbr(),
            };
            acc = Some(next);
            next
        })
        .collect()
}

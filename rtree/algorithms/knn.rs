//! K-Nearest Neighbors (KNN) search for the R*-tree
//!
//! Best-first branch-and-bound traversal: a min-heap holds both unexpanded
//! nodes (keyed by the minimum distance from the query point to their MBR)
//! and leaf records (keyed by the distance to their own MBR). Because a
//! node's key is a lower bound for everything beneath it, the records come
//! off the heap in non-decreasing distance order and the search can stop as
//! soon as `k` of them have been popped.
//!
//! Distances are planar Euclidean, measured in the units of the stored
//! coordinates.

use super::super::node::{Entry, LeafEntry, Node};
use super::super::rtree::{RTree, RTreeError};
use geo::Point;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A KNN result: the leaf entry and its distance to the query point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub entry: LeafEntry,
    pub distance: f64,
}

/// Entry in the priority queue
///
/// Nodes are borrowed from the tree, never cloned.
#[derive(Debug)]
enum QueueEntry<'a> {
    Record {
        distance: f64,
        seq: u64,
        entry: LeafEntry,
    },
    Node {
        distance: f64,
        seq: u64,
        node: &'a Node,
    },
}

impl QueueEntry<'_> {
    fn distance(&self) -> f64 {
        match self {
            QueueEntry::Record { distance, .. } | QueueEntry::Node { distance, .. } => *distance,
        }
    }

    fn seq(&self) -> u64 {
        match self {
            QueueEntry::Record { seq, .. } | QueueEntry::Node { seq, .. } => *seq,
        }
    }

    /// Records sort ahead of nodes at equal distance
    fn rank(&self) -> u8 {
        match self {
            QueueEntry::Record { .. } => 0,
            QueueEntry::Node { .. } => 1,
        }
    }
}

impl PartialEq for QueueEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry<'_> {}

impl PartialOrd for QueueEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse everything so the smallest key pops first
        other
            .distance()
            .total_cmp(&self.distance())
            .then_with(|| other.rank().cmp(&self.rank()))
            .then_with(|| other.seq().cmp(&self.seq()))
    }
}

/// Incremental nearest-neighbour iterator
///
/// Yields every record in the tree in non-decreasing distance from the query
/// point. Ties are broken by discovery order, so the sequence is
/// deterministic for a given tree.
pub struct NearestIter<'a> {
    x: f64,
    y: f64,
    heap: BinaryHeap<QueueEntry<'a>>,
    seq: u64,
}

impl<'a> NearestIter<'a> {
    fn new(root: &'a Node, x: f64, y: f64) -> Self {
        let mut iter = NearestIter {
            x,
            y,
            heap: BinaryHeap::new(),
            seq: 0,
        };
        if let Some(mbr) = root.mbr {
            let distance = mbr.min_distance(x, y);
            iter.push_node(root, distance);
        }
        iter
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn push_node(&mut self, node: &'a Node, distance: f64) {
        let seq = self.next_seq();
        self.heap.push(QueueEntry::Node {
            distance,
            seq,
            node,
        });
    }

    fn expand(&mut self, node: &'a Node) {
        for entry in &node.entries {
            let distance = entry.mbr().min_distance(self.x, self.y);
            match entry {
                Entry::Data { mbr, handle } => {
                    let seq = self.next_seq();
                    self.heap.push(QueueEntry::Record {
                        distance,
                        seq,
                        entry: LeafEntry::new(*mbr, *handle),
                    });
                }
                Entry::Node { node: child, .. } => self.push_node(child, distance),
            }
        }
    }
}

impl Iterator for NearestIter<'_> {
    type Item = Neighbor;

    fn next(&mut self) -> Option<Neighbor> {
        while let Some(candidate) = self.heap.pop() {
            match candidate {
                QueueEntry::Record {
                    distance, entry, ..
                } => return Some(Neighbor { entry, distance }),
                QueueEntry::Node { node, .. } => self.expand(node),
            }
        }
        None
    }
}

impl RTree {
    /// 返回距离查询点最近的 `k` 个叶子条目，按距离升序
    ///
    /// `k == 0` 返回空列表；`k` 超过记录总数时返回全部记录。
    pub fn k_nearest(&self, point: Point<f64>, k: usize) -> Result<Vec<LeafEntry>, RTreeError> {
        Ok(self
            .k_nearest_with_distance(point, k)?
            .into_iter()
            .map(|neighbor| neighbor.entry)
            .collect())
    }

    /// 同 [`RTree::k_nearest`]，同时返回每个结果的距离
    pub fn k_nearest_with_distance(
        &self,
        point: Point<f64>,
        k: usize,
    ) -> Result<Vec<Neighbor>, RTreeError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        Ok(self.nearest_iter(point)?.take(k).collect())
    }

    /// 按距离升序惰性产出全部叶子条目
    pub fn nearest_iter(&self, point: Point<f64>) -> Result<NearestIter<'_>, RTreeError> {
        let (x, y) = (point.x(), point.y());
        if !x.is_finite() || !y.is_finite() {
            return Err(RTreeError::InvalidPoint { x, y });
        }
        Ok(NearestIter::new(self.root(), x, y))
    }
}

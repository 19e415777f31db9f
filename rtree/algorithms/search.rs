use super::super::node::{Entry, LeafEntry};
use super::super::rectangle::Rectangle;
use super::super::rtree::{RTree, RTreeError};
use std::slice;

/// 深度优先的叶子条目迭代器
///
/// 显式维护一个条目迭代器栈，不递归；给定查询矩形时跳过不相交的子树。
/// 每次调用 [`RTree::iter`] 或 [`RTree::range_iter`] 都从根重新开始。
pub struct LeafIter<'a> {
    stack: Vec<slice::Iter<'a, Entry>>,
    query: Option<Rectangle>,
}

impl<'a> LeafIter<'a> {
    fn new(rtree: &'a RTree, query: Option<Rectangle>) -> Self {
        LeafIter {
            stack: vec![rtree.root().entries.iter()],
            query,
        }
    }
}

impl Iterator for LeafIter<'_> {
    type Item = LeafEntry;

    fn next(&mut self) -> Option<LeafEntry> {
        while let Some(top) = self.stack.last_mut() {
            let Some(entry) = top.next() else {
                self.stack.pop();
                continue;
            };

            if let Some(query) = &self.query {
                if !entry.mbr().intersects(query) {
                    continue;
                }
            }

            match entry {
                Entry::Data { mbr, handle } => return Some(LeafEntry::new(*mbr, *handle)),
                Entry::Node { node, .. } => self.stack.push(node.entries.iter()),
            }
        }

        None
    }
}

/// 搜索操作相关算法
impl RTree {
    /// 范围查询：返回MBR与查询矩形相交（含边界接触）的所有叶子条目
    ///
    /// 结果顺序为深度优先遍历顺序，不做排序。
    pub fn range_query(&self, query: &Rectangle) -> Result<Vec<LeafEntry>, RTreeError> {
        Ok(self.range_iter(query)?.collect())
    }

    /// 惰性的范围查询
    pub fn range_iter(&self, query: &Rectangle) -> Result<LeafIter<'_>, RTreeError> {
        self.check_mbr(query)?;
        Ok(LeafIter::new(self, Some(*query)))
    }

    /// 遍历全部叶子条目
    pub fn iter(&self) -> LeafIter<'_> {
        LeafIter::new(self, None)
    }

    /// 点查询：MBR包含该点的所有叶子条目
    pub fn point_query(&self, x: f64, y: f64) -> Result<Vec<LeafEntry>, RTreeError> {
        self.range_query(&Rectangle::from_point(x, y))
    }
}

impl<'a> IntoIterator for &'a RTree {
    type Item = LeafEntry;
    type IntoIter = LeafIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

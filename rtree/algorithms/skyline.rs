use super::super::node::LeafEntry;
use super::super::rectangle::Rectangle;
use super::super::rtree::RTree;

/// 支配关系：`a` 的四个坐标 `[min_x, min_y, max_x, max_y]` 都不大于 `b`，且至少一个严格更小
pub fn dominates(a: &Rectangle, b: &Rectangle) -> bool {
    let (a, b) = (a.to_array(), b.to_array());
    a.iter().zip(&b).all(|(x, y)| x <= y) && a.iter().zip(&b).any(|(x, y)| x < y)
}

impl RTree {
    /// Skyline 查询：不被任何其他叶子条目支配的条目
    ///
    /// 对全部叶子做两两比较，O(n²)。MBR完全相同的条目互不支配，会一起出现在结果中。
    pub fn skyline(&self) -> Vec<LeafEntry> {
        let entries: Vec<LeafEntry> = self.iter().collect();

        entries
            .iter()
            .filter(|candidate| {
                !entries
                    .iter()
                    .any(|other| dominates(&other.mbr, &candidate.mbr))
            })
            .copied()
            .collect()
    }
}

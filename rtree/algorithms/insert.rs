use super::super::node::{Entry, LeafEntry, NodeFull, RecordHandle};
use super::super::rectangle::Rectangle;
use super::super::rtree::{InsertOutcome, RTree, RTreeError};
use tracing::{error, warn};

/// 插入操作相关算法
impl RTree {
    /// 插入新的数据条目
    ///
    /// 校验MBR后把 `(mbr, handle)` 放入叶子层，必要时分裂并向上传播。
    /// 若挂载了存储适配器，随后向索引日志追加一条记录；
    /// 日志失败不会回滚插入，只在返回值中报告。
    pub fn insert(
        &mut self,
        mbr: Rectangle,
        handle: RecordHandle,
    ) -> Result<InsertOutcome, RTreeError> {
        self.check_mbr(&mbr)?;
        self.insert_entry(Entry::Data { mbr, handle }, 0);

        let outcome = match self.storage.as_mut() {
            Some(storage) => match storage.append_index_entry(&mbr, handle) {
                Ok(()) => InsertOutcome::Inserted,
                Err(err) => {
                    warn!(%mbr, %handle, error = %err, "index log append failed");
                    InsertOutcome::LogFailed(err)
                }
            },
            None => InsertOutcome::Inserted,
        };

        Ok(outcome)
    }

    /// 插入叶子条目，等价于 `insert(leaf.mbr, leaf.handle)`
    pub fn insert_leaf(&mut self, leaf: LeafEntry) -> Result<InsertOutcome, RTreeError> {
        self.insert(leaf.mbr, leaf.handle)
    }

    /// 把条目放到 `level` 层的节点中（0 为叶子层）
    ///
    /// 删除时的重新插入也走这里：子树条目回到原来的层级，不写索引日志。
    pub(crate) fn insert_entry(&mut self, entry: Entry, level: usize) {
        let path = self.choose_subtree_path(entry.mbr(), level);

        let Some(node) = self.get_last_node_mut(&path) else {
            error!(?path, "failed to resolve target node during insertion");
            return;
        };

        match node.add_entry(entry) {
            Ok(()) => self.adjust_tree_upward(&path),
            Err(NodeFull(entry)) => self.handle_overflow(path, entry),
        }
    }

    /// 从根向下选择到 `level` 层的路径 - ChooseSubtree
    fn choose_subtree_path(&self, rect: &Rectangle, level: usize) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = self.root();

        while current.level > level {
            let best_index = Self::choose_subtree(&current.entries, rect);

            match current.entries.get(best_index).and_then(Entry::child) {
                Some(child) => {
                    path.push(best_index);
                    current = child;
                }
                None => break,
            }
        }

        path
    }

    /// 选择子树：面积增量最小，其次面积最小，仍相同时取下标最小者
    pub(crate) fn choose_subtree(entries: &[Entry], rect: &Rectangle) -> usize {
        let mut best_index = 0;
        let mut min_enlargement = f64::INFINITY;
        let mut min_area = f64::INFINITY;

        for (i, entry) in entries.iter().enumerate() {
            let mbr = entry.mbr();
            let enlargement = mbr.enlargement(rect);
            let area = mbr.area();

            if enlargement < min_enlargement || (enlargement == min_enlargement && area < min_area)
            {
                min_enlargement = enlargement;
                min_area = area;
                best_index = i;
            }
        }

        best_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::adapter::{StorageAdapter, StorageError};
    use crate::storage::data_file::Record;
    use std::sync::{Arc, Mutex};

    fn point(x: f64, y: f64) -> Rectangle {
        Rectangle::from_point(x, y)
    }

    #[test]
    fn test_insert_basic() {
        let mut rtree = RTree::new(4);

        assert!(rtree.is_empty());
        rtree
            .insert(Rectangle::new(0.0, 0.0, 10.0, 10.0), RecordHandle::new(1, 0))
            .unwrap();
        assert_eq!(rtree.len(), 1);

        rtree
            .insert(Rectangle::new(5.0, 5.0, 15.0, 15.0), RecordHandle::new(1, 1))
            .unwrap();
        rtree
            .insert(Rectangle::new(20.0, 20.0, 30.0, 30.0), RecordHandle::new(1, 2))
            .unwrap();
        assert_eq!(rtree.len(), 3);
        assert_eq!(rtree.depth(), 1);
        assert_eq!(rtree.root_mbr(), Some(Rectangle::new(0.0, 0.0, 30.0, 30.0)));
    }

    #[test]
    fn test_insert_rejects_invalid_mbr() {
        let mut rtree = RTree::new(4);
        let bad = Rectangle::new(5.0, 0.0, 1.0, 1.0);

        let err = rtree.insert(bad, RecordHandle::new(1, 0)).unwrap_err();
        assert_eq!(err, RTreeError::InvalidMbr(bad));

        let nan = Rectangle::new(f64::NAN, 0.0, 1.0, 1.0);
        assert!(rtree.insert(nan, RecordHandle::new(1, 1)).is_err());
        assert!(rtree.is_empty());
    }

    #[test]
    fn test_root_split_with_fanout_two() {
        let mut rtree = RTree::new(2);
        rtree.insert(point(0.0, 0.0), RecordHandle::new(1, 0)).unwrap();
        rtree.insert(point(5.0, 5.0), RecordHandle::new(1, 1)).unwrap();
        assert_eq!(rtree.depth(), 1);

        rtree.insert(point(10.0, 10.0), RecordHandle::new(1, 2)).unwrap();

        assert_eq!(rtree.depth(), 2);
        assert_eq!(rtree.len(), 3);
        assert_eq!(rtree.root().len(), 2);
        assert_eq!(rtree.root_mbr(), Some(Rectangle::new(0.0, 0.0, 10.0, 10.0)));
        rtree.check_invariants().unwrap();
    }

    #[test]
    fn test_many_inserts_keep_invariants() {
        let mut rtree = RTree::new(4);
        for i in 0..200u32 {
            let x = ((i * 37) % 101) as f64;
            let y = ((i * 53) % 97) as f64;
            rtree.insert(point(x, y), RecordHandle::new(1 + i / 16, i % 16)).unwrap();
            rtree.check_invariants().unwrap();
        }
        assert_eq!(rtree.len(), 200);
        assert!(rtree.depth() >= 4);
    }

    #[test]
    fn test_duplicate_mbrs_are_kept() {
        let mut rtree = RTree::new(3);
        for slot in 0..10 {
            rtree.insert(point(2.0, 2.0), RecordHandle::new(1, slot)).unwrap();
        }
        assert_eq!(rtree.len(), 10);
        rtree.check_invariants().unwrap();
    }

    #[test]
    fn test_choose_subtree_tie_breaking() {
        let entries = vec![
            Entry::Data {
                mbr: Rectangle::new(0.0, 0.0, 10.0, 10.0),
                handle: RecordHandle::new(1, 0),
            },
            Entry::Data {
                mbr: Rectangle::new(0.0, 0.0, 4.0, 4.0),
                handle: RecordHandle::new(1, 1),
            },
            Entry::Data {
                mbr: Rectangle::new(0.0, 0.0, 4.0, 4.0),
                handle: RecordHandle::new(1, 2),
            },
        ];

        // 三者增量都为 0：选面积最小者中下标最小的
        assert_eq!(RTree::choose_subtree(&entries, &point(1.0, 1.0)), 1);
        // 只有第一个无需扩大
        assert_eq!(RTree::choose_subtree(&entries, &point(8.0, 8.0)), 0);
    }

    /// 把追加的索引条目记到共享列表里
    struct RecordingLog(Arc<Mutex<Vec<(Rectangle, RecordHandle)>>>);

    impl StorageAdapter for RecordingLog {
        fn append_index_entry(
            &mut self,
            mbr: &Rectangle,
            handle: RecordHandle,
        ) -> Result<(), StorageError> {
            self.0.lock().unwrap().push((*mbr, handle));
            Ok(())
        }

        fn resolve(&mut self, handle: RecordHandle) -> Result<Record, StorageError> {
            Err(StorageError::RecordOutOfRange(handle))
        }
    }

    #[test]
    fn test_insert_appends_index_log() {
        let logged = Arc::new(Mutex::new(Vec::new()));
        let mut rtree = RTree::with_storage(2, Box::new(RecordingLog(logged.clone())));

        for i in 0..5 {
            rtree
                .insert(point(i as f64, 0.0), RecordHandle::new(1, i))
                .unwrap();
        }
        // 分裂不产生额外的日志条目
        let logged = logged.lock().unwrap();
        assert_eq!(logged.len(), 5);
        assert_eq!(logged[3], (point(3.0, 0.0), RecordHandle::new(1, 3)));

        // 被拒绝的插入不写日志
        drop(logged);
        assert!(rtree
            .insert(Rectangle::new(1.0, 1.0, 0.0, 0.0), RecordHandle::new(1, 9))
            .is_err());
    }

    struct FailingLog;

    impl StorageAdapter for FailingLog {
        fn append_index_entry(
            &mut self,
            _mbr: &Rectangle,
            _handle: RecordHandle,
        ) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::other("disk full")))
        }

        fn resolve(&mut self, handle: RecordHandle) -> Result<Record, StorageError> {
            Err(StorageError::RecordOutOfRange(handle))
        }
    }

    #[test]
    fn test_log_failure_keeps_insert() {
        let mut rtree = RTree::with_storage(4, Box::new(FailingLog));
        let outcome = rtree.insert(point(1.0, 1.0), RecordHandle::new(1, 0)).unwrap();

        assert!(!outcome.is_logged());
        assert!(matches!(outcome.log_error(), Some(StorageError::Io(_))));
        assert_eq!(rtree.len(), 1);
        assert_eq!(
            rtree.range_query(&Rectangle::new(0.0, 0.0, 2.0, 2.0)).unwrap().len(),
            1
        );
    }
}

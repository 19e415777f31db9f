use super::super::node::{LeafEntry, RecordHandle};
use super::super::rectangle::Rectangle;
use super::super::rtree::{DeleteOutcome, InsertOutcome, RTree, RTreeError};
use super::knn::Neighbor;
use geo::Point;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// 并发错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConcurrentError {
    #[error("Lock was poisoned by a panicked thread")]
    LockPoisoned,
    #[error(transparent)]
    Tree(#[from] RTreeError),
}

/// 并发安全的R-tree包装
///
/// 引擎本身是单线程的；这里用读写锁协调访问：
/// - 读操作（range_query, k_nearest, skyline, len）可以并发执行
/// - 写操作（insert, delete）需要独占访问
///
/// # 示例
///
/// ```
/// use geostar::rtree::{ConcurrentRTree, Rectangle, RecordHandle};
/// use std::thread;
///
/// let rtree = ConcurrentRTree::new(4);
///
/// let handles: Vec<_> = (0..4u32)
///     .map(|i| {
///         let rtree = rtree.clone(); // 共享同一棵树
///         thread::spawn(move || {
///             let rect = Rectangle::from_point(i as f64, i as f64);
///             rtree.insert(rect, RecordHandle::new(1, i)).unwrap();
///         })
///     })
///     .collect();
///
/// for handle in handles {
///     handle.join().unwrap();
/// }
///
/// assert_eq!(rtree.len().unwrap(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct ConcurrentRTree {
    inner: Arc<RwLock<RTree>>,
}

impl ConcurrentRTree {
    /// 创建新的并发R-tree
    pub fn new(max_entries: usize) -> Self {
        Self::from_tree(RTree::new(max_entries))
    }

    /// 包装一棵已有的R-tree（可以带存储适配器）
    pub fn from_tree(rtree: RTree) -> Self {
        Self {
            inner: Arc::new(RwLock::new(rtree)),
        }
    }

    pub fn insert(
        &self,
        mbr: Rectangle,
        handle: RecordHandle,
    ) -> Result<InsertOutcome, ConcurrentError> {
        let mut tree = self.write_lock()?;
        Ok(tree.insert(mbr, handle)?)
    }

    pub fn delete(&self, mbr: &Rectangle) -> Result<DeleteOutcome, ConcurrentError> {
        let mut tree = self.write_lock()?;
        Ok(tree.delete(mbr)?)
    }

    pub fn range_query(&self, query: &Rectangle) -> Result<Vec<LeafEntry>, ConcurrentError> {
        let tree = self.read_lock()?;
        Ok(tree.range_query(query)?)
    }

    pub fn k_nearest(
        &self,
        point: Point<f64>,
        k: usize,
    ) -> Result<Vec<Neighbor>, ConcurrentError> {
        let tree = self.read_lock()?;
        Ok(tree.k_nearest_with_distance(point, k)?)
    }

    pub fn skyline(&self) -> Result<Vec<LeafEntry>, ConcurrentError> {
        let tree = self.read_lock()?;
        Ok(tree.skyline())
    }

    pub fn len(&self) -> Result<usize, ConcurrentError> {
        let tree = self.read_lock()?;
        Ok(tree.len())
    }

    pub fn is_empty(&self) -> Result<bool, ConcurrentError> {
        let tree = self.read_lock()?;
        Ok(tree.is_empty())
    }

    /// 在读锁下执行任意只读操作
    pub fn read<R>(&self, f: impl FnOnce(&RTree) -> R) -> Result<R, ConcurrentError> {
        let tree = self.read_lock()?;
        Ok(f(&tree))
    }

    /// 在写锁下执行任意操作
    pub fn write<R>(&self, f: impl FnOnce(&mut RTree) -> R) -> Result<R, ConcurrentError> {
        let mut tree = self.write_lock()?;
        Ok(f(&mut tree))
    }

    /// 获取读锁的辅助方法
    fn read_lock(&self) -> Result<RwLockReadGuard<'_, RTree>, ConcurrentError> {
        self.inner.read().map_err(|_| ConcurrentError::LockPoisoned)
    }

    /// 获取写锁的辅助方法
    fn write_lock(&self) -> Result<RwLockWriteGuard<'_, RTree>, ConcurrentError> {
        self.inner.write().map_err(|_| ConcurrentError::LockPoisoned)
    }
}

impl From<RTree> for ConcurrentRTree {
    fn from(rtree: RTree) -> Self {
        Self::from_tree(rtree)
    }
}
